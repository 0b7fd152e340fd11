//! Credential resolution.
//!
//! Providers take an explicit configuration struct whose secret fields are
//! optional. Any field left unset is looked up in a [`CredentialSource`]
//! under a provider-specific variable name; [`Environment`] reads the process
//! environment and is the default at the process boundary.

use std::collections::HashMap;

use crate::error::{LagError, Result};

/// A lookup for named secrets.
pub trait CredentialSource: Send + Sync {
    /// Returns the value for `variable`, or `None` if unset.
    fn lookup(&self, variable: &str) -> Option<String>;
}

/// Reads credentials from the process environment.
#[derive(Debug, Clone, Copy, Default)]
pub struct Environment;

impl CredentialSource for Environment {
    fn lookup(&self, variable: &str) -> Option<String> {
        std::env::var(variable).ok()
    }
}

impl CredentialSource for HashMap<String, String> {
    fn lookup(&self, variable: &str) -> Option<String> {
        self.get(variable).cloned()
    }
}

/// Resolves a required credential.
///
/// Returns `explicit` if it is set and non-empty, otherwise the value of
/// `variable` from `source`. Empty strings count as unset.
///
/// # Errors
/// Returns [`LagError::MissingCredential`] naming `variable` if neither is set.
pub fn require(
    explicit: Option<&str>,
    variable: &str,
    source: &dyn CredentialSource,
) -> Result<String> {
    explicit
        .filter(|value| !value.is_empty())
        .map(str::to_string)
        .or_else(|| source.lookup(variable).filter(|value| !value.is_empty()))
        .ok_or_else(|| LagError::MissingCredential {
            variable: variable.to_string(),
        })
}
