//! Minimal HTML scraping for profile pages and pin descriptions.

use regex::Regex;
use std::collections::HashMap;
use std::sync::LazyLock;

static META_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<meta\b[^>]*>").expect("Invalid meta tag regex"));
static ATTRIBUTE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?is)([a-z][a-z0-9:_-]*)\s*=\s*(?:"([^"]*)"|'([^']*)')"#)
        .expect("Invalid attribute regex")
});
static IMG_SRC: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?is)<img\b[^>]*?\bsrc\s*=\s*["']([^"']+)["']"#).expect("Invalid img regex")
});
static PARAGRAPH: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<p\b[^>]*>(.*?)</p>").expect("Invalid paragraph regex"));
static TAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?s)<[^>]*>").expect("Invalid tag regex"));

/// Collect `<meta>` tags keyed by their `property` or `name` attribute.
///
/// Keys are lowercased. The first occurrence of a key wins.
pub(crate) fn meta_tags(html: &str) -> HashMap<String, String> {
    let mut tags = HashMap::new();

    for tag in META_TAG.find_iter(html) {
        let mut key = None;
        let mut content = None;
        for caps in ATTRIBUTE.captures_iter(tag.as_str()) {
            let value = caps.get(2).or_else(|| caps.get(3)).map_or("", |m| m.as_str());
            match caps[1].to_ascii_lowercase().as_str() {
                "property" | "name" => key = Some(value.to_ascii_lowercase()),
                "content" => content = Some(decode_entities(value)),
                _ => {}
            }
        }
        if let (Some(key), Some(content)) = (key, content) {
            tags.entry(key).or_insert(content);
        }
    }

    tags
}

/// `src` of the first `<img>` in a fragment.
pub(crate) fn first_image(fragment: &str) -> Option<String> {
    IMG_SRC
        .captures(fragment)
        .map(|caps| decode_entities(&caps[1]))
}

/// Text of the `index`-th `<p>` (zero-based), tags stripped.
pub(crate) fn paragraph_text(fragment: &str, index: usize) -> Option<String> {
    PARAGRAPH
        .captures_iter(fragment)
        .nth(index)
        .map(|caps| strip_tags(&caps[1]))
        .filter(|text| !text.is_empty())
}

/// Remove tags, decode entities and trim.
pub(crate) fn strip_tags(fragment: &str) -> String {
    decode_entities(TAG.replace_all(fragment, "").trim())
}

fn decode_entities(text: &str) -> String {
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&#039;", "'")
        .replace("&nbsp;", " ")
        .replace("&amp;", "&")
}
