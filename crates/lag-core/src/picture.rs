//! Picture embedding.
//!
//! Profile images are stored inline as `data:` URIs. The MIME type and pixel
//! dimensions are read from the image header; PNG, GIF, JPEG and WebP are
//! recognised.

use base64::{Engine as _, engine::general_purpose::STANDARD};

use crate::{
    error::{LagError, Result},
    types::Picture,
};

/// Header information sniffed from raw image bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageInfo {
    /// MIME type, e.g. `image/png`.
    pub mime: &'static str,
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

/// Reads the format and dimensions from an image header.
///
/// Returns `None` for unrecognised or truncated data.
#[must_use]
pub fn sniff(bytes: &[u8]) -> Option<ImageInfo> {
    if bytes.starts_with(b"\x89PNG\r\n\x1a\n") {
        // IHDR is always the first chunk.
        let width = be_u32(bytes.get(16..20)?);
        let height = be_u32(bytes.get(20..24)?);
        return Some(ImageInfo {
            mime: "image/png",
            width,
            height,
        });
    }

    if bytes.starts_with(b"GIF87a") || bytes.starts_with(b"GIF89a") {
        let width = u32::from(le_u16(bytes.get(6..8)?));
        let height = u32::from(le_u16(bytes.get(8..10)?));
        return Some(ImageInfo {
            mime: "image/gif",
            width,
            height,
        });
    }

    if bytes.starts_with(&[0xFF, 0xD8]) {
        let (width, height) = jpeg_dimensions(bytes)?;
        return Some(ImageInfo {
            mime: "image/jpeg",
            width,
            height,
        });
    }

    if bytes.starts_with(b"RIFF") && bytes.get(8..12) == Some(b"WEBP".as_slice()) {
        let (width, height) = webp_dimensions(bytes)?;
        return Some(ImageInfo {
            mime: "image/webp",
            width,
            height,
        });
    }

    None
}

/// Reads the canvas size from the first WebP chunk.
fn webp_dimensions(bytes: &[u8]) -> Option<(u32, u32)> {
    match bytes.get(12..16)? {
        // lossy: 14-bit sizes after the frame start code
        b"VP8 " => {
            if bytes.get(23..26)? != [0x9D, 0x01, 0x2A].as_slice() {
                return None;
            }
            let width = u32::from(le_u16(bytes.get(26..28)?) & 0x3FFF);
            let height = u32::from(le_u16(bytes.get(28..30)?) & 0x3FFF);
            Some((width, height))
        }
        // lossless: signature byte, then packed 14-bit sizes minus one
        b"VP8L" => {
            if *bytes.get(20)? != 0x2F {
                return None;
            }
            let b = bytes.get(21..25)?;
            let bits = u32::from_le_bytes([b[0], b[1], b[2], b[3]]);
            Some(((bits & 0x3FFF) + 1, ((bits >> 14) & 0x3FFF) + 1))
        }
        // extended: 24-bit canvas sizes minus one
        b"VP8X" => {
            let width = le_u24(bytes.get(24..27)?) + 1;
            let height = le_u24(bytes.get(27..30)?) + 1;
            Some((width, height))
        }
        _ => None,
    }
}

/// Walks JPEG segments until a start-of-frame marker.
fn jpeg_dimensions(bytes: &[u8]) -> Option<(u32, u32)> {
    let mut i = 2;
    while i + 1 < bytes.len() {
        if bytes[i] != 0xFF {
            return None;
        }
        let marker = bytes[i + 1];
        match marker {
            // fill byte
            0xFF => i += 1,
            // standalone markers carry no length
            0x01 | 0xD0..=0xD9 => i += 2,
            0xC0..=0xCF if !matches!(marker, 0xC4 | 0xC8 | 0xCC) => {
                let height = u32::from(be_u16(bytes.get(i + 5..i + 7)?));
                let width = u32::from(be_u16(bytes.get(i + 7..i + 9)?));
                return Some((width, height));
            }
            _ => {
                let length = usize::from(be_u16(bytes.get(i + 2..i + 4)?));
                i += 2 + length;
            }
        }
    }
    None
}

fn be_u32(b: &[u8]) -> u32 {
    u32::from_be_bytes([b[0], b[1], b[2], b[3]])
}

fn be_u16(b: &[u8]) -> u16 {
    u16::from_be_bytes([b[0], b[1]])
}

fn le_u16(b: &[u8]) -> u16 {
    u16::from_le_bytes([b[0], b[1]])
}

fn le_u24(b: &[u8]) -> u32 {
    u32::from_le_bytes([b[0], b[1], b[2], 0])
}

/// Builds an embedded [`Picture`] from raw image bytes.
///
/// # Errors
/// Returns [`LagError::PartialMediaFailure`] if the bytes are not a
/// recognised image.
pub fn embed(bytes: &[u8]) -> Result<Picture> {
    let info = sniff(bytes)
        .ok_or_else(|| LagError::PartialMediaFailure("unrecognised image data".to_string()))?;

    Ok(Picture {
        width: info.width,
        height: info.height,
        src: format!("data:{};base64,{}", info.mime, STANDARD.encode(bytes)),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sniff_png() {
        let info = sniff(&crate::testing::png_3x2()).unwrap();
        assert_eq!(info.mime, "image/png");
        assert_eq!((info.width, info.height), (3, 2));
    }

    #[test]
    fn test_sniff_gif() {
        let mut bytes = b"GIF89a".to_vec();
        bytes.extend_from_slice(&[0x90, 0x01, 0x2C, 0x01]);
        let info = sniff(&bytes).unwrap();
        assert_eq!(info.mime, "image/gif");
        assert_eq!((info.width, info.height), (400, 300));
    }

    #[test]
    fn test_sniff_jpeg_skips_app_segments() {
        let mut bytes = vec![0xFF, 0xD8];
        // APP0 with a 16 byte payload (length includes itself)
        bytes.extend_from_slice(&[0xFF, 0xE0, 0x00, 0x10]);
        bytes.extend_from_slice(&[0u8; 14]);
        // SOF0: length, precision, height=200, width=320
        bytes.extend_from_slice(&[0xFF, 0xC0, 0x00, 0x11, 0x08, 0x00, 0xC8, 0x01, 0x40]);
        let info = sniff(&bytes).unwrap();
        assert_eq!(info.mime, "image/jpeg");
        assert_eq!((info.width, info.height), (320, 200));
    }

    fn webp(chunk: &[u8; 4], payload: &[u8]) -> Vec<u8> {
        let mut bytes = b"RIFF\0\0\0\0WEBP".to_vec();
        bytes.extend_from_slice(chunk);
        bytes.extend_from_slice(&u32::try_from(payload.len()).unwrap().to_le_bytes());
        bytes.extend_from_slice(payload);
        bytes
    }

    #[test]
    fn test_sniff_webp_lossy() {
        // frame tag, start code, then 14-bit width/height
        let mut payload = vec![0x30, 0x01, 0x00, 0x9D, 0x01, 0x2A];
        payload.extend_from_slice(&400u16.to_le_bytes());
        payload.extend_from_slice(&300u16.to_le_bytes());
        let info = sniff(&webp(b"VP8 ", &payload)).unwrap();
        assert_eq!(info.mime, "image/webp");
        assert_eq!((info.width, info.height), (400, 300));
    }

    #[test]
    fn test_sniff_webp_lossless() {
        let bits: u32 = (640 - 1) | ((480 - 1) << 14);
        let mut payload = vec![0x2F];
        payload.extend_from_slice(&bits.to_le_bytes());
        let info = sniff(&webp(b"VP8L", &payload)).unwrap();
        assert_eq!((info.width, info.height), (640, 480));
    }

    #[test]
    fn test_sniff_webp_extended() {
        let mut payload = vec![0x10, 0, 0, 0];
        payload.extend_from_slice(&[0xFF, 0x03, 0x00]); // 1024 - 1
        payload.extend_from_slice(&[0xFF, 0x01, 0x00]); // 512 - 1
        let info = sniff(&webp(b"VP8X", &payload)).unwrap();
        assert_eq!((info.width, info.height), (1024, 512));

        let picture = embed(&webp(b"VP8X", &payload)).unwrap();
        assert!(picture.src.starts_with("data:image/webp;base64,"));
    }

    #[test]
    fn test_sniff_rejects_unknown_and_truncated() {
        assert!(sniff(b"RIFF\0\0\0\0WEBPVP8 ").is_none());
        assert!(sniff(b"<html>").is_none());
        assert!(sniff(b"\x89PNG\r\n\x1a\n\0\0").is_none());
        assert!(sniff(&[0xFF, 0xD8, 0xFF, 0xE0, 0x00]).is_none());
    }

    #[test]
    fn test_embed_builds_data_uri() {
        let picture = embed(&crate::testing::png_3x2()).unwrap();
        assert_eq!((picture.width, picture.height), (3, 2));
        assert!(picture.src.starts_with("data:image/png;base64,iVBORw0KGgo"));
    }

    #[test]
    fn test_embed_rejects_non_image() {
        assert!(matches!(
            embed(b"not an image"),
            Err(LagError::PartialMediaFailure(_))
        ));
    }
}
