//! Data-URI helpers for inlined image bytes
//!
//! The UI exchanges images as `data:<mime>;base64,<payload>` strings; the
//! provider wire format wants the mime type and base64 payload separately.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;

/// An image as it travels on the provider wire: mime type + base64 payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageData {
    pub mime_type: String,
    pub base64: String,
}

/// Parse a `data:` URI into its mime type and base64 payload.
///
/// Returns `None` for anything that is not a well-formed base64 data URI,
/// including payloads that fail base64 validation.
pub fn parse_data_uri(uri: &str) -> Option<ImageData> {
    let rest = uri.strip_prefix("data:")?;
    let (mime_type, payload) = rest.split_once(";base64,")?;
    if mime_type.is_empty() {
        return None;
    }
    STANDARD.decode(payload).ok()?;
    Some(ImageData {
        mime_type: mime_type.to_string(),
        base64: payload.to_string(),
    })
}

/// Encode a mime type + base64 payload back into a data URI.
pub fn to_data_uri(mime_type: &str, base64: &str) -> String {
    format!("data:{mime_type};base64,{base64}")
}
