//! Strict text decoding for non-PDF bodies
//!
//! A byte-order mark wins, then a `charset` parameter on the declared
//! content type, then UTF-8. Malformed input is an error, never replaced
//! with U+FFFD, so a mislabeled binary body does not turn into garbage text.

use crate::error::FetchError;
use encoding_rs::{Encoding, UTF_8};

/// Decode a body to a string
pub fn decode_text(body: &[u8], content_type: Option<&str>) -> Result<String, FetchError> {
    let (encoding, bom_len) = match Encoding::for_bom(body) {
        Some(found) => found,
        None => (declared_encoding(content_type).unwrap_or(UTF_8), 0),
    };

    encoding
        .decode_without_bom_handling_and_without_replacement(&body[bom_len..])
        .map(|text| text.into_owned())
        .ok_or_else(|| {
            FetchError::DecodeFailed(format!("body is not valid {}", encoding.name()))
        })
}

/// Look up the encoding named by a `charset=` parameter
fn declared_encoding(content_type: Option<&str>) -> Option<&'static Encoding> {
    let charset = content_type?
        .split(';')
        .skip(1)
        .filter_map(|param| param.split_once('='))
        .find(|(name, _)| name.trim().eq_ignore_ascii_case("charset"))
        .map(|(_, value)| value.trim().trim_matches('"'))?;
    Encoding::for_label(charset.as_bytes())
}
