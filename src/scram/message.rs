//! Field parsing and escaping shared by the SCRAM client and server.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;

use crate::error::{Error, Result};

/// Escapes a SASLprepped value for use in the `n=` or `a=` field: `=` becomes
/// `=3D` and `,` becomes `=2C`.
pub fn escape_username(username: &str) -> String {
    username.replace('=', "=3D").replace(',', "=2C")
}

/// Reverses [`escape_username`].
pub fn unescape_username(escaped: &str) -> String {
    escaped.replace("=2C", ",").replace("=3D", "=")
}

/// Splits a comma-separated SCRAM message into its raw fields.
pub fn split_fields(message: &[u8]) -> Vec<&[u8]> {
    message.split(|&b| b == b',').collect()
}

/// Strips a known single-character prefix (e.g. `r=`) from a field, failing
/// with `InvalidChallenge`/`InvalidResponse` (selected by `for_client`) if
/// the prefix doesn't match.
pub fn expect_field<'a>(field: &'a [u8], prefix: &str, for_client: bool) -> Result<&'a [u8]> {
    let prefix_bytes = prefix.as_bytes();
    if field.len() < prefix_bytes.len() || &field[..prefix_bytes.len()] != prefix_bytes {
        let detail = format!(
            "expected field starting with '{}', got '{}'",
            prefix,
            String::from_utf8_lossy(field)
        );
        return Err(if for_client {
            Error::invalid_challenge(detail)
        } else {
            Error::invalid_response(detail)
        });
    }
    Ok(&field[prefix_bytes.len()..])
}

pub fn base64_encode(data: &[u8]) -> String {
    BASE64.encode(data)
}

pub fn base64_decode(data: &[u8], for_client: bool) -> Result<Vec<u8>> {
    BASE64.decode(data).map_err(|e| {
        let detail = format!("invalid base64: {e}");
        if for_client {
            Error::invalid_challenge(detail)
        } else {
            Error::invalid_response(detail)
        }
    })
}

pub fn parse_u32(field: &[u8], for_client: bool) -> Result<u32> {
    let make_err = |detail: String| {
        if for_client {
            Error::invalid_challenge(detail)
        } else {
            Error::invalid_response(detail)
        }
    };
    let text = std::str::from_utf8(field)
        .map_err(|_| make_err("iteration count is not valid UTF-8".to_string()))?;
    text.parse::<u32>()
        .map_err(|_| make_err(format!("invalid iteration count '{text}'")))
}
