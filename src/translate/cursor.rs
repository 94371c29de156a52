//! Opaque connection cursors.
//!
//! A cursor is the base64 encoding of `arrayconnection:<offset>`, where the
//! offset is the zero-based position of a row in the sorted, unpaged edge list.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};

use super::errors::TranslateError;

const CURSOR_PREFIX: &str = "arrayconnection:";

pub fn offset_to_cursor(offset: u64) -> String {
    BASE64.encode(format!("{}{}", CURSOR_PREFIX, offset))
}

pub fn cursor_to_offset(cursor: &str) -> Result<u64, TranslateError> {
    let invalid = || TranslateError::InvalidCursor {
        cursor: cursor.to_string(),
    };
    let decoded = BASE64.decode(cursor).map_err(|_| invalid())?;
    let text = String::from_utf8(decoded).map_err(|_| invalid())?;
    text.strip_prefix(CURSOR_PREFIX)
        .and_then(|offset| offset.parse::<u64>().ok())
        .ok_or_else(invalid)
}
