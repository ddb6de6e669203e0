use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use thiserror::Error;

const CURSOR_PREFIX: &str = "page:";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CursorError {
    #[error("nextPageKey is not valid base64")]
    Encoding,
    #[error("nextPageKey is malformed")]
    Malformed,
}

/// Opaque forward cursor. Clients must treat it as a token, never as an offset.
pub fn encode_cursor(offset: usize) -> String {
    URL_SAFE_NO_PAD.encode(format!("{CURSOR_PREFIX}{offset}"))
}

pub fn decode_cursor(token: &str) -> Result<usize, CursorError> {
    let raw = URL_SAFE_NO_PAD
        .decode(token.trim())
        .map_err(|_| CursorError::Encoding)?;
    let raw = String::from_utf8(raw).map_err(|_| CursorError::Malformed)?;
    raw.strip_prefix(CURSOR_PREFIX)
        .and_then(|offset| offset.parse().ok())
        .ok_or(CursorError::Malformed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_what_it_encodes() {
        assert_eq!(decode_cursor(&encode_cursor(30)), Ok(30));
    }

    #[test]
    fn rejects_foreign_tokens() {
        assert_eq!(decode_cursor("***"), Err(CursorError::Encoding));
        assert_eq!(
            decode_cursor(&URL_SAFE_NO_PAD.encode("offset=3")),
            Err(CursorError::Malformed)
        );
        assert_eq!(
            decode_cursor(&URL_SAFE_NO_PAD.encode("page:-1")),
            Err(CursorError::Malformed)
        );
    }
}
