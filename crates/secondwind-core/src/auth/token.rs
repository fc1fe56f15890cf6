//! Bearer token formatting helpers.
//!
//! The backend is inconsistent about the prefix: the refresh endpoint may
//! return `Bearer <token>` or a bare token in its `Authorization` header.
//! Tokens are always kept bare internally and prefixed only on the wire.

const BEARER_PREFIX: &str = "Bearer ";

/// Strip one leading `"Bearer "` from a header value.
/// Returns `None` when nothing is left.
pub fn strip_bearer(value: &str) -> Option<String> {
    let value = value.trim();
    let bare = value.strip_prefix(BEARER_PREFIX).unwrap_or(value).trim();
    if bare.is_empty() {
        None
    } else {
        Some(bare.to_string())
    }
}

/// Format a token for the `Authorization` header, never doubling the prefix
pub fn to_bearer(token: &str) -> String {
    let token = token.trim();
    if token.starts_with(BEARER_PREFIX) {
        token.to_string()
    } else {
        format!("{}{}", BEARER_PREFIX, token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_bearer() {
        assert_eq!(strip_bearer("Bearer abc.def"), Some("abc.def".to_string()));
        assert_eq!(strip_bearer("abc.def"), Some("abc.def".to_string()));
        assert_eq!(strip_bearer("  Bearer abc  "), Some("abc".to_string()));
        assert_eq!(strip_bearer(""), None);
        assert_eq!(strip_bearer("Bearer "), None);
        // Only one prefix is removed
        assert_eq!(
            strip_bearer("Bearer Bearer abc"),
            Some("Bearer abc".to_string())
        );
    }

    #[test]
    fn test_to_bearer() {
        assert_eq!(to_bearer("abc"), "Bearer abc");
        assert_eq!(to_bearer("Bearer abc"), "Bearer abc");
    }
}
