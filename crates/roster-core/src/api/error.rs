use thiserror::Error;

/// Why a data source produced no usable roster.
///
/// Every variant is recovered inside the resolver by falling through to the
/// next source.
#[derive(Error, Debug)]
pub enum SourceError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Unexpected status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Rate limited - gave up after retries")]
    RateLimited,

    #[error("Invalid payload: {0}")]
    Parse(String),

    #[error("Payload contained no roster entries")]
    EmptyResult,

    #[error("Cached roster is unreadable: {0}")]
    CacheCorrupt(String),
}

/// Maximum length for error response bodies in error messages
const MAX_ERROR_BODY_LENGTH: usize = 500;

impl SourceError {
    /// Truncate a response body to avoid logging excessive data
    fn truncate_body(body: &str) -> String {
        if body.len() <= MAX_ERROR_BODY_LENGTH {
            return body.to_string();
        }
        let mut end = MAX_ERROR_BODY_LENGTH;
        while !body.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}... (truncated, {} total bytes)", &body[..end], body.len())
    }

    pub fn from_status(status: reqwest::StatusCode, body: &str) -> Self {
        SourceError::Status {
            status: status.as_u16(),
            body: Self::truncate_body(body),
        }
    }

    /// True for failures of the transport or the remote service, as opposed
    /// to a payload that arrived but was unusable.
    pub fn is_network(&self) -> bool {
        matches!(
            self,
            SourceError::Network(_) | SourceError::Status { .. } | SourceError::RateLimited
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_status_truncates_long_bodies() {
        let body = "x".repeat(800);
        match SourceError::from_status(reqwest::StatusCode::BAD_GATEWAY, &body) {
            SourceError::Status { status, body } => {
                assert_eq!(status, 502);
                assert!(body.starts_with(&"x".repeat(500)));
                assert!(body.ends_with("(truncated, 800 total bytes)"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_is_network() {
        assert!(SourceError::RateLimited.is_network());
        assert!(!SourceError::EmptyResult.is_network());
        assert!(!SourceError::Parse("bad".into()).is_network());
    }
}
