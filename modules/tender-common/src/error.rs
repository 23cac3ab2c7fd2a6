//! Typed errors for crawl and persistence operations.

use thiserror::Error;

/// Errors that can occur while fetching from a tender source.
#[derive(Debug, Error)]
pub enum CrawlError {
    /// No credentials configured for a strategy that needs them
    #[error("authentication unavailable for {adapter}")]
    AuthenticationUnavailable { adapter: String },

    /// Credentials were rejected by the remote source
    #[error("unauthorized ({status}) at {url}")]
    Unauthorized { url: String, status: u16 },

    /// Transport-level failure (connect, TLS, body read)
    #[error("HTTP error: {0}")]
    Transport(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// Source answered with a non-success status
    #[error("HTTP {status} from {url}")]
    HttpStatus { url: String, status: u16 },

    /// Rate limit exceeded
    #[error("rate limit exceeded at {url}")]
    RateLimitExceeded { url: String },

    /// Connection timeout
    #[error("timeout fetching: {url}")]
    Timeout { url: String },

    /// Invalid URL format
    #[error("invalid URL: {url}")]
    InvalidUrl { url: String },

    /// Page or item could not be decoded
    #[error("malformed payload from {context}: {message}")]
    MalformedPayload { context: String, message: String },

    /// Every strategy failed without reaching the source
    #[error("{adapter} unreachable after strategies [{}]", .attempts.join(", "))]
    SourceUnreachable {
        adapter: String,
        attempts: Vec<String>,
    },
}

impl CrawlError {
    pub fn malformed(context: impl Into<String>, message: impl ToString) -> Self {
        CrawlError::MalformedPayload {
            context: context.into(),
            message: message.to_string(),
        }
    }

    /// Credential problems: skip to the next strategy, never fatal.
    pub fn is_auth(&self) -> bool {
        matches!(
            self,
            CrawlError::AuthenticationUnavailable { .. } | CrawlError::Unauthorized { .. }
        )
    }

    /// Failures where the source was not positively reached.
    pub fn is_transport(&self) -> bool {
        match self {
            CrawlError::Transport(_)
            | CrawlError::Timeout { .. }
            | CrawlError::RateLimitExceeded { .. }
            | CrawlError::SourceUnreachable { .. } => true,
            CrawlError::HttpStatus { status, .. } => *status >= 500,
            _ => false,
        }
    }
}

/// Errors raised by a result sink.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to serialize record: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("sink rejected batch: {0}")]
    Rejected(String),
}

/// Result type alias for crawl operations.
pub type CrawlResult<T> = std::result::Result<T, CrawlError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_transport_and_auth_failures() {
        assert!(CrawlError::Timeout { url: "u".into() }.is_transport());
        assert!(CrawlError::HttpStatus { url: "u".into(), status: 503 }.is_transport());
        assert!(!CrawlError::HttpStatus { url: "u".into(), status: 404 }.is_transport());
        assert!(!CrawlError::malformed("page 1", "eof").is_transport());

        assert!(CrawlError::Unauthorized { url: "u".into(), status: 401 }.is_auth());
        assert!(CrawlError::AuthenticationUnavailable { adapter: "G2B".into() }.is_auth());
        assert!(!CrawlError::Timeout { url: "u".into() }.is_auth());
    }

    #[test]
    fn unreachable_lists_attempted_strategies() {
        let err = CrawlError::SourceUnreachable {
            adapter: "BOAMP".into(),
            attempts: vec!["rss".into(), "search_page".into()],
        };
        assert_eq!(err.to_string(), "BOAMP unreachable after strategies [rss, search_page]");
    }
}
