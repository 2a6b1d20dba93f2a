use thiserror::Error;

/// Failure talking to the image board
#[derive(Debug, Error)]
pub enum BooruError {
    /// The service answered but reported (or implied) a failure
    #[error("{message}")]
    Api {
        code: u16,
        body: String,
        message: String,
    },

    /// Transport-level failure before any response arrived
    #[error("unable to connect to {host}")]
    Connection { host: String },

    /// A successful response the caller cannot work with
    #[error("malformed response: {0}")]
    MalformedResponse(String),

    #[error("HTTP client error: {0}")]
    Client(String),

    #[error("invalid URL: {0}")]
    InvalidUrl(String),
}

impl BooruError {
    /// Whether a worker may show this as status text and keep going
    pub fn is_recoverable(&self) -> bool {
        matches!(self, BooruError::Api { .. } | BooruError::Connection { .. })
    }
}

pub type Result<T> = std::result::Result<T, BooruError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_message() {
        let err = BooruError::Connection {
            host: "example.org".to_string(),
        };
        assert_eq!(err.to_string(), "unable to connect to example.org");
        assert!(err.is_recoverable());
    }

    #[test]
    fn test_malformed_is_fatal() {
        assert!(!BooruError::MalformedResponse("no view_url".to_string()).is_recoverable());
        assert!(!BooruError::Client("builder".to_string()).is_recoverable());
    }
}
