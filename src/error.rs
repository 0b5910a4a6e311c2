use thiserror::Error;

/// Failures of a single request to the assistant backend.
///
/// The `Display` output is what ends up inside the inline
/// "Error contacting API: ..." message, so keep it short.
#[derive(Debug, Error)]
pub enum ChatError {
    #[error("{0}")]
    Transport(#[from] reqwest::Error),

    #[error("HTTP {}", .0.as_u16())]
    Status(reqwest::StatusCode),

    #[error("invalid response body: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("request task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

pub type ChatResult<T> = std::result::Result<T, ChatError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_renders_code_only() {
        let err = ChatError::Status(reqwest::StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.to_string(), "HTTP 500");
    }

    #[test]
    fn test_decode_mentions_body() {
        let parse = serde_json::from_str::<serde_json::Value>("{not json").unwrap_err();
        let err = ChatError::from(parse);
        assert!(err.to_string().starts_with("invalid response body"));
    }
}
