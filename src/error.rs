use thiserror::Error;

/// Errors raised while talking to the job-portal API or touching local state.
#[derive(Debug, Error)]
pub enum PortalError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("No authentication token found. Please log in again.")]
    MissingToken,

    #[error("{0}")]
    LoginFailed(String),

    #[error("{0}")]
    PostFailed(String),

    #[error("{0}")]
    NotFound(String),

    #[error("Unexpected response format")]
    UnexpectedResponse,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl PortalError {
    /// Builds an `Api` error from a status code and the raw response body,
    /// preferring the server's `message` field when the body carries one.
    pub fn from_response(status: u16, body: &str) -> Self {
        let message = server_message(body).unwrap_or_else(|| body.trim().to_string());
        PortalError::Api { status, message }
    }
}

/// Extracts `message` from a JSON error body.
pub fn server_message(body: &str) -> Option<String> {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()?
        .get("message")?
        .as_str()
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_response_prefers_server_message() {
        let err = PortalError::from_response(400, r#"{"message":"Title is required"}"#);
        match err {
            PortalError::Api { status, message } => {
                assert_eq!(status, 400);
                assert_eq!(message, "Title is required");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_from_response_falls_back_to_body() {
        let err = PortalError::from_response(502, "  Bad Gateway\n");
        assert_eq!(err.to_string(), "API error (status 502): Bad Gateway");
    }

    #[test]
    fn test_missing_token_message() {
        assert_eq!(
            PortalError::MissingToken.to_string(),
            "No authentication token found. Please log in again."
        );
    }
}
