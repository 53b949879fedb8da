use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum TdAuthError {
    #[error("Authorization code retrieval failed: {0}")]
    CodeRetrieval(String),

    #[error("Token endpoint returned status {status}: {body}")]
    TokenEndpoint { status: u16, body: String },

    #[error("Token request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Malformed token response: {0}")]
    MalformedResponse(String),

    #[error("Refresh token store error at {}: {detail}", path.display())]
    Store { path: PathBuf, detail: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl TdAuthError {
    /// Stable error-kind string for structured log fields.
    pub fn code(&self) -> &'static str {
        match self {
            TdAuthError::CodeRetrieval(_) => "code_retrieval",
            TdAuthError::TokenEndpoint { .. } => "token_endpoint",
            TdAuthError::Http(_) => "http_error",
            TdAuthError::MalformedResponse(_) => "malformed_response",
            TdAuthError::Store { .. } => "store_error",
            TdAuthError::Io(_) => "io_error",
        }
    }
}
