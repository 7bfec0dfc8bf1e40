use thiserror::Error;

pub type Result<T> = std::result::Result<T, GorseError>;

#[derive(Debug, Error)]
pub enum GorseError {
    /// 404 from the store. An absence signal — the dedup check treats it
    /// as "not indexed yet", not as a failure.
    #[error("not found")]
    NotFound,

    /// Any other non-2xx response.
    #[error("store error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("network error: {0}")]
    Network(String),

    #[error("parse error: {0}")]
    Parse(String),
}

impl GorseError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, GorseError::NotFound)
    }
}

impl From<reqwest::Error> for GorseError {
    fn from(err: reqwest::Error) -> Self {
        GorseError::Network(err.to_string())
    }
}

impl From<serde_json::Error> for GorseError {
    fn from(err: serde_json::Error) -> Self {
        GorseError::Parse(err.to_string())
    }
}
