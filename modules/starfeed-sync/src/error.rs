use thiserror::Error;

use github_client::GithubError;
use gorse_client::GorseError;

#[derive(Debug, Error)]
pub enum SyncError {
    /// The identity's credential was rejected. Terminal: the caller must
    /// drop the identity from scheduling until it re-authenticates.
    #[error("credential rejected for this identity")]
    AuthInvalid,

    #[error("source API error: {0}")]
    Github(GithubError),

    #[error("store error: {0}")]
    Store(#[from] GorseError),
}

impl From<GithubError> for SyncError {
    fn from(err: GithubError) -> Self {
        match err {
            GithubError::AuthInvalid => SyncError::AuthInvalid,
            other => SyncError::Github(other),
        }
    }
}
