//! Identity provider error types.

use thiserror::Error;

/// Errors talking to the identity provider.
#[derive(Debug, Error)]
pub enum IdentityError {
    /// HTTP transport failed.
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The provider rejected the request.
    #[error("provider returned {status}: {body}")]
    Rejected {
        /// HTTP status returned by the provider.
        status: reqwest::StatusCode,
        /// Response body, for logging.
        body: String,
    },

    /// The provider's session had no usable user id.
    #[error("provider session has no user")]
    MissingUser,
}
