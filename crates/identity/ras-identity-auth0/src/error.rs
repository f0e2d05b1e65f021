//! Auth0 strategy error types.

use ras_strategy_core::BoxError;
use thiserror::Error;

pub type Auth0Result<T> = Result<T, Auth0Error>;

#[derive(Debug, Error)]
pub enum Auth0Error {
    #[error("Missing state on cookie")]
    MissingState,

    #[error("State in URL doesn't match state in cookie")]
    StateMismatch,

    #[error("Provider error: {error}")]
    Provider {
        error: String,
        error_description: Option<String>,
        error_uri: Option<String>,
        state: String,
    },

    #[error("Missing authorization code")]
    MissingCode,

    #[error("Missing code verifier")]
    MissingVerifier,

    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("Token exchange failed: {0}")]
    TokenExchangeFailed(String),

    #[error("Invalid token response: {0}")]
    InvalidTokenResponse(String),

    #[error("Token revocation failed: {0}")]
    TokenRevocationFailed(String),

    #[error("User info request failed: {0}")]
    UserInfoFailed(String),

    #[error("Invalid user info response: {0}")]
    InvalidUserInfoResponse(String),

    #[error("Invalid configuration: {0}")]
    ConfigError(String),

    #[error("URL parsing error: {0}")]
    UrlError(#[from] url::ParseError),

    #[error("Invalid header value: {0}")]
    InvalidHeader(#[from] axum::http::header::InvalidHeaderValue),

    #[error(transparent)]
    Verification(BoxError),
}

impl Auth0Error {
    /// Errors caused by the state cookie rather than the provider. The user
    /// has to start a fresh login when one of these occurs.
    pub fn is_state_error(&self) -> bool {
        matches!(
            self,
            Auth0Error::MissingState | Auth0Error::StateMismatch | Auth0Error::MissingVerifier
        )
    }

    /// Provider-reported error code, if this is a provider error.
    pub fn provider_error(&self) -> Option<&str> {
        match self {
            Auth0Error::Provider { error, .. } => Some(error),
            _ => None,
        }
    }
}
