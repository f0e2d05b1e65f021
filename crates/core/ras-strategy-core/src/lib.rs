//! Core authentication strategy traits and types.
//!
//! A [`Strategy`] drives one identity-provider integration. Instead of
//! short-circuiting the request handler when the user must be sent elsewhere,
//! [`Strategy::authenticate`] reports an [`Outcome`]: either a [`Redirect`]
//! the hosting framework should send back to the browser, or the
//! authenticated user produced by the application's [`Verifier`].

use async_trait::async_trait;
use axum::http::header::{self, HeaderName};
use axum::http::request::Parts;
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use std::future::Future;
use thiserror::Error;

/// Boxed error returned by application-supplied verifiers.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Ready-made rejections for verifiers that don't need their own error type.
#[derive(Debug, Error)]
pub enum StrategyError {
    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("User not found")]
    UserNotFound,

    #[error("User not authorized: {0}")]
    Unauthorized(String),
}

pub type StrategyResult<T> = Result<T, StrategyError>;

/// Instruction to send the browser to another location.
#[derive(Debug, Clone)]
pub struct Redirect {
    location: String,
    headers: HeaderMap,
}

impl Redirect {
    pub fn to(location: impl Into<String>) -> Self {
        Self {
            location: location.into(),
            headers: HeaderMap::new(),
        }
    }

    /// Append a header to the redirect response. Repeated names are kept,
    /// so several `Set-Cookie` values can travel together.
    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.append(name, value);
        self
    }

    pub fn location(&self) -> &str {
        &self.location
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn set_cookies(&self) -> impl Iterator<Item = &HeaderValue> {
        self.headers.get_all(header::SET_COOKIE).iter()
    }
}

impl IntoResponse for Redirect {
    fn into_response(self) -> Response {
        let location = match HeaderValue::try_from(self.location) {
            Ok(location) => location,
            Err(_) => return StatusCode::INTERNAL_SERVER_ERROR.into_response(),
        };

        let mut response = StatusCode::FOUND.into_response();
        let headers = response.headers_mut();
        headers.insert(header::LOCATION, location);
        headers.extend(self.headers);
        response
    }
}

/// Result of a single `authenticate` call that did not fail.
#[derive(Debug)]
pub enum Outcome<U> {
    /// The flow continues elsewhere; hand this back to the browser.
    Redirect(Redirect),
    /// The flow finished and the verifier accepted the user.
    Authenticated(U),
}

impl<U> Outcome<U> {
    pub fn is_redirect(&self) -> bool {
        matches!(self, Outcome::Redirect(_))
    }

    pub fn redirect(&self) -> Option<&Redirect> {
        match self {
            Outcome::Redirect(redirect) => Some(redirect),
            Outcome::Authenticated(_) => None,
        }
    }

    pub fn into_user(self) -> Option<U> {
        match self {
            Outcome::Authenticated(user) => Some(user),
            Outcome::Redirect(_) => None,
        }
    }
}

/// A pluggable authentication unit for one identity provider.
#[async_trait]
pub trait Strategy: Send + Sync {
    type User: Send;
    type Error: std::error::Error + Send + Sync + 'static;

    fn name(&self) -> &str;

    async fn authenticate(&self, request: Parts) -> Result<Outcome<Self::User>, Self::Error>;
}

/// Application hook that turns provider data into an application user.
///
/// Any `Fn(O) -> impl Future<Output = Result<U, BoxError>>` closure is a
/// verifier, so most callers never implement this trait by hand.
#[async_trait]
pub trait Verifier<O: Send + 'static>: Send + Sync {
    type User: Send;

    async fn verify(&self, options: O) -> Result<Self::User, BoxError>;
}

#[async_trait]
impl<O, U, F, Fut> Verifier<O> for F
where
    O: Send + 'static,
    U: Send + 'static,
    F: Fn(O) -> Fut + Send + Sync,
    Fut: Future<Output = Result<U, BoxError>> + Send + 'static,
{
    type User = U;

    async fn verify(&self, options: O) -> Result<U, BoxError> {
        (self)(options).await
    }
}
