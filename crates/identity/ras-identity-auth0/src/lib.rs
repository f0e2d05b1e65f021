//! Auth0 authentication strategy with PKCE support.
//!
//! This crate implements the Authorization Code flow with PKCE against an
//! Auth0 tenant as a [`ras_strategy_core::Strategy`]. Pending logins are kept
//! in a client-side cookie mapping each CSRF state to its code verifier, so
//! the server holds no per-login state.

mod callback;
mod client;
mod config;
mod cookie;
mod error;
mod profile;
mod state;
mod strategy;
mod types;


pub use callback::{CallbackParams, ValidatedCallback, validate_callback};
pub use client::{Auth0Client, PkceChallenge, random_token};
pub use config::Auth0Config;
pub use cookie::{
    CookieOptions, DEFAULT_COOKIE_MAX_AGE_SECONDS, DEFAULT_COOKIE_NAME, SameSite, cookie_value,
    is_cookie_token,
};
pub use error::{Auth0Error, Auth0Result};
pub use profile::{Auth0Profile, PROVIDER_NAME, ProfileName};
pub use state::{MAX_PENDING_FLOWS, PendingFlow, StateStore};
pub use strategy::{Auth0Strategy, VerifyOptions};
pub use types::{Address, AuthorizationParams, AuthorizationRequest, Tokens, UserInfo};

// Re-export common types for convenience
pub use ras_strategy_core::{BoxError, Outcome, Redirect, Strategy, Verifier};
