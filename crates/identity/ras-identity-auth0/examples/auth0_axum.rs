//! Example showing how to wire the Auth0 strategy into an axum server
//!
//! This example demonstrates:
//! 1. Loading the Auth0 configuration from the environment (`.env` supported)
//! 2. Sending `/login` and `/callback` through the same `authenticate` call
//! 3. Turning the strategy outcome into HTTP responses
//! 4. Refreshing and revoking tokens outside the login flow
//!
//! Required variables: `AUTH0_DOMAIN`, `AUTH0_CLIENT_ID`,
//! `AUTH0_CLIENT_SECRET`, `AUTH0_REDIRECT_URI` (pointing at `/callback`).

use anyhow::{Context, Result};
use async_trait::async_trait;
use axum::extract::State;
use axum::http::request::Parts;
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use ras_identity_auth0::{
    Auth0Config, Auth0Strategy, BoxError, Outcome, Verifier, VerifyOptions,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info};

#[derive(Debug, Serialize)]
struct AppUser {
    subject: String,
    email: Option<String>,
    has_refresh_token: bool,
}

/// Accepts any user Auth0 vouches for.
struct AppVerifier;

#[async_trait]
impl Verifier<VerifyOptions> for AppVerifier {
    type User = AppUser;

    async fn verify(&self, options: VerifyOptions) -> Result<AppUser, BoxError> {
        let profile = options.profile.ok_or("openid scope is required")?;
        let subject = profile.id.ok_or("userinfo response without subject")?;

        Ok(AppUser {
            subject,
            email: profile.emails.into_iter().next(),
            has_refresh_token: options.tokens.refresh_token.is_some(),
        })
    }
}

#[derive(Clone)]
struct AppState {
    strategy: Arc<Auth0Strategy<AppVerifier>>,
}

#[derive(Debug, Deserialize)]
struct TokenRequest {
    token: String,
}

async fn auth_handler(State(state): State<AppState>, parts: Parts) -> Response {
    let consumed = state.strategy.consume_state(&parts);

    match state.strategy.authenticate(parts).await {
        Ok(Outcome::Redirect(redirect)) => redirect.into_response(),
        Ok(Outcome::Authenticated(user)) => {
            info!("Logged in {}", user.subject);
            let mut response = Json(user).into_response();
            if let Ok(Some(cookie)) = consumed {
                response.headers_mut().append(header::SET_COOKIE, cookie);
            }
            response
        }
        Err(e) if e.is_state_error() => {
            (StatusCode::BAD_REQUEST, "Login expired, please start again").into_response()
        }
        Err(e) => {
            error!("Authentication failed: {}", e);
            (StatusCode::UNAUTHORIZED, e.to_string()).into_response()
        }
    }
}

async fn refresh_handler(
    State(state): State<AppState>,
    Json(request): Json<TokenRequest>,
) -> Response {
    match state.strategy.refresh_token(&request.token).await {
        Ok(tokens) => Json(tokens).into_response(),
        Err(e) => (StatusCode::BAD_GATEWAY, e.to_string()).into_response(),
    }
}

async fn revoke_handler(
    State(state): State<AppState>,
    Json(request): Json<TokenRequest>,
) -> Response {
    match state.strategy.revoke_token(&request.token).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => (StatusCode::BAD_GATEWAY, e.to_string()).into_response(),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let config = Auth0Config::from_env()
        .context("Failed to load Auth0 configuration")?
        .with_scope_str("openid profile email offline_access");

    let strategy =
        Auth0Strategy::new(config, AppVerifier).context("Failed to create Auth0 strategy")?;
    let state = AppState {
        strategy: Arc::new(strategy),
    };

    let app = Router::new()
        .route("/login", get(auth_handler))
        .route("/callback", get(auth_handler))
        .route("/refresh", post(refresh_handler))
        .route("/revoke", post(revoke_handler))
        .with_state(state);

    let listener = tokio::net::TcpListener::bind("0.0.0.0:3000")
        .await
        .context("Failed to bind to port 3000")?;
    info!("Listening on http://localhost:3000, open /login to sign in");
    axum::serve(listener, app).await?;

    Ok(())
}
