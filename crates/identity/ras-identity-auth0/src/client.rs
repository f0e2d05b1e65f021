//! Auth0 OAuth2 client with PKCE support.

use crate::config::Auth0Config;
use crate::error::{Auth0Error, Auth0Result};
use crate::types::{AuthorizationParams, AuthorizationRequest, Tokens, UserInfo};
use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use chrono::Utc;
use rand::{Rng, thread_rng};
use reqwest::Client;
use sha2::{Digest, Sha256};
use std::time::Duration;
use tracing::{debug, error, info};
use url::Url;

/// Query parameters owned by the base authorization request. Extra
/// parameters with these names are ignored.
const RESERVED_PARAMS: [&str; 7] = [
    "response_type",
    "client_id",
    "redirect_uri",
    "scope",
    "state",
    "code_challenge",
    "code_challenge_method",
];

/// PKCE code challenge and verifier
#[derive(Debug, Clone)]
pub struct PkceChallenge {
    pub code_verifier: String,
    pub code_challenge: String,
    pub code_challenge_method: String,
}

impl Default for PkceChallenge {
    fn default() -> Self {
        Self::new()
    }
}

impl PkceChallenge {
    /// Generate a new PKCE challenge
    pub fn new() -> Self {
        let code_verifier = random_token(64);
        let code_challenge = Self::generate_code_challenge(&code_verifier);

        Self {
            code_verifier,
            code_challenge,
            code_challenge_method: "S256".to_string(),
        }
    }

    pub fn generate_code_challenge(verifier: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(verifier.as_bytes());
        URL_SAFE_NO_PAD.encode(hasher.finalize())
    }
}

/// Random URL-safe token built from `len` random bytes.
pub fn random_token(len: usize) -> String {
    let mut rng = thread_rng();
    let bytes: Vec<u8> = (0..len).map(|_| rng.r#gen::<u8>()).collect();
    URL_SAFE_NO_PAD.encode(bytes)
}

/// OAuth2 client bound to one Auth0 application
#[derive(Clone)]
pub struct Auth0Client {
    http_client: Client,
    client_id: String,
    client_secret: String,
    redirect_uri: String,
    scopes: Vec<String>,
    authorization_endpoint: Url,
    token_endpoint: Url,
    revocation_endpoint: Url,
    userinfo_endpoint: Url,
}

impl Auth0Client {
    pub fn new(config: &Auth0Config) -> Auth0Result<Self> {
        let http_client = Client::builder()
            .timeout(Duration::from_secs(config.http_timeout_seconds))
            .build()?;

        Ok(Self {
            http_client,
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
            redirect_uri: config.redirect_uri.clone(),
            scopes: config.scopes.clone(),
            authorization_endpoint: config.authorization_endpoint()?,
            token_endpoint: config.token_endpoint()?,
            revocation_endpoint: config.revocation_endpoint()?,
            userinfo_endpoint: config.userinfo_endpoint()?,
        })
    }

    /// The standard parameters for one login attempt.
    pub fn base_authorization_params(
        &self,
        state: &str,
        pkce: &PkceChallenge,
    ) -> AuthorizationParams {
        let mut params = AuthorizationParams::new();
        params.set("response_type", "code");
        params.set("client_id", &self.client_id);
        params.set("redirect_uri", &self.redirect_uri);
        if !self.scopes.is_empty() {
            params.set("scope", self.scopes.join(" "));
        }
        params.set("code_challenge", &pkce.code_challenge);
        params.set("code_challenge_method", &pkce.code_challenge_method);
        params.set("state", state);
        params
    }

    /// Start a login: fresh state and PKCE pair, plus the `/authorize` URL.
    ///
    /// `augment` receives the base parameters and may add provider-specific
    /// ones; it cannot change the reserved ones.
    pub fn create_authorization_url<F>(&self, augment: F) -> AuthorizationRequest
    where
        F: FnOnce(AuthorizationParams) -> AuthorizationParams,
    {
        let state = random_token(32);
        let pkce = PkceChallenge::new();

        let base = self.base_authorization_params(&state, &pkce);
        let augmented = augment(base.clone());

        let mut url = self.authorization_endpoint.clone();
        {
            let mut query = url.query_pairs_mut();
            for (key, value) in base.iter() {
                query.append_pair(key, value);
            }
            for (key, value) in augmented.iter() {
                if !RESERVED_PARAMS.contains(&key) {
                    query.append_pair(key, value);
                }
            }
        }

        debug!("Generated Auth0 authorization URL");

        AuthorizationRequest {
            state,
            code_verifier: pkce.code_verifier,
            code_challenge: pkce.code_challenge,
            url,
        }
    }

    /// Exchange authorization code for tokens
    pub async fn validate_authorization_code(
        &self,
        code: &str,
        code_verifier: &str,
    ) -> Auth0Result<Tokens> {
        let params = [
            ("grant_type", "authorization_code"),
            ("code", code),
            ("code_verifier", code_verifier),
            ("redirect_uri", self.redirect_uri.as_str()),
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
        ];

        let tokens = self.request_tokens(&params).await?;
        info!("Successfully exchanged code for tokens");
        Ok(tokens)
    }

    pub async fn refresh_token(&self, refresh_token: &str) -> Auth0Result<Tokens> {
        let params = [
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
        ];

        let tokens = self.request_tokens(&params).await?;
        info!("Successfully refreshed tokens");
        Ok(tokens)
    }

    pub async fn revoke_token(&self, token: &str) -> Auth0Result<()> {
        let params = [
            ("token", token),
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
        ];

        let response = self
            .http_client
            .post(self.revocation_endpoint.clone())
            .form(&params)
            .send()
            .await?;

        if !response.status().is_success() {
            let error_text = response.text().await.unwrap_or_default();
            error!("Token revocation failed: {}", error_text);
            return Err(Auth0Error::TokenRevocationFailed(error_text));
        }

        info!("Revoked token");
        Ok(())
    }

    /// Get user info using access token
    pub async fn user_info(&self, access_token: &str) -> Auth0Result<UserInfo> {
        let response = self
            .http_client
            .get(self.userinfo_endpoint.clone())
            .bearer_auth(access_token)
            .send()
            .await?;

        if !response.status().is_success() {
            let error_text = response.text().await.unwrap_or_default();
            error!("User info request failed: {}", error_text);
            return Err(Auth0Error::UserInfoFailed(error_text));
        }

        let user_info: UserInfo = response
            .json()
            .await
            .map_err(|e| Auth0Error::InvalidUserInfoResponse(e.to_string()))?;

        debug!(subject = ?user_info.sub, "Retrieved Auth0 user info");
        Ok(user_info)
    }

    async fn request_tokens(&self, params: &[(&str, &str)]) -> Auth0Result<Tokens> {
        let response = self
            .http_client
            .post(self.token_endpoint.clone())
            .form(params)
            .send()
            .await?;

        if !response.status().is_success() {
            let error_text = response.text().await.unwrap_or_default();
            error!("Token request failed: {}", error_text);
            return Err(Auth0Error::TokenExchangeFailed(error_text));
        }

        let mut tokens: Tokens = response
            .json()
            .await
            .map_err(|e| Auth0Error::InvalidTokenResponse(e.to_string()))?;
        tokens.received_at = Utc::now();

        Ok(tokens)
    }
}
