//! The Auth0 strategy: the two-phase login state machine.

use crate::callback::{CallbackParams, validate_callback};
use crate::client::Auth0Client;
use crate::config::Auth0Config;
use crate::error::{Auth0Error, Auth0Result};
use crate::profile::{Auth0Profile, PROVIDER_NAME};
use crate::state::{MAX_PENDING_FLOWS, StateStore};
use crate::types::{AuthorizationParams, AuthorizationRequest, Tokens};
use async_trait::async_trait;
use axum::http::HeaderValue;
use axum::http::header;
use axum::http::request::Parts;
use ras_strategy_core::{Outcome, Redirect, Strategy, Verifier};
use tracing::{debug, info, warn};
use url::form_urlencoded;

/// Query parameters copied from the login request to `/authorize`.
const FORWARDED_PARAMS: [&str; 2] = ["organization", "invitation"];

/// What the verifier gets to decide who the user is.
#[derive(Debug)]
pub struct VerifyOptions {
    /// The callback request.
    pub request: Parts,
    pub tokens: Tokens,
    /// Present when profile fetching is enabled, see
    /// [`Auth0Config::should_fetch_profile`].
    pub profile: Option<Auth0Profile>,
}

pub struct Auth0Strategy<V> {
    config: Auth0Config,
    client: Auth0Client,
    verifier: V,
}

impl<V> Auth0Strategy<V>
where
    V: Verifier<VerifyOptions>,
{
    pub fn new(config: Auth0Config, verifier: V) -> Auth0Result<Self> {
        config.validate()?;
        let client = Auth0Client::new(&config)?;

        Ok(Self {
            config,
            client,
            verifier,
        })
    }

    pub fn config(&self) -> &Auth0Config {
        &self.config
    }

    pub fn client(&self) -> &Auth0Client {
        &self.client
    }

    /// Add the Auth0 specific parameters to the base authorization
    /// parameters. Configured values come first; `organization` and
    /// `invitation` on the login request override them.
    pub fn authorization_params(
        &self,
        mut params: AuthorizationParams,
        request: &Parts,
    ) -> AuthorizationParams {
        if let Some(audience) = &self.config.audience {
            params.set("audience", audience);
        }
        if let Some(organization) = &self.config.organization {
            params.set("organization", organization);
        }
        if let Some(connection) = &self.config.connection {
            params.set("connection", connection);
        }
        for (key, value) in &self.config.auth_params {
            params.set(key, value);
        }

        let query = request.uri.query().unwrap_or_default();
        for name in FORWARDED_PARAMS {
            if let Some(value) = query_value(query, name) {
                params.set(name, value);
            }
        }

        params
    }

    pub fn create_authorization_url(&self, request: &Parts) -> AuthorizationRequest {
        self.client
            .create_authorization_url(|params| self.authorization_params(params, request))
    }

    /// Run one step of the login flow for `request`.
    ///
    /// Without a `state` query parameter this starts a login and returns
    /// [`Outcome::Redirect`] to Auth0, with a `Set-Cookie` header that adds
    /// the new pending flow to the ones already in the request's cookie.
    /// With a `state` it treats the request as the callback: the state must
    /// be pending, the code is exchanged for tokens and the verifier decides
    /// the user.
    pub async fn authenticate(&self, request: Parts) -> Auth0Result<Outcome<V::User>> {
        let params = CallbackParams::from_request(&request);
        let cookie = &self.config.cookie;

        if params.state.is_none() {
            let authorization = self.create_authorization_url(&request);

            let mut store = StateStore::from_request(&request, &cookie.name);
            store.set(
                authorization.state.clone(),
                authorization.code_verifier.clone(),
            );
            let dropped = store.retain_newest(MAX_PENDING_FLOWS);
            if dropped > 0 {
                debug!(dropped, "Dropped oldest pending Auth0 flows");
            }
            let set_cookie = store.to_set_cookie(cookie)?;

            info!(
                pending_flows = store.len(),
                "Redirecting to Auth0 for authorization"
            );

            let redirect = Redirect::to(authorization.url.to_string())
                .with_header(header::SET_COOKIE, set_cookie);
            return Ok(Outcome::Redirect(redirect));
        }

        let store = StateStore::from_request(&request, &cookie.name);
        debug!(pending_flows = store.len(), "Handling Auth0 callback");

        let callback = validate_callback(params, &store)
            .inspect_err(|e| warn!(error = %e, "Rejected Auth0 callback"))?;

        let tokens = self
            .client
            .validate_authorization_code(&callback.code, &callback.code_verifier)
            .await?;

        let profile = if self.config.should_fetch_profile() {
            Some(self.user_profile(&tokens).await?)
        } else {
            None
        };

        let user = self
            .verifier
            .verify(VerifyOptions {
                request,
                tokens,
                profile,
            })
            .await
            .map_err(Auth0Error::Verification)?;

        info!("Auth0 authentication succeeded");
        Ok(Outcome::Authenticated(user))
    }

    pub async fn refresh_token(&self, refresh_token: &str) -> Auth0Result<Tokens> {
        self.client.refresh_token(refresh_token).await
    }

    pub async fn revoke_token(&self, token: &str) -> Auth0Result<()> {
        self.client.revoke_token(token).await
    }

    pub async fn user_profile(&self, tokens: &Tokens) -> Auth0Result<Auth0Profile> {
        let user_info = self.client.user_info(&tokens.access_token).await?;
        Ok(Auth0Profile::from(user_info))
    }

    /// Drop the callback's state from the cookie after a successful login.
    ///
    /// Returns the `Set-Cookie` header to send: the remaining pending flows,
    /// or an expired cookie when none are left. `None` when the request has
    /// no known state.
    pub fn consume_state(&self, request: &Parts) -> Auth0Result<Option<HeaderValue>> {
        let Some(state) = CallbackParams::from_request(request).state else {
            return Ok(None);
        };

        let cookie = &self.config.cookie;
        let mut store = StateStore::from_request(request, &cookie.name);
        if store.remove(&state).is_none() {
            return Ok(None);
        }

        let header = if store.is_empty() {
            StateStore::to_clear_cookie(cookie)?
        } else {
            store.to_set_cookie(cookie)?
        };
        Ok(Some(header))
    }
}

#[async_trait]
impl<V> Strategy for Auth0Strategy<V>
where
    V: Verifier<VerifyOptions>,
{
    type User = V::User;
    type Error = Auth0Error;

    fn name(&self) -> &str {
        PROVIDER_NAME
    }

    async fn authenticate(&self, request: Parts) -> Auth0Result<Outcome<V::User>> {
        Auth0Strategy::authenticate(self, request).await
    }
}

/// First non-empty value of `name` in a query string.
fn query_value(query: &str, name: &str) -> Option<String> {
    form_urlencoded::parse(query.as_bytes())
        .find(|(key, _)| key == name)
        .map(|(_, value)| value.into_owned())
        .filter(|value| !value.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;
    use ras_strategy_core::BoxError;
    use std::collections::HashMap;

    type TestVerifier = fn(VerifyOptions) -> std::future::Ready<Result<String, BoxError>>;

    fn reject(_: VerifyOptions) -> std::future::Ready<Result<String, BoxError>> {
        std::future::ready(Err("verifier must not run".into()))
    }

    fn strategy(config: Auth0Config) -> Auth0Strategy<TestVerifier> {
        Auth0Strategy::new(config, reject as TestVerifier).unwrap()
    }

    fn config() -> Auth0Config {
        Auth0Config::new(
            "test.fake.auth0.com",
            "CLIENT_ID",
            "CLIENT_SECRET",
            "https://example.app/callback",
        )
    }

    fn parts(uri: &str) -> Parts {
        Request::builder().uri(uri).body(()).unwrap().into_parts().0
    }

    fn query(request: &AuthorizationRequest) -> HashMap<String, String> {
        request.url.query_pairs().into_owned().collect()
    }

    #[test]
    fn strategy_name() {
        assert_eq!(Strategy::name(&strategy(config())), "auth0");
    }

    #[test]
    fn forwards_organization_and_invitation() {
        let strategy = strategy(config());

        let request = strategy.create_authorization_url(&parts(
            "https://example.app/auth/auth0?organization=ORG&invitation=INV&other=1",
        ));
        let params = query(&request);
        assert_eq!(params.get("organization").map(String::as_str), Some("ORG"));
        assert_eq!(params.get("invitation").map(String::as_str), Some("INV"));
        assert!(!params.contains_key("other"));

        let request =
            strategy.create_authorization_url(&parts("https://example.app/auth/auth0?invitation=INV"));
        let params = query(&request);
        assert!(!params.contains_key("organization"));
        assert_eq!(params.get("invitation").map(String::as_str), Some("INV"));

        let request = strategy.create_authorization_url(&parts("https://example.app/auth/auth0"));
        let params = query(&request);
        assert!(!params.contains_key("organization"));
        assert!(!params.contains_key("invitation"));
    }

    #[test]
    fn configured_params_are_added() {
        let strategy = strategy(
            config()
                .with_scope_str("custom")
                .with_audience("SOME_AUDIENCE")
                .with_organization("SOME_ORG")
                .with_connection("email")
                .with_auth_param("prompt", "login"),
        );

        let params = query(&strategy.create_authorization_url(&parts("/auth/auth0")));
        assert_eq!(params["scope"], "custom");
        assert_eq!(params["audience"], "SOME_AUDIENCE");
        assert_eq!(params["organization"], "SOME_ORG");
        assert_eq!(params["connection"], "email");
        assert_eq!(params["prompt"], "login");
    }

    #[test]
    fn request_organization_overrides_configured_one() {
        let strategy = strategy(config().with_organization("SOME_ORG"));
        let request = strategy.create_authorization_url(&parts("/auth/auth0?organization=OTHER"));

        let organizations: Vec<_> = request
            .url
            .query_pairs()
            .filter(|(key, _)| key == "organization")
            .map(|(_, value)| value.into_owned())
            .collect();
        assert_eq!(organizations, vec!["OTHER"]);
    }

    #[test]
    fn scope_matches_configuration_exactly() {
        let params = query(&strategy(config()).create_authorization_url(&parts("/login")));
        assert!(!params.contains_key("scope"));

        let params = query(
            &strategy(config().with_scopes(["openid", "profile", "read:messages"]))
                .create_authorization_url(&parts("/login")),
        );
        assert_eq!(params["scope"], "openid profile read:messages");
    }

    #[test]
    fn empty_forwarded_values_are_ignored() {
        let params = query(
            &strategy(config()).create_authorization_url(&parts("/login?organization=&invitation=")),
        );
        assert!(!params.contains_key("organization"));
        assert!(!params.contains_key("invitation"));
    }

    #[test]
    fn invalid_config_is_rejected() {
        let mut bad = config();
        bad.domain = String::new();
        assert!(Auth0Strategy::new(bad, reject as TestVerifier).is_err());
    }

    #[test]
    fn consume_state_rewrites_or_clears_cookie() {
        let strategy = strategy(config());

        let request = Request::builder()
            .uri("/callback?state=s1&code=c")
            .header(header::COOKIE, "auth0=s1=v1&s2=v2")
            .body(())
            .unwrap()
            .into_parts()
            .0;
        let header = strategy.consume_state(&request).unwrap().unwrap();
        assert!(header.to_str().unwrap().starts_with("auth0=s2=v2; "));

        let request = Request::builder()
            .uri("/callback?state=s1&code=c")
            .header(header::COOKIE, "auth0=s1=v1")
            .body(())
            .unwrap()
            .into_parts()
            .0;
        let header = strategy.consume_state(&request).unwrap().unwrap();
        assert!(header.to_str().unwrap().contains("Max-Age=0"));

        let request = parts("/callback?state=unknown&code=c");
        assert!(strategy.consume_state(&request).unwrap().is_none());
        assert!(strategy.consume_state(&parts("/login")).unwrap().is_none());
    }
}
