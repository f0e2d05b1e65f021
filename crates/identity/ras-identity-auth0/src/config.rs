//! Auth0 strategy configuration.

use crate::cookie::{CookieOptions, is_cookie_token};
use crate::error::{Auth0Error, Auth0Result};
use serde::{Deserialize, Serialize};
use url::Url;

/// Auth0 strategy configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Auth0Config {
    /// Tenant domain, e.g. `example.eu.auth0.com`. A value with an explicit
    /// `http://` or `https://` scheme is used as the base URL unchanged.
    pub domain: String,
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: String,
    /// Normalized scope list. Use [`Auth0Config::with_scopes`] or
    /// [`Auth0Config::with_scope_str`] to set it.
    pub scopes: Vec<String>,
    pub audience: Option<String>,
    pub organization: Option<String>,
    pub connection: Option<String>,
    /// Additional parameters to include in authorization request
    pub auth_params: Vec<(String, String)>,
    /// Whether to fetch `/userinfo` after the code exchange. Defaults to
    /// whether `openid` is among the scopes.
    pub fetch_profile: Option<bool>,
    pub cookie: CookieOptions,
    pub http_timeout_seconds: u64,
}

impl Auth0Config {
    pub fn new(
        domain: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        redirect_uri: impl Into<String>,
    ) -> Self {
        Self {
            domain: domain.into(),
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            redirect_uri: redirect_uri.into(),
            scopes: Vec::new(),
            audience: None,
            organization: None,
            connection: None,
            auth_params: Vec::new(),
            fetch_profile: None,
            cookie: CookieOptions::default(),
            http_timeout_seconds: 30,
        }
    }

    /// Read the configuration from `AUTH0_*` environment variables.
    pub fn from_env() -> Auth0Result<Self> {
        fn required(key: &str) -> Auth0Result<String> {
            std::env::var(key)
                .map_err(|_| Auth0Error::ConfigError(format!("{key} environment variable is required")))
        }

        let mut config = Self::new(
            required("AUTH0_DOMAIN")?,
            required("AUTH0_CLIENT_ID")?,
            required("AUTH0_CLIENT_SECRET")?,
            required("AUTH0_REDIRECT_URI")?,
        );

        if let Ok(scope) = std::env::var("AUTH0_SCOPE") {
            config = config.with_scope_str(&scope);
        }
        config.audience = std::env::var("AUTH0_AUDIENCE").ok();
        config.organization = std::env::var("AUTH0_ORGANIZATION").ok();
        config.connection = std::env::var("AUTH0_CONNECTION").ok();

        Ok(config)
    }

    pub fn with_scopes<I, S>(mut self, scopes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.scopes = normalize_scopes(scopes);
        self
    }

    /// Set scopes from a single space- or comma-separated string.
    pub fn with_scope_str(self, scope: &str) -> Self {
        self.with_scopes(scope.split([' ', ',']))
    }

    pub fn with_audience(mut self, audience: impl Into<String>) -> Self {
        self.audience = Some(audience.into());
        self
    }

    pub fn with_organization(mut self, organization: impl Into<String>) -> Self {
        self.organization = Some(organization.into());
        self
    }

    pub fn with_connection(mut self, connection: impl Into<String>) -> Self {
        self.connection = Some(connection.into());
        self
    }

    pub fn with_auth_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.auth_params.push((key.into(), value.into()));
        self
    }

    pub fn with_fetch_profile(mut self, fetch: bool) -> Self {
        self.fetch_profile = Some(fetch);
        self
    }

    pub fn with_cookie(mut self, cookie: CookieOptions) -> Self {
        self.cookie = cookie;
        self
    }

    pub fn with_http_timeout(mut self, seconds: u64) -> Self {
        self.http_timeout_seconds = seconds;
        self
    }

    pub fn validate(&self) -> Auth0Result<()> {
        for (name, value) in [
            ("domain", &self.domain),
            ("client_id", &self.client_id),
            ("client_secret", &self.client_secret),
            ("redirect_uri", &self.redirect_uri),
        ] {
            if value.trim().is_empty() {
                return Err(Auth0Error::ConfigError(format!("{name} must not be empty")));
            }
        }

        Url::parse(&self.redirect_uri)?;
        self.base_url()?;

        if !is_cookie_token(&self.cookie.name) {
            return Err(Auth0Error::ConfigError(format!(
                "cookie name {:?} is not a valid cookie token",
                self.cookie.name
            )));
        }

        Ok(())
    }

    pub fn should_fetch_profile(&self) -> bool {
        self.fetch_profile
            .unwrap_or_else(|| self.scopes.iter().any(|scope| scope == "openid"))
    }

    /// Base URL every endpoint is joined onto. Always ends in `/`, so a path
    /// on a scheme-qualified domain is kept.
    pub fn base_url(&self) -> Auth0Result<Url> {
        let domain = self.domain.trim();
        let mut base = if domain.starts_with("http://") || domain.starts_with("https://") {
            Url::parse(domain)?
        } else {
            Url::parse(&format!("https://{domain}"))?
        };

        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        Ok(base)
    }

    pub fn authorization_endpoint(&self) -> Auth0Result<Url> {
        Ok(self.base_url()?.join("authorize")?)
    }

    pub fn token_endpoint(&self) -> Auth0Result<Url> {
        Ok(self.base_url()?.join("oauth/token")?)
    }

    pub fn revocation_endpoint(&self) -> Auth0Result<Url> {
        Ok(self.base_url()?.join("oauth/revoke")?)
    }

    pub fn userinfo_endpoint(&self) -> Auth0Result<Url> {
        Ok(self.base_url()?.join("userinfo")?)
    }
}

/// Trim, drop empties and duplicates, keep first-seen order.
fn normalize_scopes<I, S>(scopes: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut normalized: Vec<String> = Vec::new();
    for scope in scopes {
        let scope = scope.as_ref().trim();
        if !scope.is_empty() && !normalized.iter().any(|s| s == scope) {
            normalized.push(scope.to_string());
        }
    }
    normalized
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> Auth0Config {
        Auth0Config::new(
            "test.fake.auth0.com",
            "CLIENT_ID",
            "CLIENT_SECRET",
            "https://example.app/callback",
        )
    }

    #[test]
    fn endpoints_derive_from_domain() {
        let config = config();
        assert_eq!(
            config.authorization_endpoint().unwrap().as_str(),
            "https://test.fake.auth0.com/authorize"
        );
        assert_eq!(
            config.token_endpoint().unwrap().as_str(),
            "https://test.fake.auth0.com/oauth/token"
        );
        assert_eq!(
            config.revocation_endpoint().unwrap().as_str(),
            "https://test.fake.auth0.com/oauth/revoke"
        );
        assert_eq!(
            config.userinfo_endpoint().unwrap().as_str(),
            "https://test.fake.auth0.com/userinfo"
        );
    }

    #[test]
    fn domain_with_scheme_is_kept() {
        let mut config = config();
        config.domain = "http://127.0.0.1:4000/".to_string();
        assert_eq!(
            config.token_endpoint().unwrap().as_str(),
            "http://127.0.0.1:4000/oauth/token"
        );
    }

    #[test]
    fn domain_path_is_kept() {
        for domain in ["https://proxy.example/tenant", "https://proxy.example/tenant/"] {
            let mut config = config();
            config.domain = domain.to_string();
            assert_eq!(
                config.authorization_endpoint().unwrap().as_str(),
                "https://proxy.example/tenant/authorize"
            );
            assert_eq!(
                config.token_endpoint().unwrap().as_str(),
                "https://proxy.example/tenant/oauth/token"
            );
            assert_eq!(
                config.userinfo_endpoint().unwrap().as_str(),
                "https://proxy.example/tenant/userinfo"
            );
        }
    }

    #[test]
    fn scopes_are_normalized_once() {
        let config = config().with_scope_str("openid  profile,email openid");
        assert_eq!(config.scopes, vec!["openid", "profile", "email"]);

        let config = config.with_scopes([" read:messages ", "", "write:messages"]);
        assert_eq!(config.scopes, vec!["read:messages", "write:messages"]);
    }

    #[test]
    fn no_default_scopes() {
        assert!(config().scopes.is_empty());
    }

    #[test]
    fn profile_fetch_follows_openid_scope() {
        assert!(!config().should_fetch_profile());
        assert!(config().with_scope_str("openid").should_fetch_profile());
        assert!(!config().with_scope_str("openidx profile").should_fetch_profile());
        assert!(
            !config()
                .with_scope_str("openid")
                .with_fetch_profile(false)
                .should_fetch_profile()
        );
    }

    #[test]
    fn validate_rejects_blank_fields() {
        assert!(config().validate().is_ok());

        let mut bad = config();
        bad.client_id = "  ".to_string();
        assert!(matches!(bad.validate(), Err(Auth0Error::ConfigError(_))));

        let mut bad = config();
        bad.redirect_uri = "not a url".to_string();
        assert!(matches!(bad.validate(), Err(Auth0Error::UrlError(_))));
    }

    #[test]
    fn validate_rejects_malformed_cookie_names() {
        for name in ["", "a;b", "a=b", "a b", "a\tb", "(auth0)", "auth\"0"] {
            let bad = config().with_cookie(CookieOptions::default().with_name(name));
            assert!(
                matches!(bad.validate(), Err(Auth0Error::ConfigError(_))),
                "{name:?} should be rejected"
            );
        }

        let good = config().with_cookie(CookieOptions::default().with_name("__Host-auth0_state"));
        assert!(good.validate().is_ok());
    }
}
