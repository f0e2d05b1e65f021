//! Callback request parsing and validation.

use crate::error::{Auth0Error, Auth0Result};
use crate::state::StateStore;
use axum::http::request::Parts;
use url::form_urlencoded;

/// Query parameters Auth0 sends back to the redirect URI.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallbackParams {
    pub state: Option<String>,
    pub code: Option<String>,
    pub error: Option<String>,
    pub error_description: Option<String>,
    pub error_uri: Option<String>,
}

impl CallbackParams {
    pub fn from_request(request: &Parts) -> Self {
        Self::from_query(request.uri.query().unwrap_or_default())
    }

    /// First occurrence of each parameter wins.
    pub fn from_query(query: &str) -> Self {
        let mut params = Self::default();
        for (key, value) in form_urlencoded::parse(query.as_bytes()) {
            let slot = match key.as_ref() {
                "state" => &mut params.state,
                "code" => &mut params.code,
                "error" => &mut params.error,
                "error_description" => &mut params.error_description,
                "error_uri" => &mut params.error_uri,
                _ => continue,
            };
            if slot.is_none() {
                *slot = Some(value.into_owned());
            }
        }
        params
    }
}

/// A callback that passed every check and is ready for the code exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedCallback {
    pub state: String,
    pub code: String,
    pub code_verifier: String,
}

/// Check a callback against the pending flows, in this order: store not
/// empty, state known, no provider error, code present, verifier present.
pub fn validate_callback(
    params: CallbackParams,
    store: &StateStore,
) -> Auth0Result<ValidatedCallback> {
    let state = params.state.ok_or(Auth0Error::MissingState)?;

    if !store.has(None) {
        return Err(Auth0Error::MissingState);
    }

    if !store.has(Some(&state)) {
        return Err(Auth0Error::StateMismatch);
    }

    if let Some(error) = params.error {
        return Err(Auth0Error::Provider {
            error,
            error_description: params.error_description,
            error_uri: params.error_uri,
            state,
        });
    }

    let code = params
        .code
        .filter(|code| !code.is_empty())
        .ok_or(Auth0Error::MissingCode)?;

    let code_verifier = store
        .get(&state)
        .map(str::to_string)
        .ok_or(Auth0Error::MissingVerifier)?;

    Ok(ValidatedCallback {
        state,
        code,
        code_verifier,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::assert_err;

    fn store(pairs: &[(&str, &str)]) -> StateStore {
        let mut store = StateStore::new();
        for (state, verifier) in pairs {
            store.set(*state, *verifier);
        }
        store
    }

    #[test]
    fn parses_callback_query() {
        let params = CallbackParams::from_query(
            "state=abc&code=xyz&error=access_denied&error_description=User%20denied&error_uri=https%3A%2F%2Fdocs&x=1",
        );
        assert_eq!(params.state.as_deref(), Some("abc"));
        assert_eq!(params.code.as_deref(), Some("xyz"));
        assert_eq!(params.error.as_deref(), Some("access_denied"));
        assert_eq!(params.error_description.as_deref(), Some("User denied"));
        assert_eq!(params.error_uri.as_deref(), Some("https://docs"));
    }

    #[test]
    fn first_occurrence_wins() {
        let params = CallbackParams::from_query("state=first&state=second");
        assert_eq!(params.state.as_deref(), Some("first"));
    }

    #[test]
    fn valid_callback_yields_code_and_verifier() {
        let params = CallbackParams::from_query("state=s1&code=c1");
        let validated = validate_callback(params, &store(&[("s1", "v1"), ("s2", "v2")])).unwrap();
        assert_eq!(
            validated,
            ValidatedCallback {
                state: "s1".into(),
                code: "c1".into(),
                code_verifier: "v1".into(),
            }
        );
    }

    #[test]
    fn empty_store_is_missing_state() {
        let params = CallbackParams::from_query("state=s1&code=c1");
        let result = validate_callback(params, &StateStore::new());
        assert!(matches!(assert_err!(result), Auth0Error::MissingState));
    }

    #[test]
    fn unknown_state_is_mismatch_regardless_of_other_entries() {
        for count in [1usize, 2, 10] {
            let mut other = StateStore::new();
            for i in 0..count {
                other.set(format!("state-{i}"), format!("verifier-{i}"));
            }
            let params = CallbackParams::from_query("state=unknown&code=c1");
            assert!(matches!(
                validate_callback(params, &other),
                Err(Auth0Error::StateMismatch)
            ));
        }
    }

    #[test]
    fn provider_error_is_reported_after_state_checks() {
        let params = CallbackParams::from_query(
            "state=s1&error=access_denied&error_description=denied&error_uri=https%3A%2F%2Fe",
        );
        match validate_callback(params, &store(&[("s1", "v1")])) {
            Err(Auth0Error::Provider {
                error,
                error_description,
                error_uri,
                state,
            }) => {
                assert_eq!(error, "access_denied");
                assert_eq!(error_description.as_deref(), Some("denied"));
                assert_eq!(error_uri.as_deref(), Some("https://e"));
                assert_eq!(state, "s1");
            }
            other => panic!("expected provider error, got {other:?}"),
        }

        // An unknown state is rejected before the provider error is looked at
        let params = CallbackParams::from_query("state=nope&error=access_denied");
        assert!(matches!(
            validate_callback(params, &store(&[("s1", "v1")])),
            Err(Auth0Error::StateMismatch)
        ));
    }

    #[test]
    fn missing_or_empty_code() {
        let params = CallbackParams::from_query("state=s1");
        assert!(matches!(
            validate_callback(params, &store(&[("s1", "v1")])),
            Err(Auth0Error::MissingCode)
        ));

        let params = CallbackParams::from_query("state=s1&code=");
        assert!(matches!(
            validate_callback(params, &store(&[("s1", "v1")])),
            Err(Auth0Error::MissingCode)
        ));
    }
}
