//! Cookie-backed store of pending authorization flows.
//!
//! Every login attempt that has been redirected to Auth0 but has not come back
//! yet is one entry mapping its CSRF `state` to its PKCE code verifier. The
//! whole set travels in a single cookie as a URL-encoded `state=verifier`
//! list, so several tabs can have a login in flight at the same time without
//! any server-side storage.

use crate::cookie::{CookieOptions, cookie_value};
use crate::error::Auth0Result;
use axum::http::HeaderValue;
use axum::http::request::Parts;
use std::fmt;
use url::form_urlencoded;

/// Most pending flows kept in the cookie. Older ones are dropped first so the
/// header stays well under the 4 KB browser limit.
pub const MAX_PENDING_FLOWS: usize = 10;

/// One in-flight login attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingFlow {
    pub state: String,
    pub code_verifier: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StateStore {
    entries: Vec<PendingFlow>,
}

impl StateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a cookie value. Never fails: anything unreadable is skipped and
    /// a repeated state keeps its last verifier.
    pub fn parse(value: &str) -> Self {
        let mut store = Self::new();
        for (state, code_verifier) in form_urlencoded::parse(value.as_bytes()) {
            if state.is_empty() {
                continue;
            }
            store.set(state.into_owned(), code_verifier.into_owned());
        }
        store
    }

    /// Rebuild the store from the named cookie of an incoming request.
    pub fn from_request(request: &Parts, cookie_name: &str) -> Self {
        cookie_value(&request.headers, cookie_name)
            .map(|value| Self::parse(&value))
            .unwrap_or_default()
    }

    /// Insert a flow, replacing the verifier in place if the state exists.
    pub fn set(&mut self, state: impl Into<String>, code_verifier: impl Into<String>) {
        let state = state.into();
        let code_verifier = code_verifier.into();
        match self.entries.iter_mut().find(|entry| entry.state == state) {
            Some(entry) => entry.code_verifier = code_verifier,
            None => self.entries.push(PendingFlow {
                state,
                code_verifier,
            }),
        }
    }

    /// With no state, whether any flow is pending; otherwise whether that
    /// exact state is.
    pub fn has(&self, state: Option<&str>) -> bool {
        match state {
            None => !self.entries.is_empty(),
            Some(state) => self.entries.iter().any(|entry| entry.state == state),
        }
    }

    pub fn get(&self, state: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|entry| entry.state == state)
            .map(|entry| entry.code_verifier.as_str())
    }

    pub fn remove(&mut self, state: &str) -> Option<String> {
        let index = self.entries.iter().position(|entry| entry.state == state)?;
        Some(self.entries.remove(index).code_verifier)
    }

    /// Union with another store; entries from `other` win on conflicts.
    pub fn merge(&mut self, other: StateStore) {
        for entry in other.entries {
            self.set(entry.state, entry.code_verifier);
        }
    }

    /// Keep only the `max` most recently added flows. Returns how many were
    /// dropped.
    pub fn retain_newest(&mut self, max: usize) -> usize {
        let excess = self.entries.len().saturating_sub(max);
        self.entries.drain(..excess);
        excess
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &PendingFlow> {
        self.entries.iter()
    }

    pub fn to_cookie_value(&self) -> String {
        let mut serializer = form_urlencoded::Serializer::new(String::new());
        for entry in &self.entries {
            serializer.append_pair(&entry.state, &entry.code_verifier);
        }
        serializer.finish()
    }

    pub fn to_set_cookie(&self, options: &CookieOptions) -> Auth0Result<HeaderValue> {
        Ok(HeaderValue::try_from(options.set_cookie(&self.to_cookie_value()))?)
    }

    pub fn to_clear_cookie(options: &CookieOptions) -> Auth0Result<HeaderValue> {
        Ok(HeaderValue::try_from(options.clear_cookie())?)
    }
}

impl fmt::Display for StateStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_cookie_value())
    }
}
