//! Rotatable long-lived credential shared by every request.
//!
//! The provider requires a cookie-equivalent secret on each call. Operators
//! rotate it out-of-band, so the value lives behind a lock and is read fresh
//! for every request; in-flight resolutions may still use the old value and
//! fail with a listing error, which callers retry after the update.

use std::fmt;
use std::sync::{Arc, RwLock};

/// Environment variable holding the credential.
pub const CREDENTIAL_ENV_VAR: &str = "TERA_COOKIE";

/// Cookie name the provider expects the credential under.
pub const CREDENTIAL_COOKIE_NAME: &str = "ndus";

/// Cloneable handle to the current credential value.
///
/// All clones observe updates made through any of them.
#[derive(Clone, Default)]
pub struct CredentialStore {
    value: Arc<RwLock<String>>,
}

impl CredentialStore {
    /// Creates a store holding `value` (surrounding whitespace trimmed).
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: Arc::new(RwLock::new(value.into().trim().to_string())),
        }
    }

    /// Creates a store from [`CREDENTIAL_ENV_VAR`], empty when unset.
    #[must_use]
    pub fn from_env() -> Self {
        Self::new(std::env::var(CREDENTIAL_ENV_VAR).unwrap_or_default())
    }

    /// Returns the latest credential value.
    ///
    /// A poisoned lock degrades to an empty credential.
    #[must_use]
    pub fn current(&self) -> String {
        self.value
            .read()
            .map(|guard| guard.clone())
            .unwrap_or_default()
    }

    /// Replaces the credential; subsequent requests use the new value.
    pub fn update(&self, value: impl Into<String>) {
        let value = value.into().trim().to_string();
        match self.value.write() {
            Ok(mut guard) => *guard = value,
            Err(poisoned) => *poisoned.into_inner() = value,
        }
    }

    /// Returns true when a non-empty credential is set.
    #[must_use]
    pub fn is_configured(&self) -> bool {
        !self.current().is_empty()
    }

    /// Returns the `Cookie` header value, or `None` when no credential is set.
    #[must_use]
    pub fn cookie_header(&self) -> Option<String> {
        let value = self.current();
        (!value.is_empty()).then(|| format!("{CREDENTIAL_COOKIE_NAME}={value}"))
    }
}

impl fmt::Debug for CredentialStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialStore")
            .field("configured", &self.is_configured())
            .finish_non_exhaustive()
    }
}
