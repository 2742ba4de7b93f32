use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Mutex, PoisonError,
    },
    time::{Duration, SystemTime},
};

use serde::{Deserialize, Serialize};
use serde_with::{formats::Flexible, serde_as, TimestampMilliSeconds};
use veil::Redact;

use crate::{error::Result, host::Host};

/// Access and refresh token pair as persisted in global settings.
#[serde_as]
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Redact)]
pub struct TokenSet {
    #[redact]
    pub access_token: String,

    #[redact]
    pub refresh_token: String,

    /// Absolute expiry, persisted as milliseconds since the Unix epoch.
    #[serde_as(as = "TimestampMilliSeconds<i64, Flexible>")]
    pub expires_at: SystemTime,
}

impl TokenSet {
    /// Tokens are refreshed this long before they actually expire.
    pub const REFRESH_MARGIN: Duration = Duration::from_secs(5 * 60);

    #[must_use]
    pub fn time_to_live(&self) -> Duration {
        self.expires_at
            .duration_since(SystemTime::now())
            .unwrap_or(Duration::ZERO)
    }

    /// Whether the access token should be refreshed at `now`.
    #[must_use]
    pub fn needs_refresh_at(&self, now: SystemTime) -> bool {
        self.expires_at
            .checked_sub(Self::REFRESH_MARGIN)
            .map_or(true, |deadline| now > deadline)
    }

    #[must_use]
    pub fn needs_refresh(&self) -> bool {
        self.needs_refresh_at(SystemTime::now())
    }
}

/// Process-wide holder of the live [`TokenSet`].
///
/// Tokens are read from the host's global settings on first use. The lock
/// is only held to copy tokens in or out, never across an `.await`.
#[derive(Debug, Default)]
pub struct TokenStore {
    tokens: Mutex<Option<TokenSet>>,
    loaded: AtomicBool,
}

impl TokenStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn get(&self) -> Option<TokenSet> {
        self.tokens
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn replace(&self, tokens: Option<TokenSet>) {
        *self.tokens.lock().unwrap_or_else(PoisonError::into_inner) = tokens;
        self.loaded.store(true, Ordering::Release);
    }

    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.tokens
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// Returns the tokens, reading them from global settings if this store
    /// has not been populated yet.
    pub async fn load(&self, host: &dyn Host) -> Result<Option<TokenSet>> {
        if self.loaded.load(Ordering::Acquire) {
            if let Some(tokens) = self.get() {
                return Ok(Some(tokens));
            }
        }

        self.reload(host).await
    }

    /// Re-reads the tokens from global settings, replacing what is held.
    pub async fn reload(&self, host: &dyn Host) -> Result<Option<TokenSet>> {
        let tokens = host.global_settings().await?.tokens;
        debug!(
            "loaded tokens from global settings: {}",
            if tokens.is_some() { "present" } else { "absent" }
        );
        self.replace(tokens.clone());
        Ok(tokens)
    }
}
