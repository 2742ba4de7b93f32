//! Token endpoint responses of the accounts service.
//!
//! # Example Response
//!
//! ```json
//! {
//!     "access_token": "BQD...",
//!     "token_type": "Bearer",
//!     "scope": "user-read-playback-state user-modify-playback-state",
//!     "expires_in": 3600,
//!     "refresh_token": "AQC..."
//! }
//! ```
//!
//! Refresh responses may omit `refresh_token`, in which case the previous
//! one stays valid.

use std::time::{Duration, SystemTime};

use serde::Deserialize;
use serde_with::{formats::Flexible, serde_as, DurationSeconds};
use veil::Redact;

use crate::tokens::TokenSet;

#[serde_as]
#[derive(Clone, Eq, PartialEq, Deserialize, Redact, Hash)]
pub struct TokenResponse {
    #[redact]
    pub access_token: String,

    #[serde(default)]
    pub token_type: Option<String>,

    #[serde(default)]
    pub scope: Option<String>,

    /// Lifetime of the access token.
    #[serde_as(as = "DurationSeconds<u64, Flexible>")]
    pub expires_in: Duration,

    #[redact]
    #[serde(default)]
    pub refresh_token: Option<String>,
}

impl TokenResponse {
    /// Builds the token set to store, falling back to `previous_refresh`
    /// when the response did not rotate the refresh token.
    ///
    /// Returns `None` if neither carries a refresh token.
    #[must_use]
    pub fn into_token_set(self, previous_refresh: Option<String>, now: SystemTime) -> Option<TokenSet> {
        let refresh_token = self
            .refresh_token
            .filter(|token| !token.is_empty())
            .or(previous_refresh)?;

        Some(TokenSet {
            access_token: self.access_token,
            refresh_token,
            expires_at: now + self.expires_in,
        })
    }
}

/// Error body of the token endpoint, as in RFC 6749 section 5.2.
#[derive(Clone, Debug, Eq, PartialEq, Deserialize, Hash)]
pub struct ErrorResponse {
    pub error: String,

    #[serde(default)]
    pub error_description: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn refresh_keeps_previous_refresh_token() {
        let response: TokenResponse =
            serde_json::from_str(r#"{"access_token":"new","token_type":"Bearer","expires_in":3600}"#)
                .unwrap();
        let now = SystemTime::UNIX_EPOCH;
        let tokens = response
            .into_token_set(Some("old-refresh".to_owned()), now)
            .unwrap();

        assert_eq!(tokens.access_token, "new");
        assert_eq!(tokens.refresh_token, "old-refresh");
        assert_eq!(tokens.expires_at, now + Duration::from_secs(3600));
    }

    #[test]
    fn rotated_refresh_token_wins() {
        let response: TokenResponse = serde_json::from_str(
            r#"{"access_token":"new","expires_in":"3600","refresh_token":"rotated"}"#,
        )
        .unwrap();
        let tokens = response
            .into_token_set(Some("old-refresh".to_owned()), SystemTime::UNIX_EPOCH)
            .unwrap();
        assert_eq!(tokens.refresh_token, "rotated");
    }
}
