//! Wire types of the services the plugin talks to.
//!
//! # Submodules
//!
//! * [`auth`] - token endpoint responses of the accounts service
//! * [`host`] - JSON messages exchanged with the Stream Deck software
//! * [`library`] - playlists, devices and images of the Web API
//! * [`player`] - playback state of the Web API
//!
//! # Shared Functionality
//!
//! [`json`] parses response bodies with consistent logging:
//!
//! ```
//! use spotdeck::protocol;
//!
//! let devices: protocol::library::Devices = protocol::json(&body, "devices")?;
//! ```
//!
//! Responses are logged at TRACE level when parsed; bodies that fail to parse
//! are logged at ERROR level together with the reason.

pub mod auth;
pub mod host;
pub mod library;
pub mod player;

use crate::error::Result;
use serde::Deserialize;
use std::fmt::Debug;

/// Parses and logs a JSON response body.
///
/// `origin` names the endpoint in log output.
///
/// # Errors
///
/// Returns error if:
/// * Response body is not valid JSON
/// * JSON structure doesn't match type `T`
pub fn json<T>(body: &str, origin: &str) -> Result<T>
where
    T: for<'de> Deserialize<'de> + Debug,
{
    match serde_json::from_str(body) {
        Ok(result) => {
            trace!("{origin}: {result:#?}");
            Ok(result)
        }
        Err(e) => {
            if let Ok(json) = serde_json::from_str::<serde_json::Value>(body) {
                error!("{origin}: unexpected response structure ({e})");
                trace!("{origin}: {json:#?}");
            } else {
                error!("{origin}: failed parsing response ({e:?})");
                trace!("{body}");
            }
            Err(e.into())
        }
    }
}
