//! Boundary to the control-surface software hosting the plugin.
//!
//! The host delivers gestures on placed controls as [`Envelope`]s and
//! renders titles and images on their behalf. It also persists two kinds of
//! settings:
//!
//! * per-control settings, delivered with every event of that control
//! * process-wide [`GlobalSettings`], holding the client id and tokens
//!
//! Two implementations are provided:
//!
//! * [`websocket::WebSocketHost`] speaks the Stream Deck JSON protocol
//! * [`memory::MemoryHost`] records every call, for headless use and tests

pub mod memory;
pub mod websocket;

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{error::Result, settings::GlobalSettings};

/// Host-assigned identifier of one placed control instance.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Context(String);

impl Context {
    #[must_use]
    pub fn new(context: impl Into<String>) -> Self {
        Self(context.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// An inbound event for one control instance.
///
/// Settings travel as raw JSON; each action parses them into its own
/// settings type.
#[derive(Clone, Debug, PartialEq)]
pub enum Event {
    /// The control became visible.
    WillAppear { settings: Value },
    /// The control was removed or its page was switched away.
    WillDisappear,
    KeyDown { settings: Value },
    /// The dial was turned by `ticks` detents; negative is counter-clockwise.
    DialRotate { settings: Value, ticks: i32 },
    DialDown { settings: Value },
    /// The property inspector persisted new settings.
    SettingsChanged { settings: Value },
    /// A message from the property inspector.
    InspectorMessage { event: String, payload: Value },
}

/// An [`Event`] addressed to a control instance.
#[derive(Clone, Debug, PartialEq)]
pub struct Envelope {
    /// Action identifier, for example `com.spotdeck.control.volume-dial`.
    pub action: String,
    pub context: Context,
    pub event: Event,
}

/// Operations the plugin may request from the host.
#[async_trait]
pub trait Host: Send + Sync {
    async fn set_title(&self, context: &Context, title: &str) -> Result<()>;

    /// Sets the key image from a `data:` URI.
    async fn set_image(&self, context: &Context, image: &str) -> Result<()>;

    /// Flashes a confirmation on the key.
    async fn show_ok(&self, context: &Context) -> Result<()>;

    /// Flashes a warning on the key.
    async fn show_alert(&self, context: &Context) -> Result<()>;

    /// Persists the complete settings object of a control instance.
    async fn set_settings(&self, context: &Context, settings: Value) -> Result<()>;

    async fn send_to_inspector(&self, action: &str, context: &Context, payload: Value)
        -> Result<()>;

    /// Returns the process-wide settings as last persisted.
    async fn global_settings(&self) -> Result<GlobalSettings>;

    /// Replaces the process-wide settings.
    async fn set_global_settings(&self, settings: &GlobalSettings) -> Result<()>;
}
