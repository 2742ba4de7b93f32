//! JSON messages of the Stream Deck plugin protocol.
//!
//! Every message is an object tagged by its `event` field. Inbound events we
//! do not handle (device connection, title changes, touch taps...) parse as
//! [`Inbound::Other`] and are dropped.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{host::Context, settings::GlobalSettings};

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(tag = "event", rename_all = "camelCase")]
pub enum Inbound {
    WillAppear {
        action: String,
        context: Context,
        payload: SettingsPayload,
    },
    WillDisappear {
        action: String,
        context: Context,
    },
    KeyDown {
        action: String,
        context: Context,
        payload: SettingsPayload,
    },
    DialRotate {
        action: String,
        context: Context,
        payload: DialRotatePayload,
    },
    DialDown {
        action: String,
        context: Context,
        payload: SettingsPayload,
    },
    DidReceiveSettings {
        action: String,
        context: Context,
        payload: SettingsPayload,
    },
    SendToPlugin {
        action: String,
        context: Context,
        #[serde(default)]
        payload: Value,
    },
    DidReceiveGlobalSettings {
        payload: GlobalSettingsPayload,
    },
    #[serde(other)]
    Other,
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct SettingsPayload {
    #[serde(default)]
    pub settings: Value,
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct DialRotatePayload {
    #[serde(default)]
    pub settings: Value,
    pub ticks: i32,
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct GlobalSettingsPayload {
    #[serde(default)]
    pub settings: Value,
}

/// Requests to the Stream Deck software.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "camelCase")]
pub enum Outbound<'a> {
    SetTitle {
        context: &'a Context,
        payload: TitlePayload<'a>,
    },
    SetImage {
        context: &'a Context,
        payload: ImagePayload<'a>,
    },
    ShowOk {
        context: &'a Context,
    },
    ShowAlert {
        context: &'a Context,
    },
    SetSettings {
        context: &'a Context,
        payload: Value,
    },
    /// `context` is the plugin UUID for the global settings requests.
    GetGlobalSettings {
        context: &'a str,
    },
    SetGlobalSettings {
        context: &'a str,
        payload: &'a GlobalSettings,
    },
    SendToPropertyInspector {
        action: &'a str,
        context: &'a Context,
        payload: Value,
    },
}

/// Renders on hardware and software alike.
pub const TARGET_BOTH: u8 = 0;

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct TitlePayload<'a> {
    pub title: &'a str,
    pub target: u8,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ImagePayload<'a> {
    pub image: &'a str,
    pub target: u8,
}

/// First message after connecting, announcing the plugin.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Registration<'a> {
    pub event: &'a str,
    pub uuid: &'a str,
}
