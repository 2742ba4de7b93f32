//! Persisted settings.
//!
//! Global settings are shared by every control and hold the client id and
//! tokens. Every control type has its own settings struct, written by the
//! property inspector and occasionally by the plugin itself (mute state,
//! cached artwork).
//!
//! All per-control structs keep fields they do not know about in `extra`, so
//! writing settings back never drops what the property inspector stored.
//! Numeric fields accept numbers as well as numeric strings, as HTML inputs
//! tend to produce the latter. Values that cannot be parsed fall back to
//! their default.

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::{Map, Value};
use serde_with::{serde_as, skip_serializing_none, DefaultOnError, DisplayFromStr, PickFirst, Same};

use crate::tokens::TokenSet;

type Lenient = DefaultOnError<Option<PickFirst<(Same, DisplayFromStr)>>>;

type Extra = Map<String, Value>;

/// Parses the settings of a control, falling back to defaults.
#[must_use]
pub fn parse<T>(settings: &Value) -> T
where
    T: DeserializeOwned + Default,
{
    if settings.is_null() {
        return T::default();
    }

    serde_json::from_value(settings.clone()).unwrap_or_else(|e| {
        warn!("ignoring invalid settings: {e}");
        T::default()
    })
}

/// Treats an empty string as unset.
fn non_empty(value: Option<&String>) -> Option<&str> {
    value.map(String::as_str).filter(|value| !value.is_empty())
}

#[skip_serializing_none]
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GlobalSettings {
    #[serde(default)]
    pub client_id: Option<String>,

    #[serde(default)]
    pub tokens: Option<TokenSet>,

    #[serde(flatten)]
    pub extra: Extra,
}

impl GlobalSettings {
    #[must_use]
    pub fn client_id(&self) -> Option<&str> {
        non_empty(self.client_id.as_ref())
    }
}

/// Settings of the play/pause, next and previous keys.
#[skip_serializing_none]
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaybackSettings {
    #[serde(default)]
    pub device_id: Option<String>,

    #[serde(flatten)]
    pub extra: Extra,
}

impl PlaybackSettings {
    #[must_use]
    pub fn device_id(&self) -> Option<&str> {
        non_empty(self.device_id.as_ref())
    }
}

/// Settings of the volume up and volume down keys.
#[serde_as]
#[skip_serializing_none]
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VolumeStepSettings {
    #[serde(default)]
    #[serde_as(as = "Lenient")]
    pub step: Option<u8>,

    #[serde(default)]
    pub device_id: Option<String>,

    #[serde(flatten)]
    pub extra: Extra,
}

impl VolumeStepSettings {
    pub const DEFAULT_STEP: u8 = 10;

    #[must_use]
    pub fn step(&self) -> u8 {
        self.step.unwrap_or(Self::DEFAULT_STEP)
    }

    #[must_use]
    pub fn device_id(&self) -> Option<&str> {
        non_empty(self.device_id.as_ref())
    }
}

#[serde_as]
#[skip_serializing_none]
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VolumePresetSettings {
    #[serde(default)]
    #[serde_as(as = "Lenient")]
    pub volume_percent: Option<u8>,

    #[serde(default)]
    pub preset_name: Option<String>,

    #[serde(default)]
    pub device_id: Option<String>,

    #[serde(flatten)]
    pub extra: Extra,
}

impl VolumePresetSettings {
    pub const DEFAULT_VOLUME: u8 = 50;

    #[must_use]
    pub fn volume_percent(&self) -> u8 {
        self.volume_percent.unwrap_or(Self::DEFAULT_VOLUME).min(100)
    }

    /// Key title: the preset name, or the volume when unnamed.
    #[must_use]
    pub fn label(&self) -> String {
        non_empty(self.preset_name.as_ref()).map_or_else(
            || format!("{}%", self.volume_percent()),
            ToOwned::to_owned,
        )
    }

    #[must_use]
    pub fn device_id(&self) -> Option<&str> {
        non_empty(self.device_id.as_ref())
    }
}

#[serde_as]
#[skip_serializing_none]
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VolumeDialSettings {
    #[serde(default)]
    #[serde_as(as = "Lenient")]
    pub step_per_tick: Option<u8>,

    #[serde(default)]
    pub device_id: Option<String>,

    /// Volume to restore when unmuting. Present only while muted.
    #[serde(default)]
    #[serde_as(as = "Lenient")]
    pub muted_volume: Option<u8>,

    #[serde(flatten)]
    pub extra: Extra,
}

impl VolumeDialSettings {
    pub const DEFAULT_STEP_PER_TICK: u8 = 2;
    pub const DEFAULT_RESTORE_VOLUME: u8 = 50;

    #[must_use]
    pub fn step_per_tick(&self) -> u8 {
        self.step_per_tick.unwrap_or(Self::DEFAULT_STEP_PER_TICK)
    }

    #[must_use]
    pub fn restore_volume(&self) -> u8 {
        self.muted_volume
            .unwrap_or(Self::DEFAULT_RESTORE_VOLUME)
            .min(100)
    }

    #[must_use]
    pub fn device_id(&self) -> Option<&str> {
        non_empty(self.device_id.as_ref())
    }
}

#[serde_as]
#[skip_serializing_none]
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackDialSettings {
    #[serde(default)]
    #[serde_as(as = "Lenient")]
    pub ticks_to_skip: Option<u32>,

    #[serde(default)]
    pub device_id: Option<String>,

    #[serde(flatten)]
    pub extra: Extra,
}

impl TrackDialSettings {
    pub const DEFAULT_TICKS_TO_SKIP: u32 = 1;

    /// Detents per skipped track, at least one.
    #[must_use]
    pub fn ticks_to_skip(&self) -> u32 {
        self.ticks_to_skip
            .unwrap_or(Self::DEFAULT_TICKS_TO_SKIP)
            .max(1)
    }

    #[must_use]
    pub fn device_id(&self) -> Option<&str> {
        non_empty(self.device_id.as_ref())
    }
}

#[serde_as]
#[skip_serializing_none]
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeekDialSettings {
    #[serde(default)]
    #[serde_as(as = "Lenient")]
    pub seek_ms_per_tick: Option<u32>,

    #[serde(default)]
    pub device_id: Option<String>,

    #[serde(flatten)]
    pub extra: Extra,
}

impl SeekDialSettings {
    pub const DEFAULT_SEEK_MS_PER_TICK: u32 = 5000;

    #[must_use]
    pub fn seek_ms_per_tick(&self) -> u32 {
        self.seek_ms_per_tick
            .unwrap_or(Self::DEFAULT_SEEK_MS_PER_TICK)
    }

    #[must_use]
    pub fn device_id(&self) -> Option<&str> {
        non_empty(self.device_id.as_ref())
    }
}

#[skip_serializing_none]
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaylistSettings {
    #[serde(default)]
    pub playlist_uri: Option<String>,

    #[serde(default)]
    pub playlist_name: Option<String>,

    /// Artwork as `data:` URI, or as a URL until it has been fetched once.
    #[serde(default)]
    pub playlist_image: Option<String>,

    #[serde(default)]
    pub device_id: Option<String>,

    #[serde(default)]
    pub device_name: Option<String>,

    #[serde(flatten)]
    pub extra: Extra,
}

impl PlaylistSettings {
    #[must_use]
    pub fn playlist_uri(&self) -> Option<&str> {
        non_empty(self.playlist_uri.as_ref())
    }

    #[must_use]
    pub fn playlist_name(&self) -> Option<&str> {
        non_empty(self.playlist_name.as_ref())
    }

    #[must_use]
    pub fn playlist_image(&self) -> Option<&str> {
        non_empty(self.playlist_image.as_ref())
    }

    #[must_use]
    pub fn device_id(&self) -> Option<&str> {
        non_empty(self.device_id.as_ref())
    }
}
