//! Playback state as returned by `GET me/player`.
//!
//! Most fields are nullable on the wire: the device may hide its volume,
//! and there is no current item during ads or before anything was played.

use serde::Deserialize;
use serde_with::{serde_as, DefaultOnNull};

/// Point-in-time read of the remote playback state.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct PlaybackSnapshot {
    #[serde(default)]
    pub is_playing: bool,

    #[serde(default)]
    pub progress_ms: Option<u64>,

    pub device: Option<PlaybackDevice>,

    #[serde(default)]
    pub shuffle_state: bool,

    #[serde(default)]
    pub repeat_state: RepeatState,

    #[serde(default, rename = "item")]
    pub current_track: Option<Track>,
}

impl PlaybackSnapshot {
    #[must_use]
    pub fn volume_percent(&self) -> Option<u8> {
        self.device.as_ref().and_then(|device| device.volume_percent)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct PlaybackDevice {
    #[serde(default)]
    pub id: Option<String>,

    pub name: String,

    #[serde(default)]
    pub volume_percent: Option<u8>,
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RepeatState {
    #[default]
    Off,
    Track,
    Context,
}

/// Current track or episode.
#[serde_as]
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct Track {
    #[serde(default)]
    pub id: Option<String>,

    pub name: String,

    pub duration_ms: u64,

    #[serde(default)]
    #[serde_as(as = "DefaultOnNull")]
    pub artists: Vec<Artist>,

    #[serde(default)]
    pub album: Option<Album>,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Deserialize)]
pub struct Artist {
    pub name: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Deserialize)]
pub struct Album {
    pub name: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_playing_track() {
        let snapshot: PlaybackSnapshot = serde_json::from_str(
            r#"{
                "device": {"id": "d1", "name": "Desk", "type": "Computer", "volume_percent": 40},
                "shuffle_state": true,
                "repeat_state": "context",
                "timestamp": 1700000000000,
                "progress_ms": 190000,
                "is_playing": true,
                "item": {
                    "id": "t1",
                    "name": "Teardrop",
                    "duration_ms": 200000,
                    "artists": [{"name": "Massive Attack"}],
                    "album": {"name": "Mezzanine"}
                },
                "currently_playing_type": "track"
            }"#,
        )
        .unwrap();

        assert!(snapshot.is_playing);
        assert_eq!(snapshot.volume_percent(), Some(40));
        assert_eq!(snapshot.repeat_state, RepeatState::Context);
        let track = snapshot.current_track.unwrap();
        assert_eq!(track.duration_ms, 200_000);
        assert_eq!(track.artists[0].name, "Massive Attack");
    }

    #[test]
    fn parses_idle_device_without_item() {
        let snapshot: PlaybackSnapshot = serde_json::from_str(
            r#"{"device": {"id": null, "name": "Phone", "volume_percent": null},
                "progress_ms": null, "is_playing": false, "item": null}"#,
        )
        .unwrap();

        assert_eq!(snapshot.volume_percent(), None);
        assert!(snapshot.current_track.is_none());
    }
}
