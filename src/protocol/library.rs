//! Playlists, devices and images.
//!
//! Only the fields the plugin uses are modeled. Everything but `Page` is
//! also serialized, as the property inspector receives these verbatim.

use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DefaultOnNull, VecSkipError};
use url::Url;

/// One page of a paginated listing.
#[serde_as]
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(bound(deserialize = "T: Deserialize<'de>"))]
pub struct Page<T> {
    /// Items of this page. Entries that fail to parse are skipped; the API
    /// returns `null` for items that are no longer available.
    #[serde_as(as = "VecSkipError<_>")]
    pub items: Vec<T>,

    /// Absolute URL of the next page, if any.
    #[serde(default)]
    pub next: Option<Url>,
}

#[serde_as]
#[derive(Clone, Debug, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub struct Playlist {
    pub id: String,
    pub name: String,
    pub uri: String,

    #[serde(default)]
    #[serde_as(as = "DefaultOnNull")]
    pub images: Vec<Image>,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub struct Image {
    pub url: String,
    #[serde(default)]
    pub height: Option<u32>,
    #[serde(default)]
    pub width: Option<u32>,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub struct Device {
    /// Missing for devices that cannot be targeted.
    #[serde(default)]
    pub id: Option<String>,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub is_active: bool,
    #[serde(default)]
    pub volume_percent: Option<u8>,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Deserialize)]
pub struct Devices {
    pub devices: Vec<Device>,
}
