//! Client for the Spotify Web API.
//!
//! Every operation is a single request/response pair carrying a bearer
//! token from a [`TokenProvider`]. `204 No Content` counts as success. Other
//! unexpected statuses are reported as [`ApiError::RemoteRequestFailed`],
//! except for playback commands where `404` means that no device is active.
//!
//! The [`Remote`] trait is what controls depend on; [`Client`] is its
//! implementation over HTTP.

use std::sync::Arc;

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use http::StatusCode;
use reqwest::header::CONTENT_TYPE;
use serde::de::DeserializeOwned;
use serde_json::json;
use thiserror::Error;
use url::Url;

pub use crate::protocol::{
    library::{Device, Image, Playlist},
    player::PlaybackSnapshot,
};
use crate::{
    auth::TokenProvider,
    config::Config,
    error::{Error, ErrorKind, Result},
    http::{Client as HttpClient, Request},
    protocol::{
        self,
        library::{Devices, Page},
    },
};

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("{operation} failed: {status}")]
    RemoteRequestFailed {
        operation: &'static str,
        status: StatusCode,
    },
    #[error("no active device")]
    NoActiveDevice,
}

impl ApiError {
    fn into_error(self) -> Error {
        match self {
            Self::RemoteRequestFailed { status, .. } => {
                Error::new(ErrorKind::from_status(status), self)
            }
            Self::NoActiveDevice => Error::failed_precondition(self),
        }
    }
}

/// Target volume of a relative change.
#[must_use]
#[expect(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn volume_target(current: u8, delta: i32) -> u8 {
    i32::from(current).saturating_add(delta).clamp(0, 100) as u8
}

/// Playback operations available to controls.
///
/// All operations act on the active device unless `device_id` names
/// another one.
#[async_trait]
pub trait Remote: Send + Sync {
    /// Current playback state, or `None` if nothing is playing anywhere.
    async fn playback_state(&self, client_id: &str) -> Result<Option<PlaybackSnapshot>>;

    async fn play(&self, client_id: &str, device_id: Option<&str>) -> Result<()>;

    async fn pause(&self, client_id: &str, device_id: Option<&str>) -> Result<()>;

    async fn next_track(&self, client_id: &str, device_id: Option<&str>) -> Result<()>;

    async fn previous_track(&self, client_id: &str, device_id: Option<&str>) -> Result<()>;

    async fn set_volume(
        &self,
        client_id: &str,
        volume_percent: u8,
        device_id: Option<&str>,
    ) -> Result<()>;

    async fn seek(&self, client_id: &str, position_ms: u64, device_id: Option<&str>)
        -> Result<()>;

    /// All playlists of the user, in library order.
    async fn user_playlists(&self, client_id: &str) -> Result<Vec<Playlist>>;

    async fn devices(&self, client_id: &str) -> Result<Vec<Device>>;

    async fn play_playlist(
        &self,
        client_id: &str,
        playlist_uri: &str,
        device_id: Option<&str>,
    ) -> Result<()>;

    /// URL of the first cover image of a playlist, if any.
    async fn playlist_image(&self, client_id: &str, playlist_id: &str) -> Result<Option<String>>;

    /// Downloads an image and returns it as a `data:` URI.
    async fn fetch_image(&self, url: &str) -> Result<String>;

    /// Changes the volume relative to its current value, returning the
    /// volume that was set.
    ///
    /// Reads and writes the volume in two requests; a concurrent change in
    /// between is lost.
    async fn change_volume(
        &self,
        client_id: &str,
        delta: i32,
        device_id: Option<&str>,
    ) -> Result<u8> {
        let state = self
            .playback_state(client_id)
            .await?
            .ok_or_else(|| ApiError::NoActiveDevice.into_error())?;

        let target = volume_target(state.volume_percent().unwrap_or(0), delta);
        self.set_volume(client_id, target, device_id).await?;
        Ok(target)
    }

    /// Pauses if playing and plays otherwise, returning whether playback
    /// was started. Starts playback when nothing is playing at all.
    async fn toggle_play_pause(&self, client_id: &str, device_id: Option<&str>) -> Result<bool> {
        let is_playing = self
            .playback_state(client_id)
            .await?
            .is_some_and(|state| state.is_playing);

        if is_playing {
            self.pause(client_id, device_id).await?;
        } else {
            self.play(client_id, device_id).await?;
        }

        Ok(!is_playing)
    }
}

pub struct Client {
    http: Arc<HttpClient>,
    tokens: Arc<dyn TokenProvider>,
    base_url: Url,
}

impl Client {
    /// Playlists per page; the maximum the API allows.
    const PLAYLIST_PAGE_SIZE: u8 = 50;

    #[must_use]
    pub fn new(config: &Config, http: Arc<HttpClient>, tokens: Arc<dyn TokenProvider>) -> Self {
        Self {
            http,
            tokens,
            base_url: config.api_url.clone(),
        }
    }

    fn endpoint(&self, path: &str, device_id: Option<&str>) -> Result<Url> {
        let mut url = self.base_url.join(path)?;
        if let Some(device_id) = device_id {
            url.query_pairs_mut().append_pair("device_id", device_id);
        }
        Ok(url)
    }

    async fn send(&self, client_id: &str, request: Request) -> Result<reqwest::Response> {
        let token = self.tokens.access_token(client_id).await?;
        self.http.execute(request.bearer(&token)?).await
    }

    /// Sends a playback command.
    async fn command(&self, client_id: &str, operation: &'static str, request: Request) -> Result<()> {
        let response = self.send(client_id, request).await?;
        match response.status() {
            status if status.is_success() => {
                debug!("{operation}: {status}");
                Ok(())
            }
            StatusCode::NOT_FOUND => Err(ApiError::NoActiveDevice.into_error()),
            status => Err(ApiError::RemoteRequestFailed { operation, status }.into_error()),
        }
    }

    async fn get_json<T>(&self, client_id: &str, operation: &'static str, url: Url) -> Result<T>
    where
        T: DeserializeOwned + std::fmt::Debug,
    {
        let response = self.send(client_id, self.http.get(url)).await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ApiError::RemoteRequestFailed { operation, status }.into_error());
        }

        let body = response.text().await?;
        protocol::json(&body, operation)
    }
}

#[async_trait]
impl Remote for Client {
    async fn playback_state(&self, client_id: &str) -> Result<Option<PlaybackSnapshot>> {
        let url = self.endpoint("me/player", None)?;
        let response = self.send(client_id, self.http.get(url)).await?;

        let status = response.status();
        if status == StatusCode::NO_CONTENT {
            return Ok(None);
        }
        if !status.is_success() {
            return Err(ApiError::RemoteRequestFailed {
                operation: "playback state",
                status,
            }
            .into_error());
        }

        let body = response.text().await?;
        if body.trim().is_empty() {
            return Ok(None);
        }
        protocol::json(&body, "playback state").map(Some)
    }

    async fn play(&self, client_id: &str, device_id: Option<&str>) -> Result<()> {
        let url = self.endpoint("me/player/play", device_id)?;
        self.command(client_id, "play", self.http.put(url).empty())
            .await
    }

    async fn pause(&self, client_id: &str, device_id: Option<&str>) -> Result<()> {
        let url = self.endpoint("me/player/pause", device_id)?;
        self.command(client_id, "pause", self.http.put(url).empty())
            .await
    }

    async fn next_track(&self, client_id: &str, device_id: Option<&str>) -> Result<()> {
        let url = self.endpoint("me/player/next", device_id)?;
        self.command(client_id, "next track", self.http.post(url).empty())
            .await
    }

    async fn previous_track(&self, client_id: &str, device_id: Option<&str>) -> Result<()> {
        let url = self.endpoint("me/player/previous", device_id)?;
        self.command(client_id, "previous track", self.http.post(url).empty())
            .await
    }

    async fn set_volume(
        &self,
        client_id: &str,
        volume_percent: u8,
        device_id: Option<&str>,
    ) -> Result<()> {
        let mut url = self.endpoint("me/player/volume", device_id)?;
        url.query_pairs_mut()
            .append_pair("volume_percent", &volume_percent.min(100).to_string());
        self.command(client_id, "set volume", self.http.put(url).empty())
            .await
    }

    async fn seek(
        &self,
        client_id: &str,
        position_ms: u64,
        device_id: Option<&str>,
    ) -> Result<()> {
        let mut url = self.endpoint("me/player/seek", device_id)?;
        url.query_pairs_mut()
            .append_pair("position_ms", &position_ms.to_string());
        self.command(client_id, "seek", self.http.put(url).empty())
            .await
    }

    async fn user_playlists(&self, client_id: &str) -> Result<Vec<Playlist>> {
        let mut playlists = Vec::new();
        let mut next = Some(self.base_url.join(&format!(
            "me/playlists?limit={}",
            Self::PLAYLIST_PAGE_SIZE
        ))?);

        while let Some(url) = next {
            let page: Page<Playlist> = self.get_json(client_id, "user playlists", url).await?;
            playlists.extend(page.items);
            next = page.next;
        }

        debug!("fetched {} playlists", playlists.len());
        Ok(playlists)
    }

    async fn devices(&self, client_id: &str) -> Result<Vec<Device>> {
        let url = self.endpoint("me/player/devices", None)?;
        let devices: Devices = self.get_json(client_id, "devices", url).await?;
        Ok(devices.devices)
    }

    async fn play_playlist(
        &self,
        client_id: &str,
        playlist_uri: &str,
        device_id: Option<&str>,
    ) -> Result<()> {
        let url = self.endpoint("me/player/play", device_id)?;
        let request = self
            .http
            .put(url)
            .json(&json!({ "context_uri": playlist_uri }))?;
        self.command(client_id, "play playlist", request).await
    }

    async fn playlist_image(&self, client_id: &str, playlist_id: &str) -> Result<Option<String>> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| Error::internal("api url cannot be a base"))?
            .pop_if_empty()
            .extend(["playlists", playlist_id, "images"]);

        match self
            .get_json::<Vec<Image>>(client_id, "playlist image", url)
            .await
        {
            Ok(images) => Ok(images.into_iter().next().map(|image| image.url)),
            Err(e) if e.downcast::<ApiError>().is_some() => {
                debug!("no image for playlist {playlist_id}: {e}");
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    async fn fetch_image(&self, url: &str) -> Result<String> {
        let url = Url::parse(url)?;
        let response = self.http.unlimited.get(url).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ApiError::RemoteRequestFailed {
                operation: "fetch image",
                status,
            }
            .into_error());
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .filter(|value| !value.is_empty())
            .unwrap_or("image/jpeg")
            .to_owned();
        let bytes = response.bytes().await?;
        trace!("fetched {} bytes of {content_type}", bytes.len());

        Ok(format!("data:{content_type};base64,{}", STANDARD.encode(&bytes)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn volume_changes_are_clamped() {
        assert_eq!(volume_target(95, 10), 100);
        assert_eq!(volume_target(5, -10), 0);
        assert_eq!(volume_target(40, 4), 44);
        assert_eq!(volume_target(0, i32::MIN), 0);
    }

    #[test]
    fn error_kinds_follow_status() {
        let err = ApiError::RemoteRequestFailed {
            operation: "devices",
            status: StatusCode::UNAUTHORIZED,
        }
        .into_error();
        assert_eq!(err.kind, ErrorKind::Unauthenticated);

        let err = ApiError::NoActiveDevice.into_error();
        assert_eq!(err.kind, ErrorKind::FailedPrecondition);
        assert!(matches!(
            err.downcast::<ApiError>(),
            Some(ApiError::NoActiveDevice)
        ));
    }
}
