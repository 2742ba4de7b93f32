//! The playlist key and its property inspector.
//!
//! Besides starting a playlist, this key answers the property inspector: it
//! lists playlists and devices for the dropdowns and runs the authorization
//! flow. Replies are `sendToPropertyInspector` payloads carrying an `event`
//! name.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};

use super::{Action, Controller};
use crate::{error::Result, settings::PlaylistSettings};

/// Prefix of playlist URIs.
const PLAYLIST_URI_PREFIX: &str = "spotify:playlist:";

/// Requests the property inspector sends.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum InspectorRequest {
    AuthStatus,
    Playlists,
    Devices,
    Authenticate { client_id: Option<String> },
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AuthenticatePayload {
    #[serde(default)]
    client_id: Option<String>,
}

impl InspectorRequest {
    /// Parses a request, or `None` for events this key does not handle.
    #[must_use]
    pub fn parse(event: &str, payload: &Value) -> Option<Self> {
        let request = match event {
            "getAuthStatus" => Self::AuthStatus,
            "getPlaylists" => Self::Playlists,
            "getDevices" => Self::Devices,
            "authenticate" => {
                let payload: AuthenticatePayload =
                    serde_json::from_value(payload.clone()).unwrap_or_default();
                Self::Authenticate {
                    client_id: payload.client_id.filter(|id| !id.is_empty()),
                }
            }
            _ => return None,
        };
        Some(request)
    }

    fn failure_message(&self) -> &'static str {
        match self {
            Self::AuthStatus | Self::Authenticate { .. } => "Authentication failed",
            Self::Playlists => "Failed to fetch playlists",
            Self::Devices => "Failed to fetch devices",
        }
    }
}

fn playlist_id(uri: &str) -> Option<&str> {
    uri.strip_prefix(PLAYLIST_URI_PREFIX)
        .filter(|id| !id.is_empty())
}

fn is_remote_image(image: &str) -> bool {
    image.starts_with("https://") || image.starts_with("http://")
}

/// Starts a playlist on press and shows its name and artwork.
#[derive(Debug, Default)]
pub struct PlayPlaylist;

impl PlayPlaylist {
    async fn play(controller: &Controller, uri: &str, settings: &PlaylistSettings) -> Result<()> {
        let client_id = controller.client_id().await?;
        controller
            .remote()
            .play_playlist(&client_id, uri, settings.device_id())
            .await
    }

    async fn refresh(controller: &Controller, mut settings: PlaylistSettings) {
        if let Some(name) = settings.playlist_name() {
            controller.set_title(name).await;
        }

        let image = match settings.playlist_image() {
            Some(image) => image.to_owned(),
            None => match Self::lookup_cover(controller, &settings).await {
                Some(url) => url,
                None => return,
            },
        };

        // Data URIs are used as is, and so is anything else we cannot fetch.
        if !is_remote_image(&image) {
            controller.set_image(&image).await;
            return;
        }

        match controller.remote().fetch_image(&image).await {
            Ok(data) => {
                controller.set_image(&data).await;
                if settings.playlist_image() != Some(data.as_str()) {
                    settings.playlist_image = Some(data);
                    if let Err(e) = controller.set_settings(&settings).await {
                        warn!("{controller}: could not cache artwork: {e}");
                    }
                }
            }
            Err(e) => warn!("{controller}: could not fetch artwork: {e}"),
        }
    }

    /// Looks up the cover of a playlist that was configured without one.
    async fn lookup_cover(controller: &Controller, settings: &PlaylistSettings) -> Option<String> {
        let id = settings.playlist_uri().and_then(playlist_id)?;
        let client_id = controller.client_id().await.ok()?;

        match controller.remote().playlist_image(&client_id, id).await {
            Ok(url) => url,
            Err(e) => {
                debug!("{controller}: no cover for {id}: {e}");
                None
            }
        }
    }

    async fn answer(controller: &Controller, request: &InspectorRequest) -> Result<Value> {
        let tokens = controller.tokens();
        let remote = controller.remote();

        let reply = match request {
            InspectorRequest::AuthStatus => {
                let authenticated = tokens.is_authenticated().await?;
                let client_id = controller.client_id().await?;
                json!({
                    "event": "authStatus",
                    "authenticated": authenticated,
                    "clientId": client_id,
                })
            }
            InspectorRequest::Playlists => {
                let client_id = controller.client_id().await?;
                let playlists = remote.user_playlists(&client_id).await?;
                json!({ "event": "playlists", "playlists": playlists })
            }
            InspectorRequest::Devices => {
                let client_id = controller.client_id().await?;
                let devices = remote.devices(&client_id).await?;
                json!({ "event": "devices", "devices": devices })
            }
            InspectorRequest::Authenticate { client_id } => {
                if tokens.is_authenticated().await? {
                    debug!("{controller}: already authenticated");
                } else {
                    let client_id = match client_id {
                        Some(client_id) => client_id.clone(),
                        None => controller.client_id().await?,
                    };
                    tokens.authorize(&client_id).await?;
                    info!("authenticated with client id {client_id}");
                }
                json!({ "event": "authenticated" })
            }
        };

        Ok(reply)
    }
}

#[async_trait]
impl Action for PlayPlaylist {
    type Settings = PlaylistSettings;

    async fn will_appear(&mut self, controller: &Controller, settings: PlaylistSettings) -> Result<()> {
        Self::refresh(controller, settings).await;
        Ok(())
    }

    async fn settings_changed(
        &mut self,
        controller: &Controller,
        settings: PlaylistSettings,
    ) -> Result<()> {
        Self::refresh(controller, settings).await;
        Ok(())
    }

    async fn key_down(&mut self, controller: &Controller, settings: PlaylistSettings) -> Result<()> {
        let Some(uri) = settings.playlist_uri() else {
            warn!("{controller}: no playlist configured");
            controller.show_alert().await;
            return Ok(());
        };

        let result = Self::play(controller, uri, &settings).await;
        if controller.acknowledge("play playlist", result).await.is_some() {
            info!(
                "playing {} on {}",
                settings.playlist_name().unwrap_or(uri),
                settings
                    .device_name
                    .as_deref()
                    .filter(|name| !name.is_empty())
                    .unwrap_or("the active device")
            );
        }
        Ok(())
    }

    async fn inspector_message(
        &mut self,
        controller: &Controller,
        event: &str,
        payload: Value,
    ) -> Result<()> {
        let Some(request) = InspectorRequest::parse(event, &payload) else {
            trace!("{controller}: ignoring inspector event {event}");
            return Ok(());
        };

        let reply = match Self::answer(controller, &request).await {
            Ok(reply) => reply,
            Err(e) => {
                error!("{controller}: {request:?} failed: {e}");
                json!({ "event": "error", "message": request.failure_message() })
            }
        };
        controller.send_to_inspector(reply).await;
        Ok(())
    }
}
