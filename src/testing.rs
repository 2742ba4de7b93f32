//! Fakes for exercising controls without a network.

use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Arc, Mutex,
    },
};

use async_trait::async_trait;

use crate::{
    actions::{Controller, Services},
    api::{ApiError, Device, PlaybackSnapshot, Playlist, Remote},
    auth::{AuthError, TokenProvider},
    error::{Error, Result},
    host::{memory::MemoryHost, Context},
    protocol::player::{PlaybackDevice, RepeatState, Track},
    settings::GlobalSettings,
};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RemoteCall {
    Play(Option<String>),
    Pause(Option<String>),
    Next(Option<String>),
    Previous(Option<String>),
    SetVolume(u8, Option<String>),
    Seek(u64, Option<String>),
    PlayPlaylist(String, Option<String>),
    PlaylistImage(String),
    FetchImage(String),
}

/// Remote with scripted state that records every command.
#[derive(Default)]
pub struct FakeRemote {
    pub state: Mutex<Option<PlaybackSnapshot>>,
    pub playlists: Mutex<Vec<Playlist>>,
    pub devices: Mutex<Vec<Device>>,
    /// Playlist id to cover URL.
    pub covers: Mutex<HashMap<String, String>>,
    pub offline: AtomicBool,
    /// Commands accepted before going offline.
    pub command_budget: Mutex<Option<usize>>,
    calls: Mutex<Vec<RemoteCall>>,
}

impl FakeRemote {
    pub fn calls(&self) -> Vec<RemoteCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn set_state(&self, state: Option<PlaybackSnapshot>) {
        *self.state.lock().unwrap() = state;
    }

    pub fn go_offline(&self) {
        self.offline.store(true, Ordering::SeqCst);
    }

    pub fn go_offline_after(&self, commands: usize) {
        *self.command_budget.lock().unwrap() = Some(commands);
    }

    fn record(&self, call: RemoteCall) -> Result<()> {
        self.check()?;
        let mut calls = self.calls.lock().unwrap();
        if let Some(budget) = *self.command_budget.lock().unwrap() {
            if calls.len() >= budget {
                self.go_offline();
                return Err(Error::unavailable("offline"));
            }
        }
        calls.push(call);
        Ok(())
    }

    fn check(&self) -> Result<()> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(Error::unavailable("offline"));
        }
        Ok(())
    }
}

#[async_trait]
impl Remote for FakeRemote {
    async fn playback_state(&self, _client_id: &str) -> Result<Option<PlaybackSnapshot>> {
        self.check()?;
        Ok(self.state.lock().unwrap().clone())
    }

    async fn play(&self, _client_id: &str, device_id: Option<&str>) -> Result<()> {
        self.record(RemoteCall::Play(device_id.map(ToOwned::to_owned)))?;
        if let Some(state) = self.state.lock().unwrap().as_mut() {
            state.is_playing = true;
        }
        Ok(())
    }

    async fn pause(&self, _client_id: &str, device_id: Option<&str>) -> Result<()> {
        self.record(RemoteCall::Pause(device_id.map(ToOwned::to_owned)))?;
        if let Some(state) = self.state.lock().unwrap().as_mut() {
            state.is_playing = false;
        }
        Ok(())
    }

    async fn next_track(&self, _client_id: &str, device_id: Option<&str>) -> Result<()> {
        self.record(RemoteCall::Next(device_id.map(ToOwned::to_owned)))
    }

    async fn previous_track(&self, _client_id: &str, device_id: Option<&str>) -> Result<()> {
        self.record(RemoteCall::Previous(device_id.map(ToOwned::to_owned)))
    }

    async fn set_volume(
        &self,
        _client_id: &str,
        volume_percent: u8,
        device_id: Option<&str>,
    ) -> Result<()> {
        self.record(RemoteCall::SetVolume(
            volume_percent,
            device_id.map(ToOwned::to_owned),
        ))?;
        if let Some(device) = self
            .state
            .lock()
            .unwrap()
            .as_mut()
            .and_then(|state| state.device.as_mut())
        {
            device.volume_percent = Some(volume_percent);
        }
        Ok(())
    }

    async fn seek(&self, _client_id: &str, position_ms: u64, device_id: Option<&str>) -> Result<()> {
        self.record(RemoteCall::Seek(position_ms, device_id.map(ToOwned::to_owned)))
    }

    async fn user_playlists(&self, _client_id: &str) -> Result<Vec<Playlist>> {
        self.check()?;
        Ok(self.playlists.lock().unwrap().clone())
    }

    async fn devices(&self, _client_id: &str) -> Result<Vec<Device>> {
        self.check()?;
        Ok(self.devices.lock().unwrap().clone())
    }

    async fn play_playlist(
        &self,
        _client_id: &str,
        playlist_uri: &str,
        device_id: Option<&str>,
    ) -> Result<()> {
        self.record(RemoteCall::PlayPlaylist(
            playlist_uri.to_owned(),
            device_id.map(ToOwned::to_owned),
        ))
    }

    async fn playlist_image(&self, _client_id: &str, playlist_id: &str) -> Result<Option<String>> {
        self.record(RemoteCall::PlaylistImage(playlist_id.to_owned()))?;
        Ok(self.covers.lock().unwrap().get(playlist_id).cloned())
    }

    async fn fetch_image(&self, url: &str) -> Result<String> {
        self.record(RemoteCall::FetchImage(url.to_owned()))?;
        if url.contains("missing") {
            return Err(Error::not_found(ApiError::RemoteRequestFailed {
                operation: "fetch image",
                status: http::StatusCode::NOT_FOUND,
            }));
        }
        Ok(format!("data:image/jpeg;base64,{}", url.len()))
    }
}

/// Token provider with a switch for the authentication state.
#[derive(Default)]
pub struct FakeTokens {
    pub authenticated: AtomicBool,
    pub reject_authorization: AtomicBool,
    pub authorizations: AtomicUsize,
}

#[async_trait]
impl TokenProvider for FakeTokens {
    async fn access_token(&self, _client_id: &str) -> Result<String> {
        if self.authenticated.load(Ordering::SeqCst) {
            Ok("token".to_owned())
        } else {
            Err(Error::unauthenticated(AuthError::NotAuthenticated))
        }
    }

    async fn is_authenticated(&self) -> Result<bool> {
        Ok(self.authenticated.load(Ordering::SeqCst))
    }

    async fn authorize(&self, _client_id: &str) -> Result<()> {
        self.authorizations.fetch_add(1, Ordering::SeqCst);
        if self.reject_authorization.load(Ordering::SeqCst) {
            return Err(Error::deadline_exceeded(AuthError::Timeout));
        }
        self.authenticated.store(true, Ordering::SeqCst);
        Ok(())
    }
}

/// A memory host, fake remote and fake tokens wired into [`Services`].
pub struct Harness {
    pub host: Arc<MemoryHost>,
    pub remote: Arc<FakeRemote>,
    pub tokens: Arc<FakeTokens>,
}

impl Harness {
    pub fn new() -> Self {
        Self {
            host: Arc::new(MemoryHost::with_global_settings(GlobalSettings {
                client_id: Some("client".to_owned()),
                ..GlobalSettings::default()
            })),
            remote: Arc::new(FakeRemote::default()),
            tokens: Arc::new(FakeTokens::default()),
        }
    }

    pub fn services(&self) -> Services {
        Services {
            host: self.host.clone(),
            remote: self.remote.clone(),
            tokens: self.tokens.clone(),
        }
    }

    pub fn controller(&self, action: &str) -> Controller {
        Controller::new(self.services(), action, Context::new("ctx"))
    }
}

/// A snapshot of a track playing on a desk computer.
pub fn snapshot(is_playing: bool, volume: u8, progress_ms: u64, duration_ms: u64) -> PlaybackSnapshot {
    PlaybackSnapshot {
        is_playing,
        progress_ms: Some(progress_ms),
        device: Some(PlaybackDevice {
            id: Some("desk".to_owned()),
            name: "Desk".to_owned(),
            volume_percent: Some(volume),
        }),
        shuffle_state: false,
        repeat_state: RepeatState::Off,
        current_track: Some(Track {
            id: Some("t1".to_owned()),
            name: "Teardrop".to_owned(),
            duration_ms,
            artists: Vec::new(),
            album: None,
        }),
    }
}
