//! Keys for transport and volume.

use async_trait::async_trait;

use super::{Action, Controller};
use crate::{
    error::Result,
    settings::{PlaybackSettings, VolumePresetSettings, VolumeStepSettings},
};

/// Toggles playback; the title shows what a press will do.
#[derive(Debug, Default)]
pub struct PlayPause;

impl PlayPause {
    const PLAYING: &'static str = "⏸";
    const PAUSED: &'static str = "▶";
    const UNKNOWN: &'static str = "▶⏸";

    async fn refresh_title(controller: &Controller) {
        let title = match Self::fetch_is_playing(controller).await {
            Ok(true) => Self::PLAYING,
            Ok(false) => Self::PAUSED,
            Err(e) => {
                debug!("{controller}: playback state unavailable: {e}");
                Self::UNKNOWN
            }
        };
        controller.set_title(title).await;
    }

    async fn fetch_is_playing(controller: &Controller) -> Result<bool> {
        let client_id = controller.client_id().await?;
        let state = controller.remote().playback_state(&client_id).await?;
        Ok(state.is_some_and(|state| state.is_playing))
    }

    async fn toggle(controller: &Controller, settings: &PlaybackSettings) -> Result<bool> {
        let client_id = controller.client_id().await?;
        controller
            .remote()
            .toggle_play_pause(&client_id, settings.device_id())
            .await
    }
}

#[async_trait]
impl Action for PlayPause {
    type Settings = PlaybackSettings;

    async fn will_appear(&mut self, controller: &Controller, _settings: PlaybackSettings) -> Result<()> {
        Self::refresh_title(controller).await;
        Ok(())
    }

    async fn key_down(&mut self, controller: &Controller, settings: PlaybackSettings) -> Result<()> {
        let result = Self::toggle(controller, &settings).await;
        if controller.acknowledge("play/pause", result).await.is_some() {
            Self::refresh_title(controller).await;
        }
        Ok(())
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Skip {
    Next,
    Previous,
}

/// Skips one track forward or back.
#[derive(Debug)]
pub struct SkipTrack {
    direction: Skip,
}

impl SkipTrack {
    #[must_use]
    pub fn new(direction: Skip) -> Self {
        Self { direction }
    }

    async fn skip(&self, controller: &Controller, settings: &PlaybackSettings) -> Result<()> {
        let client_id = controller.client_id().await?;
        let remote = controller.remote();
        match self.direction {
            Skip::Next => remote.next_track(&client_id, settings.device_id()).await,
            Skip::Previous => remote.previous_track(&client_id, settings.device_id()).await,
        }
    }
}

#[async_trait]
impl Action for SkipTrack {
    type Settings = PlaybackSettings;

    async fn will_appear(&mut self, controller: &Controller, _settings: PlaybackSettings) -> Result<()> {
        let title = match self.direction {
            Skip::Next => "⏭",
            Skip::Previous => "⏮",
        };
        controller.set_title(title).await;
        Ok(())
    }

    async fn key_down(&mut self, controller: &Controller, settings: PlaybackSettings) -> Result<()> {
        let operation = match self.direction {
            Skip::Next => "next track",
            Skip::Previous => "previous track",
        };
        let result = self.skip(controller, &settings).await;
        controller.acknowledge(operation, result).await;
        Ok(())
    }
}

/// Raises or lowers the volume by a fixed step.
#[derive(Debug)]
pub struct VolumeStep {
    up: bool,
}

impl VolumeStep {
    #[must_use]
    pub fn up() -> Self {
        Self { up: true }
    }

    #[must_use]
    pub fn down() -> Self {
        Self { up: false }
    }

    async fn step(&self, controller: &Controller, settings: &VolumeStepSettings) -> Result<u8> {
        let step = i32::from(settings.step());
        let delta = if self.up { step } else { -step };
        let client_id = controller.client_id().await?;
        controller
            .remote()
            .change_volume(&client_id, delta, settings.device_id())
            .await
    }
}

#[async_trait]
impl Action for VolumeStep {
    type Settings = VolumeStepSettings;

    async fn will_appear(&mut self, controller: &Controller, _settings: VolumeStepSettings) -> Result<()> {
        controller
            .set_title(if self.up { "🔊+" } else { "🔉−" })
            .await;
        Ok(())
    }

    async fn key_down(&mut self, controller: &Controller, settings: VolumeStepSettings) -> Result<()> {
        let result = self.step(controller, &settings).await;
        if let Some(volume) = controller
            .acknowledge(if self.up { "volume up" } else { "volume down" }, result)
            .await
        {
            debug!("{controller}: volume {volume}%");
        }
        Ok(())
    }
}

/// Sets an absolute volume, such as a quiet level for narration.
#[derive(Debug, Default)]
pub struct VolumePreset;

impl VolumePreset {
    async fn apply(controller: &Controller, settings: &VolumePresetSettings) -> Result<()> {
        let client_id = controller.client_id().await?;
        controller
            .remote()
            .set_volume(&client_id, settings.volume_percent(), settings.device_id())
            .await
    }
}

#[async_trait]
impl Action for VolumePreset {
    type Settings = VolumePresetSettings;

    async fn will_appear(&mut self, controller: &Controller, settings: VolumePresetSettings) -> Result<()> {
        controller.set_title(&settings.label()).await;
        Ok(())
    }

    async fn settings_changed(
        &mut self,
        controller: &Controller,
        settings: VolumePresetSettings,
    ) -> Result<()> {
        controller.set_title(&settings.label()).await;
        Ok(())
    }

    async fn key_down(&mut self, controller: &Controller, settings: VolumePresetSettings) -> Result<()> {
        let result = Self::apply(controller, &settings).await;
        controller.acknowledge("volume preset", result).await;
        Ok(())
    }
}
