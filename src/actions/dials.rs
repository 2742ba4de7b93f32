//! Dials for volume, track skipping and seeking.
//!
//! Rotations arrive as signed tick counts, positive for clockwise. A failed
//! turn or press flashes an alert on the dial and falls back to the
//! placeholder title.

use std::time::Duration;

use async_trait::async_trait;

use super::{playback::Skip, Action, Controller};
use crate::{
    error::Result,
    settings::{SeekDialSettings, TrackDialSettings, VolumeDialSettings},
};

/// Rotate to change the volume, press to mute or unmute.
#[derive(Debug, Default)]
pub struct VolumeDial;

impl VolumeDial {
    const PLACEHOLDER: &'static str = "🔊 --";

    async fn refresh_title(controller: &Controller) {
        let title = match Self::fetch_volume(controller).await {
            Ok(volume) => volume_title(volume),
            Err(e) => {
                debug!("{controller}: volume unavailable: {e}");
                Self::PLACEHOLDER.to_owned()
            }
        };
        controller.set_title(&title).await;
    }

    async fn fetch_volume(controller: &Controller) -> Result<u8> {
        let client_id = controller.client_id().await?;
        let state = controller.remote().playback_state(&client_id).await?;
        Ok(state
            .and_then(|state| state.volume_percent())
            .unwrap_or(0))
    }

    async fn change_volume(
        controller: &Controller,
        settings: &VolumeDialSettings,
        ticks: i32,
    ) -> Result<u8> {
        let delta = ticks.saturating_mul(i32::from(settings.step_per_tick()));
        let client_id = controller.client_id().await?;
        controller
            .remote()
            .change_volume(&client_id, delta, settings.device_id())
            .await
    }

    async fn toggle_mute(controller: &Controller, mut settings: VolumeDialSettings) -> Result<()> {
        let client_id = controller.client_id().await?;
        let remote = controller.remote();
        let current = remote
            .playback_state(&client_id)
            .await?
            .and_then(|state| state.volume_percent())
            .unwrap_or(VolumeDialSettings::DEFAULT_RESTORE_VOLUME);

        if current > 0 {
            settings.muted_volume = Some(current);
            controller.set_settings(&settings).await?;
            remote.set_volume(&client_id, 0, settings.device_id()).await?;
            debug!("{controller}: muted at {current}%");
        } else {
            let restore = settings.restore_volume();
            remote
                .set_volume(&client_id, restore, settings.device_id())
                .await?;
            settings.muted_volume = None;
            controller.set_settings(&settings).await?;
            debug!("{controller}: unmuted to {restore}%");
        }

        Ok(())
    }

    /// Shows the outcome of a turn or press in the title.
    async fn finish<T>(controller: &Controller, operation: &str, result: Result<T>) {
        if controller.report(operation, result).await.is_some() {
            Self::refresh_title(controller).await;
        } else {
            controller.set_title(Self::PLACEHOLDER).await;
        }
    }
}

#[must_use]
pub fn volume_title(volume: u8) -> String {
    let icon = if volume == 0 { "🔇" } else { "🔊" };
    format!("{icon} {volume}%")
}

#[async_trait]
impl Action for VolumeDial {
    type Settings = VolumeDialSettings;

    async fn will_appear(&mut self, controller: &Controller, _settings: VolumeDialSettings) -> Result<()> {
        Self::refresh_title(controller).await;
        Ok(())
    }

    async fn dial_rotate(
        &mut self,
        controller: &Controller,
        settings: VolumeDialSettings,
        ticks: i32,
    ) -> Result<()> {
        let result = Self::change_volume(controller, &settings, ticks).await;
        Self::finish(controller, "volume change", result).await;
        Ok(())
    }

    async fn dial_down(&mut self, controller: &Controller, settings: VolumeDialSettings) -> Result<()> {
        let result = Self::toggle_mute(controller, settings).await;
        Self::finish(controller, "mute toggle", result).await;
        Ok(())
    }
}

/// Collects rotation ticks until they add up to whole skips.
///
/// Ticks are only taken out once the skip they pay for has gone through, so
/// a failed skip leaves them for the next turn.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct TickAccumulator {
    ticks: i64,
}

impl TickAccumulator {
    pub fn push(&mut self, ticks: i32) {
        self.ticks += i64::from(ticks);
    }

    /// The skip that the collected ticks pay for, if any.
    ///
    /// A `threshold` of zero counts as one.
    #[must_use]
    pub fn pending(&self, threshold: u32) -> Option<Skip> {
        let threshold = i64::from(threshold.max(1));
        if self.ticks >= threshold {
            Some(Skip::Next)
        } else if self.ticks <= -threshold {
            Some(Skip::Previous)
        } else {
            None
        }
    }

    /// Takes out the ticks of a skip that went through.
    pub fn consume(&mut self, skip: Skip, threshold: u32) {
        let threshold = i64::from(threshold.max(1));
        match skip {
            Skip::Next => self.ticks -= threshold,
            Skip::Previous => self.ticks += threshold,
        }
    }

    #[must_use]
    pub fn remainder(&self) -> i64 {
        self.ticks
    }
}

/// Rotate to skip tracks, press to play or pause.
///
/// Each instance accumulates ticks separately, so a dial configured to skip
/// every three ticks ignores single-detent nudges.
#[derive(Debug, Default)]
pub struct TrackDial {
    accumulator: TickAccumulator,
}

impl TrackDial {
    /// Time for the remote to settle on the new track before it is shown.
    pub const REFRESH_DELAY: Duration = Duration::from_millis(300);

    /// Longest track name shown in full.
    const MAX_NAME_CHARS: usize = 12;

    const PLACEHOLDER: &'static str = "🎵 --";

    async fn refresh_title(controller: &Controller) {
        let title = match Self::fetch_title(controller).await {
            Ok(Some(title)) => title,
            Ok(None) => Self::PLACEHOLDER.to_owned(),
            Err(e) => {
                debug!("{controller}: track unavailable: {e}");
                Self::PLACEHOLDER.to_owned()
            }
        };
        controller.set_title(&title).await;
    }

    async fn fetch_title(controller: &Controller) -> Result<Option<String>> {
        let client_id = controller.client_id().await?;
        let state = controller.remote().playback_state(&client_id).await?;
        Ok(state.and_then(|state| {
            state
                .current_track
                .as_ref()
                .map(|track| track_title(state.is_playing, &track.name))
        }))
    }

    fn schedule_refresh(controller: &Controller) {
        let controller = controller.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Self::REFRESH_DELAY).await;
            Self::refresh_title(&controller).await;
        });
    }

    /// Fires every skip the accumulated ticks pay for, one at a time.
    ///
    /// Returns the number of skips that went through.
    async fn skip_tracks(&mut self, controller: &Controller, settings: &TrackDialSettings) -> Result<u32> {
        let threshold = settings.ticks_to_skip();
        if self.accumulator.pending(threshold).is_none() {
            return Ok(0);
        }

        let client_id = controller.client_id().await?;
        let remote = controller.remote();
        let mut skipped = 0;
        while let Some(skip) = self.accumulator.pending(threshold) {
            match skip {
                Skip::Next => remote.next_track(&client_id, settings.device_id()).await?,
                Skip::Previous => {
                    remote
                        .previous_track(&client_id, settings.device_id())
                        .await?;
                }
            }
            self.accumulator.consume(skip, threshold);
            skipped += 1;
        }
        Ok(skipped)
    }

    async fn toggle(controller: &Controller, settings: &TrackDialSettings) -> Result<bool> {
        let client_id = controller.client_id().await?;
        controller
            .remote()
            .toggle_play_pause(&client_id, settings.device_id())
            .await
    }
}

/// Title of the track dial, cutting long names short.
#[must_use]
pub fn track_title(is_playing: bool, name: &str) -> String {
    let icon = if is_playing { "▶" } else { "⏸" };
    if name.chars().count() > TrackDial::MAX_NAME_CHARS {
        let short: String = name.chars().take(TrackDial::MAX_NAME_CHARS - 1).collect();
        format!("{icon} {short}…")
    } else {
        format!("{icon} {name}")
    }
}

#[async_trait]
impl Action for TrackDial {
    type Settings = TrackDialSettings;

    async fn will_appear(&mut self, controller: &Controller, _settings: TrackDialSettings) -> Result<()> {
        Self::refresh_title(controller).await;
        Ok(())
    }

    async fn dial_rotate(
        &mut self,
        controller: &Controller,
        settings: TrackDialSettings,
        ticks: i32,
    ) -> Result<()> {
        self.accumulator.push(ticks);
        let result = self.skip_tracks(controller, &settings).await;
        trace!(
            "{controller}: {} ticks left",
            self.accumulator.remainder()
        );

        if let Some(skipped) = controller.report("track skip", result).await {
            trace!("{controller}: skipped {skipped} tracks");
            Self::schedule_refresh(controller);
        } else {
            controller.set_title(Self::PLACEHOLDER).await;
        }
        Ok(())
    }

    async fn dial_down(&mut self, controller: &Controller, settings: TrackDialSettings) -> Result<()> {
        let result = Self::toggle(controller, &settings).await;
        if controller.report("play/pause", result).await.is_some() {
            Self::refresh_title(controller).await;
        } else {
            controller.set_title(Self::PLACEHOLDER).await;
        }
        Ok(())
    }
}

/// Seek position for a rotation, clamped to the track.
#[must_use]
pub fn seek_target(progress_ms: u64, duration_ms: u64, ticks: i32, ms_per_tick: u32) -> u64 {
    let offset = i64::from(ticks) * i64::from(ms_per_tick);
    let progress = i64::try_from(progress_ms).unwrap_or(i64::MAX);
    let duration = i64::try_from(duration_ms).unwrap_or(i64::MAX);
    let target = progress.saturating_add(offset).clamp(0, duration);
    u64::try_from(target).unwrap_or(0)
}

/// Rotate to seek within the track, press to restart it.
#[derive(Debug, Default)]
pub struct SeekDial;

impl SeekDial {
    const TITLE: &'static str = "⏩ Seek";

    /// Seeks relative to the current position. `None` when nothing is
    /// loaded.
    async fn seek_by(
        controller: &Controller,
        settings: &SeekDialSettings,
        ticks: i32,
    ) -> Result<Option<u64>> {
        let client_id = controller.client_id().await?;
        let remote = controller.remote();

        let Some((progress, duration)) = remote.playback_state(&client_id).await?.and_then(|state| {
            state
                .current_track
                .map(|track| (state.progress_ms.unwrap_or(0), track.duration_ms))
        }) else {
            return Ok(None);
        };

        let target = seek_target(progress, duration, ticks, settings.seek_ms_per_tick());
        remote.seek(&client_id, target, settings.device_id()).await?;
        Ok(Some(target))
    }

    async fn restart(controller: &Controller, settings: &SeekDialSettings) -> Result<()> {
        let client_id = controller.client_id().await?;
        controller
            .remote()
            .seek(&client_id, 0, settings.device_id())
            .await
    }
}

#[async_trait]
impl Action for SeekDial {
    type Settings = SeekDialSettings;

    async fn will_appear(&mut self, controller: &Controller, _settings: SeekDialSettings) -> Result<()> {
        controller.set_title(Self::TITLE).await;
        Ok(())
    }

    async fn dial_rotate(
        &mut self,
        controller: &Controller,
        settings: SeekDialSettings,
        ticks: i32,
    ) -> Result<()> {
        let result = Self::seek_by(controller, &settings, ticks).await;
        match controller.report("seek", result).await {
            Some(Some(target)) => trace!("{controller}: at {target} ms"),
            Some(None) => trace!("{controller}: nothing to seek in"),
            None => controller.set_title(Self::TITLE).await,
        }
        Ok(())
    }

    async fn dial_down(&mut self, controller: &Controller, settings: SeekDialSettings) -> Result<()> {
        let result = Self::restart(controller, &settings).await;
        if controller.report("restart", result).await.is_none() {
            controller.set_title(Self::TITLE).await;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::{
        actions::{SEEK_DIAL, TRACK_DIAL, VOLUME_DIAL},
        host::memory::Call,
        settings,
        testing::{snapshot, Harness, RemoteCall},
    };

    /// Drains every pending skip as if each went through.
    fn drain(accumulator: &mut TickAccumulator, threshold: u32) -> Vec<Skip> {
        let mut skips = Vec::new();
        while let Some(skip) = accumulator.pending(threshold) {
            accumulator.consume(skip, threshold);
            skips.push(skip);
        }
        skips
    }

    #[test]
    fn accumulator_fires_whole_skips_only() {
        let mut accumulator = TickAccumulator::default();
        accumulator.push(1);
        accumulator.push(1);
        assert_eq!(accumulator.pending(3), None);
        accumulator.push(2);
        assert_eq!(drain(&mut accumulator, 3), vec![Skip::Next]);
        assert_eq!(accumulator.remainder(), 1);

        accumulator.push(-7);
        assert_eq!(drain(&mut accumulator, 3), vec![Skip::Previous, Skip::Previous]);
        assert_eq!(accumulator.remainder(), 0);

        accumulator.push(-2);
        assert!(drain(&mut accumulator, 3).is_empty());
        assert_eq!(accumulator.remainder(), -2);

        accumulator.push(7);
        assert_eq!(drain(&mut accumulator, 0).len(), 5);
        assert_eq!(accumulator.remainder(), 0);
    }

    #[test]
    fn seek_is_clamped_to_track() {
        assert_eq!(seek_target(190_000, 200_000, 1, 5000), 195_000);
        assert_eq!(seek_target(190_000, 200_000, 5, 5000), 200_000);
        assert_eq!(seek_target(3000, 200_000, -1, 5000), 0);
    }

    #[test]
    fn long_track_names_are_shortened() {
        assert_eq!(track_title(true, "Teardrop"), "▶ Teardrop");
        assert_eq!(track_title(false, "Exactly12Chr"), "⏸ Exactly12Chr");
        assert_eq!(
            track_title(true, "Unfinished Sympathy"),
            "▶ Unfinished …"
        );
    }

    #[test]
    fn volume_title_shows_mute() {
        assert_eq!(volume_title(40), "🔊 40%");
        assert_eq!(volume_title(0), "🔇 0%");
    }

    #[tokio::test]
    async fn volume_dial_scales_ticks() {
        let harness = Harness::new();
        harness.remote.set_state(Some(snapshot(true, 40, 0, 1000)));
        let controller = harness.controller(VOLUME_DIAL);

        VolumeDial
            .dial_rotate(&controller, settings::parse(&json!({"stepPerTick": 3})), -2)
            .await
            .unwrap();

        assert_eq!(harness.remote.calls(), vec![RemoteCall::SetVolume(34, None)]);
        assert_eq!(
            harness.host.last_title(controller.context()).as_deref(),
            Some("🔊 34%")
        );
    }

    #[tokio::test]
    async fn volume_dial_press_mutes_and_restores() {
        let harness = Harness::new();
        harness.remote.set_state(Some(snapshot(true, 40, 0, 1000)));
        let controller = harness.controller(VOLUME_DIAL);

        VolumeDial
            .dial_down(&controller, settings::parse(&json!({"deviceId": "desk"})))
            .await
            .unwrap();
        assert_eq!(
            harness.remote.calls(),
            vec![RemoteCall::SetVolume(0, Some("desk".to_owned()))]
        );
        let stored = harness
            .host
            .calls()
            .into_iter()
            .find_map(|call| match call {
                Call::SetSettings { settings, .. } => Some(settings),
                _ => None,
            })
            .unwrap();
        assert_eq!(stored, json!({"deviceId": "desk", "mutedVolume": 40}));
        assert_eq!(
            harness.host.last_title(controller.context()).as_deref(),
            Some("🔇 0%")
        );

        VolumeDial
            .dial_down(&controller, settings::parse(&stored))
            .await
            .unwrap();
        assert_eq!(
            harness.remote.calls().last(),
            Some(&RemoteCall::SetVolume(40, Some("desk".to_owned())))
        );
        let cleared = harness
            .host
            .calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::SetSettings { settings, .. } => Some(settings),
                _ => None,
            })
            .last()
            .unwrap();
        assert_eq!(cleared, json!({"deviceId": "desk"}));
    }

    #[tokio::test(start_paused = true)]
    async fn track_dial_skips_and_refreshes_later() {
        let harness = Harness::new();
        harness.remote.set_state(Some(snapshot(true, 40, 0, 1000)));
        let controller = harness.controller(TRACK_DIAL);
        let settings = json!({"ticksToSkip": 2});
        let mut dial = TrackDial::default();

        dial.dial_rotate(&controller, settings::parse(&settings), 1)
            .await
            .unwrap();
        assert!(harness.remote.calls().is_empty());

        dial.dial_rotate(&controller, settings::parse(&settings), 4)
            .await
            .unwrap();
        assert_eq!(
            harness.remote.calls(),
            vec![RemoteCall::Next(None), RemoteCall::Next(None)]
        );
        assert!(harness.host.titles(controller.context()).is_empty());

        tokio::time::sleep(TrackDial::REFRESH_DELAY + Duration::from_millis(10)).await;
        assert_eq!(
            harness.host.last_title(controller.context()).as_deref(),
            Some("▶ Teardrop")
        );
    }

    #[tokio::test]
    async fn track_dial_counter_clockwise_goes_back() {
        let harness = Harness::new();
        let controller = harness.controller(TRACK_DIAL);

        TrackDial::default()
            .dial_rotate(&controller, TrackDialSettings::default(), -2)
            .await
            .unwrap();
        assert_eq!(
            harness.remote.calls(),
            vec![RemoteCall::Previous(None), RemoteCall::Previous(None)]
        );
    }

    #[tokio::test]
    async fn seek_dial_clamps_and_ignores_idle_player() {
        let harness = Harness::new();
        let controller = harness.controller(SEEK_DIAL);

        SeekDial
            .dial_rotate(&controller, SeekDialSettings::default(), 1)
            .await
            .unwrap();
        assert!(harness.remote.calls().is_empty());

        harness
            .remote
            .set_state(Some(snapshot(true, 40, 190_000, 200_000)));
        SeekDial
            .dial_rotate(&controller, SeekDialSettings::default(), 5)
            .await
            .unwrap();
        SeekDial
            .dial_down(&controller, SeekDialSettings::default())
            .await
            .unwrap();
        assert_eq!(
            harness.remote.calls(),
            vec![RemoteCall::Seek(200_000, None), RemoteCall::Seek(0, None)]
        );
    }

    fn alerts(harness: &Harness) -> usize {
        harness
            .host
            .calls()
            .into_iter()
            .filter(|call| matches!(call, Call::ShowAlert(_)))
            .count()
    }

    #[tokio::test]
    async fn volume_dial_failures_alert_and_show_placeholder() {
        let harness = Harness::new();
        harness.remote.set_state(Some(snapshot(true, 40, 0, 1000)));
        let controller = harness.controller(VOLUME_DIAL);
        let mut dial = VolumeDial;

        dial.will_appear(&controller, VolumeDialSettings::default())
            .await
            .unwrap();
        assert_eq!(
            harness.host.last_title(controller.context()).as_deref(),
            Some("🔊 40%")
        );

        harness.remote.go_offline();
        dial.dial_rotate(&controller, VolumeDialSettings::default(), 3)
            .await
            .unwrap();
        assert_eq!(alerts(&harness), 1);
        assert_eq!(
            harness.host.last_title(controller.context()).as_deref(),
            Some("🔊 --")
        );

        dial.dial_down(&controller, VolumeDialSettings::default())
            .await
            .unwrap();
        assert_eq!(alerts(&harness), 2);
        assert!(harness.remote.calls().is_empty());
    }

    #[tokio::test]
    async fn track_dial_keeps_ticks_of_failed_skips() {
        let harness = Harness::new();
        harness.remote.go_offline_after(1);
        let controller = harness.controller(TRACK_DIAL);
        let mut dial = TrackDial::default();

        dial.dial_rotate(&controller, TrackDialSettings::default(), 3)
            .await
            .unwrap();

        assert_eq!(harness.remote.calls(), vec![RemoteCall::Next(None)]);
        assert_eq!(dial.accumulator.remainder(), 2);
        assert_eq!(alerts(&harness), 1);
        assert_eq!(
            harness.host.last_title(controller.context()).as_deref(),
            Some("🎵 --")
        );
    }

    #[tokio::test]
    async fn track_dial_press_failure_alerts() {
        let harness = Harness::new();
        harness.remote.go_offline();
        let controller = harness.controller(TRACK_DIAL);

        TrackDial::default()
            .dial_down(&controller, TrackDialSettings::default())
            .await
            .unwrap();
        assert_eq!(alerts(&harness), 1);
        assert_eq!(
            harness.host.last_title(controller.context()).as_deref(),
            Some("🎵 --")
        );
    }

    #[tokio::test(start_paused = true)]
    async fn track_dial_refreshes_after_partial_turns() {
        let harness = Harness::new();
        harness.remote.set_state(Some(snapshot(false, 40, 0, 1000)));
        let controller = harness.controller(TRACK_DIAL);

        TrackDial::default()
            .dial_rotate(&controller, settings::parse(&json!({"ticksToSkip": 3})), 1)
            .await
            .unwrap();
        assert!(harness.remote.calls().is_empty());

        tokio::time::sleep(TrackDial::REFRESH_DELAY + Duration::from_millis(10)).await;
        assert_eq!(
            harness.host.last_title(controller.context()).as_deref(),
            Some("⏸ Teardrop")
        );
    }

    #[tokio::test]
    async fn seek_dial_failures_alert() {
        let harness = Harness::new();
        harness
            .remote
            .set_state(Some(snapshot(true, 40, 10_000, 200_000)));
        harness.remote.go_offline();
        let controller = harness.controller(SEEK_DIAL);

        SeekDial
            .dial_rotate(&controller, SeekDialSettings::default(), 1)
            .await
            .unwrap();
        SeekDial
            .dial_down(&controller, SeekDialSettings::default())
            .await
            .unwrap();

        assert_eq!(alerts(&harness), 2);
        assert_eq!(
            harness.host.last_title(controller.context()).as_deref(),
            Some("⏩ Seek")
        );
    }
}
