//! Controls placed on the surface.
//!
//! Every placed control instance is driven by its own worker, running
//! [`run`] over the events of that instance in order. The worker parses the
//! settings delivered with each event into the settings type of the action
//! and calls the matching [`Action`] method.
//!
//! Actions catch their own errors: a failed press or turn flashes an alert,
//! and a failed display update shows a placeholder title. Anything left over
//! is logged by the worker.

pub mod dials;
pub mod playback;
pub mod playlist;

use std::{fmt, sync::Arc};

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use tokio::sync::mpsc;

use crate::{
    api::Remote,
    auth::TokenProvider,
    error::Result,
    host::{Context, Event, Host},
    settings,
};

pub const PLAY_PAUSE: &str = "com.spotdeck.control.play-pause";
pub const NEXT_TRACK: &str = "com.spotdeck.control.next-track";
pub const PREVIOUS_TRACK: &str = "com.spotdeck.control.previous-track";
pub const VOLUME_UP: &str = "com.spotdeck.control.volume-up";
pub const VOLUME_DOWN: &str = "com.spotdeck.control.volume-down";
pub const VOLUME_PRESET: &str = "com.spotdeck.control.volume-preset";
pub const VOLUME_DIAL: &str = "com.spotdeck.control.volume-dial";
pub const TRACK_DIAL: &str = "com.spotdeck.control.track-dial";
pub const SEEK_DIAL: &str = "com.spotdeck.control.seek-dial";
pub const PLAY_PLAYLIST: &str = "com.spotdeck.control.play-playlist";

/// Services shared by all controls.
#[derive(Clone)]
pub struct Services {
    pub host: Arc<dyn Host>,
    pub remote: Arc<dyn Remote>,
    pub tokens: Arc<dyn TokenProvider>,
}

/// Handle of one control instance.
#[derive(Clone)]
pub struct Controller {
    services: Services,
    action: String,
    context: Context,
}

impl Controller {
    #[must_use]
    pub fn new(services: Services, action: impl Into<String>, context: Context) -> Self {
        Self {
            services,
            action: action.into(),
            context,
        }
    }

    #[must_use]
    pub fn action(&self) -> &str {
        &self.action
    }

    #[must_use]
    pub fn context(&self) -> &Context {
        &self.context
    }

    #[must_use]
    pub fn remote(&self) -> &dyn Remote {
        self.services.remote.as_ref()
    }

    #[must_use]
    pub fn tokens(&self) -> &dyn TokenProvider {
        self.services.tokens.as_ref()
    }

    /// The client id from the global settings; empty when none is set.
    pub async fn client_id(&self) -> Result<String> {
        let settings = self.services.host.global_settings().await?;
        Ok(settings.client_id().unwrap_or_default().to_owned())
    }

    pub async fn set_title(&self, title: &str) {
        if let Err(e) = self.services.host.set_title(&self.context, title).await {
            warn!("{self}: could not set title: {e}");
        }
    }

    pub async fn set_image(&self, image: &str) {
        if let Err(e) = self.services.host.set_image(&self.context, image).await {
            warn!("{self}: could not set image: {e}");
        }
    }

    pub async fn show_ok(&self) {
        if let Err(e) = self.services.host.show_ok(&self.context).await {
            warn!("{self}: could not show ok: {e}");
        }
    }

    pub async fn show_alert(&self) {
        if let Err(e) = self.services.host.show_alert(&self.context).await {
            warn!("{self}: could not show alert: {e}");
        }
    }

    /// Logs a failed `operation` and flashes an alert.
    ///
    /// Successes pass through without feedback; dials show them in their
    /// title instead.
    pub async fn report<T>(&self, operation: &str, result: Result<T>) -> Option<T> {
        match result {
            Ok(value) => Some(value),
            Err(e) => {
                error!("{self}: {operation} failed: {e}");
                self.show_alert().await;
                None
            }
        }
    }

    /// Flashes ok or alert on the key depending on `result`.
    pub async fn acknowledge<T>(&self, operation: &str, result: Result<T>) -> Option<T> {
        let value = self.report(operation, result).await?;
        self.show_ok().await;
        Some(value)
    }

    /// Persists the settings of this instance.
    pub async fn set_settings<S>(&self, settings: &S) -> Result<()>
    where
        S: Serialize + Sync,
    {
        let settings = serde_json::to_value(settings)?;
        self.services
            .host
            .set_settings(&self.context, settings)
            .await
    }

    pub async fn send_to_inspector(&self, payload: Value) {
        if let Err(e) = self
            .services
            .host
            .send_to_inspector(&self.action, &self.context, payload)
            .await
        {
            warn!("{self}: could not reply to inspector: {e}");
        }
    }
}

impl fmt::Display for Controller {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = self.action.rsplit('.').next().unwrap_or(&self.action);
        write!(f, "{name} [{}]", self.context)
    }
}

/// Behavior of one kind of control.
///
/// All methods default to doing nothing.
#[async_trait]
pub trait Action: Send {
    type Settings: DeserializeOwned + Default + Send;

    async fn will_appear(&mut self, _controller: &Controller, _settings: Self::Settings) -> Result<()> {
        Ok(())
    }

    async fn key_down(&mut self, _controller: &Controller, _settings: Self::Settings) -> Result<()> {
        Ok(())
    }

    async fn dial_rotate(
        &mut self,
        _controller: &Controller,
        _settings: Self::Settings,
        _ticks: i32,
    ) -> Result<()> {
        Ok(())
    }

    async fn dial_down(&mut self, _controller: &Controller, _settings: Self::Settings) -> Result<()> {
        Ok(())
    }

    async fn settings_changed(
        &mut self,
        _controller: &Controller,
        _settings: Self::Settings,
    ) -> Result<()> {
        Ok(())
    }

    async fn inspector_message(
        &mut self,
        _controller: &Controller,
        _event: &str,
        _payload: Value,
    ) -> Result<()> {
        Ok(())
    }
}

/// Lifecycle of a control instance as seen by its worker.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Phase {
    /// Spawned, waiting for the first appearance.
    Appearing,
    /// Visible and waiting for input.
    Idle,
    /// Handling an event; further events queue up.
    AwaitingResponse,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Appearing => write!(f, "appearing"),
            Phase::Idle => write!(f, "idle"),
            Phase::AwaitingResponse => write!(f, "awaiting response"),
        }
    }
}

/// Drives `action` with the events of one control instance until the
/// sender is dropped or the instance disappears.
pub async fn run<A>(mut action: A, controller: Controller, mut events: mpsc::UnboundedReceiver<Event>)
where
    A: Action,
{
    let mut phase = Phase::Appearing;
    trace!("{controller}: {phase}");

    while let Some(event) = events.recv().await {
        if event == Event::WillDisappear {
            break;
        }

        if phase == Phase::Appearing && !matches!(event, Event::WillAppear { .. }) {
            debug!("{controller}: event before appearance");
        }
        phase = Phase::AwaitingResponse;

        let result = match event {
            Event::WillAppear { settings } => {
                action
                    .will_appear(&controller, settings::parse(&settings))
                    .await
            }
            Event::KeyDown { settings } => {
                action.key_down(&controller, settings::parse(&settings)).await
            }
            Event::DialRotate { settings, ticks } => {
                action
                    .dial_rotate(&controller, settings::parse(&settings), ticks)
                    .await
            }
            Event::DialDown { settings } => {
                action.dial_down(&controller, settings::parse(&settings)).await
            }
            Event::SettingsChanged { settings } => {
                action
                    .settings_changed(&controller, settings::parse(&settings))
                    .await
            }
            Event::InspectorMessage { event, payload } => {
                action
                    .inspector_message(&controller, &event, payload)
                    .await
            }
            Event::WillDisappear => Ok(()),
        };

        if let Err(e) = result {
            error!("{controller} ({phase}): {e}");
        }
        phase = Phase::Idle;
    }

    trace!("{controller}: gone");
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::testing::Harness;

    #[derive(Default)]
    struct Recorder {
        seen: Vec<String>,
    }

    #[async_trait]
    impl Action for Recorder {
        type Settings = crate::settings::VolumeStepSettings;

        async fn will_appear(&mut self, controller: &Controller, settings: Self::Settings) -> Result<()> {
            self.seen.push(format!("appear {}", settings.step()));
            controller.set_title(&self.seen.join(",")).await;
            Ok(())
        }

        async fn key_down(&mut self, controller: &Controller, settings: Self::Settings) -> Result<()> {
            self.seen.push(format!("key {}", settings.step()));
            controller.set_title(&self.seen.join(",")).await;
            Ok(())
        }
    }

    #[tokio::test]
    async fn events_are_handled_in_order_until_disappearance() {
        let harness = Harness::new();
        let controller = harness.controller(VOLUME_UP);
        let (events, receiver) = mpsc::unbounded_channel();

        events
            .send(Event::WillAppear {
                settings: json!({"step": 5}),
            })
            .unwrap();
        events
            .send(Event::KeyDown {
                settings: json!({"step": "7"}),
            })
            .unwrap();
        events.send(Event::WillDisappear).unwrap();
        events
            .send(Event::KeyDown {
                settings: json!({}),
            })
            .unwrap();

        run(Recorder::default(), controller.clone(), receiver).await;

        assert_eq!(
            harness.host.titles(controller.context()),
            vec!["appear 5".to_owned(), "appear 5,key 7".to_owned()]
        );
    }

    #[test]
    fn controller_names_action_and_context() {
        let harness = Harness::new();
        let controller = harness.controller(TRACK_DIAL);
        assert_eq!(controller.to_string(), "track-dial [ctx]");
    }
}
