//! A host that keeps everything in memory.
//!
//! Every request is recorded as a [`Call`] so that the effect of an event on
//! the surface can be inspected afterwards.

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Mutex, PoisonError,
};

use async_trait::async_trait;
use serde_json::Value;

use super::{Context, Host};
use crate::{
    error::{Error, Result},
    settings::GlobalSettings,
};

#[derive(Clone, Debug, PartialEq)]
pub enum Call {
    SetTitle { context: Context, title: String },
    SetImage { context: Context, image: String },
    ShowOk(Context),
    ShowAlert(Context),
    SetSettings { context: Context, settings: Value },
    SendToInspector { context: Context, payload: Value },
    SetGlobalSettings(GlobalSettings),
}

#[derive(Debug, Default)]
pub struct MemoryHost {
    calls: Mutex<Vec<Call>>,
    global_settings: Mutex<GlobalSettings>,
    settings_lost: AtomicBool,
}

impl MemoryHost {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_global_settings(settings: GlobalSettings) -> Self {
        Self {
            global_settings: Mutex::new(settings),
            ..Self::default()
        }
    }

    /// Replaces the global settings without recording a call, as if another
    /// process had written them.
    pub fn set_global_settings_silently(&self, settings: GlobalSettings) {
        *self
            .global_settings
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = settings;
    }

    /// Fails every further read of the global settings, like a host that
    /// never answers the request.
    pub fn lose_global_settings(&self) {
        self.settings_lost.store(true, Ordering::SeqCst);
    }

    /// All calls so far, oldest first.
    #[must_use]
    pub fn calls(&self) -> Vec<Call> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Titles set on `context`, oldest first.
    #[must_use]
    pub fn titles(&self, context: &Context) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::SetTitle { context: c, title } if &c == context => Some(title),
                _ => None,
            })
            .collect()
    }

    #[must_use]
    pub fn last_title(&self, context: &Context) -> Option<String> {
        self.titles(context).pop()
    }

    fn record(&self, call: Call) {
        trace!("{call:?}");
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(call);
    }
}

#[async_trait]
impl Host for MemoryHost {
    async fn set_title(&self, context: &Context, title: &str) -> Result<()> {
        self.record(Call::SetTitle {
            context: context.clone(),
            title: title.to_owned(),
        });
        Ok(())
    }

    async fn set_image(&self, context: &Context, image: &str) -> Result<()> {
        self.record(Call::SetImage {
            context: context.clone(),
            image: image.to_owned(),
        });
        Ok(())
    }

    async fn show_ok(&self, context: &Context) -> Result<()> {
        self.record(Call::ShowOk(context.clone()));
        Ok(())
    }

    async fn show_alert(&self, context: &Context) -> Result<()> {
        self.record(Call::ShowAlert(context.clone()));
        Ok(())
    }

    async fn set_settings(&self, context: &Context, settings: Value) -> Result<()> {
        self.record(Call::SetSettings {
            context: context.clone(),
            settings,
        });
        Ok(())
    }

    async fn send_to_inspector(
        &self,
        _action: &str,
        context: &Context,
        payload: Value,
    ) -> Result<()> {
        self.record(Call::SendToInspector {
            context: context.clone(),
            payload,
        });
        Ok(())
    }

    async fn global_settings(&self) -> Result<GlobalSettings> {
        if self.settings_lost.load(Ordering::SeqCst) {
            return Err(Error::deadline_exceeded("global settings not received"));
        }
        Ok(self
            .global_settings
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone())
    }

    async fn set_global_settings(&self, settings: &GlobalSettings) -> Result<()> {
        self.set_global_settings_silently(settings.clone());
        self.record(Call::SetGlobalSettings(settings.clone()));
        Ok(())
    }
}
