//! Stream Deck host over its local WebSocket.
//!
//! The Stream Deck software launches the plugin with a port, a plugin UUID
//! and the name of the registration event. The plugin connects to
//! `ws://127.0.0.1:<port>`, registers, and then exchanges JSON messages for
//! the lifetime of the process.
//!
//! Incoming messages are read on a background task and delivered as
//! [`Envelope`]s; the receiver ends when the connection closes. Outgoing
//! messages are queued to a writer task so that any number of control
//! workers can talk to the host without contending for the socket.

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::sync::{mpsc, watch};
use tokio_tungstenite::tungstenite::Message as WebsocketMessage;

use super::{Context, Envelope, Event, Host};
use crate::{
    error::{Error, Result},
    protocol::host::{
        ImagePayload, Inbound, Outbound, Registration, TitlePayload, TARGET_BOTH,
    },
    settings::GlobalSettings,
};

pub struct WebSocketHost {
    plugin_uuid: String,
    outbound: mpsc::UnboundedSender<WebsocketMessage>,
    global_settings: Arc<watch::Sender<Option<GlobalSettings>>>,
}

impl WebSocketHost {
    /// Time to wait for the host to answer a global settings request.
    const GLOBAL_SETTINGS_TIMEOUT: Duration = Duration::from_secs(5);

    /// Connects to the host on the loopback interface and registers the
    /// plugin.
    ///
    /// Returns the host handle and the receiver of inbound events.
    ///
    /// # Errors
    ///
    /// Returns error if the connection or the registration fails.
    pub async fn connect(
        port: u16,
        plugin_uuid: &str,
        register_event: &str,
    ) -> Result<(Self, mpsc::UnboundedReceiver<Envelope>)> {
        let url = format!("ws://127.0.0.1:{port}");
        debug!("connecting to {url}");

        let (ws_stream, _) = tokio_tungstenite::connect_async(&url).await?;
        let (mut ws_tx, mut ws_rx) = ws_stream.split();

        let registration = serde_json::to_string(&Registration {
            event: register_event,
            uuid: plugin_uuid,
        })?;
        ws_tx.send(WebsocketMessage::text(registration)).await?;
        info!("registered with host as {plugin_uuid}");

        let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<WebsocketMessage>();
        tokio::spawn(async move {
            while let Some(message) = outbound_rx.recv().await {
                trace!("sending message: {message:?}");
                if let Err(e) = ws_tx.send(message).await {
                    error!("error sending message: {e}");
                    break;
                }
            }
            if let Err(e) = ws_tx.close().await {
                debug!("error closing host connection: {e}");
            }
        });

        let global_settings = Arc::new(watch::channel(None).0);
        let (events_tx, events_rx) = mpsc::unbounded_channel();

        let global_settings_tx = Arc::clone(&global_settings);
        tokio::spawn(async move {
            while let Some(message) = ws_rx.next().await {
                match message {
                    Ok(WebsocketMessage::Text(text)) => {
                        if let Some(envelope) = handle_text(text.as_str(), &global_settings_tx) {
                            if events_tx.send(envelope).is_err() {
                                break;
                            }
                        }
                    }
                    Ok(WebsocketMessage::Close(payload)) => {
                        info!("connection closed by host: {payload:?}");
                        break;
                    }
                    Ok(_) => trace!("message type unimplemented"),
                    Err(e) => {
                        error!("error receiving message: {e}");
                        break;
                    }
                }
            }
        });

        let host = Self {
            plugin_uuid: plugin_uuid.to_owned(),
            outbound: outbound_tx,
            global_settings,
        };
        host.send(&Outbound::GetGlobalSettings {
            context: &host.plugin_uuid,
        })?;

        Ok((host, events_rx))
    }

    fn send(&self, message: &Outbound<'_>) -> Result<()> {
        let text = serde_json::to_string(message)?;
        self.outbound
            .send(WebsocketMessage::text(text))
            .map_err(|_| Error::unavailable("host connection closed"))
    }
}

/// Parses one inbound message, caching global settings on the way.
fn handle_text(
    text: &str,
    global_settings: &watch::Sender<Option<GlobalSettings>>,
) -> Option<Envelope> {
    let inbound = match serde_json::from_str::<Inbound>(text) {
        Ok(inbound) => inbound,
        Err(e) => {
            error!("error parsing message: {e}");
            trace!("{text}");
            return None;
        }
    };

    let (action, context, event) = match inbound {
        Inbound::WillAppear {
            action,
            context,
            payload,
        } => (
            action,
            context,
            Event::WillAppear {
                settings: payload.settings,
            },
        ),
        Inbound::WillDisappear { action, context } => (action, context, Event::WillDisappear),
        Inbound::KeyDown {
            action,
            context,
            payload,
        } => (
            action,
            context,
            Event::KeyDown {
                settings: payload.settings,
            },
        ),
        Inbound::DialRotate {
            action,
            context,
            payload,
        } => (
            action,
            context,
            Event::DialRotate {
                settings: payload.settings,
                ticks: payload.ticks,
            },
        ),
        Inbound::DialDown {
            action,
            context,
            payload,
        } => (
            action,
            context,
            Event::DialDown {
                settings: payload.settings,
            },
        ),
        Inbound::DidReceiveSettings {
            action,
            context,
            payload,
        } => (
            action,
            context,
            Event::SettingsChanged {
                settings: payload.settings,
            },
        ),
        Inbound::SendToPlugin {
            action,
            context,
            mut payload,
        } => {
            let Some(event) = payload
                .get("event")
                .and_then(Value::as_str)
                .map(ToOwned::to_owned)
            else {
                debug!("ignoring inspector message without event");
                return None;
            };
            let payload = payload
                .get_mut("payload")
                .map(Value::take)
                .unwrap_or_default();
            (action, context, Event::InspectorMessage { event, payload })
        }
        Inbound::DidReceiveGlobalSettings { payload } => {
            let settings = if payload.settings.is_null() {
                GlobalSettings::default()
            } else {
                serde_json::from_value(payload.settings).unwrap_or_else(|e| {
                    warn!("ignoring invalid global settings: {e}");
                    GlobalSettings::default()
                })
            };
            debug!(
                "received global settings (client id {})",
                if settings.client_id().is_some() { "set" } else { "unset" }
            );
            global_settings.send_replace(Some(settings));
            return None;
        }
        Inbound::Other => return None,
    };

    Some(Envelope {
        action,
        context,
        event,
    })
}

#[async_trait]
impl Host for WebSocketHost {
    async fn set_title(&self, context: &Context, title: &str) -> Result<()> {
        self.send(&Outbound::SetTitle {
            context,
            payload: TitlePayload {
                title,
                target: TARGET_BOTH,
            },
        })
    }

    async fn set_image(&self, context: &Context, image: &str) -> Result<()> {
        self.send(&Outbound::SetImage {
            context,
            payload: ImagePayload {
                image,
                target: TARGET_BOTH,
            },
        })
    }

    async fn show_ok(&self, context: &Context) -> Result<()> {
        self.send(&Outbound::ShowOk { context })
    }

    async fn show_alert(&self, context: &Context) -> Result<()> {
        self.send(&Outbound::ShowAlert { context })
    }

    async fn set_settings(&self, context: &Context, settings: Value) -> Result<()> {
        self.send(&Outbound::SetSettings {
            context,
            payload: settings,
        })
    }

    async fn send_to_inspector(
        &self,
        action: &str,
        context: &Context,
        payload: Value,
    ) -> Result<()> {
        self.send(&Outbound::SendToPropertyInspector {
            action,
            context,
            payload,
        })
    }

    async fn global_settings(&self) -> Result<GlobalSettings> {
        let mut receiver = self.global_settings.subscribe();
        let settings = tokio::time::timeout(
            Self::GLOBAL_SETTINGS_TIMEOUT,
            receiver.wait_for(Option::is_some),
        )
        .await?
        .map_err(|_| Error::unavailable("host connection closed"))?
        .clone();

        Ok(settings.unwrap_or_default())
    }

    async fn set_global_settings(&self, settings: &GlobalSettings) -> Result<()> {
        self.send(&Outbound::SetGlobalSettings {
            context: &self.plugin_uuid,
            payload: settings,
        })?;

        // The host does not echo global settings back to their writer.
        self.global_settings.send_replace(Some(settings.clone()));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn inspector_messages_are_unwrapped() {
        let (global_settings, _) = watch::channel(None);
        let text = json!({
            "action": "com.spotdeck.control.play-playlist",
            "event": "sendToPlugin",
            "context": "ctx1",
            "payload": {"event": "authenticate", "payload": {"clientId": "abc"}}
        })
        .to_string();

        let envelope = handle_text(&text, &global_settings).unwrap();
        assert_eq!(envelope.context, Context::new("ctx1"));
        assert_eq!(
            envelope.event,
            Event::InspectorMessage {
                event: "authenticate".to_owned(),
                payload: json!({"clientId": "abc"}),
            }
        );
    }

    #[test]
    fn global_settings_are_cached_not_dispatched() {
        let (global_settings, receiver) = watch::channel(None);
        let text = json!({
            "event": "didReceiveGlobalSettings",
            "payload": {"settings": {"clientId": "abc"}}
        })
        .to_string();

        assert!(handle_text(&text, &global_settings).is_none());
        let cached = receiver.borrow().clone().unwrap();
        assert_eq!(cached.client_id(), Some("abc"));
    }
}
