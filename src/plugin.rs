//! Dispatches host events to per-control workers.
//!
//! Each placed control instance gets its own worker task, spawned on first
//! contact and torn down when the instance disappears. Events of one instance
//! are handled in order; different instances run concurrently.

use std::collections::HashMap;

use tokio::{sync::mpsc, task::JoinHandle};

use crate::{
    actions::{
        self,
        dials::{SeekDial, TrackDial, VolumeDial},
        playback::{PlayPause, Skip, SkipTrack, VolumePreset, VolumeStep},
        playlist::PlayPlaylist,
        Action, Controller, Services,
    },
    host::{Context, Envelope, Event},
};

struct Worker {
    action: String,
    events: mpsc::UnboundedSender<Event>,
    handle: JoinHandle<()>,
}

pub struct Plugin {
    services: Services,
    workers: HashMap<Context, Worker>,
    /// Workers that were told to stop but may still be finishing up.
    retired: Vec<JoinHandle<()>>,
}

impl Plugin {
    #[must_use]
    pub fn new(services: Services) -> Self {
        Self {
            services,
            workers: HashMap::new(),
            retired: Vec::new(),
        }
    }

    /// Number of control instances with a running worker.
    #[must_use]
    pub fn len(&self) -> usize {
        self.workers.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.workers.is_empty()
    }

    /// Dispatches events until the host closes the connection.
    ///
    /// Workers keep running afterwards; [`Plugin::shutdown`] stops them.
    /// Dropping the future between events is safe.
    pub async fn run(&mut self, envelopes: &mut mpsc::UnboundedReceiver<Envelope>) {
        while let Some(envelope) = envelopes.recv().await {
            self.dispatch(envelope);
        }

        info!("host disconnected");
    }

    /// Routes one event to the worker of its control instance.
    pub fn dispatch(&mut self, envelope: Envelope) {
        let Envelope {
            action,
            context,
            event,
        } = envelope;
        trace!("{action} [{context}]: {event:?}");

        if event == Event::WillDisappear {
            if let Some(worker) = self.workers.remove(&context) {
                if worker.events.send(event).is_err() {
                    trace!("{action} [{context}]: worker already gone");
                }
                self.retire(worker);
            }
            return;
        }

        // A context is reused when a control is replaced in place.
        if self
            .workers
            .get(&context)
            .is_some_and(|worker| worker.action != action || worker.events.is_closed())
        {
            if let Some(worker) = self.workers.remove(&context) {
                self.retire(worker);
            }
        }

        if !self.workers.contains_key(&context) {
            let Some(worker) = self.spawn(&action, context.clone()) else {
                warn!("ignoring event for unknown action {action}");
                return;
            };
            self.workers.insert(context.clone(), worker);
        }

        if let Some(worker) = self.workers.get(&context) {
            if worker.events.send(event).is_err() {
                debug!("{action} [{context}]: worker has stopped");
                if let Some(worker) = self.workers.remove(&context) {
                    self.retire(worker);
                }
            }
        }
    }

    fn retire(&mut self, worker: Worker) {
        self.retired.retain(|handle| !handle.is_finished());
        self.retired.push(worker.handle);
    }

    fn spawn(&self, action: &str, context: Context) -> Option<Worker> {
        let controller = Controller::new(self.services.clone(), action, context);
        let (events, handle) = match action {
            actions::PLAY_PAUSE => start(PlayPause, controller),
            actions::NEXT_TRACK => start(SkipTrack::new(Skip::Next), controller),
            actions::PREVIOUS_TRACK => start(SkipTrack::new(Skip::Previous), controller),
            actions::VOLUME_UP => start(VolumeStep::up(), controller),
            actions::VOLUME_DOWN => start(VolumeStep::down(), controller),
            actions::VOLUME_PRESET => start(VolumePreset, controller),
            actions::VOLUME_DIAL => start(VolumeDial, controller),
            actions::TRACK_DIAL => start(TrackDial::default(), controller),
            actions::SEEK_DIAL => start(SeekDial, controller),
            actions::PLAY_PLAYLIST => start(PlayPlaylist, controller),
            _ => return None,
        };

        Some(Worker {
            action: action.to_owned(),
            events,
            handle,
        })
    }

    /// Closes every worker and waits for them to finish.
    pub async fn shutdown(&mut self) {
        let workers: Vec<_> = self.workers.drain().map(|(_, worker)| worker).collect();
        let mut handles = std::mem::take(&mut self.retired);
        for Worker { events, handle, .. } in workers {
            drop(events);
            handles.push(handle);
        }

        for handle in handles {
            if let Err(e) = handle.await {
                error!("worker failed: {e}");
            }
        }
    }
}

fn start<A>(action: A, controller: Controller) -> (mpsc::UnboundedSender<Event>, JoinHandle<()>)
where
    A: Action + 'static,
{
    let (events, receiver) = mpsc::unbounded_channel();
    let handle = tokio::spawn(actions::run(action, controller, receiver));
    (events, handle)
}
