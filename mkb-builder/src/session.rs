//! Builder session actor
//!
//! One task owns the [`Builder`]; everything else talks to it through a
//! cloneable [`SessionHandle`]. Commands are processed one at a time, which is
//! what makes the state manager the single writer.
//!
//! Besides commands the loop reacts to:
//! - control requests queued by the preview's control buttons
//! - the render deadline set by the debounce scheduler
//! - the autosave deadline
//! - completion of a background save

use std::sync::Arc;

use mkb_common::config::BuilderConfig;
use mkb_common::events::{BuilderEvent, ControlAction, EventBus, NotificationLevel};
use mkb_common::ids::ComponentId;
use mkb_common::model::MediaKitState;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant};
use tracing::{debug, error, info, warn};

use crate::autosave::{save_with_retry, RetryPolicy, SaveGuard};
use crate::bridge::{PersistenceBridge, SaveReceipt};
use crate::builder::{Builder, PassReport};
use crate::error::{Error, Result};
use crate::registry::ComponentRegistry;
use crate::state::{Mutation, Outcome};

const COMMAND_QUEUE: usize = 64;

type Reply<T> = oneshot::Sender<T>;

enum Command {
    Mutate {
        mutation: Mutation,
        reply: Reply<Result<Outcome>>,
    },
    Undo {
        reply: Reply<bool>,
    },
    Redo {
        reply: Reply<bool>,
    },
    Snapshot {
        reply: Reply<(u64, Arc<MediaKitState>)>,
    },
    Click {
        component_id: ComponentId,
        action: ControlAction,
        reply: Reply<Result<()>>,
    },
    Control {
        component_id: ComponentId,
        action: ControlAction,
        reply: Reply<Result<()>>,
    },
    Flush {
        reply: Reply<Result<Option<PassReport>>>,
    },
    Html {
        reply: Reply<String>,
    },
    CountNodes {
        component_id: ComponentId,
        reply: Reply<usize>,
    },
    Selected {
        reply: Reply<Option<ComponentId>>,
    },
    Save {
        reply: Reply<Result<SaveReceipt>>,
    },
    Load {
        post_id: u64,
        reply: Reply<Result<()>>,
    },
}

struct SaveFinished {
    revision: u64,
    result: Result<SaveReceipt>,
    reply: Option<Reply<Result<SaveReceipt>>>,
}

/// Cloneable handle to a running session
#[derive(Clone)]
pub struct SessionHandle {
    commands: mpsc::Sender<Command>,
    events: EventBus,
}

/// Start a session task for `state`
pub fn spawn_session(
    config: &BuilderConfig,
    registry: ComponentRegistry,
    bridge: Arc<dyn PersistenceBridge>,
    state: MediaKitState,
) -> (SessionHandle, JoinHandle<()>) {
    let builder = Builder::with_state(config, registry, state);
    let events = builder.events().clone();
    let (tx, rx) = mpsc::channel(COMMAND_QUEUE);

    let session = Session {
        builder,
        bridge,
        guard: SaveGuard::new(),
        retry: RetryPolicy::from_config(&config.autosave),
        post_id: config.wordpress.post_id,
        commands: rx,
    };
    let task = tokio::spawn(session.run());
    info!("Builder session started for post {}", config.wordpress.post_id);

    (SessionHandle { commands: tx, events }, task)
}

impl SessionHandle {
    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub fn subscribe(&self) -> broadcast::Receiver<BuilderEvent> {
        self.events.subscribe()
    }

    async fn request<T>(&self, make: impl FnOnce(Reply<T>) -> Command) -> Result<T> {
        let (reply, rx) = oneshot::channel();
        self.commands
            .send(make(reply))
            .await
            .map_err(|_| Error::SessionClosed)?;
        rx.await.map_err(|_| Error::SessionClosed)
    }

    pub async fn apply(&self, mutation: Mutation) -> Result<Outcome> {
        self.request(|reply| Command::Mutate { mutation, reply }).await?
    }

    pub async fn undo(&self) -> Result<bool> {
        self.request(|reply| Command::Undo { reply }).await
    }

    pub async fn redo(&self) -> Result<bool> {
        self.request(|reply| Command::Redo { reply }).await
    }

    /// Current revision and state snapshot
    pub async fn snapshot(&self) -> Result<(u64, Arc<MediaKitState>)> {
        self.request(|reply| Command::Snapshot { reply }).await
    }

    pub async fn get_state(&self) -> Result<Arc<MediaKitState>> {
        Ok(self.snapshot().await?.1)
    }

    /// Click a rendered component's control button. Resolves once the
    /// resulting request has been handled.
    pub async fn click(&self, component_id: ComponentId, action: ControlAction) -> Result<()> {
        self.request(|reply| Command::Click {
            component_id,
            action,
            reply,
        })
        .await?
    }

    /// Carry out a control request without going through the preview, as a
    /// toolbar or keyboard shortcut would
    pub async fn control(&self, component_id: ComponentId, action: ControlAction) -> Result<()> {
        self.request(|reply| Command::Control {
            component_id,
            action,
            reply,
        })
        .await?
    }

    /// Render now if a render is pending
    pub async fn flush(&self) -> Result<Option<PassReport>> {
        self.request(|reply| Command::Flush { reply }).await?
    }

    pub async fn html(&self) -> Result<String> {
        self.request(|reply| Command::Html { reply }).await
    }

    /// Nodes in the preview bearing `component_id`
    pub async fn count_nodes(&self, component_id: ComponentId) -> Result<usize> {
        self.request(|reply| Command::CountNodes { component_id, reply }).await
    }

    pub async fn selected(&self) -> Result<Option<ComponentId>> {
        self.request(|reply| Command::Selected { reply }).await
    }

    /// Save the current state. Fails with [`Error::AlreadySaving`] if a save
    /// is still in flight.
    pub async fn save(&self) -> Result<SaveReceipt> {
        self.request(|reply| Command::Save { reply }).await?
    }

    /// Replace the state with what WordPress holds for `post_id`
    pub async fn load(&self, post_id: u64) -> Result<()> {
        self.request(|reply| Command::Load { post_id, reply }).await?
    }
}

struct Session {
    builder: Builder,
    bridge: Arc<dyn PersistenceBridge>,
    guard: SaveGuard,
    retry: RetryPolicy,
    post_id: u64,
    commands: mpsc::Receiver<Command>,
}

impl Session {
    async fn run(mut self) {
        let (done_tx, mut done_rx) = mpsc::unbounded_channel::<SaveFinished>();

        loop {
            let render_at = self.builder.next_render_deadline();
            let autosave_at = if self.guard.is_saving() {
                None
            } else {
                self.builder.autosave_due()
            };

            tokio::select! {
                command = self.commands.recv() => match command {
                    Some(command) => self.handle(command, &done_tx).await,
                    None => break,
                },

                Some(finished) = done_rx.recv() => self.on_save_finished(finished),

                Some(request) = self.builder.next_control_request() => {
                    let result = self
                        .builder
                        .handle_control_request(request.action, &request.component_id);
                    if let Err(e) = result {
                        self.builder.notify_error(&e);
                    }
                }

                _ = sleep_until(render_at.unwrap_or_else(Instant::now)), if render_at.is_some() => {
                    if let Err(e) = self.builder.render_if_due(Instant::now()) {
                        error!("Render pass failed: {}", e);
                    }
                }

                _ = sleep_until(autosave_at.unwrap_or_else(Instant::now)), if autosave_at.is_some() => {
                    debug!("Autosave due");
                    if let Err((e, _)) = self.start_save(None, &done_tx) {
                        debug!("Autosave skipped: {}", e);
                    }
                }
            }
        }
        info!("Builder session stopped");
    }

    async fn handle(&mut self, command: Command, done_tx: &mpsc::UnboundedSender<SaveFinished>) {
        match command {
            Command::Mutate { mutation, reply } => {
                let result = self.builder.apply(mutation);
                if let Err(e) = &result {
                    self.builder.notify_error(e);
                }
                let _ = reply.send(result);
            }
            Command::Undo { reply } => {
                let _ = reply.send(self.builder.undo());
            }
            Command::Redo { reply } => {
                let _ = reply.send(self.builder.redo());
            }
            Command::Snapshot { reply } => {
                let _ = reply.send((self.builder.state().revision(), self.builder.snapshot()));
            }
            Command::Click {
                component_id,
                action,
                reply,
            } => {
                let result = self.builder.click_control(&component_id, action).map(|_| ());
                // Handle the request we just queued before answering
                let result = result.and_then(|_| self.builder.process_control_requests().map(|_| ()));
                let _ = reply.send(result);
            }
            Command::Control {
                component_id,
                action,
                reply,
            } => {
                let result = self.builder.handle_control_request(action, &component_id);
                if let Err(e) = &result {
                    self.builder.notify_error(e);
                }
                let _ = reply.send(result);
            }
            Command::Flush { reply } => {
                let _ = reply.send(self.builder.flush());
            }
            Command::Html { reply } => {
                let _ = reply.send(self.builder.html());
            }
            Command::CountNodes { component_id, reply } => {
                let count = self
                    .builder
                    .document()
                    .count_with_attr(crate::render::COMPONENT_ID_ATTR, component_id.as_str());
                let _ = reply.send(count);
            }
            Command::Selected { reply } => {
                let _ = reply.send(self.builder.selected().cloned());
            }
            Command::Save { reply } => {
                if let Err((e, reply)) = self.start_save(Some(reply), done_tx) {
                    let _ = reply.send(Err(e));
                }
            }
            Command::Load { post_id, reply } => {
                let result = self.load(post_id).await;
                if let Err(e) = &result {
                    self.builder.notify_error(e);
                }
                let _ = reply.send(result);
            }
        }
    }

    /// Start a background save of the current snapshot. The ticket stays
    /// held until the save task finishes.
    fn start_save(
        &mut self,
        reply: Option<Reply<Result<SaveReceipt>>>,
        done_tx: &mpsc::UnboundedSender<SaveFinished>,
    ) -> std::result::Result<(), (Error, Reply<Result<SaveReceipt>>)> {
        let ticket = match self.guard.try_acquire() {
            Ok(ticket) => ticket,
            Err(e) => {
                warn!("Save rejected: already saving");
                return match reply {
                    Some(reply) => Err((e, reply)),
                    None => Ok(()),
                };
            }
        };

        let (revision, state) = self.builder.begin_save();
        let events = self.builder.events().clone();
        let bridge = Arc::clone(&self.bridge);
        let retry = self.retry;
        let done_tx = done_tx.clone();

        events.emit_lossy(BuilderEvent::SaveStarted { revision });
        tokio::spawn(async move {
            let result = save_with_retry(bridge.as_ref(), &state, retry).await;
            drop(ticket);
            let _ = done_tx.send(SaveFinished {
                revision,
                result,
                reply,
            });
        });
        Ok(())
    }

    fn on_save_finished(&mut self, finished: SaveFinished) {
        let events = self.builder.events().clone();
        match &finished.result {
            Ok(receipt) => {
                info!("Saved revision {}: {}", finished.revision, receipt.message);
                events.emit_lossy(BuilderEvent::SaveCompleted {
                    revision: finished.revision,
                    message: receipt.message.clone(),
                });
            }
            Err(e) => {
                error!("Saving revision {} failed: {}", finished.revision, e);
                // A refused save stays unsaved until the next edit
                if e.is_retryable() {
                    self.builder.save_failed(Instant::now());
                }
                events.emit_lossy(BuilderEvent::SaveFailed {
                    error: e.to_string(),
                    retryable: e.is_retryable(),
                });
                events.emit_lossy(BuilderEvent::Notification {
                    level: NotificationLevel::Warning,
                    message: e.user_message(),
                });
            }
        }
        if let Some(reply) = finished.reply {
            let _ = reply.send(finished.result);
        }
    }

    async fn load(&mut self, post_id: u64) -> Result<()> {
        let post_id = if post_id == 0 { self.post_id } else { post_id };
        let state = self.bridge.load(post_id).await?;
        self.builder.load_state(state);
        Ok(())
    }
}
