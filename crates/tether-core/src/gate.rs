//! Operator intent gate
//!
//! [`IntentGate`] is the only way into the bridge. It forwards intents to the
//! bridge actor, a single task that owns the [`SessionSupervisor`] and drains
//! intents, session signals, connect completions and timer firings in one
//! `select!` loop.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, instrument};

use crate::client::{GameClient, SessionSignal};
use crate::error::IntentError;
use crate::projector::StatusSnapshot;
use crate::supervisor::{Internal, SessionSupervisor, SupervisorConfig};
use crate::surface::StatusSurface;
use crate::types::{OperatorId, SessionId};

const COMMAND_BUFFER: usize = 100;

/// What an operator can ask of the bridge
#[derive(Debug, Clone, PartialEq)]
pub enum Intent {
    Join(Option<OperatorId>),
    Leave,
    Send(String),
}

impl Intent {
    pub fn kind(&self) -> &'static str {
        match self {
            Intent::Join(_) => "join",
            Intent::Leave => "leave",
            Intent::Send(_) => "send",
        }
    }
}

/// Bridge settings
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    pub supervisor: SupervisorConfig,
    /// How often coalesced position changes are published
    pub status_refresh: Duration,
    /// Longest accepted chat line, in characters
    pub max_message_len: usize,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            supervisor: SupervisorConfig::default(),
            status_refresh: Duration::from_secs(30),
            max_message_len: 256,
        }
    }
}

enum Command {
    Intent {
        intent: Intent,
        reply: oneshot::Sender<Result<StatusSnapshot, IntentError>>,
    },
    Snapshot {
        reply: oneshot::Sender<StatusSnapshot>,
    },
    Shutdown {
        reply: oneshot::Sender<()>,
    },
}

/// Cloneable entry point into a running bridge
#[derive(Debug, Clone)]
pub struct IntentGate {
    tx: mpsc::Sender<Command>,
    max_message_len: usize,
}

impl IntentGate {
    /// Start the bridge actor.
    ///
    /// The actor runs until [`shutdown`](Self::shutdown) is called or every
    /// gate has been dropped; either way it leaves the world and retires the
    /// status post before exiting.
    pub fn spawn(
        config: BridgeConfig,
        client: Arc<dyn GameClient>,
        surface: Arc<dyn StatusSurface>,
    ) -> (IntentGate, JoinHandle<()>) {
        let (tx, commands) = mpsc::channel(COMMAND_BUFFER);
        let (signals_tx, signals) = mpsc::unbounded_channel();
        let (internal_tx, internal) = mpsc::unbounded_channel();

        let supervisor = SessionSupervisor::new(
            config.supervisor.clone(),
            client,
            surface,
            signals_tx,
            internal_tx,
        );
        let actor = BridgeActor {
            supervisor,
            commands,
            signals,
            internal,
            status_refresh: config.status_refresh,
        };
        let handle = tokio::spawn(actor.run());

        let gate = IntentGate {
            tx,
            max_message_len: config.max_message_len,
        };
        (gate, handle)
    }

    /// Submit an intent and wait until the bridge has applied it.
    ///
    /// Returns the status right after the intent was applied.
    pub async fn submit(&self, intent: Intent) -> Result<StatusSnapshot, IntentError> {
        if let Intent::Send(text) = &intent {
            self.validate_message(text)?;
        }

        let (reply, rx) = oneshot::channel();
        self.tx
            .send(Command::Intent { intent, reply })
            .await
            .map_err(|_| IntentError::BridgeClosed)?;
        rx.await.map_err(|_| IntentError::BridgeClosed)?
    }

    pub async fn join(&self, operator: Option<OperatorId>) -> Result<StatusSnapshot, IntentError> {
        self.submit(Intent::Join(operator)).await
    }

    pub async fn leave(&self) -> Result<StatusSnapshot, IntentError> {
        self.submit(Intent::Leave).await
    }

    pub async fn send(&self, text: impl Into<String>) -> Result<StatusSnapshot, IntentError> {
        self.submit(Intent::Send(text.into())).await
    }

    /// Latest status of the bridge
    pub async fn snapshot(&self) -> Result<StatusSnapshot, IntentError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(Command::Snapshot { reply })
            .await
            .map_err(|_| IntentError::BridgeClosed)?;
        rx.await.map_err(|_| IntentError::BridgeClosed)
    }

    /// Leave the world, retire the status post and stop the actor
    pub async fn shutdown(&self) -> Result<(), IntentError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(Command::Shutdown { reply })
            .await
            .map_err(|_| IntentError::BridgeClosed)?;
        rx.await.map_err(|_| IntentError::BridgeClosed)
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    fn validate_message(&self, text: &str) -> Result<(), IntentError> {
        if text.trim().is_empty() {
            return Err(IntentError::InvalidIntent("message is empty".to_string()));
        }
        let len = text.chars().count();
        if len > self.max_message_len {
            return Err(IntentError::InvalidIntent(format!(
                "message is {} characters, limit is {}",
                len, self.max_message_len
            )));
        }
        Ok(())
    }
}

struct BridgeActor {
    supervisor: SessionSupervisor,
    commands: mpsc::Receiver<Command>,
    signals: mpsc::UnboundedReceiver<(SessionId, SessionSignal)>,
    internal: mpsc::UnboundedReceiver<Internal>,
    status_refresh: Duration,
}

impl BridgeActor {
    async fn run(mut self) {
        let mut refresh = interval(self.status_refresh);
        refresh.set_missed_tick_behavior(MissedTickBehavior::Delay);
        refresh.tick().await;

        info!("Bridge actor started");

        loop {
            tokio::select! {
                command = self.commands.recv() => match command {
                    Some(Command::Intent { intent, reply }) => {
                        let result = self.apply(intent).await;
                        let _ = reply.send(result);
                    }
                    Some(Command::Snapshot { reply }) => {
                        let _ = reply.send(self.supervisor.snapshot());
                    }
                    Some(Command::Shutdown { reply }) => {
                        self.supervisor.shutdown().await;
                        let _ = reply.send(());
                        break;
                    }
                    None => {
                        debug!("All intent gates dropped");
                        self.supervisor.shutdown().await;
                        break;
                    }
                },
                Some((session, signal)) = self.signals.recv() => {
                    self.supervisor.handle_signal(session, signal).await;
                }
                Some(message) = self.internal.recv() => {
                    self.supervisor.handle_internal(message).await;
                }
                _ = refresh.tick() => {
                    self.supervisor.refresh_position().await;
                }
            }
        }

        info!("Bridge actor stopped");
    }

    #[instrument(skip_all, fields(kind = intent.kind()))]
    async fn apply(&mut self, intent: Intent) -> Result<StatusSnapshot, IntentError> {
        let kind = intent.kind();
        let result = match intent {
            Intent::Join(operator) => {
                self.supervisor.request_join(operator).await;
                Ok(())
            }
            Intent::Leave => {
                self.supervisor.request_leave().await;
                Ok(())
            }
            Intent::Send(text) => self.supervisor.send_chat(&text).await,
        };

        let outcome = if result.is_ok() { "accepted" } else { "rejected" };
        metrics::counter!("tether_intents_total", "kind" => kind, "outcome" => outcome).increment(1);
        if let Err(e) = &result {
            debug!("Intent rejected: {}", e);
        }

        result.map(|()| self.supervisor.snapshot())
    }
}
