//! Game-session client interface
//!
//! The bridge does not speak any game protocol itself. A [`GameClient`]
//! establishes a session and reports everything that happens on it through
//! the [`SessionSink`] it was handed at connect time.

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::error::ClientError;
use crate::types::{Position, SessionId};

/// Lifecycle events emitted by a game session
#[derive(Debug, Clone, PartialEq)]
pub enum GameEvent {
    Login { username: String },
    Spawn,
    Move { position: Position },
    Respawn { world: String },
    End { reason: String },
    Error { message: String },
    Kicked { reason: String },
    /// The client is waiting for an interactive sign-in
    AuthPending {
        url: Option<String>,
        code: Option<String>,
    },
}

/// Anything a session reports back to the bridge
#[derive(Debug, Clone, PartialEq)]
pub enum SessionSignal {
    Event(GameEvent),
    /// Raw diagnostic text, possibly a partial line
    Diagnostic(String),
}

/// Sender half handed to the client for one session
///
/// Every signal is tagged with the session it belongs to, so late signals
/// from a session the bridge already abandoned are recognisable.
#[derive(Debug, Clone)]
pub struct SessionSink {
    session: SessionId,
    tx: mpsc::UnboundedSender<(SessionId, SessionSignal)>,
}

impl SessionSink {
    pub fn new(session: SessionId, tx: mpsc::UnboundedSender<(SessionId, SessionSignal)>) -> Self {
        Self { session, tx }
    }

    pub fn session(&self) -> SessionId {
        self.session
    }

    /// Report a lifecycle event. Returns false once the bridge is gone.
    pub fn emit(&self, event: GameEvent) -> bool {
        self.tx
            .send((self.session, SessionSignal::Event(event)))
            .is_ok()
    }

    /// Forward a fragment of diagnostic output
    pub fn diagnostic(&self, fragment: impl Into<String>) -> bool {
        self.tx
            .send((self.session, SessionSignal::Diagnostic(fragment.into())))
            .is_ok()
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Establishes game-world sessions
#[async_trait]
pub trait GameClient: Send + Sync {
    /// Open a new session. Events for it are delivered through `sink`.
    async fn connect(&self, sink: SessionSink) -> Result<Box<dyn GameHandle>, ClientError>;
}

/// Control handle of an established session
#[async_trait]
pub trait GameHandle: Send + Sync {
    async fn chat(&self, text: &str) -> Result<(), ClientError>;

    async fn quit(&self) -> Result<(), ClientError>;
}
