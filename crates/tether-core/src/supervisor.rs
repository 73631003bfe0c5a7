//! Session supervisor
//!
//! Owns the single logical game-world session and reconciles it with what
//! operators asked for. The supervisor is driven exclusively by the bridge
//! actor (see [`crate::gate`]); none of its methods are ever re-entered.
//!
//! ```text
//! Idle ──join──▶ Connecting ──spawn──▶ Connected
//!                    │                     │
//!                 failure             termination
//!                    ▼                     ▼
//!               Disconnected ◀─────────────┘
//!                    │
//!        should_join && budget left ──▶ (backoff) ──▶ Connecting
//! ```

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use crate::auth::{AuthChallenge, AuthChallengeDetector};
use crate::client::{GameClient, GameEvent, GameHandle, SessionSignal, SessionSink};
use crate::error::{ClientError, IntentError};
use crate::projector::{StatusProjector, StatusSnapshot, DEFAULT_SURFACE_TIMEOUT};
use crate::surface::StatusSurface;
use crate::types::{OperatorId, Phase, Position, SessionId, SessionState};

/// Supervisor settings
#[derive(Debug, Clone)]
pub struct SupervisorConfig {
    /// In-game name shown until the client reports one
    pub identity: String,
    /// Failed connection attempts tolerated per join before giving up
    pub max_reconnect_attempts: u32,
    /// Backoff unit; attempt N waits `base_delay * N`
    pub base_delay: Duration,
    pub connect_timeout: Duration,
    /// Limit for each status surface call
    pub surface_timeout: Duration,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            identity: "tether".to_string(),
            max_reconnect_attempts: 5,
            base_delay: Duration::from_secs(5),
            connect_timeout: Duration::from_secs(30),
            surface_timeout: DEFAULT_SURFACE_TIMEOUT,
        }
    }
}

/// Why a session stopped
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TerminationCause {
    Ended(String),
    Kicked(String),
    Errored(String),
    ConnectFailed(String),
}

impl TerminationCause {
    fn label(&self) -> &'static str {
        match self {
            Self::Ended(_) => "ended",
            Self::Kicked(_) => "kicked",
            Self::Errored(_) => "error",
            Self::ConnectFailed(_) => "connect_failed",
        }
    }
}

impl fmt::Display for TerminationCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ended(reason) => write!(f, "session ended: {}", reason),
            Self::Kicked(reason) => write!(f, "kicked: {}", reason),
            Self::Errored(message) => write!(f, "session error: {}", message),
            Self::ConnectFailed(message) => write!(f, "connect failed: {}", message),
        }
    }
}

/// Completions of work the supervisor started in the background
pub(crate) enum Internal {
    ConnectFinished {
        session: SessionId,
        result: Result<Box<dyn GameHandle>, ClientError>,
    },
    ReconnectDue {
        ticket: u64,
    },
}

struct PendingReconnect {
    ticket: u64,
    cancel: CancellationToken,
}

pub struct SessionSupervisor {
    config: SupervisorConfig,
    state: SessionState,
    client: Arc<dyn GameClient>,
    detector: AuthChallengeDetector,
    projector: StatusProjector,
    signals: mpsc::UnboundedSender<(SessionId, SessionSignal)>,
    internal: mpsc::UnboundedSender<Internal>,
    next_session: u64,
    /// Session whose signals are currently honoured
    current: Option<SessionId>,
    /// Session whose `connect` call has not returned yet
    in_flight: Option<SessionId>,
    /// Start a fresh attempt once the superseded in-flight one returns
    deferred_connect: bool,
    handle: Option<Box<dyn GameHandle>>,
    pending_reconnect: Option<PendingReconnect>,
    next_ticket: u64,
    position_dirty: bool,
}

impl fmt::Debug for SessionSupervisor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionSupervisor")
            .field("state", &self.state)
            .field("current", &self.current)
            .field("in_flight", &self.in_flight)
            .field("deferred_connect", &self.deferred_connect)
            .field("has_handle", &self.handle.is_some())
            .field("pending_reconnect", &self.pending_reconnect.is_some())
            .finish()
    }
}

impl SessionSupervisor {
    pub(crate) fn new(
        config: SupervisorConfig,
        client: Arc<dyn GameClient>,
        surface: Arc<dyn StatusSurface>,
        signals: mpsc::UnboundedSender<(SessionId, SessionSignal)>,
        internal: mpsc::UnboundedSender<Internal>,
    ) -> Self {
        let state = SessionState::new(config.identity.clone(), config.max_reconnect_attempts);
        let projector = StatusProjector::new(surface).with_timeout(config.surface_timeout);
        Self {
            config,
            state,
            client,
            detector: AuthChallengeDetector::new(),
            projector,
            signals,
            internal,
            next_session: 0,
            current: None,
            in_flight: None,
            deferred_connect: false,
            handle: None,
            pending_reconnect: None,
            next_ticket: 0,
            position_dirty: false,
        }
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn challenge(&self) -> Option<&AuthChallenge> {
        self.detector.current()
    }

    /// Current status, freshly projected
    pub fn snapshot(&self) -> StatusSnapshot {
        StatusProjector::project(&self.state, self.detector.current())
    }

    pub fn current_session(&self) -> Option<SessionId> {
        self.current
    }

    pub fn connect_in_flight(&self) -> bool {
        self.in_flight.is_some()
    }

    pub fn has_pending_reconnect(&self) -> bool {
        self.pending_reconnect.is_some()
    }

    /// Operator wants the presence in the world
    pub async fn request_join(&mut self, operator: Option<OperatorId>) {
        self.state.should_join = true;

        if self.state.phase.is_active() {
            debug!("Join ignored, session already {}", self.state.phase);
            return;
        }

        info!(operator = ?operator, "Join requested");
        self.state.reconnect_attempts = 0;
        self.detector.set_operator(operator);
        self.cancel_reconnect();
        self.begin_connect().await;
    }

    /// Operator wants the presence out of the world
    pub async fn request_leave(&mut self) {
        info!("Leave requested");
        self.state.should_join = false;
        self.state.reconnect_attempts = 0;
        self.cancel_reconnect();
        self.deferred_connect = false;
        self.current = None;

        if let Some(handle) = self.handle.take() {
            if let Err(e) = handle.quit().await {
                warn!("Failed to quit game session: {}", e);
            }
        }

        self.detector.clear();
        self.detector.set_operator(None);
        self.position_dirty = false;
        self.state.reset_world();
        self.state.phase = Phase::Idle;
        self.publish().await;
    }

    /// Start a connection attempt unless one is already under way.
    ///
    /// This is the only place new attempts originate.
    pub async fn begin_connect(&mut self) {
        if let Some(in_flight) = self.in_flight {
            if self.current == Some(in_flight) {
                debug!(session = %in_flight, "Connect already in flight");
                return;
            }
            // A superseded attempt is still outstanding; wait for it so that
            // two connect calls never overlap.
            debug!(session = %in_flight, "Deferring connect until superseded attempt returns");
            self.deferred_connect = true;
            if self.state.phase != Phase::Connecting {
                self.state.phase = Phase::Connecting;
                self.publish().await;
            }
            return;
        }

        if self.state.phase.is_active() {
            debug!("Connect skipped, session already {}", self.state.phase);
            return;
        }

        self.start_attempt().await;
    }

    async fn start_attempt(&mut self) {
        self.next_session += 1;
        let session = SessionId::new(self.next_session);
        self.current = Some(session);
        self.in_flight = Some(session);
        self.state.phase = Phase::Connecting;

        metrics::counter!("tether_connect_attempts_total").increment(1);
        info!(
            session = %session,
            attempt = self.state.reconnect_attempts,
            "Connecting to game world"
        );
        self.publish().await;

        let client = Arc::clone(&self.client);
        let sink = SessionSink::new(session, self.signals.clone());
        let internal = self.internal.clone();
        let timeout = self.config.connect_timeout;
        tokio::spawn(async move {
            let result = match tokio::time::timeout(timeout, client.connect(sink)).await {
                Ok(result) => result,
                Err(_) => Err(ClientError::Timeout(timeout)),
            };
            let _ = internal.send(Internal::ConnectFinished { session, result });
        });
    }

    /// The active session is in the world
    pub async fn on_connected(&mut self) {
        if self.state.phase == Phase::Connected || !self.state.should_join {
            return;
        }

        info!(identity = %self.state.identity, "Connected to game world");
        self.state.phase = Phase::Connected;
        self.state.reconnect_attempts = 0;
        self.detector.clear();
        self.position_dirty = false;
        self.publish().await;
    }

    /// Movement or world change reported by the active session
    pub async fn on_world_event(&mut self, world: Option<String>, position: Option<Position>) {
        if self.state.phase != Phase::Connected {
            trace!("World event ignored while {}", self.state.phase);
            return;
        }

        if let Some(position) = position {
            if position != self.state.position {
                self.state.position = position;
                self.position_dirty = true;
            }
        }

        if let Some(world) = world {
            if world != self.state.world {
                debug!(world = %world, "World changed");
                self.state.world = world;
                self.position_dirty = false;
                self.publish().await;
            }
        }
    }

    /// The active session is gone, for whatever reason
    pub async fn on_terminated(&mut self, cause: TerminationCause) {
        if !self.state.phase.is_active() {
            debug!("Termination ignored while {}: {}", self.state.phase, cause);
            return;
        }

        metrics::counter!("tether_session_terminations_total", "cause" => cause.label())
            .increment(1);
        warn!(session = ?self.current, "Game session terminated: {}", cause);

        self.current = None;
        if let Some(handle) = self.handle.take() {
            quit_in_background(handle);
        }
        self.state.phase = Phase::Disconnected;
        self.state.reset_world();
        self.position_dirty = false;
        self.publish().await;

        if self.state.should_join {
            self.schedule_reconnect().await;
        }
    }

    async fn schedule_reconnect(&mut self) {
        let max = self.state.max_reconnect_attempts;
        let attempt = self.state.reconnect_attempts + 1;

        if attempt >= max {
            warn!("Reconnect budget exhausted after {} attempts, giving up", max);
            self.state.reconnect_attempts = max;
            self.state.should_join = false;
            self.publish().await;
            return;
        }

        self.state.reconnect_attempts = attempt;
        let delay = self.config.base_delay * attempt;

        self.next_ticket += 1;
        let ticket = self.next_ticket;
        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let internal = self.internal.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = token.cancelled() => {}
                _ = tokio::time::sleep(delay) => {
                    let _ = internal.send(Internal::ReconnectDue { ticket });
                }
            }
        });
        self.pending_reconnect = Some(PendingReconnect { ticket, cancel });

        metrics::counter!("tether_reconnects_scheduled_total").increment(1);
        info!("Reconnecting in {:?} (attempt {}/{})", delay, attempt, max);
        self.publish().await;
    }

    fn cancel_reconnect(&mut self) {
        if let Some(pending) = self.pending_reconnect.take() {
            debug!(ticket = pending.ticket, "Cancelling pending reconnect");
            pending.cancel.cancel();
        }
    }

    async fn on_reconnect_due(&mut self, ticket: u64) {
        match &self.pending_reconnect {
            Some(pending) if pending.ticket == ticket => {}
            _ => {
                debug!(ticket, "Ignoring stale reconnect timer");
                return;
            }
        }
        self.pending_reconnect = None;

        if !self.state.should_join || self.state.phase.is_active() {
            debug!("Reconnect no longer needed");
            return;
        }
        self.begin_connect().await;
    }

    async fn on_connect_finished(
        &mut self,
        session: SessionId,
        result: Result<Box<dyn GameHandle>, ClientError>,
    ) {
        if self.in_flight != Some(session) {
            warn!(session = %session, "Unexpected connect completion");
            if let Ok(handle) = result {
                quit_in_background(handle);
            }
            return;
        }
        self.in_flight = None;

        if self.current != Some(session) {
            debug!(session = %session, "Connect completed for superseded session");
            if let Ok(handle) = result {
                quit_in_background(handle);
            }
            if std::mem::take(&mut self.deferred_connect) && self.state.should_join {
                self.start_attempt().await;
            }
            return;
        }

        match result {
            Ok(handle) => {
                debug!(session = %session, "Game session established");
                self.handle = Some(handle);
            }
            Err(e) => {
                self.on_terminated(TerminationCause::ConnectFailed(e.to_string()))
                    .await;
            }
        }
    }

    pub(crate) async fn handle_internal(&mut self, message: Internal) {
        match message {
            Internal::ConnectFinished { session, result } => {
                self.on_connect_finished(session, result).await
            }
            Internal::ReconnectDue { ticket } => self.on_reconnect_due(ticket).await,
        }
    }

    /// Apply a signal from a game session
    pub async fn handle_signal(&mut self, session: SessionId, signal: SessionSignal) {
        if self.current != Some(session) {
            trace!(session = %session, "Dropping signal from inactive session");
            return;
        }

        match signal {
            SessionSignal::Diagnostic(fragment) => {
                if let Some(challenge) = self.detector.observe(&fragment) {
                    self.announce_challenge(&challenge).await;
                }
            }
            SessionSignal::Event(event) => self.handle_event(event).await,
        }
    }

    async fn handle_event(&mut self, event: GameEvent) {
        match event {
            GameEvent::Login { username } => {
                debug!(username = %username, "Logged in");
                if username != self.state.identity {
                    self.state.identity = username;
                    if self.state.phase == Phase::Connected {
                        self.publish().await;
                    }
                }
            }
            GameEvent::Spawn => self.on_connected().await,
            GameEvent::Move { position } => self.on_world_event(None, Some(position)).await,
            GameEvent::Respawn { world } => self.on_world_event(Some(world), None).await,
            GameEvent::AuthPending { url, code } => {
                if let Some(challenge) = self.detector.record(url, code) {
                    self.announce_challenge(&challenge).await;
                }
            }
            GameEvent::End { reason } => {
                self.on_terminated(TerminationCause::Ended(reason)).await
            }
            GameEvent::Kicked { reason } => {
                self.on_terminated(TerminationCause::Kicked(reason)).await
            }
            GameEvent::Error { message } => {
                self.on_terminated(TerminationCause::Errored(message)).await
            }
        }
    }

    async fn announce_challenge(&mut self, challenge: &AuthChallenge) {
        info!(
            url = ?challenge.verification_url,
            code = ?challenge.user_code,
            "Interactive authentication required"
        );
        self.publish().await;
    }

    /// Send a chat line through the active session
    pub async fn send_chat(&self, text: &str) -> Result<(), IntentError> {
        if self.state.phase != Phase::Connected {
            return Err(IntentError::NotConnected);
        }
        let handle = self.handle.as_ref().ok_or(IntentError::NotConnected)?;
        handle
            .chat(text)
            .await
            .map_err(|e| IntentError::SendFailed(e.to_string()))
    }

    /// Publish coalesced position changes
    pub async fn refresh_position(&mut self) {
        if self.position_dirty && self.state.phase == Phase::Connected {
            self.position_dirty = false;
            self.publish().await;
        }
    }

    /// Leave the world and remove the status post
    pub async fn shutdown(&mut self) {
        self.request_leave().await;
        self.projector.retire().await;
    }

    async fn publish(&mut self) {
        let snapshot = self.snapshot();
        self.projector.publish(snapshot).await;
    }
}

fn quit_in_background(handle: Box<dyn GameHandle>) {
    tokio::spawn(async move {
        if let Err(e) = handle.quit().await {
            debug!("Quit of abandoned session failed: {}", e);
        }
    });
}
