//! Tether Core - session bridge between a control plane and a game world
//!
//! The bridge owns exactly one logical game-world session. Operator intents,
//! session lifecycle events and side-channel diagnostics are all funnelled
//! through a single actor task so state is only ever mutated from one place.

pub mod auth;
pub mod client;
pub mod error;
pub mod gate;
pub mod projector;
pub mod supervisor;
pub mod surface;
pub mod types;

pub use auth::{AuthChallenge, AuthChallengeDetector};
pub use client::{GameClient, GameEvent, GameHandle, SessionSignal, SessionSink};
pub use error::{ClientError, IntentError, SurfaceError};
pub use gate::{BridgeConfig, Intent, IntentGate};
pub use projector::{StatusKind, StatusProjector, StatusSnapshot, DEFAULT_SURFACE_TIMEOUT};
pub use supervisor::{SessionSupervisor, SupervisorConfig, TerminationCause};
pub use surface::{PostHandle, StatusSurface};
pub use types::{OperatorId, Phase, Position, SessionId, SessionState, UNKNOWN_WORLD};
