//! Core value types shared by the bridge components

use serde::{Deserialize, Serialize};
use std::fmt;

/// World label used whenever the presence is not in a world
pub const UNKNOWN_WORLD: &str = "unknown";

/// Connection phase of the game-world session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Idle,
    Connecting,
    Connected,
    Disconnected,
}

impl Phase {
    /// Whether a session is being established or already established
    pub fn is_active(self) -> bool {
        matches!(self, Phase::Connecting | Phase::Connected)
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Idle => "idle",
            Phase::Connecting => "connecting",
            Phase::Connected => "connected",
            Phase::Disconnected => "disconnected",
        };
        f.write_str(name)
    }
}

/// Position of the presence in the world
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Position {
    pub const ORIGIN: Position = Position {
        x: 0.0,
        y: 0.0,
        z: 0.0,
    };

    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.1}, {:.1}, {:.1}", self.x, self.y, self.z)
    }
}

/// Identity of an operator that issued an intent
///
/// Only the identity is kept; the bridge never owns or calls back into the
/// operator.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OperatorId(String);

impl OperatorId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OperatorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifier of one connection attempt and the session it produces
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(u64);

impl SessionId {
    pub fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "session-{}", self.0)
    }
}

/// State of the bridged session, owned by the supervisor
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionState {
    pub phase: Phase,
    /// Operator intent, independent of the actual phase
    pub should_join: bool,
    pub reconnect_attempts: u32,
    pub max_reconnect_attempts: u32,
    pub world: String,
    pub position: Position,
    /// In-game name of the presence
    pub identity: String,
}

impl SessionState {
    pub fn new(identity: impl Into<String>, max_reconnect_attempts: u32) -> Self {
        Self {
            phase: Phase::Idle,
            should_join: false,
            reconnect_attempts: 0,
            max_reconnect_attempts,
            world: UNKNOWN_WORLD.to_string(),
            position: Position::ORIGIN,
            identity: identity.into(),
        }
    }

    /// Reset world label and position to their sentinels
    pub fn reset_world(&mut self) {
        self.world = UNKNOWN_WORLD.to_string();
        self.position = Position::ORIGIN;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_state_is_idle() {
        let state = SessionState::new("bridge", 5);
        assert_eq!(state.phase, Phase::Idle);
        assert!(!state.should_join);
        assert_eq!(state.world, UNKNOWN_WORLD);
        assert_eq!(state.position, Position::ORIGIN);
    }

    #[test]
    fn test_reset_world() {
        let mut state = SessionState::new("bridge", 5);
        state.world = "the_nether".to_string();
        state.position = Position::new(1.0, 2.0, 3.0);
        state.reset_world();
        assert_eq!(state.world, UNKNOWN_WORLD);
        assert_eq!(state.position, Position::ORIGIN);
    }

    #[test]
    fn test_position_display() {
        assert_eq!(Position::new(10.0, 64.0, -3.5).to_string(), "10.0, 64.0, -3.5");
    }
}
