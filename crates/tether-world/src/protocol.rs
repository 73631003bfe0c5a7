//! Wire protocol spoken with the game-session adapter
//!
//! Every frame is a JSON object. Frames we send are tagged with `op`, frames
//! we receive with `event`. Text that does not parse as an event is treated
//! as diagnostic output from the adapter. One frame carries one complete
//! line, so diagnostics are handed on with their line break.

use serde::{Deserialize, Serialize};
use tether_core::{GameEvent, Position};

/// Frame sent to the adapter
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum ClientOp {
    Hello {
        username: String,
        auth: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        version: Option<String>,
    },
    Chat {
        text: String,
    },
    Quit,
}

/// Frame received from the adapter
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum WorldEvent {
    Login {
        username: String,
    },
    Spawn,
    Move {
        x: f64,
        y: f64,
        z: f64,
    },
    Respawn {
        world: String,
    },
    End {
        #[serde(default)]
        reason: Option<String>,
    },
    Error {
        message: String,
    },
    Kicked {
        reason: String,
    },
    AuthPending {
        #[serde(default)]
        url: Option<String>,
        #[serde(default)]
        code: Option<String>,
    },
    /// Adapter log output
    Log {
        text: String,
    },
}

/// What an incoming text frame means to the bridge
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    Event(GameEvent),
    Diagnostic(String),
}

/// Classify one incoming text frame
pub fn classify(text: &str) -> Inbound {
    let event = match serde_json::from_str::<WorldEvent>(text) {
        Ok(event) => event,
        Err(_) => return Inbound::Diagnostic(as_line(text)),
    };

    let event = match event {
        WorldEvent::Login { username } => GameEvent::Login { username },
        WorldEvent::Spawn => GameEvent::Spawn,
        WorldEvent::Move { x, y, z } => GameEvent::Move {
            position: Position::new(x, y, z),
        },
        WorldEvent::Respawn { world } => GameEvent::Respawn { world },
        WorldEvent::End { reason } => GameEvent::End {
            reason: reason.unwrap_or_else(|| "session ended".to_string()),
        },
        WorldEvent::Error { message } => GameEvent::Error { message },
        WorldEvent::Kicked { reason } => GameEvent::Kicked { reason },
        WorldEvent::AuthPending { url, code } => GameEvent::AuthPending { url, code },
        WorldEvent::Log { text } => return Inbound::Diagnostic(as_line(&text)),
    };
    Inbound::Event(event)
}

fn as_line(text: &str) -> String {
    let mut line = text.trim_end_matches(['\r', '\n']).to_string();
    line.push('\n');
    line
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ops_are_tagged() {
        let hello = ClientOp::Hello {
            username: "Steve".to_string(),
            auth: "microsoft".to_string(),
            version: None,
        };
        assert_eq!(
            serde_json::to_string(&hello).unwrap(),
            r#"{"op":"hello","username":"Steve","auth":"microsoft"}"#
        );
        assert_eq!(serde_json::to_string(&ClientOp::Quit).unwrap(), r#"{"op":"quit"}"#);
    }

    #[test]
    fn test_classify_events() {
        assert_eq!(
            classify(r#"{"event":"move","x":10.0,"y":64.0,"z":-2.5}"#),
            Inbound::Event(GameEvent::Move {
                position: Position::new(10.0, 64.0, -2.5)
            })
        );
        assert_eq!(
            classify(r#"{"event":"respawn","world":"the_nether"}"#),
            Inbound::Event(GameEvent::Respawn {
                world: "the_nether".to_string()
            })
        );
        assert_eq!(
            classify(r#"{"event":"end"}"#),
            Inbound::Event(GameEvent::End {
                reason: "session ended".to_string()
            })
        );
        assert_eq!(
            classify(r#"{"event":"auth_pending","code":"AB12CD"}"#),
            Inbound::Event(GameEvent::AuthPending {
                url: None,
                code: Some("AB12CD".to_string())
            })
        );
    }

    #[test]
    fn test_log_and_unknown_frames_are_diagnostics() {
        assert_eq!(
            classify(r#"{"event":"log","text":"[msa] use the code AB12CD"}"#),
            Inbound::Diagnostic("[msa] use the code AB12CD\n".to_string())
        );
        assert_eq!(
            classify("plain adapter output\r\n"),
            Inbound::Diagnostic("plain adapter output\n".to_string())
        );
        assert_eq!(
            classify(r#"{"event":"weather","kind":"rain"}"#),
            Inbound::Diagnostic("{\"event\":\"weather\",\"kind\":\"rain\"}\n".to_string())
        );
    }
}
