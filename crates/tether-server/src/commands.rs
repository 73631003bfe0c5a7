//! Text commands typed by operators in the control channel
//!
//! ```text
//! !join          join the world
//! !leave         leave the world
//! !say <text>    relay a chat line
//! !status        show the current status
//! ```

use tether_core::Intent;
use tether_core::OperatorId;

pub const COMMAND_PREFIX: char = '!';

/// A parsed operator command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatCommand {
    Join,
    Leave,
    Say(String),
    Status,
}

impl ChatCommand {
    /// Intent to submit for this command, `None` for read-only commands
    pub fn into_intent(self, operator: OperatorId) -> Option<Intent> {
        match self {
            ChatCommand::Join => Some(Intent::Join(Some(operator))),
            ChatCommand::Leave => Some(Intent::Leave),
            ChatCommand::Say(text) => Some(Intent::Send(text)),
            ChatCommand::Status => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CommandError {
    #[error("Commands start with '!'")]
    MissingPrefix,
    #[error("Unknown command: {0}")]
    Unknown(String),
    #[error("Usage: {0}")]
    Usage(&'static str),
}

/// Parse one command line. Command names are case-insensitive.
pub fn parse(line: &str) -> Result<ChatCommand, CommandError> {
    let line = line.trim();
    let body = line
        .strip_prefix(COMMAND_PREFIX)
        .ok_or(CommandError::MissingPrefix)?;

    let (name, rest) = match body.split_once(char::is_whitespace) {
        Some((name, rest)) => (name, rest.trim()),
        None => (body, ""),
    };

    match name.to_lowercase().as_str() {
        "join" if rest.is_empty() => Ok(ChatCommand::Join),
        "join" => Err(CommandError::Usage("!join")),
        "leave" if rest.is_empty() => Ok(ChatCommand::Leave),
        "leave" => Err(CommandError::Usage("!leave")),
        "status" if rest.is_empty() => Ok(ChatCommand::Status),
        "status" => Err(CommandError::Usage("!status")),
        "say" if !rest.is_empty() => Ok(ChatCommand::Say(rest.to_string())),
        "say" => Err(CommandError::Usage("!say <text>")),
        _ => Err(CommandError::Unknown(format!("{}{}", COMMAND_PREFIX, name))),
    }
}
