//! Tether server - control API and status surfaces around the bridge

pub mod api;
pub mod cli;
pub mod commands;
pub mod state;
pub mod surface;

pub use api::{create_router, run_server, ApiError};
pub use cli::{ConfigArgs, ConfigCommand};
pub use commands::{ChatCommand, CommandError};
pub use state::{bridge_config, status_surface, AppState};
pub use surface::{LogSurface, WebhookSurface};
