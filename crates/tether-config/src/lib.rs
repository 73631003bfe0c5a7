pub mod config;
pub mod manager;

pub use config::{
    AuthMode, ChatConfig, Config, ConfigError, ConfigResult, LogLevel, LoggingConfig,
    ReconnectConfig, ServerConfig, StatusConfig, WorldConfig,
};
pub use manager::ConfigManager;

use std::path::PathBuf;

/// 将开头的 `~/` 展开为用户主目录
pub fn expand_tilde(path: &str) -> Option<PathBuf> {
    match path.strip_prefix("~/") {
        Some(rest) => dirs::home_dir().map(|home| home.join(rest)),
        None => Some(PathBuf::from(path)),
    }
}
