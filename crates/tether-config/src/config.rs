use serde::{Deserialize, Serialize};
use std::fmt;

/// 顶层配置
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    pub version: String,
    pub world: WorldConfig,
    pub reconnect: ReconnectConfig,
    pub status: StatusConfig,
    pub server: ServerConfig,
    pub chat: ChatConfig,
    pub logging: LoggingConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: env!("CARGO_PKG_VERSION").to_string(),
            world: WorldConfig::default(),
            reconnect: ReconnectConfig::default(),
            status: StatusConfig::default(),
            server: ServerConfig::default(),
            chat: ChatConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Config {
    /// 按点分键读取配置值, 如 `reconnect.max_attempts`
    pub fn get_value(&self, key: &str) -> Option<String> {
        let parts: Vec<&str> = key.split('.').collect();
        match parts.as_slice() {
            ["version"] => Some(self.version.clone()),
            ["world", "url"] => Some(self.world.url.clone()),
            ["world", "username"] => Some(self.world.username.clone()),
            ["world", "auth"] => Some(self.world.auth.to_string()),
            ["world", "version"] => self.world.version.clone(),
            ["world", "connect_timeout_secs"] => Some(self.world.connect_timeout_secs.to_string()),
            ["reconnect", "base_delay_ms"] => Some(self.reconnect.base_delay_ms.to_string()),
            ["reconnect", "max_attempts"] => Some(self.reconnect.max_attempts.to_string()),
            ["status", "refresh_secs"] => Some(self.status.refresh_secs.to_string()),
            ["status", "webhook_url"] => self.status.webhook_url.clone(),
            ["status", "title"] => Some(self.status.title.clone()),
            ["status", "request_timeout_secs"] => {
                Some(self.status.request_timeout_secs.to_string())
            }
            ["server", "host"] => Some(self.server.host.clone()),
            ["server", "port"] => Some(self.server.port.to_string()),
            ["server", "cors"] => Some(self.server.cors.to_string()),
            ["server", "api_token"] => self.server.api_token.clone(),
            ["chat", "max_message_len"] => Some(self.chat.max_message_len.to_string()),
            ["logging", "level"] => Some(self.logging.level.to_string()),
            ["logging", "json"] => Some(self.logging.json.to_string()),
            _ => None,
        }
    }

    /// 按点分键设置配置值
    pub fn set_value(&mut self, key: &str, value: &str) -> ConfigResult<()> {
        let parts: Vec<&str> = key.split('.').collect();
        match parts.as_slice() {
            ["world", "url"] => self.world.url = value.to_string(),
            ["world", "username"] => self.world.username = value.to_string(),
            ["world", "auth"] => self.world.auth = value.parse()?,
            ["world", "version"] => self.world.version = Some(value.to_string()),
            ["world", "connect_timeout_secs"] => {
                self.world.connect_timeout_secs = parse_number(value)?
            }
            ["reconnect", "base_delay_ms"] => self.reconnect.base_delay_ms = parse_number(value)?,
            ["reconnect", "max_attempts"] => self.reconnect.max_attempts = parse_number(value)?,
            ["status", "refresh_secs"] => self.status.refresh_secs = parse_number(value)?,
            ["status", "webhook_url"] => self.status.webhook_url = Some(value.to_string()),
            ["status", "title"] => self.status.title = value.to_string(),
            ["status", "request_timeout_secs"] => {
                self.status.request_timeout_secs = parse_number(value)?
            }
            ["server", "host"] => self.server.host = value.to_string(),
            ["server", "port"] => {
                self.server.port = value.parse().map_err(|_| {
                    ConfigError::Validation(format!("Invalid port number: {}", value))
                })?;
            }
            ["server", "cors"] => self.server.cors = parse_bool(value)?,
            ["server", "api_token"] => self.server.api_token = Some(value.to_string()),
            ["chat", "max_message_len"] => self.chat.max_message_len = parse_number(value)?,
            ["logging", "level"] => self.logging.level = value.parse()?,
            ["logging", "json"] => self.logging.json = parse_bool(value)?,
            _ => return Err(ConfigError::KeyNotFound(key.to_string())),
        }
        Ok(())
    }
}

fn parse_number<T: std::str::FromStr>(value: &str) -> ConfigResult<T> {
    value
        .parse()
        .map_err(|_| ConfigError::Validation(format!("Invalid number: {}", value)))
}

fn parse_bool(value: &str) -> ConfigResult<bool> {
    value
        .parse()
        .map_err(|_| ConfigError::Validation(format!("Invalid boolean: {}", value)))
}

/// 游戏会话适配器的登录方式
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum AuthMode {
    #[default]
    Offline,
    Microsoft,
}

impl fmt::Display for AuthMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthMode::Offline => f.write_str("offline"),
            AuthMode::Microsoft => f.write_str("microsoft"),
        }
    }
}

impl std::str::FromStr for AuthMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> ConfigResult<Self> {
        match s.to_lowercase().as_str() {
            "offline" => Ok(AuthMode::Offline),
            "microsoft" | "msa" => Ok(AuthMode::Microsoft),
            _ => Err(ConfigError::Validation(format!("Invalid auth mode: {}", s))),
        }
    }
}

/// 桥接要加入的游戏世界
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct WorldConfig {
    /// 游戏会话适配器的 WebSocket 地址
    pub url: String,
    pub username: String,
    pub auth: AuthMode,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    pub connect_timeout_secs: u64,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            url: "ws://127.0.0.1:25580".to_string(),
            username: "tether".to_string(),
            auth: AuthMode::Offline,
            version: None,
            connect_timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ReconnectConfig {
    /// 退避单位, 第 N 次重连等待 N 倍
    pub base_delay_ms: u64,
    pub max_attempts: u32,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            base_delay_ms: 5000,
            max_attempts: 5,
        }
    }
}

/// 状态发布的位置和频率
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct StatusConfig {
    pub refresh_secs: u64,
    /// 配置后发布到该 webhook, 否则写日志
    #[serde(skip_serializing_if = "Option::is_none")]
    pub webhook_url: Option<String>,
    pub title: String,
    /// 单次 webhook 请求的超时时间
    pub request_timeout_secs: u64,
}

impl Default for StatusConfig {
    fn default() -> Self {
        Self {
            refresh_secs: 30,
            webhook_url: None,
            title: "Tether".to_string(),
            request_timeout_secs: 10,
        }
    }
}

/// HTTP 控制 API
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ServerConfig {
    pub port: u16,
    pub host: String,
    pub cors: bool,
    /// 修改类路由需要的 Bearer token
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_token: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 8090,
            host: "127.0.0.1".to_string(),
            cors: true,
            api_token: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ChatConfig {
    pub max_message_len: usize,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            max_message_len: 256,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        };
        f.write_str(name)
    }
}

impl std::str::FromStr for LogLevel {
    type Err = ConfigError;

    fn from_str(s: &str) -> ConfigResult<Self> {
        match s.to_lowercase().as_str() {
            "trace" => Ok(LogLevel::Trace),
            "debug" => Ok(LogLevel::Debug),
            "info" => Ok(LogLevel::Info),
            "warn" | "warning" => Ok(LogLevel::Warn),
            "error" => Ok(LogLevel::Error),
            _ => Err(ConfigError::Validation(format!("Invalid log level: {}", s))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: LogLevel,
    /// 输出 JSON 行而不是文本格式
    pub json: bool,
}

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Key not found: {0}")]
    KeyNotFound(String),

    #[error("Environment variable not found: {0}")]
    EnvVarNotFound(String),

    #[error("Invalid path: {0}")]
    InvalidPath(String),
}

pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.reconnect.base_delay_ms, 5000);
        assert_eq!(config.reconnect.max_attempts, 5);
        assert_eq!(config.status.refresh_secs, 30);
        assert_eq!(config.status.request_timeout_secs, 10);
        assert_eq!(config.chat.max_message_len, 256);
        assert_eq!(config.world.auth, AuthMode::Offline);
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let config: Config =
            serde_json::from_str(r#"{"world": {"username": "Steve", "auth": "microsoft"}}"#)
                .unwrap();
        assert_eq!(config.world.username, "Steve");
        assert_eq!(config.world.auth, AuthMode::Microsoft);
        assert_eq!(config.world.url, WorldConfig::default().url);
        assert_eq!(config.server.port, 8090);
    }

    #[test]
    fn test_get_and_set_value() {
        let mut config = Config::default();

        config.set_value("reconnect.max_attempts", "3").unwrap();
        config.set_value("world.auth", "microsoft").unwrap();
        config.set_value("logging.level", "DEBUG").unwrap();

        assert_eq!(config.get_value("reconnect.max_attempts").as_deref(), Some("3"));
        assert_eq!(config.get_value("world.auth").as_deref(), Some("microsoft"));
        assert_eq!(config.get_value("logging.level").as_deref(), Some("debug"));
        assert_eq!(config.get_value("status.webhook_url"), None);
    }

    #[test]
    fn test_set_value_rejects_bad_input() {
        let mut config = Config::default();

        assert!(matches!(
            config.set_value("server.port", "http"),
            Err(ConfigError::Validation(_))
        ));
        assert!(matches!(
            config.set_value("world.auth", "password"),
            Err(ConfigError::Validation(_))
        ));
        assert!(matches!(
            config.set_value("world.colour", "blue"),
            Err(ConfigError::KeyNotFound(_))
        ));
    }
}
