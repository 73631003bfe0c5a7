use crate::config::{Config, ConfigError, ConfigResult};
use once_cell::sync::Lazy;
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info};

static ENV_VAR: Lazy<Regex> = Lazy::new(|| Regex::new(r"\$\{([^}]+)\}").unwrap());

/// 配置管理器: 负责加载、校验和保存配置文件
#[derive(Debug, Clone)]
pub struct ConfigManager {
    path: PathBuf,
    config: Arc<RwLock<Config>>,
}

impl ConfigManager {
    /// 加载配置文件, 文件不存在时写入默认配置
    pub async fn load(path: &Path) -> ConfigResult<Self> {
        let config = if path.exists() {
            debug!("Reading tether config {:?}", path);
            read_file(path).await?
        } else {
            info!("No config at {:?}, writing defaults", path);
            let defaults = Config::default();
            write_file(path, &defaults).await?;
            defaults
        };
        Ok(Self::new(config, path.to_path_buf()))
    }

    /// 用内存中的配置创建管理器
    pub fn new(config: Config, path: PathBuf) -> Self {
        Self {
            path,
            config: Arc::new(RwLock::new(config)),
        }
    }

    /// 当前配置的副本
    pub async fn snapshot(&self) -> Config {
        self.config.read().await.clone()
    }

    pub async fn save(&self) -> ConfigResult<()> {
        let config = self.snapshot().await;
        write_file(&self.path, &config).await?;
        info!("Saved tether config to {:?}", self.path);
        Ok(())
    }

    /// 修改配置并保存, 修改失败或校验不通过时丢弃本次修改
    pub async fn update<F>(&self, f: F) -> ConfigResult<()>
    where
        F: FnOnce(&mut Config) -> ConfigResult<()>,
    {
        {
            let mut current = self.config.write().await;
            let mut edited = current.clone();
            f(&mut edited)?;
            Self::validate(&edited)?;
            *current = edited;
        }
        self.save().await
    }

    pub fn validate(config: &Config) -> ConfigResult<()> {
        let world = &config.world;
        require(config.server.port != 0, || "server.port cannot be 0".to_string())?;
        require(
            world.url.starts_with("ws://") || world.url.starts_with("wss://"),
            || format!("world.url must be a ws:// or wss:// address: {}", world.url),
        )?;
        require(!world.username.trim().is_empty(), || {
            "world.username cannot be empty".to_string()
        })?;
        require(world.connect_timeout_secs > 0, || {
            "world.connect_timeout_secs must be positive".to_string()
        })?;
        require(config.reconnect.max_attempts > 0, || {
            "reconnect.max_attempts must be positive".to_string()
        })?;
        require(config.reconnect.base_delay_ms > 0, || {
            "reconnect.base_delay_ms must be positive".to_string()
        })?;
        require(config.status.refresh_secs > 0, || {
            "status.refresh_secs must be positive".to_string()
        })?;
        require(config.status.request_timeout_secs > 0, || {
            "status.request_timeout_secs must be positive".to_string()
        })?;
        if let Some(url) = &config.status.webhook_url {
            require(
                url.starts_with("http://") || url.starts_with("https://"),
                || format!("status.webhook_url must be an http(s) address: {}", url),
            )?;
        }
        require(config.chat.max_message_len > 0, || {
            "chat.max_message_len must be positive".to_string()
        })
    }

    /// 展开 `${VAR}` 和 `${VAR:-default}` 环境变量
    fn expand_env_vars(raw: &str) -> ConfigResult<String> {
        let mut expanded = raw.to_string();
        for cap in ENV_VAR.captures_iter(raw) {
            let (name, fallback) = match cap[1].split_once(":-") {
                Some((name, fallback)) => (name, Some(fallback)),
                None => (&cap[1], None),
            };
            let value = std::env::var(name)
                .ok()
                .or_else(|| fallback.map(str::to_string))
                .ok_or_else(|| ConfigError::EnvVarNotFound(name.to_string()))?;
            expanded = expanded.replace(&cap[0], &value);
        }
        Ok(expanded)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn require(ok: bool, message: impl FnOnce() -> String) -> ConfigResult<()> {
    if ok {
        Ok(())
    } else {
        Err(ConfigError::Validation(message()))
    }
}

async fn read_file(path: &Path) -> ConfigResult<Config> {
    let raw = tokio::fs::read_to_string(path).await?;
    let config: Config = serde_json::from_str(&ConfigManager::expand_env_vars(&raw)?)?;
    ConfigManager::validate(&config)?;
    Ok(config)
}

async fn write_file(path: &Path, config: &Config) -> ConfigResult<()> {
    if let Some(dir) = path.parent() {
        tokio::fs::create_dir_all(dir).await?;
    }
    tokio::fs::write(path, serde_json::to_string_pretty(config)?).await?;
    Ok(())
}
