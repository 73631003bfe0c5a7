//! 结构化日志
//!
//! 设置了 `RUST_LOG` 时优先于配置文件中的级别, 便于单独调高某个模块的日志。

use std::sync::Arc;

use parking_lot::RwLock;
use tether_config::LoggingConfig;
use tracing_subscriber::{
    layer::SubscriberExt,
    reload::{self, Handle},
    util::SubscriberInitExt,
    EnvFilter, Registry,
};

use crate::error::{ObservabilityError, Result};

type ReloadHandle = Handle<EnvFilter, Registry>;

/// 日志管理器, 持有全局 subscriber 的过滤器
#[derive(Debug)]
pub struct LogManager {
    level: String,
    json: bool,
    reload_handle: Arc<RwLock<ReloadHandle>>,
}

impl LogManager {
    /// 安装全局 subscriber, 已安装时返回错误
    pub fn init(config: &LoggingConfig) -> Result<Self> {
        let level = config.level.to_string();
        let filter = build_filter(&level)?;
        let (filter, reload_handle) = reload::Layer::new(filter);

        let registry = tracing_subscriber::registry().with(filter);

        let installed = if config.json {
            let layer = tracing_subscriber::fmt::layer()
                .json()
                .with_target(true)
                .with_current_span(true);
            registry.with(layer).try_init()
        } else {
            let layer = tracing_subscriber::fmt::layer().with_target(true);
            registry.with(layer).try_init()
        };
        installed.map_err(|e| ObservabilityError::Subscriber(e.to_string()))?;

        tracing::info!(
            target: "tether_observability",
            "Log manager initialized with level: {}",
            level
        );

        Ok(Self {
            level,
            json: config.json,
            reload_handle: Arc::new(RwLock::new(reload_handle)),
        })
    }

    /// 动态更新日志级别
    pub fn update_level(&mut self, level: &str) -> Result<()> {
        let new_filter = EnvFilter::try_new(level)?;

        self.reload_handle
            .write()
            .modify(|filter| *filter = new_filter)
            .map_err(|e| ObservabilityError::Reload(e.to_string()))?;

        self.level = level.to_string();
        tracing::info!(target: "tether_observability", "Log level updated to: {}", level);
        Ok(())
    }

    pub fn level(&self) -> &str {
        &self.level
    }

    pub fn is_json(&self) -> bool {
        self.json
    }
}

fn build_filter(level: &str) -> Result<EnvFilter> {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return Ok(filter);
    }
    Ok(EnvFilter::try_new(level)?)
}

/// 单个游戏会话的 span
pub fn session_span(session: &str) -> tracing::Span {
    tracing::info_span!("session", session = %session)
}

/// 单个操作者意图的 span
pub fn intent_span(kind: &str, operator: Option<&str>) -> tracing::Span {
    match operator {
        Some(operator) => tracing::info_span!("intent", kind = %kind, operator = %operator),
        None => tracing::info_span!("intent", kind = %kind),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tether_config::LogLevel;

    #[test]
    fn test_log_manager_init_and_update() {
        let config = LoggingConfig {
            level: LogLevel::Debug,
            json: false,
        };

        let mut manager = LogManager::init(&config).unwrap();
        assert_eq!(manager.level(), "debug");
        assert!(!manager.is_json());

        manager.update_level("tether_core=trace,info").unwrap();
        assert_eq!(manager.level(), "tether_core=trace,info");

        assert!(matches!(
            manager.update_level("tether_core=loud"),
            Err(ObservabilityError::Filter(_))
        ));
        assert_eq!(manager.level(), "tether_core=trace,info");

        assert!(LogManager::init(&config).is_err());
    }

    #[test]
    fn test_create_spans() {
        let span = session_span("session-3");
        assert_eq!(span.metadata().map(|m| m.name()), Some("session"));

        let span = intent_span("join", Some("alice"));
        assert_eq!(span.metadata().map(|m| m.name()), Some("intent"));
    }
}
