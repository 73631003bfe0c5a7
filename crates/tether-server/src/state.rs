//! 应用共享状态

use std::sync::Arc;
use std::time::Duration;

use tether_config::{Config, StatusConfig};
use tether_core::{BridgeConfig, IntentGate, StatusSurface, SupervisorConfig, SurfaceError};
use tether_observability::{LogManager, MetricsRecorder};
use tokio::sync::Mutex;

use crate::surface::{LogSurface, WebhookSurface};

/// 所有 HTTP handler 共享的状态
#[derive(Debug, Clone)]
pub struct AppState {
    pub gate: IntentGate,
    /// 修改类路由需要的 Bearer token
    pub api_token: Option<String>,
    pub metrics: Option<Arc<MetricsRecorder>>,
    /// 本进程安装了全局 subscriber 时才有
    pub logging: Option<Arc<Mutex<LogManager>>>,
}

impl AppState {
    pub fn new(gate: IntentGate, api_token: Option<String>) -> Self {
        Self {
            gate,
            api_token,
            metrics: None,
            logging: None,
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<MetricsRecorder>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn with_logging(mut self, logging: LogManager) -> Self {
        self.logging = Some(Arc::new(Mutex::new(logging)));
        self
    }
}

/// 从配置文件生成桥接配置
pub fn bridge_config(config: &Config) -> BridgeConfig {
    BridgeConfig {
        supervisor: SupervisorConfig {
            identity: config.world.username.clone(),
            max_reconnect_attempts: config.reconnect.max_attempts,
            base_delay: Duration::from_millis(config.reconnect.base_delay_ms),
            connect_timeout: Duration::from_secs(config.world.connect_timeout_secs),
            surface_timeout: Duration::from_secs(config.status.request_timeout_secs),
        },
        status_refresh: Duration::from_secs(config.status.refresh_secs),
        max_message_len: config.chat.max_message_len,
    }
}

/// 配置了 URL 时使用 webhook, 否则写日志
pub fn status_surface(config: &StatusConfig) -> Result<Arc<dyn StatusSurface>, SurfaceError> {
    match &config.webhook_url {
        Some(url) => {
            tracing::info!("Publishing status to webhook");
            let timeout = Duration::from_secs(config.request_timeout_secs);
            let surface = WebhookSurface::new(url.clone(), config.title.clone(), timeout)?;
            Ok(Arc::new(surface))
        }
        None => {
            tracing::info!("No webhook configured, publishing status to the log");
            Ok(Arc::new(LogSurface::new()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bridge_config_from_file_config() {
        let mut config = Config::default();
        config.world.username = "Steve".to_string();
        config.reconnect.base_delay_ms = 1500;
        config.reconnect.max_attempts = 3;
        config.chat.max_message_len = 100;
        config.status.request_timeout_secs = 4;

        let bridge = bridge_config(&config);
        assert_eq!(bridge.supervisor.identity, "Steve");
        assert_eq!(bridge.supervisor.max_reconnect_attempts, 3);
        assert_eq!(bridge.supervisor.base_delay, Duration::from_millis(1500));
        assert_eq!(bridge.supervisor.connect_timeout, Duration::from_secs(30));
        assert_eq!(bridge.supervisor.surface_timeout, Duration::from_secs(4));
        assert_eq!(bridge.status_refresh, Duration::from_secs(30));
        assert_eq!(bridge.max_message_len, 100);
    }

    #[test]
    fn test_status_surface_selection() {
        let mut config = StatusConfig::default();
        assert!(status_surface(&config).is_ok());

        config.webhook_url = Some("http://localhost/hook".to_string());
        assert!(status_surface(&config).is_ok());
    }
}
