//! 指标描述和 Prometheus 记录器

use metrics::{describe_counter, Unit};
#[cfg(feature = "prometheus")]
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

#[cfg(feature = "prometheus")]
use crate::error::ObservabilityError;
use crate::error::Result;

pub const CONNECT_ATTEMPTS: &str = "tether_connect_attempts_total";
pub const RECONNECTS_SCHEDULED: &str = "tether_reconnects_scheduled_total";
pub const SESSION_TERMINATIONS: &str = "tether_session_terminations_total";
pub const STATUS_PUBLISH_FAILURES: &str = "tether_status_publish_failures_total";
pub const INTENTS: &str = "tether_intents_total";

/// 为桥接产生的所有指标注册说明
pub fn describe_metrics() {
    describe_counter!(
        CONNECT_ATTEMPTS,
        Unit::Count,
        "Connection attempts started against the game world"
    );
    describe_counter!(
        RECONNECTS_SCHEDULED,
        Unit::Count,
        "Reconnect waits scheduled after a session terminated"
    );
    describe_counter!(
        SESSION_TERMINATIONS,
        Unit::Count,
        "Game sessions that ended, labelled by cause"
    );
    describe_counter!(
        STATUS_PUBLISH_FAILURES,
        Unit::Count,
        "Status surface calls that failed"
    );
    describe_counter!(
        INTENTS,
        Unit::Count,
        "Operator intents applied, labelled by kind and outcome"
    );
}

/// 全局指标记录器
pub struct MetricsRecorder {
    #[cfg(feature = "prometheus")]
    handle: PrometheusHandle,
}

impl std::fmt::Debug for MetricsRecorder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetricsRecorder").finish_non_exhaustive()
    }
}

impl MetricsRecorder {
    /// 全局安装记录器并注册指标说明
    #[cfg(feature = "prometheus")]
    pub fn install() -> Result<Self> {
        let recorder = PrometheusBuilder::new().build_recorder();
        let handle = recorder.handle();

        metrics::set_global_recorder(recorder)
            .map_err(|e| ObservabilityError::Recorder(e.to_string()))?;
        describe_metrics();

        tracing::info!(target: "tether_observability", "Metrics recorder installed");
        Ok(Self { handle })
    }

    #[cfg(not(feature = "prometheus"))]
    pub fn install() -> Result<Self> {
        describe_metrics();
        Ok(Self {})
    }

    /// 以 Prometheus 文本格式导出当前指标
    pub fn render(&self) -> String {
        #[cfg(feature = "prometheus")]
        {
            self.handle.render()
        }
        #[cfg(not(feature = "prometheus"))]
        {
            String::new()
        }
    }
}
