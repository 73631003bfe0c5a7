//! Tether 可观测性
//!
//! 提供日志和指标的初始化。

pub mod error;
pub mod logging;
pub mod recorder;

pub use error::{ObservabilityError, Result};
pub use logging::{intent_span, session_span, LogManager};
pub use recorder::{describe_metrics, MetricsRecorder};
