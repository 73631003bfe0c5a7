//! 可观测性错误类型

use tracing_subscriber::filter::ParseError;

/// 初始化日志或指标时的错误
#[derive(Debug, thiserror::Error)]
pub enum ObservabilityError {
    #[error("Invalid log filter: {0}")]
    Filter(#[from] ParseError),

    #[error("Global subscriber already installed: {0}")]
    Subscriber(String),

    #[error("Failed to swap log filter: {0}")]
    Reload(String),

    #[error("Failed to install metrics recorder: {0}")]
    Recorder(String),
}

pub type Result<T> = std::result::Result<T, ObservabilityError>;

#[cfg(test)]
mod tests {
    use super::*;
    use tracing_subscriber::EnvFilter;

    #[test]
    fn test_filter_errors_convert() {
        let err: ObservabilityError = EnvFilter::try_new("tether_core=loud").unwrap_err().into();
        assert!(matches!(err, ObservabilityError::Filter(_)));
        assert!(err.to_string().starts_with("Invalid log filter"));
    }
}
