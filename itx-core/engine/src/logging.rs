//! 日志初始化

use tracing_subscriber::EnvFilter;

use crate::config::EngineConfig;

/// 安装全局 tracing 订阅者
///
/// 设置了 `RUST_LOG` 时以其为准, 否则使用 `level`。重复调用不会生效。
pub fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    if tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init()
        .is_err()
    {
        tracing::debug!("日志订阅者已存在, 跳过初始化");
    }
}

/// 按配置中的日志级别初始化
pub fn init_from_config(config: &EngineConfig) {
    init_logging(&config.environment.log_level);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repeated_init_is_noop() {
        init_logging("debug");
        init_from_config(&EngineConfig::default());
        tracing::info!("logging initialised");
    }
}
