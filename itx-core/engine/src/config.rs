//! 引擎配置管理
//!
//! 支持从多个源加载配置:
//! - 环境变量 (优先级最高)
//! - 配置文件 (TOML/YAML/JSON)
//! - 默认值 (优先级最低)
//!
//! 配置文件搜索路径 (按优先级):
//! 1. `ITX_CONFIG` 环境变量指定的路径
//! 2. `./itx.toml` / `./itx.yaml` / `./itx.json` (当前目录)
//! 3. `./tests/itx.toml` (tests 目录)
//! 4. `~/.config/itx/itx.toml` (用户配置目录)
//! 5. `/etc/itx/itx.toml` (系统配置目录)

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::context::{DEFAULT_AUTO_SLEEP, DEFAULT_MAX_RESOLUTION_DEPTH};

/// 引擎配置 (顶层)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// 环境配置
    #[serde(default)]
    pub environment: EnvironmentConfig,

    /// 执行配置
    #[serde(default)]
    pub execution: ExecutionConfig,

    /// 测试套件并行配置
    #[serde(default)]
    pub parallel: ParallelConfig,

    /// 注入每个执行上下文的全局变量
    #[serde(default)]
    pub variables: HashMap<String, String>,
}

/// 环境配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnvironmentConfig {
    /// 日志级别 (debug/info/warn/error)
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

/// 执行配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionConfig {
    /// 重试容器未设置等待时间时的默认值 (毫秒)
    #[serde(default = "default_auto_sleep_ms")]
    pub default_auto_sleep_ms: u64,

    /// 占位符解析的最大嵌套深度
    #[serde(default = "default_max_resolution_depth")]
    pub max_resolution_depth: usize,

    /// 单个测试用例主链的超时时间 (秒)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
}

/// 并行执行配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParallelConfig {
    /// 最大并发数 (默认: 10)
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: usize,

    /// 失败策略
    #[serde(default)]
    pub on_failure: FailureStrategy,
}

/// 失败策略
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum FailureStrategy {
    /// 继续执行其他用例 (默认)
    #[default]
    Continue,
    /// 快速失败 - 不启动新用例但等待已运行用例完成
    FailFast,
}

// ============================================
// 默认值函数
// ============================================

fn default_log_level() -> String {
    "info".to_string()
}
fn default_auto_sleep_ms() -> u64 {
    DEFAULT_AUTO_SLEEP.as_millis() as u64
}
fn default_max_resolution_depth() -> usize {
    DEFAULT_MAX_RESOLUTION_DEPTH
}
fn default_max_concurrent() -> usize {
    10
}

impl Default for EnvironmentConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            default_auto_sleep_ms: default_auto_sleep_ms(),
            max_resolution_depth: default_max_resolution_depth(),
            timeout_secs: None,
        }
    }
}

impl Default for ParallelConfig {
    fn default() -> Self {
        Self {
            max_concurrent: default_max_concurrent(),
            on_failure: FailureStrategy::default(),
        }
    }
}

impl ExecutionConfig {
    pub fn default_auto_sleep(&self) -> Duration {
        Duration::from_millis(self.default_auto_sleep_ms)
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }
}

// ============================================
// 配置加载
// ============================================

impl EngineConfig {
    /// 从多个源加载配置 (优先级: 环境变量 > 配置文件 > 默认值)
    pub fn load() -> Result<Self> {
        let mut config = Self::default();

        if let Some(path) = Self::find_config_file() {
            tracing::debug!("加载配置文件: {:?}", path);
            config = Self::load_from_file(&path)?;
        } else {
            tracing::debug!("未找到配置文件, 使用默认值");
        }

        config.apply_env_vars()?;
        config.validate()?;

        Ok(config)
    }

    /// 从指定文件加载配置
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;

        let config = match path.extension().and_then(|s| s.to_str()) {
            Some("toml") => toml::from_str(&content)
                .with_context(|| format!("Failed to parse TOML config: {:?}", path))?,
            Some("yaml") | Some("yml") => serde_yaml::from_str(&content)
                .with_context(|| format!("Failed to parse YAML config: {:?}", path))?,
            Some("json") => serde_json::from_str(&content)
                .with_context(|| format!("Failed to parse JSON config: {:?}", path))?,
            _ => anyhow::bail!("Unsupported config file format: {:?}", path),
        };

        Ok(config)
    }

    /// 查找配置文件 (按优先级搜索)
    fn find_config_file() -> Option<PathBuf> {
        if let Ok(path) = env::var("ITX_CONFIG") {
            let p = PathBuf::from(path);
            if p.exists() {
                return Some(p);
            }
        }

        let mut candidates = vec![
            PathBuf::from("./itx.toml"),
            PathBuf::from("./itx.yaml"),
            PathBuf::from("./itx.json"),
            PathBuf::from("./tests/itx.toml"),
        ];

        if let Some(home) = dirs::home_dir() {
            candidates.push(home.join(".config/itx/itx.toml"));
            candidates.push(home.join(".config/itx/itx.yaml"));
        }

        #[cfg(target_os = "linux")]
        candidates.push(PathBuf::from("/etc/itx/itx.toml"));

        candidates.into_iter().find(|path| path.exists())
    }

    /// 从环境变量覆盖配置
    fn apply_env_vars(&mut self) -> Result<()> {
        self.apply_overrides(|key| env::var(key).ok())
    }

    /// 按给定的查找函数覆盖配置
    pub fn apply_overrides<F>(&mut self, get: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(level) = get("ITX_LOG_LEVEL") {
            self.environment.log_level = level;
        }
        if let Some(sleep) = get("ITX_AUTO_SLEEP_MS") {
            self.execution.default_auto_sleep_ms =
                sleep.parse().context("Invalid ITX_AUTO_SLEEP_MS value")?;
        }
        if let Some(depth) = get("ITX_MAX_DEPTH") {
            self.execution.max_resolution_depth =
                depth.parse().context("Invalid ITX_MAX_DEPTH value")?;
        }
        if let Some(timeout) = get("ITX_TEST_TIMEOUT") {
            self.execution.timeout_secs =
                Some(timeout.parse().context("Invalid ITX_TEST_TIMEOUT value")?);
        }
        if let Some(concurrent) = get("ITX_MAX_CONCURRENT") {
            self.parallel.max_concurrent = concurrent
                .parse()
                .context("Invalid ITX_MAX_CONCURRENT value")?;
        }

        Ok(())
    }

    /// 验证配置
    pub fn validate(&self) -> Result<()> {
        if self.execution.max_resolution_depth == 0 {
            anyhow::bail!("max_resolution_depth must be greater than 0");
        }
        if self.parallel.max_concurrent == 0 {
            anyhow::bail!("max_concurrent must be greater than 0");
        }
        Ok(())
    }

    /// 保存配置到文件
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {:?}", parent))?;
        }

        let content = match path.extension().and_then(|s| s.to_str()) {
            Some("toml") => toml::to_string_pretty(self).context("Failed to serialize to TOML")?,
            Some("yaml") | Some("yml") => {
                serde_yaml::to_string(self).context("Failed to serialize to YAML")?
            }
            Some("json") => {
                serde_json::to_string_pretty(self).context("Failed to serialize to JSON")?
            }
            _ => anyhow::bail!("Unsupported config file format: {:?}", path),
        };

        fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {:?}", path))?;

        Ok(())
    }
}
