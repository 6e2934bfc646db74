//! 动作执行错误
//!
//! 叶子动作抛出领域错误 ([`ErrorCause`]), 经 [`ActionError`] 这一唯一通道向上传播。

use std::fmt;
use std::sync::Arc;

use thiserror::Error;

/// 执行上下文错误
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ContextError {
    /// 变量不存在
    #[error("未知变量: {0}")]
    UnknownVariable(String),

    /// 变量引用无法解析 (循环引用或嵌套过深)
    #[error("变量 '{name}' 解析失败: {reason}")]
    VariableResolution { name: String, reason: String },
}

/// 失败原因
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ErrorCause {
    #[error("未知变量: {0}")]
    UnknownVariable(String),

    #[error("变量 '{name}' 解析失败: {reason}")]
    VariableResolution { name: String, reason: String },

    #[error("模板不存在: {0}")]
    TemplateNotFound(String),

    #[error("条件 '{expression}' 求值失败: {reason}")]
    ConditionEvaluation { expression: String, reason: String },

    /// 通用动作失败 (例如断言不通过)
    #[error("{0}")]
    Failed(String),

    #[error("执行超时 ({timeout_ms} 毫秒)")]
    Timeout { timeout_ms: u64 },

    #[error("执行过程中发生 panic: {0}")]
    Panicked(String),

    /// 由叶子动作自定义类型名的领域错误
    #[error("{type_name}: {message}")]
    Custom { type_name: String, message: String },
}

impl ErrorCause {
    /// 错误类型名, 供 catch 容器按类型匹配
    pub fn type_name(&self) -> &str {
        match self {
            ErrorCause::UnknownVariable(_) => "UnknownVariableError",
            ErrorCause::VariableResolution { .. } => "VariableResolutionError",
            ErrorCause::TemplateNotFound(_) => "TemplateNotFoundError",
            ErrorCause::ConditionEvaluation { .. } => "ConditionEvaluationError",
            ErrorCause::Failed(_) => "ActionFailedError",
            ErrorCause::Timeout { .. } => "TimeoutError",
            ErrorCause::Panicked(_) => "PanicError",
            ErrorCause::Custom { type_name, .. } => type_name,
        }
    }

    /// 创建自定义类型的错误
    pub fn custom(type_name: impl Into<String>, message: impl Into<String>) -> Self {
        ErrorCause::Custom {
            type_name: type_name.into(),
            message: message.into(),
        }
    }
}

impl From<ContextError> for ErrorCause {
    fn from(err: ContextError) -> Self {
        match err {
            ContextError::UnknownVariable(name) => ErrorCause::UnknownVariable(name),
            ContextError::VariableResolution { name, reason } => {
                ErrorCause::VariableResolution { name, reason }
            }
        }
    }
}

/// 动作失败
///
/// 原因以 `Arc` 持有, 容器重新抛出时保持同一个原因对象。
/// `path` 记录错误经过的动作名称, 由内向外。
#[derive(Debug, Clone)]
pub struct ActionError {
    cause: Arc<ErrorCause>,
    path: Vec<String>,
}

impl ActionError {
    pub fn new(cause: ErrorCause) -> Self {
        Self {
            cause: Arc::new(cause),
            path: Vec::new(),
        }
    }

    /// 通用失败
    pub fn failed(message: impl Into<String>) -> Self {
        Self::new(ErrorCause::Failed(message.into()))
    }

    pub fn cause(&self) -> &ErrorCause {
        &self.cause
    }

    pub fn type_name(&self) -> &str {
        self.cause.type_name()
    }

    /// 传播路径 (由内向外)
    pub fn path(&self) -> &[String] {
        &self.path
    }

    /// 记录错误经过的动作
    pub fn within(mut self, name: impl Into<String>) -> Self {
        self.path.push(name.into());
        self
    }

    /// 两个错误是否持有同一个原因对象
    pub fn same_cause(&self, other: &ActionError) -> bool {
        Arc::ptr_eq(&self.cause, &other.cause)
    }

    /// 由外向内的可读路径, 例如 `main -> repeat-on-error -> fail`
    pub fn path_display(&self) -> String {
        self.path
            .iter()
            .rev()
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join(" -> ")
    }
}

impl fmt::Display for ActionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.path.is_empty() {
            write!(f, "{}", self.cause)
        } else {
            write!(f, "{} (位置: {})", self.cause, self.path_display())
        }
    }
}

impl std::error::Error for ActionError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(self.cause.as_ref())
    }
}

impl From<ErrorCause> for ActionError {
    fn from(cause: ErrorCause) -> Self {
        ActionError::new(cause)
    }
}

impl From<ContextError> for ActionError {
    fn from(err: ContextError) -> Self {
        ActionError::new(err.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_names() {
        assert_eq!(
            ErrorCause::UnknownVariable("x".into()).type_name(),
            "UnknownVariableError"
        );
        assert_eq!(
            ErrorCause::TemplateNotFound("t".into()).type_name(),
            "TemplateNotFoundError"
        );
        assert_eq!(ErrorCause::Failed("boom".into()).type_name(), "ActionFailedError");
        assert_eq!(
            ErrorCause::custom("IllegalStateError", "bad").type_name(),
            "IllegalStateError"
        );
    }

    #[test]
    fn test_context_error_conversion() {
        let err: ActionError = ContextError::UnknownVariable("missing".into()).into();
        assert_eq!(err.type_name(), "UnknownVariableError");
        assert_eq!(
            err.cause(),
            &ErrorCause::UnknownVariable("missing".to_string())
        );
    }

    #[test]
    fn test_path_keeps_cause_identity() {
        let original = ActionError::failed("boom");
        let propagated = original.clone().within("fail").within("sequential");

        assert!(propagated.same_cause(&original));
        assert_eq!(propagated.path(), &["fail".to_string(), "sequential".to_string()]);
        assert_eq!(propagated.path_display(), "sequential -> fail");
    }

    #[test]
    fn test_display_with_path() {
        let err = ActionError::failed("boom").within("fail").within("main");
        let text = err.to_string();
        assert!(text.contains("boom"));
        assert!(text.contains("main -> fail"));

        assert_eq!(ActionError::failed("plain").to_string(), "plain");
    }

    #[test]
    fn test_distinct_errors_do_not_share_cause() {
        let a = ActionError::failed("same");
        let b = ActionError::failed("same");
        assert!(!a.same_cause(&b));
        assert_eq!(a.cause(), b.cause());
    }
}
