//! 表达式错误定义

use thiserror::Error;

/// 表达式操作结果类型
pub type Result<T> = std::result::Result<T, ExpressionError>;

/// 表达式错误类型
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ExpressionError {
    /// 空表达式
    #[error("表达式为空")]
    EmptyExpression,

    /// 意外的词法单元
    #[error("意外的词法单元 '{token}' (位置 {position})")]
    UnexpectedToken { token: String, position: usize },

    /// 表达式意外结束
    #[error("表达式意外结束")]
    UnexpectedEnd,

    /// 括号不匹配
    #[error("括号不匹配 (位置 {0})")]
    UnbalancedParenthesis(usize),

    /// 括号嵌套过深
    #[error("括号嵌套超过 {0} 层")]
    NestingTooDeep(usize),

    /// 类型不匹配
    #[error("无法比较 '{left}' {operator} '{right}'")]
    TypeMismatch {
        left: String,
        operator: String,
        right: String,
    },

    /// 结果不是布尔值
    #[error("表达式结果不是布尔值: {0}")]
    NotBoolean(String),
}
