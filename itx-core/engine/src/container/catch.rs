//! 错误捕获容器

use std::fmt;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::action::{execute_sequence, ActionContainer, TestAction};
use crate::context::TestContext;
use crate::error::ActionError;

/// 捕获哪些错误
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ExceptionFilter {
    /// 所有动作错误
    #[default]
    Any,
    /// 指定类型名, 例如 `UnknownVariableError`
    TypeName(String),
}

impl ExceptionFilter {
    /// 解析过滤器; `any`、`*` 以及基础类型名 `ActionError` 表示捕获全部
    pub fn parse(filter: &str) -> Self {
        match filter.trim() {
            "" | "any" | "*" | "ActionError" => ExceptionFilter::Any,
            type_name => ExceptionFilter::TypeName(type_name.to_string()),
        }
    }

    pub fn matches(&self, error: &ActionError) -> bool {
        match self {
            ExceptionFilter::Any => true,
            ExceptionFilter::TypeName(type_name) => error.type_name() == type_name,
        }
    }
}

impl From<&str> for ExceptionFilter {
    fn from(filter: &str) -> Self {
        ExceptionFilter::parse(filter)
    }
}

impl fmt::Display for ExceptionFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExceptionFilter::Any => write!(f, "any"),
            ExceptionFilter::TypeName(type_name) => write!(f, "{}", type_name),
        }
    }
}

/// 执行子动作, 吞掉匹配过滤器的错误
///
/// 不匹配的错误原样返回, 失败之后的子动作不会执行。
pub struct Catch {
    filter: ExceptionFilter,
    actions: Vec<Box<dyn TestAction>>,
}

impl Default for Catch {
    fn default() -> Self {
        Self::new()
    }
}

impl Catch {
    /// 捕获所有错误
    pub fn new() -> Self {
        Self::with_filter(ExceptionFilter::Any)
    }

    pub fn with_filter(filter: impl Into<ExceptionFilter>) -> Self {
        Self {
            filter: filter.into(),
            actions: Vec::new(),
        }
    }

    pub fn with_action(mut self, action: impl TestAction + 'static) -> Self {
        self.actions.push(Box::new(action));
        self
    }

    pub fn filter(&self) -> &ExceptionFilter {
        &self.filter
    }
}

#[async_trait]
impl TestAction for Catch {
    fn name(&self) -> &str {
        "catch"
    }

    async fn execute(&self, context: &mut TestContext) -> Result<(), ActionError> {
        debug!("catch 容器开始执行 (过滤器: {})", self.filter);
        match execute_sequence(&self.actions, context).await {
            Ok(()) => Ok(()),
            Err(err) if self.filter.matches(&err) => {
                warn!("已捕获错误 {}, 继续执行: {}", err.type_name(), err);
                Ok(())
            }
            Err(err) => Err(err),
        }
    }
}

impl ActionContainer for Catch {
    fn actions(&self) -> &[Box<dyn TestAction>] {
        &self.actions
    }
}
