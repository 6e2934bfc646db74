//! 内置叶子动作

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, info};

use crate::action::TestAction;
use crate::context::TestContext;
use crate::error::{ActionError, ErrorCause};

/// 输出一条日志, 消息中的占位符在执行时解析
#[derive(Debug, Clone)]
pub struct EchoAction {
    message: String,
}

impl EchoAction {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

#[async_trait]
impl TestAction for EchoAction {
    fn name(&self) -> &str {
        "echo"
    }

    async fn execute(&self, context: &mut TestContext) -> Result<(), ActionError> {
        let message = context.replace_dynamic_content(&self.message)?;
        info!("{}", message);
        Ok(())
    }
}

/// 总是失败的动作
#[derive(Debug, Clone)]
pub struct FailAction {
    message: String,
    error_type: Option<String>,
}

impl FailAction {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            error_type: None,
        }
    }

    /// 以自定义错误类型名失败, 便于 catch 容器按类型匹配
    pub fn with_error_type(mut self, error_type: impl Into<String>) -> Self {
        self.error_type = Some(error_type.into());
        self
    }
}

#[async_trait]
impl TestAction for FailAction {
    fn name(&self) -> &str {
        "fail"
    }

    async fn execute(&self, context: &mut TestContext) -> Result<(), ActionError> {
        let message = context.replace_dynamic_content(&self.message)?;
        let cause = match &self.error_type {
            Some(type_name) => ErrorCause::custom(type_name.clone(), message),
            None => ErrorCause::Failed(message),
        };
        Err(ActionError::new(cause))
    }
}

/// 暂停执行
#[derive(Debug, Clone)]
pub struct SleepAction {
    duration: Duration,
}

impl SleepAction {
    pub fn new(duration: Duration) -> Self {
        Self { duration }
    }

    pub fn millis(millis: u64) -> Self {
        Self::new(Duration::from_millis(millis))
    }
}

#[async_trait]
impl TestAction for SleepAction {
    fn name(&self) -> &str {
        "sleep"
    }

    async fn execute(&self, _context: &mut TestContext) -> Result<(), ActionError> {
        debug!("等待 {:?}", self.duration);
        tokio::time::sleep(self.duration).await;
        Ok(())
    }
}

/// 在当前作用域中创建变量
///
/// 字符串值在创建时即解析占位符, 按声明顺序依次写入,
/// 因此后声明的变量可以引用先声明的变量。
#[derive(Debug, Clone, Default)]
pub struct CreateVariablesAction {
    variables: Vec<(String, Value)>,
}

impl CreateVariablesAction {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn variable(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.variables.push((name.into(), value.into()));
        self
    }
}

#[async_trait]
impl TestAction for CreateVariablesAction {
    fn name(&self) -> &str {
        "create-variables"
    }

    async fn execute(&self, context: &mut TestContext) -> Result<(), ActionError> {
        for (name, value) in &self.variables {
            let value = match value {
                Value::String(text) => Value::String(context.replace_dynamic_content(text)?),
                other => other.clone(),
            };
            context.set_variable(name.clone(), value);
        }
        Ok(())
    }
}
