//! 测试动作抽象

use std::any::Any;
use std::panic::AssertUnwindSafe;

use async_trait::async_trait;
use futures_util::FutureExt;
use tracing::{debug, error};

use crate::context::TestContext;
use crate::error::{ActionError, ErrorCause};

/// 测试动作
///
/// 动作树在执行期间只读, 可变状态全部存放在 [`TestContext`] 中,
/// 因此同一棵树可以被多个测试执行复用。
#[async_trait]
pub trait TestAction: Send + Sync {
    /// 动作名称, 用于日志和失败路径
    fn name(&self) -> &str;

    async fn execute(&self, context: &mut TestContext) -> Result<(), ActionError>;
}

/// 包含子动作的容器
pub trait ActionContainer: TestAction {
    fn actions(&self) -> &[Box<dyn TestAction>];

    fn action_count(&self) -> usize {
        self.actions().len()
    }

    fn action(&self, index: usize) -> Option<&dyn TestAction> {
        self.actions().get(index).map(|a| a.as_ref())
    }
}

/// 依次执行动作, 遇到第一个失败即停止
///
/// 失败会记录出错子动作的名称后原样返回, 后续动作不再执行。
/// 子动作 panic 时转换为 `PanicError`, 容器因此只会看到动作错误。
pub async fn execute_sequence(
    actions: &[Box<dyn TestAction>],
    context: &mut TestContext,
) -> Result<(), ActionError> {
    let total = actions.len();
    for (index, action) in actions.iter().enumerate() {
        debug!("执行动作 {}/{}: {}", index + 1, total, action.name());
        let outcome = AssertUnwindSafe(action.execute(context))
            .catch_unwind()
            .await
            .unwrap_or_else(|payload| {
                let message = panic_message(payload.as_ref());
                error!("动作 {} 发生 panic: {}", action.name(), message);
                Err(ActionError::new(ErrorCause::Panicked(message)))
            });
        outcome.map_err(|e| e.within(action.name()))?;
    }
    Ok(())
}

pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "未知 panic".to_string()
    }
}
