//! 条件求值

use tracing::debug;

use crate::context::TestContext;
use crate::error::ErrorCause;

/// 条件求值器
///
/// 重试容器每轮检查退出条件时调用。求值失败视为致命错误, 不会触发重试。
pub trait ConditionEvaluator: Send + Sync {
    fn evaluate(&self, expression: &str, context: &TestContext) -> Result<bool, ErrorCause>;
}

/// 默认求值器
///
/// 先替换 `${name}` 占位符, 再交给 `itx_expression` 求值;
/// 表达式中出现的裸单词会按上下文变量查找。
#[derive(Debug, Clone, Copy, Default)]
pub struct ExpressionEvaluator;

impl ConditionEvaluator for ExpressionEvaluator {
    fn evaluate(&self, expression: &str, context: &TestContext) -> Result<bool, ErrorCause> {
        let resolved = context
            .replace_dynamic_content(expression)
            .map_err(|e| ErrorCause::ConditionEvaluation {
                expression: expression.to_string(),
                reason: e.to_string(),
            })?;

        let lookup = |name: &str| context.get_variable(name).ok();
        let result = itx_expression::evaluate(&resolved, &lookup).map_err(|e| {
            ErrorCause::ConditionEvaluation {
                expression: expression.to_string(),
                reason: e.to_string(),
            }
        })?;

        debug!("条件 '{}' => {}", expression, result);
        Ok(result)
    }
}
