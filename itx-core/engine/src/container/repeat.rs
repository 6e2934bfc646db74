//! 失败重试容器

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::action::{execute_sequence, ActionContainer, TestAction};
use crate::context::TestContext;
use crate::error::ActionError;

/// 重试等待策略
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Backoff {
    /// 每次等待相同时间
    #[default]
    Fixed,
    /// 第 n 次重试等待 n 倍
    Linear,
    /// 第 n 次重试等待 2^(n-1) 倍
    Exponential,
}

/// 子动作失败后重试, 直到退出条件为真
///
/// 每轮开始前把下一次尝试的序号绑定到索引变量 (默认 `i`, 从 1 开始) 再检查条件:
/// - 条件为真: 若已有失败则返回最后一次失败, 否则直接成功 (一次也不执行);
/// - 条件为假: 执行子动作, 成功即返回, 失败则等待后进入下一轮。
///
/// 例如 `i gt 3` 最多执行 3 次。
pub struct RepeatOnErrorUntilTrue {
    condition: String,
    index_name: String,
    start_index: i64,
    auto_sleep: Option<Duration>,
    backoff: Backoff,
    max_sleep: Option<Duration>,
    actions: Vec<Box<dyn TestAction>>,
}

impl RepeatOnErrorUntilTrue {
    pub fn until(condition: impl Into<String>) -> Self {
        Self {
            condition: condition.into(),
            index_name: "i".to_string(),
            start_index: 1,
            auto_sleep: None,
            backoff: Backoff::Fixed,
            max_sleep: None,
            actions: Vec::new(),
        }
    }

    /// 索引变量名
    pub fn index(mut self, name: impl Into<String>) -> Self {
        self.index_name = name.into();
        self
    }

    pub fn starts_with(mut self, start: i64) -> Self {
        self.start_index = start;
        self
    }

    /// 两次尝试之间的等待时间, 未设置时使用上下文默认值
    pub fn auto_sleep(mut self, sleep: Duration) -> Self {
        self.auto_sleep = Some(sleep);
        self
    }

    pub fn backoff(mut self, backoff: Backoff) -> Self {
        self.backoff = backoff;
        self
    }

    /// 单次等待上限
    pub fn max_sleep(mut self, max: Duration) -> Self {
        self.max_sleep = Some(max);
        self
    }

    pub fn with_action(mut self, action: impl TestAction + 'static) -> Self {
        self.actions.push(Box::new(action));
        self
    }

    pub fn condition(&self) -> &str {
        &self.condition
    }

    pub fn index_name(&self) -> &str {
        &self.index_name
    }

    pub fn start_index(&self) -> i64 {
        self.start_index
    }

    /// 第 `failures` 次失败后的等待时间
    pub fn delay_after(&self, failures: u32, default_sleep: Duration) -> Duration {
        let base = self.auto_sleep.unwrap_or(default_sleep);
        let delay = match self.backoff {
            Backoff::Fixed => base,
            Backoff::Linear => base.saturating_mul(failures.max(1)),
            Backoff::Exponential => {
                base.saturating_mul(2u32.saturating_pow(failures.saturating_sub(1)))
            }
        };
        match self.max_sleep {
            Some(max) => delay.min(max),
            None => delay,
        }
    }

    fn condition_met(&self, context: &TestContext) -> Result<bool, ActionError> {
        let evaluator = Arc::clone(context.evaluator());
        evaluator
            .evaluate(&self.condition, context)
            .map_err(ActionError::new)
    }
}

#[async_trait]
impl TestAction for RepeatOnErrorUntilTrue {
    fn name(&self) -> &str {
        "repeat-on-error"
    }

    async fn execute(&self, context: &mut TestContext) -> Result<(), ActionError> {
        let mut index = self.start_index;
        let mut failures: u32 = 0;
        let mut last_error: Option<ActionError> = None;

        loop {
            context.set_variable(self.index_name.clone(), index);

            if self.condition_met(context)? {
                return match last_error {
                    Some(err) => {
                        error!(
                            "重试条件 '{}' 已满足, {} 次尝试均失败: {}",
                            self.condition, failures, err
                        );
                        Err(err)
                    }
                    None => {
                        warn!("重试条件 '{}' 初始即满足, 跳过执行", self.condition);
                        Ok(())
                    }
                };
            }

            if failures > 0 {
                let delay = self.delay_after(failures, context.default_auto_sleep());
                debug!("等待 {:?} 后重试", delay);
                tokio::time::sleep(delay).await;
            }

            match execute_sequence(&self.actions, context).await {
                Ok(()) => {
                    info!("第 {} 次尝试成功 ({}={})", failures + 1, self.index_name, index);
                    return Ok(());
                }
                Err(err) => {
                    failures += 1;
                    warn!(
                        "第 {} 次尝试失败 ({}={}): {}",
                        failures, self.index_name, index, err
                    );
                    last_error = Some(err);
                    index += 1;
                }
            }
        }
    }
}

impl ActionContainer for RepeatOnErrorUntilTrue {
    fn actions(&self) -> &[Box<dyn TestAction>] {
        &self.actions
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::Ordering;

    use crate::actions::FailAction;
    use crate::condition::ConditionEvaluator;
    use crate::container::testing::{entries, flaky, journal, record};
    use crate::error::ErrorCause;

    #[tokio::test(start_paused = true)]
    async fn test_stops_after_condition_met() {
        let log = journal();
        let repeat = RepeatOnErrorUntilTrue::until("i gt 3")
            .auto_sleep(Duration::from_millis(100))
            .with_action(record("attempt ${i}", &log))
            .with_action(FailAction::new("boom ${i}"));

        let mut ctx = TestContext::new();
        let start = tokio::time::Instant::now();
        let err = repeat.execute(&mut ctx).await.unwrap_err();

        assert_eq!(entries(&log), vec!["attempt 1", "attempt 2", "attempt 3"]);
        assert_eq!(err.cause(), &ErrorCause::Failed("boom 3".to_string()));
        // 只在两次尝试之间等待
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_millis(200) && elapsed < Duration::from_millis(300));
    }

    #[tokio::test(start_paused = true)]
    async fn test_succeeds_on_retry() {
        let (action, calls) = flaky(2);
        let repeat = RepeatOnErrorUntilTrue::until("i gt 5")
            .auto_sleep(Duration::from_millis(10))
            .with_action(action);

        let mut ctx = TestContext::new();
        repeat.execute(&mut ctx).await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(ctx.get_variable("i").unwrap(), "3");
    }

    #[tokio::test]
    async fn test_condition_true_initially() {
        let log = journal();
        let repeat = RepeatOnErrorUntilTrue::until("i gt 0").with_action(record("never", &log));

        let mut ctx = TestContext::new();
        repeat.execute(&mut ctx).await.unwrap();
        assert!(entries(&log).is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_custom_index_and_start() {
        let log = journal();
        let repeat = RepeatOnErrorUntilTrue::until("k gt= 5")
            .index("k")
            .starts_with(3)
            .auto_sleep(Duration::from_millis(1))
            .with_action(record("k=${k}", &log))
            .with_action(FailAction::new("boom"));

        let mut ctx = TestContext::new();
        assert!(repeat.execute(&mut ctx).await.is_err());
        assert_eq!(entries(&log), vec!["k=3", "k=4"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_uses_context_default_sleep() {
        let repeat = RepeatOnErrorUntilTrue::until("i gt 2").with_action(FailAction::new("boom"));

        let mut ctx = TestContext::new().with_default_auto_sleep(Duration::from_millis(500));
        let start = tokio::time::Instant::now();
        assert!(repeat.execute(&mut ctx).await.is_err());
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_millis(500) && elapsed < Duration::from_millis(1000));
    }

    #[tokio::test]
    async fn test_condition_error_is_fatal() {
        let (action, calls) = flaky(10);
        let repeat = RepeatOnErrorUntilTrue::until("i gt").with_action(action);

        let mut ctx = TestContext::new();
        let err = repeat.execute(&mut ctx).await.unwrap_err();
        assert_eq!(err.type_name(), "ConditionEvaluationError");
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_custom_evaluator_error_stops_retry() {
        struct FailsOnSecondCheck;

        impl ConditionEvaluator for FailsOnSecondCheck {
            fn evaluate(&self, expression: &str, context: &TestContext) -> Result<bool, ErrorCause> {
                match context.get_variable("i").as_deref() {
                    Ok("1") => Ok(false),
                    _ => Err(ErrorCause::ConditionEvaluation {
                        expression: expression.to_string(),
                        reason: "unavailable".to_string(),
                    }),
                }
            }
        }

        let (action, calls) = flaky(10);
        let repeat = RepeatOnErrorUntilTrue::until("custom")
            .auto_sleep(Duration::from_millis(1))
            .with_action(action);

        let mut ctx = TestContext::new().with_evaluator(Arc::new(FailsOnSecondCheck));
        let err = repeat.execute(&mut ctx).await.unwrap_err();
        assert_eq!(err.type_name(), "ConditionEvaluationError");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_backoff_delays() {
        let default = Duration::from_millis(1000);
        let base = Duration::from_millis(100);

        let fixed = RepeatOnErrorUntilTrue::until("i gt 5").auto_sleep(base);
        assert_eq!(fixed.delay_after(3, default), base);

        let linear = RepeatOnErrorUntilTrue::until("i gt 5")
            .auto_sleep(base)
            .backoff(Backoff::Linear);
        assert_eq!(linear.delay_after(3, default), Duration::from_millis(300));

        let exponential = RepeatOnErrorUntilTrue::until("i gt 5")
            .auto_sleep(base)
            .backoff(Backoff::Exponential)
            .max_sleep(Duration::from_millis(350));
        assert_eq!(exponential.delay_after(1, default), Duration::from_millis(100));
        assert_eq!(exponential.delay_after(2, default), Duration::from_millis(200));
        assert_eq!(exponential.delay_after(3, default), Duration::from_millis(350));

        let unset = RepeatOnErrorUntilTrue::until("i gt 5");
        assert_eq!(unset.delay_after(1, default), default);
    }
}
