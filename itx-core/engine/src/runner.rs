//! 测试执行器

use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use futures_util::FutureExt;
use serde_json::Value;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio::time::timeout;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::action::{execute_sequence, panic_message, TestAction};
use crate::condition::{ConditionEvaluator, ExpressionEvaluator};
use crate::config::{EngineConfig, FailureStrategy, ParallelConfig};
use crate::context::{TestContext, DEFAULT_AUTO_SLEEP, DEFAULT_MAX_RESOLUTION_DEPTH};
use crate::error::{ActionError, ErrorCause};
use crate::registry::{InMemoryTemplateRegistry, TemplateRegistry};
use crate::report::{SuiteReport, TestReport, TestResult, TestStatus};
use crate::test_case::{TestCase, TestCaseState};
use crate::{ExecutorError, Result};

/// 测试执行器
///
/// 为测试用例创建执行上下文, 执行主链和 finally 链并给出结论。
/// 执行器本身不保存任何执行状态, 可以在多个任务间克隆共享。
#[derive(Clone)]
pub struct TestExecutor {
    /// 模板注册表 (只读共享)
    templates: Arc<dyn TemplateRegistry>,

    /// 条件求值器
    evaluator: Arc<dyn ConditionEvaluator>,

    /// 注入每个上下文的全局变量
    global_variables: HashMap<String, Value>,

    /// 主链超时时间 (可选)
    default_timeout: Option<Duration>,

    default_auto_sleep: Duration,

    max_resolution_depth: usize,

    /// 测试套件并行配置
    parallel: ParallelConfig,
}

impl Default for TestExecutor {
    fn default() -> Self {
        Self::new()
    }
}

impl TestExecutor {
    /// 创建新的测试执行器
    pub fn new() -> Self {
        Self {
            templates: Arc::new(InMemoryTemplateRegistry::new()),
            evaluator: Arc::new(ExpressionEvaluator),
            global_variables: HashMap::new(),
            default_timeout: None,
            default_auto_sleep: DEFAULT_AUTO_SLEEP,
            max_resolution_depth: DEFAULT_MAX_RESOLUTION_DEPTH,
            parallel: ParallelConfig::default(),
        }
    }

    /// 根据引擎配置创建执行器
    pub fn from_config(config: &EngineConfig) -> Result<Self> {
        config
            .validate()
            .map_err(|e| ExecutorError::ConfigError(e.to_string()))?;

        let mut executor = Self::new();
        executor.default_timeout = config.execution.timeout();
        executor.default_auto_sleep = config.execution.default_auto_sleep();
        executor.max_resolution_depth = config.execution.max_resolution_depth;
        executor.parallel = config.parallel.clone();
        for (name, value) in &config.variables {
            executor
                .global_variables
                .insert(name.clone(), Value::String(value.clone()));
        }
        Ok(executor)
    }

    /// 设置模板注册表
    pub fn with_templates(mut self, templates: Arc<dyn TemplateRegistry>) -> Self {
        self.templates = templates;
        self
    }

    /// 设置条件求值器
    pub fn with_evaluator(mut self, evaluator: Arc<dyn ConditionEvaluator>) -> Self {
        self.evaluator = evaluator;
        self
    }

    /// 设置主链超时时间
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = Some(timeout);
        self
    }

    /// 设置重试容器的默认等待时间
    pub fn with_default_auto_sleep(mut self, auto_sleep: Duration) -> Self {
        self.default_auto_sleep = auto_sleep;
        self
    }

    /// 添加全局变量
    pub fn with_global_variable(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.global_variables.insert(name.into(), value.into());
        self
    }

    /// 设置测试套件并行配置
    pub fn with_parallel(mut self, parallel: ParallelConfig) -> Self {
        self.parallel = parallel;
        self
    }

    /// 创建新的执行上下文 (带全局变量和共享服务)
    pub fn create_test_context(&self) -> TestContext {
        let mut context = TestContext::new()
            .with_templates(Arc::clone(&self.templates))
            .with_evaluator(Arc::clone(&self.evaluator))
            .with_default_auto_sleep(self.default_auto_sleep)
            .with_max_resolution_depth(self.max_resolution_depth);

        for (name, value) in &self.global_variables {
            context.set_global_variable(name.clone(), value.clone());
        }
        context
    }

    /// 执行测试用例
    ///
    /// 先绑定测试级变量再绑定调用方参数, 然后执行主链; finally 链无论主链结果都会执行一次。
    /// 主链失败优先作为结论原因, finally 链失败只在主链成功时决定结论。
    pub async fn run(&self, test_case: &TestCase, context: &mut TestContext) -> TestResult {
        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        let start_time = Instant::now();
        let mut state = TestCaseState::Created;

        info!("开始执行测试用例: {} ({})", test_case.name, run_id);

        for (name, value) in &test_case.variables {
            context.set_variable(name.clone(), value.clone());
        }
        for (name, value) in &test_case.parameters {
            context.set_variable(name.clone(), value.clone());
        }

        transition(&test_case.name, &mut state, TestCaseState::RunningMain);
        let main_result = self
            .run_chain("main", test_case.actions(), context, self.default_timeout)
            .await;
        if let Err(e) = &main_result {
            error!("测试用例 {} 主链失败: {}", test_case.name, e);
        }

        transition(&test_case.name, &mut state, TestCaseState::RunningFinally);
        let finally_result = self
            .run_chain("finally", test_case.finally_actions(), context, None)
            .await;

        let (cause, finally_error) = match (main_result, finally_result) {
            (Err(main), Err(finally)) => {
                warn!("finally 链同样失败 (不影响结论原因): {}", finally);
                (Some(main), Some(finally))
            }
            (Err(main), Ok(())) => (Some(main), None),
            (Ok(()), Err(finally)) => {
                error!("测试用例 {} finally 链失败: {}", test_case.name, finally);
                (Some(finally.clone()), Some(finally))
            }
            (Ok(()), Ok(())) => (None, None),
        };

        let status = if cause.is_some() {
            transition(&test_case.name, &mut state, TestCaseState::Failed);
            TestStatus::Failed
        } else {
            transition(&test_case.name, &mut state, TestCaseState::Passed);
            TestStatus::Passed
        };

        let duration_ms = start_time.elapsed().as_millis() as u64;
        info!(
            "测试用例执行完成: {} - {} (耗时: {}ms)",
            test_case.name,
            if status == TestStatus::Passed { "通过" } else { "失败" },
            duration_ms
        );

        TestResult {
            run_id,
            test_name: test_case.name.clone(),
            meta_info: test_case.meta_info.clone(),
            status,
            cause,
            finally_error,
            started_at,
            finished_at: Utc::now(),
            duration_ms,
        }
    }

    /// 并发执行多个测试用例, 每个用例使用独立的执行上下文
    pub async fn run_suite(&self, test_cases: Vec<TestCase>) -> SuiteReport {
        let start_time = Instant::now();
        let total = test_cases.len();
        let max_concurrent = self.parallel.max_concurrent.max(1);
        let strategy = self.parallel.on_failure;

        info!(
            "开始执行测试套件: {} 个用例 (最大并发: {}, 失败策略: {:?})",
            total, max_concurrent, strategy
        );

        let semaphore = Arc::new(Semaphore::new(max_concurrent));
        let stop = Arc::new(AtomicBool::new(false));
        let mut join_set = JoinSet::new();

        for (position, test_case) in test_cases.into_iter().enumerate() {
            let executor = self.clone();
            let semaphore = Arc::clone(&semaphore);
            let stop = Arc::clone(&stop);

            join_set.spawn(async move {
                let _permit = semaphore.acquire_owned().await.ok();

                if stop.load(Ordering::SeqCst) {
                    debug!("快速失败: 跳过测试用例 {}", test_case.name);
                    return (position, Err(test_case.name));
                }

                let mut context = executor.create_test_context();
                let result = executor.run(&test_case, &mut context).await;
                if !result.passed() && strategy == FailureStrategy::FailFast {
                    warn!("检测到失败，根据策略不再启动新的测试用例");
                    stop.store(true, Ordering::SeqCst);
                }
                (position, Ok(result.to_report()))
            });
        }

        let mut outcomes: Vec<(usize, std::result::Result<TestReport, String>)> =
            Vec::with_capacity(total);
        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok(outcome) => outcomes.push(outcome),
                Err(e) => error!("测试任务异常退出: {}", e),
            }
        }
        outcomes.sort_by_key(|(position, _)| *position);

        let mut reports = Vec::new();
        let mut skipped = Vec::new();
        for (_, outcome) in outcomes {
            match outcome {
                Ok(report) => reports.push(report),
                Err(name) => skipped.push(name),
            }
        }

        let report = SuiteReport::new(reports, skipped, start_time.elapsed().as_millis() as u64);
        info!(
            "测试套件执行完成: 通过 {}, 失败 {}, 跳过 {}",
            report.passed,
            report.failed,
            report.skipped.len()
        );
        report
    }

    /// 执行一条动作链, 将超时转换为动作错误; 链级 panic 捕获作为兜底
    async fn run_chain(
        &self,
        chain: &str,
        actions: &[Box<dyn TestAction>],
        context: &mut TestContext,
        deadline: Option<Duration>,
    ) -> std::result::Result<(), ActionError> {
        debug!("执行 {} 链: {} 个动作", chain, actions.len());

        let guarded = AssertUnwindSafe(execute_sequence(actions, context)).catch_unwind();
        let outcome = match deadline {
            Some(limit) => match timeout(limit, guarded).await {
                Ok(outcome) => outcome,
                Err(_) => {
                    error!("{} 链执行超时 ({:?})", chain, limit);
                    return Err(ActionError::new(ErrorCause::Timeout {
                        timeout_ms: limit.as_millis() as u64,
                    })
                    .within(chain));
                }
            },
            None => guarded.await,
        };

        match outcome {
            Ok(result) => result.map_err(|e| e.within(chain)),
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                error!("{} 链发生 panic: {}", chain, message);
                Err(ActionError::new(ErrorCause::Panicked(message)).within(chain))
            }
        }
    }
}

fn transition(test_name: &str, state: &mut TestCaseState, next: TestCaseState) {
    debug!("测试用例 {} 状态: {} -> {}", test_name, state, next);
    *state = next;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::{EchoAction, FailAction};
    use crate::test_case::TestCaseBuilder;

    #[test]
    fn test_from_config() {
        let mut config = EngineConfig::default();
        config.execution.timeout_secs = Some(3);
        config
            .variables
            .insert("env".to_string(), "staging".to_string());

        let executor = TestExecutor::from_config(&config).unwrap();
        assert_eq!(executor.default_timeout, Some(Duration::from_secs(3)));

        let context = executor.create_test_context();
        assert_eq!(context.get_variable("env").unwrap(), "staging");
        assert_eq!(context.default_auto_sleep(), Duration::from_millis(1000));
    }

    #[test]
    fn test_from_invalid_config() {
        let mut config = EngineConfig::default();
        config.parallel.max_concurrent = 0;
        assert!(matches!(
            TestExecutor::from_config(&config),
            Err(ExecutorError::ConfigError(_))
        ));
    }

    #[tokio::test]
    async fn test_parameters_override_variables() {
        let test_case = TestCaseBuilder::new("override")
            .variable("user", "default")
            .parameter("user", "caller")
            .action(EchoAction::new("${user}"))
            .build();

        let executor = TestExecutor::new().with_global_variable("user", "global");
        let mut context = executor.create_test_context();
        let result = executor.run(&test_case, &mut context).await;

        assert!(result.passed());
        assert_eq!(context.get_variable("user").unwrap(), "caller");
    }

    #[tokio::test]
    async fn test_failure_path_includes_chain() {
        let test_case = TestCaseBuilder::new("fails")
            .action(FailAction::new("boom"))
            .build();

        let executor = TestExecutor::new();
        let mut context = executor.create_test_context();
        let result = executor.run(&test_case, &mut context).await;

        let cause = result.cause.unwrap();
        assert_eq!(cause.path_display(), "main -> fail");
        assert!(result.finally_error.is_none());
    }
}
