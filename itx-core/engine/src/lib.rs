//! ITX 执行引擎
//!
//! 解释执行集成测试的动作树: 变量上下文、叶子动作、容器
//! (顺序、catch、失败重试、模板调用)、finally 链以及测试执行器。
//!
//! ```no_run
//! use itx_engine::{EchoAction, FailAction, RepeatOnErrorUntilTrue, TestCaseBuilder, TestExecutor};
//!
//! # async fn demo() {
//! let test_case = TestCaseBuilder::new("retry-demo")
//!     .variable("target", "service")
//!     .action(
//!         RepeatOnErrorUntilTrue::until("i gt 3")
//!             .with_action(EchoAction::new("probe ${target} #${i}"))
//!             .with_action(FailAction::new("not ready")),
//!     )
//!     .finally(EchoAction::new("cleanup ${target}"))
//!     .build();
//!
//! let executor = TestExecutor::new();
//! let mut context = executor.create_test_context();
//! let result = executor.run(&test_case, &mut context).await;
//! assert!(!result.passed());
//! # }
//! ```

pub mod action;
pub mod actions;
pub mod condition;
pub mod config;
pub mod container;
pub mod context;
pub mod error;
pub mod logging;
pub mod registry;
pub mod report;
pub mod runner;
pub mod test_case;

pub use action::{execute_sequence, ActionContainer, TestAction};
pub use actions::{CreateVariablesAction, EchoAction, FailAction, SleepAction};
pub use condition::{ConditionEvaluator, ExpressionEvaluator};
pub use config::{EngineConfig, ExecutionConfig, FailureStrategy, ParallelConfig};
pub use container::{
    Backoff, CallTemplate, Catch, ExceptionFilter, RepeatOnErrorUntilTrue, Sequence,
};
pub use context::{ChildScope, TestContext};
pub use error::{ActionError, ContextError, ErrorCause};
pub use logging::init_logging;
pub use registry::{InMemoryTemplateRegistry, Template, TemplateRegistry};
pub use report::{SuiteReport, TestReport, TestResult, TestStatus};
pub use runner::TestExecutor;
pub use test_case::{
    TestBehavior, TestCase, TestCaseBuilder, TestCaseMetaInfo, TestCaseState, TestCaseStatus,
};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExecutorError {
    #[error("测试用例 '{test_name}' 失败: {source}")]
    TestFailed {
        test_name: String,
        source: ActionError,
    },

    #[error("配置错误: {0}")]
    ConfigError(String),

    #[error("IO 错误: {0}")]
    IoError(#[from] std::io::Error),

    #[error("序列化错误: {0}")]
    SerdeError(String),
}

pub type Result<T> = std::result::Result<T, ExecutorError>;
