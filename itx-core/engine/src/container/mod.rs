//! 动作容器
//!
//! - [`Sequence`]: 顺序执行
//! - [`Catch`]: 吞掉匹配的错误
//! - [`RepeatOnErrorUntilTrue`]: 失败后重试直到条件满足
//! - [`CallTemplate`]: 调用注册表中的模板

pub mod catch;
pub mod repeat;
pub mod sequence;
pub mod template;

pub use catch::{Catch, ExceptionFilter};
pub use repeat::{Backoff, RepeatOnErrorUntilTrue};
pub use sequence::Sequence;
pub use template::CallTemplate;

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;

    use crate::action::TestAction;
    use crate::context::TestContext;
    use crate::error::ActionError;

    /// 共享的执行记录
    pub type Journal = Arc<Mutex<Vec<String>>>;

    pub fn journal() -> Journal {
        Arc::new(Mutex::new(Vec::new()))
    }

    pub fn entries(journal: &Journal) -> Vec<String> {
        journal.lock().unwrap().clone()
    }

    /// 记录解析后的消息
    pub struct Record {
        pub message: String,
        pub journal: Journal,
    }

    pub fn record(message: &str, journal: &Journal) -> Record {
        Record {
            message: message.to_string(),
            journal: journal.clone(),
        }
    }

    #[async_trait]
    impl TestAction for Record {
        fn name(&self) -> &str {
            "record"
        }

        async fn execute(&self, context: &mut TestContext) -> Result<(), ActionError> {
            let message = context.replace_dynamic_content(&self.message)?;
            self.journal.lock().unwrap().push(message);
            Ok(())
        }
    }

    /// 前 `failures` 次执行失败, 之后成功
    pub struct Flaky {
        pub failures: usize,
        pub calls: Arc<AtomicUsize>,
    }

    pub fn flaky(failures: usize) -> (Flaky, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        (
            Flaky {
                failures,
                calls: calls.clone(),
            },
            calls,
        )
    }

    #[async_trait]
    impl TestAction for Flaky {
        fn name(&self) -> &str {
            "flaky"
        }

        async fn execute(&self, _context: &mut TestContext) -> Result<(), ActionError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if call <= self.failures {
                Err(ActionError::failed(format!("attempt {} failed", call)))
            } else {
                Ok(())
            }
        }
    }

    /// 执行时直接 panic
    pub struct Explode;

    #[async_trait]
    impl TestAction for Explode {
        fn name(&self) -> &str {
            "explode"
        }

        async fn execute(&self, _context: &mut TestContext) -> Result<(), ActionError> {
            panic!("npe");
        }
    }
}
