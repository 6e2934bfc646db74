//! 集成测试辅助动作

#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use itx_engine::{ActionError, TestAction, TestContext};

/// 按执行顺序记录消息的动作日志
#[derive(Clone, Default)]
pub struct ActionLog {
    entries: Arc<Mutex<Vec<String>>>,
}

impl ActionLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// 记录解析后消息的动作
    pub fn echo(&self, message: &str) -> Recorder {
        Recorder {
            message: message.to_string(),
            log: self.clone(),
        }
    }

    pub fn entries(&self) -> Vec<String> {
        self.entries.lock().unwrap().clone()
    }
}

pub struct Recorder {
    message: String,
    log: ActionLog,
}

#[async_trait]
impl TestAction for Recorder {
    fn name(&self) -> &str {
        "echo"
    }

    async fn execute(&self, context: &mut TestContext) -> Result<(), ActionError> {
        let message = context.replace_dynamic_content(&self.message)?;
        self.log.entries.lock().unwrap().push(message);
        Ok(())
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
        panic!("kaboom");
    }
}

/// 长时间挂起
pub struct Hang(pub Duration);

#[async_trait]
impl TestAction for Hang {
    fn name(&self) -> &str {
        "hang"
    }

    async fn execute(&self, _context: &mut TestContext) -> Result<(), ActionError> {
        tokio::time::sleep(self.0).await;
        Ok(())
    }
}

/// 返回预先构造好的错误
pub struct Raise(pub ActionError);

#[async_trait]
impl TestAction for Raise {
    fn name(&self) -> &str {
        "raise"
    }

    async fn execute(&self, _context: &mut TestContext) -> Result<(), ActionError> {
        Err(self.0.clone())
    }
}
