//! 顺序容器

use async_trait::async_trait;

use crate::action::{execute_sequence, ActionContainer, TestAction};
use crate::context::TestContext;
use crate::error::ActionError;

/// 按顺序执行子动作, 第一个失败即终止
pub struct Sequence {
    name: String,
    actions: Vec<Box<dyn TestAction>>,
}

impl Default for Sequence {
    fn default() -> Self {
        Self::new()
    }
}

impl Sequence {
    pub fn new() -> Self {
        Self {
            name: "sequential".to_string(),
            actions: Vec::new(),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_action(mut self, action: impl TestAction + 'static) -> Self {
        self.actions.push(Box::new(action));
        self
    }

    pub fn push(&mut self, action: Box<dyn TestAction>) {
        self.actions.push(action);
    }
}

#[async_trait]
impl TestAction for Sequence {
    fn name(&self) -> &str {
        &self.name
    }

    async fn execute(&self, context: &mut TestContext) -> Result<(), ActionError> {
        execute_sequence(&self.actions, context).await
    }
}

impl ActionContainer for Sequence {
    fn actions(&self) -> &[Box<dyn TestAction>] {
        &self.actions
    }
}
