//! 测试用例定义

use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::action::TestAction;

/// 测试用例状态 (元信息, 不影响执行)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TestCaseStatus {
    #[default]
    Draft,
    ReadyForReview,
    Disabled,
    Final,
}

/// 测试用例元信息
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TestCaseMetaInfo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,

    #[serde(default)]
    pub status: TestCaseStatus,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub creation_date: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_updated_by: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_updated_on: Option<DateTime<Utc>>,
}

/// 执行生命周期
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TestCaseState {
    Created,
    RunningMain,
    RunningFinally,
    Passed,
    Failed,
}

impl TestCaseState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, TestCaseState::Passed | TestCaseState::Failed)
    }
}

impl fmt::Display for TestCaseState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            TestCaseState::Created => "created",
            TestCaseState::RunningMain => "running_main",
            TestCaseState::RunningFinally => "running_finally",
            TestCaseState::Passed => "passed",
            TestCaseState::Failed => "failed",
        };
        write!(f, "{}", text)
    }
}

/// 测试用例
///
/// 主动作链按顺序执行; finally 链无论主链结果如何都会执行一次。
/// 测试用例本身只读, 可以被多次执行。
#[derive(Default)]
pub struct TestCase {
    /// 用例名称
    pub name: String,

    /// 用例描述
    pub description: Option<String>,

    pub meta_info: TestCaseMetaInfo,

    /// 自由格式的注解
    pub annotations: HashMap<String, String>,

    /// 测试级变量
    pub variables: HashMap<String, Value>,

    /// 调用方参数 (覆盖同名测试级变量)
    pub parameters: HashMap<String, Value>,

    actions: Vec<Box<dyn TestAction>>,

    finally_actions: Vec<Box<dyn TestAction>>,
}

impl fmt::Debug for TestCase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TestCase")
            .field("name", &self.name)
            .field("description", &self.description)
            .field("meta_info", &self.meta_info)
            .field("variables", &self.variables)
            .field("parameters", &self.parameters)
            .field("actions", &self.actions.iter().map(|a| a.name()).collect::<Vec<_>>())
            .field(
                "finally_actions",
                &self.finally_actions.iter().map(|a| a.name()).collect::<Vec<_>>(),
            )
            .finish()
    }
}

impl TestCase {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn add_action(&mut self, action: Box<dyn TestAction>) {
        self.actions.push(action);
    }

    pub fn add_finally_action(&mut self, action: Box<dyn TestAction>) {
        self.finally_actions.push(action);
    }

    /// 设置调用方参数
    pub fn set_parameter(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.parameters.insert(name.into(), value.into());
    }

    /// 主动作链
    pub fn actions(&self) -> &[Box<dyn TestAction>] {
        &self.actions
    }

    /// finally 链
    pub fn finally_actions(&self) -> &[Box<dyn TestAction>] {
        &self.finally_actions
    }
}

/// 可复用的测试行为
///
/// 应用时其动作追加到主链当前位置, finally 动作追加到 finally 链末尾。
pub trait TestBehavior {
    fn apply(&self, builder: &mut TestCaseBuilder);
}

/// 测试用例构建器
#[derive(Debug, Default)]
pub struct TestCaseBuilder {
    test_case: TestCase,
}

impl TestCaseBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            test_case: TestCase::new(name),
        }
    }

    pub fn description(&mut self, description: impl Into<String>) -> &mut Self {
        self.test_case.description = Some(description.into());
        self
    }

    pub fn author(&mut self, author: impl Into<String>) -> &mut Self {
        self.test_case.meta_info.author = Some(author.into());
        self
    }

    pub fn status(&mut self, status: TestCaseStatus) -> &mut Self {
        self.test_case.meta_info.status = status;
        self
    }

    pub fn creation_date(&mut self, date: DateTime<Utc>) -> &mut Self {
        self.test_case.meta_info.creation_date = Some(date);
        self
    }

    pub fn annotation(&mut self, key: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.test_case.annotations.insert(key.into(), value.into());
        self
    }

    pub fn variable(&mut self, name: impl Into<String>, value: impl Into<Value>) -> &mut Self {
        self.test_case.variables.insert(name.into(), value.into());
        self
    }

    pub fn parameter(&mut self, name: impl Into<String>, value: impl Into<Value>) -> &mut Self {
        self.test_case.set_parameter(name, value);
        self
    }

    pub fn action(&mut self, action: impl TestAction + 'static) -> &mut Self {
        self.test_case.add_action(Box::new(action));
        self
    }

    pub fn finally(&mut self, action: impl TestAction + 'static) -> &mut Self {
        self.test_case.add_finally_action(Box::new(action));
        self
    }

    pub fn apply_behavior(&mut self, behavior: &dyn TestBehavior) -> &mut Self {
        behavior.apply(self);
        self
    }

    /// 取出构建完成的测试用例, 构建器重置为空
    pub fn build(&mut self) -> TestCase {
        std::mem::take(&mut self.test_case)
    }
}
