//! 执行上下文
//!
//! 每次测试用例执行独占一个上下文。变量按层存放: 第 0 层为测试级变量,
//! 模板调用等容器通过 [`TestContext::create_child_scope`] 压入子作用域,
//! 子作用域读取时回退到外层, 写入只落在当前层。
//!
//! 变量值中的 `${name}` 占位符在读取时才解析, 因此允许先声明引用、后定义被引用变量。

use std::collections::HashMap;
use std::fmt;
use std::ops::{Deref, DerefMut};
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use regex::Regex;
use serde_json::Value;
use tracing::debug;

use crate::condition::{ConditionEvaluator, ExpressionEvaluator};
use crate::error::ContextError;
use crate::registry::{InMemoryTemplateRegistry, TemplateRegistry};

/// 占位符解析的默认最大嵌套深度
pub const DEFAULT_MAX_RESOLUTION_DEPTH: usize = 32;

/// 重试容器的默认等待时间
pub const DEFAULT_AUTO_SLEEP: Duration = Duration::from_millis(1000);

fn placeholder_regex() -> &'static Regex {
    static PLACEHOLDER: OnceLock<Regex> = OnceLock::new();
    PLACEHOLDER.get_or_init(|| Regex::new(r"\$\{([^}]+)\}").expect("占位符正则表达式无效"))
}

/// 将变量值转换为文本
pub fn value_to_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// 测试执行上下文
pub struct TestContext {
    /// 变量层, 最后一层为当前作用域
    layers: Vec<HashMap<String, Value>>,

    /// 模板注册表 (只读共享)
    templates: Arc<dyn TemplateRegistry>,

    /// 条件求值器
    evaluator: Arc<dyn ConditionEvaluator>,

    max_resolution_depth: usize,

    default_auto_sleep: Duration,
}

impl Default for TestContext {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for TestContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TestContext")
            .field("layers", &self.layers)
            .field("max_resolution_depth", &self.max_resolution_depth)
            .field("default_auto_sleep", &self.default_auto_sleep)
            .finish_non_exhaustive()
    }
}

impl TestContext {
    /// 创建空上下文 (空模板注册表, 默认表达式求值器)
    pub fn new() -> Self {
        Self {
            layers: vec![HashMap::new()],
            templates: Arc::new(InMemoryTemplateRegistry::new()),
            evaluator: Arc::new(ExpressionEvaluator),
            max_resolution_depth: DEFAULT_MAX_RESOLUTION_DEPTH,
            default_auto_sleep: DEFAULT_AUTO_SLEEP,
        }
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

    /// 设置占位符解析的最大嵌套深度
    pub fn with_max_resolution_depth(mut self, depth: usize) -> Self {
        self.max_resolution_depth = depth;
        self
    }

    /// 设置重试容器的默认等待时间
    pub fn with_default_auto_sleep(mut self, auto_sleep: Duration) -> Self {
        self.default_auto_sleep = auto_sleep;
        self
    }

    pub fn templates(&self) -> &Arc<dyn TemplateRegistry> {
        &self.templates
    }

    pub fn evaluator(&self) -> &Arc<dyn ConditionEvaluator> {
        &self.evaluator
    }

    pub fn default_auto_sleep(&self) -> Duration {
        self.default_auto_sleep
    }

    /// 当前作用域深度 (测试级为 0)
    pub fn scope_depth(&self) -> usize {
        self.layers.len() - 1
    }

    /// 在当前作用域绑定变量, 覆盖同名变量
    pub fn set_variable(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        let name = name.into();
        let value = value.into();
        debug!("设置变量: {} = {}", name, value);
        if let Some(layer) = self.layers.last_mut() {
            layer.insert(name, value);
        }
    }

    /// 在测试级作用域绑定变量, 并移除子作用域中的同名绑定使其立即可见
    pub fn set_global_variable(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        let name = name.into();
        let value = value.into();
        debug!("设置全局变量: {} = {}", name, value);
        for layer in self.layers.iter_mut().skip(1) {
            layer.remove(&name);
        }
        self.layers[0].insert(name, value);
    }

    /// 变量是否存在 (不解析占位符)
    pub fn has_variable(&self, name: &str) -> bool {
        self.lookup(name).is_some()
    }

    /// 读取变量文本, 递归解析其中的占位符
    pub fn get_variable(&self, name: &str) -> Result<String, ContextError> {
        self.get_value(name).map(|value| value_to_text(&value))
    }

    /// 读取变量值; 字符串值中的占位符会被解析
    pub fn get_value(&self, name: &str) -> Result<Value, ContextError> {
        let mut stack = Vec::new();
        self.resolve_variable(name, &mut stack)
    }

    /// 替换文本中的所有 `${name}` 占位符
    pub fn replace_dynamic_content(&self, text: &str) -> Result<String, ContextError> {
        let mut stack = Vec::new();
        self.resolve_text(text, &mut stack)
    }

    /// 所有可见变量的原始值快照 (内层覆盖外层)
    pub fn variables(&self) -> HashMap<String, Value> {
        let mut snapshot = HashMap::new();
        for layer in &self.layers {
            for (name, value) in layer {
                snapshot.insert(name.clone(), value.clone());
            }
        }
        snapshot
    }

    /// 压入子作用域, 返回的守卫释放时自动弹出
    pub fn create_child_scope(&mut self) -> ChildScope<'_> {
        self.layers.push(HashMap::new());
        debug!("进入子作用域 (深度 {})", self.scope_depth());
        ChildScope { context: self }
    }

    fn lookup(&self, name: &str) -> Option<&Value> {
        self.layers.iter().rev().find_map(|layer| layer.get(name))
    }

    fn resolve_variable(&self, name: &str, stack: &mut Vec<String>) -> Result<Value, ContextError> {
        if stack.iter().any(|n| n == name) {
            return Err(ContextError::VariableResolution {
                name: name.to_string(),
                reason: format!("循环引用 {} -> {}", stack.join(" -> "), name),
            });
        }
        if stack.len() >= self.max_resolution_depth {
            return Err(ContextError::VariableResolution {
                name: name.to_string(),
                reason: format!("嵌套深度超过 {}", self.max_resolution_depth),
            });
        }

        let raw = self
            .lookup(name)
            .ok_or_else(|| ContextError::UnknownVariable(name.to_string()))?;

        match raw {
            Value::String(text) => {
                stack.push(name.to_string());
                let resolved = self.resolve_text(text, stack);
                stack.pop();
                resolved.map(Value::String)
            }
            other => Ok(other.clone()),
        }
    }

    fn resolve_text(&self, text: &str, stack: &mut Vec<String>) -> Result<String, ContextError> {
        if !text.contains("${") {
            return Ok(text.to_string());
        }

        let mut resolved = String::with_capacity(text.len());
        let mut last = 0;

        for caps in placeholder_regex().captures_iter(text) {
            let Some(whole) = caps.get(0) else {
                continue;
            };
            resolved.push_str(&text[last..whole.start()]);
            let value = self.resolve_variable(caps[1].trim(), stack)?;
            resolved.push_str(&value_to_text(&value));
            last = whole.end();
        }

        resolved.push_str(&text[last..]);
        Ok(resolved)
    }

    fn pop_scope(&mut self) {
        if self.layers.len() > 1 {
            self.layers.pop();
            debug!("退出子作用域 (深度 {})", self.scope_depth());
        }
    }
}

/// 子作用域守卫
///
/// 解引用为 [`TestContext`]; 释放时丢弃该作用域内的所有绑定。
pub struct ChildScope<'a> {
    context: &'a mut TestContext,
}

impl Deref for ChildScope<'_> {
    type Target = TestContext;

    fn deref(&self) -> &TestContext {
        self.context
    }
}

impl DerefMut for ChildScope<'_> {
    fn deref_mut(&mut self) -> &mut TestContext {
        self.context
    }
}

impl Drop for ChildScope<'_> {
    fn drop(&mut self) {
        self.context.pop_scope();
    }
}
