//! 模板与模板注册表

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::action::TestAction;
use crate::error::ErrorCause;

/// 命名的可复用动作序列
///
/// `parameters` 为模板声明的默认参数, 调用方传入的同名参数会覆盖它们。
pub struct Template {
    name: String,
    description: Option<String>,
    actions: Vec<Box<dyn TestAction>>,
    parameters: HashMap<String, String>,
    global_context: bool,
}

impl fmt::Debug for Template {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Template")
            .field("name", &self.name)
            .field("actions", &self.actions.iter().map(|a| a.name()).collect::<Vec<_>>())
            .field("parameters", &self.parameters)
            .field("global_context", &self.global_context)
            .finish()
    }
}

impl Template {
    /// 创建模板, 默认在子作用域中执行
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            actions: Vec::new(),
            parameters: HashMap::new(),
            global_context: false,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_action(mut self, action: impl TestAction + 'static) -> Self {
        self.actions.push(Box::new(action));
        self
    }

    /// 声明默认参数
    pub fn with_parameter(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.parameters.insert(name.into(), value.into());
        self
    }

    /// 是否直接在调用方作用域中执行
    pub fn with_global_context(mut self, global_context: bool) -> Self {
        self.global_context = global_context;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn actions(&self) -> &[Box<dyn TestAction>] {
        &self.actions
    }

    pub fn parameters(&self) -> &HashMap<String, String> {
        &self.parameters
    }

    pub fn is_global_context(&self) -> bool {
        self.global_context
    }
}

/// 模板注册表
///
/// 测试开始前构建完成, 执行期间只读共享。
pub trait TemplateRegistry: Send + Sync {
    fn resolve(&self, name: &str) -> Result<Arc<Template>, ErrorCause>;

    /// 已注册的模板名称
    fn names(&self) -> Vec<String>;
}

/// 基于内存表的模板注册表
#[derive(Debug, Default)]
pub struct InMemoryTemplateRegistry {
    templates: HashMap<String, Arc<Template>>,
}

impl InMemoryTemplateRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 注册模板, 返回被替换的同名模板
    pub fn register(&mut self, template: Template) -> Option<Arc<Template>> {
        debug!("注册模板: {}", template.name());
        let replaced = self
            .templates
            .insert(template.name().to_string(), Arc::new(template));
        if let Some(old) = &replaced {
            warn!("模板 '{}' 已存在, 旧定义被替换", old.name());
        }
        replaced
    }

    pub fn with_template(mut self, template: Template) -> Self {
        self.register(template);
        self
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }
}

impl TemplateRegistry for InMemoryTemplateRegistry {
    fn resolve(&self, name: &str) -> Result<Arc<Template>, ErrorCause> {
        self.templates
            .get(name)
            .cloned()
            .ok_or_else(|| ErrorCause::TemplateNotFound(name.to_string()))
    }

    fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.templates.keys().cloned().collect();
        names.sort();
        names
    }
}
