//! 模板调用

use std::collections::HashMap;

use async_trait::async_trait;
use tracing::{debug, info};

use crate::action::{execute_sequence, TestAction};
use crate::context::TestContext;
use crate::error::ActionError;

/// 按名称调用注册表中的模板
///
/// 参数值在调用方上下文中解析后再绑定, 模板默认参数会被同名调用参数覆盖。
/// 非全局模式下参数和模板内创建的变量只在本次调用期间可见;
/// 全局模式下直接写入调用方作用域。失败路径中模板名位于 `call-template` 之下。
#[derive(Debug, Clone)]
pub struct CallTemplate {
    template_name: String,
    parameters: HashMap<String, String>,
    global_context: Option<bool>,
}

impl CallTemplate {
    pub fn new(template_name: impl Into<String>) -> Self {
        Self {
            template_name: template_name.into(),
            parameters: HashMap::new(),
            global_context: None,
        }
    }

    pub fn with_parameter(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.parameters.insert(name.into(), value.into());
        self
    }

    /// 覆盖模板自身的全局模式设置
    pub fn with_global_context(mut self, global_context: bool) -> Self {
        self.global_context = Some(global_context);
        self
    }

    pub fn template_name(&self) -> &str {
        &self.template_name
    }

    fn bind_parameters(
        &self,
        defaults: &HashMap<String, String>,
        context: &TestContext,
    ) -> Result<Vec<(String, String)>, ActionError> {
        let mut merged = defaults.clone();
        merged.extend(self.parameters.clone());

        let mut bound = Vec::with_capacity(merged.len());
        for (name, value) in merged {
            let value = context.replace_dynamic_content(&value)?;
            bound.push((name, value));
        }
        Ok(bound)
    }
}

#[async_trait]
impl TestAction for CallTemplate {
    fn name(&self) -> &str {
        "call-template"
    }

    async fn execute(&self, context: &mut TestContext) -> Result<(), ActionError> {
        let template = context
            .templates()
            .resolve(&self.template_name)
            .map_err(ActionError::new)?;
        let global = self.global_context.unwrap_or(template.is_global_context());
        let parameters = self.bind_parameters(template.parameters(), context)?;

        info!(
            "调用模板: {} (参数 {} 个, 全局模式: {})",
            self.template_name,
            parameters.len(),
            global
        );

        let result = if global {
            for (name, value) in parameters {
                context.set_variable(name, value);
            }
            execute_sequence(template.actions(), context).await
        } else {
            let mut scope = context.create_child_scope();
            for (name, value) in parameters {
                scope.set_variable(name, value);
            }
            let result = execute_sequence(template.actions(), &mut scope).await;
            debug!("模板 {} 执行结束, 释放子作用域", self.template_name);
            result
        };

        // 失败路径中记录模板名, 区分同一用例里的多次模板调用
        result.map_err(|e| e.within(self.template_name.as_str()))
    }
}
