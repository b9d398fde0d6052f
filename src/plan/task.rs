use crate::modules::Module;
use crate::template::{render_params, render_str, RenderError};
use crate::types::VarsMap;
use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

/// A single step bound to a module.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Task {
    pub id: Uuid,
    pub name: String,
    pub module: Module,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub when: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub with_items: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub register: Option<String>,
    pub ignore_errors: bool,
    pub local: bool,
    pub sudo: bool,
    pub debug: bool,
    pub retry: u32,
    #[serde(skip_serializing_if = "VarsMap::is_empty")]
    pub vars: VarsMap,
}

impl Task {
    pub fn new(name: impl Into<String>, module: Module) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            module,
            when: String::new(),
            with_items: None,
            register: None,
            ignore_errors: false,
            local: false,
            sudo: false,
            debug: false,
            retry: 0,
            vars: VarsMap::new(),
        }
    }

    /// Name shown to the operator, falling back to the module name.
    pub fn display_name(&self) -> &str {
        if self.name.is_empty() {
            &self.module.name
        } else {
            &self.name
        }
    }
}

/// Ordered tasks plus plan vars and the inventory groups they target.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Plan {
    pub name: String,
    pub hosts: Vec<String>,
    pub vars: VarsMap,
    pub tasks: Vec<Task>,
}

impl Task {
    /// A rendered copy: name, `when` and every module param. `self` is untouched.
    pub fn render(&self, ctx: &VarsMap) -> Result<Task, RenderError> {
        let mut rendered = self.clone();
        rendered.name = render_str(&self.name, ctx)?;
        rendered.when = render_str(&self.when, ctx)?;
        rendered.module.params = render_params(&self.module.params, ctx)?;
        Ok(rendered)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_render_without_templates_is_identity() {
        let module = Module::new("shell", r#"cmd="echo hi" creates=/tmp/x"#).unwrap();
        let task = Task {
            when: "True".to_string(),
            ..Task::new("plain task", module)
        };
        let rendered = task.render(&VarsMap::new()).unwrap();
        assert_eq!(rendered, task);
    }

    #[test]
    fn test_render_does_not_touch_original() {
        let module = Module::new("shell", r#"cmd="touch {{ item }}""#).unwrap();
        let task = Task::new("touch {{ item }}", module);
        let mut ctx = VarsMap::new();
        ctx.insert("item".to_string(), json!("a"));

        let rendered = task.render(&ctx).unwrap();
        assert_eq!(rendered.name, "touch a");
        assert_eq!(rendered.module.param_str("cmd"), Some("touch a"));
        assert_eq!(task.module.param_str("cmd"), Some("touch {{ item }}"));
        assert_eq!(rendered.id, task.id);
    }

    #[test]
    fn test_display_name_falls_back_to_module() {
        let task = Task::new("", Module::new("ping", "").unwrap());
        assert_eq!(task.display_name(), "ping");
    }
}
