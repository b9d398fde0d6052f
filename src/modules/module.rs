use super::error::{ModuleError, Result};
use super::params::parse_params;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

/// Module parameters. Strings after parsing, any JSON value after rendering.
pub type Params = BTreeMap<String, Value>;

/// A logical reference to a module executable plus its parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Module {
    pub name: String,
    #[serde(default)]
    pub params: Params,
}

impl Module {
    /// Build a module from its name and a `k=v` argument string.
    pub fn new(name: &str, args: &str) -> Result<Self> {
        let name = name.trim();
        if !is_valid_name(name) {
            return Err(ModuleError::InvalidName {
                name: name.to_string(),
            });
        }

        let params = parse_params(args)?
            .into_iter()
            .map(|(k, v)| (k, Value::String(v)))
            .collect();

        Ok(Self {
            name: name.to_string(),
            params,
        })
    }

    /// Parse an `action` line: `module_name k=v ...`.
    pub fn from_action(action: &str) -> Result<Self> {
        let action = action.trim();
        let (name, args) = action
            .split_once(char::is_whitespace)
            .unwrap_or((action, ""));
        Self::new(name, args)
    }

    pub fn kind(&self) -> ModuleKind {
        ModuleKind::from_name(&self.name)
    }

    pub fn param_str(&self, key: &str) -> Option<&str> {
        self.params.get(key).and_then(Value::as_str)
    }
}

fn is_valid_name(name: &str) -> bool {
    !name.is_empty()
        && name != "."
        && name != ".."
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'))
}

/// Module variants with their own phase ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModuleKind {
    Default,
    Copy,
    Template,
}

impl ModuleKind {
    pub fn from_name(name: &str) -> Self {
        match name {
            "copy" => ModuleKind::Copy,
            "template" => ModuleKind::Template,
            _ => ModuleKind::Default,
        }
    }
}

impl fmt::Display for ModuleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ModuleKind::Default => "default",
            ModuleKind::Copy => "copy",
            ModuleKind::Template => "template",
        };
        f.write_str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_module_parses_params() {
        let module = Module::new("shell", r#"cmd="ls -al" foo=bar"#).unwrap();
        assert_eq!(module.name, "shell");
        assert_eq!(module.param_str("cmd"), Some("ls -al"));
        assert_eq!(module.param_str("foo"), Some("bar"));
        assert_eq!(module.kind(), ModuleKind::Default);
    }

    #[test]
    fn test_from_action_splits_name() {
        let module = Module::from_action("copy src=a.txt dest=/tmp/a.txt").unwrap();
        assert_eq!(module.name, "copy");
        assert_eq!(module.kind(), ModuleKind::Copy);
        assert_eq!(module.param_str("dest"), Some("/tmp/a.txt"));

        let bare = Module::from_action("ping").unwrap();
        assert!(bare.params.is_empty());
    }

    #[test]
    fn test_invalid_names_rejected() {
        assert!(matches!(
            Module::new("../evil", ""),
            Err(ModuleError::InvalidName { .. })
        ));
        assert!(Module::new("", "").is_err());
    }
}
