use crate::error::{ErrorKind, Fields, HenchmanError};
use crate::types::{
    is_henchman_var, is_reserved_var, is_valid_identifier, merge_vars, RegisterMap, VarsMap,
};
use serde_json::Value;
use thiserror::Error;

/// Key under which the merged vars mapping is exposed to templates.
pub const VARS_KEY: &str = "vars";
pub const ITEM_KEY: &str = "item";
pub const HOSTNAME_KEY: &str = "current_hostname";

#[derive(Debug, Error, Clone, PartialEq)]
pub enum VarsError {
    #[error("'{key}' is a reserved keyword and cannot be used as a variable name")]
    Keyword { key: String },

    #[error("'{key}' is not a valid variable name")]
    NotValidVariable { key: String },
}

impl From<VarsError> for HenchmanError {
    fn from(err: VarsError) -> Self {
        HenchmanError::from_error(ErrorKind::Validation, err, Fields::new(), "")
    }
}

/// Merge scopes left to right (later wins), dropping `henchman_*` keys, and
/// validate every remaining name.
pub fn compose_vars(scopes: &[&VarsMap]) -> Result<VarsMap, VarsError> {
    let mut vars = VarsMap::new();
    for scope in scopes {
        merge_vars(&mut vars, scope, true);
    }
    vars.retain(|key, _| !is_henchman_var(key));

    // Sorted so the reported key does not depend on hash order.
    let mut keys: Vec<&String> = vars.keys().collect();
    keys.sort();
    for key in keys {
        if is_reserved_var(key) {
            return Err(VarsError::Keyword { key: key.clone() });
        }
        if !is_valid_identifier(key) {
            return Err(VarsError::NotValidVariable { key: key.clone() });
        }
    }

    Ok(vars)
}

/// Flat rendering context: vars, then `vars`, `current_hostname`, `item`,
/// then registered results on top.
pub fn build_context(
    vars: &VarsMap,
    registers: &RegisterMap,
    hostname: &str,
    item: Option<&Value>,
) -> VarsMap {
    let mut ctx = vars.clone();
    ctx.insert(
        VARS_KEY.to_string(),
        Value::Object(vars.iter().map(|(k, v)| (k.clone(), v.clone())).collect()),
    );
    ctx.insert(HOSTNAME_KEY.to_string(), Value::String(hostname.to_string()));
    if let Some(item) = item {
        ctx.insert(ITEM_KEY.to_string(), item.clone());
    }
    merge_vars(&mut ctx, registers, true);
    ctx
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn map(pairs: &[(&str, Value)]) -> VarsMap {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn test_precedence_plan_machine_task() {
        let plan = map(&[("a", json!("plan")), ("b", json!("plan")), ("c", json!("plan"))]);
        let machine = map(&[("b", json!("machine")), ("c", json!("machine"))]);
        let task = map(&[("c", json!("task"))]);

        let vars = compose_vars(&[&plan, &machine, &task]).unwrap();
        assert_eq!(vars["a"], json!("plan"));
        assert_eq!(vars["b"], json!("machine"));
        assert_eq!(vars["c"], json!("task"));
    }

    #[test]
    fn test_henchman_vars_are_dropped() {
        let machine = map(&[("henchman_username", json!("root")), ("app", json!("x"))]);
        let vars = compose_vars(&[&machine]).unwrap();
        assert!(!vars.contains_key("henchman_username"));

        let ctx = build_context(&vars, &RegisterMap::new(), "web1", None);
        assert!(ctx.keys().all(|k| !k.starts_with("henchman_")));
        assert!(ctx["vars"].get("henchman_username").is_none());
    }

    #[test]
    fn test_reserved_and_invalid_names() {
        let reserved = map(&[("item", json!(1))]);
        assert_eq!(
            compose_vars(&[&reserved]).unwrap_err(),
            VarsError::Keyword { key: "item".into() }
        );

        let invalid = map(&[("1abc", json!(1))]);
        assert_eq!(
            compose_vars(&[&invalid]).unwrap_err(),
            VarsError::NotValidVariable { key: "1abc".into() }
        );
    }

    #[test]
    fn test_context_layers() {
        let vars = map(&[("r", json!("shadowed")), ("x", json!(1))]);
        let mut registers = RegisterMap::new();
        registers.insert("r".to_string(), json!({"status": "ok"}));

        let ctx = build_context(&vars, &registers, "db1", Some(&json!("pkg")));
        assert_eq!(ctx["r"]["status"], json!("ok"));
        assert_eq!(ctx["item"], json!("pkg"));
        assert_eq!(ctx["current_hostname"], json!("db1"));
        assert_eq!(ctx["vars"]["x"], json!(1));
    }
}
