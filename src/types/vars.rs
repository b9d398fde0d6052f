use super::layout::HENCHMAN_PREFIX;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};

static IDENTIFIER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("identifier pattern compiles"));

/// Names reserved by the rendering context.
pub const RESERVED_VARS: &[&str] = &["vars", "item"];

/// Variables visible to templates, keyed by name.
pub type VarsMap = HashMap<String, Value>;

/// Per-machine results of tasks that declared `register`.
pub type RegisterMap = HashMap<String, Value>;

/// Key/value settings consumed by a transport (`hostname`, `port`, ...).
pub type TransportConfig = BTreeMap<String, String>;

/// Merge `src` into `dst`. With `override_existing` the incoming keys win,
/// otherwise keys already in `dst` are kept.
pub fn merge_vars(dst: &mut VarsMap, src: &VarsMap, override_existing: bool) {
    for (key, value) in src {
        if override_existing || !dst.contains_key(key) {
            dst.insert(key.clone(), value.clone());
        }
    }
}

/// Letters, digits and underscores, not starting with a digit.
pub fn is_valid_identifier(name: &str) -> bool {
    IDENTIFIER.is_match(name)
}

pub fn is_reserved_var(name: &str) -> bool {
    RESERVED_VARS.contains(&name)
}

pub fn is_henchman_var(key: &str) -> bool {
    key.starts_with(HENCHMAN_PREFIX)
}

/// Collect `henchman_*` vars with the prefix stripped.
pub fn henchman_vars(vars: &VarsMap) -> TransportConfig {
    vars.iter()
        .filter_map(|(key, value)| {
            let stripped = key.strip_prefix(HENCHMAN_PREFIX)?;
            Some((stripped.to_string(), value_to_plain_string(value)))
        })
        .collect()
}

/// Render a JSON value as the bare string a user would have typed.
pub fn value_to_plain_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_henchman_vars_strip_prefix() {
        let mut vars = VarsMap::new();
        vars.insert("henchman_username".to_string(), json!("deploy"));
        vars.insert("henchman_port".to_string(), json!(2222));
        vars.insert("foo".to_string(), json!("bar"));

        let tc = henchman_vars(&vars);
        assert_eq!(tc.len(), 2);
        assert_eq!(tc["username"], "deploy");
        assert_eq!(tc["port"], "2222");
        assert!(!tc.contains_key("foo"));
    }

    #[test]
    fn test_identifiers() {
        for ok in ["a", "_x", "web_port", "A1"] {
            assert!(is_valid_identifier(ok), "{ok}");
        }
        for bad in ["", "1abc", "with-dash", "a.b", "sp ace"] {
            assert!(!is_valid_identifier(bad), "{bad}");
        }
        assert!(is_reserved_var("item"));
        assert!(!is_reserved_var("items"));
    }

    #[test]
    fn test_merge_vars_respects_override_flag() {
        let mut dst = VarsMap::new();
        dst.insert("a".to_string(), json!(1));
        let mut src = VarsMap::new();
        src.insert("a".to_string(), json!(2));
        src.insert("b".to_string(), json!(3));

        let mut kept = dst.clone();
        merge_vars(&mut kept, &src, false);
        assert_eq!(kept["a"], json!(1));
        assert_eq!(kept["b"], json!(3));

        merge_vars(&mut dst, &src, true);
        assert_eq!(dst["a"], json!(2));
    }
}
