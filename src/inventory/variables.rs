use super::model::Inventory;
use crate::types::{merge_vars, VarsMap};

/// Resolves the vars a host sees from the groups it belongs to.
pub struct VariableResolver;

impl VariableResolver {
    pub fn new() -> Self {
        Self
    }

    /// Group vars in declaration order (later groups win), then host vars.
    pub fn host_vars(&self, inventory: &Inventory, host: &str) -> VarsMap {
        let mut resolved = VarsMap::new();
        for (_, group) in inventory.groups_of(host) {
            merge_vars(&mut resolved, &group.vars, true);
        }

        // Apply host-specific variables (highest priority)
        if let Some(host_vars) = inventory.hostvars.get(host) {
            merge_vars(&mut resolved, host_vars, true);
        }
        resolved
    }

    /// Vars of every group, merged in declaration order.
    pub fn group_vars(&self, inventory: &Inventory) -> VarsMap {
        let mut resolved = VarsMap::new();
        for group in inventory.groups.values() {
            merge_vars(&mut resolved, &group.vars, true);
        }
        resolved
    }
}

impl Default for VariableResolver {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_later_group_then_host_wins() {
        let inventory = Inventory::from_yaml(
            r#"
groups:
  a:
    hosts: [h1]
    vars: {x: from_a, y: from_a, z: from_a}
  b:
    hosts: [h1]
    vars: {y: from_b, z: from_b}
hostvars:
  h1: {z: from_host}
"#,
        )
        .unwrap();

        let vars = VariableResolver::new().host_vars(&inventory, "h1");
        assert_eq!(vars["x"], json!("from_a"));
        assert_eq!(vars["y"], json!("from_b"));
        assert_eq!(vars["z"], json!("from_host"));
    }
}
