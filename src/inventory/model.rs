use super::error::{InventoryError, Result};
use crate::types::VarsMap;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Group name that would be ambiguous with a group's own `hosts` key.
pub const RESERVED_GROUP: &str = "hosts";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Group {
    #[serde(default)]
    pub hosts: Vec<String>,
    #[serde(default)]
    pub vars: VarsMap,
}

/// Groups in declaration order plus per-host vars.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Inventory {
    pub groups: IndexMap<String, Group>,
    pub hostvars: HashMap<String, VarsMap>,
}

#[derive(Debug, Deserialize)]
struct RawInventory {
    groups: Option<IndexMap<String, Option<RawGroup>>>,
    #[serde(default)]
    hostvars: Option<HashMap<String, Option<VarsMap>>>,
}

#[derive(Debug, Deserialize)]
struct RawGroup {
    hosts: Option<Vec<String>>,
    vars: Option<VarsMap>,
}

impl Inventory {
    /// Parse and validate inventory YAML.
    pub fn from_yaml(content: &str) -> Result<Self> {
        let raw: RawInventory =
            serde_yaml::from_str(content).map_err(|e| InventoryError::InvalidYaml {
                reason: e.to_string(),
            })?;

        let raw_groups = raw.groups.ok_or(InventoryError::MissingGroups)?;
        let mut groups = IndexMap::with_capacity(raw_groups.len());
        for (name, group) in raw_groups {
            if name == RESERVED_GROUP {
                return Err(InventoryError::ReservedGroup { name });
            }
            let group = group.unwrap_or(RawGroup {
                hosts: None,
                vars: None,
            });
            let hosts = match group.hosts {
                Some(hosts) if !hosts.is_empty() => hosts,
                _ => return Err(InventoryError::MissingHosts { group: name }),
            };
            groups.insert(
                name,
                Group {
                    hosts,
                    vars: group.vars.unwrap_or_default(),
                },
            );
        }

        let hostvars = raw
            .hostvars
            .unwrap_or_default()
            .into_iter()
            .map(|(host, vars)| (host, vars.unwrap_or_default()))
            .collect();

        Ok(Self { groups, hostvars })
    }

    /// Keep only the named groups, in declaration order.
    pub fn for_groups(&self, selectors: &[String]) -> Result<Self> {
        if let Some(unknown) = selectors.iter().find(|s| !self.groups.contains_key(*s)) {
            return Err(InventoryError::UnknownGroup {
                group: unknown.clone(),
            });
        }

        let groups: IndexMap<String, Group> = self
            .groups
            .iter()
            .filter(|(name, _)| selectors.contains(*name))
            .map(|(name, group)| (name.clone(), group.clone()))
            .collect();

        let filtered = Self {
            hostvars: HashMap::new(),
            groups,
        };
        let hostvars = filtered
            .hostnames()
            .into_iter()
            .filter_map(|host| self.hostvars.get(&host).map(|v| (host, v.clone())))
            .collect();

        Ok(Self {
            hostvars,
            ..filtered
        })
    }

    /// Every host once, in the order first seen.
    pub fn hostnames(&self) -> Vec<String> {
        let mut seen = Vec::new();
        for group in self.groups.values() {
            for host in &group.hosts {
                if !seen.contains(host) {
                    seen.push(host.clone());
                }
            }
        }
        seen
    }

    /// Groups containing `host`, in declaration order.
    pub fn groups_of<'a>(&'a self, host: &'a str) -> impl Iterator<Item = (&'a String, &'a Group)> {
        self.groups
            .iter()
            .filter(move |(_, group)| group.hosts.iter().any(|h| h == host))
    }
}
