use super::error::{InventoryError, Result};
use super::model::Inventory;
use super::variables::VariableResolver;
use crate::transport::{self, Transport};
use crate::types::{henchman_vars, TransportConfig, VarsMap};
use std::sync::Arc;
use tracing::debug;

/// A selected host with its merged vars and bound transport.
#[derive(Debug, Clone)]
pub struct Machine {
    pub hostname: String,
    pub vars: VarsMap,
    pub transport: Arc<dyn Transport>,
}

impl Machine {
    pub fn new(hostname: impl Into<String>, vars: VarsMap, transport: Arc<dyn Transport>) -> Self {
        Self {
            hostname: hostname.into(),
            vars,
            transport,
        }
    }
}

impl Inventory {
    /// Transport config for `host`: the base config, the hostname, then any
    /// `henchman_*` vars with the prefix stripped.
    pub fn transport_config(&self, host: &str, vars: &VarsMap, base: &TransportConfig) -> TransportConfig {
        let mut config = base.clone();
        config.insert("hostname".to_string(), host.to_string());
        config.extend(henchman_vars(vars));
        config
    }

    /// Materialize one machine per distinct host.
    pub fn machines(&self, base: &TransportConfig) -> Result<Vec<Machine>> {
        let resolver = VariableResolver::new();
        self.hostnames()
            .into_iter()
            .map(|host| -> Result<Machine> {
                let vars = resolver.host_vars(self, &host);
                let config = self.transport_config(&host, &vars, base);
                debug!(host = %host, "Building machine");
                let transport =
                    transport::from_config(&config).map_err(|source| InventoryError::Transport {
                        host: host.clone(),
                        source,
                    })?;
                Ok(Machine::new(host, vars, transport))
            })
            .collect()
    }
}
