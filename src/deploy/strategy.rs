use super::{RollingDeploy, StandardDeploy};
use crate::engine::TaskEngine;
use crate::error::{ErrorKind, HenchmanError};
use crate::fields;
use crate::inventory::Machine;
use crate::plan::Plan;
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinError;
use tracing::error;

/// A scheduling discipline over machines.
///
/// The returned channel yields every terminal error and closes once the
/// whole run is over.
pub trait DeployStrategy: Send + Sync {
    fn execute(
        &self,
        machines: Vec<Machine>,
        plan: Arc<Plan>,
        engine: Arc<TaskEngine>,
    ) -> mpsc::Receiver<HenchmanError>;
}

/// The error a finished machine worker reports, if any. A worker that
/// panicked or was cancelled still yields exactly one error for its host.
pub(crate) fn worker_outcome(
    host: &str,
    joined: Result<crate::error::Result<()>, JoinError>,
) -> Option<HenchmanError> {
    match joined {
        Ok(Ok(())) => None,
        Ok(Err(err)) => Some(err),
        Err(join_err) => {
            error!(host = %host, error = %join_err, "Machine worker died");
            Some(HenchmanError::from_error(
                ErrorKind::Internal,
                join_err,
                fields! { "host" => host },
                "machine worker died",
            ))
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Strategy {
    /// All machines in parallel, each independent of the others.
    #[default]
    Standard,
    /// One machine at a time, halting at the first failure.
    Rolling,
}

impl Strategy {
    pub fn deployer(&self) -> Box<dyn DeployStrategy> {
        match self {
            Strategy::Standard => Box::new(StandardDeploy::new()),
            Strategy::Rolling => Box::new(RollingDeploy::new()),
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Strategy::Standard => write!(f, "standard"),
            Strategy::Rolling => write!(f, "rolling"),
        }
    }
}
