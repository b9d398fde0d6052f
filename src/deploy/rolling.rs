use super::strategy::{worker_outcome, DeployStrategy};
use crate::engine::TaskEngine;
use crate::error::HenchmanError;
use crate::inventory::Machine;
use crate::plan::Plan;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::warn;

/// Machines strictly one after another on a single worker.
#[derive(Debug, Default)]
pub struct RollingDeploy;

impl RollingDeploy {
    pub fn new() -> Self {
        Self
    }
}

impl DeployStrategy for RollingDeploy {
    fn execute(
        &self,
        machines: Vec<Machine>,
        plan: Arc<Plan>,
        engine: Arc<TaskEngine>,
    ) -> mpsc::Receiver<HenchmanError> {
        let (tx, rx) = mpsc::channel(1);

        tokio::spawn(async move {
            let total = machines.len();
            for (index, machine) in machines.into_iter().enumerate() {
                let host = machine.hostname.clone();
                let plan = Arc::clone(&plan);
                let engine = Arc::clone(&engine);
                let worker =
                    tokio::spawn(async move { engine.run_machine(&plan, &machine).await.map(drop) });

                if let Some(err) = worker_outcome(&host, worker.await) {
                    warn!(
                        host = %host,
                        remaining = total - index - 1,
                        "Rolling deploy halted"
                    );
                    let _ = tx.send(err).await;
                    break;
                }
            }
        });

        rx
    }
}
