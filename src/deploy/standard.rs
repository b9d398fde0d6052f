use super::merge::merge_errors;
use super::strategy::{worker_outcome, DeployStrategy};
use crate::engine::TaskEngine;
use crate::error::HenchmanError;
use crate::inventory::Machine;
use crate::plan::Plan;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::debug;

/// One worker per machine, all running concurrently.
#[derive(Debug, Default)]
pub struct StandardDeploy;

impl StandardDeploy {
    pub fn new() -> Self {
        Self
    }
}

impl DeployStrategy for StandardDeploy {
    fn execute(
        &self,
        machines: Vec<Machine>,
        plan: Arc<Plan>,
        engine: Arc<TaskEngine>,
    ) -> mpsc::Receiver<HenchmanError> {
        let mut receivers = Vec::with_capacity(machines.len());

        for machine in machines {
            // A worker emits at most one error before it exits.
            let (tx, rx) = mpsc::channel(1);
            receivers.push(rx);

            let plan = Arc::clone(&plan);
            let engine = Arc::clone(&engine);
            let host = machine.hostname.clone();
            let worker = tokio::spawn(async move {
                debug!(host = %machine.hostname, "Worker started");
                engine.run_machine(&plan, &machine).await.map(drop)
            });

            tokio::spawn(async move {
                if let Some(err) = worker_outcome(&host, worker.await) {
                    let _ = tx.send(err).await;
                }
            });
        }

        merge_errors(receivers)
    }
}
