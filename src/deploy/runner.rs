use super::strategy::DeployStrategy;
use crate::engine::TaskEngine;
use crate::error::{ErrorKind, HenchmanError, Result};
use crate::fields;
use crate::inventory::Machine;
use crate::plan::Plan;
use crate::transport::Transport;
use crate::types::cleanup_command;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Run `plan` over `machines` and collect every terminal error.
///
/// An empty machine list is a configuration error; the strategy is never
/// started in that case.
pub async fn execute_plan(
    plan: Arc<Plan>,
    machines: Vec<Machine>,
    strategy: &dyn DeployStrategy,
    engine: Arc<TaskEngine>,
) -> Result<Vec<HenchmanError>> {
    if machines.is_empty() {
        return Err(HenchmanError::new(
            ErrorKind::Config,
            format!("Plan '{}' selects no machines", plan.name),
            fields! { "plan" => plan.name, "hosts" => plan.hosts },
        ));
    }

    info!(
        plan = %plan.name,
        machines = machines.len(),
        tasks = plan.tasks.len(),
        "Executing plan"
    );

    let mut errors_rx = strategy.execute(machines, Arc::clone(&plan), engine);
    let mut errors = Vec::new();
    while let Some(err) = errors_rx.recv().await {
        error!(
            plan = %plan.name,
            kind = %err.kind(),
            fields = %err.fields_json(),
            "{}",
            err
        );
        errors.push(err);
    }

    info!(plan = %plan.name, errors = errors.len(), "Plan finished");
    Ok(errors)
}

/// Remove the remote working directory from every machine and locally.
/// Failures are returned, not fatal.
pub async fn cleanup(machines: &[Machine], local: &dyn Transport) -> Vec<HenchmanError> {
    let command = cleanup_command();
    let mut errors = Vec::new();

    let mut targets: Vec<(&str, &dyn Transport)> = Vec::with_capacity(machines.len() + 1);
    for machine in machines {
        targets.push((machine.hostname.as_str(), machine.transport.as_ref()));
    }
    targets.push(("localhost", local));

    for (host, transport) in targets {
        info!(host = %host, "Cleaning up remote directory");
        if let Err(err) = transport.exec(&command, &[], false).await {
            let err = HenchmanError::from(err).wrap(fields! { "host" => host }, "cleanup");
            warn!(host = %host, "{}", err);
            errors.push(err);
        }
    }

    errors
}
