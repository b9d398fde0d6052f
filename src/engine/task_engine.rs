use super::invocation::ModuleInvocation;
use super::report::TaskReporter;
use super::vars::{build_context, compose_vars};
use crate::error::{ErrorKind, HenchmanError, Result};
use crate::fields;
use crate::inventory::Machine;
use crate::modules::{ModuleResult, ModuleSearchPath, Status};
use crate::plan::{Plan, Task};
use crate::template::{parse_when, render_json, type_name, RenderError};
use crate::transport::{LocalTransport, Transport};
use crate::types::{RegisterMap, VarsMap};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Runs tasks against machines: vars, rendering, `when`, `with_items`,
/// module phases, retry and register.
pub struct TaskEngine {
    search_path: ModuleSearchPath,
    local: Arc<dyn Transport>,
    reporter: Arc<dyn TaskReporter>,
}

impl TaskEngine {
    pub fn new(search_path: ModuleSearchPath, reporter: Arc<dyn TaskReporter>) -> Self {
        Self {
            search_path,
            local: Arc::new(LocalTransport::new()),
            reporter,
        }
    }

    /// Replace the transport used by `local: true` tasks.
    pub fn with_local_transport(mut self, local: Arc<dyn Transport>) -> Self {
        self.local = local;
        self
    }

    pub fn search_path(&self) -> &ModuleSearchPath {
        &self.search_path
    }

    pub fn local_transport(&self) -> Arc<dyn Transport> {
        Arc::clone(&self.local)
    }

    /// Run every task of `plan` on `machine`, in order. Stops at the first
    /// unrecovered failure. Returns the machine's register map.
    pub async fn run_machine(&self, plan: &Plan, machine: &Machine) -> Result<RegisterMap> {
        info!(plan = %plan.name, host = %machine.hostname, tasks = plan.tasks.len(), "Starting machine");

        let mut registers = RegisterMap::new();
        for task in &plan.tasks {
            self.run_task(plan, machine, task, &mut registers).await?;
        }

        info!(plan = %plan.name, host = %machine.hostname, "Machine finished");
        Ok(registers)
    }

    /// Run one authored task, including all its `with_items` expansions.
    pub async fn run_task(
        &self,
        plan: &Plan,
        machine: &Machine,
        task: &Task,
        registers: &mut RegisterMap,
    ) -> Result<()> {
        self.run_task_inner(plan, machine, task, registers)
            .await
            .map_err(|e| {
                e.wrap(
                    fields! {
                        "plan" => plan.name,
                        "task" => task.display_name(),
                        "host" => machine.hostname
                    },
                    "",
                )
            })
    }

    async fn run_task_inner(
        &self,
        plan: &Plan,
        machine: &Machine,
        task: &Task,
        registers: &mut RegisterMap,
    ) -> Result<()> {
        let base = compose_vars(&[&plan.vars, &machine.vars])?;

        let items = match &task.with_items {
            None => vec![None],
            Some(raw) => {
                // Task vars that need `item` are unknown here; their errors
                // resurface once an item is bound.
                let vars = self
                    .setup_vars(&base, machine, task, registers, None)
                    .unwrap_or_else(|_| base.clone());
                let ctx = build_context(&vars, registers, &machine.hostname, None);
                match render_json(raw, &ctx)? {
                    Value::Array(items) if items.is_empty() => {
                        debug!(task = %task.display_name(), host = %machine.hostname, "with_items is empty, skipping");
                        return Ok(());
                    }
                    Value::Array(items) => items.into_iter().map(Some).collect(),
                    other => {
                        return Err(RenderError::NotSequence {
                            kind: type_name(&other).to_string(),
                        }
                        .into())
                    }
                }
            }
        };

        for item in items {
            let vars = self.setup_vars(&base, machine, task, registers, item.as_ref())?;
            let ctx = build_context(&vars, registers, &machine.hostname, item.as_ref());
            let rendered = task.render(&ctx)?;
            self.reporter.task_started(&machine.hostname, &rendered);

            let mut result = if rendered.when.is_empty() || parse_when(&rendered.when)? {
                self.execute(&rendered, machine, &ctx).await?
            } else {
                debug!(task = %rendered.display_name(), host = %machine.hostname, "when is False, skipping");
                ModuleResult::ignored("skipped: when evaluated to False")
            };

            if result.status.is_failed() && rendered.ignore_errors {
                warn!(
                    task = %rendered.display_name(),
                    host = %machine.hostname,
                    status = %result.status,
                    "Ignoring failed task"
                );
                result.status = Status::Ignored;
            }

            info!(
                plan = %plan.name,
                task = %rendered.display_name(),
                host = %machine.hostname,
                status = %result.status,
                "Task finished"
            );
            self.reporter.task_finished(&machine.hostname, &rendered, &result);

            if let Some(register) = &rendered.register {
                registers.insert(register.clone(), result.to_register_value());
            }

            if result.status.is_failed() {
                return Err(HenchmanError::new(
                    ErrorKind::Module,
                    format!(
                        "Task '{}' failed on {} with status {}: {}",
                        rendered.display_name(),
                        machine.hostname,
                        result.status,
                        result.msg
                    ),
                    fields! {
                        "plan" => plan.name,
                        "task" => rendered.display_name(),
                        "host" => machine.hostname,
                        "status" => result.status.as_str(),
                        "msg" => result.msg
                    },
                ));
            }
        }

        Ok(())
    }

    /// Plan and machine vars (`base`), then the task's own vars rendered
    /// against them with `item` bound.
    fn setup_vars(
        &self,
        base: &VarsMap,
        machine: &Machine,
        task: &Task,
        registers: &RegisterMap,
        item: Option<&Value>,
    ) -> Result<VarsMap> {
        if task.vars.is_empty() {
            return Ok(base.clone());
        }

        let ctx = build_context(base, registers, &machine.hostname, item);
        let mut task_vars = VarsMap::with_capacity(task.vars.len());
        for (key, value) in &task.vars {
            task_vars.insert(key.clone(), render_json(value, &ctx)?);
        }

        Ok(compose_vars(&[base, &task_vars])?)
    }

    /// Drive the module phases, retrying failed results up to `task.retry` times.
    async fn execute(&self, task: &Task, machine: &Machine, ctx: &VarsMap) -> Result<ModuleResult> {
        let transport: &dyn Transport = if task.local {
            self.local.as_ref()
        } else {
            machine.transport.as_ref()
        };
        let resolved = self.search_path.resolve(&task.module.name)?;

        let mut attempt = 0;
        loop {
            let result = ModuleInvocation::new(
                task.module.clone(),
                resolved.clone(),
                transport,
                task.sudo,
                ctx,
            )
            .run()
            .await?;

            if result.status.is_accepted() || attempt >= task.retry {
                return Ok(result);
            }

            attempt += 1;
            warn!(
                task = %task.display_name(),
                host = %machine.hostname,
                attempt,
                retries = task.retry,
                status = %result.status,
                "Retrying task"
            );
            self.reporter
                .task_retrying(&machine.hostname, task, attempt, &result);
        }
    }
}
