use crate::engine::{PlanStats, TaskReporter};
use crate::inventory::Machine;
use crate::modules::{ModuleResult, Status};
use crate::plan::{Plan, Task};
use colored::{ColoredString, Colorize};
use std::sync::{Arc, Mutex};

/// Serializes console writes from concurrent machine workers.
static PRINT_LOCK: Mutex<()> = Mutex::new(());

fn with_print_lock<F: FnOnce()>(f: F) {
    let _guard = PRINT_LOCK.lock().unwrap_or_else(|e| e.into_inner());
    f();
}

fn paint(status: Status, text: &str) -> ColoredString {
    match status {
        Status::Ok => text.green(),
        Status::Changed => text.yellow(),
        Status::Failure | Status::Error => text.red(),
        Status::Ignored => text.cyan(),
    }
}

fn icon(status: Status) -> &'static str {
    match status {
        Status::Ok => "✅",
        Status::Changed => "🔄",
        Status::Failure | Status::Error => "❌",
        Status::Ignored => "⏭️ ",
    }
}

/// Prints task results to stdout and counts them per host.
#[derive(Debug, Default)]
pub struct ConsoleReporter {
    stats: Arc<PlanStats>,
    debug: bool,
}

impl ConsoleReporter {
    pub fn new(debug: bool) -> Self {
        Self {
            stats: Arc::new(PlanStats::new()),
            debug,
        }
    }

    pub fn stats(&self) -> Arc<PlanStats> {
        Arc::clone(&self.stats)
    }
}

impl TaskReporter for ConsoleReporter {
    fn task_retrying(&self, host: &str, task: &Task, attempt: u32, result: &ModuleResult) {
        with_print_lock(|| {
            println!(
                "  🔁 {} {} retry {}/{} after {}",
                host.bold(),
                task.display_name(),
                attempt,
                task.retry,
                paint(result.status, result.status.as_str())
            );
        });
    }

    fn task_finished(&self, host: &str, task: &Task, result: &ModuleResult) {
        self.stats.record(host, result.status);

        with_print_lock(|| {
            let mut line = format!(
                "{} [{}] {} => {}",
                icon(result.status),
                host.bold(),
                task.display_name(),
                paint(result.status, result.status.as_str())
            );
            if !result.msg.is_empty() {
                line.push_str(&format!(" ({})", result.msg));
            }
            println!("{line}");

            if (task.debug || self.debug) && !result.output.is_null() {
                match serde_json::to_string_pretty(&result.output) {
                    Ok(output) => {
                        for l in output.lines() {
                            println!("    {l}");
                        }
                    }
                    Err(_) => println!("    {}", result.output),
                }
            }
        });
    }
}

pub fn print_plan_header(plan: &Plan, machines: &[Machine]) {
    with_print_lock(|| {
        println!("🚀 Plan: {}", plan.name.bold());
        println!(
            "   {} tasks on {} machines",
            plan.tasks.len(),
            machines.len()
        );
        println!();
    });
}

/// Per host outcome counts, one line per host.
pub fn print_plan_stats(stats: &PlanStats) {
    let snapshot = stats.snapshot();
    if snapshot.is_empty() {
        return;
    }

    with_print_lock(|| {
        println!();
        println!("📊 Plan stats:");
        for (host, counts) in &snapshot {
            let parts: Vec<String> = Status::ALL
                .iter()
                .map(|status| {
                    let n = counts.get(status).copied().unwrap_or(0);
                    paint(*status, &format!("{}={}", status.as_str(), n)).to_string()
                })
                .collect();
            println!("  {:<24} {}", host, parts.join(" "));
        }
    });
}

/// Dry-run listing: the plan as YAML, then the selected machines.
pub fn print_dry_run(plan: &Plan, hostnames: &[String]) -> Result<(), serde_yaml::Error> {
    let yaml = serde_yaml::to_string(plan)?;
    with_print_lock(|| {
        println!("{yaml}");
        println!("🎯 Machines ({}):", hostnames.len());
        for host in hostnames {
            println!("  • {host}");
        }
    });
    Ok(())
}
