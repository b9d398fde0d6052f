use crate::cli::options::ExecArgs;
use crate::cli::output::{print_dry_run, print_plan_header, print_plan_stats, ConsoleReporter};
use crate::deploy::{cleanup, execute_plan};
use crate::engine::TaskEngine;
use crate::error::{ErrorKind, Fields, HenchmanError, Result};
use crate::inventory::{InventoryLoader, YamlInventory};
use crate::modules::ModuleSearchPath;
use crate::plan::PlanPreprocessor;
use crate::types::TransportConfig;
use std::sync::Arc;
use tracing::{info, warn};

const DEFAULT_USER: &str = "root";

/// Base transport config from the command line; per-host `henchman_*`
/// vars are layered on top of it.
pub fn base_transport_config(args: &ExecArgs) -> TransportConfig {
    let mut config = TransportConfig::new();

    let user = args.user.clone().filter(|u| !u.is_empty()).unwrap_or_else(|| {
        warn!("No user given and $USER is unset, defaulting to {DEFAULT_USER}");
        DEFAULT_USER.to_string()
    });
    config.insert("username".to_string(), user);

    let keyfile = match &args.keyfile {
        Some(path) => Some(path.display().to_string()),
        None => dirs::home_dir().map(|h| h.join(".ssh").join("id_rsa").display().to_string()),
    };
    if let Some(keyfile) = keyfile {
        config.insert("keyfile".to_string(), keyfile);
    }

    if let Some(password) = args.password.as_ref().filter(|p| !p.is_empty()) {
        config.insert("password".to_string(), password.clone());
    }

    config
}

/// `henchman exec`: load, preprocess, deploy. Returns the terminal errors
/// of the run; setup problems are returned as `Err`.
pub async fn run_exec(args: &ExecArgs) -> Result<Vec<HenchmanError>> {
    info!(plan = %args.plan.display(), inventory = %args.inventory.display(), "Loading plan");

    let inventory = YamlInventory::new(&args.inventory).load()?;
    let plan = PlanPreprocessor::load(&args.plan, &inventory)?;
    let selected = inventory.for_groups(&plan.hosts)?;

    if args.dry_run {
        print_dry_run(&plan, &selected.hostnames()).map_err(|e| {
            HenchmanError::from_error(ErrorKind::Internal, e, Fields::new(), "dry run")
        })?;
        return Ok(Vec::new());
    }

    let machines = selected.machines(&base_transport_config(args))?;
    let search_path = ModuleSearchPath::with_defaults(args.modules.clone());
    let reporter = Arc::new(ConsoleReporter::new(args.debug));
    let engine = Arc::new(TaskEngine::new(search_path, reporter.clone()));
    let plan = Arc::new(plan);

    print_plan_header(&plan, &machines);
    let strategy = args.strategy.deployer();
    info!(strategy = %args.strategy, "Starting deployment");

    let errors = execute_plan(
        Arc::clone(&plan),
        machines.clone(),
        strategy.as_ref(),
        Arc::clone(&engine),
    )
    .await?;

    print_plan_stats(&reporter.stats());

    if args.cleanup {
        let local = engine.local_transport();
        for err in cleanup(&machines, local.as_ref()).await {
            eprintln!("⚠️  {err}");
        }
    }

    Ok(errors)
}
