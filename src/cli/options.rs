use crate::config::DEFAULT_CONFIG_FILE;
use crate::deploy::Strategy;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// Agentless configuration management over SSH
#[derive(Parser)]
#[command(name = "henchman")]
#[command(about = "Run declarative plans against an inventory of hosts over SSH")]
#[command(version = env!("CARGO_PKG_VERSION"))]
pub struct HenchmanCli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Execute a plan against the hosts it selects
    Exec(ExecArgs),
}

#[derive(Args, Debug, Clone)]
pub struct ExecArgs {
    /// Plan file
    pub plan: PathBuf,

    /// Inventory file
    #[arg(short, long, default_value = "hosts")]
    pub inventory: PathBuf,

    /// Extra module directory, searched after ./modules
    #[arg(long, env = "HENCHMAN_MODULES")]
    pub modules: Option<PathBuf>,

    /// Remote user
    #[arg(short, long, env = "USER")]
    pub user: Option<String>,

    /// SSH private key
    #[arg(long)]
    pub keyfile: Option<PathBuf>,

    /// SSH password, preferred over the key when given
    #[arg(long)]
    pub password: Option<String>,

    /// Record debug events in the log and print module output
    #[arg(long)]
    pub debug: bool,

    /// Remove the remote working directory after the run
    #[arg(long)]
    pub cleanup: bool,

    /// Configuration file
    #[arg(long, default_value = DEFAULT_CONFIG_FILE)]
    pub configuration: PathBuf,

    /// Deployment strategy
    #[arg(long, value_enum, default_value_t = Strategy::Standard)]
    pub strategy: Strategy,

    /// Print the preprocessed plan and selected machines without running anything
    #[arg(long)]
    pub dry_run: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exec_defaults() {
        let cli = HenchmanCli::try_parse_from(["henchman", "exec", "plan.yaml"]).unwrap();
        let Commands::Exec(args) = cli.command;
        assert_eq!(args.plan, PathBuf::from("plan.yaml"));
        assert_eq!(args.inventory, PathBuf::from("hosts"));
        assert_eq!(args.strategy, Strategy::Standard);
        assert_eq!(args.configuration, PathBuf::from("conf.yaml"));
        assert!(!args.dry_run);
    }

    #[test]
    fn test_exec_flags() {
        let cli = HenchmanCli::try_parse_from([
            "henchman",
            "exec",
            "plan.yaml",
            "--inventory",
            "inv.yaml",
            "--strategy",
            "rolling",
            "--user",
            "deploy",
            "--cleanup",
            "--debug",
        ])
        .unwrap();
        let Commands::Exec(args) = cli.command;
        assert_eq!(args.inventory, PathBuf::from("inv.yaml"));
        assert_eq!(args.strategy, Strategy::Rolling);
        assert_eq!(args.user.as_deref(), Some("deploy"));
        assert!(args.cleanup && args.debug);
    }
}
