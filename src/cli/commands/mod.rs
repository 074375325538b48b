//! CLI parser and dispatch to command modules.

mod discover;
mod helpers;
mod inventory;
mod run;

use std::path::PathBuf;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};

use crate::config::Settings;

#[derive(Parser)]
#[command(name = "form13f")]
#[command(about = "Extract SEC Form 13F holdings tables into normalized artifacts")]
#[command(version)]
pub struct Cli {
    /// Config file path (defaults to ./form13f.toml if present)
    #[arg(short, long, global = true, env = "FORM13F_CONFIG")]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Check if verbose mode is enabled (for early logging setup).
pub fn is_verbose() -> bool {
    std::env::args().any(|arg| arg == "-v" || arg == "--verbose")
}

/// Options shared by `run` and `monitor`.
#[derive(Args, Debug, Clone, Default)]
pub struct RunArgs {
    /// Concurrent file workers
    #[arg(short = 'f', long)]
    file_workers: Option<usize>,
    /// Concurrent accessions per file worker
    #[arg(short = 'r', long)]
    record_workers: Option<usize>,
    /// JSON list of accession ids or CIKs to process first
    #[arg(short, long)]
    priority: Option<PathBuf>,
    /// Directory of accession batch CSVs
    #[arg(short, long)]
    batches_dir: Option<PathBuf>,
    /// Use the cached inventory file instead of listing the store
    #[arg(long)]
    no_refresh: bool,
}

impl RunArgs {
    fn apply(&self, settings: &mut Settings) {
        if let Some(n) = self.file_workers {
            settings.file_workers = n.max(1);
        }
        if let Some(n) = self.record_workers {
            settings.record_workers = n.max(1);
        }
        if let Some(ref path) = self.priority {
            settings.priority_file = Some(path.clone());
        }
        if let Some(ref dir) = self.batches_dir {
            settings.batches_dir = dir.clone();
        }
        if self.no_refresh {
            settings.refresh_inventory = false;
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Process every pending accession in the batches directory once
    Run {
        #[command(flatten)]
        args: RunArgs,
    },

    /// Repeat `run` on an interval until interrupted
    Monitor {
        #[command(flatten)]
        args: RunArgs,
        /// Seconds to wait between runs
        #[arg(long, default_value = "21600")]
        interval: u64,
    },

    /// Show (and optionally refresh) the inventory of persisted accessions
    Inventory {
        /// List the artifact store and rewrite the inventory file
        #[arg(long)]
        refresh: bool,
    },

    /// Write a batch CSV of 13F filings for each CIK from EDGAR
    Discover {
        /// Filer CIKs
        #[arg(required = true)]
        ciks: Vec<String>,
        /// Output directory (defaults to the batches directory)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

pub async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let mut settings = Settings::load(cli.config.as_deref()).context("loading settings")?;

    match cli.command {
        Commands::Run { args } => {
            args.apply(&mut settings);
            run::cmd_run(&settings).await
        }
        Commands::Monitor { args, interval } => {
            args.apply(&mut settings);
            run::cmd_monitor(&settings, interval).await
        }
        Commands::Inventory { refresh } => inventory::cmd_inventory(&settings, refresh).await,
        Commands::Discover { ciks, output } => {
            discover::cmd_discover(&settings, &ciks, output).await
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_run_flags() {
        let cli = Cli::parse_from([
            "form13f",
            "-v",
            "run",
            "--file-workers",
            "8",
            "--priority",
            "p.json",
            "--no-refresh",
        ]);
        assert!(cli.verbose);
        let Commands::Run { args } = cli.command else {
            panic!("expected run");
        };
        let mut settings = Settings::default();
        args.apply(&mut settings);
        assert_eq!(settings.file_workers, 8);
        assert_eq!(settings.record_workers, 1);
        assert_eq!(settings.priority_file, Some(PathBuf::from("p.json")));
        assert!(!settings.refresh_inventory);
    }

    #[test]
    fn test_parse_monitor_interval() {
        let cli = Cli::parse_from(["form13f", "monitor", "--interval", "60"]);
        assert!(matches!(cli.command, Commands::Monitor { interval: 60, .. }));
    }

    #[test]
    fn test_cli_definition() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
