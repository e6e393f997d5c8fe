//! CLI entry point for the driftwise rebalancer.

use std::path::{Path, PathBuf};
use std::process;

use clap::{Parser, Subcommand};
use log::warn;

use driftwise_broker::paper::PaperBook;
use driftwise_rebalancer::audit::AuditLog;
use driftwise_rebalancer::config::Config;
use driftwise_rebalancer::confirm::{AutoConfirm, Confirmer, DialoguerConfirmer};
use driftwise_rebalancer::error::Result;
use driftwise_rebalancer::models::ModelFile;
use driftwise_rebalancer::orchestrator::{CancelToken, Orchestrator, RunOptions, RunSummary};
use driftwise_rebalancer::preview::format_targets;

#[derive(Parser)]
#[command(name = "driftwise")]
#[command(about = "Multi-account drift rebalancer")]
#[command(version)]
struct Cli {
    /// Path to config.toml
    #[arg(long, default_value = "config.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Plan, confirm and execute rebalance orders for every account
    Run {
        /// Path to models.json
        models: PathBuf,

        /// Paper broker book (JSON)
        #[arg(long)]
        broker: PathBuf,

        /// Show plans without executing
        #[arg(long)]
        dry_run: bool,

        /// Never trade; plan and preview only
        #[arg(long)]
        read_only: bool,

        /// Skip confirmation prompts
        #[arg(long)]
        yes: bool,
    },

    /// Print the blended target weights
    Targets {
        /// Path to models.json
        models: PathBuf,
    },

    /// Plan every account without executing (same as `run --dry-run`)
    Plan {
        /// Path to models.json
        models: PathBuf,

        /// Paper broker book (JSON)
        #[arg(long)]
        broker: PathBuf,
    },
}

fn load_models(path: &Path) -> ModelFile {
    match ModelFile::load(path) {
        Ok(m) => m,
        Err(e) => {
            eprintln!("Error loading models: {e}");
            process::exit(1);
        }
    }
}

/// First Ctrl-C stops the run after the current order; a second one exits.
fn install_interrupt_handler(cancel: CancelToken) {
    let result = ctrlc::set_handler(move || {
        if cancel.is_cancelled() {
            process::exit(130);
        }
        eprintln!("\nInterrupted: finishing current order, skipping remaining accounts");
        cancel.cancel();
    });
    if let Err(e) = result {
        warn!("could not install Ctrl-C handler: {e}");
    }
}

fn run(
    config: &Config,
    models: &Path,
    broker: &Path,
    options: RunOptions,
    yes: bool,
) -> Result<RunSummary> {
    let models = load_models(models);
    let broker = PaperBook::load(broker)?.into_broker();
    let audit = AuditLog::open(&config.audit_path())?;

    let confirmer: Box<dyn Confirmer> = if yes {
        Box::new(AutoConfirm)
    } else {
        Box::new(DialoguerConfirmer)
    };

    let mut orchestrator =
        Orchestrator::new(config, &broker, confirmer.as_ref(), audit).with_options(options);
    install_interrupt_handler(orchestrator.cancel_token());
    let summary = orchestrator.run(&models)?;
    println!(
        "\n{summary}Audit logged to {}",
        config.audit_path().display()
    );
    Ok(summary)
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_secs()
        .init();

    let cli = Cli::parse();

    let config = match Config::load(&cli.config) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error loading config: {e}");
            process::exit(1);
        }
    };

    let result = match cli.command {
        Command::Run {
            models,
            broker,
            dry_run,
            read_only,
            yes,
        } => {
            let options = RunOptions {
                dry_run,
                read_only,
                print_previews: true,
                model_file: models.display().to_string(),
            };
            run(&config, &models, &broker, options, yes)
        }
        Command::Plan { models, broker } => {
            let options = RunOptions {
                dry_run: true,
                read_only: false,
                print_previews: true,
                model_file: models.display().to_string(),
            };
            run(&config, &models, &broker, options, true)
        }
        Command::Targets { models } => {
            let models = load_models(&models);
            match Orchestrator::build_targets(&config, &models) {
                Ok(targets) => {
                    print!("{}", format_targets(&targets));
                    process::exit(0);
                }
                Err(e) => Err(e),
            }
        }
    };

    match result {
        Ok(summary) => process::exit(summary.exit_code()),
        Err(e) => {
            eprintln!("Error: {e}");
            process::exit(1);
        }
    }
}
