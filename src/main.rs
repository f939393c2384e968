// Gateway node daemon and one-shot CLI

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tokio::time::interval;
use wg_gateway::{
    config::load_config,
    credentials::CredentialStore,
    purge::InactivityPurger,
    registry::IdentityRegistry,
    runner::{CommandRunner, SystemRunner},
    stats::StatsCollector,
};

#[derive(Parser)]
#[command(name = "wg-gateway")]
#[command(about = "VPN/proxy gateway node with automated account lifecycle", long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "/etc/wg-gateway/config.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the daemon (periodic inactivity purge); the default
    Run,
    /// One-shot purge of inactive proxy accounts, printing the report
    Purge {
        /// Inactivity threshold in whole days (defaults to the config value)
        #[arg(long)]
        days: Option<i64>,
    },
    /// Dump live per-identity peer statistics as JSON
    Stats,
    /// List proxy account identities
    ListAccounts,
}

fn main() -> Result<()> {
    // Build custom Tokio runtime with limited thread pool
    // 2 threads is sufficient: 1 for the main loop, 1 for process spawns
    // and blocking file reads
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .thread_name("wg-gateway")
        .thread_stack_size(2 * 1024 * 1024) // 2MB stack (vs 8MB default)
        .enable_time()
        .enable_io()
        .build()?;

    runtime.block_on(async_main())
}

async fn async_main() -> Result<()> {
    let args = Args::parse();

    let config = load_config(&args.config)
        .with_context(|| format!("Failed to load config from {:?}", args.config))?;

    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(&config.general.log_level),
    )
    .init();

    let runner: Arc<dyn CommandRunner> = Arc::new(SystemRunner);
    let registry = IdentityRegistry::open(config.general.storage_dir.clone())
        .context("Failed to open identity registry")?;
    let store = CredentialStore::new(
        config.proxy.htpasswd_cmd.clone(),
        config.proxy.passwd_file.clone(),
        runner.clone(),
    );
    let purger = InactivityPurger::new(
        store.clone(),
        config.proxy.access_log.clone(),
        config.proxy.tail_lines,
    );

    match args.command.unwrap_or(Command::Run) {
        Command::Stats => {
            let collector = StatsCollector::new(
                config.general.wg_interface.clone(),
                registry,
                runner,
            )?;
            let stats = collector.collect().await?;
            println!("{}", serde_json::to_string_pretty(&stats)?);
        }

        Command::Purge { days } => {
            let days = days.unwrap_or(config.purge.inactive_days);
            let report = purger.purge_inactive(days).await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }

        Command::ListAccounts => {
            let accounts = store.list().await?;
            println!("{}", serde_json::to_string_pretty(&accounts)?);
        }

        Command::Run => {
            log::info!("Starting wg-gateway daemon");
            log::info!("WireGuard interface: {}", config.general.wg_interface);
            log::info!("Credential file: {}", config.proxy.passwd_file.display());
            log::info!(
                "Purge: every {}s, threshold {} days",
                config.purge.interval_secs,
                config.purge.inactive_days
            );

            run_daemon(&config, purger).await?;
        }
    }

    Ok(())
}

async fn run_daemon(config: &wg_gateway::types::Config, purger: InactivityPurger) -> Result<()> {
    // Set up signal handlers for graceful shutdown
    let mut sigterm = signal::unix::signal(signal::unix::SignalKind::terminate())
        .context("Failed to set up SIGTERM handler")?;
    let mut sigint = signal::unix::signal(signal::unix::SignalKind::interrupt())
        .context("Failed to set up SIGINT handler")?;

    // First tick fires immediately, so the daemon purges once at startup
    let mut purge_timer = interval(Duration::from_secs(config.purge.interval_secs));

    log::info!("Daemon started successfully");

    loop {
        tokio::select! {
            _ = sigterm.recv() => {
                log::info!("Received SIGTERM");
                break;
            }
            _ = sigint.recv() => {
                log::info!("Received SIGINT");
                break;
            }

            _ = purge_timer.tick() => {
                match purger.purge_inactive(config.purge.inactive_days).await {
                    Ok(report) => {
                        log::info!(
                            "Purge run complete: {} deleted, {} skipped, {} errors",
                            report.deleted.len(),
                            report.skipped.len(),
                            report.errors.len()
                        );
                        for error in &report.errors {
                            log::warn!("Purge error: {}", error);
                        }
                    }
                    Err(e) => {
                        log::error!("Purge run failed: {:#}", e);
                    }
                }
            }
        }
    }

    log::info!("Shutdown complete");
    Ok(())
}
