// src/lib.rs

pub mod bridge;
pub mod cli;
pub mod config;
pub mod engine;
pub mod errors;
pub mod exec;
pub mod fs;
pub mod logging;
pub mod protocol;
pub mod registry;
pub mod router;
pub mod types;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tracing::{debug, info, warn};

use crate::cli::CliArgs;
use crate::config::loader::load_and_validate;
use crate::config::Settings;
use crate::engine::{Notifier, SupervisorEngine};
use crate::exec::{OsProcessRunner, ProcessRunner};
use crate::fs::{FileSystem, RealFileSystem};
use crate::registry::ProcessRegistry;
use crate::router::Router;

/// Extra time on top of the kill grace period for the whole shutdown.
const SHUTDOWN_SLACK: Duration = Duration::from_secs(10);

/// Load settings for this run, applying CLI overrides.
///
/// Runs before logging is initialised, because the settings name the log
/// directory.
pub fn load_settings(args: &CliArgs) -> Result<Settings> {
    let mut settings = load_and_validate(&args.settings)?;
    if let Some(state) = args.state.clone() {
        settings.state_file = state;
    }
    Ok(settings)
}

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - settings and state loading
/// - the runner, engine and command router
/// - the stdio bridge
/// - Ctrl-C / end-of-input handling and the shutdown policy
pub async fn run(args: CliArgs, settings: Settings) -> Result<()> {
    debug!(?settings, "settings loaded");

    let fs: Arc<dyn FileSystem> = Arc::new(RealFileSystem);
    let registry = Arc::new(ProcessRegistry::open(fs, settings.state_file.clone())?);

    if args.dry_run {
        print_dry_run(&settings, &registry);
        return Ok(());
    }

    let (notifier, mut events) = Notifier::channel();
    let runner: Arc<dyn ProcessRunner> = Arc::new(OsProcessRunner::new(settings.kill_grace));
    let engine = SupervisorEngine::new(Arc::clone(&registry), runner, notifier);
    let router = Router::new(engine.clone());

    if registry.global_config().auto_start_on_open {
        if args.no_auto_start {
            info!("autoStartOnOpen set but disabled by --no-auto-start");
        } else {
            engine.start_all();
        }
    }

    info!(state_file = %settings.state_file.display(), "procward ready");

    let mut stdout = tokio::io::stdout();
    let served = tokio::select! {
        served = bridge::serve(&router, &mut events, tokio::io::stdin(), &mut stdout) => served,
        signal = tokio::signal::ctrl_c() => {
            match signal {
                Ok(()) => info!("received Ctrl-C"),
                Err(e) => warn!(error = %e, "failed to listen for Ctrl-C"),
            }
            Ok(())
        }
    };

    let budget = settings.kill_grace + SHUTDOWN_SLACK;
    if tokio::time::timeout(budget, engine.shutdown(settings.shutdown_policy))
        .await
        .is_err()
    {
        warn!(
            budget_secs = budget.as_secs(),
            "shutdown did not finish in time; exiting anyway"
        );
    }

    if let Err(e) = bridge::flush_events(&mut events, &mut stdout).await {
        debug!(error = %e, "could not deliver final events");
    }

    served
}

/// Print settings and stored definitions without starting anything.
fn print_dry_run(settings: &Settings, registry: &ProcessRegistry) {
    println!("procward dry-run");
    println!("  state_file = {}", settings.state_file.display());
    println!("  kill_grace_ms = {}", settings.kill_grace.as_millis());
    println!("  shutdown_policy = {:?}", settings.shutdown_policy);
    if let Some(dir) = &settings.log_dir {
        println!("  log_dir = {}", dir.display());
    }
    println!(
        "  autoStartOnOpen = {}",
        registry.global_config().auto_start_on_open
    );
    println!();

    let processes = registry.list();
    println!("processes ({}):", processes.len());
    for def in processes {
        println!("  - {} ({})", def.name, def.id);
        println!("      path: {}", def.path);
        println!("      type: {}", def.kind.as_str());
        if !def.args.is_empty() {
            println!("      args: {}", def.args);
        }
        if def.delay_seconds > 0 {
            println!("      delaySeconds: {}", def.delay_seconds);
        }
        if def.guard_enabled {
            println!("      guard: restart after {}s", def.guard_delay_seconds);
        }
        if !def.enabled {
            println!("      enabled: false");
        }
        if def.background {
            println!("      background: true");
        }
    }

    debug!("dry-run complete (nothing started)");
}
