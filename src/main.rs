// src/main.rs

use procward::{cli, load_settings, logging, run};

#[tokio::main]
async fn main() {
    if let Err(err) = run_main().await {
        eprintln!("procward error: {err:?}");
        std::process::exit(1);
    }
    // The stdin reader thread may still be blocked on a read; do not wait
    // for it.
    std::process::exit(0);
}

async fn run_main() -> anyhow::Result<()> {
    let args = cli::parse();
    let settings = load_settings(&args)?;
    let _log_guard = logging::init_logging(args.log_level, settings.log_dir.as_deref())?;
    run(args, settings).await
}
