use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{info, warn};

use noco_odoo_sync::config;

#[derive(Debug, Parser)]
#[command(
    author,
    version,
    about = "Poll NocoDB for pending products and contacts and push them into Odoo"
)]
struct Args {
    /// Path to YAML config file
    #[arg(long, default_value = "config.yaml")]
    config: PathBuf,

    /// Run a single pass and exit
    #[arg(long)]
    once: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(false)
        .compact()
        .init();

    let args = Args::parse();
    let cfg = config::load(Some(&args.config))?;
    let service = noco_odoo_sync::build_service(&cfg)?;
    let poll_sleep = Duration::from_millis(cfg.app.poll_interval_ms);

    info!(
        interval_ms = cfg.app.poll_interval_ms,
        once = args.once,
        "Starting pending sync"
    );

    let mut passes = 0u64;
    loop {
        let summary = service.sync_all(true).await;
        passes += 1;
        let touched = summary.products.created
            + summary.products.updated
            + summary.contacts.created
            + summary.contacts.updated;
        if summary.success {
            info!(pass = passes, touched, "pending sync pass finished");
        } else {
            let errors = summary.products.errors.len() + summary.contacts.errors.len();
            warn!(pass = passes, touched, errors, "pending sync pass had errors");
        }

        if args.once {
            break;
        }

        tokio::select! {
            _ = tokio::time::sleep(poll_sleep) => {}
            _ = tokio::signal::ctrl_c() => {
                info!("Ctrl-C received, stopping");
                break;
            }
        }
    }

    info!(passes, "Pending sync stopped");
    Ok(())
}
