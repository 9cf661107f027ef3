use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::io::BufReader;
use tracing_subscriber::EnvFilter;

use badgeprint::cli::{Cli, Command};
use badgeprint::config::PrintConfig;
use badgeprint::coordinator::BadgeCoordinator;
use badgeprint::geometry::PageGeometry;
use badgeprint::ipc;
use badgeprint::markup::BadgeTemplate;
use badgeprint::state_machine::JobId;
use badgeprint::ui::JobProgress;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let mut config = PrintConfig::load().context("loading configuration")?;
    cli.apply_to(&mut config);

    match cli.command {
        Command::Print {
            markup,
            name,
            qr,
            json,
        } => {
            let markup = match markup {
                Some(path) => read_markup(&path).await?,
                None => badge_markup(&config, name, qr),
            };
            let coordinator = BadgeCoordinator::from_config(&config);
            let reservation = coordinator.reserve(JobId::new())?;

            let (outcome, report) = if json {
                coordinator.run(reservation, markup).await
            } else {
                let progress = JobProgress::start(reservation.id());
                let (outcome, report) = coordinator.run(reservation, markup).await;
                progress.complete(&outcome);
                progress.print_report(&report);
                (outcome, report)
            };

            if json {
                let body = serde_json::json!({ "outcome": outcome, "report": report });
                println!("{}", serde_json::to_string_pretty(&body)?);
            }
            if !outcome.is_printed() {
                std::process::exit(1);
            }
        }
        Command::Serve { name, qr } => {
            let default_markup = badge_markup(&config, name, qr);
            let coordinator = Arc::new(BadgeCoordinator::from_config(&config));
            tracing::info!(work_root = %config.work_root.display(), "serving print requests on stdin");
            let stdin = BufReader::new(tokio::io::stdin());
            ipc::serve(coordinator, default_markup, stdin, tokio::io::stdout())
                .await
                .context("print request channel failed")?;
        }
        Command::Config => {
            let rendered = toml::to_string_pretty(&config).context("serializing configuration")?;
            print!("{rendered}");
        }
    }

    Ok(())
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn badge_markup(config: &PrintConfig, name: String, qr: String) -> String {
    BadgeTemplate::new(name, qr).to_html(&PageGeometry::badge(), config.qr_image_url.as_deref())
}

async fn read_markup(path: &Path) -> Result<String> {
    tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("failed to read markup from {}", path.display()))
}
