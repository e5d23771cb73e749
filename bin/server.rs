// Earnings Dashboard - Web Server
// JSON API + static page over the same render pass as the TUI

use anyhow::{Context, Result};
use clap::Parser;
use earnings_dashboard::{api, Config, DashboardService, SourceConfig};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "earnings-server")]
#[command(about = "Web dashboard for semi-monthly earnings")]
#[command(version)]
struct Args {
    /// Config file (TOML)
    #[arg(short, long, env = "EARNINGS_CONFIG")]
    config: Option<PathBuf>,

    /// Read rows from this CSV export instead of the configured source
    #[arg(long)]
    csv: Option<PathBuf>,

    /// Address to listen on (overrides [server].bind_addr)
    #[arg(short, long, env = "EARNINGS_BIND_ADDR")]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "earnings_dashboard=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    let mut config =
        Config::discover(args.config.as_deref()).context("Failed to load configuration")?;
    if let Some(path) = args.csv {
        config.source = SourceConfig::Csv { path };
    }
    let addr = args.bind.unwrap_or_else(|| config.server.bind_addr.clone());

    let service = DashboardService::from_config(&config).context("Invalid configuration")?;
    let app = api::router(Arc::new(service));

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    info!("🚀 Server running on http://{}", addr);
    info!("   API: http://{}/api/dashboard", addr);

    axum::serve(listener, app).await.context("Server error")?;
    Ok(())
}
