// Only compile UI module when TUI feature is enabled
#[cfg(feature = "tui")]
mod ui;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use earnings_dashboard::{
    Config, DashboardService, DashboardView, DisplayTable, SourceConfig, YearMonth,
};

/// Semi-monthly earnings from the visit spreadsheet
#[derive(Parser, Debug)]
#[command(name = "earnings-dashboard")]
#[command(version)]
struct Args {
    /// Config file (TOML)
    #[arg(short, long, env = "EARNINGS_CONFIG")]
    config: Option<PathBuf>,

    /// Read rows from this CSV export instead of the configured source
    #[arg(long)]
    csv: Option<PathBuf>,

    /// Column that drives period assignment ("Date seen" or "Timestamp")
    #[arg(long)]
    date_field: Option<String>,

    /// Month to show: YYYY-MM or "January 2024"
    #[arg(short, long)]
    month: Option<YearMonth>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Interactive terminal dashboard (default)
    Tui,
    /// Print the dashboard once as plain text
    Report,
}

fn main() -> Result<()> {
    let args = Args::parse();
    let interactive = matches!(args.command, None | Some(Command::Tui));
    init_tracing(interactive);

    let mut config =
        Config::discover(args.config.as_deref()).context("Failed to load configuration")?;
    if let Some(path) = &args.csv {
        config.source = SourceConfig::Csv { path: path.clone() };
    }
    if let Some(field) = &args.date_field {
        config.columns.date = field.clone();
    }

    let service = DashboardService::from_config(&config).context("Invalid configuration")?;

    if interactive {
        run_ui_mode(&service, args.month)
    } else {
        run_report(&service, args.month)
    }
}

/// Logs would corrupt the alternate screen, so the TUI only logs when
/// RUST_LOG asks for it.
fn init_tracing(interactive: bool) {
    if interactive && std::env::var_os("RUST_LOG").is_none() {
        return;
    }
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "earnings_dashboard=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn run_report(service: &DashboardService, month: Option<YearMonth>) -> Result<()> {
    let view = service.render(month).context("Failed to load data")?;
    print!("{}", format_report(&view, service.date_column()));
    Ok(())
}

fn format_report(view: &DashboardView, date_column: &str) -> String {
    let mut out = String::new();
    out.push_str("📊 Live EMG Earnings\n");
    out.push_str("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━\n");

    if let Some(warning) = view.rejection_warning(date_column) {
        out.push_str(&format!("⚠️  {}\n", warning));
    }

    if !view.is_ready() {
        out.push_str(&format!("{}\n", view.status.message()));
        return out;
    }

    if let Some(month) = &view.selected_month {
        out.push_str(&format!("\n📅 {}\n\n", month.label));
    }
    for metric in &view.metrics {
        out.push_str(&format!(
            "  {:<12} {:>14}   {}\n",
            metric.label, metric.value, metric.detail
        ));
    }
    out.push('\n');
    out.push_str(&format_table(&view.table));

    let others: Vec<&str> = view
        .available_months
        .iter()
        .filter(|m| Some(&m.key) != view.selected_month.as_ref().map(|s| &s.key))
        .map(|m| m.label.as_str())
        .collect();
    if !others.is_empty() {
        out.push_str(&format!("\nOther months: {}\n", others.join(", ")));
    }
    out
}

fn format_table(table: &DisplayTable) -> String {
    let widths: Vec<usize> = table
        .columns
        .iter()
        .enumerate()
        .map(|(i, h)| {
            table
                .rows
                .iter()
                .map(|r| r.get(i).map(|v| v.chars().count()).unwrap_or(0))
                .chain(std::iter::once(h.chars().count()))
                .max()
                .unwrap_or(0)
        })
        .collect();

    let line = |cells: &[String]| -> String {
        cells
            .iter()
            .zip(&widths)
            .map(|(c, w)| format!("{:<width$}", c, width = *w))
            .collect::<Vec<_>>()
            .join("  ")
            .trim_end()
            .to_string()
    };

    let mut out = String::new();
    out.push_str(&line(&table.columns));
    out.push('\n');
    for row in &table.rows {
        out.push_str(&line(row));
        out.push('\n');
    }
    out
}

#[cfg(feature = "tui")]
fn run_ui_mode(service: &DashboardService, month: Option<YearMonth>) -> Result<()> {
    let mut app = ui::App::new(service, month);
    ui::run_ui(&mut app)?;
    Ok(())
}

#[cfg(not(feature = "tui"))]
fn run_ui_mode(_service: &DashboardService, _month: Option<YearMonth>) -> Result<()> {
    eprintln!("❌ TUI mode not available!");
    eprintln!("   Rebuild with: cargo build --features tui");
    eprintln!("   Or print once: earnings-dashboard report");
    std::process::exit(1);
}
