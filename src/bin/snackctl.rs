use anyhow::Context;
use chrono::{Datelike, Utc};
use clap::{Parser, Subcommand};

use snackhub_api::services::budget_service::BudgetService;

#[derive(Parser)]
#[command(name = "snackctl", about = "Snackhub operations CLI")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Seed monthly budgets from each company's criteria template.
    ///
    /// This is the external-scheduler entry point; it runs with no tenant
    /// context on purpose, operating across all companies at once.
    SeedBudgets {
        /// Target year (defaults to the current year)
        #[arg(long)]
        year: Option<i32>,
        /// Target month 1-12 (defaults to the current month)
        #[arg(long)]
        month: Option<i32>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::SeedBudgets { year, month } => {
            let now = Utc::now();
            let year = year.unwrap_or(now.year());
            let month = month.unwrap_or(now.month() as i32);
            anyhow::ensure!((1..=12).contains(&month), "month must be 1-12");

            let budgets = BudgetService::new()
                .await
                .context("failed to reach database")?;
            let seeded = budgets
                .seed_monthly(year, month)
                .await
                .context("seeding failed")?;
            println!("seeded {} companies for {}-{:02}", seeded, year, month);
        }
    }

    Ok(())
}
