use anyhow::Result;
use clap::{Parser, Subcommand};
use shared::domain::UserId;
use storage::Storage;

#[derive(Parser, Debug)]
#[command(about = "Local-store maintenance for the news reader")]
struct Cli {
    #[arg(long, default_value = "sqlite://./data/reader.db")]
    database_url: String,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the stored preferences.
    ShowPrefs,
    /// Print a user's action counters.
    ShowAnalytics { user_id: String },
    /// Delete a user's action counters.
    ClearAnalytics { user_id: String },
    /// Seed one action count (for testing notification digests).
    LogAction { user_id: String, action: String },
    /// Verify the database opens and answers.
    HealthCheck,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let storage = Storage::new(&cli.database_url).await?;

    match cli.command {
        Command::ShowPrefs => {
            let prefs = storage.preferences().await?;
            println!("dark_theme={}", prefs.dark_theme);
            println!("reading_seconds_total={}", prefs.reading_seconds_total);
            println!("notif_breaking={}", prefs.notif_breaking);
            println!("notif_daily={}", prefs.notif_daily);
        }
        Command::ShowAnalytics { user_id } => {
            let summary = storage.analytics_summary(&UserId(user_id)).await?;
            if summary.is_empty() {
                println!("no recorded actions");
            }
            for (action, count) in summary {
                println!("{action}={count}");
            }
        }
        Command::ClearAnalytics { user_id } => {
            let removed = storage.clear_analytics(&UserId(user_id)).await?;
            println!("removed {removed} counters");
        }
        Command::LogAction { user_id, action } => {
            let count = storage.log_action(&UserId(user_id), &action).await?;
            println!("{action}={count}");
        }
        Command::HealthCheck => {
            storage.health_check().await?;
            println!("ok");
        }
    }

    Ok(())
}
