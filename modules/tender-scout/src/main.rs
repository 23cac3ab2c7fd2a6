use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use tender_common::Config;
use tender_scout::CrawlService;

#[derive(Parser)]
#[command(name = "tender-scout", about = "Crawl public procurement sources for tenders")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run one adapter now
    Run {
        adapter: String,
        /// Keyword to search for (repeatable); defaults by adapter language
        #[arg(short, long = "keyword")]
        keywords: Vec<String>,
    },
    /// Run every enabled adapter in turn
    RunAll {
        #[arg(short, long = "keyword")]
        keywords: Vec<String>,
    },
    /// Register the daily schedules and run until interrupted
    Serve,
    /// Print adapter status as JSON
    Status,
}

fn keywords(keywords: Vec<String>) -> Option<Vec<String>> {
    (!keywords.is_empty()).then_some(keywords)
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("tender_scout=info".parse()?)
                .add_directive("tender_adapters=info".parse()?),
        )
        .init();

    let cli = Cli::parse();

    info!("Tender Scout starting...");

    // Load config
    let config = Config::from_env()?;
    config.log_redacted();

    let service = CrawlService::from_config(&config).await?;

    match cli.command {
        Command::Run { adapter, keywords: kw } => {
            let outcome = service.run_one(&adapter, keywords(kw)).await;
            println!("{}", serde_json::to_string_pretty(&outcome)?);
            if !outcome.success {
                anyhow::bail!("{adapter} run failed");
            }
        }
        Command::RunAll { keywords: kw } => {
            let summary = service.run_all(keywords(kw)).await;
            info!("Crawl run complete. {summary}");
            if !summary.success {
                anyhow::bail!("every adapter failed");
            }
        }
        Command::Serve => {
            service.start().await?;
            for job in service.list_scheduled_jobs().await {
                info!(
                    job_id = job.job_id.as_str(),
                    adapter = job.adapter_id.as_str(),
                    next_run = ?job.next_run_time,
                    "Scheduled"
                );
            }

            tokio::signal::ctrl_c().await?;
            info!("Shutdown requested");
            service.shutdown().await?;
        }
        Command::Status => {
            let status = service.get_status().await;
            println!("{}", serde_json::to_string_pretty(&status)?);
        }
    }

    Ok(())
}
