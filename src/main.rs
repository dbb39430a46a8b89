use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use std::fs::File;
use std::io::{self, BufReader};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{error, info};

use ch_scraper::config::Config;
use ch_scraper::fetch;
use ch_scraper::logging;
use ch_scraper::pipeline::resolver::SortingOfficeClient;
use ch_scraper::pipeline::{Pipeline, PipelineResult};
use ch_scraper::types::RunMetadata;

#[derive(Parser)]
#[command(name = "ch_scraper")]
#[command(about = "Companies House registered address scraper")]
#[command(version = "0.1.0")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Resolve addresses from an extracted snapshot CSV and emit JSON lines
    Run {
        /// Path to the extracted snapshot CSV, or "-" for stdin
        #[arg(long)]
        input: String,
        /// URL of the archive the CSV came from, cited in provenance
        #[arg(long)]
        origin_url: String,
        /// When the archive was downloaded (RFC 3339); defaults to now
        #[arg(long)]
        downloaded_at: Option<DateTime<Utc>>,
        /// Revision of the processing script to cite in provenance
        #[arg(long)]
        revision: Option<String>,
    },
    /// Discover and download a snapshot archive from the download index
    Fetch {
        /// Zero-based position of the archive link on the index page
        #[arg(long, default_value_t = 0)]
        index: usize,
        /// Directory to save the archive into
        #[arg(long, default_value = "output")]
        output_dir: PathBuf,
    },
}

fn print_summary(result: &PipelineResult) {
    eprintln!("\n📊 Pipeline results:");
    eprintln!("   Total rows: {}", result.total_rows);
    eprintln!("   Resolved: {}", result.resolved);
    eprintln!("   Skipped (no postcode): {}", result.skipped_no_postcode);
    eprintln!("   Unresolved: {}", result.unresolved);
    eprintln!("   Malformed lines: {}", result.malformed_rows);
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    logging::init_logging();

    let cli = Cli::parse();
    let config = Config::load()?;

    match cli.command {
        Commands::Run {
            input,
            origin_url,
            downloaded_at,
            revision,
        } => {
            let run_metadata = RunMetadata {
                origin_url,
                downloaded_at: downloaded_at.unwrap_or_else(Utc::now),
                revision,
            };
            let service = SortingOfficeClient::new(
                &config.resolver.endpoint,
                Duration::from_secs(config.resolver.timeout_seconds),
            )?;
            let pipeline = Pipeline::new(service, &config.resolver, run_metadata);

            info!("Parsing {}", input);
            let stdout = io::stdout();
            let result = if input == "-" {
                let stdin = io::stdin();
                pipeline.run(stdin.lock(), stdout.lock()).await
            } else {
                let file = BufReader::new(File::open(&input)?);
                pipeline.run(file, stdout.lock()).await
            };

            match result {
                Ok(result) => print_summary(&result),
                Err(e) => {
                    error!("Pipeline failed: {}", e);
                    return Err(e.into());
                }
            }
        }
        Commands::Fetch { index, output_dir } => {
            let archive = fetch::fetch_archive(index, &output_dir).await?;
            eprintln!("\n📦 Downloaded {}", archive.origin_url);
            eprintln!("   Saved to: {}", archive.path.display());
            eprintln!("   Downloaded at: {}", archive.downloaded_at.to_rfc3339());
            eprintln!("   Extract the CSV, then run:");
            eprintln!(
                "   ch_scraper run --input <csv> --origin-url {} --downloaded-at {}",
                archive.origin_url,
                archive.downloaded_at.to_rfc3339()
            );
        }
    }
    Ok(())
}
