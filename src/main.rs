use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use listing_harvester::artifact::CsvArtifactWriter;
use listing_harvester::browser::HttpBrowser;
use listing_harvester::config::load_config;
use listing_harvester::scrapers::SiteProfile;
use listing_harvester::{JobStatus, ListingHarvester, Platform};

#[derive(Debug, Parser)]
#[command(name = "listing-harvester")]
#[command(about = "Scrape paginated product search results into a CSV file")]
struct Cli {
    /// Search results URL to start from
    #[arg(required_unless_present = "query", conflicts_with = "query")]
    url: Option<String>,

    /// Search term; the start URL is built from the platform's search pattern
    #[arg(long)]
    query: Option<String>,

    /// Maximum number of result pages to scrape
    #[arg(long, default_value_t = 1, value_parser = clap::value_parser!(u32).range(1..))]
    pages: u32,

    #[arg(long, env = "HARVEST_PLATFORM", default_value = "amazon")]
    platform: Platform,

    #[arg(long, env = "HARVEST_OWNER", default_value = "cli")]
    owner: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let config = load_config()?;

    let profile = SiteProfile::for_platform(cli.platform)?;
    let url = match (cli.url, cli.query) {
        (Some(url), _) => url,
        (None, Some(query)) => profile.build_search_url(&query),
        (None, None) => anyhow::bail!("either a URL or --query is required"),
    };

    info!("Starting {} harvest of {} page(s)", profile.name, cli.pages);

    let harvester = ListingHarvester::new(
        Arc::new(HttpBrowser::new(&config.user_agent)?),
        Arc::new(CsvArtifactWriter::new(&config.output_dir)),
        config.timings,
    );

    // Subscribe first so no event for this job is missed.
    let mut events = harvester.subscribe();
    let job_id = harvester.start_job_with_profile(&url, profile, cli.pages, &cli.owner)?;

    loop {
        match events.recv().await {
            Ok(event) if event.job_id == job_id => {
                let snapshot = &event.snapshot;
                info!(
                    "{:?}: {}% (page {}/{}, {} products)",
                    snapshot.status,
                    snapshot.progress,
                    snapshot.current_page,
                    snapshot.total_pages,
                    snapshot.products_scraped
                );
                if snapshot.status.is_terminal() {
                    break;
                }
            }
            Ok(_) => {}
            Err(RecvError::Lagged(skipped)) => {
                warn!("Missed {} progress events", skipped);
                if harvester.snapshot(job_id, &cli.owner)?.status.is_terminal() {
                    break;
                }
            }
            Err(RecvError::Closed) => break,
        }
    }

    let snapshot = harvester.snapshot(job_id, &cli.owner)?;
    println!("{}", serde_json::to_string_pretty(&snapshot)?);

    if snapshot.status == JobStatus::Failed {
        std::process::exit(1);
    }
    Ok(())
}
