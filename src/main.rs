use anyhow::{Context, Result};
use dotenvy::dotenv;
use siamlacorns::catalog::{apply_local_filters, Catalog, CatalogFilters};
use siamlacorns::{ClientConfig, FileTokenStore, HttpLacornApi, Session};
use std::env;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();
}

fn parse_filters(args: impl IntoIterator<Item = String>) -> Result<CatalogFilters> {
    let mut filters = CatalogFilters::default();
    let mut args = args.into_iter();
    while let Some(flag) = args.next() {
        let slot = match flag.as_str() {
            "--genre" => &mut filters.genre,
            "--year" => &mut filters.year,
            "--status" => &mut filters.status,
            "--voice" => &mut filters.voice_track,
            "--title" => &mut filters.title_query,
            other => anyhow::bail!("Unknown argument: {}", other),
        };
        let value = args
            .next()
            .with_context(|| format!("Missing value for {flag}"))?;
        *slot = Some(value);
    }
    Ok(filters)
}

#[tokio::main]
async fn main() -> Result<()> {
    match dotenv() {
        Ok(path) => info!("Loaded environment from {:?}", path),
        Err(e) => warn!("No .env file loaded ({}) - relying on environment", e),
    }
    init_tracing();

    let filters = parse_filters(env::args().skip(1))?;
    let config = ClientConfig::from_env()?;
    info!("Using API at {}", config.api_base);

    let api = HttpLacornApi::from_config(&config)?;
    let store = FileTokenStore::new(config.token_path.clone());
    let session = Arc::new(Session::new(Arc::new(api), Arc::new(store)));
    match session.restore_session().await {
        Some(identity) => info!("Browsing as {}", identity.username),
        None => info!("Browsing anonymously"),
    }

    let page = Catalog::new(session.clone())
        .load_catalog(0, config.page_size)
        .await
        .context("Failed to load catalog")?;
    let shown = apply_local_filters(&page.content, &filters);
    info!(
        "Showing {} of {} series on page 1/{}",
        shown.len(),
        page.content.len(),
        page.total_pages.max(1)
    );
    for series in shown {
        let year = series
            .release_year
            .map(|y| y.to_string())
            .unwrap_or_else(|| "-".to_string());
        println!("{:>6}  {}  ({}, {})", series.id, series.title, year, series.status.as_str());
    }
    Ok(())
}
