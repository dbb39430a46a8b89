use chrono::{DateTime, Utc};
use scraper::{Html, Selector};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::constants::ROOT_DOMAIN;
use crate::error::{Result, ScraperError};

/// Where a downloaded snapshot archive landed, and how to cite it when
/// running the pipeline over its contents.
#[derive(Debug, Clone)]
pub struct FetchedArchive {
    pub origin_url: String,
    pub downloaded_at: DateTime<Utc>,
    pub path: PathBuf,
}

/// Discover the nth snapshot archive on the Companies House download index
/// and save it under `output_dir`.
///
/// The archive is a zip; extraction is left to the operator, and the
/// pipeline consumes the extracted CSV.
pub async fn fetch_archive(index: usize, output_dir: &Path) -> Result<FetchedArchive> {
    let client = reqwest::Client::new();

    let index_url = format!("{}/en_output.html", ROOT_DOMAIN);
    info!("Fetching download index from {}", index_url);
    let body = client
        .get(&index_url)
        .send()
        .await?
        .error_for_status()?
        .text()
        .await?;

    let links = extract_archive_links(&body);
    let filename = links.get(index).cloned().ok_or_else(|| ScraperError::Api {
        message: format!(
            "no archive link at index {} ({} links on the page)",
            index,
            links.len()
        ),
    })?;

    let origin_url = format!("{}/{}", ROOT_DOMAIN, filename);
    info!("Downloading {}", filename);
    let bytes = client
        .get(&origin_url)
        .send()
        .await?
        .error_for_status()?
        .bytes()
        .await?;
    let downloaded_at = Utc::now();

    fs::create_dir_all(output_dir)?;
    let path = output_dir.join(&filename);
    fs::write(&path, &bytes)?;
    info!("Saved {} bytes to {}", bytes.len(), path.display());

    Ok(FetchedArchive {
        origin_url,
        downloaded_at,
        path,
    })
}

/// Pull the archive links out of the index page, in page order.
fn extract_archive_links(html: &str) -> Vec<String> {
    let document = Html::parse_document(html);
    let selector = Selector::parse("ul li a").unwrap();
    document
        .select(&selector)
        .filter_map(|anchor| anchor.value().attr("href"))
        .filter(|href| href.ends_with(".zip"))
        .map(str::to_string)
        .collect()
}
