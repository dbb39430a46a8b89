use async_trait::async_trait;
use chrono::Utc;
use std::io::Cursor;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use ch_scraper::config::ResolverConfig;
use ch_scraper::error::{Result, ScraperError};
use ch_scraper::pipeline::resolver::{ResolutionService, ServicePart, ServiceResponse};
use ch_scraper::pipeline::Pipeline;
use ch_scraper::types::RunMetadata;

const ORIGIN_URL: &str = "http://download.companieshouse.gov.uk/BasicCompanyData-2015-05-01-part1_5.zip";

/// Deterministic stand-in for the resolution service.
#[derive(Clone)]
struct StubService {
    calls: Arc<AtomicUsize>,
    response: ServiceResponse,
}

impl StubService {
    fn returning(response: ServiceResponse) -> Self {
        Self {
            calls: Arc::new(AtomicUsize::new(0)),
            response,
        }
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ResolutionService for StubService {
    async fn resolve(&self, _address: &str) -> Result<ServiceResponse> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.response.clone())
    }
}

/// Always fails with a transient error; retries would block the test for
/// minutes, so it runs with max_attempts = 1.
struct BrokenService;

#[async_trait]
impl ResolutionService for BrokenService {
    async fn resolve(&self, _address: &str) -> Result<ServiceResponse> {
        Err(ScraperError::Api {
            message: "unexpected status 503 from resolution service".to_string(),
        })
    }
}

fn full_response() -> ServiceResponse {
    ServiceResponse {
        error: None,
        saon: None,
        paon: Some("12".to_string()),
        street: Some(ServicePart {
            name: "High St".to_string(),
            url: Some("http://alpha.openaddressesuk.org/streets/abc".to_string()),
        }),
        locality: None,
        town: Some(ServicePart {
            name: "Springfield".to_string(),
            url: None,
        }),
        postcode: Some(ServicePart {
            name: "AB1 2CD".to_string(),
            url: None,
        }),
    }
}

fn run_metadata() -> RunMetadata {
    RunMetadata {
        origin_url: ORIGIN_URL.to_string(),
        downloaded_at: Utc::now(),
        revision: Some("abc123".to_string()),
    }
}

/// A snapshot row with the given postcode and incorporation date in the
/// columns the pipeline consumes.
fn snapshot_row(name: &str, postcode: &str, incorporation_date: &str) -> String {
    let mut fields = vec![""; 22];
    fields[0] = name;
    fields[4] = "12 High St";
    fields[5] = "";
    fields[6] = "Springfield";
    fields[9] = postcode;
    fields[14] = incorporation_date;
    fields.join(",")
}

fn snapshot_csv(rows: &[String]) -> Vec<u8> {
    let mut csv = String::from("CompanyName,CompanyNumber\n");
    for row in rows {
        csv.push_str(row);
        csv.push('\n');
    }
    csv.into_bytes()
}

async fn run_pipeline<S: ResolutionService>(
    service: S,
    config: &ResolverConfig,
    input: Vec<u8>,
) -> (ch_scraper::pipeline::PipelineResult, Vec<String>) {
    let pipeline = Pipeline::new(service, config, run_metadata());
    let mut output = Vec::new();
    let result = pipeline
        .run(Cursor::new(input), &mut output)
        .await
        .expect("pipeline run failed");
    let text = String::from_utf8(output).expect("output is not UTF-8");
    let lines = text.lines().map(str::to_string).collect();
    (result, lines)
}

#[tokio::test]
async fn rows_without_postcode_never_reach_the_service() {
    let service = StubService::returning(full_response());
    let input = snapshot_csv(&[
        snapshot_row("NO POSTCODE LTD", "", "2015-01-01"),
        snapshot_row("ACME LTD", "AB1 2CD", "2015-01-01"),
    ]);

    let (result, lines) = run_pipeline(service.clone(), &ResolverConfig::default(), input).await;

    assert_eq!(service.calls(), 1);
    assert_eq!(result.total_rows, 2);
    assert_eq!(result.skipped_no_postcode, 1);
    assert_eq!(result.resolved, 1);
    assert_eq!(lines.len(), 1);
}

#[tokio::test]
async fn malformed_lines_are_skipped_and_counted() {
    let service = StubService::returning(full_response());
    let mut input = snapshot_csv(&[snapshot_row("ACME LTD", "AB1 2CD", "2015-01-01")]);
    // Invalid UTF-8 makes strict parsing fail for this line only.
    input.extend_from_slice(&[0xff, 0xfe, b',', b'x', b'\n']);
    input.extend(snapshot_row("OTHER LTD", "EF3 4GH", "2014-06-30").into_bytes());
    input.push(b'\n');

    let (result, lines) = run_pipeline(service, &ResolverConfig::default(), input).await;

    assert_eq!(result.malformed_rows, 1);
    assert_eq!(result.total_rows, 2);
    assert_eq!(result.resolved, 2);
    assert_eq!(lines.len(), 2);
}

#[tokio::test]
async fn response_missing_town_yields_no_output() {
    let mut response = full_response();
    response.town = None;
    let service = StubService::returning(response);
    let input = snapshot_csv(&[snapshot_row("ACME LTD", "AB1 2CD", "2015-01-01")]);

    let (result, lines) = run_pipeline(service.clone(), &ResolverConfig::default(), input).await;

    assert_eq!(service.calls(), 1);
    assert_eq!(result.unresolved, 1);
    assert_eq!(result.resolved, 0);
    assert!(lines.is_empty());
}

#[tokio::test]
async fn exhausted_retries_skip_the_row_without_aborting() {
    let config = ResolverConfig {
        max_attempts: 1,
        ..ResolverConfig::default()
    };
    let input = snapshot_csv(&[
        snapshot_row("ACME LTD", "AB1 2CD", "2015-01-01"),
        snapshot_row("OTHER LTD", "EF3 4GH", "2014-06-30"),
    ]);

    let (result, lines) = run_pipeline(BrokenService, &config, input).await;

    assert_eq!(result.total_rows, 2);
    assert_eq!(result.unresolved, 2);
    assert_eq!(result.resolved, 0);
    assert!(lines.is_empty());
}

#[tokio::test]
async fn round_trip_emits_the_resolved_address_with_provenance() {
    let service = StubService::returning(full_response());
    let input = snapshot_csv(&[snapshot_row("ACME LTD", "AB1 2CD", "2015-01-01")]);

    let (result, lines) = run_pipeline(service, &ResolverConfig::default(), input).await;

    assert_eq!(result.resolved, 1);
    assert_eq!(lines.len(), 1);

    let record: serde_json::Value = serde_json::from_str(&lines[0]).expect("invalid JSON line");
    assert_eq!(record["street"], "High St");
    assert_eq!(record["town"], "Springfield");
    assert_eq!(record["paon"], "12");
    assert_eq!(record["postcode"], "AB1 2CD");
    assert!(record["saon"].is_null());
    assert_eq!(record["valid_at"], "2015-01-01");

    let sources = record["provenance"]["activity"]["derived_from"]
        .as_array()
        .expect("derived_from is not an array");
    assert!(!sources.is_empty());
    assert_eq!(sources[0]["urls"][0], ORIGIN_URL);
    assert_eq!(sources[0]["type"], "Source");
    assert_eq!(
        sources[0]["processing_script"],
        "https://github.com/oa-bots/companies_house/tree/abc123/scraper.rb"
    );
    // The street URL from the stub appears as a field-level source.
    assert_eq!(
        sources[1]["urls"][0],
        "http://alpha.openaddressesuk.org/streets/abc"
    );
}

#[tokio::test]
async fn resolving_the_same_row_twice_is_idempotent_modulo_timestamps() {
    let service = StubService::returning(full_response());
    let input = snapshot_csv(&[snapshot_row("ACME LTD", "AB1 2CD", "2015-01-01")]);

    let (_, first) = run_pipeline(
        service.clone(),
        &ResolverConfig::default(),
        input.clone(),
    )
    .await;
    let (_, second) = run_pipeline(service, &ResolverConfig::default(), input).await;

    let mut first: serde_json::Value = serde_json::from_str(&first[0]).unwrap();
    let mut second: serde_json::Value = serde_json::from_str(&second[0]).unwrap();
    for record in [&mut first, &mut second] {
        let activity = &mut record["provenance"]["activity"];
        activity["executed_at"] = serde_json::Value::Null;
        for source in activity["derived_from"].as_array_mut().unwrap() {
            source["downloaded_at"] = serde_json::Value::Null;
        }
    }
    assert_eq!(first, second);
}
