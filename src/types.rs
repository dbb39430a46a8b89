use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::constants::PROCESSING_SCRIPT_REPO;

/// Read-only metadata fixed once per processing run, injected by the caller.
#[derive(Debug, Clone)]
pub struct RunMetadata {
    /// URL of the snapshot archive the input rows came from.
    pub origin_url: String,
    /// When that archive was downloaded.
    pub downloaded_at: DateTime<Utc>,
    /// Revision of the processing script, when known.
    pub revision: Option<String>,
}

impl RunMetadata {
    /// Reference to the processing script cited in each provenance source.
    /// Without a revision the reference degrades to the bare repository URL.
    pub fn processing_script(&self) -> String {
        match &self.revision {
            Some(revision) => format!("{}/tree/{}/scraper.rb", PROCESSING_SCRIPT_REPO, revision),
            None => PROCESSING_SCRIPT_REPO.to_string(),
        }
    }
}

/// One named component of a resolved address, with the source URL the
/// service reported for it, when any.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddressPart {
    pub name: String,
    pub url: Option<String>,
}

/// Structured address from the resolution service, validated at the resolver
/// boundary: street, town and PAON are always present here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedAddress {
    pub saon: Option<String>,
    pub paon: String,
    pub street: AddressPart,
    pub locality: Option<AddressPart>,
    pub town: AddressPart,
    pub postcode: Option<AddressPart>,
}

/// The externally emitted unit: one JSON object per resolved row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputRecord {
    pub saon: Option<String>,
    pub paon: String,
    pub street: String,
    pub locality: Option<String>,
    pub town: String,
    pub postcode: Option<String>,
    pub valid_at: Option<NaiveDate>,
    pub provenance: Provenance,
}

impl OutputRecord {
    pub fn new(
        resolved: ResolvedAddress,
        valid_at: Option<NaiveDate>,
        provenance: Provenance,
    ) -> Self {
        Self {
            saon: resolved.saon,
            paon: resolved.paon,
            street: resolved.street.name,
            locality: resolved.locality.map(|part| part.name),
            town: resolved.town.name,
            postcode: resolved.postcode.map(|part| part.name),
            valid_at,
            provenance,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Provenance {
    pub activity: Activity,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Activity {
    pub executed_at: DateTime<Utc>,
    pub processing_scripts: String,
    pub derived_from: Vec<Source>,
}

/// A single citation in the provenance trail.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Source {
    #[serde(rename = "type")]
    pub source_type: String,
    pub urls: Vec<String>,
    pub downloaded_at: DateTime<Utc>,
    pub processing_script: String,
}
