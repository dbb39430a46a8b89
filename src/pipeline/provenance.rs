use chrono::Utc;

use crate::constants::PROCESSING_SCRIPT_REPO;
use crate::types::{Activity, AddressPart, Provenance, ResolvedAddress, RunMetadata, Source};

/// Assemble the provenance trail for one resolved address.
///
/// The first source always cites the snapshot archive the row came from,
/// stamped with the run's download time. One further source is appended for
/// each address part the service reported a field-level URL for, stamped at
/// build time.
pub fn build_provenance(resolved: &ResolvedAddress, run: &RunMetadata) -> Provenance {
    let processing_script = run.processing_script();

    let mut derived_from = vec![Source {
        source_type: "Source".to_string(),
        urls: vec![run.origin_url.clone()],
        downloaded_at: run.downloaded_at,
        processing_script: processing_script.clone(),
    }];

    let parts: [Option<&AddressPart>; 4] = [
        Some(&resolved.street),
        resolved.locality.as_ref(),
        Some(&resolved.town),
        resolved.postcode.as_ref(),
    ];
    for part in parts.into_iter().flatten() {
        if let Some(url) = &part.url {
            derived_from.push(Source {
                source_type: "Source".to_string(),
                urls: vec![url.clone()],
                downloaded_at: Utc::now(),
                processing_script: processing_script.clone(),
            });
        }
    }

    Provenance {
        activity: Activity {
            executed_at: Utc::now(),
            processing_scripts: PROCESSING_SCRIPT_REPO.to_string(),
            derived_from,
        },
    }
}
