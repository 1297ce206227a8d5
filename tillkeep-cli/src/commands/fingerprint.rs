//! `tillkeep fingerprint`
//!
//! Prints the canonical form of a JSON document, its SHA-256 fingerprint and
//! optionally an id derived from it.

use crate::error::CliResult;
use serde::Serialize;
use serde_json::Value;
use tillkeep_idempotency::{canonical_json, derive_id, hash};

#[derive(Debug, Serialize)]
pub struct FingerprintOutput {
    pub canonical: String,
    pub hash: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
}

pub fn execute(input: &str, prefix: Option<&str>) -> CliResult<FingerprintOutput> {
    let value: Value = serde_json::from_str(input)?;
    let canonical = canonical_json(&value);
    let digest = hash(&canonical);
    let id = prefix.map(|p| derive_id(p, &digest));

    Ok(FingerprintOutput {
        canonical,
        hash: digest,
        id,
    })
}
