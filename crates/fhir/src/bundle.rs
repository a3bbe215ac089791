//! Search bundle assembly.
//!
//! Converts a FHIR `searchset` Bundle into a uniform [`SearchResult`], independent of
//! resource kind.

use crate::mapper::ResourceMapper;
use crate::{FhirError, FhirResult};
use medrec_types::SearchResult;
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Bundle {
    pub resource_type: String,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub bundle_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total: Option<u64>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub link: Vec<BundleLink>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub entry: Vec<BundleEntry>,
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
pub struct BundleLink {
    pub relation: String,
    pub url: String,
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
pub struct BundleEntry {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub full_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource: Option<Value>,
}

impl Bundle {
    /// Parse a bundle from JSON text.
    pub fn parse(json_text: &str) -> FhirResult<Self> {
        Self::from_value(serde_json::from_str(json_text)?)
    }

    pub fn from_value(value: Value) -> FhirResult<Self> {
        let bundle: Bundle = serde_json::from_value(value)?;
        if bundle.resource_type != "Bundle" {
            return Err(FhirError::InvalidInput(format!(
                "Expected resourceType 'Bundle', got '{}'",
                bundle.resource_type
            )));
        }
        Ok(bundle)
    }

    /// URL of the `next` page link, if any.
    pub fn next_link(&self) -> Option<&str> {
        self.link
            .iter()
            .find(|l| l.relation == "next")
            .map(|l| l.url.as_str())
    }
}

/// Map every entry of `M`'s resource type through [`ResourceMapper::from_fhir`].
///
/// Entries of another resource type (`_include`d resources, `OperationOutcome`) and
/// entries that do not decode are skipped. `total` falls back to the number of mapped
/// records when the bundle omits it.
pub fn from_bundle<M: ResourceMapper>(bundle: &Bundle) -> SearchResult<M::Record> {
    let entry: Vec<M::Record> = bundle
        .entry
        .iter()
        .filter_map(|e| e.resource.as_ref())
        .filter_map(|resource| {
            let resource_type = resource
                .get("resourceType")
                .and_then(Value::as_str)
                .unwrap_or_default();
            if resource_type != M::RESOURCE_TYPE {
                tracing::debug!(
                    "skipping {} entry in {} search bundle",
                    resource_type,
                    M::RESOURCE_TYPE
                );
                return None;
            }
            match M::Wire::deserialize(resource) {
                Ok(wire) => Some(M::from_fhir(&wire)),
                Err(e) => {
                    tracing::warn!("failed to decode {} entry: {}", M::RESOURCE_TYPE, e);
                    None
                }
            }
        })
        .collect();

    SearchResult {
        total: bundle.total.unwrap_or(entry.len() as u64),
        has_next_page: bundle.next_link().is_some(),
        entry,
    }
}
