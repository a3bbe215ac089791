//! The per-resource mapping contract.
//!
//! Every resource kind implements [`ResourceMapper`] on a zero-sized type. Mappers are
//! stateless: all operations are associated functions and can be called from any
//! number of threads.

use crate::bundle::{self, Bundle};
use crate::query::{QueryParams, QueryParamsBuilder};
use crate::{FhirError, FhirResult};
use medrec_types::{ListRequest, SearchResult, SortDirection};
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Whether a wire resource is being built for a create or an update request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WriteMode {
    /// The server assigns the id, so `id` is omitted.
    Create,
    /// `id` is carried over from the record.
    Update,
}

impl WriteMode {
    /// The id to put on the wire for this mode.
    pub fn id(self, record_id: Option<&str>) -> Option<String> {
        match self {
            WriteMode::Create => None,
            WriteMode::Update => record_id.map(str::to_string),
        }
    }
}

/// Access to the fields every wire resource carries.
pub trait WireResource {
    fn resource_type(&self) -> &str;
    fn id(&self) -> Option<&str>;
}

/// Implements [`WireResource`] for wire structs with `resource_type` and `id` fields.
macro_rules! wire_resource {
    ($($wire:ty),+ $(,)?) => {
        $(
            impl $crate::mapper::WireResource for $wire {
                fn resource_type(&self) -> &str {
                    &self.resource_type
                }

                fn id(&self) -> Option<&str> {
                    self.id.as_deref()
                }
            }
        )+
    };
}
pub(crate) use wire_resource;

pub trait ResourceMapper {
    /// FHIR `resourceType` handled by this mapper.
    const RESOURCE_TYPE: &'static str;

    /// UI field name to server sort parameter name.
    const SORT_FIELDS: &'static [(&'static str, &'static str)];

    type Wire: Serialize + DeserializeOwned + WireResource;
    type Record: Clone + Default;
    type Filters: Default;

    /// Total conversion from wire shape to record. Absent data degrades to empty values.
    fn from_fhir(wire: &Self::Wire) -> Self::Record;

    /// Build the wire shape. Optional nested structures are only emitted when set.
    fn to_fhir(record: &Self::Record, mode: WriteMode) -> Self::Wire;

    /// Translate the structured filters (and `search`) into search parameters.
    fn map_filters(request: &ListRequest<Self::Filters>) -> QueryParams;

    /// Messages for missing required fields. Empty means valid.
    fn validate(record: &Self::Record) -> Vec<String>;

    /// Translate UI sort fields into server sort parameters.
    ///
    /// Unmapped names pass through. `Desc` is encoded as a `-` prefix and missing
    /// directions default to ascending.
    fn map_sort_fields<S: AsRef<str>>(fields: &[S], directions: &[SortDirection]) -> Vec<String> {
        fields
            .iter()
            .enumerate()
            .map(|(i, field)| {
                let field = field.as_ref();
                let name = Self::SORT_FIELDS
                    .iter()
                    .find(|(ui, _)| *ui == field)
                    .map_or(field, |(_, server)| *server);
                match directions.get(i).copied().unwrap_or_default() {
                    SortDirection::Asc => name.to_string(),
                    SortDirection::Desc => format!("-{name}"),
                }
            })
            .collect()
    }

    /// Full search parameters: filters plus `_count`, `_offset` and `_sort`.
    fn search_params(request: &ListRequest<Self::Filters>) -> QueryParams {
        let sort = Self::map_sort_fields(&request.sort_fields, &request.sort_directions);
        let sort = (!sort.is_empty()).then(|| sort.join(","));

        let mut params = Self::map_filters(request);
        params.extend(
            QueryParamsBuilder::new()
                .put_display("_count", request.page_size)
                .put_display("_offset", request.offset())
                .put("_sort", sort.as_deref())
                .build(),
        );
        params
    }

    /// Parse wire JSON text into a record.
    ///
    /// # Errors
    ///
    /// Returns [`FhirError::Translation`] (with the failing field path) when the JSON does
    /// not match the wire schema, and [`FhirError::InvalidInput`] when `resourceType`
    /// is not [`Self::RESOURCE_TYPE`].
    fn parse(json_text: &str) -> FhirResult<Self::Record> {
        let mut deserializer = serde_json::Deserializer::from_str(json_text);
        let wire = decode::<_, Self::Wire>(&mut deserializer, Self::RESOURCE_TYPE)?;
        Self::checked_from_fhir(&wire)
    }

    /// Like [`ResourceMapper::parse`], for an already-decoded JSON value.
    fn from_value(value: serde_json::Value) -> FhirResult<Self::Record> {
        let wire = decode::<_, Self::Wire>(value, Self::RESOURCE_TYPE)?;
        Self::checked_from_fhir(&wire)
    }

    fn checked_from_fhir(wire: &Self::Wire) -> FhirResult<Self::Record> {
        if wire.resource_type() != Self::RESOURCE_TYPE {
            return Err(FhirError::InvalidInput(format!(
                "Expected resourceType '{}', got '{}'",
                Self::RESOURCE_TYPE,
                wire.resource_type()
            )));
        }
        Ok(Self::from_fhir(wire))
    }

    fn to_value(record: &Self::Record, mode: WriteMode) -> FhirResult<serde_json::Value> {
        serde_json::to_value(Self::to_fhir(record, mode)).map_err(|e| {
            FhirError::Translation(format!(
                "Failed to serialise {}: {e}",
                Self::RESOURCE_TYPE
            ))
        })
    }

    /// Render a record as wire JSON text.
    fn render(record: &Self::Record, mode: WriteMode) -> FhirResult<String> {
        serde_json::to_string(&Self::to_fhir(record, mode)).map_err(|e| {
            FhirError::Translation(format!(
                "Failed to serialise {}: {e}",
                Self::RESOURCE_TYPE
            ))
        })
    }

    fn from_bundle(bundle: &Bundle) -> SearchResult<Self::Record>
    where
        Self: Sized,
    {
        bundle::from_bundle::<Self>(bundle)
    }
}

fn decode<'de, D, W>(deserializer: D, resource_type: &str) -> FhirResult<W>
where
    D: serde::Deserializer<'de>,
    W: DeserializeOwned,
{
    serde_path_to_error::deserialize::<_, W>(deserializer).map_err(|err| {
        let path = err.path().to_string();
        let source = err.into_inner();
        let path = if path.is_empty() || path == "." {
            "<root>"
        } else {
            path.as_str()
        };
        FhirError::Translation(format!(
            "{resource_type} schema mismatch at {path}: {source}"
        ))
    })
}
