//! FHIR resource mapping layer.
//!
//! This crate translates between FHIR R4 resources as exchanged with a FHIR REST server
//! (the *wire* shape) and flat, form- and table-friendly records:
//! - a reference codec for `"ResourceType/id"` references
//! - a coded-value codec for `CodeableConcept`/`Coding`
//! - one [`ResourceMapper`] per resource kind
//! - search bundle assembly, vital-sign grouping and pre-submission validation
//!
//! Reads are total: a missing or partial field degrades to an empty value, never an error.
//! Writes omit anything that is not set. No HTTP is performed here.

pub mod bundle;
pub mod coding;
pub mod datatypes;
pub mod mapper;
pub mod query;
pub mod reference;
pub mod resources;
pub mod validation;
pub mod vitals;

// Re-export facades
pub use bundle::{from_bundle, Bundle};
pub use coding::{build_codeable_concept, extract_coding, CodedValue, CodingDefaults};
pub use mapper::{ResourceMapper, WireResource, WriteMode};
pub use query::{QueryParams, QueryParamsBuilder};
pub use reference::{build_reference, parse_reference};
pub use validation::Validator;
pub use vitals::{blood_pressure, group_by_vital_code, BloodPressure, VitalKey, VitalSigns};

// Re-export resource mappers and their records
pub use resources::allergy_intolerance::{AllergyIntoleranceData, AllergyIntoleranceMapper};
pub use resources::appointment::{AppointmentData, AppointmentMapper};
pub use resources::condition::{ConditionData, ConditionMapper};
pub use resources::encounter::{EncounterData, EncounterMapper};
pub use resources::flag::{FlagData, FlagMapper};
pub use resources::list::{ListData, ListEntryData, ListMapper};
pub use resources::location::{LocationData, LocationMapper};
pub use resources::medication::{MedicationData, MedicationMapper};
pub use resources::medication_request::{MedicationRequestData, MedicationRequestMapper};
pub use resources::observation::{ObservationComponentData, ObservationData, ObservationMapper};
pub use resources::practitioner::{PractitionerData, PractitionerMapper};
pub use resources::procedure::{ProcedureData, ProcedureMapper};

// Re-export shared request/result types
pub use medrec_types::{ListRequest, SearchResult, SortDirection};

/// Errors returned by the `fhir` mapping crate.
#[derive(Debug, thiserror::Error)]
pub enum FhirError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("invalid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error("translation error: {0}")]
    Translation(String),
}

/// Type alias for Results that can fail with a [`FhirError`].
pub type FhirResult<T> = Result<T, FhirError>;
