//! FHIR Flag mapping.
//!
//! A Flag is a prominent warning attached to a patient record (for example "risk of
//! falls"), raised by a practitioner for a period of time.
//!
//! Responsibilities:
//! - Define the flat [`FlagData`] record used by forms and tables
//! - Define the wire model for serialisation/deserialisation
//! - Translate between the two, and build search parameters for Flag searches

use crate::coding::{
    concept_list, extract_coding, extract_first, optional_concept, CodedValue, CodingDefaults,
    FLAG_CATEGORY, SNOMED,
};
use crate::datatypes::{non_empty, CodeableConcept, Period, Reference};
use crate::mapper::{wire_resource, ResourceMapper, WriteMode};
use crate::query::{QueryParams, QueryParamsBuilder};
use crate::reference::{
    optional_reference, optional_reference_id, reference_id, to_reference, ENCOUNTER, PATIENT,
    PRACTITIONER,
};
use crate::validation::Validator;
use medrec_types::ListRequest;
use serde::{Deserialize, Serialize};

// ============================================================================
// Public domain-level types
// ============================================================================

/// Flat Flag record.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FlagData {
    /// Server-assigned id. `None` until created.
    pub id: Option<String>,

    /// `active`, `inactive` or `entered-in-error`.
    pub status: String,

    /// First `category` coding (defaults to the HL7 flag-category system).
    pub category: CodedValue,

    /// Flag code (SNOMED CT by default).
    pub code: String,
    /// Display text of `code`.
    pub display: String,
    /// Coding system of `code`.
    pub system: String,

    /// Patient id.
    pub subject: String,

    /// Practitioner id.
    pub author: String,

    /// Start of the period the flag applies to.
    pub period_start: String,
    /// End of that period, if known.
    pub period_end: Option<String>,

    /// Encounter id.
    pub encounter: Option<String>,
}

/// Flag search filters.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FlagFilters {
    pub patient_id: Option<String>,
    pub status: Option<String>,
    pub category: Option<String>,
    pub author_id: Option<String>,
    pub encounter_id: Option<String>,
}

// ============================================================================
// Wire types
// ============================================================================

#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
pub struct FlagWire {
    pub resource_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub category: Vec<CodeableConcept>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<CodeableConcept>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject: Option<Reference>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub period: Option<Period>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub encounter: Option<Reference>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<Reference>,
}

wire_resource!(FlagWire);

// ============================================================================
// Mapper
// ============================================================================

pub struct FlagMapper;

impl ResourceMapper for FlagMapper {
    const RESOURCE_TYPE: &'static str = "Flag";
    const SORT_FIELDS: &'static [(&'static str, &'static str)] = &[
        ("periodStart", "date"),
        ("subject", "patient"),
        ("author", "author"),
        ("encounter", "encounter"),
    ];

    type Wire = FlagWire;
    type Record = FlagData;
    type Filters = FlagFilters;

    fn from_fhir(wire: &FlagWire) -> FlagData {
        let code = extract_coding(wire.code.as_ref(), CodingDefaults::system(SNOMED));
        let period = wire.period.as_ref();

        FlagData {
            id: wire.id.clone(),
            status: wire.status.clone().unwrap_or_default(),
            category: extract_first(&wire.category, CodingDefaults::system(FLAG_CATEGORY)),
            code: code.code,
            display: code.display,
            system: code.system,
            subject: reference_id(wire.subject.as_ref(), PATIENT),
            author: reference_id(wire.author.as_ref(), PRACTITIONER),
            period_start: period.and_then(|p| p.start.clone()).unwrap_or_default(),
            period_end: period.and_then(|p| p.end.clone()),
            encounter: optional_reference_id(wire.encounter.as_ref(), ENCOUNTER),
        }
    }

    fn to_fhir(record: &FlagData, mode: WriteMode) -> FlagWire {
        FlagWire {
            resource_type: Self::RESOURCE_TYPE.to_string(),
            id: mode.id(record.id.as_deref()),
            status: non_empty(&record.status),
            category: concept_list(&record.category),
            code: optional_concept(&CodedValue::new(
                &record.system,
                &record.code,
                &record.display,
            )),
            subject: Some(to_reference(PATIENT, &record.subject)),
            period: Period::from_bounds(&record.period_start, record.period_end.as_deref()),
            encounter: optional_reference(ENCOUNTER, record.encounter.as_deref()),
            author: Some(to_reference(PRACTITIONER, &record.author)),
        }
    }

    fn map_filters(request: &ListRequest<FlagFilters>) -> QueryParams {
        let f = &request.filters;
        QueryParamsBuilder::new()
            .put("patient", f.patient_id.as_deref())
            .put("status", f.status.as_deref())
            .put("category", f.category.as_deref())
            .put("author", f.author_id.as_deref())
            .put("encounter", f.encounter_id.as_deref())
            .put("code:text", request.search.as_deref())
            .build()
    }

    fn validate(record: &FlagData) -> Vec<String> {
        Validator::new()
            .require(&record.status, "Status")
            .require(&record.category.code, "Category")
            .require(&record.code, "Code")
            .require(&record.subject, "Subject")
            .require(&record.author, "Author")
            .require(&record.period_start, "Period start")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use medrec_types::SortDirection;

    const SAMPLE: &str = r#"{
      "resourceType": "Flag",
      "id": "flag-1",
      "meta": {"versionId": "3"},
      "status": "active",
      "category": [{
        "coding": [{"system": "http://terminology.hl7.org/CodeSystem/flag-category", "code": "safety", "display": "Safety"}]
      }],
      "code": {
        "coding": [
          {"system": "http://snomed.info/sct", "code": "129839007", "display": "At risk for falls"},
          {"system": "http://example.org/local", "code": "FALLS"}
        ]
      },
      "subject": {"reference": "Patient/p-1"},
      "period": {"start": "2024-03-01", "end": "2024-06-01"},
      "encounter": {"reference": "Encounter/e-9"},
      "author": {"reference": "Practitioner/dr-7", "display": "Dr Who"}
    }"#;

    fn complete() -> FlagData {
        FlagMapper::parse(SAMPLE).expect("parse flag")
    }

    #[test]
    fn parses_all_fields() {
        let flag = complete();
        assert_eq!(flag.id.as_deref(), Some("flag-1"));
        assert_eq!(flag.status, "active");
        assert_eq!(flag.category, CodedValue::new(FLAG_CATEGORY, "safety", "Safety"));
        assert_eq!(flag.code, "129839007");
        assert_eq!(flag.display, "At risk for falls");
        assert_eq!(flag.system, SNOMED);
        assert_eq!(flag.subject, "p-1");
        assert_eq!(flag.author, "dr-7");
        assert_eq!(flag.period_start, "2024-03-01");
        assert_eq!(flag.period_end.as_deref(), Some("2024-06-01"));
        assert_eq!(flag.encounter.as_deref(), Some("e-9"));
    }

    #[test]
    fn tolerates_missing_fields() {
        let flag = FlagMapper::parse(r#"{"resourceType": "Flag"}"#).expect("parse");
        assert_eq!(flag.id, None);
        assert_eq!(flag.status, "");
        assert_eq!(flag.category, CodedValue::new(FLAG_CATEGORY, "", ""));
        assert_eq!(flag.code, "");
        assert_eq!(flag.system, SNOMED);
        assert_eq!(flag.subject, "");
        assert_eq!(flag.period_start, "");
        assert_eq!(flag.period_end, None);
        assert_eq!(flag.encounter, None);
    }

    #[test]
    fn round_trips_single_coding_record() {
        let flag = complete();
        let wire = FlagMapper::to_fhir(&flag, WriteMode::Update);
        assert_eq!(FlagMapper::from_fhir(&wire), flag);
    }

    #[test]
    fn create_omits_id_and_update_keeps_it() {
        let flag = complete();
        let create = FlagMapper::to_value(&flag, WriteMode::Create).expect("to json");
        assert!(create.get("id").is_none());
        assert_eq!(create["resourceType"], "Flag");

        let update = FlagMapper::to_value(&flag, WriteMode::Update).expect("to json");
        assert_eq!(update["id"], "flag-1");
        assert_eq!(update["subject"]["reference"], "Patient/p-1");
        assert_eq!(update["author"]["reference"], "Practitioner/dr-7");
        assert_eq!(update["code"]["coding"].as_array().map(Vec::len), Some(1));
    }

    #[test]
    fn omits_unset_optional_structures() {
        let flag = FlagData {
            period_end: None,
            encounter: None,
            ..complete()
        };
        let json = FlagMapper::to_value(&flag, WriteMode::Create).expect("to json");
        assert!(json.get("encounter").is_none());
        assert!(json["period"].get("end").is_none());
    }

    #[test]
    fn empty_subject_still_builds_reference() {
        let json = FlagMapper::to_value(&FlagData::default(), WriteMode::Create).expect("json");
        assert_eq!(json["subject"]["reference"], "Patient/");
    }

    #[test]
    fn maps_filters() {
        let request = ListRequest::with_filters(FlagFilters {
            patient_id: Some("123".into()),
            status: Some("active".into()),
            ..FlagFilters::default()
        });
        let params = FlagMapper::map_filters(&request);
        assert_eq!(params.len(), 2);
        assert_eq!(params["patient"], "123");
        assert_eq!(params["status"], "active");

        let with_search = request.search("falls");
        assert_eq!(FlagMapper::map_filters(&with_search)["code:text"], "falls");
    }

    #[test]
    fn maps_sort_fields() {
        assert_eq!(
            FlagMapper::map_sort_fields(&["periodStart"], &[SortDirection::Desc]),
            vec!["-date"]
        );
        assert_eq!(
            FlagMapper::map_sort_fields(&["status", "author"], &[SortDirection::Desc]),
            vec!["-status", "author"]
        );
    }

    #[test]
    fn search_params_include_paging_and_sort() {
        let request = ListRequest::with_filters(FlagFilters {
            patient_id: Some("123".into()),
            ..FlagFilters::default()
        })
        .page(2, 25)
        .sort("periodStart", SortDirection::Desc);

        let params = FlagMapper::search_params(&request);
        assert_eq!(params["patient"], "123");
        assert_eq!(params["_count"], "25");
        assert_eq!(params["_offset"], "25");
        assert_eq!(params["_sort"], "-date");
    }

    #[test]
    fn validates_required_fields() {
        let errors = FlagMapper::validate(&FlagData::default());
        assert_eq!(errors.len(), 6);
        assert!(errors.contains(&"Status is required".to_string()));
        assert!(errors.contains(&"Period start is required".to_string()));

        assert!(FlagMapper::validate(&complete()).is_empty());
    }

    #[test]
    fn rejects_other_resource_types() {
        let err = FlagMapper::parse(r#"{"resourceType": "List"}"#).expect_err("wrong type");
        assert!(matches!(err, crate::FhirError::InvalidInput(msg) if msg.contains("Flag")));
    }

    #[test]
    fn reports_path_of_mistyped_field() {
        let err = FlagMapper::parse(r#"{"resourceType": "Flag", "period": {"start": 5}}"#)
            .expect_err("mistyped");
        assert!(
            matches!(err, crate::FhirError::Translation(msg) if msg.contains("period.start"))
        );
    }
}
