//! FHIR Procedure mapping.

use crate::coding::{
    concept_list, extract_coding, extract_first, optional_concept, CodedValue, CodingDefaults,
    SNOMED,
};
use crate::datatypes::{first_note, non_empty, note_from, Annotation, CodeableConcept, Reference};
use crate::mapper::{wire_resource, ResourceMapper, WriteMode};
use crate::query::{QueryParams, QueryParamsBuilder};
use crate::reference::{
    actor_reference, optional_reference, optional_reference_id, reference_id, to_reference,
    ENCOUNTER, LOCATION, PATIENT, PRACTITIONER,
};
use crate::validation::Validator;
use medrec_types::ListRequest;
use serde::{Deserialize, Serialize};

// ============================================================================
// Public domain-level types
// ============================================================================

#[derive(Clone, Debug, Default, PartialEq)]
pub struct ProcedureData {
    /// Server-assigned id. `None` until created.
    pub id: Option<String>,

    /// `preparation`, `in-progress`, `completed`, ...
    pub status: String,
    /// First category.
    pub category: CodedValue,

    /// Procedure code (SNOMED CT by default).
    pub code: String,
    /// Display text of `code`.
    pub display: String,
    /// Coding system of `code`.
    pub system: String,

    /// Patient id.
    pub subject: String,
    /// Encounter id.
    pub encounter: Option<String>,
    /// `performedDateTime`, ISO 8601.
    pub performed_date_time: String,

    /// Practitioner ids of `performer[].actor`.
    pub performer_ids: Vec<String>,
    /// Location id.
    pub location: Option<String>,

    /// First reason code.
    pub reason: CodedValue,
    /// First body site.
    pub body_site: CodedValue,
    /// Outcome of the procedure.
    pub outcome: CodedValue,
    /// Text of the first note.
    pub note: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ProcedureFilters {
    pub patient_id: Option<String>,
    pub status: Option<String>,
    pub code: Option<String>,
    pub encounter_id: Option<String>,
    pub performer_id: Option<String>,
}

// ============================================================================
// Wire types
// ============================================================================

#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ProcedureWire {
    pub resource_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<CodeableConcept>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<CodeableConcept>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject: Option<Reference>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub encounter: Option<Reference>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub performed_date_time: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub performer: Vec<ProcedurePerformerWire>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<Reference>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub reason_code: Vec<CodeableConcept>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub body_site: Vec<CodeableConcept>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outcome: Option<CodeableConcept>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub note: Vec<Annotation>,
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ProcedurePerformerWire {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub function: Option<CodeableConcept>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub actor: Option<Reference>,
}

wire_resource!(ProcedureWire);

// ============================================================================
// Mapper
// ============================================================================

pub struct ProcedureMapper;

impl ResourceMapper for ProcedureMapper {
    const RESOURCE_TYPE: &'static str = "Procedure";
    const SORT_FIELDS: &'static [(&'static str, &'static str)] = &[
        ("performedDateTime", "date"),
        ("code", "code"),
        ("status", "status"),
    ];

    type Wire = ProcedureWire;
    type Record = ProcedureData;
    type Filters = ProcedureFilters;

    fn from_fhir(wire: &ProcedureWire) -> ProcedureData {
        let snomed = CodingDefaults::system(SNOMED);
        let code = extract_coding(wire.code.as_ref(), snomed);

        ProcedureData {
            id: wire.id.clone(),
            status: wire.status.clone().unwrap_or_default(),
            category: extract_coding(wire.category.as_ref(), snomed),
            code: code.code,
            display: code.display,
            system: code.system,
            subject: reference_id(wire.subject.as_ref(), PATIENT),
            encounter: optional_reference_id(wire.encounter.as_ref(), ENCOUNTER),
            performed_date_time: wire.performed_date_time.clone().unwrap_or_default(),
            performer_ids: wire
                .performer
                .iter()
                .filter_map(|p| optional_reference_id(p.actor.as_ref(), PRACTITIONER))
                .collect(),
            location: optional_reference_id(wire.location.as_ref(), LOCATION),
            reason: extract_first(&wire.reason_code, snomed),
            body_site: extract_first(&wire.body_site, snomed),
            outcome: extract_coding(wire.outcome.as_ref(), snomed),
            note: first_note(&wire.note),
        }
    }

    fn to_fhir(record: &ProcedureData, mode: WriteMode) -> ProcedureWire {
        ProcedureWire {
            resource_type: Self::RESOURCE_TYPE.to_string(),
            id: mode.id(record.id.as_deref()),
            status: non_empty(&record.status),
            category: optional_concept(&record.category),
            code: optional_concept(&CodedValue::new(
                &record.system,
                &record.code,
                &record.display,
            )),
            subject: Some(to_reference(PATIENT, &record.subject)),
            encounter: optional_reference(ENCOUNTER, record.encounter.as_deref()),
            performed_date_time: non_empty(&record.performed_date_time),
            performer: record
                .performer_ids
                .iter()
                .filter_map(|id| actor_reference(PRACTITIONER, id))
                .map(|actor| ProcedurePerformerWire {
                    function: None,
                    actor: Some(actor),
                })
                .collect(),
            location: optional_reference(LOCATION, record.location.as_deref()),
            reason_code: concept_list(&record.reason),
            body_site: concept_list(&record.body_site),
            outcome: optional_concept(&record.outcome),
            note: note_from(&record.note),
        }
    }

    fn map_filters(request: &ListRequest<ProcedureFilters>) -> QueryParams {
        let f = &request.filters;
        QueryParamsBuilder::new()
            .put("patient", f.patient_id.as_deref())
            .put("status", f.status.as_deref())
            .put("code", f.code.as_deref())
            .put("encounter", f.encounter_id.as_deref())
            .put("performer", f.performer_id.as_deref())
            .put("code:text", request.search.as_deref())
            .build()
    }

    fn validate(record: &ProcedureData) -> Vec<String> {
        Validator::new()
            .require(&record.status, "Status")
            .require(&record.code, "Code")
            .require(&record.subject, "Subject")
            .require(&record.performed_date_time, "Performed date")
            .finish()
    }
}
