//! FHIR Condition mapping.

use crate::coding::{
    concept_list, extract_coding, extract_first, optional_concept, CodedValue, CodingDefaults,
    CONDITION_CATEGORY, CONDITION_CLINICAL, CONDITION_VERIFICATION, SNOMED,
};
use crate::datatypes::{first_note, non_empty, note_from, Annotation, CodeableConcept, Reference};
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

#[derive(Clone, Debug, Default, PartialEq)]
pub struct ConditionData {
    /// Server-assigned id. `None` until created.
    pub id: Option<String>,

    /// `active`, `recurrence`, `remission`, `resolved`, ...
    pub clinical_status: String,
    /// `unconfirmed`, `provisional`, `confirmed`, `refuted`, ...
    pub verification_status: String,
    /// `problem-list-item` or `encounter-diagnosis`.
    pub category: String,
    /// Subjective severity.
    pub severity: CodedValue,

    /// Condition code (SNOMED CT by default).
    pub code: String,
    /// Display text of `code`.
    pub display: String,
    /// Coding system of `code`.
    pub system: String,

    /// Patient id.
    pub subject: String,
    /// Encounter id.
    pub encounter: Option<String>,
    /// Practitioner id of whoever recorded the entry.
    pub recorder: Option<String>,

    /// Estimated or actual onset.
    pub onset_date_time: String,
    /// When the condition resolved, empty while ongoing.
    pub abatement_date_time: String,
    /// Date first recorded.
    pub recorded_date: String,

    /// First anatomical location.
    pub body_site: CodedValue,
    /// Text of the first note.
    pub note: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ConditionFilters {
    pub patient_id: Option<String>,
    pub clinical_status: Option<String>,
    pub verification_status: Option<String>,
    pub category: Option<String>,
    pub code: Option<String>,
    pub encounter_id: Option<String>,
}

// ============================================================================
// Wire types
// ============================================================================

#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ConditionWire {
    pub resource_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub clinical_status: Option<CodeableConcept>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verification_status: Option<CodeableConcept>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub category: Vec<CodeableConcept>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub severity: Option<CodeableConcept>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<CodeableConcept>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub body_site: Vec<CodeableConcept>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject: Option<Reference>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub encounter: Option<Reference>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub onset_date_time: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub abatement_date_time: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recorded_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recorder: Option<Reference>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub note: Vec<Annotation>,
}

wire_resource!(ConditionWire);

// ============================================================================
// Mapper
// ============================================================================

pub struct ConditionMapper;

impl ResourceMapper for ConditionMapper {
    const RESOURCE_TYPE: &'static str = "Condition";
    const SORT_FIELDS: &'static [(&'static str, &'static str)] = &[
        ("onsetDateTime", "onset-date"),
        ("recordedDate", "recorded-date"),
        ("clinicalStatus", "clinical-status"),
        ("code", "code"),
    ];

    type Wire = ConditionWire;
    type Record = ConditionData;
    type Filters = ConditionFilters;

    fn from_fhir(wire: &ConditionWire) -> ConditionData {
        let snomed = CodingDefaults::system(SNOMED);
        let code = extract_coding(wire.code.as_ref(), snomed);
        let status_code = |concept: Option<&CodeableConcept>, system| {
            extract_coding(concept, CodingDefaults::system(system)).code
        };

        ConditionData {
            id: wire.id.clone(),
            clinical_status: status_code(wire.clinical_status.as_ref(), CONDITION_CLINICAL),
            verification_status: status_code(
                wire.verification_status.as_ref(),
                CONDITION_VERIFICATION,
            ),
            category: extract_first(&wire.category, CodingDefaults::system(CONDITION_CATEGORY))
                .code,
            severity: extract_coding(wire.severity.as_ref(), snomed),
            code: code.code,
            display: code.display,
            system: code.system,
            subject: reference_id(wire.subject.as_ref(), PATIENT),
            encounter: optional_reference_id(wire.encounter.as_ref(), ENCOUNTER),
            recorder: optional_reference_id(wire.recorder.as_ref(), PRACTITIONER),
            onset_date_time: wire.onset_date_time.clone().unwrap_or_default(),
            abatement_date_time: wire.abatement_date_time.clone().unwrap_or_default(),
            recorded_date: wire.recorded_date.clone().unwrap_or_default(),
            body_site: extract_first(&wire.body_site, snomed),
            note: first_note(&wire.note),
        }
    }

    fn to_fhir(record: &ConditionData, mode: WriteMode) -> ConditionWire {
        let status = |system: &str, code: &str| optional_concept(&CodedValue::new(system, code, ""));

        ConditionWire {
            resource_type: Self::RESOURCE_TYPE.to_string(),
            id: mode.id(record.id.as_deref()),
            clinical_status: status(CONDITION_CLINICAL, &record.clinical_status),
            verification_status: status(CONDITION_VERIFICATION, &record.verification_status),
            category: concept_list(&CodedValue::new(CONDITION_CATEGORY, &record.category, "")),
            severity: optional_concept(&record.severity),
            code: optional_concept(&CodedValue::new(
                &record.system,
                &record.code,
                &record.display,
            )),
            body_site: concept_list(&record.body_site),
            subject: Some(to_reference(PATIENT, &record.subject)),
            encounter: optional_reference(ENCOUNTER, record.encounter.as_deref()),
            onset_date_time: non_empty(&record.onset_date_time),
            abatement_date_time: non_empty(&record.abatement_date_time),
            recorded_date: non_empty(&record.recorded_date),
            recorder: optional_reference(PRACTITIONER, record.recorder.as_deref()),
            note: note_from(&record.note),
        }
    }

    fn map_filters(request: &ListRequest<ConditionFilters>) -> QueryParams {
        let f = &request.filters;
        QueryParamsBuilder::new()
            .put("patient", f.patient_id.as_deref())
            .put("clinical-status", f.clinical_status.as_deref())
            .put("verification-status", f.verification_status.as_deref())
            .put("category", f.category.as_deref())
            .put("code", f.code.as_deref())
            .put("encounter", f.encounter_id.as_deref())
            .put("code:text", request.search.as_deref())
            .build()
    }

    fn validate(record: &ConditionData) -> Vec<String> {
        Validator::new()
            .require(&record.clinical_status, "Clinical status")
            .require(&record.code, "Code")
            .require(&record.subject, "Subject")
            .finish()
    }
}
