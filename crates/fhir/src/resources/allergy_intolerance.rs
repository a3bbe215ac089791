//! FHIR AllergyIntolerance mapping.
//!
//! Unlike most clinical resources the patient is carried in `patient`, not `subject`.

use crate::coding::{
    concept_or_text, extract_coding, extract_first, optional_concept, CodedValue, CodingDefaults,
    ALLERGY_CLINICAL, ALLERGY_VERIFICATION, SNOMED,
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
pub struct AllergyIntoleranceData {
    /// Server-assigned id. `None` until created.
    pub id: Option<String>,

    /// `active`, `inactive` or `resolved`.
    pub clinical_status: String,
    /// `unconfirmed`, `confirmed`, `refuted` or `entered-in-error`.
    pub verification_status: String,
    /// `allergy` or `intolerance`.
    pub allergy_type: String,
    /// `food`, `medication`, `environment`, `biologic`.
    pub categories: Vec<String>,
    /// `low`, `high`, `unable-to-assess`.
    pub criticality: String,

    /// Substance code (SNOMED CT by default).
    pub code: String,
    /// Display text of `code`.
    pub display: String,
    /// Coding system of `code`.
    pub system: String,

    /// Patient id, from `patient` rather than `subject`.
    pub patient: String,
    /// Encounter id.
    pub encounter: Option<String>,
    /// Practitioner id of whoever recorded the entry.
    pub recorder: Option<String>,
    /// When the reaction was first seen.
    pub onset_date_time: String,
    /// Date first recorded.
    pub recorded_date: String,

    /// Reported reactions, in wire order.
    pub reactions: Vec<AllergyReactionData>,
    /// Text of the first note.
    pub note: String,
}

/// One `reaction[]` element, flattened to its first manifestation.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct AllergyReactionData {
    /// Coded manifestation. A free-text manifestation has an empty code and its text
    /// in `display`.
    pub manifestation: CodedValue,
    /// `mild`, `moderate`, `severe`.
    pub severity: String,
    /// Free-text description of the event.
    pub description: String,
}

impl AllergyReactionData {
    /// True when the reaction carries nothing worth sending.
    pub fn is_empty(&self) -> bool {
        self.manifestation.is_empty()
            && self.manifestation.display.trim().is_empty()
            && self.severity.trim().is_empty()
            && self.description.trim().is_empty()
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AllergyIntoleranceFilters {
    pub patient_id: Option<String>,
    pub clinical_status: Option<String>,
    pub category: Option<String>,
    pub criticality: Option<String>,
    pub allergy_type: Option<String>,
}

// ============================================================================
// Wire types
// ============================================================================

#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AllergyIntoleranceWire {
    pub resource_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub clinical_status: Option<CodeableConcept>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verification_status: Option<CodeableConcept>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub allergy_type: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub category: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub criticality: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<CodeableConcept>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub patient: Option<Reference>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub encounter: Option<Reference>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub onset_date_time: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recorded_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recorder: Option<Reference>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub note: Vec<Annotation>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub reaction: Vec<AllergyReactionWire>,
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AllergyReactionWire {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub manifestation: Vec<CodeableConcept>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub severity: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

wire_resource!(AllergyIntoleranceWire);

// ============================================================================
// Mapper
// ============================================================================

pub struct AllergyIntoleranceMapper;

impl ResourceMapper for AllergyIntoleranceMapper {
    const RESOURCE_TYPE: &'static str = "AllergyIntolerance";
    const SORT_FIELDS: &'static [(&'static str, &'static str)] = &[
        ("recordedDate", "date"),
        ("onsetDateTime", "onset"),
        ("criticality", "criticality"),
        ("code", "code"),
    ];

    type Wire = AllergyIntoleranceWire;
    type Record = AllergyIntoleranceData;
    type Filters = AllergyIntoleranceFilters;

    fn from_fhir(wire: &AllergyIntoleranceWire) -> AllergyIntoleranceData {
        let code = extract_coding(wire.code.as_ref(), CodingDefaults::system(SNOMED));

        AllergyIntoleranceData {
            id: wire.id.clone(),
            clinical_status: extract_coding(
                wire.clinical_status.as_ref(),
                CodingDefaults::system(ALLERGY_CLINICAL),
            )
            .code,
            verification_status: extract_coding(
                wire.verification_status.as_ref(),
                CodingDefaults::system(ALLERGY_VERIFICATION),
            )
            .code,
            allergy_type: wire.allergy_type.clone().unwrap_or_default(),
            categories: wire.category.clone(),
            criticality: wire.criticality.clone().unwrap_or_default(),
            code: code.code,
            display: code.display,
            system: code.system,
            patient: reference_id(wire.patient.as_ref(), PATIENT),
            encounter: optional_reference_id(wire.encounter.as_ref(), ENCOUNTER),
            recorder: optional_reference_id(wire.recorder.as_ref(), PRACTITIONER),
            onset_date_time: wire.onset_date_time.clone().unwrap_or_default(),
            recorded_date: wire.recorded_date.clone().unwrap_or_default(),
            reactions: wire.reaction.iter().map(reaction_from_wire).collect(),
            note: first_note(&wire.note),
        }
    }

    fn to_fhir(record: &AllergyIntoleranceData, mode: WriteMode) -> AllergyIntoleranceWire {
        AllergyIntoleranceWire {
            resource_type: Self::RESOURCE_TYPE.to_string(),
            id: mode.id(record.id.as_deref()),
            clinical_status: optional_concept(&CodedValue::new(
                ALLERGY_CLINICAL,
                &record.clinical_status,
                "",
            )),
            verification_status: optional_concept(&CodedValue::new(
                ALLERGY_VERIFICATION,
                &record.verification_status,
                "",
            )),
            allergy_type: non_empty(&record.allergy_type),
            category: record
                .categories
                .iter()
                .filter(|c| !c.trim().is_empty())
                .cloned()
                .collect(),
            criticality: non_empty(&record.criticality),
            code: optional_concept(&CodedValue::new(
                &record.system,
                &record.code,
                &record.display,
            )),
            patient: Some(to_reference(PATIENT, &record.patient)),
            encounter: optional_reference(ENCOUNTER, record.encounter.as_deref()),
            onset_date_time: non_empty(&record.onset_date_time),
            recorded_date: non_empty(&record.recorded_date),
            recorder: optional_reference(PRACTITIONER, record.recorder.as_deref()),
            note: note_from(&record.note),
            reaction: record
                .reactions
                .iter()
                .filter(|r| !r.is_empty())
                .map(reaction_to_wire)
                .collect(),
        }
    }

    fn map_filters(request: &ListRequest<AllergyIntoleranceFilters>) -> QueryParams {
        let f = &request.filters;
        QueryParamsBuilder::new()
            .put("patient", f.patient_id.as_deref())
            .put("clinical-status", f.clinical_status.as_deref())
            .put("category", f.category.as_deref())
            .put("criticality", f.criticality.as_deref())
            .put("type", f.allergy_type.as_deref())
            .put("code:text", request.search.as_deref())
            .build()
    }

    fn validate(record: &AllergyIntoleranceData) -> Vec<String> {
        Validator::new()
            .require(&record.clinical_status, "Clinical status")
            .require(&record.code, "Code")
            .require(&record.patient, "Patient")
            .finish()
    }
}

// ============================================================================
// Helpers
// ============================================================================

fn reaction_from_wire(reaction: &AllergyReactionWire) -> AllergyReactionData {
    AllergyReactionData {
        manifestation: extract_first(&reaction.manifestation, CodingDefaults::system(SNOMED)),
        severity: reaction.severity.clone().unwrap_or_default(),
        description: reaction.description.clone().unwrap_or_default(),
    }
}

fn reaction_to_wire(reaction: &AllergyReactionData) -> AllergyReactionWire {
    AllergyReactionWire {
        manifestation: concept_or_text(&reaction.manifestation)
            .into_iter()
            .collect(),
        severity: non_empty(&reaction.severity),
        description: non_empty(&reaction.description),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use medrec_types::SortDirection;

    const SAMPLE: &str = r#"{
      "resourceType": "AllergyIntolerance",
      "id": "alg-1",
      "clinicalStatus": {"coding": [{"system": "http://terminology.hl7.org/CodeSystem/allergyintolerance-clinical", "code": "active"}]},
      "verificationStatus": {"coding": [{"code": "confirmed"}]},
      "type": "allergy",
      "category": ["medication"],
      "criticality": "high",
      "code": {"coding": [{"system": "http://snomed.info/sct", "code": "764146007", "display": "Penicillin"}]},
      "patient": {"reference": "Patient/p-1"},
      "recordedDate": "2020-02-14",
      "reaction": [
        {"manifestation": [{"coding": [{"system": "http://snomed.info/sct", "code": "247472004", "display": "Hives"}]}], "severity": "moderate"},
        {"manifestation": [{"text": "Wheeze"}], "description": "Reported by parent"}
      ]
    }"#;

    fn sample() -> AllergyIntoleranceData {
        AllergyIntoleranceMapper::parse(SAMPLE).expect("parse allergy")
    }

    #[test]
    fn reads_patient_and_reactions() {
        let allergy = sample();
        assert_eq!(allergy.patient, "p-1");
        assert_eq!(allergy.allergy_type, "allergy");
        assert_eq!(allergy.categories, vec!["medication"]);
        assert_eq!(allergy.verification_status, "confirmed");
        assert_eq!(allergy.reactions.len(), 2);
        assert_eq!(allergy.reactions[0].manifestation.display, "Hives");
        assert_eq!(allergy.reactions[0].severity, "moderate");
        // Text-only manifestation: display from text, no code.
        assert_eq!(allergy.reactions[1].manifestation.display, "Wheeze");
        assert!(allergy.reactions[1].manifestation.is_empty());
    }

    #[test]
    fn writes_patient_not_subject() {
        let json = AllergyIntoleranceMapper::to_value(&sample(), WriteMode::Create).expect("json");
        assert_eq!(json["patient"]["reference"], "Patient/p-1");
        assert!(json.get("subject").is_none());
        assert_eq!(json["type"], "allergy");
        assert_eq!(json["category"][0], "medication");
    }

    #[test]
    fn round_trips() {
        let allergy = sample();
        let wire = AllergyIntoleranceMapper::to_fhir(&allergy, WriteMode::Update);
        assert_eq!(AllergyIntoleranceMapper::from_fhir(&wire), allergy);
    }

    #[test]
    fn keeps_text_only_reactions_on_update() {
        let allergy = AllergyIntoleranceMapper::parse(
            r#"{
              "resourceType": "AllergyIntolerance",
              "id": "alg-2",
              "patient": {"reference": "Patient/p-1"},
              "reaction": [{"manifestation": [{"text": "Wheeze"}], "severity": "severe"}]
            }"#,
        )
        .expect("parse");

        let json = AllergyIntoleranceMapper::to_value(&allergy, WriteMode::Update).expect("json");
        assert_eq!(json["reaction"][0]["manifestation"][0]["text"], "Wheeze");
        assert!(json["reaction"][0]["manifestation"][0].get("coding").is_none());
        assert_eq!(json["reaction"][0]["severity"], "severe");

        let back = AllergyIntoleranceMapper::from_value(json).expect("read back");
        assert_eq!(back.reactions, allergy.reactions);
    }

    #[test]
    fn drops_blank_reactions() {
        let allergy = AllergyIntoleranceData {
            reactions: vec![AllergyReactionData::default()],
            ..sample()
        };
        let wire = AllergyIntoleranceMapper::to_fhir(&allergy, WriteMode::Update);
        assert!(wire.reaction.is_empty());
    }

    #[test]
    fn maps_sort_fields() {
        assert_eq!(
            AllergyIntoleranceMapper::map_sort_fields(
                &["recordedDate", "onsetDateTime", "criticality"],
                &[SortDirection::Desc, SortDirection::Asc]
            ),
            vec!["-date", "onset", "criticality"]
        );
    }

    #[test]
    fn tolerates_missing_fields() {
        let allergy =
            AllergyIntoleranceMapper::parse(r#"{"resourceType": "AllergyIntolerance"}"#)
                .expect("parse");
        assert!(allergy.categories.is_empty());
        assert!(allergy.reactions.is_empty());
        assert_eq!(allergy.patient, "");
    }

    #[test]
    fn validates_required_fields() {
        assert_eq!(
            AllergyIntoleranceMapper::validate(&AllergyIntoleranceData::default()),
            vec![
                "Clinical status is required",
                "Code is required",
                "Patient is required",
            ]
        );
        assert!(AllergyIntoleranceMapper::validate(&sample()).is_empty());
    }

    #[test]
    fn maps_type_filter() {
        let request = ListRequest::with_filters(AllergyIntoleranceFilters {
            allergy_type: Some("intolerance".into()),
            criticality: Some("high".into()),
            ..AllergyIntoleranceFilters::default()
        });
        let params = AllergyIntoleranceMapper::map_filters(&request);
        assert_eq!(params["type"], "intolerance");
        assert_eq!(params["criticality"], "high");
        assert_eq!(params.len(), 2);
    }
}
