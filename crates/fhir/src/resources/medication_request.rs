//! FHIR MedicationRequest mapping.
//!
//! The medication is either coded inline (`medicationCodeableConcept`, RxNorm by default)
//! or a reference to a Medication resource (`medicationReference`). `medication[x]` is a
//! choice type, so a record that carries a reference writes only the reference.
//!
//! Only the first `dosageInstruction` is mapped.

use crate::coding::{
    concept_list, extract_coding, extract_first, optional_concept, CodedValue, CodingDefaults,
    MEDICATION_REQUEST_CATEGORY, ROUTE, RXNORM, SNOMED,
};
use crate::datatypes::{
    first_note, non_empty, note_from, Annotation, CodeableConcept, Quantity, Reference,
};
use crate::mapper::{wire_resource, ResourceMapper, WriteMode};
use crate::query::{QueryParams, QueryParamsBuilder};
use crate::reference::{
    optional_reference, optional_reference_id, reference_id, to_reference, ENCOUNTER,
    MEDICATION, PATIENT, PRACTITIONER,
};
use crate::validation::Validator;
use medrec_types::ListRequest;
use serde::{Deserialize, Serialize};

// ============================================================================
// Public domain-level types
// ============================================================================

#[derive(Clone, Debug, Default, PartialEq)]
pub struct MedicationRequestData {
    /// Server-assigned id. `None` until created.
    pub id: Option<String>,

    /// `active`, `on-hold`, `cancelled`, `completed`, `stopped`, `draft`, ...
    pub status: String,
    /// `proposal`, `plan`, `order`, ...
    pub intent: String,
    /// `routine`, `urgent`, `asap`, `stat`.
    pub priority: String,
    /// Inpatient, outpatient, community or discharge.
    pub category: CodedValue,

    /// Inline medication code (RxNorm by default).
    pub medication_code: String,
    /// Display text of `medication_code`.
    pub medication_display: String,
    /// Coding system of `medication_code`.
    pub medication_system: String,
    /// Medication resource id. Takes precedence over the inline code on write.
    pub medication_reference: Option<String>,

    /// Patient id.
    pub subject: String,
    /// Encounter id.
    pub encounter: Option<String>,
    /// Practitioner id.
    pub requester: Option<String>,
    /// When the request was written.
    pub authored_on: String,

    /// First reason code.
    pub reason: CodedValue,
    /// Text of the first note.
    pub note: String,

    /// First dosage instruction.
    pub dosage: DosageData,
}

/// First dosage instruction, flattened.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DosageData {
    /// Free-text instruction, e.g. "one tablet twice daily".
    pub text: String,
    /// Route of administration (SNOMED CT by default).
    pub route: CodedValue,
    /// Dose quantity value.
    pub dose_value: Option<f64>,
    /// Dose quantity unit, a UCUM code.
    pub dose_unit: Option<String>,
}

impl DosageData {
    pub fn is_empty(&self) -> bool {
        self.text.trim().is_empty() && self.route.is_empty() && self.dose_value.is_none()
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MedicationRequestFilters {
    pub patient_id: Option<String>,
    pub status: Option<String>,
    pub intent: Option<String>,
    pub requester_id: Option<String>,
    pub encounter_id: Option<String>,
}

// ============================================================================
// Wire types
// ============================================================================

#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
pub struct MedicationRequestWire {
    pub resource_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub intent: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub category: Vec<CodeableConcept>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub medication_codeable_concept: Option<CodeableConcept>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub medication_reference: Option<Reference>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject: Option<Reference>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub encounter: Option<Reference>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub authored_on: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub requester: Option<Reference>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub reason_code: Vec<CodeableConcept>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub note: Vec<Annotation>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub dosage_instruction: Vec<DosageWire>,
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DosageWire {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub route: Option<CodeableConcept>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub dose_and_rate: Vec<DoseAndRateWire>,
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DoseAndRateWire {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dose_quantity: Option<Quantity>,
}

wire_resource!(MedicationRequestWire);

// ============================================================================
// Mapper
// ============================================================================

pub struct MedicationRequestMapper;

impl ResourceMapper for MedicationRequestMapper {
    const RESOURCE_TYPE: &'static str = "MedicationRequest";
    const SORT_FIELDS: &'static [(&'static str, &'static str)] = &[
        ("authoredOn", "authoredon"),
        ("status", "status"),
        ("intent", "intent"),
        ("medication", "code"),
    ];

    type Wire = MedicationRequestWire;
    type Record = MedicationRequestData;
    type Filters = MedicationRequestFilters;

    fn from_fhir(wire: &MedicationRequestWire) -> MedicationRequestData {
        let medication = extract_coding(
            wire.medication_codeable_concept.as_ref(),
            CodingDefaults::system(RXNORM),
        );

        MedicationRequestData {
            id: wire.id.clone(),
            status: wire.status.clone().unwrap_or_default(),
            intent: wire.intent.clone().unwrap_or_default(),
            priority: wire.priority.clone().unwrap_or_default(),
            category: extract_first(
                &wire.category,
                CodingDefaults::system(MEDICATION_REQUEST_CATEGORY),
            ),
            medication_code: medication.code,
            medication_display: medication.display,
            medication_system: medication.system,
            medication_reference: optional_reference_id(
                wire.medication_reference.as_ref(),
                MEDICATION,
            ),
            subject: reference_id(wire.subject.as_ref(), PATIENT),
            encounter: optional_reference_id(wire.encounter.as_ref(), ENCOUNTER),
            requester: optional_reference_id(wire.requester.as_ref(), PRACTITIONER),
            authored_on: wire.authored_on.clone().unwrap_or_default(),
            reason: extract_first(&wire.reason_code, CodingDefaults::system(SNOMED)),
            note: first_note(&wire.note),
            dosage: dosage_from_wire(wire.dosage_instruction.first()),
        }
    }

    fn to_fhir(record: &MedicationRequestData, mode: WriteMode) -> MedicationRequestWire {
        let medication_reference =
            optional_reference(MEDICATION, record.medication_reference.as_deref());
        let medication_codeable_concept = if medication_reference.is_some() {
            None
        } else {
            optional_concept(&CodedValue::new(
                &record.medication_system,
                &record.medication_code,
                &record.medication_display,
            ))
        };

        MedicationRequestWire {
            resource_type: Self::RESOURCE_TYPE.to_string(),
            id: mode.id(record.id.as_deref()),
            status: non_empty(&record.status),
            intent: non_empty(&record.intent),
            priority: non_empty(&record.priority),
            category: concept_list(&record.category),
            medication_codeable_concept,
            medication_reference,
            subject: Some(to_reference(PATIENT, &record.subject)),
            encounter: optional_reference(ENCOUNTER, record.encounter.as_deref()),
            authored_on: non_empty(&record.authored_on),
            requester: optional_reference(PRACTITIONER, record.requester.as_deref()),
            reason_code: concept_list(&record.reason),
            note: note_from(&record.note),
            dosage_instruction: dosage_to_wire(&record.dosage).into_iter().collect(),
        }
    }

    fn map_filters(request: &ListRequest<MedicationRequestFilters>) -> QueryParams {
        let f = &request.filters;
        QueryParamsBuilder::new()
            .put("patient", f.patient_id.as_deref())
            .put("status", f.status.as_deref())
            .put("intent", f.intent.as_deref())
            .put("requester", f.requester_id.as_deref())
            .put("encounter", f.encounter_id.as_deref())
            .put("code:text", request.search.as_deref())
            .build()
    }

    fn validate(record: &MedicationRequestData) -> Vec<String> {
        let has_medication = !record.medication_code.trim().is_empty()
            || record
                .medication_reference
                .as_deref()
                .is_some_and(|id| !id.trim().is_empty());

        Validator::new()
            .require(&record.status, "Status")
            .require(&record.intent, "Intent")
            .check(has_medication, "Medication is required")
            .require(&record.subject, "Subject")
            .finish()
    }
}

// ============================================================================
// Helpers
// ============================================================================

fn dosage_from_wire(dosage: Option<&DosageWire>) -> DosageData {
    let dose = dosage
        .and_then(|d| d.dose_and_rate.first())
        .and_then(|d| d.dose_quantity.as_ref());

    DosageData {
        text: dosage.and_then(|d| d.text.clone()).unwrap_or_default(),
        route: extract_coding(
            dosage.and_then(|d| d.route.as_ref()),
            CodingDefaults::system(ROUTE),
        ),
        dose_value: dose.and_then(|q| q.value),
        dose_unit: dose.and_then(|q| q.unit.clone()),
    }
}

fn dosage_to_wire(dosage: &DosageData) -> Option<DosageWire> {
    if dosage.is_empty() {
        return None;
    }
    Some(DosageWire {
        text: non_empty(&dosage.text),
        route: optional_concept(&dosage.route),
        dose_and_rate: dosage
            .dose_value
            .map(|value| DoseAndRateWire {
                dose_quantity: Some(Quantity::ucum(
                    value,
                    dosage.dose_unit.as_deref().unwrap_or_default(),
                )),
            })
            .into_iter()
            .collect(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
      "resourceType": "MedicationRequest",
      "id": "mr-1",
      "status": "active",
      "intent": "order",
      "priority": "routine",
      "medicationCodeableConcept": {"coding": [{"system": "http://www.nlm.nih.gov/research/umls/rxnorm", "code": "197361", "display": "Amlodipine 5 MG"}]},
      "subject": {"reference": "Patient/p-1"},
      "authoredOn": "2024-05-02",
      "requester": {"reference": "Practitioner/dr-1"},
      "dosageInstruction": [
        {
          "text": "One tablet daily",
          "route": {"coding": [{"system": "http://snomed.info/sct", "code": "26643006", "display": "Oral"}]},
          "doseAndRate": [{"doseQuantity": {"value": 1, "unit": "tablet"}}]
        },
        {"text": "ignored"}
      ]
    }"#;

    fn sample() -> MedicationRequestData {
        MedicationRequestMapper::parse(SAMPLE).expect("parse medication request")
    }

    #[test]
    fn reads_first_dosage_instruction() {
        let request = sample();
        assert_eq!(request.medication_code, "197361");
        assert_eq!(request.requester.as_deref(), Some("dr-1"));
        assert_eq!(request.dosage.text, "One tablet daily");
        assert_eq!(request.dosage.route.display, "Oral");
        assert_eq!(request.dosage.dose_value, Some(1.0));
        assert_eq!(request.dosage.dose_unit.as_deref(), Some("tablet"));
    }

    #[test]
    fn writes_single_dosage_instruction() {
        let json = MedicationRequestMapper::to_value(&sample(), WriteMode::Create).expect("json");
        let dosage = json["dosageInstruction"].as_array().expect("dosage array");
        assert_eq!(dosage.len(), 1);
        assert_eq!(dosage[0]["doseAndRate"][0]["doseQuantity"]["value"], 1.0);
        assert!(json.get("medicationReference").is_none());
        assert!(json.get("id").is_none());
    }

    #[test]
    fn reference_replaces_inline_medication_on_write() {
        let request = MedicationRequestData {
            medication_reference: Some("med-7".into()),
            ..sample()
        };
        let wire = MedicationRequestMapper::to_fhir(&request, WriteMode::Create);
        assert!(wire.medication_codeable_concept.is_none());
        assert_eq!(
            wire.medication_reference.and_then(|r| r.reference).as_deref(),
            Some("Medication/med-7")
        );
    }

    #[test]
    fn omits_empty_dosage() {
        let request = MedicationRequestData {
            dosage: DosageData::default(),
            ..sample()
        };
        let wire = MedicationRequestMapper::to_fhir(&request, WriteMode::Create);
        assert!(wire.dosage_instruction.is_empty());
    }

    #[test]
    fn round_trips() {
        let request = sample();
        let wire = MedicationRequestMapper::to_fhir(&request, WriteMode::Update);
        assert_eq!(MedicationRequestMapper::from_fhir(&wire), request);
    }

    #[test]
    fn tolerates_missing_fields() {
        let request =
            MedicationRequestMapper::parse(r#"{"resourceType": "MedicationRequest"}"#)
                .expect("parse");
        assert_eq!(request.medication_system, RXNORM);
        assert_eq!(request.medication_reference, None);
        assert_eq!(request.dosage.route.system, ROUTE);
        assert_eq!(request.dosage.dose_value, None);
    }

    #[test]
    fn accepts_either_medication_form() {
        assert_eq!(
            MedicationRequestMapper::validate(&MedicationRequestData::default()),
            vec![
                "Status is required",
                "Intent is required",
                "Medication is required",
                "Subject is required",
            ]
        );
        let by_reference = MedicationRequestData {
            medication_code: String::new(),
            medication_reference: Some("med-7".into()),
            ..sample()
        };
        assert!(MedicationRequestMapper::validate(&by_reference).is_empty());
        assert!(MedicationRequestMapper::validate(&sample()).is_empty());
    }

    #[test]
    fn maps_sort_and_filters() {
        assert_eq!(
            MedicationRequestMapper::map_sort_fields(
                &["authoredOn", "medication"],
                &[
                    medrec_types::SortDirection::Desc,
                    medrec_types::SortDirection::Asc
                ]
            ),
            vec!["-authoredon", "code"]
        );
        let request = ListRequest::with_filters(MedicationRequestFilters {
            requester_id: Some("dr-1".into()),
            ..MedicationRequestFilters::default()
        });
        let params = MedicationRequestMapper::map_filters(&request);
        assert_eq!(params["requester"], "dr-1");
        assert_eq!(params.len(), 1);
    }
}
