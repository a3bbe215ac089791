//! FHIR Observation mapping.
//!
//! Observations carry a single measured value (`valueQuantity` or `valueString`) or, for
//! panels such as blood pressure, a list of coded `component` values. Components are
//! kept in wire order and identified by their code.

use crate::coding::{
    concept_list, concept_of, extract_coding, extract_first, optional_concept, CodedValue,
    CodingDefaults, LOINC, OBSERVATION_CATEGORY, OBSERVATION_INTERPRETATION,
};
use crate::datatypes::{
    first_note, non_empty, note_from, Annotation, CodeableConcept, Quantity, Reference,
};
use crate::mapper::{wire_resource, ResourceMapper, WriteMode};
use crate::query::{QueryParams, QueryParamsBuilder};
use crate::reference::{
    actor_reference, optional_reference, optional_reference_id, parse_reference, reference_id,
    to_reference, ENCOUNTER, PATIENT, PRACTITIONER,
};
use crate::validation::Validator;
use medrec_types::ListRequest;
use serde::{Deserialize, Serialize};

// ============================================================================
// Public domain-level types
// ============================================================================

#[derive(Clone, Debug, Default, PartialEq)]
pub struct ObservationData {
    /// Server-assigned id. `None` until created.
    pub id: Option<String>,

    /// `registered`, `preliminary`, `final`, `amended`, ...
    pub status: String,

    /// First category (defaults to the HL7 observation-category system).
    pub category: CodedValue,

    /// LOINC code by default.
    pub code: String,
    /// Display text of `code`.
    pub display: String,
    /// Coding system of `code`.
    pub system: String,

    /// Patient id.
    pub subject: String,
    /// Encounter id.
    pub encounter: Option<String>,

    /// `effectiveDateTime`, ISO 8601.
    pub effective_date_time: String,
    /// When the result was made available.
    pub issued: Option<String>,

    /// Practitioner ids. Performers of other types keep their full reference.
    pub performer_ids: Vec<String>,

    /// `valueQuantity.value`.
    pub value: Option<f64>,
    /// `valueQuantity.unit`, a UCUM code.
    pub unit: Option<String>,
    /// `valueString`, for non-numeric results.
    pub value_string: Option<String>,

    /// First interpretation (high, low, normal, ...).
    pub interpretation: CodedValue,
    /// Text of the first note.
    pub note: String,

    /// Component results keyed by `code`, in wire order.
    pub components: Vec<ObservationComponentData>,
}

impl ObservationData {
    /// Component with the given code, if present.
    pub fn component(&self, code: &str) -> Option<&ObservationComponentData> {
        self.components.iter().find(|c| c.code == code)
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct ObservationComponentData {
    /// Component code (LOINC by default).
    pub code: String,
    /// Display text of `code`.
    pub display: String,
    /// Coding system of `code`.
    pub system: String,
    /// `valueQuantity.value`.
    pub value: Option<f64>,
    /// `valueQuantity.unit`.
    pub unit: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ObservationFilters {
    pub patient_id: Option<String>,
    pub status: Option<String>,
    pub category: Option<String>,
    pub code: Option<String>,
    pub encounter_id: Option<String>,
    /// Passed through as the `date` parameter, prefixes (`ge`, `le`, ...) included.
    pub date: Option<String>,
}

// ============================================================================
// Wire types
// ============================================================================

#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ObservationWire {
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
    pub encounter: Option<Reference>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub effective_date_time: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub issued: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub performer: Vec<Reference>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value_quantity: Option<Quantity>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value_string: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub interpretation: Vec<CodeableConcept>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub note: Vec<Annotation>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub component: Vec<ObservationComponentWire>,
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ObservationComponentWire {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<CodeableConcept>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value_quantity: Option<Quantity>,
}

wire_resource!(ObservationWire);

// ============================================================================
// Mapper
// ============================================================================

pub struct ObservationMapper;

impl ResourceMapper for ObservationMapper {
    const RESOURCE_TYPE: &'static str = "Observation";
    const SORT_FIELDS: &'static [(&'static str, &'static str)] = &[
        ("effectiveDateTime", "date"),
        ("code", "code"),
        ("status", "status"),
        ("category", "category"),
    ];

    type Wire = ObservationWire;
    type Record = ObservationData;
    type Filters = ObservationFilters;

    fn from_fhir(wire: &ObservationWire) -> ObservationData {
        let code = extract_coding(wire.code.as_ref(), CodingDefaults::system(LOINC));
        let (value, unit) = quantity_parts(wire.value_quantity.as_ref());

        ObservationData {
            id: wire.id.clone(),
            status: wire.status.clone().unwrap_or_default(),
            category: extract_first(
                &wire.category,
                CodingDefaults::system(OBSERVATION_CATEGORY),
            ),
            code: code.code,
            display: code.display,
            system: code.system,
            subject: reference_id(wire.subject.as_ref(), PATIENT),
            encounter: optional_reference_id(wire.encounter.as_ref(), ENCOUNTER),
            effective_date_time: wire.effective_date_time.clone().unwrap_or_default(),
            issued: wire.issued.clone(),
            performer_ids: wire
                .performer
                .iter()
                .filter_map(|p| p.reference.as_deref())
                .map(|r| parse_reference(r, Some(PRACTITIONER)))
                .collect(),
            value,
            unit,
            value_string: wire.value_string.clone(),
            interpretation: extract_first(
                &wire.interpretation,
                CodingDefaults::system(OBSERVATION_INTERPRETATION),
            ),
            note: first_note(&wire.note),
            components: wire.component.iter().map(component_from_wire).collect(),
        }
    }

    fn to_fhir(record: &ObservationData, mode: WriteMode) -> ObservationWire {
        ObservationWire {
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
            encounter: optional_reference(ENCOUNTER, record.encounter.as_deref()),
            effective_date_time: non_empty(&record.effective_date_time),
            issued: record.issued.as_deref().and_then(non_empty),
            performer: record
                .performer_ids
                .iter()
                .filter_map(|id| actor_reference(PRACTITIONER, id))
                .collect(),
            value_quantity: to_quantity(record.value, record.unit.as_deref()),
            value_string: record.value_string.as_deref().and_then(non_empty),
            interpretation: concept_list(&record.interpretation),
            note: note_from(&record.note),
            component: record.components.iter().map(component_to_wire).collect(),
        }
    }

    fn map_filters(request: &ListRequest<ObservationFilters>) -> QueryParams {
        let f = &request.filters;
        QueryParamsBuilder::new()
            .put("patient", f.patient_id.as_deref())
            .put("status", f.status.as_deref())
            .put("category", f.category.as_deref())
            .put("code", f.code.as_deref())
            .put("encounter", f.encounter_id.as_deref())
            .put("date", f.date.as_deref())
            .put("code:text", request.search.as_deref())
            .build()
    }

    fn validate(record: &ObservationData) -> Vec<String> {
        let has_value = record.value.is_some()
            || record
                .value_string
                .as_deref()
                .is_some_and(|s| !s.trim().is_empty())
            || !record.components.is_empty();

        Validator::new()
            .require(&record.status, "Status")
            .require(&record.code, "Code")
            .require(&record.subject, "Subject")
            .require(&record.effective_date_time, "Effective date")
            .check(has_value, "Value is required")
            .check(
                record.components.iter().all(|c| !c.code.trim().is_empty()),
                "Every component must have a code",
            )
            .finish()
    }
}

// ============================================================================
// Helper functions (internal)
// ============================================================================

fn quantity_parts(quantity: Option<&Quantity>) -> (Option<f64>, Option<String>) {
    let value = quantity.and_then(|q| q.value);
    let unit = quantity.and_then(|q| q.unit.clone().or_else(|| q.code.clone()));
    (value, unit)
}

fn to_quantity(value: Option<f64>, unit: Option<&str>) -> Option<Quantity> {
    value.map(|v| Quantity::ucum(v, unit.unwrap_or_default()))
}

fn component_from_wire(component: &ObservationComponentWire) -> ObservationComponentData {
    let code = extract_coding(component.code.as_ref(), CodingDefaults::system(LOINC));
    let (value, unit) = quantity_parts(component.value_quantity.as_ref());
    ObservationComponentData {
        code: code.code,
        display: code.display,
        system: code.system,
        value,
        unit,
    }
}

fn component_to_wire(component: &ObservationComponentData) -> ObservationComponentWire {
    ObservationComponentWire {
        code: Some(concept_of(&CodedValue::new(
            &component.system,
            &component.code,
            &component.display,
        ))),
        value_quantity: to_quantity(component.value, component.unit.as_deref()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coding::UCUM;

    const BLOOD_PRESSURE: &str = r#"{
      "resourceType": "Observation",
      "id": "bp-1",
      "status": "final",
      "category": [{"coding": [{"system": "http://terminology.hl7.org/CodeSystem/observation-category", "code": "vital-signs", "display": "Vital Signs"}]}],
      "code": {"coding": [{"system": "http://loinc.org", "code": "85354-9", "display": "Blood pressure panel"}]},
      "subject": {"reference": "Patient/p-1"},
      "effectiveDateTime": "2024-04-02T09:30:00Z",
      "performer": [{"reference": "Practitioner/dr-1"}, {"reference": "Organization/org-1"}],
      "component": [
        {
          "code": {"coding": [{"system": "http://loinc.org", "code": "8480-6", "display": "Systolic blood pressure"}]},
          "valueQuantity": {"value": 120, "unit": "mm[Hg]", "system": "http://unitsofmeasure.org", "code": "mm[Hg]"}
        },
        {
          "code": {"coding": [{"system": "http://loinc.org", "code": "8462-4", "display": "Diastolic blood pressure"}]},
          "valueQuantity": {"value": 80, "unit": "mm[Hg]", "system": "http://unitsofmeasure.org", "code": "mm[Hg]"}
        }
      ]
    }"#;

    fn blood_pressure() -> ObservationData {
        ObservationMapper::parse(BLOOD_PRESSURE).expect("parse observation")
    }

    #[test]
    fn parses_components_in_order() {
        let obs = blood_pressure();
        assert_eq!(obs.code, "85354-9");
        assert_eq!(obs.category.code, "vital-signs");
        assert_eq!(obs.components.len(), 2);
        assert_eq!(obs.components[0].code, "8480-6");
        assert_eq!(obs.components[0].value, Some(120.0));
        assert_eq!(obs.components[1].unit.as_deref(), Some("mm[Hg]"));
        assert_eq!(obs.component("8462-4").and_then(|c| c.value), Some(80.0));
        assert_eq!(obs.value, None);
    }

    #[test]
    fn keeps_foreign_performer_references() {
        let obs = blood_pressure();
        assert_eq!(obs.performer_ids, vec!["dr-1", "Organization/org-1"]);

        let wire = ObservationMapper::to_fhir(&obs, WriteMode::Update);
        let refs: Vec<_> = wire
            .performer
            .iter()
            .filter_map(|r| r.reference.as_deref())
            .collect();
        assert_eq!(refs, vec!["Practitioner/dr-1", "Organization/org-1"]);
    }

    #[test]
    fn round_trips_components() {
        let obs = blood_pressure();
        let wire = ObservationMapper::to_fhir(&obs, WriteMode::Update);
        assert_eq!(ObservationMapper::from_fhir(&wire), obs);
    }

    #[test]
    fn maps_value_quantity() {
        let obs = ObservationMapper::parse(
            r#"{
              "resourceType": "Observation",
              "status": "final",
              "code": {"coding": [{"code": "8867-4"}]},
              "valueQuantity": {"value": 72, "code": "/min"}
            }"#,
        )
        .expect("parse");
        assert_eq!(obs.system, LOINC);
        assert_eq!(obs.value, Some(72.0));
        assert_eq!(obs.unit.as_deref(), Some("/min"));

        let json = ObservationMapper::to_value(&obs, WriteMode::Create).expect("json");
        assert_eq!(json["valueQuantity"]["value"], 72.0);
        assert_eq!(json["valueQuantity"]["system"], UCUM);
        assert!(json.get("component").is_none());
        assert!(json.get("note").is_none());
    }

    #[test]
    fn tolerates_missing_fields() {
        let obs = ObservationMapper::parse(r#"{"resourceType": "Observation"}"#).expect("parse");
        assert_eq!(obs.code, "");
        assert_eq!(obs.subject, "");
        assert_eq!(obs.category.system, OBSERVATION_CATEGORY);
        assert!(obs.components.is_empty());
        assert!(obs.performer_ids.is_empty());
    }

    #[test]
    fn validates_value_presence() {
        let errors = ObservationMapper::validate(&ObservationData::default());
        assert_eq!(
            errors,
            vec![
                "Status is required",
                "Code is required",
                "Subject is required",
                "Effective date is required",
                "Value is required",
            ]
        );
        assert!(ObservationMapper::validate(&blood_pressure()).is_empty());
    }

    #[test]
    fn maps_filters_with_date() {
        let request = ListRequest::with_filters(ObservationFilters {
            patient_id: Some("p-1".into()),
            category: Some("vital-signs".into()),
            date: Some("ge2024-01-01".into()),
            ..ObservationFilters::default()
        });
        let params = ObservationMapper::map_filters(&request);
        assert_eq!(params.len(), 3);
        assert_eq!(params["date"], "ge2024-01-01");
    }

    #[test]
    fn maps_sort_fields() {
        assert_eq!(
            ObservationMapper::map_sort_fields(
                &["effectiveDateTime", "category", "code"],
                &[medrec_types::SortDirection::Desc, medrec_types::SortDirection::Asc]
            ),
            vec!["-date", "category", "code"]
        );
    }
}
