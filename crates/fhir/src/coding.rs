//! Coded-value codec for `CodeableConcept` and `Coding`.
//!
//! Only the first coding of a concept is read. Additional codings are dropped on a
//! read, so a record converted back to wire form carries exactly one coding.

use crate::datatypes::{non_empty, CodeableConcept, Coding};

pub const SNOMED: &str = "http://snomed.info/sct";
pub const LOINC: &str = "http://loinc.org";
pub const UCUM: &str = "http://unitsofmeasure.org";
pub const RXNORM: &str = "http://www.nlm.nih.gov/research/umls/rxnorm";

pub const FLAG_CATEGORY: &str = "http://terminology.hl7.org/CodeSystem/flag-category";
pub const LIST_CODE: &str = "http://terminology.hl7.org/CodeSystem/list-example-use-codes";
pub const OBSERVATION_CATEGORY: &str =
    "http://terminology.hl7.org/CodeSystem/observation-category";
pub const OBSERVATION_INTERPRETATION: &str =
    "http://terminology.hl7.org/CodeSystem/v3-ObservationInterpretation";
pub const CONDITION_CLINICAL: &str = "http://terminology.hl7.org/CodeSystem/condition-clinical";
pub const CONDITION_VERIFICATION: &str =
    "http://terminology.hl7.org/CodeSystem/condition-ver-status";
pub const CONDITION_CATEGORY: &str = "http://terminology.hl7.org/CodeSystem/condition-category";
pub const ALLERGY_CLINICAL: &str =
    "http://terminology.hl7.org/CodeSystem/allergyintolerance-clinical";
pub const ALLERGY_VERIFICATION: &str =
    "http://terminology.hl7.org/CodeSystem/allergyintolerance-verification";
pub const ACT_CODE: &str = "http://terminology.hl7.org/CodeSystem/v3-ActCode";
pub const SERVICE_TYPE: &str = "http://terminology.hl7.org/CodeSystem/service-type";
pub const APPOINTMENT_TYPE: &str = "http://terminology.hl7.org/CodeSystem/v2-0276";
pub const MEDICATION_REQUEST_CATEGORY: &str =
    "http://terminology.hl7.org/CodeSystem/medicationrequest-category";
pub const ROUTE: &str = SNOMED;
pub const QUALIFICATION: &str = "http://terminology.hl7.org/CodeSystem/v2-0360";
pub const ROLE_CODE: &str = "http://terminology.hl7.org/CodeSystem/v3-RoleCode";
pub const LOCATION_PHYSICAL_TYPE: &str =
    "http://terminology.hl7.org/CodeSystem/location-physical-type";

/// A flat `{system, code, display}` triple.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CodedValue {
    pub system: String,
    pub code: String,
    pub display: String,
}

impl CodedValue {
    pub fn new(system: &str, code: &str, display: &str) -> Self {
        Self {
            system: system.to_string(),
            code: code.to_string(),
            display: display.to_string(),
        }
    }

    /// A coded value with no code is treated as "not set".
    pub fn is_empty(&self) -> bool {
        self.code.trim().is_empty()
    }
}

/// Fallback values applied by [`extract_coding`] when the wire form omits a sub-field.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CodingDefaults {
    pub system: &'static str,
    pub code: &'static str,
    pub display: &'static str,
}

impl CodingDefaults {
    pub const NONE: CodingDefaults = CodingDefaults {
        system: "",
        code: "",
        display: "",
    };

    /// Defaults with only a coding system.
    pub const fn system(system: &'static str) -> Self {
        Self {
            system,
            code: "",
            display: "",
        }
    }
}

/// Read the first coding of `concept`.
///
/// Missing `code` falls back to the default code. Missing `display` falls back to
/// `concept.text`, then to the default display. Missing `system` falls back to the
/// default system.
pub fn extract_coding(concept: Option<&CodeableConcept>, defaults: CodingDefaults) -> CodedValue {
    let coding = concept.and_then(|c| c.coding.first());
    let text = concept.and_then(|c| c.text.as_deref());
    from_coding(coding, text, defaults)
}

/// [`extract_coding`] over the first concept of a repeated field.
pub fn extract_first(concepts: &[CodeableConcept], defaults: CodingDefaults) -> CodedValue {
    extract_coding(concepts.first(), defaults)
}

/// Read a bare `Coding` field.
pub fn extract_plain_coding(coding: Option<&Coding>, defaults: CodingDefaults) -> CodedValue {
    from_coding(coding, None, defaults)
}

fn from_coding(coding: Option<&Coding>, text: Option<&str>, defaults: CodingDefaults) -> CodedValue {
    let field = |value: Option<&String>, fallback: &str| {
        value
            .filter(|v| !v.is_empty())
            .cloned()
            .unwrap_or_else(|| fallback.to_string())
    };

    CodedValue {
        system: field(coding.and_then(|c| c.system.as_ref()), defaults.system),
        code: field(coding.and_then(|c| c.code.as_ref()), defaults.code),
        display: coding
            .and_then(|c| c.display.clone())
            .filter(|d| !d.is_empty())
            .or_else(|| text.filter(|t| !t.is_empty()).map(str::to_string))
            .unwrap_or_else(|| defaults.display.to_string()),
    }
}

/// A concept with exactly one coding. Blank `system`/`display` are omitted.
pub fn build_codeable_concept(system: &str, code: &str, display: &str) -> CodeableConcept {
    CodeableConcept {
        coding: vec![build_coding(system, code, display)],
        text: None,
    }
}

pub fn build_coding(system: &str, code: &str, display: &str) -> Coding {
    let opt = |s: &str| (!s.is_empty()).then(|| s.to_string());
    Coding {
        system: opt(system),
        code: Some(code.to_string()),
        display: opt(display),
    }
}

/// Concept for an optional coded field, or `None` when no code is set.
pub fn optional_concept(value: &CodedValue) -> Option<CodeableConcept> {
    (!value.is_empty()).then(|| concept_of(value))
}

/// Like [`optional_concept`], but a value with only a display becomes a text-only
/// concept instead of being dropped.
pub fn concept_or_text(value: &CodedValue) -> Option<CodeableConcept> {
    if !value.is_empty() {
        return Some(concept_of(value));
    }
    non_empty(&value.display).map(|text| CodeableConcept {
        coding: Vec::new(),
        text: Some(text),
    })
}

/// Concept for a required coded field. Always emitted, even with an empty code.
pub fn concept_of(value: &CodedValue) -> CodeableConcept {
    build_codeable_concept(&value.system, &value.code, &value.display)
}

/// One-element concept list for repeated fields (`category[]`, `bodySite[]`, ...),
/// or empty when no code is set.
pub fn concept_list(value: &CodedValue) -> Vec<CodeableConcept> {
    optional_concept(value).into_iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn takes_first_coding_only() {
        let concept = CodeableConcept {
            coding: vec![
                build_coding(SNOMED, "38341003", "Hypertension"),
                build_coding("http://hl7.org/fhir/sid/icd-10", "I10", "Essential hypertension"),
            ],
            text: None,
        };
        let value = extract_coding(Some(&concept), CodingDefaults::system(SNOMED));
        assert_eq!(value, CodedValue::new(SNOMED, "38341003", "Hypertension"));
    }

    #[test]
    fn substitutes_default_system() {
        let concept = CodeableConcept {
            coding: vec![Coding {
                system: None,
                code: Some("drug".into()),
                display: None,
            }],
            text: None,
        };
        let value = extract_coding(Some(&concept), CodingDefaults::system(FLAG_CATEGORY));
        assert_eq!(value.system, FLAG_CATEGORY);
        assert_eq!(value.code, "drug");
        assert_eq!(value.display, "");
    }

    #[test]
    fn absent_concept_degrades_to_defaults() {
        let value = extract_coding(None, CodingDefaults::system(SNOMED));
        assert_eq!(value, CodedValue::new(SNOMED, "", ""));

        let value = extract_coding(Some(&CodeableConcept::default()), CodingDefaults::NONE);
        assert_eq!(value, CodedValue::default());
    }

    #[test]
    fn falls_back_to_text_for_display() {
        let concept = CodeableConcept {
            coding: vec![Coding {
                code: Some("x".into()),
                ..Coding::default()
            }],
            text: Some("Free text".into()),
        };
        assert_eq!(
            extract_coding(Some(&concept), CodingDefaults::NONE).display,
            "Free text"
        );
    }

    #[test]
    fn builds_single_coding() {
        let concept = build_codeable_concept(SNOMED, "123", "");
        assert_eq!(concept.coding.len(), 1);
        assert_eq!(concept.coding[0].display, None);
        assert_eq!(concept.coding[0].system.as_deref(), Some(SNOMED));
    }

    #[test]
    fn optional_concept_is_omitted_without_code() {
        assert_eq!(optional_concept(&CodedValue::new(SNOMED, "", "Arm")), None);
        assert!(concept_list(&CodedValue::default()).is_empty());
        assert!(optional_concept(&CodedValue::new(SNOMED, "368208006", "")).is_some());
    }

    #[test]
    fn text_only_value_survives_as_concept_text() {
        let concept =
            concept_or_text(&CodedValue::new(SNOMED, "", "Wheeze")).expect("text concept");
        assert!(concept.coding.is_empty());
        assert_eq!(concept.text.as_deref(), Some("Wheeze"));

        let back = extract_coding(Some(&concept), CodingDefaults::system(SNOMED));
        assert_eq!(back, CodedValue::new(SNOMED, "", "Wheeze"));

        assert_eq!(concept_or_text(&CodedValue::new(SNOMED, "", " ")), None);
        assert_eq!(
            concept_or_text(&CodedValue::new(SNOMED, "247472004", "Hives")),
            optional_concept(&CodedValue::new(SNOMED, "247472004", "Hives"))
        );
    }
}
