//! FHIR R4 complex datatypes shared by every resource wire model.
//!
//! All fields are optional on input. Absent values are omitted on output rather than
//! serialised as `null`.

use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Coding {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CodeableConcept {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub coding: Vec<Coding>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Reference {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Identifier {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Period {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end: Option<String>,
}

impl Period {
    /// Build a period, or `None` when neither bound is set.
    pub fn from_bounds(start: &str, end: Option<&str>) -> Option<Self> {
        let start = non_empty(start);
        let end = end.and_then(non_empty);
        if start.is_none() && end.is_none() {
            return None;
        }
        Some(Self { start, end })
    }
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Quantity {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

impl Quantity {
    /// UCUM-coded quantity. The unit string doubles as the UCUM code.
    pub fn ucum(value: f64, unit: &str) -> Self {
        let unit = non_empty(unit);
        Self {
            value: Some(value),
            system: unit.as_ref().map(|_| crate::coding::UCUM.to_string()),
            code: unit.clone(),
            unit,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Ratio {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub numerator: Option<Quantity>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub denominator: Option<Quantity>,
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Annotation {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author_reference: Option<Reference>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time: Option<String>,
    pub text: String,
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
pub struct HumanName {
    #[serde(rename = "use", skip_serializing_if = "Option::is_none")]
    pub use_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub family: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub given: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub prefix: Vec<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ContactPoint {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(rename = "use", skip_serializing_if = "Option::is_none")]
    pub use_type: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Address {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub line: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub postal_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
}

/// Flat address fields shared by records that carry a single postal address.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct AddressData {
    pub line: String,
    pub city: String,
    pub state: String,
    pub postal_code: String,
    pub country: String,
}

impl AddressData {
    pub fn is_empty(&self) -> bool {
        [
            &self.line,
            &self.city,
            &self.state,
            &self.postal_code,
            &self.country,
        ]
        .iter()
        .all(|s| s.trim().is_empty())
    }

    /// Only the first address line is kept.
    pub fn from_wire(address: Option<&Address>) -> Self {
        let Some(address) = address else {
            return Self::default();
        };
        Self {
            line: address.line.first().cloned().unwrap_or_default(),
            city: address.city.clone().unwrap_or_default(),
            state: address.state.clone().unwrap_or_default(),
            postal_code: address.postal_code.clone().unwrap_or_default(),
            country: address.country.clone().unwrap_or_default(),
        }
    }

    pub fn to_wire(&self) -> Option<Address> {
        if self.is_empty() {
            return None;
        }
        Some(Address {
            line: non_empty(&self.line).into_iter().collect(),
            city: non_empty(&self.city),
            state: non_empty(&self.state),
            postal_code: non_empty(&self.postal_code),
            country: non_empty(&self.country),
        })
    }
}

/// First `telecom` value with the given system (`phone`, `email`, ...).
pub fn telecom_value(telecom: &[ContactPoint], system: &str) -> String {
    telecom
        .iter()
        .find(|c| c.system.as_deref() == Some(system))
        .and_then(|c| c.value.clone())
        .unwrap_or_default()
}

/// Build `telecom` entries for a phone number and an email address, skipping blanks.
pub fn telecom_from(phone: &str, email: &str) -> Vec<ContactPoint> {
    [("phone", phone), ("email", email)]
        .into_iter()
        .filter_map(|(system, value)| {
            non_empty(value).map(|value| ContactPoint {
                system: Some(system.to_string()),
                value: Some(value),
                use_type: Some("work".to_string()),
            })
        })
        .collect()
}

/// Text of the first annotation, or empty.
pub fn first_note(notes: &[Annotation]) -> String {
    notes.first().map(|n| n.text.clone()).unwrap_or_default()
}

/// A single-annotation `note` array, or empty when `text` is blank.
pub fn note_from(text: &str) -> Vec<Annotation> {
    non_empty(text)
        .map(|text| Annotation {
            text,
            ..Annotation::default()
        })
        .into_iter()
        .collect()
}

/// `Some(s.to_string())` unless `s` is blank.
pub fn non_empty(s: &str) -> Option<String> {
    if s.trim().is_empty() {
        None
    } else {
        Some(s.to_string())
    }
}
