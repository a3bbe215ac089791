//! FHIR Practitioner mapping.
//!
//! Only the first `name`, `identifier`, `qualification` and `address` are mapped, and of
//! the name only the first given name and first prefix. Contact details are reduced to
//! one phone number and one email address.

use crate::coding::{extract_coding, optional_concept, CodedValue, CodingDefaults, QUALIFICATION};
use crate::datatypes::{
    non_empty, telecom_from, telecom_value, Address, AddressData, CodeableConcept, ContactPoint,
    HumanName, Identifier,
};
use crate::mapper::{wire_resource, ResourceMapper, WriteMode};
use crate::query::{QueryParams, QueryParamsBuilder};
use crate::validation::Validator;
use medrec_types::ListRequest;
use serde::{Deserialize, Serialize};

// ============================================================================
// Public domain-level types
// ============================================================================

#[derive(Clone, Debug, Default, PartialEq)]
pub struct PractitionerData {
    /// Server-assigned id. `None` until created.
    pub id: Option<String>,

    /// System of the first identifier.
    pub identifier_system: String,
    /// Value of the first identifier.
    pub identifier: String,
    /// Whether the record is in active use.
    pub active: Option<bool>,

    /// Family name from the first name.
    pub family: String,
    /// First given name.
    pub given: String,
    /// First prefix (`Dr`, `Prof`, ...).
    pub prefix: String,

    /// `male`, `female`, `other`, `unknown`.
    pub gender: String,
    /// Date of birth (YYYY-MM-DD).
    pub birth_date: String,

    /// First phone contact.
    pub phone: String,
    /// First email contact.
    pub email: String,
    /// First address.
    pub address: AddressData,

    /// First qualification code.
    pub qualification: CodedValue,
}

impl PractitionerData {
    /// `"Dr Jane Smith"`, skipping blank parts.
    pub fn full_name(&self) -> String {
        [&self.prefix, &self.given, &self.family]
            .iter()
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PractitionerFilters {
    pub active: Option<bool>,
    pub gender: Option<String>,
    pub family: Option<String>,
    pub given: Option<String>,
    pub identifier: Option<String>,
}

// ============================================================================
// Wire types
// ============================================================================

#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PractitionerWire {
    pub resource_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub identifier: Vec<Identifier>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub active: Option<bool>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub name: Vec<HumanName>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub telecom: Vec<ContactPoint>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub address: Vec<Address>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gender: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub birth_date: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub qualification: Vec<QualificationWire>,
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
pub struct QualificationWire {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<CodeableConcept>,
}

wire_resource!(PractitionerWire);

// ============================================================================
// Mapper
// ============================================================================

pub struct PractitionerMapper;

impl ResourceMapper for PractitionerMapper {
    const RESOURCE_TYPE: &'static str = "Practitioner";
    const SORT_FIELDS: &'static [(&'static str, &'static str)] = &[
        ("family", "family"),
        ("given", "given"),
        ("name", "name"),
    ];

    type Wire = PractitionerWire;
    type Record = PractitionerData;
    type Filters = PractitionerFilters;

    fn from_fhir(wire: &PractitionerWire) -> PractitionerData {
        let name = wire.name.first();
        let identifier = wire.identifier.first();

        PractitionerData {
            id: wire.id.clone(),
            identifier_system: identifier
                .and_then(|i| i.system.clone())
                .unwrap_or_default(),
            identifier: identifier.and_then(|i| i.value.clone()).unwrap_or_default(),
            active: wire.active,
            family: name.and_then(|n| n.family.clone()).unwrap_or_default(),
            given: name
                .and_then(|n| n.given.first().cloned())
                .unwrap_or_default(),
            prefix: name
                .and_then(|n| n.prefix.first().cloned())
                .unwrap_or_default(),
            gender: wire.gender.clone().unwrap_or_default(),
            birth_date: wire.birth_date.clone().unwrap_or_default(),
            phone: telecom_value(&wire.telecom, "phone"),
            email: telecom_value(&wire.telecom, "email"),
            address: AddressData::from_wire(wire.address.first()),
            qualification: extract_coding(
                wire.qualification.first().and_then(|q| q.code.as_ref()),
                CodingDefaults::system(QUALIFICATION),
            ),
        }
    }

    fn to_fhir(record: &PractitionerData, mode: WriteMode) -> PractitionerWire {
        let has_name = [&record.family, &record.given, &record.prefix]
            .iter()
            .any(|part| !part.trim().is_empty());
        let name = has_name.then(|| HumanName {
            use_type: Some("official".to_string()),
            text: None,
            family: non_empty(&record.family),
            given: non_empty(&record.given).into_iter().collect(),
            prefix: non_empty(&record.prefix).into_iter().collect(),
        });
        let identifier = non_empty(&record.identifier).map(|value| Identifier {
            system: non_empty(&record.identifier_system),
            value: Some(value),
        });

        PractitionerWire {
            resource_type: Self::RESOURCE_TYPE.to_string(),
            id: mode.id(record.id.as_deref()),
            identifier: identifier.into_iter().collect(),
            active: record.active,
            name: name.into_iter().collect(),
            telecom: telecom_from(&record.phone, &record.email),
            address: record.address.to_wire().into_iter().collect(),
            gender: non_empty(&record.gender),
            birth_date: non_empty(&record.birth_date),
            qualification: optional_concept(&record.qualification)
                .map(|code| QualificationWire { code: Some(code) })
                .into_iter()
                .collect(),
        }
    }

    fn map_filters(request: &ListRequest<PractitionerFilters>) -> QueryParams {
        let f = &request.filters;
        QueryParamsBuilder::new()
            .put_bool("active", f.active)
            .put("gender", f.gender.as_deref())
            .put("family", f.family.as_deref())
            .put("given", f.given.as_deref())
            .put("identifier", f.identifier.as_deref())
            .put("name", request.search.as_deref())
            .build()
    }

    fn validate(record: &PractitionerData) -> Vec<String> {
        Validator::new()
            .require(&record.family, "Family name")
            .require(&record.given, "Given name")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
      "resourceType": "Practitioner",
      "id": "dr-1",
      "identifier": [{"system": "https://fhir.nhs.uk/Id/gmc-number", "value": "C1234567"}],
      "active": true,
      "name": [
        {"use": "official", "family": "Smith", "given": ["Jane", "Anne"], "prefix": ["Dr"]},
        {"use": "maiden", "family": "Jones"}
      ],
      "telecom": [
        {"system": "email", "value": "jane.smith@example.org"},
        {"system": "phone", "value": "0113 496 0000"}
      ],
      "address": [{"line": ["1 Infirmary St"], "city": "Leeds", "postalCode": "LS1 3EX"}],
      "gender": "female",
      "birthDate": "1980-06-15",
      "qualification": [{"code": {"coding": [{"code": "MD", "display": "Doctor of Medicine"}]}}]
    }"#;

    fn sample() -> PractitionerData {
        PractitionerMapper::parse(SAMPLE).expect("parse practitioner")
    }

    #[test]
    fn flattens_first_name_and_contacts() {
        let practitioner = sample();
        assert_eq!(practitioner.family, "Smith");
        assert_eq!(practitioner.given, "Jane");
        assert_eq!(practitioner.full_name(), "Dr Jane Smith");
        assert_eq!(practitioner.phone, "0113 496 0000");
        assert_eq!(practitioner.email, "jane.smith@example.org");
        assert_eq!(practitioner.address.city, "Leeds");
        assert_eq!(practitioner.qualification.system, QUALIFICATION);
        assert_eq!(practitioner.identifier, "C1234567");
        assert_eq!(practitioner.active, Some(true));
    }

    #[test]
    fn round_trips() {
        let practitioner = sample();
        let wire = PractitionerMapper::to_fhir(&practitioner, WriteMode::Update);
        assert_eq!(wire.name.len(), 1);
        assert_eq!(PractitionerMapper::from_fhir(&wire), practitioner);
    }

    #[test]
    fn omits_unset_contact_details() {
        let practitioner = PractitionerData {
            family: "Smith".into(),
            given: "Jane".into(),
            ..PractitionerData::default()
        };
        let json = PractitionerMapper::to_value(&practitioner, WriteMode::Create).expect("json");
        for key in ["id", "telecom", "address", "qualification", "identifier", "active"] {
            assert!(json.get(key).is_none(), "{key} should be omitted");
        }
        assert_eq!(json["name"][0]["given"][0], "Jane");
        assert!(json["name"][0].get("prefix").is_none());
    }

    #[test]
    fn omits_name_without_parts() {
        let practitioner = PractitionerData {
            gender: "female".into(),
            prefix: "  ".into(),
            ..PractitionerData::default()
        };
        let json = PractitionerMapper::to_value(&practitioner, WriteMode::Create).expect("json");
        assert!(json.get("name").is_none());
        assert_eq!(json["gender"], "female");

        let prefix_only = PractitionerData {
            prefix: "Dr".into(),
            ..PractitionerData::default()
        };
        let wire = PractitionerMapper::to_fhir(&prefix_only, WriteMode::Create);
        assert_eq!(wire.name.len(), 1);
        assert_eq!(wire.name[0].prefix, vec!["Dr"]);
    }

    #[test]
    fn maps_sort_fields() {
        assert_eq!(
            PractitionerMapper::map_sort_fields(
                &["family", "name", "birthDate"],
                &[
                    medrec_types::SortDirection::Asc,
                    medrec_types::SortDirection::Desc,
                    medrec_types::SortDirection::Desc,
                ]
            ),
            vec!["family", "-name", "-birthDate"]
        );
    }

    #[test]
    fn tolerates_missing_fields() {
        let practitioner =
            PractitionerMapper::parse(r#"{"resourceType": "Practitioner"}"#).expect("parse");
        assert_eq!(practitioner.full_name(), "");
        assert_eq!(practitioner.active, None);
        assert!(practitioner.address.is_empty());
    }

    #[test]
    fn validates_names() {
        assert_eq!(
            PractitionerMapper::validate(&PractitionerData::default()),
            vec!["Family name is required", "Given name is required"]
        );
        assert!(PractitionerMapper::validate(&sample()).is_empty());
    }

    #[test]
    fn maps_boolean_filter_and_name_search() {
        let request = ListRequest::with_filters(PractitionerFilters {
            active: Some(false),
            ..PractitionerFilters::default()
        })
        .search("smith");
        let params = PractitionerMapper::map_filters(&request);
        assert_eq!(params["active"], "false");
        assert_eq!(params["name"], "smith");
        assert_eq!(params.len(), 2);
    }
}
