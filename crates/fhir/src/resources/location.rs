//! FHIR Location mapping.

use crate::coding::{
    concept_list, extract_coding, extract_first, optional_concept, CodedValue, CodingDefaults,
    LOCATION_PHYSICAL_TYPE, ROLE_CODE,
};
use crate::datatypes::{
    non_empty, telecom_from, telecom_value, Address, AddressData, CodeableConcept, ContactPoint,
    Reference,
};
use crate::mapper::{wire_resource, ResourceMapper, WriteMode};
use crate::query::{QueryParams, QueryParamsBuilder};
use crate::reference::{optional_reference, optional_reference_id, LOCATION, ORGANIZATION};
use crate::validation::Validator;
use medrec_types::ListRequest;
use serde::{Deserialize, Serialize};

// ============================================================================
// Public domain-level types
// ============================================================================

#[derive(Clone, Debug, Default, PartialEq)]
pub struct LocationData {
    /// Server-assigned id. `None` until created.
    pub id: Option<String>,

    /// `active`, `suspended`, `inactive`.
    pub status: String,
    /// Name as used by people.
    pub name: String,
    /// Additional detail about the location.
    pub description: String,
    /// `instance` or `kind`.
    pub mode: String,

    /// First location type (v3 RoleCode by default).
    pub location_type: CodedValue,
    /// Physical form: building, ward, room, ...
    pub physical_type: CodedValue,

    /// First phone contact.
    pub phone: String,
    /// First email contact.
    pub email: String,
    /// Postal address.
    pub address: AddressData,

    /// Organization id.
    pub managing_organization: Option<String>,
    /// Id of the parent location.
    pub part_of: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LocationFilters {
    pub status: Option<String>,
    pub location_type: Option<String>,
    pub organization_id: Option<String>,
    pub part_of_id: Option<String>,
    pub city: Option<String>,
}

// ============================================================================
// Wire types
// ============================================================================

#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
pub struct LocationWire {
    pub resource_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mode: Option<String>,
    #[serde(rename = "type", skip_serializing_if = "Vec::is_empty")]
    pub location_type: Vec<CodeableConcept>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub telecom: Vec<ContactPoint>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<Address>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub physical_type: Option<CodeableConcept>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub managing_organization: Option<Reference>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub part_of: Option<Reference>,
}

wire_resource!(LocationWire);

// ============================================================================
// Mapper
// ============================================================================

pub struct LocationMapper;

impl ResourceMapper for LocationMapper {
    const RESOURCE_TYPE: &'static str = "Location";
    const SORT_FIELDS: &'static [(&'static str, &'static str)] =
        &[("name", "name"), ("status", "status"), ("type", "type")];

    type Wire = LocationWire;
    type Record = LocationData;
    type Filters = LocationFilters;

    fn from_fhir(wire: &LocationWire) -> LocationData {
        LocationData {
            id: wire.id.clone(),
            status: wire.status.clone().unwrap_or_default(),
            name: wire.name.clone().unwrap_or_default(),
            description: wire.description.clone().unwrap_or_default(),
            mode: wire.mode.clone().unwrap_or_default(),
            location_type: extract_first(&wire.location_type, CodingDefaults::system(ROLE_CODE)),
            physical_type: extract_coding(
                wire.physical_type.as_ref(),
                CodingDefaults::system(LOCATION_PHYSICAL_TYPE),
            ),
            phone: telecom_value(&wire.telecom, "phone"),
            email: telecom_value(&wire.telecom, "email"),
            address: AddressData::from_wire(wire.address.as_ref()),
            managing_organization: optional_reference_id(
                wire.managing_organization.as_ref(),
                ORGANIZATION,
            ),
            part_of: optional_reference_id(wire.part_of.as_ref(), LOCATION),
        }
    }

    fn to_fhir(record: &LocationData, mode: WriteMode) -> LocationWire {
        LocationWire {
            resource_type: Self::RESOURCE_TYPE.to_string(),
            id: mode.id(record.id.as_deref()),
            status: non_empty(&record.status),
            name: non_empty(&record.name),
            description: non_empty(&record.description),
            mode: non_empty(&record.mode),
            location_type: concept_list(&record.location_type),
            telecom: telecom_from(&record.phone, &record.email),
            address: record.address.to_wire(),
            physical_type: optional_concept(&record.physical_type),
            managing_organization: optional_reference(
                ORGANIZATION,
                record.managing_organization.as_deref(),
            ),
            part_of: optional_reference(LOCATION, record.part_of.as_deref()),
        }
    }

    fn map_filters(request: &ListRequest<LocationFilters>) -> QueryParams {
        let f = &request.filters;
        QueryParamsBuilder::new()
            .put("status", f.status.as_deref())
            .put("type", f.location_type.as_deref())
            .put("organization", f.organization_id.as_deref())
            .put("partof", f.part_of_id.as_deref())
            .put("address-city", f.city.as_deref())
            .put("name", request.search.as_deref())
            .build()
    }

    fn validate(record: &LocationData) -> Vec<String> {
        Validator::new()
            .require(&record.name, "Name")
            .require(&record.status, "Status")
            .finish()
    }
}
