//! FHIR Encounter mapping.

use crate::coding::{
    build_coding, concept_list, extract_first, extract_plain_coding, CodedValue, CodingDefaults,
    ACT_CODE, SNOMED,
};
use crate::datatypes::{non_empty, CodeableConcept, Coding, Period, Reference};
use crate::mapper::{wire_resource, ResourceMapper, WriteMode};
use crate::query::{QueryParams, QueryParamsBuilder};
use crate::reference::{
    actor_reference, optional_reference, optional_reference_id, reference_id, to_reference,
    LOCATION, ORGANIZATION, PATIENT, PRACTITIONER,
};
use crate::validation::Validator;
use medrec_types::ListRequest;
use serde::{Deserialize, Serialize};

// ============================================================================
// Public domain-level types
// ============================================================================

#[derive(Clone, Debug, Default, PartialEq)]
pub struct EncounterData {
    /// Server-assigned id. `None` until created.
    pub id: Option<String>,

    /// `planned`, `arrived`, `in-progress`, `finished`, `cancelled`, ...
    pub status: String,
    /// `AMB`, `IMP`, `EMER`, ... (v3 ActCode by default).
    pub class: CodedValue,
    /// First encounter type (SNOMED CT by default).
    pub encounter_type: CodedValue,

    /// Patient id.
    pub subject: String,
    /// `participant[].individual`. Practitioner ids, or full references for other types.
    pub practitioner_ids: Vec<String>,
    /// `location[].location`. Location ids, or full references for other servers.
    pub location_ids: Vec<String>,
    /// Organization id.
    pub service_provider: Option<String>,

    /// Start of the encounter.
    pub period_start: String,
    /// End of the encounter, `None` while in progress.
    pub period_end: Option<String>,

    /// First reason code.
    pub reason: CodedValue,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct EncounterFilters {
    pub patient_id: Option<String>,
    pub practitioner_id: Option<String>,
    pub location_id: Option<String>,
    pub status: Option<String>,
    pub class: Option<String>,
    pub date: Option<String>,
}

// ============================================================================
// Wire types
// ============================================================================

#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EncounterWire {
    pub resource_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub class: Option<Coding>,
    #[serde(rename = "type", skip_serializing_if = "Vec::is_empty")]
    pub encounter_type: Vec<CodeableConcept>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject: Option<Reference>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub participant: Vec<EncounterParticipantWire>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub period: Option<Period>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub reason_code: Vec<CodeableConcept>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub location: Vec<EncounterLocationWire>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service_provider: Option<Reference>,
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EncounterParticipantWire {
    #[serde(rename = "type", skip_serializing_if = "Vec::is_empty")]
    pub participant_type: Vec<CodeableConcept>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub individual: Option<Reference>,
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EncounterLocationWire {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<Reference>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

wire_resource!(EncounterWire);

// ============================================================================
// Mapper
// ============================================================================

pub struct EncounterMapper;

impl ResourceMapper for EncounterMapper {
    const RESOURCE_TYPE: &'static str = "Encounter";
    const SORT_FIELDS: &'static [(&'static str, &'static str)] = &[
        ("periodStart", "date"),
        ("status", "status"),
        ("classCode", "class"),
        ("type", "type"),
    ];

    type Wire = EncounterWire;
    type Record = EncounterData;
    type Filters = EncounterFilters;

    fn from_fhir(wire: &EncounterWire) -> EncounterData {
        let period = wire.period.as_ref();

        EncounterData {
            id: wire.id.clone(),
            status: wire.status.clone().unwrap_or_default(),
            class: extract_plain_coding(wire.class.as_ref(), CodingDefaults::system(ACT_CODE)),
            encounter_type: extract_first(&wire.encounter_type, CodingDefaults::system(SNOMED)),
            subject: reference_id(wire.subject.as_ref(), PATIENT),
            practitioner_ids: wire
                .participant
                .iter()
                .filter_map(|p| optional_reference_id(p.individual.as_ref(), PRACTITIONER))
                .collect(),
            location_ids: wire
                .location
                .iter()
                .filter_map(|l| optional_reference_id(l.location.as_ref(), LOCATION))
                .collect(),
            service_provider: optional_reference_id(
                wire.service_provider.as_ref(),
                ORGANIZATION,
            ),
            period_start: period.and_then(|p| p.start.clone()).unwrap_or_default(),
            period_end: period.and_then(|p| p.end.clone()),
            reason: extract_first(&wire.reason_code, CodingDefaults::system(SNOMED)),
        }
    }

    fn to_fhir(record: &EncounterData, mode: WriteMode) -> EncounterWire {
        EncounterWire {
            resource_type: Self::RESOURCE_TYPE.to_string(),
            id: mode.id(record.id.as_deref()),
            status: non_empty(&record.status),
            class: (!record.class.is_empty()).then(|| {
                build_coding(&record.class.system, &record.class.code, &record.class.display)
            }),
            encounter_type: concept_list(&record.encounter_type),
            subject: Some(to_reference(PATIENT, &record.subject)),
            participant: record
                .practitioner_ids
                .iter()
                .filter_map(|id| actor_reference(PRACTITIONER, id))
                .map(|individual| EncounterParticipantWire {
                    participant_type: Vec::new(),
                    individual: Some(individual),
                })
                .collect(),
            period: Period::from_bounds(&record.period_start, record.period_end.as_deref()),
            reason_code: concept_list(&record.reason),
            location: record
                .location_ids
                .iter()
                .filter_map(|id| actor_reference(LOCATION, id))
                .map(|location| EncounterLocationWire {
                    location: Some(location),
                    status: None,
                })
                .collect(),
            service_provider: optional_reference(
                ORGANIZATION,
                record.service_provider.as_deref(),
            ),
        }
    }

    fn map_filters(request: &ListRequest<EncounterFilters>) -> QueryParams {
        let f = &request.filters;
        QueryParamsBuilder::new()
            .put("patient", f.patient_id.as_deref())
            .put("practitioner", f.practitioner_id.as_deref())
            .put("location", f.location_id.as_deref())
            .put("status", f.status.as_deref())
            .put("class", f.class.as_deref())
            .put("date", f.date.as_deref())
            .put("type:text", request.search.as_deref())
            .build()
    }

    fn validate(record: &EncounterData) -> Vec<String> {
        Validator::new()
            .require(&record.status, "Status")
            .require(&record.class.code, "Class")
            .require(&record.subject, "Subject")
            .require(&record.period_start, "Period start")
            .finish()
    }
}
