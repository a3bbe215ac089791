//! FHIR Appointment mapping.
//!
//! Patient, practitioners and location all live in `participant[]`; they are told apart
//! by the resource type of each participant's actor reference. The full participant list
//! is kept on the record as well, so participation status and actors of other types
//! survive an update.

use crate::coding::{
    concept_list, concept_or_text, extract_coding, extract_first, optional_concept, CodedValue,
    CodingDefaults, APPOINTMENT_TYPE, SERVICE_TYPE, SNOMED,
};
use crate::datatypes::{non_empty, CodeableConcept, Reference};
use crate::mapper::{wire_resource, ResourceMapper, WriteMode};
use crate::query::{QueryParams, QueryParamsBuilder};
use crate::reference::{
    actor_reference, build_reference, is_reference_to, parse_reference, LOCATION, PATIENT,
    PRACTITIONER,
};
use crate::validation::Validator;
use chrono::DateTime;
use medrec_types::ListRequest;
use serde::{Deserialize, Serialize};

/// Participation written for actors that are not yet on the appointment.
const PARTICIPANT_REQUIRED: &str = "required";
const PARTICIPANT_ACCEPTED: &str = "accepted";

/// Actor types surfaced as flat record fields.
const FLAT_ACTOR_TYPES: [&str; 3] = [PATIENT, PRACTITIONER, LOCATION];

// ============================================================================
// Public domain-level types
// ============================================================================

#[derive(Clone, Debug, Default, PartialEq)]
pub struct AppointmentData {
    /// Server-assigned id. `None` until created.
    pub id: Option<String>,

    /// `proposed`, `booked`, `arrived`, `fulfilled`, `cancelled`, ...
    pub status: String,
    /// First service type.
    pub service_type: CodedValue,
    /// Style of appointment (routine, walk-in, ...).
    pub appointment_type: CodedValue,
    /// First reason code.
    pub reason: CodedValue,

    /// Shown in lists and on the booking.
    pub description: String,
    /// Start instant, ISO 8601.
    pub start: String,
    /// End instant, ISO 8601.
    pub end: String,
    /// Booked length in minutes.
    pub minutes_duration: Option<u32>,
    /// Extra booking notes.
    pub comment: String,

    /// Patient id of the first patient participant.
    pub patient: String,
    /// Practitioner ids of the practitioner participants, in order.
    pub practitioner_ids: Vec<String>,
    /// Location id of the first location participant.
    pub location: Option<String>,

    /// Every participant as read, in server order.
    ///
    /// The patient, practitioner and location entries follow the flat fields above on
    /// write; any other entry is written back unchanged.
    pub participants: Vec<AppointmentParticipantData>,
}

/// One `participant[]` element.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct AppointmentParticipantData {
    /// Full actor reference (`"RelatedPerson/rp-1"`), empty for role-only participants.
    pub actor: String,
    /// Display of the actor reference.
    pub actor_display: String,
    /// First `type[]` role.
    pub role: CodedValue,
    /// `required`, `optional`, `information-only`.
    pub required: String,
    /// `accepted`, `declined`, `tentative`, `needs-action`.
    pub status: String,
}

impl AppointmentParticipantData {
    fn added(actor: String) -> Self {
        Self {
            actor,
            required: PARTICIPANT_REQUIRED.to_string(),
            status: PARTICIPANT_ACCEPTED.to_string(),
            ..Self::default()
        }
    }

    fn is_empty(&self) -> bool {
        self.actor.trim().is_empty()
            && self.role.is_empty()
            && self.role.display.trim().is_empty()
            && self.required.trim().is_empty()
            && self.status.trim().is_empty()
    }

    /// True when the actor is one of the types held in the flat record fields.
    fn has_flat_actor(&self) -> bool {
        self.actor
            .split_once('/')
            .is_some_and(|(resource_type, _)| FLAT_ACTOR_TYPES.contains(&resource_type))
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AppointmentFilters {
    pub patient_id: Option<String>,
    pub practitioner_id: Option<String>,
    pub location_id: Option<String>,
    pub status: Option<String>,
    pub date: Option<String>,
}

// ============================================================================
// Wire types
// ============================================================================

#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AppointmentWire {
    pub resource_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub service_type: Vec<CodeableConcept>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub appointment_type: Option<CodeableConcept>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub reason_code: Vec<CodeableConcept>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub minutes_duration: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub participant: Vec<AppointmentParticipantWire>,
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AppointmentParticipantWire {
    #[serde(rename = "type", skip_serializing_if = "Vec::is_empty")]
    pub participant_type: Vec<CodeableConcept>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub actor: Option<Reference>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub required: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

wire_resource!(AppointmentWire);

// ============================================================================
// Mapper
// ============================================================================

pub struct AppointmentMapper;

impl ResourceMapper for AppointmentMapper {
    const RESOURCE_TYPE: &'static str = "Appointment";
    const SORT_FIELDS: &'static [(&'static str, &'static str)] = &[
        ("start", "date"),
        ("status", "status"),
        ("serviceType", "service-type"),
    ];

    type Wire = AppointmentWire;
    type Record = AppointmentData;
    type Filters = AppointmentFilters;

    fn from_fhir(wire: &AppointmentWire) -> AppointmentData {
        let actors: Vec<&Reference> = wire
            .participant
            .iter()
            .filter_map(|p| p.actor.as_ref())
            .collect();
        let ids_of = |resource_type: &str| -> Vec<String> {
            actors
                .iter()
                .filter(|r| is_reference_to(r, resource_type))
                .filter_map(|r| r.reference.as_deref())
                .map(|r| parse_reference(r, Some(resource_type)))
                .collect()
        };

        AppointmentData {
            id: wire.id.clone(),
            status: wire.status.clone().unwrap_or_default(),
            service_type: extract_first(&wire.service_type, CodingDefaults::system(SERVICE_TYPE)),
            appointment_type: extract_coding(
                wire.appointment_type.as_ref(),
                CodingDefaults::system(APPOINTMENT_TYPE),
            ),
            reason: extract_first(&wire.reason_code, CodingDefaults::system(SNOMED)),
            description: wire.description.clone().unwrap_or_default(),
            start: wire.start.clone().unwrap_or_default(),
            end: wire.end.clone().unwrap_or_default(),
            minutes_duration: wire.minutes_duration,
            comment: wire.comment.clone().unwrap_or_default(),
            patient: ids_of(PATIENT).into_iter().next().unwrap_or_default(),
            practitioner_ids: ids_of(PRACTITIONER),
            location: ids_of(LOCATION).into_iter().next(),
            participants: wire.participant.iter().map(participant_from_wire).collect(),
        }
    }

    fn to_fhir(record: &AppointmentData, mode: WriteMode) -> AppointmentWire {
        AppointmentWire {
            resource_type: Self::RESOURCE_TYPE.to_string(),
            id: mode.id(record.id.as_deref()),
            status: non_empty(&record.status),
            service_type: concept_list(&record.service_type),
            appointment_type: optional_concept(&record.appointment_type),
            reason_code: concept_list(&record.reason),
            description: non_empty(&record.description),
            start: non_empty(&record.start),
            end: non_empty(&record.end),
            minutes_duration: record.minutes_duration,
            comment: non_empty(&record.comment),
            participant: merged_participants(record)
                .iter()
                .map(participant_to_wire)
                .collect(),
        }
    }

    fn map_filters(request: &ListRequest<AppointmentFilters>) -> QueryParams {
        let f = &request.filters;
        QueryParamsBuilder::new()
            .put("patient", f.patient_id.as_deref())
            .put("practitioner", f.practitioner_id.as_deref())
            .put("location", f.location_id.as_deref())
            .put("status", f.status.as_deref())
            .put("date", f.date.as_deref())
            .put("service-type:text", request.search.as_deref())
            .build()
    }

    fn validate(record: &AppointmentData) -> Vec<String> {
        Validator::new()
            .require(&record.status, "Status")
            .require(&record.start, "Start")
            .require(&record.end, "End")
            .require(&record.patient, "Patient")
            .check(
                !ends_before_start(&record.start, &record.end),
                "End must not be before start",
            )
            .finish()
    }
}

// ============================================================================
// Helpers
// ============================================================================

fn participant_from_wire(participant: &AppointmentParticipantWire) -> AppointmentParticipantData {
    let actor = participant.actor.as_ref();
    AppointmentParticipantData {
        actor: actor.and_then(|r| r.reference.clone()).unwrap_or_default(),
        actor_display: actor.and_then(|r| r.display.clone()).unwrap_or_default(),
        role: extract_first(&participant.participant_type, CodingDefaults::NONE),
        required: participant.required.clone().unwrap_or_default(),
        status: participant.status.clone().unwrap_or_default(),
    }
}

fn participant_to_wire(participant: &AppointmentParticipantData) -> AppointmentParticipantWire {
    AppointmentParticipantWire {
        participant_type: concept_or_text(&participant.role).into_iter().collect(),
        actor: non_empty(&participant.actor).map(|reference| Reference {
            reference: Some(reference),
            display: non_empty(&participant.actor_display),
        }),
        required: non_empty(&participant.required),
        status: non_empty(&participant.status),
    }
}

/// Merge the flat actor fields into the stored participant list.
///
/// Existing entries keep their position and participation. Flat-typed entries no longer
/// named by the record are dropped. Actors new to the appointment are appended patient
/// first, then practitioners, then location.
fn merged_participants(record: &AppointmentData) -> Vec<AppointmentParticipantData> {
    let mut wanted: Vec<String> = std::iter::once(build_reference(PATIENT, &record.patient))
        .chain(
            record
                .practitioner_ids
                .iter()
                .filter_map(|id| actor_reference(PRACTITIONER, id)?.reference),
        )
        .chain(
            record
                .location
                .as_deref()
                .and_then(|id| actor_reference(LOCATION, id)?.reference),
        )
        .collect();

    let mut participants = Vec::new();
    for existing in &record.participants {
        if existing.has_flat_actor() {
            if let Some(pos) = wanted.iter().position(|actor| *actor == existing.actor) {
                wanted.remove(pos);
                participants.push(existing.clone());
            }
        } else if !existing.is_empty() {
            participants.push(existing.clone());
        }
    }
    participants.extend(wanted.into_iter().map(AppointmentParticipantData::added));
    participants
}

/// True only when both instants parse and `end` precedes `start`.
fn ends_before_start(start: &str, end: &str) -> bool {
    match (
        DateTime::parse_from_rfc3339(start),
        DateTime::parse_from_rfc3339(end),
    ) {
        (Ok(start), Ok(end)) => end < start,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
      "resourceType": "Appointment",
      "id": "appt-1",
      "status": "booked",
      "serviceType": [{"coding": [{"code": "57", "display": "Immunization"}]}],
      "description": "Flu jab",
      "start": "2024-10-01T09:00:00Z",
      "end": "2024-10-01T09:15:00Z",
      "minutesDuration": 15,
      "participant": [
        {"actor": {"reference": "Practitioner/dr-1"}, "status": "accepted"},
        {"actor": {"reference": "Patient/p-1"}, "status": "accepted"},
        {"actor": {"reference": "Location/clinic-3"}, "status": "accepted"},
        {"actor": {"reference": "Practitioner/nurse-2"}, "status": "tentative"},
        {"type": [{"text": "no actor"}], "status": "needs-action"}
      ]
    }"#;

    fn sample() -> AppointmentData {
        AppointmentMapper::parse(SAMPLE).expect("parse appointment")
    }

    #[test]
    fn splits_participants_by_reference_type() {
        let appointment = sample();
        assert_eq!(appointment.patient, "p-1");
        assert_eq!(appointment.practitioner_ids, vec!["dr-1", "nurse-2"]);
        assert_eq!(appointment.location.as_deref(), Some("clinic-3"));
        assert_eq!(appointment.service_type.system, SERVICE_TYPE);
        assert_eq!(appointment.minutes_duration, Some(15));
    }

    #[test]
    fn writes_new_participants_patient_first() {
        let appointment = AppointmentData {
            participants: Vec::new(),
            ..sample()
        };
        let wire = AppointmentMapper::to_fhir(&appointment, WriteMode::Create);
        let references: Vec<_> = wire
            .participant
            .iter()
            .filter_map(|p| p.actor.as_ref()?.reference.clone())
            .collect();
        assert_eq!(
            references,
            vec![
                "Patient/p-1",
                "Practitioner/dr-1",
                "Practitioner/nurse-2",
                "Location/clinic-3",
            ]
        );
        assert!(wire.id.is_none());
        assert!(wire.appointment_type.is_none());
        assert!(wire
            .participant
            .iter()
            .all(|p| p.status.as_deref() == Some("accepted")
                && p.required.as_deref() == Some("required")));
    }

    #[test]
    fn update_keeps_participation_and_other_actors() {
        let appointment = AppointmentMapper::parse(
            r#"{
              "resourceType": "Appointment",
              "id": "appt-2",
              "status": "proposed",
              "participant": [
                {"actor": {"reference": "Patient/p-1"}, "status": "needs-action"},
                {"actor": {"reference": "RelatedPerson/rp-1", "display": "Mum"}, "status": "tentative"}
              ]
            }"#,
        )
        .expect("parse");
        let appointment = AppointmentData {
            description: "Moved to the afternoon".into(),
            ..appointment
        };

        let json = AppointmentMapper::to_value(&appointment, WriteMode::Update).expect("json");
        let participants = json["participant"].as_array().expect("participants");
        assert_eq!(participants.len(), 2);
        assert_eq!(participants[0]["actor"]["reference"], "Patient/p-1");
        assert_eq!(participants[0]["status"], "needs-action");
        assert!(participants[0].get("required").is_none());
        assert_eq!(participants[1]["actor"]["reference"], "RelatedPerson/rp-1");
        assert_eq!(participants[1]["actor"]["display"], "Mum");
        assert_eq!(participants[1]["status"], "tentative");
    }

    #[test]
    fn follows_edits_to_flat_actor_fields() {
        let appointment = AppointmentData {
            practitioner_ids: vec!["nurse-2".into(), "dr-9".into()],
            location: None,
            ..sample()
        };
        let wire = AppointmentMapper::to_fhir(&appointment, WriteMode::Update);
        let actors: Vec<_> = wire
            .participant
            .iter()
            .map(|p| {
                (
                    p.actor.as_ref().and_then(|a| a.reference.clone()),
                    p.status.clone(),
                )
            })
            .collect();
        assert_eq!(
            actors,
            vec![
                (Some("Patient/p-1".to_string()), Some("accepted".to_string())),
                (Some("Practitioner/nurse-2".to_string()), Some("tentative".to_string())),
                (None, Some("needs-action".to_string())),
                (Some("Practitioner/dr-9".to_string()), Some("accepted".to_string())),
            ]
        );
        assert_eq!(wire.participant[2].participant_type[0].text.as_deref(), Some("no actor"));
    }

    #[test]
    fn maps_sort_fields() {
        assert_eq!(
            AppointmentMapper::map_sort_fields(
                &["start", "serviceType"],
                &[medrec_types::SortDirection::Desc, medrec_types::SortDirection::Asc]
            ),
            vec!["-date", "service-type"]
        );
    }

    #[test]
    fn round_trips() {
        let appointment = sample();
        let wire = AppointmentMapper::to_fhir(&appointment, WriteMode::Update);
        assert_eq!(AppointmentMapper::from_fhir(&wire), appointment);
    }

    #[test]
    fn tolerates_missing_fields() {
        let appointment =
            AppointmentMapper::parse(r#"{"resourceType": "Appointment"}"#).expect("parse");
        assert_eq!(appointment.patient, "");
        assert!(appointment.practitioner_ids.is_empty());
        assert_eq!(appointment.location, None);
        assert_eq!(appointment.minutes_duration, None);
        assert!(appointment.participants.is_empty());
    }

    #[test]
    fn rejects_end_before_start() {
        let appointment = AppointmentData {
            end: "2024-10-01T08:59:00Z".into(),
            ..sample()
        };
        assert_eq!(
            AppointmentMapper::validate(&appointment),
            vec!["End must not be before start"]
        );
        assert!(AppointmentMapper::validate(&sample()).is_empty());
    }

    #[test]
    fn reports_missing_fields_without_ordering_error() {
        assert_eq!(
            AppointmentMapper::validate(&AppointmentData::default()),
            vec![
                "Status is required",
                "Start is required",
                "End is required",
                "Patient is required",
            ]
        );
    }

    #[test]
    fn maps_filters_and_search() {
        let request = ListRequest::with_filters(AppointmentFilters {
            practitioner_id: Some("dr-1".into()),
            date: Some("ge2024-10-01".into()),
            ..AppointmentFilters::default()
        })
        .search("flu");
        let params = AppointmentMapper::map_filters(&request);
        assert_eq!(params["practitioner"], "dr-1");
        assert_eq!(params["date"], "ge2024-10-01");
        assert_eq!(params["service-type:text"], "flu");
    }
}
