//! FHIR List mapping.
//!
//! A List is a curated collection of references (for example a problem list or a
//! medication list). Its `mode` controls the meaning of entries: only a `changes`
//! list may mark an entry as deleted.

use crate::coding::{extract_coding, optional_concept, CodedValue, CodingDefaults, LIST_CODE};
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

/// The only list mode in which `entry[].deleted` is meaningful.
pub const MODE_CHANGES: &str = "changes";

// ============================================================================
// Public domain-level types
// ============================================================================

#[derive(Clone, Debug, Default, PartialEq)]
pub struct ListData {
    /// Server-assigned id. `None` until created.
    pub id: Option<String>,

    /// `current`, `retired` or `entered-in-error`.
    pub status: String,

    /// `working`, `snapshot` or `changes`.
    pub mode: String,

    /// Human-readable list title.
    pub title: Option<String>,

    /// What the list is for (list-example-use-codes by default).
    pub code: String,
    /// Display text of `code`.
    pub display: String,
    /// Coding system of `code`.
    pub system: String,

    /// Patient id.
    pub subject: String,
    /// Encounter id.
    pub encounter: Option<String>,
    /// When the list was prepared.
    pub date: Option<String>,

    /// Practitioner id of the list author.
    pub source: Option<String>,

    /// Why the list is empty. Only sent when there are no entries.
    pub empty_reason: CodedValue,

    /// Text of the first note.
    pub note: String,
    /// Entries in list order.
    pub entries: Vec<ListEntryData>,
}

/// One list entry.
///
/// `item` keeps the full relative reference (`"Condition/123"`) since entries may point
/// at any resource type.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ListEntryData {
    /// Reference of the listed resource.
    pub item: String,
    /// Display of the item reference.
    pub item_display: Option<String>,
    /// When the item was added.
    pub date: Option<String>,
    /// Workflow flag for the entry.
    pub flag: CodedValue,
    /// Removed from the list. Only written in `changes` mode.
    pub deleted: bool,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ListFilters {
    pub patient_id: Option<String>,
    pub status: Option<String>,
    pub code: Option<String>,
    pub encounter_id: Option<String>,
}

// ============================================================================
// Wire types
// ============================================================================

#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ListWire {
    pub resource_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mode: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<CodeableConcept>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject: Option<Reference>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub encounter: Option<Reference>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<Reference>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub note: Vec<Annotation>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub entry: Vec<ListEntryWire>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub empty_reason: Option<CodeableConcept>,
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ListEntryWire {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub flag: Option<CodeableConcept>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deleted: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub item: Option<Reference>,
}

wire_resource!(ListWire);

// ============================================================================
// Mapper
// ============================================================================

pub struct ListMapper;

impl ResourceMapper for ListMapper {
    const RESOURCE_TYPE: &'static str = "List";
    const SORT_FIELDS: &'static [(&'static str, &'static str)] = &[
        ("date", "date"),
        ("title", "title"),
        ("status", "status"),
        ("code", "code"),
    ];

    type Wire = ListWire;
    type Record = ListData;
    type Filters = ListFilters;

    fn from_fhir(wire: &ListWire) -> ListData {
        let code = extract_coding(wire.code.as_ref(), CodingDefaults::system(LIST_CODE));

        ListData {
            id: wire.id.clone(),
            status: wire.status.clone().unwrap_or_default(),
            mode: wire.mode.clone().unwrap_or_default(),
            title: wire.title.clone(),
            code: code.code,
            display: code.display,
            system: code.system,
            subject: reference_id(wire.subject.as_ref(), PATIENT),
            encounter: optional_reference_id(wire.encounter.as_ref(), ENCOUNTER),
            date: wire.date.clone(),
            source: optional_reference_id(wire.source.as_ref(), PRACTITIONER),
            empty_reason: extract_coding(wire.empty_reason.as_ref(), CodingDefaults::NONE),
            note: first_note(&wire.note),
            entries: wire.entry.iter().map(entry_from_wire).collect(),
        }
    }

    fn to_fhir(record: &ListData, mode: WriteMode) -> ListWire {
        let track_deletions = record.mode == MODE_CHANGES;
        let entry: Vec<ListEntryWire> = record
            .entries
            .iter()
            .map(|e| entry_to_wire(e, track_deletions))
            .collect();
        let empty_reason = if entry.is_empty() {
            optional_concept(&record.empty_reason)
        } else {
            None
        };

        ListWire {
            resource_type: Self::RESOURCE_TYPE.to_string(),
            id: mode.id(record.id.as_deref()),
            status: non_empty(&record.status),
            mode: non_empty(&record.mode),
            title: record.title.as_deref().and_then(non_empty),
            code: optional_concept(&CodedValue::new(
                &record.system,
                &record.code,
                &record.display,
            )),
            subject: Some(to_reference(PATIENT, &record.subject)),
            encounter: optional_reference(ENCOUNTER, record.encounter.as_deref()),
            date: record.date.as_deref().and_then(non_empty),
            source: optional_reference(PRACTITIONER, record.source.as_deref()),
            note: note_from(&record.note),
            entry,
            empty_reason,
        }
    }

    fn map_filters(request: &ListRequest<ListFilters>) -> QueryParams {
        let f = &request.filters;
        QueryParamsBuilder::new()
            .put("patient", f.patient_id.as_deref())
            .put("status", f.status.as_deref())
            .put("code", f.code.as_deref())
            .put("encounter", f.encounter_id.as_deref())
            .put("title", request.search.as_deref())
            .build()
    }

    fn validate(record: &ListData) -> Vec<String> {
        Validator::new()
            .require(&record.status, "Status")
            .require(&record.mode, "Mode")
            .require(&record.code, "Code")
            .require(&record.subject, "Subject")
            .check(
                record.entries.iter().all(|e| !e.item.trim().is_empty()),
                "Every entry must reference an item",
            )
            .finish()
    }
}

fn entry_from_wire(entry: &ListEntryWire) -> ListEntryData {
    let item = entry.item.as_ref();
    ListEntryData {
        item: item.and_then(|i| i.reference.clone()).unwrap_or_default(),
        item_display: item.and_then(|i| i.display.clone()),
        date: entry.date.clone(),
        flag: extract_coding(entry.flag.as_ref(), CodingDefaults::NONE),
        deleted: entry.deleted.unwrap_or(false),
    }
}

fn entry_to_wire(entry: &ListEntryData, track_deletions: bool) -> ListEntryWire {
    ListEntryWire {
        flag: optional_concept(&entry.flag),
        deleted: (track_deletions && entry.deleted).then_some(true),
        date: entry.date.as_deref().and_then(non_empty),
        item: Some(Reference {
            reference: Some(entry.item.clone()),
            display: entry.item_display.as_deref().and_then(non_empty),
        }),
    }
}
