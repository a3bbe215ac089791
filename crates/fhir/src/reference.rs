//! Relative reference codec (`"ResourceType/id"`).
//!
//! Stripping is best-effort: a reference that does not carry the expected prefix is
//! returned unchanged, so absolute URLs and references to other resource types survive
//! a read as opaque strings.

use crate::datatypes::Reference;

pub const PATIENT: &str = "Patient";
pub const PRACTITIONER: &str = "Practitioner";
pub const LOCATION: &str = "Location";
pub const ENCOUNTER: &str = "Encounter";
pub const ORGANIZATION: &str = "Organization";
pub const MEDICATION: &str = "Medication";

/// Strip `"<expected_prefix>/"` from `reference` when present.
pub fn parse_reference(reference: &str, expected_prefix: Option<&str>) -> String {
    let Some(prefix) = expected_prefix else {
        return reference.to_string();
    };
    reference
        .strip_prefix(prefix)
        .and_then(|rest| rest.strip_prefix('/'))
        .unwrap_or(reference)
        .to_string()
}

/// `"<resource_type>/<id>"`.
///
/// No validation is applied: an empty `id` yields `"<resource_type>/"`.
pub fn build_reference(resource_type: &str, id: &str) -> String {
    format!("{resource_type}/{id}")
}

/// Bare id of an optional reference, or empty string.
pub fn reference_id(reference: Option<&Reference>, prefix: &str) -> String {
    reference
        .and_then(|r| r.reference.as_deref())
        .map(|r| parse_reference(r, Some(prefix)))
        .unwrap_or_default()
}

/// Bare id of an optional reference field, `None` when absent or blank.
pub fn optional_reference_id(reference: Option<&Reference>, prefix: &str) -> Option<String> {
    Some(reference_id(reference, prefix)).filter(|id| !id.is_empty())
}

/// True when `reference` points at a resource of `resource_type`.
pub fn is_reference_to(reference: &Reference, resource_type: &str) -> bool {
    reference
        .reference
        .as_deref()
        .and_then(|r| r.strip_prefix(resource_type))
        .is_some_and(|rest| rest.starts_with('/'))
}

pub fn to_reference(resource_type: &str, id: &str) -> Reference {
    Reference {
        reference: Some(build_reference(resource_type, id)),
        display: None,
    }
}

/// Reference for an optional field: `None` when `id` is absent or blank.
pub fn optional_reference(resource_type: &str, id: Option<&str>) -> Option<Reference> {
    id.filter(|id| !id.trim().is_empty())
        .map(|id| to_reference(resource_type, id))
}

/// Reference for one element of a repeated actor field.
///
/// Bare ids are typed as `resource_type`. Values already carrying a type (`"RelatedPerson/7"`)
/// pass through, so references read back unchanged by [`parse_reference`] survive a write.
pub fn actor_reference(resource_type: &str, id: &str) -> Option<Reference> {
    if id.trim().is_empty() {
        return None;
    }
    if id.contains('/') {
        return Some(Reference {
            reference: Some(id.to_string()),
            display: None,
        });
    }
    Some(to_reference(resource_type, id))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_expected_prefix() {
        assert_eq!(parse_reference("Patient/123", Some(PATIENT)), "123");
    }

    #[test]
    fn leaves_other_references_unchanged() {
        assert_eq!(
            parse_reference("Practitioner/9", Some(PATIENT)),
            "Practitioner/9"
        );
        assert_eq!(parse_reference("123", Some(PATIENT)), "123");
        assert_eq!(parse_reference("Patients/1", Some(PATIENT)), "Patients/1");
        assert_eq!(parse_reference("Patient/1", None), "Patient/1");
    }

    #[test]
    fn build_does_not_guard_empty_ids() {
        assert_eq!(build_reference(PATIENT, "42"), "Patient/42");
        assert_eq!(build_reference(PATIENT, ""), "Patient/");
    }

    #[test]
    fn reference_id_tolerates_absent_reference() {
        assert_eq!(reference_id(None, PATIENT), "");
        assert_eq!(reference_id(Some(&Reference::default()), PATIENT), "");
        assert_eq!(
            reference_id(Some(&to_reference(PRACTITIONER, "p1")), PRACTITIONER),
            "p1"
        );
    }

    #[test]
    fn optional_reference_id_is_none_when_blank() {
        assert_eq!(optional_reference_id(None, ENCOUNTER), None);
        assert_eq!(
            optional_reference_id(Some(&to_reference(ENCOUNTER, "e1")), ENCOUNTER).as_deref(),
            Some("e1")
        );
    }

    #[test]
    fn optional_reference_skips_blank_ids() {
        assert_eq!(optional_reference(LOCATION, None), None);
        assert_eq!(optional_reference(LOCATION, Some(" ")), None);
        assert_eq!(
            optional_reference(LOCATION, Some("l1")).and_then(|r| r.reference),
            Some("Location/l1".to_string())
        );
    }

    #[test]
    fn actor_reference_passes_typed_values_through() {
        let reference = |id| actor_reference(PRACTITIONER, id).and_then(|r| r.reference);
        assert_eq!(reference("dr-1").as_deref(), Some("Practitioner/dr-1"));
        assert_eq!(
            reference("RelatedPerson/7").as_deref(),
            Some("RelatedPerson/7")
        );
        assert_eq!(reference(""), None);
    }

    #[test]
    fn detects_reference_type() {
        let r = to_reference(PRACTITIONER, "p1");
        assert!(is_reference_to(&r, PRACTITIONER));
        assert!(!is_reference_to(&r, PATIENT));
        assert!(!is_reference_to(&Reference::default(), PATIENT));
    }
}
