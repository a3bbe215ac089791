//! One mapper per FHIR resource kind.
//!
//! Each module defines the flat record, the wire model, the filter set and a zero-sized
//! mapper type implementing [`crate::ResourceMapper`].

pub mod allergy_intolerance;
pub mod appointment;
pub mod condition;
pub mod encounter;
pub mod flag;
pub mod list;
pub mod location;
pub mod medication;
pub mod medication_request;
pub mod observation;
pub mod practitioner;
pub mod procedure;
