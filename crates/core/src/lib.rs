//! # medrec core
//!
//! Service layer for the clinical-records mapping crates:
//! - [`CoreConfig`]: server location, default page size and timeout, resolved at startup
//! - [`FhirClient`]: the FHIR REST seam, with a reqwest-backed [`HttpFhirClient`]
//! - [`ResourceService`]: list/get/create/update/delete for one resource kind, driven by its
//!   [`fhir::ResourceMapper`]
//!
//! Records are validated before every write and never submitted when invalid.

pub mod client;
pub mod config;
pub mod error;
pub mod service;

pub use client::{FhirClient, HttpFhirClient};
pub use config::CoreConfig;
pub use error::{CoreError, CoreResult};
pub use service::ResourceService;

use fhir::{
    AllergyIntoleranceMapper, AppointmentMapper, ConditionMapper, EncounterMapper, FlagMapper,
    ListMapper, LocationMapper, MedicationMapper, MedicationRequestMapper, ObservationMapper,
    PractitionerMapper, ProcedureMapper,
};

pub type FlagService<C = HttpFhirClient> = ResourceService<FlagMapper, C>;
pub type ListService<C = HttpFhirClient> = ResourceService<ListMapper, C>;
pub type ObservationService<C = HttpFhirClient> = ResourceService<ObservationMapper, C>;
pub type ProcedureService<C = HttpFhirClient> = ResourceService<ProcedureMapper, C>;
pub type ConditionService<C = HttpFhirClient> = ResourceService<ConditionMapper, C>;
pub type AllergyIntoleranceService<C = HttpFhirClient> =
    ResourceService<AllergyIntoleranceMapper, C>;
pub type AppointmentService<C = HttpFhirClient> = ResourceService<AppointmentMapper, C>;
pub type EncounterService<C = HttpFhirClient> = ResourceService<EncounterMapper, C>;
pub type MedicationRequestService<C = HttpFhirClient> =
    ResourceService<MedicationRequestMapper, C>;
pub type PractitionerService<C = HttpFhirClient> = ResourceService<PractitionerMapper, C>;
pub type LocationService<C = HttpFhirClient> = ResourceService<LocationMapper, C>;
pub type MedicationService<C = HttpFhirClient> = ResourceService<MedicationMapper, C>;
