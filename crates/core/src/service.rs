//! Per-resource CRUD and search on top of a [`FhirClient`].
//!
//! A [`ResourceService`] performs exactly one request per call and applies its mapper
//! synchronously to the response.

use crate::client::FhirClient;
use crate::config::MAX_PAGE_SIZE;
use crate::{CoreConfig, CoreError, CoreResult};
use fhir::resources::observation::ObservationFilters;
use fhir::vitals::{group_by_vital_code, VITAL_SIGNS_CATEGORY};
use fhir::{
    Bundle, ListRequest, ObservationMapper, ResourceMapper, SearchResult, SortDirection,
    VitalSigns, WriteMode,
};
use medrec_types::NonEmptyText;
use serde_json::Value;
use std::marker::PhantomData;
use std::sync::Arc;

pub struct ResourceService<M, C> {
    client: Arc<C>,
    config: Arc<CoreConfig>,
    _mapper: PhantomData<fn() -> M>,
}

impl<M, C> Clone for ResourceService<M, C> {
    fn clone(&self) -> Self {
        Self {
            client: Arc::clone(&self.client),
            config: Arc::clone(&self.config),
            _mapper: PhantomData,
        }
    }
}

impl<M, C> ResourceService<M, C>
where
    M: ResourceMapper,
    C: FhirClient,
{
    pub fn new(client: Arc<C>, config: Arc<CoreConfig>) -> Self {
        Self {
            client,
            config,
            _mapper: PhantomData,
        }
    }

    /// Search for records. A request without a page size uses the configured default.
    pub async fn list(
        &self,
        mut request: ListRequest<M::Filters>,
    ) -> CoreResult<SearchResult<M::Record>> {
        if request.page_size.is_none() {
            request.page_size = Some(self.config.default_page_size());
        }
        let params = M::search_params(&request);
        tracing::debug!(resource_type = M::RESOURCE_TYPE, ?params, "search");

        let value = self.client.search(M::RESOURCE_TYPE, &params).await?;
        let bundle = Bundle::from_value(value)?;
        Ok(M::from_bundle(&bundle))
    }

    pub async fn get(&self, id: &str) -> CoreResult<M::Record> {
        let id = required_id(id)?;
        let value = self.client.read(M::RESOURCE_TYPE, id.as_str()).await?;
        Ok(M::from_value(value)?)
    }

    /// Validate and create. Returns the record as stored by the server, or the submitted
    /// record when the server answers with an empty body.
    pub async fn create(&self, record: &M::Record) -> CoreResult<M::Record> {
        check(M::validate(record), M::RESOURCE_TYPE)?;
        let body = M::to_value(record, WriteMode::Create)?;
        let value = self.client.create(M::RESOURCE_TYPE, &body).await?;
        stored_or_submitted::<M>(value, record)
    }

    /// Validate and update the resource with id `id`.
    ///
    /// The body always carries `id`, whatever the record itself holds.
    pub async fn update(&self, id: &str, record: &M::Record) -> CoreResult<M::Record> {
        let id = required_id(id)?;
        check(M::validate(record), M::RESOURCE_TYPE)?;

        let mut body = M::to_value(record, WriteMode::Update)?;
        if let Some(object) = body.as_object_mut() {
            object.insert("id".to_string(), Value::String(id.to_string()));
        }
        let value = self
            .client
            .update(M::RESOURCE_TYPE, id.as_str(), &body)
            .await?;
        stored_or_submitted::<M>(value, record)
    }

    pub async fn delete(&self, id: &str) -> CoreResult<()> {
        let id = required_id(id)?;
        self.client.delete(M::RESOURCE_TYPE, id.as_str()).await
    }
}

impl<C: FhirClient> ResourceService<ObservationMapper, C> {
    /// All vital-sign observations for a patient, newest first, grouped by vital sign.
    pub async fn vital_signs(&self, patient_id: &str) -> CoreResult<VitalSigns> {
        let patient_id = required_id(patient_id)?;
        let request = ListRequest::with_filters(ObservationFilters {
            patient_id: Some(patient_id.to_string()),
            category: Some(VITAL_SIGNS_CATEGORY.to_string()),
            ..ObservationFilters::default()
        })
        .page(1, MAX_PAGE_SIZE)
        .sort("effectiveDateTime", SortDirection::Desc);

        let result = self.list(request).await?;
        if result.has_next_page {
            tracing::warn!(
                patient_id = patient_id.as_str(),
                total = result.total,
                "vital signs truncated to first page"
            );
        }
        Ok(group_by_vital_code(&result.entry))
    }
}

fn stored_or_submitted<M: ResourceMapper>(
    value: Value,
    record: &M::Record,
) -> CoreResult<M::Record> {
    if value.is_null() {
        return Ok(record.clone());
    }
    Ok(M::from_value(value)?)
}

fn required_id(id: &str) -> CoreResult<NonEmptyText> {
    NonEmptyText::new(id).map_err(|_| CoreError::InvalidInput("id cannot be empty".into()))
}

fn check(errors: Vec<String>, resource_type: &str) -> CoreResult<()> {
    if errors.is_empty() {
        return Ok(());
    }
    tracing::debug!(resource_type, ?errors, "refusing to submit invalid record");
    Err(CoreError::Validation(errors))
}
