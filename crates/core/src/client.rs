//! FHIR REST client.
//!
//! [`FhirClient`] is the seam between the services and the network: it moves raw JSON
//! resources and bundles and knows nothing about records or mappers.

use crate::{CoreConfig, CoreError, CoreResult};
use fhir::QueryParams;
use reqwest::Method;
use serde_json::Value;
use std::future::Future;

const FHIR_JSON: &str = "application/fhir+json";

/// The FHIR REST interactions the services rely on.
pub trait FhirClient: Send + Sync {
    /// `GET [base]/{type}/{id}`
    fn read(&self, resource_type: &str, id: &str)
        -> impl Future<Output = CoreResult<Value>> + Send;

    /// `GET [base]/{type}?params`, returning a `Bundle`.
    fn search(
        &self,
        resource_type: &str,
        params: &QueryParams,
    ) -> impl Future<Output = CoreResult<Value>> + Send;

    /// `POST [base]/{type}`
    fn create(
        &self,
        resource_type: &str,
        body: &Value,
    ) -> impl Future<Output = CoreResult<Value>> + Send;

    /// `PUT [base]/{type}/{id}`
    fn update(
        &self,
        resource_type: &str,
        id: &str,
        body: &Value,
    ) -> impl Future<Output = CoreResult<Value>> + Send;

    /// `DELETE [base]/{type}/{id}`
    fn delete(&self, resource_type: &str, id: &str)
        -> impl Future<Output = CoreResult<()>> + Send;
}

/// [`FhirClient`] over HTTP.
///
/// Every request carries `Accept: application/fhir+json` and a fresh `X-Request-Id`.
#[derive(Clone, Debug)]
pub struct HttpFhirClient {
    http: reqwest::Client,
    base_url: String,
}

impl HttpFhirClient {
    pub fn new(config: &CoreConfig) -> CoreResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()?;
        Ok(Self {
            http,
            base_url: config.base_url().to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    fn request(&self, method: Method, url: &str) -> reqwest::RequestBuilder {
        let request_id = uuid::Uuid::new_v4().to_string();
        tracing::debug!(%method, url, request_id, "FHIR request");
        self.http
            .request(method, url)
            .header(reqwest::header::ACCEPT, FHIR_JSON)
            .header("X-Request-Id", request_id)
    }
}

impl FhirClient for HttpFhirClient {
    async fn read(&self, resource_type: &str, id: &str) -> CoreResult<Value> {
        let url = self.url(&format!("{resource_type}/{id}"));
        let resp = self.request(Method::GET, &url).send().await?;
        handle_response(resp).await
    }

    async fn search(&self, resource_type: &str, params: &QueryParams) -> CoreResult<Value> {
        let url = self.url(resource_type);
        let resp = self
            .request(Method::GET, &url)
            .query(params)
            .send()
            .await?;
        handle_response(resp).await
    }

    async fn create(&self, resource_type: &str, body: &Value) -> CoreResult<Value> {
        let url = self.url(resource_type);
        let resp = self
            .request(Method::POST, &url)
            .header(reqwest::header::CONTENT_TYPE, FHIR_JSON)
            .json(body)
            .send()
            .await?;
        handle_response(resp).await
    }

    async fn update(&self, resource_type: &str, id: &str, body: &Value) -> CoreResult<Value> {
        let url = self.url(&format!("{resource_type}/{id}"));
        let resp = self
            .request(Method::PUT, &url)
            .header(reqwest::header::CONTENT_TYPE, FHIR_JSON)
            .json(body)
            .send()
            .await?;
        handle_response(resp).await
    }

    async fn delete(&self, resource_type: &str, id: &str) -> CoreResult<()> {
        let url = self.url(&format!("{resource_type}/{id}"));
        let resp = self.request(Method::DELETE, &url).send().await?;
        handle_response(resp).await.map(|_| ())
    }
}

async fn handle_response(resp: reqwest::Response) -> CoreResult<Value> {
    let status = resp.status();
    let body = resp.text().await?;

    if !status.is_success() {
        tracing::warn!(status = status.as_u16(), "FHIR server rejected request");
        return Err(CoreError::from_response(status.as_u16(), &body));
    }

    if body.trim().is_empty() {
        return Ok(Value::Null);
    }

    Ok(serde_json::from_str(&body)?)
}
