//! Search query parameter construction.

use std::collections::BTreeMap;

/// Flat search parameter map sent to the server's search endpoint.
pub type QueryParams = BTreeMap<String, String>;

/// Builder that only emits defined, non-blank values.
#[derive(Clone, Debug, Default)]
pub struct QueryParamsBuilder {
    params: QueryParams,
}

impl QueryParamsBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put(mut self, key: &str, value: Option<&str>) -> Self {
        if let Some(value) = value.map(str::trim).filter(|v| !v.is_empty()) {
            self.params.insert(key.to_string(), value.to_string());
        }
        self
    }

    pub fn put_bool(self, key: &str, value: Option<bool>) -> Self {
        let value = value.map(|b| if b { "true" } else { "false" });
        self.put(key, value)
    }

    pub fn put_display<T: std::fmt::Display>(self, key: &str, value: Option<T>) -> Self {
        let value = value.map(|v| v.to_string());
        self.put(key, value.as_deref())
    }

    pub fn build(self) -> QueryParams {
        self.params
    }
}
