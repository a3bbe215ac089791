//! Shared primitive types for the medrec workspace.
//!
//! These types sit below both the FHIR mapping layer and the service layer:
//! - [`NonEmptyText`] for required free-text values and resource ids
//! - [`ListRequest`] and [`SortDirection`] for structured search requests
//! - [`SearchResult`] for uniform, resource-independent search pages

mod request;
mod search;

pub use request::{ListRequest, SortDirection};
pub use search::SearchResult;

#[derive(Debug, thiserror::Error)]
pub enum TextError {
    #[error("value is blank")]
    Blank,
}

/// Text with at least one non-whitespace character, stored trimmed.
///
/// Used wherever a blank string must count as "missing": required record fields before
/// submission and resource ids before they are put in a request path.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NonEmptyText(String);

impl NonEmptyText {
    pub fn new(input: impl AsRef<str>) -> Result<Self, TextError> {
        match input.as_ref().trim() {
            "" => Err(TextError::Blank),
            trimmed => Ok(Self(trimmed.to_string())),
        }
    }

    /// `None` for absent or blank input.
    pub fn from_optional(input: Option<impl AsRef<str>>) -> Option<Self> {
        input.and_then(|s| Self::new(s).ok())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl std::fmt::Display for NonEmptyText {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for NonEmptyText {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl serde::Serialize for NonEmptyText {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> serde::Deserialize<'de> for NonEmptyText {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::new(raw).map_err(serde::de::Error::custom)
    }
}
