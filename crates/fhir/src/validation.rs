//! Required-field checks run before create/update submission.
//!
//! Validation is advisory: it produces plain-language messages for the caller to show,
//! and the server remains authoritative.

use medrec_types::NonEmptyText;

/// Accumulates validation messages.
#[derive(Debug, Default)]
pub struct Validator {
    errors: Vec<String>,
}

impl Validator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Blank or whitespace-only values count as missing.
    pub fn require(self, value: &str, label: &str) -> Self {
        let present = NonEmptyText::new(value).is_ok();
        self.check(present, &missing(label))
    }

    pub fn require_some<T>(self, value: Option<T>, label: &str) -> Self {
        self.check(value.is_some(), &missing(label))
    }

    pub fn require_non_empty<T>(self, values: &[T], label: &str) -> Self {
        self.check(!values.is_empty(), &missing(label))
    }

    pub fn check(mut self, condition: bool, message: &str) -> Self {
        if !condition {
            self.errors.push(message.to_string());
        }
        self
    }

    pub fn finish(self) -> Vec<String> {
        self.errors
    }
}

fn missing(label: &str) -> String {
    format!("{label} is required")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collects_messages_in_order() {
        let errors = Validator::new()
            .require("", "Status")
            .require("active", "Code")
            .require("  ", "Subject")
            .require_some(None::<f64>, "Value")
            .require_non_empty::<String>(&[], "Entries")
            .check(false, "End must not be before start")
            .finish();
        assert_eq!(
            errors,
            vec![
                "Status is required",
                "Subject is required",
                "Value is required",
                "Entries is required",
                "End must not be before start",
            ]
        );
    }

    #[test]
    fn empty_when_everything_present() {
        let errors = Validator::new()
            .require("x", "A")
            .require_some(Some(1), "B")
            .finish();
        assert!(errors.is_empty());
    }
}
