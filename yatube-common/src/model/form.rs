//! Per-field validation errors for submitted forms.

use serde::Serialize;
use std::collections::BTreeMap;
use thiserror::Error;

pub const REQUIRED: &str = "This field is required.";
pub const INVALID_CHOICE: &str =
    "Select a valid choice. That choice is not one of the available choices.";

#[derive(Clone, Eq, PartialEq, Debug, Default, Hash, Serialize, Error)]
#[serde(transparent)]
#[error("Submitted form had {} invalid field(s)", .0.len())]
pub struct FormErrors(BTreeMap<&'static str, Vec<String>>);

impl FormErrors {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, field: &'static str, message: impl Into<String>) {
        self.0.entry(field).or_default().push(message.into());
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[must_use]
    pub fn field(&self, field: &str) -> &[String] {
        self.0.get(field).map(Vec::as_slice).unwrap_or_default()
    }
}

/// Rejects blank input the same way an empty field is rejected.
pub(crate) fn require_text(errors: &mut FormErrors, field: &'static str, text: &str) {
    if text.trim().is_empty() {
        errors.add(field, REQUIRED);
    }
}

#[cfg(test)]
mod tests {
    use crate::model::form::{FormErrors, REQUIRED, require_text};

    #[test]
    fn collects_messages_per_field() {
        let mut errors = FormErrors::new();
        require_text(&mut errors, "text", "   \n");
        require_text(&mut errors, "title", "fine");
        errors.add("text", "again");

        assert_eq!(errors.field("text"), [REQUIRED, "again"]);
        assert!(errors.field("title").is_empty());
        assert!(!errors.is_empty());
        assert_eq!(errors, errors_with_text());
    }

    fn errors_with_text() -> FormErrors {
        let mut errors = FormErrors::new();
        errors.add("text", REQUIRED);
        errors.add("text", "again");
        errors
    }

    #[test]
    fn serializes_as_map() {
        let mut errors = FormErrors::new();
        errors.add("group", "bad");
        assert_eq!(
            serde_json::to_string(&errors).unwrap(),
            r#"{"group":["bad"]}"#
        );
        assert_eq!(serde_json::to_string(&FormErrors::new()).unwrap(), "{}");
    }
}
