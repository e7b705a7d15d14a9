// Field-level validation errors
//
// The backend reports form validation problems as
// `{"errors": [{"property": "text", "context": "greeting", "errors": ["..."]}]}`.
// The gateway forwards every entry here; forms query by (property, context).

use std::sync::{Arc, RwLock};

use serde::{Deserialize, Serialize};
use tracing::debug;

/// Errors for one property within one form context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationError {
    pub property: String,
    #[serde(default)]
    pub context: String,
    #[serde(default)]
    pub errors: Vec<String>,
}

/// Body shape that marks a response as carrying validation errors.
#[derive(Debug, Deserialize)]
pub(crate) struct ValidationPayload {
    pub errors: Vec<ValidationError>,
}

impl ValidationPayload {
    /// Extract validation entries from a raw response body, if any.
    pub(crate) fn extract(body: &str) -> Option<Vec<ValidationError>> {
        serde_json::from_str::<Self>(body)
            .ok()
            .map(|p| p.errors)
            .filter(|errors| !errors.is_empty())
    }
}

/// Shared registry of the latest validation errors, keyed by
/// `(property, context)`. Cheap to clone.
#[derive(Debug, Clone, Default)]
pub struct ValidationRegistry {
    entries: Arc<RwLock<Vec<ValidationError>>>,
}

impl ValidationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert, replacing any existing entry for the same key.
    pub fn add(&self, error: ValidationError) {
        debug!(property = %error.property, context = %error.context, "validation error registered");
        let mut entries = self.entries.write().expect("validation lock poisoned");
        match entries
            .iter_mut()
            .find(|e| e.property == error.property && e.context == error.context)
        {
            Some(existing) => *existing = error,
            None => entries.push(error),
        }
    }

    /// Messages recorded for `property` in `context`.
    pub fn property_errors(&self, property: &str, context: &str) -> Vec<String> {
        let entries = self.entries.read().expect("validation lock poisoned");
        entries
            .iter()
            .filter(|e| e.property == property && e.context == context)
            .flat_map(|e| e.errors.iter().cloned())
            .collect()
    }

    pub fn remove(&self, property: &str, context: &str) {
        let mut entries = self.entries.write().expect("validation lock poisoned");
        entries.retain(|e| e.context != context || e.property != property);
    }

    pub fn remove_for_context(&self, context: &str) {
        let mut entries = self.entries.write().expect("validation lock poisoned");
        entries.retain(|e| e.context != context);
    }

    pub fn all(&self) -> Vec<ValidationError> {
        self.entries.read().expect("validation lock poisoned").clone()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().expect("validation lock poisoned").is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn err(property: &str, context: &str, msg: &str) -> ValidationError {
        ValidationError {
            property: property.into(),
            context: context.into(),
            errors: vec![msg.into()],
        }
    }

    #[test]
    fn add_replaces_same_key() {
        let registry = ValidationRegistry::new();
        registry.add(err("text", "greeting", "too short"));
        registry.add(err("text", "greeting", "required"));
        registry.add(err("text", "profile", "other form"));

        assert_eq!(registry.property_errors("text", "greeting"), vec!["required"]);
        assert_eq!(registry.all().len(), 2);
    }

    #[test]
    fn remove_by_key_and_context() {
        let registry = ValidationRegistry::new();
        registry.add(err("text", "greeting", "a"));
        registry.add(err("variant", "greeting", "b"));
        registry.add(err("first_name", "profile", "c"));

        registry.remove("text", "greeting");
        assert!(registry.property_errors("text", "greeting").is_empty());
        assert_eq!(registry.all().len(), 2);

        registry.remove_for_context("greeting");
        assert_eq!(registry.all(), vec![err("first_name", "profile", "c")]);
    }

    #[test]
    fn extract_only_matches_error_payloads() {
        let body = r#"{"errors":[{"property":"text","context":"greeting","errors":["blank"]}]}"#;
        let extracted = ValidationPayload::extract(body);
        assert_eq!(extracted, Some(vec![err("text", "greeting", "blank")]));

        assert!(ValidationPayload::extract(r#"{"greeting":{"id":"g1"}}"#).is_none());
        assert!(ValidationPayload::extract(r#"{"errors":[]}"#).is_none());
        assert!(ValidationPayload::extract("not json").is_none());
    }
}
