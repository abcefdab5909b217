//! Attachments configuration
//!
//! All deployment-level knobs are passed explicitly at startup instead of
//! being discovered from ambient settings: the global upload ceiling, the
//! enumerated set of valid contexts with their display labels, and the
//! optional default context.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

/// Default global upload ceiling: 100 MB.
pub const DEFAULT_MAX_UPLOAD_SIZE: u64 = 100 * 1024 * 1024;

/// Deployment-wide attachment configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AttachmentsConfig {
    /// Absolute upper bound for upload sizes in bytes. Owner policies may
    /// lower this but never raise it.
    pub max_upload_size: u64,

    /// Valid context keys mapped to their display labels.
    pub contexts: BTreeMap<String, String>,

    /// Context substituted when an upload declares none.
    pub default_context: Option<String>,
}

impl Default for AttachmentsConfig {
    fn default() -> Self {
        Self {
            max_upload_size: DEFAULT_MAX_UPLOAD_SIZE,
            contexts: BTreeMap::new(),
            default_context: None,
        }
    }
}

impl AttachmentsConfig {
    pub fn new(max_upload_size: u64) -> Self {
        Self {
            max_upload_size,
            ..Default::default()
        }
    }

    /// Register a context key with its display label.
    pub fn with_context(mut self, key: impl Into<String>, label: impl Into<String>) -> Self {
        self.contexts.insert(key.into(), label.into());
        self
    }

    /// Declare the default context. It counts as valid even when it has no
    /// registered label.
    pub fn with_default_context(mut self, key: impl Into<String>) -> Self {
        self.default_context = Some(key.into());
        self
    }

    /// All valid context keys, including the default context if declared.
    pub fn valid_contexts(&self) -> BTreeSet<&str> {
        let mut contexts: BTreeSet<&str> = self.contexts.keys().map(String::as_str).collect();
        if let Some(default) = &self.default_context {
            contexts.insert(default.as_str());
        }
        contexts
    }

    pub fn is_valid_context(&self, context: &str) -> bool {
        self.contexts.contains_key(context)
            || self.default_context.as_deref() == Some(context)
    }

    /// Display label for a context; falls back to the key itself.
    pub fn context_label<'a>(&'a self, context: &'a str) -> &'a str {
        self.contexts
            .get(context)
            .map(String::as_str)
            .unwrap_or(context)
    }

    /// (key, label) pairs for every valid context, for UI choice lists.
    pub fn context_choices(&self) -> Vec<(String, String)> {
        self.valid_contexts()
            .into_iter()
            .map(|key| (key.to_string(), self.context_label(key).to_string()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AttachmentsConfig::default();
        assert_eq!(config.max_upload_size, DEFAULT_MAX_UPLOAD_SIZE);
        assert!(config.valid_contexts().is_empty());
        assert!(config.default_context.is_none());
    }

    #[test]
    fn test_default_context_is_valid() {
        let config = AttachmentsConfig::default().with_default_context("misc");

        assert!(config.is_valid_context("misc"));
        assert!(config.valid_contexts().contains("misc"));
        assert!(!config.is_valid_context("avatar"));
    }

    #[test]
    fn test_context_label_falls_back_to_key() {
        let config = AttachmentsConfig::default()
            .with_context("avatar", "Profile picture")
            .with_default_context("misc");

        assert_eq!(config.context_label("avatar"), "Profile picture");
        assert_eq!(config.context_label("misc"), "misc");
    }

    #[test]
    fn test_context_choices() {
        let config = AttachmentsConfig::default()
            .with_context("avatar", "Profile picture")
            .with_context("invoice", "Invoice");

        let choices = config.context_choices();
        assert_eq!(choices.len(), 2);
        assert!(choices.contains(&("avatar".to_string(), "Profile picture".to_string())));
    }
}
