//! Owner policies and the policy registry
//!
//! Every owner type declares, up front, what its attachments may look like.
//! The registry maps owner-type identifiers to those declarations; resolution
//! fills in defaults and clamps the size ceiling.

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Validation and uniqueness rules an owner type declares for its
/// attachments. All fields are optional; see [`EffectivePolicy`] for the
/// resolved defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AttachmentPolicy {
    /// Accepted sniffed MIME types; `None` = unrestricted.
    pub valid_mime_types: Option<HashSet<String>>,
    /// Accepted extensions (leading dot, lowercase); `None` = unrestricted.
    pub valid_extensions: Option<HashSet<String>>,
    /// Minimum file size in bytes.
    pub min_size: u64,
    /// Declared maximum file size in bytes. Clamped to the global ceiling at
    /// resolution time.
    pub max_size: Option<u64>,
    /// Keep at most one attachment for the owner. Takes precedence over
    /// `unique_upload_per_context`.
    pub unique_upload: bool,
    /// Keep at most one attachment per (owner, context) pair.
    pub unique_upload_per_context: bool,
    /// Private storage root override for this owner type.
    pub storage_location: Option<PathBuf>,
}

impl AttachmentPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn valid_mime_types<I, S>(mut self, mime_types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.valid_mime_types = Some(mime_types.into_iter().map(Into::into).collect());
        self
    }

    pub fn valid_extensions<I, S>(mut self, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.valid_extensions = Some(extensions.into_iter().map(Into::into).collect());
        self
    }

    pub fn min_size(mut self, bytes: u64) -> Self {
        self.min_size = bytes;
        self
    }

    pub fn max_size(mut self, bytes: u64) -> Self {
        self.max_size = Some(bytes);
        self
    }

    pub fn unique_upload(mut self) -> Self {
        self.unique_upload = true;
        self
    }

    pub fn unique_upload_per_context(mut self) -> Self {
        self.unique_upload_per_context = true;
        self
    }

    pub fn storage_location(mut self, root: impl Into<PathBuf>) -> Self {
        self.storage_location = Some(root.into());
        self
    }
}

/// A fully resolved policy: defaults applied, `max_size` clamped to the
/// global ceiling.
#[derive(Debug, Clone)]
pub struct EffectivePolicy {
    pub valid_mime_types: Option<HashSet<String>>,
    pub valid_extensions: Option<HashSet<String>>,
    pub min_size: u64,
    pub max_size: u64,
    pub unique_upload: bool,
    pub unique_upload_per_context: bool,
    pub storage_location: Option<PathBuf>,
}

/// Explicit registry of owner-type policies.
#[derive(Debug, Clone, Default)]
pub struct PolicyRegistry {
    policies: HashMap<String, AttachmentPolicy>,
}

impl PolicyRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the policy declared by an owner type.
    pub fn register(mut self, owner_kind: impl Into<String>, policy: AttachmentPolicy) -> Self {
        self.policies.insert(owner_kind.into(), policy);
        self
    }

    /// The raw declaration for an owner kind, if any.
    pub fn declared(&self, owner_kind: &str) -> Option<&AttachmentPolicy> {
        self.policies.get(owner_kind)
    }

    /// Resolve the effective policy for an owner kind. Owner types without a
    /// declaration get the permissive defaults; the global ceiling is an
    /// absolute upper bound either way.
    pub fn resolve(&self, owner_kind: &str, max_upload_ceiling: u64) -> EffectivePolicy {
        let declared = self.policies.get(owner_kind).cloned().unwrap_or_default();

        EffectivePolicy {
            valid_mime_types: declared.valid_mime_types,
            valid_extensions: declared.valid_extensions,
            min_size: declared.min_size,
            max_size: declared
                .max_size
                .map(|declared_max| declared_max.min(max_upload_ceiling))
                .unwrap_or(max_upload_ceiling),
            unique_upload: declared.unique_upload,
            unique_upload_per_context: declared.unique_upload_per_context,
            storage_location: declared.storage_location,
        }
    }
}
