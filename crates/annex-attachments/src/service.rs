//! Attachment lifecycle service
//!
//! Orchestrates a save end to end: resolve the owner's policy, sniff the
//! file, validate, sweep superseded records under uniqueness policies, write
//! the file and commit the record. Deletion runs in reverse: the record goes
//! first, then the backing file as a post-commit step.

use std::sync::Arc;

use annex_core::{AttachmentsConfig, ValidationErrors};
use bytes::Bytes;
use chrono::Utc;
use thiserror::Error;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::model::{Attachment, FileMeta, NewUpload, OwnerRef};
use crate::policy::{EffectivePolicy, PolicyRegistry};
use crate::scope::{AccessScope, CallerRef, OpenAccess};
use crate::sniff::{file_extension, mime_from_bytes};
use crate::storage::{attachment_upload_path, LocalStorage, Storage, StorageError};
use crate::store::{AttachmentStore, StoreError};
use crate::validation::validate_upload;

/// Service errors
#[derive(Debug, Error)]
pub enum AttachmentError {
    #[error("Attachment not found: {0}")]
    NotFound(Uuid),
    #[error("Permission denied")]
    PermissionDenied,
    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationErrors),
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

impl AttachmentError {
    /// HTTP status equivalent for the web layer.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::NotFound(_) | Self::Store(StoreError::NotFound(_)) => 404,
            Self::PermissionDenied => 403,
            Self::Validation(_) => 422,
            Self::Storage(_) | Self::Store(_) => 500,
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            Self::NotFound(_) | Self::Store(StoreError::NotFound(_)) => "not_found",
            Self::PermissionDenied => "forbidden",
            Self::Validation(_) => "validation_failed",
            Self::Storage(_) => "storage_error",
            Self::Store(_) => "database_error",
        }
    }
}

pub type AttachmentResult<T> = Result<T, AttachmentError>;

/// A downloadable attachment: the record, the `Content-Disposition`
/// filename, and the raw bytes.
#[derive(Debug, Clone)]
pub struct Download {
    pub attachment: Attachment,
    pub filename: String,
    pub data: Bytes,
}

/// Attachment lifecycle service
pub struct AttachmentService<St: AttachmentStore> {
    store: Arc<St>,
    storage: Arc<dyn Storage>,
    registry: PolicyRegistry,
    config: AttachmentsConfig,
    scope: Arc<dyn AccessScope>,
}

impl<St: AttachmentStore> AttachmentService<St> {
    pub fn new(
        store: Arc<St>,
        storage: Arc<dyn Storage>,
        registry: PolicyRegistry,
        config: AttachmentsConfig,
    ) -> Self {
        Self {
            store,
            storage,
            registry,
            config,
            scope: Arc::new(OpenAccess),
        }
    }

    /// Install the host's access-scoping strategy.
    pub fn with_scope(mut self, scope: Arc<dyn AccessScope>) -> Self {
        self.scope = scope;
        self
    }

    pub fn config(&self) -> &AttachmentsConfig {
        &self.config
    }

    /// Storage backend for a resolved policy. Location overrides are applied
    /// at every read/write, never cached on the record.
    fn storage_for(&self, policy: &EffectivePolicy) -> Arc<dyn Storage> {
        match &policy.storage_location {
            Some(root) => Arc::new(LocalStorage::new(root)),
            None => Arc::clone(&self.storage),
        }
    }

    fn effective_context(&self, context: &str) -> String {
        if context.is_empty() {
            if let Some(default) = &self.config.default_context {
                return default.clone();
            }
        }
        context.to_string()
    }

    /// Create an attachment from an uploaded file
    #[instrument(skip(self, upload), fields(owner = %owner, filename = %upload.filename))]
    pub async fn create(&self, owner: OwnerRef, upload: NewUpload) -> AttachmentResult<Attachment> {
        self.save(None, owner, upload).await
    }

    /// Replace an existing attachment's content and metadata. The record
    /// goes through the full validation pipeline again; partial field
    /// patches are not supported.
    #[instrument(skip(self, upload), fields(filename = %upload.filename))]
    pub async fn update(&self, id: Uuid, upload: NewUpload) -> AttachmentResult<Attachment> {
        let existing = self
            .store
            .get(id)
            .await?
            .ok_or(AttachmentError::NotFound(id))?;
        let owner = existing.owner.clone();
        self.save(Some(existing), owner, upload).await
    }

    async fn save(
        &self,
        existing: Option<Attachment>,
        owner: OwnerRef,
        upload: NewUpload,
    ) -> AttachmentResult<Attachment> {
        let policy = self
            .registry
            .resolve(&owner.kind, self.config.max_upload_size);

        // Always recomputed from the actual bytes; client metadata is never
        // trusted.
        let meta = FileMeta {
            mime_type: mime_from_bytes(&upload.data),
            extension: file_extension(&upload.filename),
            size: upload.data.len() as u64,
        };

        let context = self.effective_context(&upload.context);
        validate_upload(&upload.name, &context, &meta, &policy, &self.config)?;

        let current_id = existing.as_ref().map(|a| a.id);
        let superseded = self
            .superseded(&owner, &context, current_id, &policy)
            .await?;

        let storage = self.storage_for(&policy);

        // Superseded files go first; a failed unlink must not block the
        // supersession itself.
        for stale in &superseded {
            if let Err(e) = storage.delete(&stale.file_key).await {
                warn!(id = %stale.id, key = %stale.file_key, error = %e, "Failed to remove superseded file");
            }
        }

        let file_key = attachment_upload_path(&upload.filename);
        // A write failure aborts the whole save; nothing was committed yet.
        let stored = storage.put(&file_key, upload.data.clone()).await?;

        let now = Utc::now();
        let record = Attachment {
            id: current_id.unwrap_or_else(Uuid::new_v4),
            name: upload.name,
            context,
            meta,
            file_key,
            owner,
            creation_date: existing
                .as_ref()
                .map(|a| a.creation_date)
                .unwrap_or(now),
            last_modification_date: now,
        };

        let superseded_ids: Vec<Uuid> = superseded.iter().map(|a| a.id).collect();
        self.store.commit(&record, &superseded_ids).await?;

        // On update the previous file is unreferenced once the commit lands.
        if let Some(previous) = existing {
            if previous.file_key != record.file_key {
                if let Err(e) = storage.delete(&previous.file_key).await {
                    warn!(id = %record.id, key = %previous.file_key, error = %e, "Failed to remove replaced file");
                }
            }
        }

        info!(
            id = %record.id,
            key = %record.file_key,
            digest = %stored.digest,
            superseded = superseded_ids.len(),
            "Attachment saved"
        );
        Ok(record)
    }

    /// Records displaced by the uniqueness policy, excluding the one being
    /// saved. `unique_upload` takes precedence over
    /// `unique_upload_per_context`.
    async fn superseded(
        &self,
        owner: &OwnerRef,
        context: &str,
        current_id: Option<Uuid>,
        policy: &EffectivePolicy,
    ) -> AttachmentResult<Vec<Attachment>> {
        let mut records = if policy.unique_upload {
            self.store.list_for_owner(owner).await?
        } else if policy.unique_upload_per_context {
            self.store.list_for_owner_context(owner, context).await?
        } else {
            return Ok(Vec::new());
        };

        if let Some(id) = current_id {
            records.retain(|a| a.id != id);
        }
        Ok(records)
    }

    /// Get an attachment by ID
    pub async fn get(&self, id: Uuid) -> AttachmentResult<Option<Attachment>> {
        Ok(self.store.get(id).await?)
    }

    /// All attachments of an owner, oldest first
    pub async fn list_for_owner(&self, owner: &OwnerRef) -> AttachmentResult<Vec<Attachment>> {
        Ok(self.store.list_for_owner(owner).await?)
    }

    /// Delete an attachment. The record is removed first; the backing file
    /// is reclaimed afterwards, and a failed unlink is logged rather than
    /// surfaced so the record's deletion stands.
    #[instrument(skip(self))]
    pub async fn delete(&self, id: Uuid) -> AttachmentResult<()> {
        let attachment = self
            .store
            .get(id)
            .await?
            .ok_or(AttachmentError::NotFound(id))?;

        self.store.delete(id).await?;

        let policy = self
            .registry
            .resolve(&attachment.owner.kind, self.config.max_upload_size);
        let storage = self.storage_for(&policy);
        if let Err(e) = storage.delete(&attachment.file_key).await {
            warn!(id = %id, key = %attachment.file_key, error = %e, "Failed to remove attachment file");
        }

        info!(id = %id, key = %attachment.file_key, "Attachment deleted");
        Ok(())
    }

    /// Cascade deletion for a removed owner entity: every record goes, then
    /// every backing file, best-effort. Returns the number of attachments
    /// removed.
    #[instrument(skip(self), fields(owner = %owner))]
    pub async fn delete_for_owner(&self, owner: &OwnerRef) -> AttachmentResult<usize> {
        let removed = self.store.delete_for_owner(owner).await?;

        let policy = self
            .registry
            .resolve(&owner.kind, self.config.max_upload_size);
        let storage = self.storage_for(&policy);
        for attachment in &removed {
            if let Err(e) = storage.delete(&attachment.file_key).await {
                warn!(id = %attachment.id, key = %attachment.file_key, error = %e, "Failed to remove attachment file");
            }
        }

        info!(owner = %owner, count = removed.len(), "Owner attachments deleted");
        Ok(removed.len())
    }

    /// Download an attachment's bytes. A file that vanished underneath a
    /// live record is a not-found condition, not a fault.
    #[instrument(skip(self))]
    pub async fn download(&self, id: Uuid) -> AttachmentResult<Download> {
        let attachment = self
            .store
            .get(id)
            .await?
            .ok_or(AttachmentError::NotFound(id))?;

        let policy = self
            .registry
            .resolve(&attachment.owner.kind, self.config.max_upload_size);
        let storage = self.storage_for(&policy);

        let data = match storage.get(&attachment.file_key).await {
            Ok(data) => data,
            Err(StorageError::NotFound(_)) => return Err(AttachmentError::NotFound(id)),
            Err(e) => return Err(e.into()),
        };

        let filename = attachment.download_filename();
        Ok(Download {
            attachment,
            filename,
            data,
        })
    }

    /// Attachments of an owner the caller may view.
    pub async fn list_viewable(
        &self,
        caller: &CallerRef,
        owner: &OwnerRef,
    ) -> AttachmentResult<Vec<Attachment>> {
        let mut records = self.store.list_for_owner(owner).await?;
        records.retain(|a| self.scope.viewable(caller, a));
        Ok(records)
    }

    /// Get an attachment if the caller may view it. Records outside the
    /// caller's scope are indistinguishable from missing ones.
    pub async fn get_viewable(
        &self,
        caller: &CallerRef,
        id: Uuid,
    ) -> AttachmentResult<Attachment> {
        let attachment = self
            .store
            .get(id)
            .await?
            .ok_or(AttachmentError::NotFound(id))?;

        if !self.scope.viewable(caller, &attachment) {
            return Err(AttachmentError::NotFound(id));
        }
        Ok(attachment)
    }

    /// Update on behalf of a caller, honoring the editable scope.
    pub async fn update_as(
        &self,
        caller: &CallerRef,
        id: Uuid,
        upload: NewUpload,
    ) -> AttachmentResult<Attachment> {
        let existing = self
            .store
            .get(id)
            .await?
            .ok_or(AttachmentError::NotFound(id))?;

        if !self.scope.editable(caller, &existing) {
            return Err(AttachmentError::PermissionDenied);
        }

        let owner = existing.owner.clone();
        self.save(Some(existing), owner, upload).await
    }

    /// Delete on behalf of a caller, honoring the deletable scope.
    pub async fn delete_as(&self, caller: &CallerRef, id: Uuid) -> AttachmentResult<()> {
        let attachment = self
            .store
            .get(id)
            .await?
            .ok_or(AttachmentError::NotFound(id))?;

        if !self.scope.deletable(caller, &attachment) {
            return Err(AttachmentError::PermissionDenied);
        }

        self.delete(id).await
    }
}
