//! # annex-attachments
//!
//! Attachment lifecycle engine for arbitrary owner entities.
//!
//! ## Features
//!
//! - Byte-level MIME sniffing (client metadata is never trusted)
//! - Per-owner-type validation policies (mime types, extensions, size bounds)
//! - "One attachment per owner" / "one per owner+context" enforcement with
//!   physical file cleanup
//! - Private, collision-free storage keys with per-owner location overrides
//! - Pluggable access scoping (viewable / editable / deletable)
//!
//! ## Example
//!
//! ```rust,ignore
//! use annex_attachments::{
//!     AttachmentPolicy, AttachmentService, MemoryAttachmentStore, MemoryStorage, NewUpload,
//!     OwnerRef, PolicyRegistry,
//! };
//! use annex_core::AttachmentsConfig;
//! use std::sync::Arc;
//!
//! let registry = PolicyRegistry::new()
//!     .register("diagram", AttachmentPolicy::new().unique_upload());
//! let service = AttachmentService::new(
//!     Arc::new(MemoryAttachmentStore::new()),
//!     Arc::new(MemoryStorage::new()),
//!     registry,
//!     AttachmentsConfig::default(),
//! );
//!
//! let attachment = service
//!     .create(
//!         OwnerRef::new("diagram", "42"),
//!         NewUpload::new("smile.svg", bytes::Bytes::from(svg_data)),
//!     )
//!     .await?;
//! ```

pub mod model;
pub mod policy;
pub mod scope;
pub mod service;
pub mod sniff;
pub mod storage;
pub mod store;
pub mod validation;

pub use model::{Attachment, FileMeta, NewUpload, OwnerRef};
pub use policy::{AttachmentPolicy, EffectivePolicy, PolicyRegistry};
pub use scope::{AccessScope, CallbackScope, CallerRef, OpenAccess};
pub use service::{AttachmentError, AttachmentResult, AttachmentService, Download};
pub use sniff::{file_extension, mime_from_bytes, sniff_mime_type};
pub use storage::{
    attachment_upload_path, LocalStorage, MemoryStorage, Storage, StorageError, StorageResult,
    StoredFile,
};
pub use store::{AttachmentStore, MemoryAttachmentStore, StoreError, StoreResult};
pub use validation::validate_upload;
