//! Attachment model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Polymorphic owner reference: an owner-type identifier plus the owner's
/// primary key rendered as an opaque string, so integer, UUID and string
/// keyed owners all fit the same column.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OwnerRef {
    /// Owner-type identifier registered with the policy registry.
    pub kind: String,
    /// Owner primary key, stringified.
    pub key: String,
}

impl OwnerRef {
    pub fn new(kind: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            key: key.into(),
        }
    }
}

impl std::fmt::Display for OwnerRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.kind, self.key)
    }
}

/// File attributes derived server-side from the stored bytes. Never taken
/// from client input; recomputed on every save.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileMeta {
    /// MIME type sniffed from the file's header bytes.
    pub mime_type: String,
    /// Lower-cased filename suffix including the leading dot; empty if none.
    pub extension: String,
    /// File size in bytes.
    pub size: u64,
}

/// An attachment record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Attachment {
    /// Immutable attachment ID
    pub id: Uuid,
    /// Optional display label (empty = unnamed)
    pub name: String,
    /// Role of the attachment relative to its owner (e.g. "avatar")
    pub context: String,
    /// Derived file attributes
    pub meta: FileMeta,
    /// Storage key of the backing file
    pub file_key: String,
    /// Owning entity
    pub owner: OwnerRef,
    /// Created timestamp (server-assigned)
    pub creation_date: DateTime<Utc>,
    /// Updated timestamp (server-assigned)
    pub last_modification_date: DateTime<Utc>,
}

impl Attachment {
    /// Check if this is an image
    pub fn is_image(&self) -> bool {
        self.meta.mime_type.starts_with("image")
    }

    /// Check if the record was updated after creation
    pub fn is_modified(&self) -> bool {
        self.creation_date != self.last_modification_date
    }

    /// Filename used in the download `Content-Disposition` header:
    /// the display name if present, otherwise `attachment_<id>`, with the
    /// derived extension appended.
    pub fn download_filename(&self) -> String {
        if self.name.is_empty() {
            format!("attachment_{}{}", self.id, self.meta.extension)
        } else {
            format!("{}{}", self.name, self.meta.extension)
        }
    }
}

impl std::fmt::Display for Attachment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} | {} | {} | {}",
            self.owner.kind, self.owner.key, self.context, self.name
        )
    }
}

/// An incoming file submission, before validation and storage.
#[derive(Debug, Clone)]
pub struct NewUpload {
    /// Optional display label
    pub name: String,
    /// Declared context; empty means "use the default, if configured"
    pub context: String,
    /// Client-supplied filename; used only for extension derivation
    pub filename: String,
    /// Raw file bytes
    pub data: bytes::Bytes,
}

impl NewUpload {
    pub fn new(filename: impl Into<String>, data: bytes::Bytes) -> Self {
        Self {
            name: String::new(),
            context: String::new(),
            filename: filename.into(),
            data,
        }
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn context(mut self, context: impl Into<String>) -> Self {
        self.context = context.into();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn attachment(name: &str, extension: &str) -> Attachment {
        let now = Utc::now();
        Attachment {
            id: Uuid::new_v4(),
            name: name.to_string(),
            context: String::new(),
            meta: FileMeta {
                mime_type: "application/pdf".to_string(),
                extension: extension.to_string(),
                size: 1024,
            },
            file_key: "attachments/202608/abc.pdf".to_string(),
            owner: OwnerRef::new("invoice", "7"),
            creation_date: now,
            last_modification_date: now,
        }
    }

    #[test]
    fn test_download_filename_uses_name() {
        let a = attachment("report", ".pdf");
        assert_eq!(a.download_filename(), "report.pdf");
    }

    #[test]
    fn test_download_filename_falls_back_to_id() {
        let a = attachment("", ".pdf");
        assert_eq!(a.download_filename(), format!("attachment_{}.pdf", a.id));
    }

    #[test]
    fn test_is_image() {
        let mut a = attachment("photo", ".png");
        assert!(!a.is_image());
        a.meta.mime_type = "image/png".to_string();
        assert!(a.is_image());
    }

    #[test]
    fn test_is_modified() {
        let mut a = attachment("doc", ".pdf");
        assert!(!a.is_modified());
        a.last_modification_date = a.creation_date + chrono::Duration::seconds(5);
        assert!(a.is_modified());
    }

    #[test]
    fn test_upload_builder() {
        let upload = NewUpload::new("smile.svg", bytes::Bytes::from_static(b"<svg/>"))
            .name("smile")
            .context("work");

        assert_eq!(upload.filename, "smile.svg");
        assert_eq!(upload.name, "smile");
        assert_eq!(upload.context, "work");
    }

    #[test]
    fn test_owner_ref_display() {
        assert_eq!(OwnerRef::new("diagram", "42").to_string(), "diagram/42");
    }
}
