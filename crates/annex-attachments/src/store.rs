//! Attachment metadata store
//!
//! The store holds attachment records; file bytes live in a
//! [`Storage`](crate::storage::Storage) backend. `commit` applies a record
//! write together with the uniqueness sweep's record deletions as one atomic
//! unit, so a crash cannot leave a half-applied sweep.

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::model::{Attachment, OwnerRef};

/// Store errors
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Attachment not found: {0}")]
    NotFound(Uuid),
    #[error("Database error: {0}")]
    Database(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Attachment metadata store trait
#[async_trait]
pub trait AttachmentStore: Send + Sync {
    /// Get an attachment by ID
    async fn get(&self, id: Uuid) -> StoreResult<Option<Attachment>>;

    /// All attachments for an owner, oldest first
    async fn list_for_owner(&self, owner: &OwnerRef) -> StoreResult<Vec<Attachment>>;

    /// Attachments for an owner with a matching context, oldest first
    async fn list_for_owner_context(
        &self,
        owner: &OwnerRef,
        context: &str,
    ) -> StoreResult<Vec<Attachment>>;

    /// Atomically delete the superseded records and insert-or-replace the
    /// surviving one.
    async fn commit(&self, attachment: &Attachment, superseded: &[Uuid]) -> StoreResult<()>;

    /// Delete a single attachment record
    async fn delete(&self, id: Uuid) -> StoreResult<()>;

    /// Delete every record of an owner, returning the removed records so the
    /// caller can reclaim their files.
    async fn delete_for_owner(&self, owner: &OwnerRef) -> StoreResult<Vec<Attachment>>;
}

/// In-memory attachment store for testing
pub struct MemoryAttachmentStore {
    attachments: RwLock<Vec<Attachment>>,
}

impl Default for MemoryAttachmentStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryAttachmentStore {
    pub fn new() -> Self {
        Self {
            attachments: RwLock::new(Vec::new()),
        }
    }

    pub async fn len(&self) -> usize {
        self.attachments.read().await.len()
    }
}

#[async_trait]
impl AttachmentStore for MemoryAttachmentStore {
    async fn get(&self, id: Uuid) -> StoreResult<Option<Attachment>> {
        let attachments = self.attachments.read().await;
        Ok(attachments.iter().find(|a| a.id == id).cloned())
    }

    async fn list_for_owner(&self, owner: &OwnerRef) -> StoreResult<Vec<Attachment>> {
        let attachments = self.attachments.read().await;
        let mut found: Vec<Attachment> = attachments
            .iter()
            .filter(|a| &a.owner == owner)
            .cloned()
            .collect();
        found.sort_by_key(|a| a.creation_date);
        Ok(found)
    }

    async fn list_for_owner_context(
        &self,
        owner: &OwnerRef,
        context: &str,
    ) -> StoreResult<Vec<Attachment>> {
        let attachments = self.attachments.read().await;
        let mut found: Vec<Attachment> = attachments
            .iter()
            .filter(|a| &a.owner == owner && a.context == context)
            .cloned()
            .collect();
        found.sort_by_key(|a| a.creation_date);
        Ok(found)
    }

    async fn commit(&self, attachment: &Attachment, superseded: &[Uuid]) -> StoreResult<()> {
        // Single write lock: sweep and write are applied together.
        let mut attachments = self.attachments.write().await;
        attachments.retain(|a| !superseded.contains(&a.id));

        if let Some(pos) = attachments.iter().position(|a| a.id == attachment.id) {
            attachments[pos] = attachment.clone();
        } else {
            attachments.push(attachment.clone());
        }
        Ok(())
    }

    async fn delete(&self, id: Uuid) -> StoreResult<()> {
        let mut attachments = self.attachments.write().await;
        let before = attachments.len();
        attachments.retain(|a| a.id != id);

        if attachments.len() == before {
            return Err(StoreError::NotFound(id));
        }
        Ok(())
    }

    async fn delete_for_owner(&self, owner: &OwnerRef) -> StoreResult<Vec<Attachment>> {
        let mut attachments = self.attachments.write().await;
        let (removed, kept): (Vec<Attachment>, Vec<Attachment>) =
            attachments.drain(..).partition(|a| &a.owner == owner);
        *attachments = kept;
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::FileMeta;
    use chrono::Utc;

    fn attachment(owner: &OwnerRef, context: &str) -> Attachment {
        let now = Utc::now();
        Attachment {
            id: Uuid::new_v4(),
            name: String::new(),
            context: context.to_string(),
            meta: FileMeta {
                mime_type: "text/plain".to_string(),
                extension: ".txt".to_string(),
                size: 4,
            },
            file_key: format!("attachments/202608/{}.txt", Uuid::new_v4()),
            owner: owner.clone(),
            creation_date: now,
            last_modification_date: now,
        }
    }

    #[tokio::test]
    async fn test_commit_inserts_and_replaces() {
        let store = MemoryAttachmentStore::new();
        let owner = OwnerRef::new("doc", "1");
        let mut a = attachment(&owner, "");

        store.commit(&a, &[]).await.unwrap();
        assert_eq!(store.len().await, 1);

        a.name = "renamed".to_string();
        store.commit(&a, &[]).await.unwrap();
        assert_eq!(store.len().await, 1);
        assert_eq!(store.get(a.id).await.unwrap().unwrap().name, "renamed");
    }

    #[tokio::test]
    async fn test_commit_removes_superseded() {
        let store = MemoryAttachmentStore::new();
        let owner = OwnerRef::new("doc", "1");
        let old = attachment(&owner, "");
        let new = attachment(&owner, "");

        store.commit(&old, &[]).await.unwrap();
        store.commit(&new, &[old.id]).await.unwrap();

        assert_eq!(store.len().await, 1);
        assert!(store.get(old.id).await.unwrap().is_none());
        assert!(store.get(new.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_list_scoping() {
        let store = MemoryAttachmentStore::new();
        let owner_a = OwnerRef::new("doc", "1");
        let owner_b = OwnerRef::new("doc", "2");

        store.commit(&attachment(&owner_a, "work"), &[]).await.unwrap();
        store.commit(&attachment(&owner_a, "vacation"), &[]).await.unwrap();
        store.commit(&attachment(&owner_b, "work"), &[]).await.unwrap();

        assert_eq!(store.list_for_owner(&owner_a).await.unwrap().len(), 2);
        assert_eq!(
            store
                .list_for_owner_context(&owner_a, "work")
                .await
                .unwrap()
                .len(),
            1
        );
    }

    #[tokio::test]
    async fn test_delete_missing_is_not_found() {
        let store = MemoryAttachmentStore::new();
        let result = store.delete(Uuid::new_v4()).await;
        assert!(matches!(result, Err(StoreError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_delete_for_owner_returns_removed() {
        let store = MemoryAttachmentStore::new();
        let owner = OwnerRef::new("doc", "1");
        let other = OwnerRef::new("doc", "2");

        store.commit(&attachment(&owner, ""), &[]).await.unwrap();
        store.commit(&attachment(&owner, ""), &[]).await.unwrap();
        store.commit(&attachment(&other, ""), &[]).await.unwrap();

        let removed = store.delete_for_owner(&owner).await.unwrap();
        assert_eq!(removed.len(), 2);
        assert_eq!(store.len().await, 1);
    }
}
