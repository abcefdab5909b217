//! PostgreSQL attachment store
//!
//! Expected schema (see [`PgAttachmentStore::ensure_schema`]):
//!
//! ```sql
//! CREATE TABLE attachments (
//!     id UUID PRIMARY KEY,
//!     name TEXT NOT NULL,
//!     context TEXT NOT NULL,
//!     mime_type TEXT NOT NULL,
//!     extension TEXT NOT NULL,
//!     size BIGINT NOT NULL,
//!     file_key TEXT NOT NULL,
//!     owner_kind TEXT NOT NULL,
//!     owner_key TEXT NOT NULL,
//!     creation_date TIMESTAMPTZ NOT NULL,
//!     last_modification_date TIMESTAMPTZ NOT NULL
//! );
//! ```
//!
//! `owner_key` is TEXT so integer, UUID and string primary keys of owner
//! entities all fit the same column.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use annex_attachments::model::{Attachment, FileMeta, OwnerRef};
use annex_attachments::store::{AttachmentStore, StoreError, StoreResult};

const SELECT_COLUMNS: &str = "id, name, context, mime_type, extension, size, file_key, \
     owner_kind, owner_key, creation_date, last_modification_date";

/// Attachment row from database
#[derive(Debug, Clone, FromRow)]
pub struct AttachmentRow {
    pub id: Uuid,
    pub name: String,
    pub context: String,
    pub mime_type: String,
    pub extension: String,
    pub size: i64,
    pub file_key: String,
    pub owner_kind: String,
    pub owner_key: String,
    pub creation_date: DateTime<Utc>,
    pub last_modification_date: DateTime<Utc>,
}

impl From<AttachmentRow> for Attachment {
    fn from(row: AttachmentRow) -> Self {
        Attachment {
            id: row.id,
            name: row.name,
            context: row.context,
            meta: FileMeta {
                mime_type: row.mime_type,
                extension: row.extension,
                size: row.size.max(0) as u64,
            },
            file_key: row.file_key,
            owner: OwnerRef::new(row.owner_kind, row.owner_key),
            creation_date: row.creation_date,
            last_modification_date: row.last_modification_date,
        }
    }
}

fn db_err(e: sqlx::Error) -> StoreError {
    StoreError::Database(e.to_string())
}

/// PostgreSQL-backed attachment metadata store
pub struct PgAttachmentStore {
    pool: PgPool,
}

impl PgAttachmentStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create the attachments table and its owner index if absent.
    pub async fn ensure_schema(&self) -> StoreResult<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS attachments (
                id UUID PRIMARY KEY,
                name TEXT NOT NULL,
                context TEXT NOT NULL,
                mime_type TEXT NOT NULL,
                extension TEXT NOT NULL,
                size BIGINT NOT NULL,
                file_key TEXT NOT NULL,
                owner_kind TEXT NOT NULL,
                owner_key TEXT NOT NULL,
                creation_date TIMESTAMPTZ NOT NULL,
                last_modification_date TIMESTAMPTZ NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_attachments_owner \
             ON attachments (owner_kind, owner_key)",
        )
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        Ok(())
    }
}

#[async_trait]
impl AttachmentStore for PgAttachmentStore {
    async fn get(&self, id: Uuid) -> StoreResult<Option<Attachment>> {
        let row = sqlx::query_as::<_, AttachmentRow>(&format!(
            "SELECT {} FROM attachments WHERE id = $1",
            SELECT_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;

        Ok(row.map(Attachment::from))
    }

    async fn list_for_owner(&self, owner: &OwnerRef) -> StoreResult<Vec<Attachment>> {
        let rows = sqlx::query_as::<_, AttachmentRow>(&format!(
            "SELECT {} FROM attachments \
             WHERE owner_kind = $1 AND owner_key = $2 \
             ORDER BY creation_date",
            SELECT_COLUMNS
        ))
        .bind(&owner.kind)
        .bind(&owner.key)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        Ok(rows.into_iter().map(Attachment::from).collect())
    }

    async fn list_for_owner_context(
        &self,
        owner: &OwnerRef,
        context: &str,
    ) -> StoreResult<Vec<Attachment>> {
        let rows = sqlx::query_as::<_, AttachmentRow>(&format!(
            "SELECT {} FROM attachments \
             WHERE owner_kind = $1 AND owner_key = $2 AND context = $3 \
             ORDER BY creation_date",
            SELECT_COLUMNS
        ))
        .bind(&owner.kind)
        .bind(&owner.key)
        .bind(context)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        Ok(rows.into_iter().map(Attachment::from).collect())
    }

    async fn commit(&self, attachment: &Attachment, superseded: &[Uuid]) -> StoreResult<()> {
        // One transaction: the sweep and the surviving record land together
        // or not at all.
        let mut tx = self.pool.begin().await.map_err(db_err)?;

        if !superseded.is_empty() {
            sqlx::query("DELETE FROM attachments WHERE id = ANY($1)")
                .bind(superseded)
                .execute(&mut *tx)
                .await
                .map_err(db_err)?;
        }

        sqlx::query(
            r#"
            INSERT INTO attachments
                (id, name, context, mime_type, extension, size, file_key,
                 owner_kind, owner_key, creation_date, last_modification_date)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            ON CONFLICT (id) DO UPDATE SET
                name = EXCLUDED.name,
                context = EXCLUDED.context,
                mime_type = EXCLUDED.mime_type,
                extension = EXCLUDED.extension,
                size = EXCLUDED.size,
                file_key = EXCLUDED.file_key,
                last_modification_date = EXCLUDED.last_modification_date
            "#,
        )
        .bind(attachment.id)
        .bind(&attachment.name)
        .bind(&attachment.context)
        .bind(&attachment.meta.mime_type)
        .bind(&attachment.meta.extension)
        .bind(attachment.meta.size as i64)
        .bind(&attachment.file_key)
        .bind(&attachment.owner.kind)
        .bind(&attachment.owner.key)
        .bind(attachment.creation_date)
        .bind(attachment.last_modification_date)
        .execute(&mut *tx)
        .await
        .map_err(db_err)?;

        tx.commit().await.map_err(db_err)
    }

    async fn delete(&self, id: Uuid) -> StoreResult<()> {
        let result = sqlx::query("DELETE FROM attachments WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(id));
        }
        Ok(())
    }

    async fn delete_for_owner(&self, owner: &OwnerRef) -> StoreResult<Vec<Attachment>> {
        let rows = sqlx::query_as::<_, AttachmentRow>(&format!(
            "DELETE FROM attachments \
             WHERE owner_kind = $1 AND owner_key = $2 \
             RETURNING {}",
            SELECT_COLUMNS
        ))
        .bind(&owner.kind)
        .bind(&owner.key)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        Ok(rows.into_iter().map(Attachment::from).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_conversion() {
        let now = Utc::now();
        let row = AttachmentRow {
            id: Uuid::new_v4(),
            name: "report".to_string(),
            context: "invoice".to_string(),
            mime_type: "application/pdf".to_string(),
            extension: ".pdf".to_string(),
            size: 2048,
            file_key: "attachments/202608/k.pdf".to_string(),
            owner_kind: "order".to_string(),
            owner_key: "a3f1".to_string(),
            creation_date: now,
            last_modification_date: now,
        };

        let attachment = Attachment::from(row.clone());
        assert_eq!(attachment.id, row.id);
        assert_eq!(attachment.meta.size, 2048);
        assert_eq!(attachment.meta.extension, ".pdf");
        assert_eq!(attachment.owner, OwnerRef::new("order", "a3f1"));
    }

    #[test]
    fn test_negative_size_clamped() {
        let now = Utc::now();
        let row = AttachmentRow {
            id: Uuid::new_v4(),
            name: String::new(),
            context: String::new(),
            mime_type: "text/plain".to_string(),
            extension: ".txt".to_string(),
            size: -1,
            file_key: "attachments/202608/k.txt".to_string(),
            owner_kind: "doc".to_string(),
            owner_key: "1".to_string(),
            creation_date: now,
            last_modification_date: now,
        };

        assert_eq!(Attachment::from(row).meta.size, 0);
    }
}
