//! # Document Model
//!
//! A document is one registered media asset submitted for processing and
//! the root of the parent hierarchy: zero or more tasks hang off a
//! document, and results hang off tasks.
//!
//! Maps to `mediatask_documents`. The `document_id` is store-assigned and
//! immutable; registration payloads carrying an id are rejected upstream
//! as a format error.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

/// The media asset a document points at
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Target {
    pub id: String,
    pub url: String,
    #[serde(rename = "type")]
    pub kind: String,
}

/// Who registered the document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Creator {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
}

/// Inbound registration payload. `id` is present only to detect and
/// reject caller-supplied identifiers.
#[derive(Debug, Clone, Deserialize)]
pub struct DocumentSpec {
    #[serde(default)]
    pub id: Option<String>,
    pub target: Target,
    pub creator: Creator,
}

/// A registered media asset
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Document {
    pub document_id: Uuid,
    pub target_id: String,
    pub target_url: String,
    pub target_type: String,
    pub creator_id: String,
    pub creator_type: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// New document for creation (identifier assigned by the store)
#[derive(Debug, Clone)]
pub struct NewDocument {
    pub target: Target,
    pub creator: Creator,
}

impl From<DocumentSpec> for NewDocument {
    fn from(spec: DocumentSpec) -> Self {
        Self {
            target: spec.target,
            creator: spec.creator,
        }
    }
}

const DOCUMENT_COLUMNS: &str = "document_id, target_id, target_url, target_type, \
     creator_id, creator_type, created_at, updated_at";

impl Document {
    /// Persist a new document with a store-assigned id
    pub async fn create(pool: &PgPool, new_document: NewDocument) -> Result<Document, sqlx::Error> {
        let sql = format!(
            "INSERT INTO mediatask_documents \
             (document_id, target_id, target_url, target_type, creator_id, creator_type, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, NOW(), NOW()) \
             RETURNING {DOCUMENT_COLUMNS}"
        );

        sqlx::query_as::<_, Document>(&sql)
            .bind(Uuid::new_v4())
            .bind(&new_document.target.id)
            .bind(&new_document.target.url)
            .bind(&new_document.target.kind)
            .bind(&new_document.creator.id)
            .bind(&new_document.creator.kind)
            .fetch_one(pool)
            .await
    }

    /// Find a document by id
    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Document>, sqlx::Error> {
        let sql =
            format!("SELECT {DOCUMENT_COLUMNS} FROM mediatask_documents WHERE document_id = $1");

        sqlx::query_as::<_, Document>(&sql)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Delete a document; child tasks and their results go with it
    /// (foreign keys cascade inside the same statement).
    /// Returns false when the id was unknown.
    pub async fn delete(pool: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM mediatask_documents WHERE document_id = $1")
            .bind(id)
            .execute(pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Search documents by target id and creator id. The `"*"` sentinel
    /// matches any value for that field.
    pub async fn search(
        pool: &PgPool,
        target_id_pattern: &str,
        creator_id_pattern: &str,
    ) -> Result<Vec<Document>, sqlx::Error> {
        let sql = format!(
            "SELECT {DOCUMENT_COLUMNS} FROM mediatask_documents \
             WHERE ($1 = '*' OR target_id = $1) AND ($2 = '*' OR creator_id = $2) \
             ORDER BY created_at DESC"
        );

        sqlx::query_as::<_, Document>(&sql)
            .bind(target_id_pattern)
            .bind(creator_id_pattern)
            .fetch_all(pool)
            .await
    }

    /// Nested view of the target fields
    pub fn target(&self) -> Target {
        Target {
            id: self.target_id.clone(),
            url: self.target_url.clone(),
            kind: self.target_type.clone(),
        }
    }

    /// Nested view of the creator fields
    pub fn creator(&self) -> Creator {
        Creator {
            id: self.creator_id.clone(),
            kind: self.creator_type.clone(),
        }
    }
}
