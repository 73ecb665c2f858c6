//! Search documents stored as JSON in the `search_documents` table

use super::{SearchDocument, SearchIndex};
use archivist_common::{Error, Result};
use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use sqlx::SqlitePool;

pub struct SqliteSearchIndex {
    db: SqlitePool,
}

impl SqliteSearchIndex {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    /// Stored document body, if any
    pub async fn get(&self, id: i64) -> Result<Option<Value>> {
        let row: Option<(String,)> = sqlx::query_as("SELECT body FROM search_documents WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.db)
            .await?;

        row.map(|(body,)| {
            serde_json::from_str(&body)
                .map_err(|e| Error::Internal(format!("Corrupt search document {}: {}", id, e)))
        })
        .transpose()
    }
}

#[async_trait]
impl SearchIndex for SqliteSearchIndex {
    async fn index_document(&self, doc: &SearchDocument) -> Result<()> {
        let body = serde_json::to_string(&doc.body)
            .map_err(|e| Error::Internal(format!("Failed to serialize document: {}", e)))?;

        sqlx::query(
            "INSERT INTO search_documents (id, kind, body, updated_at) VALUES (?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET kind = excluded.kind, body = excluded.body,
                 updated_at = excluded.updated_at",
        )
        .bind(doc.id)
        .bind(doc.kind.as_str())
        .bind(body)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.db)
        .await?;

        tracing::debug!(record_id = doc.id, "Indexed search document");
        Ok(())
    }

    async fn partial_update(&self, id: i64, delta: Value) -> Result<()> {
        let Value::Object(fields) = delta else {
            return Err(Error::InvalidInput(
                "Partial update must be a JSON object".to_string(),
            ));
        };

        let mut body = match self.get(id).await? {
            Some(Value::Object(body)) => body,
            Some(_) | None => {
                return Err(Error::NotFound(format!("Search document {}", id)));
            }
        };
        body.extend(fields);

        let body = serde_json::to_string(&body)
            .map_err(|e| Error::Internal(format!("Failed to serialize document: {}", e)))?;
        sqlx::query("UPDATE search_documents SET body = ?, updated_at = ? WHERE id = ?")
            .bind(body)
            .bind(Utc::now().to_rfc3339())
            .bind(id)
            .execute(&self.db)
            .await?;

        Ok(())
    }

    async fn delete_document(&self, id: i64) -> Result<()> {
        sqlx::query("DELETE FROM search_documents WHERE id = ?")
            .bind(id)
            .execute(&self.db)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_memory_pool;
    use crate::models::RecordKind;
    use serde_json::json;

    #[tokio::test]
    async fn test_partial_update_merges_fields() {
        let pool = init_memory_pool().await.unwrap();
        let index = SqliteSearchIndex::new(pool);
        index
            .index_document(&SearchDocument {
                id: 200,
                kind: RecordKind::InformationObject,
                body: json!({"id": 200, "title": "Series A", "lft": 2}),
            })
            .await
            .unwrap();

        index.partial_update(200, json!({"lft": 8})).await.unwrap();

        let body = index.get(200).await.unwrap().unwrap();
        assert_eq!(body["lft"], 8);
        assert_eq!(body["title"], "Series A");
    }

    #[tokio::test]
    async fn test_partial_update_of_missing_document() {
        let pool = init_memory_pool().await.unwrap();
        let index = SqliteSearchIndex::new(pool);
        let err = index.partial_update(999, json!({"lft": 1})).await.unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }
}
