//! SQLite-backed resource repository
//!
//! All tree arithmetic runs inside a transaction and reads positions from the
//! database, never from the record cache. The cache only serves `get_by_id`.

use super::nested_set::{is_within, plan_move, ShiftPlan};
use super::{MatchCriteria, ResourceRepository, ScopeLimit, SiblingPlacement};
use crate::models::record::{GENRE_TAXONOMY_ID, PLACE_TAXONOMY_ID, SUBJECT_TAXONOMY_ID};
use crate::models::{HierarchicalRecord, NewRecord, RecordKind, RecordUpdate};
use crate::search::{AccessPoints, SearchDocument};
use crate::utils::slug::slugify;
use archivist_common::{Error, Result};
use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use sqlx::sqlite::SqliteRow;
use sqlx::{QueryBuilder, Row, Sqlite, SqliteConnection, SqlitePool};
use std::collections::HashMap;
use std::sync::Mutex;

const RECORD_COLUMNS: &str = "id, kind, parent_id, lft, rgt, slug, identifier, title, legacy_id, \
     taxonomy_id, repository_slug, culture, properties";

/// Tree position of one record, read inside a transaction
#[derive(Debug, Clone, Copy)]
struct TreePosition {
    id: i64,
    kind: RecordKind,
    parent_id: Option<i64>,
    lft: Option<i64>,
    rgt: Option<i64>,
}

impl TreePosition {
    fn bounds(&self) -> Result<(i64, i64)> {
        match (self.lft, self.rgt) {
            (Some(lft), Some(rgt)) => Ok((lft, rgt)),
            _ => Err(Error::InvalidInput(format!(
                "Record {} ({}) is not part of a tree",
                self.id,
                self.kind.as_str()
            ))),
        }
    }
}

pub struct SqliteRepository {
    db: SqlitePool,
    cache: Mutex<HashMap<i64, HierarchicalRecord>>,
}

impl SqliteRepository {
    pub fn new(db: SqlitePool) -> Self {
        Self {
            db,
            cache: Mutex::new(HashMap::new()),
        }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.db
    }

    fn cached(&self, id: i64) -> Option<HierarchicalRecord> {
        self.cache
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(&id)
            .cloned()
    }

    fn remember(&self, record: &HierarchicalRecord) {
        self.cache
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(record.id, record.clone());
    }

    fn forget(&self, id: i64) {
        self.cache
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .remove(&id);
    }

    async fn load(&self, id: i64) -> Result<Option<HierarchicalRecord>> {
        let row = sqlx::query(&format!("SELECT {} FROM objects WHERE id = ?", RECORD_COLUMNS))
            .bind(id)
            .fetch_optional(&self.db)
            .await?;
        row.map(|row| record_from_row(&row)).transpose()
    }

    async fn access_points(&self, object_id: i64) -> Result<AccessPoints> {
        let rows: Vec<(Option<i64>, Option<String>)> = sqlx::query_as(
            "SELECT t.taxonomy_id, t.title
             FROM object_term_relations r JOIN objects t ON t.id = r.term_id
             WHERE r.object_id = ?
             ORDER BY t.title",
        )
        .bind(object_id)
        .fetch_all(&self.db)
        .await?;

        let mut points = AccessPoints::default();
        for (taxonomy_id, title) in rows {
            let Some(title) = title else { continue };
            match taxonomy_id {
                Some(SUBJECT_TAXONOMY_ID) => points.subjects.push(title),
                Some(PLACE_TAXONOMY_ID) => points.places.push(title),
                Some(GENRE_TAXONOMY_ID) => points.genres.push(title),
                _ => {}
            }
        }
        Ok(points)
    }
}

#[async_trait]
impl ResourceRepository for SqliteRepository {
    async fn get_by_id(&self, id: i64) -> Result<Option<HierarchicalRecord>> {
        if let Some(record) = self.cached(id) {
            return Ok(Some(record));
        }

        let record = self.load(id).await?;
        if let Some(record) = &record {
            self.remember(record);
        }
        Ok(record)
    }

    async fn find_by_slug(&self, slug: &str) -> Result<Option<HierarchicalRecord>> {
        let row = sqlx::query(&format!("SELECT {} FROM objects WHERE slug = ?", RECORD_COLUMNS))
            .bind(slug)
            .fetch_optional(&self.db)
            .await?;
        row.map(|row| record_from_row(&row)).transpose()
    }

    async fn find_by_legacy_id(
        &self,
        kind: RecordKind,
        legacy_id: &str,
    ) -> Result<Option<HierarchicalRecord>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM objects WHERE kind = ? AND legacy_id = ? ORDER BY id DESC LIMIT 1",
            RECORD_COLUMNS
        ))
        .bind(kind.as_str())
        .bind(legacy_id)
        .fetch_optional(&self.db)
        .await?;
        row.map(|row| record_from_row(&row)).transpose()
    }

    async fn reparent(&self, id: i64, new_parent_id: i64) -> Result<()> {
        let mut tx = self.db.begin().await?;

        let node = fetch_position(&mut tx, id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("Record {}", id)))?;
        let parent = fetch_position(&mut tx, new_parent_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("Record {}", new_parent_id)))?;

        if node.parent_id == Some(new_parent_id) {
            return Ok(());
        }
        if node.parent_id.is_none() {
            return Err(Error::InvalidInput(format!("Record {} is a tree root", id)));
        }
        if node.kind != parent.kind {
            return Err(Error::InvalidInput(format!(
                "Cannot move {} {} under {} {}",
                node.kind.as_str(),
                id,
                parent.kind.as_str(),
                new_parent_id
            )));
        }

        let (lft, rgt) = node.bounds()?;
        let (parent_lft, parent_rgt) = parent.bounds()?;
        if is_within(lft, rgt, parent_lft) {
            return Err(Error::InvalidInput(format!(
                "Cannot move record {} under itself or a descendant",
                id
            )));
        }

        if let Some(plan) = plan_move(lft, rgt, parent_rgt) {
            apply_shift(&mut tx, node.kind, &plan).await?;
        }

        sqlx::query("UPDATE objects SET parent_id = ?, updated_at = ? WHERE id = ?")
            .bind(new_parent_id)
            .bind(Utc::now().to_rfc3339())
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        self.clear_cache();

        tracing::debug!(record_id = id, parent_id = new_parent_id, "Record reparented");
        Ok(())
    }

    async fn ordered_sibling_ids(&self, parent_id: i64) -> Result<Vec<i64>> {
        let mut conn = self.db.acquire().await?;
        sibling_ids(&mut conn, parent_id).await
    }

    async fn move_relative_to(
        &self,
        id: i64,
        target_id: i64,
        placement: SiblingPlacement,
        expected_siblings: &[i64],
    ) -> Result<()> {
        let mut tx = self.db.begin().await?;

        let node = fetch_position(&mut tx, id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("Record {}", id)))?;
        let target = fetch_position(&mut tx, target_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("Record {}", target_id)))?;

        let Some(parent_id) = node.parent_id else {
            return Err(Error::InvalidInput(format!("Record {} is a tree root", id)));
        };
        if target.parent_id != Some(parent_id) {
            return Err(Error::Conflict(format!(
                "Records {} and {} are no longer siblings",
                id, target_id
            )));
        }

        let current = sibling_ids(&mut tx, parent_id).await?;
        if current != expected_siblings {
            return Err(Error::Conflict(format!(
                "sibling order under {} is now {:?}, expected {:?}",
                parent_id, current, expected_siblings
            )));
        }

        if id == target_id {
            return Ok(());
        }

        let (lft, rgt) = node.bounds()?;
        let (target_lft, target_rgt) = target.bounds()?;
        let destination = match placement {
            SiblingPlacement::Before => target_lft,
            SiblingPlacement::After => target_rgt + 1,
        };

        if let Some(plan) = plan_move(lft, rgt, destination) {
            apply_shift(&mut tx, node.kind, &plan).await?;
        }

        tx.commit().await?;
        self.clear_cache();
        Ok(())
    }

    fn clear_cache(&self) {
        self.cache
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clear();
    }

    async fn insert_child(&self, parent_id: i64, record: NewRecord) -> Result<HierarchicalRecord> {
        let mut tx = self.db.begin().await?;

        let parent = fetch_position(&mut tx, parent_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("Parent record {}", parent_id)))?;
        if parent.kind != record.kind {
            return Err(Error::InvalidInput(format!(
                "Cannot add {} under {} {}",
                record.kind.as_str(),
                parent.kind.as_str(),
                parent_id
            )));
        }
        let (_, parent_rgt) = parent.bounds()?;

        let slug = unique_slug(&mut tx, record.title.as_deref().unwrap_or("")).await?;
        let kind = record.kind.as_str();

        sqlx::query("UPDATE objects SET rgt = rgt + 2 WHERE kind = ? AND rgt >= ?")
            .bind(kind)
            .bind(parent_rgt)
            .execute(&mut *tx)
            .await?;
        sqlx::query("UPDATE objects SET lft = lft + 2 WHERE kind = ? AND lft > ?")
            .bind(kind)
            .bind(parent_rgt)
            .execute(&mut *tx)
            .await?;

        let properties = serde_json::to_string(&record.properties)
            .map_err(|e| Error::Internal(format!("Failed to serialize properties: {}", e)))?;
        let id = sqlx::query(
            "INSERT INTO objects (kind, parent_id, lft, rgt, slug, identifier, title, legacy_id,
                                  taxonomy_id, repository_slug, culture, properties, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(kind)
        .bind(parent_id)
        .bind(parent_rgt)
        .bind(parent_rgt + 1)
        .bind(&slug)
        .bind(&record.identifier)
        .bind(&record.title)
        .bind(&record.legacy_id)
        .bind(record.taxonomy_id)
        .bind(&record.repository_slug)
        .bind(&record.culture)
        .bind(properties)
        .bind(Utc::now().to_rfc3339())
        .execute(&mut *tx)
        .await?
        .last_insert_rowid();

        tx.commit().await?;
        self.clear_cache();

        self.load(id)
            .await?
            .ok_or_else(|| Error::Internal(format!("Inserted record {} vanished", id)))
    }

    async fn update_fields(&self, id: i64, update: RecordUpdate) -> Result<()> {
        let current = self
            .load(id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("Record {}", id)))?;

        let properties = match (current.properties, update.properties) {
            (Value::Object(mut stored), Some(changes)) => {
                stored.extend(changes);
                Value::Object(stored)
            }
            (_, Some(changes)) => Value::Object(changes),
            (stored, None) => stored,
        };
        let properties = serde_json::to_string(&properties)
            .map_err(|e| Error::Internal(format!("Failed to serialize properties: {}", e)))?;

        sqlx::query(
            "UPDATE objects SET
                title = COALESCE(?, title),
                identifier = COALESCE(?, identifier),
                repository_slug = COALESCE(?, repository_slug),
                culture = COALESCE(?, culture),
                properties = ?,
                updated_at = ?
             WHERE id = ?",
        )
        .bind(&update.title)
        .bind(&update.identifier)
        .bind(&update.repository_slug)
        .bind(&update.culture)
        .bind(properties)
        .bind(Utc::now().to_rfc3339())
        .bind(id)
        .execute(&self.db)
        .await?;

        self.forget(id);
        Ok(())
    }

    async fn delete_subtree(&self, id: i64) -> Result<Vec<i64>> {
        let mut tx = self.db.begin().await?;

        let node = fetch_position(&mut tx, id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("Record {}", id)))?;
        if node.parent_id.is_none() {
            return Err(Error::InvalidInput(format!("Record {} is a tree root", id)));
        }
        let (lft, rgt) = node.bounds()?;
        let kind = node.kind.as_str();

        let ids: Vec<i64> = sqlx::query_scalar(
            "SELECT id FROM objects WHERE kind = ? AND lft BETWEEN ? AND ? ORDER BY lft",
        )
        .bind(kind)
        .bind(lft)
        .bind(rgt)
        .fetch_all(&mut *tx)
        .await?;

        sqlx::query(
            "DELETE FROM object_term_relations
             WHERE object_id IN (SELECT id FROM objects WHERE kind = ? AND lft BETWEEN ? AND ?)
                OR term_id IN (SELECT id FROM objects WHERE kind = ? AND lft BETWEEN ? AND ?)",
        )
        .bind(kind)
        .bind(lft)
        .bind(rgt)
        .bind(kind)
        .bind(lft)
        .bind(rgt)
        .execute(&mut *tx)
        .await?;

        sqlx::query("DELETE FROM objects WHERE kind = ? AND lft BETWEEN ? AND ?")
            .bind(kind)
            .bind(lft)
            .bind(rgt)
            .execute(&mut *tx)
            .await?;

        let width = rgt - lft + 1;
        sqlx::query(
            "UPDATE objects SET
                lft = CASE WHEN lft > ? THEN lft - ? ELSE lft END,
                rgt = CASE WHEN rgt > ? THEN rgt - ? ELSE rgt END
             WHERE kind = ? AND rgt > ?",
        )
        .bind(rgt)
        .bind(width)
        .bind(rgt)
        .bind(width)
        .bind(kind)
        .bind(rgt)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        self.clear_cache();

        tracing::debug!(record_id = id, deleted = ids.len(), "Subtree deleted");
        Ok(ids)
    }

    async fn find_match(&self, criteria: &MatchCriteria) -> Result<Option<HierarchicalRecord>> {
        if criteria.identifier.is_none() && criteria.title.is_none() {
            return Ok(None);
        }

        let collection_bounds = match &criteria.scope {
            Some(ScopeLimit::Collection(slug)) => match self.find_by_slug(slug).await? {
                Some(HierarchicalRecord {
                    lft: Some(lft),
                    rgt: Some(rgt),
                    ..
                }) => Some((lft, rgt)),
                // A limit that resolves to nothing matches nothing
                _ => return Ok(None),
            },
            _ => None,
        };

        let mut query: QueryBuilder<Sqlite> =
            QueryBuilder::new(format!("SELECT {} FROM objects WHERE kind = ", RECORD_COLUMNS));
        query.push_bind(criteria.kind.as_str());
        if let Some(identifier) = &criteria.identifier {
            query.push(" AND identifier = ").push_bind(identifier.clone());
        }
        if let Some(title) = &criteria.title {
            query.push(" AND title = ").push_bind(title.clone());
        }
        if let Some(ScopeLimit::Repository(slug)) = &criteria.scope {
            query.push(" AND repository_slug = ").push_bind(slug.clone());
        }
        if let Some((lft, rgt)) = collection_bounds {
            query
                .push(" AND lft BETWEEN ")
                .push_bind(lft)
                .push(" AND ")
                .push_bind(rgt);
        }
        query.push(" ORDER BY id LIMIT 1");

        let row = query.build().fetch_optional(&self.db).await?;
        row.map(|row| record_from_row(&row)).transpose()
    }

    async fn find_term_by_name(
        &self,
        taxonomy_id: i64,
        name: &str,
    ) -> Result<Option<HierarchicalRecord>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM objects
             WHERE kind = 'term' AND taxonomy_id = ? AND title = ? COLLATE NOCASE
             ORDER BY id LIMIT 1",
            RECORD_COLUMNS
        ))
        .bind(taxonomy_id)
        .bind(name)
        .fetch_optional(&self.db)
        .await?;
        row.map(|row| record_from_row(&row)).transpose()
    }

    async fn link_term(&self, object_id: i64, term_id: i64) -> Result<()> {
        sqlx::query("INSERT OR IGNORE INTO object_term_relations (object_id, term_id) VALUES (?, ?)")
            .bind(object_id)
            .bind(term_id)
            .execute(&self.db)
            .await?;
        Ok(())
    }

    async fn linked_object_ids(&self, term_id: i64) -> Result<Vec<i64>> {
        let ids = sqlx::query_scalar(
            "SELECT r.object_id
             FROM object_term_relations r JOIN objects o ON o.id = r.object_id
             WHERE r.term_id = ? AND o.kind = 'information_object'
             ORDER BY r.object_id",
        )
        .bind(term_id)
        .fetch_all(&self.db)
        .await?;
        Ok(ids)
    }

    async fn rename(&self, id: i64, name: &str) -> Result<()> {
        let result = sqlx::query("UPDATE objects SET title = ?, updated_at = ? WHERE id = ?")
            .bind(name)
            .bind(Utc::now().to_rfc3339())
            .bind(id)
            .execute(&self.db)
            .await?;

        if result.rows_affected() == 0 {
            return Err(Error::NotFound(format!("Record {}", id)));
        }
        self.forget(id);
        Ok(())
    }

    async fn document_for(&self, id: i64) -> Result<Option<SearchDocument>> {
        let Some(record) = self.get_by_id(id).await? else {
            return Ok(None);
        };
        let access_points = self.access_points(id).await?;
        Ok(Some(SearchDocument::from_record(&record, &access_points)))
    }
}

// ============================================================================
// Transaction helpers
// ============================================================================

async fn fetch_position(conn: &mut SqliteConnection, id: i64) -> Result<Option<TreePosition>> {
    let row: Option<(i64, String, Option<i64>, Option<i64>, Option<i64>)> =
        sqlx::query_as("SELECT id, kind, parent_id, lft, rgt FROM objects WHERE id = ?")
            .bind(id)
            .fetch_optional(&mut *conn)
            .await?;

    row.map(|(id, kind, parent_id, lft, rgt)| {
        Ok(TreePosition {
            id,
            kind: parse_kind(&kind)?,
            parent_id,
            lft,
            rgt,
        })
    })
    .transpose()
}

async fn sibling_ids(conn: &mut SqliteConnection, parent_id: i64) -> Result<Vec<i64>> {
    let ids = sqlx::query_scalar("SELECT id FROM objects WHERE parent_id = ? ORDER BY lft, id")
        .bind(parent_id)
        .fetch_all(&mut *conn)
        .await?;
    Ok(ids)
}

/// Rewrite `lft`/`rgt` of one tree according to `plan`
///
/// SET expressions see pre-update values, so both boundaries shift from the
/// same old numbering.
async fn apply_shift(conn: &mut SqliteConnection, kind: RecordKind, plan: &ShiftPlan) -> Result<()> {
    let (span_lo, span_hi) = plan.span();
    let (moved_lo, moved_hi) = plan.moved;
    let (displaced_lo, displaced_hi) = plan.displaced;

    sqlx::query(
        "UPDATE objects SET
            lft = CASE
                WHEN lft BETWEEN ? AND ? THEN lft + ?
                WHEN lft BETWEEN ? AND ? THEN lft + ?
                ELSE lft END,
            rgt = CASE
                WHEN rgt BETWEEN ? AND ? THEN rgt + ?
                WHEN rgt BETWEEN ? AND ? THEN rgt + ?
                ELSE rgt END
         WHERE kind = ? AND (lft BETWEEN ? AND ? OR rgt BETWEEN ? AND ?)",
    )
    .bind(moved_lo)
    .bind(moved_hi)
    .bind(plan.moved_delta)
    .bind(displaced_lo)
    .bind(displaced_hi)
    .bind(plan.displaced_delta)
    .bind(moved_lo)
    .bind(moved_hi)
    .bind(plan.moved_delta)
    .bind(displaced_lo)
    .bind(displaced_hi)
    .bind(plan.displaced_delta)
    .bind(kind.as_str())
    .bind(span_lo)
    .bind(span_hi)
    .bind(span_lo)
    .bind(span_hi)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

async fn unique_slug(conn: &mut SqliteConnection, title: &str) -> Result<String> {
    let base = slugify(title);
    let mut candidate = base.clone();
    let mut suffix = 2;

    loop {
        let taken: Option<i64> = sqlx::query_scalar("SELECT id FROM objects WHERE slug = ?")
            .bind(&candidate)
            .fetch_optional(&mut *conn)
            .await?;
        if taken.is_none() {
            return Ok(candidate);
        }
        candidate = format!("{}-{}", base, suffix);
        suffix += 1;
    }
}

fn parse_kind(value: &str) -> Result<RecordKind> {
    RecordKind::parse(value).ok_or_else(|| Error::Internal(format!("Unknown record kind: {}", value)))
}

fn record_from_row(row: &SqliteRow) -> Result<HierarchicalRecord> {
    let kind: String = row.get("kind");
    let properties: String = row.get("properties");
    let properties = serde_json::from_str(&properties)
        .map_err(|e| Error::Internal(format!("Corrupt properties: {}", e)))?;

    Ok(HierarchicalRecord {
        id: row.get("id"),
        kind: parse_kind(&kind)?,
        parent_id: row.get("parent_id"),
        lft: row.get("lft"),
        rgt: row.get("rgt"),
        slug: row.get("slug"),
        identifier: row.get("identifier"),
        title: row.get("title"),
        legacy_id: row.get("legacy_id"),
        taxonomy_id: row.get("taxonomy_id"),
        repository_slug: row.get("repository_slug"),
        culture: row.get("culture"),
        properties,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_memory_pool;
    use crate::models::record::INFORMATION_OBJECT_ROOT_ID;

    async fn repository() -> SqliteRepository {
        SqliteRepository::new(init_memory_pool().await.unwrap())
    }

    async fn add(repo: &SqliteRepository, parent: i64, title: &str) -> i64 {
        repo.insert_child(parent, NewRecord::information_object(Some(title.to_string())))
            .await
            .unwrap()
            .id
    }

    #[tokio::test]
    async fn test_insert_child_appends_last() {
        let repo = repository().await;
        let a = add(&repo, INFORMATION_OBJECT_ROOT_ID, "A").await;
        let b = add(&repo, INFORMATION_OBJECT_ROOT_ID, "B").await;
        let a1 = add(&repo, a, "A1").await;

        assert_eq!(
            repo.ordered_sibling_ids(INFORMATION_OBJECT_ROOT_ID).await.unwrap(),
            vec![a, b]
        );

        let root = repo.load(INFORMATION_OBJECT_ROOT_ID).await.unwrap().unwrap();
        assert_eq!((root.lft, root.rgt), (Some(1), Some(8)));
        let a_rec = repo.load(a).await.unwrap().unwrap();
        assert_eq!((a_rec.lft, a_rec.rgt), (Some(2), Some(5)));
        let a1_rec = repo.load(a1).await.unwrap().unwrap();
        assert_eq!(a1_rec.parent_id, Some(a));
        assert_eq!((a1_rec.lft, a1_rec.rgt), (Some(3), Some(4)));
    }

    #[tokio::test]
    async fn test_slugs_are_unique() {
        let repo = repository().await;
        let first = add(&repo, INFORMATION_OBJECT_ROOT_ID, "Letters").await;
        let second = add(&repo, INFORMATION_OBJECT_ROOT_ID, "Letters").await;

        let first = repo.load(first).await.unwrap().unwrap();
        let second = repo.load(second).await.unwrap().unwrap();
        assert_eq!(first.slug.as_deref(), Some("letters"));
        assert_eq!(second.slug.as_deref(), Some("letters-2"));
    }

    #[tokio::test]
    async fn test_reparent_moves_subtree() {
        let repo = repository().await;
        let a = add(&repo, INFORMATION_OBJECT_ROOT_ID, "A").await;
        let b = add(&repo, INFORMATION_OBJECT_ROOT_ID, "B").await;
        let a1 = add(&repo, a, "A1").await;

        repo.reparent(a, b).await.unwrap();

        assert_eq!(repo.ordered_sibling_ids(INFORMATION_OBJECT_ROOT_ID).await.unwrap(), vec![b]);
        assert_eq!(repo.ordered_sibling_ids(b).await.unwrap(), vec![a]);
        assert_eq!(repo.ordered_sibling_ids(a).await.unwrap(), vec![a1]);

        let b_rec = repo.load(b).await.unwrap().unwrap();
        let a1_rec = repo.load(a1).await.unwrap().unwrap();
        assert!(b_rec.lft < a1_rec.lft && a1_rec.rgt < b_rec.rgt);
    }

    #[tokio::test]
    async fn test_reparent_under_descendant_is_refused() {
        let repo = repository().await;
        let a = add(&repo, INFORMATION_OBJECT_ROOT_ID, "A").await;
        let a1 = add(&repo, a, "A1").await;

        let err = repo.reparent(a, a1).await.unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
        assert_eq!(repo.ordered_sibling_ids(a).await.unwrap(), vec![a1]);
    }

    #[tokio::test]
    async fn test_move_relative_to_reorders() {
        let repo = repository().await;
        let ids = [
            add(&repo, INFORMATION_OBJECT_ROOT_ID, "A").await,
            add(&repo, INFORMATION_OBJECT_ROOT_ID, "B").await,
            add(&repo, INFORMATION_OBJECT_ROOT_ID, "C").await,
        ];

        repo.move_relative_to(ids[0], ids[2], SiblingPlacement::After, &ids)
            .await
            .unwrap();

        assert_eq!(
            repo.ordered_sibling_ids(INFORMATION_OBJECT_ROOT_ID).await.unwrap(),
            vec![ids[1], ids[2], ids[0]]
        );
    }

    #[tokio::test]
    async fn test_move_relative_to_refuses_stale_snapshot() {
        let repo = repository().await;
        let a = add(&repo, INFORMATION_OBJECT_ROOT_ID, "A").await;
        let b = add(&repo, INFORMATION_OBJECT_ROOT_ID, "B").await;

        let err = repo
            .move_relative_to(b, a, SiblingPlacement::Before, &[b, a])
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Conflict(_)));
        assert_eq!(
            repo.ordered_sibling_ids(INFORMATION_OBJECT_ROOT_ID).await.unwrap(),
            vec![a, b]
        );
    }

    #[tokio::test]
    async fn test_cache_serves_stale_until_cleared() {
        let repo = repository().await;
        let a = add(&repo, INFORMATION_OBJECT_ROOT_ID, "A").await;
        let cached = repo.get_by_id(a).await.unwrap().unwrap();

        // Change the row behind the repository's back
        sqlx::query("UPDATE objects SET title = 'Changed' WHERE id = ?")
            .bind(a)
            .execute(repo.pool())
            .await
            .unwrap();
        assert_eq!(repo.get_by_id(a).await.unwrap().unwrap(), cached);

        repo.clear_cache();
        let fresh = repo.get_by_id(a).await.unwrap().unwrap();
        assert_eq!(fresh.title.as_deref(), Some("Changed"));
    }

    #[tokio::test]
    async fn test_delete_subtree_closes_gap() {
        let repo = repository().await;
        let a = add(&repo, INFORMATION_OBJECT_ROOT_ID, "A").await;
        let a1 = add(&repo, a, "A1").await;
        let b = add(&repo, INFORMATION_OBJECT_ROOT_ID, "B").await;

        let deleted = repo.delete_subtree(a).await.unwrap();
        assert_eq!(deleted, vec![a, a1]);

        let b_rec = repo.load(b).await.unwrap().unwrap();
        assert_eq!((b_rec.lft, b_rec.rgt), (Some(2), Some(3)));
        let root = repo.load(INFORMATION_OBJECT_ROOT_ID).await.unwrap().unwrap();
        assert_eq!(root.rgt, Some(4));
    }

    #[tokio::test]
    async fn test_find_match_within_repository() {
        let repo = repository().await;
        let mut record = NewRecord::information_object(Some("Minutes".to_string()));
        record.identifier = Some("F-1".to_string());
        record.repository_slug = Some("city-archives".to_string());
        let id = repo.insert_child(INFORMATION_OBJECT_ROOT_ID, record).await.unwrap().id;

        let mut criteria = MatchCriteria {
            kind: RecordKind::InformationObject,
            identifier: Some("F-1".to_string()),
            title: Some("Minutes".to_string()),
            scope: Some(ScopeLimit::Repository("city-archives".to_string())),
        };
        assert_eq!(repo.find_match(&criteria).await.unwrap().map(|r| r.id), Some(id));

        criteria.scope = Some(ScopeLimit::Repository("elsewhere".to_string()));
        assert!(repo.find_match(&criteria).await.unwrap().is_none());

        criteria.scope = Some(ScopeLimit::Collection("no-such-collection".to_string()));
        assert!(repo.find_match(&criteria).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_document_includes_access_points() {
        let repo = repository().await;
        let object = add(&repo, INFORMATION_OBJECT_ROOT_ID, "Harbour photographs").await;
        let term = repo
            .insert_child(crate::models::record::TERM_ROOT_ID, NewRecord::term(PLACE_TAXONOMY_ID, "Halifax"))
            .await
            .unwrap();
        repo.link_term(object, term.id).await.unwrap();

        assert_eq!(repo.linked_object_ids(term.id).await.unwrap(), vec![object]);

        let doc = repo.document_for(object).await.unwrap().unwrap();
        assert_eq!(doc.body["accessPoints"]["places"][0], "Halifax");
        assert_eq!(doc.body["title"], "Harbour photographs");
    }
}
