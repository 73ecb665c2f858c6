//! Database access for archivist-jobs
//!
//! One SQLite file in the root folder holds jobs, settings, the record trees
//! and the search documents.

pub mod jobs;
pub mod settings;

use crate::models::record::{
    GENRE_TAXONOMY_ID, INFORMATION_OBJECT_ROOT_ID, PLACE_TAXONOMY_ID, SUBJECT_TAXONOMY_ID,
    TERM_ROOT_ID,
};
use archivist_common::Result;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;
use std::path::Path;

/// Initialize database connection pool and create tables
pub async fn init_database_pool(db_path: &Path) -> Result<SqlitePool> {
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    // mode=rwc: read, write, create
    let db_url = format!("sqlite://{}?mode=rwc", db_path.display());
    tracing::debug!("Connecting to database: {}", db_url);

    let pool = SqlitePool::connect(&db_url).await?;
    init_tables(&pool).await?;

    Ok(pool)
}

/// In-memory database with every table created and roots seeded
///
/// Single connection: each new connection to `sqlite::memory:` would see an
/// empty database.
pub async fn init_memory_pool() -> Result<SqlitePool> {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await?;
    init_tables(&pool).await?;
    Ok(pool)
}

/// Create tables if missing and seed the tree roots and taxonomies
pub async fn init_tables(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS settings (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS jobs (
            id TEXT PRIMARY KEY,
            kind TEXT NOT NULL,
            payload TEXT NOT NULL,
            user_name TEXT NOT NULL,
            user_is_admin INTEGER NOT NULL DEFAULT 0,
            status TEXT NOT NULL,
            log TEXT NOT NULL DEFAULT '[]',
            warn_count INTEGER,
            error_count INTEGER,
            download_path TEXT,
            created_at TEXT NOT NULL,
            started_at TEXT,
            ended_at TEXT
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_jobs_status ON jobs(status, created_at)")
        .execute(pool)
        .await?;

    // Nested sets are scoped per kind: information objects and terms each
    // form their own tree. Taxonomies have no lft/rgt.
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS objects (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            kind TEXT NOT NULL,
            parent_id INTEGER REFERENCES objects(id),
            lft INTEGER,
            rgt INTEGER,
            slug TEXT UNIQUE,
            identifier TEXT,
            title TEXT,
            legacy_id TEXT,
            taxonomy_id INTEGER,
            repository_slug TEXT,
            culture TEXT NOT NULL DEFAULT 'en',
            properties TEXT NOT NULL DEFAULT '{}',
            updated_at TEXT
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_objects_parent ON objects(parent_id, lft)")
        .execute(pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_objects_kind_lft ON objects(kind, lft)")
        .execute(pool)
        .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS object_term_relations (
            object_id INTEGER NOT NULL REFERENCES objects(id),
            term_id INTEGER NOT NULL REFERENCES objects(id),
            PRIMARY KEY (object_id, term_id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS search_documents (
            id INTEGER PRIMARY KEY,
            kind TEXT NOT NULL,
            body TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    seed_roots(pool).await?;

    tracing::info!(
        "Database tables initialized (settings, jobs, objects, object_term_relations, search_documents)"
    );

    Ok(())
}

async fn seed_roots(pool: &SqlitePool) -> Result<()> {
    let roots = [
        (INFORMATION_OBJECT_ROOT_ID, "information_object", "root-information-object"),
        (TERM_ROOT_ID, "term", "root-term"),
    ];
    for (id, kind, slug) in roots {
        sqlx::query(
            "INSERT OR IGNORE INTO objects (id, kind, parent_id, lft, rgt, slug, title)
             VALUES (?, ?, NULL, 1, 2, ?, 'Root')",
        )
        .bind(id)
        .bind(kind)
        .bind(slug)
        .execute(pool)
        .await?;
    }

    let taxonomies = [
        (SUBJECT_TAXONOMY_ID, "subjects", "Subjects"),
        (PLACE_TAXONOMY_ID, "places", "Places"),
        (GENRE_TAXONOMY_ID, "genres", "Genres"),
    ];
    for (id, slug, title) in taxonomies {
        sqlx::query(
            "INSERT OR IGNORE INTO objects (id, kind, parent_id, lft, rgt, slug, title)
             VALUES (?, 'taxonomy', NULL, NULL, NULL, ?, ?)",
        )
        .bind(id)
        .bind(slug)
        .bind(title)
        .execute(pool)
        .await?;
    }

    Ok(())
}
