//! Settings database operations
//!
//! Key-value accessors over the `settings` table.

use crate::models::ValidatorMode;
use archivist_common::{Error, Result};
use sqlx::{Pool, Sqlite};

const CSV_VALIDATOR_MODE_KEY: &str = "csv_validator_default_import_behaviour";

/// CSV validator mode stored in the database, if any
pub async fn get_csv_validator_mode(db: &Pool<Sqlite>) -> Result<Option<ValidatorMode>> {
    get_setting(db, CSV_VALIDATOR_MODE_KEY).await
}

pub async fn set_csv_validator_mode(db: &Pool<Sqlite>, mode: ValidatorMode) -> Result<()> {
    set_setting(db, CSV_VALIDATOR_MODE_KEY, mode).await
}

/// Generic setting getter (internal)
async fn get_setting<T>(db: &Pool<Sqlite>, key: &str) -> Result<Option<T>>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    let row: Option<(String,)> = sqlx::query_as("SELECT value FROM settings WHERE key = ?")
        .bind(key)
        .fetch_optional(db)
        .await
        .map_err(Error::Database)?;

    match row {
        Some((value,)) => {
            let parsed = value
                .parse::<T>()
                .map_err(|e| Error::Config(format!("Parse setting {} failed: {}", key, e)))?;
            Ok(Some(parsed))
        }
        None => Ok(None),
    }
}

/// Generic setting setter (internal)
async fn set_setting<T>(db: &Pool<Sqlite>, key: &str, value: T) -> Result<()>
where
    T: std::fmt::Display,
{
    sqlx::query(
        "INSERT INTO settings (key, value) VALUES (?, ?)
         ON CONFLICT(key) DO UPDATE SET value = excluded.value",
    )
    .bind(key)
    .bind(value.to_string())
    .execute(db)
    .await
    .map_err(Error::Database)?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_memory_pool;

    #[tokio::test]
    async fn test_validator_mode_unset_by_default() {
        let pool = init_memory_pool().await.unwrap();
        assert_eq!(get_csv_validator_mode(&pool).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_validator_mode_overwrite() {
        let pool = init_memory_pool().await.unwrap();
        set_csv_validator_mode(&pool, ValidatorMode::Permissive).await.unwrap();
        set_csv_validator_mode(&pool, ValidatorMode::Strict).await.unwrap();
        assert_eq!(
            get_csv_validator_mode(&pool).await.unwrap(),
            Some(ValidatorMode::Strict)
        );
    }

    #[tokio::test]
    async fn test_unparseable_setting_is_config_error() {
        let pool = init_memory_pool().await.unwrap();
        set_setting(&pool, CSV_VALIDATOR_MODE_KEY, "sometimes").await.unwrap();
        let err = get_csv_validator_mode(&pool).await.unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }
}
