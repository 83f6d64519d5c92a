use async_trait::async_trait;
use sqlx::{PgPool, Row, postgres::PgRow};

use crate::store::{ChangeSet, StateStore};
use crate::{Result, StoreError, Version, VersionedValue};

const PRIMARY_KEY: &str = "state_entries_pkey";

/// PostgreSQL-backed state store.
///
/// Entries live in a single `state_entries` table keyed by
/// `(collection, key)`. Commits lock every checked row with
/// `SELECT ... FOR UPDATE` before comparing versions, so concurrent
/// transactions on the same entry serialize and the later one conflicts.
#[derive(Clone)]
pub struct PostgresStateStore {
    pool: PgPool,
}

impl PostgresStateStore {
    /// Creates a new PostgreSQL state store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("../../migrations").run(&self.pool).await?;
        Ok(())
    }

    fn row_to_value(row: &PgRow) -> Result<VersionedValue> {
        Ok(VersionedValue {
            value: row.try_get("value")?,
            version: Version::new(row.try_get("version")?),
        })
    }
}

/// Maps lock and uniqueness failures onto the conflict the caller can retry.
fn classify(err: sqlx::Error, collection: &str, key: &str) -> StoreError {
    if let sqlx::Error::Database(ref db_err) = err {
        let lost_race = db_err.constraint() == Some(PRIMARY_KEY)
            || matches!(db_err.code().as_deref(), Some("40001") | Some("40P01"));
        if lost_race {
            return StoreError::conflict(collection, key);
        }
    }
    StoreError::Database(err)
}

#[async_trait]
impl StateStore for PostgresStateStore {
    async fn read(&self, collection: &str, key: &str) -> Result<Option<VersionedValue>> {
        let row: Option<PgRow> = sqlx::query(
            r#"
            SELECT value, version
            FROM state_entries
            WHERE collection = $1 AND key = $2
            "#,
        )
        .bind(collection)
        .bind(key)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(Self::row_to_value).transpose()
    }

    async fn scan(&self, collection: &str) -> Result<Vec<(String, VersionedValue)>> {
        let rows = sqlx::query(
            r#"
            SELECT key, value, version
            FROM state_entries
            WHERE collection = $1
            ORDER BY key ASC
            "#,
        )
        .bind(collection)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| Ok((row.try_get("key")?, Self::row_to_value(row)?)))
            .collect()
    }

    async fn commit(&self, changes: ChangeSet) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        for check in &changes.checks {
            let (collection, key) = (&check.entry.collection, &check.entry.key);
            let current: Option<i64> = sqlx::query_scalar(
                "SELECT version FROM state_entries WHERE collection = $1 AND key = $2 FOR UPDATE",
            )
            .bind(collection)
            .bind(key)
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| classify(e, collection, key))?;

            if current.map(Version::new) != check.expected {
                return Err(StoreError::conflict(collection, key));
            }
        }

        for mutation in &changes.writes {
            let (collection, key) = (&mutation.entry.collection, &mutation.entry.key);
            let query = match &mutation.value {
                // An entry read as absent must still be absent: a plain
                // insert turns a concurrent insert into a key violation.
                Some(value) if changes.expects_absent(&mutation.entry) => sqlx::query(
                    r#"
                    INSERT INTO state_entries (collection, key, value, version)
                    VALUES ($1, $2, $3, nextval('state_entry_version_seq'))
                    "#,
                )
                .bind(collection)
                .bind(key)
                .bind(value),
                Some(value) => sqlx::query(
                    r#"
                    INSERT INTO state_entries (collection, key, value, version)
                    VALUES ($1, $2, $3, nextval('state_entry_version_seq'))
                    ON CONFLICT (collection, key) DO UPDATE SET
                        value = EXCLUDED.value,
                        version = EXCLUDED.version,
                        updated_at = NOW()
                    "#,
                )
                .bind(collection)
                .bind(key)
                .bind(value),
                None => sqlx::query("DELETE FROM state_entries WHERE collection = $1 AND key = $2")
                    .bind(collection)
                    .bind(key),
            };

            query
                .execute(&mut *tx)
                .await
                .map_err(|e| classify(e, collection, key))?;
        }

        tx.commit().await?;
        Ok(())
    }
}
