use async_trait::async_trait;
use log::{info, warn};
use sqlx::{postgres::PgPoolOptions, Postgres, Row, Transaction};

use super::{Expect, KvStore, RawRow, StoreError, WriteOp};
use crate::PGPool;

const CREATE_TABLE: &str = "CREATE TABLE IF NOT EXISTS kv_store (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL,
    version BIGINT NOT NULL
)";

fn backend(err: sqlx::Error) -> StoreError {
    StoreError::Backend { message: err.to_string() }
}

/// Key-value rows in a single PostgreSQL table. Conditional writes are
/// expressed in the WHERE clause and a batch runs in one transaction.
pub struct PgStore {
    pool: PGPool,
}

impl PgStore {
    pub async fn connect(db_url: &str, max_connections: u32) -> Result<Self, StoreError> {
        let pool: PGPool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(db_url)
            .await
            .map_err(backend)?;
        info!("connected to postgresql");
        sqlx::query(CREATE_TABLE).execute(&pool).await.map_err(backend)?;
        Ok(Self { pool })
    }
}

async fn apply(tx: &mut Transaction<'_, Postgres>, op: &WriteOp) -> Result<u64, sqlx::Error> {
    let res = match op {
        WriteOp::Put { key, value, expect: Expect::Absent } => {
            sqlx::query("INSERT INTO kv_store (key, value, version) VALUES ($1, $2, 1) ON CONFLICT (key) DO NOTHING")
                .bind(key)
                .bind(value)
                .execute(&mut **tx)
                .await?
        }
        WriteOp::Put { key, value, expect: Expect::Version(v) } => {
            sqlx::query("UPDATE kv_store SET value = $2, version = version + 1 WHERE key = $1 AND version = $3")
                .bind(key)
                .bind(value)
                .bind(*v)
                .execute(&mut **tx)
                .await?
        }
        WriteOp::Put { key, value, expect: Expect::Any } => {
            sqlx::query(
                "INSERT INTO kv_store (key, value, version) VALUES ($1, $2, 1)
                 ON CONFLICT (key) DO UPDATE SET value = EXCLUDED.value, version = kv_store.version + 1",
            )
            .bind(key)
            .bind(value)
            .execute(&mut **tx)
            .await?
        }
        WriteOp::Delete { key, expect: Expect::Version(v) } => {
            sqlx::query("DELETE FROM kv_store WHERE key = $1 AND version = $2")
                .bind(key)
                .bind(*v)
                .execute(&mut **tx)
                .await?
        }
        WriteOp::Delete { key, expect: Expect::Any } => {
            sqlx::query("DELETE FROM kv_store WHERE key = $1")
                .bind(key)
                .execute(&mut **tx)
                .await?;
            return Ok(1);
        }
        WriteOp::Delete { key, expect: Expect::Absent } => {
            let row = sqlx::query("SELECT 1 FROM kv_store WHERE key = $1")
                .bind(key)
                .fetch_optional(&mut **tx)
                .await?;
            return Ok(if row.is_none() { 1 } else { 0 });
        }
    };
    Ok(res.rows_affected())
}

#[async_trait]
impl KvStore for PgStore {
    async fn get(&self, key: &str) -> Result<Option<RawRow>, StoreError> {
        let row = sqlx::query("SELECT key, value, version FROM kv_store WHERE key = $1")
            .bind(key)
            .fetch_optional(&self.pool)
            .await
            .map_err(backend)?;
        match row {
            Some(row) => Ok(Some(RawRow {
                key: row.try_get("key").map_err(backend)?,
                value: row.try_get("value").map_err(backend)?,
                version: row.try_get("version").map_err(backend)?,
            })),
            None => Ok(None),
        }
    }

    async fn scan_prefix(&self, prefix: &str) -> Result<Vec<RawRow>, StoreError> {
        let rows = sqlx::query("SELECT key, value, version FROM kv_store WHERE starts_with(key, $1) ORDER BY key")
            .bind(prefix)
            .fetch_all(&self.pool)
            .await
            .map_err(backend)?;
        rows.into_iter()
            .map(|row| {
                Ok(RawRow {
                    key: row.try_get("key").map_err(backend)?,
                    value: row.try_get("value").map_err(backend)?,
                    version: row.try_get("version").map_err(backend)?,
                })
            })
            .collect()
    }

    async fn commit(&self, ops: Vec<WriteOp>) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await.map_err(backend)?;
        for op in &ops {
            let affected = apply(&mut tx, op).await.map_err(backend)?;
            if affected != 1 {
                warn!("precondition failed on '{}', rolling back", op.key());
                tx.rollback().await.map_err(backend)?;
                return Err(StoreError::Conflict { key: op.key().to_string() });
            }
        }
        tx.commit().await.map_err(backend)
    }
}
