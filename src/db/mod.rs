pub mod memory;
pub mod postgres;
pub mod event;
pub mod booking;
pub mod ticket;

use std::{future::Future, sync::Arc, time::Duration};

use async_trait::async_trait;
use derive_more::{Display, Error};
use log::debug;
use serde::{de::DeserializeOwned, Deserialize, Serialize};

use crate::errors::ServiceError;

pub use memory::MemoryStore;
pub use postgres::PgStore;

/// Version of the row layout written by this build.
pub const SCHEMA_VERSION: u16 = 1;

#[derive(Debug, Display, Error, PartialEq)]
pub enum StoreError {
    #[display(fmt = "precondition failed on '{}'", key)]
    Conflict { key: String },

    #[display(fmt = "{}", message)]
    Backend { message: String },
}

/// A raw row as the store holds it.
#[derive(Debug, Clone, PartialEq)]
pub struct RawRow {
    pub key: String,
    pub value: String,
    pub version: i64,
}

/// What a write expects to find under its key at commit time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Expect {
    Absent,
    Version(i64),
    Any,
}

#[derive(Debug, Clone, PartialEq)]
pub enum WriteOp {
    Put { key: String, value: String, expect: Expect },
    Delete { key: String, expect: Expect },
}

impl WriteOp {
    pub fn key(&self) -> &str {
        match self {
            WriteOp::Put { key, .. } | WriteOp::Delete { key, .. } => key,
        }
    }
}

/// Flat string-keyed store. `commit` applies every write or none of them.
#[async_trait]
pub trait KvStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<RawRow>, StoreError>;

    async fn scan_prefix(&self, prefix: &str) -> Result<Vec<RawRow>, StoreError>;

    async fn commit(&self, ops: Vec<WriteOp>) -> Result<(), StoreError>;
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Envelope<T> {
    schema_version: u16,
    row: T,
}

/// A decoded row together with the version it was read at.
#[derive(Debug, Clone, PartialEq)]
pub struct Versioned<T> {
    pub row: T,
    pub version: i64,
}

impl<T> Versioned<T> {
    pub fn expect(&self) -> Expect {
        Expect::Version(self.version)
    }
}

pub fn encode<T: Serialize>(row: &T) -> Result<String, ServiceError> {
    Ok(serde_json::to_string(&Envelope { schema_version: SCHEMA_VERSION, row })?)
}

pub fn decode<T: DeserializeOwned>(raw: RawRow) -> Result<Versioned<T>, ServiceError> {
    let envelope: Envelope<T> = serde_json::from_str(&raw.value)?;
    if envelope.schema_version > SCHEMA_VERSION {
        return Err(ServiceError::StorageError {
            message: format!(
                "row '{}' has schema version {}, newest known is {}",
                raw.key, envelope.schema_version, SCHEMA_VERSION
            ),
        });
    }
    Ok(Versioned { row: envelope.row, version: raw.version })
}

/// Writes collected for one all-or-nothing commit.
#[derive(Debug, Default)]
pub struct Batch {
    ops: Vec<WriteOp>,
}

impl Batch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put<T: Serialize>(&mut self, key: String, row: &T, expect: Expect) -> Result<&mut Self, ServiceError> {
        let value = encode(row)?;
        self.ops.push(WriteOp::Put { key, value, expect });
        Ok(self)
    }

    pub fn delete(&mut self, key: String, expect: Expect) -> &mut Self {
        self.ops.push(WriteOp::Delete { key, expect });
        self
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }
}

/// Handle the services use for every store round-trip. Each call is bounded
/// by `timeout` and surfaces `StorageTimeout` instead of hanging.
#[derive(Clone)]
pub struct Db {
    kv: Arc<dyn KvStore>,
    timeout: Duration,
}

impl Db {
    pub fn new(kv: Arc<dyn KvStore>, timeout: Duration) -> Self {
        Self { kv, timeout }
    }

    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStore::new()), Duration::from_secs(5))
    }

    async fn bounded<T, F>(&self, op: &str, fut: F) -> Result<T, ServiceError>
    where
        F: Future<Output = Result<T, StoreError>>,
    {
        match tokio::time::timeout(self.timeout, fut).await {
            Ok(res) => res.map_err(ServiceError::from),
            Err(_) => {
                log::warn!("store {} exceeded {:?}", op, self.timeout);
                Err(ServiceError::StorageTimeout)
            }
        }
    }

    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<Versioned<T>>, ServiceError> {
        debug!("store get {}", key);
        match self.bounded("get", self.kv.get(key)).await? {
            Some(raw) => Ok(Some(decode(raw)?)),
            None => Ok(None),
        }
    }

    pub async fn scan<T: DeserializeOwned>(&self, prefix: &str) -> Result<Vec<Versioned<T>>, ServiceError> {
        debug!("store scan {}*", prefix);
        self.bounded("scan", self.kv.scan_prefix(prefix))
            .await?
            .into_iter()
            .map(decode::<T>)
            .collect()
    }

    pub async fn commit(&self, batch: Batch) -> Result<(), ServiceError> {
        if batch.is_empty() {
            return Ok(());
        }
        debug!("store commit of {} writes", batch.len());
        self.bounded("commit", self.kv.commit(batch.ops)).await
    }
}
