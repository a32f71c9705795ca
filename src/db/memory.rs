use std::collections::BTreeMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{Expect, KvStore, RawRow, StoreError, WriteOp};

/// Ordered in-process store. A commit holds the write lock for the whole
/// batch, so preconditions and writes are observed together.
#[derive(Default)]
pub struct MemoryStore {
    rows: RwLock<BTreeMap<String, (String, i64)>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn check(rows: &BTreeMap<String, (String, i64)>, key: &str, expect: Expect) -> Result<(), StoreError> {
    let current = rows.get(key).map(|(_, version)| *version);
    let holds = match expect {
        Expect::Any => true,
        Expect::Absent => current.is_none(),
        Expect::Version(v) => current == Some(v),
    };
    if holds {
        Ok(())
    } else {
        Err(StoreError::Conflict { key: key.to_string() })
    }
}

#[async_trait]
impl KvStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<RawRow>, StoreError> {
        let rows = self.rows.read().await;
        Ok(rows.get(key).map(|(value, version)| RawRow {
            key: key.to_string(),
            value: value.clone(),
            version: *version,
        }))
    }

    async fn scan_prefix(&self, prefix: &str) -> Result<Vec<RawRow>, StoreError> {
        let rows = self.rows.read().await;
        Ok(rows
            .range(prefix.to_string()..)
            .take_while(|(key, _)| key.starts_with(prefix))
            .map(|(key, (value, version))| RawRow {
                key: key.clone(),
                value: value.clone(),
                version: *version,
            })
            .collect())
    }

    async fn commit(&self, ops: Vec<WriteOp>) -> Result<(), StoreError> {
        let mut rows = self.rows.write().await;
        for op in &ops {
            match op {
                WriteOp::Put { key, expect, .. } | WriteOp::Delete { key, expect } => {
                    check(&rows, key, *expect)?
                }
            }
        }
        for op in ops {
            match op {
                WriteOp::Put { key, value, .. } => {
                    let version = rows.get(&key).map(|(_, v)| v + 1).unwrap_or(1);
                    rows.insert(key, (value, version));
                }
                WriteOp::Delete { key, .. } => {
                    rows.remove(&key);
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn put(key: &str, value: &str, expect: Expect) -> WriteOp {
        WriteOp::Put { key: key.into(), value: value.into(), expect }
    }

    #[actix_rt::test]
    async fn versions_advance_on_every_put() {
        let store = MemoryStore::new();
        store.commit(vec![put("a", "1", Expect::Absent)]).await.unwrap();
        store.commit(vec![put("a", "2", Expect::Version(1))]).await.unwrap();
        let row = store.get("a").await.unwrap().unwrap();
        assert_eq!((row.value.as_str(), row.version), ("2", 2));
    }

    #[actix_rt::test]
    async fn failed_precondition_leaves_the_batch_unapplied() {
        let store = MemoryStore::new();
        store.commit(vec![put("a", "1", Expect::Absent)]).await.unwrap();

        let err = store
            .commit(vec![put("b", "1", Expect::Absent), put("a", "x", Expect::Version(7))])
            .await
            .unwrap_err();
        assert_eq!(err, StoreError::Conflict { key: "a".into() });
        assert!(store.get("b").await.unwrap().is_none());
        assert_eq!(store.get("a").await.unwrap().unwrap().value, "1");
    }

    #[actix_rt::test]
    async fn scan_only_returns_the_prefix() {
        let store = MemoryStore::new();
        store
            .commit(vec![
                put("ticket_1", "x", Expect::Any),
                put("ticket_2", "y", Expect::Any),
                put("used_ticket_1", "z", Expect::Any),
                put("tickets", "w", Expect::Any),
            ])
            .await
            .unwrap();
        let keys: Vec<String> = store
            .scan_prefix("ticket_")
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.key)
            .collect();
        assert_eq!(keys, vec!["ticket_1", "ticket_2"]);
    }

    #[actix_rt::test]
    async fn delete_with_stale_version_conflicts() {
        let store = MemoryStore::new();
        store.commit(vec![put("a", "1", Expect::Absent)]).await.unwrap();
        store.commit(vec![put("a", "2", Expect::Any)]).await.unwrap();
        let err = store
            .commit(vec![WriteOp::Delete { key: "a".into(), expect: Expect::Version(1) }])
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Conflict { .. }));
    }
}
