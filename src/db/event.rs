use uuid::Uuid;

use super::{Batch, Db, Expect, Versioned};
use crate::{errors::ServiceError, models::Event};

pub const PREFIX: &str = "event_";

pub fn key(id: &Uuid) -> String {
    format!("{}{}", PREFIX, id)
}

pub async fn get(id: &Uuid, db: &Db) -> Result<Option<Versioned<Event>>, ServiceError> {
    db.get(&key(id)).await
}

pub async fn require(id: &Uuid, db: &Db) -> Result<Versioned<Event>, ServiceError> {
    get(id, db).await?.ok_or_else(|| ServiceError::not_found("event", id))
}

pub async fn get_all(db: &Db) -> Result<Vec<Versioned<Event>>, ServiceError> {
    db.scan(PREFIX).await
}

pub fn insert(event: &Event, batch: &mut Batch) -> Result<(), ServiceError> {
    batch.put(key(&event.id), event, Expect::Absent)?;
    Ok(())
}

pub fn update(event: &Event, read_at: Expect, batch: &mut Batch) -> Result<(), ServiceError> {
    batch.put(key(&event.id), event, read_at)?;
    Ok(())
}

pub fn delete(id: &Uuid, read_at: Expect, batch: &mut Batch) {
    batch.delete(key(id), read_at);
}
