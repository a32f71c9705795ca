use uuid::Uuid;

use super::{Batch, Db, Expect, Versioned};
use crate::{errors::ServiceError, models::Booking};

pub const PREFIX: &str = "booking_";

pub fn key(id: &Uuid) -> String {
    format!("{}{}", PREFIX, id)
}

pub async fn get(id: &Uuid, db: &Db) -> Result<Option<Versioned<Booking>>, ServiceError> {
    db.get(&key(id)).await
}

pub async fn require(id: &Uuid, db: &Db) -> Result<Versioned<Booking>, ServiceError> {
    get(id, db).await?.ok_or_else(|| ServiceError::not_found("booking", id))
}

pub async fn get_all(db: &Db) -> Result<Vec<Versioned<Booking>>, ServiceError> {
    db.scan(PREFIX).await
}

pub async fn get_by_event(event_id: &Uuid, db: &Db) -> Result<Vec<Versioned<Booking>>, ServiceError> {
    let mut bookings = get_all(db).await?;
    bookings.retain(|b| b.row.event_id == *event_id);
    Ok(bookings)
}

pub async fn get_by_user(user_id: &Uuid, db: &Db) -> Result<Vec<Versioned<Booking>>, ServiceError> {
    let mut bookings = get_all(db).await?;
    bookings.retain(|b| b.row.user_id.as_ref() == Some(user_id));
    Ok(bookings)
}

pub fn insert(booking: &Booking, batch: &mut Batch) -> Result<(), ServiceError> {
    batch.put(key(&booking.id), booking, Expect::Absent)?;
    Ok(())
}

pub fn update(booking: &Booking, read_at: Expect, batch: &mut Batch) -> Result<(), ServiceError> {
    batch.put(key(&booking.id), booking, read_at)?;
    Ok(())
}

pub fn delete(id: &Uuid, read_at: Expect, batch: &mut Batch) {
    batch.delete(key(id), read_at);
}
