use uuid::Uuid;

use super::{Batch, Db, Expect, Versioned};
use crate::{
    errors::ServiceError,
    models::{Ticket, TicketId, UsedTicketRecord},
};

pub const PREFIX: &str = "ticket_";
pub const USED_PREFIX: &str = "used_ticket_";

pub fn key(id: &TicketId) -> String {
    format!("{}{}", PREFIX, id)
}

pub fn used_key(id: &TicketId) -> String {
    format!("{}{}", USED_PREFIX, id)
}

/// Ticket ids start with their booking id, so a booking's tickets share
/// one key prefix.
fn booking_prefix(booking_id: &Uuid) -> String {
    format!("{}{}-t", PREFIX, booking_id)
}

pub async fn get(id: &TicketId, db: &Db) -> Result<Option<Versioned<Ticket>>, ServiceError> {
    db.get(&key(id)).await
}

pub async fn get_by_booking(booking_id: &Uuid, db: &Db) -> Result<Vec<Versioned<Ticket>>, ServiceError> {
    let mut tickets: Vec<Versioned<Ticket>> = db.scan(&booking_prefix(booking_id)).await?;
    tickets.sort_by_key(|t| t.row.seq);
    Ok(tickets)
}

/// Every ticket row of an event, including the used ones a bulk refund
/// left without a booking.
pub async fn get_by_event(event_id: &Uuid, db: &Db) -> Result<Vec<Versioned<Ticket>>, ServiceError> {
    let mut tickets: Vec<Versioned<Ticket>> = db.scan(PREFIX).await?;
    tickets.retain(|t| t.row.event_id == *event_id);
    Ok(tickets)
}

pub async fn get_used(db: &Db) -> Result<Vec<UsedTicketRecord>, ServiceError> {
    let records: Vec<Versioned<UsedTicketRecord>> = db.scan(USED_PREFIX).await?;
    Ok(records.into_iter().map(|r| r.row).collect())
}

pub fn insert(ticket: &Ticket, batch: &mut Batch) -> Result<(), ServiceError> {
    batch.put(key(&ticket.id), ticket, Expect::Absent)?;
    Ok(())
}

/// Marks a ticket used and logs it, both conditional on the state the
/// ticket was read in.
pub fn mark_used(
    ticket: &Ticket,
    record: &UsedTicketRecord,
    read_at: Expect,
    batch: &mut Batch,
) -> Result<(), ServiceError> {
    batch.put(key(&ticket.id), ticket, read_at)?;
    batch.put(used_key(&ticket.id), record, Expect::Absent)?;
    Ok(())
}

pub fn delete(id: &TicketId, read_at: Expect, batch: &mut Batch) {
    batch.delete(key(id), read_at);
}

/// Refund removal: drops the ticket along with any stray used-ticket record.
pub fn refund(id: &TicketId, read_at: Expect, batch: &mut Batch) {
    delete(id, read_at, batch);
    batch.delete(used_key(id), Expect::Any);
}
