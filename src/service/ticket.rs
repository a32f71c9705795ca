//! Ticket lifecycle: issue, check, redeem, refund.
//!
//! A ticket is born unused, becomes used exactly once and is deleted when
//! refunded. Every transition is one conditional batch against the store,
//! so two racing transitions on the same ticket cannot both commit; the
//! loser gets `ServiceError::Conflict`.

use chrono::{DateTime, Utc};
use log::{info, warn};
use uuid::Uuid;

use crate::{
    config::AppConfig,
    db::{self, Batch, Db},
    dto::IssuedTicket,
    errors::ServiceError,
    models::{Ticket, TicketId, UsedTicketRecord},
};

use super::qr;

#[derive(Debug, Clone, PartialEq)]
pub enum TicketStatus {
    NotFound,
    Unused { ticket: Ticket },
    Used { ticket: Ticket, used_at: Option<DateTime<Utc>> },
}

#[derive(Debug, Clone, PartialEq)]
pub enum Redemption {
    Redeemed { ticket: Ticket },
    AlreadyUsed { ticket_id: TicketId, used_at: Option<DateTime<Utc>> },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefundSummary {
    pub requested: u32,
    pub refunded: u32,
    pub booking_deleted: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Refund {
    Refunded(RefundSummary),
    Ineligible { ticket_id: TicketId, used_at: Option<DateTime<Utc>> },
}

pub fn render(ticket: &Ticket, cfg: &AppConfig) -> Result<IssuedTicket, ServiceError> {
    Ok(IssuedTicket {
        ticket_id: ticket.id,
        ticket_number: ticket.seq,
        qr_code_data_url: qr::encode_data_url(&ticket.validation_url, &cfg.qr)?,
        validation_url: ticket.validation_url.clone(),
    })
}

/// Mints `count` tickets for a booking, or returns the ones it already has.
pub async fn issue_tickets(
    booking_id: &Uuid,
    count: u32,
    db: &Db,
    cfg: &AppConfig,
) -> Result<Vec<IssuedTicket>, ServiceError> {
    if count == 0 {
        return Err(ServiceError::invalid("ticketCount must be at least 1"));
    }
    let booking = db::booking::require(booking_id, db).await?.row;
    let existing = db::ticket::get_by_booking(booking_id, db).await?;

    let tickets: Vec<Ticket> = if !existing.is_empty() {
        existing.into_iter().map(|t| t.row).collect()
    } else {
        if count != booking.ticket_count {
            return Err(ServiceError::invalid(format!(
                "booking {} holds {} tickets, not {}",
                booking.id, booking.ticket_count, count
            )));
        }
        let now = Utc::now();
        let minted: Vec<Ticket> = (1..=count)
            .map(|seq| Ticket::mint(booking.id, booking.event_id, seq, count, &cfg.public_base_url, now))
            .collect();
        let mut batch = Batch::new();
        for ticket in &minted {
            db::ticket::insert(ticket, &mut batch)?;
        }
        match db.commit(batch).await {
            Ok(()) => {
                info!("issued {} tickets for booking {}", count, booking.id);
                minted
            }
            Err(ServiceError::Conflict { .. }) => {
                // another request minted them first
                db::ticket::get_by_booking(booking_id, db)
                    .await?
                    .into_iter()
                    .map(|t| t.row)
                    .collect()
            }
            Err(err) => return Err(err),
        }
    };

    tickets.iter().map(|t| render(t, cfg)).collect()
}

pub async fn check_status(id: &TicketId, db: &Db) -> Result<TicketStatus, ServiceError> {
    Ok(match db::ticket::get(id, db).await? {
        None => TicketStatus::NotFound,
        Some(t) if t.row.is_used => TicketStatus::Used { used_at: t.row.used_at, ticket: t.row },
        Some(t) => TicketStatus::Unused { ticket: t.row },
    })
}

pub async fn redeem(id: &TicketId, db: &Db) -> Result<Redemption, ServiceError> {
    let current = db::ticket::get(id, db)
        .await?
        .ok_or_else(|| ServiceError::not_found("ticket", id))?;
    if current.row.is_used {
        warn!("ticket {} scanned again, used at {:?}", id, current.row.used_at);
        return Ok(Redemption::AlreadyUsed { ticket_id: *id, used_at: current.row.used_at });
    }

    let now = Utc::now();
    let mut ticket = current.row.clone();
    ticket.is_used = true;
    ticket.used_at = Some(now);
    let record = UsedTicketRecord::from_ticket(&ticket, now);

    let mut batch = Batch::new();
    db::ticket::mark_used(&ticket, &record, current.expect(), &mut batch)?;
    if let Err(err) = db.commit(batch).await {
        warn!("redeeming ticket {} failed: {}", id, err);
        return Err(err);
    }
    info!("ticket {} redeemed", id);
    Ok(Redemption::Redeemed { ticket })
}

/// Refunds one unused ticket, or with `ticket_id = None` every unused
/// ticket of the booking. The bulk path always removes the booking; its
/// used tickets stay behind as standalone rows.
pub async fn refund(booking_id: &Uuid, ticket_id: Option<&TicketId>, db: &Db) -> Result<Refund, ServiceError> {
    match ticket_id {
        Some(id) => refund_one(booking_id, id, db).await,
        None => refund_all(booking_id, db).await,
    }
}

async fn release_seats(event_id: &Uuid, seats: u32, db: &Db, batch: &mut Batch) -> Result<(), ServiceError> {
    match db::event::get(event_id, db).await? {
        Some(current) => {
            let mut event = current.row.clone();
            event.booked_places = event.booked_places.saturating_sub(seats);
            db::event::update(&event, current.expect(), batch)
        }
        None => {
            warn!("event {} is gone, no seat counter to release {} seats from", event_id, seats);
            Ok(())
        }
    }
}

async fn refund_one(booking_id: &Uuid, id: &TicketId, db: &Db) -> Result<Refund, ServiceError> {
    if id.booking_id != *booking_id {
        return Err(ServiceError::invalid(format!("ticket {} does not belong to booking {}", id, booking_id)));
    }
    let booking = db::booking::require(booking_id, db).await?;
    let ticket = db::ticket::get(id, db)
        .await?
        .ok_or_else(|| ServiceError::not_found("ticket", id))?;
    if ticket.row.is_used {
        warn!("refund refused, ticket {} already used", id);
        return Ok(Refund::Ineligible { ticket_id: *id, used_at: ticket.row.used_at });
    }

    let mut batch = Batch::new();
    db::ticket::refund(id, ticket.expect(), &mut batch);

    let remaining = booking.row.ticket_count.saturating_sub(1);
    if remaining == 0 {
        db::booking::delete(booking_id, booking.expect(), &mut batch);
    } else {
        let mut updated = booking.row.clone();
        updated.total_price = booking.row.total_price.pro_rata(remaining, booking.row.ticket_count)?;
        updated.ticket_count = remaining;
        db::booking::update(&updated, booking.expect(), &mut batch)?;
    }
    release_seats(&booking.row.event_id, 1, db, &mut batch).await?;

    db.commit(batch).await?;
    info!("refunded ticket {} of booking {}, {} left", id, booking_id, remaining);
    Ok(Refund::Refunded(RefundSummary { requested: 1, refunded: 1, booking_deleted: remaining == 0 }))
}

async fn refund_all(booking_id: &Uuid, db: &Db) -> Result<Refund, ServiceError> {
    let booking = db::booking::require(booking_id, db).await?;
    let tickets = db::ticket::get_by_booking(booking_id, db).await?;
    let used = tickets.iter().filter(|t| t.row.is_used).count() as u32;

    let mut batch = Batch::new();
    for ticket in tickets.iter().filter(|t| !t.row.is_used) {
        db::ticket::refund(&ticket.row.id, ticket.expect(), &mut batch);
    }
    db::booking::delete(booking_id, booking.expect(), &mut batch);

    // seats of a booking whose tickets were never issued are released as well
    let refunded = booking.row.ticket_count.saturating_sub(used);
    release_seats(&booking.row.event_id, refunded, db, &mut batch).await?;

    db.commit(batch).await?;
    info!(
        "bulk refund of booking {}: {} of {} tickets refunded, {} used kept",
        booking_id, refunded, booking.row.ticket_count, used
    );
    Ok(Refund::Refunded(RefundSummary {
        requested: booking.row.ticket_count,
        refunded,
        booking_deleted: true,
    }))
}
