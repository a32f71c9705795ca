use std::collections::HashMap;

use chrono::Utc;
use log::{info, warn};
use uuid::Uuid;

use crate::{
    config::AppConfig,
    db::{self, Batch, Db},
    dto::{BookingCreated, NewBookingDto, UserTicket},
    errors::ServiceError,
    models::{Booking, Ticket},
};

use super::{event::price_for, qr, ticket};

/// Creates the booking, its tickets and the seat reservation in one batch.
pub async fn create(dto: NewBookingDto, db: &Db, cfg: &AppConfig) -> Result<BookingCreated, ServiceError> {
    dto.validate()?;
    let current = db::event::require(&dto.event_id, db).await?;
    let mut event = current.row.clone();
    if !event.is_bookable() {
        return Err(ServiceError::invalid(format!("event {} is not open for booking", event.id)));
    }
    if dto.ticket_count > event.available_places() {
        warn!(
            "booking of {} refused, event {} has {} places left",
            dto.ticket_count,
            event.id,
            event.available_places()
        );
        return Err(ServiceError::invalid(format!(
            "only {} places left for this event",
            event.available_places()
        )));
    }

    let now = Utc::now();
    let booking = Booking {
        id: Uuid::new_v4(),
        event_id: event.id,
        name: dto.name.trim().to_string(),
        email: dto.email.trim().to_string(),
        user_id: dto.user_id,
        ticket_count: dto.ticket_count,
        total_price: price_for(&event, dto.ticket_count)?,
        booking_date: now,
    };
    let tickets: Vec<Ticket> = (1..=booking.ticket_count)
        .map(|seq| Ticket::mint(booking.id, event.id, seq, booking.ticket_count, &cfg.public_base_url, now))
        .collect();
    event.booked_places += booking.ticket_count;

    let mut batch = Batch::new();
    db::booking::insert(&booking, &mut batch)?;
    for t in &tickets {
        db::ticket::insert(t, &mut batch)?;
    }
    db::event::update(&event, current.expect(), &mut batch)?;
    db.commit(batch).await?;

    info!(
        "booking {} for event {}: {} tickets, {}",
        booking.id, event.id, booking.ticket_count, booking.total_price
    );
    let tickets = tickets
        .iter()
        .map(|t| ticket::render(t, cfg))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(BookingCreated { booking, tickets })
}

pub async fn get_all(db: &Db) -> Result<Vec<Booking>, ServiceError> {
    let mut bookings: Vec<Booking> = db::booking::get_all(db).await?.into_iter().map(|b| b.row).collect();
    bookings.sort_by_key(|b| b.booking_date);
    Ok(bookings)
}

pub async fn get_by_user(user_id: &Uuid, db: &Db) -> Result<Vec<Booking>, ServiceError> {
    let mut bookings: Vec<Booking> = db::booking::get_by_user(user_id, db)
        .await?
        .into_iter()
        .map(|b| b.row)
        .collect();
    bookings.sort_by_key(|b| b.booking_date);
    Ok(bookings)
}

/// Canonical tickets of a user's bookings. Used tickets are left out
/// unless `include_used` is set.
pub async fn user_tickets(
    user_id: &Uuid,
    include_used: bool,
    db: &Db,
    cfg: &AppConfig,
) -> Result<Vec<UserTicket>, ServiceError> {
    let mut titles: HashMap<Uuid, Option<String>> = HashMap::new();
    let mut out = Vec::new();
    for booking in get_by_user(user_id, db).await? {
        if !titles.contains_key(&booking.event_id) {
            let title = db::event::get(&booking.event_id, db).await?.map(|e| e.row.title);
            titles.insert(booking.event_id, title);
        }
        for t in db::ticket::get_by_booking(&booking.id, db).await? {
            let t = t.row;
            if t.is_used && !include_used {
                continue;
            }
            out.push(UserTicket {
                ticket_id: t.id,
                ticket_number: t.seq,
                total_tickets: t.total_tickets,
                booking_id: t.booking_id,
                event_id: t.event_id,
                event_title: titles.get(&t.event_id).cloned().flatten(),
                is_used: t.is_used,
                used_at: t.used_at,
                qr_code_data_url: qr::encode_data_url(&t.validation_url, &cfg.qr)?,
                validation_url: t.validation_url,
            });
        }
    }
    Ok(out)
}
