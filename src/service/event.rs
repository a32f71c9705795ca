use chrono::Utc;
use log::info;
use uuid::Uuid;

use crate::{
    db::{self, Batch, Db},
    dto::{NewEventDto, UpdateEventDto},
    errors::ServiceError,
    models::{ApprovalStatus, Cents, Event},
};

fn build(dto: NewEventDto, creator_id: Option<Uuid>, status: ApprovalStatus) -> Event {
    Event {
        id: Uuid::new_v4(),
        title: dto.title,
        description: dto.description,
        start_date: dto.start_date,
        end_date: dto.end_date,
        presenter: dto.presenter,
        total_places: dto.total_places,
        booked_places: 0,
        price: dto.price,
        image: dto.image,
        creator_id,
        status: Some(status),
        rejection_reason: None,
        created_at: Utc::now(),
    }
}

async fn insert(event: Event, db: &Db) -> Result<Event, ServiceError> {
    let mut batch = Batch::new();
    db::event::insert(&event, &mut batch)?;
    db.commit(batch).await?;
    info!("event {} '{}' created ({:?})", event.id, event.title, event.status);
    Ok(event)
}

/// Admin-created events skip the approval queue.
pub async fn create(dto: NewEventDto, db: &Db) -> Result<Event, ServiceError> {
    dto.validate()?;
    insert(build(dto, None, ApprovalStatus::Approved), db).await
}

pub async fn create_for_creator(dto: NewEventDto, creator_id: Uuid, db: &Db) -> Result<Event, ServiceError> {
    dto.validate()?;
    insert(build(dto, Some(creator_id), ApprovalStatus::Pending), db).await
}

pub async fn get_all(db: &Db) -> Result<Vec<Event>, ServiceError> {
    let mut events: Vec<Event> = db::event::get_all(db).await?.into_iter().map(|e| e.row).collect();
    events.sort_by_key(|e| e.start_date);
    Ok(events)
}

pub async fn get_by_id(id: &Uuid, db: &Db) -> Result<Event, ServiceError> {
    Ok(db::event::require(id, db).await?.row)
}

pub async fn get_by_creator(creator_id: &Uuid, db: &Db) -> Result<Vec<Event>, ServiceError> {
    let mut events = get_all(db).await?;
    events.retain(|e| e.creator_id.as_ref() == Some(creator_id));
    Ok(events)
}

pub async fn get_pending(db: &Db) -> Result<Vec<Event>, ServiceError> {
    let mut events = get_all(db).await?;
    events.retain(|e| e.status == Some(ApprovalStatus::Pending));
    Ok(events)
}

pub async fn update(id: &Uuid, fields: UpdateEventDto, db: &Db) -> Result<Event, ServiceError> {
    let current = db::event::require(id, db).await?;
    let mut event = current.row.clone();
    if !fields.apply_to(&mut event)? {
        return Ok(event);
    }
    let mut batch = Batch::new();
    db::event::update(&event, current.expect(), &mut batch)?;
    db.commit(batch).await?;
    info!("event {} updated", id);
    Ok(event)
}

async fn set_status(
    id: &Uuid,
    status: ApprovalStatus,
    reason: Option<String>,
    db: &Db,
) -> Result<Event, ServiceError> {
    let current = db::event::require(id, db).await?;
    let mut event = current.row.clone();
    event.status = Some(status);
    event.rejection_reason = reason;
    let mut batch = Batch::new();
    db::event::update(&event, current.expect(), &mut batch)?;
    db.commit(batch).await?;
    info!("event {} is now {:?}", id, status);
    Ok(event)
}

pub async fn approve(id: &Uuid, db: &Db) -> Result<Event, ServiceError> {
    set_status(id, ApprovalStatus::Approved, None, db).await
}

pub async fn reject(id: &Uuid, reason: String, db: &Db) -> Result<Event, ServiceError> {
    if reason.trim().is_empty() {
        return Err(ServiceError::invalid("a rejection reason is required"));
    }
    set_status(id, ApprovalStatus::Rejected, Some(reason), db).await
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeletedEvent {
    pub bookings: usize,
    pub tickets: usize,
}

/// Deletes the event with its bookings and every ticket row of the event in
/// one batch. The used-ticket log is left alone.
pub async fn delete(id: &Uuid, db: &Db) -> Result<DeletedEvent, ServiceError> {
    let current = db::event::require(id, db).await?;
    let bookings = db::booking::get_by_event(id, db).await?;
    let tickets = db::ticket::get_by_event(id, db).await?;

    let mut batch = Batch::new();
    for ticket in &tickets {
        db::ticket::delete(&ticket.row.id, ticket.expect(), &mut batch);
    }
    for booking in &bookings {
        db::booking::delete(&booking.row.id, booking.expect(), &mut batch);
    }
    db::event::delete(id, current.expect(), &mut batch);
    db.commit(batch).await?;

    info!("event {} deleted with {} bookings and {} tickets", id, bookings.len(), tickets.len());
    Ok(DeletedEvent { bookings: bookings.len(), tickets: tickets.len() })
}

pub fn price_for(event: &Event, count: u32) -> Result<Cents, ServiceError> {
    event.price.times(count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::AppConfig,
        dto::NewBookingDto,
        models::TicketId,
        service::{booking, ticket},
    };

    fn dto(title: &str) -> NewEventDto {
        NewEventDto {
            title: title.into(),
            description: "An evening of talks".into(),
            start_date: Utc::now() + chrono::Duration::days(1),
            end_date: None,
            presenter: "Ferris".into(),
            total_places: 5,
            price: Cents(1500),
            image: String::new(),
        }
    }

    #[actix_rt::test]
    async fn admin_events_are_approved_creator_events_pending() {
        let db = Db::in_memory();
        let creator = Uuid::new_v4();
        let admin = create(dto("Admin talk"), &db).await.unwrap();
        let mine = create_for_creator(dto("Creator talk"), creator, &db).await.unwrap();

        assert_eq!(admin.status, Some(ApprovalStatus::Approved));
        assert_eq!(mine.status, Some(ApprovalStatus::Pending));
        assert_eq!(get_pending(&db).await.unwrap(), vec![mine.clone()]);
        assert_eq!(get_by_creator(&creator, &db).await.unwrap(), vec![mine]);
    }

    #[actix_rt::test]
    async fn approval_and_rejection_update_status() {
        let db = Db::in_memory();
        let creator = Uuid::new_v4();
        let a = create_for_creator(dto("A"), creator, &db).await.unwrap();
        let b = create_for_creator(dto("B"), creator, &db).await.unwrap();

        assert_eq!(approve(&a.id, &db).await.unwrap().status, Some(ApprovalStatus::Approved));
        let rejected = reject(&b.id, "duplicate listing".into(), &db).await.unwrap();
        assert_eq!(rejected.status, Some(ApprovalStatus::Rejected));
        assert_eq!(rejected.rejection_reason.as_deref(), Some("duplicate listing"));
        assert!(get_pending(&db).await.unwrap().is_empty());
        assert!(reject(&a.id, " ".into(), &db).await.is_err());
    }

    #[actix_rt::test]
    async fn invalid_events_are_refused() {
        let db = Db::in_memory();
        let mut bad = dto("");
        assert!(create(bad.clone(), &db).await.is_err());
        bad.title = "Ok".into();
        bad.total_places = 0;
        assert!(create(bad, &db).await.is_err());
    }

    #[actix_rt::test]
    async fn prices_above_the_cap_are_refused() {
        let db = Db::in_memory();
        let mut huge = dto("Gala");
        huge.price = Cents(5_000_000_000_000_000_000);
        assert!(matches!(create(huge, &db).await, Err(ServiceError::InvalidArgument { .. })));

        let ev = create(dto("Gala"), &db).await.unwrap();
        let fields = UpdateEventDto { price: Some(Cents(Cents::MAX_PRICE.0 + 1)), ..Default::default() };
        assert!(matches!(update(&ev.id, fields, &db).await, Err(ServiceError::InvalidArgument { .. })));

        let mut top = dto("Gala");
        top.price = Cents::MAX_PRICE;
        let ev = create(top, &db).await.unwrap();
        let booked = booking::create(
            NewBookingDto {
                event_id: ev.id,
                name: "Ada".into(),
                email: "ada@example.org".into(),
                user_id: None,
                ticket_count: 5,
            },
            &db,
            &AppConfig::default(),
        )
        .await
        .unwrap();
        assert_eq!(booked.booking.total_price, Cents(500_000_000));
    }

    #[actix_rt::test]
    async fn delete_cascades_to_bookings_and_tickets() {
        let db = Db::in_memory();
        let cfg = AppConfig::default();
        let ev = create(dto("Doomed"), &db).await.unwrap();
        for n in [1, 2] {
            booking::create(
                NewBookingDto {
                    event_id: ev.id,
                    name: "Ada".into(),
                    email: "ada@example.org".into(),
                    user_id: None,
                    ticket_count: n,
                },
                &db,
                &cfg,
            )
            .await
            .unwrap();
        }

        assert_eq!(delete(&ev.id, &db).await.unwrap(), DeletedEvent { bookings: 2, tickets: 3 });
        assert!(db::event::get(&ev.id, &db).await.unwrap().is_none());
        assert!(db::booking::get_all(&db).await.unwrap().is_empty());
        assert!(db.scan::<serde_json::Value>(db::ticket::PREFIX).await.unwrap().is_empty());
    }

    #[actix_rt::test]
    async fn delete_keeps_the_used_ticket_log_and_sweeps_orphaned_tickets() {
        let db = Db::in_memory();
        let cfg = AppConfig::default();
        let ev = create(dto("Sold out"), &db).await.unwrap();
        let other = create(dto("Next week"), &db).await.unwrap();
        let book = |event_id: Uuid, n: u32| NewBookingDto {
            event_id,
            name: "Ada".into(),
            email: "ada@example.org".into(),
            user_id: None,
            ticket_count: n,
        };
        let kept = booking::create(book(ev.id, 1), &db, &cfg).await.unwrap().booking;
        let refunded = booking::create(book(ev.id, 2), &db, &cfg).await.unwrap().booking;
        let elsewhere = booking::create(book(other.id, 1), &db, &cfg).await.unwrap().booking;

        ticket::redeem(&TicketId::new(kept.id, 1), &db).await.unwrap();
        let orphan = TicketId::new(refunded.id, 1);
        ticket::redeem(&orphan, &db).await.unwrap();
        ticket::refund(&refunded.id, None, &db).await.unwrap();
        assert!(db::ticket::get(&orphan, &db).await.unwrap().is_some());

        assert_eq!(delete(&ev.id, &db).await.unwrap(), DeletedEvent { bookings: 1, tickets: 2 });
        assert!(db::ticket::get(&orphan, &db).await.unwrap().is_none());
        assert_eq!(db::ticket::get_used(&db).await.unwrap().len(), 2);
        assert_eq!(db::ticket::get_by_booking(&elsewhere.id, &db).await.unwrap().len(), 1);
    }

    #[actix_rt::test]
    async fn update_applies_partial_fields() {
        let db = Db::in_memory();
        let ev = create(dto("Before"), &db).await.unwrap();
        let fields = UpdateEventDto { title: Some("After".into()), ..Default::default() };
        let updated = update(&ev.id, fields, &db).await.unwrap();
        assert_eq!(updated.title, "After");
        assert_eq!(get_by_id(&ev.id, &db).await.unwrap().title, "After");
    }
}
