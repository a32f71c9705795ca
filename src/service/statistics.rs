//! Read-side rollups over events, bookings and the used-ticket log.
//! Always recomputed from the rows; nothing here is cached or written.

use std::collections::{BTreeMap, HashMap};

use serde::Serialize;
use uuid::Uuid;

use crate::{
    db::{self, Db},
    errors::ServiceError,
    models::{ApprovalStatus, Booking, Cents, Event, UsedTicketRecord},
};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventStats {
    pub event_id: Uuid,
    pub title: Option<String>,
    pub tickets_sold: u64,
    pub tickets_used: u64,
    pub revenue: Cents,
    pub booking_count: u64,
}

impl EventStats {
    fn empty(event_id: Uuid, title: Option<String>) -> Self {
        Self { event_id, title, tickets_sold: 0, tickets_used: 0, revenue: Cents(0), booking_count: 0 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GlobalStats {
    pub total_events: u64,
    pub total_bookings: u64,
    pub total_tickets_sold: u64,
    pub total_tickets_used: u64,
    pub total_revenue: Cents,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Statistics {
    pub event_stats: BTreeMap<Uuid, EventStats>,
    pub global: GlobalStats,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatorStatistics {
    pub total_events: u64,
    pub pending_events: u64,
    pub approved_events: u64,
    pub rejected_events: u64,
    pub total_revenue: Cents,
    pub event_stats: BTreeMap<Uuid, EventStats>,
}

/// Bookings whose event is unknown still get a row so that the per-event
/// sums always equal the global ones.
pub fn compute(events: &[Event], bookings: &[Booking], used: &[UsedTicketRecord]) -> Statistics {
    let mut per_event: BTreeMap<Uuid, EventStats> = events
        .iter()
        .map(|e| (e.id, EventStats::empty(e.id, Some(e.title.clone()))))
        .collect();

    let mut event_of_booking: HashMap<Uuid, Uuid> = HashMap::with_capacity(bookings.len());
    for b in bookings {
        event_of_booking.insert(b.id, b.event_id);
        let stats = per_event
            .entry(b.event_id)
            .or_insert_with(|| EventStats::empty(b.event_id, None));
        stats.tickets_sold += u64::from(b.ticket_count);
        stats.revenue = stats.revenue + b.total_price;
        stats.booking_count += 1;
    }

    for record in used {
        // tickets left behind by a bulk refund keep their own event id
        let event_id = event_of_booking
            .get(&record.booking_id)
            .copied()
            .unwrap_or(record.event_id);
        per_event
            .entry(event_id)
            .or_insert_with(|| EventStats::empty(event_id, None))
            .tickets_used += 1;
    }

    let global = GlobalStats {
        total_events: events.len() as u64,
        total_bookings: bookings.len() as u64,
        total_tickets_sold: bookings.iter().map(|b| u64::from(b.ticket_count)).sum(),
        total_tickets_used: used.len() as u64,
        total_revenue: bookings.iter().map(|b| b.total_price).sum(),
    };
    Statistics { event_stats: per_event, global }
}

pub fn compute_for_creator(
    creator_id: &Uuid,
    events: &[Event],
    bookings: &[Booking],
    used: &[UsedTicketRecord],
) -> CreatorStatistics {
    let own: Vec<Event> = events
        .iter()
        .filter(|e| e.creator_id.as_ref() == Some(creator_id))
        .cloned()
        .collect();
    let own_bookings: Vec<Booking> = bookings
        .iter()
        .filter(|b| own.iter().any(|e| e.id == b.event_id))
        .cloned()
        .collect();
    let own_used: Vec<UsedTicketRecord> = used
        .iter()
        .filter(|r| own.iter().any(|e| e.id == r.event_id))
        .cloned()
        .collect();
    let stats = compute(&own, &own_bookings, &own_used);
    let count = |status: ApprovalStatus| own.iter().filter(|e| e.status == Some(status)).count() as u64;

    CreatorStatistics {
        total_events: own.len() as u64,
        pending_events: count(ApprovalStatus::Pending),
        approved_events: count(ApprovalStatus::Approved),
        rejected_events: count(ApprovalStatus::Rejected),
        total_revenue: stats.global.total_revenue,
        event_stats: stats.event_stats,
    }
}

async fn load(db: &Db) -> Result<(Vec<Event>, Vec<Booking>, Vec<UsedTicketRecord>), ServiceError> {
    let events = db::event::get_all(db).await?.into_iter().map(|e| e.row).collect();
    let bookings = db::booking::get_all(db).await?.into_iter().map(|b| b.row).collect();
    let used = db::ticket::get_used(db).await?;
    Ok((events, bookings, used))
}

pub async fn get(db: &Db) -> Result<Statistics, ServiceError> {
    let (events, bookings, used) = load(db).await?;
    Ok(compute(&events, &bookings, &used))
}

pub async fn get_for_creator(creator_id: &Uuid, db: &Db) -> Result<CreatorStatistics, ServiceError> {
    let (events, bookings, used) = load(db).await?;
    Ok(compute_for_creator(creator_id, &events, &bookings, &used))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TicketId;
    use chrono::Utc;

    fn event(creator: Option<Uuid>, status: ApprovalStatus) -> Event {
        Event {
            id: Uuid::new_v4(),
            title: "Event".into(),
            description: String::new(),
            start_date: Utc::now(),
            end_date: None,
            presenter: String::new(),
            total_places: 100,
            booked_places: 0,
            price: Cents(1000),
            image: String::new(),
            creator_id: creator,
            status: Some(status),
            rejection_reason: None,
            created_at: Utc::now(),
        }
    }

    fn booking(event_id: Uuid, count: u32, total: i64) -> Booking {
        Booking {
            id: Uuid::new_v4(),
            event_id,
            name: "Ada".into(),
            email: "ada@example.org".into(),
            user_id: None,
            ticket_count: count,
            total_price: Cents(total),
            booking_date: Utc::now(),
        }
    }

    fn used(booking_id: Uuid, event_id: Uuid, seq: u32) -> UsedTicketRecord {
        UsedTicketRecord {
            ticket_id: TicketId::new(booking_id, seq),
            booking_id,
            event_id,
            seq,
            total_tickets: seq,
            created_at: Utc::now(),
            used_at: Utc::now(),
        }
    }

    #[test]
    fn per_event_sums_match_global_totals() {
        let a = event(None, ApprovalStatus::Approved);
        let b = event(None, ApprovalStatus::Approved);
        let orphan_event = Uuid::new_v4();
        let bookings = vec![
            booking(a.id, 2, 2000),
            booking(a.id, 1, 1000),
            booking(b.id, 4, 3800),
            booking(orphan_event, 1, 500),
        ];
        let log = vec![used(bookings[0].id, a.id, 1), used(bookings[2].id, b.id, 2)];
        let stats = compute(&[a.clone(), b.clone()], &bookings, &log);

        let sold: u64 = stats.event_stats.values().map(|s| s.tickets_sold).sum();
        let revenue: Cents = stats.event_stats.values().map(|s| s.revenue).sum();
        assert_eq!(sold, bookings.iter().map(|b| u64::from(b.ticket_count)).sum::<u64>());
        assert_eq!(revenue, bookings.iter().map(|b| b.total_price).sum::<Cents>());
        assert_eq!(stats.global.total_tickets_sold, 8);
        assert_eq!(stats.global.total_revenue, Cents(7300));

        let sa = &stats.event_stats[&a.id];
        assert_eq!((sa.tickets_sold, sa.tickets_used, sa.booking_count), (3, 1, 2));
        assert_eq!(stats.event_stats[&b.id].tickets_used, 1);
        assert_eq!(stats.event_stats[&orphan_event].title, None);
    }

    #[test]
    fn used_tickets_of_removed_bookings_count_for_their_event() {
        let a = event(None, ApprovalStatus::Approved);
        let log = vec![used(Uuid::new_v4(), a.id, 1)];
        let stats = compute(&[a.clone()], &[], &log);
        assert_eq!(stats.event_stats[&a.id].tickets_used, 1);
        assert_eq!(stats.global.total_tickets_used, 1);
    }

    #[test]
    fn computing_leaves_inputs_untouched() {
        let a = event(None, ApprovalStatus::Approved);
        let events = vec![a.clone()];
        let bookings = vec![booking(a.id, 3, 3000)];
        let log = vec![used(bookings[0].id, a.id, 1)];
        let (e0, b0, l0) = (events.clone(), bookings.clone(), log.clone());

        let first = compute(&events, &bookings, &log);
        let second = compute(&events, &bookings, &log);
        assert_eq!(first, second);
        assert_eq!((events, bookings, log), (e0, b0, l0));
    }

    #[test]
    fn creator_statistics_only_cover_own_events() {
        let creator = Uuid::new_v4();
        let mine = event(Some(creator), ApprovalStatus::Approved);
        let pending = event(Some(creator), ApprovalStatus::Pending);
        let theirs = event(Some(Uuid::new_v4()), ApprovalStatus::Approved);
        let bookings = vec![booking(mine.id, 2, 2000), booking(theirs.id, 5, 5000)];
        let log = vec![used(bookings[0].id, mine.id, 1), used(bookings[1].id, theirs.id, 1)];

        let stats = compute_for_creator(&creator, &[mine.clone(), pending, theirs], &bookings, &log);
        assert_eq!(stats.total_events, 2);
        assert_eq!((stats.pending_events, stats.approved_events, stats.rejected_events), (1, 1, 0));
        assert_eq!(stats.total_revenue, Cents(2000));
        assert_eq!(stats.event_stats[&mine.id].tickets_used, 1);
        assert_eq!(stats.event_stats.len(), 2);
    }
}
