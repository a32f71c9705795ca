use std::{fmt, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::ServiceError;

/// Money in euro cents.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Cents(pub i64);

impl Cents {
    /// Highest unit price an event may carry, one million euros.
    pub const MAX_PRICE: Cents = Cents(100_000_000);

    pub fn times(self, count: u32) -> Result<Cents, ServiceError> {
        self.0
            .checked_mul(i64::from(count))
            .map(Cents)
            .ok_or_else(|| ServiceError::invalid(format!("{} x {} does not fit a price", self, count)))
    }

    /// Pro-rata share of `self` for `new_count` out of `old_count` units.
    /// Multiplies before dividing so whole-cent unit prices stay exact.
    pub fn pro_rata(self, new_count: u32, old_count: u32) -> Result<Cents, ServiceError> {
        if old_count == 0 {
            return Ok(Cents(0));
        }
        let share = i128::from(self.0) * i128::from(new_count) / i128::from(old_count);
        i64::try_from(share)
            .map(Cents)
            .map_err(|_| ServiceError::invalid(format!("pro-rata share of {} does not fit a price", self)))
    }
}

/// Saturates at the `i64` bounds, totals are reporting figures only.
impl std::ops::Add for Cents {
    type Output = Cents;

    fn add(self, rhs: Cents) -> Cents {
        Cents(self.0.saturating_add(rhs.0))
    }
}

impl std::iter::Sum for Cents {
    fn sum<I: Iterator<Item = Cents>>(iter: I) -> Cents {
        iter.fold(Cents(0), |acc, c| acc + c)
    }
}

impl fmt::Display for Cents {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        write!(f, "{}€{}.{:02}", sign, self.0.abs() / 100, self.0.abs() % 100)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApprovalStatus {
    Pending,
    Approved,
    Rejected,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub start_date: DateTime<Utc>,
    pub end_date: Option<DateTime<Utc>>,
    pub presenter: String,
    pub total_places: u32,
    pub booked_places: u32,
    pub price: Cents,
    pub image: String,
    pub creator_id: Option<Uuid>,
    pub status: Option<ApprovalStatus>,
    pub rejection_reason: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Event {
    pub fn is_past(&self, now: DateTime<Utc>) -> bool {
        self.end_date.unwrap_or(self.start_date) < now
    }

    /// Events without an approval status predate the creator workflow
    /// and count as approved.
    pub fn is_bookable(&self) -> bool {
        matches!(self.status, None | Some(ApprovalStatus::Approved))
    }

    pub fn available_places(&self) -> u32 {
        self.total_places.saturating_sub(self.booked_places)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Booking {
    pub id: Uuid,
    pub event_id: Uuid,
    pub name: String,
    pub email: String,
    pub user_id: Option<Uuid>,
    pub ticket_count: u32,
    pub total_price: Cents,
    pub booking_date: DateTime<Utc>,
}

/// Ticket identity, derived only from its booking and seat number so
/// that issuing twice for one booking yields the same ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TicketId {
    pub booking_id: Uuid,
    pub seq: u32,
}

impl TicketId {
    pub fn new(booking_id: Uuid, seq: u32) -> Self {
        Self { booking_id, seq }
    }
}

impl fmt::Display for TicketId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-t{}", self.booking_id, self.seq)
    }
}

impl FromStr for TicketId {
    type Err = ServiceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let malformed = || ServiceError::invalid(format!("malformed ticket id '{}'", s));
        let (booking, seq) = s.trim().rsplit_once("-t").ok_or_else(malformed)?;
        let booking_id = Uuid::parse_str(booking).map_err(|_| malformed())?;
        let seq: u32 = seq.parse().map_err(|_| malformed())?;
        if seq == 0 {
            return Err(malformed());
        }
        Ok(TicketId { booking_id, seq })
    }
}

impl Serialize for TicketId {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for TicketId {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Ticket {
    pub id: TicketId,
    pub booking_id: Uuid,
    pub event_id: Uuid,
    pub seq: u32,
    pub total_tickets: u32,
    pub is_used: bool,
    pub created_at: DateTime<Utc>,
    pub used_at: Option<DateTime<Utc>>,
    pub validation_url: String,
}

impl Ticket {
    pub fn mint(
        booking_id: Uuid,
        event_id: Uuid,
        seq: u32,
        total_tickets: u32,
        base_url: &str,
        now: DateTime<Utc>,
    ) -> Self {
        let id = TicketId::new(booking_id, seq);
        Ticket {
            id,
            booking_id,
            event_id,
            seq,
            total_tickets,
            is_used: false,
            created_at: now,
            used_at: None,
            validation_url: validation_url(base_url, &id),
        }
    }
}

pub fn validation_url(base_url: &str, id: &TicketId) -> String {
    format!("{}/?ticket={}", base_url.trim_end_matches('/'), id)
}

/// Reporting copy of a redeemed ticket. The ticket row stays authoritative.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsedTicketRecord {
    pub ticket_id: TicketId,
    pub booking_id: Uuid,
    pub event_id: Uuid,
    pub seq: u32,
    pub total_tickets: u32,
    pub created_at: DateTime<Utc>,
    pub used_at: DateTime<Utc>,
}

impl UsedTicketRecord {
    pub fn from_ticket(ticket: &Ticket, used_at: DateTime<Utc>) -> Self {
        UsedTicketRecord {
            ticket_id: ticket.id,
            booking_id: ticket.booking_id,
            event_id: ticket.event_id,
            seq: ticket.seq,
            total_tickets: ticket.total_tickets,
            created_at: ticket.created_at,
            used_at,
        }
    }
}
