use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    errors::ServiceError,
    models::{Booking, Cents, Event, Ticket, TicketId},
};

fn check_price(price: Cents) -> Result<(), ServiceError> {
    if price.0 < 0 {
        return Err(ServiceError::invalid("price cannot be negative"));
    }
    if price > Cents::MAX_PRICE {
        return Err(ServiceError::invalid(format!("price cannot exceed {}", Cents::MAX_PRICE)));
    }
    Ok(())
}

#[derive(Debug, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct NewEventDto {
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub start_date: DateTime<Utc>,
    pub end_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub presenter: String,
    pub total_places: u32,
    pub price: Cents,
    #[serde(default)]
    pub image: String,
}

impl NewEventDto {
    pub fn validate(&self) -> Result<(), ServiceError> {
        if self.title.trim().is_empty() {
            return Err(ServiceError::invalid("title is required"));
        }
        if self.total_places == 0 {
            return Err(ServiceError::invalid("totalPlaces must be at least 1"));
        }
        check_price(self.price)?;
        if matches!(self.end_date, Some(end) if end < self.start_date) {
            return Err(ServiceError::invalid("endDate is before startDate"));
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct NewCreatorEventDto {
    #[serde(flatten)]
    pub event: NewEventDto,
    pub creator_id: Uuid,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateEventDto {
    pub title: Option<String>,
    pub description: Option<String>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub presenter: Option<String>,
    pub total_places: Option<u32>,
    pub price: Option<Cents>,
    pub image: Option<String>,
}

impl UpdateEventDto {
    /// Applies the present fields. Returns whether anything changed.
    pub fn apply_to(self, event: &mut Event) -> Result<bool, ServiceError> {
        let before = event.clone();
        if let Some(v) = self.title {
            if v.trim().is_empty() {
                return Err(ServiceError::invalid("title is required"));
            }
            event.title = v;
        }
        if let Some(v) = self.description {
            event.description = v;
        }
        if let Some(v) = self.start_date {
            event.start_date = v;
        }
        if let Some(v) = self.end_date {
            event.end_date = Some(v);
        }
        if let Some(v) = self.presenter {
            event.presenter = v;
        }
        if let Some(v) = self.total_places {
            if v < event.booked_places {
                return Err(ServiceError::invalid(format!(
                    "totalPlaces {} is below the {} places already booked",
                    v, event.booked_places
                )));
            }
            event.total_places = v;
        }
        if let Some(v) = self.price {
            check_price(v)?;
            event.price = v;
        }
        if let Some(v) = self.image {
            event.image = v;
        }
        if matches!(event.end_date, Some(end) if end < event.start_date) {
            return Err(ServiceError::invalid("endDate is before startDate"));
        }
        Ok(*event != before)
    }
}

#[derive(Debug, Deserialize)]
pub struct RejectEventDto {
    pub reason: String,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct NewBookingDto {
    pub event_id: Uuid,
    pub name: String,
    pub email: String,
    pub user_id: Option<Uuid>,
    pub ticket_count: u32,
}

impl NewBookingDto {
    pub fn validate(&self) -> Result<(), ServiceError> {
        if self.name.trim().is_empty() {
            return Err(ServiceError::invalid("name is required"));
        }
        if !self.email.contains('@') {
            return Err(ServiceError::invalid("a valid email is required"));
        }
        if self.ticket_count == 0 {
            return Err(ServiceError::invalid("ticketCount must be at least 1"));
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IssueTicketsRequest {
    pub booking_id: Option<String>,
    pub ticket_count: u32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UseTicketRequest {
    pub ticket_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefundRequest {
    pub booking_id: String,
    pub ticket_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserTicketsQuery {
    #[serde(default)]
    pub include_used: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventView {
    #[serde(flatten)]
    pub event: Event,
    pub is_past: bool,
}

impl EventView {
    pub fn new(event: Event, now: DateTime<Utc>) -> Self {
        let is_past = event.is_past(now);
        Self { event, is_past }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IssuedTicket {
    pub ticket_id: TicketId,
    pub ticket_number: u32,
    pub qr_code_data_url: String,
    pub validation_url: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingCreated {
    pub booking: Booking,
    pub tickets: Vec<IssuedTicket>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TicketStatusResponse {
    pub success: bool,
    pub found: bool,
    pub is_used: bool,
    pub used_at: Option<DateTime<Utc>>,
    pub ticket_info: Option<Ticket>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RedeemResponse {
    pub success: bool,
    pub message: String,
    pub used_at: Option<DateTime<Utc>>,
    pub ticket_info: Option<Ticket>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RefundResponse {
    pub success: bool,
    pub message: String,
    pub requested_tickets: u32,
    pub refunded_tickets: u32,
    pub booking_deleted: bool,
    pub used_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserTicket {
    pub ticket_id: TicketId,
    pub ticket_number: u32,
    pub total_tickets: u32,
    pub booking_id: Uuid,
    pub event_id: Uuid,
    pub event_title: Option<String>,
    pub is_used: bool,
    pub used_at: Option<DateTime<Utc>>,
    pub qr_code_data_url: String,
    pub validation_url: String,
}
