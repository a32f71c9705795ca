use actix_web::{Responder, web, get, post, HttpResponse};
use log::info;

use crate::{
   config::AppConfig,
   db::Db,
   dto::{IssueTicketsRequest, RedeemResponse, RefundRequest, RefundResponse, TicketStatusResponse, UseTicketRequest},
   errors::ServiceError,
   service::{self, ticket::{Redemption, Refund, TicketStatus}},
};

use super::{parse_ticket_id, parse_uuid};

#[post("/generate-qr")]
pub async fn generate(body: web::Json<IssueTicketsRequest>, db: web::Data<Db>, cfg: web::Data<AppConfig>) -> impl Responder {
   let IssueTicketsRequest { booking_id, ticket_count } = body.into_inner();
   let booking_id = match booking_id.as_deref().map(|raw| parse_uuid(raw, "booking id")) {
      Some(Ok(id)) => id,
      Some(Err(err)) => return HttpResponse::from_error(err),
      None => return HttpResponse::from_error(ServiceError::invalid("bookingId is required")),
   };
   match service::ticket::issue_tickets(&booking_id, ticket_count, db.get_ref(), cfg.get_ref()).await {
      Ok(codes) => HttpResponse::Ok().json(serde_json::json!({ "success": true, "qrCodes": codes })),
      Err(err) => HttpResponse::from_error(err)
   }
}

#[get("/check-ticket-status/{ticket_id}")]
pub async fn check_status(ticket_id: web::Path<String>, db: web::Data<Db>) -> impl Responder {
   let id = match parse_ticket_id(&ticket_id) {
      Ok(id) => id,
      Err(err) => return HttpResponse::from_error(err),
   };
   let body = match service::ticket::check_status(&id, db.get_ref()).await {
      Ok(TicketStatus::NotFound) => {
         return HttpResponse::NotFound().json(TicketStatusResponse {
            success: false,
            found: false,
            is_used: false,
            used_at: None,
            ticket_info: None,
         })
      }
      Ok(TicketStatus::Unused { ticket }) => TicketStatusResponse {
         success: true,
         found: true,
         is_used: false,
         used_at: None,
         ticket_info: Some(ticket),
      },
      Ok(TicketStatus::Used { ticket, used_at }) => TicketStatusResponse {
         success: true,
         found: true,
         is_used: true,
         used_at,
         ticket_info: Some(ticket),
      },
      Err(err) => return HttpResponse::from_error(err),
   };
   HttpResponse::Ok().json(body)
}

async fn redeem(raw_id: &str, db: &Db) -> HttpResponse {
   let id = match parse_ticket_id(raw_id) {
      Ok(id) => id,
      Err(err) => return HttpResponse::from_error(err),
   };
   match service::ticket::redeem(&id, db).await {
      Ok(Redemption::Redeemed { ticket }) => HttpResponse::Ok().json(RedeemResponse {
         success: true,
         message: "Ticket validated".to_string(),
         used_at: ticket.used_at,
         ticket_info: Some(ticket),
      }),
      Ok(Redemption::AlreadyUsed { used_at, .. }) => HttpResponse::Conflict().json(RedeemResponse {
         success: false,
         message: "Ticket already used".to_string(),
         used_at,
         ticket_info: None,
      }),
      Err(err) => HttpResponse::from_error(err)
   }
}

/// Target of the validation URL printed in every ticket code.
#[get("/validate-ticket/{ticket_id}")]
pub async fn validate(ticket_id: web::Path<String>, db: web::Data<Db>) -> impl Responder {
   redeem(&ticket_id, db.get_ref()).await
}

#[post("/use-ticket")]
pub async fn use_ticket(body: web::Json<UseTicketRequest>, db: web::Data<Db>) -> impl Responder {
   redeem(&body.ticket_id, db.get_ref()).await
}

#[post("/refund-booking")]
pub async fn refund(body: web::Json<RefundRequest>, db: web::Data<Db>) -> impl Responder {
   let RefundRequest { booking_id, ticket_id } = body.into_inner();
   let booking_id = match parse_uuid(&booking_id, "booking id") {
      Ok(id) => id,
      Err(err) => return HttpResponse::from_error(err),
   };
   let ticket_id = match ticket_id.as_deref().map(parse_ticket_id).transpose() {
      Ok(id) => id,
      Err(err) => return HttpResponse::from_error(err),
   };
   match service::ticket::refund(&booking_id, ticket_id.as_ref(), db.get_ref()).await {
      Ok(Refund::Refunded(summary)) => {
         info!("refund on booking {}: {:?}", booking_id, summary);
         HttpResponse::Ok().json(RefundResponse {
            success: true,
            message: format!("{} of {} tickets refunded", summary.refunded, summary.requested),
            requested_tickets: summary.requested,
            refunded_tickets: summary.refunded,
            booking_deleted: summary.booking_deleted,
            used_at: None,
         })
      }
      Ok(Refund::Ineligible { ticket_id, used_at }) => HttpResponse::UnprocessableEntity().json(RefundResponse {
         success: false,
         message: format!("ticket {} was already used and cannot be refunded", ticket_id),
         requested_tickets: 1,
         refunded_tickets: 0,
         booking_deleted: false,
         used_at,
      }),
      Err(err) => HttpResponse::from_error(err)
   }
}

#[get("/used-tickets")]
pub async fn used_tickets(db: web::Data<Db>) -> impl Responder {
   match crate::db::ticket::get_used(db.get_ref()).await {
      Ok(records) => HttpResponse::Ok().json(serde_json::json!({ "success": true, "usedTickets": records })),
      Err(err) => HttpResponse::from_error(err)
   }
}

pub fn init_routes(cfg: &mut web::ServiceConfig) {
   cfg.service(generate)
      .service(check_status)
      .service(validate)
      .service(use_ticket)
      .service(refund)
      .service(used_tickets);
}
