pub mod booking;
pub mod event;
pub mod ticket;

use actix_web::{error, get, web, HttpResponse, Responder};
use uuid::Uuid;

use crate::{errors::ServiceError, models::TicketId};

#[get("/health")]
pub async fn health() -> impl Responder {
   HttpResponse::Ok().json(serde_json::json!({ "status": "ok" }))
}

pub fn parse_uuid(raw: &str, what: &str) -> Result<Uuid, ServiceError> {
   Uuid::parse_str(raw.trim()).map_err(|_| ServiceError::invalid(format!("malformed {} '{}'", what, raw)))
}

pub fn parse_ticket_id(raw: &str) -> Result<TicketId, ServiceError> {
   raw.parse()
}

/// Malformed JSON bodies answer like any other invalid argument.
pub fn json_config() -> web::JsonConfig {
   web::JsonConfig::default().error_handler(|err, _req| {
      error::InternalError::from_response(
         err.to_string(),
         HttpResponse::from_error(ServiceError::invalid(err.to_string())),
      )
      .into()
   })
}

pub fn init_routes(cfg: &mut web::ServiceConfig) {
   cfg.app_data(json_config());
   cfg.service(health);
   event::init_routes(cfg);
   booking::init_routes(cfg);
   ticket::init_routes(cfg);
}

/// Builds the full app over `$db` for handler tests.
#[cfg(test)]
macro_rules! test_app {
   ($db:expr) => {
      actix_web::test::init_service(
         actix_web::App::new()
            .wrap(crate::service::log::LoggerMiddleware)
            .app_data(actix_web::web::Data::new($db))
            .app_data(actix_web::web::Data::new(crate::config::AppConfig::default()))
            .configure(crate::handlers::init_routes),
      )
      .await
   };
}

#[cfg(test)]
pub(crate) use test_app;
