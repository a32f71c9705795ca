use actix_web::{Responder, web, get, post, HttpResponse};
use uuid::Uuid;

use crate::{
   config::AppConfig,
   db::Db,
   dto::{NewBookingDto, UserTicketsQuery},
   service,
};

#[get("/bookings")]
pub async fn get_all(db: web::Data<Db>) -> impl Responder {
   match service::booking::get_all(db.get_ref()).await {
      Ok(bookings) => HttpResponse::Ok().json(serde_json::json!({ "success": true, "bookings": bookings })),
      Err(err) => HttpResponse::from_error(err)
   }
}

#[post("/bookings")]
pub async fn create(dto: web::Json<NewBookingDto>, db: web::Data<Db>, cfg: web::Data<AppConfig>) -> impl Responder {
   match service::booking::create(dto.into_inner(), db.get_ref(), cfg.get_ref()).await {
      Ok(created) => HttpResponse::Created().json(serde_json::json!({
         "success": true,
         "booking": created.booking,
         "tickets": created.tickets,
      })),
      Err(err) => HttpResponse::from_error(err)
   }
}

#[get("/user-bookings/{user_id}")]
pub async fn get_by_user(user_id: web::Path<Uuid>, db: web::Data<Db>) -> impl Responder {
   match service::booking::get_by_user(&user_id.into_inner(), db.get_ref()).await {
      Ok(bookings) => HttpResponse::Ok().json(serde_json::json!({ "success": true, "bookings": bookings })),
      Err(err) => HttpResponse::from_error(err)
   }
}

#[get("/user-tickets/{user_id}")]
pub async fn user_tickets(
   user_id: web::Path<Uuid>,
   query: web::Query<UserTicketsQuery>,
   db: web::Data<Db>,
   cfg: web::Data<AppConfig>
) -> impl Responder {
   let res = service::booking::user_tickets(
      &user_id.into_inner(),
      query.include_used,
      db.get_ref(),
      cfg.get_ref()
   ).await;
   match res {
      Ok(tickets) => HttpResponse::Ok().json(serde_json::json!({ "success": true, "tickets": tickets })),
      Err(err) => HttpResponse::from_error(err)
   }
}

pub fn init_routes(cfg: &mut web::ServiceConfig) {
   cfg.service(get_all)
      .service(create)
      .service(get_by_user)
      .service(user_tickets);
}

#[cfg(test)]
mod tests {
   use actix_web::{http::StatusCode, test};
   use serde_json::{json, Value};
   use uuid::Uuid;

   use crate::{db::Db, handlers::test_app};

   #[actix_web::test]
   async fn booking_flow_over_http() {
      let app = test_app!(Db::in_memory());
      let req = test::TestRequest::post()
         .uri("/events")
         .set_json(json!({
            "title": "Theatre",
            "startDate": "2030-01-01T20:00:00Z",
            "totalPlaces": 2,
            "price": 2000
         }))
         .to_request();
      let created: Value = test::call_and_read_body_json(&app, req).await;
      let event_id = created["event"]["id"].clone();

      let user = Uuid::new_v4();
      let req = test::TestRequest::post()
         .uri("/bookings")
         .set_json(json!({
            "eventId": event_id,
            "name": "Ada",
            "email": "ada@example.org",
            "userId": user,
            "ticketCount": 2
         }))
         .to_request();
      let booked: Value = test::call_and_read_body_json(&app, req).await;
      assert_eq!(booked["booking"]["totalPrice"], 4000);
      assert_eq!(booked["tickets"].as_array().unwrap().len(), 2);

      let req = test::TestRequest::get().uri(&format!("/user-tickets/{}", user)).to_request();
      let mine: Value = test::call_and_read_body_json(&app, req).await;
      assert_eq!(mine["tickets"].as_array().unwrap().len(), 2);
      assert_eq!(mine["tickets"][0]["eventTitle"], "Theatre");

      let req = test::TestRequest::post()
         .uri("/bookings")
         .set_json(json!({
            "eventId": event_id,
            "name": "Grace",
            "email": "grace@example.org",
            "ticketCount": 1
         }))
         .to_request();
      let res = test::call_service(&app, req).await;
      assert_eq!(res.status(), StatusCode::BAD_REQUEST);
   }
}
