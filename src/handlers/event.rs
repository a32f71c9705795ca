use actix_web::{Responder, web, get, post, put, delete, HttpResponse};
use chrono::Utc;
use uuid::Uuid;

use crate::{
   db::Db,
   dto::{EventView, NewCreatorEventDto, NewEventDto, RejectEventDto, UpdateEventDto},
   models::Event,
   service,
};

fn view(event: Event) -> EventView {
   EventView::new(event, Utc::now())
}

fn views(events: Vec<Event>) -> Vec<EventView> {
   let now = Utc::now();
   events.into_iter().map(|e| EventView::new(e, now)).collect()
}

#[get("/events")]
pub async fn get_all(db: web::Data<Db>) -> impl Responder {
   match service::event::get_all(db.get_ref()).await {
      Ok(events) => HttpResponse::Ok().json(serde_json::json!({ "success": true, "events": views(events) })),
      Err(err) => HttpResponse::from_error(err)
   }
}

#[post("/events")]
pub async fn create(dto: web::Json<NewEventDto>, db: web::Data<Db>) -> impl Responder {
   match service::event::create(dto.into_inner(), db.get_ref()).await {
      Ok(event) => HttpResponse::Created().json(serde_json::json!({ "success": true, "event": view(event) })),
      Err(err) => HttpResponse::from_error(err)
   }
}

#[get("/events/{id}")]
pub async fn get_by_id(id: web::Path<Uuid>, db: web::Data<Db>) -> impl Responder {
   match service::event::get_by_id(&id.into_inner(), db.get_ref()).await {
      Ok(event) => HttpResponse::Ok().json(serde_json::json!({ "success": true, "event": view(event) })),
      Err(err) => HttpResponse::from_error(err)
   }
}

#[put("/events/{id}")]
pub async fn update(
   id: web::Path<Uuid>,
   fields: web::Json<UpdateEventDto>,
   db: web::Data<Db>
) -> impl Responder {
   match service::event::update(&id.into_inner(), fields.into_inner(), db.get_ref()).await {
      Ok(event) => HttpResponse::Ok().json(serde_json::json!({ "success": true, "event": view(event) })),
      Err(err) => HttpResponse::from_error(err)
   }
}

#[delete("/events/{id}")]
pub async fn remove(id: web::Path<Uuid>, db: web::Data<Db>) -> impl Responder {
   match service::event::delete(&id.into_inner(), db.get_ref()).await {
      Ok(deleted) => HttpResponse::Ok().json(serde_json::json!({
         "success": true,
         "deletedBookings": deleted.bookings,
         "deletedTickets": deleted.tickets,
      })),
      Err(err) => HttpResponse::from_error(err)
   }
}

#[post("/creator-events")]
pub async fn create_for_creator(dto: web::Json<NewCreatorEventDto>, db: web::Data<Db>) -> impl Responder {
   let NewCreatorEventDto { event, creator_id } = dto.into_inner();
   match service::event::create_for_creator(event, creator_id, db.get_ref()).await {
      Ok(event) => HttpResponse::Created().json(serde_json::json!({ "success": true, "event": view(event) })),
      Err(err) => HttpResponse::from_error(err)
   }
}

#[get("/creator-events/{creator_id}")]
pub async fn get_by_creator(creator_id: web::Path<Uuid>, db: web::Data<Db>) -> impl Responder {
   match service::event::get_by_creator(&creator_id.into_inner(), db.get_ref()).await {
      Ok(events) => HttpResponse::Ok().json(serde_json::json!({ "success": true, "events": views(events) })),
      Err(err) => HttpResponse::from_error(err)
   }
}

#[get("/creator-statistics/{creator_id}")]
pub async fn creator_statistics(creator_id: web::Path<Uuid>, db: web::Data<Db>) -> impl Responder {
   match service::statistics::get_for_creator(&creator_id.into_inner(), db.get_ref()).await {
      Ok(stats) => HttpResponse::Ok().json(serde_json::json!({ "success": true, "statistics": stats })),
      Err(err) => HttpResponse::from_error(err)
   }
}

#[get("/admin/pending-events")]
pub async fn get_pending(db: web::Data<Db>) -> impl Responder {
   match service::event::get_pending(db.get_ref()).await {
      Ok(events) => HttpResponse::Ok().json(serde_json::json!({ "success": true, "events": views(events) })),
      Err(err) => HttpResponse::from_error(err)
   }
}

#[post("/admin/approve-event/{id}")]
pub async fn approve(id: web::Path<Uuid>, db: web::Data<Db>) -> impl Responder {
   match service::event::approve(&id.into_inner(), db.get_ref()).await {
      Ok(event) => HttpResponse::Ok().json(serde_json::json!({ "success": true, "event": view(event) })),
      Err(err) => HttpResponse::from_error(err)
   }
}

#[post("/admin/reject-event/{id}")]
pub async fn reject(id: web::Path<Uuid>, body: web::Json<RejectEventDto>, db: web::Data<Db>) -> impl Responder {
   match service::event::reject(&id.into_inner(), body.into_inner().reason, db.get_ref()).await {
      Ok(event) => HttpResponse::Ok().json(serde_json::json!({ "success": true, "event": view(event) })),
      Err(err) => HttpResponse::from_error(err)
   }
}

#[get("/statistics")]
pub async fn statistics(db: web::Data<Db>) -> impl Responder {
   match service::statistics::get(db.get_ref()).await {
      Ok(stats) => HttpResponse::Ok().json(serde_json::json!({ "success": true, "statistics": stats })),
      Err(err) => HttpResponse::from_error(err)
   }
}

pub fn init_routes(cfg: &mut web::ServiceConfig) {
   cfg.service(get_all)
      .service(create)
      .service(get_by_id)
      .service(update)
      .service(remove)
      .service(create_for_creator)
      .service(get_by_creator)
      .service(creator_statistics)
      .service(get_pending)
      .service(approve)
      .service(reject)
      .service(statistics);
}

#[cfg(test)]
mod tests {
   use actix_web::{http::StatusCode, test};
   use serde_json::{json, Value};

   use crate::{db::Db, handlers::test_app};

   fn new_event() -> Value {
      json!({
         "title": "Jazz night",
         "description": "Live quartet",
         "startDate": "2030-05-01T19:00:00Z",
         "presenter": "Quartet",
         "totalPlaces": 40,
         "price": 1500
      })
   }

   #[actix_web::test]
   async fn creator_event_goes_through_approval() {
      let app = test_app!(Db::in_memory());
      let creator = uuid::Uuid::new_v4();
      let mut body = new_event();
      body["creatorId"] = json!(creator);

      let req = test::TestRequest::post().uri("/creator-events").set_json(&body).to_request();
      let created: Value = test::call_and_read_body_json(&app, req).await;
      assert_eq!(created["event"]["status"], "pending");
      assert_eq!(created["event"]["isPast"], false);
      let id = created["event"]["id"].as_str().unwrap().to_string();

      let req = test::TestRequest::get().uri("/admin/pending-events").to_request();
      let pending: Value = test::call_and_read_body_json(&app, req).await;
      assert_eq!(pending["events"].as_array().unwrap().len(), 1);

      let req = test::TestRequest::post()
         .uri(&format!("/admin/reject-event/{}", id))
         .set_json(json!({ "reason": "missing venue" }))
         .to_request();
      let rejected: Value = test::call_and_read_body_json(&app, req).await;
      assert_eq!(rejected["event"]["status"], "rejected");
      assert_eq!(rejected["event"]["rejectionReason"], "missing venue");

      let req = test::TestRequest::get().uri(&format!("/creator-statistics/{}", creator)).to_request();
      let stats: Value = test::call_and_read_body_json(&app, req).await;
      assert_eq!(stats["statistics"]["rejectedEvents"], 1);
   }

   #[actix_web::test]
   async fn malformed_event_body_is_a_bad_request() {
      let app = test_app!(Db::in_memory());
      let req = test::TestRequest::post()
         .uri("/events")
         .set_json(json!({ "title": "no dates" }))
         .to_request();
      let res = test::call_service(&app, req).await;
      assert_eq!(res.status(), StatusCode::BAD_REQUEST);
   }

   #[actix_web::test]
   async fn event_is_fetched_by_id() {
      let app = test_app!(Db::in_memory());
      let req = test::TestRequest::post().uri("/events").set_json(new_event()).to_request();
      let created: Value = test::call_and_read_body_json(&app, req).await;
      let id = created["event"]["id"].as_str().unwrap().to_string();

      let req = test::TestRequest::get().uri(&format!("/events/{}", id)).to_request();
      let fetched: Value = test::call_and_read_body_json(&app, req).await;
      assert_eq!(fetched["event"]["title"], "Jazz night");
      assert_eq!(fetched["event"]["status"], "approved");

      let req = test::TestRequest::get().uri(&format!("/events/{}", uuid::Uuid::new_v4())).to_request();
      assert_eq!(test::call_service(&app, req).await.status(), StatusCode::NOT_FOUND);
   }

   #[actix_web::test]
   async fn global_statistics_are_served() {
      let app = test_app!(Db::in_memory());
      let req = test::TestRequest::post().uri("/events").set_json(new_event()).to_request();
      test::call_service(&app, req).await;

      let req = test::TestRequest::get().uri("/statistics").to_request();
      let res = test::call_service(&app, req).await;
      assert_eq!(res.status(), StatusCode::OK);
      let stats: Value = test::read_body_json(res).await;
      assert_eq!(stats["statistics"]["global"]["totalTicketsSold"], 0);
   }

   #[actix_web::test]
   async fn updating_missing_event_is_not_found() {
      let app = test_app!(Db::in_memory());
      let req = test::TestRequest::put()
         .uri(&format!("/events/{}", uuid::Uuid::new_v4()))
         .set_json(json!({ "title": "x" }))
         .to_request();
      let res = test::call_service(&app, req).await;
      assert_eq!(res.status(), StatusCode::NOT_FOUND);
   }
}
