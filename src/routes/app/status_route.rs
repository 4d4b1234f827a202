use actix_web::{get, web, HttpResponse};

use crate::services::JobTracker;

#[get("/status")]
async fn status(tracker: web::Data<JobTracker>) -> HttpResponse {
    HttpResponse::Ok().json(tracker.status())
}
