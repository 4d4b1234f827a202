use actix_web::{get, http::StatusCode, web, HttpResponse};

use crate::services::JobTracker;

use super::panel::render_panel;

#[get("/")]
async fn default(tracker: web::Data<JobTracker>) -> HttpResponse {
    render_panel(StatusCode::OK, "", None, &tracker.status())
}
