use actix_web::{http::StatusCode, post, web, HttpResponse};
use serde::Deserialize;

use crate::{
    domain::SearchQuery,
    routes::panel::render_panel,
    services::{JobStatus, JobTracker, SearchQuerySender},
};

#[derive(Deserialize)]
struct StartScrapeForm {
    query: String,
}

#[post("/scrape")]
async fn start_scrape(
    form: web::Form<StartScrapeForm>,
    tracker: web::Data<JobTracker>,
    query_sender: web::Data<SearchQuerySender>,
) -> HttpResponse {
    let query = match SearchQuery::parse(&form.query) {
        Ok(query) => query,
        Err(e) => {
            return render_panel(
                StatusCode::BAD_REQUEST,
                &form.query,
                Some(e.to_string()),
                &tracker.status(),
            )
        }
    };

    if !tracker.try_start(&query) {
        return render_panel(
            StatusCode::CONFLICT,
            &form.query,
            Some("A scrape is already running.".to_string()),
            &tracker.status(),
        );
    }

    if let Err(e) = query_sender.sender.send(query.clone()) {
        log::error!("Scrape job handler is gone: {:?}", e);
        tracker.finish(JobStatus::Failed {
            query: query.to_string(),
            error: "The scrape worker is not running.".to_string(),
        });
        return render_panel(
            StatusCode::SERVICE_UNAVAILABLE,
            &form.query,
            None,
            &tracker.status(),
        );
    }

    log::info!("Queued scrape for: {}", query);
    render_panel(StatusCode::OK, query.as_str(), None, &tracker.status())
}
