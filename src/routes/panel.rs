use actix_web::{http::StatusCode, HttpResponse};
use askama::Template;

use crate::services::JobStatus;

#[derive(Template)]
#[template(path = "panel.html")]
struct PanelTemplate {
    query: String,
    message: Option<String>,
    running: bool,
    status_line: String,
}

pub fn render_panel(
    status_code: StatusCode,
    query: &str,
    message: Option<String>,
    status: &JobStatus,
) -> HttpResponse {
    let template = PanelTemplate {
        query: query.to_string(),
        message,
        running: status.is_running(),
        status_line: status_line(status),
    };

    match template.render() {
        Ok(body) => HttpResponse::build(status_code)
            .content_type("text/html; charset=utf-8")
            .body(body),
        Err(e) => {
            log::error!("Failed to render panel: {:?}", e);
            HttpResponse::InternalServerError().finish()
        }
    }
}

fn status_line(status: &JobStatus) -> String {
    match status {
        JobStatus::Idle => "Ready.".to_string(),
        JobStatus::Running { query } => format!("Scraping \"{}\", please wait...", query),
        JobStatus::Done {
            summary,
            export_path,
        } => format!(
            "Done! Exported {} businesses for \"{}\" to {}.",
            summary.written, summary.query, export_path
        ),
        JobStatus::Failed { query, error } => {
            format!("Error while scraping \"{}\": {}", query, error)
        }
    }
}
