use std::{
    future::Future,
    sync::{Mutex, PoisonError},
};

use actix_web::web::Data;
use serde::Serialize;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};
use uuid::Uuid;

use crate::{configuration::Settings, domain::SearchQuery, error::ScrapeError};

use super::{run_search_job, RunSummary};

pub struct SearchQuerySender {
    pub sender: UnboundedSender<SearchQuery>,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum JobStatus {
    Idle,
    Running {
        query: String,
    },
    Done {
        summary: RunSummary,
        export_path: String,
    },
    Failed {
        query: String,
        error: String,
    },
}

impl JobStatus {
    pub fn is_running(&self) -> bool {
        matches!(self, JobStatus::Running { .. })
    }
}

/// Status of the current or last run, shared between the panel and the job
/// handler. At most one run is active at a time.
pub struct JobTracker {
    status: Mutex<JobStatus>,
}

impl Default for JobTracker {
    fn default() -> Self {
        JobTracker {
            status: Mutex::new(JobStatus::Idle),
        }
    }
}

impl JobTracker {
    pub fn status(&self) -> JobStatus {
        self.status
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Marks `query` as running. Returns `false` if another run is active.
    pub fn try_start(&self, query: &SearchQuery) -> bool {
        let mut status = self.status.lock().unwrap_or_else(PoisonError::into_inner);
        if status.is_running() {
            return false;
        }
        *status = JobStatus::Running {
            query: query.to_string(),
        };
        true
    }

    pub fn finish(&self, outcome: JobStatus) {
        *self.status.lock().unwrap_or_else(PoisonError::into_inner) = outcome;
    }
}

pub async fn scrape_job_handler(
    mut query_receiver: UnboundedReceiver<SearchQuery>,
    tracker: Data<JobTracker>,
    settings: Settings,
) {
    log::info!("Started scrape job handler");

    while let Some(query) = query_receiver.recv().await {
        let run_id = Uuid::new_v4();
        log::info!("[{}] Scraping Google Maps for: {}", run_id, query);

        let run = {
            let query = query.clone();
            let settings = settings.clone();
            async move { run_search_job(run_id, &query, &settings).await }
        };
        let outcome = supervise_run(run_id, &query, &settings.export.path, run).await;
        tracker.finish(outcome);
    }

    log::info!("Scrape job handler stopped");
}

/// Runs one scrape on its own task and turns its result, or its panic, into
/// the status the panel shows next.
async fn supervise_run<F>(
    run_id: Uuid,
    query: &SearchQuery,
    export_path: &str,
    run: F,
) -> JobStatus
where
    F: Future<Output = Result<RunSummary, ScrapeError>> + Send + 'static,
{
    let failed = |error: String| JobStatus::Failed {
        query: query.to_string(),
        error,
    };

    match tokio::spawn(run).await {
        Ok(Ok(summary)) => {
            log::info!(
                "[{}] Exported {} businesses to {} ({} discovered, {} duplicates, {} crawl failures, {} extraction failures)",
                run_id,
                summary.written,
                export_path,
                summary.discovered,
                summary.duplicates,
                summary.crawl_failures,
                summary.extraction_failures,
            );
            JobStatus::Done {
                summary,
                export_path: export_path.to_string(),
            }
        }
        Ok(Err(e)) => {
            log::error!("[{}] Scrape failed: {}", run_id, e);
            failed(e.to_string())
        }
        Err(e) => {
            log::error!("[{}] Scrape task died: {}", run_id, e);
            failed(format!("Scrape stopped unexpectedly: {}", e))
        }
    }
}
