use std::net::TcpListener;

use actix_web::web;
use anyhow::Context;
use env_logger::Env;
use maps_scraper::{
    configuration::get_configuration,
    domain::SearchQuery,
    services::{scrape_job_handler, JobTracker, SearchQuerySender},
    startup::run,
};
use tokio::sync::mpsc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let configuration = get_configuration().context("Failed to read configuration.")?;
    if configuration.extractor.api_key.trim().is_empty() {
        anyhow::bail!("No extraction API key. Set APP_EXTRACTOR__API_KEY or GEMINI_API_KEY.");
    }

    let address = format!(
        "{}:{}",
        configuration.application.host, configuration.application.port
    );
    let listener =
        TcpListener::bind(&address).with_context(|| format!("Failed to bind {}", address))?;
    log::info!("Open http://{} to start scraping", address);

    let tracker = web::Data::new(JobTracker::default());
    let (query_sender, query_receiver) = mpsc::unbounded_channel::<SearchQuery>();

    let tracker_clone = tracker.clone();
    tokio::spawn(async move {
        scrape_job_handler(query_receiver, tracker_clone, configuration).await
    });

    run(
        listener,
        tracker,
        SearchQuerySender {
            sender: query_sender,
        },
    )?
    .await?;

    Ok(())
}
