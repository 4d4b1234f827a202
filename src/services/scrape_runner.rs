use std::collections::HashSet;

use async_trait::async_trait;
use serde::Serialize;
use uuid::Uuid;

use crate::{
    configuration::Settings,
    domain::{BusinessRecord, ListingDetail, ListingReference, ScrapedFields, SearchQuery},
    error::{CrawlError, ExportError, ExtractionError, ScrapeError},
};

use super::{Droid, EmailFinder, ExportWriter, MapsCrawler, OpenaiClient};

/// Lazy, single-pass sequence of listings from one browser session.
#[async_trait]
pub trait ListingSource: Send {
    async fn next_listing(&mut self) -> Result<Option<ListingReference>, CrawlError>;

    async fn materialize(&mut self, listing: &ListingReference) -> Result<ListingDetail, CrawlError>;

    /// Fields read straight off the open detail panel. Only asked for when
    /// extraction failed, while `detail` is still the open listing.
    async fn scrape_fallback(&mut self, detail: &ListingDetail) -> ScrapedFields;
}

#[async_trait]
pub trait FieldExtractor: Sync {
    async fn extract(&self, raw_text: &str) -> Result<BusinessRecord, ExtractionError>;
}

#[async_trait]
pub trait ContactFinder: Sync {
    /// `None` when nothing was found or the site could not be read.
    async fn find_email(&self, website: &str) -> Option<String>;
}

pub trait RecordSink: Send {
    fn append(&mut self, record: &BusinessRecord) -> Result<(), ExportError>;
}

#[derive(Debug, Clone, Copy)]
pub struct ScrapeOptions {
    pub lookup_emails: bool,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct RunSummary {
    pub run_id: Uuid,
    pub query: String,
    pub discovered: usize,
    pub written: usize,
    pub duplicates: usize,
    pub crawl_failures: usize,
    pub extraction_failures: usize,
    /// Extraction failures recovered from the fields scraped off the page.
    pub fallbacks: usize,
}

impl RunSummary {
    fn new(run_id: Uuid, query: &SearchQuery) -> Self {
        RunSummary {
            run_id,
            query: query.to_string(),
            discovered: 0,
            written: 0,
            duplicates: 0,
            crawl_failures: 0,
            extraction_failures: 0,
            fallbacks: 0,
        }
    }
}

/// Crawl -> extract -> enrich -> write, one listing at a time.
///
/// A listing that can't be opened or structured is skipped. Failing to
/// discover listings or to write a record ends the run with an error.
pub async fn run_scrape<S, X, C, W>(
    run_id: Uuid,
    query: &SearchQuery,
    source: &mut S,
    extractor: &X,
    finder: &C,
    sink: &mut W,
    options: ScrapeOptions,
) -> Result<RunSummary, ScrapeError>
where
    S: ListingSource,
    X: FieldExtractor,
    C: ContactFinder,
    W: RecordSink,
{
    let mut summary = RunSummary::new(run_id, query);
    let mut seen_records = HashSet::new();

    while let Some(listing) = source.next_listing().await? {
        summary.discovered += 1;

        let detail = match source.materialize(&listing).await {
            Ok(detail) => detail,
            Err(e) => {
                log::warn!("[{}] Skipping listing {}: {}", run_id, listing.card_id, e);
                summary.crawl_failures += 1;
                continue;
            }
        };

        let mut record = match extractor.extract(&detail.text).await {
            Ok(record) => record,
            Err(e) => {
                summary.extraction_failures += 1;
                let scraped = source.scrape_fallback(&detail).await;
                match BusinessRecord::from_scraped(&scraped) {
                    Some(record) => {
                        log::warn!(
                            "[{}] Extraction failed for listing {}, using page fields: {}",
                            run_id,
                            listing.card_id,
                            e
                        );
                        summary.fallbacks += 1;
                        record
                    }
                    None => {
                        log::error!(
                            "[{}] Extraction failed for listing {}: {}",
                            run_id,
                            listing.card_id,
                            e
                        );
                        continue;
                    }
                }
            }
        };

        if options.lookup_emails && !record.has_email() {
            if let Some(website) = record.http_website().map(str::to_string) {
                if let Some(email) = finder.find_email(&website).await {
                    log::info!("[{}] Found {} on {}", run_id, email, website);
                    record.email = Some(email);
                }
            }
        }

        if !seen_records.insert(record.dedup_key()) {
            log::debug!("[{}] Dropping duplicate of {}", run_id, record.name);
            summary.duplicates += 1;
            continue;
        }

        sink.append(&record)?;
        summary.written += 1;
        log::info!("[{}] {}. {}", run_id, summary.written, record.name);
    }

    Ok(summary)
}

/// Runs one query end to end against the real browser, extraction API and
/// export file. The browser is closed and the file flushed on every path.
pub async fn run_search_job(
    run_id: Uuid,
    query: &SearchQuery,
    settings: &Settings,
) -> Result<RunSummary, ScrapeError> {
    let extractor = OpenaiClient::new(&settings.extractor)?;
    let finder = EmailFinder::new(&settings.email_lookup)?;
    let mut writer = ExportWriter::open(&settings.export.path)?;
    let droid = Droid::connect(&settings.browser).await?;

    let result = crawl_with(run_id, query, settings, &droid, &extractor, &finder, &mut writer).await;
    droid.quit().await;

    let summary = result?;
    writer.finish()?;
    Ok(summary)
}

async fn crawl_with(
    run_id: Uuid,
    query: &SearchQuery,
    settings: &Settings,
    droid: &Droid,
    extractor: &OpenaiClient,
    finder: &EmailFinder,
    writer: &mut ExportWriter,
) -> Result<RunSummary, ScrapeError> {
    let mut crawler = MapsCrawler::open(&droid.driver, &settings.browser, query).await?;
    let options = ScrapeOptions {
        lookup_emails: settings.email_lookup.enabled,
    };

    run_scrape(run_id, query, &mut crawler, extractor, finder, writer, options).await
}
