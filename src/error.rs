//! Error taxonomy for a scrape run.
//!
//! Listing-level failures ([`CrawlError`], [`ExtractionError`]) are counted and
//! skipped by the runner. [`ScrapeError`] is what aborts a whole run.

use std::fmt;

use thiserror::Error;

/// Rejected panel input.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum InputError {
    #[error("Please enter a search query.")]
    EmptyQuery,
}

/// Browser navigation or page inspection failed.
#[derive(Error, Debug)]
pub enum CrawlError {
    #[error("WebDriver session could not be started: {0}")]
    Session(String),

    #[error("Navigation to {url} failed: {message}")]
    Navigation { url: String, message: String },

    #[error("Timed out waiting for '{selector}'")]
    Timeout { selector: String },

    #[error("Selector '{selector}' matched nothing")]
    SelectorNotFound { selector: String },

    #[error("WebDriver error: {0}")]
    WebDriver(#[from] thirtyfour::error::WebDriverError),
}

impl CrawlError {
    pub fn navigation(url: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::Navigation {
            url: url.into(),
            message: message.to_string(),
        }
    }

    pub fn timeout(selector: impl Into<String>) -> Self {
        Self::Timeout {
            selector: selector.into(),
        }
    }

    pub fn selector_not_found(selector: impl Into<String>) -> Self {
        Self::SelectorNotFound {
            selector: selector.into(),
        }
    }
}

/// The extraction API failed or answered with something unusable.
#[derive(Error, Debug)]
pub enum ExtractionError {
    #[error("Extraction API error after {attempts} attempt(s): {message}")]
    Api { attempts: u32, message: String },

    #[error("Extraction API returned no content")]
    EmptyResponse,

    #[error("Extraction API response is not a JSON object: {0}")]
    Malformed(String),

    #[error("Extraction API response is missing '{0}'")]
    Partial(&'static str),
}

/// Writing the export file failed.
#[derive(Error, Debug)]
pub enum ExportError {
    #[error("I/O error on export file: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error on export file: {0}")]
    Csv(#[from] csv::Error),
}

/// A failure that ends the run.
#[derive(Error, Debug)]
pub enum ScrapeError {
    #[error(transparent)]
    Input(#[from] InputError),

    #[error("Crawl aborted: {0}")]
    Crawl(#[from] CrawlError),

    #[error("Export failed: {0}")]
    Export(#[from] ExportError),

    #[error("HTTP client could not be built: {0}")]
    HttpClient(#[from] reqwest::Error),
}
