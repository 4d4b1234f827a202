pub mod droid;
pub mod email_finder;
pub mod export_writer;
pub mod maps_crawler;
pub mod openai_client;
pub mod scrape_job;
pub mod scrape_runner;

pub use droid::*;
pub use email_finder::*;
pub use export_writer::*;
pub use maps_crawler::*;
pub use openai_client::*;
pub use scrape_job::*;
pub use scrape_runner::*;
