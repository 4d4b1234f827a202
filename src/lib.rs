//! Scrapes Google Maps business listings into a CSV file.
//!
//! A local web panel takes the search query, a WebDriver session walks the
//! result list and an OpenAI compatible chat model structures each listing.

pub mod configuration;
pub mod domain;
pub mod error;
pub mod routes;
pub mod services;
pub mod startup;
