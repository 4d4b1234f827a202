pub mod scrape_route;
pub mod status_route;
