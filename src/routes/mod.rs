pub mod app;
pub mod default_route;
pub mod panel;

pub use app::*;
