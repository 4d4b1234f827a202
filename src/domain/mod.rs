pub mod business_record;
pub mod contact;
pub mod listing;
pub mod search_query;

pub use business_record::*;
pub use listing::*;
pub use search_query::*;
