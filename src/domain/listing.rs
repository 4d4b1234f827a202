/// Handle to one result card in the crawler's current result list.
///
/// Only meaningful to the crawler session that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingReference {
    pub card_id: String,
    pub position: usize,
}

/// Fields read straight from the listing's detail panel, used when the
/// extraction API can't structure the listing text.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScrapedFields {
    pub name: Option<String>,
    pub business_type: Option<String>,
    pub address: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub website: Option<String>,
}

/// Visible text of a listing whose detail panel is open.
#[derive(Debug, Clone)]
pub struct ListingDetail {
    pub reference: ListingReference,
    pub text: String,
}
