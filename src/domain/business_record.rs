use itertools::Itertools;
use serde::Serialize;
use url::Url;

use super::ScrapedFields;

/// Column order of the export file.
pub const EXPORT_HEADER: [&str; 6] = ["name", "type", "address", "phone", "email", "website"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BusinessRecord {
    pub name: String,
    #[serde(rename = "type")]
    pub business_type: String,
    pub address: String,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub website: Option<String>,
}

impl BusinessRecord {
    /// Cleans every field and returns `None` when nothing is left of the name.
    pub fn new(
        name: &str,
        business_type: &str,
        address: &str,
        phone: &str,
        email: &str,
        website: &str,
    ) -> Option<Self> {
        let name = clean_field(name);
        if name.is_empty() {
            return None;
        }

        Some(BusinessRecord {
            name,
            business_type: clean_field(business_type),
            address: clean_field(address),
            phone: non_empty(clean_field(phone)),
            email: non_empty(clean_field(email)),
            website: non_empty(clean_field(website)),
        })
    }

    pub fn from_scraped(fields: &ScrapedFields) -> Option<Self> {
        let get = |f: &Option<String>| f.as_deref().unwrap_or("").to_string();

        BusinessRecord::new(
            &get(&fields.name),
            &get(&fields.business_type),
            &get(&fields.address),
            &get(&fields.phone),
            &get(&fields.email),
            &get(&fields.website),
        )
    }

    pub fn has_email(&self) -> bool {
        self.email.as_deref().is_some_and(|e| e.contains('@'))
    }

    /// Website worth visiting for an email lookup.
    pub fn http_website(&self) -> Option<&str> {
        self.website.as_deref().filter(|w| match Url::parse(w) {
            Ok(url) => matches!(url.scheme(), "http" | "https") && url.host_str().is_some(),
            Err(_) => false,
        })
    }

    /// Case-folded copy of all six fields, used to drop repeats inside a run.
    pub fn dedup_key(&self) -> [String; 6] {
        let opt = |f: &Option<String>| f.as_deref().unwrap_or("").to_lowercase();

        [
            self.name.to_lowercase(),
            self.business_type.to_lowercase(),
            self.address.to_lowercase(),
            opt(&self.phone),
            opt(&self.email),
            opt(&self.website),
        ]
    }
}

/// Strips zero-width characters, trims each line, drops empty and repeated
/// lines and joins what remains with single spaces.
pub fn clean_field(value: &str) -> String {
    let value: String = value
        .chars()
        .filter(|c| !matches!(*c, '\u{200B}'..='\u{200D}' | '\u{FEFF}'))
        .collect();

    value
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .unique()
        .join(" ")
}

fn non_empty(value: String) -> Option<String> {
    match value.is_empty() {
        true => None,
        false => Some(value),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clean_field_removes_zero_width_and_repeated_lines() {
        let raw = "\u{200B}Joe's Coffee\n\n  Joe's Coffee  \nMain St\u{FEFF}\n";
        assert_eq!(clean_field(raw), "Joe's Coffee Main St");
    }

    #[test]
    fn clean_field_of_whitespace_is_empty() {
        assert_eq!(clean_field(" \n\t\n"), "");
    }

    #[test]
    fn new_requires_a_name() {
        assert!(BusinessRecord::new("\u{200C} ", "Cafe", "1 Main St", "", "", "").is_none());
    }

    #[test]
    fn new_maps_empty_optionals_to_none() {
        let record = BusinessRecord::new("Joe's", "Cafe", "1 Main St", " ", "", "\n").unwrap();
        assert_eq!(record.phone, None);
        assert_eq!(record.email, None);
        assert_eq!(record.website, None);
    }

    #[test]
    fn has_email_needs_an_at_sign() {
        let mut record = BusinessRecord::new("Joe's", "", "", "", "contact", "").unwrap();
        assert!(!record.has_email());
        record.email = Some("joe@gmail.com".to_string());
        assert!(record.has_email());
    }

    #[test]
    fn http_website_ignores_bare_domains() {
        let bare = BusinessRecord::new("Joe's", "", "", "", "", "joes.com").unwrap();
        assert_eq!(bare.http_website(), None);

        let full = BusinessRecord::new("Joe's", "", "", "", "", "https://joes.com").unwrap();
        assert_eq!(full.http_website(), Some("https://joes.com"));
    }

    #[test]
    fn dedup_key_ignores_case() {
        let a = BusinessRecord::new("JOE'S", "Cafe", "1 Main St", "", "", "").unwrap();
        let b = BusinessRecord::new("joe's", "cafe", "1 MAIN ST", "", "", "").unwrap();
        assert_eq!(a.dedup_key(), b.dedup_key());
    }

    #[test]
    fn from_scraped_cleans_fields() {
        let fields = ScrapedFields {
            name: Some(" Joe's Coffee\n".to_string()),
            phone: Some("+1 555-0100".to_string()),
            ..Default::default()
        };
        let record = BusinessRecord::from_scraped(&fields).unwrap();
        assert_eq!(record.name, "Joe's Coffee");
        assert_eq!(record.business_type, "");
        assert_eq!(record.phone.as_deref(), Some("+1 555-0100"));
    }
}
