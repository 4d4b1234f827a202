use std::sync::LazyLock;

use regex::Regex;

static PHONE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\+?\d[\d\s\-().]{8,}\d").expect("valid phone regex"));
static EMAIL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[\w.\-]+@[\w.\-]+\.\w+").expect("valid email regex"));
static GMAIL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)[\w.\-]+@gmail\.com").expect("valid gmail regex"));

/// First phone-number-looking run of digits in `text`.
pub fn find_phone(text: &str) -> Option<String> {
    PHONE.find(text).map(|m| m.as_str().trim().to_string())
}

pub fn find_email(text: &str) -> Option<String> {
    EMAIL.find(text).map(|m| m.as_str().to_string())
}

pub fn find_gmail(text: &str) -> Option<String> {
    GMAIL.find(text).map(|m| m.as_str().to_string())
}

/// `mailto:` hrefs carry the address plus optional query parameters.
pub fn strip_mailto(href: &str) -> Option<String> {
    let address = href.strip_prefix("mailto:")?;
    let address = address.split('?').next().unwrap_or("").trim();
    match address.is_empty() {
        true => None,
        false => Some(address.to_string()),
    }
}
