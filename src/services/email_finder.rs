use async_trait::async_trait;
use reqwest::Client;
use scraper::{Html, Selector};

use crate::{configuration::EmailLookupSettings, domain::contact};

use super::ContactFinder;

/// Looks for a Gmail address on a business website.
pub struct EmailFinder {
    client: Client,
}

impl EmailFinder {
    pub fn new(settings: &EmailLookupSettings) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(settings.timeout())
            .cookie_store(true)
            .build()?;

        Ok(EmailFinder { client })
    }

    async fn fetch(&self, url: &str) -> Result<String, reqwest::Error> {
        self.client
            .get(url)
            .header(reqwest::header::USER_AGENT, fake_user_agent::get_rua())
            .send()
            .await?
            .error_for_status()?
            .text()
            .await
    }
}

#[async_trait]
impl ContactFinder for EmailFinder {
    async fn find_email(&self, website: &str) -> Option<String> {
        match self.fetch(website).await {
            Ok(html) => find_gmail_in_html(&html),
            Err(e) => {
                log::warn!("Error visiting {}: {:?}", website, e);
                None
            }
        }
    }
}

/// Contact links are checked first, then the whole page text.
pub fn find_gmail_in_html(html: &str) -> Option<String> {
    let document = Html::parse_document(html);
    let a_tag_selector = Selector::parse("a").expect("valid anchor selector");

    let from_contact_links = document
        .select(&a_tag_selector)
        .filter(|a| {
            let text: String = a.text().collect();
            text.to_lowercase().contains("contact")
        })
        .find_map(|a| {
            let text: String = a.text().collect();
            contact::find_gmail(&text).or_else(|| {
                a.value()
                    .attr("href")
                    .and_then(contact::strip_mailto)
                    .and_then(|address| contact::find_gmail(&address))
            })
        });

    from_contact_links.or_else(|| {
        let body_text: String = document.root_element().text().collect::<Vec<_>>().join(" ");
        contact::find_gmail(&body_text)
    })
}
