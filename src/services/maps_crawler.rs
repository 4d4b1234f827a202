use std::{
    collections::{HashMap, HashSet, VecDeque},
    time::Duration,
};

use async_trait::async_trait;
use thirtyfour::{prelude::ElementQueryable, By, WebDriver, WebElement};

use crate::{
    configuration::BrowserSettings,
    domain::{contact, ListingDetail, ListingReference, ScrapedFields, SearchQuery},
    error::CrawlError,
};

use super::ListingSource;

const SEARCH_BOX: &str = "input#searchboxinput";
const SEARCH_BUTTON: &str = "button#searchbox-searchbutton";
const RESULTS_PANE: &str = r#"div[role="main"]"#;
const RESULTS_FEED: &str = r#"div[role="main"] div[aria-label][tabindex="0"]"#;
const RESULT_CARDS: &str = r#".Nv2PK, div[role="article"], .hfpxzc"#;
const DETAIL_HEADING: &str = "h1, .fontHeadlineLarge, .DUwDvf";

const NAME_SELECTOR: &str = r#"h1.DUwDvf, h1, .fontHeadlineLarge, [data-item-id="title"]"#;
const CATEGORY_SELECTOR: &str = r#"button[jsaction*="category"], .skqShb"#;
const ADDRESS_SELECTOR: &str = r#"[data-item-id="address"], .rogA2c, .LrzXr"#;
const PHONE_SELECTOR: &str = r#"[data-item-id^="phone"], .UsdlK"#;
const WEBSITE_SELECTOR: &str = r#"a[data-item-id="authority"], a[aria-label*="Website"]"#;
const MAILTO_SELECTOR: &str = r#"a[href^="mailto:"]"#;

const POLL_INTERVAL: Duration = Duration::from_millis(250);
const DETAIL_SETTLE: Duration = Duration::from_millis(200);

const SCROLL_FEED_SCRIPT: &str = r#"
    const feed = document.querySelector(arguments[0]);
    if (!feed) { return false; }
    feed.scrollTo(0, feed.scrollHeight);
    return true;
"#;

/// Walks the result list of one Google Maps search.
///
/// Cards are discovered in batches; once a batch is used up the results feed
/// is scrolled to make the page load more. The walk ends after
/// `max_listings` references or `max_idle_scrolls` scrolls in a row that
/// turned up nothing new.
pub struct MapsCrawler<'a> {
    driver: &'a WebDriver,
    settings: BrowserSettings,
    cards: CardQueue<WebElement>,
    pending: HashMap<String, WebElement>,
}

/// Bookkeeping for the result walk: which card ids were already offered,
/// what is waiting to be handed out and when to stop.
struct CardQueue<T> {
    seen: HashSet<String>,
    queue: VecDeque<(ListingReference, T)>,
    yielded: usize,
    idle_scrolls: u32,
    max_listings: usize,
    max_idle_scrolls: u32,
}

impl<T> CardQueue<T> {
    fn new(max_listings: usize, max_idle_scrolls: u32) -> Self {
        CardQueue {
            seen: HashSet::new(),
            queue: VecDeque::new(),
            yielded: 0,
            idle_scrolls: 0,
            max_listings,
            max_idle_scrolls,
        }
    }

    /// Queues the cards whose id was never offered before, in list order.
    /// Returns how many were new; any new card resets the idle count.
    fn offer(&mut self, cards: impl IntoIterator<Item = (String, T)>) -> usize {
        let mut found = 0;

        for (position, (card_id, card)) in cards.into_iter().enumerate() {
            if !self.seen.insert(card_id.clone()) {
                continue;
            }
            self.queue
                .push_back((ListingReference { card_id, position }, card));
            found += 1;
        }

        if found > 0 {
            self.idle_scrolls = 0;
        }
        found
    }

    fn next(&mut self) -> Option<(ListingReference, T)> {
        if self.limit_reached() {
            return None;
        }
        let next = self.queue.pop_front()?;
        self.yielded += 1;
        Some(next)
    }

    fn note_idle_scroll(&mut self) {
        self.idle_scrolls += 1;
    }

    fn limit_reached(&self) -> bool {
        self.yielded >= self.max_listings
    }

    fn out_of_scrolls(&self) -> bool {
        self.queue.is_empty() && self.idle_scrolls >= self.max_idle_scrolls
    }
}

impl<'a> MapsCrawler<'a> {
    /// Runs the search and waits for the result pane.
    pub async fn open(
        driver: &'a WebDriver,
        settings: &BrowserSettings,
        query: &SearchQuery,
    ) -> Result<MapsCrawler<'a>, CrawlError> {
        log::info!("Opening Google Maps for query: {}", query);

        driver
            .goto(settings.maps_url.as_str())
            .await
            .map_err(|e| CrawlError::navigation(&settings.maps_url, e))?;

        let search_box = wait_for(driver, SEARCH_BOX, settings.element_timeout()).await?;
        search_box.send_keys(query.as_str()).await?;

        driver
            .find(By::Css(SEARCH_BUTTON))
            .await
            .map_err(|_| CrawlError::selector_not_found(SEARCH_BUTTON))?
            .click()
            .await?;

        wait_for(driver, RESULTS_PANE, settings.element_timeout()).await?;
        log::info!("Waiting for results to load...");
        tokio::time::sleep(settings.settle_delay()).await;

        Ok(MapsCrawler {
            driver,
            settings: settings.clone(),
            cards: CardQueue::new(settings.max_listings, settings.max_idle_scrolls),
            pending: HashMap::new(),
        })
    }

    async fn collect_new_cards(&mut self) -> Result<usize, CrawlError> {
        let cards = self.driver.find_all(By::Css(RESULT_CARDS)).await?;
        let mut identified = Vec::with_capacity(cards.len());
        for (position, card) in cards.into_iter().enumerate() {
            identified.push((card_identity(&card, position).await, card));
        }

        let found = self.cards.offer(identified);
        log::debug!("Found {} new result cards", found);
        Ok(found)
    }

    async fn scroll_feed(&self) {
        let scrolled = self
            .driver
            .execute(SCROLL_FEED_SCRIPT, vec![serde_json::json!(RESULTS_FEED)])
            .await
            .map(|ret| ret.json().as_bool().unwrap_or(false))
            .unwrap_or(false);

        if !scrolled {
            if let Err(e) = self
                .driver
                .execute("window.scrollBy(0, 5000);", Vec::new())
                .await
            {
                log::warn!("Could not scroll the result list: {:?}", e);
            }
        }

        tokio::time::sleep(self.settings.scroll_pause()).await;
    }

    async fn page_text(&self) -> Result<String, CrawlError> {
        let ret = self
            .driver
            .execute("return document.body.innerText;", Vec::new())
            .await?;
        Ok(ret.json().as_str().unwrap_or_default().to_string())
    }

    async fn first_text(&self, selector: &str) -> Option<String> {
        let elements = self.driver.find_all(By::Css(selector)).await.ok()?;
        for element in elements {
            if let Ok(text) = element.text().await {
                let text = text.trim();
                if !text.is_empty() {
                    return Some(text.to_string());
                }
            }
        }
        None
    }

    async fn first_attr(&self, selector: &str, attr: &str) -> Option<String> {
        let element = self.driver.find(By::Css(selector)).await.ok()?;
        element.attr(attr).await.ok().flatten()
    }

    async fn scrape_fields(&self, text: &str) -> ScrapedFields {
        let phone = match self.first_text(PHONE_SELECTOR).await {
            Some(phone) => Some(phone),
            None => contact::find_phone(text),
        };
        let website = match self.first_attr(WEBSITE_SELECTOR, "href").await {
            Some(href) => Some(href),
            None => self.first_text(WEBSITE_SELECTOR).await,
        };
        let email = match self.first_attr(MAILTO_SELECTOR, "href").await {
            Some(href) => contact::strip_mailto(&href),
            None => contact::find_email(text),
        };

        ScrapedFields {
            name: self.first_text(NAME_SELECTOR).await,
            business_type: self.first_text(CATEGORY_SELECTOR).await,
            address: self.first_text(ADDRESS_SELECTOR).await,
            phone,
            email,
            website,
        }
    }
}

#[async_trait]
impl ListingSource for MapsCrawler<'_> {
    async fn next_listing(&mut self) -> Result<Option<ListingReference>, CrawlError> {
        loop {
            if self.cards.limit_reached() {
                log::info!(
                    "Reached the extraction limit of {} listings",
                    self.settings.max_listings
                );
                return Ok(None);
            }

            if let Some((reference, card)) = self.cards.next() {
                self.pending.insert(reference.card_id.clone(), card);
                return Ok(Some(reference));
            }

            if self.cards.out_of_scrolls() {
                log::info!("No more new cards found after scrolling");
                return Ok(None);
            }

            if self.collect_new_cards().await? == 0 {
                self.scroll_feed().await;
                self.cards.note_idle_scroll();
            }
        }
    }

    async fn materialize(&mut self, listing: &ListingReference) -> Result<ListingDetail, CrawlError> {
        let card = self
            .pending
            .remove(&listing.card_id)
            .ok_or_else(|| CrawlError::selector_not_found(format!("card {}", listing.card_id)))?;

        if let Err(e) = card.scroll_into_view().await {
            log::debug!("Could not scroll card {} into view: {:?}", listing.card_id, e);
        }
        card.click().await?;

        wait_for(self.driver, DETAIL_HEADING, self.settings.element_timeout()).await?;
        tokio::time::sleep(DETAIL_SETTLE).await;

        Ok(ListingDetail {
            reference: listing.clone(),
            text: self.page_text().await?,
        })
    }

    async fn scrape_fallback(&mut self, detail: &ListingDetail) -> ScrapedFields {
        log::debug!("Reading page fields for listing {}", detail.reference.card_id);
        self.scrape_fields(&detail.text).await
    }
}

async fn wait_for(
    driver: &WebDriver,
    selector: &str,
    timeout: Duration,
) -> Result<WebElement, CrawlError> {
    driver
        .query(By::Css(selector))
        .wait(timeout, POLL_INTERVAL)
        .first()
        .await
        .map_err(|_| CrawlError::timeout(selector))
}

/// Stable id for a result card: the result index Google attaches when it
/// does, else the card's label or link, else its position in the list.
async fn card_identity(card: &WebElement, position: usize) -> String {
    for attr in ["data-result-index", "aria-label", "href"] {
        if let Ok(Some(value)) = card.attr(attr).await {
            if !value.trim().is_empty() {
                return value;
            }
        }
    }
    position.to_string()
}
