use thirtyfour::{ChromiumLikeCapabilities, DesiredCapabilities, WebDriver};

use crate::{configuration::BrowserSettings, error::CrawlError};

/// One Chrome session behind a WebDriver server, owned by a single run.
pub struct Droid {
    pub driver: WebDriver,
}

impl Droid {
    pub async fn connect(settings: &BrowserSettings) -> Result<Self, CrawlError> {
        let mut caps = DesiredCapabilities::chrome();
        if settings.headless {
            caps.set_headless()?;
        }
        caps.add_arg(&format!(
            "--window-size={},{}",
            settings.window_width, settings.window_height
        ))?;
        caps.add_arg("--lang=en-US")?;

        // chromedriver listens on 9515, selenium on 4444/wd/hub
        let driver = WebDriver::new(settings.webdriver_url.as_str(), caps)
            .await
            .map_err(|e| CrawlError::Session(e.to_string()))?;
        driver
            .set_page_load_timeout(settings.page_load_timeout())
            .await?;

        log::info!("Browser session started on {}", settings.webdriver_url);

        Ok(Droid { driver })
    }

    pub async fn quit(self) {
        if let Err(e) = self.driver.quit().await {
            log::error!("Failed to close browser session: {:?}", e);
        }
    }
}
