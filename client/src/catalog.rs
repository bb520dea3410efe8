use crate::{client::status_error, Client, Result};
use livedrop_types::catalog::{parse_feed, CatalogEntry};
use tracing::debug;
use url::Url;

/// Public case feed.
pub const DEFAULT_CASES_URL: &str =
    "https://raw.githubusercontent.com/ByMykel/CSGO-API/main/public/api/en/crates.json";

/// Public skin feed.
pub const DEFAULT_SKINS_URL: &str =
    "https://raw.githubusercontent.com/ByMykel/CSGO-API/main/public/api/en/skins.json";

/// Both catalog feeds, validated.
#[derive(Clone, Debug, Default)]
pub struct CatalogFeeds {
    pub cases: Vec<CatalogEntry>,
    pub skins: Vec<CatalogEntry>,
}

impl Client {
    /// Fetch one feed document. Feeds are third-party, so no credential is sent.
    async fn fetch_feed(&self, url: &str) -> Result<Vec<CatalogEntry>> {
        let url = Url::parse(url)?;
        let response = self.http_client.get(url.clone()).send().await?;
        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(status_error(status, &text));
        }
        let document = response.json::<serde_json::Value>().await?;
        let entries = parse_feed(document);
        debug!(%url, entries = entries.len(), "fetched catalog feed");
        Ok(entries)
    }

    /// Fetch the case and skin feeds concurrently.
    pub async fn fetch_catalog(&self, cases_url: &str, skins_url: &str) -> Result<CatalogFeeds> {
        let (cases, skins) =
            futures::try_join!(self.fetch_feed(cases_url), self.fetch_feed(skins_url))?;
        Ok(CatalogFeeds { cases, skins })
    }
}
