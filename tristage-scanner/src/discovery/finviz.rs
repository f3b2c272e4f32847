//! Finviz screener listing scraper.
//!
//! Fetches the first result page of each configured screener URL and reads
//! the ticker column of the `styled-table-new` result table.

use async_trait::async_trait;
use scraper::{Html, Selector};
use std::collections::BTreeSet;
use std::time::Duration;
use tracing::{debug, warn};

use tristage_common::config::DiscoveryConfig;

use super::{normalize_symbol, DiscoveryError, SymbolSource};

/// Page offset appended to each listing URL (first page).
const FIRST_PAGE: &str = "1";

/// Extract tickers from a listing page.
///
/// Takes at most `max_rows` result rows; the ticker is the second cell.
/// A page without the result table yields an empty list.
pub fn parse_listing(html: &str, max_rows: usize) -> Result<Vec<String>, DiscoveryError> {
    let table_sel = Selector::parse("table.styled-table-new")
        .map_err(|e| DiscoveryError::Parse(format!("Invalid CSS selector: {:?}", e)))?;
    let row_sel = Selector::parse(r#"tr[valign="top"]"#)
        .map_err(|e| DiscoveryError::Parse(format!("Invalid CSS selector: {:?}", e)))?;
    let cell_sel = Selector::parse("td")
        .map_err(|e| DiscoveryError::Parse(format!("Invalid CSS selector: {:?}", e)))?;

    let document = Html::parse_document(html);
    let Some(table) = document.select(&table_sel).next() else {
        return Ok(Vec::new());
    };

    let symbols = table
        .select(&row_sel)
        .take(max_rows)
        .filter_map(|row| {
            let cell = row.select(&cell_sel).nth(1)?;
            normalize_symbol(&cell.text().collect::<String>())
        })
        .collect();

    Ok(symbols)
}

/// Scrapes candidate symbols from Finviz screener pages.
pub struct FinvizSource {
    urls: Vec<String>,
    max_rows: usize,
    client: reqwest::Client,
}

impl FinvizSource {
    pub fn new(urls: Vec<String>, max_rows: usize, timeout: Duration, user_agent: &str) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(user_agent)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            urls,
            max_rows,
            client,
        }
    }

    /// Create from config
    pub fn from_config(config: &DiscoveryConfig) -> Self {
        Self::new(
            config.finviz_urls.clone(),
            config.max_rows_per_page,
            Duration::from_secs(config.timeout_secs),
            &config.user_agent,
        )
    }

    async fn fetch_page(&self, url: &str) -> Result<Vec<String>, DiscoveryError> {
        let page_url = format!("{}{}", url, FIRST_PAGE);

        let response = self
            .client
            .get(&page_url)
            .send()
            .await
            .map_err(|e| DiscoveryError::Network(e.to_string()))?;

        if !response.status().is_success() {
            return Err(DiscoveryError::Network(format!("HTTP error: {}", response.status())));
        }

        let html = response
            .text()
            .await
            .map_err(|e| DiscoveryError::Network(format!("Failed to read response body: {}", e)))?;

        parse_listing(&html, self.max_rows)
    }
}

#[async_trait]
impl SymbolSource for FinvizSource {
    fn name(&self) -> &'static str {
        "finviz"
    }

    async fn discover_symbols(&self) -> Result<BTreeSet<String>, DiscoveryError> {
        let pages =
            futures::future::join_all(self.urls.iter().map(|url| self.fetch_page(url))).await;

        let mut symbols = BTreeSet::new();
        let mut last_error = None;
        let mut succeeded = 0usize;

        for (url, page) in self.urls.iter().zip(pages) {
            match page {
                Ok(found) => {
                    debug!(url = %url, count = found.len(), "Listing page parsed");
                    succeeded += 1;
                    symbols.extend(found);
                }
                Err(e) => {
                    warn!(url = %url, error = %e, "Failed to fetch listing page");
                    last_error = Some(e);
                }
            }
        }

        match last_error {
            Some(e) if succeeded == 0 => Err(e),
            _ => Ok(symbols),
        }
    }
}
