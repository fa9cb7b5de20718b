use crate::parser::{ParseError, parse_form_result, parse_preform, parse_treemap, prepare_form};
use crate::types::{AttendanceRecord, FormRequest};
use crate::utils::DateWindow;

use futures::StreamExt;
use futures::stream::FuturesUnordered;
use reqwest::Client;
use reqwest::header::CONTENT_TYPE;
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum ScraperError {
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),
    #[error("Parse error: {0}")]
    ParseError(#[from] ParseError),
    #[error("Form request to {0} does not name a legislature and chamber")]
    MissingQuery(String),
}

#[derive(Debug, Clone)]
pub struct WebScraper {
    client: Client,
}

impl WebScraper {
    pub fn new() -> Result<Self, ScraperError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent(format!(
                "{}/{}",
                env!("CARGO_PKG_NAME"),
                env!("CARGO_PKG_VERSION")
            ))
            .build()?;

        Ok(Self { client })
    }

    /// Follows the whole chain from the index page and returns every
    /// attendance record within `window`. Pages that fail to load or parse
    /// are logged and skipped.
    pub async fn crawl(
        &self,
        index_url: &str,
        window: &DateWindow,
    ) -> Result<Vec<AttendanceRecord>, ScraperError> {
        let chamber_urls = self.fetch_treemap(index_url).await?;
        log::info!("Found {} chamber page(s)", chamber_urls.len());

        let mut records = Vec::new();

        for chamber_url in &chamber_urls {
            let form_urls = match self.fetch_preform(chamber_url).await {
                Ok(urls) => urls,
                Err(e) => {
                    log::warn!("Failed to fetch chamber page {}: {}", chamber_url, e);
                    continue;
                }
            };

            for form_url in &form_urls {
                let requests = match self.fetch_forms(form_url, window).await {
                    Ok(requests) => requests,
                    Err(e) => {
                        log::warn!("Skipping form page {}: {}", form_url, e);
                        continue;
                    }
                };

                if requests.is_empty() {
                    continue;
                }

                log::info!(
                    "Submitting {} form request(s) from {}",
                    requests.len(),
                    form_url
                );

                let mut futures: FuturesUnordered<_> = requests
                    .iter()
                    .map(|request| async move { (request, self.submit_form(request).await) })
                    .collect();

                while let Some((request, result)) = futures.next().await {
                    match result {
                        Ok(found) => records.extend(found),
                        Err(e) => log::warn!("Failed to submit {}: {}", request, e),
                    }
                }
            }
        }

        log::info!("Collected {} attendance record(s)", records.len());

        Ok(records)
    }

    pub async fn fetch_treemap(&self, url: &str) -> Result<Vec<String>, ScraperError> {
        log::info!("Fetching attendance index: {}", url);
        let html = self.get_html(url).await?;
        Ok(parse_treemap(&html, url)?)
    }

    pub async fn fetch_preform(&self, url: &str) -> Result<Vec<String>, ScraperError> {
        log::info!("Fetching chamber page: {}", url);
        let html = self.get_html(url).await?;
        Ok(parse_preform(&html, url)?)
    }

    pub async fn fetch_forms(
        &self,
        url: &str,
        window: &DateWindow,
    ) -> Result<Vec<FormRequest>, ScraperError> {
        log::info!("Fetching query form: {}", url);
        let html = self.get_html(url).await?;
        Ok(prepare_form(&html, url, window)?)
    }

    pub async fn submit_form(
        &self,
        request: &FormRequest,
    ) -> Result<Vec<AttendanceRecord>, ScraperError> {
        let query = request
            .query()
            .ok_or_else(|| ScraperError::MissingQuery(request.url.clone()))?;

        log::debug!("Submitting {}", request);

        let html = self
            .client
            .post(&request.url)
            .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(request.encoded_body())
            .send()
            .await
            .inspect_err(|e| log::error!("HTTP error: {e:?}"))?
            .error_for_status()?
            .text()
            .await
            .inspect_err(|e| log::error!("Decode error: {e:?}"))?;

        Ok(parse_form_result(&html, &request.url, &query)?)
    }

    async fn get_html(&self, url: &str) -> Result<String, ScraperError> {
        Ok(self
            .client
            .get(url)
            .send()
            .await
            .inspect_err(|e| log::error!("HTTP error: {e:?}"))?
            .error_for_status()?
            .text()
            .await
            .inspect_err(|e| log::error!("Decode error: {e:?}"))?)
    }
}
