use async_trait::async_trait;
use std::time::Duration;

use crate::error::FetchError;

const USER_AGENT: &str = concat!("policy-harvest/", env!("CARGO_PKG_VERSION"));

/// Rendered markup for a page. Failure is carried in `success`, never as an error.
#[derive(Debug, Clone, Default)]
pub struct FetchedPage {
    pub success: bool,
    pub html: String,
}

impl FetchedPage {
    pub fn ok(html: impl Into<String>) -> Self {
        FetchedPage {
            success: true,
            html: html.into(),
        }
    }

    pub fn failed() -> Self {
        FetchedPage::default()
    }
}

/// Anything that can turn a URL into final page markup (a headless browser, plain HTTP, a fixture).
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> FetchedPage;
}

/// Plain HTTP GET client with a per-request timeout.
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: reqwest::Client,
    timeout: Duration,
}

impl HttpClient {
    pub fn new(timeout: Duration) -> HttpClient {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .unwrap_or_else(|e| {
                log::warn!("falling back to default http client: {:#}", e);
                reqwest::Client::new()
            });
        HttpClient { client, timeout }
    }

    /// GET `url` and return the body as text, whatever content type was declared.
    pub async fn get_text(&self, url: &str) -> Result<String, FetchError> {
        let res = self
            .client
            .get(url)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| FetchError::from_reqwest(url, e))?;

        let status = res.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        res.text().await.map_err(|e| FetchError::from_reqwest(url, e))
    }
}

#[async_trait]
impl PageFetcher for HttpClient {
    async fn fetch(&self, url: &str) -> FetchedPage {
        match self.get_text(url).await {
            Ok(html) => FetchedPage::ok(html),
            Err(e) => {
                log::warn!("error fetching page {url}, error: {:#}", e);
                FetchedPage::failed()
            }
        }
    }
}
