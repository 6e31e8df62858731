//! HTTP access to the paginated missing-person listing.

use async_trait::async_trait;
use std::time::Duration;
use tracing::{debug, trace};
use url::Url;

use crate::source::errors::SourceError;

/// Query parameter carrying the 1-based page index.
pub const PAGE_PARAM: &str = "pageIndex";

/// Query parameter carrying the number of records per page.
pub const PAGE_SIZE_PARAM: &str = "recordCountPerPage";

/// A desktop browser user agent; the listing rejects obvious bot agents.
const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
     (KHTML, like Gecko) Chrome/128.0.0.0 Safari/537.36";

/// Anything that can produce the raw HTML of a listing page.
#[async_trait]
pub trait PageSource: Send + Sync {
    async fn fetch_page(&self, page: u32) -> Result<String, SourceError>;
}

/// Client for the safe182 missing-person listing.
pub struct Safe182Client {
    http: reqwest::Client,
    list_url: Url,
    page_size: u32,
}

impl Safe182Client {
    pub fn new(
        base_url: &Url,
        list_path: &str,
        page_size: u32,
        timeout: Duration,
    ) -> Result<Self, SourceError> {
        let http = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .map_err(SourceError::Client)?;

        Ok(Self {
            http,
            list_url: base_url.join(list_path)?,
            page_size,
        })
    }

    /// The listing URL for `page`, keeping any query already on the list path.
    pub fn page_url(&self, page: u32) -> Url {
        let mut url = self.list_url.clone();
        url.query_pairs_mut()
            .append_pair(PAGE_PARAM, &page.to_string())
            .append_pair(PAGE_SIZE_PARAM, &self.page_size.to_string());
        url
    }
}

#[async_trait]
impl PageSource for Safe182Client {
    async fn fetch_page(&self, page: u32) -> Result<String, SourceError> {
        let url = self.page_url(page);
        trace!(%url, page, "Fetching listing page");

        let response = self.http.get(url).send().await.map_err(|e| {
            if e.is_timeout() {
                SourceError::Timeout { page }
            } else {
                SourceError::Request { page, source: e }
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(SourceError::Status {
                page,
                status: status.as_u16(),
            });
        }

        let body = response.text().await.map_err(|e| {
            if e.is_timeout() {
                SourceError::Timeout { page }
            } else {
                SourceError::Request { page, source: e }
            }
        })?;

        if body.trim().is_empty() {
            return Err(SourceError::EmptyBody { page });
        }

        debug!(page, bytes = body.len(), "Fetched listing page");
        Ok(body)
    }
}
