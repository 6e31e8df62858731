//! Walking the listing past its first page.

use html_scraper::{Html, Selector};
use std::sync::LazyLock;
use std::time::Duration;
use tracing::{debug, warn};

use crate::data::models::CandidateRecord;
use crate::source::client::PageSource;

static ANCHOR_SELECTOR: LazyLock<Selector> = LazyLock::new(|| Selector::parse("a").unwrap());

/// Highest page number the listing advertises in its pagination links.
///
/// Only anchors whose `href` mentions `page_param` are pagination links. For
/// those, both the query value (`?pageIndex=7`) and purely numeric link text
/// count. Returns 1 when nothing is found.
pub fn discover_page_count(html: &str, page_param: &str) -> u32 {
    let document = Html::parse_document(html);
    let needle = format!("{page_param}=");

    document
        .select(&ANCHOR_SELECTOR)
        .filter_map(|anchor| {
            let href = anchor.attr("href")?;
            if !href.contains(page_param) {
                return None;
            }
            let from_href = href.find(&needle).and_then(|pos| {
                let digits: String = href[pos + needle.len()..]
                    .chars()
                    .take_while(|c| c.is_ascii_digit())
                    .collect();
                digits.parse::<u32>().ok()
            });
            let text = anchor.text().collect::<String>();
            let from_text = text.trim().parse::<u32>().ok();
            from_href.into_iter().chain(from_text).max()
        })
        .max()
        .unwrap_or(1)
        .max(1)
}

/// Result of walking pages 2..=N after the first page was handled.
#[derive(Debug, Default)]
pub struct Harvest {
    /// Page numbers that were fetched successfully.
    pub pages: Vec<u32>,
    pub failed_pages: Vec<u32>,
    /// Page count advertised by the first page, before capping.
    pub discovered: u32,
    pub records: Vec<CandidateRecord>,
}

/// Bounded, paced walk over subsequent listing pages.
#[derive(Debug, Clone, Copy)]
pub struct Paginator {
    page_cap: u32,
    delay: Duration,
}

impl Paginator {
    pub fn new(page_cap: u32, delay: Duration) -> Self {
        Self {
            page_cap: page_cap.max(1),
            delay,
        }
    }

    pub fn last_page(&self, discovered: u32) -> u32 {
        discovered.clamp(1, self.page_cap)
    }

    /// Fetch pages `2..=min(discovered, cap)` with `delay` before each one and
    /// feed their bodies to `extract`. A page that fails to fetch is logged
    /// and skipped.
    pub async fn harvest<F>(
        &self,
        source: &dyn PageSource,
        first_page: &str,
        page_param: &str,
        mut extract: F,
    ) -> Harvest
    where
        F: FnMut(u32, &str) -> Vec<CandidateRecord>,
    {
        let discovered = discover_page_count(first_page, page_param);
        let last = self.last_page(discovered);
        debug!(discovered, last, "Planned listing walk");

        let mut harvest = Harvest {
            discovered,
            ..Harvest::default()
        };

        for page in 2..=last {
            tokio::time::sleep(self.delay).await;

            match source.fetch_page(page).await {
                Ok(body) => {
                    let records = extract(page, &body);
                    debug!(page, count = records.len(), "Harvested page");
                    harvest.records.extend(records);
                    harvest.pages.push(page);
                }
                Err(e) => {
                    warn!(page, error = ?e, "Failed to fetch listing page, skipping");
                    harvest.failed_pages.push(page);
                }
            }
        }

        harvest
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::client::PAGE_PARAM;
    use crate::source::errors::SourceError;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use tokio::time::Instant;

    struct Scripted {
        failing: Vec<u32>,
        calls: Mutex<Vec<u32>>,
    }

    impl Scripted {
        fn new(failing: Vec<u32>) -> Self {
            Self {
                failing,
                calls: Mutex::new(Vec::new()),
            }
        }

        fn calls(&self) -> Vec<u32> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl PageSource for Scripted {
        async fn fetch_page(&self, page: u32) -> Result<String, SourceError> {
            self.calls.lock().unwrap().push(page);
            if self.failing.contains(&page) {
                Err(SourceError::Status { page, status: 503 })
            } else {
                Ok(format!("<p>page {page}</p>"))
            }
        }
    }

    fn pager(count: u32) -> String {
        (1..=count)
            .map(|n| format!(r#"<a href="?pageIndex={n}">{n}</a>"#))
            .collect()
    }

    // --- discovery ---

    #[test]
    fn test_discover_from_href() {
        let html = r#"<a href="/list.do?pageIndex=1">처음</a><a href="/list.do?pageIndex=14">끝</a>"#;
        assert_eq!(discover_page_count(html, PAGE_PARAM), 14);
    }

    #[test]
    fn test_discover_from_text() {
        let html = r#"<div class="paging">
            <a href="javascript:linkPage('pageIndex', 1)">1</a>
            <a href="javascript:linkPage('pageIndex', 2)">2</a>
            <a href="javascript:linkPage('pageIndex', 5)">5</a>
        </div>"#;
        assert_eq!(discover_page_count(html, PAGE_PARAM), 5);
    }

    #[test]
    fn test_discover_ignores_unrelated_numeric_links() {
        let html = r##"<a href="tel:182">182</a><a href="/archive/2024">2024</a>
            <a href="#">9</a><a href="/list.do?pageIndex=1">1</a>"##;
        assert_eq!(discover_page_count(html, PAGE_PARAM), 1);
    }

    #[test]
    fn test_discover_defaults_to_one() {
        assert_eq!(discover_page_count("<p>no paging</p>", PAGE_PARAM), 1);
        assert_eq!(discover_page_count("", PAGE_PARAM), 1);
        assert_eq!(
            discover_page_count(r#"<a href="?pageIndex=0">0</a>"#, PAGE_PARAM),
            1
        );
    }

    #[test]
    fn test_last_page_is_capped() {
        let paginator = Paginator::new(3, Duration::from_millis(500));
        assert_eq!(paginator.last_page(10), 3);
        assert_eq!(paginator.last_page(2), 2);
        assert_eq!(paginator.last_page(0), 1);
    }

    // --- harvest ---

    #[tokio::test(start_paused = true)]
    async fn test_harvest_respects_cap_and_delay() {
        let source = Scripted::new(vec![]);
        let paginator = Paginator::new(3, Duration::from_millis(500));

        let started = Instant::now();
        let harvest = paginator
            .harvest(&source, &pager(10), PAGE_PARAM, |_, _| Vec::new())
            .await;

        assert_eq!(source.calls(), vec![2, 3]);
        assert_eq!(harvest.pages, vec![2, 3]);
        assert_eq!(harvest.discovered, 10);
        assert!(started.elapsed() >= Duration::from_millis(1000));
        assert!(started.elapsed() < Duration::from_millis(1100));
    }

    #[tokio::test(start_paused = true)]
    async fn test_single_page_fetches_nothing_more() {
        let source = Scripted::new(vec![]);
        let paginator = Paginator::new(3, Duration::from_millis(500));

        let started = Instant::now();
        let harvest = paginator
            .harvest(&source, "<p>only</p>", PAGE_PARAM, |_, _| Vec::new())
            .await;

        assert!(source.calls().is_empty());
        assert!(harvest.pages.is_empty());
        assert_eq!(started.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_page_does_not_stop_walk() {
        let source = Scripted::new(vec![2]);
        let paginator = Paginator::new(3, Duration::from_millis(500));

        let mut seen = Vec::new();
        let harvest = paginator
            .harvest(&source, &pager(3), PAGE_PARAM, |page, _| {
                seen.push(page);
                Vec::new()
            })
            .await;

        assert_eq!(source.calls(), vec![2, 3]);
        assert_eq!(harvest.failed_pages, vec![2]);
        assert_eq!(harvest.pages, vec![3]);
        assert_eq!(seen, vec![3]);
    }
}
