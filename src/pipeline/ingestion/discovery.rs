use scraper::{Html, Selector};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info, instrument};
use url::Url;

use crate::app::ports::HttpClientPort;
use crate::config::DiscoveryConfig;
use crate::error::{PipelineError, Result};
use crate::observability::metrics;
use crate::types::{ArchiveHandle, QuarterReference};

/// Walks the portal's directory listings (base -> year directories -> quarter
/// archives) and selects the most recent quarters.
pub struct ArchiveDiscovery {
    http: Arc<dyn HttpClientPort>,
    min_year: i32,
    max_year: i32,
}

impl ArchiveDiscovery {
    pub fn new(http: Arc<dyn HttpClientPort>, config: &DiscoveryConfig) -> Self {
        Self { http, min_year: config.min_year, max_year: config.max_year }
    }

    /// Returns at most `count` archives, newest first, one per quarter.
    /// Any listing that cannot be fetched aborts discovery.
    #[instrument(skip(self))]
    pub async fn discover(&self, base_url: &str, count: usize) -> Result<Vec<ArchiveHandle>> {
        let base = directory_url(base_url)?;
        let links = self.list(&base).await?;

        let mut years: Vec<(i32, Url)> = links
            .into_iter()
            .filter_map(|link| self.year_of(&link).map(|year| (year, link)))
            .collect();
        years.sort_by(|a, b| b.0.cmp(&a.0));
        debug!("Found {} year directories", years.len());

        let mut found: Vec<ArchiveHandle> = Vec::new();
        for (_, year_url) in years {
            let year_dir = directory_url(year_url.as_str())?;
            for link in self.list(&year_dir).await? {
                let Some(period) = last_segment(&link).and_then(QuarterReference::from_archive_name) else {
                    continue;
                };
                if self.in_range(period.year) {
                    found.push(ArchiveHandle { url: link.to_string(), period });
                }
            }
        }

        let selected = select_recent(found, count);
        if selected.is_empty() {
            return Err(PipelineError::NoQuarters(base_url.to_string()));
        }
        info!(
            "Selected quarters: {}",
            selected.iter().map(|h| h.period.to_string()).collect::<Vec<_>>().join(", ")
        );
        metrics::discovery::quarters_selected(selected.len());
        Ok(selected)
    }

    async fn list(&self, url: &Url) -> Result<Vec<Url>> {
        let response = self.http.get(url.as_str()).await?;
        if !response.is_success() {
            return Err(PipelineError::ListingStatus { url: url.to_string(), status: response.status });
        }
        metrics::discovery::listing_fetched();
        parse_listing(&response.text(), url)
    }

    fn year_of(&self, link: &Url) -> Option<i32> {
        let segment = last_segment(link)?;
        if segment.len() != 4 || !segment.chars().all(|c| c.is_ascii_digit()) {
            return None;
        }
        let year: i32 = segment.parse().ok()?;
        self.in_range(year).then_some(year)
    }

    fn in_range(&self, year: i32) -> bool {
        (self.min_year..=self.max_year).contains(&year)
    }
}

/// Sorts newest first, drops repeated quarters (first kept) and truncates.
pub fn select_recent(mut handles: Vec<ArchiveHandle>, count: usize) -> Vec<ArchiveHandle> {
    handles.sort_by(|a, b| b.period.cmp(&a.period));
    let mut seen = HashSet::new();
    handles.retain(|h| seen.insert(h.period));
    handles.truncate(count);
    handles
}

/// Hyperlinks on an index page, resolved against `base`, without navigation entries.
pub fn parse_listing(html: &str, base: &Url) -> Result<Vec<Url>> {
    let selector = Selector::parse("a[href]")
        .map_err(|e| PipelineError::Config(format!("Invalid listing selector: {:?}", e)))?;
    let document = Html::parse_document(html);

    let mut links = Vec::new();
    for anchor in document.select(&selector) {
        let Some(href) = anchor.value().attr("href").map(str::trim) else {
            continue;
        };
        if is_navigation(href) {
            continue;
        }
        match base.join(href) {
            Ok(url) => links.push(url),
            Err(e) => debug!("Ignoring unresolvable link '{}': {}", href, e),
        }
    }
    Ok(links)
}

fn is_navigation(href: &str) -> bool {
    matches!(href, "" | "../" | "/" | "?" | "..") || href.starts_with('?')
}

fn last_segment(url: &Url) -> Option<&str> {
    url.path_segments()?.filter(|s| !s.is_empty()).last()
}

/// Parses `raw` and makes sure relative links resolve beneath it.
fn directory_url(raw: &str) -> Result<Url> {
    let mut url = Url::parse(raw)?;
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::ports::HttpGetResult;
    use async_trait::async_trait;
    use std::collections::HashMap;

    const BASE: &str = "http://portal.test/demonstracoes_contabeis";

    struct FakeListing {
        pages: HashMap<String, (u16, String)>,
    }

    impl FakeListing {
        fn new(pages: &[(&str, u16, &str)]) -> Arc<Self> {
            Arc::new(Self {
                pages: pages
                    .iter()
                    .map(|(url, status, body)| (url.to_string(), (*status, body.to_string())))
                    .collect(),
            })
        }
    }

    #[async_trait]
    impl HttpClientPort for FakeListing {
        async fn get(&self, url: &str) -> Result<HttpGetResult> {
            let (status, body) = self.pages.get(url).cloned().unwrap_or((404, String::new()));
            Ok(HttpGetResult { status, bytes: body.into_bytes() })
        }
    }

    fn index(hrefs: &[&str]) -> String {
        let anchors: String = hrefs.iter().map(|h| format!("<a href=\"{h}\">{h}</a>\n")).collect();
        format!("<html><body><h1>Index of</h1>{anchors}</body></html>")
    }

    fn discovery(http: Arc<FakeListing>) -> ArchiveDiscovery {
        ArchiveDiscovery::new(http, &DiscoveryConfig::default())
    }

    #[test]
    fn test_parse_listing_skips_navigation() {
        let base = Url::parse("http://portal.test/dir/").unwrap();
        let html = index(&["../", "?C=N;O=D", "/", "2024/", "1T2024.zip"]);
        let links = parse_listing(&html, &base).unwrap();
        let links: Vec<_> = links.iter().map(|u| u.as_str()).collect();
        assert_eq!(links, vec!["http://portal.test/dir/2024/", "http://portal.test/dir/1T2024.zip"]);
    }

    #[test]
    fn test_select_recent_orders_dedups_and_truncates() {
        let h = |y: i32, q: u8| ArchiveHandle { url: format!("{q}T{y}"), period: QuarterReference::new(y, q).unwrap() };
        let selected = select_recent(vec![h(2024, 4), h(2025, 1), h(2025, 1), h(2023, 2), h(2025, 2)], 3);
        let periods: Vec<_> = selected.iter().map(|h| h.period.to_string()).collect();
        assert_eq!(periods, vec!["2T2025", "1T2025", "4T2024"]);
    }

    #[tokio::test]
    async fn test_discover_merges_years_and_keeps_most_recent() {
        let http = FakeListing::new(&[
            (
                "http://portal.test/demonstracoes_contabeis/",
                200,
                &index(&["../", "2024/", "2025/", "1999/", "README.txt"]),
            ),
            (
                "http://portal.test/demonstracoes_contabeis/2024/",
                200,
                &index(&["../", "3T2024.zip", "4T2024.zip", "notes.pdf"]),
            ),
            (
                "http://portal.test/demonstracoes_contabeis/2025/",
                200,
                &index(&["../", "1T2025.zip", "2t2025.ZIP", "5T2025.zip"]),
            ),
        ]);

        let handles = discovery(http).discover(BASE, 3).await.unwrap();
        let periods: Vec<_> = handles.iter().map(|h| h.period.to_string()).collect();
        assert_eq!(periods, vec!["2T2025", "1T2025", "4T2024"]);
        assert_eq!(handles[2].url, "http://portal.test/demonstracoes_contabeis/2024/4T2024.zip");
        for pair in handles.windows(2) {
            assert!(pair[0].period > pair[1].period);
        }
    }

    #[tokio::test]
    async fn test_listing_failure_is_fatal() {
        let http = FakeListing::new(&[
            ("http://portal.test/demonstracoes_contabeis/", 200, &index(&["2025/"])),
            ("http://portal.test/demonstracoes_contabeis/2025/", 503, ""),
        ]);
        let err = discovery(http).discover(BASE, 3).await.unwrap_err();
        assert!(matches!(err, PipelineError::ListingStatus { status: 503, .. }));
        assert!(err.is_fatal_precondition());
    }

    #[tokio::test]
    async fn test_no_quarters_is_fatal() {
        let http = FakeListing::new(&[
            ("http://portal.test/demonstracoes_contabeis/", 200, &index(&["2025/"])),
            ("http://portal.test/demonstracoes_contabeis/2025/", 200, &index(&["leiame.txt"])),
        ]);
        let err = discovery(http).discover(BASE, 3).await.unwrap_err();
        assert!(matches!(err, PipelineError::NoQuarters(_)));
    }
}
