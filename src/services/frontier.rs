//! Crawl frontier: same-origin FIFO queue of canonical URLs.
//!
//! The frontier exclusively owns its queue and visited set for one run.
//! URLs are canonicalized before deduplication, so the visited set never
//! holds two entries for the same page.

use std::collections::{HashSet, VecDeque};
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};
use url::{Origin, Url};

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{FrontierStats, ScanBudget};

/// Query parameters dropped during canonicalization, besides `utm_*`.
const TRACKING_PARAMS: &[&str] = &[
    "gclid", "fbclid", "msclkid", "dclid", "yclid", "mc_cid", "mc_eid", "_ga", "_gl", "igshid",
    "ref_src",
];

fn is_tracking_param(key: &str, extra: &[String]) -> bool {
    let key = key.to_ascii_lowercase();
    key.starts_with("utm_")
        || TRACKING_PARAMS.contains(&key.as_str())
        || extra.iter().any(|p| p.eq_ignore_ascii_case(&key))
}

fn parse_http(raw: &str) -> DomainResult<Url> {
    let url = Url::parse(raw.trim()).map_err(|e| DomainError::InvalidUrl {
        url: raw.to_string(),
        reason: e.to_string(),
    })?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        _ => Err(DomainError::UnsupportedScheme(raw.to_string())),
    }
}

fn canonical_url(mut url: Url, extra: &[String]) -> String {
    url.set_fragment(None);
    let mut pairs: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(k, _)| !is_tracking_param(k, extra))
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    // stable: repeated keys keep their relative order
    pairs.sort_by(|a, b| a.0.cmp(&b.0));
    if pairs.is_empty() {
        url.set_query(None);
    } else {
        url.query_pairs_mut().clear().extend_pairs(&pairs);
    }
    url.to_string()
}

/// Canonical form of an absolute http(s) URL.
///
/// Lowercases scheme and host, strips the fragment, drops tracking
/// parameters and sorts the remaining query parameters by key. Idempotent.
pub fn canonicalize(raw: &str) -> DomainResult<String> {
    canonicalize_with(raw, &[])
}

/// [`canonicalize`] with additional tracking parameter names.
pub fn canonicalize_with(raw: &str, extra_tracking_params: &[String]) -> DomainResult<String> {
    Ok(canonical_url(parse_http(raw)?, extra_tracking_params))
}

/// Queue of pages to visit in one scan.
#[derive(Debug)]
pub struct CrawlFrontier {
    origin: Origin,
    queue: VecDeque<String>,
    /// Every canonical URL ever accepted, visited or not.
    discovered: HashSet<String>,
    visited: HashSet<String>,
    visit_order: Vec<String>,
    pages_visited: u32,
    pages_discovered: u32,
    max_pages: u32,
    max_unique_urls: u32,
    max_duration: Duration,
    started: Instant,
    frontier_capped: bool,
    time_exhausted: bool,
    extra_tracking_params: Vec<String>,
}

impl CrawlFrontier {
    /// Create a frontier seeded with `start`. The start URL counts as
    /// discovered.
    pub fn new(
        start: &str,
        budget: &ScanBudget,
        extra_tracking_params: &[String],
    ) -> DomainResult<Self> {
        let url = parse_http(start)?;
        let origin = url.origin();
        let canonical = canonical_url(url, extra_tracking_params);

        let mut frontier = Self {
            origin,
            queue: VecDeque::new(),
            discovered: HashSet::new(),
            visited: HashSet::new(),
            visit_order: Vec::new(),
            pages_visited: 0,
            pages_discovered: 0,
            max_pages: budget.max_pages,
            max_unique_urls: budget.max_unique_urls,
            max_duration: budget.max_scan_duration(),
            started: Instant::now(),
            frontier_capped: false,
            time_exhausted: false,
            extra_tracking_params: extra_tracking_params.to_vec(),
        };
        frontier.accept(canonical);
        Ok(frontier)
    }

    fn accept(&mut self, canonical: String) {
        self.discovered.insert(canonical.clone());
        self.queue.push_back(canonical);
        self.pages_discovered += 1;
    }

    /// Pop the next URL to visit, or `None` when the queue is empty or the
    /// page or time budget is spent.
    pub fn next(&mut self) -> Option<String> {
        self.next_at(Instant::now())
    }

    /// [`Self::next`] evaluated at an explicit instant.
    pub fn next_at(&mut self, now: Instant) -> Option<String> {
        if now.saturating_duration_since(self.started) >= self.max_duration {
            if !self.time_exhausted {
                warn!(
                    pages_visited = self.pages_visited,
                    queued = self.queue.len(),
                    "scan duration exhausted"
                );
            }
            self.time_exhausted = true;
            return None;
        }
        if self.pages_visited >= self.max_pages {
            debug!(max_pages = self.max_pages, "page budget reached");
            return None;
        }
        while let Some(url) = self.queue.pop_front() {
            if self.visited.insert(url.clone()) {
                self.pages_visited += 1;
                self.visit_order.push(url.clone());
                info!(url = %url, visited = self.pages_visited, "visiting page");
                return Some(url);
            }
        }
        None
    }

    /// Queue an absolute URL. Returns `false` for invalid, non-http(s),
    /// cross-origin or already-seen URLs, and once the unique URL cap is hit.
    pub fn add(&mut self, raw: &str) -> bool {
        let Ok(url) = parse_http(raw) else {
            return false;
        };
        if url.origin() != self.origin {
            return false;
        }
        let canonical = canonical_url(url, &self.extra_tracking_params);
        if self.discovered.contains(&canonical) {
            return false;
        }
        if self.pages_discovered >= self.max_unique_urls {
            if !self.frontier_capped {
                warn!(max_unique_urls = self.max_unique_urls, "frontier capped");
            }
            self.frontier_capped = true;
            return false;
        }
        debug!(url = %canonical, "queued");
        self.accept(canonical);
        true
    }

    /// Resolve `href` against `base` and queue it. Fragment-only and
    /// non-navigational hrefs are ignored.
    pub fn add_relative(&mut self, base: &str, href: &str) -> bool {
        let href = href.trim();
        if href.is_empty() || href.starts_with('#') {
            return false;
        }
        let Ok(base) = Url::parse(base) else {
            return false;
        };
        match base.join(href) {
            Ok(resolved) => self.add(resolved.as_str()),
            Err(_) => false,
        }
    }

    pub fn canonicalize(&self, raw: &str) -> DomainResult<String> {
        canonicalize_with(raw, &self.extra_tracking_params)
    }

    /// Whether `raw` is an http(s) URL on the start origin.
    pub fn is_same_origin(&self, raw: &str) -> bool {
        parse_http(raw).is_ok_and(|url| url.origin() == self.origin)
    }

    pub fn pages_visited(&self) -> u32 {
        self.pages_visited
    }

    pub fn pages_discovered(&self) -> u32 {
        self.pages_discovered
    }

    pub fn queued(&self) -> usize {
        self.queue.len()
    }

    pub fn is_capped(&self) -> bool {
        self.frontier_capped
    }

    pub fn is_time_exhausted(&self) -> bool {
        self.time_exhausted
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    pub fn stats(&self) -> FrontierStats {
        FrontierStats {
            pages_visited: self.pages_visited,
            pages_discovered: self.pages_discovered,
            frontier_capped: self.frontier_capped,
            time_exhausted: self.time_exhausted,
            visited: self.visit_order.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::{BudgetOverrides, BudgetProfile};

    fn budget(max_pages: u32, max_unique_urls: u32) -> ScanBudget {
        ScanBudget::build(
            BudgetProfile::Standard,
            &BudgetOverrides {
                max_pages: Some(max_pages),
                max_unique_urls: Some(max_unique_urls),
                ..Default::default()
            },
        )
        .unwrap()
    }

    #[test]
    fn test_canonicalize_normalizes() {
        assert_eq!(
            canonicalize("HTTPS://Example.COM/Path?b=2&a=1&utm_source=x#frag").unwrap(),
            "https://example.com/Path?a=1&b=2"
        );
        assert_eq!(
            canonicalize("https://example.com/?gclid=abc").unwrap(),
            "https://example.com/"
        );
    }

    #[test]
    fn test_canonicalize_is_idempotent() {
        let once = canonicalize("https://a.test/s?q=hello world&z=%2F&a=1").unwrap();
        assert_eq!(canonicalize(&once).unwrap(), once);
    }

    #[test]
    fn test_canonicalize_rejects_other_schemes() {
        assert!(matches!(
            canonicalize("mailto:a@b.test"),
            Err(DomainError::UnsupportedScheme(_))
        ));
        assert!(matches!(
            canonicalize("not a url"),
            Err(DomainError::InvalidUrl { .. })
        ));
    }

    #[test]
    fn test_extra_tracking_params() {
        let extra = vec!["session".to_string()];
        assert_eq!(
            canonicalize_with("https://a.test/?Session=1&x=2", &extra).unwrap(),
            "https://a.test/?x=2"
        );
    }

    #[test]
    fn test_unique_url_cap() {
        let mut frontier = CrawlFrontier::new("https://a.test/", &budget(20, 3), &[]).unwrap();
        assert!(frontier.add("https://a.test/one"));
        assert!(frontier.add("https://a.test/two"));
        assert!(!frontier.add("https://a.test/three"));
        assert!(frontier.is_capped());
        assert_eq!(frontier.pages_discovered(), 3);
    }

    #[test]
    fn test_same_origin_check() {
        let frontier = CrawlFrontier::new("https://a.test/", &budget(20, 100), &[]).unwrap();
        assert!(frontier.is_same_origin("https://A.test/cart?x=1"));
        assert!(!frontier.is_same_origin("https://b.test/cart"));
        assert!(!frontier.is_same_origin("mailto:x@a.test"));
    }

    #[test]
    fn test_rejects_cross_origin_and_duplicates() {
        let mut frontier = CrawlFrontier::new("https://a.test/", &budget(20, 100), &[]).unwrap();
        assert!(!frontier.add("https://b.test/"));
        assert!(!frontier.add("http://a.test/"));
        assert!(!frontier.add("https://a.test/#top"));
        assert!(frontier.add("https://a.test/x?b=1&a=2"));
        assert!(!frontier.add("https://a.test/x?a=2&b=1&utm_medium=e"));
        assert!(!frontier.is_capped());
    }

    #[test]
    fn test_fifo_order_and_page_cap() {
        let mut frontier = CrawlFrontier::new("https://a.test/", &budget(2, 100), &[]).unwrap();
        frontier.add("https://a.test/b");
        frontier.add("https://a.test/c");

        assert_eq!(frontier.next().as_deref(), Some("https://a.test/"));
        assert_eq!(frontier.next().as_deref(), Some("https://a.test/b"));
        assert_eq!(frontier.next(), None);
        assert_eq!(frontier.stats().visited.len(), 2);
    }

    #[test]
    fn test_scan_duration_preempts_next() {
        let mut frontier = CrawlFrontier::new("https://a.test/", &budget(20, 100), &[]).unwrap();
        let later = Instant::now() + Duration::from_secs(3_600);
        assert_eq!(frontier.next_at(later), None);
        assert!(frontier.is_time_exhausted());
        assert_eq!(frontier.queued(), 1);
    }

    #[test]
    fn test_add_relative() {
        let mut frontier = CrawlFrontier::new("https://a.test/", &budget(20, 100), &[]).unwrap();
        assert!(frontier.add_relative("https://a.test/docs/", "intro"));
        assert!(!frontier.add_relative("https://a.test/docs/", "#section"));
        assert!(!frontier.add_relative("https://a.test/docs/", "javascript:void(0)"));
        assert!(!frontier.add_relative("https://a.test/docs/", "tel:+100"));
        assert_eq!(frontier.next().as_deref(), Some("https://a.test/"));
        assert_eq!(frontier.next().as_deref(), Some("https://a.test/docs/intro"));
    }
}
