//! Page-content signals. One bounded fetch, then DOM counts; every failure
//! collapses to the all-default record with `fetched = false`.

use crate::core::suffix::SuffixList;
use crate::domain::model::ContentFeatures;
use crate::domain::ports::PageFetcher;
use once_cell::sync::Lazy;
use scraper::{Html, Selector};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;
use url::Url;

pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(3);

fn selector(css: &str) -> Selector {
    Selector::parse(css).expect("static selector must parse")
}

static FORM: Lazy<Selector> = Lazy::new(|| selector("form"));
static ANCHOR: Lazy<Selector> = Lazy::new(|| selector("a"));
static SCRIPT: Lazy<Selector> = Lazy::new(|| selector("script"));
static IMAGE: Lazy<Selector> = Lazy::new(|| selector("img"));

/// (selector, attribute) pairs that pull in sub-resources.
static RESOURCES: Lazy<Vec<(Selector, &'static str)>> = Lazy::new(|| {
    [
        ("img[src]", "src"),
        ("script[src]", "src"),
        ("link[href]", "href"),
        ("audio[src]", "src"),
        ("video[src]", "src"),
        ("source[src]", "src"),
        ("embed[src]", "src"),
    ]
    .into_iter()
    .map(|(css, attr)| (selector(css), attr))
    .collect()
});

#[derive(Clone)]
pub struct ContentExtractor {
    fetcher: Arc<dyn PageFetcher>,
    suffixes: Arc<SuffixList>,
    timeout: Duration,
}

impl ContentExtractor {
    pub fn new(fetcher: Arc<dyn PageFetcher>, suffixes: Arc<SuffixList>, timeout: Duration) -> Self {
        Self {
            fetcher,
            suffixes,
            timeout,
        }
    }

    /// 抓取失敗一律回傳預設值，不往外拋
    pub async fn extract_content(&self, url: &str) -> ContentFeatures {
        let html = match tokio::time::timeout(self.timeout, self.fetcher.fetch_html(url)).await {
            Ok(Ok(html)) => html,
            Ok(Err(e)) => {
                debug!("Content fetch failed for {}: {}", url, e);
                return ContentFeatures::default();
            }
            Err(_) => {
                debug!("Content fetch for {} timed out after {:?}", url, self.timeout);
                return ContentFeatures::default();
            }
        };

        analyze_html(&html, url, &self.suffixes)
    }
}

/// Synchronous on purpose: `scraper::Html` is not `Send`, so it never crosses an await.
pub fn analyze_html(html: &str, page_url: &str, suffixes: &SuffixList) -> ContentFeatures {
    let document = Html::parse_document(html);
    let base = Url::parse(page_url).ok();
    let page_domain = base
        .as_ref()
        .and_then(|u| u.host_str())
        .map(|host| registrable(suffixes, host))
        .unwrap_or_default();

    let form_count = document.select(&FORM).count();

    let mut link_count = 0;
    let mut external_links = 0;
    for anchor in document.select(&ANCHOR) {
        link_count += 1;
        let href = anchor.value().attr("href").unwrap_or("").trim();
        let lower = href.to_ascii_lowercase();
        if (lower.starts_with("http://") || lower.starts_with("https://"))
            && is_external(href, base.as_ref(), &page_domain, suffixes)
        {
            external_links += 1;
        }
    }

    let mut resource_count = 0;
    let mut external_resources = 0;
    for (sel, attr) in RESOURCES.iter() {
        for element in document.select(sel) {
            let target = element.value().attr(attr).unwrap_or("").trim();
            if target.is_empty() {
                continue;
            }
            resource_count += 1;
            if is_external(target, base.as_ref(), &page_domain, suffixes) {
                external_resources += 1;
            }
        }
    }

    ContentFeatures {
        fetched: true,
        has_form: form_count > 0,
        form_count,
        link_count,
        external_link_ratio: ratio(external_links, link_count),
        script_count: document.select(&SCRIPT).count(),
        image_count: document.select(&IMAGE).count(),
        resource_count,
        external_resource_ratio: ratio(external_resources, resource_count),
    }
}

fn registrable(suffixes: &SuffixList, host: &str) -> String {
    let parts = suffixes.split(host);
    let registered = parts.registered_domain();
    if registered.is_empty() {
        host.to_lowercase()
    } else {
        registered
    }
}

/// 相對路徑依頁面網址解析；無法解析或非 http(s) 視為同站
fn is_external(target: &str, base: Option<&Url>, page_domain: &str, suffixes: &SuffixList) -> bool {
    let resolved = match base {
        Some(base) => base.join(target),
        None => Url::parse(target),
    };
    match resolved {
        Ok(resolved) if matches!(resolved.scheme(), "http" | "https") => resolved
            .host_str()
            .map(|host| registrable(suffixes, host) != page_domain)
            .unwrap_or(false),
        _ => false,
    }
}

fn ratio(part: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        part as f64 / total as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"
        <html><head>
          <script src="/app.js"></script>
          <script src="https://cdn.other.net/lib.js"></script>
          <link rel="stylesheet" href="https://static.example.com/site.css">
        </head><body>
          <form action="/login"><input name="user"></form>
          <a href="/about">About</a>
          <a href="https://www.example.com/help">Help</a>
          <a href="https://evil.example.org/steal">Click</a>
          <a href="mailto:someone@example.com">Mail</a>
          <img src="logo.png"><img src="https://img.other.net/x.png">
        </body></html>
    "#;

    #[test]
    fn test_counts_and_ratios() {
        let features = analyze_html(PAGE, "https://example.com/index.html", &SuffixList::bundled());
        assert!(features.fetched);
        assert!(features.has_form);
        assert_eq!(features.form_count, 1);
        assert_eq!(features.link_count, 4);
        assert!((features.external_link_ratio - 0.25).abs() < 1e-9);
        assert_eq!(features.script_count, 2);
        assert_eq!(features.image_count, 2);
        // 兩支 script、一個 link、兩張圖，其中 2 個外部
        assert_eq!(features.resource_count, 5);
        assert!((features.external_resource_ratio - 0.4).abs() < 1e-9);
    }

    #[test]
    fn test_empty_page_has_zero_ratios() {
        let features = analyze_html("<html></html>", "https://example.com", &SuffixList::bundled());
        assert!(features.fetched);
        assert_eq!(features.link_count, 0);
        assert_eq!(features.external_link_ratio, 0.0);
        assert_eq!(features.external_resource_ratio, 0.0);
    }
}
