use crate::domain::ports::PageFetcher;
use crate::utils::error::{GuardError, Result};
use async_trait::async_trait;
use encoding_rs::{Encoding, UTF_8};
use reqwest::{header::CONTENT_TYPE, Client, Response};
use std::time::Duration;
use tracing::debug;

pub const MAX_PAGE_BYTES: usize = 2 * 1024 * 1024;
const USER_AGENT: &str = concat!("phishguard/", env!("CARGO_PKG_VERSION"));

/// 只取前 `limit` 個位元組；超過時依 `truncate` 決定截斷或報錯
async fn read_capped(mut response: Response, limit: usize, truncate: bool) -> Result<Vec<u8>> {
    let mut body = Vec::new();
    while let Some(chunk) = response.chunk().await? {
        let remaining = limit.saturating_sub(body.len());
        if chunk.len() > remaining {
            if truncate {
                body.extend_from_slice(&chunk[..remaining]);
                break;
            }
            return Err(GuardError::input(format!(
                "Media file exceeds the {} MB limit",
                limit / (1024 * 1024)
            )));
        }
        body.extend_from_slice(&chunk);
    }
    Ok(body)
}

/// `Content-Type` 裡的 charset 參數
fn charset_label(content_type: &str) -> Option<&str> {
    content_type.split(';').skip(1).find_map(|param| {
        let (name, value) = param.split_once('=')?;
        if name.trim().eq_ignore_ascii_case("charset") {
            Some(value.trim().trim_matches('"'))
        } else {
            None
        }
    })
}

/// 依回應宣告的 charset 解碼；未宣告或不認得時當 UTF-8，壞掉的位元組以替代字元取代
fn decode_body(body: &[u8], content_type: Option<&str>) -> String {
    let encoding = content_type
        .and_then(charset_label)
        .and_then(|label| Encoding::for_label(label.as_bytes()))
        .unwrap_or(UTF_8);
    let (text, used, had_errors) = encoding.decode(body);
    if had_errors {
        debug!("Page body had invalid {} sequences", used.name());
    }
    text.into_owned()
}

/// Single-shot page fetch: no retries, certificates not verified, body capped.
pub struct ReqwestPageFetcher {
    client: Client,
    max_bytes: usize,
}

impl ReqwestPageFetcher {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .danger_accept_invalid_certs(true)
            .timeout(timeout)
            .connect_timeout(timeout)
            .user_agent(USER_AGENT)
            .build()?;
        Ok(Self {
            client,
            max_bytes: MAX_PAGE_BYTES,
        })
    }
}

#[async_trait]
impl PageFetcher for ReqwestPageFetcher {
    async fn fetch_html(&self, url: &str) -> Result<String> {
        let response = self.client.get(url).send().await?.error_for_status()?;
        debug!("Page fetch {} -> {}", url, response.status());

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.to_string());
        let body = read_capped(response, self.max_bytes, true).await?;
        Ok(decode_body(&body, content_type.as_deref()))
    }
}

#[derive(Debug, Clone)]
pub struct DownloadedMedia {
    pub bytes: Vec<u8>,
    pub content_type: Option<String>,
}

/// Remote media download for URL-based deepfake checks.
pub struct MediaDownloader {
    client: Client,
    max_bytes: usize,
}

impl MediaDownloader {
    pub fn new(timeout: Duration, max_bytes: usize) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()?;
        Ok(Self { client, max_bytes })
    }

    pub async fn download(&self, url: &str) -> Result<DownloadedMedia> {
        let response = self.client.get(url).send().await?;
        if !response.status().is_success() {
            return Err(GuardError::input(format!(
                "Failed to download media: HTTP {}",
                response.status().as_u16()
            )));
        }
        if let Some(length) = response.content_length() {
            if length > self.max_bytes as u64 {
                return Err(GuardError::input(format!(
                    "Media file exceeds the {} MB limit",
                    self.max_bytes / (1024 * 1024)
                )));
            }
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.to_string());
        let bytes = read_capped(response, self.max_bytes, false).await?;
        debug!("Downloaded {} bytes from {}", bytes.len(), url);

        Ok(DownloadedMedia {
            bytes,
            content_type,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;

    #[tokio::test]
    async fn test_fetch_html_success_and_error_status() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/ok");
            then.status(200).body("<html><form></form></html>");
        });
        server.mock(|when, then| {
            when.method(GET).path("/missing");
            then.status(404);
        });

        let fetcher = ReqwestPageFetcher::new(Duration::from_secs(3)).unwrap();
        let html = fetcher.fetch_html(&server.url("/ok")).await.unwrap();
        assert!(html.contains("<form>"));
        assert!(fetcher.fetch_html(&server.url("/missing")).await.is_err());
    }

    #[test]
    fn test_charset_label() {
        assert_eq!(charset_label("text/html; charset=ISO-8859-1"), Some("ISO-8859-1"));
        assert_eq!(charset_label("text/html;Charset=\"utf-8\""), Some("utf-8"));
        assert_eq!(charset_label("text/html"), None);
        assert_eq!(charset_label("charset=utf-8"), None);
    }

    #[test]
    fn test_decode_body_falls_back_to_utf8() {
        assert_eq!(decode_body(b"caf\xe9", Some("text/html; charset=iso-8859-1")), "café");
        assert_eq!(decode_body("café".as_bytes(), None), "café");
        assert_eq!(decode_body("café".as_bytes(), Some("text/html; charset=bogus")), "café");
        // 截斷在多位元組字元中間也不算失敗
        assert_eq!(decode_body(b"caf\xc3", None), "caf\u{FFFD}");
    }

    #[tokio::test]
    async fn test_fetch_html_decodes_declared_charset() {
        let server = MockServer::start();
        let mut page = b"<html><body><p>Caf\xe9 r\xe9servation</p>".to_vec();
        page.extend_from_slice(b"<form action=\"/pay\"></form><a href=\"/menu\">menu</a></body></html>");
        server.mock(|when, then| {
            when.method(GET).path("/latin1");
            then.status(200)
                .header("Content-Type", "text/html; charset=iso-8859-1")
                .body(page);
        });

        let fetcher = ReqwestPageFetcher::new(Duration::from_secs(3)).unwrap();
        let html = fetcher.fetch_html(&server.url("/latin1")).await.unwrap();
        assert!(html.contains("Café réservation"));
        assert!(html.contains("<form action=\"/pay\">"));
    }

    #[tokio::test]
    async fn test_download_respects_size_cap() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/clip.wav");
            then.status(200)
                .header("content-type", "audio/wav")
                .body(vec![0u8; 2048]);
        });

        let small = MediaDownloader::new(Duration::from_secs(3), 1024).unwrap();
        assert!(small.download(&server.url("/clip.wav")).await.is_err());

        let large = MediaDownloader::new(Duration::from_secs(3), 4096).unwrap();
        let media = large.download(&server.url("/clip.wav")).await.unwrap();
        assert_eq!(media.bytes.len(), 2048);
        assert_eq!(media.content_type.as_deref(), Some("audio/wav"));
    }
}
