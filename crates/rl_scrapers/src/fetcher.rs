use std::collections::BTreeMap;
use std::time::Duration;
use async_trait::async_trait;
use lazy_static::lazy_static;
use reqwest::Client;
use rl_core::{Result, ScrapeResult};
use scraper::{Html, Selector};
use tracing::{debug, warn};
use url::Url;

/// Characters of page text kept after extraction.
pub const MAX_TEXT_CHARS: usize = 2000;

const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";

/// Elements whose text never counts as article content.
const BOILERPLATE_ELEMENTS: &[&str] = &["script", "style", "nav", "header", "footer", "aside", "form"];

lazy_static! {
    static ref OG_META: Selector =
        Selector::parse(r#"meta[property^="og:"]"#).expect("og meta selector is valid");
}

#[async_trait]
pub trait PageFetcher: Send + Sync {
    /// Downloads and extracts `url`. Every failure is logged and reported as `None`.
    async fn fetch(&self, url: &str) -> Option<ScrapeResult>;
}

pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()?;
        Ok(Self { client })
    }

    async fn download(&self, url: &str) -> reqwest::Result<String> {
        self.client
            .get(url)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await
    }
}

/// True for absolute `http`/`https` URLs.
pub fn is_http_url(url: &str) -> bool {
    Url::parse(url)
        .map(|u| matches!(u.scheme(), "http" | "https"))
        .unwrap_or(false)
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Option<ScrapeResult> {
        if !is_http_url(url) {
            debug!("Skipping non-HTTP URL: {}", url);
            return None;
        }
        match self.download(url).await {
            Ok(html) => Some(extract_page(&html)),
            Err(e) => {
                warn!("Scraping error ({}): {}", url, e);
                None
            }
        }
    }
}

/// Pulls Open Graph properties and visible text out of an HTML document.
pub fn extract_page(html: &str) -> ScrapeResult {
    let document = Html::parse_document(html);

    let mut ogp = BTreeMap::new();
    for meta in document.select(&OG_META) {
        let element = meta.value();
        let key = element
            .attr("property")
            .and_then(|p| p.strip_prefix("og:"))
            .filter(|k| !k.is_empty());
        if let (Some(key), Some(content)) = (key, element.attr("content")) {
            ogp.insert(key.to_string(), content.to_string());
        }
    }

    let mut words: Vec<&str> = Vec::new();
    for node in document.root_element().descendants() {
        let Some(text) = node.value().as_text() else {
            continue;
        };
        let hidden = node.ancestors().any(|ancestor| {
            ancestor
                .value()
                .as_element()
                .map_or(false, |el| BOILERPLATE_ELEMENTS.contains(&el.name()))
        });
        if !hidden {
            words.extend(text.split_whitespace());
        }
    }
    let text = words.join(" ");

    ScrapeResult {
        text: rl_inference::truncate_chars(&text, MAX_TEXT_CHARS).to_string(),
        ogp,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"<!DOCTYPE html>
<html>
<head>
  <title>Rust  Ownership</title>
  <meta property="og:title" content="Ownership in Rust">
  <meta property="og:image" content="https://example.dev/og.png">
  <meta property="og:image:width" content="1200">
  <meta property="og:description">
  <meta name="description" content="not open graph">
  <style>body { color: red; }</style>
  <script>var tracking = 1;</script>
</head>
<body>
  <header>Site header</header>
  <nav><a href="/">Home</a></nav>
  <main>
    <h1>Borrowing</h1>
    <p>References   let you
       use a value without taking ownership.</p>
    <form><label>Subscribe</label></form>
  </main>
  <aside>Related posts</aside>
  <footer>Copyright</footer>
</body>
</html>"#;

    #[test]
    fn test_extract_page() {
        let result = extract_page(PAGE);
        assert_eq!(
            result.text,
            "Rust Ownership Borrowing References let you use a value without taking ownership."
        );
        assert_eq!(result.ogp.get("title").map(String::as_str), Some("Ownership in Rust"));
        assert_eq!(result.ogp.get("image").map(String::as_str), Some("https://example.dev/og.png"));
        assert_eq!(result.ogp.get("image:width").map(String::as_str), Some("1200"));
        assert!(!result.ogp.contains_key("description"));
        assert_eq!(result.ogp.len(), 3);
    }

    #[test]
    fn test_text_is_truncated() {
        let html = format!("<html><body><p>{}</p></body></html>", "語".repeat(MAX_TEXT_CHARS + 10));
        assert_eq!(extract_page(&html).text.chars().count(), MAX_TEXT_CHARS);
    }

    #[test]
    fn test_http_url() {
        assert!(is_http_url("https://example.dev/a"));
        assert!(is_http_url("http://example.dev"));
        assert!(!is_http_url("chrome://settings"));
        assert!(!is_http_url("ftp://example.dev"));
        assert!(!is_http_url("example.dev"));
    }

    async fn serve_pages() -> String {
        let app = axum::Router::new().route(
            "/article",
            axum::routing::get(|| async { axum::response::Html(PAGE) }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}", addr)
    }

    #[tokio::test]
    async fn test_fetch_soft_failures() {
        let base = serve_pages().await;
        let fetcher = HttpFetcher::new(Duration::from_secs(5)).unwrap();

        let page = fetcher.fetch(&format!("{}/article", base)).await.unwrap();
        assert!(page.text.contains("Borrowing"));
        assert_eq!(page.ogp.get("title").map(String::as_str), Some("Ownership in Rust"));

        assert!(fetcher.fetch(&format!("{}/missing", base)).await.is_none());
        assert!(fetcher.fetch("http://127.0.0.1:9/closed").await.is_none());
    }

    #[tokio::test]
    async fn test_fetch_rejects_unsupported_schemes() {
        let fetcher = HttpFetcher::new(Duration::from_secs(1)).unwrap();
        assert!(fetcher.fetch("file:///etc/passwd").await.is_none());
    }
}
