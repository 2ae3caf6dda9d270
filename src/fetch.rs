use crate::config::ApiConfig;
use crate::search::SearchResult;
use futures_util::future::join_all;
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::StatusCode;
use scraper::Html;
use std::sync::atomic::{AtomicBool, Ordering};

/// Maximum characters of page content kept per URL
pub const MAX_CONTENT_LENGTH: usize = 2500;

// Structural elements that carry no article text. The regex crate has no
// backreferences, so each tag gets its own alternation arm.
static STRUCTURAL_TAGS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?is)<script\b.*?</script>|<style\b.*?</style>|<header\b.*?</header>|<footer\b.*?</footer>|<nav\b.*?</nav>",
    )
    .expect("structural tag regex")
});

static MARKDOWN_IMAGE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"!\[[^\]]*\]\([^)]*\)").expect("markdown image regex"));
static MARKDOWN_LINK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\[([^\]]*)\]\([^)]*\)").expect("markdown link regex"));
static MARKDOWN_DECORATION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^#{1,6}[ \t]+|```[^`]*```|[*_]{1,3}").expect("markdown decoration regex"));

/// Concurrent content retrieval for search results.
///
/// Tries a managed extraction API first (JSON with a nested content field)
/// and falls back to scraping the raw page. The extractor credential has a
/// single one-way transition: once the API rejects it, the primary source is
/// skipped for the rest of the process lifetime. The flag transition is
/// idempotent, so concurrent fetch tasks need no lock around it.
pub struct ContentFetcher {
    client: reqwest::Client,
    extractor_base_url: String,
    extractor_api_key: Option<String>,
    extractor_usable: AtomicBool,
}

impl ContentFetcher {
    pub fn new(config: &ApiConfig) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(15))
            .user_agent("Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36")
            .build()?;

        Ok(Self {
            client,
            extractor_base_url: config.extractor_base_url.clone(),
            extractor_api_key: config.extractor_api_key.clone(),
            extractor_usable: AtomicBool::new(true),
        })
    }

    /// Fetch content for a whole result batch concurrently.
    ///
    /// Returns the successfully fetched contents and, separately, every URL
    /// that was attempted (in the batch's original order, for citations).
    /// Individual failures never abort the batch.
    pub async fn fetch_all(&self, results: &[SearchResult]) -> (Vec<String>, Vec<String>) {
        let mut urls = Vec::with_capacity(results.len());
        let mut tasks = Vec::with_capacity(results.len());

        for result in results {
            urls.push(result.url.clone());
            tasks.push(self.fetch_content(&result.url));
        }

        let contents = join_all(tasks).await.into_iter().flatten().collect();
        (contents, urls)
    }

    /// Fetch one URL: extractor API first, raw scrape second, `None` if both
    /// fail.
    pub async fn fetch_content(&self, url: &str) -> Option<String> {
        let mut content = if self.extractor_usable.load(Ordering::Relaxed) {
            self.extract_content(url).await
        } else {
            None
        };

        if content.is_none() {
            content = self.scrape_content(url).await;
        }

        if content.is_none() {
            log::warn!("No content retrieved for {}", url);
        }
        content
    }

    /// Primary source: URL-parameterized extraction endpoint returning
    /// `{"data": {"content": ...}}`.
    async fn extract_content(&self, url: &str) -> Option<String> {
        println!("📡 EXTRACT {}", url);

        let mut request = self
            .client
            .get(format!("{}{}", self.extractor_base_url, url))
            .header("Accept", "application/json");
        if let Some(key) = &self.extractor_api_key {
            request = request.bearer_auth(key);
        }

        let response = match request.send().await {
            Ok(response) => response,
            Err(e) => {
                log::warn!("Extractor request failed for {}: {}", url, e);
                return None;
            }
        };

        if matches!(
            response.status(),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN
        ) {
            self.extractor_usable.store(false, Ordering::Relaxed);
            println!("🔑 Extractor credential rejected - scraping directly from now on");
            return None;
        }
        if !response.status().is_success() {
            return None;
        }

        let body: serde_json::Value = response.json().await.ok()?;
        let content = body.get("data")?.get("content")?.as_str()?;
        Some(sanitize_and_truncate(content, MAX_CONTENT_LENGTH))
    }

    /// Secondary source: fetch the page itself and strip it down to text.
    async fn scrape_content(&self, url: &str) -> Option<String> {
        println!("🕷️  SCRAPE {}", url);

        let response = self.client.get(url).send().await.ok()?;
        let response = response.error_for_status().ok()?;
        let html = response.text().await.ok()?;

        let text = extract_visible_text(&html);
        if text.is_empty() {
            return None;
        }
        Some(sanitize_and_truncate(&text, MAX_CONTENT_LENGTH))
    }
}

/// Strip script/style/header/footer/nav blocks and collect the remaining
/// text with whitespace collapsed.
pub fn extract_visible_text(html: &str) -> String {
    let stripped = STRUCTURAL_TAGS.replace_all(html, " ");
    let document = Html::parse_document(&stripped);
    let text = document.root_element().text().collect::<Vec<_>>().join(" ");
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Normalize content to plain text and truncate it to `max_length`
/// characters, preferring to cut at the last sentence-ending period.
pub fn sanitize_and_truncate(content: &str, max_length: usize) -> String {
    let without_images = MARKDOWN_IMAGE.replace_all(content, " ");
    let without_links = MARKDOWN_LINK.replace_all(&without_images, "$1");
    let without_decoration = MARKDOWN_DECORATION.replace_all(&without_links, " ");
    let plaintext = extract_visible_text(&without_decoration);

    if plaintext.chars().count() <= max_length {
        return plaintext;
    }

    let head: String = plaintext.chars().take(max_length).collect();
    match head.rfind('.') {
        Some(index) => head[..=index].to_string(),
        None => head,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> ApiConfig {
        ApiConfig {
            llm_base_url: "http://localhost:1234".to_string(),
            llm_timeout: 5,
            default_model: "test-model".to_string(),
            calc_model: "test-model".to_string(),
            default_temperature: 0.7,
            default_max_tokens: 512,
            max_discord_message_length: 2000,
            searxng_base_url: "http://localhost:8888".to_string(),
            extractor_base_url: "https://r.example.invalid/".to_string(),
            extractor_api_key: None,
            image_api_endpoint: "https://images.example.invalid/v1".to_string(),
            image_api_keys: Vec::new(),
        }
    }

    #[test]
    fn test_short_content_passes_through() {
        let content = "Rust is a systems language. It compiles fast.";
        assert_eq!(
            sanitize_and_truncate(content, MAX_CONTENT_LENGTH),
            content
        );
    }

    #[test]
    fn test_truncation_ends_at_sentence_boundary() {
        let content = format!("{} End of story. {}", "word ".repeat(40), "tail ".repeat(40));
        let truncated = sanitize_and_truncate(&content, 220);
        assert!(truncated.chars().count() <= 220);
        assert!(truncated.ends_with("End of story."));
    }

    #[test]
    fn test_truncation_hard_cuts_without_period() {
        let content = "abcdefghij ".repeat(50);
        let truncated = sanitize_and_truncate(&content, 100);
        assert_eq!(truncated.chars().count(), 100);
    }

    #[test]
    fn test_structural_tags_are_removed() {
        let html = "<html><head><style>body { color: red; }</style></head>\
                    <body><nav>Home | About</nav><p>Actual   article\ntext.</p>\
                    <script>alert('x');</script><footer>© 2024</footer></body></html>";
        let text = extract_visible_text(html);
        assert_eq!(text, "Actual article text.");
    }

    #[test]
    fn test_markdown_is_flattened() {
        let content = "# Title\n\nSee [the docs](https://example.com) and ![logo](img.png) for **details**.";
        let plain = sanitize_and_truncate(content, MAX_CONTENT_LENGTH);
        assert!(plain.contains("the docs"));
        assert!(!plain.contains("https://example.com"));
        assert!(!plain.contains("img.png"));
        assert!(!plain.contains("**"));
        assert!(!plain.contains('#'));
    }

    #[tokio::test]
    async fn test_fetch_all_keeps_url_order_on_failure() {
        // Relative URLs fail inside reqwest before any network I/O, so both
        // sources fail and the batch still reports every attempted URL.
        let fetcher = ContentFetcher::new(&test_config()).unwrap();
        fetcher.extractor_usable.store(false, Ordering::Relaxed);

        let results = vec![
            SearchResult {
                url: "not-a-url-one".to_string(),
                title: String::new(),
                content: String::new(),
            },
            SearchResult {
                url: "not-a-url-two".to_string(),
                title: String::new(),
                content: String::new(),
            },
        ];

        let (contents, urls) = fetcher.fetch_all(&results).await;
        assert!(contents.is_empty());
        assert_eq!(urls, vec!["not-a-url-one", "not-a-url-two"]);
    }

    #[tokio::test]
    async fn test_fetch_all_mixed_outcomes() {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        // One URL served by a local socket, the other refused: the content
        // list shrinks to the successes while the URL list stays complete.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let good_url = format!("http://{}/", listener.local_addr().unwrap());
        tokio::spawn(async move {
            if let Ok((mut socket, _)) = listener.accept().await {
                let mut request = [0u8; 1024];
                let _ = socket.read(&mut request).await;
                let body = "<html><body><p>Text from the good page.</p></body></html>";
                let response = format!(
                    "HTTP/1.1 200 OK\r\ncontent-type: text/html\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
                    body.len(),
                    body
                );
                let _ = socket.write_all(response.as_bytes()).await;
            }
        });

        // Bind-then-drop leaves a port that refuses connections
        let dead = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let dead_url = format!("http://{}/", dead.local_addr().unwrap());
        drop(dead);

        let fetcher = ContentFetcher::new(&test_config()).unwrap();
        fetcher.extractor_usable.store(false, Ordering::Relaxed);

        let results = vec![
            SearchResult {
                url: good_url.clone(),
                title: String::new(),
                content: String::new(),
            },
            SearchResult {
                url: dead_url.clone(),
                title: String::new(),
                content: String::new(),
            },
        ];

        let (contents, urls) = fetcher.fetch_all(&results).await;
        assert_eq!(urls, vec![good_url, dead_url]);
        assert_eq!(contents, vec!["Text from the good page."]);
    }

    #[test]
    fn test_credential_flag_is_one_way() {
        let fetcher = ContentFetcher::new(&test_config()).unwrap();
        assert!(fetcher.extractor_usable.load(Ordering::Relaxed));
        fetcher.extractor_usable.store(false, Ordering::Relaxed);
        fetcher.extractor_usable.store(false, Ordering::Relaxed);
        assert!(!fetcher.extractor_usable.load(Ordering::Relaxed));
    }
}
