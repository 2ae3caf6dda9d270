use crate::config::ApiConfig;
use crate::fetch::ContentFetcher;
use crate::llm::{chat_completion, ChatMessage};
use crate::prompts;
use crate::{ApiConfigKey, FetcherKey};
use serde::{Deserialize, Serialize};
use serenity::{
    client::Context,
    framework::standard::{macros::command, Args, CommandResult},
    model::channel::Message,
};
use std::error::Error;
use std::fmt;

/// Error types for search operations
#[derive(Debug)]
pub enum SearchError {
    HttpError(reqwest::Error),
    ParseError(String),
    NoResults(String),
}

impl fmt::Display for SearchError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            SearchError::HttpError(e) => write!(f, "HTTP request failed: {}", e),
            SearchError::ParseError(msg) => write!(f, "Response parsing failed: {}", msg),
            SearchError::NoResults(msg) => write!(f, "No search results found: {}", msg),
        }
    }
}

impl Error for SearchError {}

impl From<reqwest::Error> for SearchError {
    fn from(error: reqwest::Error) -> Self {
        SearchError::HttpError(error)
    }
}

/// A single SearXNG result entry. Only the fields the bot consumes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResult {
    pub url: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub content: String,
}

#[derive(Deserialize)]
struct SearxngResponse {
    #[serde(default)]
    results: Vec<SearchResult>,
}

/// Query the SearXNG instance and keep the top 3 results.
///
/// Category can be "general", "images", "videos", "news", "it", "science"
/// among others; the bot only uses "general".
pub async fn searxng(
    query: &str,
    category: &str,
    config: &ApiConfig,
) -> Result<Vec<SearchResult>, SearchError> {
    if query.trim().is_empty() {
        return Err(SearchError::NoResults("Empty search query provided".to_string()));
    }

    println!("🔍 SEARXNG {}", query);

    let search_url = format!(
        "{}/search?q={}&format=json&categories={}",
        config.searxng_base_url,
        urlencoding::encode(query),
        category
    );

    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(15))
        .build()?;

    let response = client.get(&search_url).send().await?;
    if !response.status().is_success() {
        return Err(SearchError::ParseError(format!(
            "HTTP request failed with status: {}",
            response.status()
        )));
    }

    let body: SearxngResponse = response
        .json()
        .await
        .map_err(|e| SearchError::ParseError(format!("Invalid search response: {}", e)))?;

    Ok(body.results.into_iter().take(3).collect())
}

/// Search the web and fetch sanitized content for every hit.
///
/// Backend failures are logged and yield an empty batch rather than an
/// error; individual fetch failures just drop that URL's content. Returns
/// the fetched contents and the attempted URLs (in result order).
pub async fn run_searches(
    query: &str,
    fetcher: &ContentFetcher,
    config: &ApiConfig,
) -> (Vec<String>, Vec<String>) {
    let start = std::time::Instant::now();

    let results = match searxng(query, "general", config).await {
        Ok(results) => results,
        Err(e) => {
            log::error!("Search query failed with error: {}", e);
            Vec::new()
        }
    };

    let (contents, urls) = fetcher.fetch_all(&results).await;

    println!("🔍 SEARCH took {:.2} seconds", start.elapsed().as_secs_f64());
    (contents, urls)
}

/// Summarize fetched page contents into one Discord-sized answer
pub async fn summarize_contents(
    contents: &[String],
    user_query: &str,
    config: &ApiConfig,
) -> Result<String, Box<dyn std::error::Error + Send + Sync>> {
    let context = contents.join("\n\n---\n\n");
    let messages = vec![ChatMessage::user(prompts::summarize_prompt(&context, user_query))];
    chat_completion(messages, &config.default_model, config, Some(512)).await
}

#[command]
#[aliases("websearch")]
pub async fn search(ctx: &Context, msg: &Message, args: Args) -> CommandResult {
    let query = args.message().trim().to_string();
    let _typing = ctx.http.start_typing(msg.channel_id.0)?;

    if query.is_empty() {
        msg.reply(ctx, "❌ Please provide a search query! Usage: `^search <query>`")
            .await?;
        return Ok(());
    }

    let (config, fetcher) = {
        let data = ctx.data.read().await;
        (
            data.get::<ApiConfigKey>().cloned(),
            data.get::<FetcherKey>().cloned(),
        )
    };
    let (config, fetcher) = match (config, fetcher) {
        (Some(config), Some(fetcher)) => (config, fetcher),
        _ => {
            msg.reply(ctx, "❌ Bot is not fully configured!").await?;
            return Ok(());
        }
    };

    let mut search_msg = msg
        .channel_id
        .send_message(&ctx.http, |m| m.content("🔍 Searching the web..."))
        .await?;

    let (contents, urls) = run_searches(&query, &fetcher, &config).await;

    if contents.is_empty() {
        search_msg
            .edit(&ctx.http, |m| {
                m.content(format!("❌ No information found for `{}`.", query))
            })
            .await?;
        return Ok(());
    }

    search_msg
        .edit(&ctx.http, |m| m.content("🤖 Summarizing results..."))
        .await?;

    let response = match summarize_contents(&contents, &query, &config).await {
        Ok(summary) => {
            let sources = urls
                .iter()
                .map(|url| format!("<{}>", url))
                .collect::<Vec<_>>()
                .join(" • ");
            format!("{}\n\n🔗 Sources: {}", summary, sources)
        }
        Err(e) => {
            log::error!("Search summarization failed: {}", e);
            format!("❌ Failed to summarize results for `{}`.", query)
        }
    };

    search_msg
        .edit(&ctx.http, |m| m.content(&response))
        .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_searxng_response_parsing() {
        let body = r#"{
            "query": "rust language",
            "results": [
                {"url": "https://a.example", "title": "A", "content": "first"},
                {"url": "https://b.example", "title": "B"},
                {"url": "https://c.example", "title": "C", "content": "third"},
                {"url": "https://d.example", "title": "D", "content": "fourth"}
            ]
        }"#;
        let parsed: SearxngResponse = serde_json::from_str(body).unwrap();
        let top: Vec<SearchResult> = parsed.results.into_iter().take(3).collect();
        assert_eq!(top.len(), 3);
        assert_eq!(top[0].url, "https://a.example");
        assert_eq!(top[1].content, "");
        assert_eq!(top[2].title, "C");
    }

    #[test]
    fn test_missing_results_array_parses_empty() {
        let parsed: SearxngResponse = serde_json::from_str(r#"{"query": "x"}"#).unwrap();
        assert!(parsed.results.is_empty());
    }
}
