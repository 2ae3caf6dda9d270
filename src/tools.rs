use crate::config::ApiConfig;
use crate::fetch::ContentFetcher;
use crate::image::{generate_image, ImageBackend};
use crate::llm::{chat_completion, ChatMessage, FunctionDef, ToolSpec};
use crate::picker::CoveragePicker;
use crate::prompts;
use crate::search::run_searches;
use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

/// A capability the model can invoke by name.
///
/// Tool failures are reported back to the model as plain text; nothing a
/// tool does can fail the surrounding chat request.
#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &'static str;
    fn description(&self) -> &'static str;
    /// JSON schema of the argument object
    fn parameters(&self) -> Value;
    async fn invoke(&self, args: Value) -> String;
}

/// Registry mapping tool names to implementations
pub struct ToolRegistry {
    tools: HashMap<String, Box<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
        }
    }

    pub fn register(&mut self, tool: Box<dyn Tool>) {
        self.tools.insert(tool.name().to_string(), tool);
    }

    /// Tool definitions to advertise with a chat request
    pub fn specs(&self) -> Vec<ToolSpec> {
        self.tools
            .values()
            .map(|tool| ToolSpec {
                kind: "function".to_string(),
                function: FunctionDef {
                    name: tool.name().to_string(),
                    description: tool.description().to_string(),
                    parameters: tool.parameters(),
                },
            })
            .collect()
    }

    pub async fn invoke(&self, name: &str, args: Value) -> String {
        match self.tools.get(name) {
            Some(tool) => tool.invoke(args).await,
            None => {
                log::warn!("Model requested unknown tool '{}'", name);
                format!("Unknown tool: {}", name)
            }
        }
    }
}

/// Registry with the bot's full tool set
pub fn default_registry(
    config: Arc<ApiConfig>,
    fetcher: Arc<ContentFetcher>,
    picker: Arc<Mutex<CoveragePicker<ImageBackend>>>,
) -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    registry.register(Box::new(ClockTool));
    registry.register(Box::new(CalculateTool {
        config: config.clone(),
    }));
    registry.register(Box::new(WebSearchTool { config, fetcher }));
    registry.register(Box::new(ImageGenerationTool { picker }));
    registry
}

fn string_arg(args: &Value, key: &str) -> String {
    args.get(key)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

/// Current date and time
pub struct ClockTool;

#[async_trait]
impl Tool for ClockTool {
    fn name(&self) -> &'static str {
        "clock"
    }

    fn description(&self) -> &'static str {
        "Returns the current date and time in 12-hour format with AM/PM. \
         Use this tool whenever the current date or time is needed."
    }

    fn parameters(&self) -> Value {
        json!({"type": "object", "properties": {}})
    }

    async fn invoke(&self, _args: Value) -> String {
        println!("🕐 CLOCK");
        chrono::Local::now()
            .format("%Y-%m-%d %I:%M:%S %p")
            .to_string()
    }
}

/// Problem solving delegated to the calculation model
pub struct CalculateTool {
    config: Arc<ApiConfig>,
}

#[async_trait]
impl Tool for CalculateTool {
    fn name(&self) -> &'static str {
        "calculate"
    }

    fn description(&self) -> &'static str {
        "Solve a mathematical expression or word problem. Use this tool for \
         any calculation the user asks for. Answer concisely."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "expression": {
                    "type": "string",
                    "description": "A problem to be solved or a mathematical expression"
                }
            },
            "required": ["expression"]
        })
    }

    async fn invoke(&self, args: Value) -> String {
        let expression = string_arg(&args, "expression");
        println!("🧮 CALCULATE {}", expression);

        let messages = vec![ChatMessage::user(prompts::calc_prompt(&expression))];
        match chat_completion(messages, &self.config.calc_model, &self.config, Some(256)).await {
            Ok(answer) => answer,
            Err(e) => {
                log::error!("Calculation failed: {}", e);
                format!("Calculation failed: {}", e)
            }
        }
    }
}

/// Web search over the SearXNG backend and the content fetch pipeline
pub struct WebSearchTool {
    config: Arc<ApiConfig>,
    fetcher: Arc<ContentFetcher>,
}

#[async_trait]
impl Tool for WebSearchTool {
    fn name(&self) -> &'static str {
        "web_search"
    }

    fn description(&self) -> &'static str {
        "Perform a web search and get page contents for the top results. \
         Use this tool for current events, prices, or any other missing or \
         up-to-date information. Do not instruct the user to search \
         themselves; search and provide the information directly."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "The search query string"
                }
            },
            "required": ["query"]
        })
    }

    async fn invoke(&self, args: Value) -> String {
        let query = string_arg(&args, "query");
        let (contents, urls) = run_searches(&query, &self.fetcher, &self.config).await;

        if contents.is_empty() {
            return "No information found.".to_string();
        }

        let sources = urls.join(", ");
        format!("{}\n\nSources: {}", contents.join("\n\n---\n\n"), sources)
    }
}

/// Image generation through the rotating backend picker
pub struct ImageGenerationTool {
    picker: Arc<Mutex<CoveragePicker<ImageBackend>>>,
}

#[async_trait]
impl Tool for ImageGenerationTool {
    fn name(&self) -> &'static str {
        "image_generation"
    }

    fn description(&self) -> &'static str {
        "Generate an image and return its path enclosed in image tags. Use \
         this tool to draw any kind of image like posters, album art or book \
         covers. Respond by displaying the exact result directly to the user."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "prompt": {
                    "type": "string",
                    "description": "The image prompt"
                }
            },
            "required": ["prompt"]
        })
    }

    async fn invoke(&self, args: Value) -> String {
        let prompt = string_arg(&args, "prompt");
        let backend = self.picker.lock().await.pick();

        match generate_image(&backend, &prompt).await {
            Ok(path) => format!("<IMAGE>{}||{}</IMAGE>", path, prompt),
            Err(e) => {
                log::error!("Image generation failed: {}", e);
                format!("Image generation failed: {}", e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_clock_tool_format() {
        let output = ClockTool.invoke(json!({})).await;
        // e.g. "2024-06-01 03:15:42 PM"
        assert!(
            chrono::NaiveDateTime::parse_from_str(&output, "%Y-%m-%d %I:%M:%S %p").is_ok(),
            "unexpected clock output: {}",
            output
        );
    }

    #[tokio::test]
    async fn test_unknown_tool_reports_back() {
        let registry = ToolRegistry::new();
        let result = registry.invoke("no_such_tool", json!({})).await;
        assert_eq!(result, "Unknown tool: no_such_tool");
    }

    #[test]
    fn test_registry_specs_cover_registered_tools() {
        let mut registry = ToolRegistry::new();
        registry.register(Box::new(ClockTool));
        let specs = registry.specs();
        assert_eq!(specs.len(), 1);
        assert_eq!(specs[0].kind, "function");
        assert_eq!(specs[0].function.name, "clock");
    }

    #[test]
    fn test_string_arg_tolerates_missing_keys() {
        assert_eq!(string_arg(&json!({}), "query"), "");
        assert_eq!(string_arg(&json!({"query": "rust"}), "query"), "rust");
    }
}
