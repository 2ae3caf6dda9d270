use crate::config::ApiConfig;
use crate::tools::ToolRegistry;
use serde::{Deserialize, Serialize};
use serde_json::json;

/// Upper bound on assistant/tool round-trips per request, to stop the model
/// from looping on tool calls.
const MAX_TOOL_ROUNDS: usize = 4;

/// Chat message structure for the OpenAI-compatible API
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ChatMessage {
    pub role: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCall>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

impl ChatMessage {
    fn plain(role: &str, content: String) -> Self {
        Self {
            role: role.to_string(),
            content: Some(content),
            tool_calls: None,
            tool_call_id: None,
        }
    }

    pub fn system(content: String) -> Self {
        Self::plain("system", content)
    }

    pub fn user(content: String) -> Self {
        Self::plain("user", content)
    }

    pub fn assistant(content: String) -> Self {
        Self::plain("assistant", content)
    }

    /// Result message answering one tool call
    pub fn tool(tool_call_id: String, content: String) -> Self {
        Self {
            role: "tool".to_string(),
            content: Some(content),
            tool_calls: None,
            tool_call_id: Some(tool_call_id),
        }
    }
}

/// A tool invocation requested by the model
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ToolCall {
    pub id: String,
    #[serde(rename = "type", default)]
    pub kind: String,
    pub function: FunctionCall,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct FunctionCall {
    pub name: String,
    /// JSON-encoded argument object, as the API delivers it
    pub arguments: String,
}

/// Tool definition advertised to the model
#[derive(Debug, Serialize, Clone)]
pub struct ToolSpec {
    #[serde(rename = "type")]
    pub kind: String,
    pub function: FunctionDef,
}

#[derive(Debug, Serialize, Clone)]
pub struct FunctionDef {
    pub name: String,
    pub description: String,
    pub parameters: serde_json::Value,
}

/// API Request structure for chat completion
#[derive(Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f32,
    max_tokens: i32,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<ToolSpec>>,
}

/// API Response structure for chat completion
#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChatMessage,
}

/// One non-streaming completion round, optionally advertising tools
async fn request_completion(
    messages: &[ChatMessage],
    model: &str,
    config: &ApiConfig,
    max_tokens: Option<i32>,
    tools: Option<&[ToolSpec]>,
) -> Result<ChatMessage, Box<dyn std::error::Error + Send + Sync>> {
    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(config.llm_timeout))
        .build()?;

    let chat_request = ChatRequest {
        model: model.to_string(),
        messages: messages.to_vec(),
        temperature: config.default_temperature,
        max_tokens: max_tokens.unwrap_or(config.default_max_tokens),
        stream: false,
        tools: tools.map(|t| t.to_vec()),
    };

    let response = client
        .post(&format!("{}/v1/chat/completions", config.llm_base_url))
        .json(&chat_request)
        .send()
        .await?;

    if !response.status().is_success() {
        return Err(format!("API request failed: HTTP {}", response.status()).into());
    }

    let mut parsed: ChatResponse = response.json().await?;
    if parsed.choices.is_empty() {
        return Err("Failed to extract content from API response".into());
    }
    Ok(parsed.choices.remove(0).message)
}

/// Plain chat completion without tool dispatch
pub async fn chat_completion(
    messages: Vec<ChatMessage>,
    model: &str,
    config: &ApiConfig,
    max_tokens: Option<i32>,
) -> Result<String, Box<dyn std::error::Error + Send + Sync>> {
    let reply = request_completion(&messages, model, config, max_tokens, None).await?;
    reply
        .content
        .map(|c| c.trim().to_string())
        .ok_or_else(|| "Failed to extract content from API response".into())
}

/// Chat completion with tool dispatch.
///
/// The registry's tool specs are advertised with every request; while the
/// assistant answers with tool calls, each one is invoked and its result
/// appended as a tool message before asking again. After `MAX_TOOL_ROUNDS`
/// the conversation is closed with a final tool-less request.
pub async fn run_with_tools(
    mut messages: Vec<ChatMessage>,
    registry: &ToolRegistry,
    config: &ApiConfig,
) -> Result<String, Box<dyn std::error::Error + Send + Sync>> {
    let tools = registry.specs();

    for _ in 0..MAX_TOOL_ROUNDS {
        let reply = request_completion(
            &messages,
            &config.default_model,
            config,
            None,
            Some(&tools),
        )
        .await?;

        let tool_calls = reply.tool_calls.clone().unwrap_or_default();
        if tool_calls.is_empty() {
            return Ok(reply.content.unwrap_or_default().trim().to_string());
        }

        messages.push(reply);
        for call in tool_calls {
            let args: serde_json::Value =
                serde_json::from_str(&call.function.arguments).unwrap_or_else(|_| json!({}));
            println!("🛠️  TOOL {} {}", call.function.name, args);
            let result = registry.invoke(&call.function.name, args).await;
            messages.push(ChatMessage::tool(call.id, result));
        }
    }

    let reply = request_completion(&messages, &config.default_model, config, None, None).await?;
    Ok(reply.content.unwrap_or_default().trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tool_call_response_parsing() {
        let body = r#"{
            "choices": [{
                "message": {
                    "role": "assistant",
                    "content": null,
                    "tool_calls": [{
                        "id": "call_1",
                        "type": "function",
                        "function": {"name": "clock", "arguments": "{}"}
                    }]
                }
            }]
        }"#;
        let parsed: ChatResponse = serde_json::from_str(body).unwrap();
        let message = &parsed.choices[0].message;
        assert!(message.content.is_none());
        let calls = message.tool_calls.as_ref().unwrap();
        assert_eq!(calls[0].function.name, "clock");
    }

    #[test]
    fn test_tool_message_serialization_skips_empty_fields() {
        let message = ChatMessage::user("hello".to_string());
        let encoded = serde_json::to_string(&message).unwrap();
        assert_eq!(encoded, r#"{"role":"user","content":"hello"}"#);

        let tool = ChatMessage::tool("call_1".to_string(), "3:15 PM".to_string());
        let encoded = serde_json::to_string(&tool).unwrap();
        assert!(encoded.contains(r#""tool_call_id":"call_1""#));
    }
}
