use crate::config::ApiConfig;
use crate::llm::{chat_completion, ChatMessage};
use crate::prompts;
use crate::{ApiConfigKey, ImagePickerKey};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use serde::Deserialize;
use serenity::{
    client::Context,
    framework::standard::{macros::command, Args, CommandResult},
    model::channel::{AttachmentType, Message},
};
use std::path::Path;
use uuid::Uuid;

/// Directory for generated image files
const IMAGE_DIR: &str = "generated_images";

/// One image-generation backend (endpoint plus API key).
///
/// Backends are rotated through a `CoveragePicker`, so every configured key
/// gets used at least once per rotation cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageBackend {
    pub name: String,
    pub endpoint: String,
    pub api_key: String,
}

/// Build the backend rotation list from configuration.
///
/// With no keys configured, a single unauthenticated backend is used (some
/// endpoints accept anonymous requests at a lower rate limit).
pub fn backends_from_config(config: &ApiConfig) -> Vec<ImageBackend> {
    if config.image_api_keys.is_empty() {
        return vec![ImageBackend {
            name: "backend-1".to_string(),
            endpoint: config.image_api_endpoint.clone(),
            api_key: String::new(),
        }];
    }

    config
        .image_api_keys
        .iter()
        .enumerate()
        .map(|(index, key)| ImageBackend {
            name: format!("backend-{}", index + 1),
            endpoint: config.image_api_endpoint.clone(),
            api_key: key.clone(),
        })
        .collect()
}

#[derive(Deserialize)]
struct ImageResponse {
    data: Vec<ImageData>,
}

#[derive(Deserialize)]
struct ImageData {
    b64_json: String,
}

/// Generate one image and return the path of the saved PNG
pub async fn generate_image(
    backend: &ImageBackend,
    prompt: &str,
) -> Result<String, Box<dyn std::error::Error + Send + Sync>> {
    println!("🎨 IMAGE GENERATION via {}: {}", backend.name, prompt);

    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(120))
        .build()?;

    let mut request = client.post(&backend.endpoint).json(&serde_json::json!({
        "prompt": prompt,
        "n": 1,
        "response_format": "b64_json",
    }));
    if !backend.api_key.is_empty() {
        request = request.bearer_auth(&backend.api_key);
    }

    let response = request.send().await?;
    if !response.status().is_success() {
        return Err(format!("Image API request failed: HTTP {}", response.status()).into());
    }

    let body: ImageResponse = response.json().await?;
    let encoded = body
        .data
        .first()
        .ok_or("Image API returned no image data")?;
    let bytes = BASE64.decode(encoded.b64_json.as_bytes())?;

    std::fs::create_dir_all(IMAGE_DIR)?;
    let path = format!("{}/{}.png", IMAGE_DIR, Uuid::new_v4());
    std::fs::write(&path, bytes)?;

    Ok(path)
}

#[command]
#[aliases("img", "draw")]
pub async fn imagine(ctx: &Context, msg: &Message, args: Args) -> CommandResult {
    let concept = args.message().trim().to_string();
    let _typing = ctx.http.start_typing(msg.channel_id.0)?;

    if concept.is_empty() {
        msg.reply(ctx, "❌ Please provide an image prompt! Usage: `^imagine <prompt>`")
            .await?;
        return Ok(());
    }

    let (config, picker) = {
        let data = ctx.data.read().await;
        (
            data.get::<ApiConfigKey>().cloned(),
            data.get::<ImagePickerKey>().cloned(),
        )
    };
    let (config, picker) = match (config, picker) {
        (Some(config), Some(picker)) => (config, picker),
        _ => {
            msg.reply(ctx, "❌ Bot is not fully configured!").await?;
            return Ok(());
        }
    };

    let mut status_msg = msg
        .channel_id
        .send_message(&ctx.http, |m| m.content("🎨 Generating image..."))
        .await?;

    // Expand the concept into a detailed illustration prompt; fall back to
    // the raw concept when the model is unavailable.
    let expand_messages = vec![ChatMessage::user(prompts::expand_prompt(&concept))];
    let prompt = chat_completion(expand_messages, &config.default_model, &config, Some(400))
        .await
        .unwrap_or_else(|e| {
            log::warn!("Prompt expansion failed, using raw concept: {}", e);
            concept.clone()
        });

    let backend = picker.lock().await.pick();
    match generate_image(&backend, &prompt).await {
        Ok(path) => {
            status_msg.delete(&ctx.http).await.ok();
            msg.channel_id
                .send_message(&ctx.http, |m| {
                    m.content(format!("🎨 `{}`", concept))
                        .add_file(AttachmentType::Path(Path::new(&path)))
                })
                .await?;
        }
        Err(e) => {
            log::error!("Image generation failed: {}", e);
            status_msg
                .edit(&ctx.http, |m| {
                    m.content(format!("❌ Image generation failed: {}", e))
                })
                .await?;
        }
    }

    Ok(())
}
