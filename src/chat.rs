use crate::llm::{run_with_tools, ChatMessage};
use crate::prompts;
use crate::session::ChatSession;
use crate::tools::default_registry;
use crate::{ApiConfigKey, FetcherKey, ImagePickerKey, SessionMapKey};
use once_cell::sync::Lazy;
use regex::Regex;
use serenity::{
    client::Context,
    framework::standard::{macros::command, Args, CommandResult},
    model::channel::{AttachmentType, Message},
};
use std::path::Path;

// Image results come back inline as <IMAGE>path||prompt</IMAGE>
static IMAGE_TAG: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)<IMAGE>(.*?)\|\|(.*?)</IMAGE>").expect("image tag regex"));

/// Generated image reference extracted from a model response
#[derive(Debug, PartialEq)]
pub struct ImageRef {
    pub path: String,
    pub prompt: String,
}

/// Pull `<IMAGE>` tags out of a response, returning the cleaned text and
/// the referenced images
pub fn extract_image_tags(response: &str) -> (String, Vec<ImageRef>) {
    let mut images = Vec::new();
    for capture in IMAGE_TAG.captures_iter(response) {
        images.push(ImageRef {
            path: capture[1].trim().to_string(),
            prompt: capture[2].trim().to_string(),
        });
    }
    let text = IMAGE_TAG.replace_all(response, "").trim().to_string();
    (text, images)
}

/// Split a response into Discord-sized chunks, preferring newline then
/// space boundaries
pub fn split_response(text: &str, limit: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut rest: &str = text;

    while rest.chars().count() > limit {
        let head: String = rest.chars().take(limit).collect();
        // rfind yields byte indices, so the halfway cutoff is in bytes too
        let cut = head
            .rfind('\n')
            .or_else(|| head.rfind(' '))
            .filter(|&i| i > head.len() / 2)
            .unwrap_or(head.len());
        chunks.push(head[..cut].trim_end().to_string());
        rest = &rest[cut..];
        rest = rest.trim_start();
    }

    if !rest.is_empty() {
        chunks.push(rest.to_string());
    }
    chunks
}

/// Run one chat turn: session history + tools + response delivery.
///
/// Used by the `chat` command and by user-ID mentions.
pub async fn handle_chat_request(
    ctx: &Context,
    msg: &Message,
    prompt: &str,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let (config, fetcher, picker) = {
        let data = ctx.data.read().await;
        (
            data.get::<ApiConfigKey>().cloned(),
            data.get::<FetcherKey>().cloned(),
            data.get::<ImagePickerKey>().cloned(),
        )
    };
    let (config, fetcher, picker) = match (config, fetcher, picker) {
        (Some(config), Some(fetcher), Some(picker)) => (config, fetcher, picker),
        _ => return Err("Bot is not fully configured".into()),
    };

    // Record the user message and snapshot the conversation
    let (system_message, history) = {
        let mut data = ctx.data.write().await;
        let sessions = data
            .get_mut::<SessionMapKey>()
            .ok_or("Session map not initialized")?;
        let session = sessions
            .entry(msg.author.id)
            .or_insert_with(|| ChatSession::new(prompts::DEFAULT_SYSTEM_MESSAGE));
        session.add_user_message(prompt.to_string());
        (session.system_message.clone(), session.conversation_messages())
    };

    let mut messages = vec![ChatMessage::system(system_message)];
    messages.extend(history);

    let mut thinking_msg = msg
        .channel_id
        .send_message(&ctx.http, |m| m.content("🤖 Thinking..."))
        .await?;

    let registry = default_registry(config.clone(), fetcher, picker);
    let answer = match run_with_tools(messages, &registry, &config).await {
        Ok(answer) => answer,
        Err(e) => {
            log::error!("Chat request failed: {}", e);
            thinking_msg
                .edit(&ctx.http, |m| {
                    m.content("❌ Failed to get response from AI model!")
                })
                .await?;
            return Ok(());
        }
    };

    // Remember the reply for context in later turns
    {
        let mut data = ctx.data.write().await;
        if let Some(sessions) = data.get_mut::<SessionMapKey>() {
            if let Some(session) = sessions.get_mut(&msg.author.id) {
                session.add_assistant_message(answer.clone());
            }
        }
    }

    let (text, images) = extract_image_tags(&answer);

    if text.is_empty() && images.is_empty() {
        thinking_msg
            .edit(&ctx.http, |m| m.content("❌ No response generated."))
            .await?;
        return Ok(());
    }

    let limit = config.max_discord_message_length;
    let chunks = split_response(&text, limit);

    if let Some(first) = chunks.first() {
        thinking_msg.edit(&ctx.http, |m| m.content(first)).await?;
    } else {
        thinking_msg.delete(&ctx.http).await.ok();
    }
    for chunk in chunks.iter().skip(1) {
        msg.channel_id
            .send_message(&ctx.http, |m| m.content(chunk))
            .await?;
    }

    for image in &images {
        msg.channel_id
            .send_message(&ctx.http, |m| {
                m.content(format!("🎨 `{}`", image.prompt))
                    .add_file(AttachmentType::Path(Path::new(&image.path)))
            })
            .await?;
    }

    Ok(())
}

#[command]
#[aliases("llm", "ai")]
pub async fn chat(ctx: &Context, msg: &Message, args: Args) -> CommandResult {
    let prompt = args.message().trim();
    let _typing = ctx.http.start_typing(msg.channel_id.0)?;

    if prompt.is_empty() {
        msg.reply(ctx, "❌ Please provide a prompt! Usage: `^chat <your prompt>`")
            .await?;
        return Ok(());
    }

    if let Err(e) = handle_chat_request(ctx, msg, prompt).await {
        log::error!("Chat command failed: {}", e);
        msg.reply(ctx, format!("❌ Chat error: {}", e)).await?;
    }
    Ok(())
}

#[command]
#[aliases("clear")]
pub async fn clearcontext(ctx: &Context, msg: &Message, _args: Args) -> CommandResult {
    let cleared = {
        let mut data = ctx.data.write().await;
        match data.get_mut::<SessionMapKey>() {
            Some(sessions) => match sessions.get_mut(&msg.author.id) {
                Some(session) => {
                    let count = session.total_messages();
                    session.clear();
                    Some(count)
                }
                None => None,
            },
            None => None,
        }
    };

    match cleared {
        Some(count) => {
            msg.reply(ctx, format!("🧹 Cleared {} messages from your chat context.", count))
                .await?;
        }
        None => {
            msg.reply(ctx, "You have no chat context to clear.").await?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_image_tags() {
        let response = "Here you go!\n<IMAGE>generated_images/abc.png||a red fox</IMAGE>";
        let (text, images) = extract_image_tags(response);
        assert_eq!(text, "Here you go!");
        assert_eq!(
            images,
            vec![ImageRef {
                path: "generated_images/abc.png".to_string(),
                prompt: "a red fox".to_string(),
            }]
        );
    }

    #[test]
    fn test_extract_without_tags_is_identity() {
        let (text, images) = extract_image_tags("plain answer");
        assert_eq!(text, "plain answer");
        assert!(images.is_empty());
    }

    #[test]
    fn test_split_response_short_is_single_chunk() {
        let chunks = split_response("short answer", 2000);
        assert_eq!(chunks, vec!["short answer"]);
    }

    #[test]
    fn test_split_response_prefers_word_boundaries() {
        let text = "alpha beta gamma delta epsilon";
        let chunks = split_response(text, 14);
        assert!(chunks.len() > 1);
        for chunk in &chunks {
            assert!(chunk.chars().count() <= 14);
            assert!(!chunk.starts_with(' '));
            assert!(!chunk.ends_with(' '));
        }
        assert_eq!(chunks.join(" "), text);
    }

    #[test]
    fn test_split_response_handles_multibyte_text() {
        let text = "ééé ééé ééé ééé";
        let chunks = split_response(text, 7);
        assert!(chunks.len() > 1);
        for chunk in &chunks {
            assert!(chunk.chars().count() <= 7);
            assert!(!chunk.starts_with(' '));
            assert!(!chunk.ends_with(' '));
        }
        assert_eq!(chunks.join(" "), text);
    }

    #[test]
    fn test_split_response_hard_cuts_unbroken_text() {
        let text = "a".repeat(4500);
        let chunks = split_response(&text, 2000);
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0].len(), 2000);
        assert_eq!(chunks[2].len(), 500);
    }
}
