mod chat;
mod config;
mod echo;
mod fetch;
mod help;
mod image;
mod llm;
mod picker;
mod ping;
mod prompts;
mod search;
mod session;
mod tools;

use serenity::{
    async_trait,
    client::{Client, Context, EventHandler},
    framework::standard::{macros::group, StandardFramework},
    model::channel::Message,
    model::gateway::Ready,
    model::id::UserId,
    prelude::GatewayIntents,
    prelude::TypeMapKey,
};
use std::collections::HashMap;
use std::env;
use std::fs;
use std::sync::Arc;
use tokio::signal;
use tokio::sync::Mutex;

use crate::config::ApiConfig;
use crate::fetch::ContentFetcher;
use crate::image::ImageBackend;
use crate::picker::CoveragePicker;
use crate::session::ChatSession;

// TypeMap key for the shared API configuration
pub struct ApiConfigKey;
impl TypeMapKey for ApiConfigKey {
    type Value = Arc<ApiConfig>;
}

// TypeMap key for the content fetch pipeline (holds the extractor
// credential-validity flag, so it must be process-wide)
pub struct FetcherKey;
impl TypeMapKey for FetcherKey {
    type Value = Arc<ContentFetcher>;
}

// TypeMap key for the image backend rotation. The picker itself is not
// thread-safe, hence the mutex.
pub struct ImagePickerKey;
impl TypeMapKey for ImagePickerKey {
    type Value = Arc<Mutex<CoveragePicker<ImageBackend>>>;
}

// TypeMap key for per-user chat sessions
pub struct SessionMapKey;
impl TypeMapKey for SessionMapKey {
    type Value = HashMap<UserId, ChatSession>;
}

// Import all command constants generated by the #[command] macro
use crate::chat::{CHAT_COMMAND, CLEARCONTEXT_COMMAND};
use crate::echo::ECHO_COMMAND;
use crate::help::HELP_COMMAND;
use crate::image::IMAGINE_COMMAND;
use crate::ping::PING_COMMAND;
use crate::search::SEARCH_COMMAND;

// Command group declaration - includes all available commands
#[group]
#[commands(ping, echo, help, chat, clearcontext, search, imagine)]
struct General;

// Event handler implementation
struct Handler;

#[async_trait]
impl EventHandler for Handler {
    async fn ready(&self, _: Context, ready: Ready) {
        println!("✅ Bot connected as {}!", ready.user.name);
    }

    async fn message(&self, ctx: Context, msg: Message) {
        if msg.author.bot {
            return;
        }

        // A user-ID mention anywhere in the message routes it to the chat path
        let bot_id = ctx.cache.current_user_id();
        let mention = format!("<@{}>", bot_id);
        let nick_mention = format!("<@!{}>", bot_id);
        if !msg.content.contains(&mention) && !msg.content.contains(&nick_mention) {
            return;
        }

        let prompt = msg
            .content
            .replace(&mention, "")
            .replace(&nick_mention, "")
            .trim()
            .to_string();

        if prompt.is_empty() {
            let _ = msg
                .reply(&ctx, "Please provide a prompt! Usage: `<@bot> <your prompt>`")
                .await;
            return;
        }

        // When replying to another message, hand the model that message as context
        let input = match &msg.referenced_message {
            Some(referenced) => format!(
                "CONTEXT: The user {} is asking you about a message posted by {}.\n\n\
                 ORIGINAL MESSAGE BY {}:\n\"{}\"\n\n\
                 USER'S QUESTION ABOUT THIS MESSAGE:\n\"{}\"",
                msg.author.name,
                referenced.author.name,
                referenced.author.name,
                referenced.content,
                prompt
            ),
            None => prompt,
        };

        if let Err(e) = chat::handle_chat_request(&ctx, &msg, &input).await {
            log::error!("Mention request failed: {}", e);
            let _ = msg.reply(&ctx, format!("❌ Chat error: {}", e)).await;
        }
    }
}

// Function to read bot configuration from botconfig.txt with multi-path fallback
fn load_bot_config() -> Result<HashMap<String, String>, String> {
    let config_paths = [
        "botconfig.txt",
        "../botconfig.txt",
        "../../botconfig.txt",
        "src/botconfig.txt",
    ];

    // Clear any existing relevant environment variables
    env::remove_var("DISCORD_TOKEN");
    env::remove_var("PREFIX");

    for config_path in &config_paths {
        match fs::read_to_string(config_path) {
            Ok(content) => {
                let config = config::parse_key_values(&content);

                // Export for compatibility with libraries that read the environment
                for (key, value) in &config {
                    env::set_var(key, value);
                }

                println!("✅ Bot configuration loaded from {}", config_path);
                return Ok(config);
            }
            Err(_) => {
                continue;
            }
        }
    }

    Err("No botconfig.txt file found in any expected location (., .., ../.., src/)".to_string())
}

#[tokio::main]
async fn main() {
    // Initialize logger - must be done before any logging calls
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("error"))
        .format_timestamp_secs()
        .init();

    // Load bot configuration from botconfig.txt file
    if let Err(error) = load_bot_config() {
        log::error!("Failed to load botconfig.txt: {}", error);
        eprintln!("❌ Failed to load botconfig.txt: {}", error);
        eprintln!("Create a botconfig.txt file in the project root with: DISCORD_TOKEN=your_token_here and PREFIX=^");
        return;
    }

    // Get Discord token from configuration
    let token = match env::var("DISCORD_TOKEN") {
        Ok(token) => {
            if token == "YOUR_BOT_TOKEN_HERE" || token.is_empty() {
                eprintln!("❌ DISCORD_TOKEN in botconfig.txt is set to placeholder! Replace with your actual Discord bot token.");
                return;
            }
            token
        }
        Err(_) => {
            eprintln!("❌ DISCORD_TOKEN not found in botconfig.txt file!");
            return;
        }
    };

    // Load API configuration (LLM, search, extractor, image backends)
    let api_config = match config::load_api_config() {
        Ok(config) => Arc::new(config),
        Err(e) => {
            log::error!("Failed to load apiconf.txt: {}", e);
            eprintln!("❌ Failed to load apiconf.txt: {}", e);
            eprintln!("Check example_apiconf.txt for the required settings.");
            return;
        }
    };

    // Content fetch pipeline, shared so the extractor credential flag is
    // process-wide
    let fetcher = match ContentFetcher::new(&api_config) {
        Ok(fetcher) => Arc::new(fetcher),
        Err(e) => {
            eprintln!("❌ Failed to build HTTP client: {}", e);
            return;
        }
    };

    // Image backend rotation with coverage guarantee
    let backends = image::backends_from_config(&api_config);
    println!("🎨 {} image backend(s) in rotation", backends.len());
    let picker = match CoveragePicker::new(backends, None) {
        Ok(picker) => Arc::new(Mutex::new(picker)),
        Err(e) => {
            eprintln!("❌ Failed to set up image backend rotation: {}", e);
            return;
        }
    };

    // Get command prefix from configuration
    let prefix = env::var("PREFIX").unwrap_or_else(|_| "^".to_string());
    println!("🤖 Starting bot with prefix: '{}'", prefix);

    // Set up command framework
    let framework = StandardFramework::new()
        .configure(|c| {
            c.prefix(&prefix)
                .case_insensitivity(true)
                .no_dm_prefix(true)
                .with_whitespace(true)
        })
        .after(|_ctx, msg, command_name, result| {
            Box::pin(async move {
                if let Err(e) = result {
                    log::error!(
                        "Command '{}' failed for user {} ({}): {:?}",
                        command_name,
                        msg.author.name,
                        msg.author.id,
                        e
                    );
                }
            })
        })
        .group(&GENERAL_GROUP);

    // Configure bot intents
    let intents = GatewayIntents::non_privileged() | GatewayIntents::MESSAGE_CONTENT;

    // Create and start client
    let mut client = match Client::builder(token, intents)
        .event_handler(Handler)
        .framework(framework)
        .await
    {
        Ok(client) => client,
        Err(e) => {
            log::error!("Error creating Discord client: {:?}", e);
            eprintln!("❌ Error creating Discord client: {:?}", e);
            eprintln!("Check your token in botconfig.txt file");
            return;
        }
    };

    // Initialize shared state
    {
        let mut data = client.data.write().await;
        data.insert::<ApiConfigKey>(api_config);
        data.insert::<FetcherKey>(fetcher);
        data.insert::<ImagePickerKey>(picker);
        data.insert::<SessionMapKey>(HashMap::new());
    }

    // Run until the client stops or we get a SIGINT
    println!("🚀 Bot is running... Press Ctrl+C to stop.");
    tokio::select! {
        _ = signal::ctrl_c() => {
            println!("\n⏹️  Stopping bot gracefully...");
        }
        result = client.start() => {
            if let Err(why) = result {
                log::error!("Client error: {:?}", why);
                eprintln!("❌ Client error: {:?}", why);
            }
        }
    }

    println!("✅ Bot stopped");
}
