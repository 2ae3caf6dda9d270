use serenity::{
    client::Context,
    framework::standard::{
        macros::command,
        Args, CommandResult,
    },
    model::channel::Message,
};

#[command]
pub async fn help(ctx: &Context, msg: &Message, _args: Args) -> CommandResult {
    let _typing = ctx.http.start_typing(msg.channel_id.0)?;

    let response = format!(
        "**Chad Bot - Discord AI Assistant**\n\n\
        **Basic Commands:**\n\
        • `^ping` - Test connectivity • `^echo <text>` - Echo message\n\
        • `^help` - Show this help\n\n\
        **AI Chat:**\n\
        • `^chat <prompt>` - AI chat with memory (aliases: `^llm`, `^ai`)\n\
        • `<@bot> <prompt>` - Mention the bot anywhere to chat\n\
        • Reply to a message with `<@bot> <question>` for context\n\
        • `^clearcontext` - Clear your chat history (alias: `^clear`)\n\n\
        **Tools (used automatically during chat):**\n\
        • Web search • Calculator • Image generation • Clock\n\n\
        **Direct Tools:**\n\
        • `^search <query>` - Web search with AI summary (alias: `^websearch`)\n\
        • `^imagine <prompt>` - Generate an image (aliases: `^img`, `^draw`)\n\n\
        **Setup:** `botconfig.txt` (token, prefix), `apiconf.txt` (LLM/search/image APIs)\n\
        See `example_botconfig.txt` and `example_apiconf.txt` for reference.\n\n\
        **Examples:**\n\
        • `^chat What's the weather in Oslo right now?`\n\
        • `^imagine a lighthouse at dusk` • `^search rust async book`"
    );

    msg.reply(ctx, &response).await?;
    Ok(())
}
