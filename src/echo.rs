use serenity::{
    client::Context,
    framework::standard::{macros::command, Args, CommandResult},
    model::channel::Message,
};

#[command]
#[aliases("say")]
pub async fn echo(ctx: &Context, msg: &Message, args: Args) -> CommandResult {
    let _typing = ctx.http.start_typing(msg.channel_id.0)?;
    let text = args.message().trim();
    if text.is_empty() {
        msg.reply(ctx, "❌ Nothing to echo! Usage: `^echo <text>`").await?;
    } else {
        msg.channel_id.say(&ctx.http, text).await?;
    }
    Ok(())
}
