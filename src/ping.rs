use serenity::{
    client::Context,
    framework::standard::{macros::command, Args, CommandResult},
    model::channel::Message,
};

#[command]
pub async fn ping(ctx: &Context, msg: &Message, _args: Args) -> CommandResult {
    let _typing = ctx.http.start_typing(msg.channel_id.0)?;
    let started = std::time::Instant::now();
    let mut reply = msg.reply(ctx, "🏓 Pong!").await?;
    let elapsed = started.elapsed().as_millis();
    reply
        .edit(&ctx.http, |m| m.content(format!("🏓 Pong! ({} ms)", elapsed)))
        .await?;
    Ok(())
}
