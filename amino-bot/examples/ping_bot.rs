//! Minimal bot: replies to `/ping`, echoes with `/say`, logs messages.
//!
//! Expects a config file with credentials and signing material at the
//! default platform path (see `BotConfig::default_config_path`).

use amino_bot::{Bot, CommandBuilder, Event, ParamSpec};
use amino_core::config::BotConfig;
use amino_core::logging;

#[tokio::main]
async fn main() -> amino_core::AminoResult<()> {
    logging::init_console_logging("info");

    let config = BotConfig::load_default()?;
    let mut bot = Bot::new(config);

    bot.on("on_message", |_client, event| async move {
        if let Event::Message(message) = event {
            tracing::info!("{}: {}", message.author.nickname, message.content);
        }
        Ok(())
    })?;

    bot.command(
        CommandBuilder::new("ping").description("Round-trip check"),
        |ctx, _args| async move { ctx.reply("pong").await },
    )?;

    bot.command(
        CommandBuilder::new("say")
            .description("Repeat after me")
            .param(ParamSpec::rest("words")),
        |ctx, args| async move {
            let words = args.rest("words").unwrap_or_default().join(" ");
            ctx.send(&words).await
        },
    )?;

    bot.run().await
}
