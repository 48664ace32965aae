//! Built-in help command.
//!
//! Lists registered commands with a rendered usage signature:
//! `<name>` for required parameters, `[name]` for optional ones, and
//! `[name...]` for a variadic tail.

use std::sync::Arc;

use crate::commands::{ArgKind, Command, CommandBuilder, CommandRegistry, ParamSpec};

/// Render the usage signature of a command's parameter list.
pub fn signature(command: &Command) -> String {
    command
        .params
        .iter()
        .map(|param| {
            if param.variadic {
                format!("[{}...]", param.name)
            } else if param.default.is_some() {
                format!("[{}]", param.name)
            } else {
                format!("<{}>", param.name)
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Build the default `help` command over the commands registered so far.
///
/// The listing is rendered at build time, which is safe because the
/// command registry is frozen once the client runs.
pub fn help_command(prefix: &str, registry: &CommandRegistry) -> Command {
    let mut entries: Vec<(String, String, String)> = registry
        .commands()
        .iter()
        .map(|command| {
            (
                command.name.clone(),
                signature(command),
                command.description.clone(),
            )
        })
        .collect();
    entries.push((
        "help".to_string(),
        "[command]".to_string(),
        "List commands or show a command's usage".to_string(),
    ));
    entries.sort();
    let entries = Arc::new(entries);
    let prefix = prefix.to_string();

    CommandBuilder::new("help")
        .description("List commands or show a command's usage")
        .param(ParamSpec::optional("command", ArgKind::Str, ""))
        .handler(move |ctx, args| {
            let entries = entries.clone();
            let prefix = prefix.clone();
            async move {
                let query = args.str("command").unwrap_or_default().to_string();
                if query.is_empty() {
                    let listing = entries
                        .iter()
                        .map(|(name, sig, description)| {
                            let mut line = format!("{prefix}{name}");
                            if !sig.is_empty() {
                                line.push(' ');
                                line.push_str(sig);
                            }
                            if !description.is_empty() {
                                line.push_str(" - ");
                                line.push_str(description);
                            }
                            line
                        })
                        .collect::<Vec<_>>()
                        .join("\n");
                    return ctx.send(&listing).await;
                }

                match entries.iter().find(|(name, ..)| *name == query) {
                    Some((name, sig, _)) => ctx.send(&format!("{prefix}{name} {sig}")).await,
                    None => ctx.send(&format!("Unknown command: {query}")).await,
                }
            }
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use crate::commands::CommandDispatcher;
    use crate::events::EventRegistry;
    use crate::testutil::{test_client, test_message, RecordingSender};
    use amino_socket::codes::CodeMap;

    fn sample_registry() -> CommandRegistry {
        let mut registry = CommandRegistry::new();
        registry
            .register(
                CommandBuilder::new("ban")
                    .description("Ban a user")
                    .param(ParamSpec::required("user", ArgKind::Str))
                    .param(ParamSpec::optional("reason", ArgKind::Str, "no reason"))
                    .handler(|_, _| async { Ok(()) }),
            )
            .unwrap();
        registry
            .register(
                CommandBuilder::new("say")
                    .param(ParamSpec::rest("words"))
                    .handler(|_, _| async { Ok(()) }),
            )
            .unwrap();
        registry
    }

    #[test]
    fn test_signature_rendering() {
        let registry = sample_registry();
        assert_eq!(
            signature(&registry.resolve("ban").unwrap()),
            "<user> [reason]"
        );
        assert_eq!(signature(&registry.resolve("say").unwrap()), "[words...]");
    }

    async fn dispatch_help(content: &str) -> Vec<String> {
        let mut registry = sample_registry();
        let help = help_command("b!", &registry);
        registry.register(help).unwrap();

        let events = Arc::new(EventRegistry::new(CodeMap::with_defaults()));
        let dispatcher = CommandDispatcher::new(registry, "b!", 4, false, events);
        let sender = Arc::new(RecordingSender::default());
        let client = test_client(sender.clone());

        dispatcher
            .dispatch(&client, &test_message(1, "t", "uid-2", content))
            .await;

        for _ in 0..200 {
            let texts = sender.texts();
            if !texts.is_empty() {
                return texts.into_iter().map(|t| t.content).collect();
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("help produced no output");
    }

    #[tokio::test]
    async fn test_help_lists_all_commands() {
        let sent = dispatch_help("b!help").await;
        assert!(sent[0].contains("b!ban <user> [reason]"));
        assert!(sent[0].contains("b!say [words...]"));
        assert!(sent[0].contains("b!help [command]"));
    }

    #[tokio::test]
    async fn test_help_for_one_command() {
        let sent = dispatch_help("b!help ban").await;
        assert_eq!(sent[0], "b!ban <user> [reason]");
    }

    #[tokio::test]
    async fn test_help_for_unknown_command() {
        let sent = dispatch_help("b!help frobnicate").await;
        assert!(sent[0].contains("Unknown command: frobnicate"));
    }
}
