//! Command registration and dispatch.
//!
//! A chat message becomes a command invocation through four stages:
//! Parse (literal prefix match), Resolve (name, then alias), Convert
//! (positional tokens against the declared parameter specs), Invoke (the
//! handler as its own task under a global concurrency limit). Parse
//! failures are silent; everything after that is reported to
//! `on_command_error`, never raised to the dispatch caller.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use futures_util::future::BoxFuture;
use tokio::sync::{Mutex, Semaphore};
use tokio::task::JoinSet;
use tracing::{debug, warn};

use amino_core::error::{AminoError, AminoResult};

use crate::context::{Client, Context};
use crate::events::EventRegistry;
use crate::model::{Event, Message};

/// Declared type of a command parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArgKind {
    /// Any token, as-is.
    Str,
    /// Signed integer.
    Int,
    /// Floating point number.
    Float,
    /// Boolean: true/false, yes/no, on/off, 1/0.
    Bool,
}

impl ArgKind {
    /// Convert one token, naming the parameter on failure.
    fn convert(self, param: &str, token: &str) -> AminoResult<ArgValue> {
        let bad = || AminoError::BadArgument {
            param: param.to_string(),
            value: token.to_string(),
        };
        match self {
            Self::Str => Ok(ArgValue::Str(token.to_string())),
            Self::Int => token.parse().map(ArgValue::Int).map_err(|_| bad()),
            Self::Float => token.parse().map(ArgValue::Float).map_err(|_| bad()),
            Self::Bool => match token.to_ascii_lowercase().as_str() {
                "true" | "yes" | "on" | "1" => Ok(ArgValue::Bool(true)),
                "false" | "no" | "off" | "0" => Ok(ArgValue::Bool(false)),
                _ => Err(bad()),
            },
        }
    }
}

/// A converted argument value.
#[derive(Debug, Clone, PartialEq)]
pub enum ArgValue {
    Str(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    /// Tail captured by a variadic parameter.
    Rest(Vec<String>),
}

/// Declared command parameter.
#[derive(Debug, Clone)]
pub struct ParamSpec {
    /// Parameter name, used in error reports and argument lookup.
    pub name: String,
    /// Declared type.
    pub kind: ArgKind,
    /// Whether this parameter consumes all remaining tokens. Must be last.
    pub variadic: bool,
    /// Default token when the parameter is not supplied.
    pub default: Option<String>,
}

impl ParamSpec {
    /// A required positional parameter.
    pub fn required(name: &str, kind: ArgKind) -> Self {
        Self {
            name: name.to_string(),
            kind,
            variadic: false,
            default: None,
        }
    }

    /// An optional positional parameter with a default token.
    pub fn optional(name: &str, kind: ArgKind, default: &str) -> Self {
        Self {
            name: name.to_string(),
            kind,
            variadic: false,
            default: Some(default.to_string()),
        }
    }

    /// A variadic tail parameter capturing the remaining tokens.
    pub fn rest(name: &str) -> Self {
        Self {
            name: name.to_string(),
            kind: ArgKind::Str,
            variadic: true,
            default: None,
        }
    }
}

/// Converted arguments for one invocation, looked up by parameter name.
#[derive(Debug, Clone, Default)]
pub struct Args {
    values: Vec<(String, ArgValue)>,
}

impl Args {
    /// The raw value for a parameter.
    pub fn get(&self, name: &str) -> Option<&ArgValue> {
        self.values
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v)
    }

    /// String value of a parameter.
    pub fn str(&self, name: &str) -> Option<&str> {
        match self.get(name)? {
            ArgValue::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Integer value of a parameter.
    pub fn int(&self, name: &str) -> Option<i64> {
        match self.get(name)? {
            ArgValue::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Float value of a parameter.
    pub fn float(&self, name: &str) -> Option<f64> {
        match self.get(name)? {
            ArgValue::Float(f) => Some(*f),
            _ => None,
        }
    }

    /// Boolean value of a parameter.
    pub fn boolean(&self, name: &str) -> Option<bool> {
        match self.get(name)? {
            ArgValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Variadic tail of a parameter.
    pub fn rest(&self, name: &str) -> Option<&[String]> {
        match self.get(name)? {
            ArgValue::Rest(tokens) => Some(tokens),
            _ => None,
        }
    }
}

/// Handler invoked for a resolved command.
pub type CommandHandler =
    Arc<dyn Fn(Context, Args) -> BoxFuture<'static, AminoResult<()>> + Send + Sync>;

/// A registered command.
pub struct Command {
    /// Primary name, unique and case-sensitive.
    pub name: String,
    /// Alternative names.
    pub aliases: Vec<String>,
    /// Ordered parameter specs.
    pub params: Vec<ParamSpec>,
    /// Short description for the help listing.
    pub description: String,
    handler: CommandHandler,
}

/// Fluent builder for a command declaration.
pub struct CommandBuilder {
    name: String,
    aliases: Vec<String>,
    params: Vec<ParamSpec>,
    description: String,
}

impl CommandBuilder {
    /// Start a command declaration.
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            aliases: Vec::new(),
            params: Vec::new(),
            description: String::new(),
        }
    }

    /// Add an alias.
    pub fn alias(mut self, alias: &str) -> Self {
        self.aliases.push(alias.to_string());
        self
    }

    /// Add a positional parameter.
    pub fn param(mut self, param: ParamSpec) -> Self {
        self.params.push(param);
        self
    }

    /// Set the help description.
    pub fn description(mut self, description: &str) -> Self {
        self.description = description.to_string();
        self
    }

    /// Attach the handler, producing the command.
    pub fn handler<F, Fut>(self, handler: F) -> Command
    where
        F: Fn(Context, Args) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = AminoResult<()>> + Send + 'static,
    {
        Command {
            name: self.name,
            aliases: self.aliases,
            params: self.params,
            description: self.description,
            handler: Arc::new(move |ctx, args| Box::pin(handler(ctx, args))),
        }
    }
}

/// Registry of commands, frozen once the client runs.
#[derive(Default)]
pub struct CommandRegistry {
    commands: HashMap<String, Arc<Command>>,
    aliases: HashMap<String, String>,
}

impl CommandRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a command. Fails with `DuplicateCommand` if the name or an
    /// alias collides with anything already registered; a malformed
    /// parameter list is a configuration error.
    pub fn register(&mut self, command: Command) -> AminoResult<()> {
        for (i, param) in command.params.iter().enumerate() {
            if param.variadic && i + 1 != command.params.len() {
                return Err(AminoError::Config(format!(
                    "variadic parameter {} of command {} must be last",
                    param.name, command.name
                )));
            }
        }

        if self.is_taken(&command.name) {
            return Err(AminoError::DuplicateCommand(command.name.clone()));
        }
        for alias in &command.aliases {
            if self.is_taken(alias) {
                return Err(AminoError::DuplicateCommand(alias.clone()));
            }
        }

        for alias in &command.aliases {
            self.aliases.insert(alias.clone(), command.name.clone());
        }
        self.commands
            .insert(command.name.clone(), Arc::new(command));
        Ok(())
    }

    fn is_taken(&self, name: &str) -> bool {
        self.commands.contains_key(name) || self.aliases.contains_key(name)
    }

    /// Resolve a token to a command: exact name first, then alias.
    pub fn resolve(&self, token: &str) -> Option<Arc<Command>> {
        if let Some(command) = self.commands.get(token) {
            return Some(command.clone());
        }
        let name = self.aliases.get(token)?;
        self.commands.get(name).cloned()
    }

    /// Whether a name or alias is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.is_taken(name)
    }

    /// All registered commands, sorted by name.
    pub fn commands(&self) -> Vec<Arc<Command>> {
        let mut commands: Vec<_> = self.commands.values().cloned().collect();
        commands.sort_by(|a, b| a.name.cmp(&b.name));
        commands
    }
}

/// Parse a message into (command token, argument tokens). `None` means the
/// message is not a command; that is the common case, not an error.
pub fn parse_invocation(prefix: &str, content: &str) -> Option<(String, Vec<String>)> {
    let rest = content.strip_prefix(prefix)?;
    let mut tokens = rest.split_whitespace();
    let name = tokens.next()?;
    Some((name.to_string(), tokens.map(String::from).collect()))
}

/// Convert tokens positionally against the parameter specs.
///
/// Arity is checked before any conversion, so a short invocation always
/// reports the first missing parameter rather than a conversion failure.
pub fn convert_args(params: &[ParamSpec], tokens: &[String]) -> AminoResult<Args> {
    for (i, param) in params.iter().enumerate() {
        if i >= tokens.len() && !param.variadic && param.default.is_none() {
            return Err(AminoError::MissingArgument {
                param: param.name.clone(),
            });
        }
    }

    let mut values = Vec::with_capacity(params.len());
    let mut consumed = 0;

    for param in params {
        if param.variadic {
            values.push((
                param.name.clone(),
                ArgValue::Rest(tokens[consumed..].to_vec()),
            ));
            consumed = tokens.len();
            continue;
        }
        match tokens.get(consumed) {
            Some(token) => {
                values.push((param.name.clone(), param.kind.convert(&param.name, token)?));
                consumed += 1;
            }
            None => {
                // Arity pre-pass guarantees a default exists here.
                let default = param.default.as_deref().unwrap_or_default();
                values.push((param.name.clone(), param.kind.convert(&param.name, default)?));
            }
        }
    }

    if consumed < tokens.len() {
        return Err(AminoError::TooManyArguments {
            expected: params.len(),
            got: tokens.len(),
        });
    }

    Ok(Args { values })
}

/// Dispatches chat messages into command invocations.
pub struct CommandDispatcher {
    registry: CommandRegistry,
    prefix: String,
    limiter: Arc<Semaphore>,
    report_unknown: bool,
    events: Arc<EventRegistry>,
    tasks: Mutex<JoinSet<()>>,
}

impl CommandDispatcher {
    /// Build a dispatcher over a frozen registry.
    pub fn new(
        registry: CommandRegistry,
        prefix: &str,
        max_concurrency: usize,
        report_unknown: bool,
        events: Arc<EventRegistry>,
    ) -> Self {
        Self {
            registry,
            prefix: prefix.to_string(),
            limiter: Arc::new(Semaphore::new(max_concurrency.max(1))),
            report_unknown,
            events,
            tasks: Mutex::new(JoinSet::new()),
        }
    }

    /// The configured prefix.
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// The frozen command registry.
    pub fn registry(&self) -> &CommandRegistry {
        &self.registry
    }

    /// Run one message through Parse -> Resolve -> Convert -> Invoke.
    ///
    /// Never returns an error: command failures are reported to
    /// `on_command_error` and handler execution is isolated in its own
    /// task under the concurrency limit.
    pub async fn dispatch(&self, client: &Client, message: &Message) {
        let Some((name, tokens)) = parse_invocation(&self.prefix, &message.content) else {
            return;
        };

        let Some(command) = self.registry.resolve(&name) else {
            debug!("command not found: {name}");
            if self.report_unknown {
                if let Err(e) = client
                    .send_message(
                        message.community_id,
                        &message.thread_id,
                        &format!("Unknown command: {name}"),
                    )
                    .await
                {
                    debug!("could not report unknown command: {e}");
                }
            }
            self.report_error(
                client,
                message,
                None,
                AminoError::CommandNotFound(name),
            )
            .await;
            return;
        };

        let args = match convert_args(&command.params, &tokens) {
            Ok(args) => args,
            Err(e) => {
                debug!("argument conversion failed for {}: {e}", command.name);
                self.report_error(client, message, Some(&command.name), e)
                    .await;
                return;
            }
        };

        let ctx = Context::new(client.clone(), message.clone(), &command.name);
        let handler = command.handler.clone();
        let limiter = self.limiter.clone();
        let events = self.events.clone();
        let reporting_client = client.clone();
        let reporting_message = message.clone();
        let command_name = command.name.clone();

        let mut tasks = self.tasks.lock().await;
        while tasks.try_join_next().is_some() {}
        tasks.spawn(async move {
            // Queue in arrival order behind the global limit; permits are
            // released when the task finishes, whatever the exit path.
            let Ok(_permit) = limiter.acquire_owned().await else {
                return;
            };
            if let Err(e) = handler(ctx, args).await {
                warn!("command {command_name} failed: {e}");
                report_command_error(
                    &events,
                    &reporting_client,
                    &reporting_message,
                    Some(&command_name),
                    e,
                )
                .await;
            }
        });
    }

    async fn report_error(
        &self,
        client: &Client,
        message: &Message,
        command: Option<&str>,
        error: AminoError,
    ) {
        report_command_error(&self.events, client, message, command, error).await;
    }

    /// Number of in-flight (or queued) command handler tasks.
    pub async fn in_flight(&self) -> usize {
        self.tasks.lock().await.len()
    }

    /// Give in-flight handlers a bounded grace period, then cancel them.
    pub async fn shutdown(&self, grace: Duration) {
        let mut tasks = self.tasks.lock().await;
        let drained =
            tokio::time::timeout(grace, async { while tasks.join_next().await.is_some() {} })
                .await;
        if drained.is_err() {
            warn!("aborting command handlers still running after grace period");
            tasks.abort_all();
            while tasks.join_next().await.is_some() {}
        }
    }
}

/// Route a command-pipeline failure to the `on_command_error` handlers.
pub(crate) async fn report_command_error(
    events: &Arc<EventRegistry>,
    client: &Client,
    message: &Message,
    command: Option<&str>,
    error: AminoError,
) {
    let event = Event::CommandError {
        command: command.map(String::from),
        message: message.clone(),
        error: error.to_string(),
    };
    let handlers = events.handlers_for(amino_socket::codes::event::COMMAND_ERROR);
    if handlers.is_empty() {
        debug!("unhandled command error: {error}");
        return;
    }
    for handler in handlers {
        let client = client.clone();
        let event = event.clone();
        tokio::spawn(async move {
            if let Err(e) = handler(client, event).await {
                warn!("on_command_error handler failed: {e}");
            }
        });
    }
}
