//! The bot client surface.
//!
//! `Bot` collects event handlers, commands, and subscriptions at setup
//! time, then `run()` authenticates, connects the socket, and drives the
//! dispatch engine until the connection is closed or lost for good.

use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use amino_api::signer::{self, Signer, AUTH_HEADER, SIGNATURE_HEADER};
use amino_api::{ApiGateway, Session};
use amino_core::config::{BotConfig, Credentials};
use amino_core::error::AminoResult;
use amino_socket::codes::CodeMap;
use amino_socket::manager::{ConnectionManager, HandshakeProvider};
use amino_socket::subscriptions::SubscriptionRegistry;
use amino_socket::transport::{ConnectRequest, Transport, WsTransport};

use crate::commands::{Args, CommandBuilder, CommandDispatcher, CommandRegistry};
use crate::context::{Client, Context, LiveSender};
use crate::events::{EventDemultiplexer, EventRegistry};
use crate::help;
use crate::model::{Event, JsonPayloadFactory, PayloadFactory};

/// Builds the socket handshake: the signed `signbody` query parameter plus
/// the device, signature, and session auth headers.
struct SignedHandshake {
    signer: Signer,
    session: Session,
    socket_url: String,
}

impl HandshakeProvider for SignedHandshake {
    fn connect_request(&self) -> AminoResult<ConnectRequest> {
        let timestamp = signer::timestamp_ms();
        let sign_body = self.signer.socket_sign_body(timestamp);
        let signature = self.signer.signature(sign_body.as_bytes())?;

        let url = format!(
            "{}/?signbody={}",
            self.socket_url.trim_end_matches('/'),
            sign_body.replace('|', "%7C"),
        );
        let mut headers = self.signer.headers(None)?;
        headers.push((SIGNATURE_HEADER.to_string(), signature));
        headers.push((AUTH_HEADER.to_string(), self.session.auth_header()));

        Ok(ConnectRequest { url, headers })
    }
}

/// Bot client. Register handlers and commands, then `run()`.
pub struct Bot {
    config: BotConfig,
    events: EventRegistry,
    commands: CommandRegistry,
    factory: Arc<dyn PayloadFactory>,
    pending_subscriptions: Vec<(u64, String)>,
}

impl Bot {
    /// Create a bot from configuration.
    pub fn new(config: BotConfig) -> Self {
        Self {
            config,
            events: EventRegistry::new(CodeMap::with_defaults()),
            commands: CommandRegistry::new(),
            factory: Arc::new(JsonPayloadFactory),
            pending_subscriptions: Vec::new(),
        }
    }

    /// Substitute the payload factory.
    pub fn with_factory(mut self, factory: Arc<dyn PayloadFactory>) -> Self {
        self.factory = factory;
        self
    }

    /// The code map, for registering protocol extensions before binding
    /// handlers.
    pub fn codes_mut(&mut self) -> &mut CodeMap {
        self.events.codes_mut()
    }

    /// Bind a handler to an event name. Multiple handlers per name are
    /// invoked in registration order.
    pub fn on<F, Fut>(&mut self, name: &str, handler: F) -> AminoResult<()>
    where
        F: Fn(Client, Event) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = AminoResult<()>> + Send + 'static,
    {
        self.events.bind(
            name,
            Arc::new(move |client, event| Box::pin(handler(client, event))),
        )
    }

    /// Register a command.
    pub fn command<F, Fut>(&mut self, builder: CommandBuilder, handler: F) -> AminoResult<()>
    where
        F: Fn(Context, Args) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = AminoResult<()>> + Send + 'static,
    {
        self.commands.register(builder.handler(handler))
    }

    /// Subscribe to a live-layer topic. Applied when the socket connects;
    /// use the `Client` handle for runtime subscriptions.
    pub fn subscribe(&mut self, community_id: u64, topic: &str) {
        self.pending_subscriptions
            .push((community_id, topic.to_string()));
    }

    /// Authenticate, connect, and run until the connection is closed or
    /// lost for good.
    ///
    /// Exactly one credential mode must be configured; anything else is a
    /// configuration error raised before any connection attempt.
    /// Authentication failures abort startup without retry.
    pub async fn run(self) -> AminoResult<()> {
        self.run_with_transport(Arc::new(WsTransport)).await
    }

    /// `run()` over an explicit transport, for embedding and tests.
    pub async fn run_with_transport(mut self, transport: Arc<dyn Transport>) -> AminoResult<()> {
        // Configuration problems surface before any connection attempt.
        let credentials = self.config.credentials()?;
        self.config.validate_signing()?;

        let gateway = Arc::new(ApiGateway::new(&self.config.api)?);
        let session = match credentials {
            Credentials::Session(token) => {
                let session = Session::parse(&token)?;
                gateway.attach_session(session.clone()).await;
                session
            }
            Credentials::Login { email, password } => gateway.login(&email, &password).await?,
        };
        info!("authenticated as {}", session.uid);

        let registry = Arc::new(SubscriptionRegistry::new());
        for (community_id, topic) in &self.pending_subscriptions {
            registry.subscribe(*community_id, topic).await;
        }

        let handshake = Arc::new(SignedHandshake {
            signer: gateway.signer().clone(),
            session: session.clone(),
            socket_url: self.config.api.socket_url.clone(),
        });
        let (manager, signals) = ConnectionManager::new(
            transport,
            handshake,
            registry,
            (&self.config.socket).into(),
            (&self.config.socket).into(),
        );

        let client = Client::new(
            Arc::new(LiveSender::new(gateway.clone(), manager.clone())),
            &session.uid,
        );

        if self.config.commands.help_command && !self.commands.contains("help") {
            let help = help::help_command(&self.config.commands.prefix, &self.commands);
            self.commands.register(help)?;
        }

        let events = Arc::new(self.events);
        let dispatcher = Arc::new(CommandDispatcher::new(
            self.commands,
            &self.config.commands.prefix,
            self.config.commands.max_concurrency,
            self.config.commands.report_unknown,
            events.clone(),
        ));
        let demux = Arc::new(EventDemultiplexer::new(
            events,
            self.factory.clone(),
            dispatcher.clone(),
            client,
        ));

        manager.connect().await?;
        demux.run(signals).await;

        // In-flight handlers get a bounded grace period, then the socket
        // is torn down.
        dispatcher
            .shutdown(Duration::from_secs(self.config.commands.shutdown_grace_secs))
            .await;
        manager.close().await;
        Ok(())
    }
}
