//! HTTP API server for the `WaChat` gateway

mod auth;
pub mod health;
pub mod manual;
pub mod webhooks;

use std::sync::Arc;

use axum::Router;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::agent::{OpenAiResponder, Responder};
use crate::channels::{Channel, WhatsAppChannel};
use crate::relay::Relay;
use crate::{Config, Result};

/// Shared state for API handlers
#[derive(Clone)]
pub struct ApiState {
    pub config: Arc<Config>,
    pub channel: Arc<dyn Channel>,
    pub responder: Arc<dyn Responder>,
    pub relay: Relay,
}

impl ApiState {
    /// Wire a relay from configuration and the given components
    #[must_use]
    pub fn new(config: Config, channel: Arc<dyn Channel>, responder: Arc<dyn Responder>) -> Self {
        let relay = Relay::new(channel.clone(), responder.clone())
            .file_search(config.has_knowledge_base())
            .echo_media(config.echo_media)
            .fallback_reply(config.fallback_reply.clone());

        Self {
            config: Arc::new(config),
            channel,
            responder,
            relay,
        }
    }
}

/// Configuration for building an API server
pub struct ApiServerBuilder {
    config: Config,
    channel: Option<Arc<dyn Channel>>,
    responder: Option<Arc<dyn Responder>>,
}

impl ApiServerBuilder {
    /// Create a new API server builder
    #[must_use]
    pub const fn new(config: Config) -> Self {
        Self {
            config,
            channel: None,
            responder: None,
        }
    }

    /// Use a specific channel instead of the `WhatsApp` Cloud API client
    #[must_use]
    pub fn channel(mut self, channel: Arc<dyn Channel>) -> Self {
        self.channel = Some(channel);
        self
    }

    /// Use a specific responder instead of the `OpenAI` client
    #[must_use]
    pub fn responder(mut self, responder: Arc<dyn Responder>) -> Self {
        self.responder = Some(responder);
        self
    }

    /// Build the API server
    ///
    /// # Errors
    ///
    /// Returns error if a default client cannot be constructed
    pub fn build(self) -> Result<ApiServer> {
        let channel = match self.channel {
            Some(channel) => channel,
            None => Arc::new(WhatsAppChannel::new(
                &self.config.whatsapp,
                self.config.http_timeout,
            )?),
        };

        let responder = match self.responder {
            Some(responder) => responder,
            None => Arc::new(OpenAiResponder::new(
                &self.config.openai,
                self.config.http_timeout,
            )?),
        };

        Ok(ApiServer {
            state: Arc::new(ApiState::new(self.config, channel, responder)),
        })
    }
}

/// API server
pub struct ApiServer {
    state: Arc<ApiState>,
}

impl ApiServer {
    /// Build the router with all routes
    #[must_use]
    pub fn router(&self) -> Router {
        let mut router = Router::new()
            .merge(health::router(self.state.clone()))
            .merge(webhooks::router(self.state.clone()));

        // Manual endpoints need a shared secret in production
        let config = &self.state.config;
        if config.api_server.api_key.is_some() || !config.is_production() {
            router = router.merge(manual::router(self.state.clone()));
        } else {
            tracing::info!("WACHAT_API_KEY not set in production, manual test endpoints disabled");
        }

        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);

        router.layer(cors).layer(TraceLayer::new_for_http())
    }

    /// Run the API server
    ///
    /// # Errors
    ///
    /// Returns error if server fails to bind or run
    pub async fn run(self) -> Result<()> {
        let port = self.state.config.api_server.port;
        let addr = format!("0.0.0.0:{port}");
        let listener = TcpListener::bind(&addr).await?;

        tracing::info!(
            port,
            environment = %self.state.config.environment,
            knowledge_base = self.state.config.has_knowledge_base(),
            "API server listening"
        );

        axum::serve(listener, self.router())
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        Ok(())
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutting down");
}
