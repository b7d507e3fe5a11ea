//! # Application State
//!
//! Shared state for the Axum application.
//! Holds the push strategy (and with it the token cache), the callback
//! handler, and configuration. Everything is built once at startup.

use pay_core::BoxedPushStrategy;
use pay_mpesa::{CallbackHandler, LoggingCallbackHandler, MpesaConfig, MpesaStkStrategy};
use std::net::SocketAddr;
use std::sync::Arc;

/// Application configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Host to bind to
    pub host: String,
    /// Port to listen on
    pub port: u16,
}

impl AppConfig {
    /// Load from environment variables
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from an arbitrary variable lookup. An unparsable `PORT` is an error.
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let host = lookup("HOST")
            .filter(|h| !h.trim().is_empty())
            .unwrap_or_else(|| "0.0.0.0".to_string());

        let port = match lookup("PORT").filter(|p| !p.trim().is_empty()) {
            Some(p) => p
                .trim()
                .parse()
                .map_err(|e| anyhow::anyhow!("Invalid PORT {:?}: {}", p, e))?,
            None => 5000,
        };

        Ok(Self { host, port })
    }

    /// Get the socket address to bind to
    pub fn socket_addr(&self) -> anyhow::Result<SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .map_err(|e| anyhow::anyhow!("Invalid socket address {}:{}: {}", self.host, self.port, e))
    }
}

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Push-payment strategy (owns the token cache)
    pub payments: BoxedPushStrategy,
    /// Receives parsed payment-result callbacks
    pub callbacks: Arc<dyn CallbackHandler>,
    /// Provider configuration (till number, environment)
    pub mpesa: Arc<MpesaConfig>,
    /// Application config
    pub config: AppConfig,
}

impl AppState {
    /// Create a new AppState from the environment.
    ///
    /// Fails if any required provider setting is missing.
    pub fn new() -> anyhow::Result<Self> {
        let config = AppConfig::from_env()?;

        let mpesa = MpesaConfig::from_env()
            .map_err(|e| anyhow::anyhow!("Invalid M-PESA configuration: {}", e))?;

        let strategy = MpesaStkStrategy::new(mpesa.clone())
            .map_err(|e| anyhow::anyhow!("Failed to initialize M-PESA: {}", e))?;

        Ok(Self::with_strategy(config, mpesa, Arc::new(strategy)))
    }

    /// Assemble state around an explicit strategy
    pub fn with_strategy(config: AppConfig, mpesa: MpesaConfig, payments: BoxedPushStrategy) -> Self {
        Self {
            payments,
            callbacks: Arc::new(LoggingCallbackHandler),
            mpesa: Arc::new(mpesa),
            config,
        }
    }

    /// Builder: replace the callback handler
    pub fn with_callback_handler(mut self, handler: Arc<dyn CallbackHandler>) -> Self {
        self.callbacks = handler;
        self
    }

    /// Till number shown on the pay form
    pub fn till(&self) -> &str {
        &self.mpesa.short_code
    }
}
