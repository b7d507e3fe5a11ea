//! # M-PESA Configuration
//!
//! Configuration management for the Daraja integration.
//! All secrets are loaded from environment variables and validated once at startup.

use pay_core::{PaymentError, PaymentResult};
use std::{env, fmt, time::Duration};
use tracing::warn;

/// Default till number used when `BUSINESS_SHORT_CODE` is not set
pub const DEFAULT_SHORT_CODE: &str = "7818012";

/// Default Daraja transaction type for till (buy goods) payments
pub const DEFAULT_TRANSACTION_TYPE: &str = "CustomerBuyGoodsOnline";

/// Default account reference shown to the payer
pub const DEFAULT_ACCOUNT_REFERENCE: &str = "Promotion";

/// Default transaction description
pub const DEFAULT_TRANSACTION_DESC: &str = "Payment";

/// Default timeout for the OAuth token request
pub const DEFAULT_TOKEN_TIMEOUT: Duration = Duration::from_secs(10);

/// Default timeout for the STK push request
pub const DEFAULT_PUSH_TIMEOUT: Duration = Duration::from_secs(15);

const SANDBOX_BASE_URL: &str = "https://sandbox.safaricom.co.ke";
const PRODUCTION_BASE_URL: &str = "https://api.safaricom.co.ke";

const OAUTH_PATH: &str = "/oauth/v1/generate?grant_type=client_credentials";
const STK_PUSH_PATH: &str = "/mpesa/stkpush/v1/processrequest";

/// Daraja environment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MpesaEnvironment {
    Sandbox,
    Production,
}

impl MpesaEnvironment {
    /// Parse the `SANDBOX` flag. `1`, `true` and `yes` (any case) select the sandbox.
    pub fn from_sandbox_flag(flag: &str) -> Self {
        match flag.trim().to_lowercase().as_str() {
            "1" | "true" | "yes" => MpesaEnvironment::Sandbox,
            _ => MpesaEnvironment::Production,
        }
    }

    /// API base URL for this environment
    pub fn base_url(&self) -> &'static str {
        match self {
            MpesaEnvironment::Sandbox => SANDBOX_BASE_URL,
            MpesaEnvironment::Production => PRODUCTION_BASE_URL,
        }
    }
}

impl fmt::Display for MpesaEnvironment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MpesaEnvironment::Sandbox => f.write_str("sandbox"),
            MpesaEnvironment::Production => f.write_str("production"),
        }
    }
}

/// Daraja API configuration
#[derive(Clone)]
pub struct MpesaConfig {
    /// OAuth consumer key
    pub consumer_key: String,

    /// OAuth consumer secret
    pub consumer_secret: String,

    /// Lipa Na M-PESA passkey
    pub passkey: String,

    /// Business short code (till number)
    pub short_code: String,

    /// URL Daraja posts payment results to
    pub callback_url: String,

    /// Sandbox or production
    pub environment: MpesaEnvironment,

    /// API base URL (for testing/mocking)
    pub api_base_url: String,

    pub transaction_type: String,
    pub account_reference: String,
    pub transaction_desc: String,

    /// Timeout for the OAuth token request
    pub token_timeout: Duration,

    /// Timeout for the STK push request
    pub push_timeout: Duration,
}

impl MpesaConfig {
    /// Load configuration from environment variables.
    ///
    /// Required env vars:
    /// - `CONSUMER_KEY`
    /// - `CONSUMER_SECRET`
    /// - `PASSKEY`
    /// - `CALLBACK_URL`
    ///
    /// Optional: `BUSINESS_SHORT_CODE`, `SANDBOX` (default `true`),
    /// `TRANSACTION_TYPE`, `ACCOUNT_REFERENCE`, `TRANSACTION_DESC`.
    pub fn from_env() -> PaymentResult<Self> {
        dotenvy::dotenv().ok(); // Load .env file if present
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Build and validate configuration from an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> PaymentResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let optional = |name: &str, default: &str| {
            lookup(name)
                .filter(|v| !v.trim().is_empty())
                .unwrap_or_else(|| default.to_string())
        };

        let environment =
            MpesaEnvironment::from_sandbox_flag(&lookup("SANDBOX").unwrap_or_else(|| "true".into()));

        let config = Self {
            consumer_key: lookup("CONSUMER_KEY").unwrap_or_default(),
            consumer_secret: lookup("CONSUMER_SECRET").unwrap_or_default(),
            passkey: lookup("PASSKEY").unwrap_or_default(),
            short_code: optional("BUSINESS_SHORT_CODE", DEFAULT_SHORT_CODE),
            callback_url: lookup("CALLBACK_URL").unwrap_or_default(),
            environment,
            api_base_url: environment.base_url().to_string(),
            transaction_type: optional("TRANSACTION_TYPE", DEFAULT_TRANSACTION_TYPE),
            account_reference: optional("ACCOUNT_REFERENCE", DEFAULT_ACCOUNT_REFERENCE),
            transaction_desc: optional("TRANSACTION_DESC", DEFAULT_TRANSACTION_DESC),
            token_timeout: DEFAULT_TOKEN_TIMEOUT,
            push_timeout: DEFAULT_PUSH_TIMEOUT,
        };

        config.validate()?;
        Ok(config)
    }

    /// Create sandbox config with explicit values (for testing)
    pub fn new(
        consumer_key: impl Into<String>,
        consumer_secret: impl Into<String>,
        passkey: impl Into<String>,
        callback_url: impl Into<String>,
    ) -> Self {
        let environment = MpesaEnvironment::Sandbox;
        Self {
            consumer_key: consumer_key.into(),
            consumer_secret: consumer_secret.into(),
            passkey: passkey.into(),
            short_code: DEFAULT_SHORT_CODE.to_string(),
            callback_url: callback_url.into(),
            environment,
            api_base_url: environment.base_url().to_string(),
            transaction_type: DEFAULT_TRANSACTION_TYPE.to_string(),
            account_reference: DEFAULT_ACCOUNT_REFERENCE.to_string(),
            transaction_desc: DEFAULT_TRANSACTION_DESC.to_string(),
            token_timeout: DEFAULT_TOKEN_TIMEOUT,
            push_timeout: DEFAULT_PUSH_TIMEOUT,
        }
    }

    /// Check that every required value is present.
    pub fn validate(&self) -> PaymentResult<()> {
        let required = [
            ("CONSUMER_KEY", &self.consumer_key),
            ("CONSUMER_SECRET", &self.consumer_secret),
            ("PASSKEY", &self.passkey),
            ("BUSINESS_SHORT_CODE", &self.short_code),
            ("CALLBACK_URL", &self.callback_url),
        ];

        let missing: Vec<&str> = required
            .iter()
            .filter(|(_, value)| value.trim().is_empty())
            .map(|(name, _)| *name)
            .collect();

        if !missing.is_empty() {
            return Err(PaymentError::MissingConfiguration(format!(
                "{} must be set",
                missing.join(", ")
            )));
        }

        if !self.callback_url.starts_with("https://") {
            if self.is_production() {
                return Err(PaymentError::MissingConfiguration(
                    "CALLBACK_URL must use https in production".to_string(),
                ));
            }
            warn!(
                "CALLBACK_URL {} is not https; Daraja will not deliver callbacks to it",
                self.callback_url
            );
        }

        Ok(())
    }

    /// Check if talking to the production API
    pub fn is_production(&self) -> bool {
        self.environment == MpesaEnvironment::Production
    }

    /// OAuth client-credentials endpoint
    pub fn oauth_url(&self) -> String {
        format!("{}{}", self.api_base_url.trim_end_matches('/'), OAUTH_PATH)
    }

    /// STK push endpoint
    pub fn stk_push_url(&self) -> String {
        format!("{}{}", self.api_base_url.trim_end_matches('/'), STK_PUSH_PATH)
    }

    /// Builder: set custom API base URL (for testing)
    pub fn with_api_base_url(mut self, url: impl Into<String>) -> Self {
        self.api_base_url = url.into();
        self
    }

    /// Builder: switch environment (resets the API base URL)
    pub fn with_environment(mut self, environment: MpesaEnvironment) -> Self {
        self.environment = environment;
        self.api_base_url = environment.base_url().to_string();
        self
    }

    /// Builder: set the till number
    pub fn with_short_code(mut self, short_code: impl Into<String>) -> Self {
        self.short_code = short_code.into();
        self
    }

    pub fn with_account_reference(mut self, reference: impl Into<String>) -> Self {
        self.account_reference = reference.into();
        self
    }

    pub fn with_transaction_desc(mut self, desc: impl Into<String>) -> Self {
        self.transaction_desc = desc.into();
        self
    }

    /// Builder: set the OAuth token request timeout
    pub fn with_token_timeout(mut self, timeout: Duration) -> Self {
        self.token_timeout = timeout;
        self
    }

    /// Builder: set the STK push request timeout
    pub fn with_push_timeout(mut self, timeout: Duration) -> Self {
        self.push_timeout = timeout;
        self
    }
}

impl fmt::Debug for MpesaConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MpesaConfig")
            .field("consumer_key", &"<redacted>")
            .field("consumer_secret", &"<redacted>")
            .field("passkey", &"<redacted>")
            .field("short_code", &self.short_code)
            .field("callback_url", &self.callback_url)
            .field("environment", &self.environment)
            .field("api_base_url", &self.api_base_url)
            .field("transaction_type", &self.transaction_type)
            .field("account_reference", &self.account_reference)
            .field("transaction_desc", &self.transaction_desc)
            .field("token_timeout", &self.token_timeout)
            .field("push_timeout", &self.push_timeout)
            .finish()
    }
}
