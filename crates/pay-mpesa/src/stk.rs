//! # STK Push
//!
//! Implementation of Daraja's Lipa Na M-PESA Online (STK push) API.
//! A successful call only means the PIN prompt was sent to the payer;
//! the outcome arrives later on the callback URL.

use crate::config::MpesaConfig;
use crate::password::{build_password, stk_timestamp};
use crate::token::{OAuthTokenSource, TokenCache, TokenSource};
use async_trait::async_trait;
use chrono::Local;
use pay_core::{
    response_body, PaymentError, PaymentInput, PaymentResult, PushAccepted, PushPaymentStrategy,
};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, error, info, instrument};

/// Daraja STK push strategy
///
/// Owns the HTTP client and the token cache shared by every request.
pub struct MpesaStkStrategy<S = OAuthTokenSource> {
    config: MpesaConfig,
    client: Client,
    tokens: Arc<TokenCache<S>>,
}

impl MpesaStkStrategy {
    /// Create a strategy backed by Daraja's OAuth endpoint
    pub fn new(config: MpesaConfig) -> PaymentResult<Self> {
        let client = Client::builder()
            .build()
            .map_err(|e| PaymentError::Network(format!("Failed to create HTTP client: {}", e)))?;

        let source = OAuthTokenSource::new(&config, client.clone());
        Ok(Self::with_token_cache(
            config,
            client,
            Arc::new(TokenCache::new(source)),
        ))
    }

    /// Create from environment variables
    pub fn from_env() -> PaymentResult<Self> {
        let config = MpesaConfig::from_env()?;
        Self::new(config)
    }
}

impl<S: TokenSource> MpesaStkStrategy<S> {
    /// Create a strategy around an existing token cache
    pub fn with_token_cache(config: MpesaConfig, client: Client, tokens: Arc<TokenCache<S>>) -> Self {
        Self {
            config,
            client,
            tokens,
        }
    }

    pub fn config(&self) -> &MpesaConfig {
        &self.config
    }

    pub fn token_cache(&self) -> &Arc<TokenCache<S>> {
        &self.tokens
    }

    /// Assemble the signed push payload for a validated input
    pub fn build_request(&self, input: &PaymentInput, timestamp: &str) -> PaymentResult<StkPushRequest> {
        let password = build_password(&self.config.short_code, &self.config.passkey, timestamp)?;
        let phone = input.phone.as_str().to_string();

        Ok(StkPushRequest {
            business_short_code: self.config.short_code.clone(),
            password,
            timestamp: timestamp.to_string(),
            transaction_type: self.config.transaction_type.clone(),
            amount: input.amount.value(),
            party_a: phone.clone(),
            party_b: self.config.short_code.clone(),
            phone_number: phone,
            call_back_url: self.config.callback_url.clone(),
            account_reference: self.config.account_reference.clone(),
            transaction_desc: self.config.transaction_desc.clone(),
        })
    }
}

#[async_trait]
impl<S: TokenSource + 'static> PushPaymentStrategy for MpesaStkStrategy<S> {
    #[instrument(skip(self, input), fields(phone = %input.phone.masked(), amount = %input.amount))]
    async fn push(&self, input: &PaymentInput) -> PaymentResult<PushAccepted> {
        let token = self.tokens.get_token().await.map_err(|e| {
            error!("Failed to get token: {}", e);
            PaymentError::UpstreamAuth(e.to_string())
        })?;

        let timestamp = stk_timestamp(&Local::now());
        let request = self.build_request(input, &timestamp)?;

        debug!(
            "Sending STK push: short_code={}, timestamp={}",
            request.business_short_code, request.timestamp
        );

        let response = self
            .client
            .post(self.config.stk_push_url())
            .bearer_auth(token.value())
            .timeout(self.config.push_timeout)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                error!("HTTP error when calling STK API: {}", e);
                PaymentError::Network(e.to_string())
            })?;

        let status = response.status();
        let text = response.text().await.map_err(|e| {
            error!("Failed to read STK API response: {}", e);
            PaymentError::Network(e.to_string())
        })?;
        let body = response_body(&text);

        if !status.is_success() {
            error!("STK push failed: status={}, body={}", status, body);
            return Err(PaymentError::ProviderRejected {
                status: status.as_u16(),
                body,
            });
        }

        info!("STK push accepted: {}", body);

        Ok(PushAccepted { response: body })
    }

    fn provider_name(&self) -> &'static str {
        "mpesa"
    }
}

// =============================================================================
// Daraja API Types
// =============================================================================

/// STK push request body
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct StkPushRequest {
    pub business_short_code: String,
    pub password: String,
    pub timestamp: String,
    pub transaction_type: String,
    pub amount: u64,
    pub party_a: String,
    pub party_b: String,
    pub phone_number: String,
    #[serde(rename = "CallBackURL")]
    pub call_back_url: String,
    pub account_reference: String,
    pub transaction_desc: String,
}

// The password decodes to the passkey, so keep it out of logs.
impl fmt::Debug for StkPushRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StkPushRequest")
            .field("business_short_code", &self.business_short_code)
            .field("password", &"<redacted>")
            .field("timestamp", &self.timestamp)
            .field("transaction_type", &self.transaction_type)
            .field("amount", &self.amount)
            .field("party_a", &self.party_a)
            .field("party_b", &self.party_b)
            .field("phone_number", &self.phone_number)
            .field("call_back_url", &self.call_back_url)
            .field("account_reference", &self.account_reference)
            .field("transaction_desc", &self.transaction_desc)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::AccessToken;
    use base64::{engine::general_purpose::STANDARD, Engine};
    use chrono::{Duration as ChronoDuration, Utc};
    use pay_core::{PaymentFields, RawAmount};
    use serde_json::json;

    struct StaticSource;

    #[async_trait]
    impl TokenSource for StaticSource {
        async fn fetch_token(&self) -> PaymentResult<AccessToken> {
            Ok(AccessToken::new("static", Utc::now() + ChronoDuration::hours(1)))
        }
    }

    fn strategy() -> MpesaStkStrategy<StaticSource> {
        let config = MpesaConfig::new("ck", "cs", "passkey", "https://relay.example.com/callback");
        MpesaStkStrategy::with_token_cache(
            config,
            Client::new(),
            Arc::new(TokenCache::new(StaticSource)),
        )
    }

    fn input(phone: &str, amount: &str) -> PaymentInput {
        PaymentFields {
            phone: Some(phone.to_string()),
            amount: Some(RawAmount::Text(amount.to_string())),
        }
        .validate()
        .unwrap()
    }

    #[test]
    fn test_build_request_fields() {
        let request = strategy()
            .build_request(&input("0712345678", "100"), "20240101120000")
            .unwrap();

        assert_eq!(request.business_short_code, "7818012");
        assert_eq!(request.party_a, "254712345678");
        assert_eq!(request.phone_number, "254712345678");
        assert_eq!(request.party_b, "7818012");
        assert_eq!(request.amount, 100);
        assert_eq!(request.transaction_type, "CustomerBuyGoodsOnline");

        let decoded = STANDARD.decode(&request.password).unwrap();
        assert_eq!(decoded, b"7818012passkey20240101120000");
    }

    #[test]
    fn test_request_wire_format() {
        let request = strategy()
            .build_request(&input("790000000", "200.9"), "20240101120000")
            .unwrap();
        let value = serde_json::to_value(&request).unwrap();

        assert_eq!(
            value,
            json!({
                "BusinessShortCode": "7818012",
                "Password": request.password,
                "Timestamp": "20240101120000",
                "TransactionType": "CustomerBuyGoodsOnline",
                "Amount": 200,
                "PartyA": "254790000000",
                "PartyB": "7818012",
                "PhoneNumber": "254790000000",
                "CallBackURL": "https://relay.example.com/callback",
                "AccountReference": "Promotion",
                "TransactionDesc": "Payment"
            })
        );
    }

    #[test]
    fn test_build_request_without_passkey() {
        let mut config = MpesaConfig::new("ck", "cs", "", "https://x");
        config.short_code = "174379".into();
        let strategy = MpesaStkStrategy::with_token_cache(
            config,
            Client::new(),
            Arc::new(TokenCache::new(StaticSource)),
        );
        let err = strategy
            .build_request(&input("0712345678", "1"), "20240101120000")
            .unwrap_err();
        assert!(matches!(err, PaymentError::MissingConfiguration(_)));
    }

    #[test]
    fn test_debug_redacts_password() {
        let request = strategy()
            .build_request(&input("0712345678", "1"), "20240101120000")
            .unwrap();
        assert!(!format!("{:?}", request).contains(&request.password));
    }

    #[test]
    fn test_provider_name() {
        assert_eq!(strategy().provider_name(), "mpesa");
    }
}
