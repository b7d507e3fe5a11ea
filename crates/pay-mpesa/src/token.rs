//! # Access Tokens
//!
//! OAuth client-credentials exchange against Daraja and a one-entry cache
//! in front of it.
//!
//! The cache holds the whole token record behind a `RwLock` and never holds
//! the lock across the network call. Concurrent refreshes may each fetch a
//! token; whichever write lands last wins, and a record is always replaced
//! as a unit.

use crate::config::MpesaConfig;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use pay_core::{PaymentError, PaymentResult};
use reqwest::Client;
use serde::{de, Deserialize, Deserializer};
use serde_json::Value;
use std::fmt;
use tokio::sync::RwLock;
use tracing::{debug, error, info, instrument};

/// Tokens are refreshed this long before they actually expire
pub const SAFETY_MARGIN_SECS: i64 = 10;

/// Upper bound on honoured `expires_in` values (one day)
const MAX_EXPIRES_IN_SECS: i64 = 24 * 60 * 60;

/// A bearer token and the instant it stops being valid
#[derive(Clone, PartialEq, Eq)]
pub struct AccessToken {
    value: String,
    expires_at: DateTime<Utc>,
}

impl AccessToken {
    pub fn new(value: impl Into<String>, expires_at: DateTime<Utc>) -> Self {
        Self {
            value: value.into(),
            expires_at,
        }
    }

    /// Token value for the `Authorization: Bearer` header
    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    /// True while `now < expires_at - safety margin`
    pub fn is_usable_at(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at - Duration::seconds(SAFETY_MARGIN_SECS)
    }

    pub fn is_usable(&self) -> bool {
        self.is_usable_at(Utc::now())
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessToken")
            .field("value", &"<redacted>")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Something that can mint fresh access tokens
#[async_trait]
pub trait TokenSource: Send + Sync {
    async fn fetch_token(&self) -> PaymentResult<AccessToken>;
}

/// Daraja OAuth client-credentials token source
#[derive(Clone)]
pub struct OAuthTokenSource {
    client: Client,
    url: String,
    consumer_key: String,
    consumer_secret: String,
    timeout: std::time::Duration,
}

impl OAuthTokenSource {
    pub fn new(config: &MpesaConfig, client: Client) -> Self {
        Self {
            client,
            url: config.oauth_url(),
            consumer_key: config.consumer_key.clone(),
            consumer_secret: config.consumer_secret.clone(),
            timeout: config.token_timeout,
        }
    }
}

#[async_trait]
impl TokenSource for OAuthTokenSource {
    #[instrument(skip(self), fields(url = %self.url))]
    async fn fetch_token(&self) -> PaymentResult<AccessToken> {
        if self.consumer_key.is_empty() || self.consumer_secret.is_empty() {
            return Err(PaymentError::MissingConfiguration(
                "CONSUMER_KEY and CONSUMER_SECRET must be set".to_string(),
            ));
        }

        let requested_at = Utc::now();

        let response = self
            .client
            .get(&self.url)
            .basic_auth(&self.consumer_key, Some(&self.consumer_secret))
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| PaymentError::TokenFetchFailed(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| PaymentError::TokenFetchFailed(e.to_string()))?;

        if !status.is_success() {
            error!("Daraja OAuth error: status={}, body={}", status, body);
            return Err(PaymentError::TokenFetchFailed(format!(
                "HTTP {}: {}",
                status, body
            )));
        }

        let parsed: OAuthTokenResponse = serde_json::from_str(&body).map_err(|e| {
            PaymentError::TokenFetchFailed(format!("malformed token response: {}", e))
        })?;

        let value = parsed
            .access_token
            .filter(|t| !t.is_empty())
            .ok_or_else(|| {
                PaymentError::TokenFetchFailed(format!("Failed to get access token: {}", body))
            })?;

        let expires_in = parsed.expires_in.clamp(0, MAX_EXPIRES_IN_SECS);
        debug!("Daraja issued token valid for {}s", expires_in);

        Ok(AccessToken::new(
            value,
            requested_at + Duration::seconds(expires_in),
        ))
    }
}

#[derive(Debug, Deserialize)]
struct OAuthTokenResponse {
    #[serde(default)]
    access_token: Option<String>,
    #[serde(default, deserialize_with = "lenient_seconds")]
    expires_in: i64,
}

/// Daraja sends `expires_in` as a string (`"3599"`); accept numbers too.
fn lenient_seconds<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::Null => Ok(0),
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f as i64))
            .ok_or_else(|| de::Error::custom("expires_in out of range")),
        Value::String(s) => s.trim().parse::<i64>().map_err(de::Error::custom),
        other => Err(de::Error::custom(format!("invalid expires_in: {}", other))),
    }
}

/// One-entry token cache
pub struct TokenCache<S = OAuthTokenSource> {
    source: S,
    slot: RwLock<Option<AccessToken>>,
}

impl<S: TokenSource> TokenCache<S> {
    /// Create an empty cache
    pub fn new(source: S) -> Self {
        Self {
            source,
            slot: RwLock::new(None),
        }
    }

    /// Return a usable token, fetching a new one on miss or expiry.
    ///
    /// Failed fetches leave the cached record untouched.
    #[instrument(skip(self))]
    pub async fn get_token(&self) -> PaymentResult<AccessToken> {
        if let Some(token) = self.cached().await {
            debug!("Access token cache hit");
            return Ok(token);
        }

        debug!("Access token missing or expiring, fetching");
        let token = self.source.fetch_token().await.map_err(|e| {
            error!("Failed to fetch access token: {}", e);
            e
        })?;

        *self.slot.write().await = Some(token.clone());
        info!("Cached new access token, expires_at={}", token.expires_at());

        Ok(token)
    }

    /// The cached token, if it is still usable
    pub async fn cached(&self) -> Option<AccessToken> {
        self.slot
            .read()
            .await
            .as_ref()
            .filter(|t| t.is_usable())
            .cloned()
    }

    /// Drop the cached token so the next call fetches a new one
    pub async fn invalidate(&self) {
        *self.slot.write().await = None;
    }

    pub fn source(&self) -> &S {
        &self.source
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Arc;

    struct CountingSource {
        fetches: AtomicUsize,
        expires_in: i64,
        fail: AtomicBool,
    }

    impl CountingSource {
        fn new(expires_in: i64) -> Self {
            Self {
                fetches: AtomicUsize::new(0),
                expires_in,
                fail: AtomicBool::new(false),
            }
        }

        fn fetches(&self) -> usize {
            self.fetches.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl TokenSource for CountingSource {
        async fn fetch_token(&self) -> PaymentResult<AccessToken> {
            let n = self.fetches.fetch_add(1, Ordering::SeqCst) + 1;
            if self.fail.load(Ordering::SeqCst) {
                return Err(PaymentError::TokenFetchFailed("HTTP 500".into()));
            }
            Ok(AccessToken::new(
                format!("token-{}", n),
                Utc::now() + Duration::seconds(self.expires_in),
            ))
        }
    }

    async fn seed<S: TokenSource>(cache: &TokenCache<S>, token: AccessToken) {
        *cache.slot.write().await = Some(token);
    }

    #[test]
    fn test_usable_respects_margin() {
        let now = Utc::now();
        let token = AccessToken::new("t", now + Duration::seconds(30));
        assert!(token.is_usable_at(now));
        assert!(token.is_usable_at(now + Duration::seconds(19)));
        assert!(!token.is_usable_at(now + Duration::seconds(20)));
        assert!(!token.is_usable_at(now + Duration::seconds(31)));
    }

    #[test]
    fn test_debug_redacts_value() {
        let token = AccessToken::new("super-secret", Utc::now());
        assert!(!format!("{:?}", token).contains("super-secret"));
    }

    #[tokio::test]
    async fn test_empty_cache_fetches_once_then_hits() {
        let cache = TokenCache::new(CountingSource::new(3599));

        let first = cache.get_token().await.unwrap();
        let second = cache.get_token().await.unwrap();

        assert_eq!(first.value(), "token-1");
        assert_eq!(first, second);
        assert_eq!(cache.source().fetches(), 1);
    }

    #[tokio::test]
    async fn test_valid_token_never_fetches() {
        let cache = TokenCache::new(CountingSource::new(3599));
        let seeded = AccessToken::new("seeded", Utc::now() + Duration::seconds(3600));
        seed(&cache, seeded.clone()).await;

        for _ in 0..5 {
            assert_eq!(cache.get_token().await.unwrap(), seeded);
        }
        assert_eq!(cache.source().fetches(), 0);
    }

    #[tokio::test]
    async fn test_expired_token_fetches_exactly_once() {
        let cache = TokenCache::new(CountingSource::new(3599));
        let stale_expiry = Utc::now() - Duration::seconds(1);
        seed(&cache, AccessToken::new("stale", stale_expiry)).await;

        let fresh = cache.get_token().await.unwrap();
        assert_eq!(cache.source().fetches(), 1);
        assert_eq!(fresh.value(), "token-1");
        assert!(fresh.expires_at() > stale_expiry + Duration::seconds(3000));

        let cached = cache.cached().await.unwrap();
        assert_eq!(cached, fresh);
    }

    #[tokio::test]
    async fn test_token_inside_margin_is_refreshed() {
        let cache = TokenCache::new(CountingSource::new(3599));
        seed(
            &cache,
            AccessToken::new("nearly", Utc::now() + Duration::seconds(5)),
        )
        .await;

        assert_eq!(cache.get_token().await.unwrap().value(), "token-1");
        assert_eq!(cache.source().fetches(), 1);
    }

    #[tokio::test]
    async fn test_failures_are_not_cached() {
        let source = CountingSource::new(3599);
        source.fail.store(true, Ordering::SeqCst);
        let cache = TokenCache::new(source);
        let stale = AccessToken::new("stale", Utc::now() - Duration::seconds(60));
        seed(&cache, stale.clone()).await;

        let err = cache.get_token().await.unwrap_err();
        assert!(matches!(err, PaymentError::TokenFetchFailed(_)));
        assert_eq!(*cache.slot.read().await, Some(stale));

        cache.source().fail.store(false, Ordering::SeqCst);
        assert_eq!(cache.get_token().await.unwrap().value(), "token-2");
    }

    #[tokio::test]
    async fn test_invalidate_forces_fetch() {
        let cache = TokenCache::new(CountingSource::new(3599));
        cache.get_token().await.unwrap();
        cache.invalidate().await;
        assert!(cache.cached().await.is_none());
        assert_eq!(cache.get_token().await.unwrap().value(), "token-2");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_refresh_leaves_a_whole_token() {
        let cache = Arc::new(TokenCache::new(CountingSource::new(3599)));

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let cache = Arc::clone(&cache);
                tokio::spawn(async move { cache.get_token().await })
            })
            .collect();

        let mut issued = Vec::new();
        for handle in handles {
            issued.push(handle.await.unwrap().unwrap());
        }

        let fetches = cache.source().fetches();
        assert!((1..=16).contains(&fetches));

        let last = cache.cached().await.unwrap();
        assert!(issued.contains(&last));
    }

    #[test]
    fn test_expires_in_accepts_string_and_number() {
        let parsed: OAuthTokenResponse =
            serde_json::from_str(r#"{"access_token":"a","expires_in":"3599"}"#).unwrap();
        assert_eq!(parsed.expires_in, 3599);

        let parsed: OAuthTokenResponse =
            serde_json::from_str(r#"{"access_token":"a","expires_in":3600}"#).unwrap();
        assert_eq!(parsed.expires_in, 3600);

        let parsed: OAuthTokenResponse = serde_json::from_str(r#"{"access_token":"a"}"#).unwrap();
        assert_eq!(parsed.expires_in, 0);

        assert!(serde_json::from_str::<OAuthTokenResponse>(r#"{"expires_in":"soon"}"#).is_err());
    }
}
