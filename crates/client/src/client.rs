//! DCT API client with retry and SSL policy.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::error::ApiError;
use crate::retry::RetryPolicy;
use crate::transport::{
    ApiRequest, HttpMethod, RawResponse, ReqwestTransport, Transport, TransportError,
};

/// Every endpoint lives under this prefix on the DCT host.
pub const API_PREFIX: &str = "dct/v3";

static SSL_WARNING_EMITTED: AtomicBool = AtomicBool::new(false);

#[derive(Clone)]
pub struct ClientConfig {
    pub base_url: String,
    pub api_key: String,
    pub verify_ssl: bool,
    pub timeout: Duration,
    pub retry: RetryPolicy,
}

impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("base_url", &self.base_url)
            .field("api_key", &"<redacted>")
            .field("verify_ssl", &self.verify_ssl)
            .field("timeout", &self.timeout)
            .field("retry", &self.retry)
            .finish()
    }
}

impl ClientConfig {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            api_key: api_key.into(),
            verify_ssl: false,
            timeout: Duration::from_secs(30),
            retry: RetryPolicy::default(),
        }
    }
}

/// A single logical call. Retries reuse it unchanged.
#[derive(Debug, Clone)]
pub struct ApiCall {
    pub method: HttpMethod,
    pub path: String,
    pub query: Vec<(String, String)>,
    pub body: Option<serde_json::Value>,
    /// Safe to repeat after an ambiguous failure. Defaults from the method;
    /// read-only POST searches opt in explicitly.
    pub idempotent: bool,
}

impl ApiCall {
    pub fn new(method: HttpMethod, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            body: None,
            idempotent: method.is_safe(),
        }
    }

    pub fn with_query(mut self, query: Vec<(String, String)>) -> Self {
        self.query = query;
        self
    }

    pub fn with_body(mut self, body: Option<serde_json::Value>) -> Self {
        self.body = body;
        self
    }

    pub fn idempotent(mut self, idempotent: bool) -> Self {
        self.idempotent = idempotent;
        self
    }
}

enum Failure {
    Status(RawResponse),
    Transport(TransportError),
}

impl Failure {
    /// Idempotent calls retry every transient class. Mutating calls only
    /// retry failures where DCT provably did not act on the request.
    fn is_retryable(&self, idempotent: bool) -> bool {
        match self {
            Failure::Transport(err) => idempotent || !err.reached_server(),
            Failure::Status(resp) => {
                idempotent || resp.status == 429 || resp.status == 503
            }
        }
    }

    fn retry_after(&self) -> Option<Duration> {
        match self {
            Failure::Status(resp) if resp.status == 429 => resp.retry_after,
            _ => None,
        }
    }

    fn into_error(self, attempts: u32) -> ApiError {
        match self {
            Failure::Status(resp) => ApiError::Transient {
                status: Some(resp.status),
                detail: resp.body,
                attempts,
            },
            Failure::Transport(err) => ApiError::Transient {
                status: None,
                detail: err.to_string(),
                attempts,
            },
        }
    }

    fn describe(&self) -> String {
        match self {
            Failure::Status(resp) => format!("HTTP {}", resp.status),
            Failure::Transport(err) => err.to_string(),
        }
    }
}

#[derive(Clone)]
pub struct ApiClient {
    base_url: String,
    api_key: String,
    timeout: Duration,
    retry: RetryPolicy,
    transport: Arc<dyn Transport>,
}

impl fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiClient")
            .field("base_url", &self.base_url)
            .field("api_key", &"<redacted>")
            .field("timeout", &self.timeout)
            .field("retry", &self.retry)
            .finish()
    }
}

impl ApiClient {
    /// Builds a client over reqwest.
    pub fn new(config: ClientConfig) -> Result<Self, ApiError> {
        let transport = Arc::new(ReqwestTransport::new(config.verify_ssl)?);
        Self::with_transport(config, transport)
    }

    /// Builds a client over any transport.
    pub fn with_transport(
        config: ClientConfig,
        transport: Arc<dyn Transport>,
    ) -> Result<Self, ApiError> {
        let base_url = config.base_url.trim().trim_end_matches('/').to_string();
        if base_url.is_empty() {
            return Err(ApiError::ConfigError("DCT base URL is required".to_string()));
        }
        if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
            return Err(ApiError::ConfigError(format!(
                "DCT base URL must start with http:// or https://: {}",
                base_url
            )));
        }
        if config.api_key.trim().is_empty() {
            return Err(ApiError::ConfigError("DCT API key is required".to_string()));
        }

        if !config.verify_ssl && !SSL_WARNING_EMITTED.swap(true, Ordering::SeqCst) {
            warn!(
                "SSL certificate verification is disabled for {}; self-signed certificates will be accepted",
                base_url
            );
        }

        Ok(Self {
            base_url,
            api_key: config.api_key,
            timeout: config.timeout,
            retry: config.retry,
            transport,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Full URL for an endpoint path such as `/vdbs/search`.
    pub fn endpoint_url(&self, path: &str) -> String {
        let path = path.trim_start_matches('/');
        if self.base_url.ends_with(API_PREFIX) {
            format!("{}/{}", self.base_url, path)
        } else {
            format!("{}/{}/{}", self.base_url, API_PREFIX, path)
        }
    }

    /// Issues `method path` with retry semantics derived from the method.
    pub async fn call(
        &self,
        method: HttpMethod,
        path: &str,
        params: Vec<(String, String)>,
        body: Option<serde_json::Value>,
    ) -> Result<RawResponse, ApiError> {
        let call = ApiCall::new(method, path)
            .with_query(params)
            .with_body(body);
        self.execute(call).await
    }

    pub async fn execute(&self, call: ApiCall) -> Result<RawResponse, ApiError> {
        let request = ApiRequest {
            method: call.method,
            url: self.endpoint_url(&call.path),
            headers: self.headers(),
            query: call.query,
            body: call.body,
            timeout: self.timeout,
        };

        let mut attempt: u32 = 0;
        loop {
            debug!(
                "DCT {} {} attempt {}/{}",
                request.method,
                call.path,
                attempt + 1,
                self.retry.max_retries + 1
            );

            let failure = match self.transport.send(request.clone()).await {
                Ok(resp) if resp.is_success() => return Ok(resp),
                Ok(resp) if resp.status == 429 || resp.status >= 500 => Failure::Status(resp),
                Ok(resp) => {
                    return Err(ApiError::Client {
                        status: resp.status,
                        body: resp.body,
                    })
                }
                Err(err) => Failure::Transport(err),
            };

            if !failure.is_retryable(call.idempotent) {
                warn!(
                    "DCT {} {} failed ({}); not retrying a non-idempotent request",
                    request.method,
                    call.path,
                    failure.describe()
                );
                return Err(failure.into_error(attempt + 1));
            }
            if !self.retry.has_budget(attempt) {
                warn!(
                    "DCT {} {} failed after {} attempts: {}",
                    request.method,
                    call.path,
                    attempt + 1,
                    failure.describe()
                );
                return Err(failure.into_error(attempt + 1));
            }

            let delay = self.retry.delay_for(attempt, failure.retry_after());
            warn!(
                "DCT {} {} failed (attempt {}): {}; retrying in {:?}",
                request.method,
                call.path,
                attempt + 1,
                failure.describe(),
                delay
            );
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }

    fn headers(&self) -> Vec<(String, String)> {
        vec![
            ("Authorization".to_string(), format!("apk {}", self.api_key)),
            ("Content-Type".to_string(), "application/json".to_string()),
            ("Accept".to_string(), "application/json".to_string()),
        ]
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;

    struct NoopTransport;

    #[async_trait::async_trait]
    impl Transport for NoopTransport {
        async fn send(&self, _request: ApiRequest) -> Result<RawResponse, TransportError> {
            Ok(RawResponse::new(200, "{}"))
        }
    }

    fn client(base_url: &str) -> ApiClient {
        ApiClient::with_transport(ClientConfig::new(base_url, "secret"), Arc::new(NoopTransport))
            .unwrap()
    }

    #[test]
    fn test_endpoint_url_adds_prefix() {
        let client = client("https://dct.example.com/");
        assert_eq!(
            client.endpoint_url("/vdbs/search"),
            "https://dct.example.com/dct/v3/vdbs/search"
        );
    }

    #[test]
    fn test_endpoint_url_keeps_existing_prefix() {
        let client = client("https://dct.example.com/dct/v3");
        assert_eq!(
            client.endpoint_url("jobs/j-1"),
            "https://dct.example.com/dct/v3/jobs/j-1"
        );
    }

    #[test]
    fn test_missing_api_key_rejected() {
        let result = ApiClient::with_transport(
            ClientConfig::new("https://dct.example.com", "  "),
            Arc::new(NoopTransport),
        );
        assert!(matches!(result, Err(ApiError::ConfigError(_))));
    }

    #[test]
    fn test_missing_base_url_rejected() {
        let result =
            ApiClient::with_transport(ClientConfig::new("", "key"), Arc::new(NoopTransport));
        assert!(matches!(result, Err(ApiError::ConfigError(_))));
    }

    #[test]
    fn test_debug_redacts_api_key() {
        let client = client("https://dct.example.com");
        let rendered = format!("{:?}", client);
        assert!(!rendered.contains("secret"));
        assert!(rendered.contains("<redacted>"));
    }

    #[test]
    fn test_search_call_marked_idempotent() {
        let call = ApiCall::new(HttpMethod::Post, "/vdbs/search").idempotent(true);
        assert!(call.idempotent);
        assert!(!ApiCall::new(HttpMethod::Post, "/vdbs/v-1/delete").idempotent);
        assert!(ApiCall::new(HttpMethod::Get, "/vdbs/v-1").idempotent);
    }
}
