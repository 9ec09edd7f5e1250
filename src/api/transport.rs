use reqwest::header::{HeaderMap, HeaderValue, CONNECTION};
use reqwest::{Client, Proxy, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;
use tracing::debug;

use crate::api::retry::{retry_if, BackoffPolicy};
use crate::config::ProxyConfig;
use crate::error::TransportError;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// HTTP client every network-facing component goes through.
///
/// Requests leave through the configured forward proxy (if any) and are retried with
/// exponential backoff on connection-level failures only. Non-2xx statuses are returned
/// to the caller on the first attempt.
#[derive(Debug, Clone)]
pub struct Transport {
    client: Client,
    policy: BackoffPolicy,
}

impl Transport {
    pub fn new(proxy: Option<&ProxyConfig>) -> Result<Self, TransportError> {
        let mut default_headers = HeaderMap::new();
        default_headers.insert(CONNECTION, HeaderValue::from_static("keep-alive"));

        let mut builder = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .default_headers(default_headers);

        if let Some(proxy_config) = proxy {
            let mut proxy = Proxy::all(&proxy_config.url)
                .map_err(|e| TransportError::Build(format!("Invalid proxy URL: {}", e)))?;
            if let Some(username) = &proxy_config.username {
                proxy = proxy.basic_auth(username, proxy_config.password.as_deref().unwrap_or(""));
            }
            // The egress proxy re-signs TLS with its own certificate
            builder = builder.proxy(proxy).danger_accept_invalid_certs(true);
        }

        let client = builder
            .build()
            .map_err(|e| TransportError::Build(e.to_string()))?;

        Ok(Self {
            client,
            policy: BackoffPolicy::transport(),
        })
    }

    pub fn with_policy(mut self, policy: BackoffPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub async fn post_json<B, T>(
        &self,
        url: &str,
        body: &B,
        headers: &[(&str, &str)],
    ) -> Result<T, TransportError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        retry_if(
            &self.policy,
            &format!("POST {}", url),
            || self.send(url, with_headers(self.client.post(url).json(body), headers)),
            |e: &TransportError| e.is_retryable(),
        )
        .await
    }

    pub async fn get_json<T>(&self, url: &str, headers: &[(&str, &str)]) -> Result<T, TransportError>
    where
        T: DeserializeOwned,
    {
        retry_if(
            &self.policy,
            &format!("GET {}", url),
            || self.send(url, with_headers(self.client.get(url), headers)),
            |e: &TransportError| e.is_retryable(),
        )
        .await
    }

    async fn send<T: DeserializeOwned>(
        &self,
        url: &str,
        request: RequestBuilder,
    ) -> Result<T, TransportError> {
        let response = request
            .send()
            .await
            .map_err(|e| TransportError::classify(url, e))?;

        let status = response.status();
        if !status.is_success() {
            debug!("{} answered with status {}", url, status);
            return Err(TransportError::Status { url: url.to_string(), status });
        }

        response
            .json::<T>()
            .await
            .map_err(|e| TransportError::classify(url, e))
    }
}

fn with_headers(mut request: RequestBuilder, headers: &[(&str, &str)]) -> RequestBuilder {
    for (name, value) in headers {
        request = request.header(*name, *value);
    }
    request
}
