// SPDX-FileCopyrightText: 2025 Semiotic Labs
//
// SPDX-License-Identifier: Apache-2.0

//! Request pipeline shared by every provider adapter
//!
//! [`BlockchainApi`] turns a typed request descriptor into an HTTP call and
//! classifies the response. It offers two failure idioms:
//!
//! - [`BlockchainApi::get`] / [`BlockchainApi::post`] fail fast with [`ApiError`]
//!   on any non-200 status or application-level error envelope.
//! - [`BlockchainApi::get_data`] never fails. It retries HTTP 429 responses
//!   through the configured [`Sleeper`] while the retry budget lasts and reports
//!   everything else through [`FetchResult::errors`].

use std::{
    collections::HashMap,
    fmt,
    marker::PhantomData,
    sync::{
        Arc,
        atomic::{AtomicU32, Ordering},
    },
    time::Duration,
};

use chrono::{DateTime, TimeDelta, Utc};
use reqwest::{Client, Method, Response, StatusCode, header::HeaderMap};
use serde::de::DeserializeOwned;
use serde_json::Value;
use shared_types::Blockchain;
use tracing::{Span, debug, info, instrument, warn};
use url::Url;
use uuid::Uuid;

use crate::{
    ApiError, ApiKey, FetchResult, PipelineConfig, RateLimiter,
    rate_limit::parse_http_date,
    request::{CallOptions, Endpoint, render_template},
    sleep::Sleeper,
};

/// Static configuration a provider declares once for all its instances
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ApiOptions {
    /// Blockchain served by the provider
    pub blockchain: Blockchain,
    /// Default base URL, empty when every instance must supply its own
    pub base_url: &'static str,
    /// Default minimum interval between calls
    pub rate_limit: Duration,
}

/// Compile-time description of a provider plugged into [`BlockchainApi`]
pub trait ApiProvider: Send + Sync + 'static {
    /// Name used in logs
    const NAME: &'static str;

    /// Static options
    const OPTIONS: ApiOptions;

    /// Requests the provider supports
    type Request: Endpoint;

    /// Inspect a 200 body for an embedded application-level error
    ///
    /// Only the fail-fast paths call this hook.
    fn check_application_error(_body: &Value) -> Result<(), ApiError> {
        Ok(())
    }
}

/// HTTP pipeline bound to one provider
///
/// Each instance owns its HTTP session; it is released when the instance is dropped.
pub struct BlockchainApi<P: ApiProvider> {
    client: Client,
    base_url: Url,
    api_key: Option<ApiKey>,
    sleeper: Option<Arc<dyn Sleeper>>,
    rate_limiter: Option<Arc<RateLimiter>>,
    /// Provider-wide 429 budget, shared by all request kinds of this instance
    retry_budget: AtomicU32,
    max_retries: u32,
    default_retry_after: Duration,
    timeout: Option<Duration>,
    _provider: PhantomData<fn() -> P>,
}

impl<P: ApiProvider> fmt::Debug for BlockchainApi<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BlockchainApi")
            .field("provider", &P::NAME)
            .field("base_url", &self.base_url.as_str())
            .field("api_key", &self.api_key)
            .field("sleeper", &self.sleeper)
            .field("rate_limited", &self.rate_limiter.is_some())
            .field("retry_budget", &self.retry_budget)
            .finish_non_exhaustive()
    }
}

impl<P: ApiProvider> BlockchainApi<P> {
    /// Create a pipeline for provider `P`
    ///
    /// `base_url` overrides [`ApiOptions::base_url`].
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Configuration`] when neither the override nor the
    /// provider supplies a base URL, the URL is invalid, the config fails
    /// validation, or the HTTP client cannot be built
    pub fn new(
        base_url: Option<&str>,
        api_key: Option<ApiKey>,
        config: &PipelineConfig,
    ) -> Result<Self, ApiError> {
        config.validate()?;

        let raw = base_url
            .map(str::trim)
            .filter(|url| !url.is_empty())
            .unwrap_or(P::OPTIONS.base_url)
            .trim();
        if raw.is_empty() {
            return Err(ApiError::configuration(format!(
                "{} requires a base URL",
                P::NAME
            )));
        }

        let mut base_url = Url::parse(raw)
            .map_err(|e| ApiError::configuration(format!("invalid base URL `{raw}`: {e}")))?;
        if !base_url.path().ends_with('/') {
            base_url.set_path(&format!("{}/", base_url.path()));
        }

        let mut builder = Client::builder().user_agent(config.user_agent.as_str());
        if let Some(timeout) = config.timeout() {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|e| ApiError::configuration(format!("failed to create HTTP client: {e}")))?;

        info!(
            provider = P::NAME,
            blockchain = %P::OPTIONS.blockchain,
            base_url = %base_url,
            "created blockchain API client"
        );

        Ok(Self {
            client,
            base_url,
            api_key,
            sleeper: None,
            rate_limiter: None,
            retry_budget: AtomicU32::new(config.max_rate_limit_retries),
            max_retries: config.max_rate_limit_retries,
            default_retry_after: config.default_retry_after(),
            timeout: config.timeout(),
            _provider: PhantomData,
        })
    }

    /// Enable 429 backoff through `sleeper`
    #[must_use]
    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = Some(sleeper);
        self
    }

    /// Throttle every call through `limiter`, keyed by this pipeline's base URL
    ///
    /// Registers the provider's default rate unless it is zero.
    #[must_use]
    pub fn with_rate_limiter(mut self, limiter: Arc<RateLimiter>) -> Self {
        if !P::OPTIONS.rate_limit.is_zero() {
            limiter.set_rate(self.base_url.as_str(), P::OPTIONS.rate_limit);
        }
        self.rate_limiter = Some(limiter);
        self
    }

    /// Static options of the provider
    pub fn options(&self) -> ApiOptions {
        P::OPTIONS
    }

    /// Effective base URL, always ending in `/`
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Configured API key
    pub fn api_key(&self) -> Option<&ApiKey> {
        self.api_key.as_ref()
    }

    /// Remaining 429 retries
    pub fn remaining_retries(&self) -> u32 {
        self.retry_budget.load(Ordering::SeqCst)
    }

    /// Render `request` and resolve it against the base URL
    ///
    /// Templates using `{api_key}` receive the configured key. Absolute templates
    /// are used as-is.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Template`] when the template cannot be rendered or
    /// needs an API key that is not configured
    pub fn build_request_url(&self, request: &P::Request) -> Result<Url, ApiError> {
        let template = request.template();
        let mut args = request.args();
        if template.contains("{api_key}") {
            let key = self.api_key.as_ref().ok_or_else(|| {
                ApiError::template(format!(
                    "request `{}` of {} needs an API key",
                    request.name(),
                    P::NAME
                ))
            })?;
            args.push(("api_key", key.expose().to_string()));
        }

        let path = render_template(template, &args)?;
        let url = if path.starts_with("http://") || path.starts_with("https://") {
            Url::parse(&path)
        } else {
            self.base_url.join(path.trim_start_matches('/'))
        };
        url.map_err(|e| {
            ApiError::template(format!("request `{}` built an invalid URL: {e}", request.name()))
        })
    }

    /// Issue a GET and return the decoded body, failing fast on any error
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Http`] for non-200 statuses, the provider's
    /// application error for 200-status error envelopes, and transport or
    /// decoding errors otherwise
    #[instrument(skip_all, fields(provider = P::NAME, request = request.name()))]
    pub async fn get(&self, request: &P::Request, options: &CallOptions) -> Result<Value, ApiError> {
        let url = self.build_request_url(request)?;
        let response = self.send(Method::GET, url, options, None).await?;
        self.checked_body(response).await
    }

    /// Issue a GET and deserialize the body into `T`
    ///
    /// # Errors
    ///
    /// As [`Self::get`], plus [`ApiError::InvalidResponse`] when the body does not match `T`
    pub async fn get_json<T: DeserializeOwned>(
        &self,
        request: &P::Request,
        options: &CallOptions,
    ) -> Result<T, ApiError> {
        let body = self.get(request, options).await?;
        deserialize_body(request, body)
    }

    /// Issue a POST with a JSON body and return the decoded response, failing fast
    ///
    /// # Errors
    ///
    /// As [`Self::get`]
    #[instrument(skip_all, fields(provider = P::NAME, request = request.name()))]
    pub async fn post(
        &self,
        request: &P::Request,
        body: &Value,
        options: &CallOptions,
    ) -> Result<Value, ApiError> {
        let url = self.build_request_url(request)?;
        let response = self.send(Method::POST, url, options, Some(body)).await?;
        self.checked_body(response).await
    }

    /// Issue a POST and deserialize the response into `T`
    ///
    /// # Errors
    ///
    /// As [`Self::post`], plus [`ApiError::InvalidResponse`] when the body does not match `T`
    pub async fn post_json<T: DeserializeOwned>(
        &self,
        request: &P::Request,
        body: &Value,
        options: &CallOptions,
    ) -> Result<T, ApiError> {
        let response = self.post(request, body, options).await?;
        deserialize_body(request, response)
    }

    /// Issue a GET, retrying rate-limited responses, and report the outcome as data
    ///
    /// Never fails: template, transport and decoding problems come back as a
    /// [`FetchResult`] with status `0` and a `"{Kind}: {message}"` error.
    #[instrument(skip_all, fields(provider = P::NAME, request = request.name(), request_id))]
    pub async fn get_data(&self, request: &P::Request, options: &CallOptions) -> FetchResult {
        let request_id = Uuid::new_v4();
        Span::current().record("request_id", request_id.to_string());

        match self.try_get_data(request, options).await {
            Ok(result) => result,
            Err(error) => {
                warn!(kind = error.kind(), %error, "fetch failed before a response was classified");
                FetchResult::failure(0, error.to_normalized_string())
                    .with_extra(options.extra.clone())
            }
        }
    }

    async fn try_get_data(
        &self,
        request: &P::Request,
        options: &CallOptions,
    ) -> Result<FetchResult, ApiError> {
        let url = self.build_request_url(request)?;

        loop {
            let response = self.send(Method::GET, url.clone(), options, None).await?;
            let status = response.status();
            let headers = normalize_headers(response.headers());

            if status == StatusCode::OK {
                let data = decode_json(response).await?;
                self.restore_retry_budget();
                let time = response_time(&headers);
                return Ok(FetchResult::success(status.as_u16(), data)
                    .with_headers(headers)
                    .with_time(time)
                    .with_extra(options.extra.clone()));
            }

            if status == StatusCode::TOO_MANY_REQUESTS {
                if let Some(sleeper) = &self.sleeper {
                    if self.take_retry() {
                        let delay = headers
                            .get("retry-after")
                            .and_then(|value| value.trim().parse::<u64>().ok())
                            .map_or(self.default_retry_after, Duration::from_secs);
                        warn!(
                            delay_secs = delay.as_secs(),
                            remaining = self.remaining_retries(),
                            "rate limited, backing off"
                        );
                        sleeper.sleep(delay).await;
                        continue;
                    }
                    warn!(max_retries = self.max_retries, "rate limited, retry budget exhausted");
                }
            }

            let reason = http_reason(status);
            debug!(status = status.as_u16(), %reason, "upstream returned an error status");
            return Ok(FetchResult::failure(status.as_u16(), reason)
                .with_headers(headers)
                .with_extra(options.extra.clone()));
        }
    }

    async fn send(
        &self,
        method: Method,
        url: Url,
        options: &CallOptions,
        body: Option<&Value>,
    ) -> Result<Response, ApiError> {
        if let Some(limiter) = &self.rate_limiter {
            limiter.limit_url(self.base_url.as_str(), None).await;
        }

        let mut request = self
            .client
            .request(method, url)
            .header("accept", "application/json");
        for (name, value) in &options.headers {
            request = request.header(name.as_str(), value.as_str());
        }
        if !options.params.is_empty() {
            request = request.query(&options.params);
        }
        if let Some(body) = body {
            request = request.json(body);
        }

        request.send().await.map_err(|e| self.transport_error(&e))
    }

    async fn checked_body(&self, response: Response) -> Result<Value, ApiError> {
        let status = response.status();
        if status != StatusCode::OK {
            let message = http_reason(status);
            warn!(status = status.as_u16(), %message, "upstream returned an error status");
            return Err(ApiError::Http {
                status: status.as_u16(),
                message,
            });
        }

        let body = decode_json(response).await?;
        P::check_application_error(&body).inspect_err(|error| {
            warn!(%error, "upstream reported an application error");
        })?;
        Ok(body)
    }

    fn transport_error(&self, error: &reqwest::Error) -> ApiError {
        if error.is_timeout() {
            ApiError::Timeout {
                timeout_seconds: self.timeout.map_or(0, |timeout| timeout.as_secs()),
            }
        } else if error.is_decode() {
            ApiError::invalid_response(error.to_string())
        } else {
            ApiError::Transport {
                message: error.to_string(),
            }
        }
    }

    fn take_retry(&self) -> bool {
        self.retry_budget
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
            .is_ok()
    }

    fn restore_retry_budget(&self) {
        self.retry_budget.store(self.max_retries, Ordering::SeqCst);
    }
}

/// Reason phrase for a status, or `Error {code}` when it has none
fn http_reason(status: StatusCode) -> String {
    status
        .canonical_reason()
        .map_or_else(|| format!("Error {}", status.as_u16()), str::to_string)
}

/// Header map with lowercase names; repeated headers are joined with `, `
fn normalize_headers(headers: &HeaderMap) -> HashMap<String, String> {
    let mut normalized: HashMap<String, String> = HashMap::new();
    for (name, value) in headers {
        let Ok(value) = value.to_str() else {
            continue;
        };
        normalized
            .entry(name.as_str().to_ascii_lowercase())
            .and_modify(|existing| {
                existing.push_str(", ");
                existing.push_str(value);
            })
            .or_insert_with(|| value.to_string());
    }
    normalized
}

/// Server response time from `Date`, else `now - Age`
fn response_time(headers: &HashMap<String, String>) -> Option<DateTime<Utc>> {
    if let Some(date) = headers.get("date").and_then(|date| parse_http_date(date)) {
        return Some(date);
    }
    headers
        .get("age")
        .and_then(|age| age.trim().parse::<i64>().ok())
        .and_then(TimeDelta::try_seconds)
        .and_then(|age| Utc::now().checked_sub_signed(age))
}

async fn decode_json(response: Response) -> Result<Value, ApiError> {
    let bytes = response.bytes().await.map_err(|e| ApiError::Transport {
        message: format!("failed to read response body: {e}"),
    })?;
    serde_json::from_slice(&bytes)
        .map_err(|e| ApiError::invalid_response(format!("response is not valid JSON: {e}")))
}

fn deserialize_body<T: DeserializeOwned>(
    request: &impl Endpoint,
    body: Value,
) -> Result<T, ApiError> {
    serde_json::from_value(body).map_err(|e| {
        ApiError::invalid_response(format!("unexpected `{}` response: {e}", request.name()))
    })
}

#[cfg(test)]
mod tests {
    use reqwest::header::{HeaderName, HeaderValue};

    use super::*;

    #[test]
    fn reason_phrases() {
        assert_eq!(http_reason(StatusCode::BAD_REQUEST), "Bad Request");
        assert_eq!(
            http_reason(StatusCode::INTERNAL_SERVER_ERROR),
            "Internal Server Error"
        );
        assert_eq!(
            http_reason(StatusCode::from_u16(599).unwrap()),
            "Error 599"
        );
    }

    #[test]
    fn headers_are_lowercased_and_joined() {
        let mut headers = HeaderMap::new();
        headers.append(
            HeaderName::from_static("x-trace"),
            HeaderValue::from_static("a"),
        );
        headers.append(
            HeaderName::from_static("x-trace"),
            HeaderValue::from_static("b"),
        );
        headers.insert(
            HeaderName::from_static("retry-after"),
            HeaderValue::from_static("7"),
        );

        let normalized = normalize_headers(&headers);
        assert_eq!(normalized["x-trace"], "a, b");
        assert_eq!(normalized["retry-after"], "7");
    }

    #[test]
    fn response_time_prefers_date_header() {
        let headers = HashMap::from([
            ("date".to_string(), "Wed, 21 Oct 2015 07:28:00 GMT".to_string()),
            ("age".to_string(), "30".to_string()),
        ]);
        let time = response_time(&headers).unwrap();
        assert_eq!(time.to_rfc3339(), "2015-10-21T07:28:00+00:00");
    }

    #[test]
    fn response_time_falls_back_to_age() {
        let headers = HashMap::from([("age".to_string(), "30".to_string())]);
        let time = response_time(&headers).unwrap();
        let age = (Utc::now() - time).num_seconds();
        assert!((30..=31).contains(&age), "age {age}");

        assert!(response_time(&HashMap::new()).is_none());
    }
}
