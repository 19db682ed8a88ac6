// SPDX-FileCopyrightText: 2025 Semiotic Labs
//
// SPDX-License-Identifier: Apache-2.0

//! Core fetch/parse protocol for blockchain data providers
//!
//! This crate provides the request pipeline, rate limiting and result envelopes
//! shared by every provider adapter, together with the capability traits an
//! adapter implements to plug into it.
//!
//! # Core Abstractions
//!
//! - **[`BlockchainApi`]**: URL templating, session-based HTTP, response
//!   classification, 429 retry loop and error normalization
//! - **[`RateLimiter`]**: per-endpoint minimum interval with `Retry-After` override
//! - **[`FetchResult`] / [`ParseResult`]**: raw and parsed outcome envelopes
//! - **Capabilities**: [`BalanceProvider`], [`TransactionsProvider`],
//!   [`PortfolioProvider`], [`NftProvider`] / [`NftParser`] and the fail-fast
//!   [`fetch_and_parse_balance`] composition
//!
//! # Failure idioms
//!
//! [`BlockchainApi::get`] and [`BlockchainApi::post`] fail fast with [`ApiError`].
//! [`BlockchainApi::get_data`] never fails: every problem is reported through
//! [`FetchResult::errors`] so paginated and multi-call flows can aggregate them.

use thiserror::Error;

pub mod api_key;
pub mod cache;
pub mod capabilities;
pub mod config;
pub mod envelope;
pub mod pagination;
pub mod pipeline;
pub mod rate_limit;
pub mod request;
pub mod sleep;
pub mod types;

pub use api_key::ApiKey;
pub use cache::{CacheStats, TtlCache};
pub use capabilities::*;
pub use config::PipelineConfig;
pub use envelope::{FetchResult, ParseResult};
pub use pagination::collect_pages;
pub use pipeline::{ApiOptions, ApiProvider, BlockchainApi};
pub use rate_limit::{RateLimiter, time_from_retry_after};
pub use request::{CallOptions, Endpoint, render_template};
#[cfg(any(test, feature = "test-util"))]
pub use sleep::RecordingSleeper;
pub use sleep::{Sleeper, TokioSleeper};
pub use types::*;

/// Errors raised by the fail-fast paths of the pipeline and by the capability calls
#[derive(Debug, Error)]
#[allow(missing_docs)]
pub enum ApiError {
    /// Upstream answered with a non-success HTTP status
    #[error("{message}")]
    Http { status: u16, message: String },

    /// Upstream answered 200 but the payload reports a failure
    #[error("{message}")]
    Application { code: Option<i64>, message: String },

    /// A composed fetch reported errors
    #[error("{message}")]
    Fetch { message: String },

    /// Connection-level failure before a response was received
    #[error("{message}")]
    Transport { message: String },

    /// Request exceeded the configured timeout
    #[error("request timed out after {timeout_seconds} seconds")]
    Timeout { timeout_seconds: u64 },

    /// Response body could not be decoded or lacks expected fields
    #[error("{message}")]
    InvalidResponse { message: String },

    /// URL template could not be rendered
    #[error("{message}")]
    Template { message: String },

    /// Client configuration is invalid
    #[error("{message}")]
    Configuration { message: String },

    /// Caller supplied an argument the provider cannot use
    #[error("{message}")]
    InvalidInput { message: String },

    /// Adapter specific error
    #[error(transparent)]
    Custom { error: anyhow::Error },
}

impl ApiError {
    /// Short name of the failure class, used as the prefix of normalized error strings
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Http { .. } => "HttpError",
            Self::Application { .. } => "ApplicationError",
            Self::Fetch { .. } => "FetchError",
            Self::Transport { .. } => "TransportError",
            Self::Timeout { .. } => "Timeout",
            Self::InvalidResponse { .. } => "InvalidResponse",
            Self::Template { .. } => "TemplateError",
            Self::Configuration { .. } => "ConfigurationError",
            Self::InvalidInput { .. } => "InvalidInput",
            Self::Custom { .. } => "Error",
        }
    }

    /// Normalized `"{Kind}: {message}"` form reported by [`BlockchainApi::get_data`]
    pub fn to_normalized_string(&self) -> String {
        format!("{}: {}", self.kind(), self)
    }

    /// HTTP status carried by the error, if any
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Http { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Shorthand for [`ApiError::Configuration`]
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Shorthand for [`ApiError::Template`]
    pub fn template(message: impl Into<String>) -> Self {
        Self::Template {
            message: message.into(),
        }
    }

    /// Shorthand for [`ApiError::InvalidResponse`]
    pub fn invalid_response(message: impl Into<String>) -> Self {
        Self::InvalidResponse {
            message: message.into(),
        }
    }

    /// Shorthand for [`ApiError::InvalidInput`]
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn http_error_displays_reason_only() {
        let error = ApiError::Http {
            status: 400,
            message: "Bad Request".to_string(),
        };
        assert_eq!(error.to_string(), "Bad Request");
        assert_eq!(error.status(), Some(400));
        assert_eq!(error.to_normalized_string(), "HttpError: Bad Request");
    }

    #[test]
    fn normalized_string_prefixes_kind() {
        let error = ApiError::Transport {
            message: "connection refused".to_string(),
        };
        assert_eq!(
            error.to_normalized_string(),
            "TransportError: connection refused"
        );

        let error = ApiError::Timeout { timeout_seconds: 3 };
        assert_eq!(
            error.to_normalized_string(),
            "Timeout: request timed out after 3 seconds"
        );
        assert_eq!(error.status(), None);
    }

    #[test]
    fn custom_error_is_transparent() {
        let error = ApiError::Custom {
            error: anyhow::anyhow!("adapter exploded"),
        };
        assert_eq!(error.to_string(), "adapter exploded");
        assert_eq!(error.kind(), "Error");
    }
}
