// SPDX-FileCopyrightText: 2025 Semiotic Labs
//
// SPDX-License-Identifier: Apache-2.0

//! Pipeline configuration shared by every provider

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::ApiError;

const DEFAULT_MAX_RATE_LIMIT_RETRIES: u32 = 5;
const DEFAULT_RETRY_AFTER_SECONDS: u64 = 60;
const DEFAULT_USER_AGENT: &str = "chain-data-client/0.1.0";
const MAX_TIMEOUT_SECONDS: u64 = 300;

/// Settings applied to every [`crate::BlockchainApi`] built from them
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Whole-request timeout, `None` waits for the transport to give up
    pub timeout_seconds: Option<u64>,
    /// Retry budget for HTTP 429 responses
    pub max_rate_limit_retries: u32,
    /// Backoff used when a 429 carries no usable `Retry-After`
    pub default_retry_after_seconds: u64,
    /// `User-Agent` sent with every request
    pub user_agent: String,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            timeout_seconds: None,
            max_rate_limit_retries: DEFAULT_MAX_RATE_LIMIT_RETRIES,
            default_retry_after_seconds: DEFAULT_RETRY_AFTER_SECONDS,
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

impl PipelineConfig {
    /// Check the values are usable
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Configuration`] for a zero or oversized timeout or an empty user agent
    pub fn validate(&self) -> Result<(), ApiError> {
        if let Some(seconds) = self.timeout_seconds {
            if seconds == 0 {
                return Err(ApiError::configuration("timeout must be greater than 0"));
            }
            if seconds > MAX_TIMEOUT_SECONDS {
                return Err(ApiError::configuration(format!(
                    "timeout cannot exceed {MAX_TIMEOUT_SECONDS}"
                )));
            }
        }
        if self.user_agent.trim().is_empty() {
            return Err(ApiError::configuration("user agent cannot be empty"));
        }
        Ok(())
    }

    /// Timeout as a duration
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_seconds.map(Duration::from_secs)
    }

    /// Default 429 backoff as a duration
    pub fn default_retry_after(&self) -> Duration {
        Duration::from_secs(self.default_retry_after_seconds)
    }
}
