// SPDX-FileCopyrightText: 2025 Semiotic Labs
//
// SPDX-License-Identifier: Apache-2.0

//! Provider configuration
//!
//! Settings are loaded hierarchically, later sources overriding earlier ones:
//!
//! 1. Default values
//! 2. Configuration file (`providers.json`, optional)
//! 3. Environment variables prefixed with `CHAIN_DATA__`, nested with `__`
//!    (for example `CHAIN_DATA__INFURA__API_KEY`)
//!
//! A provider is enabled by the presence of its section.

use std::{path::Path, time::Duration};

use api_client::{ApiError, ApiKey, ApiProvider, BlockchainApi, PipelineConfig};
use config::{Config, Environment, File, FileFormat, Map};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

const DEFAULT_CONFIG_FILE: &str = "providers.json";
const ENV_PREFIX: &str = "CHAIN_DATA";
const ENV_SEPARATOR: &str = "__";

/// Errors raised while loading provider configuration
#[derive(Debug, Error)]
#[allow(missing_docs)]
pub enum ConfigError {
    /// A source could not be read or deserialized
    #[error("failed to load provider configuration: {0}")]
    Load(#[from] config::ConfigError),

    /// A loaded value is unusable
    #[error("invalid configuration for {provider}: {message}")]
    Invalid { provider: String, message: String },
}

impl From<ConfigError> for ApiError {
    fn from(value: ConfigError) -> Self {
        ApiError::configuration(value.to_string())
    }
}

/// Settings of one provider
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderSettings {
    /// Overrides the provider's default base URL
    pub base_url: Option<String>,
    /// API key, when the provider needs one
    pub api_key: Option<String>,
    /// Overrides the provider's default minimum interval between calls
    pub rate_limit_seconds: Option<f64>,
}

impl ProviderSettings {
    /// Settings pointing at `base_url`
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            base_url: Some(base_url.into()),
            ..Self::default()
        }
    }

    /// Set the API key
    #[must_use]
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    /// Validated API key
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Configuration`] for a blank key
    pub fn key(&self) -> Result<Option<ApiKey>, ApiError> {
        self.api_key.as_deref().map(ApiKey::new).transpose()
    }

    /// Rate limit override as a duration
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Configuration`] for a negative or non-finite value
    pub fn rate_limit(&self) -> Result<Option<Duration>, ApiError> {
        self.rate_limit_seconds
            .map(|seconds| {
                Duration::try_from_secs_f64(seconds).map_err(|e| {
                    ApiError::configuration(format!("invalid rate limit {seconds}: {e}"))
                })
            })
            .transpose()
    }

    /// Build the pipeline of provider `P` from these settings
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Configuration`] for an unusable key, URL or pipeline config
    pub fn build_api<P: ApiProvider>(
        &self,
        pipeline: &PipelineConfig,
    ) -> Result<BlockchainApi<P>, ApiError> {
        BlockchainApi::new(self.base_url.as_deref(), self.key()?, pipeline)
    }

    fn validate(&self, provider: &str) -> Result<(), ConfigError> {
        let invalid = |message: String| ConfigError::Invalid {
            provider: provider.to_string(),
            message,
        };
        if let Some(base_url) = &self.base_url {
            Url::parse(base_url).map_err(|e| invalid(format!("base_url: {e}")))?;
        }
        self.key().map_err(|e| invalid(e.to_string()))?;
        self.rate_limit().map_err(|e| invalid(e.to_string()))?;
        Ok(())
    }
}

/// Configuration of every provider the registry may build
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProvidersConfig {
    /// Pipeline settings shared by every provider
    pub pipeline: PipelineConfig,
    /// Haskoin (Bitcoin) settings
    pub haskoin: Option<ProviderSettings>,
    /// Infura (Ethereum) settings
    pub infura: Option<ProviderSettings>,
    /// SimpleHash (NFT) settings
    pub simplehash: Option<ProviderSettings>,
}

impl ProvidersConfig {
    /// Load from `providers.json` in the working directory and the environment
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if a source cannot be read or a value is invalid
    pub fn load() -> Result<Self, ConfigError> {
        Self::build(
            File::with_name(DEFAULT_CONFIG_FILE)
                .format(FileFormat::Json)
                .required(false),
            None,
        )
    }

    /// Load from an explicit JSON file and the environment
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the file is missing or malformed, or a value is invalid
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        Self::build(
            File::from(path.as_ref()).format(FileFormat::Json).required(true),
            None,
        )
    }

    fn build(
        file: File<config::FileSourceFile, FileFormat>,
        env: Option<Map<String, String>>,
    ) -> Result<Self, ConfigError> {
        let defaults = PipelineConfig::default();
        let config = Config::builder()
            .set_default(
                "pipeline.max_rate_limit_retries",
                u64::from(defaults.max_rate_limit_retries),
            )?
            .set_default(
                "pipeline.default_retry_after_seconds",
                defaults.default_retry_after_seconds,
            )?
            .set_default("pipeline.user_agent", defaults.user_agent)?
            .add_source(file)
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator(ENV_SEPARATOR)
                    .separator(ENV_SEPARATOR)
                    .try_parsing(true)
                    .source(env),
            )
            .build()?;

        let providers: Self = config.try_deserialize()?;
        providers.validate()?;
        Ok(providers)
    }

    /// Check every section is usable
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] naming the first bad section
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.pipeline
            .validate()
            .map_err(|e| ConfigError::Invalid {
                provider: "pipeline".to_string(),
                message: e.to_string(),
            })?;
        for (provider, settings) in [
            ("haskoin", &self.haskoin),
            ("infura", &self.infura),
            ("simplehash", &self.simplehash),
        ] {
            if let Some(settings) = settings {
                settings.validate(provider)?;
            }
        }
        Ok(())
    }
}
