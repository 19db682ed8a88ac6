// SPDX-FileCopyrightText: 2025 Semiotic Labs
//
// SPDX-License-Identifier: Apache-2.0

//! Provider registry
//!
//! Routes capability calls to the adapter configured for a blockchain. Every
//! adapter registered here throttles through the registry's single
//! [`RateLimiter`], so adapters sharing a base URL also share its interval.

use std::{collections::HashMap, sync::Arc};

use api_client::{
    ApiError, Balance, BalanceProvider, Nft, ParseResult, RateLimiter, Sleeper, TokioSleeper,
    Transaction, TransactionsProvider,
};
use shared_types::Blockchain;
use tracing::{debug, info, warn};

use crate::{HaskoinClient, InfuraClient, ProvidersConfig, SimpleHashClient, simplehash};

/// Registry of provider adapters keyed by blockchain
#[derive(Debug)]
pub struct ProviderRegistry {
    limiter: Arc<RateLimiter>,
    sleeper: Arc<dyn Sleeper>,
    haskoin: Option<HaskoinClient>,
    infura: Option<InfuraClient>,
    simplehash: HashMap<Blockchain, SimpleHashClient>,
}

/// Error type for registry operations
#[derive(Debug, thiserror::Error)]
#[allow(missing_docs)]
pub enum RegistryError {
    /// No adapter offers the capability on this blockchain
    #[error("no {capability} provider configured for {blockchain}")]
    UnsupportedBlockchain {
        blockchain: Blockchain,
        capability: &'static str,
    },

    /// The adapter failed
    #[error(transparent)]
    Api(#[from] ApiError),
}

impl Default for ProviderRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ProviderRegistry {
    /// Create an empty registry waiting on the tokio timer
    pub fn new() -> Self {
        Self::with_sleeper(Arc::new(TokioSleeper))
    }

    /// Create an empty registry whose limiter and 429 backoff wait through `sleeper`
    pub fn with_sleeper(sleeper: Arc<dyn Sleeper>) -> Self {
        Self {
            limiter: Arc::new(RateLimiter::with_sleeper(Arc::clone(&sleeper))),
            sleeper,
            haskoin: None,
            infura: None,
            simplehash: HashMap::new(),
        }
    }

    /// Build every provider that has a configuration section
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::Api`] if a configured provider cannot be built
    pub fn from_config(config: &ProvidersConfig) -> Result<Self, RegistryError> {
        Self::from_config_with_sleeper(config, Arc::new(TokioSleeper))
    }

    /// [`Self::from_config`] waiting through `sleeper`
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::Api`] if a configured provider cannot be built
    pub fn from_config_with_sleeper(
        config: &ProvidersConfig,
        sleeper: Arc<dyn Sleeper>,
    ) -> Result<Self, RegistryError> {
        config.validate().map_err(ApiError::from)?;
        let mut registry = Self::with_sleeper(sleeper);

        if let Some(settings) = &config.haskoin {
            registry = registry.with_haskoin(HaskoinClient::new(settings, &config.pipeline)?);
        }
        if let Some(settings) = &config.infura {
            registry = registry.with_infura(InfuraClient::new(settings, &config.pipeline)?);
        }
        if let Some(settings) = &config.simplehash {
            for &chain in Blockchain::all() {
                if simplehash::supports(chain) {
                    registry = registry
                        .with_simplehash(SimpleHashClient::new(settings, &config.pipeline, chain)?);
                }
            }
        }

        info!(
            balances = ?registry.balance_blockchains(),
            nfts = registry.simplehash.len(),
            "provider registry ready"
        );
        Ok(registry)
    }

    /// Register the Haskoin adapter
    #[must_use]
    pub fn with_haskoin(mut self, client: HaskoinClient) -> Self {
        self.haskoin = Some(
            client
                .with_sleeper(Arc::clone(&self.sleeper))
                .with_rate_limiter(Arc::clone(&self.limiter)),
        );
        self
    }

    /// Register the Infura adapter
    #[must_use]
    pub fn with_infura(mut self, client: InfuraClient) -> Self {
        self.infura = Some(
            client
                .with_sleeper(Arc::clone(&self.sleeper))
                .with_rate_limiter(Arc::clone(&self.limiter)),
        );
        self
    }

    /// Register a SimpleHash adapter for its blockchain
    #[must_use]
    pub fn with_simplehash(mut self, client: SimpleHashClient) -> Self {
        let chain = client.chain();
        self.simplehash.insert(
            chain,
            client
                .with_sleeper(Arc::clone(&self.sleeper))
                .with_rate_limiter(Arc::clone(&self.limiter)),
        );
        self
    }

    /// Limiter shared by every registered adapter
    pub fn rate_limiter(&self) -> &Arc<RateLimiter> {
        &self.limiter
    }

    /// Blockchains with a balance provider
    pub fn balance_blockchains(&self) -> Vec<Blockchain> {
        let mut chains = Vec::new();
        if let Some(client) = &self.haskoin {
            chains.push(client.api().options().blockchain);
        }
        if let Some(client) = &self.infura {
            chains.push(client.api().options().blockchain);
        }
        chains
    }

    /// Blockchains with an NFT provider
    pub fn nft_blockchains(&self) -> Vec<Blockchain> {
        Blockchain::all()
            .iter()
            .copied()
            .filter(|chain| self.simplehash.contains_key(chain))
            .collect()
    }

    /// Balances of `address` on `blockchain`
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::UnsupportedBlockchain`] when no adapter serves the
    /// blockchain, or the adapter's error
    pub async fn get_balance(
        &self,
        blockchain: Blockchain,
        address: &str,
    ) -> Result<Vec<Balance>, RegistryError> {
        debug!(%blockchain, address, "routing balance request");
        let result = if let Some(client) = self
            .haskoin
            .as_ref()
            .filter(|client| client.api().options().blockchain == blockchain)
        {
            client.get_balance(address).await
        } else if let Some(client) = self
            .infura
            .as_ref()
            .filter(|client| client.api().options().blockchain == blockchain)
        {
            client.get_balance(address).await
        } else {
            return Err(unsupported(blockchain, "balance"));
        };

        result.map_err(|error| {
            warn!(%blockchain, %error, "balance request failed");
            RegistryError::from(error)
        })
    }

    /// A window of the transaction history of `address` on `blockchain`
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::UnsupportedBlockchain`] when no adapter serves the
    /// blockchain, or the adapter's error
    pub async fn get_transactions(
        &self,
        blockchain: Blockchain,
        address: &str,
        offset: u32,
        limit: u32,
        unconfirmed: bool,
    ) -> Result<Vec<Transaction>, RegistryError> {
        let client = self
            .haskoin
            .as_ref()
            .filter(|client| client.api().options().blockchain == blockchain)
            .ok_or_else(|| unsupported(blockchain, "transactions"))?;

        debug!(%blockchain, address, offset, limit, "routing transactions request");
        Ok(client
            .get_transactions(address, offset, limit, unconfirmed)
            .await?)
    }

    /// Every NFT owned by `address` on `blockchain`, up to `max_pages` pages
    ///
    /// Page failures are reported in [`ParseResult::errors`] next to the NFTs
    /// gathered before them.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::UnsupportedBlockchain`] when no adapter serves the blockchain
    pub async fn get_nfts(
        &self,
        blockchain: Blockchain,
        address: &str,
        max_pages: Option<usize>,
    ) -> Result<ParseResult<Nft>, RegistryError> {
        let client = self
            .simplehash
            .get(&blockchain)
            .ok_or_else(|| unsupported(blockchain, "nft"))?;

        debug!(%blockchain, address, "routing nft request");
        let nfts = client.fetch_all_nfts(address, max_pages).await;
        if nfts.is_err() {
            warn!(%blockchain, errors = ?nfts.errors, "nft request reported errors");
        }
        Ok(nfts)
    }
}

fn unsupported(blockchain: Blockchain, capability: &'static str) -> RegistryError {
    RegistryError::UnsupportedBlockchain {
        blockchain,
        capability,
    }
}
