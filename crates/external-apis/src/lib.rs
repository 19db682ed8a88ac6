// SPDX-FileCopyrightText: 2025 Semiotic Labs
//
// SPDX-License-Identifier: Apache-2.0

//! Blockchain data provider adapters
//!
//! Each adapter wraps a [`api_client::BlockchainApi`] pipeline and implements
//! the capability traits of `api-client` for one upstream service.
//!
//! # Architecture
//!
//! - **Adapters**: [`haskoin`] (Bitcoin balances and transactions), [`infura`]
//!   (Ethereum JSON-RPC balances), [`simplehash`] (NFTs, offers, listings)
//! - **Configuration**: [`config::ProvidersConfig`] - layered file and environment settings
//! - **Routing**: [`registry::ProviderRegistry`] - dispatches by blockchain, one shared rate limiter
//!
//! Tests simulate every upstream with wiremock.

pub mod config;
pub mod haskoin;
pub mod infura;
pub mod registry;
pub mod simplehash;

pub use config::{ConfigError, ProviderSettings, ProvidersConfig};
pub use haskoin::{Derivation, Haskoin, HaskoinClient, HaskoinRequest};
pub use infura::{Infura, InfuraClient, InfuraRequest, TokenMetadata};
pub use registry::{ProviderRegistry, RegistryError};
pub use simplehash::{SimpleHash, SimpleHashClient, SimpleHashRequest};
