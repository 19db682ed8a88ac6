// SPDX-FileCopyrightText: 2025 Semiotic Labs
//
// SPDX-License-Identifier: Apache-2.0

//! Shared types for the blockchain data client
//!
//! This crate provides the identifiers that are shared by the core request
//! pipeline and the provider adapters, avoiding circular dependencies.

pub mod chains;

pub use chains::{Blockchain, BlockchainParseError};
