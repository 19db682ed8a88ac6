// SPDX-FileCopyrightText: 2025 Semiotic Labs
//
// SPDX-License-Identifier: Apache-2.0

//! Validated provider API keys
//!
//! [`ApiKey`] makes an empty credential unrepresentable and keeps the secret
//! out of `Debug` output, so configs holding one can be logged with `?config`.

use core::fmt;
use std::str::FromStr;

use crate::ApiError;

/// A non-empty API credential
///
/// ```rust
/// use api_client::ApiKey;
///
/// let key = ApiKey::new("sk-1234").unwrap();
/// assert_eq!(key.expose(), "sk-1234");
/// assert_eq!(format!("{key:?}"), "ApiKey(***)");
/// assert!(ApiKey::new("  ").is_err());
/// ```
#[derive(Clone, PartialEq, Eq)]
pub struct ApiKey(Box<str>);

impl ApiKey {
    /// Create a key, rejecting empty or whitespace-only input
    ///
    /// Surrounding whitespace is trimmed, keys pasted from env files often carry it.
    pub fn new(key: impl Into<String>) -> Result<Self, ApiError> {
        let key = key.into();
        let trimmed = key.trim();
        if trimmed.is_empty() {
            return Err(ApiError::configuration(
                "API key cannot be empty or whitespace-only",
            ));
        }
        Ok(Self(trimmed.into()))
    }

    /// Reveal the secret for use in a request
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ApiKey(***)")
    }
}

impl FromStr for ApiKey {
    type Err = ApiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_blank_keys() {
        assert!(ApiKey::new("").is_err());
        assert!(matches!(
            ApiKey::new("\t\n"),
            Err(ApiError::Configuration { .. })
        ));
    }

    #[test]
    fn trims_surrounding_whitespace() {
        let key: ApiKey = " abc123 \n".parse().unwrap();
        assert_eq!(key.expose(), "abc123");
    }

    #[test]
    fn debug_redacts_secret() {
        let key = ApiKey::new("super-secret").unwrap();
        let rendered = format!("{key:?}");
        assert!(!rendered.contains("super-secret"));
    }
}
