//! # Country Codes
//!
//! ISO-3166 alpha-2 country codes, normalized to upper case at construction.
//! Rule scopes, banned-country lists and counterparty countries all compare
//! through this type.

use serde::{Deserialize, Deserializer, Serialize};

use crate::error::ValidationError;

/// An upper-case, two-letter ISO-3166 alpha-2 country code.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct CountryCode(String);

impl CountryCode {
    /// Validate and normalize a country code.
    ///
    /// Surrounding whitespace is trimmed and letters are upper-cased, so
    /// `" br "` becomes `BR`.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::InvalidCountryCode`] unless the trimmed input
    /// is exactly two ASCII letters.
    pub fn new(code: impl AsRef<str>) -> Result<Self, ValidationError> {
        let trimmed = code.as_ref().trim();
        if trimmed.len() != 2 || !trimmed.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(ValidationError::InvalidCountryCode(code.as_ref().to_string()));
        }
        Ok(Self(trimmed.to_ascii_uppercase()))
    }

    /// The normalized code.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for CountryCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::str::FromStr for CountryCode {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl<'de> Deserialize<'de> for CountryCode {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        CountryCode::new(&raw).map_err(serde::de::Error::custom)
    }
}
