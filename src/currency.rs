//! Currency whitelist
//!
//! Accounts carry a currency tag as text. Only the tags listed here may take
//! part in a transfer; there is no conversion, so both sides must also match.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Supported currencies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Currency {
    Usd,
    Eur,
    Cad,
}

impl Currency {
    /// Every supported currency, in display order
    pub const ALL: [Currency; 3] = [Currency::Usd, Currency::Eur, Currency::Cad];

    /// ISO 4217 tag as stored in `accounts.currency`
    pub fn as_str(&self) -> &'static str {
        match self {
            Currency::Usd => "USD",
            Currency::Eur => "EUR",
            Currency::Cad => "CAD",
        }
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Error returned when parsing a tag outside the whitelist
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unsupported currency: {0}")]
pub struct UnsupportedCurrency(pub String);

impl FromStr for Currency {
    type Err = UnsupportedCurrency;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "USD" => Ok(Currency::Usd),
            "EUR" => Ok(Currency::Eur),
            "CAD" => Ok(Currency::Cad),
            other => Err(UnsupportedCurrency(other.to_string())),
        }
    }
}

/// Returns true if the tag is in the whitelist.
///
/// Matching is exact: tags are stored upper-case and `"usd"` is rejected.
#[inline]
pub fn is_supported(tag: &str) -> bool {
    tag.parse::<Currency>().is_ok()
}
