//! Identifiers and money helpers shared across the Tycoon crates.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Result, TycoonError};

/// Signed amount of currency units.
pub type Money = i64;

macro_rules! define_id {
    ($(#[$meta:meta])* $name:ident, $label:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub i64);

        impl $name {
            /// Human readable resource name used in errors.
            pub const LABEL: &'static str = $label;

            pub fn get(self) -> i64 {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                fmt::Display::fmt(&self.0, f)
            }
        }

        impl From<i64> for $name {
            fn from(raw: i64) -> Self {
                Self(raw)
            }
        }

        impl FromStr for $name {
            type Err = TycoonError;

            fn from_str(s: &str) -> Result<Self> {
                s.trim()
                    .parse::<i64>()
                    .map(Self)
                    .map_err(|_| TycoonError::invalid(format!("{} id must be an integer, got '{}'", $label, s)))
            }
        }
    };
}

define_id!(
    /// Stable identity of a business account.
    BusinessId,
    "Business"
);
define_id!(
    /// Identity of a participant (the chat identifier in the messaging layer).
    UserId,
    "User"
);
define_id!(
    /// Catalog item identity.
    ItemId,
    "Item"
);
define_id!(
    /// Top-level catalog category.
    CategoryId,
    "Category"
);
define_id!(
    /// Catalog subcategory, child of a category.
    SubcategoryId,
    "Subcategory"
);

/// Rejects zero and negative amounts.
pub fn ensure_positive(amount: Money, what: &str) -> Result<Money> {
    if amount <= 0 {
        return Err(TycoonError::invalid(format!(
            "{} must be greater than 0, got {}",
            what, amount
        )));
    }
    Ok(amount)
}

/// Rejects negative amounts.
pub fn ensure_non_negative(amount: Money, what: &str) -> Result<Money> {
    if amount < 0 {
        return Err(TycoonError::invalid(format!(
            "{} must not be negative, got {}",
            what, amount
        )));
    }
    Ok(amount)
}

/// Parses a raw textual amount the way the dialog layer receives it.
pub fn parse_amount(raw: &str) -> Result<Money> {
    let amount = raw
        .trim()
        .parse::<Money>()
        .map_err(|_| TycoonError::invalid(format!("'{}' is not a whole number", raw.trim())))?;
    ensure_positive(amount, "amount")
}
