//! Keyed stores with get-with-default semantics.
//!
//! Every table records an access log of `{ name, was_found }` entries for the
//! lifetime of one run. The price table keeps it for diagnostics only; the
//! custom variable and input tables feed it into reconciliation.

pub mod custom;
pub mod price;
pub mod value;

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use custom::{
    ChangeSet, CustomKind, CustomLookupTable, CustomValue, CustomValueSink, NewCustomValue,
};
pub use price::{validate_price_items, PriceFallback, PriceItem, PriceLookupTable};
pub use value::{LookupValue, ValueType};

#[derive(Debug, Error, Clone, PartialEq)]
pub enum LookupError {
    #[error("{name} is stored as {stored} but was requested as {requested}")]
    TypeMismatch {
        name: String,
        stored: ValueType,
        requested: ValueType,
    },
}

pub type LookupResult<T> = std::result::Result<T, LookupError>;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct LookupHistoryEntry {
    pub name: String,
    pub was_found: bool,
}

/// Ordered access log; repeated lookups of the same key are all kept.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LookupHistory {
    entries: Vec<LookupHistoryEntry>,
}

impl LookupHistory {
    pub fn record(&mut self, name: impl Into<String>, was_found: bool) {
        self.entries.push(LookupHistoryEntry {
            name: name.into(),
            was_found,
        });
    }

    pub fn entries(&self) -> &[LookupHistoryEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Distinct names accessed during the run.
    pub fn accessed_names(&self) -> HashSet<&str> {
        self.entries.iter().map(|entry| entry.name.as_str()).collect()
    }
}

pub trait LookupTable {
    type Value;
    type Error;

    /// Returns the stored value for `key`, or records and returns `default` on a miss.
    fn get(&mut self, key: &str, default: Self::Value) -> Result<Self::Value, Self::Error>;

    fn lookup_history(&self) -> &[LookupHistoryEntry];
}
