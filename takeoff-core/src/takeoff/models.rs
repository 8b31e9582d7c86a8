use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use rusqlite::Row;
use serde::{Deserialize, Serialize};

use crate::lookup::{CustomKind, CustomValue, LookupValue, PriceItem, ValueType};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TakeoffModel {
    pub id: String,
    pub name: String,
    pub code: String,
    pub variables: Vec<CustomValue>,
    pub inputs: Vec<CustomValue>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl TakeoffModel {
    pub(crate) fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        let created_at: Option<NaiveDateTime> = row.get("created_at")?;
        let updated_at: Option<NaiveDateTime> = row.get("updated_at")?;
        Ok(Self {
            id: row.get("id")?,
            name: row.get("name")?,
            code: row.get("code")?,
            variables: Vec::new(),
            inputs: Vec::new(),
            created_at: created_at.map(|dt| Utc.from_utc_datetime(&dt)),
            updated_at: updated_at.map(|dt| Utc.from_utc_datetime(&dt)),
        })
    }

    pub fn custom_values(&self, kind: CustomKind) -> &[CustomValue] {
        match kind {
            CustomKind::Variable => &self.variables,
            CustomKind::Input => &self.inputs,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ModelSummary {
    pub id: String,
    pub name: String,
    pub variable_count: usize,
    pub input_count: usize,
    pub updated_at: Option<DateTime<Utc>>,
}

pub(crate) fn custom_value_from_row(row: &Row<'_>) -> rusqlite::Result<CustomValue> {
    let kind_raw: String = row.get("kind")?;
    let type_raw: String = row.get("value_type")?;
    let raw: String = row.get("value")?;
    let kind = kind_raw
        .parse::<CustomKind>()
        .map_err(|err| conversion_error(2, err))?;
    let value_type = type_raw
        .parse::<ValueType>()
        .map_err(|err| conversion_error(4, err))?;
    let value = LookupValue::decode(value_type, &raw).ok_or_else(|| {
        conversion_error(5, format!("{raw:?} is not a valid {value_type}"))
    })?;
    Ok(CustomValue {
        id: row.get("id")?,
        takeoff_model_id: row.get("takeoff_model_id")?,
        kind,
        name: row.get("name")?,
        value,
    })
}

fn conversion_error(column: usize, message: String) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(
        column,
        rusqlite::types::Type::Text,
        message.into(),
    )
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PriceList {
    pub id: String,
    pub name: String,
    pub supplier: Option<String>,
    pub items: Vec<PriceItem>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PriceListSummary {
    pub id: String,
    pub name: String,
    pub supplier: Option<String>,
    pub item_count: usize,
}

pub(crate) fn price_item_from_row(row: &Row<'_>) -> rusqlite::Result<PriceItem> {
    Ok(PriceItem {
        name: row.get("name")?,
        unit_type: row.get("unit_type")?,
        price_per_unit: row.get("price_per_unit")?,
        currency: row.get("currency")?,
        category: row.get("category")?,
        width: row.get("width")?,
        height: row.get("height")?,
        length: row.get("length")?,
    })
}

/// Named building measurements handed to the script as `api.bd`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(transparent)]
pub struct BuildingDimensions(BTreeMap<String, f64>);

impl BuildingDimensions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>, value: f64) -> Self {
        self.0.insert(name.into(), value);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, value: f64) {
        self.0.insert(name.into(), value);
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        self.0.get(name).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.0.iter().map(|(name, value)| (name.as_str(), *value))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<(String, f64)> for BuildingDimensions {
    fn from_iter<I: IntoIterator<Item = (String, f64)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EstimateStatus {
    Draft,
    Finalized,
}

impl EstimateStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            EstimateStatus::Draft => "draft",
            EstimateStatus::Finalized => "finalized",
        }
    }
}

impl fmt::Display for EstimateStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EstimateStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "draft" => Ok(EstimateStatus::Draft),
            "finalized" => Ok(EstimateStatus::Finalized),
            other => Err(format!("unknown estimate status: {other}")),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Estimate {
    pub id: String,
    pub name: String,
    pub takeoff_model_id: Option<String>,
    pub status: EstimateStatus,
    pub dimensions: BuildingDimensions,
    /// Selected price lists, in lookup order.
    pub price_list_ids: Vec<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Estimate {
    pub(crate) fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        let created_at: Option<NaiveDateTime> = row.get("created_at")?;
        let updated_at: Option<NaiveDateTime> = row.get("updated_at")?;
        let dimensions: String = row.get("dimensions")?;
        Ok(Self {
            id: row.get("id")?,
            name: row.get("name")?,
            takeoff_model_id: row.get("takeoff_model_id")?,
            status: row
                .get::<_, String>("status")?
                .parse()
                .unwrap_or(EstimateStatus::Draft),
            dimensions: serde_json::from_str(&dimensions).unwrap_or_default(),
            price_list_ids: Vec::new(),
            created_at: created_at.map(|dt| Utc.from_utc_datetime(&dt)),
            updated_at: updated_at.map(|dt| Utc.from_utc_datetime(&dt)),
        })
    }
}

/// A persisted line of an estimate: a calculated item tagged with its section.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EstimateResult {
    pub section: String,
    pub name: String,
    pub qty: f64,
    pub price_lookup_key: String,
    pub price_per_unit: f64,
    pub total: f64,
    pub currency: String,
}

impl EstimateResult {
    pub(crate) fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            section: row.get("section")?,
            name: row.get("name")?,
            qty: row.get("qty")?,
            price_lookup_key: row.get("price_lookup_key")?,
            price_per_unit: row.get("price_per_unit")?,
            total: row.get("total")?,
            currency: row.get("currency")?,
        })
    }
}

/// Raw submitted form values, keyed by input name.
pub type FormValues = BTreeMap<String, String>;
