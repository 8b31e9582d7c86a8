use std::collections::HashMap;
use std::convert::Infallible;

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::config::PricingSection;
use crate::validation::FieldErrors;

use super::{LookupHistory, LookupHistoryEntry, LookupTable};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PriceItem {
    pub name: String,
    pub unit_type: String,
    pub price_per_unit: f64,
    pub currency: String,
    pub category: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub length: Option<f64>,
}

impl PriceItem {
    pub fn new(
        name: impl Into<String>,
        price_per_unit: f64,
        currency: impl Into<String>,
        category: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            unit_type: "unit".to_string(),
            price_per_unit,
            currency: currency.into(),
            category: category.into(),
            width: None,
            height: None,
            length: None,
        }
    }
}

/// Shape of the zero-priced item synthesized for unknown keys.
#[derive(Debug, Clone, PartialEq)]
pub struct PriceFallback {
    pub unit_type: String,
    pub currency: String,
    pub category: String,
}

impl Default for PriceFallback {
    fn default() -> Self {
        Self {
            unit_type: "unit".to_string(),
            currency: "MXN".to_string(),
            category: "Other".to_string(),
        }
    }
}

impl From<&PricingSection> for PriceFallback {
    fn from(section: &PricingSection) -> Self {
        Self {
            unit_type: section.fallback_unit_type.clone(),
            currency: section.fallback_currency.clone(),
            category: section.fallback_category.clone(),
        }
    }
}

impl PriceFallback {
    fn item_for(&self, name: &str) -> PriceItem {
        PriceItem {
            name: name.to_string(),
            unit_type: self.unit_type.clone(),
            price_per_unit: 0.0,
            currency: self.currency.clone(),
            category: self.category.clone(),
            width: None,
            height: None,
            length: None,
        }
    }
}

/// Read-only lookup over one or more price lists.
///
/// Items keep the position of their first occurrence; a later item with the
/// same name replaces the stored one in place.
#[derive(Debug, Clone, Default)]
pub struct PriceLookupTable {
    items: Vec<PriceItem>,
    index: HashMap<String, usize>,
    fallback: PriceFallback,
    history: LookupHistory,
}

impl PriceLookupTable {
    pub fn new(items: impl IntoIterator<Item = PriceItem>) -> Self {
        Self::with_fallback(items, PriceFallback::default())
    }

    pub fn with_fallback(
        items: impl IntoIterator<Item = PriceItem>,
        fallback: PriceFallback,
    ) -> Self {
        let mut table = Self {
            fallback,
            ..Self::default()
        };
        for item in items {
            match table.index.get(&item.name) {
                Some(&position) => table.items[position] = item,
                None => {
                    table.index.insert(item.name.clone(), table.items.len());
                    table.items.push(item);
                }
            }
        }
        table
    }

    /// Resolves `name`, falling back to a zero-priced item so pricing never fails.
    pub fn price(&mut self, name: &str) -> PriceItem {
        let fallback = self.fallback.item_for(name);
        self.resolve(name, fallback)
    }

    pub fn category_items(&mut self, category: &str) -> Vec<PriceItem> {
        let items: Vec<PriceItem> = self
            .items
            .iter()
            .filter(|item| item.category == category)
            .cloned()
            .collect();
        self.history.record(category, !items.is_empty());
        items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn history(&self) -> &LookupHistory {
        &self.history
    }

    fn resolve(&mut self, name: &str, default: PriceItem) -> PriceItem {
        let found = self.index.get(name).map(|&position| self.items[position].clone());
        self.history.record(name, found.is_some());
        found.unwrap_or(default)
    }
}

impl LookupTable for PriceLookupTable {
    type Value = PriceItem;
    type Error = Infallible;

    fn get(&mut self, key: &str, default: PriceItem) -> Result<PriceItem, Infallible> {
        Ok(self.resolve(key, default))
    }

    fn lookup_history(&self) -> &[LookupHistoryEntry] {
        self.history.entries()
    }
}

/// Validates raw price list rows, coercing numeric fields given as strings.
///
/// Errors are reported per field as `items[<index>].<field>`.
pub fn validate_price_items(rows: &[JsonValue]) -> Result<Vec<PriceItem>, FieldErrors> {
    let mut errors = FieldErrors::default();
    let mut items = Vec::with_capacity(rows.len());

    for (idx, row) in rows.iter().enumerate() {
        let Some(object) = row.as_object() else {
            errors.push(format!("items[{idx}]"), "expected an object");
            continue;
        };
        let mut text = |field: &str| -> Option<String> {
            match object.get(field) {
                Some(JsonValue::String(value)) => Some(value.clone()),
                Some(_) => {
                    errors.push(format!("items[{idx}].{field}"), "expected a string");
                    None
                }
                None => {
                    errors.push(format!("items[{idx}].{field}"), "required");
                    None
                }
            }
        };
        let name = text("name");
        let unit_type = text("unitType");
        let currency = text("currency");
        let category = text("category");

        let price_per_unit = match object.get("pricePerUnit") {
            None | Some(JsonValue::Null) => {
                errors.push(format!("items[{idx}].pricePerUnit"), "required");
                None
            }
            Some(value) => coerce_number(value).or_else(|| {
                errors.push(format!("items[{idx}].pricePerUnit"), "expected a number");
                None
            }),
        };

        let mut dimension = |field: &str| -> Option<f64> {
            match object.get(field) {
                None | Some(JsonValue::Null) => None,
                Some(value) => coerce_number(value).or_else(|| {
                    errors.push(format!("items[{idx}].{field}"), "expected a number");
                    None
                }),
            }
        };
        let width = dimension("width");
        let height = dimension("height");
        let length = dimension("length");

        if let (Some(name), Some(unit_type), Some(price_per_unit), Some(currency), Some(category)) =
            (name, unit_type, price_per_unit, currency, category)
        {
            items.push(PriceItem {
                name,
                unit_type,
                price_per_unit,
                currency,
                category,
                width,
                height,
                length,
            });
        }
    }

    errors.into_result(items)
}

fn coerce_number(value: &JsonValue) -> Option<f64> {
    match value {
        JsonValue::Number(number) => number.as_f64(),
        JsonValue::String(raw) => {
            let trimmed = raw.trim();
            if trimmed.is_empty() {
                Some(0.0)
            } else {
                trimmed.parse::<f64>().ok().filter(|value| value.is_finite())
            }
        }
        JsonValue::Bool(flag) => Some(if *flag { 1.0 } else { 0.0 }),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_items() -> Vec<PriceItem> {
        vec![
            PriceItem::new("door-std", 120.0, "USD", "Doors"),
            PriceItem::new("door-oak", 340.0, "USD", "Doors"),
            PriceItem::new("drywall", 12.5, "USD", "Walls"),
        ]
    }

    #[test]
    fn unknown_item_resolves_to_zero_priced_fallback() {
        let mut table = PriceLookupTable::new(sample_items());
        let item = table.price("unknown-item");

        assert_eq!(item.name, "unknown-item");
        assert_eq!(item.price_per_unit, 0.0);
        assert_eq!(item.currency, "MXN");
        assert_eq!(item.category, "Other");
        assert_eq!(item.unit_type, "unit");
        assert_eq!(
            table.lookup_history(),
            &[LookupHistoryEntry {
                name: "unknown-item".into(),
                was_found: false
            }]
        );
    }

    #[test]
    fn later_duplicates_overwrite_earlier_items() {
        let mut items = sample_items();
        items.push(PriceItem::new("door-std", 150.0, "USD", "Doors"));
        let mut table = PriceLookupTable::new(items);

        assert_eq!(table.len(), 3);
        assert_eq!(table.price("door-std").price_per_unit, 150.0);
        let doors: Vec<_> = table
            .category_items("Doors")
            .into_iter()
            .map(|item| item.name)
            .collect();
        assert_eq!(doors, vec!["door-std", "door-oak"]);
    }

    #[test]
    fn category_query_records_one_entry() {
        let mut table = PriceLookupTable::new(sample_items());
        assert_eq!(table.category_items("Doors").len(), 2);
        assert!(table.category_items("Roofing").is_empty());

        let history = table.lookup_history();
        assert_eq!(history.len(), 2);
        assert!(history[0].was_found);
        assert_eq!(history[1].name, "Roofing");
        assert!(!history[1].was_found);
    }

    #[test]
    fn explicit_default_is_returned_on_miss() {
        let mut table = PriceLookupTable::new(sample_items());
        let default = PriceItem::new("custom", 9.0, "EUR", "Misc");
        let item = table.get("custom", default.clone()).unwrap();
        assert_eq!(item, default);
        let found = table.get("drywall", default).unwrap();
        assert_eq!(found.price_per_unit, 12.5);
    }

    #[test]
    fn fallback_follows_pricing_config() {
        let section = PricingSection {
            fallback_currency: "USD".into(),
            fallback_category: "Misc".into(),
            fallback_unit_type: "each".into(),
        };
        let mut table = PriceLookupTable::with_fallback(Vec::new(), PriceFallback::from(&section));
        let item = table.price("nail");
        assert_eq!(item.currency, "USD");
        assert_eq!(item.category, "Misc");
        assert_eq!(item.unit_type, "each");
    }

    #[test]
    fn validation_coerces_numeric_strings() {
        let rows = vec![json!({
            "name": "stud",
            "unitType": "piece",
            "pricePerUnit": "4.25",
            "currency": "USD",
            "category": "Framing",
            "length": "2.44"
        })];
        let items = validate_price_items(&rows).unwrap();
        assert_eq!(items[0].price_per_unit, 4.25);
        assert_eq!(items[0].length, Some(2.44));
        assert_eq!(items[0].width, None);
    }

    #[test]
    fn validation_reports_each_bad_field() {
        let rows = vec![
            json!({ "name": "ok", "unitType": "m", "pricePerUnit": 1, "currency": "USD", "category": "A" }),
            json!({ "unitType": "m", "pricePerUnit": "abc", "currency": "USD", "category": "A", "width": "wide" }),
            json!("not an item"),
        ];
        let errors = validate_price_items(&rows).unwrap_err();
        let fields: Vec<_> = errors.iter().map(|e| e.field.as_str()).collect();
        assert_eq!(
            fields,
            vec![
                "items[1].name",
                "items[1].pricePerUnit",
                "items[1].width",
                "items[2]"
            ]
        );
    }
}
