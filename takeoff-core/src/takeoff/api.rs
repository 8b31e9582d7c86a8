use serde::{Deserialize, Serialize};

use crate::lookup::{CustomLookupTable, PriceLookupTable};

use super::models::{BuildingDimensions, EstimateResult};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CalculatedItem {
    pub name: String,
    pub qty: f64,
    pub price_lookup_key: String,
    pub price_per_unit: f64,
    pub total: f64,
    pub currency: String,
}

/// What a script passes to `addPart`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NewPart {
    pub name: String,
    pub qty: f64,
    pub price_lookup_key: String,
}

impl NewPart {
    pub fn new(name: impl Into<String>, qty: f64, price_lookup_key: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            qty,
            price_lookup_key: price_lookup_key.into(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct EstimateSection {
    pub name: String,
    pub parts: Vec<CalculatedItem>,
}

impl EstimateSection {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            parts: Vec::new(),
        }
    }

    /// Prices `part` and appends it. Price and currency are copied into the
    /// item, so later price list changes never alter a computed section.
    pub fn add_part(&mut self, prices: &mut PriceLookupTable, part: NewPart) -> &mut Self {
        let price = prices.price(&part.price_lookup_key);
        self.parts.push(CalculatedItem {
            total: part.qty * price.price_per_unit,
            name: part.name,
            qty: part.qty,
            price_lookup_key: part.price_lookup_key,
            price_per_unit: price.price_per_unit,
            currency: price.currency,
        });
        self
    }

    pub fn total(&self) -> f64 {
        self.parts.iter().map(|part| part.total).sum()
    }
}

/// Borrowed view of one section that prices parts through the API's table.
pub struct SectionHandle<'a> {
    section: &'a mut EstimateSection,
    prices: &'a mut PriceLookupTable,
}

impl<'a> SectionHandle<'a> {
    pub fn add_part(self, part: NewPart) -> Self {
        self.section.add_part(self.prices, part);
        self
    }

    pub fn name(&self) -> &str {
        &self.section.name
    }

    pub fn parts(&self) -> &[CalculatedItem] {
        &self.section.parts
    }
}

/// Execution context handed to a takeoff model script. Owned by exactly one run.
#[derive(Debug)]
pub struct TakeOffApi {
    pub id: String,
    pub bd: BuildingDimensions,
    pub prices: PriceLookupTable,
    pub inputs: CustomLookupTable,
    pub variables: CustomLookupTable,
    sections: Vec<EstimateSection>,
}

impl TakeOffApi {
    pub fn new(
        id: impl Into<String>,
        bd: BuildingDimensions,
        prices: PriceLookupTable,
        inputs: CustomLookupTable,
        variables: CustomLookupTable,
    ) -> Self {
        Self {
            id: id.into(),
            bd,
            prices,
            inputs,
            variables,
            sections: Vec::new(),
        }
    }

    pub fn create_section(&mut self, name: impl Into<String>) -> SectionHandle<'_> {
        self.sections.push(EstimateSection::new(name));
        let index = self.sections.len() - 1;
        SectionHandle {
            section: &mut self.sections[index],
            prices: &mut self.prices,
        }
    }

    pub fn section(&mut self, index: usize) -> Option<SectionHandle<'_>> {
        let section = self.sections.get_mut(index)?;
        Some(SectionHandle {
            section,
            prices: &mut self.prices,
        })
    }

    pub fn section_count(&self) -> usize {
        self.sections.len()
    }

    /// Sections created during the run, in creation order.
    pub fn get_sections(&self) -> Vec<EstimateSection> {
        self.sections.clone()
    }

    pub fn into_parts(self) -> TakeOffParts {
        TakeOffParts {
            sections: self.sections,
            prices: self.prices,
            inputs: self.inputs,
            variables: self.variables,
        }
    }
}

/// The pieces of a finished run that the pipeline still needs.
#[derive(Debug)]
pub struct TakeOffParts {
    pub sections: Vec<EstimateSection>,
    pub prices: PriceLookupTable,
    pub inputs: CustomLookupTable,
    pub variables: CustomLookupTable,
}

/// Flattens sections into section-tagged result rows, preserving order.
pub fn flatten_sections(sections: &[EstimateSection]) -> Vec<EstimateResult> {
    sections
        .iter()
        .flat_map(|section| {
            section.parts.iter().map(move |part| EstimateResult {
                section: section.name.clone(),
                name: part.name.clone(),
                qty: part.qty,
                price_lookup_key: part.price_lookup_key.clone(),
                price_per_unit: part.price_per_unit,
                total: part.total,
                currency: part.currency.clone(),
            })
        })
        .collect()
}
