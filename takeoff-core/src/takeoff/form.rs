use std::collections::BTreeMap;

use crate::lookup::{CustomValue, LookupValue, ValueType};
use crate::validation::FieldErrors;

use super::models::FormValues;

/// Coerces raw submitted strings to the declared type of each input.
///
/// Names that are not declared inputs are ignored; declared inputs missing
/// from the form keep their stored value.
pub fn coerce_form_values(
    inputs: &[CustomValue],
    form: &FormValues,
) -> Result<BTreeMap<String, LookupValue>, FieldErrors> {
    let mut errors = FieldErrors::default();
    let mut coerced = BTreeMap::new();

    for input in inputs {
        let Some(raw) = form.get(&input.name) else {
            continue;
        };
        match coerce_value(input.value_type(), raw) {
            Some(value) => {
                coerced.insert(input.name.clone(), value);
            }
            None => errors.push(
                input.name.clone(),
                format!("expected a {}, got {raw:?}", input.value_type()),
            ),
        }
    }

    errors.into_result(coerced)
}

/// Parses one raw form string as `value_type`; `None` when it does not fit.
pub fn coerce_value(value_type: ValueType, raw: &str) -> Option<LookupValue> {
    match value_type {
        ValueType::Number => {
            let trimmed = raw.trim();
            if trimmed.is_empty() {
                return None;
            }
            trimmed
                .parse::<f64>()
                .ok()
                .filter(|value| value.is_finite())
                .map(LookupValue::Number)
        }
        ValueType::Text => Some(LookupValue::Text(raw.to_string())),
        // checkboxes submit "on" when ticked
        ValueType::Flag => match raw.trim().to_ascii_lowercase().as_str() {
            "on" | "true" | "1" | "yes" => Some(LookupValue::Flag(true)),
            "" | "off" | "false" | "0" | "no" => Some(LookupValue::Flag(false)),
            _ => None,
        },
    }
}
