use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{LookupError, LookupHistory, LookupHistoryEntry, LookupResult, LookupTable};
use super::{LookupValue, ValueType};

/// Which declared set of a takeoff model a table is built from.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum CustomKind {
    Variable,
    Input,
}

impl CustomKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CustomKind::Variable => "variable",
            CustomKind::Input => "input",
        }
    }
}

impl fmt::Display for CustomKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CustomKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "variable" => Ok(CustomKind::Variable),
            "input" => Ok(CustomKind::Input),
            other => Err(format!("unknown custom value kind: {other}")),
        }
    }
}

/// A persisted custom variable or custom input.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CustomValue {
    pub id: i64,
    pub takeoff_model_id: String,
    pub kind: CustomKind,
    pub name: String,
    #[serde(flatten)]
    pub value: LookupValue,
}

impl CustomValue {
    pub fn value_type(&self) -> ValueType {
        self.value.value_type()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NewCustomValue {
    pub name: String,
    pub value: LookupValue,
}

/// Creates and deletes produced by one reconciliation.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ChangeSet {
    pub creates: Vec<NewCustomValue>,
    pub deletes: Vec<String>,
}

impl ChangeSet {
    pub fn is_empty(&self) -> bool {
        self.creates.is_empty() && self.deletes.is_empty()
    }
}

/// Storage side of reconciliation. Implementations must apply a change set
/// atomically: every create and delete commits, or none does.
pub trait CustomValueSink {
    type Error;

    fn apply_custom_changes(
        &self,
        takeoff_model_id: &str,
        kind: CustomKind,
        changes: &ChangeSet,
    ) -> Result<(), Self::Error>;
}

#[derive(Debug, Clone)]
struct Slot {
    value: LookupValue,
    persisted: bool,
}

/// Typed lookup table over a model's custom variables or inputs.
#[derive(Debug, Clone)]
pub struct CustomLookupTable {
    kind: CustomKind,
    slots: HashMap<String, Slot>,
    // first-miss order, so creates are written in the order the script asked for them
    pending: Vec<String>,
    history: LookupHistory,
}

impl CustomLookupTable {
    pub fn new(kind: CustomKind, values: impl IntoIterator<Item = CustomValue>) -> Self {
        let slots = values
            .into_iter()
            .map(|record| {
                (
                    record.name,
                    Slot {
                        value: record.value,
                        persisted: true,
                    },
                )
            })
            .collect();
        Self {
            kind,
            slots,
            pending: Vec::new(),
            history: LookupHistory::default(),
        }
    }

    pub fn variables(values: impl IntoIterator<Item = CustomValue>) -> Self {
        Self::new(CustomKind::Variable, values)
    }

    pub fn inputs(values: impl IntoIterator<Item = CustomValue>) -> Self {
        Self::new(CustomKind::Input, values)
    }

    pub fn kind(&self) -> CustomKind {
        self.kind
    }

    /// Replaces the run-time value of a persisted entry without touching what
    /// reconciliation will write. Used for submitted form values.
    pub fn override_value(&mut self, name: &str, value: LookupValue) -> LookupResult<()> {
        if let Some(slot) = self.slots.get_mut(name) {
            if slot.value.value_type() != value.value_type() {
                return Err(LookupError::TypeMismatch {
                    name: name.to_string(),
                    stored: slot.value.value_type(),
                    requested: value.value_type(),
                });
            }
            slot.value = value;
        }
        Ok(())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.slots.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn history(&self) -> &LookupHistory {
        &self.history
    }

    /// Computes what reconciliation would write for the accesses made so far.
    pub fn pending_changes(&self) -> ChangeSet {
        let accessed = self.history.accessed_names();

        let creates = self
            .pending
            .iter()
            .filter_map(|name| {
                self.slots.get(name).map(|slot| NewCustomValue {
                    name: name.clone(),
                    value: slot.value.clone(),
                })
            })
            .collect();

        let mut deletes: Vec<String> = self
            .slots
            .iter()
            .filter(|(name, slot)| slot.persisted && !accessed.contains(name.as_str()))
            .map(|(name, _)| name.clone())
            .collect();
        deletes.sort();

        ChangeSet { creates, deletes }
    }

    /// Reconciles storage with this run's accesses and consumes the table.
    ///
    /// Names first seen in this run are created with their call-site default,
    /// names resolved from storage are left untouched, and persisted names the
    /// run never asked for are deleted.
    pub fn save_changes<S>(self, sink: &S, takeoff_model_id: &str) -> Result<ChangeSet, S::Error>
    where
        S: CustomValueSink,
    {
        let changes = self.pending_changes();
        debug!(
            takeoff_model_id,
            kind = %self.kind,
            creates = changes.creates.len(),
            deletes = changes.deletes.len(),
            "reconciling custom values"
        );
        sink.apply_custom_changes(takeoff_model_id, self.kind, &changes)?;
        Ok(changes)
    }
}

impl LookupTable for CustomLookupTable {
    type Value = LookupValue;
    type Error = LookupError;

    fn get(&mut self, key: &str, default: LookupValue) -> LookupResult<LookupValue> {
        if let Some(slot) = self.slots.get(key) {
            self.history.record(key, true);
            if slot.value.value_type() != default.value_type() {
                return Err(LookupError::TypeMismatch {
                    name: key.to_string(),
                    stored: slot.value.value_type(),
                    requested: default.value_type(),
                });
            }
            return Ok(slot.value.clone());
        }

        self.history.record(key, false);
        self.slots.insert(
            key.to_string(),
            Slot {
                value: default.clone(),
                persisted: false,
            },
        );
        self.pending.push(key.to_string());
        Ok(default)
    }

    fn lookup_history(&self) -> &[LookupHistoryEntry] {
        self.history.entries()
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;

    use super::*;

    fn stored(name: &str, value: LookupValue) -> CustomValue {
        CustomValue {
            id: 0,
            takeoff_model_id: "tm-1".into(),
            kind: CustomKind::Variable,
            name: name.into(),
            value,
        }
    }

    #[derive(Default)]
    struct RecordingSink {
        applied: RefCell<Vec<(String, CustomKind, ChangeSet)>>,
    }

    impl CustomValueSink for RecordingSink {
        type Error = std::convert::Infallible;

        fn apply_custom_changes(
            &self,
            takeoff_model_id: &str,
            kind: CustomKind,
            changes: &ChangeSet,
        ) -> Result<(), Self::Error> {
            self.applied
                .borrow_mut()
                .push((takeoff_model_id.to_string(), kind, changes.clone()));
            Ok(())
        }
    }

    #[test]
    fn fresh_table_echoes_defaults() {
        let mut table = CustomLookupTable::variables(Vec::new());
        assert_eq!(table.get("a", 1.into()).unwrap(), LookupValue::Number(1.0));
        assert_eq!(table.get("b", "default".into()).unwrap(), "default".into());
        assert_eq!(table.get("c", true.into()).unwrap(), LookupValue::Flag(true));
    }

    #[test]
    fn first_resolution_wins_within_a_run() {
        let mut table = CustomLookupTable::variables(Vec::new());
        assert_eq!(table.get("x", 1.into()).unwrap(), LookupValue::Number(1.0));
        assert_eq!(table.get("x", 2.into()).unwrap(), LookupValue::Number(1.0));

        let history = table.lookup_history();
        assert_eq!(history.len(), 2);
        assert!(!history[0].was_found);
        assert!(history[1].was_found);
        assert_eq!(table.pending_changes().creates.len(), 1);
    }

    #[test]
    fn stored_value_beats_call_site_default() {
        let mut table = CustomLookupTable::variables(vec![stored("x", 1.into())]);
        assert_eq!(table.get("x", 2.into()).unwrap(), LookupValue::Number(1.0));
        assert!(table.pending_changes().is_empty());
    }

    #[test]
    fn type_mismatch_fails_fast() {
        let mut table = CustomLookupTable::variables(vec![stored("x", 1.into())]);
        let err = table.get("x", "one".into()).unwrap_err();
        assert_eq!(
            err,
            LookupError::TypeMismatch {
                name: "x".into(),
                stored: ValueType::Number,
                requested: ValueType::Text,
            }
        );
    }

    #[test]
    fn unaccessed_entries_are_swept() {
        let table = CustomLookupTable::variables(vec![
            stored("a", 1.into()),
            stored("b", true.into()),
            stored("c", "x".into()),
        ]);
        let sink = RecordingSink::default();
        let changes = table.save_changes(&sink, "tm-1").unwrap();

        assert!(changes.creates.is_empty());
        assert_eq!(changes.deletes, vec!["a", "b", "c"]);
        assert_eq!(sink.applied.borrow().len(), 1);
        assert_eq!(sink.applied.borrow()[0].1, CustomKind::Variable);
    }

    #[test]
    fn reconciliation_mixes_creates_hits_and_deletes() {
        let mut table = CustomLookupTable::inputs(vec![
            stored("kept", 3.into()),
            stored("dropped", false.into()),
        ]);
        table.get("kept", 10.into()).unwrap();
        table.get("new-b", "b".into()).unwrap();
        table.get("new-a", 0.5.into()).unwrap();
        table.get("new-b", "again".into()).unwrap();

        let changes = table.pending_changes();
        let created: Vec<_> = changes.creates.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(created, vec!["new-b", "new-a"]);
        assert_eq!(changes.creates[0].value, LookupValue::Text("b".into()));
        assert_eq!(changes.deletes, vec!["dropped"]);
    }

    #[test]
    fn override_changes_run_value_but_not_reconciliation() {
        let mut table = CustomLookupTable::inputs(vec![stored("width", 10.into())]);
        table.override_value("width", 12.into()).unwrap();
        assert_eq!(table.get("width", 10.into()).unwrap(), LookupValue::Number(12.0));
        assert!(table.pending_changes().is_empty());
        assert!(table.override_value("width", true.into()).is_err());
    }
}
