use std::collections::BTreeMap;

use serde::Serialize;
use tracing::{info, warn};

use crate::config::TakeoffConfig;
use crate::lookup::{
    ChangeSet, CustomKind, CustomLookupTable, CustomValue, PriceFallback, PriceLookupTable,
};

use super::api::{flatten_sections, EstimateSection, TakeOffApi};
use super::error::{TakeoffError, TakeoffResult};
use super::form::coerce_form_values;
use super::models::{EstimateResult, FormValues};
use super::script::ScriptSandbox;
use super::store::SqliteTakeoffStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunMode {
    /// Evaluate and reconcile; leave persisted results alone.
    Preview,
    /// Evaluate, reconcile, and replace the estimate's persisted results.
    Finalize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PersistenceStatus {
    Saved,
    Failed { reason: String },
}

impl PersistenceStatus {
    pub fn is_saved(&self) -> bool {
        matches!(self, PersistenceStatus::Saved)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RunOutcome {
    pub estimate_id: String,
    pub model_id: String,
    pub sections: Vec<EstimateSection>,
    pub results: Vec<EstimateResult>,
    /// Sum over every row regardless of currency.
    pub total: f64,
    pub totals_by_currency: BTreeMap<String, f64>,
    pub logs: Vec<String>,
    pub variable_changes: ChangeSet,
    pub input_changes: ChangeSet,
    /// The model's inputs after reconciliation, i.e. what the next form shows.
    pub declared_inputs: Vec<CustomValue>,
    pub persistence: PersistenceStatus,
    pub finalized: bool,
}

/// Runs takeoff models for estimates against a store.
#[derive(Debug, Clone)]
pub struct TakeoffRunner {
    store: SqliteTakeoffStore,
    sandbox: ScriptSandbox,
    fallback: PriceFallback,
}

impl TakeoffRunner {
    pub fn new(store: SqliteTakeoffStore) -> Self {
        Self {
            store,
            sandbox: ScriptSandbox::default(),
            fallback: PriceFallback::default(),
        }
    }

    pub fn from_config(store: SqliteTakeoffStore, config: &TakeoffConfig) -> Self {
        Self {
            store,
            sandbox: ScriptSandbox::new(config.sandbox.clone()),
            fallback: PriceFallback::from(&config.pricing),
        }
    }

    pub fn with_sandbox(mut self, sandbox: ScriptSandbox) -> Self {
        self.sandbox = sandbox;
        self
    }

    pub fn store(&self) -> &SqliteTakeoffStore {
        &self.store
    }

    /// Evaluates the estimate's model and reconciles its variables and inputs.
    ///
    /// `form` holds raw submitted values; `None` reuses the values stored by
    /// the last finalize. A failing script aborts with nothing written. A
    /// failing reconciliation still returns the computed sections, flagged
    /// through [`RunOutcome::persistence`], and skips the results write.
    pub fn run(
        &self,
        estimate_id: &str,
        form: Option<&FormValues>,
        mode: RunMode,
    ) -> TakeoffResult<RunOutcome> {
        let estimate =
            self.store
                .fetch_estimate(estimate_id)?
                .ok_or_else(|| TakeoffError::EstimateNotFound {
                    estimate_id: estimate_id.to_string(),
                })?;
        let model_id = estimate.takeoff_model_id.clone().ok_or_else(|| {
            TakeoffError::ModelNotConfigured {
                estimate_id: estimate_id.to_string(),
            }
        })?;
        let model = self
            .store
            .fetch_model(&model_id)?
            .ok_or_else(|| TakeoffError::ModelNotFound {
                model_id: model_id.clone(),
            })?;
        let price_items = self.store.fetch_price_items(&estimate.price_list_ids)?;

        let submitted = match form {
            Some(form) => form.clone(),
            None => self.store.fetch_form_values(estimate_id)?,
        };
        let coerced = coerce_form_values(&model.inputs, &submitted)?;

        info!(
            estimate_id,
            model_id = %model_id,
            mode = ?mode,
            variables = model.variables.len(),
            inputs = model.inputs.len(),
            prices = price_items.len(),
            "running takeoff model"
        );

        let mut inputs = CustomLookupTable::inputs(model.inputs.clone());
        for (name, value) in &coerced {
            inputs.override_value(name, value.clone())?;
        }
        let mut api = TakeOffApi::new(
            model.id.clone(),
            estimate.dimensions.clone(),
            PriceLookupTable::with_fallback(price_items, self.fallback.clone()),
            inputs,
            CustomLookupTable::variables(model.variables.clone()),
        );

        let script = match self.sandbox.execute(&model.code, &mut api) {
            Ok(outcome) => outcome,
            Err(err) => {
                warn!(estimate_id, model_id = %model_id, error = %err, "takeoff script failed");
                return Err(err);
            }
        };

        let parts = api.into_parts();
        let results = flatten_sections(&parts.sections);
        let total: f64 = parts.sections.iter().map(EstimateSection::total).sum();
        let mut totals_by_currency = BTreeMap::new();
        for row in &results {
            *totals_by_currency.entry(row.currency.clone()).or_insert(0.0) += row.total;
        }

        let mut variable_changes = ChangeSet::default();
        let mut input_changes = ChangeSet::default();
        let mut persistence = PersistenceStatus::Saved;
        match parts.variables.save_changes(&self.store, &model_id) {
            Ok(changes) => variable_changes = changes,
            Err(err) => persistence = failed(&err),
        }
        if persistence.is_saved() {
            match parts.inputs.save_changes(&self.store, &model_id) {
                Ok(changes) => input_changes = changes,
                Err(err) => persistence = failed(&err),
            }
        }

        let mut finalized = false;
        if mode == RunMode::Finalize && persistence.is_saved() {
            let kept: FormValues = submitted
                .into_iter()
                .filter(|(name, _)| coerced.contains_key(name))
                .collect();
            match self.store.finalize_results(estimate_id, &results, &kept) {
                Ok(()) => finalized = true,
                Err(err) => persistence = failed(&err),
            }
        }

        let declared_inputs = if persistence.is_saved() {
            self.store.fetch_custom_values(&model_id, CustomKind::Input)?
        } else {
            model.inputs
        };

        if let PersistenceStatus::Failed { reason } = &persistence {
            warn!(estimate_id, model_id = %model_id, %reason, "takeoff results not durably saved");
        }
        info!(
            estimate_id,
            model_id = %model_id,
            sections = parts.sections.len(),
            rows = results.len(),
            log_lines = script.logs.len(),
            variables_created = variable_changes.creates.len(),
            variables_deleted = variable_changes.deletes.len(),
            inputs_created = input_changes.creates.len(),
            inputs_deleted = input_changes.deletes.len(),
            finalized,
            "takeoff run complete"
        );

        Ok(RunOutcome {
            estimate_id: estimate_id.to_string(),
            model_id,
            sections: parts.sections,
            results,
            total,
            totals_by_currency,
            logs: script.logs,
            variable_changes,
            input_changes,
            declared_inputs,
            persistence,
            finalized,
        })
    }
}

fn failed(err: &TakeoffError) -> PersistenceStatus {
    PersistenceStatus::Failed {
        reason: err.to_string(),
    }
}
