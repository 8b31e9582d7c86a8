use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::{NaiveDateTime, TimeZone, Utc};
use rusqlite::{params, Connection, OpenFlags, OptionalExtension, Transaction};
use serde_json::Value as JsonValue;
use tracing::{debug, info};
use uuid::Uuid;

use crate::lookup::{
    validate_price_items, ChangeSet, CustomKind, CustomValue, CustomValueSink, LookupValue,
    PriceItem,
};
use crate::sqlite::configure_connection;
use crate::validation::{FieldError, FieldErrors};

use super::error::{TakeoffError, TakeoffResult};
use super::models::{
    custom_value_from_row, price_item_from_row, BuildingDimensions, Estimate, EstimateResult,
    EstimateStatus, FormValues, ModelSummary, PriceList, PriceListSummary, TakeoffModel,
};

const TAKEOFF_SCHEMA: &str = include_str!("../../../sql/takeoff.sql");

#[derive(Debug, Clone)]
pub struct SqliteTakeoffStoreBuilder {
    path: Option<PathBuf>,
    read_only: bool,
    create_if_missing: bool,
}

impl Default for SqliteTakeoffStoreBuilder {
    fn default() -> Self {
        Self {
            path: None,
            read_only: false,
            create_if_missing: true,
        }
    }
}

impl SqliteTakeoffStoreBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn path(mut self, path: impl AsRef<Path>) -> Self {
        self.path = Some(path.as_ref().to_path_buf());
        self
    }

    pub fn read_only(mut self, value: bool) -> Self {
        self.read_only = value;
        self
    }

    pub fn create_if_missing(mut self, value: bool) -> Self {
        self.create_if_missing = value;
        self
    }

    pub fn build(self) -> TakeoffResult<SqliteTakeoffStore> {
        let path = self.path.ok_or(TakeoffError::MissingStore)?;
        let mut flags = if self.read_only {
            OpenFlags::SQLITE_OPEN_READ_ONLY
        } else {
            OpenFlags::SQLITE_OPEN_READ_WRITE
        };

        if !self.read_only && self.create_if_missing {
            flags |= OpenFlags::SQLITE_OPEN_CREATE;
        }

        Ok(SqliteTakeoffStore { path, flags })
    }
}

/// SQLite-backed storage for models, custom values, price lists and estimates.
#[derive(Debug, Clone)]
pub struct SqliteTakeoffStore {
    path: PathBuf,
    flags: OpenFlags,
}

impl SqliteTakeoffStore {
    pub fn builder() -> SqliteTakeoffStoreBuilder {
        SqliteTakeoffStoreBuilder::new()
    }

    pub fn new(path: impl AsRef<Path>) -> TakeoffResult<Self> {
        SqliteTakeoffStoreBuilder::new().path(path).build()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn open(&self) -> TakeoffResult<Connection> {
        let conn = Connection::open_with_flags(&self.path, self.flags).map_err(|source| {
            TakeoffError::OpenDatabase {
                path: self.path.clone(),
                source,
            }
        })?;
        configure_connection(&conn).map_err(|source| TakeoffError::OpenDatabase {
            path: self.path.clone(),
            source,
        })?;
        Ok(conn)
    }

    pub fn initialize(&self) -> TakeoffResult<()> {
        let conn = self.open()?;
        conn.execute_batch(TAKEOFF_SCHEMA)?;
        Ok(())
    }

    pub fn create_model(&self, name: &str, code: &str) -> TakeoffResult<TakeoffModel> {
        let id = format!("tm-{}", Uuid::new_v4().simple());
        let conn = self.open()?;
        conn.execute(
            "INSERT INTO takeoff_models (id, name, code) VALUES (?1, ?2, ?3)",
            params![id, name, code],
        )?;
        info!(model_id = %id, name, "created takeoff model");
        self.fetch_model(&id)?
            .ok_or(TakeoffError::ModelNotFound { model_id: id })
    }

    pub fn update_model_code(&self, model_id: &str, code: &str) -> TakeoffResult<()> {
        let conn = self.open()?;
        let affected = conn.execute(
            "UPDATE takeoff_models SET code = ?2, updated_at = CURRENT_TIMESTAMP WHERE id = ?1",
            params![model_id, code],
        )?;
        if affected == 0 {
            return Err(TakeoffError::ModelNotFound {
                model_id: model_id.to_string(),
            });
        }
        Ok(())
    }

    /// Loads a model together with its persisted variables and inputs.
    pub fn fetch_model(&self, model_id: &str) -> TakeoffResult<Option<TakeoffModel>> {
        let conn = self.open()?;
        let model = conn
            .query_row(
                "SELECT * FROM takeoff_models WHERE id = ?1",
                [model_id],
                |row| TakeoffModel::from_row(row),
            )
            .optional()?;
        let Some(mut model) = model else {
            return Ok(None);
        };
        model.variables = query_custom_values(&conn, model_id, CustomKind::Variable)?;
        model.inputs = query_custom_values(&conn, model_id, CustomKind::Input)?;
        Ok(Some(model))
    }

    pub fn list_models(&self) -> TakeoffResult<Vec<ModelSummary>> {
        let conn = self.open()?;
        let mut stmt = conn.prepare(
            "SELECT m.id, m.name, m.updated_at,
                    SUM(CASE WHEN c.kind = 'variable' THEN 1 ELSE 0 END) AS variable_count,
                    SUM(CASE WHEN c.kind = 'input' THEN 1 ELSE 0 END) AS input_count
             FROM takeoff_models m
             LEFT JOIN custom_values c ON c.takeoff_model_id = m.id
             GROUP BY m.id
             ORDER BY m.name ASC, m.id ASC",
        )?;
        let rows = stmt
            .query_map([], |row| {
                let updated_at: Option<NaiveDateTime> = row.get("updated_at")?;
                Ok(ModelSummary {
                    id: row.get("id")?,
                    name: row.get("name")?,
                    variable_count: row.get::<_, Option<i64>>("variable_count")?.unwrap_or(0)
                        as usize,
                    input_count: row.get::<_, Option<i64>>("input_count")?.unwrap_or(0) as usize,
                    updated_at: updated_at.map(|dt| Utc.from_utc_datetime(&dt)),
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn fetch_custom_values(
        &self,
        model_id: &str,
        kind: CustomKind,
    ) -> TakeoffResult<Vec<CustomValue>> {
        let conn = self.open()?;
        query_custom_values(&conn, model_id, kind)
    }

    /// Author edit of an existing variable or input. The stored type is kept.
    pub fn update_custom_value(
        &self,
        model_id: &str,
        kind: CustomKind,
        name: &str,
        value: &LookupValue,
    ) -> TakeoffResult<CustomValue> {
        let conn = self.open()?;
        let existing = conn
            .query_row(
                "SELECT * FROM custom_values
                 WHERE takeoff_model_id = ?1 AND kind = ?2 AND name = ?3",
                params![model_id, kind.as_str(), name],
                |row| custom_value_from_row(row),
            )
            .optional()?
            .ok_or_else(|| TakeoffError::CustomValueNotFound {
                model_id: model_id.to_string(),
                kind,
                name: name.to_string(),
            })?;

        if existing.value_type() != value.value_type() {
            return Err(TakeoffError::Validation(FieldErrors(vec![FieldError::new(
                name,
                format!(
                    "{name} is a {}, got a {}",
                    existing.value_type(),
                    value.value_type()
                ),
            )])));
        }

        conn.execute(
            "UPDATE custom_values SET value = ?2 WHERE id = ?1",
            params![existing.id, value.encode()],
        )?;
        info!(model_id, %kind, name, "updated custom value");
        Ok(CustomValue {
            value: value.clone(),
            ..existing
        })
    }

    pub fn create_price_list(
        &self,
        name: &str,
        supplier: Option<&str>,
        items: &[PriceItem],
    ) -> TakeoffResult<PriceList> {
        let id = format!("pl-{}", Uuid::new_v4().simple());
        let mut conn = self.open()?;
        let tx = conn.transaction()?;
        tx.execute(
            "INSERT INTO price_lists (id, name, supplier) VALUES (?1, ?2, ?3)",
            params![id, name, supplier],
        )?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO price_items (
                    price_list_id, position, name, unit_type, price_per_unit, currency,
                    category, width, height, length
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            )?;
            for (position, item) in items.iter().enumerate() {
                stmt.execute(params![
                    id,
                    position as i64,
                    item.name,
                    item.unit_type,
                    item.price_per_unit,
                    item.currency,
                    item.category,
                    item.width,
                    item.height,
                    item.length,
                ])?;
            }
        }
        tx.commit()?;
        info!(price_list_id = %id, items = items.len(), "created price list");
        Ok(PriceList {
            id,
            name: name.to_string(),
            supplier: supplier.map(str::to_string),
            items: items.to_vec(),
        })
    }

    /// Validates raw JSON rows and stores them as a new price list.
    pub fn import_price_list(
        &self,
        name: &str,
        supplier: Option<&str>,
        rows: &[JsonValue],
    ) -> TakeoffResult<PriceList> {
        let items = validate_price_items(rows)?;
        self.create_price_list(name, supplier, &items)
    }

    pub fn fetch_price_list(&self, price_list_id: &str) -> TakeoffResult<Option<PriceList>> {
        let conn = self.open()?;
        let header = conn
            .query_row(
                "SELECT id, name, supplier FROM price_lists WHERE id = ?1",
                [price_list_id],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, Option<String>>(2)?,
                    ))
                },
            )
            .optional()?;
        let Some((id, name, supplier)) = header else {
            return Ok(None);
        };
        let items = query_price_items(&conn, &id)?;
        Ok(Some(PriceList {
            id,
            name,
            supplier,
            items,
        }))
    }

    pub fn list_price_lists(&self) -> TakeoffResult<Vec<PriceListSummary>> {
        let conn = self.open()?;
        let mut stmt = conn.prepare(
            "SELECT p.id, p.name, p.supplier, COUNT(i.id)
             FROM price_lists p
             LEFT JOIN price_items i ON i.price_list_id = p.id
             GROUP BY p.id
             ORDER BY p.name ASC, p.id ASC",
        )?;
        let rows = stmt
            .query_map([], |row| {
                Ok(PriceListSummary {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    supplier: row.get(2)?,
                    item_count: row.get::<_, i64>(3)? as usize,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Items of the given price lists concatenated in list order. Later
    /// duplicates win once the items are loaded into a price table.
    pub fn fetch_price_items(&self, price_list_ids: &[String]) -> TakeoffResult<Vec<PriceItem>> {
        let conn = self.open()?;
        let mut items = Vec::new();
        for price_list_id in price_list_ids {
            if !row_exists(&conn, "SELECT 1 FROM price_lists WHERE id = ?1", price_list_id)? {
                return Err(TakeoffError::PriceListNotFound {
                    price_list_id: price_list_id.clone(),
                });
            }
            items.extend(query_price_items(&conn, price_list_id)?);
        }
        Ok(items)
    }

    pub fn create_estimate(
        &self,
        name: &str,
        dimensions: &BuildingDimensions,
    ) -> TakeoffResult<Estimate> {
        let id = format!("est-{}", Uuid::new_v4().simple());
        let conn = self.open()?;
        conn.execute(
            "INSERT INTO estimates (id, name, status, dimensions) VALUES (?1, ?2, ?3, ?4)",
            params![
                id,
                name,
                EstimateStatus::Draft.as_str(),
                serde_json::to_string(dimensions)?
            ],
        )?;
        info!(estimate_id = %id, name, "created estimate");
        self.fetch_estimate(&id)?
            .ok_or(TakeoffError::EstimateNotFound { estimate_id: id })
    }

    pub fn fetch_estimate(&self, estimate_id: &str) -> TakeoffResult<Option<Estimate>> {
        let conn = self.open()?;
        let estimate = conn
            .query_row(
                "SELECT * FROM estimates WHERE id = ?1",
                [estimate_id],
                |row| Estimate::from_row(row),
            )
            .optional()?;
        let Some(mut estimate) = estimate else {
            return Ok(None);
        };
        let mut stmt = conn.prepare(
            "SELECT price_list_id FROM estimate_price_lists
             WHERE estimate_id = ?1 ORDER BY position ASC",
        )?;
        estimate.price_list_ids = stmt
            .query_map([estimate_id], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Some(estimate))
    }

    /// Points the estimate at a model and replaces its ordered price list selection.
    pub fn configure_estimate(
        &self,
        estimate_id: &str,
        model_id: Option<&str>,
        price_list_ids: &[String],
    ) -> TakeoffResult<()> {
        let mut conn = self.open()?;
        let tx = conn.transaction()?;
        ensure_estimate(&tx, estimate_id)?;
        if let Some(model_id) = model_id {
            if !row_exists(&tx, "SELECT 1 FROM takeoff_models WHERE id = ?1", model_id)? {
                return Err(TakeoffError::ModelNotFound {
                    model_id: model_id.to_string(),
                });
            }
        }
        for price_list_id in price_list_ids {
            if !row_exists(&tx, "SELECT 1 FROM price_lists WHERE id = ?1", price_list_id)? {
                return Err(TakeoffError::PriceListNotFound {
                    price_list_id: price_list_id.clone(),
                });
            }
        }

        tx.execute(
            "UPDATE estimates SET takeoff_model_id = ?2, updated_at = CURRENT_TIMESTAMP
             WHERE id = ?1",
            params![estimate_id, model_id],
        )?;
        tx.execute(
            "DELETE FROM estimate_price_lists WHERE estimate_id = ?1",
            [estimate_id],
        )?;
        let mut position = 0i64;
        for price_list_id in price_list_ids {
            // a repeated id keeps its first position
            position += tx.execute(
                "INSERT OR IGNORE INTO estimate_price_lists (estimate_id, price_list_id, position)
                 VALUES (?1, ?2, ?3)",
                params![estimate_id, price_list_id, position],
            )? as i64;
        }
        tx.commit()?;
        info!(
            estimate_id,
            model_id = model_id.unwrap_or(""),
            price_lists = price_list_ids.len(),
            "configured estimate"
        );
        Ok(())
    }

    pub fn rename_estimate(&self, estimate_id: &str, name: &str) -> TakeoffResult<()> {
        let conn = self.open()?;
        let affected = conn.execute(
            "UPDATE estimates SET name = ?2, updated_at = CURRENT_TIMESTAMP WHERE id = ?1",
            params![estimate_id, name],
        )?;
        if affected == 0 {
            return Err(TakeoffError::EstimateNotFound {
                estimate_id: estimate_id.to_string(),
            });
        }
        Ok(())
    }

    pub fn update_dimensions(
        &self,
        estimate_id: &str,
        dimensions: &BuildingDimensions,
    ) -> TakeoffResult<()> {
        let conn = self.open()?;
        let affected = conn.execute(
            "UPDATE estimates SET dimensions = ?2, updated_at = CURRENT_TIMESTAMP WHERE id = ?1",
            params![estimate_id, serde_json::to_string(dimensions)?],
        )?;
        if affected == 0 {
            return Err(TakeoffError::EstimateNotFound {
                estimate_id: estimate_id.to_string(),
            });
        }
        Ok(())
    }

    pub fn fetch_form_values(&self, estimate_id: &str) -> TakeoffResult<FormValues> {
        let conn = self.open()?;
        let mut stmt =
            conn.prepare("SELECT name, value FROM estimate_form_values WHERE estimate_id = ?1")?;
        let values = stmt
            .query_map([estimate_id], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })?
            .collect::<Result<FormValues, _>>()?;
        Ok(values)
    }

    /// Replaces the estimate's results and stored form values and marks it
    /// finalized, all in one transaction.
    pub fn finalize_results(
        &self,
        estimate_id: &str,
        results: &[EstimateResult],
        form: &FormValues,
    ) -> TakeoffResult<()> {
        let mut conn = self.open()?;
        write_results(&mut conn, estimate_id, results, form).map_err(|source| {
            TakeoffError::ResultsPersistence {
                estimate_id: estimate_id.to_string(),
                source,
            }
        })?;
        info!(estimate_id, rows = results.len(), "persisted estimate results");
        Ok(())
    }

    pub fn fetch_results(&self, estimate_id: &str) -> TakeoffResult<Vec<EstimateResult>> {
        let conn = self.open()?;
        let mut stmt = conn.prepare(
            "SELECT * FROM estimate_results WHERE estimate_id = ?1 ORDER BY position ASC",
        )?;
        let rows = stmt
            .query_map([estimate_id], |row| EstimateResult::from_row(row))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn estimate_total(&self, estimate_id: &str) -> TakeoffResult<f64> {
        let conn = self.open()?;
        let total: Option<f64> = conn.query_row(
            "SELECT SUM(total) FROM estimate_results WHERE estimate_id = ?1",
            [estimate_id],
            |row| row.get(0),
        )?;
        Ok(total.unwrap_or(0.0))
    }

    /// Per-currency totals of the persisted results.
    pub fn estimate_totals_by_currency(
        &self,
        estimate_id: &str,
    ) -> TakeoffResult<BTreeMap<String, f64>> {
        let conn = self.open()?;
        let mut stmt = conn.prepare(
            "SELECT currency, SUM(total) FROM estimate_results
             WHERE estimate_id = ?1 GROUP BY currency",
        )?;
        let mut totals = BTreeMap::new();
        for row in stmt.query_map([estimate_id], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, f64>(1)?))
        })? {
            let (currency, total) = row?;
            totals.insert(currency, total);
        }
        Ok(totals)
    }
}

impl CustomValueSink for SqliteTakeoffStore {
    type Error = TakeoffError;

    fn apply_custom_changes(
        &self,
        takeoff_model_id: &str,
        kind: CustomKind,
        changes: &ChangeSet,
    ) -> TakeoffResult<()> {
        if changes.is_empty() {
            return Ok(());
        }
        let mut conn = self.open()?;
        apply_changes(&mut conn, takeoff_model_id, kind, changes).map_err(|source| {
            TakeoffError::Reconciliation {
                model_id: takeoff_model_id.to_string(),
                kind,
                source,
            }
        })?;
        debug!(
            model_id = takeoff_model_id,
            %kind,
            created = changes.creates.len(),
            deleted = changes.deletes.len(),
            "applied custom value changes"
        );
        Ok(())
    }
}

fn apply_changes(
    conn: &mut Connection,
    takeoff_model_id: &str,
    kind: CustomKind,
    changes: &ChangeSet,
) -> rusqlite::Result<()> {
    let tx = conn.transaction()?;
    {
        let mut delete = tx.prepare(
            "DELETE FROM custom_values WHERE takeoff_model_id = ?1 AND kind = ?2 AND name = ?3",
        )?;
        for name in &changes.deletes {
            delete.execute(params![takeoff_model_id, kind.as_str(), name])?;
        }

        // last run wins if another run created the same name meanwhile
        let mut insert = tx.prepare(
            "INSERT INTO custom_values (takeoff_model_id, kind, name, value_type, value)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(takeoff_model_id, kind, name) DO UPDATE SET
                value_type = excluded.value_type,
                value = excluded.value",
        )?;
        for create in &changes.creates {
            insert.execute(params![
                takeoff_model_id,
                kind.as_str(),
                create.name,
                create.value.value_type().as_str(),
                create.value.encode(),
            ])?;
        }
    }
    tx.commit()
}

fn write_results(
    conn: &mut Connection,
    estimate_id: &str,
    results: &[EstimateResult],
    form: &FormValues,
) -> rusqlite::Result<()> {
    let tx = conn.transaction()?;
    tx.execute(
        "DELETE FROM estimate_results WHERE estimate_id = ?1",
        [estimate_id],
    )?;
    tx.execute(
        "DELETE FROM estimate_form_values WHERE estimate_id = ?1",
        [estimate_id],
    )?;
    {
        let mut insert = tx.prepare(
            "INSERT INTO estimate_results (
                estimate_id, position, section, name, qty, price_lookup_key,
                price_per_unit, total, currency
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        )?;
        for (position, result) in results.iter().enumerate() {
            insert.execute(params![
                estimate_id,
                position as i64,
                result.section,
                result.name,
                result.qty,
                result.price_lookup_key,
                result.price_per_unit,
                result.total,
                result.currency,
            ])?;
        }

        let mut form_insert = tx.prepare(
            "INSERT INTO estimate_form_values (estimate_id, name, value) VALUES (?1, ?2, ?3)",
        )?;
        for (name, value) in form {
            form_insert.execute(params![estimate_id, name, value])?;
        }
    }
    tx.execute(
        "UPDATE estimates SET status = ?2, updated_at = CURRENT_TIMESTAMP WHERE id = ?1",
        params![estimate_id, EstimateStatus::Finalized.as_str()],
    )?;
    tx.commit()
}

fn query_custom_values(
    conn: &Connection,
    model_id: &str,
    kind: CustomKind,
) -> TakeoffResult<Vec<CustomValue>> {
    let mut stmt = conn.prepare(
        "SELECT * FROM custom_values
         WHERE takeoff_model_id = ?1 AND kind = ?2
         ORDER BY id ASC",
    )?;
    let values = stmt
        .query_map(params![model_id, kind.as_str()], |row| {
            custom_value_from_row(row)
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(values)
}

fn query_price_items(conn: &Connection, price_list_id: &str) -> TakeoffResult<Vec<PriceItem>> {
    let mut stmt = conn.prepare(
        "SELECT * FROM price_items WHERE price_list_id = ?1 ORDER BY position ASC",
    )?;
    let items = stmt
        .query_map([price_list_id], |row| price_item_from_row(row))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(items)
}

fn row_exists(conn: &Connection, sql: &str, id: &str) -> rusqlite::Result<bool> {
    conn.query_row(sql, [id], |_| Ok(()))
        .optional()
        .map(|found| found.is_some())
}

fn ensure_estimate(tx: &Transaction<'_>, estimate_id: &str) -> TakeoffResult<()> {
    if row_exists(tx, "SELECT 1 FROM estimates WHERE id = ?1", estimate_id)? {
        Ok(())
    } else {
        Err(TakeoffError::EstimateNotFound {
            estimate_id: estimate_id.to_string(),
        })
    }
}
