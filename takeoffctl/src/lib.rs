use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand, ValueEnum};
use serde::Serialize;
use takeoff_core::takeoff::{coerce_value, ModelSummary, PriceList, PriceListSummary};
use takeoff_core::{
    load_takeoff_config, BuildingDimensions, CustomKind, CustomValue, Estimate, EstimateResult,
    FormValues, PersistenceStatus, RunMode, RunOutcome, SqliteTakeoffStore, TakeoffConfig,
    TakeoffError, TakeoffModel, TakeoffRunner,
};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, AppError>;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("config error: {0}")]
    Config(#[from] takeoff_core::ConfigError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("{0}")]
    Takeoff(#[from] TakeoffError),
    #[error("serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("run completed but was not saved: {0}")]
    NotSaved(String),
}

impl AppError {
    /// Script output captured before a failing run aborted.
    pub fn script_logs(&self) -> &[String] {
        match self {
            AppError::Takeoff(err) => err.script_logs(),
            _ => &[],
        }
    }
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Takeoff model and estimate control interface", long_about = None)]
pub struct Cli {
    /// Path to takeoff.toml
    #[arg(long, default_value = "configs/takeoff.toml")]
    pub config: PathBuf,
    /// Override for the SQLite database path
    #[arg(long)]
    pub db: Option<PathBuf>,
    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create the database schema
    Init,
    /// Takeoff model management
    #[command(subcommand)]
    Model(ModelCommands),
    /// Price list management
    #[command(name = "pricelist")]
    #[command(subcommand)]
    PriceList(PriceListCommands),
    /// Estimate management
    #[command(subcommand)]
    Estimate(EstimateCommands),
    /// Run an estimate's takeoff model
    Run(RunArgs),
}

#[derive(Subcommand, Debug)]
pub enum ModelCommands {
    /// Create a model from a script file
    Create(ModelCreateArgs),
    /// Replace a model's script
    Code(ModelCodeArgs),
    /// List models
    List,
    /// Show a model with its variables and inputs
    Show(IdArgs),
    /// Change the stored value of an existing variable or input
    SetValue(SetValueArgs),
}

#[derive(Args, Debug)]
pub struct ModelCreateArgs {
    pub name: String,
    /// Lua script; an empty model when omitted
    #[arg(long)]
    pub code_file: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct ModelCodeArgs {
    pub id: String,
    #[arg(long)]
    pub code_file: PathBuf,
}

#[derive(Args, Debug)]
pub struct IdArgs {
    pub id: String,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum KindArg {
    Variable,
    Input,
}

impl From<KindArg> for CustomKind {
    fn from(kind: KindArg) -> Self {
        match kind {
            KindArg::Variable => CustomKind::Variable,
            KindArg::Input => CustomKind::Input,
        }
    }
}

#[derive(Args, Debug)]
pub struct SetValueArgs {
    pub id: String,
    #[arg(long, value_enum)]
    pub kind: KindArg,
    pub name: String,
    pub value: String,
}

#[derive(Subcommand, Debug)]
pub enum PriceListCommands {
    /// Import a JSON array of price items as a new list
    Import(PriceListImportArgs),
    /// List price lists
    List,
    /// Show a price list with its items
    Show(IdArgs),
}

#[derive(Args, Debug)]
pub struct PriceListImportArgs {
    pub name: String,
    pub file: PathBuf,
    #[arg(long)]
    pub supplier: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum EstimateCommands {
    /// Create an estimate
    Create(EstimateCreateArgs),
    /// Set the model, price lists and dimensions of an estimate
    Configure(EstimateConfigureArgs),
    /// Rename an estimate
    Rename(EstimateRenameArgs),
    /// Show an estimate with its persisted results
    Show(IdArgs),
}

#[derive(Args, Debug)]
pub struct EstimateCreateArgs {
    pub name: String,
    /// Building dimension as name=value; repeatable
    #[arg(long = "dim", value_parser = parse_dimension)]
    pub dims: Vec<(String, f64)>,
}

#[derive(Args, Debug)]
pub struct EstimateConfigureArgs {
    pub id: String,
    #[arg(long)]
    pub model: Option<String>,
    /// Price list id, in lookup order; repeatable
    #[arg(long = "price-list")]
    pub price_lists: Vec<String>,
    /// Replace the building dimensions; repeatable name=value
    #[arg(long = "dim", value_parser = parse_dimension)]
    pub dims: Vec<(String, f64)>,
}

#[derive(Args, Debug)]
pub struct EstimateRenameArgs {
    pub id: String,
    pub name: String,
}

#[derive(Args, Debug)]
pub struct RunArgs {
    pub estimate: String,
    /// Form value as name=value; repeatable. Without any, the stored form is reused
    #[arg(long = "input", value_parser = parse_form_value)]
    pub inputs: Vec<(String, String)>,
    /// Replace the estimate's persisted results
    #[arg(long, default_value_t = false)]
    pub finalize: bool,
}

fn parse_form_value(raw: &str) -> std::result::Result<(String, String), String> {
    let (name, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected name=value, got {raw:?}"))?;
    if name.trim().is_empty() {
        return Err(format!("missing name in {raw:?}"));
    }
    Ok((name.trim().to_string(), value.to_string()))
}

fn parse_dimension(raw: &str) -> std::result::Result<(String, f64), String> {
    let (name, value) = parse_form_value(raw)?;
    let value = value
        .trim()
        .parse::<f64>()
        .map_err(|_| format!("dimension {name} must be a number"))?;
    Ok((name, value))
}

pub fn run(cli: Cli) -> Result<()> {
    let context = AppContext::new(&cli)?;

    match &cli.command {
        Commands::Init => {
            let report = context.init()?;
            render(&report, cli.format)?;
        }
        Commands::Model(ModelCommands::Create(args)) => {
            let model = context.model_create(args)?;
            render(&model, cli.format)?;
        }
        Commands::Model(ModelCommands::Code(args)) => {
            let model = context.model_code(args)?;
            render(&model, cli.format)?;
        }
        Commands::Model(ModelCommands::List) => {
            let models = ModelList {
                rows: context.store.list_models()?,
            };
            render(&models, cli.format)?;
        }
        Commands::Model(ModelCommands::Show(args)) => {
            let model = context.model_show(&args.id)?;
            render(&model, cli.format)?;
        }
        Commands::Model(ModelCommands::SetValue(args)) => {
            let value = context.model_set_value(args)?;
            render(&value, cli.format)?;
        }
        Commands::PriceList(PriceListCommands::Import(args)) => {
            let list = context.price_list_import(args)?;
            render(&list, cli.format)?;
        }
        Commands::PriceList(PriceListCommands::List) => {
            let lists = PriceListTable {
                rows: context.store.list_price_lists()?,
            };
            render(&lists, cli.format)?;
        }
        Commands::PriceList(PriceListCommands::Show(args)) => {
            let list = context.store.fetch_price_list(&args.id)?.ok_or_else(|| {
                TakeoffError::PriceListNotFound {
                    price_list_id: args.id.clone(),
                }
            })?;
            render(&list, cli.format)?;
        }
        Commands::Estimate(EstimateCommands::Create(args)) => {
            let dims: BuildingDimensions = args.dims.iter().cloned().collect();
            let estimate = context.store.create_estimate(&args.name, &dims)?;
            render(&context.estimate_view(&estimate.id)?, cli.format)?;
        }
        Commands::Estimate(EstimateCommands::Configure(args)) => {
            let view = context.estimate_configure(args)?;
            render(&view, cli.format)?;
        }
        Commands::Estimate(EstimateCommands::Rename(args)) => {
            context.store.rename_estimate(&args.id, &args.name)?;
            render(&context.estimate_view(&args.id)?, cli.format)?;
        }
        Commands::Estimate(EstimateCommands::Show(args)) => {
            render(&context.estimate_view(&args.id)?, cli.format)?;
        }
        Commands::Run(args) => {
            let outcome = context.run_estimate(args)?;
            render(&outcome, cli.format)?;
            if let PersistenceStatus::Failed { reason } = &outcome.persistence {
                return Err(AppError::NotSaved(reason.clone()));
            }
        }
    }

    Ok(())
}

fn render<T>(value: &T, format: OutputFormat) -> Result<()>
where
    T: Serialize + DisplayFallback,
{
    match format {
        OutputFormat::Text => {
            println!("{}", value.display());
            Ok(())
        }
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(value)?;
            println!("{}", json);
            Ok(())
        }
    }
}

trait DisplayFallback {
    fn display(&self) -> String;
}

#[derive(Debug)]
struct AppContext {
    config: TakeoffConfig,
    store: SqliteTakeoffStore,
}

impl AppContext {
    fn new(cli: &Cli) -> Result<Self> {
        let config = load_takeoff_config(&cli.config)?;
        let config_dir = cli
            .config
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        let db_path = cli
            .db
            .clone()
            .unwrap_or_else(|| config.database_path(&config_dir));
        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let store = SqliteTakeoffStore::builder()
            .path(&db_path)
            .create_if_missing(matches!(cli.command, Commands::Init))
            .build()?;
        Ok(Self { config, store })
    }

    fn init(&self) -> Result<InitReport> {
        self.store.initialize()?;
        Ok(InitReport {
            database: self.store.path().display().to_string(),
        })
    }

    fn model_create(&self, args: &ModelCreateArgs) -> Result<TakeoffModel> {
        let code = match &args.code_file {
            Some(path) => fs::read_to_string(path)?,
            None => String::new(),
        };
        Ok(self.store.create_model(&args.name, &code)?)
    }

    fn model_code(&self, args: &ModelCodeArgs) -> Result<TakeoffModel> {
        let code = fs::read_to_string(&args.code_file)?;
        self.store.update_model_code(&args.id, &code)?;
        self.model_show(&args.id)
    }

    fn model_show(&self, id: &str) -> Result<TakeoffModel> {
        let model = self
            .store
            .fetch_model(id)?
            .ok_or_else(|| TakeoffError::ModelNotFound {
                model_id: id.to_string(),
            })?;
        Ok(model)
    }

    fn model_set_value(&self, args: &SetValueArgs) -> Result<CustomValue> {
        let kind = CustomKind::from(args.kind);
        let model = self.model_show(&args.id)?;
        let existing = model
            .custom_values(kind)
            .iter()
            .find(|value| value.name == args.name)
            .ok_or_else(|| TakeoffError::CustomValueNotFound {
                model_id: args.id.clone(),
                kind,
                name: args.name.clone(),
            })?;
        let value = coerce_value(existing.value_type(), &args.value).ok_or_else(|| {
            AppError::InvalidArgument(format!(
                "{} expects a {}, got {:?}",
                args.name,
                existing.value_type(),
                args.value
            ))
        })?;
        Ok(self
            .store
            .update_custom_value(&args.id, kind, &args.name, &value)?)
    }

    fn price_list_import(&self, args: &PriceListImportArgs) -> Result<PriceList> {
        let raw = fs::read_to_string(&args.file)?;
        let rows: Vec<serde_json::Value> = serde_json::from_str(&raw)?;
        Ok(self
            .store
            .import_price_list(&args.name, args.supplier.as_deref(), &rows)?)
    }

    fn estimate_configure(&self, args: &EstimateConfigureArgs) -> Result<EstimateView> {
        let current = self.estimate(&args.id)?;
        let model = args
            .model
            .as_deref()
            .or(current.takeoff_model_id.as_deref());
        let price_lists = if args.price_lists.is_empty() {
            current.price_list_ids.clone()
        } else {
            args.price_lists.clone()
        };
        self.store
            .configure_estimate(&args.id, model, &price_lists)?;
        if !args.dims.is_empty() {
            let dims: BuildingDimensions = args.dims.iter().cloned().collect();
            self.store.update_dimensions(&args.id, &dims)?;
        }
        self.estimate_view(&args.id)
    }

    fn estimate(&self, id: &str) -> Result<Estimate> {
        let estimate = self
            .store
            .fetch_estimate(id)?
            .ok_or_else(|| TakeoffError::EstimateNotFound {
                estimate_id: id.to_string(),
            })?;
        Ok(estimate)
    }

    fn estimate_view(&self, id: &str) -> Result<EstimateView> {
        let estimate = self.estimate(id)?;
        Ok(EstimateView {
            results: self.store.fetch_results(id)?,
            total: self.store.estimate_total(id)?,
            totals_by_currency: self.store.estimate_totals_by_currency(id)?,
            form_values: self.store.fetch_form_values(id)?,
            estimate,
        })
    }

    fn run_estimate(&self, args: &RunArgs) -> Result<RunOutcome> {
        let runner = TakeoffRunner::from_config(self.store.clone(), &self.config);
        let form: Option<FormValues> = if args.inputs.is_empty() {
            None
        } else {
            Some(args.inputs.iter().cloned().collect())
        };
        let mode = if args.finalize {
            RunMode::Finalize
        } else {
            RunMode::Preview
        };
        Ok(runner.run(&args.estimate, form.as_ref(), mode)?)
    }
}

#[derive(Debug, Serialize)]
struct InitReport {
    database: String,
}

#[derive(Debug, Serialize)]
struct ModelList {
    rows: Vec<ModelSummary>,
}

#[derive(Debug, Serialize)]
struct PriceListTable {
    rows: Vec<PriceListSummary>,
}

#[derive(Debug, Serialize)]
struct EstimateView {
    estimate: Estimate,
    results: Vec<EstimateResult>,
    total: f64,
    totals_by_currency: BTreeMap<String, f64>,
    form_values: FormValues,
}

impl DisplayFallback for InitReport {
    fn display(&self) -> String {
        format!("Schema ready at {}", self.database)
    }
}

impl DisplayFallback for ModelList {
    fn display(&self) -> String {
        if self.rows.is_empty() {
            return "No takeoff models".to_string();
        }
        self.rows
            .iter()
            .map(|row| {
                format!(
                    "{} | {} | variables={} inputs={}",
                    row.id, row.name, row.variable_count, row.input_count
                )
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

impl DisplayFallback for TakeoffModel {
    fn display(&self) -> String {
        let mut out = format!("{} | {}", self.id, self.name);
        for (label, values) in [("variables", &self.variables), ("inputs", &self.inputs)] {
            let _ = write!(out, "\n{label}:");
            if values.is_empty() {
                out.push_str(" none");
            }
            for value in values {
                let _ = write!(out, "\n  {} ({}) = {}", value.name, value.value_type(), value.value);
            }
        }
        out
    }
}

impl DisplayFallback for CustomValue {
    fn display(&self) -> String {
        format!("{} {} = {}", self.kind, self.name, self.value)
    }
}

impl DisplayFallback for PriceList {
    fn display(&self) -> String {
        let mut out = format!(
            "{} | {} | supplier={}",
            self.id,
            self.name,
            self.supplier.as_deref().unwrap_or("-")
        );
        for item in &self.items {
            let _ = write!(
                out,
                "\n  {} [{}] {:.2} {}/{}",
                item.name, item.category, item.price_per_unit, item.currency, item.unit_type
            );
        }
        out
    }
}

impl DisplayFallback for PriceListTable {
    fn display(&self) -> String {
        if self.rows.is_empty() {
            return "No price lists".to_string();
        }
        self.rows
            .iter()
            .map(|row| {
                format!(
                    "{} | {} | supplier={} | items={}",
                    row.id,
                    row.name,
                    row.supplier.as_deref().unwrap_or("-"),
                    row.item_count
                )
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

impl DisplayFallback for EstimateView {
    fn display(&self) -> String {
        let estimate = &self.estimate;
        let mut out = format!(
            "{} | {} | status={} | model={}",
            estimate.id,
            estimate.name,
            estimate.status,
            estimate.takeoff_model_id.as_deref().unwrap_or("-")
        );
        if !estimate.price_list_ids.is_empty() {
            let _ = write!(out, "\nprice lists: {}", estimate.price_list_ids.join(", "));
        }
        if !estimate.dimensions.is_empty() {
            let dims: Vec<String> = estimate
                .dimensions
                .iter()
                .map(|(name, value)| format!("{name}={value}"))
                .collect();
            let _ = write!(out, "\ndimensions: {}", dims.join(" "));
        }
        out.push_str(&results_table(&self.results));
        out.push_str(&totals_summary(&self.totals_by_currency));
        out
    }
}

impl DisplayFallback for RunOutcome {
    fn display(&self) -> String {
        let mut out = format!("{} | model={}", self.estimate_id, self.model_id);
        out.push_str(&results_table(&self.results));
        out.push_str(&totals_summary(&self.totals_by_currency));
        for line in &self.logs {
            let _ = write!(out, "\nlog: {line}");
        }
        let changes = [
            ("variable", &self.variable_changes),
            ("input", &self.input_changes),
        ];
        for (label, set) in changes {
            for created in &set.creates {
                let _ = write!(out, "\n+ {label} {} = {}", created.name, created.value);
            }
            for deleted in &set.deletes {
                let _ = write!(out, "\n- {label} {deleted}");
            }
        }
        match &self.persistence {
            PersistenceStatus::Saved if self.finalized => out.push_str("\nsaved, results finalized"),
            PersistenceStatus::Saved => out.push_str("\nsaved"),
            PersistenceStatus::Failed { reason } => {
                let _ = write!(out, "\nNOT SAVED: {reason}");
            }
        }
        out
    }
}

fn results_table(results: &[EstimateResult]) -> String {
    let mut out = String::new();
    let mut current: Option<&str> = None;
    for row in results {
        if current != Some(row.section.as_str()) {
            let _ = write!(out, "\n[{}]", row.section);
            current = Some(row.section.as_str());
        }
        let _ = write!(
            out,
            "\n  {} x{:.2} @ {:.2} {} = {:.2}",
            row.name, row.qty, row.price_per_unit, row.currency, row.total
        );
    }
    out
}

/// One line per currency; amounts in different currencies are never added.
fn totals_summary(totals: &BTreeMap<String, f64>) -> String {
    if totals.is_empty() {
        return "\ntotal: 0.00".to_string();
    }
    totals
        .iter()
        .map(|(currency, total)| format!("\ntotal: {total:.2} {currency}"))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const MODEL: &str = r#"
local width = api.inputs.get("width", 10)
local waste = api.variables.get("wasteFactor", 1.1)
api.createSection("Walls"):addPart({ name = "Drywall", qty = width * waste, priceLookupKey = "drywall" })
"#;

    fn cli(temp: &TempDir, command: Commands) -> Cli {
        Cli {
            config: temp.path().join("configs/takeoff.toml"),
            db: Some(temp.path().join("data/takeoff.sqlite")),
            format: OutputFormat::Json,
            command,
        }
    }

    fn prepare_test_context() -> Result<(TempDir, AppContext)> {
        let temp = TempDir::new().unwrap();
        let configs_dir = temp.path().join("configs");
        fs::create_dir_all(&configs_dir).unwrap();
        fs::copy("../configs/takeoff.toml", configs_dir.join("takeoff.toml")).unwrap();

        run(cli(&temp, Commands::Init))?;
        let context = AppContext::new(&cli(&temp, Commands::Model(ModelCommands::List)))?;
        Ok((temp, context))
    }

    fn seed(temp: &TempDir, context: &AppContext) -> Result<String> {
        let code_file = temp.path().join("walls.lua");
        fs::write(&code_file, MODEL).unwrap();
        let model = context.model_create(&ModelCreateArgs {
            name: "Walls".into(),
            code_file: Some(code_file),
        })?;

        let prices_file = temp.path().join("prices.json");
        fs::write(
            &prices_file,
            r#"[{"name": "drywall", "unitType": "sheet", "pricePerUnit": "5",
                 "currency": "USD", "category": "Walls"}]"#,
        )
        .unwrap();
        let list = context.price_list_import(&PriceListImportArgs {
            name: "Supplier".into(),
            file: prices_file,
            supplier: None,
        })?;

        let estimate = context
            .store
            .create_estimate("Garage", &BuildingDimensions::new())?;
        context.estimate_configure(&EstimateConfigureArgs {
            id: estimate.id.clone(),
            model: Some(model.id),
            price_lists: vec![list.id],
            dims: vec![("height".into(), 2.4)],
        })?;
        Ok(estimate.id)
    }

    #[test]
    fn key_value_arguments_parse() {
        assert_eq!(
            parse_form_value("width= 12").unwrap(),
            ("width".to_string(), " 12".to_string())
        );
        assert!(parse_form_value("width").is_err());
        assert_eq!(parse_dimension("h=2.5").unwrap().1, 2.5);
        assert!(parse_dimension("h=tall").is_err());
    }

    #[test]
    fn cli_parses_run_command() {
        let cli = Cli::try_parse_from([
            "takeoffctl",
            "--format",
            "json",
            "run",
            "est-1",
            "--input",
            "width=12",
            "--finalize",
        ])
        .unwrap();
        match cli.command {
            Commands::Run(args) => {
                assert_eq!(args.estimate, "est-1");
                assert_eq!(args.inputs, vec![("width".to_string(), "12".to_string())]);
                assert!(args.finalize);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn run_reconciles_and_finalizes() {
        let (temp, context) = prepare_test_context().unwrap();
        let estimate_id = seed(&temp, &context).unwrap();

        let outcome = context
            .run_estimate(&RunArgs {
                estimate: estimate_id.clone(),
                inputs: vec![("width".into(), "20".into())],
                finalize: true,
            })
            .unwrap();
        // width was not declared yet, so the form value is ignored on the first run
        assert!((outcome.total - 55.0).abs() < 1e-9);
        assert!(outcome.finalized);

        let view = context.estimate_view(&estimate_id).unwrap();
        assert_eq!(view.results.len(), 1);
        assert!((view.total - 55.0).abs() < 1e-9);
        assert_eq!(view.totals_by_currency.len(), 1);
        assert!((view.totals_by_currency["USD"] - 55.0).abs() < 1e-9);
        assert!(view.display().contains("total: 55.00 USD"));
        assert_eq!(view.estimate.dimensions.get("height"), Some(2.4));

        let outcome = context
            .run_estimate(&RunArgs {
                estimate: estimate_id,
                inputs: vec![("width".into(), "20".into())],
                finalize: false,
            })
            .unwrap();
        assert!((outcome.total - 110.0).abs() < 1e-9);
        assert!(outcome.display().contains("[Walls]"));
    }

    #[test]
    fn set_value_keeps_declared_type() {
        let (temp, context) = prepare_test_context().unwrap();
        let estimate_id = seed(&temp, &context).unwrap();
        let outcome = context
            .run_estimate(&RunArgs {
                estimate: estimate_id,
                inputs: Vec::new(),
                finalize: false,
            })
            .unwrap();

        let updated = context
            .model_set_value(&SetValueArgs {
                id: outcome.model_id.clone(),
                kind: KindArg::Variable,
                name: "wasteFactor".into(),
                value: "1.25".into(),
            })
            .unwrap();
        assert_eq!(updated.value, takeoff_core::LookupValue::Number(1.25));

        let err = context
            .model_set_value(&SetValueArgs {
                id: outcome.model_id,
                kind: KindArg::Variable,
                name: "wasteFactor".into(),
                value: "lots".into(),
            })
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidArgument(_)));
    }

    #[test]
    fn missing_estimate_is_reported() {
        let (_temp, context) = prepare_test_context().unwrap();
        let err = context.estimate_view("est-missing").unwrap_err();
        assert!(matches!(
            err,
            AppError::Takeoff(TakeoffError::EstimateNotFound { .. })
        ));
    }
}
