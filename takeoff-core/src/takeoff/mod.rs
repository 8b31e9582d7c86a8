pub mod api;
pub mod error;
pub mod form;
pub mod models;
pub mod pipeline;
pub mod script;
pub mod store;

pub use api::{
    flatten_sections, CalculatedItem, EstimateSection, NewPart, SectionHandle, TakeOffApi,
    TakeOffParts,
};
pub use error::{ErrorKind, TakeoffError, TakeoffResult};
pub use form::{coerce_form_values, coerce_value};
pub use models::{
    BuildingDimensions, Estimate, EstimateResult, EstimateStatus, FormValues, ModelSummary,
    PriceList, PriceListSummary, TakeoffModel,
};
pub use pipeline::{PersistenceStatus, RunMode, RunOutcome, TakeoffRunner};
pub use script::{ScriptOutcome, ScriptSandbox};
pub use store::{SqliteTakeoffStore, SqliteTakeoffStoreBuilder};
