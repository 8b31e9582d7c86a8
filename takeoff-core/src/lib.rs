pub mod config;
pub mod error;
pub mod lookup;
mod sqlite;
pub mod takeoff;
pub mod validation;

pub use config::{
    load_takeoff_config, PricingSection, SandboxSection, StorageSection, TakeoffConfig,
};
pub use error::{ConfigError, Result};
pub use lookup::{
    ChangeSet, CustomKind, CustomLookupTable, CustomValue, CustomValueSink, LookupError,
    LookupHistoryEntry, LookupTable, LookupValue, PriceFallback, PriceItem, PriceLookupTable,
    ValueType,
};
pub use takeoff::{
    BuildingDimensions, ErrorKind, Estimate, EstimateResult, EstimateSection, EstimateStatus,
    FormValues, PersistenceStatus, RunMode, RunOutcome, ScriptSandbox, SqliteTakeoffStore,
    SqliteTakeoffStoreBuilder, TakeOffApi, TakeoffError, TakeoffModel, TakeoffResult,
    TakeoffRunner,
};
pub use validation::{FieldError, FieldErrors};
