//! Error taxonomy shared by the storage seam, the locker and the proxies

use thiserror::Error;

/// Failures raised by the storage layer.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("duplicate element in {table} ({})", columns.join(", "))]
    Duplicate { table: String, columns: Vec<String> },
    #[error("foreign key violation: {0}")]
    ForeignKey(String),
    #[error("check constraint violation: {0}")]
    Check(String),
    #[error("invalid query: {0}")]
    InvalidQuery(String),
    #[error("unknown procedure \"{0}\"")]
    UnknownScript(String),
    #[error("invalid arguments for \"{script}\": {reason}")]
    InvalidArgs { script: String, reason: String },
    #[error("column \"{0}\" missing or of unexpected type")]
    Column(String),
    #[error("sqlite error: {0}")]
    Sqlite(rusqlite::Error),
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

impl StoreError {
    pub fn is_duplicate_on(&self, column: &str) -> bool {
        matches!(self, StoreError::Duplicate { columns, .. } if columns.iter().any(|c| c == column))
    }
}

/// Failures while reading the runtime configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Raised when a lock handle is released while not held.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum LockError {
    #[error("lock on \"{0}\" is not held, seems already released")]
    NotHeld(String),
}

/// Reasons a request is refused as malformed or inadmissible.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ValidationError {
    #[error("invalid identifier \"{0}\"")]
    InvalidId(String),
    #[error("unknown element \"{0}\"")]
    UnknownElement(String),
    #[error("element \"{element}\" is a {actual}, expected a {expected}")]
    WrongElementKind {
        element: String,
        expected: &'static str,
        actual: String,
    },
    #[error("invalid level transition {current} -> {desired} for \"{element}\"")]
    InvalidLevels {
        element: String,
        current: i64,
        desired: i64,
    },
    #[error("stale action: \"{element}\" is at level {actual}, action assumes {assumed}")]
    StaleLevel {
        element: String,
        actual: i64,
        assumed: i64,
    },
    #[error("invalid amount {amount} (remaining {remaining})")]
    InvalidAmount { amount: i64, remaining: i64 },
    #[error("invalid coordinates {0}")]
    InvalidCoordinates(String),
    #[error("{0}")]
    InvalidField(String),
    #[error("not enough resources to perform action on \"{0}\"")]
    NotEnoughResources(String),
    #[error("tech requirements not met for \"{0}\"")]
    UnmetDependencies(String),
    #[error("no field left on planet \"{0}\"")]
    NoFieldLeft(String),
    #[error("{0}")]
    Conflict(String),
}

#[derive(Debug, Error)]
pub enum GameError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("content data error: {0}")]
    ContentData(String),
    #[error(transparent)]
    Concurrency(#[from] LockError),
    #[error(transparent)]
    Storage(#[from] StoreError),
    #[error("could not find free coordinates after {trials} trial(s)")]
    CapacityExhausted { trials: usize },
    #[error("{kind} \"{id}\" not found")]
    NotFound { kind: &'static str, id: String },
}

pub type Result<T, E = GameError> = std::result::Result<T, E>;
