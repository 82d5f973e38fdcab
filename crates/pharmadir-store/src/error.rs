use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("pharmacy {0} not found")]
    NotFound(i64),

    #[error("duckdb error: {0}")]
    DuckDb(#[from] ::duckdb::Error),

    #[error("invalid timestamp in column {column}: {micros}")]
    Timestamp { column: &'static str, micros: i64 },

    #[error("store lock poisoned")]
    LockPoisoned,

    #[error("{0}")]
    Other(String),
}
