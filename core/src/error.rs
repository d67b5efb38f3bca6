use thiserror::Error;

#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid attribute key: {key:?}")]
    InvalidKey { key: String },

    #[error("Attribute '{key}' requires a value (got null)")]
    MissingValue { key: String },

    #[error("Unknown stored value kind '{kind}' for key '{key}'")]
    CorruptValue { key: String, kind: String },

    #[error("Transaction price must be finite (got {price})")]
    InvalidPrice { price: f64 },

    #[error("Live board rejected write for '{account}': {reason}")]
    LiveBoard { account: String, reason: String },

    #[error("Account '{account}' is not connected")]
    AccountNotConnected { account: String },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type LedgerResult<T> = Result<T, LedgerError>;
