//! Error types for store operations.
//!
//! Every failure carries an [`ErrorCode`] so callers can classify
//! programmatically instead of matching on message text. The only codes the
//! dispatch layer ever retries are the three operational ones reported by
//! [`StoreError::is_transient`]; everything else is final.
//!
//! ```rust
//! use portico_store::{ErrorCode, StoreError};
//!
//! let err = StoreError::serialization_failure();
//! assert_eq!(err.code, ErrorCode::SerializationFailure);
//! assert!(err.is_transient());
//!
//! let err = StoreError::not_found("sale.order", 42);
//! assert!(!err.is_transient());
//! ```

use std::fmt;
use thiserror::Error;

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Error codes for programmatic error handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    // Record errors (1xxx)
    /// Record not found (S1001).
    RecordNotFound = 1001,
    /// Model has no table in this database (S1002).
    ModelNotFound = 1002,
    /// Database does not exist (S1003).
    DatabaseNotFound = 1003,

    // Transaction errors (2xxx)
    /// Write attempted through a read-only transaction (S2001).
    ReadOnlyTransaction = 2001,
    /// Transaction already committed or rolled back (S2002).
    TransactionClosed = 2002,

    // Operational errors (3xxx) - the transient class
    /// Serialization conflict between concurrent transactions (S3001).
    SerializationFailure = 3001,
    /// Deadlock detected (S3002).
    Deadlock = 3002,
    /// Connection dropped mid-operation (S3003).
    ConnectionReset = 3003,

    // Internal errors (9xxx)
    /// Internal error (S9001).
    Internal = 9001,
}

impl ErrorCode {
    /// Get the error code string (e.g., "S1001").
    pub fn code(&self) -> String {
        format!("S{}", *self as u16)
    }

    /// Get a short description of the error code.
    pub fn description(&self) -> &'static str {
        match self {
            Self::RecordNotFound => "Record not found",
            Self::ModelNotFound => "Model not found",
            Self::DatabaseNotFound => "Database not found",
            Self::ReadOnlyTransaction => "Read-only transaction",
            Self::TransactionClosed => "Transaction already closed",
            Self::SerializationFailure => "Serialization failure",
            Self::Deadlock => "Deadlock detected",
            Self::ConnectionReset => "Connection reset",
            Self::Internal => "Internal error",
        }
    }

    /// Whether this code belongs to the designated transient/operational
    /// class that the dispatcher may retry.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::SerializationFailure | Self::Deadlock | Self::ConnectionReset
        )
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Errors raised by storage backends and transactions.
#[derive(Error, Debug)]
pub struct StoreError {
    /// The error code.
    pub code: ErrorCode,
    /// The error message.
    pub message: String,
    /// The model involved, if any.
    pub model: Option<String>,
    /// The source error (if any).
    #[source]
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code.code(), self.message)
    }
}

impl StoreError {
    /// Create a new error with the given code and message.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            model: None,
            source: None,
        }
    }

    /// Set the model.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Set the source error.
    pub fn with_source<E: std::error::Error + Send + Sync + 'static>(mut self, source: E) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    /// Create a record-not-found error.
    pub fn not_found(model: impl Into<String>, id: i64) -> Self {
        let model = model.into();
        Self::new(
            ErrorCode::RecordNotFound,
            format!("No {} record with id {}", model, id),
        )
        .with_model(model)
    }

    /// Create a model-not-found error.
    pub fn model_not_found(model: impl Into<String>) -> Self {
        let model = model.into();
        Self::new(
            ErrorCode::ModelNotFound,
            format!("Model {} has no table in this database", model),
        )
        .with_model(model)
    }

    /// Create a database-not-found error.
    pub fn database_not_found(database: impl Into<String>) -> Self {
        Self::new(
            ErrorCode::DatabaseNotFound,
            format!("Database {} does not exist", database.into()),
        )
    }

    /// Create a read-only violation error.
    pub fn read_only(operation: &str) -> Self {
        Self::new(
            ErrorCode::ReadOnlyTransaction,
            format!("Cannot {} through a read-only transaction", operation),
        )
    }

    /// Create a transaction-closed error.
    pub fn closed() -> Self {
        Self::new(
            ErrorCode::TransactionClosed,
            "Transaction already committed or rolled back",
        )
    }

    /// Create a serialization-failure error.
    pub fn serialization_failure() -> Self {
        Self::new(
            ErrorCode::SerializationFailure,
            "Could not serialize access due to concurrent update",
        )
    }

    /// Create a deadlock error.
    pub fn deadlock() -> Self {
        Self::new(ErrorCode::Deadlock, "Deadlock detected")
    }

    /// Create a connection-reset error.
    pub fn connection_reset() -> Self {
        Self::new(ErrorCode::ConnectionReset, "Connection reset by peer")
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Internal, message)
    }

    /// Check if this is a record-not-found error.
    pub fn is_not_found(&self) -> bool {
        self.code == ErrorCode::RecordNotFound
    }

    /// Check if this error belongs to the transient/operational class.
    pub fn is_transient(&self) -> bool {
        self.code.is_transient()
    }
}
