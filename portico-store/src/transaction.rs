//! Request-scoped transactions.
//!
//! A [`Transaction`] is a cheaply cloneable handle over one unit of database
//! work, created by [`StorageBackend::begin`](crate::StorageBackend::begin)
//! and terminated by exactly one [`commit`](Transaction::commit) or
//! [`rollback`](Transaction::rollback). Termination is tracked on the shared
//! handle state, so every clone observes it: a record operation after close
//! fails with [`ErrorCode::TransactionClosed`](crate::ErrorCode), and a second
//! termination is a programming error that trips a `debug_assert!` in debug
//! builds.
//!
//! Dropping the last handle of an open transaction discards all pending work
//! and logs a warning. Nothing buffered in a transaction becomes visible to
//! other transactions unless `commit` returns `Ok`.

use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::context::{TransactionContext, UserId};
use crate::error::{StoreError, StoreResult};
use crate::record::{Criteria, FieldMap, Record};

/// Access mode for a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum AccessMode {
    /// Read-write access (default).
    #[default]
    ReadWrite,
    /// Read-only access; mutating record operations are rejected.
    ReadOnly,
}

/// Backend-side operations for one live transaction.
///
/// Implementations buffer mutations until `commit`; `rollback` and a failed
/// `commit` must both leave the database untouched.
#[async_trait]
pub trait TransactionOps: Send + Sync {
    /// Search a model, returning matching record ids in ascending order.
    async fn search(&self, model: &str, criteria: &Criteria) -> StoreResult<Vec<i64>>;

    /// Load one record by id.
    async fn load(&self, model: &str, id: i64) -> StoreResult<Record>;

    /// Create a record, returning its id.
    async fn create(&self, model: &str, fields: FieldMap) -> StoreResult<i64>;

    /// Update fields of an existing record.
    async fn write(&self, model: &str, id: i64, fields: FieldMap) -> StoreResult<()>;

    /// Delete a record.
    async fn delete(&self, model: &str, id: i64) -> StoreResult<()>;

    /// Apply all buffered work.
    async fn commit(&self) -> StoreResult<()>;

    /// Discard all buffered work.
    async fn rollback(&self) -> StoreResult<()>;
}

const STATE_OPEN: u8 = 0;
const STATE_COMMITTED: u8 = 1;
const STATE_ROLLED_BACK: u8 = 2;

struct TxnShared {
    ops: Box<dyn TransactionOps>,
    database: String,
    user: UserId,
    context: TransactionContext,
    mode: AccessMode,
    state: AtomicU8,
}

impl Drop for TxnShared {
    fn drop(&mut self) {
        if self.state.load(Ordering::Acquire) == STATE_OPEN {
            warn!(
                database = %self.database,
                user = %self.user,
                "transaction dropped without commit or rollback; pending work discarded"
            );
        }
    }
}

/// A handle to one live transaction.
#[derive(Clone)]
pub struct Transaction {
    inner: Arc<TxnShared>,
}

impl std::fmt::Debug for Transaction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transaction")
            .field("database", &self.inner.database)
            .field("user", &self.inner.user)
            .field("mode", &self.inner.mode)
            .field("open", &self.is_open())
            .finish()
    }
}

impl Transaction {
    /// Create a transaction over backend-specific operations.
    ///
    /// Called by [`StorageBackend`](crate::StorageBackend) implementations,
    /// not by application code.
    pub fn new(
        ops: Box<dyn TransactionOps>,
        database: impl Into<String>,
        user: UserId,
        context: TransactionContext,
        mode: AccessMode,
    ) -> Self {
        Self {
            inner: Arc::new(TxnShared {
                ops,
                database: database.into(),
                user,
                context,
                mode,
                state: AtomicU8::new(STATE_OPEN),
            }),
        }
    }

    /// The database this transaction is bound to.
    pub fn database(&self) -> &str {
        &self.inner.database
    }

    /// The acting user.
    pub fn user(&self) -> UserId {
        self.inner.user
    }

    /// The transaction's own copy of the execution context.
    pub fn context(&self) -> &TransactionContext {
        &self.inner.context
    }

    /// The access mode.
    pub fn mode(&self) -> AccessMode {
        self.inner.mode
    }

    /// Whether the transaction is still open.
    pub fn is_open(&self) -> bool {
        self.inner.state.load(Ordering::Acquire) == STATE_OPEN
    }

    fn ensure_open(&self) -> StoreResult<()> {
        if self.is_open() {
            Ok(())
        } else {
            Err(StoreError::closed())
        }
    }

    fn ensure_writable(&self, operation: &str) -> StoreResult<()> {
        self.ensure_open()?;
        match self.inner.mode {
            AccessMode::ReadWrite => Ok(()),
            AccessMode::ReadOnly => Err(StoreError::read_only(operation)),
        }
    }

    /// Search a model, returning matching record ids.
    pub async fn search(&self, model: &str, criteria: &Criteria) -> StoreResult<Vec<i64>> {
        self.ensure_open()?;
        self.inner.ops.search(model, criteria).await
    }

    /// Load one record by id.
    pub async fn load(&self, model: &str, id: i64) -> StoreResult<Record> {
        self.ensure_open()?;
        self.inner.ops.load(model, id).await
    }

    /// Create a record, returning its id.
    pub async fn create(&self, model: &str, fields: FieldMap) -> StoreResult<i64> {
        self.ensure_writable("create")?;
        self.inner.ops.create(model, fields).await
    }

    /// Update fields of an existing record.
    pub async fn write(&self, model: &str, id: i64, fields: FieldMap) -> StoreResult<()> {
        self.ensure_writable("write")?;
        self.inner.ops.write(model, id, fields).await
    }

    /// Delete a record.
    pub async fn delete(&self, model: &str, id: i64) -> StoreResult<()> {
        self.ensure_writable("delete")?;
        self.inner.ops.delete(model, id).await
    }

    /// Commit all buffered work.
    ///
    /// A failed commit applies nothing and leaves the transaction closed, so
    /// callers must not follow it with `rollback`.
    pub async fn commit(&self) -> StoreResult<()> {
        match self.inner.state.compare_exchange(
            STATE_OPEN,
            STATE_COMMITTED,
            Ordering::AcqRel,
            Ordering::Acquire,
        ) {
            Ok(_) => match self.inner.ops.commit().await {
                Ok(()) => {
                    debug!(database = %self.inner.database, user = %self.inner.user, "transaction committed");
                    Ok(())
                }
                Err(err) => {
                    self.inner.state.store(STATE_ROLLED_BACK, Ordering::Release);
                    warn!(database = %self.inner.database, error = %err, "commit failed; transaction discarded");
                    Err(err)
                }
            },
            Err(_) => {
                debug_assert!(false, "commit called on a closed transaction");
                Err(StoreError::closed())
            }
        }
    }

    /// Discard all buffered work.
    pub async fn rollback(&self) -> StoreResult<()> {
        match self.inner.state.compare_exchange(
            STATE_OPEN,
            STATE_ROLLED_BACK,
            Ordering::AcqRel,
            Ordering::Acquire,
        ) {
            Ok(_) => {
                debug!(database = %self.inner.database, user = %self.inner.user, "transaction rolled back");
                self.inner.ops.rollback().await
            }
            Err(_) => {
                debug_assert!(false, "rollback called on a closed transaction");
                Err(StoreError::closed())
            }
        }
    }
}
