//! The storage backend seam.

use async_trait::async_trait;

use crate::context::{TransactionContext, UserId};
use crate::error::StoreResult;
use crate::transaction::{AccessMode, Transaction};

/// A transactional record store.
///
/// A backend may host several named databases. `begin` is the only entry
/// point: all record access flows through the returned [`Transaction`], and
/// handlers never see the backend itself, so nested top-level transactions
/// are not expressible from handler code.
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Open a transaction against `database`, acting as `user`, with its own
    /// copy of `context`.
    async fn begin(
        &self,
        database: &str,
        user: UserId,
        context: TransactionContext,
        mode: AccessMode,
    ) -> StoreResult<Transaction>;
}
