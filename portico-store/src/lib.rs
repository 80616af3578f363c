//! # portico-store
//!
//! Transaction manager and record-store boundary for the Portico dispatch
//! engine.
//!
//! This crate owns the transaction lifecycle the dispatcher relies on:
//!
//! - [`StorageBackend`]: the seam to a transactional record store
//! - [`Transaction`]: a request-scoped handle that is terminated by exactly
//!   one commit or rollback, with loud failure on misuse
//! - [`TransactionContext`]: the (company, language) scope copied into each
//!   transaction
//! - [`MemoryBackend`]: a complete in-memory implementation with commit,
//!   rollback, snapshot isolation and fault injection
//!
//! ## Example
//!
//! ```rust
//! use portico_store::{
//!     AccessMode, Criteria, MemoryBackend, StorageBackend, TransactionContext, UserId,
//! };
//! use serde_json::json;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), portico_store::StoreError> {
//! let backend = MemoryBackend::new();
//! backend.create_database("erp");
//!
//! let txn = backend
//!     .begin("erp", UserId(2), TransactionContext::new().with_company(1), AccessMode::ReadWrite)
//!     .await?;
//! let id = txn
//!     .create("res.partner", [("name".to_string(), json!("Acme"))].into_iter().collect())
//!     .await?;
//! txn.commit().await?;
//!
//! let txn = backend
//!     .begin("erp", UserId(2), TransactionContext::new(), AccessMode::ReadOnly)
//!     .await?;
//! let ids = txn.search("res.partner", &Criteria::new().eq("name", json!("Acme"))).await?;
//! assert_eq!(ids, vec![id]);
//! txn.rollback().await?;
//! # Ok(())
//! # }
//! ```

#![deny(rustdoc::broken_intra_doc_links)]

pub mod backend;
pub mod context;
pub mod error;
pub mod memory;
pub mod record;
pub mod transaction;

pub use backend::StorageBackend;
pub use context::{SUPERUSER_UID, TransactionContext, UserId};
pub use error::{ErrorCode, StoreError, StoreResult};
pub use memory::MemoryBackend;
pub use record::{Criteria, FieldMap, Record};
pub use transaction::{AccessMode, Transaction, TransactionOps};
