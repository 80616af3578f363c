//! In-memory storage backend.
//!
//! `MemoryBackend` implements the full transaction contract without an
//! external database: each transaction buffers its mutations in an overlay
//! and applies them atomically on commit, so reads see the transaction's own
//! writes while other transactions see nothing until `commit` succeeds.
//!
//! The backend also supports fault injection, used to exercise the
//! dispatcher's transient-error retry path:
//!
//! ```rust,ignore
//! backend.inject_fault(ErrorCode::SerializationFailure, 2);
//! // the next two commits fail with S3001, the third succeeds
//! ```

use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use tracing::debug;

use crate::backend::StorageBackend;
use crate::context::{TransactionContext, UserId};
use crate::error::{ErrorCode, StoreError, StoreResult};
use crate::record::{Criteria, FieldMap, Record};
use crate::transaction::{AccessMode, Transaction, TransactionOps};

#[derive(Default)]
struct Table {
    rows: BTreeMap<i64, FieldMap>,
    next_id: i64,
}

#[derive(Default)]
struct Database {
    tables: RwLock<HashMap<String, Table>>,
}

/// An in-memory transactional record store.
#[derive(Clone, Default)]
pub struct MemoryBackend {
    databases: Arc<RwLock<HashMap<String, Arc<Database>>>>,
    faults: Arc<Mutex<VecDeque<ErrorCode>>>,
}

impl MemoryBackend {
    /// Create an empty backend.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a database. Idempotent.
    pub fn create_database(&self, name: impl Into<String>) {
        self.databases
            .write()
            .entry(name.into())
            .or_insert_with(|| Arc::new(Database::default()));
    }

    /// Check whether a database exists.
    pub fn has_database(&self, name: &str) -> bool {
        self.databases.read().contains_key(name)
    }

    /// Queue `count` faults: the next `count` commits on this backend fail
    /// with `code` instead of applying their work.
    pub fn inject_fault(&self, code: ErrorCode, count: usize) {
        let mut faults = self.faults.lock();
        for _ in 0..count {
            faults.push_back(code);
        }
    }

    /// Number of queued faults not yet consumed.
    pub fn pending_faults(&self) -> usize {
        self.faults.lock().len()
    }

    fn take_fault(&self) -> Option<ErrorCode> {
        self.faults.lock().pop_front()
    }
}

#[async_trait]
impl StorageBackend for MemoryBackend {
    async fn begin(
        &self,
        database: &str,
        user: UserId,
        context: TransactionContext,
        mode: AccessMode,
    ) -> StoreResult<Transaction> {
        let db = self
            .databases
            .read()
            .get(database)
            .cloned()
            .ok_or_else(|| StoreError::database_not_found(database))?;

        debug!(database, user = %user, ?mode, "memory transaction opened");

        let ops = MemoryTransaction {
            db,
            backend: self.clone(),
            overlay: Mutex::new(Overlay::default()),
        };
        Ok(Transaction::new(
            Box::new(ops),
            database,
            user,
            context,
            mode,
        ))
    }
}

#[derive(Default)]
struct OverlayTable {
    inserted: BTreeMap<i64, FieldMap>,
    updated: HashMap<i64, FieldMap>,
    deleted: HashSet<i64>,
}

#[derive(Default)]
struct Overlay {
    tables: HashMap<String, OverlayTable>,
}

struct MemoryTransaction {
    db: Arc<Database>,
    backend: MemoryBackend,
    overlay: Mutex<Overlay>,
}

impl MemoryTransaction {
    /// The row as this transaction sees it: base row plus overlay patches.
    fn effective_row(&self, model: &str, id: i64) -> Option<FieldMap> {
        let overlay = self.overlay.lock();
        let patch = overlay.tables.get(model);

        if let Some(t) = patch {
            if t.deleted.contains(&id) {
                return None;
            }
            if let Some(fields) = t.inserted.get(&id) {
                let mut row = fields.clone();
                if let Some(update) = t.updated.get(&id) {
                    row.extend(update.clone());
                }
                return Some(row);
            }
        }

        let tables = self.db.tables.read();
        let base = tables.get(model)?.rows.get(&id)?.clone();
        match patch.and_then(|t| t.updated.get(&id)) {
            Some(update) => {
                let mut row = base;
                row.extend(update.clone());
                Some(row)
            }
            None => Some(base),
        }
    }
}

#[async_trait]
impl TransactionOps for MemoryTransaction {
    async fn search(&self, model: &str, criteria: &Criteria) -> StoreResult<Vec<i64>> {
        let mut rows: BTreeMap<i64, FieldMap> = BTreeMap::new();

        {
            let tables = self.db.tables.read();
            if let Some(table) = tables.get(model) {
                for (id, fields) in &table.rows {
                    rows.insert(*id, fields.clone());
                }
            }
        }

        let overlay = self.overlay.lock();
        if let Some(t) = overlay.tables.get(model) {
            for id in &t.deleted {
                rows.remove(id);
            }
            for (id, fields) in &t.inserted {
                rows.insert(*id, fields.clone());
            }
            for (id, update) in &t.updated {
                if let Some(row) = rows.get_mut(id) {
                    row.extend(update.clone());
                }
            }
        }

        Ok(rows
            .into_iter()
            .filter(|(_, fields)| criteria.matches(fields))
            .map(|(id, _)| id)
            .collect())
    }

    async fn load(&self, model: &str, id: i64) -> StoreResult<Record> {
        self.effective_row(model, id)
            .map(|fields| Record::new(model, id, fields))
            .ok_or_else(|| StoreError::not_found(model, id))
    }

    async fn create(&self, model: &str, fields: FieldMap) -> StoreResult<i64> {
        // Ids are reserved eagerly, sequence-style: a rolled back create
        // leaves a gap rather than a collision window.
        let id = {
            let mut tables = self.db.tables.write();
            let table = tables.entry(model.to_string()).or_default();
            table.next_id += 1;
            table.next_id
        };

        self.overlay
            .lock()
            .tables
            .entry(model.to_string())
            .or_default()
            .inserted
            .insert(id, fields);
        Ok(id)
    }

    async fn write(&self, model: &str, id: i64, fields: FieldMap) -> StoreResult<()> {
        if self.effective_row(model, id).is_none() {
            return Err(StoreError::not_found(model, id));
        }
        self.overlay
            .lock()
            .tables
            .entry(model.to_string())
            .or_default()
            .updated
            .entry(id)
            .or_default()
            .extend(fields);
        Ok(())
    }

    async fn delete(&self, model: &str, id: i64) -> StoreResult<()> {
        if self.effective_row(model, id).is_none() {
            return Err(StoreError::not_found(model, id));
        }
        let mut overlay = self.overlay.lock();
        let t = overlay.tables.entry(model.to_string()).or_default();
        t.inserted.remove(&id);
        t.updated.remove(&id);
        t.deleted.insert(id);
        Ok(())
    }

    async fn commit(&self) -> StoreResult<()> {
        if let Some(code) = self.backend.take_fault() {
            self.overlay.lock().tables.clear();
            return Err(StoreError::new(code, code.description()));
        }

        let mut overlay = self.overlay.lock();
        let mut tables = self.db.tables.write();
        for (model, patch) in overlay.tables.drain() {
            let table = tables.entry(model).or_default();
            for id in patch.deleted {
                table.rows.remove(&id);
            }
            for (id, fields) in patch.inserted {
                table.rows.insert(id, fields);
            }
            for (id, update) in patch.updated {
                if let Some(row) = table.rows.get_mut(&id) {
                    row.extend(update);
                }
            }
        }
        Ok(())
    }

    async fn rollback(&self) -> StoreResult<()> {
        self.overlay.lock().tables.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::SUPERUSER_UID;
    use serde_json::json;

    fn fields(pairs: &[(&str, serde_json::Value)]) -> FieldMap {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    fn backend() -> MemoryBackend {
        let backend = MemoryBackend::new();
        backend.create_database("erp");
        backend
    }

    async fn txn(backend: &MemoryBackend) -> Transaction {
        backend
            .begin(
                "erp",
                SUPERUSER_UID,
                TransactionContext::new(),
                AccessMode::ReadWrite,
            )
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_unknown_database() {
        let backend = MemoryBackend::new();
        let err = backend
            .begin(
                "nope",
                SUPERUSER_UID,
                TransactionContext::new(),
                AccessMode::ReadWrite,
            )
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::DatabaseNotFound);
    }

    #[tokio::test]
    async fn test_commit_makes_writes_visible() {
        let backend = backend();

        let t1 = txn(&backend).await;
        let id = t1
            .create("res.partner", fields(&[("name", json!("Acme"))]))
            .await
            .unwrap();
        t1.commit().await.unwrap();

        let t2 = txn(&backend).await;
        let rec = t2.load("res.partner", id).await.unwrap();
        assert_eq!(rec.get_str("name"), Some("Acme"));
        t2.rollback().await.unwrap();
    }

    #[tokio::test]
    async fn test_rollback_discards_writes() {
        let backend = backend();

        let t1 = txn(&backend).await;
        let id = t1
            .create("res.partner", fields(&[("name", json!("Ghost"))]))
            .await
            .unwrap();
        t1.rollback().await.unwrap();

        let t2 = txn(&backend).await;
        let err = t2.load("res.partner", id).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::RecordNotFound);
        t2.rollback().await.unwrap();
    }

    #[tokio::test]
    async fn test_reads_see_own_writes() {
        let backend = backend();

        let t1 = txn(&backend).await;
        let id = t1
            .create("res.partner", fields(&[("name", json!("Acme"))]))
            .await
            .unwrap();
        t1.write("res.partner", id, fields(&[("city", json!("Lyon"))]))
            .await
            .unwrap();

        let rec = t1.load("res.partner", id).await.unwrap();
        assert_eq!(rec.get_str("name"), Some("Acme"));
        assert_eq!(rec.get_str("city"), Some("Lyon"));

        let ids = t1
            .search("res.partner", &Criteria::new().eq("city", json!("Lyon")))
            .await
            .unwrap();
        assert_eq!(ids, vec![id]);
        t1.rollback().await.unwrap();
    }

    #[tokio::test]
    async fn test_isolation_before_commit() {
        let backend = backend();

        let t1 = txn(&backend).await;
        t1.create("res.partner", fields(&[("name", json!("Hidden"))]))
            .await
            .unwrap();

        let t2 = txn(&backend).await;
        let ids = t2.search("res.partner", &Criteria::new()).await.unwrap();
        assert!(ids.is_empty());

        t1.commit().await.unwrap();
        t2.rollback().await.unwrap();
    }

    #[tokio::test]
    async fn test_delete_then_commit() {
        let backend = backend();

        let t1 = txn(&backend).await;
        let id = t1.create("res.partner", FieldMap::new()).await.unwrap();
        t1.commit().await.unwrap();

        let t2 = txn(&backend).await;
        t2.delete("res.partner", id).await.unwrap();
        assert!(t2.load("res.partner", id).await.is_err());
        t2.commit().await.unwrap();

        let t3 = txn(&backend).await;
        assert!(t3.load("res.partner", id).await.is_err());
        t3.rollback().await.unwrap();
    }

    #[tokio::test]
    async fn test_search_on_unknown_model_is_empty() {
        let backend = backend();
        let t1 = txn(&backend).await;
        let ids = t1.search("no.such.model", &Criteria::new()).await.unwrap();
        assert!(ids.is_empty());
        t1.rollback().await.unwrap();
    }

    #[tokio::test]
    async fn test_injected_fault_fails_commit_and_applies_nothing() {
        let backend = backend();
        backend.inject_fault(ErrorCode::SerializationFailure, 1);

        let t1 = txn(&backend).await;
        t1.create("res.partner", fields(&[("name", json!("Lost"))]))
            .await
            .unwrap();
        let err = t1.commit().await.unwrap_err();
        assert!(err.is_transient());
        assert_eq!(backend.pending_faults(), 0);

        let t2 = txn(&backend).await;
        let ids = t2.search("res.partner", &Criteria::new()).await.unwrap();
        assert!(ids.is_empty());
        t2.commit().await.unwrap();
    }
}
