//! Composition root: one [`TableSync`] per table name.
//!
//! Every consumer obtains its table handle from the same registry, so two
//! components naming the same table always share one index.

use crate::error::Result;
use crate::{Error, IndexSnapshot, SharedInterface, SingleView, TableInterface, TableName, TableSync};
use dashmap::DashMap;
use std::sync::Arc;

/// Owns the sync cores of every table backed by one interface.
pub struct SyncRegistry {
    interface: SharedInterface,
    tables: DashMap<TableName, TableSync>,
}

impl std::fmt::Debug for SyncRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncRegistry")
            .field("tables", &self.tables())
            .finish()
    }
}

impl SyncRegistry {
    pub fn new(interface: impl TableInterface + 'static) -> Self {
        Self::from_shared(Arc::new(interface))
    }

    pub fn from_shared(interface: SharedInterface) -> Self {
        Self {
            interface,
            tables: DashMap::new(),
        }
    }

    pub fn interface(&self) -> &SharedInterface {
        &self.interface
    }

    /// The sync core for `table`, created on first use.
    pub fn sync(&self, table: &str) -> TableSync {
        if let Some(existing) = self.tables.get(table) {
            return existing.clone();
        }
        self.tables
            .entry(table.to_string())
            .or_insert_with(|| TableSync::new(table, self.interface.clone()))
            .clone()
    }

    /// Like [`sync`](Self::sync), then merge `snapshot` into the index.
    pub fn sync_with_snapshot(&self, table: &str, snapshot: Arc<IndexSnapshot>) -> Result<TableSync> {
        let sync = self.sync(table);
        sync.seed(snapshot)?;
        Ok(sync)
    }

    /// The sync core for `table` if one was created.
    pub fn get(&self, table: &str) -> Option<TableSync> {
        self.tables.get(table).map(|entry| entry.clone())
    }

    /// Bind a single-record view. The table must already be synchronized.
    pub fn single(&self, table: &str, id: impl Into<String>) -> Result<SingleView> {
        let sync = self.get(table).ok_or_else(|| {
            Error::Misuse(format!("single view on table '{table}' which is not synchronized"))
        })?;
        SingleView::mount(&sync, id)
    }

    /// Names of all synchronized tables, sorted.
    pub fn tables(&self) -> Vec<TableName> {
        let mut names: Vec<TableName> = self.tables.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }

    /// Drop a table's sync core and stop its actions.
    pub fn unmount(&self, table: &str) -> bool {
        match self.tables.remove(table) {
            Some((_, sync)) => {
                sync.unmount();
                tracing::debug!(table, "table sync unmounted");
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Fields, MemoryAdapter, Record};
    use serde_json::json;

    #[test]
    fn one_sync_per_table() {
        let registry = SyncRegistry::new(MemoryAdapter::new());
        let a = registry.sync("todos");
        let b = registry.sync("todos");
        assert!(a.index().same_index(b.index()));
        assert!(!a.index().same_index(registry.sync("users").index()));
        assert_eq!(registry.tables(), vec!["todos", "users"]);
    }

    #[test]
    fn concurrent_first_use_still_yields_one_index() {
        let registry = Arc::new(SyncRegistry::new(MemoryAdapter::new()));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let registry = registry.clone();
                std::thread::spawn(move || registry.sync("todos"))
            })
            .collect();
        let syncs: Vec<TableSync> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        for sync in &syncs {
            assert!(sync.index().same_index(syncs[0].index()));
        }
    }

    #[tokio::test]
    async fn single_requires_synced_table() {
        let registry = SyncRegistry::new(MemoryAdapter::new());
        let err = registry.single("todos", "a").unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::Misuse);

        let sync = registry.sync("todos");
        let mut fields = Fields::new();
        fields.insert("text".into(), json!("x"));
        sync.index().set([Record::new("a", fields)]);
        let view = registry.single("todos", "a").unwrap();
        assert!(view.single().is_some());
    }

    #[test]
    fn snapshot_seeds_shared_index() {
        let registry = SyncRegistry::new(MemoryAdapter::new());
        let snapshot = Arc::new(
            IndexSnapshot::new("todos").with_records([Record::new("a", Fields::new())]),
        );
        registry.sync_with_snapshot("todos", snapshot).unwrap();
        assert!(registry.sync("todos").get("a").is_some());
    }

    #[test]
    fn unmount_forgets_table() {
        let registry = SyncRegistry::new(MemoryAdapter::new());
        let sync = registry.sync("todos");
        assert!(registry.unmount("todos"));
        assert!(!sync.create().is_mounted());
        assert!(registry.get("todos").is_none());
        assert!(!registry.unmount("todos"));
    }
}
