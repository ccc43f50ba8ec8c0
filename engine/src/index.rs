//! Table index - the shared id → record cache for one table.
//!
//! A [`TableIndex`] is a cheap handle; clones share the same cache. State is
//! published through a `tokio::sync::watch` channel, so any number of
//! consumers can [`subscribe`](TableIndex::subscribe) and wake on change.
//!
//! # Invariants
//!
//! 1. At most one entry per id; `set` always overwrites by id.
//! 2. Every mutation runs inside one `send_if_modified` call, so readers never
//!    observe a half-applied `set`/`unset`.
//! 3. `version` increases by exactly one per mutation that changed the map;
//!    no-op mutations notify nobody.
//! 4. `array` is rebuilt on every change and carries no ordering guarantee.
//! 5. A lazy fetch never resurrects an id removed while it was in flight,
//!    even when the removal found nothing cached to drop.

use crate::{IndexMutation, Record, RecordId, TableName};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::watch;

/// Read-only view of an index at one version.
#[derive(Debug, Clone, Default)]
pub struct IndexView {
    records: Arc<HashMap<RecordId, Record>>,
    array: Arc<Vec<Record>>,
    version: u64,
}

impl IndexView {
    pub fn get(&self, id: &str) -> Option<&Record> {
        self.records.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.records.contains_key(id)
    }

    /// The id → record map.
    pub fn records(&self) -> &HashMap<RecordId, Record> {
        &self.records
    }

    /// All records, in no particular order. Sort before relying on order.
    pub fn array(&self) -> &[Record] {
        &self.array
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    fn rebuild(&mut self) {
        self.array = Arc::new(self.records.values().cloned().collect());
        self.version += 1;
    }
}

/// Removals seen by ids with a lazy fetch in flight.
#[derive(Debug, Default)]
struct Fetches {
    removals: u64,
    pending: HashMap<RecordId, PendingFetch>,
}

#[derive(Debug)]
struct PendingFetch {
    waiters: usize,
    removed_at: u64,
}

/// An in-flight lazy fetch of one id. Dropping it abandons the fetch.
#[derive(Debug)]
pub(crate) struct FetchTicket {
    index: TableIndex,
    id: RecordId,
    removals: u64,
}

impl FetchTicket {
    /// Insert the fetched record unless the id gained an entry or was
    /// removed since the fetch began.
    pub(crate) fn complete(self, record: Record) -> bool {
        let fetches = self.index.fetches();
        let removed = fetches
            .pending
            .get(&self.id)
            .is_some_and(|p| p.removed_at > self.removals);
        if removed {
            return false;
        }
        // Still holding the fetch lock, so no removal can slip in between.
        self.index.insert_missing(record)
    }
}

impl Drop for FetchTicket {
    fn drop(&mut self) {
        let mut fetches = self.index.fetches();
        if let Some(pending) = fetches.pending.get_mut(&self.id) {
            pending.waiters -= 1;
            if pending.waiters == 0 {
                fetches.pending.remove(&self.id);
            }
        }
    }
}

/// Shared, observable cache of one table's records.
#[derive(Debug, Clone)]
pub struct TableIndex {
    table: TableName,
    sender: Arc<watch::Sender<IndexView>>,
    fetches: Arc<Mutex<Fetches>>,
}

impl TableIndex {
    /// Create an index seeded with `initial`.
    pub fn new(table: impl Into<TableName>, initial: impl IntoIterator<Item = Record>) -> Self {
        let records: HashMap<RecordId, Record> =
            initial.into_iter().map(|r| (r.id.clone(), r)).collect();
        let array = Arc::new(records.values().cloned().collect());
        let (sender, _) = watch::channel(IndexView {
            records: Arc::new(records),
            array,
            version: 0,
        });
        Self {
            table: table.into(),
            sender: Arc::new(sender),
            fetches: Arc::default(),
        }
    }

    /// Create an empty index.
    pub fn empty(table: impl Into<TableName>) -> Self {
        Self::new(table, std::iter::empty())
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    /// Whether two handles share the same cache.
    pub fn same_index(&self, other: &TableIndex) -> bool {
        Arc::ptr_eq(&self.sender, &other.sender)
    }

    fn fetches(&self) -> MutexGuard<'_, Fetches> {
        self.fetches.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a lazy fetch of `id`.
    pub(crate) fn begin_fetch(&self, id: &str) -> FetchTicket {
        let mut fetches = self.fetches();
        let removals = fetches.removals;
        fetches
            .pending
            .entry(id.to_string())
            .or_insert(PendingFetch {
                waiters: 0,
                removed_at: 0,
            })
            .waiters += 1;
        FetchTicket {
            index: self.clone(),
            id: id.to_string(),
            removals,
        }
    }

    fn modify<F>(&self, op: &'static str, f: F) -> bool
    where
        F: FnOnce(&mut HashMap<RecordId, Record>) -> bool,
    {
        let changed = self.sender.send_if_modified(|view| {
            let changed = f(Arc::make_mut(&mut view.records));
            if changed {
                view.rebuild();
            }
            changed
        });
        if changed {
            tracing::trace!(table = %self.table, op, version = self.version(), "index changed");
        }
        changed
    }

    /// Merge records in by id. Later duplicates in the same call win.
    ///
    /// Returns whether anything changed.
    pub fn set(&self, records: impl IntoIterator<Item = Record>) -> bool {
        self.modify("set", |map| {
            let mut changed = false;
            for record in records {
                if map.get(&record.id) != Some(&record) {
                    map.insert(record.id.clone(), record);
                    changed = true;
                }
            }
            changed
        })
    }

    /// Drop entries by id. Unknown ids are ignored.
    pub fn unset<I, S>(&self, ids: I) -> bool
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let ids: Vec<String> = ids.into_iter().map(|id| id.as_ref().to_string()).collect();
        // Held across the mutation so a completing fetch sees either both or neither.
        let mut fetches = self.fetches();
        for id in &ids {
            if fetches.pending.contains_key(id) {
                fetches.removals += 1;
                let removals = fetches.removals;
                if let Some(pending) = fetches.pending.get_mut(id) {
                    pending.removed_at = removals;
                }
            }
        }

        self.modify("unset", |map| {
            let mut changed = false;
            for id in &ids {
                changed |= map.remove(id).is_some();
            }
            changed
        })
    }

    /// Insert a record only if its id has no entry yet.
    ///
    /// Used by lazy fetches so they never clobber a fresher write.
    pub fn insert_missing(&self, record: Record) -> bool {
        self.modify("insert_missing", |map| {
            if map.contains_key(&record.id) {
                return false;
            }
            map.insert(record.id.clone(), record);
            true
        })
    }

    /// Arbitrary update of the whole map.
    ///
    /// Entries stored under a key other than their own id are re-keyed.
    pub fn set_index<F>(&self, updater: F)
    where
        F: FnOnce(&mut HashMap<RecordId, Record>),
    {
        self.modify("set_index", |map| {
            let before = map.clone();
            updater(map);
            let misplaced: Vec<RecordId> = map
                .iter()
                .filter(|(k, r)| **k != r.id)
                .map(|(k, _)| k.clone())
                .collect();
            for key in misplaced {
                if let Some(record) = map.remove(&key) {
                    map.insert(record.id.clone(), record);
                }
            }
            *map != before
        });
    }

    /// Apply a CRUD result's index mutation.
    pub fn apply(&self, mutation: &IndexMutation) -> bool {
        match mutation {
            IndexMutation::Set(records) => self.set(records.iter().cloned()),
            IndexMutation::Unset(ids) => self.unset(ids),
        }
    }

    pub fn get(&self, id: &str) -> Option<Record> {
        self.sender.borrow().get(id).cloned()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.sender.borrow().contains(id)
    }

    /// Current view (cheap, shares storage).
    pub fn view(&self) -> IndexView {
        self.sender.borrow().clone()
    }

    /// Current array view.
    pub fn array(&self) -> Arc<Vec<Record>> {
        self.sender.borrow().array.clone()
    }

    pub fn len(&self) -> usize {
        self.sender.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sender.borrow().is_empty()
    }

    pub fn version(&self) -> u64 {
        self.sender.borrow().version
    }

    /// Receive every future change.
    pub fn subscribe(&self) -> watch::Receiver<IndexView> {
        self.sender.subscribe()
    }
}
