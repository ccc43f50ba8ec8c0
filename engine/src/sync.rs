//! Table synchronization core: CRUD actions wired to a shared index.
//!
//! A [`TableSync`] owns one [`Action`] per CRUD verb. Each action calls the
//! table interface and, on success, applies the verb's index mutation
//! before its future resolves, so every consumer of the index sees the write
//! no matter which component issued it. Failures leave the index untouched.
//!
//! Consumers that need their own loading/error state (forms, single views)
//! build extra actions with the `*_with` constructors. Those share the same
//! index and interface.

use crate::action::{Action, ActionConfig, Params};
use crate::error::Result;
use crate::{
    Error, Fields, IndexMutation, IndexSnapshot, Query, Record, RecordId, SharedInterface,
    TableIndex, TableName, Verb,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};

/// Input of the `update` action.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UpdateParams {
    pub id: RecordId,
    pub data: Fields,
}

impl UpdateParams {
    pub fn new(id: impl Into<RecordId>, data: Fields) -> Self {
        Self {
            id: id.into(),
            data,
        }
    }
}

impl Params for UpdateParams {
    fn merge_defaults(self, defaults: &Self) -> Self {
        Self {
            id: self.id.merge_defaults(&defaults.id),
            data: self.data.merge_defaults(&defaults.data),
        }
    }
}

struct Shared {
    table: TableName,
    interface: SharedInterface,
    index: TableIndex,
    seeded: Mutex<Option<Arc<IndexSnapshot>>>,
}

/// The five CRUD actions of one table plus its index. Clones share everything.
#[derive(Clone)]
pub struct TableSync {
    shared: Arc<Shared>,
    find: Action<RecordId, Record>,
    create: Action<Fields, Record>,
    update: Action<UpdateParams, Record>,
    remove: Action<RecordId, Record>,
    list: Action<Query, Vec<Record>>,
}

impl fmt::Debug for TableSync {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TableSync")
            .field("table", &self.shared.table)
            .field("records", &self.shared.index.len())
            .field("version", &self.shared.index.version())
            .finish()
    }
}

fn set_one(index: &TableIndex, verb: Verb, record: &Record) {
    index.apply(&IndexMutation::for_result(verb, vec![record.clone()]));
}

impl TableSync {
    /// Start synchronizing `table` with an empty index.
    pub fn new(table: impl Into<TableName>, interface: SharedInterface) -> Self {
        let table = table.into();
        let index = TableIndex::empty(table.clone());
        Self::with_index(interface, index)
    }

    /// Share an existing index. The table name is taken from it.
    pub fn with_index(interface: SharedInterface, index: TableIndex) -> Self {
        let shared = Arc::new(Shared {
            table: index.table().to_string(),
            interface,
            index,
            seeded: Mutex::new(None),
        });
        tracing::debug!(table = %shared.table, "table sync mounted");

        Self {
            find: Self::build(&shared, Verb::Find, ActionConfig::new(), find_op, |index, r| {
                set_one(index, Verb::Find, r)
            }),
            create: Self::build(&shared, Verb::Create, ActionConfig::new(), create_op, |index, r| {
                set_one(index, Verb::Create, r)
            }),
            update: Self::build(&shared, Verb::Update, ActionConfig::new(), update_op, |index, r| {
                set_one(index, Verb::Update, r)
            }),
            remove: Self::build(&shared, Verb::Remove, ActionConfig::new(), remove_op, |index, r| {
                set_one(index, Verb::Remove, r)
            }),
            list: Self::build(&shared, Verb::List, ActionConfig::new(), list_op, |index, rs| {
                index.apply(&IndexMutation::for_result(Verb::List, rs.clone()));
            }),
            shared,
        }
    }

    /// Start synchronizing `table` seeded from a snapshot.
    pub fn with_snapshot(
        table: impl Into<TableName>,
        interface: SharedInterface,
        snapshot: Arc<IndexSnapshot>,
    ) -> Result<Self> {
        let sync = Self::new(table, interface);
        sync.seed(snapshot)?;
        Ok(sync)
    }

    fn build<I, O, F, Fut>(
        shared: &Arc<Shared>,
        verb: Verb,
        config: ActionConfig<I, O>,
        call: F,
        effect: fn(&TableIndex, &O),
    ) -> Action<I, O>
    where
        I: Params,
        O: Clone + Send + Sync + 'static,
        F: Fn(SharedInterface, TableName, I) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<O>> + Send + 'static,
    {
        let shared = shared.clone();
        let label = format!("{}.{}", shared.table, verb);
        Action::with_config(
            label,
            move |input: I| {
                let pending = call(shared.interface.clone(), shared.table.clone(), input);
                let index = shared.index.clone();
                async move {
                    match pending.await {
                        Ok(output) => {
                            effect(&index, &output);
                            Ok(output)
                        }
                        Err(err) => {
                            tracing::warn!(table = %index.table(), %verb, error = %err, "adapter call failed");
                            Err(err)
                        }
                    }
                }
            },
            config,
        )
    }

    /// Re-merge a snapshot into the index.
    ///
    /// A snapshot that is the same allocation as the last one seeded is
    /// skipped. Returns whether the snapshot was applied.
    pub fn seed(&self, snapshot: Arc<IndexSnapshot>) -> Result<bool> {
        if snapshot.table != self.shared.table {
            return Err(Error::Misuse(format!(
                "snapshot for table '{}' cannot seed '{}'",
                snapshot.table, self.shared.table
            )));
        }

        let mut seeded = self
            .shared
            .seeded
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if seeded.as_ref().is_some_and(|prev| Arc::ptr_eq(prev, &snapshot)) {
            return Ok(false);
        }

        self.shared.index.set(snapshot.records.values().cloned());
        tracing::debug!(table = %self.shared.table, records = snapshot.len(), "seeded from snapshot");
        *seeded = Some(snapshot);
        Ok(true)
    }

    pub fn table(&self) -> &str {
        &self.shared.table
    }

    pub fn index(&self) -> &TableIndex {
        &self.shared.index
    }

    pub fn interface(&self) -> &SharedInterface {
        &self.shared.interface
    }

    /// Current entry for `id`.
    pub fn get(&self, id: &str) -> Option<Record> {
        self.shared.index.get(id)
    }

    /// Current records, unordered.
    pub fn records(&self) -> Arc<Vec<Record>> {
        self.shared.index.array()
    }

    pub fn find(&self) -> &Action<RecordId, Record> {
        &self.find
    }

    pub fn create(&self) -> &Action<Fields, Record> {
        &self.create
    }

    pub fn update(&self) -> &Action<UpdateParams, Record> {
        &self.update
    }

    pub fn remove(&self) -> &Action<RecordId, Record> {
        &self.remove
    }

    pub fn list(&self) -> &Action<Query, Vec<Record>> {
        &self.list
    }

    pub fn find_with(&self, config: ActionConfig<RecordId, Record>) -> Action<RecordId, Record> {
        Self::build(&self.shared, Verb::Find, config, find_op, |index, r| {
            set_one(index, Verb::Find, r)
        })
    }

    pub fn create_with(&self, config: ActionConfig<Fields, Record>) -> Action<Fields, Record> {
        Self::build(&self.shared, Verb::Create, config, create_op, |index, r| {
            set_one(index, Verb::Create, r)
        })
    }

    pub fn update_with(
        &self,
        config: ActionConfig<UpdateParams, Record>,
    ) -> Action<UpdateParams, Record> {
        Self::build(&self.shared, Verb::Update, config, update_op, |index, r| {
            set_one(index, Verb::Update, r)
        })
    }

    pub fn remove_with(&self, config: ActionConfig<RecordId, Record>) -> Action<RecordId, Record> {
        Self::build(&self.shared, Verb::Remove, config, remove_op, |index, r| {
            set_one(index, Verb::Remove, r)
        })
    }

    pub fn list_with(&self, config: ActionConfig<Query, Vec<Record>>) -> Action<Query, Vec<Record>> {
        Self::build(&self.shared, Verb::List, config, list_op, |index, rs| {
            index.apply(&IndexMutation::for_result(Verb::List, rs.clone()));
        })
    }

    /// A find whose result only fills an empty slot and never overwrites.
    ///
    /// A remove of the same id that lands while the find is in flight wins.
    pub(crate) fn lazy_find(&self) -> Action<RecordId, Record> {
        let shared = self.shared.clone();
        let label = format!("{}.{}", shared.table, Verb::Find);
        Action::new(label, move |id: RecordId| {
            let ticket = shared.index.begin_fetch(&id);
            let pending = find_op(shared.interface.clone(), shared.table.clone(), id);
            let table = shared.table.clone();
            async move {
                match pending.await {
                    Ok(record) => {
                        if !ticket.complete(record.clone()) {
                            tracing::debug!(%table, id = %record.id, "lazy find lost to a fresher write");
                        }
                        Ok(record)
                    }
                    Err(err) => {
                        tracing::warn!(%table, verb = %Verb::Find, error = %err, "adapter call failed");
                        Err(err)
                    }
                }
            }
        })
    }

    /// Stop the bundled actions from applying further settlements.
    pub fn unmount(&self) {
        self.find.unmount();
        self.create.unmount();
        self.update.unmount();
        self.remove.unmount();
        self.list.unmount();
    }
}

async fn find_op(interface: SharedInterface, table: TableName, id: RecordId) -> Result<Record> {
    interface.find(&table, &id).await
}

async fn create_op(interface: SharedInterface, table: TableName, data: Fields) -> Result<Record> {
    interface.create(&table, data).await
}

async fn update_op(
    interface: SharedInterface,
    table: TableName,
    params: UpdateParams,
) -> Result<Record> {
    interface.update(&table, &params.id, params.data).await
}

async fn remove_op(interface: SharedInterface, table: TableName, id: RecordId) -> Result<Record> {
    interface.remove(&table, &id).await
}

async fn list_op(interface: SharedInterface, table: TableName, query: Query) -> Result<Vec<Record>> {
    interface.list(&table, &query).await
}
