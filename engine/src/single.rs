//! Single-record view binding.
//!
//! A [`SingleView`] reads one id out of a table's index. If the id is absent
//! at mount time it issues exactly one `find`; the fetched record only fills
//! the slot if nothing else wrote it first. After that the view simply
//! mirrors the index, whichever component changes the record.

use crate::action::{Action, ActionState};
use crate::error::Result;
use crate::{Error, IndexView, Record, RecordId, TableIndex, TableSync};
use tokio::sync::watch;

/// Reactive projection of one record.
#[derive(Debug)]
pub struct SingleView {
    id: RecordId,
    index: TableIndex,
    find: Action<RecordId, Record>,
    index_rx: watch::Receiver<IndexView>,
    find_rx: watch::Receiver<ActionState<Record>>,
    last: Option<Record>,
}

enum Wake {
    Index(bool),
    Find(bool),
}

impl SingleView {
    /// Bind to `id` in `sync`'s table.
    ///
    /// Must be called inside a tokio runtime when the record is not cached,
    /// since the lazy fetch is spawned onto it.
    pub fn mount(sync: &TableSync, id: impl Into<RecordId>) -> Result<Self> {
        let id = id.into();
        let index = sync.index().clone();
        let find = sync.lazy_find();
        let mut index_rx = index.subscribe();
        let last = index_rx.borrow_and_update().get(&id).cloned();
        let find_rx = find.subscribe();

        if last.is_none() {
            let handle = tokio::runtime::Handle::try_current().map_err(|_| {
                Error::Misuse("single view for an uncached record needs a tokio runtime".into())
            })?;
            tracing::debug!(table = %index.table(), %id, "single view: lazy find");
            let pending = find.trigger(id.clone());
            handle.spawn(async move {
                // Outcome is observed through the find action state.
                let _ = pending.await;
            });
        }

        Ok(Self {
            id,
            index,
            find,
            index_rx,
            find_rx,
            last,
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// The record as currently cached.
    pub fn single(&self) -> Option<Record> {
        self.index.get(&self.id)
    }

    /// Whether the lazy find is in flight.
    pub fn loading(&self) -> bool {
        self.find.loading()
    }

    /// Failure of the lazy find, if any.
    pub fn error(&self) -> Option<Error> {
        self.find.error()
    }

    /// Wait until the record differs from the last value this view returned,
    /// or the lazy find fails.
    pub async fn changed(&mut self) -> Result<Option<Record>> {
        loop {
            let wake = tokio::select! {
                res = self.index_rx.changed() => Wake::Index(res.is_ok()),
                res = self.find_rx.changed() => Wake::Find(res.is_ok()),
            };

            match wake {
                Wake::Index(true) => {
                    let current = self.index_rx.borrow_and_update().get(&self.id).cloned();
                    if current != self.last {
                        self.last = current.clone();
                        return Ok(current);
                    }
                }
                Wake::Find(true) => {
                    let error = self.find_rx.borrow_and_update().error.clone();
                    if let Some(err) = error {
                        return Err(err);
                    }
                }
                Wake::Index(false) | Wake::Find(false) => {
                    return Err(Error::Misuse("single view outlived its table".into()));
                }
            }
        }
    }

    /// Wait for the record to be present.
    pub async fn ready(&mut self) -> Result<Record> {
        loop {
            if let Some(record) = self.single() {
                self.last = Some(record.clone());
                return Ok(record);
            }
            if let Some(err) = self.error() {
                return Err(err);
            }
            if let Some(record) = self.changed().await? {
                return Ok(record);
            }
        }
    }
}

impl Drop for SingleView {
    fn drop(&mut self) {
        self.find.unmount();
    }
}
