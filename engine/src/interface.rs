//! The CRUD contract every storage adapter implements.

use crate::{error::Result, Fields, Query, Record};
use async_trait::async_trait;
use std::sync::Arc;

/// Abstract CRUD surface over a named table.
///
/// Implementations must behave identically for the same sequence of calls:
/// - `find`, `update` and `remove` fail with [`Error::NotFound`](crate::Error::NotFound)
///   when the id does not exist.
/// - `create` assigns an id when the data carries none.
/// - `update` shallow-merges the patch into the stored record.
/// - `remove` returns the record as it was just before deletion.
/// - `list` evaluates the [`Query`] as filter, sort, skip, limit, select.
#[async_trait]
pub trait TableInterface: Send + Sync {
    async fn find(&self, table: &str, id: &str) -> Result<Record>;

    async fn create(&self, table: &str, data: Fields) -> Result<Record>;

    async fn update(&self, table: &str, id: &str, data: Fields) -> Result<Record>;

    async fn remove(&self, table: &str, id: &str) -> Result<Record>;

    async fn list(&self, table: &str, query: &Query) -> Result<Vec<Record>>;
}

/// Shared handle to any adapter.
pub type SharedInterface = Arc<dyn TableInterface>;

#[async_trait]
impl<T: TableInterface + ?Sized> TableInterface for Arc<T> {
    async fn find(&self, table: &str, id: &str) -> Result<Record> {
        (**self).find(table, id).await
    }

    async fn create(&self, table: &str, data: Fields) -> Result<Record> {
        (**self).create(table, data).await
    }

    async fn update(&self, table: &str, id: &str, data: Fields) -> Result<Record> {
        (**self).update(table, id, data).await
    }

    async fn remove(&self, table: &str, id: &str) -> Result<Record> {
        (**self).remove(table, id).await
    }

    async fn list(&self, table: &str, query: &Query) -> Result<Vec<Record>> {
        (**self).list(table, query).await
    }
}
