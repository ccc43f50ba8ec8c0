//! # Tablesync Engine
//!
//! Keeps an in-memory index of table records in sync across every consumer
//! that reads or writes the same table, over any CRUD backend.
//!
//! Components never talk to each other directly. They share a per-table
//! [`TableIndex`], and every successful CRUD call made through a
//! [`TableSync`] merges its result into that index before resolving, so a
//! record created in one place shows up in every list bound to the table.
//!
//! ## Core Concepts
//!
//! ### Table Interface
//!
//! [`TableInterface`] is the CRUD contract every backend implements:
//! `find`, `create`, `update`, `remove` and `list`. Three adapters ship with
//! the crate and behave identically:
//! - [`MemoryAdapter`] - in-process maps
//! - [`FileAdapter`] - one JSON file per record on local disk
//! - [`HttpAdapter`] - a REST service, see [`adapters::http`]
//!
//! ### Index
//!
//! [`TableIndex`] maps record id to the latest known record. It is mutated
//! only by `set`/`unset`, each applied atomically, and observed through a
//! `tokio::sync::watch` channel.
//!
//! ### Actions
//!
//! An [`Action`] wraps one async operation with `loading`/`error`/`result`
//! state. Overlapping triggers are ordered by sequence number: only the
//! latest trigger settles the state.
//!
//! ### Index rules
//!
//! | Verb                   | Index effect on success |
//! |------------------------|-------------------------|
//! | find / create / update | `set(result)`           |
//! | remove                 | `unset(result)`         |
//! | list                   | `set(...results)`       |
//!
//! `list` never evicts. Failures never touch the index.
//!
//! ## Quick Start
//!
//! ```rust
//! use tablesync_engine::{MemoryAdapter, Query, SyncRegistry};
//! use serde_json::json;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> tablesync_engine::error::Result<()> {
//! let registry = SyncRegistry::new(MemoryAdapter::new());
//! let todos = registry.sync("todos");
//!
//! // A list view watching the table
//! let mut list_view = todos.index().subscribe();
//!
//! // Somewhere else, a form creates a record
//! let data = json!({"text": "buy milk", "completed": false});
//! let created = todos
//!     .create()
//!     .trigger(data.as_object().cloned().unwrap_or_default())
//!     .await?;
//!
//! // The list view sees it without re-fetching
//! assert!(list_view.has_changed().unwrap());
//! assert!(list_view.borrow_and_update().contains(&created.id));
//!
//! let open = todos
//!     .list()
//!     .trigger(Query::new().eq("completed", false).sort_asc("text"))
//!     .await?;
//! assert_eq!(open.len(), 1);
//! # Ok(())
//! # }
//! ```
//!
//! ## Persistence
//!
//! The index is a cache. Use [`IndexSnapshot`] to carry its contents across
//! processes, for example to seed a client from server-rendered data.

pub mod action;
pub mod adapters;
pub mod error;
pub mod fields;
pub mod forms;
pub mod index;
pub mod interface;
pub mod mutation;
pub mod query;
pub mod record;
pub mod registry;
pub mod schema;
pub mod single;
pub mod snapshot;
pub mod sync;

// Re-export main types at crate root
pub use action::{Action, ActionConfig, ActionState, Params};
pub use adapters::{
    FileAdapter, HttpAdapter, HttpConfig, HttpRequest, HttpResponse, LoopbackTransport,
    MemoryAdapter, Method, ReqwestTransport, Transport,
};
pub use error::{Error, ErrorKind};
pub use fields::{FieldState, FieldsUpdate};
pub use forms::{CreateForm, FilterForm, UpdateForm};
pub use index::{IndexView, TableIndex};
pub use interface::{SharedInterface, TableInterface};
pub use mutation::{IndexMutation, Verb};
pub use query::{Filter, Operator, Query, Sort, SortDirection};
pub use record::{writable, Record, ID_FIELD};
pub use registry::SyncRegistry;
pub use schema::{FieldDef, FieldType, Schema, TableSchema};
pub use single::SingleView;
pub use snapshot::{IndexSnapshot, SNAPSHOT_FORMAT_VERSION};
pub use sync::{TableSync, UpdateParams};

/// Type aliases for clarity
pub type RecordId = String;
pub type TableName = String;
pub type Fields = serde_json::Map<String, serde_json::Value>;
