//! Storage adapters implementing [`TableInterface`](crate::TableInterface).
//!
//! - [`MemoryAdapter`] - in-process maps, no persistence
//! - [`FileAdapter`] - durable, one JSON file per record
//! - [`HttpAdapter`] - remote REST service over a pluggable [`Transport`]
//!
//! All three produce the same observable results for the same calls.

pub mod file;
pub mod http;
pub mod memory;

pub use file::FileAdapter;
pub use http::{
    HttpAdapter, HttpConfig, HttpRequest, HttpResponse, LoopbackTransport, Method,
    ReqwestTransport, Transport,
};
pub use memory::MemoryAdapter;

use crate::{error::Result, record::supplied_id, Fields, RecordId};

/// Pick the caller-supplied id or generate a fresh one.
pub(crate) fn assign_id(data: &Fields) -> Result<RecordId> {
    Ok(supplied_id(data)?.unwrap_or_else(|| uuid::Uuid::new_v4().to_string()))
}
