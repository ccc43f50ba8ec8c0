//! How each CRUD verb's successful result changes a [`TableIndex`](crate::TableIndex).
//!
//! | Verb                   | Index effect         |
//! |------------------------|----------------------|
//! | find / create / update | `set(result)`        |
//! | remove                 | `unset(result)`      |
//! | list                   | `set(...results)`    |
//!
//! `list` merges and never evicts: records outside the current filter stay
//! cached for other views.

use crate::{Record, RecordId};
use serde::{Deserialize, Serialize};

/// A CRUD verb of the table interface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Verb {
    Find,
    Create,
    Update,
    Remove,
    List,
}

impl Verb {
    pub fn as_str(&self) -> &'static str {
        match self {
            Verb::Find => "find",
            Verb::Create => "create",
            Verb::Update => "update",
            Verb::Remove => "remove",
            Verb::List => "list",
        }
    }
}

impl std::fmt::Display for Verb {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A change to apply to an index.
#[derive(Debug, Clone, PartialEq)]
pub enum IndexMutation {
    Set(Vec<Record>),
    Unset(Vec<RecordId>),
}

impl IndexMutation {
    /// The mutation a successful `verb` call with these results implies.
    pub fn for_result(verb: Verb, records: Vec<Record>) -> Self {
        match verb {
            Verb::Find | Verb::Create | Verb::Update | Verb::List => IndexMutation::Set(records),
            Verb::Remove => IndexMutation::Unset(records.into_iter().map(|r| r.id).collect()),
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            IndexMutation::Set(records) => records.is_empty(),
            IndexMutation::Unset(ids) => ids.is_empty(),
        }
    }
}
