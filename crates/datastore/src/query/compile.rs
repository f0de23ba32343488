//! Query compilation
//!
//! Every query set of a builder becomes one primitive query carrying that
//! set's conjunctive clauses and the shared ordering and ancestor. A single
//! set compiles to a single primitive query; several compile to a
//! multi-query whose results are merged by the shared ordering.

use serde::{Deserialize, Serialize};

use super::cursor::Cursor;
use super::types::{FilterClause, SortOrder};
use crate::key::Key;

/// A query the storage collaborator can execute natively
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawQuery {
    pub kind: Option<String>,
    pub filters: Vec<FilterClause>,
    pub orders: Vec<SortOrder>,
    pub ancestor: Option<Key>,
    pub keys_only: bool,
    pub cursor: Option<Cursor>,
}

impl RawQuery {
    pub fn new(kind: Option<String>) -> Self {
        Self {
            kind,
            filters: Vec::new(),
            orders: Vec::new(),
            ancestor: None,
            keys_only: false,
            cursor: None,
        }
    }
}

/// Result of compiling a builder
#[derive(Debug, Clone, PartialEq)]
pub enum CompiledQuery {
    Single(RawQuery),
    /// Disjoined primitive queries merged by `orders`
    Multi {
        queries: Vec<RawQuery>,
        orders: Vec<SortOrder>,
    },
}

impl CompiledQuery {
    /// Number of primitive queries
    pub fn len(&self) -> usize {
        match self {
            CompiledQuery::Single(_) => 1,
            CompiledQuery::Multi { queries, .. } => queries.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_multi(&self) -> bool {
        matches!(self, CompiledQuery::Multi { .. })
    }

    pub fn queries(&self) -> &[RawQuery] {
        match self {
            CompiledQuery::Single(query) => std::slice::from_ref(query),
            CompiledQuery::Multi { queries, .. } => queries,
        }
    }
}

/// Build the primitive queries for `query_sets`
pub fn compile(
    kind: Option<&str>,
    query_sets: &[Vec<FilterClause>],
    orders: &[SortOrder],
    ancestor: Option<&Key>,
    keys_only: bool,
    cursor: Option<&Cursor>,
) -> CompiledQuery {
    let mut queries: Vec<RawQuery> = query_sets
        .iter()
        .map(|filters| RawQuery {
            kind: kind.map(str::to_string),
            filters: filters.clone(),
            orders: orders.to_vec(),
            ancestor: ancestor.cloned(),
            keys_only,
            cursor: cursor.cloned(),
        })
        .collect();

    if queries.len() == 1 {
        if let Some(query) = queries.pop() {
            return CompiledQuery::Single(query);
        }
    }
    CompiledQuery::Multi {
        queries,
        orders: orders.to_vec(),
    }
}
