//! Storage Collaborator - The entity store the model layer runs on
//!
//! The `Datastore` trait is the full contract the model and query layers
//! need: batch get/put/delete, id allocation, primitive query execution,
//! counting, and transactions. Transactions hand the body a transactional
//! view of the store and retry it on contention according to the
//! implementation's own policy.

pub mod memory;

use std::any::Any;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::future::BoxFuture;

use crate::config::{DatastoreConfig, ReadPolicy};
use crate::entity::Entity;
use crate::error::ModelResult;
use crate::key::Key;
use crate::query::compile::RawQuery;
use crate::query::cursor::Cursor;

pub use memory::MemoryDatastore;

/// Options passed unmodified to every storage call
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CallOptions {
    pub deadline: Option<Duration>,
    pub read_policy: ReadPolicy,
}

impl CallOptions {
    pub fn from_config(config: &DatastoreConfig) -> Self {
        Self {
            deadline: config.deadline(),
            read_policy: config.read_policy,
        }
    }
}

/// Window of a primitive query's results
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FetchOptions {
    pub limit: Option<usize>,
    pub offset: usize,
}

impl FetchOptions {
    pub fn new(limit: Option<usize>, offset: usize) -> Self {
        Self { limit, offset }
    }
}

/// Records returned by a primitive query
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryResults {
    pub entities: Vec<Entity>,
    /// Position after the last returned record
    pub cursor: Option<Cursor>,
}

/// Type-erased transaction body
pub type TransactionWork = Arc<
    dyn Fn(Arc<dyn Datastore>) -> BoxFuture<'static, ModelResult<Box<dyn Any + Send>>>
        + Send
        + Sync,
>;

#[async_trait]
pub trait Datastore: Send + Sync {
    /// Fetch records; a missing key yields `None` in its slot
    async fn get(&self, keys: &[Key], options: &CallOptions) -> ModelResult<Vec<Option<Entity>>>;

    /// Write records, assigning ids to incomplete keys
    async fn put(&self, entities: Vec<Entity>, options: &CallOptions) -> ModelResult<Vec<Key>>;

    async fn delete(&self, keys: &[Key], options: &CallOptions) -> ModelResult<()>;

    /// Reserve `count` ids under the path of `key`, returning the first and last
    async fn allocate_ids(&self, key: &Key, count: u64, options: &CallOptions) -> ModelResult<(i64, i64)>;

    async fn run_query(
        &self,
        query: &RawQuery,
        fetch: &FetchOptions,
        options: &CallOptions,
    ) -> ModelResult<QueryResults>;

    /// Number of matching records, stopping at `limit`
    async fn count(&self, query: &RawQuery, limit: Option<usize>, options: &CallOptions) -> ModelResult<usize>;

    /// Run `work` atomically against one entity group
    async fn run_in_transaction(
        &self,
        work: TransactionWork,
        options: &CallOptions,
    ) -> ModelResult<Box<dyn Any + Send>>;
}
