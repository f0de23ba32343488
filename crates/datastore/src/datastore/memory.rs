//! In-memory storage collaborator
//!
//! Records live in a key-ordered map behind a tokio `RwLock`. Every entity
//! group (records sharing a root key) carries a version that is bumped on
//! each committed write. Transactions are optimistic: they pin the version
//! of the single group they touch, buffer their writes, and commit only if
//! the version is unchanged; otherwise the body is run again.

use std::any::Any;
use std::collections::{BTreeMap, HashMap};
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, trace, warn};

use super::{CallOptions, Datastore, FetchOptions, QueryResults, TransactionWork};
use crate::config::DatastoreConfig;
use crate::entity::Entity;
use crate::error::{ModelError, ModelResult};
use crate::key::{Key, KeyId};
use crate::query::compile::RawQuery;
use crate::query::cursor::Cursor;

#[derive(Debug)]
struct Store {
    entities: BTreeMap<Key, Entity>,
    versions: HashMap<Key, u64>,
    next_id: i64,
}

impl Default for Store {
    fn default() -> Self {
        Self {
            entities: BTreeMap::new(),
            versions: HashMap::new(),
            next_id: 1,
        }
    }
}

impl Store {
    fn version(&self, group: &Key) -> u64 {
        self.versions.get(group).copied().unwrap_or(0)
    }

    fn bump(&mut self, group: &Key) {
        *self.versions.entry(group.clone()).or_insert(0) += 1;
    }

    fn allocate(&mut self, count: u64) -> ModelResult<(i64, i64)> {
        let count = i64::try_from(count)
            .map_err(|_| ModelError::BadArgument(format!("Cannot allocate {} ids", count)))?;
        if count < 1 {
            return Err(ModelError::BadArgument(
                "Number of ids to allocate must be positive".to_string(),
            ));
        }
        let first = self.next_id;
        self.next_id = first
            .checked_add(count)
            .ok_or_else(|| ModelError::BadArgument(format!("Cannot allocate {} ids", count)))?;
        Ok((first, first + (count - 1)))
    }

    /// Complete `key` with a fresh id, or reserve its explicit id
    fn complete(&mut self, key: &Key) -> ModelResult<Key> {
        match key.id_or_name() {
            None => {
                let (id, _) = self.allocate(1)?;
                Ok(key.with_id(id))
            }
            Some(KeyId::Id(id)) => {
                let next = id.checked_add(1).ok_or_else(|| {
                    ModelError::BadArgument(format!("Id {} leaves no room for allocation", id))
                })?;
                self.next_id = self.next_id.max(next);
                Ok(key.clone())
            }
            Some(KeyId::Name(_)) => Ok(key.clone()),
        }
    }

    fn write(&mut self, key: Key, entity: Option<Entity>) {
        let group = key.root();
        match entity {
            Some(entity) => {
                self.entities.insert(key, entity);
            }
            None => {
                self.entities.remove(&key);
            }
        }
        self.bump(&group);
    }

    /// Every record matching `query`, sorted and past its cursor
    fn scan(&self, query: &RawQuery) -> Vec<Entity> {
        let mut matched: Vec<Entity> = self
            .entities
            .values()
            .filter(|entity| {
                query
                    .kind
                    .as_deref()
                    .map_or(true, |kind| entity.kind() == kind)
            })
            .filter(|entity| {
                query
                    .ancestor
                    .as_ref()
                    .map_or(true, |ancestor| ancestor.is_ancestor_of(entity.key()))
            })
            .filter(|entity| {
                query.filters.iter().all(|clause| {
                    entity
                        .indexed_value(&clause.property)
                        .map_or(false, |stored| clause.operator.matches(&stored, &clause.value))
                })
            })
            .filter(|entity| {
                query
                    .orders
                    .iter()
                    .all(|order| entity.indexed_value(&order.property).is_some())
            })
            .filter(|entity| {
                query
                    .cursor
                    .as_ref()
                    .map_or(true, |cursor| cursor.precedes(entity, &query.orders))
            })
            .cloned()
            .collect();

        matched.sort_by(|a, b| a.compare_by(b, &query.orders));
        matched
    }

    fn run_query(&self, query: &RawQuery, fetch: &FetchOptions) -> QueryResults {
        let matched = self.scan(query);
        let start = fetch.offset.min(matched.len());
        let end = match fetch.limit {
            Some(limit) => start.saturating_add(limit).min(matched.len()),
            None => matched.len(),
        };

        let cursor = if end > 0 {
            Some(Cursor::after(&matched[end - 1], &query.orders))
        } else {
            Some(query.cursor.clone().unwrap_or_default())
        };

        let entities = matched[start..end]
            .iter()
            .map(|entity| {
                if query.keys_only {
                    Entity::new(entity.key().clone())
                } else {
                    entity.clone()
                }
            })
            .collect();

        QueryResults { entities, cursor }
    }

    fn count(&self, query: &RawQuery, limit: Option<usize>) -> usize {
        let total = self.scan(query).len();
        limit.map_or(total, |limit| total.min(limit))
    }
}

async fn within<T, F>(options: &CallOptions, call: F) -> ModelResult<T>
where
    F: Future<Output = ModelResult<T>>,
{
    match options.deadline {
        Some(deadline) => tokio::time::timeout(deadline, call).await.map_err(|_| {
            ModelError::Timeout(format!(
                "Datastore call exceeded its deadline of {}ms",
                deadline.as_millis()
            ))
        })?,
        None => call.await,
    }
}

/// Process-local entity store
#[derive(Debug, Clone)]
pub struct MemoryDatastore {
    store: Arc<RwLock<Store>>,
    transaction_retries: u32,
}

impl Default for MemoryDatastore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryDatastore {
    pub fn new() -> Self {
        Self::with_config(&DatastoreConfig::default())
    }

    pub fn with_config(config: &DatastoreConfig) -> Self {
        Self {
            store: Arc::new(RwLock::new(Store::default())),
            transaction_retries: config.transaction_retries,
        }
    }

    /// Number of stored records
    pub async fn len(&self) -> usize {
        self.store.read().await.entities.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    async fn transact(&self, work: TransactionWork) -> ModelResult<Box<dyn Any + Send>> {
        let mut attempt: u32 = 0;
        loop {
            let txn = Arc::new(Transaction::new(Arc::clone(&self.store)));
            let view: Arc<dyn Datastore> = txn.clone();
            let value = (work)(view).await?;

            if txn.commit().await? {
                trace!("Transaction committed after {} retries", attempt);
                return Ok(value);
            }
            if attempt >= self.transaction_retries {
                warn!("Transaction failed after {} retries", attempt);
                return Err(ModelError::TransactionFailed(
                    "The transaction could not be committed. Please try again.".to_string(),
                ));
            }
            attempt += 1;
            debug!(
                "Transaction collided; retrying ({}/{})",
                attempt, self.transaction_retries
            );
        }
    }
}

#[async_trait]
impl Datastore for MemoryDatastore {
    async fn get(&self, keys: &[Key], options: &CallOptions) -> ModelResult<Vec<Option<Entity>>> {
        within(options, async {
            let store = self.store.read().await;
            Ok(keys.iter().map(|key| store.entities.get(key).cloned()).collect())
        })
        .await
    }

    async fn put(&self, entities: Vec<Entity>, options: &CallOptions) -> ModelResult<Vec<Key>> {
        within(options, async {
            let mut store = self.store.write().await;
            let mut keys = Vec::with_capacity(entities.len());
            for mut entity in entities {
                let key = store.complete(entity.key())?;
                entity.set_key(key.clone());
                store.write(key.clone(), Some(entity));
                keys.push(key);
            }
            trace!("Stored {} records", keys.len());
            Ok(keys)
        })
        .await
    }

    async fn delete(&self, keys: &[Key], options: &CallOptions) -> ModelResult<()> {
        within(options, async {
            let mut store = self.store.write().await;
            for key in keys {
                store.write(key.clone(), None);
            }
            Ok(())
        })
        .await
    }

    async fn allocate_ids(&self, key: &Key, count: u64, options: &CallOptions) -> ModelResult<(i64, i64)> {
        within(options, async {
            trace!("Allocating {} ids under {}", count, key);
            self.store.write().await.allocate(count)
        })
        .await
    }

    async fn run_query(
        &self,
        query: &RawQuery,
        fetch: &FetchOptions,
        options: &CallOptions,
    ) -> ModelResult<QueryResults> {
        within(options, async {
            Ok(self.store.read().await.run_query(query, fetch))
        })
        .await
    }

    async fn count(&self, query: &RawQuery, limit: Option<usize>, options: &CallOptions) -> ModelResult<usize> {
        within(options, async { Ok(self.store.read().await.count(query, limit)) }).await
    }

    async fn run_in_transaction(
        &self,
        work: TransactionWork,
        options: &CallOptions,
    ) -> ModelResult<Box<dyn Any + Send>> {
        within(options, self.transact(work)).await
    }
}

#[derive(Debug, Default)]
struct TransactionState {
    group: Option<Key>,
    version: u64,
    writes: BTreeMap<Key, Option<Entity>>,
}

/// Transactional view handed to a transaction body
#[derive(Debug)]
struct Transaction {
    store: Arc<RwLock<Store>>,
    state: Mutex<TransactionState>,
}

impl Transaction {
    fn new(store: Arc<RwLock<Store>>) -> Self {
        Self {
            store,
            state: Mutex::new(TransactionState::default()),
        }
    }

    /// Pin the entity group of `key`, rejecting a second group
    fn enter_group(state: &mut TransactionState, store: &Store, key: &Key) -> ModelResult<()> {
        let root = key.root();
        match &state.group {
            None => {
                state.version = store.version(&root);
                state.group = Some(root);
                Ok(())
            }
            Some(group) if *group == root => Ok(()),
            Some(group) => Err(ModelError::BadRequest(format!(
                "Cross-group transaction: {} is outside entity group {}",
                key, group
            ))),
        }
    }

    fn ancestor_of(query: &RawQuery) -> ModelResult<&Key> {
        query.ancestor.as_ref().ok_or_else(|| {
            ModelError::BadRequest("Only ancestor queries are allowed inside transactions.".to_string())
        })
    }

    async fn commit(&self) -> ModelResult<bool> {
        let state = self.state.lock().await;
        let Some(group) = &state.group else {
            return Ok(true);
        };

        let mut store = self.store.write().await;
        if store.version(group) != state.version {
            return Ok(false);
        }
        for (key, write) in &state.writes {
            match write {
                Some(entity) => {
                    store.entities.insert(key.clone(), entity.clone());
                }
                None => {
                    store.entities.remove(key);
                }
            }
        }
        if !state.writes.is_empty() {
            store.bump(group);
        }
        Ok(true)
    }
}

#[async_trait]
impl Datastore for Transaction {
    async fn get(&self, keys: &[Key], _options: &CallOptions) -> ModelResult<Vec<Option<Entity>>> {
        let mut state = self.state.lock().await;
        let store = self.store.read().await;
        let mut found = Vec::with_capacity(keys.len());
        for key in keys {
            Self::enter_group(&mut state, &store, key)?;
            let entity = match state.writes.get(key) {
                Some(buffered) => buffered.clone(),
                None => store.entities.get(key).cloned(),
            };
            found.push(entity);
        }
        Ok(found)
    }

    async fn put(&self, entities: Vec<Entity>, _options: &CallOptions) -> ModelResult<Vec<Key>> {
        let mut state = self.state.lock().await;
        let mut store = self.store.write().await;
        let mut keys = Vec::with_capacity(entities.len());
        for mut entity in entities {
            let key = store.complete(entity.key())?;
            Self::enter_group(&mut state, &store, &key)?;
            entity.set_key(key.clone());
            state.writes.insert(key.clone(), Some(entity));
            keys.push(key);
        }
        Ok(keys)
    }

    async fn delete(&self, keys: &[Key], _options: &CallOptions) -> ModelResult<()> {
        let mut state = self.state.lock().await;
        let store = self.store.read().await;
        for key in keys {
            Self::enter_group(&mut state, &store, key)?;
            state.writes.insert(key.clone(), None);
        }
        Ok(())
    }

    async fn allocate_ids(&self, _key: &Key, count: u64, _options: &CallOptions) -> ModelResult<(i64, i64)> {
        self.store.write().await.allocate(count)
    }

    async fn run_query(
        &self,
        query: &RawQuery,
        fetch: &FetchOptions,
        _options: &CallOptions,
    ) -> ModelResult<QueryResults> {
        let ancestor = Self::ancestor_of(query)?;
        let mut state = self.state.lock().await;
        let store = self.store.read().await;
        Self::enter_group(&mut state, &store, ancestor)?;
        Ok(store.run_query(query, fetch))
    }

    async fn count(&self, query: &RawQuery, limit: Option<usize>, _options: &CallOptions) -> ModelResult<usize> {
        let ancestor = Self::ancestor_of(query)?;
        let mut state = self.state.lock().await;
        let store = self.store.read().await;
        Self::enter_group(&mut state, &store, ancestor)?;
        Ok(store.count(query, limit))
    }

    async fn run_in_transaction(
        &self,
        _work: TransactionWork,
        _options: &CallOptions,
    ) -> ModelResult<Box<dyn Any + Send>> {
        Err(ModelError::BadRequest(
            "Nested transactions are not supported.".to_string(),
        ))
    }
}
