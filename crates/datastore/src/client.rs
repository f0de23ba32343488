//! Client - The storage collaborator, schemas, users, and configuration together
//!
//! Every operation that reaches storage takes a `Client`. Inside a
//! transaction the body receives a client whose datastore is the
//! transactional view, so the same model code runs in and out of
//! transactions.

use std::any::Any;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use futures::FutureExt;
use tracing::debug;

use crate::config::DatastoreConfig;
use crate::datastore::{CallOptions, Datastore, MemoryDatastore, TransactionWork};
use crate::entity::Entity;
use crate::error::{ModelError, ModelResult};
use crate::key::{AsKey, IntoKey, Key};
use crate::model::Model;
use crate::query::types::KEY_SPECIAL_PROPERTY;
use crate::query::Query;
use crate::schema::{KindRegistry, Schema};
use crate::users::{AnonymousUsers, UserService};
use crate::value::Value;

#[derive(Clone)]
pub struct Client {
    datastore: Arc<dyn Datastore>,
    registry: KindRegistry,
    users: Arc<dyn UserService>,
    config: DatastoreConfig,
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("kinds", &self.registry.kinds())
            .field("config", &self.config)
            .finish()
    }
}

impl Client {
    pub fn new(datastore: Arc<dyn Datastore>, registry: KindRegistry) -> Self {
        Self {
            datastore,
            registry,
            users: Arc::new(AnonymousUsers),
            config: DatastoreConfig::default(),
        }
    }

    /// Client over a fresh in-memory store with default configuration
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryDatastore::new()), KindRegistry::new())
    }

    /// Client over a fresh in-memory store configured by `config`
    pub fn from_config(config: DatastoreConfig) -> ModelResult<Self> {
        config
            .validate()
            .map_err(|e| ModelError::Configuration(e.to_string()))?;
        let datastore = Arc::new(MemoryDatastore::with_config(&config));
        let registry = KindRegistry::with_redefinition(config.allow_kind_redefinition);
        Ok(Self::new(datastore, registry).with_config(config))
    }

    pub fn with_users(mut self, users: Arc<dyn UserService>) -> Self {
        self.users = users;
        self
    }

    pub fn with_config(mut self, config: DatastoreConfig) -> Self {
        self.config = config;
        self
    }

    pub(crate) fn with_datastore(&self, datastore: Arc<dyn Datastore>) -> Self {
        Self {
            datastore,
            registry: self.registry.clone(),
            users: Arc::clone(&self.users),
            config: self.config.clone(),
        }
    }

    pub fn datastore(&self) -> &Arc<dyn Datastore> {
        &self.datastore
    }

    pub fn registry(&self) -> &KindRegistry {
        &self.registry
    }

    pub fn users(&self) -> &dyn UserService {
        self.users.as_ref()
    }

    pub fn config(&self) -> &DatastoreConfig {
        &self.config
    }

    pub fn call_options(&self) -> CallOptions {
        CallOptions::from_config(&self.config)
    }

    /// Query over `schema` bounded by the configured sub-query limit
    pub fn query(&self, schema: &Arc<Schema>) -> Query {
        Query::new(schema).max_query_sets(self.config.max_query_sets)
    }

    pub fn kindless_query(&self) -> Query {
        Query::kindless().max_query_sets(self.config.max_query_sets)
    }

    /// Ancestor query over the descendants of `model`, excluding `model`
    pub fn query_descendants(&self, model: &Model) -> ModelResult<Query> {
        let key = model.key()?;
        self.kindless_query()
            .ancestor(key.clone())?
            .filter(&format!("{} >", KEY_SPECIAL_PROPERTY), Value::Key(key))
    }

    /// Rebuild an instance of whatever kind `entity` has
    pub fn model_from_entity(&self, entity: Entity) -> ModelResult<Model> {
        let schema = self.registry.class_for_kind(entity.kind())?;
        Model::from_entity(&schema, entity)
    }

    /// Fetch one instance of any registered kind
    pub async fn get(&self, key: impl IntoKey) -> ModelResult<Option<Model>> {
        let mut found = self.get_many([key]).await?;
        Ok(found.pop().flatten())
    }

    /// Fetch instances of any registered kinds; misses are `None`
    pub async fn get_many<K: IntoKey>(
        &self,
        keys: impl IntoIterator<Item = K>,
    ) -> ModelResult<Vec<Option<Model>>> {
        let keys = keys
            .into_iter()
            .map(IntoKey::into_key)
            .collect::<ModelResult<Vec<Key>>>()?;
        let entities = self.datastore.get(&keys, &self.call_options()).await?;
        entities
            .into_iter()
            .map(|entity| entity.map(|e| self.model_from_entity(e)).transpose())
            .collect()
    }

    /// Write several instances in one storage call
    pub async fn put_all(&self, models: &mut [Model]) -> ModelResult<Vec<Key>> {
        let entities = models
            .iter()
            .map(|model| model.to_entity(self.users()))
            .collect::<ModelResult<Vec<Entity>>>()?;
        let keys = self
            .datastore
            .put(entities.clone(), &self.call_options())
            .await?;
        if keys.len() != models.len() {
            return Err(ModelError::Internal(format!(
                "Datastore returned {} keys for {} entities",
                keys.len(),
                models.len()
            )));
        }
        for ((model, entity), key) in models.iter_mut().zip(entities).zip(keys.iter()) {
            model.mark_saved(entity, key.clone());
        }
        debug!("Put {} instances", keys.len());
        Ok(keys)
    }

    /// Delete by key or instance
    pub async fn delete_keys<K: AsKey>(&self, keys: impl IntoIterator<Item = K>) -> ModelResult<()> {
        let keys = keys
            .into_iter()
            .map(|key| key.as_key())
            .collect::<ModelResult<Vec<Key>>>()?;
        self.datastore.delete(&keys, &self.call_options()).await?;
        debug!("Deleted {} keys", keys.len());
        Ok(())
    }

    /// Reserve `size` ids in the path of `key`
    pub async fn allocate_ids(&self, key: impl AsKey, size: u64) -> ModelResult<(i64, i64)> {
        let key = key.as_key()?;
        self.datastore
            .allocate_ids(&key, size, &self.call_options())
            .await
    }

    /// Run `body` atomically; it receives a client bound to the transaction
    /// and may run more than once on contention
    pub async fn run_in_transaction<F, Fut, T>(&self, body: F) -> ModelResult<T>
    where
        F: Fn(Client) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ModelResult<T>> + Send + 'static,
        T: Send + 'static,
    {
        let base = self.clone();
        let body = Arc::new(body);
        let work: TransactionWork = Arc::new(move |datastore: Arc<dyn Datastore>| {
            let txn = base.with_datastore(datastore);
            let call = body(txn);
            async move { call.await.map(|value| Box::new(value) as Box<dyn Any + Send>) }.boxed()
        });

        let result = self
            .datastore
            .run_in_transaction(work, &self.call_options())
            .await?;
        result
            .downcast::<T>()
            .map(|value| *value)
            .map_err(|_| ModelError::Internal("Transaction produced an unexpected result type".to_string()))
    }
}
