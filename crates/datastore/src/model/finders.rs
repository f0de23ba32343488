//! Finders - Schema-level fetch operations

use std::sync::Arc;

use tracing::debug;

use super::Model;
use crate::client::Client;
use crate::entity::Entity;
use crate::error::{ModelError, ModelResult};
use crate::key::{IntoKey, Key};
use crate::query::Query;
use crate::schema::Schema;
use crate::value::Value;

impl Model {
    /// Fetch one instance of `schema` (or of a kind extending it) by key
    pub async fn find(
        schema: &Arc<Schema>,
        client: &Client,
        key: impl IntoKey,
    ) -> ModelResult<Option<Model>> {
        let mut found = Self::find_many(schema, client, [key]).await?;
        Ok(found.pop().flatten())
    }

    /// Fetch several instances; misses are `None` in the matching slot
    pub async fn find_many<K: IntoKey>(
        schema: &Arc<Schema>,
        client: &Client,
        keys: impl IntoIterator<Item = K>,
    ) -> ModelResult<Vec<Option<Model>>> {
        let keys = keys
            .into_iter()
            .map(IntoKey::into_key)
            .collect::<ModelResult<Vec<Key>>>()?;
        let entities = client
            .datastore()
            .get(&keys, &client.call_options())
            .await?;

        entities
            .into_iter()
            .map(|entity| entity.map(|e| Self::load_as(schema, client, e)).transpose())
            .collect()
    }

    fn load_as(schema: &Arc<Schema>, client: &Client, entity: Entity) -> ModelResult<Model> {
        let record_schema = if entity.kind() == schema.kind() {
            Arc::clone(schema)
        } else {
            client.registry().class_for_kind(entity.kind())?
        };
        if !record_schema.is_subkind_of(schema.kind()) {
            return Err(ModelError::Kind(format!(
                "Kind '{}' is not a subclass of kind '{}'",
                record_schema.kind(),
                schema.kind()
            )));
        }
        Model::from_entity(&record_schema, entity)
    }

    pub async fn get_by_key_name(
        schema: &Arc<Schema>,
        client: &Client,
        key_name: &str,
        parent: Option<&Key>,
    ) -> ModelResult<Option<Model>> {
        let key = Key::from_path(parent, schema.kind(), key_name)?;
        Self::find(schema, client, key).await
    }

    pub async fn get_by_key_names(
        schema: &Arc<Schema>,
        client: &Client,
        key_names: &[&str],
        parent: Option<&Key>,
    ) -> ModelResult<Vec<Option<Model>>> {
        let keys = key_names
            .iter()
            .map(|name| Key::from_path(parent, schema.kind(), *name))
            .collect::<ModelResult<Vec<Key>>>()?;
        Self::find_many(schema, client, keys).await
    }

    pub async fn get_by_id(
        schema: &Arc<Schema>,
        client: &Client,
        id: i64,
        parent: Option<&Key>,
    ) -> ModelResult<Option<Model>> {
        let key = Key::from_path(parent, schema.kind(), id)?;
        Self::find(schema, client, key).await
    }

    pub async fn get_by_ids(
        schema: &Arc<Schema>,
        client: &Client,
        ids: &[i64],
        parent: Option<&Key>,
    ) -> ModelResult<Vec<Option<Model>>> {
        let keys = ids
            .iter()
            .map(|id| Key::from_path(parent, schema.kind(), *id))
            .collect::<ModelResult<Vec<Key>>>()?;
        Self::find_many(schema, client, keys).await
    }

    /// Fetch the instance named `key_name`, creating it from `values` when
    /// it does not exist; both steps run in one transaction
    pub async fn get_or_insert(
        schema: &Arc<Schema>,
        client: &Client,
        key_name: &str,
        parent: Option<Key>,
        values: Vec<(String, Value)>,
    ) -> ModelResult<Model> {
        let schema = Arc::clone(schema);
        let key_name = key_name.to_string();

        client
            .run_in_transaction(move |txn: Client| {
                let schema = Arc::clone(&schema);
                let key_name = key_name.clone();
                let parent = parent.clone();
                let values = values.clone();
                async move {
                    if let Some(existing) =
                        Model::get_by_key_name(&schema, &txn, &key_name, parent.as_ref()).await?
                    {
                        return Ok(existing);
                    }

                    let mut builder = Model::builder(&schema).key_name(key_name.as_str());
                    if let Some(parent) = parent {
                        builder = builder.parent_key(parent);
                    }
                    for (name, value) in values {
                        builder = builder.set(name, value);
                    }
                    let mut model = builder.build(&txn)?;
                    model.put(&txn).await?;
                    debug!("Inserted {} '{}'", schema.kind(), key_name);
                    Ok::<_, ModelError>(model)
                }
            })
            .await
    }

    /// Query over every instance of `schema`
    pub fn all(schema: &Arc<Schema>) -> Query {
        Query::new(schema)
    }
}
