//! Persistence - Moving instances to and from raw records
//!
//! `to_entity` serializes every declared property through its storage form;
//! an empty list is left out of the record entirely. Expando kinds also write
//! their dynamic properties and drop stored fields that no longer exist on
//! the instance. `from_entity` is deliberately lenient: stored values that
//! fail validation are kept as-is and logged.

use std::collections::BTreeSet;
use std::sync::Arc;

use tracing::{debug, warn};

use super::{Identity, Model};
use crate::client::Client;
use crate::entity::Entity;
use crate::error::{ModelError, ModelResult};
use crate::key::Key;
use crate::schema::Schema;
use crate::users::{AnonymousUsers, UserService};
use crate::value::Value;

impl Model {
    /// Key the next write should use; incomplete when the store assigns the id
    fn write_key(&self) -> ModelResult<Key> {
        if let Some(entity) = &self.entity {
            return Ok(entity.key().clone());
        }
        match &self.identity {
            Identity::Key(key) => Ok(key.clone()),
            Identity::Pending {
                key_name: Some(name),
                parent,
            } => Key::from_path(parent.as_ref(), self.kind(), name.as_str()),
            Identity::Pending {
                key_name: None,
                parent,
            } => Key::incomplete(parent.as_ref(), self.kind()),
        }
    }

    /// Serialize the instance into the record that `put` writes
    pub fn to_entity(&self, users: &dyn UserService) -> ModelResult<Entity> {
        let mut entity = match &self.entity {
            Some(entity) => entity.clone(),
            None => Entity::new(self.write_key()?),
        };

        for property in self.schema.properties() {
            let current = property.get(self);
            let stored = property.value_for_storage(&current, users)?;
            match stored {
                Value::List(items) if items.is_empty() => {
                    entity.remove(property.storage_name());
                }
                stored => entity.set(property.storage_name(), stored),
            }
        }

        let mut unindexed: BTreeSet<String> = self.schema.unindexed_properties().clone();

        if self.schema.is_expando() {
            for (name, value) in &self.dynamic {
                if is_unindexed_dynamic(value) {
                    unindexed.insert(name.clone());
                }
                entity.set(name.clone(), value.clone());
            }

            let stale: Vec<String> = entity
                .property_names()
                .into_iter()
                .filter(|name| {
                    !self.dynamic.contains_key(name)
                        && self.schema.property_by_storage_name(name).is_none()
                })
                .collect();
            for name in stale {
                entity.remove(&name);
            }
        }

        entity.set_unindexed_properties(unindexed);
        Ok(entity)
    }

    /// Rebuild an instance from a stored record
    pub fn from_entity(schema: &Arc<Schema>, entity: Entity) -> ModelResult<Model> {
        if entity.kind() != schema.kind() {
            return Err(ModelError::Kind(format!(
                "Class {} cannot handle kind '{}'",
                schema.kind(),
                entity.kind()
            )));
        }

        let key = entity.key().clone();
        let identity = if key.has_id_or_name() {
            Identity::Key(key.clone())
        } else {
            Identity::Pending {
                key_name: None,
                parent: key.parent(),
            }
        };
        let mut model = Model::empty(schema, identity);

        for property in schema.properties() {
            let value = match entity.get(property.storage_name()) {
                Some(stored) => {
                    let stored = property.value_from_storage(stored.clone());
                    match property.validate(stored.clone()) {
                        Ok(value) => value,
                        Err(err) => {
                            warn!(
                                "Keeping stored value of {}.{} on {} despite validation failure: {}",
                                schema.kind(),
                                property.attr_name(),
                                key,
                                err
                            );
                            stored
                        }
                    }
                }
                None => property.value_from_storage(property.default_value(&AnonymousUsers)),
            };
            model.store_value(property.attr_name(), value);
        }

        if schema.is_expando() {
            for (name, value) in entity.properties() {
                if schema.property_by_storage_name(name).is_none() {
                    model.dynamic.insert(name.clone(), value.clone());
                }
            }
        }

        if key.has_id_or_name() {
            model.entity = Some(entity);
        }
        Ok(model)
    }

    /// Record the result of a successful write
    pub(crate) fn mark_saved(&mut self, mut entity: Entity, key: Key) {
        entity.set_key(key.clone());
        self.entity = Some(entity);
        self.identity = Identity::Key(key);
    }

    /// Write the instance, adopting the key the store assigns
    pub async fn put(&mut self, client: &Client) -> ModelResult<Key> {
        let entity = self.to_entity(client.users())?;
        let keys = client
            .datastore()
            .put(vec![entity.clone()], &client.call_options())
            .await?;
        let key = keys.into_iter().next().ok_or_else(|| {
            ModelError::Internal("Datastore returned no key for a written entity".to_string())
        })?;
        debug!("Put {}", key);
        self.mark_saved(entity, key.clone());
        Ok(key)
    }

    /// Delete the stored record; the instance keeps its key and may be put again
    pub async fn delete(&mut self, client: &Client) -> ModelResult<()> {
        let key = self.key()?;
        client
            .datastore()
            .delete(std::slice::from_ref(&key), &client.call_options())
            .await?;
        debug!("Deleted {}", key);
        self.entity = None;
        self.identity = Identity::Key(key);
        Ok(())
    }

    /// The parent instance, fetched on first access and cached
    pub async fn parent(&mut self, client: &Client) -> ModelResult<Option<&Model>> {
        if self.parent.is_none() {
            let Some(parent_key) = self.parent_key() else {
                return Ok(None);
            };
            match client.get(parent_key).await? {
                Some(parent) => self.parent = Some(Box::new(parent)),
                None => return Ok(None),
            }
        }
        Ok(self.parent.as_deref())
    }
}

fn is_unindexed_dynamic(value: &Value) -> bool {
    match value {
        Value::Text(_) | Value::Blob(_) => true,
        Value::List(items) => items.iter().any(is_unindexed_dynamic),
        _ => false,
    }
}
