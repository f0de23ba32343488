//! Model Instances - Typed objects backed by a schema
//!
//! A `Model` holds an identity, the validated value of every declared
//! property, and, once saved or loaded, the raw record it was written to.
//! Values are read and written through the schema's property descriptors so
//! every assignment is validated.
//!
//! ```rust,ignore
//! let mut story = Model::builder(&story_schema)
//!     .key_name("first")
//!     .set("title", "Hello")
//!     .build(&client)?;
//! story.put(&client).await?;
//! ```

pub mod builder;
pub mod expando;
pub mod finders;
pub mod persistence;

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use crate::entity::Entity;
use crate::error::{ModelError, ModelResult};
use crate::key::{AsKey, Key};
use crate::property::Property;
use crate::schema::Schema;
use crate::value::Value;

pub use builder::ModelBuilder;

/// How an instance is addressed before it has a raw record
#[derive(Debug, Clone, PartialEq)]
pub enum Identity {
    /// A complete key supplied by the caller or adopted on save
    Key(Key),
    /// A key name and/or parent, turned into a key on demand
    Pending {
        key_name: Option<String>,
        parent: Option<Key>,
    },
}

impl Default for Identity {
    fn default() -> Self {
        Identity::Pending {
            key_name: None,
            parent: None,
        }
    }
}

/// An instance of a schema
#[derive(Debug, Clone)]
pub struct Model {
    schema: Arc<Schema>,
    identity: Identity,
    entity: Option<Entity>,
    values: HashMap<String, Value>,
    dynamic: BTreeMap<String, Value>,
    resolved: HashMap<String, Model>,
    parent: Option<Box<Model>>,
}

impl Model {
    pub(crate) fn empty(schema: &Arc<Schema>, identity: Identity) -> Self {
        Self {
            schema: Arc::clone(schema),
            identity,
            entity: None,
            values: HashMap::new(),
            dynamic: BTreeMap::new(),
            resolved: HashMap::new(),
            parent: None,
        }
    }

    /// Start building a new instance of `schema`
    pub fn builder(schema: &Arc<Schema>) -> ModelBuilder<'_> {
        ModelBuilder::new(schema)
    }

    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    pub fn kind(&self) -> &str {
        self.schema.kind()
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    /// Whether the instance holds a raw record
    pub fn is_saved(&self) -> bool {
        self.entity.is_some()
    }

    /// Whether `key()` would succeed
    pub fn has_key(&self) -> bool {
        match &self.identity {
            _ if self.is_saved() => true,
            Identity::Key(_) => true,
            Identity::Pending { key_name, .. } => key_name.is_some(),
        }
    }

    /// The instance's key; unsaved instances without a key name have none
    pub fn key(&self) -> ModelResult<Key> {
        if let Some(entity) = &self.entity {
            return Ok(entity.key().clone());
        }
        match &self.identity {
            Identity::Key(key) => Ok(key.clone()),
            Identity::Pending {
                key_name: Some(name),
                parent,
            } => Key::from_path(parent.as_ref(), self.kind(), name.as_str()),
            Identity::Pending { key_name: None, .. } => Err(ModelError::NotSaved(format!(
                "{} instance has no key until it is saved",
                self.kind()
            ))),
        }
    }

    /// Key of the parent entity, without touching storage
    pub fn parent_key(&self) -> Option<Key> {
        match &self.identity {
            Identity::Pending { parent, .. } if parent.is_some() => parent.clone(),
            Identity::Key(key) => key.parent(),
            _ => self.entity.as_ref().and_then(|entity| entity.key().parent()),
        }
    }

    /// The raw record of the last save or load
    pub fn entity(&self) -> Option<&Entity> {
        self.entity.as_ref()
    }

    fn property_or_err(&self, attr_name: &str) -> ModelResult<&Arc<Property>> {
        self.schema.property(attr_name).ok_or_else(|| {
            ModelError::Property(format!("{} has no property {}", self.kind(), attr_name))
        })
    }

    /// Value of a declared or dynamic property
    pub fn get(&self, name: &str) -> ModelResult<Value> {
        if let Some(property) = self.schema.property(name) {
            return Ok(property.get(self));
        }
        if self.schema.is_expando() {
            if let Some(value) = self.dynamic.get(name) {
                return Ok(value.clone());
            }
        }
        Err(ModelError::Property(format!(
            "{} has no property {}",
            self.kind(),
            name
        )))
    }

    /// Validate and assign a declared property, or a dynamic one on expando kinds
    pub fn set(&mut self, name: &str, value: impl Into<Value>) -> ModelResult<()> {
        let value = value.into();
        match self.schema.property(name).cloned() {
            Some(property) => {
                property.set(self, value)?;
                self.resolved.remove(name);
                Ok(())
            }
            None if self.schema.is_expando() => self.set_dynamic(name, value),
            None => Err(ModelError::Property(format!(
                "{} has no property {}",
                self.kind(),
                name
            ))),
        }
    }

    /// Values of every declared property, keyed by attribute name
    pub fn properties(&self) -> BTreeMap<String, Value> {
        self.schema
            .properties()
            .iter()
            .map(|property| (property.attr_name().to_string(), property.get(self)))
            .collect()
    }

    pub(crate) fn raw_value(&self, attr_name: &str) -> Option<&Value> {
        self.values.get(attr_name)
    }

    pub(crate) fn store_value(&mut self, attr_name: &str, value: Value) {
        self.values.insert(attr_name.to_string(), value);
    }

    pub(crate) fn resolved(&self, attr_name: &str) -> Option<&Model> {
        self.resolved.get(attr_name)
    }

    pub(crate) fn cache_resolved(&mut self, attr_name: &str, target: Model) {
        self.resolved.insert(attr_name.to_string(), target);
    }
}

impl AsKey for Model {
    fn as_key(&self) -> ModelResult<Key> {
        self.key()
    }
}

/// A model used as a filter operand or reference value stands for its key
impl TryFrom<&Model> for Value {
    type Error = ModelError;

    fn try_from(model: &Model) -> ModelResult<Value> {
        model.key().map(Value::Key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::Client;
    use crate::schema::SchemaBuilder;

    fn story_schema(client: &Client) -> Arc<Schema> {
        SchemaBuilder::new("Story")
            .property("title", Property::string())
            .property("rank", Property::integer().default(1i64))
            .build(client.registry())
            .unwrap()
    }

    #[test]
    fn test_unsaved_instance_has_no_key() {
        let client = Client::in_memory();
        let schema = story_schema(&client);
        let story = Model::builder(&schema).build(&client).unwrap();

        assert!(!story.is_saved());
        assert!(!story.has_key());
        assert!(matches!(story.key().unwrap_err(), ModelError::NotSaved(_)));
        assert_eq!(story.get("rank").unwrap(), Value::Integer(1));
        assert_eq!(story.get("title").unwrap(), Value::Null);
    }

    #[test]
    fn test_key_name_builds_key() {
        let client = Client::in_memory();
        let schema = story_schema(&client);
        let parent = Key::from_path(None, "Author", "ann").unwrap();
        let story = Model::builder(&schema)
            .key_name("first")
            .parent_key(parent.clone())
            .build(&client)
            .unwrap();

        assert!(story.has_key());
        let key = story.key().unwrap();
        assert_eq!(key.name(), Some("first"));
        assert_eq!(key.parent(), Some(parent.clone()));
        assert_eq!(story.parent_key(), Some(parent));
    }

    #[test]
    fn test_set_validates() {
        let client = Client::in_memory();
        let schema = story_schema(&client);
        let mut story = Model::builder(&schema).build(&client).unwrap();

        story.set("title", "Hello").unwrap();
        assert_eq!(story.get("title").unwrap(), Value::from("Hello"));
        assert!(matches!(
            story.set("rank", "high").unwrap_err(),
            ModelError::Validation(_)
        ));
        assert!(matches!(
            story.set("missing", 1i64).unwrap_err(),
            ModelError::Property(_)
        ));
        assert!(matches!(story.get("missing").unwrap_err(), ModelError::Property(_)));
    }

    #[test]
    fn test_model_as_value() {
        let client = Client::in_memory();
        let schema = story_schema(&client);
        let story = Model::builder(&schema).key_name("a").build(&client).unwrap();
        let value = Value::try_from(&story).unwrap();
        assert_eq!(value.as_key().and_then(|k| k.name()), Some("a"));
    }
}
