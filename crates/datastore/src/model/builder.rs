//! Model Builder - Constructing new instances
//!
//! The builder accepts at most one addressing mode: a complete key, or a key
//! name with an optional parent. Property values not supplied start from the
//! property default. Required-ness of those defaults is only enforced when
//! the instance is written.

use std::sync::Arc;

use tracing::trace;

use super::{Identity, Model};
use crate::client::Client;
use crate::error::{ModelError, ModelResult};
use crate::key::Key;
use crate::relationships::reference;
use crate::schema::Schema;
use crate::value::Value;

enum ParentArg {
    Key(Key),
    Model(Box<Model>),
}

enum FieldArg {
    Value(Value),
    Reference(Box<Model>),
}

/// Builder for a new `Model`
pub struct ModelBuilder<'a> {
    schema: &'a Arc<Schema>,
    key: Option<Key>,
    key_name: Option<String>,
    parent: Option<ParentArg>,
    fields: Vec<(String, FieldArg)>,
}

impl<'a> ModelBuilder<'a> {
    pub fn new(schema: &'a Arc<Schema>) -> Self {
        Self {
            schema,
            key: None,
            key_name: None,
            parent: None,
            fields: Vec::new(),
        }
    }

    /// Address the instance by a complete key
    pub fn key(mut self, key: Key) -> Self {
        self.key = Some(key);
        self
    }

    pub fn key_name(mut self, key_name: impl Into<String>) -> Self {
        self.key_name = Some(key_name.into());
        self
    }

    /// Place the instance in the entity group of a saved instance
    pub fn parent(mut self, parent: &Model) -> Self {
        self.parent = Some(ParentArg::Model(Box::new(parent.clone())));
        self
    }

    pub fn parent_key(mut self, parent: Key) -> Self {
        self.parent = Some(ParentArg::Key(parent));
        self
    }

    pub fn set(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.push((name.into(), FieldArg::Value(value.into())));
        self
    }

    /// Assign a reference property from the referenced instance
    pub fn set_reference(mut self, name: impl Into<String>, target: &Model) -> Self {
        self.fields
            .push((name.into(), FieldArg::Reference(Box::new(target.clone()))));
        self
    }

    fn parent_key_of(parent: &ParentArg) -> ModelResult<Key> {
        match parent {
            ParentArg::Key(key) => Ok(key.clone()),
            ParentArg::Model(model) if model.has_key() => model.key(),
            ParentArg::Model(model) => Err(ModelError::Validation(format!(
                "{} instance must have a complete key before it can be used as a parent.",
                model.kind()
            ))),
        }
    }

    fn identity(&self) -> ModelResult<Identity> {
        let parent_key = self.parent.as_ref().map(Self::parent_key_of).transpose()?;

        if let Some(key) = &self.key {
            if !key.has_id_or_name() {
                return Err(ModelError::BadKey("Key must have an id or name".to_string()));
            }
            if key.kind() != self.schema.kind() {
                return Err(ModelError::BadKey(format!(
                    "Expected Key kind to be {}; received {}",
                    self.schema.kind(),
                    key.kind()
                )));
            }
            if let Some(name) = &self.key_name {
                if key.name() != Some(name.as_str()) {
                    return Err(ModelError::BadArgument(
                        "Cannot use key and key_name at the same time with different values"
                            .to_string(),
                    ));
                }
            }
            if let Some(parent) = &parent_key {
                if key.parent().as_ref() != Some(parent) {
                    return Err(ModelError::BadArgument(
                        "Cannot use key and parent at the same time with different values"
                            .to_string(),
                    ));
                }
            }
            return Ok(Identity::Key(key.clone()));
        }

        if let Some(name) = &self.key_name {
            if name.is_empty() {
                return Err(ModelError::BadKey("Name cannot be empty.".to_string()));
            }
        }
        if let Some(parent) = &parent_key {
            if !parent.is_complete() {
                return Err(ModelError::BadKey(format!(
                    "Parent key {} must be complete.",
                    parent
                )));
            }
        }

        Ok(Identity::Pending {
            key_name: self.key_name.clone(),
            parent: parent_key,
        })
    }

    /// Validate the supplied values and construct the instance
    pub fn build(self, client: &Client) -> ModelResult<Model> {
        if self.schema.is_abstract() {
            return Err(ModelError::Configuration(format!(
                "Kind {} is abstract and cannot be instantiated",
                self.schema.kind()
            )));
        }

        let identity = self.identity()?;
        let mut model = Model::empty(self.schema, identity);
        if let Some(ParentArg::Model(parent)) = self.parent {
            model.parent = Some(parent);
        }

        for property in self.schema.properties() {
            let default = property.default_value(client.users());
            let value = if property.is_empty_value(&default) {
                default
            } else {
                property.validate(default)?
            };
            model.store_value(property.attr_name(), value);
        }

        for (name, field) in self.fields {
            match field {
                FieldArg::Value(value) => model.set(&name, value)?,
                FieldArg::Reference(target) => reference::assign(&mut model, &name, *target)?,
            }
        }

        trace!("Constructed {} instance", model.kind());
        Ok(model)
    }
}
