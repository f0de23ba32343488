//! Forward references
//!
//! A reference property stores the key of the referenced entity. The
//! referenced instance is fetched on first access and cached on the owning
//! instance until the property is assigned again.

use std::sync::Arc;

use tracing::trace;

use crate::client::Client;
use crate::error::{ModelError, ModelResult};
use crate::key::Key;
use crate::model::Model;
use crate::property::{Property, ReferenceConfig};

fn reference_property(model: &Model, name: &str) -> ModelResult<(Arc<Property>, ReferenceConfig)> {
    let property = model
        .schema()
        .property(name)
        .cloned()
        .ok_or_else(|| ModelError::Property(format!("{} has no property {}", model.kind(), name)))?;
    let config = property.reference_config().cloned().ok_or_else(|| {
        ModelError::Property(format!(
            "{} is not a reference property of {}",
            name,
            model.kind()
        ))
    })?;
    Ok((property, config))
}

fn check_target_kind(name: &str, config: &ReferenceConfig, target: &Model) -> ModelResult<()> {
    match config.target_kind() {
        Some(kind) if !target.schema().is_subkind_of(kind) => Err(ModelError::Kind(format!(
            "Property {} must be an instance of {}",
            name, kind
        ))),
        _ => Ok(()),
    }
}

/// Point a reference property at `target`, caching it as resolved
pub(crate) fn assign(model: &mut Model, name: &str, target: Model) -> ModelResult<()> {
    let (property, config) = reference_property(model, name)?;
    if !target.has_key() {
        return Err(ModelError::Validation(format!(
            "{} instance must have a complete key before it can be stored as a reference",
            config.target_label()
        )));
    }
    check_target_kind(name, &config, &target)?;

    property.set(model, target.key()?)?;
    model.cache_resolved(name, target);
    Ok(())
}

impl Model {
    /// Assign a reference property from the referenced instance
    pub fn set_reference(&mut self, name: &str, target: &Model) -> ModelResult<()> {
        assign(self, name, target.clone())
    }

    /// Stored key of a reference property, without fetching
    pub fn reference_key(&self, name: &str) -> ModelResult<Option<Key>> {
        let (property, _) = reference_property(self, name)?;
        Ok(property.get(self).as_key().cloned())
    }

    /// The referenced instance, fetched on first access
    pub async fn get_reference(&mut self, name: &str, client: &Client) -> ModelResult<Option<&Model>> {
        let (_, config) = reference_property(self, name)?;
        let Some(key) = self.reference_key(name)? else {
            return Ok(None);
        };

        let cached = self
            .resolved(name)
            .map_or(false, |resolved| resolved.key().ok().as_ref() == Some(&key));
        if !cached {
            trace!("Resolving reference {}.{} -> {}", self.kind(), name, key);
            let target = client.get(key.clone()).await?.ok_or_else(|| {
                ModelError::EntityNotFound(format!(
                    "Reference property {} failed to be resolved: {}",
                    name, key
                ))
            })?;
            check_target_kind(name, &config, &target)?;
            self.cache_resolved(name, target);
        }
        Ok(self.resolved(name))
    }
}
