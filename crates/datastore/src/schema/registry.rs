//! Kind Registry - Runtime map from kind name to schema
//!
//! Also tracks the reverse collections generated by reference properties,
//! keyed by the referenced kind.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use dashmap::DashMap;
use tracing::{debug, warn};

use super::Schema;
use crate::error::{ModelError, ModelResult};

/// Read-only collection generated on a referenced kind
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReverseReference {
    /// Kind holding the forward reference
    pub source_kind: String,
    /// Attribute name of the forward reference
    pub property: String,
    /// Storage name the forward reference is filtered on
    pub storage_name: String,
}

/// Thread-safe registry of schemas
#[derive(Debug, Clone)]
pub struct KindRegistry {
    /// Map of kind name -> schema
    kinds: Arc<DashMap<String, Arc<Schema>>>,

    /// Referenced kind -> collection name -> reverse reference
    reverse_references: Arc<DashMap<String, BTreeMap<String, ReverseReference>>>,

    registration: Arc<Mutex<()>>,
    allow_redefinition: bool,
}

impl Default for KindRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl KindRegistry {
    /// Create a registry that rejects duplicate kinds
    pub fn new() -> Self {
        Self::with_redefinition(false)
    }

    /// Create a registry; when `allow_redefinition` is set the last schema
    /// registered for a kind replaces earlier ones
    pub fn with_redefinition(allow_redefinition: bool) -> Self {
        Self {
            kinds: Arc::new(DashMap::new()),
            reverse_references: Arc::new(DashMap::new()),
            registration: Arc::new(Mutex::new(())),
            allow_redefinition,
        }
    }

    /// Register a schema and the reverse collections of its reference properties
    pub fn register(&self, schema: Arc<Schema>) -> ModelResult<()> {
        let _guard = self
            .registration
            .lock()
            .map_err(|_| ModelError::Internal("Kind registry lock poisoned".to_string()))?;

        let kind = schema.kind().to_string();
        if self.kinds.contains_key(&kind) {
            if !self.allow_redefinition {
                return Err(ModelError::DuplicateKind(format!(
                    "Kind '{}' is already registered",
                    kind
                )));
            }
            warn!("Redefining kind {}; the previous schema is replaced", kind);
        }

        if let Some(existing) = self.reverse_references.get(&kind) {
            for (collection, reverse) in existing.iter() {
                let own = reverse.source_kind == kind;
                if schema.property(collection).is_some() && !own {
                    return Err(ModelError::DuplicateProperty(format!(
                        "Class {} already has property {}",
                        kind, collection
                    )));
                }
            }
        }

        let mut pending: Vec<(String, String, ReverseReference)> = Vec::new();
        for property in schema.declared_properties() {
            let Some(config) = property.reference_config() else {
                continue;
            };
            let (Some(target), Some(collection)) =
                (config.target_kind(), config.collection_name.as_deref())
            else {
                continue;
            };
            let reverse = ReverseReference {
                source_kind: kind.clone(),
                property: property.attr_name().to_string(),
                storage_name: property.storage_name().to_string(),
            };
            self.check_collection(target, collection, &reverse, &schema, &pending)?;
            pending.push((target.to_string(), collection.to_string(), reverse));
        }

        for (target, collection, reverse) in pending {
            debug!(
                "Registering reverse collection {}.{} for {}.{}",
                target, collection, reverse.source_kind, reverse.property
            );
            self.reverse_references
                .entry(target)
                .or_default()
                .insert(collection, reverse);
        }

        debug!("Registered kind {}", kind);
        self.kinds.insert(kind, schema);
        Ok(())
    }

    fn check_collection(
        &self,
        target: &str,
        collection: &str,
        reverse: &ReverseReference,
        schema: &Schema,
        pending: &[(String, String, ReverseReference)],
    ) -> ModelResult<()> {
        let duplicate = || {
            ModelError::DuplicateProperty(format!(
                "Class {} already has property {}",
                target, collection
            ))
        };

        let target_schema = if target == schema.kind() {
            Some(schema.property(collection).is_some())
        } else {
            self.kinds
                .get(target)
                .map(|entry| entry.value().property(collection).is_some())
        };
        if target_schema == Some(true) {
            return Err(duplicate());
        }

        if pending
            .iter()
            .any(|(t, c, _)| t == target && c == collection)
        {
            return Err(duplicate());
        }

        if let Some(existing) = self.reverse_references.get(target) {
            if let Some(current) = existing.get(collection) {
                if current != reverse {
                    return Err(duplicate());
                }
            }
        }
        Ok(())
    }

    /// Schema registered for `kind`
    pub fn class_for_kind(&self, kind: &str) -> ModelResult<Arc<Schema>> {
        self.kinds
            .get(kind)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or_else(|| ModelError::Kind(format!("No implementation for kind '{}'", kind)))
    }

    pub fn contains(&self, kind: &str) -> bool {
        self.kinds.contains_key(kind)
    }

    /// Reverse collection named `collection` on `kind`
    pub fn reverse_reference(&self, kind: &str, collection: &str) -> Option<ReverseReference> {
        self.reverse_references
            .get(kind)?
            .get(collection)
            .cloned()
    }

    /// All reverse collections generated on `kind`
    pub fn reverse_references_for(&self, kind: &str) -> BTreeMap<String, ReverseReference> {
        self.reverse_references
            .get(kind)
            .map(|entry| entry.value().clone())
            .unwrap_or_default()
    }

    /// Registered kind names, sorted
    pub fn kinds(&self) -> Vec<String> {
        let mut kinds: Vec<String> = self.kinds.iter().map(|entry| entry.key().clone()).collect();
        kinds.sort();
        kinds
    }

    pub fn len(&self) -> usize {
        self.kinds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.kinds.is_empty()
    }
}
