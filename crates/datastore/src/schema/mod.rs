//! Schemas - Kind definitions assembled from declared and inherited properties
//!
//! A schema is built once with `SchemaBuilder` and registered in a
//! `KindRegistry`. Building merges the property maps of every base schema,
//! rejecting a name inherited from two unrelated declarations, then binds the
//! newly declared properties in declaration order.

pub mod registry;
pub mod reserved;

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use tracing::debug;

use crate::error::{ModelError, ModelResult};
use crate::property::Property;

pub use registry::{KindRegistry, ReverseReference};
pub use reserved::check_reserved_word;

/// The merged property map of one kind
#[derive(Debug)]
pub struct Schema {
    kind: String,
    properties: Vec<Arc<Property>>,
    by_attr: HashMap<String, usize>,
    by_storage: HashMap<String, usize>,
    declared: Vec<String>,
    unindexed: BTreeSet<String>,
    ancestry: Vec<String>,
    expando: bool,
    mapped: bool,
}

impl Schema {
    pub fn kind(&self) -> &str {
        &self.kind
    }

    /// All properties, inherited ones first, in declaration order
    pub fn properties(&self) -> &[Arc<Property>] {
        &self.properties
    }

    pub fn property(&self, attr_name: &str) -> Option<&Arc<Property>> {
        self.by_attr.get(attr_name).map(|&idx| &self.properties[idx])
    }

    pub fn property_by_storage_name(&self, name: &str) -> Option<&Arc<Property>> {
        self.by_storage.get(name).map(|&idx| &self.properties[idx])
    }

    /// Properties declared on this schema rather than inherited
    pub fn declared_properties(&self) -> impl Iterator<Item = &Arc<Property>> {
        self.declared.iter().filter_map(move |name| self.property(name))
    }

    /// Storage names of unindexed properties
    pub fn unindexed_properties(&self) -> &BTreeSet<String> {
        &self.unindexed
    }

    /// Kinds of every schema this one extends, nearest first
    pub fn ancestry(&self) -> &[String] {
        &self.ancestry
    }

    /// Whether instances of this schema are also instances of `kind`
    pub fn is_subkind_of(&self, kind: &str) -> bool {
        self.kind == kind || self.ancestry.iter().any(|base| base == kind)
    }

    pub fn is_expando(&self) -> bool {
        self.expando
    }

    /// Abstract schemas contribute properties but are never registered
    pub fn is_abstract(&self) -> bool {
        !self.mapped
    }
}

/// Builder for a schema definition
#[derive(Debug)]
pub struct SchemaBuilder {
    kind: String,
    bases: Vec<Arc<Schema>>,
    declared: Vec<(String, Property)>,
    expando: bool,
    mapped: bool,
}

impl SchemaBuilder {
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            bases: Vec::new(),
            declared: Vec::new(),
            expando: false,
            mapped: true,
        }
    }

    /// Inherit every property of `base`
    pub fn extends(mut self, base: &Arc<Schema>) -> Self {
        self.bases.push(Arc::clone(base));
        self
    }

    pub fn property(mut self, name: impl Into<String>, property: Property) -> Self {
        self.declared.push((name.into(), property));
        self
    }

    /// Accept arbitrary dynamic properties on instances
    pub fn expando(mut self) -> Self {
        self.expando = true;
        self
    }

    /// Do not register the schema under its kind
    pub fn abstract_kind(mut self) -> Self {
        self.mapped = false;
        self
    }

    /// Merge, bind, and register the schema
    pub fn build(self, registry: &KindRegistry) -> ModelResult<Arc<Schema>> {
        let schema = Arc::new(self.assemble()?);
        if schema.mapped {
            registry.register(Arc::clone(&schema))?;
        }
        debug!(
            "Built schema {} with {} properties",
            schema.kind,
            schema.properties.len()
        );
        Ok(schema)
    }

    fn assemble(self) -> ModelResult<Schema> {
        if self.kind.is_empty() {
            return Err(ModelError::Configuration("Kind name cannot be empty".to_string()));
        }

        let mut properties: Vec<Arc<Property>> = Vec::new();
        let mut by_attr: HashMap<String, usize> = HashMap::new();
        let mut ancestry: Vec<String> = Vec::new();
        let mut expando = self.expando;

        for base in &self.bases {
            expando |= base.expando;
            for kind in std::iter::once(&base.kind).chain(base.ancestry.iter()) {
                if !ancestry.contains(kind) {
                    ancestry.push(kind.clone());
                }
            }

            for property in &base.properties {
                let name = property.attr_name();
                match by_attr.get(name) {
                    Some(&idx) => {
                        let existing = properties[idx].model_kind();
                        if existing != property.model_kind() {
                            return Err(ModelError::DuplicateProperty(format!(
                                "Duplicate property, {}, is inherited from both {} and {}.",
                                name,
                                existing.unwrap_or_default(),
                                property.model_kind().unwrap_or_default()
                            )));
                        }
                    }
                    None => {
                        by_attr.insert(name.to_string(), properties.len());
                        properties.push(Arc::clone(property));
                    }
                }
            }
        }

        let mut declared = Vec::with_capacity(self.declared.len());
        for (name, mut property) in self.declared {
            check_reserved_word(&name)?;
            if by_attr.contains_key(&name) {
                return Err(ModelError::DuplicateProperty(format!(
                    "Duplicate property: {}",
                    name
                )));
            }
            property.configure(&self.kind, &name)?;
            by_attr.insert(name.clone(), properties.len());
            properties.push(Arc::new(property));
            declared.push(name);
        }

        let mut by_storage = HashMap::new();
        for (idx, property) in properties.iter().enumerate() {
            if by_storage
                .insert(property.storage_name().to_string(), idx)
                .is_some()
            {
                return Err(ModelError::DuplicateProperty(format!(
                    "Duplicate storage name {} on kind {}",
                    property.storage_name(),
                    self.kind
                )));
            }
        }

        let unindexed = properties
            .iter()
            .filter(|property| !property.is_indexed())
            .map(|property| property.storage_name().to_string())
            .collect();

        Ok(Schema {
            kind: self.kind,
            properties,
            by_attr,
            by_storage,
            declared,
            unindexed,
            ancestry,
            expando,
            mapped: self.mapped,
        })
    }
}
