//! Reference properties store the key of another entity

use crate::error::{ModelError, ModelResult};
use crate::value::Value;

/// Schema a reference property points at
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReferenceTarget {
    Kind(String),
    /// The declaring schema; becomes `Kind` once the property is bound
    SelfKind,
    /// Any kind; no reverse collection is created
    Any,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferenceConfig {
    pub target: ReferenceTarget,
    pub collection_name: Option<String>,
}

impl ReferenceConfig {
    pub fn new(target: ReferenceTarget) -> Self {
        Self {
            target,
            collection_name: None,
        }
    }

    /// Resolve a self reference and the default collection name for the
    /// declaring kind
    pub(super) fn bind(&mut self, model_kind: &str) {
        if self.target == ReferenceTarget::SelfKind {
            self.target = ReferenceTarget::Kind(model_kind.to_string());
        }
        if self.collection_name.is_none() {
            self.collection_name = Some(format!("{}_set", model_kind.to_lowercase()));
        }
    }

    pub fn target_kind(&self) -> Option<&str> {
        match &self.target {
            ReferenceTarget::Kind(kind) => Some(kind),
            _ => None,
        }
    }

    pub fn target_label(&self) -> &str {
        self.target_kind().unwrap_or("Model")
    }
}

/// Accept a key with an id or name
pub(super) fn coerce(name: &str, config: &ReferenceConfig, value: Value) -> ModelResult<Value> {
    match value {
        Value::Key(key) if key.has_id_or_name() => Ok(Value::Key(key)),
        Value::Key(_) => Err(ModelError::Validation(format!(
            "{} instance must have a complete key before it can be stored as a reference",
            config.target_label()
        ))),
        other => Err(ModelError::Validation(format!(
            "Property {} must be a Key or a {} instance, not a {}",
            name,
            config.target_label(),
            other.value_type()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::key::Key;

    #[test]
    fn test_self_reference_binding() {
        let mut config = ReferenceConfig::new(ReferenceTarget::SelfKind);
        config.bind("HtmlNode");
        assert_eq!(config.target_kind(), Some("HtmlNode"));
        assert_eq!(config.collection_name.as_deref(), Some("htmlnode_set"));

        let mut named = ReferenceConfig::new(ReferenceTarget::Kind("Story".into()));
        named.collection_name = Some("comments".into());
        named.bind("Comment");
        assert_eq!(named.collection_name.as_deref(), Some("comments"));
    }

    #[test]
    fn test_incomplete_key_rejected() {
        let config = ReferenceConfig::new(ReferenceTarget::Kind("Story".into()));
        let incomplete = Key::incomplete(None, "Story").unwrap();
        let err = coerce("story", &config, Value::Key(incomplete)).unwrap_err();
        assert_eq!(
            err,
            ModelError::Validation(
                "Story instance must have a complete key before it can be stored as a reference".into()
            )
        );
        assert!(coerce("story", &config, Value::Integer(1)).is_err());
    }
}
