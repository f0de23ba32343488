//! Entity Keys - Ancestor-path keys addressing stored entities
//!
//! A key is an ordered path of (kind, identifier) pairs. The identifier of the
//! last element may be unset, in which case the key is incomplete and the
//! storage collaborator assigns a numeric id on first write.

use base64::{engine::general_purpose::URL_SAFE, Engine};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{ModelError, ModelResult};

/// Identifier of a single path element
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum KeyId {
    /// Numeric id assigned by the storage collaborator
    Id(i64),
    /// Application-assigned name
    Name(String),
}

impl fmt::Display for KeyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyId::Id(id) => write!(f, "{}", id),
            KeyId::Name(name) => write!(f, "'{}'", name),
        }
    }
}

impl From<i64> for KeyId {
    fn from(id: i64) -> Self {
        KeyId::Id(id)
    }
}

impl From<&str> for KeyId {
    fn from(name: &str) -> Self {
        KeyId::Name(name.to_string())
    }
}

impl From<String> for KeyId {
    fn from(name: String) -> Self {
        KeyId::Name(name)
    }
}

/// One (kind, identifier) pair of a key path
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PathElement {
    pub kind: String,
    pub id: Option<KeyId>,
}

/// Hierarchical entity key
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Key {
    path: Vec<PathElement>,
}

impl Key {
    /// Build a complete key under an optional parent
    pub fn from_path(parent: Option<&Key>, kind: &str, id: impl Into<KeyId>) -> ModelResult<Key> {
        let id = id.into();
        match &id {
            KeyId::Name(name) if name.is_empty() => {
                return Err(ModelError::BadKey("Name cannot be empty.".to_string()))
            }
            KeyId::Id(value) if *value <= 0 => {
                return Err(ModelError::BadKey(format!(
                    "Id must be a positive integer, got {}",
                    value
                )))
            }
            _ => {}
        }
        let mut key = Self::incomplete(parent, kind)?;
        if let Some(last) = key.path.last_mut() {
            last.id = Some(id);
        }
        Ok(key)
    }

    /// Build a key whose identifier is left for the storage collaborator to assign
    pub fn incomplete(parent: Option<&Key>, kind: &str) -> ModelResult<Key> {
        if kind.is_empty() {
            return Err(ModelError::BadKey("Kind cannot be empty.".to_string()));
        }
        let mut path = match parent {
            Some(parent) if !parent.is_complete() => {
                return Err(ModelError::BadKey(format!(
                    "Parent key {} must be complete.",
                    parent
                )))
            }
            Some(parent) => parent.path.clone(),
            None => Vec::new(),
        };
        path.push(PathElement {
            kind: kind.to_string(),
            id: None,
        });
        Ok(Key { path })
    }

    pub fn path(&self) -> &[PathElement] {
        &self.path
    }

    /// Kind of the addressed entity
    pub fn kind(&self) -> &str {
        self.path.last().map(|element| element.kind.as_str()).unwrap_or("")
    }

    pub fn id_or_name(&self) -> Option<&KeyId> {
        self.path.last().and_then(|element| element.id.as_ref())
    }

    pub fn id(&self) -> Option<i64> {
        match self.id_or_name() {
            Some(KeyId::Id(id)) => Some(*id),
            _ => None,
        }
    }

    pub fn name(&self) -> Option<&str> {
        match self.id_or_name() {
            Some(KeyId::Name(name)) => Some(name.as_str()),
            _ => None,
        }
    }

    pub fn has_id_or_name(&self) -> bool {
        self.id_or_name().is_some()
    }

    /// Whether every element of the path carries an identifier
    pub fn is_complete(&self) -> bool {
        !self.path.is_empty() && self.path.iter().all(|element| element.id.is_some())
    }

    pub fn parent(&self) -> Option<Key> {
        if self.path.len() < 2 {
            return None;
        }
        Some(Key {
            path: self.path[..self.path.len() - 1].to_vec(),
        })
    }

    /// Root of the entity group this key belongs to
    pub fn root(&self) -> Key {
        Key {
            path: self.path.iter().take(1).cloned().collect(),
        }
    }

    /// Complete an incomplete key with a numeric id
    pub fn with_id(&self, id: i64) -> Key {
        let mut key = self.clone();
        if let Some(last) = key.path.last_mut() {
            last.id = Some(KeyId::Id(id));
        }
        key
    }

    /// Whether this key is `other` or one of its ancestors
    pub fn is_ancestor_of(&self, other: &Key) -> bool {
        other.path.len() >= self.path.len() && other.path[..self.path.len()] == self.path[..]
    }

    /// Opaque, URL-safe textual form
    pub fn encode(&self) -> ModelResult<String> {
        let raw = serde_json::to_vec(&self.path)?;
        Ok(URL_SAFE.encode(raw))
    }

    pub fn decode(encoded: &str) -> ModelResult<Key> {
        let raw = URL_SAFE
            .decode(encoded.trim())
            .map_err(|e| ModelError::BadKey(format!("Invalid string key {}: {}", encoded, e)))?;
        let path: Vec<PathElement> = serde_json::from_slice(&raw)
            .map_err(|e| ModelError::BadKey(format!("Invalid string key {}: {}", encoded, e)))?;
        if path.is_empty() || path[..path.len() - 1].iter().any(|e| e.id.is_none()) {
            return Err(ModelError::BadKey(format!(
                "Invalid string key {}: malformed path",
                encoded
            )));
        }
        Ok(Key { path })
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .path
            .iter()
            .map(|element| match &element.id {
                Some(id) => format!("{}({})", element.kind, id),
                None => format!("{}(?)", element.kind),
            })
            .collect();
        write!(f, "Key[{}]", parts.join("/"))
    }
}

/// Anything that may stand in for a key: keys themselves and model instances
pub trait AsKey {
    /// The key, failing with a not-saved error when none exists yet
    fn as_key(&self) -> ModelResult<Key>;
}

impl AsKey for Key {
    fn as_key(&self) -> ModelResult<Key> {
        Ok(self.clone())
    }
}

impl<T: AsKey + ?Sized> AsKey for &T {
    fn as_key(&self) -> ModelResult<Key> {
        (**self).as_key()
    }
}

/// Conversion from a key or its encoded string form
pub trait IntoKey {
    fn into_key(self) -> ModelResult<Key>;
}

impl IntoKey for Key {
    fn into_key(self) -> ModelResult<Key> {
        Ok(self)
    }
}

impl IntoKey for &Key {
    fn into_key(self) -> ModelResult<Key> {
        Ok(self.clone())
    }
}

impl IntoKey for &str {
    fn into_key(self) -> ModelResult<Key> {
        Key::decode(self)
    }
}

impl IntoKey for String {
    fn into_key(self) -> ModelResult<Key> {
        Key::decode(&self)
    }
}
