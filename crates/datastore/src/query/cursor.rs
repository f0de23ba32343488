//! Query cursors
//!
//! A cursor records the sort position of the last result a query returned.
//! Resuming skips every result at or before that position, so a cursor stays
//! meaningful across writes that happen between the two executions.

use std::cmp::Ordering;

use base64::engine::general_purpose::URL_SAFE;
use base64::Engine;
use serde::{Deserialize, Serialize};

use crate::entity::{compare_positions, Entity};
use crate::error::{ModelError, ModelResult};
use crate::key::Key;
use crate::query::types::SortOrder;
use crate::value::Value;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Position {
    values: Vec<Option<Value>>,
    key: Key,
}

/// Resumption point within an ordered result sequence
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Cursor {
    position: Option<Position>,
}

impl Cursor {
    /// Position before the first result
    pub fn start() -> Self {
        Self::default()
    }

    /// Position right after `entity`
    pub fn after(entity: &Entity, orders: &[SortOrder]) -> Self {
        Self {
            position: Some(Position {
                values: entity.sort_values(orders),
                key: entity.key().clone(),
            }),
        }
    }

    pub fn is_start(&self) -> bool {
        self.position.is_none()
    }

    /// Whether `entity` comes after this position
    pub fn precedes(&self, entity: &Entity, orders: &[SortOrder]) -> bool {
        match &self.position {
            None => true,
            Some(position) => {
                compare_positions(
                    &entity.sort_values(orders),
                    entity.key(),
                    &position.values,
                    &position.key,
                    orders,
                ) == Ordering::Greater
            }
        }
    }

    /// Opaque URL-safe token
    pub fn encode(&self) -> ModelResult<String> {
        Ok(URL_SAFE.encode(serde_json::to_vec(self)?))
    }

    pub fn decode(token: &str) -> ModelResult<Cursor> {
        let invalid = |details: String| {
            ModelError::Validation(format!("Invalid cursor {}. Details: {}", token, details))
        };
        let raw = URL_SAFE
            .decode(token.trim())
            .map_err(|e| invalid(e.to_string()))?;
        serde_json::from_slice(&raw).map_err(|e| invalid(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn story(id: i64, rank: i64) -> Entity {
        let mut entity = Entity::new(Key::from_path(None, "Story", id).unwrap());
        entity.set("rank", Value::Integer(rank));
        entity
    }

    #[test]
    fn test_position_ordering() {
        let orders = vec![SortOrder::desc("rank")];
        let cursor = Cursor::after(&story(2, 5), &orders);

        assert!(cursor.precedes(&story(3, 4), &orders));
        assert!(cursor.precedes(&story(3, 5), &orders));
        assert!(!cursor.precedes(&story(2, 5), &orders));
        assert!(!cursor.precedes(&story(1, 9), &orders));
        assert!(Cursor::start().precedes(&story(1, 9), &orders));
    }

    #[test]
    fn test_token_round_trip() {
        let cursor = Cursor::after(&story(2, 5), &[SortOrder::asc("rank")]);
        let token = cursor.encode().unwrap();
        assert_eq!(Cursor::decode(&token).unwrap(), cursor);
    }

    #[test]
    fn test_corrupt_token() {
        assert!(matches!(
            Cursor::decode("%%%").unwrap_err(),
            ModelError::Validation(msg) if msg.starts_with("Invalid cursor %%%")
        ));
        let not_json = URL_SAFE.encode(b"not json");
        assert!(matches!(
            Cursor::decode(&not_json).unwrap_err(),
            ModelError::Validation(_)
        ));
    }
}
