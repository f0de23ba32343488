//! Raw Records - The schemaless shape handed to the storage collaborator
//!
//! An entity is a key, a map from storage name to value, and the set of
//! property names that must not be indexed.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};

use crate::key::Key;
use crate::query::types::{OrderDirection, SortOrder, KEY_SPECIAL_PROPERTY};
use crate::value::Value;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    key: Key,
    properties: BTreeMap<String, Value>,
    unindexed: BTreeSet<String>,
}

impl Entity {
    pub fn new(key: Key) -> Self {
        Self {
            key,
            properties: BTreeMap::new(),
            unindexed: BTreeSet::new(),
        }
    }

    pub fn key(&self) -> &Key {
        &self.key
    }

    pub fn set_key(&mut self, key: Key) {
        self.key = key;
    }

    pub fn kind(&self) -> &str {
        self.key.kind()
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.properties.get(name)
    }

    pub fn set(&mut self, name: impl Into<String>, value: Value) {
        self.properties.insert(name.into(), value);
    }

    pub fn remove(&mut self, name: &str) -> Option<Value> {
        self.properties.remove(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.properties.contains_key(name)
    }

    pub fn properties(&self) -> &BTreeMap<String, Value> {
        &self.properties
    }

    pub fn property_names(&self) -> Vec<String> {
        self.properties.keys().cloned().collect()
    }

    pub fn unindexed_properties(&self) -> &BTreeSet<String> {
        &self.unindexed
    }

    pub fn set_unindexed_properties(&mut self, names: impl IntoIterator<Item = String>) {
        self.unindexed = names.into_iter().collect();
    }

    pub fn is_indexed(&self, name: &str) -> bool {
        !self.unindexed.contains(name)
    }

    /// Indexed value a query may filter or sort on, `__key__` included
    pub fn indexed_value(&self, name: &str) -> Option<Value> {
        if name == KEY_SPECIAL_PROPERTY {
            return Some(Value::Key(self.key.clone()));
        }
        if !self.is_indexed(name) {
            return None;
        }
        self.properties.get(name).cloned()
    }

    /// Value used when sorting in `direction`; lists sort by their smallest
    /// element ascending and their largest descending
    pub fn sort_value(&self, name: &str, direction: OrderDirection) -> Option<Value> {
        match self.indexed_value(name)? {
            Value::List(items) => {
                items.into_iter().reduce(|best, item| {
                    let ordering = item.datastore_cmp(&best);
                    let better = match direction {
                        OrderDirection::Asc => ordering == Ordering::Less,
                        OrderDirection::Desc => ordering == Ordering::Greater,
                    };
                    if better {
                        item
                    } else {
                        best
                    }
                })
            }
            value => Some(value),
        }
    }

    /// Sort values of this entity under `orders`, one slot per order
    pub fn sort_values(&self, orders: &[SortOrder]) -> Vec<Option<Value>> {
        orders
            .iter()
            .map(|order| self.sort_value(&order.property, order.direction))
            .collect()
    }

    /// Compare two entities under `orders`, breaking ties by key
    pub fn compare_by(&self, other: &Entity, orders: &[SortOrder]) -> Ordering {
        compare_positions(
            &self.sort_values(orders),
            &self.key,
            &other.sort_values(orders),
            &other.key,
            orders,
        )
    }
}

/// Compare two result positions; a missing sort value sorts first
pub fn compare_positions(
    left: &[Option<Value>],
    left_key: &Key,
    right: &[Option<Value>],
    right_key: &Key,
    orders: &[SortOrder],
) -> Ordering {
    for ((a, b), order) in left.iter().zip(right.iter()).zip(orders) {
        let ordering = match (a, b) {
            (Some(a), Some(b)) => a.datastore_cmp(b),
            (None, Some(_)) => Ordering::Less,
            (Some(_), None) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        };
        let ordering = match order.direction {
            OrderDirection::Asc => ordering,
            OrderDirection::Desc => ordering.reverse(),
        };
        if ordering != Ordering::Equal {
            return ordering;
        }
    }
    left_key.cmp(right_key)
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
    fn test_compare_by_orders_and_tiebreak() {
        let a = story(1, 5);
        let b = story(2, 3);
        let c = story(3, 5);

        let asc = vec![SortOrder::asc("rank")];
        assert_eq!(a.compare_by(&b, &asc), Ordering::Greater);
        assert_eq!(a.compare_by(&c, &asc), Ordering::Less);

        let desc = vec![SortOrder::desc("rank")];
        assert_eq!(a.compare_by(&b, &desc), Ordering::Less);
    }

    #[test]
    fn test_list_sort_values() {
        let mut entity = story(1, 0);
        entity.set(
            "tags",
            Value::List(vec![Value::Integer(4), Value::Integer(1), Value::Integer(9)]),
        );
        assert_eq!(entity.sort_value("tags", OrderDirection::Asc), Some(Value::Integer(1)));
        assert_eq!(entity.sort_value("tags", OrderDirection::Desc), Some(Value::Integer(9)));
    }

    #[test]
    fn test_unindexed_values_are_hidden() {
        let mut entity = story(1, 0);
        entity.set("body", Value::Text("long".into()));
        entity.set_unindexed_properties(vec!["body".to_string()]);

        assert!(entity.indexed_value("body").is_none());
        assert!(entity.get("body").is_some());
        assert_eq!(
            entity.indexed_value(KEY_SPECIAL_PROPERTY),
            Some(Value::Key(entity.key().clone()))
        );
    }
}
