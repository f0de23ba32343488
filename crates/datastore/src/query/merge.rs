//! Ordered merge of multi-query results

use std::cmp::Ordering;
use std::collections::HashSet;

use tracing::trace;

use super::types::SortOrder;
use crate::entity::Entity;
use crate::key::Key;

/// Interleave individually sorted result lists by `orders`, keeping the
/// first occurrence of every key
pub fn merge_sorted(results: Vec<Vec<Entity>>, orders: &[SortOrder]) -> Vec<Entity> {
    let total: usize = results.iter().map(Vec::len).sum();
    let mut sources: Vec<std::vec::IntoIter<Entity>> =
        results.into_iter().map(Vec::into_iter).collect();
    let mut heads: Vec<Option<Entity>> = sources.iter_mut().map(Iterator::next).collect();

    let mut seen: HashSet<Key> = HashSet::with_capacity(total);
    let mut merged = Vec::with_capacity(total);

    loop {
        let mut best: Option<usize> = None;
        for (idx, head) in heads.iter().enumerate() {
            let Some(candidate) = head else { continue };
            best = match best {
                Some(current) => match heads[current].as_ref() {
                    Some(leader) if candidate.compare_by(leader, orders) == Ordering::Less => {
                        Some(idx)
                    }
                    _ => Some(current),
                },
                None => Some(idx),
            };
        }

        let Some(idx) = best else { break };
        let next = sources[idx].next();
        if let Some(entity) = std::mem::replace(&mut heads[idx], next) {
            if seen.insert(entity.key().clone()) {
                merged.push(entity);
            }
        }
    }

    trace!("Merged {} results into {}", total, merged.len());
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Value;

    fn story(id: i64, rank: i64) -> Entity {
        let mut entity = Entity::new(Key::from_path(None, "Story", id).unwrap());
        entity.set("rank", Value::Integer(rank));
        entity
    }

    fn ids(entities: &[Entity]) -> Vec<i64> {
        entities.iter().filter_map(|e| e.key().id()).collect()
    }

    #[test]
    fn test_merge_by_order() {
        let orders = vec![SortOrder::asc("rank")];
        let merged = merge_sorted(
            vec![
                vec![story(1, 1), story(3, 5)],
                vec![story(2, 2), story(4, 9)],
            ],
            &orders,
        );
        assert_eq!(ids(&merged), vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_merge_drops_duplicates() {
        let orders = vec![SortOrder::desc("rank")];
        let merged = merge_sorted(
            vec![
                vec![story(4, 9), story(1, 1)],
                vec![story(4, 9), story(2, 2)],
                vec![],
            ],
            &orders,
        );
        assert_eq!(ids(&merged), vec![4, 2, 1]);
    }
}
