//! List properties
//!
//! Every item of a list property has the declared item type. A missing list
//! is an empty list, never absent, and an empty list is not written to the
//! raw record at all.

use super::temporal;
use crate::error::{ModelError, ModelResult};
use crate::value::{Value, ValueType};

/// Reject item types a list property cannot hold
pub(super) fn check_item_type(item_type: ValueType) -> ModelResult<()> {
    match item_type {
        ValueType::List | ValueType::Null => Err(ModelError::Configuration(format!(
            "Item type {} is not acceptable",
            item_type
        ))),
        _ => Ok(()),
    }
}

fn item_matches(item_type: ValueType, item: &Value) -> bool {
    match item_type {
        ValueType::String => item.as_str().is_some() && !matches!(item, Value::Text(_)),
        ValueType::Integer => matches!(item, Value::Integer(_) | Value::Rating(_)),
        other => item.value_type() == other,
    }
}

fn item_error(name: &str, item_type: ValueType) -> ModelError {
    match item_type {
        ValueType::Integer => {
            ModelError::Validation(format!("Items in the {} list must all be integers.", name))
        }
        other => ModelError::Validation(format!(
            "Items in the {} list must all be {} instances",
            name, other
        )),
    }
}

pub(super) fn coerce(name: &str, item_type: ValueType, value: Value) -> ModelResult<Value> {
    match value {
        Value::List(items) => {
            let items = check_items(name, item_type, items)?;
            Ok(Value::List(items))
        }
        _ => Err(ModelError::Validation(format!(
            "Property {} must be a list",
            name
        ))),
    }
}

fn check_items(name: &str, item_type: ValueType, items: Vec<Value>) -> ModelResult<Vec<Value>> {
    if items.iter().all(|item| item_matches(item_type, item)) {
        Ok(items)
    } else {
        Err(item_error(name, item_type))
    }
}

/// Re-check items right before storage; a missing list counts as empty
pub(super) fn validate_contents(name: &str, item_type: ValueType, value: Value) -> ModelResult<Vec<Value>> {
    match value {
        Value::Null => Ok(Vec::new()),
        Value::List(items) => check_items(name, item_type, items),
        _ => Err(ModelError::Validation(format!(
            "Property {} must be a list",
            name
        ))),
    }
}

pub(super) fn widen_items(value: Value) -> Value {
    match value {
        Value::List(items) => Value::List(items.into_iter().map(temporal::widen).collect()),
        other => other,
    }
}

/// Restore declared item types; a list absent from the record reads as empty
pub(super) fn narrow_items(item_type: ValueType, stored: Value) -> Value {
    let narrow = |item: Value| match (item_type, item) {
        (ValueType::Date, Value::DateTime(dt)) => Value::Date(dt.date()),
        (ValueType::Time, Value::DateTime(dt)) => Value::Time(dt.time()),
        (_, item) => item,
    };
    match stored {
        Value::Null => Value::List(Vec::new()),
        Value::List(items) => Value::List(items.into_iter().map(narrow).collect()),
        single => Value::List(vec![narrow(single)]),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn test_item_types_are_enforced() {
        let ok = coerce("tags", ValueType::String, Value::from(vec!["a", "b"])).unwrap();
        assert_eq!(ok, Value::List(vec!["a".into(), "b".into()]));

        let err = coerce("tags", ValueType::String, Value::from(vec![1i64])).unwrap_err();
        assert_eq!(
            err,
            ModelError::Validation("Items in the tags list must all be String instances".into())
        );

        let err = coerce("counts", ValueType::Integer, Value::from(vec![1.5f64])).unwrap_err();
        assert_eq!(
            err,
            ModelError::Validation("Items in the counts list must all be integers.".into())
        );

        assert!(coerce("tags", ValueType::String, "a".into()).is_err());
    }

    #[test]
    fn test_disallowed_item_types() {
        assert!(check_item_type(ValueType::List).is_err());
        assert!(check_item_type(ValueType::Key).is_ok());
    }

    #[test]
    fn test_missing_list_reads_empty() {
        assert_eq!(narrow_items(ValueType::String, Value::Null), Value::List(vec![]));
        assert_eq!(
            validate_contents("tags", ValueType::String, Value::Null).unwrap(),
            Vec::<Value>::new()
        );
    }

    #[test]
    fn test_date_items_round_trip() {
        let date = NaiveDate::from_ymd_opt(1999, 12, 31).unwrap();
        let stored = widen_items(Value::List(vec![Value::Date(date)]));
        assert_eq!(
            stored,
            Value::List(vec![Value::DateTime(date.and_hms_opt(0, 0, 0).unwrap())])
        );
        assert_eq!(narrow_items(ValueType::Date, stored), Value::List(vec![Value::Date(date)]));
    }
}
