//! Date and time properties
//!
//! Dates and times of day are stored as full timestamps: a date at 00:00 and
//! a time of day on 1970-01-01. Reads convert back to the declared type.

use chrono::{NaiveTime, Utc};

use super::PropertyKind;
use crate::error::{ModelError, ModelResult};
use crate::value::{epoch_date, Value};

/// Automatic timestamp options
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AutoTime {
    /// Recompute on every write
    pub auto_now: bool,
    /// Use the creation time as the default
    pub auto_now_add: bool,
}

/// Current time in the shape the property kind holds
pub(super) fn now(kind: &PropertyKind) -> Value {
    let now = Utc::now().naive_utc();
    match kind {
        PropertyKind::Date(_) => Value::Date(now.date()),
        PropertyKind::Time(_) => Value::Time(now.time()),
        _ => Value::DateTime(now),
    }
}

pub(super) fn coerce(name: &str, kind: &PropertyKind, value: Value) -> ModelResult<Value> {
    match (kind, value) {
        (PropertyKind::DateTime(_), value @ Value::DateTime(_)) => Ok(value),
        (PropertyKind::Date(_), value @ Value::Date(_)) => Ok(value),
        (PropertyKind::Date(_), Value::DateTime(_)) => Err(ModelError::Validation(format!(
            "Property {} must be a date, not a datetime",
            name
        ))),
        (PropertyKind::Time(_), value @ Value::Time(_)) => Ok(value),
        (kind, other) => Err(ModelError::Validation(format!(
            "Property {} must be a {}, not a {}",
            name,
            kind.data_type(),
            other.value_type()
        ))),
    }
}

/// Storage form of a date or time of day
pub fn widen(value: Value) -> Value {
    match value {
        Value::Date(_) | Value::Time(_) => value.as_datetime().map(Value::DateTime).unwrap_or(value),
        other => other,
    }
}

/// Declared form of a stored timestamp
pub(super) fn narrow(kind: &PropertyKind, stored: Value) -> Value {
    match (kind, stored) {
        (PropertyKind::Date(_), Value::DateTime(dt)) => Value::Date(dt.date()),
        (PropertyKind::Time(_), Value::DateTime(dt)) => Value::Time(dt.time()),
        (_, other) => other,
    }
}

/// Timestamp of a time of day on the storage anchor date
pub fn time_anchor(time: NaiveTime) -> Value {
    Value::DateTime(epoch_date().and_time(time))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn test_date_rejects_datetime() {
        let kind = PropertyKind::Date(AutoTime::default());
        let dt = NaiveDate::from_ymd_opt(2020, 1, 2)
            .unwrap()
            .and_hms_opt(3, 4, 5)
            .unwrap();
        let err = coerce("day", &kind, Value::DateTime(dt)).unwrap_err();
        assert_eq!(
            err,
            ModelError::Validation("Property day must be a date, not a datetime".into())
        );
    }

    #[test]
    fn test_time_round_trip() {
        let kind = PropertyKind::Time(AutoTime::default());
        let time = NaiveTime::from_hms_micro_opt(23, 59, 58, 123_456).unwrap();
        let stored = widen(Value::Time(time));
        assert_eq!(stored, time_anchor(time));
        assert_eq!(narrow(&kind, stored), Value::Time(time));
    }

    #[test]
    fn test_now_shapes() {
        assert!(matches!(now(&PropertyKind::Date(AutoTime::default())), Value::Date(_)));
        assert!(matches!(now(&PropertyKind::Time(AutoTime::default())), Value::Time(_)));
        assert!(matches!(
            now(&PropertyKind::DateTime(AutoTime::default())),
            Value::DateTime(_)
        ));
    }
}
