//! Scalar property rules: type checks, coercion, and per-type constraints

use url::Url;

use super::PropertyKind;
use crate::error::{ModelError, ModelResult};
use crate::value::{GeoPt, Im, Value};

/// Longest short string or byte string that may be stored indexed
pub const MAX_INDEXED_BYTES: usize = 500;

pub const MIN_RATING: i64 = 0;
pub const MAX_RATING: i64 = 100;

fn type_error(name: &str, expected: &str, value: &Value) -> ModelError {
    ModelError::Validation(format!(
        "Property {} must be a {}, not a {}",
        name,
        expected,
        value.value_type()
    ))
}

fn conversion_error(name: &str, target: &str, value: &Value) -> ModelError {
    ModelError::Validation(format!(
        "Property {} must be convertible to a {} instance ({})",
        name,
        target,
        value.value_type()
    ))
}

/// Convert `value` to the native type of `kind`
pub(super) fn coerce(name: &str, kind: &PropertyKind, value: Value) -> ModelResult<Value> {
    match kind {
        PropertyKind::String { .. } => match value {
            Value::String(_) => Ok(value),
            other => match other.as_str() {
                Some(text) => Ok(Value::String(text.to_string())),
                None => Err(ModelError::Validation(format!(
                    "Property {} must be a str or unicode instance, not a {}",
                    name,
                    other.value_type()
                ))),
            },
        },
        PropertyKind::Text => text_like(name, "Text", value, Value::Text),
        PropertyKind::Category => text_like(name, "Category", value, Value::Category),
        PropertyKind::Link => text_like(name, "Link", value, Value::Link),
        PropertyKind::Email => text_like(name, "Email", value, Value::Email),
        PropertyKind::PhoneNumber => text_like(name, "PhoneNumber", value, Value::PhoneNumber),
        PropertyKind::PostalAddress => {
            text_like(name, "PostalAddress", value, Value::PostalAddress)
        }
        PropertyKind::Blob => bytes_like(name, "Blob", value, Value::Blob),
        PropertyKind::ByteString => bytes_like(name, "ByteString", value, Value::ByteString),
        PropertyKind::Integer => match value {
            Value::Integer(_) => Ok(value),
            Value::Rating(i) => Ok(Value::Integer(i)),
            other => Err(ModelError::Validation(format!(
                "Property {} must be an int or long, not a {}",
                name,
                other.value_type()
            ))),
        },
        PropertyKind::Rating => match value {
            Value::Rating(_) => Ok(value),
            Value::Integer(i) => Ok(Value::Rating(i)),
            other => Err(conversion_error(name, "Rating", &other)),
        },
        PropertyKind::Float => match value {
            Value::Float(_) => Ok(value),
            other => Err(type_error(name, "float", &other)),
        },
        PropertyKind::Boolean => match value {
            Value::Boolean(_) => Ok(value),
            other => Err(type_error(name, "bool", &other)),
        },
        PropertyKind::User { .. } => match value {
            Value::User(_) => Ok(value),
            other => Err(type_error(name, "User", &other)),
        },
        PropertyKind::GeoPt => match value {
            Value::GeoPt(_) => Ok(value),
            other => match other.as_str() {
                Some(text) => text.parse::<GeoPt>().map(Value::GeoPt),
                None => Err(conversion_error(name, "GeoPt", &other)),
            },
        },
        PropertyKind::Im => match value {
            Value::Im(_) => Ok(value),
            other => match other.as_str() {
                Some(text) => text.parse::<Im>().map(Value::Im),
                None => Err(conversion_error(name, "IM", &other)),
            },
        },
        other => Err(ModelError::Internal(format!(
            "Property {} of kind {:?} has no scalar coercion",
            name, other
        ))),
    }
}

fn text_like(
    name: &str,
    target: &str,
    value: Value,
    wrap: fn(String) -> Value,
) -> ModelResult<Value> {
    match value.as_str() {
        Some(text) => Ok(wrap(text.to_string())),
        None => Err(conversion_error(name, target, &value)),
    }
}

fn bytes_like(
    name: &str,
    target: &str,
    value: Value,
    wrap: fn(Vec<u8>) -> Value,
) -> ModelResult<Value> {
    match value {
        Value::ByteString(bytes) | Value::Blob(bytes) => Ok(wrap(bytes)),
        other => Err(conversion_error(name, target, &other)),
    }
}

/// Constraints checked after coercion, choices, and the user validator
pub(super) fn check_constraints(name: &str, kind: &PropertyKind, value: &Value) -> ModelResult<()> {
    match (kind, value) {
        (PropertyKind::String { multiline }, Value::String(text)) => {
            if !multiline && text.contains('\n') {
                return Err(ModelError::Validation(format!(
                    "Property {} is not multi-line",
                    name
                )));
            }
            check_length(name, text.len())
        }
        (PropertyKind::ByteString, Value::ByteString(bytes)) => check_length(name, bytes.len()),
        (PropertyKind::Link, Value::Link(link)) => {
            let full = Url::parse(link)
                .map(|url| !url.scheme().is_empty() && url.host().is_some())
                .unwrap_or(false);
            if full {
                Ok(())
            } else {
                Err(ModelError::Validation(format!(
                    "Property {} must be a full URL ('{}')",
                    name, link
                )))
            }
        }
        (PropertyKind::Rating, Value::Rating(rating)) => {
            if (MIN_RATING..=MAX_RATING).contains(rating) {
                Ok(())
            } else {
                Err(ModelError::Validation(format!(
                    "Property {}: rating must be between {} and {}, got {}",
                    name, MIN_RATING, MAX_RATING, rating
                )))
            }
        }
        _ => Ok(()),
    }
}

fn check_length(name: &str, len: usize) -> ModelResult<()> {
    if len > MAX_INDEXED_BYTES {
        return Err(ModelError::Validation(format!(
            "Property {} is {} bytes long; it must be {} or less. Consider Text instead, which can store strings of any length.",
            name, len, MAX_INDEXED_BYTES
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_string_rules() {
        let kind = PropertyKind::String { multiline: false };
        let err = coerce("title", &kind, Value::Integer(1)).unwrap_err();
        assert_eq!(
            err,
            ModelError::Validation("Property title must be a str or unicode instance, not a Integer".into())
        );
        assert_eq!(
            coerce("title", &kind, Value::Text("x".into())).unwrap(),
            Value::String("x".into())
        );

        assert!(check_constraints("title", &kind, &Value::String("a\nb".into())).is_err());
        let multiline = PropertyKind::String { multiline: true };
        assert!(check_constraints("title", &multiline, &Value::String("a\nb".into())).is_ok());

        let long = Value::String("x".repeat(MAX_INDEXED_BYTES + 1));
        assert!(check_constraints("title", &kind, &long).is_err());
    }

    #[test]
    fn test_integer_rejects_bool() {
        let err = coerce("count", &PropertyKind::Integer, Value::Boolean(true)).unwrap_err();
        assert!(matches!(err, ModelError::Validation(msg) if msg.contains("int or long")));
    }

    #[test]
    fn test_coercing_types() {
        assert_eq!(
            coerce("mail", &PropertyKind::Email, "a@b.c".into()).unwrap(),
            Value::Email("a@b.c".into())
        );
        assert_eq!(
            coerce("where", &PropertyKind::GeoPt, "1.5,2.5".into()).unwrap(),
            Value::GeoPt(GeoPt { lat: 1.5, lon: 2.5 })
        );
        assert!(coerce("mail", &PropertyKind::Email, Value::Integer(3)).is_err());
        assert_eq!(
            coerce("chat", &PropertyKind::Im, "xmpp ann@example.com".into()).unwrap(),
            Value::Im(Im::new("xmpp", "ann@example.com").unwrap())
        );
        assert!(coerce("chat", &PropertyKind::Im, "carrier-pigeon ann".into()).is_err());
        assert_eq!(
            coerce("stars", &PropertyKind::Rating, Value::Integer(80)).unwrap(),
            Value::Rating(80)
        );
        assert!(check_constraints("stars", &PropertyKind::Rating, &Value::Rating(101)).is_err());
    }

    #[test]
    fn test_link_requires_full_url() {
        let kind = PropertyKind::Link;
        assert!(check_constraints("home", &kind, &Value::Link("https://example.com/a".into())).is_ok());
        assert!(check_constraints("home", &kind, &Value::Link("example.com".into())).is_err());
        assert!(check_constraints("home", &kind, &Value::Link("mailto:ann@example.com".into())).is_err());
    }

    #[test]
    fn test_byte_types() {
        assert_eq!(
            coerce("data", &PropertyKind::Blob, Value::ByteString(vec![1])).unwrap(),
            Value::Blob(vec![1])
        );
        assert!(coerce("data", &PropertyKind::ByteString, "x".into()).is_err());
    }
}
