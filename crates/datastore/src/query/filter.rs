//! Filter strings and filter operands

use once_cell::sync::Lazy;
use regex::{Regex, RegexBuilder};

use super::types::QueryOperator;
use crate::error::{ModelError, ModelResult};
use crate::property::temporal;
use crate::value::Value;

static FILTER_REGEX: Lazy<Result<Regex, regex::Error>> = Lazy::new(|| {
    RegexBuilder::new(r"^\s*([^\s]+)(\s+(<=|>=|<|>|==|=|!=|in)\s*)?$")
        .case_insensitive(true)
        .build()
});

/// Split `"<property> <op>"` into its parts; the operator defaults to `=`
pub fn parse_filter(property_operator: &str) -> ModelResult<(String, QueryOperator)> {
    let regex = FILTER_REGEX
        .as_ref()
        .map_err(|e| ModelError::Internal(format!("Invalid filter pattern: {}", e)))?;

    let captures = regex.captures(property_operator).ok_or_else(|| {
        ModelError::BadFilter(format!(
            "Could not parse filter string: {}",
            property_operator
        ))
    })?;

    let property = captures
        .get(1)
        .map(|m| m.as_str().to_string())
        .unwrap_or_default();
    let operator = match captures.get(3) {
        Some(op) => QueryOperator::parse(op.as_str())?,
        None => QueryOperator::Equal,
    };
    Ok((property, operator))
}

/// Widen dates and times to the timestamps they are stored as
pub fn normalize_operand(value: Value) -> Value {
    temporal::widen(value)
}
