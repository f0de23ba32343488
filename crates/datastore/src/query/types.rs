//! Query Builder Types - Core types and enums for query building

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

use crate::error::{ModelError, ModelResult};
use crate::value::Value;

/// Reserved pseudo-property addressing the entity key
pub const KEY_SPECIAL_PROPERTY: &str = "__key__";

/// Query operator types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum QueryOperator {
    Equal,
    NotEqual,
    GreaterThan,
    GreaterThanOrEqual,
    LessThan,
    LessThanOrEqual,
    In,
}

impl fmt::Display for QueryOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueryOperator::Equal => write!(f, "="),
            QueryOperator::NotEqual => write!(f, "!="),
            QueryOperator::GreaterThan => write!(f, ">"),
            QueryOperator::GreaterThanOrEqual => write!(f, ">="),
            QueryOperator::LessThan => write!(f, "<"),
            QueryOperator::LessThanOrEqual => write!(f, "<="),
            QueryOperator::In => write!(f, "in"),
        }
    }
}

impl QueryOperator {
    /// Parse an operator token; `==` is accepted as a synonym for `=`
    pub fn parse(token: &str) -> ModelResult<Self> {
        match token.to_lowercase().as_str() {
            "=" | "==" => Ok(QueryOperator::Equal),
            "!=" => Ok(QueryOperator::NotEqual),
            ">" => Ok(QueryOperator::GreaterThan),
            ">=" => Ok(QueryOperator::GreaterThanOrEqual),
            "<" => Ok(QueryOperator::LessThan),
            "<=" => Ok(QueryOperator::LessThanOrEqual),
            "in" => Ok(QueryOperator::In),
            other => Err(ModelError::BadFilter(format!(
                "Filter operator '{}' is not supported",
                other
            ))),
        }
    }

    /// Whether the storage collaborator can evaluate this operator natively
    pub fn is_primitive(&self) -> bool {
        !matches!(self, QueryOperator::NotEqual | QueryOperator::In)
    }

    pub fn is_inequality(&self) -> bool {
        matches!(
            self,
            QueryOperator::GreaterThan
                | QueryOperator::GreaterThanOrEqual
                | QueryOperator::LessThan
                | QueryOperator::LessThanOrEqual
        )
    }

    /// Evaluate `stored <op> operand` for a single stored value
    pub fn matches(&self, stored: &Value, operand: &Value) -> bool {
        if let Value::List(items) = stored {
            return items.iter().any(|item| self.matches(item, operand));
        }
        if let (QueryOperator::In, Value::List(choices)) = (self, operand) {
            return choices
                .iter()
                .any(|choice| QueryOperator::Equal.matches(stored, choice));
        }
        if !stored.same_family(operand) {
            return false;
        }
        let ordering = stored.datastore_cmp(operand);
        match self {
            QueryOperator::Equal | QueryOperator::In => ordering == Ordering::Equal,
            QueryOperator::NotEqual => ordering != Ordering::Equal,
            QueryOperator::GreaterThan => ordering == Ordering::Greater,
            QueryOperator::GreaterThanOrEqual => ordering != Ordering::Less,
            QueryOperator::LessThan => ordering == Ordering::Less,
            QueryOperator::LessThanOrEqual => ordering != Ordering::Greater,
        }
    }
}

/// One conjunctive filter clause of a primitive query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterClause {
    /// Storage name of the filtered property, or `__key__`
    pub property: String,
    pub operator: QueryOperator,
    pub value: Value,
}

impl FilterClause {
    pub fn new(property: impl Into<String>, operator: QueryOperator, value: Value) -> Self {
        Self {
            property: property.into(),
            operator,
            value,
        }
    }
}

impl fmt::Display for FilterClause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.property, self.operator, self.value)
    }
}

/// Order by direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OrderDirection {
    Asc,
    Desc,
}

impl fmt::Display for OrderDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderDirection::Asc => write!(f, "ASC"),
            OrderDirection::Desc => write!(f, "DESC"),
        }
    }
}

/// Sort order on one property
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SortOrder {
    pub property: String,
    pub direction: OrderDirection,
}

impl SortOrder {
    pub fn new(property: impl Into<String>, direction: OrderDirection) -> Self {
        Self {
            property: property.into(),
            direction,
        }
    }

    pub fn asc(property: impl Into<String>) -> Self {
        Self::new(property, OrderDirection::Asc)
    }

    pub fn desc(property: impl Into<String>) -> Self {
        Self::new(property, OrderDirection::Desc)
    }
}
