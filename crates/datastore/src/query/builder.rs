//! Query Builder - Fluent filter, order, and ancestor construction
//!
//! A query keeps a list of query sets. Each set is a conjunction of filter
//! clauses; the sets are disjoined. Plain operators append a clause to every
//! set. `in` and `!=` cannot be executed natively, so they multiply the sets
//! instead: `in` makes one copy of every set per listed value with an
//! equality clause, `!=` makes two copies with a `<` and a `>` clause.

use std::sync::Arc;

use tracing::trace;

use super::compile::{compile, CompiledQuery};
use super::cursor::Cursor;
use super::filter::{normalize_operand, parse_filter};
use super::types::{FilterClause, OrderDirection, QueryOperator, SortOrder, KEY_SPECIAL_PROPERTY};
use crate::error::{ModelError, ModelResult};
use crate::key::{AsKey, Key};
use crate::schema::Schema;
use crate::value::Value;

/// Sub-query limit of a disjunctive query unless configured otherwise
pub const DEFAULT_MAX_QUERY_SETS: usize = 30;

/// Query over the instances of one schema, or over every kind
#[derive(Debug, Clone)]
pub struct Query {
    schema: Option<Arc<Schema>>,
    query_sets: Vec<Vec<FilterClause>>,
    orders: Vec<SortOrder>,
    ancestor: Option<Key>,
    keys_only: bool,
    compile: bool,
    disjunctive: bool,
    max_query_sets: usize,
    pub(super) cursor: Option<Cursor>,
    pub(super) last_cursor: Option<Cursor>,
    pub(super) last_was_multi: bool,
}

impl Query {
    /// Query over instances of `schema`
    pub fn new(schema: &Arc<Schema>) -> Self {
        Self::with_schema(Some(Arc::clone(schema)))
    }

    /// Query over every kind; only `__key__` filters and ascending `__key__`
    /// order are allowed
    pub fn kindless() -> Self {
        Self::with_schema(None)
    }

    fn with_schema(schema: Option<Arc<Schema>>) -> Self {
        Self {
            schema,
            query_sets: vec![Vec::new()],
            orders: Vec::new(),
            ancestor: None,
            keys_only: false,
            compile: true,
            disjunctive: false,
            max_query_sets: DEFAULT_MAX_QUERY_SETS,
            cursor: None,
            last_cursor: None,
            last_was_multi: false,
        }
    }

    /// Return keys instead of instances
    pub fn keys_only(mut self) -> ModelResult<Self> {
        if self.disjunctive {
            return Err(ModelError::BadQuery(
                "Keys only queries do not support IN or != filters.".to_string(),
            ));
        }
        self.keys_only = true;
        Ok(self)
    }

    /// Whether executions record a cursor
    pub fn compile(mut self, compile: bool) -> Self {
        self.compile = compile;
        self
    }

    pub fn max_query_sets(mut self, max_query_sets: usize) -> Self {
        self.max_query_sets = max_query_sets;
        self
    }

    pub fn schema(&self) -> Option<&Arc<Schema>> {
        self.schema.as_ref()
    }

    pub fn kind(&self) -> Option<&str> {
        self.schema.as_ref().map(|schema| schema.kind())
    }

    pub fn is_keys_only(&self) -> bool {
        self.keys_only
    }

    pub fn is_compiled(&self) -> bool {
        self.compile
    }

    pub fn query_sets(&self) -> &[Vec<FilterClause>] {
        &self.query_sets
    }

    pub fn orders(&self) -> &[SortOrder] {
        &self.orders
    }

    pub fn ancestor_key(&self) -> Option<&Key> {
        self.ancestor.as_ref()
    }

    /// Storage name `property` filters or sorts on
    fn resolve_property(&self, property: &str) -> ModelResult<String> {
        if property == KEY_SPECIAL_PROPERTY {
            return Ok(property.to_string());
        }
        let Some(schema) = &self.schema else {
            return Err(ModelError::BadQuery(format!(
                "Only {} filters are allowed on kindless queries.",
                KEY_SPECIAL_PROPERTY
            )));
        };

        let declared = schema
            .property(property)
            .or_else(|| schema.property_by_storage_name(property));
        match declared {
            Some(declared) if !declared.is_indexed() => Err(ModelError::Property(format!(
                "Property '{}' is not indexed",
                property
            ))),
            Some(declared) => Ok(declared.storage_name().to_string()),
            None if schema.is_expando() => Ok(property.to_string()),
            None => Err(ModelError::Property(format!(
                "Invalid property name '{}'",
                property
            ))),
        }
    }

    /// Add a filter such as `"rank >"` or `"tags in"`
    pub fn filter(mut self, property_operator: &str, value: impl Into<Value>) -> ModelResult<Self> {
        let (property, operator) = parse_filter(property_operator)?;
        let property = self.resolve_property(&property)?;
        let value = value.into();

        match operator {
            QueryOperator::In => {
                if self.keys_only {
                    return Err(ModelError::BadQuery(
                        "Keys only queries do not support IN filters.".to_string(),
                    ));
                }
                let Value::List(values) = value else {
                    return Err(ModelError::Validation(
                        "Argument to the \"in\" operator must be a list".to_string(),
                    ));
                };
                let values: Vec<Value> = values.into_iter().map(normalize_operand).collect();
                check_key_operands(&property, &values)?;
                self.disjoin(&property, &[QueryOperator::Equal], &values)?;
            }
            _ if matches!(value, Value::List(_)) => {
                return Err(ModelError::Validation(
                    "Filtering on lists is not supported".to_string(),
                ));
            }
            QueryOperator::NotEqual => {
                if self.keys_only {
                    return Err(ModelError::BadQuery(
                        "Keys only queries do not support != filters.".to_string(),
                    ));
                }
                let value = normalize_operand(value);
                check_key_operands(&property, std::slice::from_ref(&value))?;
                self.disjoin(
                    &property,
                    &[QueryOperator::LessThan, QueryOperator::GreaterThan],
                    std::slice::from_ref(&value),
                )?;
            }
            operator => {
                let value = normalize_operand(value);
                check_key_operands(&property, std::slice::from_ref(&value))?;
                let clause = FilterClause::new(property, operator, value);
                for query_set in &mut self.query_sets {
                    query_set.push(clause.clone());
                }
            }
        }
        Ok(self)
    }

    /// Filter on the key of a saved instance, or on a key
    pub fn filter_key(self, property_operator: &str, target: impl AsKey) -> ModelResult<Self> {
        let key = target.as_key()?;
        self.filter(property_operator, Value::Key(key))
    }

    /// Add a disjunction of `operators` x `values` on `property`
    pub fn filter_disjunction(
        mut self,
        property: &str,
        operators: &[QueryOperator],
        values: Vec<Value>,
    ) -> ModelResult<Self> {
        let property = self.resolve_property(property)?;
        let values: Vec<Value> = values.into_iter().map(normalize_operand).collect();
        check_key_operands(&property, &values)?;
        self.disjoin(&property, operators, &values)?;
        Ok(self)
    }

    fn disjoin(
        &mut self,
        property: &str,
        operators: &[QueryOperator],
        values: &[Value],
    ) -> ModelResult<()> {
        if operators.iter().any(|op| !op.is_primitive()) {
            return Err(ModelError::BadQuery(
                "Cannot use \"in\" or \"!=\" in a disjunction.".to_string(),
            ));
        }

        let required = self.query_sets.len() * operators.len() * values.len();
        if required > self.max_query_sets {
            return Err(ModelError::BadQuery(format!(
                "Query requires {} sub-queries; at most {} are allowed",
                required, self.max_query_sets
            )));
        }

        let mut query_sets = Vec::with_capacity(required);
        for operator in operators {
            for query_set in &self.query_sets {
                for value in values {
                    let mut expanded = query_set.clone();
                    expanded.push(FilterClause::new(property, *operator, value.clone()));
                    query_sets.push(expanded);
                }
            }
        }
        trace!(
            "Disjunction on {} expanded {} query sets into {}",
            property,
            self.query_sets.len(),
            query_sets.len()
        );
        self.query_sets = query_sets;
        self.disjunctive = true;
        Ok(())
    }

    /// Sort by `property`; a leading `-` sorts descending
    pub fn order(mut self, property: &str) -> ModelResult<Self> {
        let (name, direction) = match property.strip_prefix('-') {
            Some(name) => (name, OrderDirection::Desc),
            None => (property, OrderDirection::Asc),
        };

        if self.schema.is_none()
            && (name != KEY_SPECIAL_PROPERTY || direction != OrderDirection::Asc)
        {
            return Err(ModelError::BadQuery(format!(
                "Only {} ascending orders are supported on kindless queries",
                KEY_SPECIAL_PROPERTY
            )));
        }

        let name = self.resolve_property(name)?;
        self.orders.push(SortOrder::new(name, direction));
        Ok(self)
    }

    /// Restrict results to the subtree rooted at `ancestor`, itself included
    pub fn ancestor(mut self, ancestor: impl AsKey) -> ModelResult<Self> {
        let key = ancestor.as_key()?;
        if !key.has_id_or_name() {
            return Err(ModelError::NotSaved(format!(
                "Ancestor {} has no id or name",
                key
            )));
        }
        self.ancestor = Some(key);
        Ok(self)
    }

    /// Resume the next execution after the position encoded in `token`;
    /// an empty token clears it
    pub fn with_cursor(mut self, token: &str) -> ModelResult<Self> {
        self.cursor = if token.is_empty() {
            None
        } else {
            Some(Cursor::decode(token)?)
        };
        Ok(self)
    }

    /// The primitive queries this builder executes as
    pub fn compiled(&self) -> CompiledQuery {
        compile(
            self.kind(),
            &self.query_sets,
            &self.orders,
            self.ancestor.as_ref(),
            self.keys_only,
            self.cursor.as_ref(),
        )
    }
}

/// Filters on `__key__` only compare against keys
fn check_key_operands(property: &str, values: &[Value]) -> ModelResult<()> {
    if property != KEY_SPECIAL_PROPERTY {
        return Ok(());
    }
    match values.iter().find(|value| !matches!(value, Value::Key(_))) {
        Some(other) => Err(ModelError::BadFilter(format!(
            "{} filter value must be a Key, not a {}",
            KEY_SPECIAL_PROPERTY,
            other.value_type()
        ))),
        None => Ok(()),
    }
}
