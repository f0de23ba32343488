//! # elif-datastore: Object mapping over a schemaless entity store
//!
//! Declared schemas of typed properties, model instances validated against
//! them, keys and references between instances, and a query builder that
//! compiles `in` and `!=` filters into several primitive queries merged
//! back into one ordered result.
//!
//! Storage itself sits behind the [`Datastore`] trait; [`MemoryDatastore`]
//! is the in-process implementation used by the tests.

pub mod client;
pub mod config;
pub mod datastore;
pub mod entity;
pub mod error;
pub mod key;
pub mod model;
pub mod property;
pub mod query;
pub mod relationships;
pub mod schema;
pub mod users;
pub mod value;

// Re-export core types
pub use client::Client;
pub use config::{ConfigError, DatastoreConfig, ReadPolicy};
pub use datastore::{CallOptions, Datastore, FetchOptions, MemoryDatastore, QueryResults, TransactionWork};
pub use entity::Entity;
pub use error::{ModelError, ModelResult};
pub use key::{AsKey, IntoKey, Key, KeyId};
pub use model::{Identity, Model, ModelBuilder};
pub use property::{AutoTime, Property, PropertyKind, ReferenceConfig, ReferenceTarget, Validator};
pub use query::{
    CompiledQuery, Cursor, FilterClause, FromRecord, OrderDirection, Query, QueryOperator,
    RawQuery, ResultIterator, SortOrder,
};
pub use schema::{KindRegistry, ReverseReference, Schema, SchemaBuilder};
pub use users::{AnonymousUsers, StaticUsers, UserService};
pub use value::{GeoPt, Im, User, Value, ValueType};

pub mod prelude {
    pub use crate::client::Client;
    pub use crate::error::{ModelError, ModelResult};
    pub use crate::key::{AsKey, IntoKey, Key};
    pub use crate::model::Model;
    pub use crate::property::Property;
    pub use crate::query::{OrderDirection, Query, QueryOperator};
    pub use crate::schema::{Schema, SchemaBuilder};
    pub use crate::value::Value;
}
