//! Result Iterator - Typed values from raw records, one at a time

use std::sync::Arc;

use crate::client::Client;
use crate::entity::Entity;
use crate::error::ModelResult;
use crate::key::Key;
use crate::model::Model;
use crate::schema::Schema;

/// Conversion of a raw query record into a result value
pub trait FromRecord: Sized + Send {
    /// Build a result from `entity`; `schema` is the schema the query is
    /// bound to, if any
    fn from_record(client: &Client, schema: Option<&Arc<Schema>>, entity: Entity) -> ModelResult<Self>;
}

impl FromRecord for Model {
    fn from_record(client: &Client, schema: Option<&Arc<Schema>>, entity: Entity) -> ModelResult<Self> {
        match schema {
            Some(schema) if schema.kind() == entity.kind() => Model::from_entity(schema, entity),
            _ => client.model_from_entity(entity),
        }
    }
}

impl FromRecord for Key {
    fn from_record(_client: &Client, _schema: Option<&Arc<Schema>>, entity: Entity) -> ModelResult<Self> {
        Ok(entity.key().clone())
    }
}

impl FromRecord for Entity {
    fn from_record(_client: &Client, _schema: Option<&Arc<Schema>>, entity: Entity) -> ModelResult<Self> {
        Ok(entity)
    }
}

/// Single-pass iterator over query results
pub struct ResultIterator<T> {
    client: Client,
    schema: Option<Arc<Schema>>,
    records: std::vec::IntoIter<Entity>,
    _marker: std::marker::PhantomData<fn() -> T>,
}

impl<T: FromRecord> ResultIterator<T> {
    pub(crate) fn new(client: Client, schema: Option<Arc<Schema>>, records: Vec<Entity>) -> Self {
        Self {
            client,
            schema,
            records: records.into_iter(),
            _marker: std::marker::PhantomData,
        }
    }
}

impl<T: FromRecord> Iterator for ResultIterator<T> {
    type Item = ModelResult<T>;

    fn next(&mut self) -> Option<Self::Item> {
        let entity = self.records.next()?;
        Some(T::from_record(&self.client, self.schema.as_ref(), entity))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.records.size_hint()
    }
}
