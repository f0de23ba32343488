//! Reverse collections
//!
//! Every reference property targeting a kind generates a read-only
//! collection on that kind. The collection is a query over the referencing
//! kind filtered on the reference property equal to the owner's key.

use crate::client::Client;
use crate::error::{ModelError, ModelResult};
use crate::model::Model;
use crate::query::Query;
use crate::schema::ReverseReference;
use crate::value::Value;

impl Model {
    /// Query over the instances referencing this one through `collection`
    pub fn reverse_collection(&self, client: &Client, collection: &str) -> ModelResult<Query> {
        let reverse = self.find_reverse_reference(client, collection)?;
        let source = client.registry().class_for_kind(&reverse.source_kind)?;
        let key = self.key()?;
        Query::new(&source)
            .max_query_sets(client.config().max_query_sets)
            .filter(&format!("{} =", reverse.property), Value::Key(key))
    }

    /// Names of the reverse collections available on this instance
    pub fn reverse_collections(&self, client: &Client) -> Vec<String> {
        let mut names: Vec<String> = std::iter::once(self.kind())
            .chain(self.schema().ancestry().iter().map(String::as_str))
            .flat_map(|kind| client.registry().reverse_references_for(kind).into_keys())
            .collect();
        names.sort();
        names.dedup();
        names
    }

    fn find_reverse_reference(&self, client: &Client, collection: &str) -> ModelResult<ReverseReference> {
        std::iter::once(self.kind())
            .chain(self.schema().ancestry().iter().map(String::as_str))
            .find_map(|kind| client.registry().reverse_reference(kind, collection))
            .ok_or_else(|| {
                ModelError::Property(format!(
                    "{} has no collection {}",
                    self.kind(),
                    collection
                ))
            })
    }
}
