//! Query Execution - Terminal operations of the query builder
//!
//! Single-set queries run as one primitive query. Multi-set queries run every
//! sub-query far enough to cover the requested window and merge the results
//! by the shared ordering, dropping duplicate keys.

use std::ops::{Bound, RangeBounds};

use tracing::debug;

use super::builder::Query;
use super::compile::CompiledQuery;
use super::cursor::Cursor;
use super::iterator::{FromRecord, ResultIterator};
use super::merge::merge_sorted;
use crate::client::Client;
use crate::datastore::FetchOptions;
use crate::entity::Entity;
use crate::error::{ModelError, ModelResult};

impl Query {
    fn record_execution(&mut self, cursor: Option<Cursor>, multi: bool) {
        if self.is_compiled() {
            self.last_cursor = cursor;
            self.last_was_multi = multi;
        }
    }

    async fn fetch_entities(
        &mut self,
        client: &Client,
        limit: Option<usize>,
        offset: usize,
    ) -> ModelResult<Vec<Entity>> {
        let options = client.call_options();
        match self.compiled() {
            CompiledQuery::Single(raw) => {
                let results = client
                    .datastore()
                    .run_query(&raw, &FetchOptions::new(limit, offset), &options)
                    .await?;
                self.record_execution(results.cursor, false);
                Ok(results.entities)
            }
            CompiledQuery::Multi { queries, orders } => {
                if self.cursor.is_some() {
                    return Err(ModelError::BadQuery(
                        "Cursors are not supported for queries with disjunctive filters".to_string(),
                    ));
                }
                let window = limit.map(|limit| limit.saturating_add(offset));
                let mut results = Vec::with_capacity(queries.len());
                for raw in &queries {
                    let found = client
                        .datastore()
                        .run_query(raw, &FetchOptions::new(window, 0), &options)
                        .await?;
                    results.push(found.entities);
                }
                debug!("Merging results of {} sub-queries", queries.len());
                let merged = merge_sorted(results, &orders);
                self.record_execution(None, true);
                Ok(merged
                    .into_iter()
                    .skip(offset)
                    .take(limit.unwrap_or(usize::MAX))
                    .collect())
            }
        }
    }

    /// Every result. Records are fetched in one call up front; the iterator
    /// only defers converting each record until it is reached
    pub async fn run<T: FromRecord>(&mut self, client: &Client) -> ModelResult<ResultIterator<T>> {
        let entities = self.fetch_entities(client, None, 0).await?;
        Ok(ResultIterator::new(
            client.clone(),
            self.schema().cloned(),
            entities,
        ))
    }

    /// Up to `limit` results after skipping `offset`
    pub async fn fetch<T: FromRecord>(
        &mut self,
        client: &Client,
        limit: usize,
        offset: usize,
    ) -> ModelResult<Vec<T>> {
        if limit == 0 {
            return Ok(Vec::new());
        }
        let entities = self.fetch_entities(client, Some(limit), offset).await?;
        let schema = self.schema().cloned();
        entities
            .into_iter()
            .map(|entity| T::from_record(client, schema.as_ref(), entity))
            .collect()
    }

    /// Number of results, stopping at `limit`
    pub async fn count(&mut self, client: &Client, limit: Option<usize>) -> ModelResult<usize> {
        let options = client.call_options();
        let count = match self.compiled() {
            CompiledQuery::Single(raw) => client.datastore().count(&raw, limit, &options).await?,
            CompiledQuery::Multi { .. } => self.fetch_entities(client, limit, 0).await?.len(),
        };
        self.last_cursor = None;
        self.last_was_multi = false;
        Ok(count)
    }

    /// First result, if any
    pub async fn get<T: FromRecord>(&mut self, client: &Client) -> ModelResult<Option<T>> {
        let mut results = self.fetch(client, 1, 0).await?;
        Ok(results.pop())
    }

    /// Result at position `index`
    pub async fn nth<T: FromRecord>(&mut self, client: &Client, index: usize) -> ModelResult<T> {
        let mut results = self.fetch(client, 1, index).await?;
        results.pop().ok_or_else(|| {
            ModelError::IndexOutOfRange(format!(
                "The query returned fewer than {} results",
                index + 1
            ))
        })
    }

    /// Results in `range`; the range must have an end
    pub async fn slice<T: FromRecord>(
        &mut self,
        client: &Client,
        range: impl RangeBounds<usize>,
    ) -> ModelResult<Vec<T>> {
        let start = match range.start_bound() {
            Bound::Included(&start) => start,
            Bound::Excluded(&start) => start.saturating_add(1),
            Bound::Unbounded => 0,
        };
        let stop = match range.end_bound() {
            Bound::Excluded(&stop) => stop,
            Bound::Included(&stop) => stop.saturating_add(1),
            Bound::Unbounded => {
                return Err(ModelError::BadArgument(
                    "Open-ended slices are not supported".to_string(),
                ))
            }
        };
        if stop <= start {
            return Ok(Vec::new());
        }
        self.fetch(client, stop - start, start).await
    }

    /// Token resuming after the last result of the most recent execution
    pub fn cursor(&self) -> ModelResult<String> {
        if !self.is_compiled() {
            return Err(ModelError::BadQuery(
                "Query must be compiled to produce cursors".to_string(),
            ));
        }
        if self.last_was_multi {
            return Err(ModelError::BadQuery(
                "Cursors are not supported for queries with disjunctive filters".to_string(),
            ));
        }
        self.last_cursor
            .as_ref()
            .ok_or_else(|| ModelError::BadQuery("No cursor available.".to_string()))?
            .encode()
    }
}
