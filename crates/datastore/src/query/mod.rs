//! Query Builder & Compiler
//!
//! ```rust,ignore
//! let mut recent = Query::new(&story)
//!     .filter("rank >", 3)?
//!     .filter("tags in", vec!["rust", "db"])?
//!     .order("-rank")?;
//! let stories: Vec<Model> = recent.fetch(&client, 10, 0).await?;
//! ```

pub mod builder;
pub mod compile;
pub mod cursor;
pub mod execution;
pub mod filter;
pub mod iterator;
pub mod merge;
pub mod types;

pub use builder::{Query, DEFAULT_MAX_QUERY_SETS};
pub use compile::{CompiledQuery, RawQuery};
pub use cursor::Cursor;
pub use iterator::{FromRecord, ResultIterator};
pub use types::{FilterClause, OrderDirection, QueryOperator, SortOrder, KEY_SPECIAL_PROPERTY};
