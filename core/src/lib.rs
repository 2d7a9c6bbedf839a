//! Positional matching over node-structured entities.
//!
//! Entities (documents) hold cells addressed by node paths such as
//! `[tuple, cell]`. Queries are evaluated by a tree of [`search::NodeScorer`]s
//! that iterate entities and, inside each entity, the nodes where the query
//! matches.

pub mod config;
pub mod error;
pub mod index;
pub mod node;
pub mod numeric;
pub mod query;
pub mod search;
pub mod tokenizer;

pub type EntityId = u32;

pub use config::{FieldConfig, FieldKind, IndexConfig, NodesConfig};
pub use error::{Error, Result};
pub use index::{MemoryIndex, Occurrence, Postings, PostingsProvider};
pub use node::{NodePath, NO_MORE_ENTITIES};
pub use numeric::{NumericType, NumericValue};
pub use query::Query;
pub use search::{collect_matches, NodeMatch, NodeScorer};
