//! Postings collaborator: the streams of `(entity, node)` occurrences that
//! leaf scorers read, plus an in-memory index producing them.

use std::collections::BTreeMap;
use std::ops::Bound;

use tracing::debug;

use crate::config::{AnalyzerConfig, FieldConfig, FieldKind, IndexConfig};
use crate::error::{Error, Result};
use crate::node::{NodePath, NO_MORE_ENTITIES};
use crate::numeric::{NumericTokens, NumericValue};
use crate::search::TermScorer;
use crate::tokenizer::tokenize_cell;
use crate::EntityId;

/// One occurrence of a term in a node of an entity.
#[derive(Debug, Clone, PartialEq)]
pub struct Occurrence {
    pub entity: EntityId,
    pub node: NodePath,
    pub weight: f32,
}

/// Stream of occurrences for one term, ordered by entity then node.
/// Returns `Ok(None)` once drained, on every later call too.
pub trait Postings {
    fn next_occurrence(&mut self) -> Result<Option<Occurrence>>;
}

/// Owned postings, mostly for tests and ad-hoc streams.
#[derive(Debug)]
pub struct VecPostings {
    inner: std::vec::IntoIter<Occurrence>,
}

impl VecPostings {
    pub fn new(occurrences: Vec<Occurrence>) -> Self {
        Self { inner: occurrences.into_iter() }
    }
}

impl Postings for VecPostings {
    fn next_occurrence(&mut self) -> Result<Option<Occurrence>> {
        Ok(self.inner.next())
    }
}

/// Postings borrowed from a [`MemoryIndex`].
#[derive(Debug)]
pub struct SlicePostings<'a> {
    inner: std::slice::Iter<'a, Occurrence>,
}

impl Postings for SlicePostings<'_> {
    fn next_occurrence(&mut self) -> Result<Option<Occurrence>> {
        Ok(self.inner.next().cloned())
    }
}

/// Term dictionary and postings lookup, keyed by field.
pub trait PostingsProvider {
    fn field_config(&self, field: &str) -> Result<&FieldConfig>;

    /// Analysis applied to text cells, reused for query terms.
    fn analyzer(&self) -> &AnalyzerConfig;

    /// `None` when the term does not occur in the field.
    fn postings<'a>(&'a self, field: &str, term: &[u8]) -> Result<Option<Box<dyn Postings + 'a>>>;

    /// Terms in `[lower, upper]`, in byte order.
    fn terms_between(&self, field: &str, lower: &[u8], upper: &[u8]) -> Result<Vec<Vec<u8>>>;

    fn terms_with_prefix(&self, field: &str, prefix: &[u8]) -> Result<Vec<Vec<u8>>>;
}

/// Leaf scorer for `term` in `field`, `None` when the term has no postings.
pub fn term_scorer<'a>(
    provider: &'a dyn PostingsProvider,
    field: &str,
    term: &[u8],
) -> Result<Option<TermScorer<'a>>> {
    let nodes = provider.field_config(field)?.nodes;
    Ok(provider.postings(field, term)?.map(|postings| TermScorer::new(postings, nodes)))
}

type TermMap = BTreeMap<Vec<u8>, Vec<Occurrence>>;

/// Index held in memory. Occurrence lists are kept sorted on insert; adding
/// the same term twice to a node adds up the weights.
#[derive(Debug, Clone, Default)]
pub struct MemoryIndex {
    config: IndexConfig,
    fields: BTreeMap<String, TermMap>,
}

impl MemoryIndex {
    pub fn new(config: IndexConfig) -> Self {
        Self { config, fields: BTreeMap::new() }
    }

    /// Analyzes `text` and indexes every token at `node`.
    pub fn add_text(&mut self, field: &str, entity: EntityId, node: NodePath, text: &str) -> Result<()> {
        let field_config = self.config.field(field)?;
        if field_config.kind != FieldKind::Text {
            return Err(Error::FieldKind { field: field.to_string(), expected: "text" });
        }
        field_config.nodes.check_depth(node.len())?;
        let tokens = tokenize_cell(text, &self.config.analyzer);
        for token in tokens {
            self.insert(field, token.into_bytes(), entity, &node, 1.0)?;
        }
        Ok(())
    }

    /// Indexes the precision-step terms of `value` at `node`.
    pub fn add_numeric(&mut self, field: &str, entity: EntityId, node: NodePath, value: NumericValue) -> Result<()> {
        let field_config = self.config.field(field)?;
        let (numeric_type, step) = field_config.numeric_encoding(field)?;
        if value.numeric_type() != numeric_type {
            return Err(Error::NumericTypeMismatch {
                field: field.to_string(),
                expected: numeric_type,
                found: value.numeric_type(),
            });
        }
        field_config.nodes.check_depth(node.len())?;
        for token in NumericTokens::new(value, step) {
            self.insert(field, token.term, entity, &node, 1.0)?;
        }
        Ok(())
    }

    /// Indexes tuples of cells: cell `c` of tuple `t` lands on node `[t, c]`.
    pub fn add_tuples<T, C>(&mut self, field: &str, entity: EntityId, tuples: T) -> Result<()>
    where
        T: IntoIterator<Item = C>,
        C: IntoIterator,
        C::Item: AsRef<str>,
    {
        for (t, tuple) in tuples.into_iter().enumerate() {
            for (c, cell) in tuple.into_iter().enumerate() {
                let node = NodePath::new(vec![t as u32, c as u32]);
                self.add_text(field, entity, node, cell.as_ref())?;
            }
        }
        Ok(())
    }

    pub fn num_terms(&self, field: &str) -> usize {
        self.fields.get(field).map_or(0, |terms| terms.len())
    }

    fn insert(&mut self, field: &str, term: Vec<u8>, entity: EntityId, node: &NodePath, weight: f32) -> Result<()> {
        if entity == NO_MORE_ENTITIES {
            return Err(Error::ReservedValue("entity id"));
        }
        if node.is_sentinel() {
            return Err(Error::ReservedValue("node component"));
        }
        let occurrences = self
            .fields
            .entry(field.to_string())
            .or_default()
            .entry(term)
            .or_default();
        match occurrences.binary_search_by(|o| (o.entity, &o.node).cmp(&(entity, node))) {
            Ok(i) => occurrences[i].weight += weight,
            Err(i) => occurrences.insert(i, Occurrence { entity, node: node.clone(), weight }),
        }
        Ok(())
    }

    fn terms(&self, field: &str) -> Result<Option<&TermMap>> {
        self.config.field(field)?;
        Ok(self.fields.get(field))
    }
}

impl PostingsProvider for MemoryIndex {
    fn field_config(&self, field: &str) -> Result<&FieldConfig> {
        self.config.field(field)
    }

    fn analyzer(&self) -> &AnalyzerConfig {
        &self.config.analyzer
    }

    fn postings<'a>(&'a self, field: &str, term: &[u8]) -> Result<Option<Box<dyn Postings + 'a>>> {
        let Some(terms) = self.terms(field)? else {
            return Ok(None);
        };
        Ok(terms.get(term).map(|occurrences| {
            Box::new(SlicePostings { inner: occurrences.iter() }) as Box<dyn Postings + 'a>
        }))
    }

    fn terms_between(&self, field: &str, lower: &[u8], upper: &[u8]) -> Result<Vec<Vec<u8>>> {
        let Some(terms) = self.terms(field)? else {
            return Ok(Vec::new());
        };
        if lower > upper {
            return Ok(Vec::new());
        }
        let range = (Bound::Included(lower), Bound::Included(upper));
        let found: Vec<Vec<u8>> = terms.range::<[u8], _>(range).map(|(t, _)| t.clone()).collect();
        debug!(field, terms = found.len(), "range terms");
        Ok(found)
    }

    fn terms_with_prefix(&self, field: &str, prefix: &[u8]) -> Result<Vec<Vec<u8>>> {
        let Some(terms) = self.terms(field)? else {
            return Ok(Vec::new());
        };
        Ok(terms
            .range::<[u8], _>((Bound::Included(prefix), Bound::Unbounded))
            .take_while(|(t, _)| t.starts_with(prefix))
            .map(|(t, _)| t.clone())
            .collect())
    }
}
