//! Query tree and its conversion into a scorer tree.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::{AnalyzerConfig, FieldKind};
use crate::error::{Error, Result};
use crate::index::{term_scorer, PostingsProvider};
use crate::numeric::{sortable_bounds, split_range, NumericValue};
use crate::search::{
    BoxedScorer, ConjunctionScorer, DisjunctionScorer, NonMatchingScorer, ReqExclScorer, ReqOptScorer,
};
use crate::tokenizer::tokenize_cell;

/// Output of the query parser, one variant per kind of clause.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Query {
    /// Cell text. Several words must all occur in the same node.
    Term { field: String, term: String },
    Prefix { field: String, prefix: String },
    /// Open ends when a bound is missing; bounds are inclusive by default.
    NumericRange {
        field: String,
        #[serde(default)]
        lower: Option<NumericValue>,
        #[serde(default)]
        upper: Option<NumericValue>,
        #[serde(default = "inclusive")]
        include_lower: bool,
        #[serde(default = "inclusive")]
        include_upper: bool,
    },
    Boolean {
        #[serde(default)]
        must: Vec<Query>,
        #[serde(default)]
        should: Vec<Query>,
        #[serde(default)]
        must_not: Vec<Query>,
        #[serde(default = "default_coord")]
        coord: f32,
    },
}

fn inclusive() -> bool { true }

fn default_coord() -> f32 { 1.0 }

impl Query {
    pub fn term(field: impl Into<String>, term: impl Into<String>) -> Self {
        Query::Term { field: field.into(), term: term.into() }
    }

    pub fn boolean(must: Vec<Query>, should: Vec<Query>, must_not: Vec<Query>) -> Self {
        Query::Boolean { must, should, must_not, coord: 1.0 }
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Builds the scorer tree evaluating this query against `provider`.
    pub fn scorer<'a>(&self, provider: &'a dyn PostingsProvider) -> Result<BoxedScorer<'a>> {
        match self {
            Query::Term { field, term } => term_query(provider, field, term),
            Query::Prefix { field, prefix } => prefix_query(provider, field, prefix),
            Query::NumericRange { field, lower, upper, include_lower, include_upper } => {
                range_query(provider, field, *lower, *upper, *include_lower, *include_upper)
            }
            Query::Boolean { must, should, must_not, coord } => {
                boolean_query(provider, must, should, must_not, *coord)
            }
        }
    }

    /// Node depth of the fields this query reads, `None` for a boolean
    /// without clauses. Clauses reading fields of different depths are an error.
    pub fn node_depth(&self, provider: &dyn PostingsProvider) -> Result<Option<usize>> {
        match self {
            Query::Term { field, .. } | Query::Prefix { field, .. } | Query::NumericRange { field, .. } => {
                Ok(Some(provider.field_config(field)?.nodes.nb_layers))
            }
            Query::Boolean { must, should, must_not, .. } => {
                shared_depth(provider, must.iter().chain(should).chain(must_not))
            }
        }
    }
}

fn shared_depth<'q>(
    provider: &dyn PostingsProvider,
    clauses: impl Iterator<Item = &'q Query>,
) -> Result<Option<usize>> {
    let mut depth = None;
    for clause in clauses {
        match (depth, clause.node_depth(provider)?) {
            (Some(expected), Some(found)) if expected != found => {
                return Err(Error::NodeDepthMismatch { expected, found });
            }
            (None, found) => depth = found,
            _ => {}
        }
    }
    Ok(depth)
}

fn check_text(provider: &dyn PostingsProvider, field: &str) -> Result<()> {
    match provider.field_config(field)?.kind {
        FieldKind::Text => Ok(()),
        FieldKind::Numeric { .. } => Err(Error::FieldKind { field: field.to_string(), expected: "text" }),
    }
}

fn leaf<'a>(provider: &'a dyn PostingsProvider, field: &str, term: &[u8]) -> Result<BoxedScorer<'a>> {
    let scorer: BoxedScorer<'a> = match term_scorer(provider, field, term)? {
        Some(scorer) => Box::new(scorer),
        None => Box::new(NonMatchingScorer),
    };
    Ok(scorer)
}

fn term_query<'a>(provider: &'a dyn PostingsProvider, field: &str, text: &str) -> Result<BoxedScorer<'a>> {
    check_text(provider, field)?;
    let words = tokenize_cell(text, provider.analyzer());
    let mut leaves = Vec::with_capacity(words.len());
    for word in &words {
        leaves.push(leaf(provider, field, word.as_bytes())?);
    }
    match leaves.len() {
        0 => Ok(Box::new(NonMatchingScorer)),
        1 => Ok(leaves.remove(0)),
        n => {
            debug!(field, words = n, "conjunction over cell words");
            Ok(Box::new(ConjunctionScorer::new(leaves, 1.0)?))
        }
    }
}

fn prefix_query<'a>(provider: &'a dyn PostingsProvider, field: &str, prefix: &str) -> Result<BoxedScorer<'a>> {
    check_text(provider, field)?;
    // Stemming a prefix would cut it further.
    let words = tokenize_cell(prefix, &AnalyzerConfig { stem: false });
    let Some(prefix) = words.first() else {
        return Ok(Box::new(NonMatchingScorer));
    };
    let mut leaves = Vec::new();
    for term in provider.terms_with_prefix(field, prefix.as_bytes())? {
        leaves.push(leaf(provider, field, &term)?);
    }
    debug!(field, %prefix, terms = leaves.len(), "prefix expanded");
    union(leaves)
}

fn range_query<'a>(
    provider: &'a dyn PostingsProvider,
    field: &str,
    lower: Option<NumericValue>,
    upper: Option<NumericValue>,
    include_lower: bool,
    include_upper: bool,
) -> Result<BoxedScorer<'a>> {
    let (numeric_type, step) = provider.field_config(field)?.numeric_encoding(field)?;
    let Some((min, max)) = sortable_bounds(field, numeric_type, lower, upper, include_lower, include_upper)? else {
        return Ok(Box::new(NonMatchingScorer));
    };
    let ranges = split_range(numeric_type, step, min, max);
    let mut leaves = Vec::new();
    for range in &ranges {
        for term in provider.terms_between(field, &range.lower_term, &range.upper_term)? {
            leaves.push(leaf(provider, field, &term)?);
        }
    }
    debug!(field, sub_ranges = ranges.len(), terms = leaves.len(), "numeric range expanded");
    union(leaves)
}

fn boolean_query<'a>(
    provider: &'a dyn PostingsProvider,
    must: &[Query],
    should: &[Query],
    must_not: &[Query],
    coord: f32,
) -> Result<BoxedScorer<'a>> {
    // Children of one combinator compare node paths of one length.
    shared_depth(provider, must.iter().chain(should).chain(must_not))?;
    if must.is_empty() && should.is_empty() {
        // Nothing left to subtract from.
        return Ok(Box::new(NonMatchingScorer));
    }
    let build = |clauses: &[Query]| -> Result<Vec<BoxedScorer<'a>>> {
        clauses.iter().map(|q| q.scorer(provider)).collect()
    };

    let mut required = build(must)?;
    let optional = build(should)?;
    let excluded = build(must_not)?;

    let base: BoxedScorer<'a> = if required.is_empty() {
        union(optional)?
    } else {
        let required: BoxedScorer<'a> = if required.len() == 1 {
            required.remove(0)
        } else {
            debug!(clauses = required.len(), coord, "conjunction");
            Box::new(ConjunctionScorer::new(required, coord)?)
        };
        if optional.is_empty() {
            required
        } else {
            debug!(optional = optional.len(), "req-opt");
            Box::new(ReqOptScorer::new(required, union(optional)?))
        }
    };

    if excluded.is_empty() {
        return Ok(base);
    }
    debug!(excluded = excluded.len(), "req-excl");
    Ok(Box::new(ReqExclScorer::new(base, union(excluded)?)))
}

/// Disjunction over `scorers`, collapsed when there are fewer than two.
fn union(mut scorers: Vec<BoxedScorer<'_>>) -> Result<BoxedScorer<'_>> {
    match scorers.len() {
        0 => Ok(Box::new(NonMatchingScorer)),
        1 => Ok(scorers.remove(0)),
        n => {
            debug!(clauses = n, "disjunction");
            Ok(Box::new(DisjunctionScorer::new(scorers)?))
        }
    }
}
