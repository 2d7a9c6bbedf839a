use crate::error::Result;
use crate::node::{Cursor, NodePath};
use crate::EntityId;

use super::{unpositioned, NodeScorer};

/// Stands in for a clause that cannot match anything, e.g. a term absent
/// from the index.
#[derive(Debug, Default, Clone, Copy)]
pub struct NonMatchingScorer;

impl NodeScorer for NonMatchingScorer {
    fn next_entity(&mut self) -> Result<Option<EntityId>> {
        Ok(None)
    }

    fn advance_entity(&mut self, _target: EntityId) -> Result<Option<EntityId>> {
        Ok(None)
    }

    fn advance(&mut self, _target: EntityId, _node: &NodePath) -> Result<Option<EntityId>> {
        Ok(None)
    }

    fn next_position(&mut self) -> Result<Option<&NodePath>> {
        Ok(None)
    }

    fn node(&self) -> Result<&NodePath> {
        Err(unpositioned("node() on a non-matching scorer"))
    }

    fn score(&self) -> Result<f32> {
        Err(unpositioned("score() on a non-matching scorer"))
    }

    fn cursor(&self) -> Cursor<'_> {
        Cursor::Exhausted
    }
}
