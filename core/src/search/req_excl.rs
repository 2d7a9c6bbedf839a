use tracing::trace;

use crate::error::Result;
use crate::node::{Cursor, CursorKey, NodeBound, NodePath};
use crate::EntityId;

use super::{seek_position, unpositioned, BoxedScorer, NodeScorer, Phase, Seek};

/// Required matches minus the nodes where the excluded scorer matches the
/// exact same `(entity, node)`. Entities left without a node are skipped.
pub struct ReqExclScorer<'a> {
    required: BoxedScorer<'a>,
    excluded: BoxedScorer<'a>,
    excluded_done: bool,
    phase: Phase,
    entity: EntityId,
}

impl<'a> ReqExclScorer<'a> {
    pub fn new(required: BoxedScorer<'a>, excluded: BoxedScorer<'a>) -> Self {
        Self {
            required,
            excluded,
            excluded_done: false,
            phase: Phase::Unstarted,
            entity: 0,
        }
    }

    fn is_excluded(&mut self, entity: EntityId, node: &NodePath) -> Result<bool> {
        if self.excluded_done {
            return Ok(false);
        }
        let wanted = CursorKey::at(entity, node);
        let key = self.excluded.cursor().key();
        let behind = !matches!(key.bound, NodeBound::At(_)) || key < wanted;
        if behind && !seek_position(self.excluded.as_mut(), Seek::Node(entity, node))? {
            self.excluded_done = true;
            return Ok(false);
        }
        Ok(self.excluded.cursor().key() == wanted)
    }

    /// Moves the required scorer to its next node that is not excluded.
    fn next_unexcluded(&mut self, entity: EntityId) -> Result<bool> {
        loop {
            let node = match self.required.next_position()? {
                Some(node) => node.clone(),
                None => return Ok(false),
            };
            if !self.is_excluded(entity, &node)? {
                return Ok(true);
            }
            trace!(entity, %node, "excluded");
        }
    }

    /// Settles on the first entity from `landed` onwards that keeps a node.
    fn land(&mut self, mut landed: Option<EntityId>) -> Result<Option<EntityId>> {
        loop {
            let Some(entity) = landed else {
                self.phase = Phase::Exhausted;
                return Ok(None);
            };
            if self.next_unexcluded(entity)? {
                self.entity = entity;
                self.phase = Phase::Pending;
                return Ok(Some(entity));
            }
            landed = self.required.next_entity()?;
        }
    }
}

impl NodeScorer for ReqExclScorer<'_> {
    fn next_entity(&mut self) -> Result<Option<EntityId>> {
        if self.phase == Phase::Exhausted {
            return Ok(None);
        }
        let landed = self.required.next_entity()?;
        self.land(landed)
    }

    fn advance_entity(&mut self, target: EntityId) -> Result<Option<EntityId>> {
        if self.phase == Phase::Exhausted {
            return Ok(None);
        }
        let landed = self.required.advance_entity(target)?;
        self.land(landed)
    }

    fn advance(&mut self, target: EntityId, node: &NodePath) -> Result<Option<EntityId>> {
        match self.phase {
            Phase::Exhausted => return Ok(None),
            Phase::Pending => {
                // The required scorer already sits on a node not handed out.
                let current = self.required.node()?;
                if CursorKey::at(target, node) <= CursorKey::at(self.entity, current) {
                    return Ok(Some(self.entity));
                }
            }
            _ => {}
        }
        let landed = self.required.advance(target, node)?;
        self.land(landed)
    }

    fn next_position(&mut self) -> Result<Option<&NodePath>> {
        match self.phase {
            Phase::Unstarted => return Err(unpositioned("next_position before an entity transition")),
            Phase::EndOfEntity | Phase::Exhausted => return Ok(None),
            Phase::Pending => self.phase = Phase::Positioned,
            Phase::Positioned => {
                if !self.next_unexcluded(self.entity)? {
                    self.phase = Phase::EndOfEntity;
                    return Ok(None);
                }
            }
        }
        Ok(Some(self.required.node()?))
    }

    fn node(&self) -> Result<&NodePath> {
        match self.phase {
            Phase::Positioned => self.required.node(),
            _ => Err(unpositioned("node() without a current position")),
        }
    }

    fn score(&self) -> Result<f32> {
        match self.phase {
            Phase::Positioned => self.required.score(),
            _ => Err(unpositioned("score() without a current position")),
        }
    }

    fn cursor(&self) -> Cursor<'_> {
        match self.phase {
            Phase::Unstarted => Cursor::Unstarted,
            Phase::Pending => Cursor::Entity(self.entity),
            Phase::Positioned => self.required.cursor(),
            Phase::EndOfEntity => Cursor::EndOfEntity(self.entity),
            Phase::Exhausted => Cursor::Exhausted,
        }
    }
}
