//! OR within a node: a node matches when at least one child matches it.

use tracing::trace;

use crate::error::{Error, Result};
use crate::node::{Cursor, CursorKey, NodePath};
use crate::EntityId;

use super::cell_queue::CellQueue;
use super::{forward_target, seek_position, unpositioned, BoxedScorer, NodeScorer, Phase, Seek};

/// Merges its children through a [`CellQueue`]. The queue is filled on the
/// first transition; children already exhausted at that point are left out.
pub struct DisjunctionScorer<'a> {
    children: Vec<BoxedScorer<'a>>,
    queue: CellQueue<'a>,
    phase: Phase,
    entity: EntityId,
    node: NodePath,
    score: f32,
    nr_matchers: usize,
}

impl<'a> DisjunctionScorer<'a> {
    pub fn new(children: Vec<BoxedScorer<'a>>) -> Result<Self> {
        if children.len() < 2 {
            return Err(Error::NotEnoughClauses {
                combinator: "disjunction",
                required: 2,
                found: children.len(),
            });
        }
        let queue = CellQueue::with_capacity(children.len());
        Ok(Self {
            children,
            queue,
            phase: Phase::Unstarted,
            entity: 0,
            node: NodePath::new(Vec::new()),
            score: 0.0,
            nr_matchers: 0,
        })
    }

    /// Number of children matching the current node.
    pub fn nr_matchers(&self) -> usize {
        self.nr_matchers
    }

    /// Children still in play.
    pub fn queue_size(&self) -> usize {
        self.queue.size()
    }

    fn init(&mut self, seek: Seek<'_>) -> Result<Option<EntityId>> {
        for mut child in self.children.drain(..) {
            seek_position(child.as_mut(), seek)?;
            self.queue.insert(child);
        }
        trace!(queue_size = self.queue.size(), "disjunction queue built");
        Ok(self.land())
    }

    /// Takes the entity of the top entry. Every entry sitting on that entity
    /// is on a node at this point.
    fn land(&mut self) -> Option<EntityId> {
        self.nr_matchers = 0;
        match self.queue.top_entity() {
            Some(entity) => {
                self.entity = entity;
                self.phase = Phase::Pending;
                Some(entity)
            }
            None => {
                self.phase = Phase::Exhausted;
                None
            }
        }
    }
}

impl NodeScorer for DisjunctionScorer<'_> {
    fn next_entity(&mut self) -> Result<Option<EntityId>> {
        match self.phase {
            Phase::Unstarted => return self.init(Seek::Next),
            Phase::Exhausted => return Ok(None),
            _ => {}
        }
        while self.queue.top_entity() == Some(self.entity) {
            self.queue.top_next_entity_and_adjust_else_pop()?;
        }
        Ok(self.land())
    }

    fn advance_entity(&mut self, target: EntityId) -> Result<Option<EntityId>> {
        match self.phase {
            Phase::Unstarted => return self.init(Seek::Entity(target)),
            Phase::Exhausted => return Ok(None),
            _ => {}
        }
        let Some(target) = forward_target(Some(self.entity), target) else {
            self.phase = Phase::Exhausted;
            return Ok(None);
        };
        while self.queue.top_entity().is_some_and(|e| e < target) {
            self.queue.top_skip_to_and_adjust_else_pop(Seek::Entity(target))?;
        }
        Ok(self.land())
    }

    fn advance(&mut self, target: EntityId, node: &NodePath) -> Result<Option<EntityId>> {
        match self.phase {
            Phase::Unstarted => return self.init(Seek::Node(target, node)),
            Phase::Exhausted => return Ok(None),
            _ => {}
        }
        let wanted = CursorKey::at(target, node);
        // Entries of nodes already handed out have moved on, so anything left
        // in the queue is a candidate.
        loop {
            let Some(key) = self.queue.top_key() else {
                break;
            };
            let finished = key.is_end_of_entity();
            let below = key < wanted;
            if finished {
                self.queue.top_next_entity_and_adjust_else_pop()?;
            } else if below {
                self.queue.top_skip_to_and_adjust_else_pop(Seek::Node(target, node))?;
            } else {
                break;
            }
        }
        Ok(self.land())
    }

    fn next_position(&mut self) -> Result<Option<&NodePath>> {
        match self.phase {
            Phase::Unstarted => return Err(unpositioned("next_position before an entity transition")),
            Phase::EndOfEntity | Phase::Exhausted => return Ok(None),
            Phase::Pending | Phase::Positioned => {}
        }
        let target = match self.queue.top_entity() {
            Some(entity) if entity == self.entity => self.queue.top_node().cloned(),
            _ => None,
        };
        let Some(target) = target else {
            self.phase = Phase::EndOfEntity;
            self.nr_matchers = 0;
            return Ok(None);
        };

        self.score = 0.0;
        self.nr_matchers = 0;
        while self.queue.top_key() == Some(CursorKey::at(self.entity, &target)) {
            self.score += self.queue.top_score()?;
            self.nr_matchers += 1;
            self.queue.top_next_position_and_adjust()?;
        }
        self.node = target;
        self.phase = Phase::Positioned;
        Ok(Some(&self.node))
    }

    fn node(&self) -> Result<&NodePath> {
        match self.phase {
            Phase::Positioned => Ok(&self.node),
            _ => Err(unpositioned("node() without a current position")),
        }
    }

    fn score(&self) -> Result<f32> {
        match self.phase {
            Phase::Positioned => Ok(self.score),
            _ => Err(unpositioned("score() without a current position")),
        }
    }

    fn cursor(&self) -> Cursor<'_> {
        match self.phase {
            Phase::Unstarted => Cursor::Unstarted,
            Phase::Pending => Cursor::Entity(self.entity),
            Phase::Positioned => Cursor::Node(self.entity, &self.node),
            Phase::EndOfEntity => Cursor::EndOfEntity(self.entity),
            Phase::Exhausted => Cursor::Exhausted,
        }
    }
}
