//! AND within a node: every child must match the exact same node path.
//!
//! Entities are aligned with a circular scan over the children. The child
//! most recently moved is the reference; the next child in circular order is
//! skipped to the reference's `(entity, node)` whenever it sorts before it.
//! Every skip strictly raises the smallest cursor, so the scan ends when all
//! children agree or one of them runs out.

use std::cmp::Ordering;

use tracing::trace;

use crate::error::{Error, Result};
use crate::node::{Cursor, CursorKey, NodePath};
use crate::EntityId;

use super::{seek_position, settle, unpositioned, BoxedScorer, NodeScorer, Phase, Seek};

pub struct ConjunctionScorer<'a> {
    scorers: Vec<BoxedScorer<'a>>,
    coord: f32,
    phase: Phase,
    entity: EntityId,
    node: NodePath,
}

impl<'a> ConjunctionScorer<'a> {
    /// `coord` multiplies the summed child scores.
    pub fn new(scorers: Vec<BoxedScorer<'a>>, coord: f32) -> Result<Self> {
        if scorers.is_empty() {
            return Err(Error::NotEnoughClauses { combinator: "conjunction", required: 1, found: 0 });
        }
        Ok(Self {
            scorers,
            coord,
            phase: Phase::Unstarted,
            entity: 0,
            node: NodePath::new(Vec::new()),
        })
    }

    fn key(&self, i: usize) -> CursorKey<'_> {
        self.scorers[i].cursor().key()
    }

    fn exhaust(&mut self) -> Option<EntityId> {
        self.phase = Phase::Exhausted;
        None
    }

    /// First transition: position every child, sort them, align, then
    /// reverse all but the last slot so the scorers that skipped furthest
    /// are probed first afterwards.
    fn init(&mut self, seek: Seek<'_>) -> Result<Option<EntityId>> {
        for scorer in self.scorers.iter_mut() {
            if !seek_position(scorer.as_mut(), seek)? {
                return Ok(self.exhaust());
            }
        }
        self.scorers.sort_by(|a, b| a.cursor().key().cmp(&b.cursor().key()));

        let result = self.align()?;

        let end = self.scorers.len() - 1;
        self.scorers[..end].reverse();
        trace!(children = self.scorers.len(), entity = ?result, "conjunction initialised");
        Ok(result)
    }

    /// Aligns all children on one `(entity, node)`, starting from the last
    /// child as reference.
    fn align(&mut self) -> Result<Option<EntityId>> {
        let n = self.scorers.len();
        let mut reference = n - 1;
        if !settle(self.scorers[reference].as_mut())? {
            return Ok(self.exhaust());
        }
        let mut agreed = 1;
        let mut first = 0;
        while agreed < n {
            if !settle(self.scorers[first].as_mut())? {
                return Ok(self.exhaust());
            }
            match self.key(first).cmp(&self.key(reference)) {
                Ordering::Less => {
                    let Cursor::Node(entity, node) = self.scorers[reference].cursor() else {
                        return Err(unpositioned("conjunction reference off a node"));
                    };
                    let node = node.clone();
                    if !seek_position(self.scorers[first].as_mut(), Seek::Node(entity, &node))? {
                        return Ok(self.exhaust());
                    }
                    // compare again against the same reference
                }
                Ordering::Equal => {
                    agreed += 1;
                    first = (first + 1) % n;
                }
                Ordering::Greater => {
                    reference = first;
                    agreed = 1;
                    first = (first + 1) % n;
                }
            }
        }

        let Cursor::Node(entity, node) = self.scorers[reference].cursor() else {
            return Err(unpositioned("conjunction aligned off a node"));
        };
        self.entity = entity;
        self.node = node.clone();
        self.phase = Phase::Pending;
        Ok(Some(entity))
    }

    /// Moves the last child with `seek` and realigns.
    fn step(&mut self, seek: Seek<'_>) -> Result<Option<EntityId>> {
        let last = self.scorers.len() - 1;
        if !seek_position(self.scorers[last].as_mut(), seek)? {
            return Ok(self.exhaust());
        }
        self.align()
    }

    /// Next node on which all children agree, within the current entity.
    fn next_agreement(&mut self) -> Result<bool> {
        let n = self.scorers.len();
        let mut reference = n - 1;
        if self.scorers[reference].next_position()?.is_none() {
            return Ok(false);
        }
        let mut agreed = 1;
        let mut first = 0;
        while agreed < n {
            match self.scorers[first].node()?.cmp(self.scorers[reference].node()?) {
                Ordering::Less => {
                    if self.scorers[first].next_position()?.is_none() {
                        return Ok(false);
                    }
                }
                Ordering::Equal => {
                    agreed += 1;
                    first = (first + 1) % n;
                }
                Ordering::Greater => {
                    reference = first;
                    agreed = 1;
                    first = (first + 1) % n;
                }
            }
        }
        self.node = self.scorers[reference].node()?.clone();
        Ok(true)
    }
}

impl NodeScorer for ConjunctionScorer<'_> {
    fn next_entity(&mut self) -> Result<Option<EntityId>> {
        match self.phase {
            Phase::Unstarted => self.init(Seek::Next),
            Phase::Exhausted => Ok(None),
            _ => self.step(Seek::Next),
        }
    }

    fn advance_entity(&mut self, target: EntityId) -> Result<Option<EntityId>> {
        match self.phase {
            Phase::Unstarted => self.init(Seek::Entity(target)),
            Phase::Exhausted => Ok(None),
            _ if target <= self.entity => self.step(Seek::Next),
            _ => self.step(Seek::Entity(target)),
        }
    }

    fn advance(&mut self, target: EntityId, node: &NodePath) -> Result<Option<EntityId>> {
        let wanted = CursorKey::at(target, node);
        match self.phase {
            Phase::Unstarted => self.init(Seek::Node(target, node)),
            Phase::Exhausted => Ok(None),
            Phase::Pending if wanted <= CursorKey::at(self.entity, &self.node) => Ok(Some(self.entity)),
            Phase::Positioned if wanted <= CursorKey::at(self.entity, &self.node) => {
                if self.next_agreement()? {
                    self.phase = Phase::Pending;
                    Ok(Some(self.entity))
                } else {
                    self.step(Seek::Next)
                }
            }
            Phase::EndOfEntity if target <= self.entity => self.step(Seek::Next),
            _ => self.step(Seek::Node(target, node)),
        }
    }

    fn next_position(&mut self) -> Result<Option<&NodePath>> {
        match self.phase {
            Phase::Unstarted => Err(unpositioned("next_position before an entity transition")),
            Phase::EndOfEntity | Phase::Exhausted => Ok(None),
            Phase::Pending => {
                self.phase = Phase::Positioned;
                Ok(Some(&self.node))
            }
            Phase::Positioned => {
                if self.next_agreement()? {
                    Ok(Some(&self.node))
                } else {
                    self.phase = Phase::EndOfEntity;
                    Ok(None)
                }
            }
        }
    }

    fn node(&self) -> Result<&NodePath> {
        match self.phase {
            Phase::Positioned => Ok(&self.node),
            _ => Err(unpositioned("node() without a current position")),
        }
    }

    fn score(&self) -> Result<f32> {
        if self.phase != Phase::Positioned {
            return Err(unpositioned("score() without a current position"));
        }
        let mut sum = 0.0;
        for scorer in &self.scorers {
            sum += scorer.score()?;
        }
        Ok(sum * self.coord)
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
