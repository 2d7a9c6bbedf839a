use crate::config::NodesConfig;
use crate::error::{Error, Result};
use crate::index::{Occurrence, Postings};
use crate::node::{compare, Cursor, NodePath, NO_MORE_ENTITIES};
use crate::EntityId;

use super::{forward_target, unpositioned, NodeScorer, Phase};

/// Leaf scorer over the postings of one term.
///
/// The stream is consumed one entity at a time: all occurrences of the
/// current entity are buffered, one lookahead occurrence of the next entity
/// is kept aside.
pub struct TermScorer<'a> {
    postings: Box<dyn Postings + 'a>,
    nodes_config: NodesConfig,
    phase: Phase,
    entity: EntityId,
    /// Occurrences of `entity`, in node order.
    cells: Vec<(NodePath, f32)>,
    /// Index of the next cell not handed out yet.
    next: usize,
    /// Index of the cell handed out by the last `next_position`.
    current: usize,
    lookahead: Option<Occurrence>,
    last_read: Option<(EntityId, NodePath)>,
}

impl<'a> TermScorer<'a> {
    pub fn new(postings: Box<dyn Postings + 'a>, nodes_config: NodesConfig) -> Self {
        Self {
            postings,
            nodes_config,
            phase: Phase::Unstarted,
            entity: 0,
            cells: Vec::new(),
            next: 0,
            current: 0,
            lookahead: None,
            last_read: None,
        }
    }

    /// Reads one occurrence and checks it against the stream invariants.
    fn read(&mut self) -> Result<Option<Occurrence>> {
        let Some(occ) = self.postings.next_occurrence()? else {
            return Ok(None);
        };
        if occ.entity == NO_MORE_ENTITIES {
            return Err(Error::ReservedValue("entity id"));
        }
        self.nodes_config.check_depth(occ.node.len())?;
        if occ.node.is_sentinel() {
            return Err(Error::ReservedValue("node component"));
        }
        if let Some((entity, node)) = &self.last_read {
            let ordered = occ.entity > *entity
                || (occ.entity == *entity && compare(occ.node.components(), node.components()).is_gt());
            if !ordered {
                return Err(Error::UnorderedPostings { entity: occ.entity });
            }
        }
        self.last_read = Some((occ.entity, occ.node.clone()));
        Ok(Some(occ))
    }

    /// Buffers the first entity `>= target`.
    fn load_entity(&mut self, target: EntityId) -> Result<Option<EntityId>> {
        self.cells.clear();
        self.next = 0;
        let first = loop {
            let occ = match self.lookahead.take() {
                Some(occ) => occ,
                None => match self.read()? {
                    Some(occ) => occ,
                    None => {
                        self.phase = Phase::Exhausted;
                        return Ok(None);
                    }
                },
            };
            if occ.entity >= target {
                break occ;
            }
        };

        self.entity = first.entity;
        self.cells.push((first.node, first.weight));
        while let Some(occ) = self.read()? {
            if occ.entity != self.entity {
                self.lookahead = Some(occ);
                break;
            }
            self.cells.push((occ.node, occ.weight));
        }
        self.phase = Phase::Pending;
        Ok(Some(self.entity))
    }

    fn current_entity(&self) -> Option<EntityId> {
        match self.phase {
            Phase::Unstarted | Phase::Exhausted => None,
            _ => Some(self.entity),
        }
    }

    fn load_from(&mut self, target: EntityId) -> Result<Option<EntityId>> {
        match forward_target(self.current_entity(), target) {
            Some(target) => self.load_entity(target),
            None => {
                self.phase = Phase::Exhausted;
                Ok(None)
            }
        }
    }

    /// First cell at or after `next` whose node is `>= node`.
    fn seek_cell(&self, node: &NodePath) -> Option<usize> {
        (self.next..self.cells.len()).find(|&i| compare(self.cells[i].0.components(), node.components()).is_ge())
    }
}

impl NodeScorer for TermScorer<'_> {
    fn next_entity(&mut self) -> Result<Option<EntityId>> {
        if self.phase == Phase::Exhausted {
            return Ok(None);
        }
        self.load_from(0)
    }

    fn advance_entity(&mut self, target: EntityId) -> Result<Option<EntityId>> {
        if self.phase == Phase::Exhausted {
            return Ok(None);
        }
        self.load_from(target)
    }

    fn advance(&mut self, target: EntityId, node: &NodePath) -> Result<Option<EntityId>> {
        if self.phase == Phase::Exhausted {
            return Ok(None);
        }
        if let Some(entity) = self.current_entity() {
            if target <= entity {
                // Stay in the current entity if something is left there.
                let found = if target == entity { self.seek_cell(node) } else { Some(self.next) };
                if let Some(i) = found.filter(|&i| i < self.cells.len()) {
                    self.next = i;
                    self.phase = Phase::Pending;
                    return Ok(Some(entity));
                }
                return self.load_from(entity);
            }
        }

        let Some(landed) = self.load_entity(target)? else {
            return Ok(None);
        };
        if landed > target {
            return Ok(Some(landed));
        }
        match self.seek_cell(node) {
            Some(i) => {
                self.next = i;
                Ok(Some(landed))
            }
            None => self.load_from(landed),
        }
    }

    fn next_position(&mut self) -> Result<Option<&NodePath>> {
        match self.phase {
            Phase::Unstarted => Err(unpositioned("next_position before an entity transition")),
            Phase::Exhausted | Phase::EndOfEntity => Ok(None),
            Phase::Pending | Phase::Positioned => {
                if self.next < self.cells.len() {
                    self.current = self.next;
                    self.next += 1;
                    self.phase = Phase::Positioned;
                    Ok(Some(&self.cells[self.current].0))
                } else {
                    self.phase = Phase::EndOfEntity;
                    Ok(None)
                }
            }
        }
    }

    fn node(&self) -> Result<&NodePath> {
        match self.phase {
            Phase::Positioned => Ok(&self.cells[self.current].0),
            _ => Err(unpositioned("node() without a current position")),
        }
    }

    fn score(&self) -> Result<f32> {
        match self.phase {
            Phase::Positioned => Ok(self.cells[self.current].1),
            _ => Err(unpositioned("score() without a current position")),
        }
    }

    fn cursor(&self) -> Cursor<'_> {
        match self.phase {
            Phase::Unstarted => Cursor::Unstarted,
            Phase::Pending => Cursor::Entity(self.entity),
            Phase::Positioned => Cursor::Node(self.entity, &self.cells[self.current].0),
            Phase::EndOfEntity => Cursor::EndOfEntity(self.entity),
            Phase::Exhausted => Cursor::Exhausted,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::VecPostings;

    fn occ(entity: EntityId, node: [u32; 2]) -> Occurrence {
        Occurrence { entity, node: NodePath::from(node), weight: 1.0 }
    }

    fn scorer(occs: Vec<Occurrence>) -> TermScorer<'static> {
        TermScorer::new(Box::new(VecPostings::new(occs)), NodesConfig::default())
    }

    #[test]
    fn walks_entities_and_positions() {
        let mut s = scorer(vec![occ(0, [0, 0]), occ(0, [1, 0]), occ(3, [0, 1])]);
        assert_eq!(s.next_entity().unwrap(), Some(0));
        assert!(s.node().is_err());
        assert_eq!(s.next_position().unwrap(), Some(&NodePath::from([0, 0])));
        assert_eq!(s.next_position().unwrap(), Some(&NodePath::from([1, 0])));
        assert_eq!(s.next_position().unwrap(), None);
        assert_eq!(s.next_entity().unwrap(), Some(3));
        assert_eq!(s.next_position().unwrap(), Some(&NodePath::from([0, 1])));
        assert_eq!(s.next_entity().unwrap(), None);
        assert_eq!(s.next_entity().unwrap(), None);
        assert!(s.cursor().is_exhausted());
    }

    #[test]
    fn advance_skips_within_and_across_entities() {
        let mut s = scorer(vec![occ(1, [0, 0]), occ(1, [2, 1]), occ(4, [0, 0]), occ(4, [5, 5])]);
        assert_eq!(s.advance(1, &NodePath::from([1, 0])).unwrap(), Some(1));
        assert_eq!(s.next_position().unwrap(), Some(&NodePath::from([2, 1])));
        assert_eq!(s.advance(1, &NodePath::from([3, 0])).unwrap(), Some(4));
        assert_eq!(s.next_position().unwrap(), Some(&NodePath::from([0, 0])));
        assert_eq!(s.advance(4, &NodePath::from([5, 6])).unwrap(), None);
    }

    #[test]
    fn advance_entity_never_moves_backwards() {
        let mut s = scorer(vec![occ(2, [0, 0]), occ(5, [0, 0]), occ(9, [0, 0])]);
        assert_eq!(s.advance_entity(3).unwrap(), Some(5));
        assert_eq!(s.advance_entity(1).unwrap(), Some(9));
    }

    #[test]
    fn rejects_out_of_order_postings() {
        let mut s = scorer(vec![occ(2, [1, 0]), occ(2, [0, 0])]);
        assert!(matches!(s.next_entity(), Err(Error::UnorderedPostings { entity: 2 })));
    }

    #[test]
    fn rejects_wrong_depth() {
        let occs = vec![Occurrence { entity: 0, node: NodePath::from([0, 0, 0]), weight: 1.0 }];
        let mut s = scorer(occs);
        assert!(matches!(s.next_entity(), Err(Error::NodeDepthMismatch { expected: 2, found: 3 })));
    }
}
