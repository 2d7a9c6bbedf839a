use crate::error::Result;
use crate::node::{Cursor, CursorKey, NodeBound, NodePath};
use crate::EntityId;

use super::{seek_position, unpositioned, BoxedScorer, NodeScorer, Seek};

/// Matches what the required scorer matches. The optional scorer only adds
/// its score on the nodes where it matches too.
pub struct ReqOptScorer<'a> {
    required: BoxedScorer<'a>,
    optional: BoxedScorer<'a>,
    optional_done: bool,
    optional_score: Option<f32>,
}

impl<'a> ReqOptScorer<'a> {
    pub fn new(required: BoxedScorer<'a>, optional: BoxedScorer<'a>) -> Self {
        Self { required, optional, optional_done: false, optional_score: None }
    }

    /// Brings the optional scorer up to `(entity, node)`. It is only ever
    /// moved forward since the required side is.
    fn align_optional(&mut self, entity: EntityId, node: &NodePath) -> Result<()> {
        self.optional_score = None;
        if self.optional_done {
            return Ok(());
        }
        let wanted = CursorKey::at(entity, node);
        let key = self.optional.cursor().key();
        let behind = !matches!(key.bound, NodeBound::At(_)) || key < wanted;
        if behind && !seek_position(self.optional.as_mut(), Seek::Node(entity, node))? {
            self.optional_done = true;
            return Ok(());
        }
        if self.optional.cursor().key() == wanted {
            self.optional_score = Some(self.optional.score()?);
        }
        Ok(())
    }

    fn transition(&mut self, landed: Option<EntityId>) -> Option<EntityId> {
        self.optional_score = None;
        landed
    }
}

impl NodeScorer for ReqOptScorer<'_> {
    fn next_entity(&mut self) -> Result<Option<EntityId>> {
        let landed = self.required.next_entity()?;
        Ok(self.transition(landed))
    }

    fn advance_entity(&mut self, target: EntityId) -> Result<Option<EntityId>> {
        let landed = self.required.advance_entity(target)?;
        Ok(self.transition(landed))
    }

    fn advance(&mut self, target: EntityId, node: &NodePath) -> Result<Option<EntityId>> {
        let landed = self.required.advance(target, node)?;
        Ok(self.transition(landed))
    }

    fn next_position(&mut self) -> Result<Option<&NodePath>> {
        let Some(node) = self.required.next_position()? else {
            self.optional_score = None;
            return Ok(None);
        };
        let node = node.clone();
        let entity = self
            .required
            .entity()
            .ok_or_else(|| unpositioned("required scorer off an entity"))?;
        self.align_optional(entity, &node)?;
        Ok(Some(self.required.node()?))
    }

    fn node(&self) -> Result<&NodePath> {
        self.required.node()
    }

    fn score(&self) -> Result<f32> {
        Ok(self.required.score()? + self.optional_score.unwrap_or(0.0))
    }

    fn cursor(&self) -> Cursor<'_> {
        self.required.cursor()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::NodesConfig;
    use crate::index::{Occurrence, VecPostings};
    use crate::search::TermScorer;

    fn leaf(cells: &[(EntityId, [u32; 2], f32)]) -> BoxedScorer<'static> {
        let occs = cells
            .iter()
            .map(|&(entity, node, weight)| Occurrence { entity, node: NodePath::from(node), weight })
            .collect();
        Box::new(TermScorer::new(Box::new(VecPostings::new(occs)), NodesConfig::default()))
    }

    #[test]
    fn optional_adds_score_only_where_it_matches() {
        let req = leaf(&[(0, [0, 0], 1.0), (0, [1, 0], 1.0), (2, [0, 0], 1.0)]);
        let opt = leaf(&[(0, [0, 1], 5.0), (0, [1, 0], 2.0), (1, [0, 0], 9.0)]);
        let mut s = ReqOptScorer::new(req, opt);

        assert_eq!(s.next_entity().unwrap(), Some(0));
        assert_eq!(s.next_position().unwrap(), Some(&NodePath::from([0, 0])));
        assert_eq!(s.score().unwrap(), 1.0);
        assert_eq!(s.next_position().unwrap(), Some(&NodePath::from([1, 0])));
        assert_eq!(s.score().unwrap(), 3.0);
        assert_eq!(s.next_position().unwrap(), None);
        assert_eq!(s.next_entity().unwrap(), Some(2));
        assert_eq!(s.next_position().unwrap(), Some(&NodePath::from([0, 0])));
        assert_eq!(s.score().unwrap(), 1.0);
        assert_eq!(s.next_entity().unwrap(), None);
    }

    /// Hands out a node while claiming to sit on no entity.
    struct Detached(NodePath);

    impl NodeScorer for Detached {
        fn next_entity(&mut self) -> Result<Option<EntityId>> {
            Ok(Some(0))
        }

        fn advance_entity(&mut self, _target: EntityId) -> Result<Option<EntityId>> {
            Ok(Some(0))
        }

        fn advance(&mut self, _target: EntityId, _node: &NodePath) -> Result<Option<EntityId>> {
            Ok(Some(0))
        }

        fn next_position(&mut self) -> Result<Option<&NodePath>> {
            Ok(Some(&self.0))
        }

        fn node(&self) -> Result<&NodePath> {
            Ok(&self.0)
        }

        fn score(&self) -> Result<f32> {
            Ok(1.0)
        }

        fn cursor(&self) -> Cursor<'_> {
            Cursor::Unstarted
        }
    }

    #[test]
    fn required_side_without_an_entity_is_a_contract_violation() {
        let mut s = ReqOptScorer::new(Box::new(Detached(NodePath::from([0, 0]))), leaf(&[(0, [0, 0], 1.0)]));
        s.next_entity().unwrap();
        assert!(matches!(s.next_position(), Err(crate::error::Error::ContractViolation(_))));
    }

    #[test]
    fn exhausted_optional_is_ignored() {
        let req = leaf(&[(3, [0, 0], 1.5)]);
        let opt = leaf(&[(1, [0, 0], 1.0)]);
        let mut s = ReqOptScorer::new(req, opt);
        assert_eq!(s.advance_entity(2).unwrap(), Some(3));
        s.next_position().unwrap();
        assert_eq!(s.score().unwrap(), 1.5);
    }
}
