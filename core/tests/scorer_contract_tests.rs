use std::io;

use nodematch::config::NodesConfig;
use nodematch::index::{Occurrence, Postings, VecPostings};
use nodematch::node::Cursor;
use nodematch::search::{
    BoxedScorer, ConjunctionScorer, DisjunctionScorer, ReqExclScorer, ReqOptScorer, TermScorer,
};
use nodematch::{collect_matches, EntityId, Error, NodePath, NodeScorer, Result};

fn leaf(cells: &[(EntityId, [u32; 2])]) -> BoxedScorer<'static> {
    let occs = cells
        .iter()
        .map(|&(entity, node)| Occurrence { entity, node: NodePath::from(node), weight: 1.0 })
        .collect();
    Box::new(TermScorer::new(Box::new(VecPostings::new(occs)), NodesConfig::default()))
}

/// Yields its occurrences, then fails.
struct FailingPostings {
    inner: VecPostings,
    failed: bool,
}

impl Postings for FailingPostings {
    fn next_occurrence(&mut self) -> Result<Option<Occurrence>> {
        match self.inner.next_occurrence()? {
            Some(occ) => Ok(Some(occ)),
            None if !self.failed => {
                self.failed = true;
                Err(io::Error::new(io::ErrorKind::UnexpectedEof, "truncated postings").into())
            }
            None => Ok(None),
        }
    }
}

fn failing_leaf(cells: &[(EntityId, [u32; 2])]) -> BoxedScorer<'static> {
    let occs = cells
        .iter()
        .map(|&(entity, node)| Occurrence { entity, node: NodePath::from(node), weight: 1.0 })
        .collect();
    let postings = FailingPostings { inner: VecPostings::new(occs), failed: false };
    Box::new(TermScorer::new(Box::new(postings), NodesConfig::default()))
}

fn deep_leaf(cells: &[(EntityId, [u32; 3])]) -> BoxedScorer<'static> {
    let occs = cells
        .iter()
        .map(|&(entity, node)| Occurrence { entity, node: NodePath::from(node), weight: 1.0 })
        .collect();
    Box::new(TermScorer::new(Box::new(VecPostings::new(occs)), NodesConfig::new(3)))
}

#[test]
fn three_layer_paths_order_outermost_first() {
    let a = deep_leaf(&[(0, [0, 1, 2]), (0, [1, 0, 0]), (0, [1, 0, 3]), (2, [0, 0, 0])]);
    let b = deep_leaf(&[(0, [0, 1, 2]), (0, [1, 0, 3]), (2, [0, 0, 1])]);
    let mut and = ConjunctionScorer::new(vec![a, b], 1.0).unwrap();
    let keys: Vec<_> = collect_matches(&mut and).unwrap().into_iter().map(|m| (m.entity, m.node)).collect();
    assert_eq!(keys, vec![(0, NodePath::from([0, 1, 2])), (0, NodePath::from([1, 0, 3]))]);

    let a = deep_leaf(&[(0, [0, 1, 2]), (0, [1, 0, 0]), (2, [0, 0, 0])]);
    let b = deep_leaf(&[(0, [0, 1, 2]), (0, [0, 2, 0]), (2, [0, 0, 1])]);
    let mut or = DisjunctionScorer::new(vec![a, b]).unwrap();
    let keys: Vec<_> = collect_matches(&mut or).unwrap().into_iter().map(|m| (m.entity, m.node, m.score)).collect();
    assert_eq!(
        keys,
        vec![
            (0, NodePath::from([0, 1, 2]), 2.0),
            (0, NodePath::from([0, 2, 0]), 1.0),
            (0, NodePath::from([1, 0, 0]), 1.0),
            (2, NodePath::from([0, 0, 0]), 1.0),
            (2, NodePath::from([0, 0, 1]), 1.0),
        ]
    );
}

#[test]
fn conjunction_yields_both_shared_cells_in_order() {
    let aaa = leaf(&[(0, [0, 0]), (0, [1, 0])]);
    let bbb = leaf(&[(0, [0, 0]), (0, [1, 0])]);
    let mut s = ConjunctionScorer::new(vec![aaa, bbb], 1.0).unwrap();
    assert_eq!(s.next_entity().unwrap(), Some(0));
    assert_eq!(s.next_position().unwrap(), Some(&NodePath::from([0, 0])));
    assert_eq!(s.next_position().unwrap(), Some(&NodePath::from([1, 0])));
    assert_eq!(s.next_position().unwrap(), None);
    assert_eq!(s.next_entity().unwrap(), None);
}

#[test]
fn disjunction_never_merges_distinct_cells() {
    let aaa = leaf(&[(0, [0, 0])]);
    let bbb = leaf(&[(0, [0, 1])]);
    let mut s = DisjunctionScorer::new(vec![aaa, bbb]).unwrap();
    assert_eq!(s.next_entity().unwrap(), Some(0));
    assert_eq!(s.next_position().unwrap(), Some(&NodePath::from([0, 0])));
    assert_eq!(s.nr_matchers(), 1);
    assert_eq!(s.next_position().unwrap(), Some(&NodePath::from([0, 1])));
    assert_eq!(s.nr_matchers(), 1);
    assert_eq!(s.next_position().unwrap(), None);
}

#[test]
fn exclusion_on_the_same_cell_suppresses_the_entity() {
    let aaa = leaf(&[(0, [0, 0])]);
    let ccc = leaf(&[(0, [0, 0])]);
    let mut s = ReqExclScorer::new(aaa, ccc);
    assert_eq!(s.next_entity().unwrap(), None);
}

#[test]
fn node_and_score_require_a_position() {
    let mut s = DisjunctionScorer::new(vec![leaf(&[(2, [0, 0])]), leaf(&[(2, [0, 0])])]).unwrap();
    assert!(matches!(s.next_position(), Err(Error::ContractViolation(_))));
    assert_eq!(s.next_entity().unwrap(), Some(2));
    assert!(matches!(s.node(), Err(Error::ContractViolation(_))));
    assert!(matches!(s.score(), Err(Error::ContractViolation(_))));
    s.next_position().unwrap();
    assert_eq!(s.score().unwrap(), 2.0);
    assert_eq!(s.nr_matchers(), 2);
}

#[test]
fn combinators_stay_exhausted() {
    let mut scorers: Vec<BoxedScorer<'static>> = vec![
        Box::new(ConjunctionScorer::new(vec![leaf(&[(1, [0, 0])]), leaf(&[(1, [0, 0])])], 1.0).unwrap()),
        Box::new(DisjunctionScorer::new(vec![leaf(&[(1, [0, 0])]), leaf(&[(3, [0, 0])])]).unwrap()),
        Box::new(ReqOptScorer::new(leaf(&[(1, [0, 0])]), leaf(&[(1, [0, 0])]))),
        Box::new(ReqExclScorer::new(leaf(&[(1, [0, 0])]), leaf(&[(1, [0, 1])]))),
    ];
    for s in scorers.iter_mut() {
        while s.next_entity().unwrap().is_some() {}
        assert!(s.cursor().is_exhausted());
        assert_eq!(s.next_entity().unwrap(), None);
        assert_eq!(s.advance_entity(0).unwrap(), None);
        assert_eq!(s.advance(0, &NodePath::from([0, 0])).unwrap(), None);
        assert_eq!(s.next_position().unwrap(), None);
    }
}

#[test]
fn matches_come_out_in_entity_then_node_order() {
    let a = leaf(&[(0, [1, 1]), (2, [0, 0]), (2, [3, 0]), (7, [0, 5])]);
    let b = leaf(&[(0, [0, 2]), (2, [1, 0]), (5, [0, 0]), (7, [0, 1])]);
    let c = leaf(&[(1, [0, 0]), (2, [0, 0]), (7, [0, 5])]);
    let mut s = DisjunctionScorer::new(vec![a, b, c]).unwrap();
    let keys: Vec<_> = collect_matches(&mut s).unwrap().into_iter().map(|m| (m.entity, m.node)).collect();
    let mut sorted = keys.clone();
    sorted.sort();
    sorted.dedup();
    assert_eq!(keys, sorted);
    assert_eq!(keys.len(), 9);
}

#[test]
fn entity_cursor_is_reported_before_the_first_position() {
    let mut s = ConjunctionScorer::new(vec![leaf(&[(4, [0, 0])])], 1.0).unwrap();
    assert_eq!(s.cursor(), Cursor::Unstarted);
    s.next_entity().unwrap();
    assert_eq!(s.cursor(), Cursor::Entity(4));
    s.next_position().unwrap();
    assert_eq!(s.cursor(), Cursor::Node(4, &NodePath::from([0, 0])));
    s.next_position().unwrap();
    assert_eq!(s.cursor(), Cursor::EndOfEntity(4));
    assert_eq!(s.entity(), Some(4));
}

#[test]
fn postings_errors_propagate_through_combinators() {
    let ok = leaf(&[(0, [0, 0]), (1, [0, 0])]);
    let failing = failing_leaf(&[(0, [0, 0])]);
    let mut s = ConjunctionScorer::new(vec![ok, failing], 1.0).unwrap();
    assert!(matches!(collect_matches(&mut s), Err(Error::Io(_))));

    let mut s = DisjunctionScorer::new(vec![leaf(&[(3, [0, 0])]), failing_leaf(&[])]).unwrap();
    assert!(matches!(s.next_entity(), Err(Error::Io(_))));
}
