//! Dewey node paths and the cursor ordering every merge relies on.
//!
//! A node path locates a position inside an entity's internal tree, outermost
//! layer first (`[tuple, cell]` in the common two-layer configuration). Paths
//! are only comparable within one entity and only when they have the same
//! number of layers.

use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::EntityId;

/// Reserved entity id. Never emitted; an exhausted cursor sorts at this id.
pub const NO_MORE_ENTITIES: EntityId = u32::MAX;

/// Component value reserved for the "no more positions" sentinel path.
pub const SENTINEL_COMPONENT: u32 = u32::MAX;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodePath(Vec<u32>);

impl NodePath {
    pub fn new(components: Vec<u32>) -> Self {
        Self(components)
    }

    /// The path with every component at the sentinel value.
    pub fn sentinel(nb_layers: usize) -> Self {
        Self(vec![SENTINEL_COMPONENT; nb_layers])
    }

    pub fn components(&self) -> &[u32] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// True if any component carries the sentinel value.
    pub fn is_sentinel(&self) -> bool {
        is_sentinel(&self.0)
    }
}

impl From<Vec<u32>> for NodePath {
    fn from(components: Vec<u32>) -> Self {
        Self(components)
    }
}

impl<const N: usize> From<[u32; N]> for NodePath {
    fn from(components: [u32; N]) -> Self {
        Self(components.to_vec())
    }
}

impl fmt::Display for NodePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for (i, c) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ",")?;
            }
            write!(f, "{c}")?;
        }
        write!(f, "]")
    }
}

impl PartialOrd for NodePath {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for NodePath {
    fn cmp(&self, other: &Self) -> Ordering {
        compare(&self.0, &other.0)
    }
}

/// Lexicographic order over two paths of equal length, outermost first.
pub fn compare(a: &[u32], b: &[u32]) -> Ordering {
    debug_assert_eq!(a.len(), b.len(), "node paths of different depth");
    for (x, y) in a.iter().zip(b) {
        match x.cmp(y) {
            Ordering::Equal => continue,
            other => return other,
        }
    }
    a.len().cmp(&b.len())
}

pub fn is_sentinel(path: &[u32]) -> bool {
    path.iter().any(|&c| c == SENTINEL_COMPONENT)
}

/// Observable state of a scorer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cursor<'a> {
    /// No transition has happened yet.
    Unstarted,
    /// On an entity, no position handed out yet.
    Entity(EntityId),
    /// On a matching node.
    Node(EntityId, &'a NodePath),
    /// Positions of the entity are consumed.
    EndOfEntity(EntityId),
    Exhausted,
}

impl<'a> Cursor<'a> {
    pub fn entity(&self) -> Option<EntityId> {
        match *self {
            Cursor::Entity(e) | Cursor::Node(e, _) | Cursor::EndOfEntity(e) => Some(e),
            Cursor::Unstarted | Cursor::Exhausted => None,
        }
    }

    pub fn node(&self) -> Option<&'a NodePath> {
        match *self {
            Cursor::Node(_, node) => Some(node),
            _ => None,
        }
    }

    pub fn is_exhausted(&self) -> bool {
        matches!(self, Cursor::Exhausted)
    }

    /// Total sort key: unstarted cursors sort first, exhausted ones last.
    pub fn key(&self) -> CursorKey<'a> {
        match *self {
            Cursor::Unstarted => CursorKey::new(0, NodeBound::Before),
            Cursor::Entity(e) => CursorKey::new(e, NodeBound::Before),
            Cursor::Node(e, node) => CursorKey::new(e, NodeBound::At(node)),
            Cursor::EndOfEntity(e) => CursorKey::new(e, NodeBound::After),
            Cursor::Exhausted => CursorKey::new(NO_MORE_ENTITIES, NodeBound::After),
        }
    }
}

/// Position of a cursor relative to the node paths of its entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum NodeBound<'a> {
    Before,
    At(&'a NodePath),
    /// Past every node of the entity; takes the place of the sentinel path.
    After,
}

/// `(entity, node)` ordering key shared by all combinators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct CursorKey<'a> {
    pub entity: EntityId,
    pub bound: NodeBound<'a>,
}

impl<'a> CursorKey<'a> {
    pub fn new(entity: EntityId, bound: NodeBound<'a>) -> Self {
        Self { entity, bound }
    }

    pub fn at(entity: EntityId, node: &'a NodePath) -> Self {
        Self::new(entity, NodeBound::At(node))
    }

    pub fn is_exhausted(&self) -> bool {
        self.entity == NO_MORE_ENTITIES
    }

    pub fn is_end_of_entity(&self) -> bool {
        matches!(self.bound, NodeBound::After)
    }

    pub fn node(&self) -> Option<&'a NodePath> {
        match self.bound {
            NodeBound::At(node) => Some(node),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compares_outermost_component_first() {
        assert_eq!(compare(&[0, 5], &[1, 0]), Ordering::Less);
        assert_eq!(compare(&[1, 0], &[0, 5]), Ordering::Greater);
        assert_eq!(compare(&[1, 2, 3], &[1, 2, 3]), Ordering::Equal);
        assert_eq!(compare(&[1, 2, 3], &[1, 2, 4]), Ordering::Less);
    }

    #[test]
    fn sentinel_matches_any_component() {
        assert!(NodePath::sentinel(2).is_sentinel());
        assert!(NodePath::from([0, u32::MAX]).is_sentinel());
        assert!(NodePath::from([u32::MAX, 3]).is_sentinel());
        assert!(!NodePath::from([7, 3]).is_sentinel());
    }

    #[test]
    fn cursor_keys_order_entities_then_bounds() {
        let a = NodePath::from([0, 1]);
        let b = NodePath::from([1, 0]);
        let keys = [
            Cursor::Unstarted.key(),
            Cursor::Entity(0).key(),
            Cursor::Node(0, &a).key(),
            Cursor::Node(0, &b).key(),
            Cursor::EndOfEntity(0).key(),
            Cursor::Node(1, &a).key(),
            Cursor::Exhausted.key(),
        ];
        for pair in keys.windows(2) {
            assert!(pair[0] <= pair[1], "{:?} > {:?}", pair[0], pair[1]);
        }
        assert!(Cursor::Exhausted.key().is_exhausted());
    }

    #[test]
    fn display_is_bracketed() {
        assert_eq!(NodePath::from([1, 0, 3]).to_string(), "[1,0,3]");
    }
}
