//! Two-level scorers: entity iteration plus node iteration inside an entity.
//!
//! Every leaf and combinator implements [`NodeScorer`]. After an entity
//! transition (`next_entity`, `advance_entity`, `advance`) a scorer sits on an
//! entity that has at least one match, but no node has been handed out yet;
//! `next_position` must be called before `node` and `score` are valid.

mod cell_queue;
pub mod collector;
pub mod conjunction;
pub mod disjunction;
pub mod non_matching;
pub mod req_excl;
pub mod req_opt;
pub mod term;

pub use collector::{collect_matches, collect_nodes, NodeMatch};
pub use conjunction::ConjunctionScorer;
pub use disjunction::DisjunctionScorer;
pub use non_matching::NonMatchingScorer;
pub use req_excl::ReqExclScorer;
pub use req_opt::ReqOptScorer;
pub use term::TermScorer;

use crate::error::{Error, Result};
use crate::node::{Cursor, NodePath};
use crate::EntityId;

pub trait NodeScorer {
    /// Moves to the next entity holding a match. The first call initialises the scorer.
    fn next_entity(&mut self) -> Result<Option<EntityId>>;

    /// Moves to the first entity `>= target` holding a match. Never moves
    /// backwards: a target at or below the current entity acts as `next_entity`.
    fn advance_entity(&mut self, target: EntityId) -> Result<Option<EntityId>>;

    /// Moves to the first match `(entity, node) >= (target, node)` that has not
    /// been handed out yet.
    fn advance(&mut self, target: EntityId, node: &NodePath) -> Result<Option<EntityId>>;

    /// Next matching node of the current entity, `None` once they are consumed.
    fn next_position(&mut self) -> Result<Option<&NodePath>>;

    fn node(&self) -> Result<&NodePath>;

    fn score(&self) -> Result<f32>;

    fn cursor(&self) -> Cursor<'_>;

    fn entity(&self) -> Option<EntityId> {
        self.cursor().entity()
    }
}

pub type BoxedScorer<'a> = Box<dyn NodeScorer + 'a>;

impl<S: NodeScorer + ?Sized> NodeScorer for Box<S> {
    fn next_entity(&mut self) -> Result<Option<EntityId>> {
        (**self).next_entity()
    }

    fn advance_entity(&mut self, target: EntityId) -> Result<Option<EntityId>> {
        (**self).advance_entity(target)
    }

    fn advance(&mut self, target: EntityId, node: &NodePath) -> Result<Option<EntityId>> {
        (**self).advance(target, node)
    }

    fn next_position(&mut self) -> Result<Option<&NodePath>> {
        (**self).next_position()
    }

    fn node(&self) -> Result<&NodePath> {
        (**self).node()
    }

    fn score(&self) -> Result<f32> {
        (**self).score()
    }

    fn cursor(&self) -> Cursor<'_> {
        (**self).cursor()
    }
}

/// Entity transition requested from a child scorer.
#[derive(Debug, Clone, Copy)]
pub(crate) enum Seek<'n> {
    Next,
    Entity(EntityId),
    Node(EntityId, &'n NodePath),
}

impl Seek<'_> {
    pub(crate) fn apply(self, scorer: &mut dyn NodeScorer) -> Result<Option<EntityId>> {
        match self {
            Seek::Next => scorer.next_entity(),
            Seek::Entity(target) => scorer.advance_entity(target),
            Seek::Node(target, node) => scorer.advance(target, node),
        }
    }
}

/// Applies `seek` and puts the scorer on the first node of the entity it lands on.
/// Returns `false` once the scorer is exhausted.
pub(crate) fn seek_position(scorer: &mut dyn NodeScorer, seek: Seek<'_>) -> Result<bool> {
    let mut landed = seek.apply(scorer)?;
    while landed.is_some() {
        if scorer.next_position()?.is_some() {
            return Ok(true);
        }
        landed = scorer.next_entity()?;
    }
    Ok(false)
}

/// Brings a child scorer onto a node so that its cursor can be compared.
/// Children sitting at the end of an entity move on to the next entity.
pub(crate) fn settle(scorer: &mut dyn NodeScorer) -> Result<bool> {
    match scorer.cursor() {
        Cursor::Node(..) => Ok(true),
        Cursor::Exhausted => Ok(false),
        Cursor::Entity(_) => {
            if scorer.next_position()?.is_some() {
                return Ok(true);
            }
            seek_position(scorer, Seek::Next)
        }
        Cursor::Unstarted | Cursor::EndOfEntity(_) => seek_position(scorer, Seek::Next),
    }
}

/// Where a scorer stands with respect to the nodes of its current entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Phase {
    Unstarted,
    /// On an entity whose first match is known but not handed out.
    Pending,
    Positioned,
    EndOfEntity,
    Exhausted,
}

pub(crate) fn unpositioned(what: &'static str) -> Error {
    Error::ContractViolation(what)
}

/// Entity to move to when a transition targets `target` from `current`.
pub(crate) fn forward_target(current: Option<EntityId>, target: EntityId) -> Option<EntityId> {
    match current {
        Some(e) => e.checked_add(1).map(|next| next.max(target)),
        None => Some(target),
    }
}
