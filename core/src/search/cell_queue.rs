//! Priority queue of child scorers ordered by their `(entity, node)` cursor.
//!
//! A manual binary min-heap: the top scorer is moved in place and then sifted
//! down, instead of being popped and pushed back. Exhausted scorers are
//! removed as soon as they are observed.

use crate::error::Result;
use crate::node::{CursorKey, NodePath};
use crate::EntityId;

use super::{seek_position, BoxedScorer, NodeScorer, Seek};

pub(crate) struct CellQueue<'a> {
    heap: Vec<BoxedScorer<'a>>,
}

impl<'a> CellQueue<'a> {
    pub(crate) fn with_capacity(capacity: usize) -> Self {
        Self { heap: Vec::with_capacity(capacity) }
    }

    pub(crate) fn size(&self) -> usize {
        self.heap.len()
    }

    /// Adds a scorer; exhausted scorers are dropped. Returns whether it was kept.
    pub(crate) fn insert(&mut self, scorer: BoxedScorer<'a>) -> bool {
        if scorer.cursor().is_exhausted() {
            return false;
        }
        self.heap.push(scorer);
        let pos = self.heap.len() - 1;
        self.sift_up(pos);
        true
    }

    pub(crate) fn top_key(&self) -> Option<CursorKey<'_>> {
        self.heap.first().map(|s| s.cursor().key())
    }

    pub(crate) fn top_entity(&self) -> Option<EntityId> {
        self.top_key().map(|k| k.entity)
    }

    /// Node of the top scorer; `None` when it sits at the end of its entity.
    pub(crate) fn top_node(&self) -> Option<&NodePath> {
        self.top_key().and_then(|k| k.node())
    }

    pub(crate) fn top_score(&self) -> Result<f32> {
        match self.heap.first() {
            Some(top) => top.score(),
            None => Err(super::unpositioned("top_score() on an empty cell queue")),
        }
    }

    /// Moves the top scorer to its next node in the same entity. A scorer
    /// running out of nodes stays in the queue at the end of its entity.
    pub(crate) fn top_next_position_and_adjust(&mut self) -> Result<()> {
        if let Some(top) = self.heap.first_mut() {
            top.next_position()?;
            self.sift_down(0);
        }
        Ok(())
    }

    /// Moves the top scorer to the first node of its next entity, removing
    /// it when exhausted. Returns whether it survived.
    pub(crate) fn top_next_entity_and_adjust_else_pop(&mut self) -> Result<bool> {
        self.top_skip_to_and_adjust_else_pop(Seek::Next)
    }

    /// Skips the top scorer to `seek` and onto its first node there,
    /// removing it when exhausted. Returns whether it survived.
    pub(crate) fn top_skip_to_and_adjust_else_pop(&mut self, seek: Seek<'_>) -> Result<bool> {
        let Some(top) = self.heap.first_mut() else {
            return Ok(false);
        };
        if seek_position(top.as_mut(), seek)? {
            self.sift_down(0);
            Ok(true)
        } else {
            self.pop();
            Ok(false)
        }
    }

    fn pop(&mut self) -> Option<BoxedScorer<'a>> {
        if self.heap.is_empty() {
            return None;
        }
        let last = self.heap.len() - 1;
        self.heap.swap(0, last);
        let top = self.heap.pop();
        if !self.heap.is_empty() {
            self.sift_down(0);
        }
        top
    }

    #[inline]
    fn less(&self, i: usize, j: usize) -> bool {
        self.heap[i].cursor().key() < self.heap[j].cursor().key()
    }

    fn sift_down(&mut self, mut pos: usize) {
        let len = self.heap.len();
        loop {
            let left = 2 * pos + 1;
            if left >= len {
                break;
            }
            let right = left + 1;
            let mut smallest = left;
            if right < len && self.less(right, left) {
                smallest = right;
            }
            if !self.less(smallest, pos) {
                break;
            }
            self.heap.swap(pos, smallest);
            pos = smallest;
        }
    }

    fn sift_up(&mut self, mut pos: usize) {
        while pos > 0 {
            let parent = (pos - 1) / 2;
            if !self.less(pos, parent) {
                break;
            }
            self.heap.swap(pos, parent);
            pos = parent;
        }
    }
}
