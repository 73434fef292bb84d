//! Directional lookups.
//!
//! Each lookup is a single root-to-leaf walk that remembers the best
//! candidate seen so far. In trees with duplicates, `Eq` and `Ge` settle on
//! the leftmost (oldest) equal key and `Le` on the rightmost (newest).

use std::cmp::Ordering;

use crate::engine::Core;
use crate::node::{NodeId, NodeStore, Side};
use crate::tree::AvlTree;

/// Relation a located key must have to the query.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Bound {
    Eq,
    Ge,
    Gt,
    Le,
    Lt,
}

/// What to do at one node of a directional walk.
pub(crate) enum Turn {
    /// Exact match in a tree without duplicates; stop here.
    Hit,
    /// Continue to `side`, remembering this node first if `save` is set.
    Go { save: bool, side: Side },
}

impl Bound {
    /// `ord` is the query compared to the node's key.
    #[inline]
    pub(crate) fn turn(self, ord: Ordering, dup: bool) -> Turn {
        use Ordering::{Equal, Greater, Less};

        let go = |save, side| Turn::Go { save, side };
        if ord == Equal && !dup && matches!(self, Bound::Eq | Bound::Ge | Bound::Le) {
            return Turn::Hit;
        }
        match (self, ord) {
            (Bound::Eq, Less) => go(false, Side::Left),
            (Bound::Eq, Greater) => go(false, Side::Right),
            (Bound::Eq, Equal) => go(true, Side::Left),

            (Bound::Ge, Greater) => go(false, Side::Right),
            (Bound::Ge, _) => go(true, Side::Left),

            (Bound::Gt, Less) => go(true, Side::Left),
            (Bound::Gt, _) => go(false, Side::Right),

            (Bound::Le, Less) => go(false, Side::Left),
            (Bound::Le, _) => go(true, Side::Right),

            (Bound::Lt, Greater) => go(true, Side::Right),
            (Bound::Lt, _) => go(false, Side::Left),
        }
    }
}

impl<R> Core<R> {
    pub(crate) fn locate<F>(&self, bound: Bound, dup: bool, cmp: F) -> Option<NodeId>
    where
        F: Fn(&NodeStore<R>, NodeId) -> Ordering,
    {
        let mut link = self.root;
        let mut best = None;
        while let Some(id) = link.node() {
            match bound.turn(cmp(&self.store, id), dup) {
                Turn::Hit => return Some(id),
                Turn::Go { save, side } => {
                    if save {
                        best = Some(id);
                    }
                    link = self.store.child(id, side);
                }
            }
        }
        best
    }

    /// Leftmost or rightmost node.
    pub(crate) fn extreme(&self, side: Side) -> Option<NodeId> {
        let mut id = self.root.node()?;
        while let Some(next) = self.store.child(id, side).node() {
            id = next;
        }
        Some(id)
    }
}

impl<R, K: ?Sized> AvlTree<R, K> {
    fn locate_by(&self, bound: Bound, key: &K) -> Option<&R> {
        let query = self.dispatch.query(key);
        let dispatch = &self.dispatch;
        let id = self.core.locate(bound, self.allows_duplicates(), |store, id| {
            dispatch.probe(&query, store, id)
        })?;
        Some(self.core.store.data(id))
    }

    /// Record with a key equal to `key`; the oldest one if there are several.
    pub fn locate(&self, key: &K) -> Option<&R> {
        self.locate_by(Bound::Eq, key)
    }

    /// Record with the smallest key `>= key`.
    pub fn locate_ge(&self, key: &K) -> Option<&R> {
        self.locate_by(Bound::Ge, key)
    }

    /// Record with the smallest key `> key`.
    pub fn locate_gt(&self, key: &K) -> Option<&R> {
        self.locate_by(Bound::Gt, key)
    }

    /// Record with the largest key `<= key`; the newest one among equals.
    pub fn locate_le(&self, key: &K) -> Option<&R> {
        self.locate_by(Bound::Le, key)
    }

    /// Record with the largest key `< key`.
    pub fn locate_lt(&self, key: &K) -> Option<&R> {
        self.locate_by(Bound::Lt, key)
    }

    /// Record with the smallest key.
    pub fn locate_first(&self) -> Option<&R> {
        self.core
            .extreme(Side::Left)
            .map(|id| self.core.store.data(id))
    }

    /// Record with the largest key.
    pub fn locate_last(&self) -> Option<&R> {
        self.core
            .extreme(Side::Right)
            .map(|id| self.core.store.data(id))
    }

    pub fn contains(&self, key: &K) -> bool {
        self.locate(key).is_some()
    }
}
