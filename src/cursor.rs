//! Resumable traversal.
//!
//! The tree keeps at most one [`Path`]: the chain of nodes from the root to
//! the current record, each tagged with whether it was reached by going
//! right. `next`/`prev` move along it in O(height) without recursion. Any
//! insert or remove drops the path, so a traversal has to be restarted after
//! mutating the tree.

use std::cmp::Ordering;

use smallvec::SmallVec;
use tracing::trace;

use crate::engine::Core;
use crate::locate::{Bound, Turn};
use crate::node::{NodeId, NodeStore, Side};
use crate::tree::AvlTree;

/// Log2 of the node index space.
const LOG2_MAX_NODES: usize = 31;

/// Worst-case AVL height for the node index space, `log_phi(N + 2) - 2`
/// evaluated in integer arithmetic.
pub const MAX_PATH_DEPTH: usize = (4_761_964 * LOG2_MAX_NODES - 1_083_441) / 3_305_955;

pub(crate) const PATH_CAPACITY: usize = MAX_PATH_DEPTH + 2;

#[derive(Clone, Copy, Debug)]
struct Step {
    node: NodeId,
    /// Reached from the parent's right link.
    right: bool,
}

/// Ancestor stack of the current traversal position.
#[derive(Debug, Default)]
pub(crate) struct Path {
    steps: SmallVec<[Step; PATH_CAPACITY]>,
}

impl Path {
    #[inline]
    fn push(&mut self, node: NodeId, side: Side) {
        debug_assert!(self.steps.len() < PATH_CAPACITY, "path deeper than any AVL tree");
        self.steps.push(Step {
            node,
            right: side == Side::Right,
        });
    }

    #[inline]
    fn current(&self) -> Option<NodeId> {
        self.steps.last().map(|s| s.node)
    }

    pub(crate) fn depth(&self) -> usize {
        self.steps.len()
    }
}

impl<R> Core<R> {
    /// Path to the leftmost (or rightmost) node.
    fn path_to_extreme(&self, side: Side) -> Option<Path> {
        let mut path = Path::default();
        let mut link = self.root;
        while let Some(id) = link.node() {
            path.push(id, side);
            link = self.store.child(id, side);
        }
        path.current().map(|_| path)
    }

    /// Path to the node a `Ge`/`Le` lookup would return.
    fn path_to<F>(&self, bound: Bound, dup: bool, cmp: F) -> Option<Path>
    where
        F: Fn(&NodeStore<R>, NodeId) -> Ordering,
    {
        let mut path = Path::default();
        let mut saved = None;
        let mut link = self.root;
        let mut side = if bound == Bound::Le { Side::Right } else { Side::Left };
        while let Some(id) = link.node() {
            path.push(id, side);
            match bound.turn(cmp(&self.store, id), dup) {
                Turn::Hit => return Some(path),
                Turn::Go { save, side: next } => {
                    if save {
                        saved = Some(path.steps.len());
                    }
                    link = self.store.child(id, next);
                    side = next;
                }
            }
        }
        path.steps.truncate(saved?);
        Some(path)
    }

    /// Moves the path one node toward `side` (`Right` = next in order).
    fn advance(&self, path: &mut Path, side: Side) -> Option<NodeId> {
        let current = path.current()?;

        if let Some(mut id) = self.store.child(current, side).node() {
            path.push(id, side);
            let back = side.opposite();
            while let Some(next) = self.store.child(id, back).node() {
                path.push(next, back);
                id = next;
            }
            return Some(id);
        }

        // Climb past every step taken toward `side`, then one more.
        let toward_right = side == Side::Right;
        while path.steps.last().is_some_and(|s| s.right == toward_right) {
            path.steps.pop();
        }
        path.steps.pop();
        path.current()
    }
}

impl<R, K: ?Sized> AvlTree<R, K> {
    fn begin(&mut self, path: Option<Path>) -> Option<&R> {
        self.path = path;
        let id = self.path.as_ref()?.current()?;
        Some(self.core.store.data(id))
    }

    fn step(&mut self, side: Side) -> Option<&R> {
        let path = self.path.as_mut()?;
        match self.core.advance(path, side) {
            Some(id) => Some(self.core.store.data(id)),
            None => {
                trace!("traversal exhausted");
                self.path = None;
                None
            }
        }
    }

    /// Starts a traversal at the smallest key.
    ///
    /// ```
    /// use avl_index::{AvlTree, DupPolicy};
    ///
    /// let mut tree: AvlTree<u32> = AvlTree::by_record(DupPolicy::Reject, |a, b| a.cmp(b));
    /// for v in [3, 1, 2] {
    ///     tree.insert(v).unwrap();
    /// }
    /// let mut seen = Vec::new();
    /// let mut cur = tree.first().copied();
    /// while let Some(v) = cur {
    ///     seen.push(v);
    ///     cur = tree.next().copied();
    /// }
    /// assert_eq!(seen, [1, 2, 3]);
    /// ```
    pub fn first(&mut self) -> Option<&R> {
        let path = self.core.path_to_extreme(Side::Left);
        self.begin(path)
    }

    /// Starts a traversal at the largest key.
    pub fn last(&mut self) -> Option<&R> {
        let path = self.core.path_to_extreme(Side::Right);
        self.begin(path)
    }

    /// Starts a traversal at the smallest key `>= key` (the oldest among
    /// duplicates).
    pub fn start(&mut self, key: &K) -> Option<&R> {
        let path = self.seek(Bound::Ge, key);
        self.begin(path)
    }

    /// Starts a traversal at the largest key `<= key` (the newest among
    /// duplicates), for walking backwards with [`prev`](Self::prev).
    pub fn rev_start(&mut self, key: &K) -> Option<&R> {
        let path = self.seek(Bound::Le, key);
        self.begin(path)
    }

    fn seek(&self, bound: Bound, key: &K) -> Option<Path> {
        let query = self.dispatch.query(key);
        let dispatch = &self.dispatch;
        self.core
            .path_to(bound, self.allows_duplicates(), |store, id| {
                dispatch.probe(&query, store, id)
            })
    }

    /// Next record in ascending order. `None` once the traversal is
    /// exhausted or after the tree was modified.
    #[allow(clippy::should_implement_trait)]
    pub fn next(&mut self) -> Option<&R> {
        self.step(Side::Right)
    }

    /// Previous record; may be mixed freely with [`next`](Self::next).
    pub fn prev(&mut self) -> Option<&R> {
        self.step(Side::Left)
    }

    /// Ends the current traversal.
    pub fn stop(&mut self) {
        self.path = None;
    }

    /// Whether a traversal is in progress.
    pub fn is_traversing(&self) -> bool {
        self.path.is_some()
    }
}
