//! AVL insertion, removal and rebalancing.
//!
//! Balance is kept in the child links: a link flagged "deeper" points at the
//! taller of two siblings, so a node with no flagged child is balanced. Both
//! operations descend recursively and report on the way back up whether the
//! subtree grew (`Ins::Deeper`) or shrank (`Depth::Less`). Rotations are
//! written once for the left-heavy case and mirrored through `Side`.
//!
//! Every function that can restructure a subtree takes the link that points
//! at it (`slot`) and returns the replacement link. The slot's own deeper flag
//! belongs to the parent and is carried over to whatever node takes its place.

use std::cmp::Ordering;

use crate::error::Result;
use crate::node::{Link, NodeId, NodeStore, Side};

/// Outcome of inserting into a subtree.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Ins {
    NotInserted,
    Inserted,
    /// Inserted and the subtree is one level taller.
    Deeper,
}

/// Height change of a subtree after a removal or rotation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Depth {
    Less,
    Same,
}

/// Root link plus the arena it points into.
pub(crate) struct Core<R> {
    pub(crate) root: Link,
    pub(crate) store: NodeStore<R>,
}

impl<R> Core<R> {
    pub(crate) fn new(store: NodeStore<R>) -> Self {
        Self {
            root: Link::NULL,
            store,
        }
    }

    /// Links the detached node `new` into the tree.
    ///
    /// `cmp(store, id)` orders the new node's key against node `id`. Equal keys
    /// go right when `dup` is set; otherwise they are refused and `false` is
    /// returned with the tree unchanged.
    pub(crate) fn insert<F>(&mut self, new: NodeId, dup: bool, cmp: F) -> bool
    where
        F: Fn(&NodeStore<R>, NodeId) -> Ordering,
    {
        if self.root.is_null() {
            self.root = Link::to(new);
            return true;
        }
        let (root, ins) = self.insert_at(self.root, new, dup, &cmp);
        self.root = root;
        ins != Ins::NotInserted
    }

    fn insert_at<F>(&mut self, slot: Link, new: NodeId, dup: bool, cmp: &F) -> (Link, Ins)
    where
        F: Fn(&NodeStore<R>, NodeId) -> Ordering,
    {
        let root = slot.id();
        let side = match cmp(&self.store, root) {
            Ordering::Less => Side::Left,
            Ordering::Greater => Side::Right,
            Ordering::Equal if dup => Side::Right,
            Ordering::Equal => return (slot, Ins::NotInserted),
        };

        let child = self.store.child(root, side);
        let ins = if child.is_null() {
            self.store
                .set_child(root, side, Link::to(new).with_deeper(child.is_deeper()));
            Ins::Deeper
        } else {
            let (link, ins) = self.insert_at(child, new, dup, cmp);
            self.store.set_child(root, side, link);
            ins
        };

        match ins {
            Ins::Deeper => self.grown(slot, side),
            other => (slot, other),
        }
    }

    /// The `side` subtree of `slot` just got taller.
    fn grown(&mut self, slot: Link, side: Side) -> (Link, Ins) {
        let root = slot.id();
        let other = side.opposite();
        if self.store.child(root, side).is_deeper() {
            let (link, depth) = self.rebalance(slot, side);
            let ins = match depth {
                Depth::Less => Ins::Inserted,
                Depth::Same => Ins::Deeper,
            };
            (link, ins)
        } else if self.store.child(root, other).is_deeper() {
            let shallow = self.store.child(root, other).shallow();
            self.store.set_child(root, other, shallow);
            (slot, Ins::Inserted)
        } else {
            let deeper = self.store.child(root, side).deeper();
            self.store.set_child(root, side, deeper);
            (slot, Ins::Deeper)
        }
    }

    /// Restores balance at `slot`, whose `heavy` subtree is two levels taller.
    fn rebalance(&mut self, slot: Link, heavy: Side) -> (Link, Depth) {
        let light = heavy.opposite();
        let root = slot.id();
        let s = &mut self.store;
        let half = s.child(root, heavy).id();

        if s.child(half, heavy).is_deeper() {
            // Single rotation; subtree shrinks.
            s.set_child(root, heavy, s.child(half, light).shallow());
            s.set_child(root, light, s.child(root, light).shallow());
            s.set_child(half, light, Link::to(root));
            s.set_child(half, heavy, s.child(half, heavy).shallow());
            (Link::to(half).with_deeper(slot.is_deeper()), Depth::Less)
        } else if s.child(half, light).is_deeper() {
            // Double rotation; subtree shrinks.
            let pivot = s.child(half, light).id();
            let pivot_heavy = s.child(pivot, heavy);
            let pivot_light = s.child(pivot, light);
            s.set_child(root, heavy, pivot_light.shallow());
            s.set_child(half, light, pivot_heavy.shallow());
            s.set_child(
                root,
                light,
                s.child(root, light).with_deeper(pivot_heavy.is_deeper()),
            );
            s.set_child(
                half,
                heavy,
                s.child(half, heavy).with_deeper(pivot_light.is_deeper()),
            );
            s.set_child(pivot, heavy, Link::to(half));
            s.set_child(pivot, light, Link::to(root));
            (Link::to(pivot).with_deeper(slot.is_deeper()), Depth::Less)
        } else {
            // Single rotation of a balanced child, only reachable on removal.
            s.set_child(root, heavy, s.child(half, light).deeper());
            s.set_child(root, light, s.child(root, light).shallow());
            s.set_child(half, light, Link::to(root).deeper());
            s.set_child(half, heavy, s.child(half, heavy).shallow());
            (Link::to(half).with_deeper(slot.is_deeper()), Depth::Same)
        }
    }

    /// Unlinks the node matching `cmp` and returns its id.
    ///
    /// With `dup` set the oldest of several equal keys is chosen.
    pub(crate) fn remove<F>(&mut self, dup: bool, cmp: F) -> Option<NodeId>
    where
        F: Fn(&NodeStore<R>, NodeId) -> Ordering,
    {
        if self.root.is_null() {
            return None;
        }
        let (root, _, removed) = self.remove_at(self.root, dup, &cmp)?;
        self.root = root;
        Some(removed)
    }

    fn remove_at<F>(&mut self, slot: Link, dup: bool, cmp: &F) -> Option<(Link, Depth, NodeId)>
    where
        F: Fn(&NodeStore<R>, NodeId) -> Ordering,
    {
        match cmp(&self.store, slot.id()) {
            Ordering::Less => self.remove_below(slot, Side::Left, dup, cmp),
            Ordering::Greater => self.remove_below(slot, Side::Right, dup, cmp),
            Ordering::Equal => {
                if dup {
                    // Older duplicates sit to the left.
                    if let Some(found) = self.remove_below(slot, Side::Left, dup, cmp) {
                        return Some(found);
                    }
                }
                Some(self.unlink(slot))
            }
        }
    }

    fn remove_below<F>(
        &mut self,
        slot: Link,
        side: Side,
        dup: bool,
        cmp: &F,
    ) -> Option<(Link, Depth, NodeId)>
    where
        F: Fn(&NodeStore<R>, NodeId) -> Ordering,
    {
        let root = slot.id();
        let child = self.store.child(root, side);
        if child.is_null() {
            return None;
        }
        let (link, depth, removed) = self.remove_at(child, dup, cmp)?;
        self.store.set_child(root, side, link);
        let (slot, depth) = match depth {
            Depth::Less => self.shrunk(slot, side),
            Depth::Same => (slot, Depth::Same),
        };
        Some((slot, depth, removed))
    }

    /// Detaches the node `slot` points at.
    fn unlink(&mut self, slot: Link) -> (Link, Depth, NodeId) {
        let node = slot.id();
        let left = self.store.child(node, Side::Left);
        let right = self.store.child(node, Side::Right);
        if right.is_null() {
            return (left.with_deeper(slot.is_deeper()), Depth::Less, node);
        }
        if left.is_null() {
            return (right.with_deeper(slot.is_deeper()), Depth::Less, node);
        }

        // Two children: the leftmost node of the right subtree takes its place.
        let (right, depth, successor) = self.fetch_leftmost(right);
        self.store.set_child(successor, Side::Left, left);
        self.store.set_child(successor, Side::Right, right);
        let (link, depth) = match depth {
            Depth::Less => self.shrunk(Link::to(successor), Side::Right),
            Depth::Same => (Link::to(successor), Depth::Same),
        };
        (link.with_deeper(slot.is_deeper()), depth, node)
    }

    /// Detaches the leftmost node below `slot`.
    fn fetch_leftmost(&mut self, slot: Link) -> (Link, Depth, NodeId) {
        let root = slot.id();
        let left = self.store.child(root, Side::Left);
        if left.is_null() {
            let right = self.store.child(root, Side::Right);
            return (right.with_deeper(slot.is_deeper()), Depth::Less, root);
        }
        let (link, depth, found) = self.fetch_leftmost(left);
        self.store.set_child(root, Side::Left, link);
        let (slot, depth) = match depth {
            Depth::Less => self.shrunk(slot, Side::Left),
            Depth::Same => (slot, Depth::Same),
        };
        (slot, depth, found)
    }

    /// The `side` subtree of `slot` just got shorter.
    fn shrunk(&mut self, slot: Link, side: Side) -> (Link, Depth) {
        let root = slot.id();
        let other = side.opposite();
        if self.store.child(root, other).is_deeper() {
            self.rebalance(slot, other)
        } else if self.store.child(root, side).is_deeper() {
            let shallow = self.store.child(root, side).shallow();
            self.store.set_child(root, side, shallow);
            (slot, Depth::Less)
        } else {
            let deeper = self.store.child(root, other).deeper();
            self.store.set_child(root, other, deeper);
            (slot, Depth::Same)
        }
    }

    /// Rebuilds the tree's shape in `dst`, cloning record handles.
    pub(crate) fn copy_into(&self, dst: &mut NodeStore<R>) -> Result<Link>
    where
        R: Clone,
    {
        self.copy_link(self.root, dst)
    }

    fn copy_link(&self, link: Link, dst: &mut NodeStore<R>) -> Result<Link>
    where
        R: Clone,
    {
        let Some(id) = link.node() else {
            return Ok(link);
        };
        dst.reserve()?;
        let copy = dst.place(self.store.embedded_key(id), self.store.data(id).clone());
        let left = self.copy_link(self.store.child(id, Side::Left), dst)?;
        let right = self.copy_link(self.store.child(id, Side::Right), dst)?;
        dst.set_child(copy, Side::Left, left);
        dst.set_child(copy, Side::Right, right);
        Ok(Link::to(copy).with_deeper(link.is_deeper()))
    }

    /// Height of the tree, walking every node.
    pub(crate) fn height(&self) -> usize {
        fn walk<R>(store: &NodeStore<R>, link: Link) -> usize {
            match link.node() {
                None => 0,
                Some(id) => {
                    1 + walk(store, store.child(id, Side::Left))
                        .max(walk(store, store.child(id, Side::Right)))
                }
            }
        }
        walk(&self.store, self.root)
    }

    /// Asserts the balance flags against measured heights; returns the node count.
    #[cfg(test)]
    pub(crate) fn validate(&self) -> usize {
        fn walk<R>(store: &NodeStore<R>, link: Link, count: &mut usize) -> usize {
            let Some(id) = link.node() else {
                return 0;
            };
            *count += 1;
            let left = store.child(id, Side::Left);
            let right = store.child(id, Side::Right);
            assert!(
                !(left.is_deeper() && right.is_deeper()),
                "both children of {id:?} flagged deeper"
            );
            let hl = walk(store, left, count);
            let hr = walk(store, right, count);
            assert!(hl.abs_diff(hr) <= 1, "{id:?} unbalanced: {hl} vs {hr}");
            assert_eq!(left.is_deeper(), hl > hr, "left flag of {id:?}");
            assert_eq!(right.is_deeper(), hr > hl, "right flag of {id:?}");
            1 + hl.max(hr)
        }

        assert!(!self.root.is_deeper(), "root link flagged");
        let mut count = 0;
        walk(&self.store, self.root, &mut count);
        count
    }
}
