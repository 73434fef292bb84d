//! Whole-tree walks: iterators, callback scans and list linking.
//!
//! None of these touch the tree's cursor.

use std::iter::FusedIterator;

use smallvec::SmallVec;

use crate::cursor::PATH_CAPACITY;
use crate::engine::Core;
use crate::node::{Link, NodeId, NodeStore, Side};
use crate::tree::AvlTree;

/// In-order iterator over the records of a tree, ascending or descending.
pub struct Iter<'a, R> {
    store: &'a NodeStore<R>,
    stack: SmallVec<[NodeId; PATH_CAPACITY]>,
    /// Side visited first: `Left` for ascending order.
    first: Side,
    remaining: usize,
}

impl<'a, R> Iter<'a, R> {
    pub(crate) fn new(core: &'a Core<R>, len: usize, first: Side) -> Self {
        let mut iter = Self {
            store: &core.store,
            stack: SmallVec::new(),
            first,
            remaining: len,
        };
        iter.descend(core.root);
        iter
    }

    fn descend(&mut self, mut link: Link) {
        while let Some(id) = link.node() {
            self.stack.push(id);
            link = self.store.child(id, self.first);
        }
    }
}

impl<'a, R> Iterator for Iter<'a, R> {
    type Item = &'a R;

    fn next(&mut self) -> Option<Self::Item> {
        let id = self.stack.pop()?;
        self.descend(self.store.child(id, self.first.opposite()));
        self.remaining -= 1;
        Some(self.store.data(id))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<R> ExactSizeIterator for Iter<'_, R> {}

impl<R> FusedIterator for Iter<'_, R> {}

impl<R, K: ?Sized> AvlTree<R, K> {
    /// Records in ascending key order.
    pub fn iter(&self) -> Iter<'_, R> {
        Iter::new(&self.core, self.len(), Side::Left)
    }

    /// Records in descending key order.
    pub fn iter_rev(&self) -> Iter<'_, R> {
        Iter::new(&self.core, self.len(), Side::Right)
    }

    /// Calls `f` on each record in ascending order until it returns `true`,
    /// and returns that record.
    pub fn scan<F>(&self, mut f: F) -> Option<&R>
    where
        F: FnMut(&R) -> bool,
    {
        self.iter().find(|r| f(r))
    }

    /// Like [`scan`](Self::scan), in descending order.
    pub fn rev_scan<F>(&self, mut f: F) -> Option<&R>
    where
        F: FnMut(&R) -> bool,
    {
        self.iter_rev().find(|r| f(r))
    }

    /// Like [`scan`](Self::scan), threading `ctx` through every call.
    pub fn scan_with_ctx<C, F>(&self, ctx: &mut C, mut f: F) -> Option<&R>
    where
        F: FnMut(&R, &mut C) -> bool,
    {
        self.iter().find(|r| f(r, ctx))
    }

    /// Like [`rev_scan`](Self::rev_scan), threading `ctx` through every call.
    pub fn rev_scan_with_ctx<C, F>(&self, ctx: &mut C, mut f: F) -> Option<&R>
    where
        F: FnMut(&R, &mut C) -> bool,
    {
        self.iter_rev().find(|r| f(r, ctx))
    }

    /// Calls `f` on every record in ascending order.
    pub fn for_each<F>(&self, f: F)
    where
        F: FnMut(&R),
    {
        self.iter().for_each(f);
    }

    pub fn rev_for_each<F>(&self, f: F)
    where
        F: FnMut(&R),
    {
        self.iter_rev().for_each(f);
    }

    pub fn for_each_with_ctx<C, F>(&self, ctx: &mut C, mut f: F)
    where
        F: FnMut(&R, &mut C),
    {
        self.iter().for_each(|r| f(r, ctx));
    }

    pub fn rev_for_each_with_ctx<C, F>(&self, ctx: &mut C, mut f: F)
    where
        F: FnMut(&R, &mut C),
    {
        self.iter_rev().for_each(|r| f(r, ctx));
    }

    /// Chains the records into a singly linked list in ascending order.
    ///
    /// `set_next(record, next)` is called once per record, last record first,
    /// with the record that follows it (`None` for the last). Returns the head
    /// of the list, the smallest record.
    ///
    /// ```
    /// use std::cell::Cell;
    /// use avl_index::{AvlTree, KeyKind, TreeBuilder};
    ///
    /// struct Task {
    ///     priority: u8,
    ///     next: Cell<Option<u8>>,
    /// }
    ///
    /// let tasks: Vec<Task> = [3, 1, 2]
    ///     .into_iter()
    ///     .map(|priority| Task { priority, next: Cell::new(None) })
    ///     .collect();
    /// let mut tree: AvlTree<&Task, u8> = TreeBuilder::<&Task, u8>::native(KeyKind::U8)
    ///     .key(|t| &t.priority)
    ///     .build()
    ///     .unwrap();
    /// for t in &tasks {
    ///     tree.insert(t).unwrap();
    /// }
    ///
    /// let head = tree.link(|t, next| t.next.set(next.map(|n| n.priority)));
    /// assert_eq!(head.map(|t| t.priority), Some(1));
    /// assert_eq!(tasks[1].next.get(), Some(2));
    /// assert_eq!(tasks[0].next.get(), None);
    /// ```
    pub fn link<F>(&self, mut set_next: F) -> Option<&R>
    where
        F: FnMut(&R, Option<&R>),
    {
        let mut following = None;
        for record in self.iter_rev() {
            set_next(record, following);
            following = Some(record);
        }
        following
    }

    /// Chains the records into a list in descending order through
    /// `set_prev(record, previous)`, returning the largest record.
    pub fn rev_link<F>(&self, mut set_prev: F) -> Option<&R>
    where
        F: FnMut(&R, Option<&R>),
    {
        let mut preceding = None;
        for record in self.iter() {
            set_prev(record, preceding);
            preceding = Some(record);
        }
        preceding
    }
}

impl<'a, R, K: ?Sized> IntoIterator for &'a AvlTree<R, K> {
    type Item = &'a R;
    type IntoIter = Iter<'a, R>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
