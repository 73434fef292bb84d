//! The tree handle, its builder and lifecycle operations.

use std::fmt;

use tracing::debug;

use crate::config::TreeConfig;
use crate::cursor::Path;
use crate::engine::Core;
use crate::error::{Rejected, Result, TreeError};
use crate::key::{CmpFn, Dispatch, DupPolicy, KeyFn, KeyKind, NativeHooks, NativeKey};
use crate::node::{Link, NodeStore};

/// Live node count, as reported by [`AvlTree::node_count`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NodeCount {
    Exact(usize),
    /// The tree holds its configured maximum and refuses further inserts.
    AtCapacity,
}

/// An ordered index over caller-owned records.
///
/// `R` is the handle stored per record (a reference, an id, an `Rc`...). The
/// tree never looks behind the handle except through the key extractor, and
/// never clones or drops records on its own. `K` is the key type the extractor
/// projects out of a record; lookups take a `&K`.
///
/// Trees are built with [`TreeBuilder`], or [`AvlTree::by_record`] when the
/// record itself is the key.
pub struct AvlTree<R, K: ?Sized = R> {
    pub(crate) core: Core<R>,
    pub(crate) dispatch: Dispatch<R, K>,
    pub(crate) path: Option<Path>,
    kind: KeyKind,
    dup: DupPolicy,
    count: usize,
    config: TreeConfig,
}

impl<R, K: ?Sized> AvlTree<R, K> {
    fn assemble(kind: KeyKind, dup: DupPolicy, dispatch: Dispatch<R, K>, config: TreeConfig) -> Self {
        debug!(
            ?kind,
            ?dup,
            strategy = dispatch.strategy(),
            max_nodes = config.max_nodes,
            "tree created"
        );
        let store = NodeStore::new(dispatch.is_embedded(), &config);
        Self {
            core: Core::new(store),
            dispatch,
            path: None,
            kind,
            dup,
            count: 0,
            config,
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.count
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Whether the tree refuses further inserts.
    #[inline]
    pub fn is_full(&self) -> bool {
        self.count >= self.config.max_nodes
    }

    pub fn node_count(&self) -> NodeCount {
        if self.is_full() {
            NodeCount::AtCapacity
        } else {
            NodeCount::Exact(self.count)
        }
    }

    pub fn kind(&self) -> KeyKind {
        self.kind
    }

    pub fn dup_policy(&self) -> DupPolicy {
        self.dup
    }

    pub fn config(&self) -> &TreeConfig {
        &self.config
    }

    #[inline]
    pub(crate) fn allows_duplicates(&self) -> bool {
        self.dup == DupPolicy::Allow
    }

    /// Bytes held by node blocks.
    pub fn memory_usage(&self) -> usize {
        self.core.store.memory_usage()
    }

    /// Number of node blocks currently allocated.
    pub fn block_count(&self) -> usize {
        self.core.store.block_count()
    }

    /// Height of the tree (0 when empty). Walks every node.
    pub fn height(&self) -> usize {
        self.core.height()
    }

    /// Key of a stored record.
    pub fn key_of<'r>(&self, record: &'r R) -> &'r K {
        self.dispatch.key_of(record)
    }

    /// Adds `record` to the tree.
    ///
    /// On failure the tree is unchanged and the record is handed back with the
    /// reason: [`TreeError::DuplicateKey`], [`TreeError::OutOfMemory`] or
    /// [`TreeError::CapacityExhausted`]. Any traversal in progress is ended
    /// either way.
    pub fn insert(&mut self, record: R) -> std::result::Result<(), Rejected<R>> {
        self.path = None;
        if self.is_full() {
            return Err(Rejected::new(TreeError::CapacityExhausted, record));
        }
        if let Err(reason) = self.core.store.reserve() {
            return Err(Rejected::new(reason, record));
        }

        let head = self.dispatch.head_of(&record);
        let new = self.core.store.place(head, record);
        let dup = self.allows_duplicates();
        let dispatch = &self.dispatch;
        let inserted = self
            .core
            .insert(new, dup, |store, id| dispatch.probe_placed(head, store, new, id));
        if !inserted {
            let record = self.core.store.release(new);
            return Err(Rejected::new(TreeError::DuplicateKey, record));
        }

        self.count += 1;
        Ok(())
    }

    /// Removes and returns the record with key `key`; the oldest one if there
    /// are several. Any traversal in progress is ended.
    pub fn remove(&mut self, key: &K) -> Option<R> {
        self.path = None;
        let dup = self.allows_duplicates();
        let query = self.dispatch.query(key);
        let dispatch = &self.dispatch;
        let removed = self
            .core
            .remove(dup, |store, id| dispatch.probe(&query, store, id))?;
        self.count -= 1;
        Some(self.core.store.release(removed))
    }

    /// Drops every node, keeping the tree usable.
    pub fn empty(&mut self) {
        self.path = None;
        self.core.store.clear();
        self.core.root = Link::NULL;
        self.count = 0;
    }

    /// Drops every node, handing each record to `f` in storage order.
    pub fn empty_with<F>(&mut self, f: F)
    where
        F: FnMut(R),
    {
        self.path = None;
        self.core.store.drain(f);
        self.core.root = Link::NULL;
        self.count = 0;
    }

    /// Releases the tree.
    pub fn free(self) {
        drop(self);
    }

    /// Releases the tree, handing each surviving record to `f`.
    pub fn free_with<F>(mut self, f: F)
    where
        F: FnMut(R),
    {
        self.empty_with(f);
    }

    /// Copies the tree's structure into freshly allocated blocks.
    ///
    /// Record handles are cloned; the records behind them are not. The copy
    /// has no traversal in progress.
    pub fn copy(&self) -> Result<Self>
    where
        R: Clone,
    {
        let mut store = self.core.store.fresh();
        let root = self.core.copy_into(&mut store)?;
        debug!(nodes = self.count, blocks = store.block_count(), "tree copied");
        Ok(Self {
            core: Core { root, store },
            dispatch: self.dispatch.clone(),
            path: None,
            kind: self.kind,
            dup: self.dup,
            count: self.count,
            config: self.config.clone(),
        })
    }
}

impl<R> AvlTree<R, R> {
    /// Tree whose records are their own keys, ordered by `cmp`.
    pub fn by_record(dup: DupPolicy, cmp: CmpFn<R>) -> Self {
        let dispatch = Dispatch::Callback {
            key: |r| r,
            cmp,
        };
        Self::assemble(KeyKind::Record, dup, dispatch, TreeConfig::default())
    }
}

impl<R: fmt::Debug, K: ?Sized> fmt::Debug for AvlTree<R, K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}

// =============================================================================
// Builder
// =============================================================================

/// Configures and validates a new [`AvlTree`].
///
/// ```
/// use avl_index::{AvlTree, DupPolicy, KeyKind, TreeBuilder};
///
/// struct User {
///     name: String,
///     age: u8,
/// }
///
/// let users = [
///     User { name: "ada".into(), age: 36 },
///     User { name: "alan".into(), age: 41 },
/// ];
/// let mut by_name: AvlTree<&User, str> = TreeBuilder::<&User, str>::native(KeyKind::Str)
///     .key(|u| u.name.as_str())
///     .build()
///     .unwrap();
/// let mut by_age: AvlTree<&User, u8> = TreeBuilder::<&User, u8>::custom(KeyKind::Member)
///     .key(|u| &u.age)
///     .comparator(|a, b| b.cmp(a))
///     .duplicates(DupPolicy::Allow)
///     .build()
///     .unwrap();
/// for u in &users {
///     by_name.insert(u).unwrap();
///     by_age.insert(u).unwrap();
/// }
/// assert_eq!(by_name.locate("alan").map(|u| u.age), Some(41));
/// assert_eq!(by_age.locate_first().map(|u| u.name.as_str()), Some("alan"));
/// ```
pub struct TreeBuilder<R, K: ?Sized = R> {
    kind: KeyKind,
    dup: DupPolicy,
    key: Option<KeyFn<R, K>>,
    cmp: Option<CmpFn<K>>,
    native: Option<NativeHooks<K>>,
    config: TreeConfig,
}

impl<R, K: NativeKey + ?Sized> TreeBuilder<R, K> {
    /// Builder for a key type the tree orders itself.
    pub fn native(kind: KeyKind) -> Self {
        let mut builder = Self::custom(kind);
        builder.native = Some(NativeHooks::of());
        builder
    }
}

impl<R, K: ?Sized> TreeBuilder<R, K> {
    /// Builder for a key type ordered by a comparator.
    pub fn custom(kind: KeyKind) -> Self {
        Self {
            kind,
            dup: DupPolicy::default(),
            key: None,
            cmp: None,
            native: None,
            config: TreeConfig::default(),
        }
    }

    /// How to find the key in a record.
    pub fn key(mut self, key: KeyFn<R, K>) -> Self {
        self.key = Some(key);
        self
    }

    /// Key ordering; required for callback kinds and refused otherwise.
    pub fn comparator(mut self, cmp: CmpFn<K>) -> Self {
        self.cmp = Some(cmp);
        self
    }

    pub fn duplicates(mut self, dup: DupPolicy) -> Self {
        self.dup = dup;
        self
    }

    pub fn config(mut self, config: TreeConfig) -> Self {
        self.config = config;
        self
    }

    /// Validates the combination and creates an empty tree.
    pub fn build(self) -> Result<AvlTree<R, K>> {
        self.config.validate()?;
        let key = self.key.ok_or(TreeError::MissingKeyExtractor)?;
        let dispatch = Dispatch::new(self.kind, key, self.cmp, self.native)?;
        Ok(AvlTree::assemble(self.kind, self.dup, dispatch, self.config))
    }

    /// Like [`build`](Self::build) with the native fast path forced on or off.
    #[cfg(test)]
    pub(crate) fn build_with_fast_path(self, fast: bool) -> Result<AvlTree<R, K>> {
        self.config.validate()?;
        let key = self.key.ok_or(TreeError::MissingKeyExtractor)?;
        let dispatch = Dispatch::with_fast_path(self.kind, key, self.cmp, self.native, fast)?;
        Ok(AvlTree::assemble(self.kind, self.dup, dispatch, self.config))
    }
}
