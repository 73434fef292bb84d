//! Node shapes and tagged child links.

use crate::arena::NodeArena;
use crate::config::TreeConfig;
use crate::error::Result;

// =============================================================================
// Index space
// =============================================================================

/// Bits of a `NodeId` addressing a slot within its block.
pub(crate) const OFFSET_BITS: u32 = 20;
/// Bits of a `NodeId` addressing a block.
pub(crate) const BLOCK_BITS: u32 = 11;
/// Number of blocks a single tree can chain.
pub(crate) const MAX_BLOCKS: usize = 1 << BLOCK_BITS;
/// Largest block; one offset value stays unused so no id collides with NULL.
pub const MAX_BLOCK_SLOTS: usize = (1 << OFFSET_BITS) - 1;
/// Largest configurable node count.
pub const MAX_NODES: usize = 1 << 30;

const OFFSET_MASK: u32 = (1 << OFFSET_BITS) - 1;

/// Address of a node: block index and slot offset packed into 31 bits.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct NodeId(u32);

impl NodeId {
    #[inline]
    pub(crate) fn new(block: usize, offset: usize) -> Self {
        debug_assert!(block < MAX_BLOCKS);
        debug_assert!(offset < MAX_BLOCK_SLOTS);
        Self(((block as u32) << OFFSET_BITS) | offset as u32)
    }

    #[inline]
    pub(crate) fn block(self) -> usize {
        (self.0 >> OFFSET_BITS) as usize
    }

    #[inline]
    pub(crate) fn offset(self) -> usize {
        (self.0 & OFFSET_MASK) as usize
    }
}

impl std::fmt::Debug for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "NodeId({}:{})", self.block(), self.offset())
    }
}

// =============================================================================
// Tagged link
// =============================================================================

/// Child link: node index in bits 1..32, "this subtree is deeper" flag in bit 0.
///
/// All-ones index bits = NULL. A NULL link may carry the flag transiently while
/// a removal unwinds; the parent clears it before returning.
#[derive(Clone, Copy, PartialEq, Eq)]
pub(crate) struct Link(u32);

impl Link {
    const DEEPER: u32 = 1;
    const NULL_INDEX: u32 = u32::MAX >> 1;
    pub(crate) const NULL: Link = Link(Self::NULL_INDEX << 1);

    /// Unflagged link to `id`.
    #[inline]
    pub(crate) fn to(id: NodeId) -> Self {
        Self(id.0 << 1)
    }

    #[inline]
    pub(crate) fn is_null(self) -> bool {
        self.0 >> 1 == Self::NULL_INDEX
    }

    #[inline]
    pub(crate) fn is_deeper(self) -> bool {
        self.0 & Self::DEEPER != 0
    }

    /// Same target, flag replaced.
    #[inline]
    pub(crate) fn with_deeper(self, deeper: bool) -> Self {
        Self((self.0 & !Self::DEEPER) | u32::from(deeper))
    }

    #[inline]
    pub(crate) fn deeper(self) -> Self {
        Self(self.0 | Self::DEEPER)
    }

    #[inline]
    pub(crate) fn shallow(self) -> Self {
        Self(self.0 & !Self::DEEPER)
    }

    #[inline]
    pub(crate) fn node(self) -> Option<NodeId> {
        if self.is_null() {
            None
        } else {
            Some(NodeId(self.0 >> 1))
        }
    }

    /// Target of a link known to be non-null.
    #[inline]
    pub(crate) fn id(self) -> NodeId {
        debug_assert!(!self.is_null(), "followed a NULL link");
        NodeId(self.0 >> 1)
    }
}

impl std::fmt::Debug for Link {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.node() {
            None => write!(f, "NULL")?,
            Some(id) => write!(f, "{id:?}")?,
        }
        if self.is_deeper() {
            write!(f, "+")?;
        }
        Ok(())
    }
}

/// Which child of a node.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Side {
    Left,
    Right,
}

impl Side {
    #[inline]
    pub(crate) fn opposite(self) -> Self {
        match self {
            Side::Left => Side::Right,
            Side::Right => Side::Left,
        }
    }
}

// =============================================================================
// Node shapes
// =============================================================================

/// Structural contract shared by both node shapes.
pub(crate) trait TreeNode<R> {
    fn data(&self) -> &R;
    fn into_data(self) -> R;
    fn child(&self, side: Side) -> Link;
    fn set_child(&mut self, side: Side, link: Link);

    /// Normalized key; external nodes compare through their record instead.
    #[inline]
    fn embedded_key(&self) -> i64 {
        0
    }
}

/// Node whose key lives in the record and is compared by callback.
pub(crate) struct ExternalNode<R> {
    data: R,
    left: Link,
    right: Link,
}

impl<R> ExternalNode<R> {
    pub(crate) fn new(data: R) -> Self {
        Self {
            data,
            left: Link::NULL,
            right: Link::NULL,
        }
    }
}

/// Node carrying a copy of its key normalized to `i64`.
pub(crate) struct EmbeddedNode<R> {
    key: i64,
    data: R,
    left: Link,
    right: Link,
}

impl<R> EmbeddedNode<R> {
    pub(crate) fn new(key: i64, data: R) -> Self {
        Self {
            key,
            data,
            left: Link::NULL,
            right: Link::NULL,
        }
    }
}

macro_rules! impl_tree_node {
    ($ty:ident $(, $key:ident)?) => {
        impl<R> TreeNode<R> for $ty<R> {
            #[inline]
            fn data(&self) -> &R {
                &self.data
            }

            #[inline]
            fn into_data(self) -> R {
                self.data
            }

            #[inline]
            fn child(&self, side: Side) -> Link {
                match side {
                    Side::Left => self.left,
                    Side::Right => self.right,
                }
            }

            #[inline]
            fn set_child(&mut self, side: Side, link: Link) {
                match side {
                    Side::Left => self.left = link,
                    Side::Right => self.right = link,
                }
            }

            $(
                #[inline]
                fn embedded_key(&self) -> i64 {
                    self.$key
                }
            )?
        }
    };
}

impl_tree_node!(ExternalNode);
impl_tree_node!(EmbeddedNode, key);

// =============================================================================
// Node store
// =============================================================================

/// The tree's node arena, in whichever shape its key kind needs.
pub(crate) enum NodeStore<R> {
    External(NodeArena<ExternalNode<R>>),
    Embedded(NodeArena<EmbeddedNode<R>>),
}

impl<R> NodeStore<R> {
    pub(crate) fn new(embedded: bool, config: &TreeConfig) -> Self {
        if embedded {
            Self::Embedded(NodeArena::new(config))
        } else {
            Self::External(NodeArena::new(config))
        }
    }

    /// Empty store of the same shape and growth settings.
    pub(crate) fn fresh(&self) -> Self {
        match self {
            Self::External(a) => Self::External(a.fresh()),
            Self::Embedded(a) => Self::Embedded(a.fresh()),
        }
    }

    #[inline]
    pub(crate) fn child(&self, id: NodeId, side: Side) -> Link {
        match self {
            Self::External(a) => a.get(id).child(side),
            Self::Embedded(a) => a.get(id).child(side),
        }
    }

    #[inline]
    pub(crate) fn set_child(&mut self, id: NodeId, side: Side, link: Link) {
        match self {
            Self::External(a) => a.get_mut(id).set_child(side, link),
            Self::Embedded(a) => a.get_mut(id).set_child(side, link),
        }
    }

    #[inline]
    pub(crate) fn data(&self, id: NodeId) -> &R {
        match self {
            Self::External(a) => a.get(id).data(),
            Self::Embedded(a) => a.get(id).data(),
        }
    }

    #[inline]
    pub(crate) fn embedded_key(&self, id: NodeId) -> i64 {
        match self {
            Self::External(a) => a.get(id).embedded_key(),
            Self::Embedded(a) => a.get(id).embedded_key(),
        }
    }

    /// Makes sure the next `place` has a slot.
    pub(crate) fn reserve(&mut self) -> Result<()> {
        match self {
            Self::External(a) => a.reserve(),
            Self::Embedded(a) => a.reserve(),
        }
    }

    /// Stores a detached node. `key` is ignored by the external shape.
    pub(crate) fn place(&mut self, key: i64, data: R) -> NodeId {
        match self {
            Self::External(a) => a.place(ExternalNode::new(data)),
            Self::Embedded(a) => a.place(EmbeddedNode::new(key, data)),
        }
    }

    pub(crate) fn release(&mut self, id: NodeId) -> R {
        match self {
            Self::External(a) => a.release(id).into_data(),
            Self::Embedded(a) => a.release(id).into_data(),
        }
    }

    pub(crate) fn clear(&mut self) {
        match self {
            Self::External(a) => a.clear(),
            Self::Embedded(a) => a.clear(),
        }
    }

    pub(crate) fn drain(&mut self, mut f: impl FnMut(R)) {
        match self {
            Self::External(a) => a.drain(|n| f(n.into_data())),
            Self::Embedded(a) => a.drain(|n| f(n.into_data())),
        }
    }

    pub(crate) fn memory_usage(&self) -> usize {
        match self {
            Self::External(a) => a.memory_usage(),
            Self::Embedded(a) => a.memory_usage(),
        }
    }

    pub(crate) fn block_count(&self) -> usize {
        match self {
            Self::External(a) => a.block_count(),
            Self::Embedded(a) => a.block_count(),
        }
    }
}
