//! Block allocator for tree nodes.
//!
//! Nodes live in a chain of blocks that grow geometrically: each new block
//! holds `(allocated >> shift) + 1` slots, capped at `max_increment`. Removed
//! nodes go onto an intrusive free list threaded through the vacated slots and
//! are reused before any block space. Blocks are only released together, in
//! O(block count), when the tree is emptied.

use tracing::trace;

use crate::config::TreeConfig;
use crate::error::{Result, TreeError};
use crate::node::{NodeId, MAX_BLOCKS};

/// A slot is either a live node or a link in the free list.
enum Slot<N> {
    Live(N),
    Free(Option<NodeId>),
}

pub(crate) struct NodeArena<N> {
    blocks: Vec<Vec<Slot<N>>>,
    /// Head of the free list.
    free: Option<NodeId>,
    /// Slots in the current (last) block.
    block_len: usize,
    /// Slots across all blocks.
    allocated: usize,
    config: TreeConfig,
}

impl<N> NodeArena<N> {
    pub(crate) fn new(config: &TreeConfig) -> Self {
        Self {
            blocks: Vec::new(),
            free: None,
            block_len: 0,
            allocated: 0,
            config: config.clone(),
        }
    }

    /// Empty arena with the same growth settings.
    pub(crate) fn fresh(&self) -> Self {
        Self::new(&self.config)
    }

    #[inline]
    fn remaining(&self) -> usize {
        self.blocks
            .last()
            .map_or(0, |block| self.block_len - block.len())
    }

    /// Guarantees that the next `place` succeeds without allocating.
    pub(crate) fn reserve(&mut self) -> Result<()> {
        if self.free.is_some() || self.remaining() > 0 {
            return Ok(());
        }
        self.grow()
    }

    fn grow(&mut self) -> Result<()> {
        if self.blocks.len() >= MAX_BLOCKS {
            return Err(TreeError::OutOfMemory);
        }
        let increment = self.config.next_increment(self.allocated);

        let mut block = Vec::new();
        block
            .try_reserve_exact(increment)
            .map_err(|_| TreeError::OutOfMemory)?;
        self.blocks
            .try_reserve(1)
            .map_err(|_| TreeError::OutOfMemory)?;
        self.blocks.push(block);
        self.block_len = increment;
        self.allocated += increment;

        trace!(
            block = self.blocks.len() - 1,
            increment,
            allocated = self.allocated,
            "node block allocated"
        );
        Ok(())
    }

    /// Stores `node`, reusing a freed slot if there is one. Call `reserve` first.
    pub(crate) fn place(&mut self, node: N) -> NodeId {
        if let Some(id) = self.free {
            let slot = &mut self.blocks[id.block()][id.offset()];
            let next = match slot {
                Slot::Free(next) => *next,
                Slot::Live(_) => panic!("free list points at live node {id:?}"),
            };
            *slot = Slot::Live(node);
            self.free = next;
            return id;
        }

        debug_assert!(self.remaining() > 0, "place without reserve");
        let block = self.blocks.len() - 1;
        let slots = &mut self.blocks[block];
        let id = NodeId::new(block, slots.len());
        slots.push(Slot::Live(node));
        id
    }

    /// Detaches the node at `id` and pushes its slot onto the free list.
    pub(crate) fn release(&mut self, id: NodeId) -> N {
        let slot = std::mem::replace(
            &mut self.blocks[id.block()][id.offset()],
            Slot::Free(self.free),
        );
        self.free = Some(id);
        match slot {
            Slot::Live(node) => node,
            Slot::Free(_) => panic!("double release of {id:?}"),
        }
    }

    #[inline]
    pub(crate) fn get(&self, id: NodeId) -> &N {
        match &self.blocks[id.block()][id.offset()] {
            Slot::Live(node) => node,
            Slot::Free(_) => panic!("{id:?} is on the free list"),
        }
    }

    #[inline]
    pub(crate) fn get_mut(&mut self, id: NodeId) -> &mut N {
        match &mut self.blocks[id.block()][id.offset()] {
            Slot::Live(node) => node,
            Slot::Free(_) => panic!("{id:?} is on the free list"),
        }
    }

    /// Releases every block.
    pub(crate) fn clear(&mut self) {
        trace!(blocks = self.blocks.len(), "releasing node blocks");
        self.blocks = Vec::new();
        self.reset();
    }

    /// Releases every block, handing each live node to `f` on the way.
    pub(crate) fn drain(&mut self, mut f: impl FnMut(N)) {
        let blocks = std::mem::take(&mut self.blocks);
        trace!(blocks = blocks.len(), "draining node blocks");
        for block in blocks {
            for slot in block {
                if let Slot::Live(node) = slot {
                    f(node);
                }
            }
        }
        self.reset();
    }

    fn reset(&mut self) {
        self.free = None;
        self.block_len = 0;
        self.allocated = 0;
    }

    pub(crate) fn block_count(&self) -> usize {
        self.blocks.len()
    }

    pub(crate) fn memory_usage(&self) -> usize {
        self.blocks.capacity() * std::mem::size_of::<Vec<Slot<N>>>()
            + self
                .blocks
                .iter()
                .map(|b| b.capacity() * std::mem::size_of::<Slot<N>>())
                .sum::<usize>()
    }
}
