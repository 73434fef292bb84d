//! Tree configuration.

use crate::error::{Result, TreeError};
use crate::node::{MAX_BLOCK_SLOTS, MAX_NODES};

/// Allocator and capacity settings for a tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeConfig {
    /// Block growth shift: a new block holds `(allocated >> shift) + 1` nodes.
    /// Default: 1 (each block is about half of everything allocated so far)
    pub increment_shift: u32,

    /// Upper bound on the number of nodes in one block.
    /// Default: 1024 * 1024 - 1
    pub max_increment: usize,

    /// Number of live nodes at which inserts are refused.
    /// Default: 2^30
    pub max_nodes: usize,
}

impl Default for TreeConfig {
    fn default() -> Self {
        Self {
            increment_shift: 1,
            max_increment: MAX_BLOCK_SLOTS,
            max_nodes: MAX_NODES,
        }
    }
}

impl TreeConfig {
    /// Config with a lower node limit, keeping the default allocator growth.
    pub fn with_max_nodes(max_nodes: usize) -> Self {
        Self {
            max_nodes,
            ..Self::default()
        }
    }

    /// Checks every field against the node index space.
    pub fn validate(&self) -> Result<()> {
        if self.increment_shift >= usize::BITS {
            return Err(TreeError::InvalidConfig(format!(
                "increment_shift must be < {}, got {}",
                usize::BITS,
                self.increment_shift
            )));
        }
        if self.max_increment == 0 || self.max_increment > MAX_BLOCK_SLOTS {
            return Err(TreeError::InvalidConfig(format!(
                "max_increment must be in 1..={MAX_BLOCK_SLOTS}, got {}",
                self.max_increment
            )));
        }
        if self.max_nodes == 0 || self.max_nodes > MAX_NODES {
            return Err(TreeError::InvalidConfig(format!(
                "max_nodes must be in 1..={MAX_NODES}, got {}",
                self.max_nodes
            )));
        }
        Ok(())
    }

    /// Size of the next block given the number of slots allocated so far.
    #[inline]
    pub(crate) fn next_increment(&self, allocated: usize) -> usize {
        ((allocated >> self.increment_shift) + 1).min(self.max_increment)
    }
}
