//! # avl-index
//!
//! Height-balanced ordered indexes over caller-owned records.
//!
//! An [`AvlTree`] stores one handle per record in block-allocated nodes and
//! orders them by a key projected out of each record. Balance information
//! lives in the low bit of each child link, so a node costs two `u32` links
//! plus the handle (and, for natively ordered keys, a 64-bit folded key).
//!
//! Keys are ordered either by a caller comparator ([`KeyKind::Record`],
//! [`KeyKind::Member`], [`KeyKind::Indirect`]) or natively for integers,
//! floats and byte strings. Native keys are folded into an `i64` stored in
//! the node, so most comparisons never touch the record.
//!
//! ## Example
//!
//! ```rust
//! use avl_index::{AvlTree, DupPolicy, KeyKind, TreeBuilder};
//!
//! struct Order {
//!     id: u32,
//!     customer: &'static str,
//! }
//!
//! let orders = [
//!     Order { id: 7, customer: "kim" },
//!     Order { id: 3, customer: "lee" },
//!     Order { id: 9, customer: "kim" },
//! ];
//!
//! let mut by_id: AvlTree<&Order, u32> = TreeBuilder::<&Order, u32>::native(KeyKind::U32)
//!     .key(|o| &o.id)
//!     .build()
//!     .unwrap();
//! let mut by_customer: AvlTree<&Order, str> = TreeBuilder::<&Order, str>::native(KeyKind::Chars)
//!     .key(|o| o.customer)
//!     .duplicates(DupPolicy::Allow)
//!     .build()
//!     .unwrap();
//!
//! for o in &orders {
//!     by_id.insert(o).unwrap();
//!     by_customer.insert(o).unwrap();
//! }
//!
//! assert_eq!(by_id.locate_ge(&4).map(|o| o.id), Some(7));
//! assert_eq!(by_customer.locate("kim").map(|o| o.id), Some(7));
//! let ids: Vec<u32> = by_id.iter().map(|o| o.id).collect();
//! assert_eq!(ids, [3, 7, 9]);
//! ```

#![deny(unsafe_op_in_unsafe_fn)]

mod arena;
mod bulk;
mod config;
mod cursor;
mod engine;
mod error;
mod key;
mod locate;
mod node;
mod tree;

pub use bulk::Iter;
pub use config::TreeConfig;
pub use cursor::MAX_PATH_DEPTH;
pub use error::{Rejected, Result, TreeError};
pub use key::{
    has_fast_doubles, has_fast_floats, CmpFn, DupPolicy, Encoded, KeyFn, KeyKind, NativeKey,
};
pub use node::{MAX_BLOCK_SLOTS, MAX_NODES};
pub use tree::{AvlTree, NodeCount, TreeBuilder};


#[cfg(test)]
mod proptests;
