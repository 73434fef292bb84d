//! Key kinds and comparison dispatch.
//!
//! Every tree compares keys through one of three strategies:
//!
//! - **Callback**: a caller-supplied `fn(&K, &K) -> Ordering` applied to keys
//!   projected out of the records (whole-record, member and indirected kinds).
//! - **Folded string**: the first 8 bytes are folded big-endian into the
//!   node's embedded `i64`, so most comparisons are a single integer compare.
//!   Equal folds fall back to a byte-wise comparison from byte 8 on.
//! - **Embedded integer**: numeric keys are normalized into `i64` so plain
//!   signed comparison reproduces the source type's order.

use std::cmp::Ordering;
use std::sync::OnceLock;

use crate::error::{Result, TreeError};
use crate::node::{NodeId, NodeStore};

/// Projects the key out of a record.
pub type KeyFn<R, K> = fn(&R) -> &K;

/// Three-way key comparison.
pub type CmpFn<K> = fn(&K, &K) -> Ordering;

type EncodeFn<K> = for<'a> fn(&'a K) -> Encoded<'a>;

/// How a tree locates and orders the key of each record.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum KeyKind {
    /// The whole record is the key, ordered by a comparator.
    Record,
    /// A member of the record, ordered by a comparator.
    Member,
    /// A value reached through a member of the record, ordered by a comparator.
    Indirect,
    /// A character buffer inside the record, ordered bytewise.
    Chars,
    /// A string referenced from the record, ordered bytewise.
    Str,
    I64,
    I32,
    I16,
    I8,
    U64,
    U32,
    U16,
    U8,
    F32,
    F64,
}

impl KeyKind {
    /// Kinds that need a caller-supplied comparator.
    pub fn is_callback(self) -> bool {
        matches!(self, KeyKind::Record | KeyKind::Member | KeyKind::Indirect)
    }

    pub fn is_string(self) -> bool {
        matches!(self, KeyKind::Chars | KeyKind::Str)
    }

    pub fn is_numeric(self) -> bool {
        !self.is_callback() && !self.is_string()
    }
}

/// Whether a tree accepts several records with equal keys.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum DupPolicy {
    /// Equal keys are refused with [`TreeError::DuplicateKey`].
    #[default]
    Reject,
    /// Equal keys are kept in insertion order.
    Allow,
}

// =============================================================================
// Native keys
// =============================================================================

/// A key in the form stored by embedded-key nodes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Encoded<'a> {
    /// Numeric key, already normalized for signed comparison.
    Int(i64),
    /// String key; folded into an `i64` prefix plus a byte tail.
    Bytes(&'a [u8]),
}

impl<'a> Encoded<'a> {
    #[inline]
    fn head(self) -> i64 {
        match self {
            Encoded::Int(v) => v,
            Encoded::Bytes(b) => fold_prefix(b),
        }
    }

    #[inline]
    fn bytes(self) -> Option<&'a [u8]> {
        match self {
            Encoded::Int(_) => None,
            Encoded::Bytes(b) => Some(b),
        }
    }
}

/// Key types the tree can order without a comparator.
pub trait NativeKey {
    /// Whether this type can be indexed under `kind`.
    fn accepts(kind: KeyKind) -> bool;

    /// Normalized form kept in the node.
    fn encode(&self) -> Encoded<'_>;

    /// Ordering used when the platform has no fast path for this type.
    fn fallback_cmp(&self, other: &Self) -> Ordering;
}

macro_rules! native_int {
    ($($ty:ty => $kind:ident),* $(,)?) => {
        $(
            impl NativeKey for $ty {
                fn accepts(kind: KeyKind) -> bool {
                    kind == KeyKind::$kind
                }

                #[inline]
                fn encode(&self) -> Encoded<'_> {
                    Encoded::Int(i64::from(*self))
                }

                fn fallback_cmp(&self, other: &Self) -> Ordering {
                    self.cmp(other)
                }
            }
        )*
    };
}

native_int!(i8 => I8, i16 => I16, i32 => I32, i64 => I64, u8 => U8, u16 => U16, u32 => U32);

impl NativeKey for u64 {
    fn accepts(kind: KeyKind) -> bool {
        kind == KeyKind::U64
    }

    #[inline]
    fn encode(&self) -> Encoded<'_> {
        Encoded::Int(bias_u64(*self))
    }

    fn fallback_cmp(&self, other: &Self) -> Ordering {
        self.cmp(other)
    }
}

impl NativeKey for f32 {
    fn accepts(kind: KeyKind) -> bool {
        kind == KeyKind::F32
    }

    #[inline]
    fn encode(&self) -> Encoded<'_> {
        Encoded::Int(f32_to_ordered(*self))
    }

    fn fallback_cmp(&self, other: &Self) -> Ordering {
        float_cmp(*self, *other)
    }
}

impl NativeKey for f64 {
    fn accepts(kind: KeyKind) -> bool {
        kind == KeyKind::F64
    }

    #[inline]
    fn encode(&self) -> Encoded<'_> {
        Encoded::Int(f64_to_ordered(*self))
    }

    fn fallback_cmp(&self, other: &Self) -> Ordering {
        float_cmp(*self, *other)
    }
}

macro_rules! native_bytes {
    ($($ty:ty => |$s:ident| $bytes:expr),* $(,)?) => {
        $(
            impl NativeKey for $ty {
                fn accepts(kind: KeyKind) -> bool {
                    kind.is_string()
                }

                #[inline]
                fn encode(&self) -> Encoded<'_> {
                    let $s = self;
                    Encoded::Bytes($bytes)
                }

                fn fallback_cmp(&self, other: &Self) -> Ordering {
                    self.cmp(other)
                }
            }
        )*
    };
}

native_bytes!(
    str => |s| s.as_bytes(),
    String => |s| s.as_bytes(),
    [u8] => |s| s,
    Vec<u8> => |s| s.as_slice(),
);

/// Moves `u64` into signed range so signed comparison keeps unsigned order.
#[inline]
fn bias_u64(v: u64) -> i64 {
    (v ^ (1 << 63)) as i64
}

#[inline]
fn f32_to_ordered(f: f32) -> i64 {
    if f > 0.0 {
        i64::from(f.to_bits())
    } else if f < 0.0 {
        -i64::from((-f).to_bits())
    } else {
        0
    }
}

#[inline]
fn f64_to_ordered(f: f64) -> i64 {
    if f > 0.0 {
        f.to_bits() as i64
    } else if f < 0.0 {
        -((-f).to_bits() as i64)
    } else {
        0
    }
}

fn float_cmp<F: PartialOrd>(a: F, b: F) -> Ordering {
    if a > b {
        Ordering::Greater
    } else if a < b {
        Ordering::Less
    } else {
        Ordering::Equal
    }
}

/// Whether `f32` keys can be embedded as bit-reinterpreted integers.
pub fn has_fast_floats() -> bool {
    static FAST: OnceLock<bool> = OnceLock::new();
    *FAST.get_or_init(|| f32_to_ordered(1.003_906_25) == 0x3F80_8000)
}

/// Whether `f64` keys can be embedded as bit-reinterpreted integers.
pub fn has_fast_doubles() -> bool {
    static FAST: OnceLock<bool> = OnceLock::new();
    *FAST.get_or_init(|| f64_to_ordered(1.000_000_476_837_158_203_125) == 0x3FF0_0000_8000_0000)
}

fn fast_path(kind: KeyKind) -> bool {
    match kind {
        KeyKind::F32 => has_fast_floats(),
        KeyKind::F64 => has_fast_doubles(),
        _ => true,
    }
}

// =============================================================================
// String folding
// =============================================================================

const WORD: usize = std::mem::size_of::<i64>();

/// Folds the first 8 bytes, zero-padded, so signed comparison matches
/// unsigned bytewise comparison.
#[inline]
pub(crate) fn fold_prefix(bytes: &[u8]) -> i64 {
    let mut word = [0u8; WORD];
    let n = bytes.len().min(WORD);
    word[..n].copy_from_slice(&bytes[..n]);
    bias_u64(u64::from_be_bytes(word))
}

/// Orders two byte strings whose folded prefixes are equal.
#[inline]
pub(crate) fn tail_cmp(a: &[u8], b: &[u8]) -> Ordering {
    if a.len() >= WORD && b.len() >= WORD {
        a[WORD..].cmp(&b[WORD..])
    } else {
        // One is a zero-padded prefix of the other.
        a.len().cmp(&b.len())
    }
}

// =============================================================================
// Dispatch
// =============================================================================

/// Native encoding of a key type, captured while the tree is built.
pub(crate) struct NativeHooks<K: ?Sized> {
    accepts: fn(KeyKind) -> bool,
    encode: EncodeFn<K>,
    fallback: CmpFn<K>,
    type_name: &'static str,
}

impl<K: NativeKey + ?Sized> NativeHooks<K> {
    pub(crate) fn of() -> Self {
        Self {
            accepts: K::accepts,
            encode: K::encode,
            fallback: K::fallback_cmp,
            type_name: std::any::type_name::<K>(),
        }
    }
}

/// Comparison strategy resolved at construction.
pub(crate) enum Dispatch<R, K: ?Sized> {
    Callback { key: KeyFn<R, K>, cmp: CmpFn<K> },
    Folded { key: KeyFn<R, K>, encode: EncodeFn<K> },
}

impl<R, K: ?Sized> Clone for Dispatch<R, K> {
    fn clone(&self) -> Self {
        match *self {
            Dispatch::Callback { key, cmp } => Dispatch::Callback { key, cmp },
            Dispatch::Folded { key, encode } => Dispatch::Folded { key, encode },
        }
    }
}

/// A search key prepared once per operation.
pub(crate) struct Query<'q, K: ?Sized> {
    key: &'q K,
    head: i64,
    bytes: Option<&'q [u8]>,
}

impl<R, K: ?Sized> Dispatch<R, K> {
    /// Checks the kind/comparator/key-type combination and picks a strategy.
    pub(crate) fn new(
        kind: KeyKind,
        key: KeyFn<R, K>,
        cmp: Option<CmpFn<K>>,
        native: Option<NativeHooks<K>>,
    ) -> Result<Self> {
        Self::with_fast_path(kind, key, cmp, native, fast_path(kind))
    }

    /// Like [`new`](Self::new); native kinds fall back to a comparator
    /// callback unless `fast` is set.
    pub(crate) fn with_fast_path(
        kind: KeyKind,
        key: KeyFn<R, K>,
        cmp: Option<CmpFn<K>>,
        native: Option<NativeHooks<K>>,
        fast: bool,
    ) -> Result<Self> {
        if kind.is_callback() {
            let cmp = cmp.ok_or(TreeError::MissingComparator { kind })?;
            return Ok(Dispatch::Callback { key, cmp });
        }
        if cmp.is_some() {
            return Err(TreeError::UnexpectedComparator { kind });
        }
        let hooks = native.ok_or(TreeError::UnsupportedKey { kind })?;
        if !(hooks.accepts)(kind) {
            return Err(TreeError::KeyKindMismatch {
                kind,
                key_type: hooks.type_name,
            });
        }
        if fast {
            Ok(Dispatch::Folded {
                key,
                encode: hooks.encode,
            })
        } else {
            Ok(Dispatch::Callback {
                key,
                cmp: hooks.fallback,
            })
        }
    }

    /// Embedded-key nodes are only used by the folded strategy.
    pub(crate) fn is_embedded(&self) -> bool {
        matches!(self, Dispatch::Folded { .. })
    }

    pub(crate) fn strategy(&self) -> &'static str {
        match self {
            Dispatch::Callback { .. } => "callback",
            Dispatch::Folded { .. } => "folded",
        }
    }

    #[inline]
    pub(crate) fn key_of<'r>(&self, record: &'r R) -> &'r K {
        match self {
            Dispatch::Callback { key, .. } | Dispatch::Folded { key, .. } => key(record),
        }
    }

    /// Value for the node's embedded key field.
    #[inline]
    pub(crate) fn head_of(&self, record: &R) -> i64 {
        match self {
            Dispatch::Callback { .. } => 0,
            Dispatch::Folded { key, encode } => encode(key(record)).head(),
        }
    }

    #[inline]
    pub(crate) fn query<'q>(&self, key: &'q K) -> Query<'q, K> {
        match self {
            Dispatch::Callback { .. } => Query {
                key,
                head: 0,
                bytes: None,
            },
            Dispatch::Folded { encode, .. } => {
                let encoded = encode(key);
                Query {
                    key,
                    head: encoded.head(),
                    bytes: encoded.bytes(),
                }
            }
        }
    }

    /// Orders the placed node `new`, whose embedded key is `head`, against
    /// node `id`. Folded keys only touch the records when the heads tie.
    #[inline]
    pub(crate) fn probe_placed(
        &self,
        head: i64,
        store: &NodeStore<R>,
        new: NodeId,
        id: NodeId,
    ) -> Ordering {
        match self {
            Dispatch::Callback { key, cmp } => cmp(key(store.data(new)), key(store.data(id))),
            Dispatch::Folded { key, encode } => match head.cmp(&store.embedded_key(id)) {
                Ordering::Equal => {
                    match (encode(key(store.data(new))).bytes(), encode(key(store.data(id))).bytes()) {
                        (Some(a), Some(b)) => tail_cmp(a, b),
                        _ => Ordering::Equal,
                    }
                }
                other => other,
            },
        }
    }

    /// Orders `query` against the key of node `id`.
    #[inline]
    pub(crate) fn probe(&self, query: &Query<'_, K>, store: &NodeStore<R>, id: NodeId) -> Ordering {
        match self {
            Dispatch::Callback { key, cmp } => cmp(query.key, key(store.data(id))),
            Dispatch::Folded { key, encode } => match query.head.cmp(&store.embedded_key(id)) {
                Ordering::Equal => match (query.bytes, encode(key(store.data(id))).bytes()) {
                    (Some(a), Some(b)) => tail_cmp(a, b),
                    _ => Ordering::Equal,
                },
                other => other,
            },
        }
    }
}
