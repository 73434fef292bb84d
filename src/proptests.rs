use super::{
    AvlTree, CmpFn, DupPolicy, KeyFn, KeyKind, NativeKey, TreeBuilder, TreeConfig, TreeError,
    MAX_PATH_DEPTH,
};

use proptest::prelude::*;
use proptest::test_runner::TestCaseError;
use std::cmp::Ordering;
use std::fmt::Debug;

/// Reference model: a sorted vector, equal keys kept in insertion order.
struct Model<R, K: ?Sized> {
    records: Vec<R>,
    key: KeyFn<R, K>,
    cmp: CmpFn<K>,
    dup: bool,
}

impl<R, K: ?Sized> Model<R, K> {
    fn new(key: KeyFn<R, K>, cmp: CmpFn<K>, dup: DupPolicy) -> Self {
        Self {
            records: Vec::new(),
            key,
            cmp,
            dup: dup == DupPolicy::Allow,
        }
    }

    /// Index of the first record with key `>= k`.
    fn lower(&self, k: &K) -> usize {
        self.records
            .partition_point(|r| (self.cmp)((self.key)(r), k) == Ordering::Less)
    }

    /// Index of the first record with key `> k`.
    fn upper(&self, k: &K) -> usize {
        self.records
            .partition_point(|r| (self.cmp)((self.key)(r), k) != Ordering::Greater)
    }

    fn insert(&mut self, record: R) -> bool {
        let k = (self.key)(&record);
        let (lo, up) = (self.lower(k), self.upper(k));
        if !self.dup && lo < up {
            return false;
        }
        self.records.insert(up, record);
        true
    }

    fn remove(&mut self, k: &K) -> Option<R> {
        let lo = self.lower(k);
        (lo < self.upper(k)).then(|| self.records.remove(lo))
    }
}

#[derive(Clone, Debug)]
enum Op<R> {
    Insert(R),
    /// Remove by the key of the carried record.
    Remove(R),
    Probe(R),
    Traverse(R),
    Copy,
    Empty,
}

fn validate_tree<R, K>(t: &AvlTree<R, K>, m: &Model<R, K>) -> Result<(), TestCaseError>
where
    R: Clone + PartialEq + Debug,
    K: ?Sized,
{
    prop_assert_eq!(t.core.validate(), m.records.len(), "reachable nodes must match len");
    prop_assert_eq!(t.len(), m.records.len());
    prop_assert!(t.height() <= MAX_PATH_DEPTH);

    let got: Vec<R> = t.iter().cloned().collect();
    prop_assert_eq!(&got, &m.records);
    let got: Vec<R> = t.iter_rev().cloned().collect();
    let expected: Vec<R> = m.records.iter().rev().cloned().collect();
    prop_assert_eq!(got, expected);
    Ok(())
}

fn check_locates<R, K>(t: &AvlTree<R, K>, m: &Model<R, K>, k: &K) -> Result<(), TestCaseError>
where
    R: PartialEq + Debug,
    K: ?Sized,
{
    let rs = &m.records;
    let (lo, up) = (m.lower(k), m.upper(k));
    prop_assert_eq!(t.locate(k), (lo < up).then(|| &rs[lo]));
    prop_assert_eq!(t.contains(k), lo < up);
    prop_assert_eq!(t.locate_ge(k), rs.get(lo));
    prop_assert_eq!(t.locate_gt(k), rs.get(up));
    prop_assert_eq!(t.locate_le(k), up.checked_sub(1).map(|i| &rs[i]));
    prop_assert_eq!(t.locate_lt(k), lo.checked_sub(1).map(|i| &rs[i]));
    prop_assert_eq!(t.locate_first(), rs.first());
    prop_assert_eq!(t.locate_last(), rs.last());
    Ok(())
}

fn check_traversal<R, K>(t: &mut AvlTree<R, K>, m: &Model<R, K>, k: &K) -> Result<(), TestCaseError>
where
    R: Clone + PartialEq + Debug,
    K: ?Sized,
{
    let (lo, up) = (m.lower(k), m.upper(k));

    let mut got = Vec::new();
    let mut cur = t.start(k).cloned();
    while let Some(r) = cur {
        got.push(r);
        cur = t.next().cloned();
    }
    prop_assert_eq!(&got[..], &m.records[lo..]);
    prop_assert!(!t.is_traversing());

    got.clear();
    let mut cur = t.rev_start(k).cloned();
    while let Some(r) = cur {
        got.push(r);
        cur = t.prev().cloned();
    }
    let expected: Vec<R> = m.records[..up].iter().rev().cloned().collect();
    prop_assert_eq!(got, expected);
    Ok(())
}

fn run<R, K>(t: &mut AvlTree<R, K>, m: &mut Model<R, K>, ops: Vec<Op<R>>) -> Result<(), TestCaseError>
where
    R: Clone + PartialEq + Debug,
    K: ?Sized,
{
    for op in ops {
        match op {
            Op::Insert(record) => {
                let expected = m.insert(record.clone());
                match t.insert(record) {
                    Ok(()) => {
                        prop_assert!(expected, "tree accepted a duplicate");
                    }
                    Err(rejected) => {
                        prop_assert!(!expected, "tree rejected a new key");
                        prop_assert_eq!(rejected.reason, TreeError::DuplicateKey);
                    }
                }
            }
            Op::Remove(record) => {
                let k = (m.key)(&record);
                prop_assert_eq!(t.remove(k), m.remove(k));
            }
            Op::Probe(record) => check_locates(t, m, (m.key)(&record))?,
            Op::Traverse(record) => check_traversal(t, m, (m.key)(&record))?,
            Op::Copy => {
                let copy = t.copy().map_err(|e| TestCaseError::fail(e.to_string()))?;
                prop_assert_eq!(copy.core.validate(), t.len());
                *t = copy;
            }
            Op::Empty => {
                t.empty();
                m.records.clear();
            }
        }
        prop_assert_eq!(t.len(), m.records.len());
    }
    validate_tree(t, m)
}

/// Natively keyed tree over `T` itself, checked against `Ord`.
fn check_native<T>(kind: KeyKind, dup: DupPolicy, ops: Vec<Op<T>>) -> Result<(), TestCaseError>
where
    T: NativeKey + Ord + Clone + Debug,
{
    let mut t = TreeBuilder::<T, T>::native(kind)
        .key(|r| r)
        .duplicates(dup)
        .build()
        .unwrap();
    let mut m: Model<T, T> = Model::new(|r| r, |a, b| a.cmp(b), dup);
    run(&mut t, &mut m, ops)
}

/// Runs the same workload on a folded and a comparator-backed float tree.
fn check_float_paths<T>(kind: KeyKind, dup: DupPolicy, ops: Vec<Op<T>>) -> Result<(), TestCaseError>
where
    T: NativeKey + PartialOrd + Clone + Debug,
{
    let mut contents = Vec::new();
    for (fast, strategy) in [(true, "folded"), (false, "callback")] {
        let mut t = TreeBuilder::<T, T>::native(kind)
            .key(|r| r)
            .duplicates(dup)
            .build_with_fast_path(fast)
            .unwrap();
        prop_assert_eq!(t.dispatch.strategy(), strategy);
        let mut m: Model<T, T> = Model::new(|r| r, |a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal), dup);
        run(&mut t, &mut m, ops.clone())?;
        contents.push(t.iter().cloned().collect::<Vec<T>>());
    }
    prop_assert_eq!(&contents[0], &contents[1]);
    Ok(())
}

// =============================================================================
// Strategies
// =============================================================================

#[derive(Clone, Debug)]
enum IntOp {
    Insert(i32),
    Remove(i32),
    Probe(i32),
    Traverse(i32),
    Copy,
    Empty,
}

/// Integer workload; small key ranges force plenty of duplicates and misses.
fn int_ops_strategy(max_len: usize) -> impl Strategy<Value = Vec<IntOp>> {
    let op = prop_oneof![
        20 => (-48i32..48).prop_map(IntOp::Insert),
        10 => (-48i32..48).prop_map(IntOp::Remove),
        10 => (-50i32..50).prop_map(IntOp::Probe),
        3 => (-50i32..50).prop_map(IntOp::Traverse),
        1 => Just(IntOp::Copy),
        1 => Just(IntOp::Empty),
    ];
    prop::collection::vec(op, 0..=max_len)
}

/// Tags every inserted record with a sequence number so equal keys stay distinguishable.
fn tag_ops(ops: Vec<IntOp>) -> Vec<Op<(i32, u32)>> {
    let mut seq = 0u32;
    ops.into_iter()
        .map(|op| match op {
            IntOp::Insert(k) => {
                seq += 1;
                Op::Insert((k, seq))
            }
            IntOp::Remove(k) => Op::Remove((k, 0)),
            IntOp::Probe(k) => Op::Probe((k, 0)),
            IntOp::Traverse(k) => Op::Traverse((k, 0)),
            IntOp::Copy => Op::Copy,
            IntOp::Empty => Op::Empty,
        })
        .collect()
}

fn ops_strategy<R: Clone + Debug + 'static>(
    record: impl Strategy<Value = R> + Clone + 'static,
) -> impl Strategy<Value = Vec<Op<R>>> {
    let op = prop_oneof![
        50 => record.clone().prop_map(Op::Insert),
        25 => record.clone().prop_map(Op::Remove),
        20 => record.clone().prop_map(Op::Probe),
        5 => record.prop_map(Op::Traverse),
        1 => Just(Op::Copy),
    ];
    prop::collection::vec(op, 0..=1000)
}

fn u64_strategy() -> impl Strategy<Value = u64> + Clone {
    prop_oneof![
        any::<u64>(),
        0u64..32,
        (u64::MAX - 32)..=u64::MAX,
        ((1u64 << 63) - 16)..((1u64 << 63) + 16),
    ]
}

fn f32_strategy() -> impl Strategy<Value = f32> + Clone {
    prop_oneof![
        4 => any::<i8>().prop_map(f32::from),
        4 => -1.0e4f32..1.0e4,
        1 => Just(0.0),
        1 => Just(-0.0),
        1 => Just(f32::INFINITY),
        1 => Just(f32::NEG_INFINITY),
        1 => Just(f32::MIN_POSITIVE),
        1 => Just(-f32::MIN_POSITIVE / 4.0),
    ]
}

fn f64_strategy() -> impl Strategy<Value = f64> + Clone {
    prop_oneof![
        4 => any::<i8>().prop_map(f64::from),
        4 => -1.0e6f64..1.0e6,
        1 => Just(0.0),
        1 => Just(-0.0),
        1 => Just(f64::INFINITY),
        1 => Just(f64::NEG_INFINITY),
        1 => Just(f64::MIN_POSITIVE),
        1 => Just(-f64::MIN_POSITIVE / 4.0),
    ]
}

fn string_strategy() -> impl Strategy<Value = String> + Clone {
    // Few letters and NUL bytes: long shared prefixes and zero-padding ties.
    let ch = prop::sample::select(vec!['a', 'b', 'z', '\0', 'é']);
    prop::collection::vec(ch, 0..=14).prop_map(|cs| cs.into_iter().collect::<String>())
}

fn bytes_strategy() -> impl Strategy<Value = Vec<u8>> + Clone {
    let b = prop::sample::select(vec![0u8, 1, b'a', 0x7f, 0x80, 0xff]);
    prop::collection::vec(b, 0..=12)
}

fn dup_strategy() -> impl Strategy<Value = DupPolicy> {
    prop_oneof![Just(DupPolicy::Reject), Just(DupPolicy::Allow)]
}

fn pair_key(r: &(i32, u32)) -> &i32 {
    &r.0
}

fn float_cmp(a: &f64, b: &f64) -> Ordering {
    a.partial_cmp(b).unwrap_or(Ordering::Equal)
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 256,
        max_shrink_iters: 50_000,
        .. ProptestConfig::default()
    })]

    #[test]
    fn prop_equivalence_i32(ops in int_ops_strategy(1500), dup in dup_strategy()) {
        let mut t = TreeBuilder::<(i32, u32), i32>::native(KeyKind::I32)
            .key(pair_key)
            .duplicates(dup)
            .build()
            .unwrap();
        let mut m: Model<(i32, u32), i32> = Model::new(pair_key, |a, b| a.cmp(b), dup);
        run(&mut t, &mut m, tag_ops(ops))?;
    }

    #[test]
    fn prop_equivalence_callback(ops in int_ops_strategy(1000)) {
        let mut t = TreeBuilder::<(i32, u32), i32>::custom(KeyKind::Member)
            .key(pair_key)
            .comparator(|a, b| b.cmp(a))
            .duplicates(DupPolicy::Allow)
            .build()
            .unwrap();
        let mut m: Model<(i32, u32), i32> = Model::new(pair_key, |a, b| b.cmp(a), DupPolicy::Allow);
        run(&mut t, &mut m, tag_ops(ops))?;
    }

    #[test]
    fn prop_equivalence_i8(ops in ops_strategy(any::<i8>()), dup in dup_strategy()) {
        check_native(KeyKind::I8, dup, ops)?;
    }

    #[test]
    fn prop_equivalence_i16(ops in ops_strategy(prop_oneof![any::<i16>(), -16i16..16]), dup in dup_strategy()) {
        check_native(KeyKind::I16, dup, ops)?;
    }

    #[test]
    fn prop_equivalence_i64(
        ops in ops_strategy(prop_oneof![
            any::<i64>(),
            -16i64..16,
            i64::MIN..(i64::MIN + 16),
            (i64::MAX - 16)..=i64::MAX,
        ]),
        dup in dup_strategy()
    ) {
        check_native(KeyKind::I64, dup, ops)?;
    }

    #[test]
    fn prop_equivalence_u8(ops in ops_strategy(any::<u8>()), dup in dup_strategy()) {
        check_native(KeyKind::U8, dup, ops)?;
    }

    #[test]
    fn prop_equivalence_u16(ops in ops_strategy(prop_oneof![any::<u16>(), 0u16..32, (u16::MAX - 32)..=u16::MAX]), dup in dup_strategy()) {
        check_native(KeyKind::U16, dup, ops)?;
    }

    #[test]
    fn prop_equivalence_u32(ops in ops_strategy(prop_oneof![any::<u32>(), 0u32..32, (u32::MAX - 32)..=u32::MAX]), dup in dup_strategy()) {
        check_native(KeyKind::U32, dup, ops)?;
    }

    #[test]
    fn prop_equivalence_u64(ops in ops_strategy(u64_strategy()), dup in dup_strategy()) {
        let mut t = TreeBuilder::<u64, u64>::native(KeyKind::U64)
            .key(|r| r)
            .duplicates(dup)
            .build()
            .unwrap();
        let mut m: Model<u64, u64> = Model::new(|r| r, |a, b| a.cmp(b), dup);
        run(&mut t, &mut m, ops)?;
    }

    #[test]
    fn prop_equivalence_f64(ops in ops_strategy(f64_strategy()), dup in dup_strategy()) {
        let mut t = TreeBuilder::<f64, f64>::native(KeyKind::F64)
            .key(|r| r)
            .duplicates(dup)
            .build()
            .unwrap();
        let mut m: Model<f64, f64> = Model::new(|r| r, float_cmp, dup);
        run(&mut t, &mut m, ops)?;
    }

    #[test]
    fn prop_float_paths_agree_f32(ops in ops_strategy(f32_strategy()), dup in dup_strategy()) {
        check_float_paths(KeyKind::F32, dup, ops)?;
    }

    #[test]
    fn prop_float_paths_agree_f64(ops in ops_strategy(f64_strategy()), dup in dup_strategy()) {
        check_float_paths(KeyKind::F64, dup, ops)?;
    }

    #[test]
    fn prop_equivalence_strings(ops in ops_strategy(string_strategy()), dup in dup_strategy()) {
        let mut t = TreeBuilder::<String, str>::native(KeyKind::Str)
            .key(|r| r.as_str())
            .duplicates(dup)
            .build()
            .unwrap();
        let mut m: Model<String, str> = Model::new(|r| r.as_str(), |a, b| a.cmp(b), dup);
        run(&mut t, &mut m, ops)?;
    }

    #[test]
    fn prop_equivalence_byte_slices(ops in ops_strategy(bytes_strategy()), dup in dup_strategy()) {
        let mut t = TreeBuilder::<Vec<u8>, [u8]>::native(KeyKind::Chars)
            .key(|r| r.as_slice())
            .duplicates(dup)
            .build()
            .unwrap();
        let mut m: Model<Vec<u8>, [u8]> = Model::new(|r| r.as_slice(), |a, b| a.cmp(b), dup);
        run(&mut t, &mut m, ops)?;
    }

    #[test]
    fn prop_equivalence_byte_vecs(ops in ops_strategy(bytes_strategy()), dup in dup_strategy()) {
        check_native(KeyKind::Str, dup, ops)?;
    }

    #[test]
    fn prop_equivalence_indirect(ops in ops_strategy(string_strategy().prop_map(Box::new)), dup in dup_strategy()) {
        let mut t = TreeBuilder::<Box<String>, str>::custom(KeyKind::Indirect)
            .key(|r| r.as_str())
            .comparator(|a, b| a.cmp(b))
            .duplicates(dup)
            .build()
            .unwrap();
        let mut m: Model<Box<String>, str> = Model::new(|r| r.as_str(), |a, b| a.cmp(b), dup);
        run(&mut t, &mut m, ops)?;
    }

    #[test]
    fn prop_capacity_is_enforced(keys in prop::collection::vec(any::<i16>(), 0..=200), limit in 1usize..64) {
        let mut t = TreeBuilder::<i16, i16>::native(KeyKind::I16)
            .key(|r| r)
            .duplicates(DupPolicy::Allow)
            .config(TreeConfig::with_max_nodes(limit))
            .build()
            .unwrap();
        for (i, k) in keys.iter().enumerate() {
            let res = t.insert(*k);
            if i < limit {
                prop_assert!(res.is_ok());
            } else {
                let rejected = res.unwrap_err();
                prop_assert_eq!(rejected.reason, TreeError::CapacityExhausted);
                prop_assert_eq!(rejected.record, *k);
            }
        }
        prop_assert_eq!(t.len(), keys.len().min(limit));
        prop_assert_eq!(t.is_full(), keys.len() >= limit);
    }
}

fn for_each_permutation<T: Clone>(items: &[T], mut f: impl FnMut(Vec<T>)) {
    fn rec<T: Clone>(items: &[T], used: &mut [bool], out: &mut Vec<T>, f: &mut impl FnMut(Vec<T>)) {
        if out.len() == items.len() {
            f(out.clone());
            return;
        }
        for i in 0..items.len() {
            if used[i] {
                continue;
            }
            used[i] = true;
            out.push(items[i].clone());
            rec(items, used, out, f);
            out.pop();
            used[i] = false;
        }
    }

    let mut used = vec![false; items.len()];
    let mut out = Vec::with_capacity(items.len());
    rec(items, &mut used, &mut out, &mut f);
}

fn string_tree() -> AvlTree<String, str> {
    TreeBuilder::<String, str>::native(KeyKind::Chars)
        .key(|r| r.as_str())
        .build()
        .unwrap()
}

#[test]
fn exhaustive_insert_order_small_set() {
    let keys: Vec<String> = ["a", "b", "c", "aa", "ab", "ba", "abcdefghij"]
        .iter()
        .map(|s| s.to_string())
        .collect();
    let mut sorted = keys.clone();
    sorted.sort();

    for_each_permutation(&keys, |perm| {
        let mut t = string_tree();
        for k in perm {
            t.insert(k).unwrap();
        }
        assert_eq!(t.core.validate(), keys.len());
        let got: Vec<String> = t.iter().cloned().collect();
        assert_eq!(got, sorted);
    });
}

#[test]
fn exhaustive_remove_order_small_set() {
    let keys: Vec<String> = ["a", "b", "c", "aa", "ab", "ba", "abcdefghij"]
        .iter()
        .map(|s| s.to_string())
        .collect();

    // Insert in a fixed order, then remove in all permutations.
    let mut base = string_tree();
    for k in &keys {
        base.insert(k.clone()).unwrap();
    }

    for_each_permutation(&keys, |perm| {
        let mut t = base.copy().unwrap();
        let mut left = keys.len();
        for k in perm {
            assert_eq!(t.remove(&k), Some(k.clone()));
            assert_eq!(t.remove(&k), None);
            left -= 1;
            assert_eq!(t.len(), left);
            assert_eq!(t.core.validate(), left);
        }
        assert!(t.core.root.is_null());
    });
}

#[test]
fn exhaustive_duplicate_removal_order() {
    // Every interleaving of three equal keys among four distinct ones must
    // still remove the equal ones oldest first.
    let keys = [(1, 0u32), (5, 1), (5, 2), (9, 3), (5, 4), (0, 5), (7, 6)];
    for_each_permutation(&keys, |perm| {
        let mut t = TreeBuilder::<(i32, u32), i32>::native(KeyKind::I32)
            .key(pair_key)
            .duplicates(DupPolicy::Allow)
            .build()
            .unwrap();
        let mut expected: Vec<u32> = Vec::new();
        for r in perm {
            if r.0 == 5 {
                expected.push(r.1);
            }
            t.insert(r).unwrap();
        }
        t.core.validate();
        for seq in expected {
            assert_eq!(t.remove(&5).map(|r| r.1), Some(seq));
            t.core.validate();
        }
        assert!(!t.contains(&5));
    });
}
