#![cfg(test)]

// Property tests for OrderedMap kept inside the crate next to the unit
// tests. The model is a plain Vec of (key, value) in insertion order.

use crate::entry::{Entry, Value};
use crate::error::MapError;
use crate::ordered_map::OrderedMap;
use core::hash::{BuildHasher, Hasher};
use proptest::prelude::*;

#[derive(Clone, Debug)]
enum Mv {
    Int(i64),
    Arr(Vec<u8>),
    Txt(String),
}

impl Mv {
    fn to_value(&self) -> Value {
        match self {
            Mv::Int(v) => Value::integer(*v),
            Mv::Arr(b) => Value::array(b).unwrap(),
            Mv::Txt(s) => Value::text(s).unwrap(),
        }
    }

    fn matches(&self, e: &Entry) -> bool {
        match self {
            Mv::Int(v) => e.integer() == Ok(*v),
            Mv::Arr(b) => e.array() == Ok(b.as_slice()),
            Mv::Txt(s) => e.text() == Ok(s.as_str()),
        }
    }
}

// Pool-indexed operations so shrinking moves toward earlier keys and
// shorter op lists.
#[derive(Clone, Debug)]
enum Op {
    Insert(usize, Mv),
    SetByKey(usize, Mv),
    SetByIndex(usize, Mv),
    RemoveByKey(usize),
    RemoveByIndex(usize),
    GetByKey(usize),
    GetByIndex(usize),
    Clear,
}

fn arb_value() -> impl Strategy<Value = Mv> {
    prop_oneof![
        any::<i64>().prop_map(Mv::Int),
        proptest::collection::vec(any::<u8>(), 0..8).prop_map(Mv::Arr),
        "[a-z]{0,6}".prop_map(Mv::Txt),
    ]
}

fn arb_scenario() -> impl Strategy<Value = (Vec<String>, Vec<Op>)> {
    proptest::collection::vec("[a-z]{0,4}", 1..=10).prop_flat_map(|pool| {
        let idxs: Vec<usize> = (0..pool.len()).collect();
        let idx = proptest::sample::select(idxs);
        let pos = 0usize..12;
        let op = prop_oneof![
            4 => (idx.clone(), arb_value()).prop_map(|(i, v)| Op::Insert(i, v)),
            2 => (idx.clone(), arb_value()).prop_map(|(i, v)| Op::SetByKey(i, v)),
            2 => (pos.clone(), arb_value()).prop_map(|(n, v)| Op::SetByIndex(n, v)),
            2 => idx.clone().prop_map(Op::RemoveByKey),
            2 => pos.clone().prop_map(Op::RemoveByIndex),
            1 => idx.clone().prop_map(Op::GetByKey),
            1 => pos.prop_map(Op::GetByIndex),
            1 => Just(Op::Clear),
        ];
        proptest::collection::vec(op, 1..80).prop_map(move |ops| (pool.clone(), ops))
    })
}

fn pos_of(model: &[(String, Mv)], k: &str) -> Option<usize> {
    model.iter().position(|(mk, _)| mk == k)
}

fn run_scenario<S: BuildHasher>(
    mut sut: OrderedMap<S>,
    pool: &[String],
    ops: Vec<Op>,
) -> Result<(), TestCaseError> {
    let mut model: Vec<(String, Mv)> = Vec::new();

    for op in ops {
        match op {
            Op::Insert(i, v) => {
                let k = &pool[i];
                let already = pos_of(&model, k).is_some();
                let cap_before = sut.capacity();
                let len_before = sut.len();
                match sut.insert(k, v.to_value()) {
                    Ok(()) => {
                        prop_assert!(!already, "insert must fail on duplicate");
                        if cap_before != 0 && len_before >= cap_before {
                            prop_assert_eq!(sut.capacity(), cap_before * 2);
                        }
                        model.push((k.clone(), v));
                    }
                    Err(MapError::DuplicateKey(dk)) => {
                        prop_assert!(already, "duplicate error only when key exists");
                        prop_assert_eq!(&dk, k);
                        prop_assert_eq!(sut.capacity(), cap_before);
                    }
                    Err(other) => prop_assert!(false, "unexpected error {:?}", other),
                }
            }
            Op::SetByKey(i, v) => {
                let k = &pool[i];
                sut.set_by_key(k, v.to_value()).unwrap();
                match pos_of(&model, k) {
                    Some(p) => model[p].1 = v,
                    None => model.push((k.clone(), v)),
                }
            }
            Op::SetByIndex(n, v) => {
                let res = sut.set_by_index(n, v.to_value());
                if n < model.len() {
                    prop_assert!(res.is_ok());
                    model[n].1 = v;
                } else {
                    prop_assert_eq!(
                        res,
                        Err(MapError::IndexOutOfRange { index: n, len: model.len() })
                    );
                }
            }
            Op::RemoveByKey(i) => {
                let k = &pool[i];
                match (sut.remove_by_key(k), pos_of(&model, k)) {
                    (Ok(e), Some(p)) => {
                        let (mk, mv) = model.remove(p);
                        prop_assert_eq!(e.key(), mk.as_str());
                        prop_assert!(mv.matches(&e));
                    }
                    (Err(MapError::KeyNotFound(_)), None) => {}
                    (res, p) => prop_assert!(false, "mismatch: {:?} vs model {:?}", res, p),
                }
                prop_assert!(!sut.has_key(k));
            }
            Op::RemoveByIndex(n) => match sut.remove_by_index(n) {
                Ok(e) => {
                    prop_assert!(n < model.len());
                    let (mk, mv) = model.remove(n);
                    prop_assert_eq!(e.key(), mk.as_str());
                    prop_assert!(mv.matches(&e));
                }
                Err(err) => {
                    prop_assert!(n >= model.len());
                    prop_assert_eq!(err, MapError::IndexOutOfRange { index: n, len: model.len() });
                }
            },
            Op::GetByKey(i) => {
                let k = &pool[i];
                match (sut.get_by_key(k), pos_of(&model, k)) {
                    (Some(e), Some(p)) => {
                        prop_assert!(model[p].1.matches(e));
                        prop_assert_eq!(sut.position_of(k), Some(p));
                    }
                    (None, None) => {}
                    (e, p) => prop_assert!(false, "mismatch: {:?} vs model {:?}", e, p),
                }
            }
            Op::GetByIndex(n) => match (sut.get_by_index(n), model.get(n)) {
                (Some(e), Some((mk, mv))) => {
                    prop_assert_eq!(e.key(), mk.as_str());
                    prop_assert!(mv.matches(e));
                }
                (None, None) => {}
                (e, m) => prop_assert!(false, "mismatch: {:?} vs model {:?}", e, m),
            },
            Op::Clear => {
                sut.clear();
                model.clear();
                prop_assert_eq!(sut.capacity(), 0);
            }
        }

        // Post-conditions after each op
        // 1) Size parity
        prop_assert_eq!(sut.len(), model.len());
        prop_assert_eq!(sut.is_empty(), model.is_empty());
        // 2) Insertion order parity
        let keys: Vec<&str> = sut.keys().collect();
        let mkeys: Vec<&str> = model.iter().map(|(k, _)| k.as_str()).collect();
        prop_assert_eq!(keys, mkeys);
        // 3) has_key parity over the whole pool
        for k in pool {
            prop_assert_eq!(sut.has_key(k), pos_of(&model, k).is_some());
        }
        // 4) Capacity stays a power of two once allocated
        let cap = sut.capacity();
        prop_assert!(cap == 0 || cap.is_power_of_two());
    }
    Ok(())
}

// Property: state-machine equivalence against an ordered Vec model.
// Invariants exercised across random operation sequences:
// - Duplicate inserts fail without touching the map or its capacity.
// - Capacity doubles exactly when an insert finds len == capacity.
// - `get_by_index` follows insertion order; removals shift later positions.
// - `set_*` never changes len or position and replaces the value.
// - `remove_*` returns the removed entry and the key becomes absent.
// - `clear` empties the map and resets capacity.
proptest! {
    #![proptest_config(ProptestConfig { cases: 64, .. ProptestConfig::default() })]
    #[test]
    fn prop_state_machine((pool, ops) in arb_scenario()) {
        run_scenario(OrderedMap::new(), &pool, ops)?;
    }
}

// Collision variant using a constant hasher: every key shares one chain.
#[derive(Clone, Default)]
struct ConstBuildHasher;
struct ConstHasher;
impl BuildHasher for ConstBuildHasher {
    type Hasher = ConstHasher;
    fn build_hasher(&self) -> Self::Hasher {
        ConstHasher
    }
}
impl Hasher for ConstHasher {
    fn write(&mut self, _bytes: &[u8]) {}
    fn finish(&self) -> u64 {
        0
    }
}

// Property: same invariants under worst-case collisions. This stresses the
// full key comparison on hash match and chain maintenance on removal.
proptest! {
    #![proptest_config(ProptestConfig { cases: 64, .. ProptestConfig::default() })]
    #[test]
    fn prop_state_machine_with_collisions((pool, ops) in arb_scenario()) {
        run_scenario(OrderedMap::with_hasher(ConstBuildHasher), &pool, ops)?;
    }
}

// Property: a preallocated map behaves like a lazily created one.
proptest! {
    #![proptest_config(ProptestConfig { cases: 32, .. ProptestConfig::default() })]
    #[test]
    fn prop_state_machine_preallocated(buckets in 0usize..40, (pool, ops) in arb_scenario()) {
        run_scenario(OrderedMap::with_capacity(buckets).unwrap(), &pool, ops)?;
    }
}
