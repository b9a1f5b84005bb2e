#![cfg(test)]

// Property tests for RawTable kept inside the crate so they can check the
// structural invariants directly after every operation.

use crate::key::Key;
use crate::raw_table::{RawTable, Slot};
use proptest::prelude::*;
use std::collections::BTreeMap;

// Orderable mirror of the key shapes exercised here.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
enum ModelKey {
    Int(i64),
    Str(String),
    // Finite, non-zero floats stored by bit pattern.
    Float(u64),
}

impl ModelKey {
    fn key(&self) -> Key {
        match self {
            ModelKey::Int(i) => Key::Integer(*i),
            ModelKey::Str(s) => Key::from(s.as_str()),
            ModelKey::Float(bits) => Key::Float(f64::from_bits(*bits)),
        }
    }
}

fn hashed(k: &ModelKey) -> (Key, u64) {
    let key = k.key();
    let hash = key.hash().expect("built-in keys always hash");
    (key, hash)
}

#[derive(Clone, Debug)]
enum Op {
    Insert(usize, i32),
    Erase(usize),
    Get(usize),
    Upsert(usize, i32),
    Iterate,
}

fn arb_model_key() -> impl Strategy<Value = ModelKey> {
    prop_oneof![
        4 => (0i64..40).prop_map(ModelKey::Int),
        1 => (-6i64..0).prop_map(ModelKey::Int),
        1 => (1_000i64..1_000_000).prop_map(ModelKey::Int),
        2 => "[a-z]{0,4}".prop_map(ModelKey::Str),
        1 => (1i32..1000).prop_map(|n| ModelKey::Float((n as f64 / 8.0).to_bits())),
    ]
}

// Pool-indexed operations so shrinking converges on small key sets.
fn arb_scenario() -> impl Strategy<Value = (Vec<ModelKey>, Vec<Op>)> {
    proptest::collection::vec(arb_model_key(), 1..=24).prop_flat_map(|pool| {
        let idx = 0..pool.len();
        let op = prop_oneof![
            4 => (idx.clone(), any::<i32>()).prop_map(|(i, v)| Op::Insert(i, v)),
            2 => idx.clone().prop_map(Op::Erase),
            2 => idx.clone().prop_map(Op::Get),
            1 => (idx.clone(), any::<i32>()).prop_map(|(i, v)| Op::Upsert(i, v)),
            1 => Just(Op::Iterate),
        ];
        proptest::collection::vec(op, 1..120).prop_map(move |ops| (pool.clone(), ops))
    })
}

fn run(
    sut: &mut RawTable<i32>,
    pool: &[ModelKey],
    ops: Vec<Op>,
) -> Result<(), TestCaseError> {
    let mut model: BTreeMap<ModelKey, i32> = BTreeMap::new();
    for op in ops {
        match op {
            Op::Insert(i, v) => {
                let (key, hash) = hashed(&pool[i]);
                let prev = sut.insert(key, v, hash);
                prop_assert_eq!(prev, model.insert(pool[i].clone(), v));
            }
            Op::Erase(i) => {
                let (key, hash) = hashed(&pool[i]);
                prop_assert_eq!(sut.erase(&key, hash), model.remove(&pool[i]));
                prop_assert!(sut.get(&key, hash).is_none());
            }
            Op::Get(i) => {
                let (key, hash) = hashed(&pool[i]);
                prop_assert_eq!(sut.get(&key, hash), model.get(&pool[i]));
            }
            Op::Upsert(i, v) => {
                let (key, hash) = hashed(&pool[i]);
                let (slot, stored, prev) = sut.upsert(key.clone(), v, hash);
                prop_assert_eq!(*stored, v);
                prop_assert_eq!(prev, model.insert(pool[i].clone(), v));
                prop_assert_eq!(sut.slot_value(slot), Some(&v));
                prop_assert_eq!(sut.find(&key, hash), Some(slot));
                // Array-range integers resolve to the array, everything else to a node.
                let in_array = key.array_index(sut.array_capacity()).is_some();
                prop_assert_eq!(in_array, matches!(slot, Slot::Array(_)));
            }
            Op::Iterate => {
                let mut seen: Vec<(String, i32)> = sut
                    .iter()
                    .map(|(k, v)| (format!("{:?}", k), *v))
                    .collect();
                let mut expected: Vec<(String, i32)> = model
                    .iter()
                    .map(|(k, v)| (format!("{:?}", k.key()), *v))
                    .collect();
                seen.sort();
                expected.sort();
                prop_assert_eq!(seen, expected);
            }
        }

        sut.assert_invariants();
        prop_assert_eq!(sut.len(), model.len());
    }

    // Final mapping equals the model.
    for (k, v) in &model {
        let (key, hash) = hashed(k);
        prop_assert_eq!(sut.get(&key, hash), Some(v));
    }
    Ok(())
}

// Property: state-machine equivalence against BTreeMap, starting from the
// smallest table so that resizes happen early and often.
// Invariants exercised after every step:
// - array-range integers never occupy a hash node;
// - every node is reachable from its main position through its chain;
// - no key appears twice; `len` matches the number of live entries.
proptest! {
    #![proptest_config(ProptestConfig { cases: 128, .. ProptestConfig::default() })]
    #[test]
    fn prop_state_machine((pool, ops) in arb_scenario()) {
        let mut sut = RawTable::default();
        run(&mut sut, &pool, ops)?;
    }
}

// Property: same model equivalence when every key shares one main
// position. Integer multiples of 2^20 collide in any hash part of up to
// 2^20 nodes, so chains grow long and displacement paths are exercised.
proptest! {
    #![proptest_config(ProptestConfig { cases: 64, .. ProptestConfig::default() })]
    #[test]
    fn prop_state_machine_with_collisions(
        raw in proptest::collection::vec(1i64..64, 1..=16),
        ops in proptest::collection::vec((0usize..16, 0u8..3, any::<i32>()), 1..120),
    ) {
        let pool: Vec<ModelKey> = raw.iter().map(|&m| ModelKey::Int(m << 20)).collect();
        let ops = ops
            .into_iter()
            .map(|(i, op, v)| {
                let i = i % pool.len();
                match op {
                    0 => Op::Insert(i, v),
                    1 => Op::Erase(i),
                    _ => Op::Get(i),
                }
            })
            .collect();
        let mut sut = RawTable::with_size_log2(0, 3);
        run(&mut sut, &pool, ops)?;
    }
}

// Property: an explicit resize to arbitrary sizes preserves content.
proptest! {
    #![proptest_config(ProptestConfig { cases: 64, .. ProptestConfig::default() })]
    #[test]
    fn prop_resize_preserves_content(
        keys in proptest::collection::btree_set(arb_model_key(), 0..40),
        array_log2 in 0u32..7,
        hash_log2 in 0u32..3,
    ) {
        let mut sut = RawTable::default();
        for (v, k) in keys.iter().enumerate() {
            let (key, hash) = hashed(k);
            sut.insert(key, v as i32, hash);
        }
        // Leave the hash part room for every entry.
        sut.resize(array_log2, hash_log2.max(1).max(
            (keys.len() + 1).next_power_of_two().trailing_zeros(),
        ));
        sut.assert_invariants();
        prop_assert_eq!(sut.len(), keys.len());
        for (v, k) in keys.iter().enumerate() {
            let (key, hash) = hashed(k);
            prop_assert_eq!(sut.get(&key, hash), Some(&(v as i32)));
        }
    }
}
