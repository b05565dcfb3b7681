//! Binary Merkle state trie: sorts the dictionary by key, recursively splits on the next key
//! bit, and combines children with BLAKE2b-256. Empty subtrees hash to a fixed zero node.

use crate::crypto::blake2b_256;
use crate::dictionary::{Dictionary, StateKey};
use crate::types::{Hash, ZERO_HASH};

const LEAF_TAG: u8 = 0x00;
const NODE_TAG: u8 = 0x01;

fn bit_at(key: &StateKey, depth: usize) -> u8 {
    let byte = key[depth / 8];
    (byte >> (7 - (depth % 8))) & 1
}

fn leaf_hash(key: &StateKey, value: &[u8]) -> Hash {
    let mut buf = Vec::with_capacity(1 + 32 + value.len());
    buf.push(LEAF_TAG);
    buf.extend_from_slice(key);
    buf.extend_from_slice(value);
    blake2b_256(&buf)
}

fn combine(left: Hash, right: Hash) -> Hash {
    let mut buf = [0u8; 65];
    buf[0] = NODE_TAG;
    buf[1..33].copy_from_slice(&left);
    buf[33..65].copy_from_slice(&right);
    blake2b_256(&buf)
}

fn subtree_root(entries: &[(&StateKey, &Vec<u8>)], depth: usize) -> Hash {
    match entries.len() {
        0 => ZERO_HASH,
        1 if depth == 256 => leaf_hash(entries[0].0, entries[0].1),
        1 if depth < 256 => {
            // Entries are sorted, so the single remaining key dominates this
            // whole subtree; recursing bit by bit to depth 256 would just
            // fold it against ZERO_HASH siblings at every remaining level.
            // We still want that exact value (so root() matches a full
            // bit-by-bit construction), so fold it out directly.
            let mut acc = leaf_hash(entries[0].0, entries[0].1);
            for d in (depth..256).rev() {
                let bit = bit_at(entries[0].0, d);
                acc = if bit == 0 { combine(acc, ZERO_HASH) } else { combine(ZERO_HASH, acc) };
            }
            acc
        }
        _ => {
            let split = entries.partition_point(|(key, _)| bit_at(key, depth) == 0);
            let (left, right) = entries.split_at(split);
            let left_hash = subtree_root(left, depth + 1);
            let right_hash = subtree_root(right, depth + 1);
            combine(left_hash, right_hash)
        }
    }
}

/// Computes the 32-byte state root from a dictionary. Pure function of the key/value contents,
/// independent of insertion order.
pub fn root(dict: &Dictionary) -> Hash {
    let entries: Vec<(&StateKey, &Vec<u8>)> = dict.entries.iter().collect();
    subtree_root(&entries, 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dictionary::{project, Dictionary};
    use crate::state::components::JamState;

    #[test]
    fn empty_dictionary_has_zero_root() {
        let dict = Dictionary::new();
        assert_eq!(root(&dict), ZERO_HASH);
    }

    #[test]
    fn root_is_independent_of_insertion_order() {
        let mut state = JamState::default();
        state.last_slot = 7;
        let dict = project(&state);

        let forward_root = root(&dict);

        // Rebuild the same entries via a BTreeMap populated in reverse
        // insertion order; BTreeMap key order is canonical regardless, so
        // the computed root must be identical.
        let mut reversed = Dictionary::new();
        for (k, v) in dict.entries.iter().rev() {
            reversed.entries.insert(*k, v.clone());
        }
        assert_eq!(root(&reversed), forward_root);
    }

    #[test]
    fn distinct_states_produce_distinct_roots() {
        let mut a = JamState::default();
        a.last_slot = 1;
        let mut b = JamState::default();
        b.last_slot = 2;
        assert_ne!(root(&project(&a)), root(&project(&b)));
    }
}
