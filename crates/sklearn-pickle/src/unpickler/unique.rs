//! Key de-duplication for dicts and sets.
//!
//! `SETITEM(S)` and `ADDITEMS` append without looking for existing keys;
//! containers are normalized once when they are popped. Hashable keys go
//! through an index, anything else (floats, tuples, objects) falls back to
//! a scan.

use std::collections::{HashMap, HashSet};

use crate::value::Value;

#[derive(Debug, PartialEq, Eq, Hash)]
enum Key<'v> {
    None,
    Bool(bool),
    Int(i64),
    BigInt(i128),
    Str(&'v str),
    Bytes(&'v [u8]),
    Global(&'v str),
}

fn key(value: &Value) -> Option<Key<'_>> {
    Some(match value {
        Value::None => Key::None,
        Value::Bool(b) => Key::Bool(*b),
        Value::Int(i) => Key::Int(*i),
        Value::BigInt(i) => Key::BigInt(*i),
        Value::Str(s) => Key::Str(s),
        Value::Bytes(b) => Key::Bytes(b),
        Value::Global(s) => Key::Global(s),
        _ => return None,
    })
}

/// Dict semantics: the first occurrence keeps its position, the last value
/// wins.
pub(super) fn dedup_entries(entries: Vec<(Value, Value)>) -> Vec<(Value, Value)> {
    let slots: Vec<usize> = {
        let mut first: HashMap<Key<'_>, usize> = HashMap::with_capacity(entries.len());
        entries
            .iter()
            .enumerate()
            .map(|(i, (k, _))| match key(k) {
                Some(k) => *first.entry(k).or_insert(i),
                None => entries[..i].iter().position(|(other, _)| other == k).unwrap_or(i),
            })
            .collect()
    };
    if slots.iter().enumerate().all(|(i, &slot)| i == slot) {
        return entries;
    }

    let mut out: Vec<Option<(Value, Value)>> = Vec::with_capacity(entries.len());
    for (i, ((k, v), slot)) in entries.into_iter().zip(slots).enumerate() {
        if slot == i {
            out.push(Some((k, v)));
        } else {
            out.push(None);
            if let Some((_, existing)) = &mut out[slot] {
                *existing = v;
            }
        }
    }
    out.into_iter().flatten().collect()
}

/// Set semantics: the first of equal items is kept.
pub(super) fn dedup(items: Vec<Value>) -> Vec<Value> {
    let keep: Vec<bool> = {
        let mut seen = HashSet::with_capacity(items.len());
        items
            .iter()
            .enumerate()
            .map(|(i, item)| match key(item) {
                Some(k) => seen.insert(k),
                None => !items[..i].contains(item),
            })
            .collect()
    };
    items
        .into_iter()
        .zip(keep)
        .filter_map(|(item, keep)| keep.then_some(item))
        .collect()
}

/// Removes duplicate keys from a dict or set; other values pass through.
pub(super) fn normalize(value: Value) -> Value {
    match value {
        Value::Dict(entries) => Value::Dict(dedup_entries(entries)),
        Value::Set(items) => Value::Set(dedup(items)),
        Value::FrozenSet(items) => Value::FrozenSet(dedup(items)),
        other => other,
    }
}
