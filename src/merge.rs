//! Deep merge of configuration layers.
//!
//! Layers are folded left to right: the first is the lowest priority
//! (defaults), the last the highest. Tables merge key by key. Arrays follow
//! the [`ArrayMergeMethod`]:
//!
//! - `Overwrite`: the later array wins outright.
//! - `Combine`: for each later element at index `i`,
//!   - if the earlier array has no element at `i`, it is appended;
//!   - if it is a table or array, it is merged into the earlier element;
//!   - otherwise it is appended unless the earlier array already holds an
//!     equal value.
//!
//! Everything else, including date-times, regexes and URLs, is replaced
//! wholesale by the later layer.

use crate::types::{ArrayMergeMethod, MergeOpts};
use crate::value::{Table, Value};

/// Merge all `layers` in order, later layers overriding earlier ones.
pub fn deep_merge<I>(layers: I, opts: MergeOpts) -> Table
where
    I: IntoIterator<Item = Table>,
{
    layers
        .into_iter()
        .fold(Table::new(), |acc, layer| merge_tables(acc, layer, opts))
}

/// Deep-merge `overlay` on top of `base`.
/// If both sides have a table for the same key, recurse.
/// Otherwise, `overlay`'s value wins (arrays per `opts`).
pub fn merge_tables(mut base: Table, overlay: Table, opts: MergeOpts) -> Table {
    for (key, overlay_val) in overlay {
        let merged = match base.remove(&key) {
            Some(base_val) => merge_values(base_val, overlay_val, opts),
            None => overlay_val,
        };
        base.insert(key, merged);
    }
    base
}

fn merge_values(base: Value, overlay: Value, opts: MergeOpts) -> Value {
    match (base, overlay) {
        (Value::Table(base_tbl), Value::Table(overlay_tbl)) => {
            Value::Table(merge_tables(base_tbl, overlay_tbl, opts))
        }
        (Value::Array(base_arr), Value::Array(overlay_arr)) => match opts.array_merge {
            ArrayMergeMethod::Overwrite => Value::Array(overlay_arr),
            ArrayMergeMethod::Combine => Value::Array(combine(base_arr, overlay_arr, opts)),
        },
        (_, overlay_val) => overlay_val,
    }
}

fn combine(target: Vec<Value>, source: Vec<Value>, opts: MergeOpts) -> Vec<Value> {
    let mut destination = target.clone();
    for (index, item) in source.into_iter().enumerate() {
        if index >= destination.len() {
            destination.push(item);
        } else if item.is_mergeable() {
            destination[index] = merge_values(target[index].clone(), item, opts);
        } else if !target.contains(&item) {
            destination.push(item);
        }
    }
    destination
}
