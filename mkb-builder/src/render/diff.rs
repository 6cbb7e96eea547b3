//! Child reordering with the fewest moves
//!
//! Nodes that already sit in the right relative order (the longest
//! increasing subsequence of their current positions) stay put; everything
//! else is moved into place.

use std::collections::{HashMap, HashSet};

use crate::dom::{Document, DomResult, NodeId};

/// Indices into `seq` forming one longest strictly increasing subsequence
pub fn longest_increasing_subsequence(seq: &[usize]) -> Vec<usize> {
    // tails[k] = index in seq of the smallest tail of an increasing run of length k+1
    let mut tails: Vec<usize> = Vec::new();
    let mut prev: Vec<Option<usize>> = vec![None; seq.len()];

    for (i, &value) in seq.iter().enumerate() {
        let pos = tails.partition_point(|&t| seq[t] < value);
        if pos > 0 {
            prev[i] = Some(tails[pos - 1]);
        }
        if pos == tails.len() {
            tails.push(i);
        } else {
            tails[pos] = i;
        }
    }

    let mut out = Vec::with_capacity(tails.len());
    let mut cursor = tails.last().copied();
    while let Some(i) = cursor {
        out.push(i);
        cursor = prev[i];
    }
    out.reverse();
    out
}

/// Put the nodes of `desired` under `parent` in that relative order.
///
/// Nodes in `desired` may currently live under another parent; they are
/// moved in. Children of `parent` that are not listed are left alone, so
/// callers remove stale children first. Returns the number of nodes moved.
pub fn reorder_children(doc: &mut Document, parent: NodeId, desired: &[NodeId]) -> DomResult<usize> {
    let current: HashMap<NodeId, usize> = doc
        .children(parent)
        .iter()
        .enumerate()
        .map(|(i, n)| (*n, i))
        .collect();

    // Positions of already-present nodes, in desired order
    let present: Vec<(usize, usize)> = desired
        .iter()
        .enumerate()
        .filter_map(|(d, n)| current.get(n).map(|&c| (d, c)))
        .collect();
    let positions: Vec<usize> = present.iter().map(|(_, c)| *c).collect();
    let keep: HashSet<usize> = longest_increasing_subsequence(&positions)
        .into_iter()
        .map(|i| present[i].0)
        .collect();

    let mut moved = 0;
    let mut next: Option<NodeId> = None;
    for (d, node) in desired.iter().enumerate().rev() {
        if !keep.contains(&d) {
            doc.insert_before(parent, *node, next)?;
            moved += 1;
        }
        next = Some(*node);
    }

    Ok(moved)
}
