//! Minimal change sets between two sectioned layouts.
//!
//! Rows are matched by identity. Within a section that survives the batch,
//! the rows kept in place form an order-preserving subsequence chosen to keep
//! as many unchanged rows as possible; every other surviving row is reported
//! as a move.
//! Sections are matched by name the same way, and a row whose section is not
//! matched is deleted and re-inserted.

use crate::section::IndexPath;
use alloc::string::String;
use alloc::vec;
use alloc::vec::Vec;
use hashbrown::HashMap;
use lumen_core::RowId;

/// The identities of a snapshot, grouped by section.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub(crate) struct Layout {
    pub sections: Vec<(String, Vec<RowId>)>,
}

impl Layout {
    pub fn positions(&self) -> HashMap<RowId, IndexPath> {
        let mut out = HashMap::new();
        for (s, (_, ids)) in self.sections.iter().enumerate() {
            for (r, id) in ids.iter().enumerate() {
                out.insert(*id, IndexPath::new(s, r));
            }
        }
        out
    }
}

/// Events turning one layout into another, grouped in emission order.
#[derive(Debug, Default, PartialEq, Eq)]
pub(crate) struct LayoutDiff {
    pub row_deletes: Vec<(RowId, IndexPath)>,
    pub section_deletes: Vec<(usize, String)>,
    pub section_inserts: Vec<(usize, String)>,
    pub row_inserts: Vec<(RowId, IndexPath)>,
    pub moves: Vec<(RowId, IndexPath, IndexPath)>,
    pub updates: Vec<(RowId, IndexPath)>,
}

#[cfg(test)]
impl LayoutDiff {
    pub fn is_empty(&self) -> bool {
        self.row_deletes.is_empty()
            && self.section_deletes.is_empty()
            && self.section_inserts.is_empty()
            && self.row_inserts.is_empty()
            && self.moves.is_empty()
            && self.updates.is_empty()
    }
}

/// Marks the members of one strictly increasing subsequence of `seq` with the
/// largest total weight. Values of `seq` must be distinct.
pub(crate) fn heaviest_increasing<W>(seq: &[usize], weight: W) -> Vec<bool>
where
    W: Fn(usize) -> u64,
{
    let size = seq.iter().max().map_or(0, |m| m + 1);
    // Fenwick tree over values: heaviest run (total, last index) ending below a value.
    let mut tree: Vec<(u64, Option<usize>)> = vec![(0, None); size + 1];
    let mut prev: Vec<Option<usize>> = vec![None; seq.len()];
    let mut best: (u64, Option<usize>) = (0, None);

    for (i, &value) in seq.iter().enumerate() {
        let mut below = (0, None);
        let mut k = value;
        while k > 0 {
            if tree[k].0 > below.0 {
                below = tree[k];
            }
            k &= k - 1;
        }
        prev[i] = below.1;

        let entry = (below.0 + weight(i), Some(i));
        if entry.0 > best.0 {
            best = entry;
        }
        let mut k = value + 1;
        while k <= size {
            if entry.0 > tree[k].0 {
                tree[k] = entry;
            }
            k += k & k.wrapping_neg();
        }
    }

    let mut keep = vec![false; seq.len()];
    let mut cursor = best.1;
    while let Some(i) = cursor {
        keep[i] = true;
        cursor = prev[i];
    }
    keep
}

/// Computes the events turning `old` into `new`. `changed` reports whether a
/// row present in both needs an update event when it does not move.
pub(crate) fn diff_layouts<F>(old: &Layout, new: &Layout, changed: F) -> LayoutDiff
where
    F: Fn(RowId) -> bool,
{
    let mut diff = LayoutDiff::default();

    // Match sections by name, keeping the longest order-preserving subset.
    let new_section_index: HashMap<&str, usize> = new
        .sections
        .iter()
        .enumerate()
        .map(|(i, (name, _))| (name.as_str(), i))
        .collect();
    let common: Vec<(usize, usize)> = old
        .sections
        .iter()
        .enumerate()
        .filter_map(|(i, (name, _))| new_section_index.get(name.as_str()).map(|&j| (i, j)))
        .collect();
    let seq: Vec<usize> = common.iter().map(|&(_, j)| j).collect();
    let keep = heaviest_increasing(&seq, |_| 1);
    let mut section_map: HashMap<usize, usize> = HashMap::new();
    for (&(i, j), kept) in common.iter().zip(keep) {
        if kept {
            section_map.insert(i, j);
        }
    }
    let mapped_new: hashbrown::HashSet<usize> = section_map.values().copied().collect();

    let new_positions = new.positions();
    let old_positions = old.positions();

    for (s, (name, ids)) in old.sections.iter().enumerate() {
        let target = section_map.get(&s).copied();
        let mut survivors: Vec<(RowId, IndexPath, IndexPath)> = Vec::new();

        for (r, id) in ids.iter().enumerate() {
            let from = IndexPath::new(s, r);
            match new_positions.get(id) {
                Some(&to) if Some(to.section) == target => survivors.push((*id, from, to)),
                Some(&to) => {
                    diff.row_deletes.push((*id, from));
                    diff.row_inserts.push((*id, to));
                }
                None => diff.row_deletes.push((*id, from)),
            }
        }

        // Unchanged rows left in place cost nothing, so they outweigh any number
        // of changed rows: those get exactly one event either way.
        let dirty: Vec<bool> = survivors.iter().map(|(id, _, _)| changed(*id)).collect();
        let heavy = survivors.len() as u64 + 1;
        let seq: Vec<usize> = survivors.iter().map(|(_, _, to)| to.row).collect();
        let keep = heaviest_increasing(&seq, |i| if dirty[i] { 1 } else { heavy });
        for (((id, from, to), kept), dirty) in survivors.into_iter().zip(keep).zip(dirty) {
            if !kept {
                diff.moves.push((id, from, to));
            } else if dirty {
                diff.updates.push((id, to));
            }
        }

        if target.is_none() {
            diff.section_deletes.push((s, name.clone()));
        }
    }

    for (s, (name, ids)) in new.sections.iter().enumerate() {
        if !mapped_new.contains(&s) {
            diff.section_inserts.push((s, name.clone()));
        }
        for (r, id) in ids.iter().enumerate() {
            if !old_positions.contains_key(id) {
                diff.row_inserts.push((*id, IndexPath::new(s, r)));
            }
        }
    }

    diff.row_inserts.sort_by_key(|(_, path)| *path);
    diff.moves.sort_by_key(|(_, _, to)| *to);
    diff.updates.sort_by_key(|(_, path)| *path);
    diff
}
