use super::{
    attributes::{AttributeKind, AttributeSet, StyleAttribute},
    range::TextRange,
};

#[derive(Debug, Clone, PartialEq)]
struct Run {
    len: u32,
    attrs: AttributeSet,
}

/// Run-length attribute storage parallel to the buffer text.
///
/// Runs are kept canonical: no empty runs and no two neighbours with equal
/// attribute sets. Two stores describing the same styling therefore compare
/// equal, which is what rescan convergence is checked against.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AttributeStore {
    runs: Vec<Run>,
    len: u32,
}

impl AttributeStore {
    pub fn new(len: u32) -> Self {
        let runs = if len > 0 {
            vec![Run {
                len,
                attrs: AttributeSet::new(),
            }]
        } else {
            Vec::new()
        };
        Self { runs, len }
    }

    pub fn len(&self) -> u32 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Applies `f` to every run inside `range`. The caller guarantees the
    /// range is inside the store.
    pub fn modify(&mut self, range: TextRange, mut f: impl FnMut(&mut AttributeSet)) {
        debug_assert!(range.end() <= self.len);
        if range.is_empty() {
            return;
        }
        let first = self.split_at(range.location);
        let last = self.split_at(range.end());
        for run in &mut self.runs[first..last] {
            f(&mut run.attrs);
        }
        self.normalize_around(first, last);
    }

    pub fn set(&mut self, range: TextRange, attr: &StyleAttribute) {
        self.modify(range, |set| {
            set.insert(attr.clone());
        });
    }

    pub fn remove(&mut self, range: TextRange, kind: AttributeKind) {
        self.modify(range, |set| {
            set.remove(kind);
        });
    }

    pub fn attributes_at(&self, pos: u32) -> Option<&AttributeSet> {
        let mut start = 0;
        for run in &self.runs {
            if pos < start + run.len {
                return Some(&run.attrs);
            }
            start += run.len;
        }
        None
    }

    /// All runs in order with their ranges.
    pub fn runs(&self) -> impl Iterator<Item = (TextRange, &AttributeSet)> {
        let mut start = 0;
        self.runs.iter().map(move |run| {
            let range = TextRange::new(start, run.len);
            start += run.len;
            (range, &run.attrs)
        })
    }

    /// Runs intersecting `range`, with their ranges clipped to it.
    pub fn runs_in(&self, range: TextRange) -> Vec<(TextRange, AttributeSet)> {
        self.runs()
            .filter_map(|(run_range, attrs)| {
                run_range
                    .intersection(range)
                    .map(|clipped| (clipped, attrs.clone()))
            })
            .collect()
    }

    /// Follows a text edit: `[location, location + old_len)` is replaced by
    /// `new_len` units that inherit the attributes of the preceding unit
    /// (or of the following one at the start of the buffer).
    pub fn edit(&mut self, location: u32, old_len: u32, new_len: u32) {
        debug_assert!(location + old_len <= self.len);
        let first = self.split_at(location);
        let last = self.split_at(location + old_len);
        self.runs.drain(first..last);
        self.len -= old_len;

        if new_len > 0 {
            let inherited = if first > 0 {
                self.runs[first - 1].attrs.clone()
            } else {
                self.runs
                    .get(first)
                    .map(|run| run.attrs.clone())
                    .unwrap_or_default()
            };
            self.runs.insert(
                first,
                Run {
                    len: new_len,
                    attrs: inherited,
                },
            );
            self.len += new_len;
        }
        self.normalize();
    }

    /// Ensures a run boundary at `pos` and returns the index of the run that
    /// starts there (`runs.len()` when `pos` is the end).
    fn split_at(&mut self, pos: u32) -> usize {
        let mut start = 0;
        for i in 0..self.runs.len() {
            let run_len = self.runs[i].len;
            if pos == start {
                return i;
            }
            if pos < start + run_len {
                let tail = Run {
                    len: start + run_len - pos,
                    attrs: self.runs[i].attrs.clone(),
                };
                self.runs[i].len = pos - start;
                self.runs.insert(i + 1, tail);
                return i + 1;
            }
            start += run_len;
        }
        self.runs.len()
    }

    /// Merges runs in `[first, last)` plus one neighbour on each side, which
    /// is all a single modification can disturb.
    fn normalize_around(&mut self, first: usize, last: usize) {
        let lo = first.saturating_sub(1);
        let hi = (last + 1).min(self.runs.len());
        if lo >= hi {
            return;
        }
        let mut merged: Vec<Run> = Vec::with_capacity(hi - lo);
        for run in self.runs.drain(lo..hi) {
            match merged.last_mut() {
                Some(prev) if prev.attrs == run.attrs => prev.len += run.len,
                _ => merged.push(run),
            }
        }
        self.runs.splice(lo..lo, merged);
    }

    fn normalize(&mut self) {
        let mut merged: Vec<Run> = Vec::with_capacity(self.runs.len());
        for run in self.runs.drain(..) {
            if run.len == 0 {
                continue;
            }
            match merged.last_mut() {
                Some(prev) if prev.attrs == run.attrs => prev.len += run.len,
                _ => merged.push(run),
            }
        }
        self.runs = merged;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::attributes::Color;
    use pretty_assertions::assert_eq;

    fn red() -> StyleAttribute {
        StyleAttribute::ForegroundColor(Color::rgb(255, 0, 0))
    }

    fn ranges(store: &AttributeStore) -> Vec<(u32, u32, bool)> {
        store
            .runs()
            .map(|(r, attrs)| (r.location, r.length, attrs.foreground().is_some()))
            .collect()
    }

    #[test]
    fn set_splits_and_merges_runs() {
        let mut store = AttributeStore::new(10);
        store.set(TextRange::new(2, 3), &red());
        assert_eq!(ranges(&store), vec![(0, 2, false), (2, 3, true), (5, 5, false)]);

        store.set(TextRange::new(5, 5), &red());
        assert_eq!(ranges(&store), vec![(0, 2, false), (2, 8, true)]);

        store.remove(TextRange::new(0, 10), AttributeKind::ForegroundColor);
        assert_eq!(ranges(&store), vec![(0, 10, false)]);
    }

    #[test]
    fn insertion_inherits_preceding_attributes() {
        let mut store = AttributeStore::new(4);
        store.set(TextRange::new(0, 2), &red());

        store.edit(2, 0, 3);
        assert_eq!(store.len(), 7);
        assert_eq!(ranges(&store), vec![(0, 5, true), (5, 2, false)]);
    }

    #[test]
    fn insertion_at_start_inherits_following_attributes() {
        let mut store = AttributeStore::new(2);
        store.set(TextRange::new(0, 2), &red());

        store.edit(0, 0, 1);
        assert_eq!(ranges(&store), vec![(0, 3, true)]);
    }

    #[test]
    fn deletion_removes_runs() {
        let mut store = AttributeStore::new(6);
        store.set(TextRange::new(2, 2), &red());

        store.edit(1, 4, 0);
        assert_eq!(store.len(), 2);
        assert_eq!(ranges(&store), vec![(0, 2, false)]);
    }

    #[test]
    fn deleting_everything_leaves_empty_store() {
        let mut store = AttributeStore::new(3);
        store.edit(0, 3, 0);
        assert!(store.is_empty());
        assert_eq!(store.runs().count(), 0);
        assert!(store.attributes_at(0).is_none());
    }

    #[test]
    fn runs_in_clips() {
        let mut store = AttributeStore::new(10);
        store.set(TextRange::new(0, 6), &red());
        let runs = store.runs_in(TextRange::new(4, 4));
        assert_eq!(runs.len(), 2);
        assert_eq!(runs[0].0, TextRange::new(4, 2));
        assert_eq!(runs[1].0, TextRange::new(6, 2));
    }
}
