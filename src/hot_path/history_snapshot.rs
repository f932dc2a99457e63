//! Lock-free reads of a history buffer
//!
//! A [`HistoryReader`] is a cheap, cloneable handle that can live on any
//! thread. Each [`HistorySnapshot`] pins one directory version, so it stays
//! valid and ordered while the writer keeps going.

use crate::core::record::RecordLayout;
use crate::hot_path::history_page::{HistoryEntry, Node, Page};
use arc_swap::ArcSwap;
use std::fmt;
use std::sync::Arc;

/// Traversal direction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Ascending,
    Descending,
}

/// Read handle on one history buffer
#[derive(Clone)]
pub struct HistoryReader {
    published: Arc<ArcSwap<Node>>,
    layout: Arc<RecordLayout>,
}

impl HistoryReader {
    pub(crate) fn new(published: Arc<ArcSwap<Node>>, layout: Arc<RecordLayout>) -> Self {
        Self { published, layout }
    }

    /// Pin the current content
    ///
    /// Published directory versions are immutable, so the snapshot is one
    /// complete version of the buffer and never a mix of two.
    pub fn snapshot(&self) -> HistorySnapshot {
        HistorySnapshot::new(self.published.load_full())
    }

    #[inline]
    pub fn layout(&self) -> &RecordLayout {
        &self.layout
    }
}

impl fmt::Debug for HistoryReader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HistoryReader")
            .field("record", &self.layout.name)
            .finish()
    }
}

/// Immutable, ordered view of a history buffer
#[derive(Clone, Default)]
pub struct HistorySnapshot {
    root: Arc<Node>,
}

impl HistorySnapshot {
    pub(crate) fn new(root: Arc<Node>) -> Self {
        Self { root }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.root.entry_count()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn min_index(&self) -> Option<i64> {
        self.root.min_index()
    }

    pub fn max_index(&self) -> Option<i64> {
        self.root.max_index()
    }

    pub fn get(&self, index: i64) -> Option<&HistoryEntry> {
        self.root.find_entry(index)
    }

    /// Entries with index between `start` and `end` inclusive, in either order
    pub fn available_count(&self, start: i64, end: i64) -> usize {
        let (lo, hi) = if start <= end { (start, end) } else { (end, start) };
        self.root.count_in_range(lo, hi)
    }

    /// All entries, ascending
    pub fn iter(&self) -> SnapshotIter<'_> {
        self.iter_from(i64::MIN, Direction::Ascending)
    }

    /// All entries, descending
    pub fn iter_rev(&self) -> SnapshotIter<'_> {
        self.iter_from(i64::MAX, Direction::Descending)
    }

    /// Entries at or after `index` ascending, or at or before it descending
    pub fn iter_from(&self, index: i64, direction: Direction) -> SnapshotIter<'_> {
        let root = &*self.root;
        let start = root.locate(index).and_then(|(k, page)| match direction {
            Direction::Ascending => {
                let pos = page.count_below(index);
                if pos < page.len() {
                    Some((k, &**page, pos))
                } else {
                    root.page(k + 1).map(|next| (k + 1, &**next, 0))
                }
            }
            Direction::Descending => page
                .count_at_or_below(index)
                .checked_sub(1)
                .map(|pos| (k, &**page, pos)),
        });
        SnapshotIter {
            root,
            position: start,
            direction,
        }
    }

    /// Entries with `from <= index <= to`, ascending
    pub fn range(&self, from: i64, to: i64) -> impl Iterator<Item = &HistoryEntry> + '_ {
        self.iter_from(from, Direction::Ascending)
            .take_while(move |e| e.index() <= to)
    }

    /// Entries with `to <= index <= from`, descending
    pub fn range_rev(&self, from: i64, to: i64) -> impl Iterator<Item = &HistoryEntry> + '_ {
        self.iter_from(from, Direction::Descending)
            .take_while(move |e| e.index() >= to)
    }

    /// Feed entries between `from` and `to` inclusive to `sink`, ascending
    /// when `from <= to` and descending otherwise.
    ///
    /// `sink` returns `true` once it has no more capacity. Returns `true`
    /// when the walk stopped because of that, `false` when the range was
    /// exhausted.
    pub fn examine<F>(&self, from: i64, to: i64, mut sink: F) -> bool
    where
        F: FnMut(&HistoryEntry) -> bool,
    {
        if from <= to {
            self.range(from, to).any(|e| sink(e))
        } else {
            self.range_rev(from, to).any(|e| sink(e))
        }
    }
}

impl fmt::Debug for HistorySnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HistorySnapshot")
            .field("len", &self.len())
            .field("pages", &self.root.page_count())
            .field("min", &self.min_index())
            .field("max", &self.max_index())
            .finish()
    }
}

impl<'a> IntoIterator for &'a HistorySnapshot {
    type Item = &'a HistoryEntry;
    type IntoIter = SnapshotIter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Cursor over a snapshot's pages in one direction
pub struct SnapshotIter<'a> {
    root: &'a Node,
    /// Position of the current page, the page, and the in-page position of
    /// the next entry
    position: Option<(usize, &'a Page, usize)>,
    direction: Direction,
}

impl<'a> Iterator for SnapshotIter<'a> {
    type Item = &'a HistoryEntry;

    fn next(&mut self) -> Option<Self::Item> {
        let (k, page, pos) = self.position?;
        let entry = &*page.entries()[pos];
        self.position = match self.direction {
            Direction::Ascending => {
                if pos + 1 < page.len() {
                    Some((k, page, pos + 1))
                } else {
                    self.root.page(k + 1).map(|next| (k + 1, &**next, 0))
                }
            }
            Direction::Descending => {
                if pos > 0 {
                    Some((k, page, pos - 1))
                } else {
                    k.checked_sub(1)
                        .and_then(|j| self.root.page(j))
                        .map(|prev| (k - 1, &**prev, prev.len() - 1))
                }
            }
        };
        Some(entry)
    }
}
