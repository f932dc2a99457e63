//! Ordered history of one symbol stream
//!
//! Entries live in fixed-capacity pages held by a persistent directory that is
//! searched by page minimum. Insertion cost is bounded by page capacity plus
//! the directory height whatever the arrival order: appends go to the last
//! page, prepends to the first, and inserts in the middle touch one or two
//! adjacent pages.
//!
//! Single writer (`&mut self`), any number of concurrent readers through
//! [`HistoryReader`]. Every change publishes a complete new directory version
//! with one pointer swap, so readers never block the writer and never observe
//! a partially applied change.

use crate::core::record::{EventFlags, RecordCursor, RecordLayout};
use crate::hot_path::history_page::{
    Edit, HistoryEntry, Node, Page, DEFAULT_PAGE_CAPACITY, MIN_PAGE_CAPACITY,
};
use crate::hot_path::history_snapshot::{HistoryReader, HistorySnapshot};
use arc_swap::ArcSwap;
use std::fmt;
use std::sync::Arc;
use tracing::Level;

/// Effect of one `put_record` call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PutOutcome {
    /// Absent index, new entry stored
    Added,
    /// Present index, different values swapped in
    Updated,
    /// Present index, same values
    Unchanged,
    /// Present index deleted by a remove event
    Removed,
    /// Remove event for an absent index
    Ignored,
}

impl PutOutcome {
    /// Change in entry count
    #[inline(always)]
    pub const fn size_delta(self) -> i32 {
        match self {
            PutOutcome::Added => 1,
            PutOutcome::Removed => -1,
            _ => 0,
        }
    }

    /// True when the stored content changed
    #[inline(always)]
    pub const fn is_changed(self) -> bool {
        matches!(
            self,
            PutOutcome::Added | PutOutcome::Updated | PutOutcome::Removed
        )
    }
}

/// What a stats sink learns about one `put_record` call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PutReport {
    pub record_id: u32,
    pub outcome: PutOutcome,
    pub is_snapshot: bool,
    /// Size of one record occurrence
    pub bytes: usize,
}

/// Accounting sink for history changes
pub trait HistoryStats {
    /// Called exactly once per `put_record`
    fn record_put(&self, report: &PutReport);

    /// Bulk removal by retention or clearing; `bytes` is the size of one record
    fn record_removed(&self, _record_id: u32, _count: usize, _bytes: usize) {}
}

/// Stats sink that discards everything
#[derive(Debug, Clone, Copy, Default)]
pub struct NoStats;

impl HistoryStats for NoStats {
    #[inline(always)]
    fn record_put(&self, _report: &PutReport) {}
}

/// Paged, index-ordered history of one symbol+record stream
pub struct HistoryBuffer {
    layout: Arc<RecordLayout>,
    page_capacity: usize,
    /// Writer's current version, identical to the published one between calls
    root: Arc<Node>,
    published: Arc<ArcSwap<Node>>,
}

impl HistoryBuffer {
    pub fn new(layout: Arc<RecordLayout>) -> Self {
        Self::with_page_capacity(layout, DEFAULT_PAGE_CAPACITY)
    }

    /// Capacities below the minimum are raised to it
    pub fn with_page_capacity(layout: Arc<RecordLayout>, page_capacity: usize) -> Self {
        let root = Arc::new(Node::default());
        Self {
            layout,
            page_capacity: page_capacity.max(MIN_PAGE_CAPACITY),
            published: Arc::new(ArcSwap::new(Arc::clone(&root))),
            root,
        }
    }

    /// Apply one record occurrence
    ///
    /// | state at index | remove flag | effect            |
    /// |----------------|-------------|-------------------|
    /// | absent         | no          | insert            |
    /// | present        | no          | overwrite if differs |
    /// | present        | yes         | delete            |
    /// | absent         | yes         | nothing           |
    ///
    /// `stats` receives exactly one report.
    pub fn put_record<C, S>(
        &mut self,
        index: i64,
        source: &C,
        is_snapshot: bool,
        stats: &S,
        flags: EventFlags,
    ) -> PutOutcome
    where
        C: RecordCursor + ?Sized,
        S: HistoryStats + ?Sized,
    {
        let outcome = if flags.is_remove() {
            self.remove_index(index)
        } else {
            self.upsert(index, source, flags)
        };
        stats.record_put(&PutReport {
            record_id: self.layout.id,
            outcome,
            is_snapshot,
            bytes: self.layout.record_bytes(),
        });
        outcome
    }

    fn upsert<C>(&mut self, index: i64, source: &C, flags: EventFlags) -> PutOutcome
    where
        C: RecordCursor + ?Sized,
    {
        let Some((k, page)) = self.locate(index) else {
            let entry = self.new_entry(index, source, flags);
            let page = Page::single(entry, self.page_capacity);
            self.publish(self.root.edited(0, Edit::Insert(Arc::new(page))));
            return PutOutcome::Added;
        };

        match page.search(index) {
            Ok(pos) => {
                if page.entries()[pos].same_values(source) {
                    return PutOutcome::Unchanged;
                }
                let entry = self.new_entry(index, source, flags);
                self.replace_page(k, page.replaced(pos, entry));
                PutOutcome::Updated
            }
            Err(pos) => {
                let entry = self.new_entry(index, source, flags);
                self.insert_at(k, &page, pos, entry);
                PutOutcome::Added
            }
        }
    }

    fn remove_index(&mut self, index: i64) -> PutOutcome {
        let Some((k, page)) = self.locate(index) else {
            return PutOutcome::Ignored;
        };
        match page.search(index) {
            Ok(pos) => {
                self.remove_at(k, &page, pos);
                PutOutcome::Removed
            }
            Err(_) => PutOutcome::Ignored,
        }
    }

    #[inline]
    fn new_entry<C>(&self, index: i64, source: &C, flags: EventFlags) -> Arc<HistoryEntry>
    where
        C: RecordCursor + ?Sized,
    {
        Arc::new(HistoryEntry::from_cursor(index, &self.layout, source, flags))
    }

    /// Page that holds `index` or would receive it, with its position
    #[inline]
    fn locate(&self, index: i64) -> Option<(usize, Arc<Page>)> {
        self.root
            .locate(index)
            .map(|(k, page)| (k, Arc::clone(page)))
    }

    fn insert_at(&mut self, k: usize, page: &Page, pos: usize, entry: Arc<HistoryEntry>) {
        let cap = self.page_capacity;
        if page.len() < cap {
            self.replace_page(k, page.inserted(pos, entry, cap));
            return;
        }

        let next_full = self.root.page(k + 1).map_or(true, |p| p.len() == cap);
        let root = if pos == page.len() && next_full {
            // Past the end of a full page with no room after it: open a page
            // so sequential feeds keep pages full instead of half split.
            crate::log_history!(Level::TRACE, record = %self.layout.name, page = k + 1, "page opened");
            self.root
                .edited(k + 1, Edit::Insert(Arc::new(Page::single(entry, cap))))
        } else if pos == 0 {
            // Only reachable on the first page
            debug_assert_eq!(k, 0);
            crate::log_history!(Level::TRACE, record = %self.layout.name, "page prepended");
            self.root
                .edited(0, Edit::Insert(Arc::new(Page::single(entry, cap))))
        } else {
            let (left, right) = page.split(cap);
            let mid = left.len();
            let (left, right) = if pos <= mid {
                (left.inserted(pos, entry, cap), right)
            } else {
                (left, right.inserted(pos - mid, entry, cap))
            };
            crate::log_history!(Level::TRACE, record = %self.layout.name, page = k, "page split");
            self.root
                .edited(k, Edit::Replace(Arc::new(left)))
                .edited(k + 1, Edit::Insert(Arc::new(right)))
        };
        self.publish(root);
    }

    fn remove_at(&mut self, k: usize, page: &Page, pos: usize) {
        let cap = self.page_capacity;
        if page.len() == 1 {
            self.publish(self.root.edited(k, Edit::Remove));
            return;
        }

        let shrunk = page.removed(pos, cap);
        if shrunk.len() < cap / 4 {
            if let Some((first, merged)) = self.merge_with_neighbour(k, &shrunk) {
                crate::log_history!(Level::TRACE, record = %self.layout.name, page = first, "pages merged");
                let root = self
                    .root
                    .edited(first, Edit::Replace(Arc::new(merged)))
                    .edited(first + 1, Edit::Remove);
                self.publish(root);
                return;
            }
        }
        self.replace_page(k, shrunk);
    }

    /// Merge a shrunk page with its smaller neighbour when the union fits
    /// in three quarters of a page. Returns the merged page and its position.
    fn merge_with_neighbour(&self, k: usize, page: &Page) -> Option<(usize, Page)> {
        let prev = k
            .checked_sub(1)
            .and_then(|j| self.root.page(j).map(|p| (j, p)));
        let next = self.root.page(k + 1).map(|p| (k + 1, p));
        let (j, neighbour) = match (prev, next) {
            (Some(p), Some(n)) => {
                if p.1.len() <= n.1.len() {
                    p
                } else {
                    n
                }
            }
            (p, n) => p.or(n)?,
        };
        if page.len() + neighbour.len() > self.page_capacity * 3 / 4 {
            return None;
        }
        let cap = self.page_capacity;
        Some(if j < k {
            (j, neighbour.merged(page, cap))
        } else {
            (k, page.merged(neighbour, cap))
        })
    }

    #[inline]
    fn replace_page(&mut self, k: usize, page: Page) {
        debug_assert!(page.is_valid());
        self.publish(self.root.edited(k, Edit::Replace(Arc::new(page))));
    }

    /// Make `root` the writer's and the readers' version
    #[inline]
    fn publish(&mut self, root: Arc<Node>) {
        self.published.store(Arc::clone(&root));
        self.root = root;
    }

    /// Remove every entry with index below `index`
    ///
    /// Returns the number of entries removed.
    pub fn remove_older_than<S>(&mut self, index: i64, stats: &S) -> usize
    where
        S: HistoryStats + ?Sized,
    {
        match self.root.min_index() {
            Some(min) if min < index => {}
            _ => return 0,
        }

        let mut root = Arc::clone(&self.root);
        let mut removed = 0;
        while let Some(first) = root.page(0) {
            if first.max_index() >= index {
                break;
            }
            removed += first.len();
            root = root.edited(0, Edit::Remove);
        }
        let tail = root.page(0).and_then(|first| {
            let cut = first.count_below(index);
            (cut > 0).then(|| (cut, first.tail(cut, self.page_capacity)))
        });
        if let Some((cut, tail)) = tail {
            removed += cut;
            root = root.edited(0, Edit::Replace(Arc::new(tail)));
        }
        self.publish(root);

        crate::log_history!(Level::TRACE, record = %self.layout.name, removed, "old records removed");
        stats.record_removed(self.layout.id, removed, self.layout.record_bytes());
        removed
    }

    /// Drop the oldest entries until at most `max` remain
    pub fn enforce_max_record_count<S>(&mut self, max: usize, stats: &S) -> usize
    where
        S: HistoryStats + ?Sized,
    {
        let len = self.len();
        if len <= max {
            return 0;
        }
        if max == 0 {
            return self.clear_all_records(stats);
        }
        match self.root.nth_index(len - max) {
            Some(keep_from) => self.remove_older_than(keep_from, stats),
            None => 0,
        }
    }

    /// Remove everything
    pub fn clear_all_records<S>(&mut self, stats: &S) -> usize
    where
        S: HistoryStats + ?Sized,
    {
        let removed = self.len();
        if removed == 0 {
            return 0;
        }
        self.publish(Arc::new(Node::default()));
        stats.record_removed(self.layout.id, removed, self.layout.record_bytes());
        removed
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.root.entry_count()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[inline]
    pub fn page_count(&self) -> usize {
        self.root.page_count()
    }

    #[inline]
    pub fn page_capacity(&self) -> usize {
        self.page_capacity
    }

    #[inline]
    pub fn layout(&self) -> &Arc<RecordLayout> {
        &self.layout
    }

    pub fn min_available_index(&self) -> Option<i64> {
        self.root.min_index()
    }

    pub fn max_available_index(&self) -> Option<i64> {
        self.root.max_index()
    }

    /// Entries with index between `start` and `end` inclusive, in either order
    pub fn available_count(&self, start: i64, end: i64) -> usize {
        let (lo, hi) = if start <= end { (start, end) } else { (end, start) };
        self.root.count_in_range(lo, hi)
    }

    pub fn get(&self, index: i64) -> Option<&HistoryEntry> {
        self.root.find_entry(index)
    }

    /// Ascending traversal of the writer's view
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &HistoryEntry> + '_ {
        self.root
            .pages()
            .flat_map(|p| p.entries().iter().map(|e| &**e))
    }

    /// Handle for concurrent readers
    pub fn reader(&self) -> HistoryReader {
        HistoryReader::new(Arc::clone(&self.published), Arc::clone(&self.layout))
    }

    /// Snapshot of the writer's current state
    pub fn snapshot(&self) -> HistorySnapshot {
        HistorySnapshot::new(Arc::clone(&self.root))
    }

    /// Structural self-check: sorted non-empty pages within capacity,
    /// non-overlapping and ordered, a well-formed directory, and the
    /// published version in sync with the writer's.
    pub fn check_invariants(&self) -> bool {
        let pages: Vec<&Arc<Page>> = self.root.pages().collect();
        pages
            .iter()
            .all(|p| p.is_valid() && p.len() <= self.page_capacity)
            && pages.windows(2).all(|w| w[0].max_index() < w[1].min_index())
            && pages.len() == self.root.page_count()
            && self.root.is_well_formed()
            && Arc::ptr_eq(&self.published.load(), &self.root)
    }
}

impl fmt::Debug for HistoryBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HistoryBuffer")
            .field("record", &self.layout.name)
            .field("len", &self.len())
            .field("pages", &self.root.page_count())
            .field("page_capacity", &self.page_capacity)
            .finish()
    }
}
