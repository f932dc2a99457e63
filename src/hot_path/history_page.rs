//! Fixed-capacity sorted pages and their published directory
//!
//! A page is never modified once shared: every change builds a new page and
//! swaps it in. Entries are shared between page versions through `Arc`, so a
//! copy costs one reference bump per entry and is bounded by page capacity.

use crate::core::record::{EventFlags, ObjValue, RecordCursor, RecordLayout};
use std::fmt;
use std::sync::Arc;

/// Smallest page capacity that still leaves two non-empty halves after a split
pub const MIN_PAGE_CAPACITY: usize = 4;
/// Default number of entries per page
pub const DEFAULT_PAGE_CAPACITY: usize = 64;

/// One stored record occurrence; immutable once published
pub struct HistoryEntry {
    index: i64,
    ints: Box<[i32]>,
    objs: Box<[Option<ObjValue>]>,
    flags: EventFlags,
}

impl HistoryEntry {
    pub(crate) fn from_cursor<C>(index: i64, layout: &RecordLayout, cursor: &C, flags: EventFlags) -> Self
    where
        C: RecordCursor + ?Sized,
    {
        Self {
            index,
            ints: (0..layout.int_fields).map(|i| cursor.get_int(i)).collect(),
            objs: (0..layout.obj_fields).map(|i| cursor.get_obj(i)).collect(),
            flags,
        }
    }

    /// True when the cursor carries exactly the stored field values.
    /// Object fields compare by reference.
    pub(crate) fn same_values<C>(&self, cursor: &C) -> bool
    where
        C: RecordCursor + ?Sized,
    {
        self.ints
            .iter()
            .enumerate()
            .all(|(i, &v)| cursor.get_int(i) == v)
            && self.objs.iter().enumerate().all(|(i, v)| {
                match (v, cursor.get_obj(i)) {
                    (None, None) => true,
                    (Some(a), Some(b)) => Arc::ptr_eq(a, &b),
                    _ => false,
                }
            })
    }

    #[inline(always)]
    pub fn index(&self) -> i64 {
        self.index
    }

    #[inline]
    pub fn ints(&self) -> &[i32] {
        &self.ints
    }

    #[inline]
    pub fn objs(&self) -> &[Option<ObjValue>] {
        &self.objs
    }

    #[inline]
    pub fn event_flags(&self) -> EventFlags {
        self.flags
    }
}

impl RecordCursor for HistoryEntry {
    #[inline]
    fn get_int(&self, field: usize) -> i32 {
        self.ints.get(field).copied().unwrap_or_default()
    }

    #[inline]
    fn get_obj(&self, field: usize) -> Option<ObjValue> {
        self.objs.get(field).cloned().flatten()
    }

    #[inline]
    fn get_event_flags(&self) -> EventFlags {
        self.flags
    }
}

impl fmt::Debug for HistoryEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HistoryEntry")
            .field("index", &self.index)
            .field("ints", &self.ints)
            .field("objs", &self.objs.len())
            .field("flags", &self.flags)
            .finish()
    }
}

/// Index-sorted block of at most `capacity` entries; never empty once published
#[derive(Debug, Clone, Default)]
pub struct Page {
    entries: Vec<Arc<HistoryEntry>>,
}

impl Page {
    pub(crate) fn single(entry: Arc<HistoryEntry>, capacity: usize) -> Self {
        let mut entries = Vec::with_capacity(capacity);
        entries.push(entry);
        Self { entries }
    }

    fn from_slices(parts: &[&[Arc<HistoryEntry>]], capacity: usize) -> Self {
        let mut entries = Vec::with_capacity(capacity);
        for part in parts {
            entries.extend_from_slice(part);
        }
        Self { entries }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[inline]
    pub fn entries(&self) -> &[Arc<HistoryEntry>] {
        &self.entries
    }

    #[inline(always)]
    pub fn min_index(&self) -> i64 {
        self.entries[0].index
    }

    #[inline(always)]
    pub fn max_index(&self) -> i64 {
        self.entries[self.entries.len() - 1].index
    }

    /// Position of `index`, or where it would be inserted
    #[inline]
    pub(crate) fn search(&self, index: i64) -> Result<usize, usize> {
        // Appends are the common case: check the tail before bisecting
        match self.entries.last() {
            Some(last) if index > last.index => Err(self.entries.len()),
            _ => self.entries.binary_search_by_key(&index, |e| e.index),
        }
    }

    /// Number of entries with index strictly below `index`
    #[inline]
    pub(crate) fn count_below(&self, index: i64) -> usize {
        self.entries.partition_point(|e| e.index < index)
    }

    /// Number of entries with index at or below `index`
    #[inline]
    pub(crate) fn count_at_or_below(&self, index: i64) -> usize {
        self.entries.partition_point(|e| e.index <= index)
    }

    pub(crate) fn inserted(&self, pos: usize, entry: Arc<HistoryEntry>, capacity: usize) -> Self {
        debug_assert!(self.len() < capacity);
        let mut entries = Vec::with_capacity(capacity);
        entries.extend_from_slice(&self.entries[..pos]);
        entries.push(entry);
        entries.extend_from_slice(&self.entries[pos..]);
        Self { entries }
    }

    pub(crate) fn replaced(&self, pos: usize, entry: Arc<HistoryEntry>) -> Self {
        debug_assert_eq!(self.entries[pos].index, entry.index);
        let mut entries = self.entries.clone();
        entries[pos] = entry;
        Self { entries }
    }

    pub(crate) fn removed(&self, pos: usize, capacity: usize) -> Self {
        Self::from_slices(&[&self.entries[..pos], &self.entries[pos + 1..]], capacity)
    }

    /// Entries from `from` on (drops the head)
    pub(crate) fn tail(&self, from: usize, capacity: usize) -> Self {
        Self::from_slices(&[&self.entries[from..]], capacity)
    }

    /// Split into two half-full pages
    pub(crate) fn split(&self, capacity: usize) -> (Self, Self) {
        let mid = self.entries.len() / 2;
        (
            Self::from_slices(&[&self.entries[..mid]], capacity),
            Self::from_slices(&[&self.entries[mid..]], capacity),
        )
    }

    /// Concatenate with the page that directly follows this one
    pub(crate) fn merged(&self, next: &Self, capacity: usize) -> Self {
        debug_assert!(self.max_index() < next.min_index());
        Self::from_slices(&[&self.entries[..], &next.entries[..]], capacity)
    }

    /// Strictly increasing and non-empty
    pub(crate) fn is_valid(&self) -> bool {
        !self.entries.is_empty() && self.entries.windows(2).all(|w| w[0].index < w[1].index)
    }
}

/// Fan-out of directory nodes
pub(crate) const NODE_CAPACITY: usize = 32;
/// A node narrower than this borrows from or merges with a sibling
const NODE_LOW_WATER: usize = NODE_CAPACITY / 4;

/// Change applied at one page position
pub(crate) enum Edit {
    Replace(Arc<Page>),
    /// Insert before the page at the position (or append at the end)
    Insert(Arc<Page>),
    Remove,
}

#[derive(Debug, Clone)]
enum Children {
    Pages(Vec<Arc<Page>>),
    Nodes(Vec<Arc<Node>>),
}

/// Persistent, balanced directory of pages ordered by minimum index
///
/// Nodes are never modified once built. An edit copies the nodes on the path
/// to the touched page (plus one sibling per level when rebalancing) and
/// shares every other node with the previous version, so its cost depends on
/// the tree height and not on the page count. Publishing a version is one
/// pointer swap and a reader always sees one complete version.
#[derive(Debug, Clone)]
pub(crate) struct Node {
    children: Children,
    /// Minimum index of the first page; 0 when empty
    min: i64,
    pages: usize,
    entries: usize,
}

impl Default for Node {
    fn default() -> Self {
        Self::leaf(Vec::new())
    }
}

impl Node {
    fn leaf(pages: Vec<Arc<Page>>) -> Self {
        Self {
            min: pages.first().map_or(0, |p| p.min_index()),
            pages: pages.len(),
            entries: pages.iter().map(|p| p.len()).sum(),
            children: Children::Pages(pages),
        }
    }

    fn branch(nodes: Vec<Arc<Node>>) -> Self {
        Self {
            min: nodes.first().map_or(0, |n| n.min),
            pages: nodes.iter().map(|n| n.pages).sum(),
            entries: nodes.iter().map(|n| n.entries).sum(),
            children: Children::Nodes(nodes),
        }
    }

    #[inline]
    fn width(&self) -> usize {
        match &self.children {
            Children::Pages(pages) => pages.len(),
            Children::Nodes(nodes) => nodes.len(),
        }
    }

    #[inline]
    pub(crate) fn page_count(&self) -> usize {
        self.pages
    }

    #[inline]
    pub(crate) fn entry_count(&self) -> usize {
        self.entries
    }

    /// New version with `edit` applied at page position `pos`
    ///
    /// # Panics
    /// When `pos` is out of range for the edit.
    pub(crate) fn edited(&self, pos: usize, edit: Edit) -> Arc<Node> {
        let mut parts = self.edit(pos, edit);
        let mut root = match parts.len() {
            1 => parts.remove(0),
            _ => Arc::new(Node::branch(parts)),
        };
        if root.pages == 0 {
            return Arc::new(Node::default());
        }
        // The tree loses a level once the root has a single child
        loop {
            let child = match &root.children {
                Children::Nodes(nodes) if nodes.len() == 1 => Arc::clone(&nodes[0]),
                _ => break,
            };
            root = child;
        }
        root
    }

    /// Apply `edit` below this node; returns one node, or two after a split
    fn edit(&self, pos: usize, edit: Edit) -> Vec<Arc<Node>> {
        match &self.children {
            Children::Pages(pages) => {
                let mut pages = pages.clone();
                match edit {
                    Edit::Replace(page) => pages[pos] = page,
                    Edit::Insert(page) => pages.insert(pos, page),
                    Edit::Remove => {
                        pages.remove(pos);
                    }
                }
                split_wide(pages, Node::leaf)
            }
            Children::Nodes(nodes) => {
                let inserting = matches!(edit, Edit::Insert(_));
                let (i, rel) = route(nodes, pos, inserting);
                let parts = nodes[i].edit(rel, edit);
                let touched = parts.len();

                let mut children = Vec::with_capacity(nodes.len() + 1);
                children.extend_from_slice(&nodes[..i]);
                children.extend(parts.into_iter().filter(|n| n.pages > 0));
                let emptied = children.len() < i + touched;
                children.extend_from_slice(&nodes[i + 1..]);

                if touched == 1 && !emptied && children.len() > 1 && children[i].width() < NODE_LOW_WATER {
                    let left = if i > 0 { i - 1 } else { i };
                    let joined = join(&children[left], &children[left + 1]);
                    children.splice(left..left + 2, joined);
                }
                split_wide(children, Node::branch)
            }
        }
    }

    /// Page at position `pos`
    pub(crate) fn page(&self, mut pos: usize) -> Option<&Arc<Page>> {
        if pos >= self.pages {
            return None;
        }
        let mut node = self;
        loop {
            match &node.children {
                Children::Pages(pages) => return pages.get(pos),
                Children::Nodes(nodes) => {
                    let (i, rel) = route(nodes, pos, false);
                    node = &*nodes[i];
                    pos = rel;
                }
            }
        }
    }

    /// Ascending pages
    pub(crate) fn pages(&self) -> impl DoubleEndedIterator<Item = &Arc<Page>> + '_ {
        (0..self.pages).filter_map(move |k| self.page(k))
    }

    /// Page that holds `index` or would receive it, with its position: the
    /// last page whose minimum is at or below `index`, or the first page.
    pub(crate) fn locate(&self, index: i64) -> Option<(usize, &Arc<Page>)> {
        let mut node = self;
        let mut base = 0;
        loop {
            match &node.children {
                Children::Pages(pages) => {
                    let k = pages.partition_point(|p| p.min_index() <= index).saturating_sub(1);
                    return pages.get(k).map(|page| (base + k, page));
                }
                Children::Nodes(nodes) => {
                    let k = nodes.partition_point(|n| n.min <= index).saturating_sub(1);
                    base += nodes[..k].iter().map(|n| n.pages).sum::<usize>();
                    node = &**nodes.get(k)?;
                }
            }
        }
    }

    pub(crate) fn min_index(&self) -> Option<i64> {
        self.page(0).map(|p| p.min_index())
    }

    pub(crate) fn max_index(&self) -> Option<i64> {
        self.pages
            .checked_sub(1)
            .and_then(|k| self.page(k))
            .map(|p| p.max_index())
    }

    /// Entry with exactly `index`
    pub(crate) fn find_entry(&self, index: i64) -> Option<&HistoryEntry> {
        let (_, page) = self.locate(index)?;
        page.search(index).ok().map(|pos| &*page.entries()[pos])
    }

    /// Number of entries below `index`, or at or below it when `inclusive`
    fn rank(&self, index: i64, inclusive: bool) -> usize {
        let before = |min: i64| if inclusive { min <= index } else { min < index };
        let mut node = self;
        let mut rank = 0;
        loop {
            match &node.children {
                Children::Pages(pages) => {
                    let k = pages.partition_point(|p| before(p.min_index()));
                    let Some((page, whole)) = pages[..k].split_last() else {
                        return rank;
                    };
                    rank += whole.iter().map(|p| p.len()).sum::<usize>();
                    return rank
                        + if inclusive {
                            page.count_at_or_below(index)
                        } else {
                            page.count_below(index)
                        };
                }
                Children::Nodes(nodes) => {
                    let k = nodes.partition_point(|n| before(n.min));
                    let Some((child, whole)) = nodes[..k].split_last() else {
                        return rank;
                    };
                    rank += whole.iter().map(|n| n.entries).sum::<usize>();
                    node = &**child;
                }
            }
        }
    }

    /// Number of entries with `lo <= index <= hi`
    pub(crate) fn count_in_range(&self, lo: i64, hi: i64) -> usize {
        if lo > hi {
            return 0;
        }
        self.rank(hi, true) - self.rank(lo, false)
    }

    /// Index of the entry at ascending position `rank`
    pub(crate) fn nth_index(&self, mut rank: usize) -> Option<i64> {
        if rank >= self.entries {
            return None;
        }
        let mut node = self;
        loop {
            match &node.children {
                Children::Pages(pages) => {
                    for page in pages {
                        if rank < page.len() {
                            return Some(page.entries()[rank].index());
                        }
                        rank -= page.len();
                    }
                    return None;
                }
                Children::Nodes(nodes) => {
                    let mut next = None;
                    for child in nodes {
                        if rank < child.entries {
                            next = Some(child);
                            break;
                        }
                        rank -= child.entries;
                    }
                    node = &**next?;
                }
            }
        }
    }

    /// Cached sizes and minimums are exact, nodes fit their capacity and all
    /// leaves sit at the same depth
    pub(crate) fn is_well_formed(&self) -> bool {
        self.depth().is_some()
    }

    /// Leaf distance, or `None` when malformed
    pub(crate) fn depth(&self) -> Option<usize> {
        if self.width() > NODE_CAPACITY {
            return None;
        }
        match &self.children {
            Children::Pages(pages) => {
                let exact = self.pages == pages.len()
                    && self.entries == pages.iter().map(|p| p.len()).sum::<usize>()
                    && pages.first().map_or(true, |p| p.min_index() == self.min);
                exact.then_some(0)
            }
            Children::Nodes(nodes) => {
                let exact = !nodes.is_empty()
                    && self.pages == nodes.iter().map(|n| n.pages).sum::<usize>()
                    && self.entries == nodes.iter().map(|n| n.entries).sum::<usize>()
                    && nodes[0].min == self.min;
                if !exact {
                    return None;
                }
                let mut depth = None;
                for child in nodes {
                    let d = child.depth()?;
                    if *depth.get_or_insert(d) != d {
                        return None;
                    }
                }
                depth.map(|d| d + 1)
            }
        }
    }

    /// Nodes of this version not shared with `previous`
    #[cfg(test)]
    pub(crate) fn nodes_not_in(self: &Arc<Self>, previous: &Arc<Node>) -> usize {
        fn collect(node: &Arc<Node>, out: &mut std::collections::HashSet<*const Node>) {
            out.insert(Arc::as_ptr(node));
            if let Children::Nodes(nodes) = &node.children {
                for child in nodes {
                    collect(child, out);
                }
            }
        }
        let mut old = std::collections::HashSet::new();
        collect(previous, &mut old);
        let mut new = std::collections::HashSet::new();
        collect(self, &mut new);
        new.difference(&old).count()
    }
}

/// Child holding page position `pos` and the position inside it. Inserts at
/// the very end go to the last child.
fn route(nodes: &[Arc<Node>], mut pos: usize, inserting: bool) -> (usize, usize) {
    let last = nodes.len() - 1;
    for (i, node) in nodes.iter().enumerate() {
        if pos < node.pages || (inserting && i == last) {
            return (i, pos);
        }
        pos -= node.pages;
    }
    (last, pos)
}

/// One node, or two halves when over capacity
fn split_wide<T>(mut items: Vec<T>, build: fn(Vec<T>) -> Node) -> Vec<Arc<Node>> {
    if items.len() <= NODE_CAPACITY {
        return vec![Arc::new(build(items))];
    }
    let right = items.split_off(items.len() / 2);
    vec![Arc::new(build(items)), Arc::new(build(right))]
}

/// Merge two adjacent siblings, or even them out when the union is too wide
fn join(left: &Node, right: &Node) -> Vec<Arc<Node>> {
    match (&left.children, &right.children) {
        (Children::Pages(a), Children::Pages(b)) => split_wide([&a[..], &b[..]].concat(), Node::leaf),
        (Children::Nodes(a), Children::Nodes(b)) => split_wide([&a[..], &b[..]].concat(), Node::branch),
        _ => unreachable!("siblings always sit at the same depth"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::record::RecordValues;

    fn layout() -> RecordLayout {
        RecordLayout::new(0, "Test", 2, 1)
    }

    fn entry(index: i64) -> Arc<HistoryEntry> {
        let values = RecordValues::filled(&layout(), index as i32);
        Arc::new(HistoryEntry::from_cursor(index, &layout(), &values, EventFlags::NONE))
    }

    fn page(indices: &[i64]) -> Page {
        let parts: Vec<Arc<HistoryEntry>> = indices.iter().map(|&i| entry(i)).collect();
        Page::from_slices(&[&parts[..]], 8)
    }

    fn indices(page: &Page) -> Vec<i64> {
        page.entries().iter().map(|e| e.index()).collect()
    }

    #[test]
    fn test_search() {
        let p = page(&[10, 20, 30]);
        assert_eq!(p.search(20), Ok(1));
        assert_eq!(p.search(5), Err(0));
        assert_eq!(p.search(25), Err(2));
        assert_eq!(p.search(40), Err(3));
        assert_eq!(p.count_below(20), 1);
        assert_eq!(p.count_at_or_below(20), 2);
    }

    #[test]
    fn test_copy_on_write_leaves_source_page_intact() {
        let p = page(&[10, 30]);
        let q = p.inserted(1, entry(20), 8);
        assert_eq!(indices(&p), vec![10, 30]);
        assert_eq!(indices(&q), vec![10, 20, 30]);
        // Unchanged entries are shared, not copied
        assert!(Arc::ptr_eq(&p.entries()[0], &q.entries()[0]));

        let r = q.removed(0, 8);
        assert_eq!(indices(&r), vec![20, 30]);
        assert_eq!(indices(&q.tail(2, 8)), vec![30]);
    }

    #[test]
    fn test_split_and_merge() {
        let p = page(&[1, 2, 3, 4, 5]);
        let (l, r) = p.split(8);
        assert_eq!(indices(&l), vec![1, 2]);
        assert_eq!(indices(&r), vec![3, 4, 5]);
        assert!(l.is_valid() && r.is_valid());
        assert_eq!(indices(&l.merged(&r, 8)), vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn test_replace_swaps_reference() {
        let p = page(&[1, 2]);
        let fresh = entry(2);
        let q = p.replaced(1, Arc::clone(&fresh));
        assert!(Arc::ptr_eq(&q.entries()[1], &fresh));
        assert!(!Arc::ptr_eq(&p.entries()[1], &fresh));
    }

    #[test]
    fn test_same_values() {
        let l = layout();
        let obj: ObjValue = Arc::new(String::from("x"));
        let values = RecordValues::new(vec![1, 2], vec![Some(Arc::clone(&obj))]);
        let e = HistoryEntry::from_cursor(7, &l, &values, EventFlags::NONE);
        assert!(e.same_values(&values));
        let other_obj = RecordValues::new(vec![1, 2], vec![Some(Arc::new(String::from("x")) as ObjValue)]);
        assert!(!e.same_values(&other_obj));
        let other_int = RecordValues::new(vec![1, 3], vec![Some(obj)]);
        assert!(!e.same_values(&other_int));
    }

    /// Directory of single-entry pages at 0, 10, 20, ...
    fn directory(pages: usize) -> Arc<Node> {
        let mut root = Arc::new(Node::default());
        for k in 0..pages {
            root = root.edited(k, Edit::Insert(Arc::new(page(&[k as i64 * 10]))));
        }
        root
    }

    fn mins(root: &Node) -> Vec<i64> {
        root.pages().map(|p| p.min_index()).collect()
    }

    #[test]
    fn test_directory_edits() {
        let root = directory(100);
        assert!(root.is_well_formed());
        assert_eq!(root.page_count(), 100);
        assert_eq!(root.entry_count(), 100);
        assert_eq!(mins(&root), (0..100).map(|k| k * 10).collect::<Vec<_>>());

        let replaced = root.edited(40, Edit::Replace(Arc::new(page(&[400, 401]))));
        let inserted = replaced.edited(41, Edit::Insert(Arc::new(page(&[405]))));
        let removed = inserted.edited(0, Edit::Remove);
        assert!(removed.is_well_formed());
        assert_eq!(removed.page_count(), 100);
        assert_eq!(removed.entry_count(), 101);
        assert_eq!(removed.min_index(), Some(10));
        assert_eq!(removed.page(40).map(|p| p.min_index()), Some(405));
        // Older versions are untouched
        assert_eq!(root.page(40).map(|p| p.len()), Some(1));
        assert_eq!(root.min_index(), Some(0));
        assert_eq!(replaced.page_count(), 100);
    }

    #[test]
    fn test_directory_shrinks_back_to_empty() {
        let mut root = directory(2_000);
        let depth = root.depth();
        assert!(depth > Some(1), "{depth:?}");
        for k in (0..2_000).rev().step_by(2) {
            root = root.edited(k, Edit::Remove);
            assert!(root.is_well_formed());
        }
        assert_eq!(root.page_count(), 1_000);
        assert_eq!(mins(&root), (0..1_000).map(|k| k * 20).collect::<Vec<_>>());
        while root.page_count() > 0 {
            root = root.edited(0, Edit::Remove);
            assert!(root.is_well_formed());
        }
        assert_eq!(root.depth(), Some(0));
        assert_eq!(root.min_index(), None);
        assert_eq!(root.max_index(), None);
    }

    #[test]
    fn test_edit_cost_is_independent_of_page_count() {
        for pages in [100, 1_000, 20_000] {
            let root = directory(pages);
            let depth = root.depth().unwrap_or_default();
            assert!(depth <= 4, "{pages} pages at depth {depth}");

            // A split: replace one page and insert its right half after it
            let mid = pages / 2;
            let split = root
                .edited(mid, Edit::Replace(Arc::new(page(&[mid as i64 * 10]))))
                .edited(mid + 1, Edit::Insert(Arc::new(page(&[mid as i64 * 10 + 5]))));
            assert!(split.is_well_formed());
            let fresh = split.nodes_not_in(&root);
            assert!(fresh <= 2 * (depth + 1) + 1, "{pages} pages: {fresh} nodes rebuilt");

            let appended = root.edited(pages, Edit::Insert(Arc::new(page(&[pages as i64 * 10]))));
            assert!(appended.nodes_not_in(&root) <= 2 * (depth + 1) + 1);
            let dropped = root.edited(mid, Edit::Remove);
            assert!(dropped.nodes_not_in(&root) <= 2 * (depth + 1) + 1);
        }
    }

    #[test]
    fn test_range_queries() {
        let mut root = Arc::new(Node::default());
        for (k, indices) in [&[1, 3, 5][..], &[10, 12][..], &[20, 21, 22][..]].into_iter().enumerate() {
            root = root.edited(k, Edit::Insert(Arc::new(page(indices))));
        }
        assert_eq!(root.count_in_range(0, 100), 8);
        assert_eq!(root.count_in_range(3, 12), 4);
        assert_eq!(root.count_in_range(6, 9), 0);
        assert_eq!(root.count_in_range(4, 4), 0);
        assert_eq!(root.count_in_range(5, 5), 1);
        assert_eq!(root.count_in_range(2, 21), 6);
        assert_eq!(root.count_in_range(30, 40), 0);
        assert_eq!(root.count_in_range(12, 3), 0);
        assert_eq!(Node::default().count_in_range(0, 1), 0);

        assert_eq!(root.find_entry(12).map(|e| e.index()), Some(12));
        assert!(root.find_entry(0).is_none());
        assert!(root.find_entry(11).is_none());
        assert!(root.find_entry(99).is_none());

        assert_eq!(root.nth_index(0), Some(1));
        assert_eq!(root.nth_index(4), Some(12));
        assert_eq!(root.nth_index(7), Some(22));
        assert_eq!(root.nth_index(8), None);
        assert_eq!(root.locate(11).map(|(k, _)| k), Some(1));
        assert_eq!(root.locate(-5).map(|(k, _)| k), Some(0));
        assert_eq!(root.max_index(), Some(22));
    }

    #[test]
    fn test_deep_range_queries() {
        let root = directory(5_000);
        assert_eq!(root.count_in_range(0, 49_990), 5_000);
        assert_eq!(root.count_in_range(15, 45), 3);
        assert_eq!(root.count_in_range(20_000, 20_000), 1);
        assert_eq!(root.nth_index(2_500), Some(25_000));
        assert_eq!(root.locate(25_005).map(|(k, _)| k), Some(2_500));
        assert_eq!(root.find_entry(49_990).map(|e| e.index()), Some(49_990));
        assert_eq!(root.pages().rev().next().map(|p| p.min_index()), Some(49_990));
    }
}
