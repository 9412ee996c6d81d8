//! Series hierarchy as a prefix trie over backslash-delimited series paths.

use crate::model::{Book, NO_SERIES, SERIES_SEPARATOR, sortable};
use serde::Serialize;
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::sync::Arc;
use uuid::Uuid;

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SeriesNode {
    /// Full path from the root, `None` for the "No Series" node.
    pub path: Option<String>,
    pub root: bool,
    pub name: String,
    /// Books directly in this series, in reading order.
    pub books: Vec<Arc<Book>>,
    /// Sub-series keyed by their path segment.
    pub children: BTreeMap<String, SeriesNode>,
}

/// Reading order within a series.
pub(crate) fn reading_order(a: &Book, b: &Book) -> Ordering {
    a.order_in_series.cmp(&b.order_in_series).then_with(|| a.sortable_title().cmp(&b.sortable_title()))
}

impl SeriesNode {
    fn new(path: Option<String>, root: bool, name: &str) -> Self {
        Self {
            path,
            root,
            name: name.to_string(),
            books: Vec::new(),
            children: BTreeMap::new(),
        }
    }

    /// The path filters match against: the real path, or [`NO_SERIES`].
    pub fn filter_path(&self) -> &str {
        self.path.as_deref().unwrap_or(NO_SERIES)
    }

    pub fn sortable_name(&self) -> std::borrow::Cow<'_, str> {
        sortable(&self.name)
    }

    fn sort_books(&mut self) {
        self.books.sort_by(|a, b| reading_order(a, b));
        for child in self.children.values_mut() {
            child.sort_books();
        }
    }

    /// Copy of this subtree keeping only books accepted by `keep`. Nodes
    /// left without books or children are dropped.
    fn retain(&self, keep: &impl Fn(&Book) -> bool) -> Option<Self> {
        let children: BTreeMap<_, _> = self
            .children
            .iter()
            .filter_map(|(segment, child)| child.retain(keep).map(|child| (segment.clone(), child)))
            .collect();
        let books: Vec<_> = self.books.iter().filter(|book| keep(book)).cloned().collect();
        if books.is_empty() && children.is_empty() {
            return None;
        }
        Some(Self {
            path: self.path.clone(),
            root: self.root,
            name: self.name.clone(),
            books,
            children,
        })
    }
}

/// Immutable snapshot of the whole series hierarchy.
///
/// Roots are ordered with "No Series" first, then by sortable name.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct SeriesTree {
    roots: Vec<SeriesNode>,
}

impl SeriesTree {
    pub fn build(books: impl IntoIterator<Item = Arc<Book>>) -> Self {
        let mut roots: BTreeMap<Option<String>, SeriesNode> = BTreeMap::new();
        for book in books {
            let node = match book.series.as_deref() {
                None => roots.entry(None).or_insert_with(|| SeriesNode::new(None, true, NO_SERIES)),
                Some(path) => {
                    let mut segments = path.split(SERIES_SEPARATOR);
                    let first = segments.next().unwrap_or_default();
                    let mut current = first.to_string();
                    let mut node = roots
                        .entry(Some(current.clone()))
                        .or_insert_with(|| SeriesNode::new(Some(first.to_string()), true, first));
                    for segment in segments {
                        current.push(SERIES_SEPARATOR);
                        current.push_str(segment);
                        node = node
                            .children
                            .entry(segment.to_string())
                            .or_insert_with(|| SeriesNode::new(Some(current.clone()), false, segment));
                    }
                    node
                },
            };
            node.books.push(book);
        }
        let mut roots: Vec<SeriesNode> = roots.into_values().collect();
        for root in &mut roots {
            root.sort_books();
        }
        roots.sort_by(|a, b| a.path.is_some().cmp(&b.path.is_some()).then_with(|| a.sortable_name().cmp(&b.sortable_name())));
        Self { roots }
    }

    pub fn roots(&self) -> &[SeriesNode] {
        &self.roots
    }

    pub fn is_empty(&self) -> bool {
        self.roots.is_empty()
    }

    /// The node for `path`, `None` addressing the "No Series" node.
    pub fn find(&self, path: Option<&str>) -> Option<&SeriesNode> {
        let Some(path) = path else {
            return self.roots.iter().find(|root| root.path.is_none());
        };
        let mut segments = path.split(SERIES_SEPARATOR);
        let first = segments.next()?;
        let mut node = self.roots.iter().find(|root| root.path.is_some() && root.name == first)?;
        for segment in segments {
            node = node.children.get(segment)?;
        }
        Some(node)
    }

    fn find_mut(&mut self, path: Option<&str>) -> Option<&mut SeriesNode> {
        let Some(path) = path else {
            return self.roots.iter_mut().find(|root| root.path.is_none());
        };
        let mut segments = path.split(SERIES_SEPARATOR);
        let first = segments.next()?;
        let mut node = self.roots.iter_mut().find(|root| root.path.is_some() && root.name == first)?;
        for segment in segments {
            node = node.children.get_mut(segment)?;
        }
        Some(node)
    }

    /// Every node, depth first.
    pub fn nodes(&self) -> Vec<&SeriesNode> {
        let mut nodes = Vec::new();
        let mut stack: Vec<&SeriesNode> = self.roots.iter().rev().collect();
        while let Some(node) = stack.pop() {
            nodes.push(node);
            stack.extend(node.children.values().rev());
        }
        nodes
    }

    /// Replaces the entry of `book` in place. Returns `false` when the book
    /// isn't where its series path says it should be.
    pub(crate) fn replace_book(&mut self, book: Arc<Book>, reorder: bool) -> bool {
        let Some(node) = self.find_mut(book.series.as_deref()) else {
            return false;
        };
        let Some(slot) = node.books.iter_mut().find(|existing| existing.id == book.id) else {
            return false;
        };
        *slot = book;
        if reorder {
            node.books.sort_by(|a, b| reading_order(a, b));
        }
        true
    }

    /// Copy of the tree restricted to the books `keep` accepts.
    pub fn retain(&self, keep: impl Fn(&Book) -> bool) -> Self {
        Self {
            roots: self.roots.iter().filter_map(|root| root.retain(&keep)).collect(),
        }
    }

    pub fn contains(&self, id: Uuid) -> bool {
        self.nodes().iter().any(|node| node.books.iter().any(|book| book.id == id))
    }
}
