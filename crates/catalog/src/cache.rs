//! Live in-memory view of the catalog: a flat book map, tag partitions and
//! the series hierarchy.

use crate::error::{ErrorKind, Result};
use crate::filter::catalog_order;
use crate::model::Book;
use crate::series::SeriesTree;
use crate::source::CatalogSource;
use crate::tags::TagEntry;
use dashmap::DashMap;
use exn::ResultExt;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use tracing::instrument;
use uuid::Uuid;

/// Concurrent cache of every book in the catalog.
///
/// Reads never block on each other. Mutations are serialized among
/// themselves; the series tree is replaced wholesale, so readers holding a
/// snapshot from [`series`](Self::series) never observe a half-updated tree.
#[derive(Default)]
pub struct CatalogCache {
    books: DashMap<Uuid, Arc<Book>>,
    tags: DashMap<String, TagEntry>,
    series: RwLock<Arc<SeriesTree>>,
    writer: Mutex<()>,
}

impl CatalogCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reloads everything from `source`, discarding the current state.
    #[instrument(skip_all)]
    pub async fn rebuild(&self, source: &dyn CatalogSource) -> Result<()> {
        let books = source.books().await.or_raise(|| ErrorKind::Unavailable("could not load books".to_string()))?;
        self.replace_all(books);
        Ok(())
    }

    /// Replaces the whole cache with `books`.
    ///
    /// Entries are swapped in place, so concurrent readers see either the old
    /// or the new record of a book but never an empty cache.
    pub fn replace_all(&self, books: Vec<Book>) {
        let _writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        let ids: HashSet<Uuid> = books.iter().map(|book| book.id).collect();
        for book in books {
            self.books.insert(book.id, Arc::new(book));
        }
        self.books.retain(|id, _| ids.contains(id));
        self.rebuild_tags();
        self.rebuild_series();
        tracing::info!(books = self.books.len(), tags = self.tags.len(), "Rebuilt catalog cache");
    }

    pub fn find(&self, id: Uuid) -> Option<Arc<Book>> {
        self.books.get(&id).map(|entry| entry.value().clone())
    }

    pub fn contains(&self, id: Uuid) -> bool {
        self.books.contains_key(&id)
    }

    /// Every cached book in catalog order.
    pub fn books(&self) -> Vec<Arc<Book>> {
        let mut books: Vec<_> = self.books.iter().map(|entry| entry.value().clone()).collect();
        books.sort_by(|a, b| catalog_order(a, b));
        books
    }

    pub fn len(&self) -> usize {
        self.books.len()
    }

    pub fn is_empty(&self) -> bool {
        self.books.is_empty()
    }

    /// Current series hierarchy snapshot.
    pub fn series(&self) -> Arc<SeriesTree> {
        self.series.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn tags(&self) -> BTreeMap<String, TagEntry> {
        self.tags.iter().map(|entry| (entry.key().clone(), entry.value().clone())).collect()
    }

    pub fn tag(&self, name: &str) -> Option<TagEntry> {
        self.tags.get(name).map(|entry| entry.value().clone())
    }

    /// Inserts or replaces `book`, keeping series and tags in step.
    #[instrument(skip_all, fields(book = %book.id))]
    pub fn update_book(&self, book: Book) {
        let _writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        let book = Arc::new(book);
        let previous = self.books.insert(book.id, book.clone());

        match &previous {
            Some(previous) if previous.series == book.series => {
                let reorder = previous.order_in_series != book.order_in_series
                    || previous.sortable_title() != book.sortable_title();
                let mut tree = self.series();
                if Arc::make_mut(&mut tree).replace_book(book.clone(), reorder) {
                    self.publish(tree);
                } else {
                    tracing::warn!("Book missing from its series, rebuilding series tree");
                    self.rebuild_series();
                }
            },
            _ => self.rebuild_series(),
        }

        let empty = BTreeSet::new();
        let previous_tags = previous.as_ref().map_or(&empty, |previous| &previous.tags);
        let flipped = previous.as_ref().is_some_and(|previous| previous.searched_by_default != book.searched_by_default);
        for tag in previous_tags.difference(&book.tags) {
            let emptied = match self.tags.get_mut(tag) {
                Some(mut entry) => {
                    entry.remove(&book.id);
                    entry.is_empty()
                },
                None => false,
            };
            if emptied {
                self.tags.remove_if(tag, |_, entry| entry.is_empty());
            }
        }
        for tag in &book.tags {
            if flipped || !previous_tags.contains(tag) {
                self.tags.entry(tag.clone()).or_default().insert(&book);
            }
        }
    }

    /// Drops `id` from the cache. Returns the removed book, if it was cached.
    #[instrument(skip(self))]
    pub fn remove_book(&self, id: Uuid) -> Option<Arc<Book>> {
        let _writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        let (_, removed) = self.books.remove(&id)?;
        self.rebuild_tags();
        self.rebuild_series();
        Some(removed)
    }

    fn rebuild_tags(&self) {
        let mut tags: HashMap<String, TagEntry> = HashMap::new();
        for entry in self.books.iter() {
            let book = entry.value();
            for tag in &book.tags {
                tags.entry(tag.clone()).or_default().insert(book);
            }
        }
        self.tags.retain(|name, _| tags.contains_key(name));
        for (name, entry) in tags {
            self.tags.insert(name, entry);
        }
    }

    fn rebuild_series(&self) {
        let tree = SeriesTree::build(self.books.iter().map(|entry| entry.value().clone()));
        self.publish(Arc::new(tree));
    }

    fn publish(&self, tree: Arc<SeriesTree>) {
        *self.series.write().unwrap_or_else(PoisonError::into_inner) = tree;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::MemoryCatalog;

    fn book(title: &str, series: Option<&str>, tags: &[&str]) -> Book {
        let mut book = Book::new(title, "Author");
        book.series = series.map(str::to_string);
        book.tags = tags.iter().map(|tag| tag.to_string()).collect();
        book
    }

    #[test]
    fn test_new_book_in_nested_series() {
        let cache = CatalogCache::new();
        let book = book("Guards! Guards!", Some("X\\Y"), &[]);
        cache.update_book(book.clone());
        let tree = cache.series();
        let node = tree.find(Some("X\\Y")).unwrap();
        assert_eq!(node.books[0].id, book.id);
        assert_eq!(tree.roots()[0].path.as_deref(), Some("X"));
        assert_eq!(cache.find(book.id).unwrap().title, "Guards! Guards!");
    }

    #[test]
    fn test_tag_partition_flip() {
        let cache = CatalogCache::new();
        let mut book = book("Dune", None, &["scifi", "classic"]);
        cache.update_book(book.clone());
        assert!(cache.tag("scifi").unwrap().default.contains(&book.id));

        book.searched_by_default = false;
        cache.update_book(book.clone());
        for tag in ["scifi", "classic"] {
            let entry = cache.tag(tag).unwrap();
            assert!(entry.default.is_empty(), "{tag} still lists the book as default");
            assert!(entry.optional.contains(&book.id));
        }
    }

    #[test]
    fn test_removed_tag_is_pruned() {
        let cache = CatalogCache::new();
        let mut first = book("Dune", None, &["scifi", "classic"]);
        let second = book("Hyperion", None, &["scifi"]);
        cache.update_book(first.clone());
        cache.update_book(second.clone());

        first.tags = ["scifi".to_string()].into();
        cache.update_book(first.clone());
        assert!(cache.tag("classic").is_none());

        cache.remove_book(first.id);
        let scifi = cache.tag("scifi").unwrap();
        assert_eq!(scifi.books().collect::<Vec<_>>(), vec![&second.id]);
        cache.remove_book(second.id);
        assert!(cache.tags().is_empty());
        assert!(cache.series().is_empty());
    }

    #[test]
    fn test_tags_stay_disjoint() {
        let cache = CatalogCache::new();
        let mut book = book("Dune", None, &["scifi"]);
        for flag in [false, true, false, false, true] {
            book.searched_by_default = flag;
            cache.update_book(book.clone());
            let entry = cache.tag("scifi").unwrap();
            assert_eq!(entry.len(), 1);
            assert!(entry.default.is_disjoint(&entry.optional));
        }
    }

    #[test]
    fn test_series_change_moves_book() {
        let cache = CatalogCache::new();
        let mut book = book("Mort", Some("Discworld"), &[]);
        cache.update_book(book.clone());
        book.series = Some("Discworld\\Death".to_string());
        cache.update_book(book.clone());
        let tree = cache.series();
        assert!(tree.find(Some("Discworld")).unwrap().books.is_empty());
        assert_eq!(tree.find(Some("Discworld\\Death")).unwrap().books[0].id, book.id);
    }

    #[test]
    fn test_snapshot_is_stable_across_updates() {
        let cache = CatalogCache::new();
        let mut book = book("Mort", Some("Discworld"), &[]);
        cache.update_book(book.clone());
        let before = cache.series();
        book.title = "Mort (Revised)".to_string();
        cache.update_book(book.clone());
        assert_eq!(before.find(Some("Discworld")).unwrap().books[0].title, "Mort");
        assert_eq!(cache.series().find(Some("Discworld")).unwrap().books[0].title, "Mort (Revised)");
    }

    #[test]
    fn test_remove_unknown_book() {
        let cache = CatalogCache::new();
        assert!(cache.remove_book(Uuid::new_v4()).is_none());
    }

    #[test]
    fn test_replace_all_keeps_shared_entries() {
        let cache = CatalogCache::new();
        let kept = book("Dune", None, &["scifi"]);
        let stale = book("Stale", None, &["scifi", "old"]);
        cache.replace_all(vec![kept.clone(), stale.clone()]);

        let mut renamed = kept.clone();
        renamed.title = "Dune Messiah".to_string();
        let added = book("Emma", None, &["classic"]);
        cache.replace_all(vec![renamed.clone(), added.clone()]);

        assert_eq!(cache.len(), 2);
        assert!(!cache.contains(stale.id));
        assert_eq!(cache.find(kept.id).unwrap().title, "Dune Messiah");
        assert!(cache.tag("old").is_none());
        assert_eq!(cache.tag("scifi").unwrap().books().collect::<Vec<_>>(), vec![&kept.id]);
        assert!(cache.tag("classic").unwrap().books().any(|id| *id == added.id));
    }

    #[tokio::test]
    async fn test_rebuild_from_source() {
        let books = vec![book("Dune", Some("Dune"), &["scifi"]), book("Emma", None, &["classic"])];
        let catalog = MemoryCatalog::new(books.clone(), Vec::new());
        let cache = CatalogCache::new();
        cache.update_book(book("Stale", None, &["old"]));
        cache.rebuild(&catalog).await.unwrap();
        assert_eq!(cache.len(), 2);
        assert!(cache.tag("old").is_none());
        let names: Vec<_> = cache.series().roots().iter().map(|root| root.name.clone()).collect();
        assert_eq!(names, vec!["No Series".to_string(), "Dune".to_string()]);
    }
}
