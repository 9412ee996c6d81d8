//! Background indexing: normalizes a book's chapters, rebuilds its index
//! generation and keeps the book's `indexing`/`searchable` flags in step.

use crate::error::{ErrorKind, Result};
use async_stream::stream;
use dashmap::DashMap;
use exn::{OptionExt, ResultExt};
use futures::stream::FuturesUnordered;
use futures::{Stream, StreamExt};
use lectern_catalog::{Book, CatalogCache, CatalogSource, IndexFlags};
use lectern_index::{IndexManager, IndexStats, IndexedChapter};
use lectern_markup::{body_html, normalize_html};
use std::sync::Arc;
use tokio::sync::{Mutex, Semaphore};
use tokio::task::JoinHandle;
use tracing::instrument;
use uuid::Uuid;

/// Progress events emitted by [`Indexer::reindex_all`].
///
/// Events follow a strict ordering:
/// 1. [`Started`](Self::Started) exactly once.
/// 2. [`DiscoveryComplete`](Self::DiscoveryComplete) exactly once, with the
///    number of books to index.
/// 3. [`Indexed`](Self::Indexed) once per successfully indexed book.
/// 4. [`Complete`](Self::Complete) exactly once.
///
/// A failing book is reported as an `Err` item and doesn't end the stream.
/// Failing to reset the index or load the catalog ends it early, in which
/// case [`Complete`](Self::Complete) is never emitted.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum IndexEvent {
    Started,
    DiscoveryComplete(u64),
    Indexed { book: Uuid, stats: IndexStats },
    Complete,
}

const RUNNING: IndexFlags = IndexFlags {
    indexing: Some(true),
    searchable: None,
};
const INDEXED: IndexFlags = IndexFlags {
    indexing: Some(false),
    searchable: Some(true),
};
const FAILED: IndexFlags = IndexFlags {
    indexing: Some(false),
    searchable: Some(false),
};

/// Runs indexing jobs on a bounded pool of workers.
///
/// At most `workers` books are indexed at once. Jobs for the same book are
/// serialized, so the delete-then-insert of one run never interleaves with
/// another run for that book.
pub struct Indexer {
    source: Arc<dyn CatalogSource>,
    cache: Arc<CatalogCache>,
    index: Arc<IndexManager>,
    workers: Semaphore,
    locks: DashMap<Uuid, Arc<Mutex<()>>>,
}

impl Indexer {
    pub fn new(
        source: Arc<dyn CatalogSource>,
        cache: Arc<CatalogCache>,
        index: Arc<IndexManager>,
        workers: usize,
    ) -> Self {
        Self {
            source,
            cache,
            index,
            workers: Semaphore::new(workers.max(1)),
            locks: DashMap::new(),
        }
    }

    pub fn index(&self) -> &Arc<IndexManager> {
        &self.index
    }

    /// Indexes `id` on a separate task.
    pub fn spawn(self: &Arc<Self>, id: Uuid) -> JoinHandle<Result<IndexStats>> {
        let indexer = Arc::clone(self);
        tokio::spawn(async move { indexer.index_book(id).await })
    }

    /// Re-indexes one book.
    ///
    /// The book is flagged as `indexing` for the duration of the run. It only
    /// becomes `searchable` once its new document generation is fully
    /// written; any failure leaves it unsearchable.
    #[instrument(skip(self))]
    pub async fn index_book(&self, id: Uuid) -> Result<IndexStats> {
        let lock = self.lock(id);
        let outcome = {
            let _guard = lock.lock().await;
            match self.workers.acquire().await {
                Ok(_permit) => self.index_locked(id).await,
                Err(_) => Err(exn::Exn::from(ErrorKind::WorkersClosed)),
            }
        };
        drop(lock);
        self.release(id);
        outcome
    }

    async fn index_locked(&self, id: Uuid) -> Result<IndexStats> {
        let book = self.load(id).await?;
        self.flag(id, RUNNING).await?;

        match self.build(&book).await {
            Ok(stats) => {
                if let Err(error) = self.flag(id, INDEXED).await {
                    tracing::error!(title = %book.title, ?error, "Could not mark book as searchable");
                    self.abandon(id).await;
                    return Err(error);
                }
                tracing::info!(
                    title = %book.title,
                    chapters = stats.chapters,
                    paragraphs = stats.paragraphs,
                    "Book indexed"
                );
                Ok(stats)
            },
            Err(error) => {
                tracing::error!(title = %book.title, ?error, "Could not finish indexing");
                self.flag(id, FAILED).await?;
                Err(error)
            },
        }
    }

    async fn build(&self, book: &Book) -> Result<IndexStats> {
        let failed = || ErrorKind::IndexingFailed(book.id);
        let mapping = self.source.class_mapping(book.id).await.or_raise(|| ErrorKind::Catalog).or_raise(failed)?;
        let chapters = self.source.chapters(book.id).await.or_raise(|| ErrorKind::Catalog).or_raise(failed)?;

        let mut indexed = Vec::with_capacity(chapters.len());
        for chapter in chapters {
            let content = body_html(&normalize_html(&chapter.content, &mapping));
            self.source
                .set_indexed_content(chapter.id, content.clone())
                .await
                .or_raise(|| ErrorKind::Catalog)
                .or_raise(failed)?;
            indexed.push(IndexedChapter {
                id: chapter.id,
                position: chapter.position,
                content,
            });
        }

        self.index.index_book(book.id, &indexed).await.or_raise(|| ErrorKind::Index).or_raise(failed)
    }

    /// Removes a book from the index, the catalog store and the cache.
    #[instrument(skip(self))]
    pub async fn delete_book(&self, id: Uuid) -> Result<()> {
        let lock = self.lock(id);
        let outcome = {
            let _guard = lock.lock().await;
            self.remove(id).await
        };
        drop(lock);
        self.release(id);
        outcome
    }

    async fn remove(&self, id: Uuid) -> Result<()> {
        self.index.delete_book(id).await.or_raise(|| ErrorKind::Index)?;
        self.source.delete_book(id).await.or_raise(|| ErrorKind::Catalog)?;
        self.cache.remove_book(id);
        Ok(())
    }

    /// Drops the whole index and re-indexes every book of the catalog,
    /// streaming progress as it goes.
    pub fn reindex_all(&self) -> impl Stream<Item = Result<IndexEvent>> + '_ {
        // `rustfmt` does not format macros that use braces. Wrap in parentheses!
        stream!({
            yield Ok(IndexEvent::Started);

            let ids = match self.prepare_reindex().await {
                Ok(ids) => ids,
                Err(e) => {
                    yield Err(e);
                    return;
                },
            };
            yield Ok(IndexEvent::DiscoveryComplete(ids.len() as u64));

            // Concurrency is bounded by the worker semaphore.
            let mut processing: FuturesUnordered<_> =
                ids.into_iter().map(|id| async move { (id, self.index_book(id).await) }).collect();
            while let Some((book, result)) = processing.next().await {
                yield result.map(|stats| IndexEvent::Indexed { book, stats });
            }

            if let Err(e) = self.cache.rebuild(self.source.as_ref()).await.or_raise(|| ErrorKind::Catalog) {
                yield Err(e);
                return;
            }
            tracing::info!("All books re-indexed");
            yield Ok(IndexEvent::Complete);
        })
    }

    async fn prepare_reindex(&self) -> Result<Vec<Uuid>> {
        self.index.reset().await.or_raise(|| ErrorKind::Index)?;
        self.index.provision().await.or_raise(|| ErrorKind::Index)?;
        let books = self.source.books().await.or_raise(|| ErrorKind::Catalog)?;
        let mut ids = Vec::with_capacity(books.len());
        for book in books {
            self.flag(book.id, RUNNING).await?;
            ids.push(book.id);
        }
        Ok(ids)
    }

    async fn load(&self, id: Uuid) -> Result<Book> {
        self.source
            .book(id)
            .await
            .or_raise(|| ErrorKind::Catalog)?
            .ok_or_raise(|| ErrorKind::BookNotFound(id))
    }

    /// Writes the flags of `id` and publishes the stored record to the cache.
    async fn flag(&self, id: Uuid, flags: IndexFlags) -> Result<()> {
        let book = self.source.set_index_flags(id, flags).await.or_raise(|| ErrorKind::Catalog)?;
        self.cache.update_book(book);
        Ok(())
    }

    /// Best-effort reset of a run whose outcome could not be recorded.
    async fn abandon(&self, id: Uuid) {
        if let Err(error) = self.flag(id, FAILED).await {
            tracing::error!(book = %id, ?error, "Could not clear indexing flag");
        }
    }

    fn lock(&self, id: Uuid) -> Arc<Mutex<()>> {
        self.locks.entry(id).or_default().clone()
    }

    /// Forgets the lock of `id` once nobody else holds or waits for it.
    fn release(&self, id: Uuid) {
        self.locks.remove_if(&id, |_, lock| Arc::strong_count(lock) == 1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{ScriptedCatalog, rename};
    use lectern_catalog::{Chapter, MemoryCatalog};
    use lectern_config::SearchConfig;
    use lectern_index::engine::MockEngine;
    use lectern_markup::BookStyle;
    use serde_json::json;
    use std::collections::HashSet;

    struct Fixture {
        engine: Arc<MockEngine>,
        catalog: Arc<MemoryCatalog>,
        cache: Arc<CatalogCache>,
        indexer: Arc<Indexer>,
    }

    fn chapter(book: Uuid, position: u32, content: &str) -> Chapter {
        Chapter {
            id: Uuid::new_v4(),
            book,
            toc_reference: format!("0.{position}-Chapter"),
            title: format!("Chapter {position}"),
            position,
            content: content.to_string(),
            indexed_content: None,
            citation_parameter: None,
        }
    }

    async fn fixture(books: Vec<Book>, chapters: Vec<Chapter>) -> Fixture {
        let engine = Arc::new(MockEngine::new());
        let catalog = Arc::new(MemoryCatalog::new(books, chapters));
        let cache = Arc::new(CatalogCache::new());
        cache.rebuild(catalog.as_ref()).await.unwrap();
        let index = Arc::new(IndexManager::new(engine.clone(), &SearchConfig::default()));
        let indexer = Arc::new(Indexer::new(catalog.clone(), cache.clone(), index, 2));
        Fixture {
            engine,
            catalog,
            cache,
            indexer,
        }
    }

    #[tokio::test]
    async fn test_index_book_marks_searchable() {
        let book = Book::new("The Hobbit", "J. R. R. Tolkien");
        let chapters = vec![
            chapter(book.id, 0, "<p class=\"calibre3\" style=\"color: red\">In a hole</p><p>in the ground</p>"),
            chapter(book.id, 1, "<p>there lived a <a href=\"#x\">hobbit</a>.</p>"),
        ];
        let fixture = fixture(vec![book.clone()], chapters).await;
        fixture.catalog.set_class_mapping(book.id, [("calibre3".to_string(), BookStyle::ChapterText)].into()).await;

        let stats = fixture.indexer.index_book(book.id).await.unwrap();
        assert_eq!((stats.chapters, stats.paragraphs), (2, 3));

        let stored = fixture.catalog.book(book.id).await.unwrap().unwrap();
        assert!(stored.searchable);
        assert!(!stored.indexing);
        assert!(fixture.cache.find(book.id).unwrap().searchable);

        let chapters = fixture.catalog.chapters(book.id).await.unwrap();
        assert_eq!(chapters[0].indexed_content.as_deref(), Some("<p class=\"chapterText\">In a hole</p><p>in the ground</p>"));
        assert_eq!(chapters[1].indexed_content.as_deref(), Some("<p>there lived a hobbit.</p>"));

        let paragraphs = fixture.engine.documents("paragraphs").await;
        assert!(paragraphs.iter().any(|p| p["classes"] == json!(["chapterText"])));
    }

    async fn scripted(
        book: &Book,
        configure: impl FnOnce(&mut ScriptedCatalog),
    ) -> (Arc<MemoryCatalog>, Arc<CatalogCache>, Indexer) {
        let catalog = Arc::new(MemoryCatalog::new(vec![book.clone()], vec![chapter(book.id, 0, "<p>a</p>")]));
        let cache = Arc::new(CatalogCache::new());
        cache.rebuild(catalog.as_ref()).await.unwrap();
        let mut source = ScriptedCatalog::new(catalog.clone(), cache.clone());
        configure(&mut source);
        let index = Arc::new(IndexManager::new(Arc::new(MockEngine::new()), &SearchConfig::default()));
        let indexer = Indexer::new(Arc::new(source), cache.clone(), index, 1);
        (catalog, cache, indexer)
    }

    #[tokio::test]
    async fn test_edits_during_a_run_are_kept() {
        let book = Book::new("Original", "Author");
        let (catalog, cache, indexer) = scripted(&book, |source| source.edit = Some(rename)).await;

        indexer.index_book(book.id).await.unwrap();

        let stored = catalog.book(book.id).await.unwrap().unwrap();
        assert_eq!(stored.title, "Edited Title");
        assert!(stored.tags.contains("edited"));
        assert!(stored.searchable && !stored.indexing);
        let cached = cache.find(book.id).unwrap();
        assert_eq!(*cached, stored);
        assert!(cache.tag("edited").unwrap().contains(&book.id));
    }

    #[tokio::test]
    async fn test_unrecorded_success_clears_indexing() {
        let book = Book::new("Emma", "Jane Austen");
        let (catalog, cache, indexer) = scripted(&book, |source| source.failing_flag_write = Some(2)).await;

        let error = indexer.index_book(book.id).await.unwrap_err();
        assert_eq!(*error, ErrorKind::Catalog);

        let stored = catalog.book(book.id).await.unwrap().unwrap();
        assert!(!stored.indexing);
        assert!(!stored.searchable);
        assert!(!cache.find(book.id).unwrap().indexing);
    }

    #[tokio::test]
    async fn test_failed_index_leaves_book_unsearchable() {
        let mut book = Book::new("Dune", "Frank Herbert");
        book.searchable = true;
        let fixture = fixture(vec![book.clone()], vec![chapter(book.id, 0, "<p>spice</p>")]).await;
        fixture.engine.fail("bulk").await;

        let error = fixture.indexer.index_book(book.id).await.unwrap_err();
        assert_eq!(*error, ErrorKind::IndexingFailed(book.id));

        let stored = fixture.catalog.book(book.id).await.unwrap().unwrap();
        assert!(!stored.searchable);
        assert!(!stored.indexing);
        assert!(!fixture.cache.find(book.id).unwrap().searchable);
    }

    #[tokio::test]
    async fn test_unknown_book() {
        let fixture = fixture(Vec::new(), Vec::new()).await;
        let id = Uuid::new_v4();
        let error = fixture.indexer.index_book(id).await.unwrap_err();
        assert_eq!(*error, ErrorKind::BookNotFound(id));
        assert!(fixture.indexer.locks.is_empty());
    }

    #[tokio::test]
    async fn test_reindexing_is_idempotent() {
        let book = Book::new("Emma", "Jane Austen");
        let fixture = fixture(vec![book.clone()], vec![chapter(book.id, 0, "<p>a</p><p>b</p>")]).await;
        fixture.indexer.index_book(book.id).await.unwrap();
        let first = fixture.engine.documents("paragraphs").await.len();
        fixture.indexer.index_book(book.id).await.unwrap();
        assert_eq!(fixture.engine.documents("paragraphs").await.len(), first);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_concurrent_runs_of_one_book() {
        let book = Book::new("Emma", "Jane Austen");
        let fixture = fixture(vec![book.clone()], vec![chapter(book.id, 0, "<p>a</p><p>b</p>")]).await;
        let handles: Vec<_> = (0..4).map(|_| fixture.indexer.spawn(book.id)).collect();
        for handle in handles {
            handle.await.unwrap().unwrap();
        }
        assert_eq!(fixture.engine.documents("paragraphs").await.len(), 2);
        assert_eq!(fixture.engine.documents("chapters").await.len(), 1);
    }

    #[tokio::test]
    async fn test_delete_book() {
        let book = Book::new("Emma", "Jane Austen");
        let fixture = fixture(vec![book.clone()], vec![chapter(book.id, 0, "<p>a</p>")]).await;
        fixture.indexer.index_book(book.id).await.unwrap();
        fixture.indexer.delete_book(book.id).await.unwrap();
        assert!(fixture.engine.documents("paragraphs").await.is_empty());
        assert!(fixture.cache.find(book.id).is_none());
        assert!(fixture.catalog.book(book.id).await.unwrap().is_none());
        assert!(fixture.catalog.chapters(book.id).await.unwrap().is_empty());

        // A reloaded cache doesn't bring the book back.
        fixture.cache.rebuild(fixture.catalog.as_ref()).await.unwrap();
        assert!(fixture.cache.is_empty());
    }

    #[tokio::test]
    async fn test_reindex_all_events() {
        let books = vec![Book::new("Emma", "Jane Austen"), Book::new("Dune", "Frank Herbert")];
        let chapters = books.iter().map(|book| chapter(book.id, 0, "<p>text</p>")).collect();
        let fixture = fixture(books.clone(), chapters).await;

        let events: Vec<_> = fixture.indexer.reindex_all().collect().await;
        let events: Vec<_> = events.into_iter().map(Result::unwrap).collect();
        assert_eq!(events.first(), Some(&IndexEvent::Started));
        assert_eq!(events.get(1), Some(&IndexEvent::DiscoveryComplete(2)));
        assert_eq!(events.last(), Some(&IndexEvent::Complete));
        let indexed: HashSet<_> = events
            .iter()
            .filter_map(|event| match event {
                IndexEvent::Indexed { book, .. } => Some(*book),
                _ => None,
            })
            .collect();
        assert_eq!(indexed, books.iter().map(|book| book.id).collect());
        assert!(fixture.cache.books().iter().all(|book| book.searchable && !book.indexing));
    }

    #[tokio::test]
    async fn test_reindex_all_stops_when_reset_fails() {
        let fixture = fixture(vec![Book::new("Emma", "Jane Austen")], Vec::new()).await;
        fixture.engine.fail("exists").await;
        let events: Vec<_> = fixture.indexer.reindex_all().collect().await;
        assert_eq!(events.len(), 2);
        assert!(matches!(events[0], Ok(IndexEvent::Started)));
        assert!(events[1].is_err());
    }
}
