//! Catalog wrapper that simulates concurrent book edits and store failures.

use async_trait::async_trait;
use lectern_catalog::error::{ErrorKind, Result};
use lectern_catalog::{Book, CatalogCache, CatalogSource, Chapter, IndexFlags, MemoryCatalog};
use lectern_markup::ClassMapping;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use uuid::Uuid;

/// Delegates to a [`MemoryCatalog`].
///
/// With `edit` set, reading a book's chapters first applies `edit` to the
/// stored book, the way a librarian saving the book form would. With
/// `failing_flag_write` set, that (1-based) call of `set_index_flags` fails.
pub(crate) struct ScriptedCatalog {
    pub inner: Arc<MemoryCatalog>,
    pub cache: Arc<CatalogCache>,
    pub edit: Option<fn(&mut Book)>,
    pub failing_flag_write: Option<usize>,
    flag_writes: AtomicUsize,
}

impl ScriptedCatalog {
    pub fn new(inner: Arc<MemoryCatalog>, cache: Arc<CatalogCache>) -> Self {
        Self {
            inner,
            cache,
            edit: None,
            failing_flag_write: None,
            flag_writes: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl CatalogSource for ScriptedCatalog {
    async fn books(&self) -> Result<Vec<Book>> {
        self.inner.books().await
    }

    async fn book(&self, id: Uuid) -> Result<Option<Book>> {
        self.inner.book(id).await
    }

    async fn chapters(&self, book: Uuid) -> Result<Vec<Chapter>> {
        if let Some(edit) = self.edit
            && let Some(mut stored) = self.inner.book(book).await?
        {
            edit(&mut stored);
            self.inner.save_book(&stored).await?;
            self.cache.update_book(stored);
        }
        self.inner.chapters(book).await
    }

    async fn class_mapping(&self, book: Uuid) -> Result<ClassMapping> {
        self.inner.class_mapping(book).await
    }

    async fn save_book(&self, book: &Book) -> Result<()> {
        self.inner.save_book(book).await
    }

    async fn set_index_flags(&self, book: Uuid, flags: IndexFlags) -> Result<Book> {
        let call = self.flag_writes.fetch_add(1, Ordering::SeqCst) + 1;
        if self.failing_flag_write == Some(call) {
            exn::bail!(ErrorKind::Unavailable("flag write rejected".to_string()));
        }
        self.inner.set_index_flags(book, flags).await
    }

    async fn delete_book(&self, book: Uuid) -> Result<()> {
        self.inner.delete_book(book).await
    }

    async fn replace_chapters(&self, book: Uuid, chapters: Vec<Chapter>) -> Result<()> {
        self.inner.replace_chapters(book, chapters).await
    }

    async fn set_indexed_content(&self, chapter: Uuid, content: String) -> Result<()> {
        self.inner.set_indexed_content(chapter, content).await
    }
}

/// Renames `book` and tags it `edited`.
pub(crate) fn rename(book: &mut Book) {
    book.title = "Edited Title".to_string();
    book.tags.insert("edited".to_string());
}
