//! Seam to the persistent catalog store.

use crate::error::{ErrorKind, Result};
use crate::model::{Book, Chapter, IndexFlags};
use async_trait::async_trait;
use exn::ResultExt;
use lectern_markup::ClassMapping;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Persistent store of books, chapters and per-book class mappings.
#[async_trait]
pub trait CatalogSource: Send + Sync {
    async fn books(&self) -> Result<Vec<Book>>;

    async fn book(&self, id: Uuid) -> Result<Option<Book>>;

    /// Chapters of `book`, ordered by position.
    async fn chapters(&self, book: Uuid) -> Result<Vec<Chapter>>;

    /// Author class to style assignments of `book`. Empty when none are set.
    async fn class_mapping(&self, book: Uuid) -> Result<ClassMapping>;

    /// Inserts or replaces `book`.
    async fn save_book(&self, book: &Book) -> Result<()>;

    /// Updates only the indexing flags of `book`, leaving every other field
    /// as currently stored, and returns the updated record.
    async fn set_index_flags(&self, book: Uuid, flags: IndexFlags) -> Result<Book>;

    /// Removes `book` with its chapters and class mapping. Unknown ids are
    /// ignored.
    async fn delete_book(&self, book: Uuid) -> Result<()>;

    /// Replaces every chapter of `book` with `chapters`.
    async fn replace_chapters(&self, book: Uuid, chapters: Vec<Chapter>) -> Result<()>;

    async fn set_indexed_content(&self, chapter: Uuid, content: String) -> Result<()>;
}

/// Serializable content of a [`MemoryCatalog`].
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CatalogSnapshot {
    pub books: Vec<Book>,
    pub chapters: Vec<Chapter>,
    pub class_mappings: HashMap<Uuid, ClassMapping>,
}

/// In-memory [`CatalogSource`], loadable from a JSON [`CatalogSnapshot`].
///
/// Used by the command line tool and throughout tests.
#[derive(Default)]
pub struct MemoryCatalog {
    state: RwLock<CatalogSnapshot>,
}

impl MemoryCatalog {
    pub fn new(books: Vec<Book>, chapters: Vec<Chapter>) -> Self {
        Self::from_snapshot(CatalogSnapshot {
            books,
            chapters,
            class_mappings: HashMap::new(),
        })
    }

    pub fn from_snapshot(snapshot: CatalogSnapshot) -> Self {
        Self {
            state: RwLock::new(snapshot),
        }
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let snapshot = serde_json::from_str(json).or_raise(|| ErrorKind::InvalidSnapshot)?;
        Ok(Self::from_snapshot(snapshot))
    }

    pub async fn snapshot(&self) -> CatalogSnapshot {
        self.state.read().await.clone()
    }

    pub async fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(&*self.state.read().await).or_raise(|| ErrorKind::InvalidSnapshot)
    }

    pub async fn set_class_mapping(&self, book: Uuid, mapping: ClassMapping) {
        self.state.write().await.class_mappings.insert(book, mapping);
    }
}

#[async_trait]
impl CatalogSource for MemoryCatalog {
    async fn books(&self) -> Result<Vec<Book>> {
        Ok(self.state.read().await.books.clone())
    }

    async fn book(&self, id: Uuid) -> Result<Option<Book>> {
        Ok(self.state.read().await.books.iter().find(|book| book.id == id).cloned())
    }

    async fn chapters(&self, book: Uuid) -> Result<Vec<Chapter>> {
        let state = self.state.read().await;
        let mut chapters: Vec<Chapter> = state.chapters.iter().filter(|chapter| chapter.book == book).cloned().collect();
        chapters.sort_by_key(|chapter| chapter.position);
        Ok(chapters)
    }

    async fn class_mapping(&self, book: Uuid) -> Result<ClassMapping> {
        Ok(self.state.read().await.class_mappings.get(&book).cloned().unwrap_or_default())
    }

    async fn save_book(&self, book: &Book) -> Result<()> {
        let mut state = self.state.write().await;
        match state.books.iter().position(|existing| existing.id == book.id) {
            Some(index) => state.books[index] = book.clone(),
            None => state.books.push(book.clone()),
        }
        Ok(())
    }

    async fn set_index_flags(&self, book: Uuid, flags: IndexFlags) -> Result<Book> {
        let mut state = self.state.write().await;
        let Some(existing) = state.books.iter_mut().find(|existing| existing.id == book) else {
            exn::bail!(ErrorKind::BookNotFound(book));
        };
        flags.apply(existing);
        Ok(existing.clone())
    }

    async fn delete_book(&self, book: Uuid) -> Result<()> {
        let mut state = self.state.write().await;
        state.books.retain(|existing| existing.id != book);
        state.chapters.retain(|chapter| chapter.book != book);
        state.class_mappings.remove(&book);
        Ok(())
    }

    async fn replace_chapters(&self, book: Uuid, chapters: Vec<Chapter>) -> Result<()> {
        let mut state = self.state.write().await;
        state.chapters.retain(|chapter| chapter.book != book);
        state.chapters.extend(chapters);
        Ok(())
    }

    async fn set_indexed_content(&self, chapter: Uuid, content: String) -> Result<()> {
        let mut state = self.state.write().await;
        let Some(existing) = state.chapters.iter_mut().find(|existing| existing.id == chapter) else {
            exn::bail!(ErrorKind::ChapterNotFound(chapter));
        };
        existing.indexed_content = Some(content);
        Ok(())
    }
}
