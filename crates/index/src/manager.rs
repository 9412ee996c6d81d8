use crate::document::{Documents, IndexedChapter, collect_documents};
use crate::engine::{BulkOperation, EngineHandle};
use crate::error::{ErrorKind, Result};
use crate::query::term;
use crate::schema::{self, BOOK_FIELD};
use exn::ResultExt;
use lectern_config::SearchConfig;
use serde_json::Value;
use tracing::instrument;
use uuid::Uuid;

/// Counts reported after a successful re-index.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize)]
pub struct IndexStats {
    pub chapters: usize,
    pub paragraphs: usize,
    /// Documents of the previous generation that were removed.
    pub deleted: u64,
}

/// Owns the chapter and paragraph collections.
///
/// Re-indexing a book replaces its whole document set: every document of the
/// book is deleted from both collections before the new generation is bulk
/// inserted. Concurrent re-indexing of the same book is not guarded here.
pub struct IndexManager {
    engine: EngineHandle,
    chapter_index: String,
    paragraph_index: String,
    max_result_window: u32,
    locale: String,
}

impl IndexManager {
    pub fn new(engine: EngineHandle, config: &SearchConfig) -> Self {
        Self {
            engine,
            chapter_index: config.chapter_index.clone(),
            paragraph_index: config.paragraph_index.clone(),
            max_result_window: config.max_result_window,
            locale: config.locale.clone(),
        }
    }

    pub fn engine(&self) -> &EngineHandle {
        &self.engine
    }

    fn collections(&self) -> [(&str, Value); 2] {
        [
            (self.chapter_index.as_str(), schema::chapter_mapping()),
            (self.paragraph_index.as_str(), schema::paragraph_mapping()),
        ]
    }

    /// Creates and configures any missing collection. Existing collections
    /// are left untouched.
    #[instrument(skip(self), fields(engine = self.engine.name()))]
    pub async fn provision(&self) -> Result<()> {
        let settings = schema::settings(self.max_result_window, &self.locale);
        for (index, mapping) in self.collections() {
            let provision = || ErrorKind::Provision(index.to_string());
            if self.engine.index_exists(index).await.or_raise(provision)? {
                continue;
            }
            self.engine.create_index(index).await.or_raise(provision)?;
            // Analysis settings are static and can only be applied to a closed index.
            self.engine.close_index(index).await.or_raise(provision)?;
            self.engine.put_settings(index, &settings).await.or_raise(provision)?;
            self.engine.put_mapping(index, &mapping).await.or_raise(provision)?;
            self.engine.open_index(index).await.or_raise(provision)?;
            tracing::info!(index, "Provisioned collection");
        }
        Ok(())
    }

    /// Replaces every indexed document of `book` with documents derived from
    /// `chapters`.
    #[instrument(skip(self, chapters), fields(chapters = chapters.len()))]
    pub async fn index_book(&self, book: Uuid, chapters: &[IndexedChapter]) -> Result<IndexStats> {
        let failed = || ErrorKind::Index(book.to_string());
        self.provision().await.or_raise(failed)?;
        let deleted = self.delete_documents(book).await.or_raise(failed)?;

        let Documents { chapters, paragraphs } = collect_documents(book, chapters);
        let stats = IndexStats {
            chapters: chapters.len(),
            paragraphs: paragraphs.len(),
            deleted,
        };
        let mut operations = Vec::with_capacity(stats.chapters + stats.paragraphs);
        for document in chapters {
            operations.push(self.operation(&self.chapter_index, &document).or_raise(failed)?);
        }
        for document in paragraphs {
            operations.push(self.operation(&self.paragraph_index, &document).or_raise(failed)?);
        }
        if operations.is_empty() {
            tracing::debug!("No documents to insert");
        } else {
            self.engine.bulk(operations).await.or_raise(failed)?;
        }
        tracing::info!(chapters = stats.chapters, paragraphs = stats.paragraphs, deleted, "Indexed book");
        Ok(stats)
    }

    fn operation(&self, index: &str, document: &impl serde::Serialize) -> Result<BulkOperation> {
        let document = serde_json::to_value(document)
            .or_raise(|| ErrorKind::MalformedResponse("document is not representable as JSON".to_string()))?;
        Ok(BulkOperation {
            index: index.to_string(),
            id: Uuid::new_v4().to_string(),
            document,
        })
    }

    /// Removes every document of `book`. Collections that don't exist yet
    /// have nothing to delete and are skipped.
    #[instrument(skip(self))]
    pub async fn delete_book(&self, book: Uuid) -> Result<()> {
        let deleted = self.delete_documents(book).await.or_raise(|| ErrorKind::Delete(book.to_string()))?;
        tracing::info!(deleted, "Deleted book documents");
        Ok(())
    }

    async fn delete_documents(&self, book: Uuid) -> Result<u64> {
        let query = term(BOOK_FIELD, book.to_string());
        let mut deleted = 0;
        for index in [&self.chapter_index, &self.paragraph_index] {
            if !self.engine.index_exists(index).await? {
                continue;
            }
            deleted += self.engine.delete_by_query(index, &query).await?;
        }
        Ok(deleted)
    }

    /// Drops both collections. The next write provisions them again.
    #[instrument(skip(self), fields(engine = self.engine.name()))]
    pub async fn reset(&self) -> Result<()> {
        for index in [&self.chapter_index, &self.paragraph_index] {
            if self.engine.index_exists(index).await.or_raise(|| ErrorKind::Reset)? {
                self.engine.delete_index(index).await.or_raise(|| ErrorKind::Reset)?;
                tracing::info!(index = index.as_str(), "Deleted collection");
            }
        }
        Ok(())
    }
}
