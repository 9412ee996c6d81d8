//! Dual-granularity full-text index over an Elasticsearch-compatible engine.
//!
//! Every book is indexed twice: once per chapter (whole chapter markup) and
//! once per paragraph. [`IndexManager`] owns the write path, [`QueryEngine`]
//! the read path; both talk to the engine through [`SearchEngine`].

mod document;
pub mod engine;
pub mod error;
mod manager;
mod query;
mod response;
pub mod schema;
mod search;

pub use crate::document::{ChapterDocument, Documents, IndexedChapter, ParagraphDocument, collect_documents};
pub use crate::engine::{BulkOperation, EngineHandle, HttpEngine, SearchEngine};
pub use crate::manager::{IndexManager, IndexStats};
pub use crate::search::{
    ChapterSearchResults, DictionaryEntry, GroupCount, GroupedResults, QueryEngine, SearchOrder, SearchParagraph,
    SearchResult, SearchResults,
};

use crate::error::{ErrorKind, Result};
use exn::ResultExt;
use lectern_config::SearchConfig;
use std::sync::Arc;
use std::time::Duration;

/// Connects to the engine described by `config`.
pub fn connect(config: &SearchConfig) -> Result<EngineHandle> {
    let engine = HttpEngine::new(config.url.clone(), Duration::from_secs(config.timeout_secs))
        .or_raise(|| ErrorKind::Unavailable(config.url.clone()))?;
    Ok(Arc::new(engine))
}
