//! Index records derived from a book's normalized chapters.

use lectern_markup::{Paragraph, body_html, paragraphs};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A chapter ready for indexing: its normalized content and position.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IndexedChapter {
    pub id: Uuid,
    pub position: u32,
    /// Normalized chapter document.
    pub content: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChapterDocument {
    pub book: Uuid,
    pub chapter: Uuid,
    pub position: u32,
    pub text: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParagraphDocument {
    pub book: Uuid,
    pub chapter: Uuid,
    /// Position of the paragraph within its chapter.
    pub position: u32,
    pub classes: Vec<String>,
    pub text: String,
}

/// Everything one generation of a book contributes to the index.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Documents {
    pub chapters: Vec<ChapterDocument>,
    pub paragraphs: Vec<ParagraphDocument>,
}

/// Derives the full document set of a book. A pure function of its chapters.
pub fn collect_documents(book: Uuid, chapters: &[IndexedChapter]) -> Documents {
    let mut documents = Documents::default();
    for chapter in chapters {
        documents.chapters.push(ChapterDocument {
            book,
            chapter: chapter.id,
            position: chapter.position,
            text: body_html(&chapter.content),
        });
        for (position, Paragraph { html, classes }) in (0u32..).zip(paragraphs(&chapter.content)) {
            documents.paragraphs.push(ParagraphDocument {
                book,
                chapter: chapter.id,
                position,
                classes,
                text: html,
            });
        }
    }
    documents
}
