//! Applying a table-of-contents selection to a book.

use crate::error::{ErrorKind, Result};
use exn::ResultExt;
use lectern_catalog::{CatalogCache, CatalogSource, Chapter, IndexFlags};
use lectern_markup::{ChapterImage, TocEntry, linearize, split_chapters};
use std::collections::{HashMap, HashSet};
use tracing::instrument;
use uuid::Uuid;

/// Outcome of [`apply_toc`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AppliedToc {
    /// The new chapters of the book, in reading order.
    pub chapters: Vec<Chapter>,
    /// Images referenced by any chapter, once per served name. Their bytes
    /// still have to be copied out of the book container.
    pub images: Vec<ChapterImage>,
    /// Stylesheets referenced by any chapter, once each.
    pub stylesheets: Vec<String>,
}

/// Replaces the chapters of `book` with the `selected` entries of `toc`.
///
/// Chapters get fresh ids and contiguous positions. Citation parameters of
/// existing chapters are carried over by TOC id. The book stays
/// unsearchable until it is indexed again.
#[instrument(skip(source, cache, toc, selected), fields(selected = selected.len()))]
pub async fn apply_toc(
    source: &dyn CatalogSource,
    cache: &CatalogCache,
    book: Uuid,
    toc: &[TocEntry],
    selected: &HashSet<String>,
    image_route: &str,
) -> Result<AppliedToc> {
    if source.book(book).await.or_raise(|| ErrorKind::Catalog)?.is_none() {
        exn::bail!(ErrorKind::BookNotFound(book));
    }

    let mut citations: HashMap<String, Option<String>> = source
        .chapters(book)
        .await
        .or_raise(|| ErrorKind::Catalog)?
        .into_iter()
        .map(|chapter| (chapter.toc_reference, chapter.citation_parameter))
        .collect();

    let image_prefix = format!("{}/{book}/images", image_route.trim_end_matches('/'));
    let entries = linearize(toc);
    let split = split_chapters(&entries, selected, &image_prefix).or_raise(|| ErrorKind::Markup)?;

    let mut applied = AppliedToc::default();
    let mut image_names = HashSet::new();
    for (position, chapter) in (0u32..).zip(split) {
        for image in chapter.images {
            if image_names.insert(image.name.clone()) {
                applied.images.push(image);
            }
        }
        for stylesheet in chapter.stylesheets {
            if !applied.stylesheets.contains(&stylesheet) {
                applied.stylesheets.push(stylesheet);
            }
        }
        applied.chapters.push(Chapter {
            id: Uuid::new_v4(),
            book,
            citation_parameter: citations.remove(&chapter.toc_id).flatten(),
            toc_reference: chapter.toc_id,
            title: chapter.title,
            position,
            content: chapter.content,
            indexed_content: None,
        });
    }

    source
        .replace_chapters(book, applied.chapters.clone())
        .await
        .or_raise(|| ErrorKind::Catalog)?;

    let unsearchable = IndexFlags {
        indexing: None,
        searchable: Some(false),
    };
    let record = source.set_index_flags(book, unsearchable).await.or_raise(|| ErrorKind::Catalog)?;
    cache.update_book(record);

    tracing::info!(chapters = applied.chapters.len(), images = applied.images.len(), "Applied table of contents");
    Ok(applied)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{ScriptedCatalog, rename};
    use lectern_catalog::{Book, MemoryCatalog};
    use lectern_markup::Resource;
    use std::sync::Arc;

    fn resource(href: &str, content: &str) -> Arc<Resource> {
        Arc::new(Resource {
            href: href.to_string(),
            content: content.to_string(),
        })
    }

    fn entry(title: &str, fragment: Option<&str>, resource: &Arc<Resource>) -> TocEntry {
        TocEntry {
            title: title.to_string(),
            fragment: fragment.map(str::to_string),
            resource: Arc::clone(resource),
            children: Vec::new(),
        }
    }

    fn toc() -> Vec<TocEntry> {
        let first = resource(
            "OEBPS/text/one.xhtml",
            "<html><body><p>One</p><img src=\"../images/map.png\"/></body></html>",
        );
        let second = resource(
            "OEBPS/text/two.xhtml",
            "<html><head><link rel=\"stylesheet\" href=\"../css/book.css\"/></head>\
             <body><p>Two</p><img src=\"../images/map.png\"/></body></html>",
        );
        vec![
            entry("Cover", None, &first),
            entry("One", None, &first),
            entry("Two", None, &second),
        ]
    }

    async fn catalog(book: &Book) -> (MemoryCatalog, CatalogCache) {
        let existing = Chapter {
            id: Uuid::new_v4(),
            book: book.id,
            toc_reference: ".2-Two".to_string(),
            title: "Two".to_string(),
            position: 7,
            content: String::new(),
            indexed_content: None,
            citation_parameter: Some("p=2".to_string()),
        };
        let catalog = MemoryCatalog::new(vec![book.clone()], vec![existing]);
        let cache = CatalogCache::new();
        cache.rebuild(&catalog).await.unwrap();
        (catalog, cache)
    }

    #[tokio::test]
    async fn test_apply_toc() {
        let mut book = Book::new("Emma", "Jane Austen");
        book.searchable = true;
        let (catalog, cache) = catalog(&book).await;
        let selected: HashSet<_> = [".1-One".to_string(), ".2-Two".to_string()].into();

        let applied = apply_toc(&catalog, &cache, book.id, &toc(), &selected, "/api/books/").await.unwrap();

        let chapters = catalog.chapters(book.id).await.unwrap();
        assert_eq!(chapters, applied.chapters);
        let summary: Vec<_> = chapters
            .iter()
            .map(|c| (c.position, c.title.as_str(), c.citation_parameter.as_deref()))
            .collect();
        assert_eq!(summary, vec![(0, "One", None), (1, "Two", Some("p=2"))]);
        assert!(chapters[0].content.contains(&format!("/api/books/{}/images/map.png", book.id)));

        assert_eq!(applied.images.len(), 1);
        assert_eq!(applied.images[0].name, "map.png");
        assert_eq!(applied.stylesheets, vec!["OEBPS/css/book.css".to_string()]);

        assert!(!catalog.book(book.id).await.unwrap().unwrap().searchable);
        assert!(!cache.find(book.id).unwrap().searchable);
    }

    #[tokio::test]
    async fn test_edits_while_applying_are_kept() {
        let mut book = Book::new("Original", "Author");
        book.searchable = true;
        let (catalog, cache) = catalog(&book).await;
        let catalog = Arc::new(catalog);
        let cache = Arc::new(cache);
        let mut source = ScriptedCatalog::new(catalog.clone(), cache.clone());
        source.edit = Some(rename);
        let selected: HashSet<_> = [".1-One".to_string()].into();

        apply_toc(&source, &cache, book.id, &toc(), &selected, "/api/books").await.unwrap();

        let stored = catalog.book(book.id).await.unwrap().unwrap();
        assert_eq!(stored.title, "Edited Title");
        assert!(!stored.searchable);
        assert_eq!(*cache.find(book.id).unwrap(), stored);
        assert!(cache.tag("edited").unwrap().contains(&book.id));
    }

    #[tokio::test]
    async fn test_unknown_book() {
        let book = Book::new("Emma", "Jane Austen");
        let (catalog, cache) = catalog(&book).await;
        let id = Uuid::new_v4();
        let error = apply_toc(&catalog, &cache, id, &toc(), &HashSet::new(), "/api/books").await.unwrap_err();
        assert_eq!(*error, ErrorKind::BookNotFound(id));
        assert_eq!(catalog.chapters(book.id).await.unwrap().len(), 1);
    }
}
