//! lectern CLI: index and search a catalog of books.

use clap::{Parser, Subcommand};
use exn::{OptionExt, ResultExt};
use futures::StreamExt;
use lectern::error::{ErrorKind, Result};
use lectern::{Granularity, IndexEvent, Indexer, Library, SearchRequest, apply_toc};
use lectern_catalog::{CatalogCache, MemoryCatalog};
use lectern_config::Config;
use lectern_index::{IndexManager, QueryEngine};
use lectern_markup::{TocEntry, linearize};
use serde::Serialize;
use serde_json::json;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "lectern", version, about = "Full-text search over a library of digitized books")]
struct Cli {
    /// Configuration file (TOML, YAML or JSON).
    #[arg(long, global = true, env = "LECTERN_CONFIG")]
    config: Option<PathBuf>,

    /// Catalog snapshot (JSON). Commands that change books write it back.
    #[arg(long, global = true, env = "LECTERN_CATALOG")]
    catalog: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create both search collections and apply settings and mappings.
    Provision,
    /// Delete both search collections.
    Reset,
    /// Re-index one book.
    Index { book: Uuid },
    /// Drop the index and re-index every book of the catalog.
    ReindexAll,
    /// Remove a book from the index and the catalog.
    Delete { book: Uuid },
    /// Replace the chapters of a book from a table of contents (JSON).
    Toc {
        book: Uuid,
        /// JSON file holding the table-of-contents entries.
        entries: PathBuf,
        /// TOC ids to turn into chapters. Defaults to every entry.
        #[arg(long)]
        select: Vec<String>,
    },
    /// Paragraph search with context.
    Search {
        query: String,
        /// Restrict to a series (and its sub-series). Repeatable.
        #[arg(long)]
        series: Vec<String>,
        /// Restrict to a book. Repeatable.
        #[arg(long)]
        book: Vec<Uuid>,
        /// Zero-based result page.
        #[arg(long)]
        page: Option<u32>,
    },
    /// Hit counts per book.
    Books {
        query: String,
        #[arg(long)]
        series: Vec<String>,
        #[arg(long)]
        book: Vec<Uuid>,
        /// Count matching chapters instead of paragraphs.
        #[arg(long)]
        chapters: bool,
    },
    /// Hit counts per chapter of one book.
    Chapters { book: Uuid, query: String },
    /// Most frequent terms of a book.
    Dictionary { book: Uuid },
    /// Print the series hierarchy.
    Series,
    /// Print every tag with its books.
    Tags,
}

struct App {
    config: Config,
    catalog: Arc<MemoryCatalog>,
    cache: Arc<CatalogCache>,
    indexer: Indexer,
    library: Library,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let app = App::new(cli.config.as_deref(), cli.catalog.as_deref()).await?;

    match cli.command {
        Command::Provision => app.indexer.index().provision().await.or_raise(|| ErrorKind::Index)?,
        Command::Reset => app.indexer.index().reset().await.or_raise(|| ErrorKind::Index)?,
        Command::Index { book } => {
            let stats = app.indexer.index_book(book).await;
            app.save(cli.catalog.as_deref()).await?;
            print(&stats?)?;
        },
        Command::ReindexAll => {
            let mut failed = 0;
            let mut events = std::pin::pin!(app.indexer.reindex_all());
            while let Some(event) = events.next().await {
                match event {
                    Ok(IndexEvent::Indexed { book, stats }) => print(&json!({ "book": book, "stats": stats }))?,
                    Ok(IndexEvent::DiscoveryComplete(books)) => tracing::info!(books, "Re-indexing catalog"),
                    Ok(_) => {},
                    Err(error) => {
                        failed += 1;
                        tracing::error!(?error, "Re-index failure");
                    },
                }
            }
            app.save(cli.catalog.as_deref()).await?;
            if failed > 0 {
                tracing::warn!(failed, "Some books could not be indexed");
            }
        },
        Command::Delete { book } => {
            app.indexer.delete_book(book).await?;
            app.save(cli.catalog.as_deref()).await?;
        },
        Command::Toc { book, entries, select } => {
            let json = tokio::fs::read_to_string(&entries).await.or_raise(|| ErrorKind::Io(entries.clone()))?;
            let toc: Vec<TocEntry> = serde_json::from_str(&json).or_raise(|| ErrorKind::Io(entries.clone()))?;
            let selected: HashSet<String> = if select.is_empty() {
                linearize(&toc).into_iter().map(|entry| entry.id).collect()
            } else {
                select.into_iter().collect()
            };
            let image_route = &app.config.resources.image_route;
            let applied = apply_toc(app.catalog.as_ref(), &app.cache, book, &toc, &selected, image_route).await?;
            app.save(cli.catalog.as_deref()).await?;
            print(&json!({
                "chapters": applied.chapters.len(),
                "images": applied.images,
                "stylesheets": applied.stylesheets,
            }))?;
        },
        Command::Search {
            query,
            series,
            book,
            page,
        } => {
            let request = SearchRequest {
                query,
                series: non_empty(series),
                books: non_empty(book),
                page,
            };
            print(&answered(app.library.search(&request).await)?)?;
        },
        Command::Books {
            query,
            series,
            book,
            chapters,
        } => {
            let granularity = if chapters { Granularity::Chapter } else { Granularity::Paragraph };
            let series = non_empty(series);
            let books = non_empty(book);
            let results = app.library.search_books(&query, series.as_deref(), books.as_deref(), granularity).await;
            print(&answered(results)?)?;
        },
        Command::Chapters { book, query } => {
            print(&answered(app.library.queries().search_grouped_by_chapter(book, &query).await)?)?;
        },
        Command::Dictionary { book } => print(&answered(app.library.queries().dictionary(book).await)?)?,
        Command::Series => print(&*app.cache.series())?,
        Command::Tags => print(&app.cache.tags())?,
    }
    Ok(())
}

impl App {
    async fn new(config: Option<&Path>, catalog: Option<&Path>) -> Result<Self> {
        let config = Config::load(config).or_raise(|| ErrorKind::Config)?;
        config.validate().or_raise(|| ErrorKind::Config)?;

        let catalog = Arc::new(match catalog {
            Some(path) => {
                let json = tokio::fs::read_to_string(path).await.or_raise(|| ErrorKind::Io(path.to_path_buf()))?;
                MemoryCatalog::from_json(&json).or_raise(|| ErrorKind::Catalog)?
            },
            None => MemoryCatalog::default(),
        });
        let cache = Arc::new(CatalogCache::new());
        cache.rebuild(catalog.as_ref()).await.or_raise(|| ErrorKind::Catalog)?;

        let engine = lectern_index::connect(&config.search).or_raise(|| ErrorKind::Index)?;
        let index = Arc::new(IndexManager::new(engine.clone(), &config.search));
        let indexer = Indexer::new(catalog.clone(), cache.clone(), index, config.indexing.workers);
        let library = Library::new(cache.clone(), QueryEngine::new(engine, &config.search));
        Ok(Self {
            config,
            catalog,
            cache,
            indexer,
            library,
        })
    }

    /// Writes the catalog back to its snapshot file, if it came from one.
    async fn save(&self, path: Option<&Path>) -> Result<()> {
        let Some(path) = path else {
            return Ok(());
        };
        let json = self.catalog.to_json().await.or_raise(|| ErrorKind::Catalog)?;
        tokio::fs::write(path, json).await.or_raise(|| ErrorKind::Io(path.to_path_buf()))
    }
}

fn non_empty<T>(values: Vec<T>) -> Option<Vec<T>> {
    (!values.is_empty()).then_some(values)
}

/// Search answers are `None` when the engine could not be queried.
fn answered<T>(answer: Option<T>) -> Result<T> {
    answer.ok_or_raise(|| ErrorKind::Index)
}

fn print(value: &impl Serialize) -> Result<()> {
    let json = serde_json::to_string_pretty(value).or_raise(|| ErrorKind::Output)?;
    println!("{json}");
    Ok(())
}
