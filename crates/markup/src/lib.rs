//! Chapter markup handling: normalization into the canonical style
//! vocabulary and splitting a table of contents into chapter documents.

mod consts;
mod dom;
pub mod error;
mod inventory;
mod normalize;
pub mod resource;
mod split;
mod style;
pub mod toc;

pub use crate::inventory::{ClassUsage, Paragraph, body_html, collect_classes, paragraphs};
pub use crate::normalize::{normalize, normalize_html};
pub use crate::split::{ChapterImage, SplitChapter, split_chapters};
pub use crate::style::{BookStyle, ClassMapping, StyleGroup};
pub use crate::toc::{LinearEntry, Resource, TocEntry, build_id, linearize};
pub use scraper::Html;
