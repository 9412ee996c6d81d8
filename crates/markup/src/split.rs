//! Cutting shared source documents into one document per chapter.

use crate::consts::{IMAGE_SELECTOR, STYLESHEET_SELECTOR};
use crate::dom;
use crate::error::Result;
use crate::resource::{file_name, is_external, resolve};
use crate::toc::LinearEntry;
use scraper::Html;
use std::collections::HashSet;
use tracing::instrument;

/// An image referenced by a chapter, to be copied out of the container.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ChapterImage {
    /// Resolved, decoded container path.
    pub path: String,
    /// Name the image is served under.
    pub name: String,
}

/// One self-contained chapter document.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SplitChapter {
    /// Stable table-of-contents id (see [`build_id`](crate::toc::build_id)).
    pub toc_id: String,
    pub title: String,
    /// Serialized document with boundaries applied and resources rewritten.
    pub content: String,
    pub images: Vec<ChapterImage>,
    pub stylesheets: Vec<String>,
}

/// Produces one chapter per selected entry, in document order.
///
/// An entry with a start fragment loses everything before the paragraph
/// containing that anchor. When the following selected entry lives in the
/// same resource and has a fragment of its own, the chapter ends right
/// before that entry's paragraph; otherwise it runs to the end of its
/// resource. Anchors that cannot be found impose no boundary.
///
/// Images are rewritten to `{image_prefix}/{file name}` and stylesheets to
/// their book-relative path. External references are left untouched.
#[instrument(skip(entries, selected), fields(entries = entries.len(), selected = selected.len()))]
pub fn split_chapters(
    entries: &[LinearEntry<'_>],
    selected: &HashSet<String>,
    image_prefix: &str,
) -> Result<Vec<SplitChapter>> {
    let chosen: Vec<&LinearEntry<'_>> = entries.iter().filter(|e| selected.contains(&e.id)).collect();
    let mut chapters = Vec::with_capacity(chosen.len());
    for (i, entry) in chosen.iter().enumerate() {
        let resource = entry.resource();
        let mut html = Html::parse_document(&resource.content);

        if let Some(fragment) = entry.fragment() {
            match boundary(&html, fragment) {
                Some(reference) => dom::remove_preceding_siblings(&mut html, reference),
                None => tracing::warn!(toc_id = %entry.id, %fragment, "start anchor not found, keeping document head"),
            }
        }

        let end = chosen
            .get(i + 1)
            .filter(|next| next.resource().href == resource.href)
            .and_then(|next| next.fragment());
        if let Some(fragment) = end {
            match boundary(&html, fragment) {
                Some(reference) => dom::truncate_from(&mut html, reference),
                None => tracing::warn!(toc_id = %entry.id, %fragment, "end anchor not found, keeping document tail"),
            }
        }

        let images = rewrite_images(&mut html, &resource.href, image_prefix)?;
        let stylesheets = rewrite_stylesheets(&mut html, &resource.href)?;
        chapters.push(SplitChapter {
            toc_id: entry.id.clone(),
            title: entry.title().to_string(),
            content: html.html(),
            images,
            stylesheets,
        });
    }
    tracing::debug!(chapters = chapters.len(), "split table of contents");
    Ok(chapters)
}

fn boundary(html: &Html, fragment: &str) -> Option<ego_tree::NodeId> {
    dom::find_by_id(html, fragment).and_then(|anchor| dom::paragraph_reference(html, anchor))
}

fn rewrite_images(html: &mut Html, base: &str, image_prefix: &str) -> Result<Vec<ChapterImage>> {
    let mut images: Vec<ChapterImage> = Vec::new();
    for id in dom::select_ids(html, &IMAGE_SELECTOR) {
        let Some(src) = attribute(html, id, "src") else {
            continue;
        };
        if is_external(&src) {
            continue;
        }
        let path = resolve(base, &src)?;
        let name = file_name(&path).to_string();
        let rewritten = format!("{}/{}", image_prefix.trim_end_matches('/'), name);
        dom::edit_attributes(html, id, |attributes| dom::set_attribute(attributes, "src", &rewritten));
        let image = ChapterImage { path, name };
        if !images.contains(&image) {
            images.push(image);
        }
    }
    Ok(images)
}

fn rewrite_stylesheets(html: &mut Html, base: &str) -> Result<Vec<String>> {
    let mut stylesheets: Vec<String> = Vec::new();
    for id in dom::select_ids(html, &STYLESHEET_SELECTOR) {
        let Some(href) = attribute(html, id, "href") else {
            continue;
        };
        if is_external(&href) {
            continue;
        }
        let path = resolve(base, &href)?;
        dom::edit_attributes(html, id, |attributes| dom::set_attribute(attributes, "href", &path));
        if !stylesheets.contains(&path) {
            stylesheets.push(path);
        }
    }
    Ok(stylesheets)
}

fn attribute(html: &Html, id: ego_tree::NodeId, name: &str) -> Option<String> {
    let node = html.tree.get(id)?;
    scraper::ElementRef::wrap(node)?.value().attr(name).map(str::to_string)
}
