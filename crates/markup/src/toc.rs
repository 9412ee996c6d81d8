//! Table-of-contents entries and their stable identifiers.

use std::sync::Arc;

/// A source document inside the book container.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Resource {
    /// Container-relative path, e.g. `OEBPS/text/part1.xhtml`.
    pub href: String,
    /// Raw (X)HTML of the document.
    pub content: String,
}

/// A node of the book's table of contents.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TocEntry {
    pub title: String,
    /// Anchor inside [`resource`](Self::resource) where the entry starts.
    pub fragment: Option<String>,
    pub resource: Arc<Resource>,
    #[cfg_attr(feature = "serde", serde(default))]
    pub children: Vec<TocEntry>,
}

/// A [`TocEntry`] flattened into document order, with its stable id.
#[derive(Clone, Debug)]
pub struct LinearEntry<'a> {
    pub id: String,
    pub depth: usize,
    pub entry: &'a TocEntry,
}

impl<'a> LinearEntry<'a> {
    pub fn title(&self) -> &'a str {
        &self.entry.title
    }

    pub fn fragment(&self) -> Option<&'a str> {
        self.entry.fragment.as_deref().filter(|f| !f.is_empty())
    }

    pub fn resource(&self) -> &'a Resource {
        &self.entry.resource
    }
}

/// Identifier of the `index`th child of `parent` (empty for top-level
/// entries). Stable as long as the table of contents is unchanged, which
/// lets chapter metadata survive a re-split.
pub fn build_id(parent: &str, index: usize, title: &str) -> String {
    format!("{parent}.{index}-{title}")
}

/// Flattens the table of contents depth-first, parents before children.
pub fn linearize(entries: &[TocEntry]) -> Vec<LinearEntry<'_>> {
    fn walk<'a>(id: String, depth: usize, entry: &'a TocEntry, out: &mut Vec<LinearEntry<'a>>) {
        let children = entry.children.iter().enumerate();
        out.push(LinearEntry {
            id: id.clone(),
            depth,
            entry,
        });
        for (index, child) in children {
            walk(build_id(&id, index, &child.title), depth + 1, child, out);
        }
    }

    let mut out = Vec::new();
    for (index, entry) in entries.iter().enumerate() {
        walk(build_id("", index, &entry.title), 0, entry, &mut out);
    }
    out
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn entry(title: &str, fragment: Option<&str>, resource: &Arc<Resource>) -> TocEntry {
        TocEntry {
            title: title.to_string(),
            fragment: fragment.map(str::to_string),
            resource: Arc::clone(resource),
            children: Vec::new(),
        }
    }

    pub(crate) fn resource(href: &str, content: &str) -> Arc<Resource> {
        Arc::new(Resource {
            href: href.to_string(),
            content: content.to_string(),
        })
    }

    #[test]
    fn test_linearize_depth_first() {
        let res = resource("a.xhtml", "");
        let mut part = entry("Part One", None, &res);
        part.children = vec![entry("Chapter 1", Some("c1"), &res), entry("Chapter 2", Some("c2"), &res)];
        let toc = vec![entry("Prologue", None, &res), part, entry("Epilogue", None, &res)];

        let ids: Vec<_> = linearize(&toc).into_iter().map(|e| (e.id, e.depth)).collect();
        assert_eq!(
            ids,
            vec![
                (".0-Prologue".to_string(), 0),
                (".1-Part One".to_string(), 0),
                (".1-Part One.0-Chapter 1".to_string(), 1),
                (".1-Part One.1-Chapter 2".to_string(), 1),
                (".2-Epilogue".to_string(), 0),
            ]
        );
    }

    #[test]
    fn test_empty_fragment_is_none() {
        let res = resource("a.xhtml", "");
        let toc = vec![entry("A", Some(""), &res)];
        assert_eq!(linearize(&toc)[0].fragment(), None);
    }
}
