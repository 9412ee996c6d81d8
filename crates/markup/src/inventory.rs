//! Read-only views over chapter markup: indexable paragraphs and the author
//! classes a mapping editor has to cover.

use crate::consts::{BODY_SELECTOR, PARAGRAPH_SELECTOR};
use scraper::{ElementRef, Html};
use std::collections::BTreeMap;

/// A paragraph of normalized chapter content.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Paragraph {
    /// Inner markup, emphasis and all.
    pub html: String,
    pub classes: Vec<String>,
}

/// Every `p` element of a chapter document, in document order.
pub fn paragraphs(content: &str) -> Vec<Paragraph> {
    let html = Html::parse_document(content);
    html.root_element()
        .select(&PARAGRAPH_SELECTOR)
        .map(|p| Paragraph {
            html: p.inner_html(),
            classes: p.value().classes().map(str::to_string).collect(),
        })
        .collect()
}

/// Inner markup of the `<body>` of a chapter document.
pub fn body_html(content: &str) -> String {
    let html = Html::parse_document(content);
    html.root_element().select(&BODY_SELECTOR).next().map(|body| body.inner_html()).unwrap_or_default()
}

/// How an author class is used within a chapter.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ClassUsage {
    pub name: String,
    /// Markup of the first element carrying the class.
    pub sample: String,
    pub occurrences: usize,
}

/// Inventory of the classes used inside `<body>`, sorted by name.
pub fn collect_classes(html: &Html) -> Vec<ClassUsage> {
    let mut usages: BTreeMap<String, ClassUsage> = BTreeMap::new();
    let Some(body) = html.root_element().select(&BODY_SELECTOR).next() else {
        return Vec::new();
    };
    for element in body.descendants().skip(1).filter_map(ElementRef::wrap) {
        for class in element.value().classes() {
            usages
                .entry(class.to_string())
                .and_modify(|usage| usage.occurrences += 1)
                .or_insert_with(|| ClassUsage {
                    name: class.to_string(),
                    sample: element.html(),
                    occurrences: 1,
                });
        }
    }
    usages.into_values().collect()
}
