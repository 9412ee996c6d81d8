//! Tree surgery on parsed [`Html`] documents.
//!
//! `scraper` caches an element's id and class list on first access, so
//! attribute edits replace the whole [`Element`] rather than patching it in
//! place. Detached nodes stay in the arena: always query through
//! [`Html::root_element`] after mutating, never through [`Html::select`].

use ego_tree::NodeId;
use html5ever::{Attribute, LocalName, Namespace, QualName};
use scraper::node::Element;
use scraper::{ElementRef, Html, Node, Selector};
use tendril::StrTendril;

/// Ids of every attached element matching `selector`, in document order.
pub(crate) fn select_ids(html: &Html, selector: &Selector) -> Vec<NodeId> {
    html.root_element().select(selector).map(|el| el.id()).collect()
}

/// Rebuild the element at `id` with its attributes passed through `edit`.
pub(crate) fn edit_attributes(html: &mut Html, id: NodeId, edit: impl FnOnce(&mut Vec<Attribute>)) {
    let Some(mut node) = html.tree.get_mut(id) else {
        return;
    };
    let replacement = match node.value() {
        Node::Element(element) => {
            let mut attributes: Vec<Attribute> = element
                .attrs
                .iter()
                .map(|(name, value)| Attribute {
                    name: name.clone(),
                    value: value.clone(),
                })
                .collect();
            edit(&mut attributes);
            Element::new(element.name.clone(), attributes)
        },
        _ => return,
    };
    *node.value() = Node::Element(replacement);
}

pub(crate) fn remove_attribute(attributes: &mut Vec<Attribute>, name: &str) {
    attributes.retain(|attr| &*attr.name.local != name);
}

/// Set (or with an empty value, remove) an attribute in the null namespace.
pub(crate) fn set_attribute(attributes: &mut Vec<Attribute>, name: &str, value: &str) {
    if value.is_empty() {
        return remove_attribute(attributes, name);
    }
    match attributes.iter_mut().find(|attr| &*attr.name.local == name) {
        Some(existing) => existing.value = StrTendril::from(value),
        None => attributes.push(Attribute {
            name: QualName::new(None, Namespace::from(""), LocalName::from(name)),
            value: StrTendril::from(value),
        }),
    }
}

/// Append `class` to the element's class list unless already present.
pub(crate) fn add_class(html: &mut Html, id: NodeId, class: &str) {
    edit_attributes(html, id, |attributes| {
        let mut classes: Vec<String> = attributes
            .iter()
            .find(|attr| &*attr.name.local == "class")
            .map(|attr| attr.value.split_whitespace().map(str::to_string).collect())
            .unwrap_or_default();
        if !classes.iter().any(|c| c == class) {
            classes.push(class.to_string());
        }
        set_attribute(attributes, "class", &classes.join(" "));
    });
}

/// Replace the node with its children, spliced into the parent in place.
pub(crate) fn unwrap(html: &mut Html, id: NodeId) {
    let children: Vec<NodeId> = match html.tree.get(id) {
        Some(node) => node.children().map(|child| child.id()).collect(),
        None => return,
    };
    let Some(mut node) = html.tree.get_mut(id) else {
        return;
    };
    if node.parent().is_none() {
        return;
    }
    for child in children {
        node.insert_id_before(child);
    }
    node.detach();
}

pub(crate) fn detach(html: &mut Html, id: NodeId) {
    if let Some(mut node) = html.tree.get_mut(id) {
        node.detach();
    }
}

/// Whether the node is still reachable from the document root.
pub(crate) fn is_attached(html: &Html, id: NodeId) -> bool {
    let root = html.tree.root().id();
    match html.tree.get(id) {
        Some(node) => node.id() == root || node.ancestors().any(|ancestor| ancestor.id() == root),
        None => false,
    }
}

/// First attached element carrying `id="…"`.
pub(crate) fn find_by_id(html: &Html, id: &str) -> Option<NodeId> {
    html.root_element()
        .descendants()
        .filter_map(ElementRef::wrap)
        .find(|el| el.value().id() == Some(id))
        .map(|el| el.id())
}

/// The paragraph a fragment anchor belongs to: the anchor itself when it is
/// a `p` or sits outside of any paragraph, otherwise its nearest `p` ancestor.
pub(crate) fn paragraph_reference(html: &Html, anchor: NodeId) -> Option<NodeId> {
    let node = html.tree.get(anchor)?;
    let element = ElementRef::wrap(node)?;
    if element.value().name() == "p" {
        return Some(anchor);
    }
    let paragraph = node
        .ancestors()
        .filter_map(ElementRef::wrap)
        .find(|ancestor| ancestor.value().name() == "p")
        .map(|ancestor| ancestor.id());
    Some(paragraph.unwrap_or(anchor))
}

pub(crate) fn remove_preceding_siblings(html: &mut Html, id: NodeId) {
    let preceding: Vec<NodeId> = match html.tree.get(id) {
        Some(node) => node.prev_siblings().map(|sibling| sibling.id()).collect(),
        None => return,
    };
    for sibling in preceding {
        detach(html, sibling);
    }
}

/// Remove the node and everything after it among its siblings.
pub(crate) fn truncate_from(html: &mut Html, id: NodeId) {
    let following: Vec<NodeId> = match html.tree.get(id) {
        Some(node) => node.next_siblings().map(|sibling| sibling.id()).collect(),
        None => return,
    };
    for sibling in following {
        detach(html, sibling);
    }
    detach(html, id);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consts::{ANCHOR_SELECTOR, PARAGRAPH_SELECTOR};

    fn body(html: &Html) -> String {
        let body = html.root_element().select(&crate::consts::BODY_SELECTOR).next().unwrap();
        body.inner_html()
    }

    #[test]
    fn test_unwrap_keeps_children_in_place() {
        let mut html = Html::parse_document("<p>one <a href=\"#x\">two <b>three</b></a> four</p>");
        let link = select_ids(&html, &ANCHOR_SELECTOR)[0];
        unwrap(&mut html, link);
        assert_eq!(body(&html), "<p>one two <b>three</b> four</p>");
        assert!(!is_attached(&html, link));
    }

    #[test]
    fn test_add_class_is_idempotent() {
        let mut html = Html::parse_document("<p class=\"a\">x</p>");
        let p = select_ids(&html, &PARAGRAPH_SELECTOR)[0];
        add_class(&mut html, p, "b");
        add_class(&mut html, p, "b");
        assert_eq!(body(&html), "<p class=\"a b\">x</p>");
        let element = ElementRef::wrap(html.tree.get(p).unwrap()).unwrap();
        assert_eq!(element.value().classes().collect::<Vec<_>>(), vec!["a", "b"]);
    }

    #[test]
    fn test_paragraph_reference() {
        let html = Html::parse_document(
            "<div><p id=\"p1\">a</p><p>b <span id=\"s1\">c</span></p><h2 id=\"h1\">d</h2></div>",
        );
        let p1 = find_by_id(&html, "p1").unwrap();
        let s1 = find_by_id(&html, "s1").unwrap();
        let h1 = find_by_id(&html, "h1").unwrap();
        assert_eq!(paragraph_reference(&html, p1), Some(p1));
        assert_eq!(paragraph_reference(&html, s1), Some(select_ids(&html, &PARAGRAPH_SELECTOR)[1]));
        assert_eq!(paragraph_reference(&html, h1), Some(h1));
        assert_eq!(find_by_id(&html, "missing"), None);
    }

    #[test]
    fn test_sibling_removal() {
        let mut html = Html::parse_document("<p>1</p><p id=\"two\">2</p><p>3</p><p id=\"four\">4</p><p>5</p>");
        let two = find_by_id(&html, "two").unwrap();
        remove_preceding_siblings(&mut html, two);
        let four = find_by_id(&html, "four").unwrap();
        truncate_from(&mut html, four);
        assert_eq!(body(&html), "<p id=\"two\">2</p><p>3</p>");
    }
}
