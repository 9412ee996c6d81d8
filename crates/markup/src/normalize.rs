use crate::consts::{
    ANCHOR_SELECTOR, CLASSED_SELECTOR, FOOTNOTE_BACK_CLASS, FOOTNOTE_BACK_SELECTOR, FOOTNOTE_REF_CLASS,
    FOOTNOTE_REF_SELECTOR, FOOTNOTES_CLASS, FOOTNOTES_SELECTOR, STYLED_SELECTOR,
};
use crate::dom;
use crate::style::{BookStyle, ClassMapping};
use scraper::{ElementRef, Html};
use tracing::instrument;

/// Rewrites a parsed chapter into canonical, indexable form.
///
/// In order:
/// 1. every inline `style` attribute is dropped,
/// 2. links are replaced by their children, except footnote navigation
///    (`data-footnote` / `data-footnote-back`), which is kept,
/// 3. author classes are replaced by their mapped [`BookStyle`] id; an
///    element carrying any class mapped to [`BookStyle::StripElement`] is
///    removed together with its content,
/// 4. footnote links and containers are tagged with fixed classes.
///
/// Unknown input degrades to stripping; there is no failure mode.
#[instrument(level = "debug", skip_all, fields(mappings = mapping.len()))]
pub fn normalize(html: &mut Html, mapping: &ClassMapping) {
    strip_styles(html);
    strip_links(html);
    map_classes(html, mapping);
    tag_footnotes(html);
}

/// Parse, [`normalize`] and serialize a chapter document.
pub fn normalize_html(content: &str, mapping: &ClassMapping) -> String {
    let mut html = Html::parse_document(content);
    normalize(&mut html, mapping);
    html.html()
}

fn strip_styles(html: &mut Html) {
    for id in dom::select_ids(html, &STYLED_SELECTOR) {
        dom::edit_attributes(html, id, |attributes| dom::remove_attribute(attributes, "style"));
    }
}

fn is_footnote_link(element: ElementRef<'_>) -> bool {
    let value = element.value();
    value.attr("data-footnote") == Some("true") || value.attr("data-footnote-back") == Some("true")
}

fn strip_links(html: &mut Html) {
    let links: Vec<_> = html
        .root_element()
        .select(&ANCHOR_SELECTOR)
        .filter(|link| !is_footnote_link(*link))
        .map(|link| link.id())
        .collect();
    for id in links {
        dom::unwrap(html, id);
    }
}

fn map_classes(html: &mut Html, mapping: &ClassMapping) {
    for id in dom::select_ids(html, &CLASSED_SELECTOR) {
        // Already gone with a stripped ancestor.
        if !dom::is_attached(html, id) {
            continue;
        }
        let Some(classes) = html
            .tree
            .get(id)
            .and_then(ElementRef::wrap)
            .map(|el| el.value().classes().map(str::to_string).collect::<Vec<_>>())
        else {
            continue;
        };
        let mut mapped: Vec<&'static str> = Vec::new();
        let mut discard = false;
        for class in &classes {
            match BookStyle::for_class(mapping, class) {
                BookStyle::StripElement => {
                    discard = true;
                    break;
                },
                BookStyle::StripClass => {},
                style => {
                    if !mapped.contains(&style.id()) {
                        mapped.push(style.id());
                    }
                },
            }
        }
        if discard {
            dom::detach(html, id);
            continue;
        }
        let replacement = mapped.join(" ");
        dom::edit_attributes(html, id, |attributes| dom::set_attribute(attributes, "class", &replacement));
    }
}

fn tag_footnotes(html: &mut Html) {
    for id in dom::select_ids(html, &FOOTNOTE_REF_SELECTOR) {
        dom::add_class(html, id, FOOTNOTE_REF_CLASS);
    }
    for id in dom::select_ids(html, &FOOTNOTE_BACK_SELECTOR) {
        dom::add_class(html, id, FOOTNOTE_BACK_CLASS);
    }
    for id in dom::select_ids(html, &FOOTNOTES_SELECTOR) {
        dom::add_class(html, id, FOOTNOTES_CLASS);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consts::BODY_SELECTOR;
    use rstest::rstest;

    fn run(content: &str, mapping: &ClassMapping) -> String {
        let mut html = Html::parse_document(content);
        normalize(&mut html, mapping);
        html.root_element().select(&BODY_SELECTOR).next().unwrap().inner_html()
    }

    fn mapping() -> ClassMapping {
        ClassMapping::from([
            ("calibre1".to_string(), BookStyle::ChapterText),
            ("calibre2".to_string(), BookStyle::Italic),
            ("calibre3".to_string(), BookStyle::StripElement),
            ("calibre4".to_string(), BookStyle::StripClass),
            ("speaker".to_string(), BookStyle::DialogSpeaker),
        ])
    }

    #[rstest]
    #[case("<p style=\"color: red\">a</p>", "<p>a</p>")]
    #[case("<p>a <a href=\"ch2.xhtml\">b</a> c</p>", "<p>a b c</p>")]
    #[case("<p class=\"calibre1\">a</p>", "<p class=\"chapterText\">a</p>")]
    #[case("<p class=\"calibre1 calibre2\">a</p>", "<p class=\"chapterText italic\">a</p>")]
    #[case("<p class=\"unknown\">a</p>", "<p>a</p>")]
    #[case("<p class=\"calibre4\">a</p>", "<p>a</p>")]
    #[case("<p>a</p><div class=\"calibre3\"><p>gone</p></div><p>b</p>", "<p>a</p><p>b</p>")]
    #[case("<p class=\"calibre2 calibre3\">gone</p>", "")]
    #[case("<span class=\"calibre2 calibre2\">a</span>", "<span class=\"italic\">a</span>")]
    fn test_normalize(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(run(input, &mapping()), expected);
    }

    #[test]
    fn test_link_children_are_normalized_too() {
        let output = run(
            "<p><a href=\"x\" style=\"x\"><span class=\"speaker\" style=\"font-weight: bold\">Bilbo</span></a>: hi</p>",
            &mapping(),
        );
        assert_eq!(output, "<p><span class=\"dialogSpeaker\">Bilbo</span>: hi</p>");
    }

    #[test]
    fn test_footnotes_are_preserved_and_tagged() {
        let output = run(
            concat!(
                "<p>text<a href=\"#fn1\" data-footnote=\"true\" class=\"calibre9\">1</a></p>",
                "<section data-footnotes=\"true\"><p id=\"fn1\">note",
                "<a href=\"#ref1\" data-footnote-back=\"true\">back</a></p></section>",
            ),
            &mapping(),
        );
        let html = Html::parse_fragment(&output);
        let reference = html.select(&FOOTNOTE_REF_SELECTOR).next().unwrap();
        assert_eq!(reference.value().classes().collect::<Vec<_>>(), vec![FOOTNOTE_REF_CLASS]);
        assert_eq!(reference.value().attr("href"), Some("#fn1"));
        let back = html.select(&FOOTNOTE_BACK_SELECTOR).next().unwrap();
        assert_eq!(back.value().classes().collect::<Vec<_>>(), vec![FOOTNOTE_BACK_CLASS]);
        let container = html.select(&FOOTNOTES_SELECTOR).next().unwrap();
        assert_eq!(container.value().classes().collect::<Vec<_>>(), vec![FOOTNOTES_CLASS]);
    }

    #[test]
    fn test_no_mapping_strips_everything() {
        let output = normalize_html("<p class=\"a b\" style=\"x\"><a href=\"y\">z</a></p>", &ClassMapping::new());
        assert!(output.contains("<p>z</p>"), "{output}");
    }
}
