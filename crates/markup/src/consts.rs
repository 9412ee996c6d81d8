use regex::Regex;
use scraper::Selector;
use std::sync::LazyLock;

macro_rules! selector {
    ($name:ident, $css:expr) => {
        pub(crate) static $name: LazyLock<Selector> = LazyLock::new(|| Selector::parse($css).unwrap());
    };
}

macro_rules! regex {
    ($name:ident, $regex:expr) => {
        pub(crate) static $name: LazyLock<Regex> = LazyLock::new(|| Regex::new($regex).unwrap());
    };
}

selector!(STYLED_SELECTOR, "[style]");
selector!(ANCHOR_SELECTOR, "a");
selector!(CLASSED_SELECTOR, "[class]");
selector!(FOOTNOTE_REF_SELECTOR, "a[data-footnote='true']");
selector!(FOOTNOTE_BACK_SELECTOR, "a[data-footnote-back='true']");
selector!(FOOTNOTES_SELECTOR, "[data-footnotes='true']");
selector!(IMAGE_SELECTOR, "img[src]");
selector!(STYLESHEET_SELECTOR, "link[rel~='stylesheet'][href]");
selector!(PARAGRAPH_SELECTOR, "p");
selector!(BODY_SELECTOR, "body");
// RFC 3986 scheme, or a protocol-relative reference.
regex!(ABSOLUTE_REFERENCE_REGEX, r"^(?:[A-Za-z][A-Za-z0-9+.\-]*:|//)");

pub(crate) const FOOTNOTE_REF_CLASS: &str = "footnote-ref";
pub(crate) const FOOTNOTE_BACK_CLASS: &str = "footnote-back";
pub(crate) const FOOTNOTES_CLASS: &str = "footnotes";
