//! Resolution of resource references found in chapter markup.

use crate::consts::ABSOLUTE_REFERENCE_REGEX;
use crate::error::{ErrorKind, Result};
use std::borrow::Cow;

/// Whether a reference points outside of the book (`https:`, `data:`,
/// protocol-relative, ...).
pub fn is_external(reference: &str) -> bool {
    ABSOLUTE_REFERENCE_REGEX.is_match(reference)
}

/// Resolves `reference` against the document at `base` and returns the
/// percent-decoded, book-relative resource path.
///
/// Query strings and fragments are dropped, `.` and `..` segments are
/// resolved, and references that climb above the book root are rejected.
///
/// ```
/// use lectern_markup::resource::resolve;
/// assert_eq!(resolve("OEBPS/text/ch01.xhtml", "../images/map%201.png").unwrap(), "OEBPS/images/map 1.png");
/// assert_eq!(resolve("OEBPS/text/ch01.xhtml", "/styles/main.css").unwrap(), "styles/main.css");
/// assert!(resolve("ch01.xhtml", "../../etc/passwd").is_err());
/// ```
pub fn resolve(base: &str, reference: &str) -> Result<String> {
    let invalid = || ErrorKind::InvalidResource {
        base: base.to_string(),
        reference: reference.to_string(),
    };
    let path = reference.split(['#', '?']).next().unwrap_or_default();
    let mut segments: Vec<String> = match path.starts_with('/') {
        true => Vec::new(),
        false => {
            let mut directory: Vec<String> = base.split('/').map(str::to_string).collect();
            // The last segment of the base is the document itself.
            directory.pop();
            directory.retain(|s| !s.is_empty() && s != ".");
            directory
        },
    };
    for segment in path.split('/') {
        match segment {
            "" | "." => {},
            ".." => {
                if segments.pop().is_none() {
                    exn::bail!(invalid());
                }
            },
            s => segments.push(percent_decode(s)),
        }
    }
    match segments.is_empty() {
        true => exn::bail!(invalid()),
        false => Ok(segments.join("/")),
    }
}

/// Decodes `%XX` escapes. Malformed escapes are kept verbatim and invalid
/// UTF-8 is replaced.
pub fn percent_decode(segment: &str) -> String {
    urlencoding::decode(segment).map(Cow::into_owned).unwrap_or_else(|_| {
        String::from_utf8_lossy(&urlencoding::decode_binary(segment.as_bytes())).into_owned()
    })
}

/// Final path segment of a resolved resource path.
pub fn file_name(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}
