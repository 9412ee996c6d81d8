//! The fixed vocabulary that author CSS classes are mapped onto.

use crate::error::{Error, ErrorKind};
use std::collections::HashMap;
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;

/// Author class name to canonical style. Classes without an entry are
/// treated as [`BookStyle::StripClass`].
pub type ClassMapping = HashMap<String, BookStyle>;

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub enum StyleGroup {
    TextStyle,
    TextModifiers,
    Images,
    Dialog,
    Remove,
}

impl StyleGroup {
    pub const ALL: [StyleGroup; 5] = [
        StyleGroup::TextStyle,
        StyleGroup::TextModifiers,
        StyleGroup::Images,
        StyleGroup::Dialog,
        StyleGroup::Remove,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TextStyle => "Text Style",
            Self::TextModifiers => "Text Modifiers",
            Self::Images => "Images",
            Self::Dialog => "Dialog",
            Self::Remove => "Remove",
        }
    }
}

impl Display for StyleGroup {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}", self.as_str())
    }
}

macro_rules! book_styles {
    ($($variant:ident => $id:literal, $group:ident, $description:literal;)+) => {
        /// Canonical semantic styles. The identifier doubles as the CSS class
        /// written into normalized markup.
        #[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
        #[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
        pub enum BookStyle {
            $(
                #[cfg_attr(feature = "serde", serde(rename = $id))]
                $variant,
            )+
        }

        impl BookStyle {
            pub const ALL: &'static [BookStyle] = &[$(BookStyle::$variant,)+];

            pub fn id(&self) -> &'static str {
                match self {
                    $(Self::$variant => $id,)+
                }
            }

            pub fn group(&self) -> StyleGroup {
                match self {
                    $(Self::$variant => StyleGroup::$group,)+
                }
            }

            pub fn description(&self) -> &'static str {
                match self {
                    $(Self::$variant => $description,)+
                }
            }

            pub fn from_id(id: &str) -> Option<Self> {
                match id {
                    $($id => Some(Self::$variant),)+
                    _ => None,
                }
            }
        }
    };
}

book_styles! {
    Heading1 => "h1", TextStyle, "Level 1 heading";
    Heading2 => "h2", TextStyle, "Level 2 heading";
    Heading3 => "h3", TextStyle, "Level 3 heading";
    ChapterText => "chapterText", TextStyle, "Chapter text";
    EpigraphText => "epigraphText", TextStyle, "Epigraph text";
    EpigraphCitation => "epigraphCitation", TextStyle, "Epigraph citation";
    Embed => "embed", TextStyle, "Embed (in-world books, letters etc.)";
    Italic => "italic", TextModifiers, "Italic";
    Bold => "bold", TextModifiers, "Bold";
    Reset => "reset", TextModifiers, "Reset";
    FullWidthImage => "fullWidthImage", Images, "Full width image";
    CenteredImage => "centeredImage", Images, "Centered image";
    DialogLine => "dialogLine", Dialog, "Line (paragraph)";
    DialogSpeaker => "dialogSpeaker", Dialog, "Speaker";
    DialogText => "dialogText", Dialog, "Text";
    StripClass => "stripClass", Remove, "Strip class from elements";
    StripElement => "stripElement", Remove, "Discard elements with class";
}

impl BookStyle {
    /// Styles bucketed by group, in declaration order, for mapping editors.
    pub fn groups() -> Vec<(StyleGroup, Vec<BookStyle>)> {
        StyleGroup::ALL
            .iter()
            .map(|group| (*group, Self::ALL.iter().copied().filter(|s| s.group() == *group).collect()))
            .collect()
    }

    /// Look up the style for an author class, falling back to stripping it.
    pub fn for_class(mapping: &ClassMapping, class: &str) -> Self {
        mapping.get(class).copied().unwrap_or_default()
    }
}

impl Default for BookStyle {
    fn default() -> Self {
        Self::StripClass
    }
}

impl FromStr for BookStyle {
    type Err = Error;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_id(s).ok_or_else(|| exn::Exn::from(ErrorKind::UnknownStyle(s.to_string())))
    }
}

impl Display for BookStyle {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}", self.id())
    }
}
