//! Static tag dictionary.
//!
//! Every known element gets a dense integer id (its index in [`DEFS`]) and a
//! set of static flags describing how it behaves in the tag tree and in the
//! style pass. Unknown names resolve to id `-1` and only raise a document
//! flag; the scanner keeps going.

use bitflags::bitflags;

bitflags! {
    /// Per-tag flags.
    ///
    /// The lower bits are static per-kind properties from the dictionary;
    /// the upper bits are per-instance state stamped on while parsing.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    pub struct TagFlags: u32 {
        /// Creates a style block (participates in color/visibility
        /// inheritance).
        const BLOCK   = 1 << 0;
        /// Never nests children in the tag tree.
        const INLINE  = 1 << 1;
        /// Void element: no content model at all.
        const EMPTY   = 1 << 2;
        /// Head-only metadata; rendered text below it is dropped.
        const HEAD    = 1 << 3;
        /// Carries a followable reference (`href`/`src`/`action`).
        const HREF    = 1 << 4;
        /// May legally occur once per document.
        const UNIQUE  = 1 << 5;
        /// Dictionary entries that parse but carry no semantics.
        const UNKNOWN = 1 << 6;

        /// Instance: token was a `</x>` close.
        const CLOSING = 1 << 16;
        /// Instance: self-closed, or later matched by a close token.
        const CLOSED  = 1 << 17;
        /// Instance: tag was syntactically broken beyond use.
        const BROKEN  = 1 << 18;
        /// Instance: content below this tag is not rendered.
        const IGNORE  = 1 << 19;
        /// Instance: tag produced an image descriptor.
        const IMAGE   = 1 << 20;
    }
}

/// Dense tag identifier: index into [`DEFS`], or `-1` for unknown names.
pub type TagId = i32;

/// Well-known ids the analyzer special-cases. Values are the alphabetical
/// positions in [`DEFS`]; `defs_are_sorted_and_ids_match` pins them.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(i32)]
pub enum Tag {
    A = 0,
    Base = 7,
    Body = 13,
    Br = 14,
    Div = 26,
    Hr = 43,
    Html = 44,
    Img = 47,
    Link = 54,
    P = 67,
    Style = 79,
    Td = 84,
    Title = 89,
    Tr = 90,
}

impl Tag {
    pub const fn id(self) -> TagId {
        self as TagId
    }
}

pub struct TagDef {
    pub name: &'static str,
    pub flags: TagFlags,
}

macro_rules! tag_defs {
    ($(($name:literal $(, $($flag:ident)|+)?),)+) => {
        &[$(TagDef {
            name: $name,
            flags: TagFlags::from_bits_truncate(0 $($(| TagFlags::$flag.bits())+)?),
        },)+]
    };
}

/// The dictionary, alphabetical by name (ids are positions).
#[rustfmt::skip]
pub const DEFS: &[TagDef] = tag_defs![
    ("a", HREF),
    ("abbr", INLINE),
    ("acronym", INLINE),
    ("address"),
    ("applet", INLINE),
    ("area", EMPTY | HREF),
    ("b", INLINE | BLOCK),
    ("base", HEAD | EMPTY),
    ("basefont", INLINE | EMPTY),
    ("bdo", INLINE),
    ("big", INLINE),
    ("blink", INLINE),
    ("blockquote"),
    ("body", UNIQUE | BLOCK),
    ("br", INLINE | EMPTY),
    ("button", INLINE),
    ("caption"),
    ("center", BLOCK),
    ("cite", INLINE),
    ("code", INLINE),
    ("col", EMPTY),
    ("colgroup"),
    ("dd"),
    ("del", INLINE),
    ("dfn", INLINE),
    ("dir"),
    ("div", BLOCK),
    ("dl"),
    ("dt"),
    ("em", INLINE),
    ("embed", INLINE | EMPTY),
    ("fieldset"),
    ("font", BLOCK),
    ("form", HREF),
    ("frame", EMPTY | HREF),
    ("frameset"),
    ("h1", BLOCK),
    ("h2", BLOCK),
    ("h3", BLOCK),
    ("h4", BLOCK),
    ("h5", BLOCK),
    ("h6", BLOCK),
    ("head", UNIQUE | HEAD),
    ("hr", EMPTY),
    ("html", UNIQUE),
    ("i", INLINE),
    ("iframe", HREF),
    ("img", INLINE | EMPTY),
    ("input", INLINE | EMPTY),
    ("ins", INLINE),
    ("kbd", INLINE),
    ("label", INLINE),
    ("legend", INLINE),
    ("li"),
    ("link", HEAD | EMPTY),
    ("listing"),
    ("map", INLINE),
    ("marquee", INLINE),
    ("menu"),
    ("meta", HEAD | EMPTY),
    ("nobr", INLINE),
    ("noframes"),
    ("noscript"),
    ("object", INLINE),
    ("ol"),
    ("optgroup"),
    ("option"),
    ("p"),
    ("param", INLINE | EMPTY),
    ("pre"),
    ("q", INLINE),
    ("s", INLINE),
    ("samp", INLINE),
    ("script", HEAD),
    ("select", INLINE),
    ("small", INLINE),
    ("span", INLINE | BLOCK),
    ("strike", INLINE),
    ("strong", INLINE),
    ("style", HEAD),
    ("sub", INLINE),
    ("sup", INLINE),
    ("table", BLOCK),
    ("tbody"),
    ("td", BLOCK),
    ("textarea", INLINE),
    ("tfoot"),
    ("th", BLOCK),
    ("thead"),
    ("title", HEAD | UNIQUE),
    ("tr"),
    ("tt", INLINE),
    ("u", INLINE),
    ("ul"),
    ("var", INLINE),
    ("wbr", INLINE | EMPTY),
    ("xmp"),
];

/// Number of known tags; sizes the per-document `tags_seen` bitset.
pub const N_TAGS: usize = DEFS.len();

/// Look a lowercase tag name up in the dictionary.
pub fn by_name(name: &[u8]) -> Option<(TagId, TagFlags)> {
    DEFS.binary_search_by(|def| def.name.as_bytes().cmp(name))
        .ok()
        .map(|idx| (idx as TagId, DEFS[idx].flags))
}

/// Resolve a tag id back to its canonical name.
pub fn by_id(id: TagId) -> Option<&'static str> {
    usize::try_from(id)
        .ok()
        .and_then(|idx| DEFS.get(idx))
        .map(|d| d.name)
}

/// Public lookup used by downstream feature extractors; tolerates any case.
pub fn id_by_name(name: &str) -> Option<TagId> {
    by_name(name.to_ascii_lowercase().as_bytes()).map(|(id, _)| id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defs_are_sorted_and_ids_match() {
        for w in DEFS.windows(2) {
            assert!(w[0].name < w[1].name, "{} !< {}", w[0].name, w[1].name);
        }
        for (tag, name) in [
            (Tag::A, "a"),
            (Tag::Base, "base"),
            (Tag::Body, "body"),
            (Tag::Br, "br"),
            (Tag::Div, "div"),
            (Tag::Hr, "hr"),
            (Tag::Html, "html"),
            (Tag::Img, "img"),
            (Tag::Link, "link"),
            (Tag::P, "p"),
            (Tag::Style, "style"),
            (Tag::Td, "td"),
            (Tag::Title, "title"),
            (Tag::Tr, "tr"),
        ] {
            assert_eq!(by_id(tag.id()), Some(name), "id constant for {name}");
        }
    }

    #[test]
    fn lookups_resolve_known_and_reject_unknown() {
        let (id, flags) = by_name(b"img").unwrap();
        assert_eq!(id, Tag::Img.id());
        assert!(flags.contains(TagFlags::INLINE | TagFlags::EMPTY));
        assert!(by_name(b"blink").is_some());
        assert!(by_name(b"x-custom").is_none());
        assert_eq!(id_by_name("DIV"), Some(Tag::Div.id()));
    }

    #[test]
    fn p_is_a_plain_nesting_tag_without_style_block() {
        // keeps the <p><p> reopen path observable
        let (_, flags) = by_name(b"p").unwrap();
        assert!(!flags.contains(TagFlags::BLOCK));
        assert!(!flags.intersects(TagFlags::INLINE | TagFlags::EMPTY));
    }
}
