//! The per-document result object and its satellite descriptors.

use bitflags::bitflags;
use css::{Color, Stylesheet};
use imgmeta::ImageMeta;
use urls::Url;

use crate::tags::{self, N_TAGS, TagId};
use crate::tree::{NodeId, TagTree};

bitflags! {
    /// Document-level diagnostics. All of these are advisory; the pass
    /// always runs to completion.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    pub struct DocumentFlags: u32 {
        /// Input did not begin with `<`.
        const BAD_START          = 1 << 0;
        /// An XML processing instruction was seen.
        const XML                = 1 << 1;
        /// Malformed tag, bad comment, stray `>`, and friends.
        const BAD_ELEMENTS       = 1 << 2;
        /// A tag name missing from the dictionary.
        const UNKNOWN_ELEMENTS   = 1 << 3;
        /// A once-per-document tag occurred again.
        const DUPLICATE_ELEMENTS = 1 << 4;
        /// A close without a matching open, or an in-place reopen.
        const UNBALANCED         = 1 << 5;
        /// The tag-tree node budget was exhausted.
        const TOO_MANY_TAGS      = 1 << 6;
        /// At least one `data:` URL was processed.
        const HAS_DATA_URLS      = 1 << 7;
    }
}

bitflags! {
    /// How an `<img>` (or `<link rel=icon>`) references its payload.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    pub struct ImageFlags: u32 {
        /// References message-internal content (`cid:` or `data:`).
        const EMBEDDED = 1 << 0;
        /// Fetched from the network.
        const EXTERNAL = 1 << 1;
        /// Inlined as a `data:` URL.
        const DATA     = 1 << 2;
    }
}

/// Bitset of tag ids seen in the document.
#[derive(Clone, Debug)]
pub struct TagsSeen {
    bits: [u64; N_TAGS.div_ceil(64)],
}

impl Default for TagsSeen {
    fn default() -> Self {
        Self {
            bits: [0; N_TAGS.div_ceil(64)],
        }
    }
}

impl TagsSeen {
    pub fn set(&mut self, id: TagId) {
        if let Ok(idx) = usize::try_from(id)
            && idx < N_TAGS
        {
            self.bits[idx / 64] |= 1 << (idx % 64);
        }
    }

    pub fn contains(&self, id: TagId) -> bool {
        match usize::try_from(id) {
            Ok(idx) if idx < N_TAGS => self.bits[idx / 64] & (1 << (idx % 64)) != 0,
            _ => false,
        }
    }
}

/// One image reference found in the document.
#[derive(Clone, Debug)]
pub struct Image {
    pub tag: NodeId,
    pub src: Option<String>,
    /// Parsed URL for external references.
    pub url: Option<Url>,
    pub width: u32,
    pub height: u32,
    pub flags: ImageFlags,
    /// Set when a `data:` payload decoded into a recognizable image.
    pub embedded_image: Option<ImageMeta>,
}

/// One style block: the color/size/visibility state a `BLOCK`-flagged tag
/// establishes for the text below it.
#[derive(Clone, Debug)]
pub struct Block {
    pub tag: NodeId,
    pub font_color: Color,
    pub background_color: Color,
    /// Pixels; `None` until inheritance resolves it.
    pub font_size: Option<u32>,
    pub visible: bool,
    pub html_class: Option<String>,
    /// Raw `style="…"` attribute value, kept for downstream heuristics.
    pub style: Option<String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExceptionKind {
    Url,
}

/// Marks the span of rendered text that displayed a URL, so downstream
/// scanners can skip or special-case it.
#[derive(Clone, Debug)]
pub struct Exception {
    pub pos: usize,
    pub len: usize,
    pub kind: ExceptionKind,
    pub url: Url,
}

/// The aggregate output for one processed HTML fragment.
#[derive(Debug)]
pub struct HtmlContent {
    pub flags: DocumentFlags,
    pub tags_seen: TagsSeen,
    pub images: Vec<Image>,
    pub blocks: Vec<Block>,
    /// First valid `<base href>`; later ones are ignored.
    pub base_url: Option<Url>,
    /// Document background, opaque white until `<body bgcolor>` or a body
    /// style says otherwise.
    pub bgcolor: Color,
    /// Rendered text approximating what a mail client would display.
    pub parsed: Vec<u8>,
    /// Accumulated `<style>` rules, when CSS processing was enabled.
    pub css_style: Option<Stylesheet>,
    /// The balanced tag tree; nodes carry per-tag rendered-text ranges.
    pub tree: TagTree,
    /// All tag tokens observed, including ones the tree did not admit.
    pub total_tags: u32,
}

impl Default for HtmlContent {
    fn default() -> Self {
        Self {
            flags: DocumentFlags::empty(),
            tags_seen: TagsSeen::default(),
            images: Vec::new(),
            blocks: Vec::new(),
            base_url: None,
            bgcolor: Color::new(255, 255, 255),
            parsed: Vec::new(),
            css_style: None,
            tree: TagTree::new(),
            total_tags: 0,
        }
    }
}

impl HtmlContent {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a tag with the given name occurred in the document.
    pub fn tag_seen(&self, name: &str) -> bool {
        tags::id_by_name(name).is_some_and(|id| self.tags_seen.contains(id))
    }

    /// Rendered text as a lossy string, for consumers that want `str`.
    pub fn parsed_text(&self) -> std::borrow::Cow<'_, str> {
        String::from_utf8_lossy(&self.parsed)
    }
}
