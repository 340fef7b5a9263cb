//! Forgiving HTML-fragment analyzer for mail anti-spam pipelines.
//!
//! Mail bodies are not documents, they are hostile byte soup: unclosed
//! tags, fake comments, URLs split by whitespace, text hidden with
//! `font-size:0`. This crate recovers as much meaning as it can in one
//! synchronous pass and never fails; everything suspicious or broken is
//! reported through [`DocumentFlags`] on the [`HtmlContent`] descriptor.
//!
//! The pass produces:
//! - rendered text approximating what a mail client would display,
//!   whitespace-collapsed and entity-decoded (`HtmlContent::parsed`);
//! - a balanced tag tree with per-tag rendered-text ranges;
//! - extracted URLs (deduplicated through a caller-supplied [`UrlSet`]),
//!   with displayed-text phishing comparison on anchors;
//! - image and style-block descriptors for hidden-text analysis.
//!
//! ```
//! let hc = html::process_fragment(b"<html><body>Hello&nbsp;World</body></html>");
//! assert_eq!(hc.parsed, "Hello\u{00A0}World".as_bytes());
//! assert!(hc.tag_seen("body"));
//! ```

use urls::{UrlId, UrlSet};

mod content;
mod emit;
mod entities;
mod scan;
mod special;
pub mod tags;
mod tree;

pub use content::{
    Block, DocumentFlags, Exception, ExceptionKind, HtmlContent, Image, ImageFlags, TagsSeen,
};
pub use entities::decode_entities_inplace;
pub use tags::{Tag, TagFlags, TagId};
pub use tree::{ComponentKind, Extra, MAX_TAGS, NodeId, Params, TagNode, TagTree};

/// Process one HTML fragment with every output hooked up.
///
/// - `hc` receives the content descriptor (flags, rendered text, tree,
///   images, blocks).
/// - `exceptions`, when given, collects displayed-URL spans in reverse
///   document order.
/// - `url_set`, when given, deduplicates URLs across message parts; when
///   absent a throwaway per-document set is used internally.
/// - `part_urls`, when given, receives the ids of URLs this fragment
///   inserted.
/// - `allow_css` routes `<style>` bodies to the stylesheet parser.
pub fn process_fragment_full(
    input: &[u8],
    hc: &mut HtmlContent,
    exceptions: Option<&mut Vec<Exception>>,
    url_set: Option<&mut UrlSet>,
    part_urls: Option<&mut Vec<UrlId>>,
    allow_css: bool,
) {
    let mut local_set;
    let set = match url_set {
        Some(set) => set,
        None => {
            local_set = UrlSet::new();
            &mut local_set
        }
    };

    let scanner = scan::Scanner::new(input, hc.tree.root());
    let parsed = {
        let mut sinks = scan::Sinks {
            hc,
            url_set: set,
            exceptions,
            part_urls,
            allow_css,
        };
        scanner.run(&mut sinks)
    };
    hc.parsed = parsed;
}

/// Convenience wrapper: fresh descriptor, no URL set sharing, no CSS.
pub fn process_fragment(input: &[u8]) -> HtmlContent {
    let mut hc = HtmlContent::new();
    process_fragment_full(input, &mut hc, None, None, None, false);
    hc
}
