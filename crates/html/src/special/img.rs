//! `<img>` and `<link rel=icon>` processing.
//!
//! Three reference shapes matter to the spam heuristics: `cid:` pointers
//! into the message, inline `data:` payloads, and external fetches. The
//! descriptor records which one, the claimed dimensions, and (for decoded
//! `data:` payloads) what the image actually is.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use log::debug;
use memchr::{memchr, memmem};
use urls::{UrlFlags, UrlId, UrlSet};

use crate::content::{DocumentFlags, HtmlContent, Image, ImageFlags};
use crate::emit::RenderedText;
use crate::special::url::process_raw_url;
use crate::tags::TagFlags;
use crate::tree::{ComponentKind, Extra, NodeId};

/// Build the image descriptor for an `<img>`-shaped tag.
///
/// `dest` is the rendered-text buffer for `alt` emission; `<link rel=icon>`
/// passes `None` since icons display nothing.
pub(crate) fn process_img_tag(
    hc: &mut HtmlContent,
    set: &mut UrlSet,
    part_urls: &mut Option<&mut Vec<UrlId>>,
    node: NodeId,
    mut dest: Option<&mut RenderedText>,
) {
    let mut img = Image {
        tag: node,
        src: None,
        url: None,
        width: 0,
        height: 0,
        flags: ImageFlags::empty(),
        embedded_image: None,
    };
    hc.tree.node_mut(node).flags |= TagFlags::IMAGE;

    let mut seen_width = false;
    let mut seen_height = false;
    let params = hc.tree.node(node).params.clone();

    if let Some(src) = params.get(ComponentKind::Href)
        && !src.is_empty()
    {
        img.src = Some(String::from_utf8_lossy(src).into_owned());

        if src.starts_with(b"cid:") {
            img.flags |= ImageFlags::EMBEDDED;
        } else if src.starts_with(b"data:") {
            img.flags |= ImageFlags::EMBEDDED | ImageFlags::DATA;
            process_data_image(&mut img, src);
            hc.flags |= DocumentFlags::HAS_DATA_URLS;
        } else {
            img.flags |= ImageFlags::EXTERNAL;
            if let Some(mut url) = process_raw_url(src) {
                url.flags |= UrlFlags::IMAGE;
                img.url = Some(url.clone());
                let (id, inserted) = set.add_or_return(url.clone());
                if !inserted {
                    // known from another part; still stamp the image flag
                    let existing = set.get_mut(id);
                    existing.flags |= url.flags;
                    existing.count += 1;
                } else if let Some(part_urls) = part_urls.as_deref_mut() {
                    part_urls.push(id);
                }
            }
        }
    }

    if let Some(v) = params.get(ComponentKind::Height) {
        img.height = leading_u32(v);
        seen_height = true;
    }
    if let Some(v) = params.get(ComponentKind::Width) {
        img.width = leading_u32(v);
        seen_width = true;
    }

    if let Some(style) = params.get(ComponentKind::Style) {
        // Dimensions hidden in the style attribute, e.g. style="width:1px".
        if !seen_height
            && !style.is_empty()
            && let Some(h) = dimension_from_style(style, b"height")
        {
            img.height = h;
        }
        if !seen_width
            && !style.is_empty()
            && let Some(w) = dimension_from_style(style, b"width")
        {
            img.width = w;
        }
    }

    if let Some(alt) = params.get(ComponentKind::Alt)
        && !alt.is_empty()
        && let Some(dest) = dest.as_deref_mut()
    {
        dest.append_alt(alt);
    }

    if let Some(embedded) = &img.embedded_image {
        if !seen_height {
            img.height = embedded.height;
        }
        if !seen_width {
            img.width = embedded.width;
        }
    }

    hc.images.push(img);
    hc.tree.node_mut(node).extra = Extra::Image(hc.images.len() - 1);
}

/// `<link>` participates only as `rel="icon"`, which is treated as an
/// image reference without any rendered-text side effects.
pub(crate) fn process_link_tag(
    hc: &mut HtmlContent,
    set: &mut UrlSet,
    part_urls: &mut Option<&mut Vec<UrlId>>,
    node: NodeId,
) {
    let is_icon = hc
        .tree
        .node(node)
        .params
        .get(ComponentKind::Rel)
        .is_some_and(|rel| rel.eq_ignore_ascii_case(b"icon"));
    if is_icon {
        process_img_tag(hc, set, part_urls, node, None);
    }
}

/// Decode a `data:image/…;base64,…` payload and ask the image sniffer what
/// it is. Anything that does not decode cleanly is ignored.
fn process_data_image(img: &mut Image, src: &[u8]) {
    let Some(semicolon) = memchr(b';', src) else {
        return;
    };
    let rest = &src[semicolon + 1..];
    let Some(payload) = rest.strip_prefix(b"base64,") else {
        return;
    };

    match BASE64_STANDARD.decode(payload) {
        Ok(decoded) => {
            if let Some(meta) = imgmeta::maybe_process_image(&decoded) {
                debug!(
                    target: "html.img",
                    "detected {} image of size {}x{} in data url",
                    meta.image_type.as_str(),
                    meta.width,
                    meta.height
                );
                img.embedded_image = Some(meta);
            }
        }
        Err(err) => {
            debug!(target: "html.img", "undecodable data url payload: {err}");
        }
    }
}

/// Parse the leading ASCII digit run of an attribute value.
fn leading_u32(v: &[u8]) -> u32 {
    let mut val: u32 = 0;
    for &b in v {
        if !b.is_ascii_digit() {
            break;
        }
        val = val.saturating_mul(10).saturating_add(u32::from(b - b'0'));
    }
    val
}

/// Find `key` inside a style attribute and read the digit run that follows
/// it, skipping only spaces, `=` and `:` on the way.
fn dimension_from_style(style: &[u8], key: &[u8]) -> Option<u32> {
    let lowered = style.to_ascii_lowercase();
    let pos = memmem::find(&lowered, key)?;
    let mut p = pos + key.len();
    while p < style.len() {
        let b = style[p];
        if b.is_ascii_digit() {
            return Some(leading_u32(&style[p..]));
        }
        if !b.is_ascii_whitespace() && b != b'=' && b != b':' {
            break;
        }
        p += 1;
    }
    None
}
