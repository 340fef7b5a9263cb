//! URL extraction and normalization for `href`-carrying tags.
//!
//! Raw attribute bytes arrive in every state of disrepair: embedded
//! whitespace, missing schemes, control characters, percent-worthy bytes.
//! The pre-pass here cleans all of that up and infers a scheme before the
//! URL backend gets to see the string; parse rejection is silent.

use std::borrow::Cow;

use log::debug;
use memchr::memmem;
use urls::{Scheme, Url, UrlFlags, UrlId, UrlSet};

use crate::content::{Exception, ExceptionKind, HtmlContent};
use crate::tree::{ComponentKind, NodeId};

const HEXDIGITS: &[u8; 16] = b"0123456789abcdef";

fn is_ascii_graph(b: u8) -> bool {
    (0x21..=0x7E).contains(&b)
}

/// Clean a raw `href`/`src` byte slice and parse it into an accepted URL.
///
/// Returns `None` for slices that cannot denote a fetchable reference:
/// parse failures, empty hosts, unknown protocols, and schemeless forms
/// without a TLD-looking host.
pub(crate) fn process_raw_url(raw: &[u8]) -> Option<Url> {
    let mut start = 0;
    let mut end = raw.len();
    while start < end && raw[start].is_ascii_whitespace() {
        start += 1;
    }
    while end > start && raw[end - 1].is_ascii_whitespace() {
        end -= 1;
    }
    let s = &raw[start..end];
    if s.is_empty() {
        return None;
    }

    let mut prefix = "";
    let mut no_prefix = false;

    if memmem::find(s, b"://").is_none() {
        if s.starts_with(b"mailto:") || s.starts_with(b"tel:") || s.starts_with(b"callto:") {
            // valid but unusual prefix; take it as-is
        } else {
            // Examine the first byte that cannot be part of a host label.
            for (i, &b) in s.iter().enumerate() {
                if b & 0x80 != 0 || b.is_ascii_alphanumeric() {
                    continue;
                }
                if i == 0 && s.len() > 2 && b == b'/' && s[1] == b'/' {
                    prefix = "http:";
                    no_prefix = true;
                } else if b == b'@' {
                    // likely a bare mail address
                    prefix = "mailto://";
                    no_prefix = true;
                } else if b == b':' && i != 0 {
                    // some scheme we did not special-case; leave as-is
                } else if i == 0 {
                    // no usable data at all
                    return None;
                } else {
                    prefix = "http://";
                    no_prefix = true;
                }
                break;
            }
        }
    }

    // Copy out, dropping interior whitespace and percent-encoding the
    // non-graphic ASCII bytes obfuscated links rely on.
    let mut bytes = Vec::with_capacity(prefix.len() + s.len());
    bytes.extend_from_slice(prefix.as_bytes());
    let mut has_bad_chars = false;
    for &b in s {
        if b.is_ascii_whitespace() {
            continue;
        }
        if b < 0x80 && !is_ascii_graph(b) {
            bytes.push(b'%');
            bytes.push(HEXDIGITS[(b >> 4) as usize]);
            bytes.push(HEXDIGITS[(b & 0xF) as usize]);
            has_bad_chars = true;
        } else {
            bytes.push(b);
        }
    }

    let mut url_str = String::from_utf8_lossy(&bytes).into_owned();
    let saved_flags = urls::normalise_in_place(&mut url_str);

    let mut url = match urls::parse_url(&url_str) {
        Ok(url) => url,
        Err(err) => {
            debug!(target: "html.url", "dropping unparseable url: {err}");
            return None;
        }
    };

    // Filter completely damaged references.
    if url.host.is_empty() || url.scheme == Scheme::Unknown {
        return None;
    }

    url.flags |= saved_flags;
    if has_bad_chars {
        url.flags |= UrlFlags::OBSCURED;
    }
    if no_prefix {
        url.flags |= UrlFlags::SCHEMELESS;
        if url.tld.is_none() {
            // neither scheme nor TLD: not worth keeping
            return None;
        }
    }

    Some(url)
}

/// Extract the URL of an `href`-carrying tag, resolving relative forms
/// against the document `<base>` when one was recorded.
pub(crate) fn process_url_tag(hc: &HtmlContent, node: NodeId) -> Option<Url> {
    let raw = hc.tree.node(node).params.get(ComponentKind::Href)?;
    if raw.is_empty() {
        return None;
    }

    let effective: Cow<'_, [u8]> = match &hc.base_url {
        Some(base) if raw.len() > 2 && memmem::find(raw, b"://").is_none() => {
            if raw.len() >= 5 && raw[..5].eq_ignore_ascii_case(b"data:") {
                // image data url in an href position, never a link
                return None;
            }
            if raw[0] == b'/' && raw.get(1) != Some(&b'/') {
                // relative to the host root
                let mut buf = Vec::with_capacity(base.url.len() + raw.len() + 4);
                buf.extend_from_slice(base.scheme.as_str().as_bytes());
                buf.extend_from_slice(b"://");
                buf.extend_from_slice(base.host.as_bytes());
                buf.push(b'/');
                buf.extend_from_slice(raw);
                Cow::Owned(buf)
            } else {
                // relative to the base URL itself
                let mut buf = Vec::with_capacity(base.url.len() + raw.len() + 1);
                buf.extend_from_slice(base.url.as_bytes());
                if base.data_len() == 0 {
                    buf.push(b'/');
                }
                buf.extend_from_slice(raw);
                Cow::Owned(buf)
            }
        }
        _ => Cow::Borrowed(raw),
    };

    process_raw_url(&effective)
}

/// Compare the anchor text emitted since the `<a>` opened against the link
/// target, recording the phishing signals.
pub(crate) fn check_displayed_url(
    set: &mut UrlSet,
    exceptions: Option<&mut Vec<Exception>>,
    rendered: &[u8],
    href_offset: usize,
    url_id: UrlId,
) {
    let visible_raw = &rendered[href_offset..];
    let visible = String::from_utf8_lossy(visible_raw);
    let cleaned = urls::clean_visible_text(&visible);

    let (mismatch, displayed) = urls::url_is_phished(set.get(url_id), &cleaned);

    {
        let url = set.get_mut(url_id);
        url.visible_part = Some(cleaned);
        if mismatch {
            url.flags |= UrlFlags::DISPLAY_URL;
        }
    }

    if mismatch && let Some(exceptions) = exceptions {
        exceptions.insert(
            0,
            Exception {
                pos: href_offset,
                len: rendered.len() - href_offset,
                kind: ExceptionKind::Url,
                url: set.get(url_id).clone(),
            },
        );
    }

    // When the displayed text is itself a URL we already know from another
    // part, it was evidently shown as a hint, not followed.
    if let Some(displayed) = displayed
        && let Some(existing) = set.find(&displayed.url)
    {
        let turl = set.get_mut(existing);
        if turl.flags.contains(UrlFlags::FROM_TEXT) {
            turl.flags.remove(UrlFlags::FROM_TEXT);
            turl.flags |= UrlFlags::HTML_DISPLAYED;
        }
        turl.count += 1;
    }
}

/// A freshly-inserted URL may smuggle more URLs inside its query string
/// (open redirectors). Hoist them into the set as well.
pub(crate) fn process_query_urls(
    set: &mut UrlSet,
    part_urls: &mut Option<&mut Vec<UrlId>>,
    url_id: UrlId,
) {
    let query = set.get(url_id).query.clone();
    if let Some(query) = query {
        for mut found in urls::find_urls(&query) {
            if found.scheme == Scheme::Mailto && found.user.is_none() {
                continue;
            }
            debug!(target: "html.url", "found url {} in query of {}", found, set.get(url_id));
            found.flags |= UrlFlags::QUERY;
            let (id, inserted) = set.add_or_increase(found);
            if inserted && let Some(part_urls) = part_urls.as_deref_mut() {
                part_urls.push(id);
            }
        }
    }

    if let Some(part_urls) = part_urls.as_deref_mut() {
        part_urls.push(url_id);
    }
}
