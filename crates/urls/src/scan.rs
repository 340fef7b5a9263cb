//! Displayed-text comparison and free-text URL discovery.
//!
//! Phishing mails routinely show one URL as the anchor text of a link that
//! points somewhere else. The analyzer hands us the rendered anchor text;
//! we decide whether that text itself reads as a URL, and whether its host
//! disagrees with the link target.

use log::debug;

use crate::{Scheme, Url, UrlFlags, parse_url, tld_of};

/// Code points phishers insert to break naive string comparison while
/// staying invisible: zero-width spaces/joiners, soft hyphen, bidi marks,
/// word joiner, BOM.
fn is_invisible(c: char) -> bool {
    matches!(
        c,
        '\u{00AD}' | '\u{200B}' | '\u{200C}' | '\u{200D}' | '\u{200E}' | '\u{200F}'
            | '\u{2060}' | '\u{FEFF}'
    )
}

/// Trim Unicode whitespace from both ends and drop invisible code points
/// from the middle. This is the normalization applied to anchor text
/// before it is compared to the link target; it is distinct from (and much
/// stronger than) the ASCII whitespace collapsing of the text emitter.
pub fn clean_visible_text(text: &str) -> String {
    text.trim_matches(char::is_whitespace)
        .chars()
        .filter(|&c| !is_invisible(c))
        .collect()
}

/// Interpret anchor text as a URL, if it plausibly is one.
///
/// Accepts full `scheme://…` forms directly; bare `host/path` forms are
/// given an `http://` prefix but only kept when the host has a TLD-looking
/// tail, so ordinary words ("here", "unsubscribe") never qualify.
fn parse_displayed(text: &str) -> Option<Url> {
    if text.is_empty() || text.chars().any(char::is_whitespace) {
        return None;
    }

    if text.contains("://") {
        let url = parse_url(text).ok()?;
        if url.scheme != Scheme::Unknown && !url.host.is_empty() {
            return Some(url);
        }
        return None;
    }

    // user@host reads as a mail address
    if let Some((user, _host)) = text.split_once('@')
        && !user.is_empty()
        && !user.contains('/')
    {
        let url = parse_url(&format!("mailto://{text}")).ok()?;
        if !url.host.is_empty() && url.tld.is_some() {
            return Some(url);
        }
        return None;
    }

    let host_part = text.split(['/', '?', '#']).next().unwrap_or(text);
    tld_of(host_part)?;

    let mut url = parse_url(&format!("http://{text}")).ok()?;
    if url.host.is_empty() || url.tld.is_none() {
        return None;
    }
    url.flags |= UrlFlags::SCHEMELESS;
    Some(url)
}

/// Compare a link's rendered anchor text against the link target.
///
/// Returns `(mismatch, displayed)`: `displayed` is the anchor text parsed
/// as a URL whenever that succeeds, and `mismatch` is true when its host
/// differs from the target's, the classic displayed-URL phish.
pub fn url_is_phished(url: &Url, visible: &str) -> (bool, Option<Url>) {
    let Some(displayed) = parse_displayed(visible) else {
        return (false, None);
    };

    let mismatch = !displayed.host.eq_ignore_ascii_case(&url.host);
    if mismatch {
        debug!(
            target: "urls.phish",
            "anchor text {} disagrees with target host {}",
            displayed.host,
            url.host
        );
    }
    (mismatch, Some(displayed))
}

const SCHEME_MARKERS: &[&str] = &["http://", "https://", "ftp://", "mailto:"];

// `&` terminates a run: embedded URLs sit in query parameters, and an
// unencoded ampersand there starts the next parameter.
fn is_url_byte(b: u8) -> bool {
    b.is_ascii_graphic() && !matches!(b, b'"' | b'\'' | b'<' | b'>' | b'(' | b')' | b',' | b'&')
}

/// Find absolute URLs embedded in free text (typically the query string of
/// another URL, where redirectors hide their real destination).
pub fn find_urls(text: &str) -> Vec<Url> {
    let mut found = Vec::new();
    let bytes = text.as_bytes();
    let lower = text.to_ascii_lowercase();

    let mut pos = 0;
    while pos < bytes.len() {
        let Some((start, marker_len)) = SCHEME_MARKERS
            .iter()
            .filter_map(|m| lower[pos..].find(m).map(|i| (pos + i, m.len())))
            .min()
        else {
            break;
        };

        let mut end = start + marker_len;
        while end < bytes.len() && is_url_byte(bytes[end]) {
            end += 1;
        }

        if end > start + marker_len
            && let Ok(url) = parse_url(&text[start..end])
            && !url.host.is_empty()
            && url.scheme != Scheme::Unknown
        {
            found.push(url);
        }

        pos = end.max(start + 1);
    }

    found
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn visible_text_cleanup_removes_invisible_code_points() {
        assert_eq!(clean_visible_text("  paypal.com  "), "paypal.com");
        assert_eq!(clean_visible_text("pay\u{200B}pal.com"), "paypal.com");
        assert_eq!(clean_visible_text("\u{00A0}x\u{00A0}"), "x");
    }

    #[test]
    fn displayed_domains_trigger_a_mismatch() {
        let target = parse_url("http://evil.com/login").unwrap();
        let (mismatch, displayed) = url_is_phished(&target, "paypal.com");
        assert!(mismatch);
        assert_eq!(displayed.unwrap().host, "paypal.com");
    }

    #[test]
    fn same_host_text_is_not_a_mismatch() {
        let target = parse_url("http://example.com/a").unwrap();
        let (mismatch, displayed) = url_is_phished(&target, "EXAMPLE.com/b");
        assert!(!mismatch);
        assert!(displayed.is_some());
    }

    #[test]
    fn ordinary_words_are_not_urls() {
        let target = parse_url("http://evil.com/").unwrap();
        for text in ["click here", "unsubscribe", ""] {
            let (mismatch, displayed) = url_is_phished(&target, text);
            assert!(!mismatch, "{text:?}");
            assert!(displayed.is_none(), "{text:?}");
        }
    }

    #[test]
    fn full_scheme_text_is_compared_too() {
        let target = parse_url("http://evil.com/").unwrap();
        let (mismatch, _) = url_is_phished(&target, "https://paypal.com/login");
        assert!(mismatch);
    }

    #[test]
    fn find_urls_scans_query_style_text() {
        let found = find_urls("u=http://redirect.example/hop&x=1&to=https://paypal.com/x");
        assert_eq!(found.len(), 2);
        assert_eq!(found[0].host, "redirect.example");
        assert_eq!(found[1].host, "paypal.com");
    }

    #[test]
    fn find_urls_ignores_markerless_text() {
        assert!(find_urls("a=1&b=2").is_empty());
    }
}
