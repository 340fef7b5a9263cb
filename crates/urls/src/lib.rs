//! URL records for the mail HTML analyzer.
//!
//! The analyzer pre-cleans raw `href`/`src` bytes itself (whitespace
//! stripping, scheme inference, percent-encoding of controls); this crate
//! owns what happens afterwards: RFC parsing through the `url` crate, the
//! flat [`Url`] record downstream feature extractors consume, the
//! per-message [`UrlSet`], and the displayed-text comparison used for
//! phishing heuristics.

use std::fmt;

use bitflags::bitflags;

mod scan;
mod set;

pub use scan::{clean_visible_text, find_urls, url_is_phished};
pub use set::{UrlId, UrlSet};

bitflags! {
    /// Qualifiers accumulated on a URL while the document is processed.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    pub struct UrlFlags: u32 {
        /// Contained non-graphic bytes that had to be percent-encoded.
        const OBSCURED       = 1 << 0;
        /// Had no scheme; a default prefix was assumed.
        const SCHEMELESS     = 1 << 1;
        /// Found inside the query string of another URL.
        const QUERY          = 1 << 2;
        /// Referenced from an image tag.
        const IMAGE          = 1 << 3;
        /// The anchor text of this link displayed some other URL.
        const DISPLAY_URL    = 1 << 4;
        /// Originally seen in a plain-text part of the message.
        const FROM_TEXT      = 1 << 5;
        /// A text-part URL that turned out to be display text in HTML.
        const HTML_DISPLAYED = 1 << 6;
    }
}

/// Protocols the analyzer is willing to keep. Anything else parses but is
/// rejected by the caller's acceptance check.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Scheme {
    Http,
    Https,
    Ftp,
    Mailto,
    Tel,
    Callto,
    Unknown,
}

impl Scheme {
    pub fn as_str(self) -> &'static str {
        match self {
            Scheme::Http => "http",
            Scheme::Https => "https",
            Scheme::Ftp => "ftp",
            Scheme::Mailto => "mailto",
            Scheme::Tel => "tel",
            Scheme::Callto => "callto",
            Scheme::Unknown => "unknown",
        }
    }

    fn from_str(s: &str) -> Self {
        match s {
            "http" => Scheme::Http,
            "https" => Scheme::Https,
            "ftp" | "ftps" => Scheme::Ftp,
            "mailto" => Scheme::Mailto,
            "tel" => Scheme::Tel,
            "callto" => Scheme::Callto,
            _ => Scheme::Unknown,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum UrlError {
    #[error("url does not parse: {0}")]
    Parse(#[from] url::ParseError),
}

/// One extracted URL.
///
/// `url` is the canonical string form and doubles as the [`UrlSet`] key.
/// `host` is empty for URLs the backend could not find an authority for;
/// such URLs never pass the analyzer's acceptance check.
#[derive(Clone, Debug)]
pub struct Url {
    pub url: String,
    pub scheme: Scheme,
    pub host: String,
    pub user: Option<String>,
    pub query: Option<String>,
    pub tld: Option<String>,
    pub flags: UrlFlags,
    pub count: u32,
    /// Anchor text this URL was displayed with, when it was an `<a>` link.
    pub visible_part: Option<String>,
}

impl Url {
    /// Byte length of everything after `scheme://host[:port]`, the "data"
    /// portion relative-reference concatenation cares about.
    pub fn data_len(&self) -> usize {
        let after_scheme = self
            .url
            .find("://")
            .map(|i| i + 3)
            .or_else(|| self.url.find(':').map(|i| i + 1))
            .unwrap_or(0);
        let authority_end = self.url[after_scheme..]
            .find(['/', '?', '#'])
            .map(|i| after_scheme + i)
            .unwrap_or(self.url.len());
        self.url.len() - authority_end
    }
}

impl fmt::Display for Url {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.url)
    }
}

/// Parse an already-cleaned URL string into a [`Url`] record.
///
/// Syntactic failure is an error; a missing host or unknown scheme is not.
/// The caller applies its own acceptance rules on the returned record.
pub fn parse_url(input: &str) -> Result<Url, UrlError> {
    let parsed = url::Url::parse(input)?;
    let scheme = Scheme::from_str(parsed.scheme());

    let (host, user) = match parsed.host_str() {
        Some(h) => {
            let user = (!parsed.username().is_empty()).then(|| parsed.username().to_string());
            (h.to_string(), user)
        }
        None => host_from_opaque(scheme, parsed.path()),
    };

    let tld = tld_of(&host);

    Ok(Url {
        url: parsed.to_string(),
        scheme,
        host,
        user,
        query: parsed.query().map(str::to_string),
        tld,
        flags: UrlFlags::empty(),
        count: 1,
        visible_part: None,
    })
}

/// Authority substitute for opaque (non-`//`) forms: `mailto:user@host`
/// keeps the domain as host and the local part as user; `tel:`/`callto:`
/// keep the subscriber number as host so the non-empty-host acceptance
/// check has something to look at.
fn host_from_opaque(scheme: Scheme, path: &str) -> (String, Option<String>) {
    match scheme {
        Scheme::Mailto => match path.rsplit_once('@') {
            Some((user, host)) if !host.is_empty() => {
                let user = (!user.is_empty()).then(|| user.to_string());
                (host.to_string(), user)
            }
            _ => (String::new(), None),
        },
        Scheme::Tel | Scheme::Callto => (path.to_string(), None),
        _ => (String::new(), None),
    }
}

/// Top-level-domain-ish tail of a host name. Purely lexical: the label
/// after the last dot, when it is alphabetic and at least two characters.
/// No public-suffix list is consulted.
pub fn tld_of(host: &str) -> Option<String> {
    let (_, last) = host.rsplit_once('.')?;
    if last.len() >= 2 && last.bytes().all(|b| b.is_ascii_alphabetic()) {
        Some(last.to_ascii_lowercase())
    } else {
        None
    }
}

/// Pre-parse normalization of a decoded URL string.
///
/// Removes the control bytes obfuscated links smuggle through mail clients
/// and reports [`UrlFlags::OBSCURED`] when it had to. RFC-level
/// normalization (case, default ports, path dots) is left to the parse.
pub fn normalise_in_place(buf: &mut String) -> UrlFlags {
    if buf.bytes().any(|b| b.is_ascii_control() || b == 0x7f) {
        buf.retain(|c| !c.is_ascii_control() && c != '\u{7f}');
        UrlFlags::OBSCURED
    } else {
        UrlFlags::empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn http_urls_expose_host_query_and_tld() {
        let u = parse_url("http://Example.COM/path?a=1").unwrap();
        assert_eq!(u.scheme, Scheme::Http);
        assert_eq!(u.host, "example.com");
        assert_eq!(u.query.as_deref(), Some("a=1"));
        assert_eq!(u.tld.as_deref(), Some("com"));
    }

    #[test]
    fn mailto_forms_recover_user_and_domain() {
        let plain = parse_url("mailto:bob@corp.example").unwrap();
        assert_eq!(plain.scheme, Scheme::Mailto);
        assert_eq!(plain.host, "corp.example");
        assert_eq!(plain.user.as_deref(), Some("bob"));

        // the slashed form the analyzer synthesizes for bare addresses
        let slashed = parse_url("mailto://bob@corp.example").unwrap();
        assert_eq!(slashed.host, "corp.example");
        assert_eq!(slashed.user.as_deref(), Some("bob"));
    }

    #[test]
    fn tel_numbers_stand_in_for_the_host() {
        let u = parse_url("tel:+15550100").unwrap();
        assert_eq!(u.scheme, Scheme::Tel);
        assert!(!u.host.is_empty());
    }

    #[test]
    fn unknown_schemes_parse_but_are_marked() {
        let u = parse_url("gopher://hole.example/").unwrap();
        assert_eq!(u.scheme, Scheme::Unknown);
    }

    #[test]
    fn tld_is_lexical_only() {
        assert_eq!(tld_of("evil.com"), Some("com".into()));
        assert_eq!(tld_of("a.b.co"), Some("co".into()));
        assert_eq!(tld_of("localhost"), None);
        assert_eq!(tld_of("127.0.0.1"), None);
        assert_eq!(tld_of("x.123"), None);
    }

    #[test]
    fn normalise_strips_control_bytes_and_flags_it() {
        let mut s = String::from("http://ex\tample.com/\r\n");
        assert_eq!(normalise_in_place(&mut s), UrlFlags::OBSCURED);
        assert_eq!(s, "http://example.com/");

        let mut clean = String::from("http://example.com/");
        assert!(normalise_in_place(&mut clean).is_empty());
    }

    #[test]
    fn data_len_measures_after_authority() {
        let u = parse_url("http://example.com/").unwrap();
        assert_eq!(u.data_len(), 1); // the bare "/"
        let u = parse_url("http://example.com/dir?x=1").unwrap();
        assert_eq!(u.data_len(), "/dir?x=1".len());
    }
}
