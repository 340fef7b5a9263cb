//! Declaration and stylesheet syntax.
//!
//! Mail HTML carries CSS in two places: `style="…"` attributes (plain
//! declaration lists) and `<style>` element bodies (rule sets). Both are
//! parsed with the same forgiving splitter; selectors are kept only as
//! opaque-ish classification, no matching engine lives here.

use std::str;

use log::trace;

/// A single CSS property: `color: red`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Declaration {
    pub name: String,
    pub value: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Selector {
    Universal,
    Type(String),  // element/tag selector
    Id(String),    // #id selector
    Class(String), // .class selector
}

/// Set of selectors and declarations.
#[derive(Clone, Debug)]
pub struct Rule {
    pub selectors: Vec<Selector>,
    pub declarations: Vec<Declaration>,
}

/// A full stylesheet: multiple rules. Accumulates across several `<style>`
/// elements in one document.
#[derive(Clone, Debug, Default)]
pub struct Stylesheet {
    pub rules: Vec<Rule>,
}

#[derive(Debug, thiserror::Error)]
pub enum StyleError {
    #[error("style block is not valid UTF-8: {0}")]
    InvalidUtf8(#[from] str::Utf8Error),
}

/// Split a declaration list: `"color: red; font-size: 12px"` becomes
/// name/value pairs with lowercased names. Empty or malformed chunks are
/// dropped silently.
pub fn parse_declarations(input: &str) -> Vec<Declaration> {
    input
        .split(';')
        .filter_map(|pair| {
            let (n, v) = pair.split_once(':')?;
            let name = n.trim().to_ascii_lowercase();
            if name.is_empty() {
                return None;
            }
            let value = v.trim().to_string();
            Some(Declaration { name, value })
        })
        .collect()
}

fn parse_selector_one(s: &str) -> Option<Selector> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }
    if s == "*" {
        return Some(Selector::Universal);
    }
    if let Some(id) = s.strip_prefix('#') {
        return Some(Selector::Id(id.trim().to_string()));
    }
    if let Some(class) = s.strip_prefix('.') {
        return Some(Selector::Class(class.trim().to_string()));
    }
    if s.chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return Some(Selector::Type(s.to_ascii_lowercase()));
    }
    None
}

/// Parse a rule set: `"div, #id { color: red; } .c { … }"`. Rules without
/// usable selectors or declarations are skipped.
pub fn parse_stylesheet(input: &str) -> Stylesheet {
    let mut rules = Vec::new();
    for block in input.split('}') {
        if let Some((selector_str, declaration_str)) = block.split_once('{') {
            let selectors = selector_str
                .split(',')
                .filter_map(parse_selector_one)
                .collect::<Vec<_>>();
            if selectors.is_empty() {
                continue;
            }
            let declarations = parse_declarations(declaration_str);
            if declarations.is_empty() {
                continue;
            }
            rules.push(Rule {
                selectors,
                declarations,
            });
        }
    }
    Stylesheet { rules }
}

/// Parse the body of a `<style>` element, appending to an existing sheet
/// when the document carries more than one.
pub fn parse_style_block(
    input: &[u8],
    prev: Option<Stylesheet>,
) -> Result<Stylesheet, StyleError> {
    let text = str::from_utf8(input)?;
    let parsed = parse_stylesheet(text);
    trace!(
        target: "css.syntax",
        "parsed style block: {} rules ({} accumulated)",
        parsed.rules.len(),
        prev.as_ref().map_or(0, |p| p.rules.len())
    );
    match prev {
        Some(mut sheet) => {
            sheet.rules.extend(parsed.rules);
            Ok(sheet)
        }
        None => Ok(parsed),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn declarations_split_and_lowercase_names() {
        let decls = parse_declarations("Color: Red; font-size: 12px;; : x; junk");
        assert_eq!(decls.len(), 2);
        assert_eq!(decls[0].name, "color");
        assert_eq!(decls[0].value, "Red");
        assert_eq!(decls[1].name, "font-size");
        assert_eq!(decls[1].value, "12px");
    }

    #[test]
    fn stylesheets_keep_selectors_and_skip_empty_rules() {
        let sheet = parse_stylesheet("div, #top { color: red } .x {} p { font-size: 10px }");
        assert_eq!(sheet.rules.len(), 2);
        assert_eq!(
            sheet.rules[0].selectors,
            vec![
                Selector::Type("div".into()),
                Selector::Id("top".into())
            ]
        );
        assert_eq!(sheet.rules[1].declarations[0].value, "10px");
    }

    #[test]
    fn style_blocks_accumulate_across_elements() {
        let first = parse_style_block(b"a { color: blue }", None).unwrap();
        let both = parse_style_block(b"p { color: red }", Some(first)).unwrap();
        assert_eq!(both.rules.len(), 2);
    }

    #[test]
    fn style_blocks_reject_invalid_utf8() {
        assert!(parse_style_block(b"a { color: \xff }", None).is_err());
    }
}
