//! Tag-content sub-machine: name and attributes inside `<…>`.
//!
//! Driven one byte at a time by the document scanner while it is in tag
//! content. Recovery philosophy: names and values are taken on a
//! best-effort basis, unknown attributes are parsed and dropped, and a tag
//! broken beyond repair is absorbed until the outer scanner sees `>`.

use crate::content::{DocumentFlags, HtmlContent};
use crate::entities::decode_entities_inplace;
use crate::tags::{self, TagFlags};
use crate::tree::{ComponentKind, NodeId};

/// `g_ascii_isgraph` equivalent: printable ASCII, space excluded. Bytes
/// with the high bit set are deliberately not graphic here.
fn is_ascii_graph(b: u8) -> bool {
    (0x21..=0x7E).contains(&b)
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
enum State {
    #[default]
    ParseStart,
    ParseName,
    ParseAttrName,
    ParseEqual,
    ParseStartDquote,
    ParseDqvalue,
    ParseEndDquote,
    ParseStartSquote,
    ParseSqvalue,
    ParseEndSquote,
    ParseValue,
    SpacesAfterName,
    SpacesBeforeEq,
    SpacesAfterEq,
    SpacesAfterParam,
    IgnoreBadTag,
}

/// Scratch state carried across the bytes of one tag token.
#[derive(Debug, Default)]
pub(crate) struct TagContentParser {
    state: State,
    /// Start of the token (attribute name or value) being collected.
    saved: Option<usize>,
    /// Component kind of the attribute whose value is being collected.
    component: Option<ComponentKind>,
    /// Start of the tag name.
    name_start: Option<usize>,
}

impl TagContentParser {
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Feed one byte at `pos`. The outer scanner still owns `>` handling;
    /// this machine never consumes input itself.
    pub fn step(&mut self, input: &[u8], pos: usize, hc: &mut HtmlContent, node: NodeId) {
        let b = input[pos];
        match self.state {
            State::ParseStart => {
                if !b.is_ascii_alphabetic() && !b.is_ascii_whitespace() {
                    hc.flags |= DocumentFlags::BAD_ELEMENTS;
                    let tag = hc.tree.node_mut(node);
                    tag.id = -1;
                    tag.flags |= TagFlags::BROKEN;
                    self.state = State::IgnoreBadTag;
                } else if b.is_ascii_alphabetic() {
                    self.name_start = Some(pos);
                    self.state = State::ParseName;
                }
            }

            State::ParseName => {
                if b.is_ascii_whitespace() || b == b'>' || b == b'/' {
                    if b == b'/' {
                        hc.tree.node_mut(node).flags |= TagFlags::CLOSED;
                    }
                    let start = self.name_start.unwrap_or(pos);
                    self.finish_name(&input[start..pos], hc, node);
                }
            }

            State::ParseAttrName => {
                let Some(saved) = self.saved else {
                    self.state = State::IgnoreBadTag;
                    return;
                };
                let mut attr_name_end = pos;

                if b == b'=' {
                    self.state = State::ParseEqual;
                } else if b == b'"' {
                    // No '=' but a quote: take the alphanumeric tail as the
                    // attribute name and read a quoted value.
                    self.state = State::ParseStartDquote;
                    attr_name_end = alnum_tail_end(input, saved, pos);
                } else if b.is_ascii_whitespace() {
                    self.state = State::SpacesBeforeEq;
                } else if b == b'/' {
                    hc.tree.node_mut(node).flags |= TagFlags::CLOSED;
                } else if !is_ascii_graph(b) {
                    self.state = State::ParseValue;
                    attr_name_end = alnum_tail_end(input, saved, pos);
                } else {
                    // still collecting name bytes
                    return;
                }

                self.component = resolve_component(&input[saved..attr_name_end]);
                if self.component.is_none() {
                    // unknown attributes are parsed but never stored
                    self.saved = None;
                } else if self.state == State::ParseValue {
                    self.saved = Some(pos + 1);
                }
            }

            State::SpacesAfterName => {
                if !b.is_ascii_whitespace() {
                    self.saved = Some(pos);
                    if b == b'/' {
                        hc.tree.node_mut(node).flags |= TagFlags::CLOSED;
                    } else if b != b'>' {
                        self.state = State::ParseAttrName;
                    }
                }
            }

            State::SpacesBeforeEq => {
                if b == b'=' {
                    self.state = State::ParseEqual;
                } else if !b.is_ascii_whitespace() {
                    if b == b'>' {
                        // attribute name followed by tag end: a legal empty
                        // attribute, the outer scanner takes it from here
                    } else if b == b'"' || b == b'\'' {
                        hc.flags |= DocumentFlags::BAD_ELEMENTS;
                        hc.tree.node_mut(node).flags |= TagFlags::BROKEN;
                        self.state = State::IgnoreBadTag;
                    } else {
                        // valueless attribute, then the next one starts here
                        self.state = State::ParseAttrName;
                        self.saved = Some(pos);
                    }
                }
            }

            State::SpacesAfterEq => {
                if b == b'"' {
                    self.state = State::ParseStartDquote;
                } else if b == b'\'' {
                    self.state = State::ParseStartSquote;
                } else if !b.is_ascii_whitespace() {
                    if self.saved.is_some() {
                        self.saved = Some(pos);
                    }
                    self.state = State::ParseValue;
                }
            }

            State::ParseEqual => {
                if b.is_ascii_whitespace() {
                    self.state = State::SpacesAfterEq;
                } else if b == b'"' {
                    self.state = State::ParseStartDquote;
                } else if b == b'\'' {
                    self.state = State::ParseStartSquote;
                } else {
                    if self.saved.is_some() {
                        self.saved = Some(pos);
                    }
                    self.state = State::ParseValue;
                }
            }

            State::ParseStartDquote => {
                if b == b'"' {
                    self.store_empty_component(hc, node);
                    self.state = State::SpacesAfterParam;
                } else {
                    if self.saved.is_some() {
                        self.saved = Some(pos);
                    }
                    self.state = State::ParseDqvalue;
                }
            }

            State::ParseStartSquote => {
                if b == b'\'' {
                    self.store_empty_component(hc, node);
                    self.state = State::SpacesAfterParam;
                } else {
                    if self.saved.is_some() {
                        self.saved = Some(pos);
                    }
                    self.state = State::ParseSqvalue;
                }
            }

            State::ParseDqvalue => {
                if b == b'"' {
                    self.store_component(input, pos, hc, node);
                    self.state = State::ParseEndDquote;
                }
            }

            State::ParseSqvalue => {
                if b == b'\'' {
                    self.store_component(input, pos, hc, node);
                    self.state = State::ParseEndSquote;
                }
            }

            State::ParseValue => {
                if b == b'/' && input.get(pos + 1) == Some(&b'>') {
                    hc.tree.node_mut(node).flags |= TagFlags::CLOSED;
                    self.store_component(input, pos, hc, node);
                } else if b.is_ascii_whitespace() || b == b'>' || b == b'"' {
                    self.store_component(input, pos, hc, node);
                    self.state = State::SpacesAfterParam;
                }
            }

            State::ParseEndDquote | State::ParseEndSquote => {
                if b.is_ascii_whitespace() {
                    self.state = State::SpacesAfterParam;
                } else if b == b'/' && input.get(pos + 1) == Some(&b'>') {
                    hc.tree.node_mut(node).flags |= TagFlags::CLOSED;
                } else {
                    // no separating space; next attribute starts right here
                    self.state = State::ParseAttrName;
                    self.saved = Some(pos);
                }
            }

            State::SpacesAfterParam => {
                if !b.is_ascii_whitespace() {
                    if b == b'/' && input.get(pos + 1) == Some(&b'>') {
                        hc.tree.node_mut(node).flags |= TagFlags::CLOSED;
                    }
                    self.state = State::ParseAttrName;
                    self.saved = Some(pos);
                }
            }

            State::IgnoreBadTag => {}
        }
    }

    /// Terminate the tag name: decode, lowercase, and look it up.
    fn finish_name(&mut self, raw: &[u8], hc: &mut HtmlContent, node: NodeId) {
        if raw.is_empty() {
            hc.flags |= DocumentFlags::BAD_ELEMENTS;
            let tag = hc.tree.node_mut(node);
            tag.id = -1;
            tag.flags |= TagFlags::BROKEN;
            self.state = State::IgnoreBadTag;
            return;
        }

        let mut buf = raw.to_vec();
        let n = decode_entities_inplace(&mut buf);
        buf.truncate(n);
        let lowered = String::from_utf8_lossy(&buf).to_lowercase();
        let name = lowered.into_bytes();

        match tags::by_name(&name) {
            Some((id, static_flags)) => {
                let tag = hc.tree.node_mut(node);
                tag.id = id;
                // Static flags are OR-ed in so an already-seen self-close
                // marker survives the lookup.
                tag.flags |= static_flags;
            }
            None => {
                hc.flags |= DocumentFlags::UNKNOWN_ELEMENTS;
                hc.tree.node_mut(node).id = -1;
            }
        }
        hc.tree.node_mut(node).name = name;
        self.state = State::SpacesAfterName;
    }

    /// An empty quoted value (`href=""`) is kept as an empty entry so the
    /// attribute still counts as present.
    fn store_empty_component(&mut self, hc: &mut HtmlContent, node: NodeId) {
        if let Some(kind) = self.component {
            hc.tree.node_mut(node).params.insert_first_wins(kind, Vec::new());
        }
        self.saved = None;
        self.component = None;
    }

    /// Store the collected value for the current component, first value
    /// wins. Clears the scratch either way.
    fn store_component(&mut self, input: &[u8], pos: usize, hc: &mut HtmlContent, node: NodeId) {
        if let (Some(saved), Some(kind)) = (self.saved, self.component)
            && pos > saved
        {
            let mut value = input[saved..pos].to_vec();
            let n = decode_entities_inplace(&mut value);
            value.truncate(n);
            hc.tree.node_mut(node).params.insert_first_wins(kind, value);
        }
        self.saved = None;
        self.component = None;
    }
}

/// Walk back from `pos - 1` to the last alphanumeric byte of the attribute
/// name; returns one past it.
fn alnum_tail_end(input: &[u8], saved: usize, pos: usize) -> usize {
    let mut end = pos.saturating_sub(1);
    while end > saved && !input[end].is_ascii_alphanumeric() {
        end -= 1;
    }
    end + 1
}

/// Decode and case-fold an attribute name, then resolve it.
fn resolve_component(raw: &[u8]) -> Option<ComponentKind> {
    if raw.is_empty() {
        return None;
    }
    let mut buf = raw.to_vec();
    let n = decode_entities_inplace(&mut buf);
    buf.truncate(n);
    buf.make_ascii_lowercase();
    ComponentKind::from_name(&buf)
}
