//! The document scanner: a single pass over the input bytes.
//!
//! Invariants:
//! - The pass always completes; malformed input degrades to document flags,
//!   never to an error return.
//! - Each byte is classified exactly once by the current state; a handful
//!   of transitions re-examine the current byte, so cursor advancement is
//!   owned by the individual states.
//! - Rendered text is only appended through [`RenderedText`], and every
//!   append is credited to the active content tag so per-tag text ranges
//!   stay consistent with the buffer.

use log::trace;
use memchr::memmem;
use urls::{UrlId, UrlSet};

use crate::content::{DocumentFlags, Exception, HtmlContent};
use crate::emit::RenderedText;
use crate::special;
use crate::tags::{Tag, TagFlags};
use crate::tree::{self, NodeId};

mod states;
mod tagparse;

use states::State;
use tagparse::TagContentParser;

/// Everything the pass writes into besides the scanner's own registers.
pub(crate) struct Sinks<'a> {
    pub hc: &'a mut HtmlContent,
    pub url_set: &'a mut UrlSet,
    pub exceptions: Option<&'a mut Vec<Exception>>,
    pub part_urls: Option<&'a mut Vec<UrlId>>,
    pub allow_css: bool,
}

pub(crate) struct Scanner<'a> {
    input: &'a [u8],
    pos: usize,
    /// Start of the current uncommitted content run.
    run_start: usize,
    state: State,
    /// A `</` was seen for the token being read.
    closing: bool,
    /// The current run contains `&` and needs entity decoding on commit.
    need_decode: bool,
    /// A collapsed space is pending before the next visible byte.
    save_space: bool,
    obrace: u32,
    ebrace: u32,
    tag_parser: TagContentParser,
    cur_tag: Option<NodeId>,
    /// The open tag rendered text is currently credited to.
    content_tag: Option<NodeId>,
    /// Rendered-text offset where the pending `<a>`'s anchor text begins.
    href_offset: Option<usize>,
    /// URL of the pending `<a>`, awaiting its close.
    cur_url: Option<UrlId>,
    cur_level: NodeId,
    /// LIFO of styled blocks open for inheritance: (block index, pusher).
    styles: Vec<(usize, NodeId)>,
    out: RenderedText,
}

impl<'a> Scanner<'a> {
    pub fn new(input: &'a [u8], root: NodeId) -> Self {
        Self {
            input,
            pos: 0,
            run_start: 0,
            state: State::ParseStart,
            closing: false,
            need_decode: false,
            save_space: false,
            obrace: 0,
            ebrace: 0,
            tag_parser: TagContentParser::default(),
            cur_tag: None,
            content_tag: None,
            href_offset: None,
            cur_url: None,
            cur_level: root,
            styles: Vec::new(),
            out: RenderedText::with_capacity(input.len() / 3 * 2),
        }
    }

    /// Run the pass to completion and return the rendered text.
    pub fn run(mut self, sinks: &mut Sinks<'_>) -> Vec<u8> {
        while self.pos < self.input.len() {
            let t = self.input[self.pos];
            match self.state {
                State::ParseStart => self.step_parse_start(sinks, t),
                State::TagBegin => self.step_tag_begin(sinks, t),
                State::SgmlTag => self.step_sgml_tag(t),
                State::XmlTag => self.step_xml_tag(sinks, t),
                State::XmlTagEnd => self.step_xml_tag_end(sinks, t),
                State::CompoundTag => self.step_compound_tag(t),
                State::CommentTag => self.step_comment_tag(sinks, t),
                State::CommentContent => self.step_comment_content(t),
                State::SgmlContent => self.step_sgml_content(t),
                State::TagContent => self.step_tag_content(sinks, t),
                State::TagEnd => self.finish_tag(sinks),
                State::ContentWrite => self.step_content_write(sinks, t),
                State::ContentIgnoreSp => self.step_content_ignore_sp(t),
                State::ContentIgnore => self.step_content_ignore(t),
                State::ContentStyle => self.step_content_style(sinks),
            }
        }

        // Flush the trailing content run; input rarely ends with a tag.
        if self.state == State::ContentWrite {
            self.commit_run(sinks);
        }

        sinks.hc.tree.propagate_content_lengths();
        self.out.into_bytes()
    }

    fn step_parse_start(&mut self, sinks: &mut Sinks<'_>, t: u8) {
        if t == b'<' {
            self.state = State::TagBegin;
        } else {
            // no leading tag: treat the whole thing as content
            sinks.hc.flags |= DocumentFlags::BAD_START;
            self.state = State::ContentWrite;
        }
    }

    fn step_tag_begin(&mut self, sinks: &mut Sinks<'_>, t: u8) {
        match t {
            b'<' => {
                self.pos += 1;
                self.closing = false;
            }
            b'!' => {
                self.state = State::SgmlTag;
                self.pos += 1;
            }
            b'?' => {
                self.state = State::XmlTag;
                sinks.hc.flags |= DocumentFlags::XML;
                self.pos += 1;
            }
            b'/' => {
                self.closing = true;
                self.pos += 1;
            }
            b'>' => {
                // completely empty tag
                sinks.hc.flags |= DocumentFlags::BAD_ELEMENTS;
                self.state = State::TagEnd;
            }
            _ => {
                self.state = State::TagContent;
                self.tag_parser.reset();
                self.cur_tag = Some(sinks.hc.tree.alloc());
                // the byte is re-examined in TagContent
            }
        }
    }

    fn step_sgml_tag(&mut self, t: u8) {
        match t {
            b'[' => {
                self.state = State::CompoundTag;
                self.obrace = 1;
                self.ebrace = 0;
                self.pos += 1;
            }
            b'-' => {
                self.state = State::CommentTag;
                self.pos += 1;
            }
            _ => self.state = State::SgmlContent,
        }
    }

    fn step_xml_tag(&mut self, sinks: &mut Sinks<'_>, t: u8) {
        if t == b'?' {
            self.state = State::XmlTagEnd;
        } else if t == b'>' {
            // malformed processing instruction
            sinks.hc.flags |= DocumentFlags::BAD_ELEMENTS;
            self.state = State::TagEnd;
            return;
        }
        // xml instructions carry nothing we want
        self.pos += 1;
    }

    fn step_xml_tag_end(&mut self, sinks: &mut Sinks<'_>, t: u8) {
        if t == b'>' {
            self.state = State::TagEnd;
        } else {
            sinks.hc.flags |= DocumentFlags::BAD_ELEMENTS;
            self.pos += 1;
        }
    }

    fn step_compound_tag(&mut self, t: u8) {
        if t == b'[' {
            self.obrace += 1;
        } else if t == b']' {
            self.ebrace += 1;
        } else if t == b'>' && self.obrace == self.ebrace {
            self.state = State::TagEnd;
            return;
        }
        self.pos += 1;
    }

    fn step_comment_tag(&mut self, sinks: &mut Sinks<'_>, t: u8) {
        if t != b'-' {
            sinks.hc.flags |= DocumentFlags::BAD_ELEMENTS;
            self.state = State::TagEnd;
            return;
        }
        self.pos += 1;
        self.ebrace = 0;
        // A comment must not begin with `>` or `->`.
        match self.input.get(self.pos) {
            Some(b'-') if self.input.get(self.pos + 1) == Some(&b'>') => {
                sinks.hc.flags |= DocumentFlags::BAD_ELEMENTS;
                self.pos += 1;
                self.state = State::TagEnd;
            }
            Some(b'>') => {
                sinks.hc.flags |= DocumentFlags::BAD_ELEMENTS;
                self.state = State::TagEnd;
            }
            _ => self.state = State::CommentContent,
        }
    }

    fn step_comment_content(&mut self, t: u8) {
        if t == b'-' {
            self.ebrace += 1;
        } else if t == b'>' && self.ebrace >= 2 {
            self.state = State::TagEnd;
            return;
        } else {
            self.ebrace = 0;
        }
        self.pos += 1;
    }

    fn step_sgml_content(&mut self, t: u8) {
        if t == b'>' {
            // doctypes and friends carry nothing we want either
            self.state = State::TagEnd;
            self.cur_tag = None;
            return;
        }
        self.pos += 1;
    }

    fn step_tag_content(&mut self, sinks: &mut Sinks<'_>, t: u8) {
        if let Some(node) = self.cur_tag {
            self.tag_parser.step(self.input, self.pos, sinks.hc, node);
            if t == b'>' {
                if self.closing {
                    if sinks.hc.tree.node(node).flags.contains(TagFlags::CLOSED) {
                        // both `</x` and `x/>` on one token
                        sinks.hc.flags |= DocumentFlags::BAD_ELEMENTS;
                    }
                    sinks.hc.tree.node_mut(node).flags |= TagFlags::CLOSING;
                    self.closing = false;
                }
                self.state = State::TagEnd;
                return;
            }
        }
        self.pos += 1;
    }

    fn step_content_write(&mut self, sinks: &mut Sinks<'_>, t: u8) {
        if t == b'<' {
            self.commit_run(sinks);
            self.content_tag = None;
            self.state = State::TagBegin;
            return;
        }

        if t == b'&' {
            self.need_decode = true;
        } else if t.is_ascii_whitespace() {
            self.save_space = true;
            self.commit_run(sinks);
            self.run_start = self.pos;
            self.state = State::ContentIgnoreSp;
        } else if self.save_space {
            // a visible byte after collapsed whitespace: emit one space
            if self.out.push_collapsed_space() {
                self.credit_separator(sinks, 1);
            }
            self.save_space = false;
        }

        self.pos += 1;
    }

    fn step_content_ignore_sp(&mut self, t: u8) {
        if !t.is_ascii_whitespace() {
            self.run_start = self.pos;
            self.state = State::ContentWrite;
            return;
        }
        self.pos += 1;
    }

    fn step_content_ignore(&mut self, t: u8) {
        if t == b'<' {
            self.state = State::TagBegin;
            return;
        }
        self.pos += 1;
    }

    fn step_content_style(&mut self, sinks: &mut Sinks<'_>) {
        // Find `</s…` (case-insensitive on the letter) and hand everything
        // before it to the stylesheet parser.
        let rest = &self.input[self.pos..];
        let close = memmem::find(rest, b"</").filter(|&at| {
            rest.get(at + 2)
                .is_some_and(|b| b.eq_ignore_ascii_case(&b's'))
        });

        match close {
            None => self.state = State::ContentIgnore,
            Some(at) => {
                if sinks.allow_css {
                    match css::parse_style_block(&rest[..at], sinks.hc.css_style.take()) {
                        Ok(sheet) => sinks.hc.css_style = Some(sheet),
                        Err(err) => {
                            log::info!(target: "html.scan", "cannot parse css: {err}");
                        }
                    }
                }
                self.pos += at;
                self.state = State::TagBegin;
            }
        }
    }

    /// Commit the bytes of `[run_start, pos)` to the rendered text,
    /// entity-decoding in place when the run contained `&`.
    fn commit_run(&mut self, sinks: &mut Sinks<'_>) {
        if self.pos > self.run_start {
            let run = &self.input[self.run_start..self.pos];
            let (offset, emitted) = self.out.commit_run(run, self.need_decode);
            if emitted > 0
                && let Some(ct) = self.content_tag
            {
                let node = sinks.hc.tree.node_mut(ct);
                if node.content_length == 0 {
                    node.content_offset = offset;
                }
                node.content_length += emitted;
            }
        }
    }

    /// Credit a collapsed space or line break to the active content tag.
    /// A separator at the very start of a tag's contribution moves the
    /// offset instead of counting toward the length.
    fn credit_separator(&mut self, sinks: &mut Sinks<'_>, added: usize) {
        if let Some(ct) = self.content_tag {
            let node = sinks.hc.tree.node_mut(ct);
            if node.content_length == 0 {
                node.content_offset = self.out.len();
            } else {
                node.content_length += added;
            }
        }
    }

    /// Commit the finished token: run the tree builder, then the per-tag
    /// specializations, then pick the next content mode.
    fn finish_tag(&mut self, sinks: &mut Sinks<'_>) {
        self.tag_parser.reset();

        let Some(node) = self.cur_tag.take() else {
            // sgml/comment/xml terminations land here with no token
            self.state = State::ContentWrite;
            self.pos += 1;
            self.run_start = self.pos;
            return;
        };

        let outcome = tree::commit_tag(sinks.hc, node, &mut self.cur_level);
        let (id, flags) = {
            let tag = sinks.hc.tree.node(node);
            (tag.id, tag.flags)
        };
        trace!(
            target: "html.scan",
            "committed tag id={} flags={:?} emit={} balanced={}",
            id,
            flags,
            outcome.emit_content,
            outcome.balanced
        );

        if outcome.emit_content {
            self.state = State::ContentWrite;
            self.need_decode = false;
        } else if id == Tag::Style.id() {
            self.state = State::ContentStyle;
        } else {
            self.state = State::ContentIgnore;
        }

        if id >= 0 {
            // Close tokens record the sighting but a duplicate is only a
            // second *open* of a once-per-document tag.
            if flags.contains(TagFlags::UNIQUE)
                && !flags.contains(TagFlags::CLOSING)
                && sinks.hc.tags_seen.contains(id)
            {
                sinks.hc.flags |= DocumentFlags::DUPLICATE_ELEMENTS;
            }
            sinks.hc.tags_seen.set(id);
        }

        if !flags.intersects(TagFlags::CLOSED | TagFlags::CLOSING) {
            self.content_tag = Some(node);
        }

        // Visible line structure.
        if [Tag::Br, Tag::Hr, Tag::P, Tag::Tr, Tag::Div]
            .iter()
            .any(|&t| id == t.id())
        {
            if self.out.push_line_break() {
                self.credit_separator(sinks, 2);
            }
            self.save_space = false;
        }

        if flags.contains(TagFlags::HREF) {
            self.process_href_tag(sinks, node, id, flags, &outcome);
        } else if id == Tag::Base.id()
            && !flags.contains(TagFlags::CLOSING)
            && sinks.hc.base_url.is_none()
        {
            // <base> is honored wherever it occurs, head or not
            if let Some(url) = special::process_url_tag(sinks.hc, node) {
                trace!(target: "html.scan", "got valid base url: {url}");
                sinks.hc.base_url = Some(url);
                sinks.hc.tree.node_mut(node).flags |= TagFlags::HREF;
            }
        }

        if id == Tag::Img.id() && !flags.contains(TagFlags::CLOSING) {
            special::process_img_tag(
                sinks.hc,
                sinks.url_set,
                &mut sinks.part_urls,
                node,
                Some(&mut self.out),
            );
        } else if id == Tag::Link.id() && !flags.contains(TagFlags::CLOSING) {
            special::process_link_tag(sinks.hc, sinks.url_set, &mut sinks.part_urls, node);
        } else if flags.contains(TagFlags::BLOCK) {
            self.process_block(sinks, node, id, flags, &outcome);
        }

        self.pos += 1;
        self.run_start = self.pos;
        self.cur_tag = None;
    }

    fn process_href_tag(
        &mut self,
        sinks: &mut Sinks<'_>,
        node: NodeId,
        id: i32,
        flags: TagFlags,
        outcome: &tree::CommitOutcome,
    ) {
        // <a>…<a>: the reopened anchor closes the previous one, so its text
        // is judged now, against the offset saved when *it* opened and
        // before the new anchor claims the scalar.
        if id == Tag::A.id()
            && !outcome.balanced
            && let Some(prev) = sinks.hc.tree.prev_sibling(self.cur_level)
        {
            let prev_tag = sinks.hc.tree.node(prev);
            if prev_tag.id == Tag::A.id()
                && !prev_tag.flags.contains(TagFlags::CLOSING)
                && let crate::tree::Extra::Url(prev_url) = prev_tag.extra
                && let Some(offset) = self.href_offset
            {
                special::check_displayed_url(
                    sinks.url_set,
                    sinks.exceptions.as_deref_mut(),
                    self.out.as_slice(),
                    offset,
                    prev_url,
                );
            }
        }

        if !flags.contains(TagFlags::CLOSING) {
            if let Some(url) = special::process_url_tag(sinks.hc, node) {
                let (url_id, inserted) = sinks.url_set.add_or_return(url);
                if inserted {
                    special::process_query_urls(sinks.url_set, &mut sinks.part_urls, url_id);
                } else {
                    sinks.url_set.get_mut(url_id).count += 1;
                }
                sinks.hc.tree.node_mut(node).extra = crate::tree::Extra::Url(url_id);
                self.cur_url = Some(url_id);
                self.href_offset = Some(self.out.len());
            }
        }

        if id == Tag::A.id() && flags.contains(TagFlags::CLOSING) {
            if let (Some(url_id), Some(offset)) = (self.cur_url, self.href_offset)
                && self.out.len() > offset
            {
                special::check_displayed_url(
                    sinks.url_set,
                    sinks.exceptions.as_deref_mut(),
                    self.out.as_slice(),
                    offset,
                    url_id,
                );
            }
            self.href_offset = None;
            self.cur_url = None;
        }
    }

    fn process_block(
        &mut self,
        sinks: &mut Sinks<'_>,
        node: NodeId,
        _id: i32,
        flags: TagFlags,
        outcome: &tree::CommitOutcome,
    ) {
        if flags.contains(TagFlags::CLOSING) {
            // Pop only the entry this close actually matches; stray closes
            // leave the stack alone.
            let top_matches = self
                .styles
                .last()
                .is_some_and(|&(_, pusher)| match outcome.matched_close {
                    Some(matched) => pusher == matched,
                    None => sinks.hc.tree.node(pusher).id == sinks.hc.tree.node(node).id,
                });
            if top_matches {
                self.styles.pop();
            }
            return;
        }

        let block_idx = special::process_block_tag(sinks.hc, node);
        special::propagate_style(sinks.hc, block_idx, node, &mut self.styles);

        let bl = &mut sinks.hc.blocks[block_idx];
        if bl.font_size.unwrap_or(css::DEFAULT_FONT_SIZE) < 3 || bl.font_color.alpha < 10 {
            trace!(
                target: "html.scan",
                "tag is not visible: font size {:?}, alpha {}",
                bl.font_size,
                bl.font_color.alpha
            );
            bl.visible = false;
        }

        if !bl.visible {
            self.state = State::ContentIgnore;
        }
    }
}
