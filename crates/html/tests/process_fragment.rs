//! End-to-end acceptance tests for the full processing pass.

use html::{
    DocumentFlags, Exception, HtmlContent, ImageFlags, Tag, TagFlags, process_fragment,
    process_fragment_full,
};
use urls::{UrlFlags, UrlId, UrlSet};

/// Run the full variant with every sink attached.
fn process_all(input: &[u8]) -> (HtmlContent, Vec<Exception>, UrlSet, Vec<UrlId>) {
    let mut hc = HtmlContent::new();
    let mut exceptions = Vec::new();
    let mut set = UrlSet::new();
    let mut part_urls = Vec::new();
    process_fragment_full(
        input,
        &mut hc,
        Some(&mut exceptions),
        Some(&mut set),
        Some(&mut part_urls),
        true,
    );
    (hc, exceptions, set, part_urls)
}

#[test]
fn plain_document_renders_with_entities_decoded() {
    let hc = process_fragment(b"<html><body>Hello&nbsp;World</body></html>");
    assert_eq!(hc.parsed, "Hello\u{00A0}World".as_bytes());
    assert!(hc.tag_seen("html"));
    assert!(hc.tag_seen("body"));
    assert_eq!(hc.flags, DocumentFlags::empty());
}

#[test]
fn displayed_url_mismatch_is_flagged_with_an_exception() {
    let (_hc, exceptions, set, _parts) =
        process_all(b"<a href=\"http://evil.com\">paypal.com</a>");

    assert_eq!(set.len(), 1);
    let (_, url) = set.iter().next().unwrap();
    assert_eq!(url.host, "evil.com");
    assert!(url.flags.contains(UrlFlags::DISPLAY_URL));
    assert_eq!(url.visible_part.as_deref(), Some("paypal.com"));

    assert_eq!(exceptions.len(), 1);
    let ex = &exceptions[0];
    assert_eq!(ex.pos, 0);
    assert_eq!(ex.len, "paypal.com".len());
    assert_eq!(ex.url.host, "evil.com");
}

#[test]
fn matching_anchor_text_is_not_flagged() {
    let (_hc, exceptions, set, _parts) =
        process_all(b"<a href=\"http://example.com/x\">example.com</a>");
    let (_, url) = set.iter().next().unwrap();
    assert!(!url.flags.contains(UrlFlags::DISPLAY_URL));
    assert!(exceptions.is_empty());
}

#[test]
fn repeated_paragraph_opens_are_unbalanced() {
    let hc = process_fragment(b"<p>A<p>B<p>C");
    assert!(hc.flags.contains(DocumentFlags::UNBALANCED));
    assert_eq!(hc.parsed, b"A\r\nB\r\nC");
}

#[test]
fn data_image_sets_flags_even_when_unrecognizable() {
    let (hc, _ex, set, _parts) =
        process_all(b"<img src=\"data:image/png;base64,iVBORw0KGgo=\">");
    assert!(hc.flags.contains(DocumentFlags::HAS_DATA_URLS));
    assert_eq!(hc.images.len(), 1);
    let img = &hc.images[0];
    assert!(img.flags.contains(ImageFlags::EMBEDDED | ImageFlags::DATA));
    // truncated payload: the sniffer cannot recognize it
    assert!(img.embedded_image.is_none());
    assert!(set.is_empty());
}

#[test]
fn display_none_blocks_suppress_their_text() {
    let hc = process_fragment(b"<div style=\"display:none\">secret</div>visible");
    assert_eq!(hc.parsed, b"visible");
    assert_eq!(hc.blocks.len(), 1);
    assert!(!hc.blocks[0].visible);
}

#[test]
fn comments_hide_markup_and_urls() {
    let (hc, _ex, set, _parts) = process_all(b"<!--<a href=x>--><b>t</b>");
    assert_eq!(hc.parsed, b"t");
    assert!(hc.tag_seen("b"));
    assert!(set.is_empty());
    assert!(!hc.tag_seen("a"));
}

#[test]
fn tag_flood_degrades_to_a_flag() {
    let mut input = Vec::new();
    for _ in 0..10_000 {
        input.extend_from_slice(b"<x>");
    }
    let hc = process_fragment(&input);
    assert!(hc.flags.contains(DocumentFlags::TOO_MANY_TAGS));
    assert!(hc.flags.contains(DocumentFlags::UNKNOWN_ELEMENTS));
}

#[test]
fn known_tag_flood_caps_the_tree() {
    let mut input = Vec::new();
    for _ in 0..10_000 {
        input.extend_from_slice(b"<div>x</div>");
    }
    let hc = process_fragment(&input);
    assert!(hc.flags.contains(DocumentFlags::TOO_MANY_TAGS));
    assert!(hc.tree.admitted() as u32 <= html::MAX_TAGS);
}

#[test]
fn bad_start_flag_for_leading_text() {
    let hc = process_fragment(b"no markup here at all");
    assert!(hc.flags.contains(DocumentFlags::BAD_START));
    assert_eq!(hc.parsed, b"no markup here at all");
}

#[test]
fn whitespace_runs_collapse_to_single_spaces() {
    let hc = process_fragment(b"<div>a   b\n\t c</div>");
    assert_eq!(hc.parsed, b"a b c\r\n");
    // invariant: no two adjacent spaces anywhere
    assert!(!hc.parsed.windows(2).any(|w| w == b"  "));
}

#[test]
fn line_breaks_insert_crlf_without_duplicates() {
    let hc = process_fragment(b"<div>a</div><br><br>b");
    // the <br> right after </div>'s break must not double up
    assert_eq!(hc.parsed, b"a\r\nb");
}

#[test]
fn xml_prologue_and_doctype_are_skipped() {
    let hc = process_fragment(b"<?xml version=\"1.0\"?><!DOCTYPE html><div>x</div>");
    assert!(hc.flags.contains(DocumentFlags::XML));
    assert_eq!(hc.parsed, b"x\r\n");
}

#[test]
fn cdata_sections_are_skipped_with_bracket_balance() {
    let hc = process_fragment(b"<![CDATA[ <b>not text</b> ]]><div>y</div>");
    assert_eq!(hc.parsed, b"y\r\n");
    assert!(!hc.tag_seen("b"));
}

#[test]
fn head_content_is_not_rendered() {
    let hc = process_fragment(
        b"<html><head><title>Subject bait</title></head><body>real</body></html>",
    );
    assert_eq!(hc.parsed, b"real");
    assert!(hc.tag_seen("title"));
}

#[test]
fn duplicate_unique_tags_are_reported() {
    let hc = process_fragment(b"<html><body>a</body><body>b</body></html>");
    assert!(hc.flags.contains(DocumentFlags::DUPLICATE_ELEMENTS));
}

#[test]
fn base_href_resolves_relative_links() {
    let (_hc, _ex, set, _parts) = process_all(
        b"<base href=\"http://base.example/dir/\"><a href=\"page.html\">go</a>",
    );
    assert_eq!(set.len(), 1);
    let (_, url) = set.iter().next().unwrap();
    assert_eq!(url.host, "base.example");
    assert!(url.url.contains("page.html"));
}

#[test]
fn only_the_first_base_counts() {
    let (hc, _ex, _set, _parts) = process_all(
        b"<base href=\"http://first.example/\"><base href=\"http://second.example/\">x",
    );
    assert_eq!(hc.base_url.as_ref().unwrap().host, "first.example");
}

#[test]
fn schemeless_href_gets_http_and_the_flag() {
    let (_hc, _ex, set, parts) = process_all(b"<a href=\"example.com/login\">x</a>");
    assert_eq!(parts.len(), 1);
    let url = set.get(parts[0]);
    assert_eq!(url.host, "example.com");
    assert!(url.flags.contains(UrlFlags::SCHEMELESS));
}

#[test]
fn query_urls_are_hoisted() {
    let (_hc, _ex, set, parts) = process_all(
        b"<a href=\"http://redir.example/?to=http://paypal.com/login\">click</a>",
    );
    assert_eq!(set.len(), 2);
    assert_eq!(parts.len(), 2);
    let hoisted = set.iter().find(|(_, u)| u.host == "paypal.com").unwrap().1;
    assert!(hoisted.flags.contains(UrlFlags::QUERY));
}

#[test]
fn img_alt_text_renders_padded() {
    let hc = process_fragment(b"<div>see<img src=\"cid:x\" alt=\"the logo\">now</div>");
    assert_eq!(hc.parsed, b"see the logo now\r\n");
}

#[test]
fn tiny_fonts_hide_text() {
    let hc = process_fragment(b"<span style=\"font-size:2px\">hidden</span>shown");
    assert_eq!(hc.parsed, b"shown");
    assert!(!hc.blocks[0].visible);
}

#[test]
fn low_opacity_hides_text() {
    let hc = process_fragment(b"<div style=\"opacity:0.01\">hidden</div>shown");
    assert_eq!(hc.parsed, b"shown");
    assert!(!hc.blocks[0].visible);
}

#[test]
fn style_blocks_feed_the_css_accumulator() {
    let mut hc = HtmlContent::new();
    process_fragment_full(
        b"<style>div { color: red } p { color: blue }</style><div>v</div>",
        &mut hc,
        None,
        None,
        None,
        true,
    );
    assert_eq!(hc.css_style.as_ref().map(|s| s.rules.len()), Some(2));
    assert_eq!(hc.parsed, b"v\r\n");
}

#[test]
fn css_is_skipped_when_not_allowed() {
    let hc = process_fragment(b"<style>div { color: red }</style><div>v</div>");
    assert!(hc.css_style.is_none());
    assert_eq!(hc.parsed, b"v\r\n");
}

#[test]
fn anchor_content_ranges_cover_the_anchor_text() {
    let hc = process_fragment(b"<div>intro <a href=\"http://e.example\">link text</a> outro</div>");
    // find the <a> node and check its recorded range against the buffer
    let tree = &hc.tree;
    let mut found = false;
    let mut stack = vec![tree.root()];
    while let Some(id) = stack.pop() {
        stack.extend(tree.children(id));
        let node = tree.node(id);
        if node.id == Tag::A.id() && !node.flags.contains(TagFlags::CLOSING) {
            let range = &hc.parsed[node.content_offset..node.content_offset + node.content_length];
            assert_eq!(range, b"link text");
            found = true;
        }
    }
    assert!(found, "anchor node missing from the tree");
}

#[test]
fn parent_ranges_cover_child_contributions() {
    let hc = process_fragment(b"<div>a<span>bb</span>ccc</div>");
    let tree = &hc.tree;
    let mut stack = vec![tree.root()];
    while let Some(id) = stack.pop() {
        let child_sum: usize = tree
            .children(id)
            .map(|c| tree.node(c).content_length)
            .sum();
        if !tree.is_root(id) {
            assert!(tree.node(id).content_length >= child_sum);
        }
        stack.extend(tree.children(id));
    }
}

#[test]
fn attributed_text_never_exceeds_the_buffer() {
    let input = b"<div>a<span>bb</span>ccc</div><p>tail";
    let hc = process_fragment(input);
    let tree = &hc.tree;
    let root_total: usize = tree
        .children(tree.root())
        .map(|c| tree.node(c).content_length)
        .sum();
    // text emitted after a close tag escapes attribution, so the root sum
    // bounds from below what the buffer holds
    assert!(root_total <= hc.parsed.len());
}

#[test]
fn broken_markup_never_panics_and_flags_bad_elements() {
    let cases: &[&[u8]] = &[
        b"<>",
        b"<@nope>",
        b"< div",
        b"<a href=>x</a>",
        b"<a href",
        b"<!-->",
        b"<!--->",
        b"<!--- ->",
        b"<?>",
        b"<?",
        b"<![",
        b"<div style=>x",
        b"<a href='unterminated>t",
        b"</nothing>",
        b"<a href=\"x\"\"y\">t</a>",
    ];
    for case in cases {
        let hc = process_fragment(case);
        let _ = hc.parsed;
    }
    let hc = process_fragment(b"<>");
    assert!(hc.flags.contains(DocumentFlags::BAD_ELEMENTS));
}

#[test]
fn stray_close_is_unbalanced_but_text_flows() {
    let hc = process_fragment(b"<div>a</p>b</div>");
    assert!(hc.flags.contains(DocumentFlags::UNBALANCED));
    assert_eq!(hc.parsed, b"a\r\nb\r\n");
}

#[test]
fn anchor_reopen_checks_the_first_anchors_text() {
    // the reopening <a> carries its own valid href; the first anchor's
    // text must still be judged against the offset saved when it opened
    let (hc, exceptions, set, _parts) = process_all(
        b"<a href=\"http://evil.com\">paypal.com<a href=\"http://evil.com/2\">more</a>",
    );
    assert!(hc.flags.contains(DocumentFlags::UNBALANCED));
    let evil = set.iter().find(|(_, u)| u.host == "evil.com").unwrap().1;
    assert!(evil.flags.contains(UrlFlags::DISPLAY_URL));
    assert_eq!(evil.visible_part.as_deref(), Some("paypal.com"));
    assert_eq!(exceptions.len(), 1);
    assert_eq!(exceptions[0].pos, 0);
    assert_eq!(exceptions[0].len, "paypal.com".len());
}

#[test]
fn empty_input_yields_empty_output() {
    let hc = process_fragment(b"");
    assert!(hc.parsed.is_empty());
    assert_eq!(hc.flags, DocumentFlags::empty());
}

#[test]
fn exceptions_arrive_in_reverse_document_order() {
    let (_hc, exceptions, _set, _parts) = process_all(
        b"<a href=\"http://one.example\">first.com</a> <a href=\"http://two.example\">second.com</a>",
    );
    assert_eq!(exceptions.len(), 2);
    assert!(exceptions[0].pos > exceptions[1].pos);
}
