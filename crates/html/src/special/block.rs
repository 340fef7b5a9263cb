//! Style blocks: per-tag color, size and visibility state.
//!
//! Every `BLOCK`-flagged tag yields a block descriptor. Attributes are
//! applied first (`color=`, `bgcolor=`, `size=`, `class=`), then the
//! `style="…"` declarations on top; inheritance from enclosing blocks is
//! resolved afterwards through a LIFO of still-open styled blocks.

use log::debug;

use crate::content::{Block, HtmlContent};
use crate::tags::{Tag, TagFlags};
use crate::tree::{ComponentKind, Extra, NodeId};

/// Build the block descriptor for a `BLOCK` tag and run its attributes and
/// inline style. Returns the index into `HtmlContent::blocks`.
pub(crate) fn process_block_tag(hc: &mut HtmlContent, node: NodeId) -> usize {
    let mut bl = Block {
        tag: node,
        font_color: css::Color {
            alpha: 255,
            ..css::Color::default()
        },
        background_color: css::Color::default(),
        font_size: None,
        visible: true,
        html_class: None,
        style: None,
    };

    let params = hc.tree.node(node).params.clone();
    for (kind, value) in params.iter() {
        if value.is_empty() {
            continue;
        }
        let text = String::from_utf8_lossy(value);
        match kind {
            ComponentKind::Color => {
                if let Some(color) = css::parse_color(&text) {
                    bl.font_color = color;
                }
            }
            ComponentKind::Bgcolor => {
                if let Some(color) = css::parse_color(&text) {
                    bl.background_color = color;
                    if hc.tree.node(node).id == Tag::Body.id() {
                        // document-wide background
                        hc.bgcolor = color;
                    }
                }
            }
            ComponentKind::Style => {
                bl.style = Some(text.clone().into_owned());
                apply_style_declarations(&mut bl, &text);
            }
            ComponentKind::Class => {
                bl.html_class = Some(text.into_owned());
            }
            ComponentKind::Size => {
                // legacy <font size=…>
                bl.font_size = Some(css::parse_font_size(&text, false));
            }
            _ => {}
        }
    }

    hc.blocks.push(bl);
    let idx = hc.blocks.len() - 1;
    hc.tree.node_mut(node).extra = Extra::Block(idx);
    idx
}

/// Apply the declarations of a `style="…"` attribute to the block.
fn apply_style_declarations(bl: &mut Block, style: &str) {
    for decl in css::parse_declarations(style) {
        match decl.name.as_str() {
            "color" | "font-color" => {
                if let Some(color) = css::parse_color(&decl.value) {
                    bl.font_color = color;
                }
            }
            "background-color" | "background" => {
                if let Some(color) = css::parse_color(&decl.value) {
                    bl.background_color = color;
                }
            }
            "display" => {
                if decl.value.to_ascii_lowercase().contains("none") {
                    bl.visible = false;
                }
            }
            "font-size" => {
                bl.font_size = Some(css::parse_font_size(&decl.value, true));
            }
            "opacity" => {
                bl.font_color.alpha = css::parse_opacity(&decl.value);
            }
            "visibility" => {
                if decl.value.to_ascii_lowercase().contains("hidden") {
                    bl.visible = false;
                }
            }
            _ => {}
        }
    }
}

/// Resolve inheritance against the innermost styled ancestor and fill in
/// document defaults. When this block set any property itself it is pushed
/// onto the stack so its own children inherit from it; the matching close
/// pops it again.
pub(crate) fn propagate_style(
    hc: &mut HtmlContent,
    block_idx: usize,
    node: NodeId,
    stack: &mut Vec<(usize, NodeId)>,
) {
    let parent = stack
        .last()
        .map(|&(idx, _)| {
            let p = &hc.blocks[idx];
            (p.background_color, p.font_color, p.font_size)
        });

    let bgcolor = hc.bgcolor;
    let bl = &mut hc.blocks[block_idx];

    // Captured before inheritance fills anything in: only properties the
    // tag set itself make it an inheritance source for its children.
    let push_block =
        bl.font_color.valid || bl.background_color.valid || bl.font_size.is_some();

    if let Some((parent_bg, parent_fc, parent_fs)) = parent {
        if !bl.background_color.valid && parent_bg.valid {
            bl.background_color = parent_bg;
        }
        if !bl.font_color.valid && parent_fc.valid {
            bl.font_color = parent_fc;
        }
        if bl.font_size.is_none() {
            bl.font_size = parent_fs;
        }
    }

    // Last-resort defaults: black text on the document background.
    if !bl.font_color.valid {
        // Alpha is left alone: opacity may have been set independently.
        bl.font_color.r = 0;
        bl.font_color.g = 0;
        bl.font_color.b = 0;
        bl.font_color.valid = true;
    }

    if !bl.background_color.valid {
        bl.background_color = bgcolor;
    }

    if bl.font_size.is_none() {
        bl.font_size = Some(css::DEFAULT_FONT_SIZE);
    }

    if push_block && !hc.tree.node(node).flags.contains(TagFlags::CLOSED) {
        debug!(target: "html.block", "pushing styled block for inheritance");
        stack.push((block_idx, node));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tags;

    fn block_node(hc: &mut HtmlContent, name: &str, params: &[(ComponentKind, &[u8])]) -> NodeId {
        let node = hc.tree.alloc();
        let (id, flags) = tags::by_name(name.as_bytes()).unwrap();
        let n = hc.tree.node_mut(node);
        n.id = id;
        n.flags = flags;
        for (kind, value) in params {
            n.params.insert_first_wins(*kind, value.to_vec());
        }
        node
    }

    #[test]
    fn color_attributes_set_valid_colors() {
        let mut hc = HtmlContent::new();
        let node = block_node(
            &mut hc,
            "font",
            &[
                (ComponentKind::Color, b"#ff0000"),
                (ComponentKind::Bgcolor, b"white"),
            ],
        );
        let idx = process_block_tag(&mut hc, node);
        let bl = &hc.blocks[idx];
        assert_eq!(bl.font_color, css::Color::new(255, 0, 0));
        assert_eq!(bl.background_color, css::Color::new(255, 255, 255));
    }

    #[test]
    fn body_bgcolor_updates_the_document_background() {
        let mut hc = HtmlContent::new();
        let node = block_node(&mut hc, "body", &[(ComponentKind::Bgcolor, b"#000000")]);
        process_block_tag(&mut hc, node);
        assert_eq!(hc.bgcolor, css::Color::new(0, 0, 0));
    }

    #[test]
    fn display_none_and_visibility_hidden_hide_the_block() {
        let mut hc = HtmlContent::new();
        for style in [b"display: none".as_ref(), b"visibility:hidden"] {
            let node = block_node(&mut hc, "div", &[(ComponentKind::Style, style)]);
            let idx = process_block_tag(&mut hc, node);
            assert!(!hc.blocks[idx].visible, "{:?}", style);
        }
    }

    #[test]
    fn font_size_and_opacity_come_from_declarations() {
        let mut hc = HtmlContent::new();
        let node = block_node(
            &mut hc,
            "span",
            &[(ComponentKind::Style, b"font-size: 2px; opacity: 0.01")],
        );
        let idx = process_block_tag(&mut hc, node);
        let bl = &hc.blocks[idx];
        assert_eq!(bl.font_size, Some(2));
        assert_eq!(bl.font_color.alpha, 2);
    }

    #[test]
    fn legacy_size_attribute_uses_legacy_scaling() {
        let mut hc = HtmlContent::new();
        let node = block_node(&mut hc, "font", &[(ComponentKind::Size, b"1")]);
        let idx = process_block_tag(&mut hc, node);
        assert_eq!(hc.blocks[idx].font_size, Some(16));
    }

    #[test]
    fn children_inherit_from_the_styled_ancestor() {
        let mut hc = HtmlContent::new();
        let mut stack = Vec::new();

        let outer = block_node(
            &mut hc,
            "div",
            &[(ComponentKind::Style, b"color: #112233; font-size: 10px")],
        );
        let outer_idx = process_block_tag(&mut hc, outer);
        propagate_style(&mut hc, outer_idx, outer, &mut stack);
        assert_eq!(stack.len(), 1);

        let inner = block_node(&mut hc, "span", &[]);
        let inner_idx = process_block_tag(&mut hc, inner);
        propagate_style(&mut hc, inner_idx, inner, &mut stack);
        let bl = &hc.blocks[inner_idx];
        assert_eq!((bl.font_color.r, bl.font_color.g, bl.font_color.b), (0x11, 0x22, 0x33));
        assert_eq!(bl.font_size, Some(10));
        // nothing set on the span itself: not pushed
        assert_eq!(stack.len(), 1);
    }

    #[test]
    fn unstyled_blocks_get_document_defaults() {
        let mut hc = HtmlContent::new();
        let mut stack = Vec::new();
        let node = block_node(&mut hc, "div", &[]);
        let idx = process_block_tag(&mut hc, node);
        propagate_style(&mut hc, idx, node, &mut stack);
        let bl = &hc.blocks[idx];
        assert_eq!((bl.font_color.r, bl.font_color.g, bl.font_color.b), (0, 0, 0));
        assert!(bl.font_color.valid);
        assert_eq!(bl.background_color, hc.bgcolor);
        assert_eq!(bl.font_size, Some(16));
        assert!(stack.is_empty());
    }

    #[test]
    fn self_closed_blocks_do_not_join_the_stack() {
        let mut hc = HtmlContent::new();
        let mut stack = Vec::new();
        let node = block_node(&mut hc, "div", &[(ComponentKind::Color, b"red")]);
        hc.tree.node_mut(node).flags |= TagFlags::CLOSED;
        let idx = process_block_tag(&mut hc, node);
        propagate_style(&mut hc, idx, node, &mut stack);
        assert!(stack.is_empty());
    }
}
