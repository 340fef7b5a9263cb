//! Minimal CSS support for the mail HTML analyzer.
//!
//! Two concerns only: parsing the values that matter for hidden-text and
//! color analysis (`values`), and splitting declaration lists / `<style>`
//! rule sets (`syntax`). There is no cascade and no selector matching; the
//! analyzer consumes declarations positionally as it walks the document.

mod syntax;
mod values;

pub use syntax::{
    Declaration, Rule, Selector, StyleError, Stylesheet, parse_declarations, parse_style_block,
    parse_stylesheet,
};
pub use values::{
    Color, DEFAULT_FONT_SIZE, MAX_FONT_SIZE, color_from_name, parse_color, parse_font_size,
    parse_opacity,
};
