//! Per-tag semantic processors invoked when a token is committed:
//! `<a>`/`<base>` URL extraction, `<img>`/`<link rel=icon>` images, and
//! style blocks on `BLOCK`-flagged tags.

mod block;
mod img;
mod url;

pub(crate) use block::{process_block_tag, propagate_style};
pub(crate) use img::{process_img_tag, process_link_tag};
pub(crate) use url::{check_displayed_url, process_query_urls, process_raw_url, process_url_tag};
