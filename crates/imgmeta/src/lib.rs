//! Image header sniffing.
//!
//! The analyzer only needs to know whether an embedded payload is a real
//! image and what its pixel dimensions are; nothing is ever decoded. Each
//! sniffer reads just enough of the container header to answer that.

use log::trace;

// PNG signature and the fixed offsets of the IHDR dimensions.
const PNG_SIG: [u8; 8] = [137, 80, 78, 71, 13, 10, 26, 10];

// JPEG markers that carry frame dimensions (SOF family, minus DHT/DAC/RST).
const M_SOI: u8 = 0xD8;
const M_EOI: u8 = 0xD9;
const M_SOS: u8 = 0xDA;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ImageType {
    Png,
    Jpeg,
    Gif,
    Bmp,
    Ico,
}

impl ImageType {
    pub fn as_str(self) -> &'static str {
        match self {
            ImageType::Png => "png",
            ImageType::Jpeg => "jpeg",
            ImageType::Gif => "gif",
            ImageType::Bmp => "bmp",
            ImageType::Ico => "ico",
        }
    }
}

/// What the sniffer learned about an image payload.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ImageMeta {
    pub image_type: ImageType,
    pub width: u32,
    pub height: u32,
}

/// Identify an image payload and read its dimensions from the header.
/// Returns `None` for anything that is not recognizably an image.
pub fn maybe_process_image(data: &[u8]) -> Option<ImageMeta> {
    let meta = sniff_png(data)
        .or_else(|| sniff_jpeg(data))
        .or_else(|| sniff_gif(data))
        .or_else(|| sniff_bmp(data))
        .or_else(|| sniff_ico(data));

    if let Some(meta) = meta {
        trace!(
            target: "imgmeta",
            "detected {} image {}x{}",
            meta.image_type.as_str(),
            meta.width,
            meta.height
        );
    }
    meta
}

fn be32(data: &[u8], at: usize) -> Option<u32> {
    data.get(at..at + 4)
        .map(|b| u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
}

fn be16(data: &[u8], at: usize) -> Option<u16> {
    data.get(at..at + 2).map(|b| u16::from_be_bytes([b[0], b[1]]))
}

fn le16(data: &[u8], at: usize) -> Option<u16> {
    data.get(at..at + 2).map(|b| u16::from_le_bytes([b[0], b[1]]))
}

fn le32(data: &[u8], at: usize) -> Option<u32> {
    data.get(at..at + 4)
        .map(|b| u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
}

/// PNG: signature, then the IHDR chunk is mandatory and first; width and
/// height are big-endian u32 at fixed offsets 16 and 20.
fn sniff_png(data: &[u8]) -> Option<ImageMeta> {
    if !data.starts_with(&PNG_SIG) || data.get(12..16) != Some(b"IHDR".as_slice()) {
        return None;
    }
    Some(ImageMeta {
        image_type: ImageType::Png,
        width: be32(data, 16)?,
        height: be32(data, 20)?,
    })
}

/// JPEG: walk the marker stream from SOI until a frame header (SOF0..SOF15
/// except the table/RST markers) and read its dimension fields. Segment
/// lengths include their own two bytes.
fn sniff_jpeg(data: &[u8]) -> Option<ImageMeta> {
    if data.len() < 4 || data[0] != 0xFF || data[1] != M_SOI {
        return None;
    }
    let mut pos = 2;
    loop {
        // Tolerate fill bytes before a marker.
        while pos < data.len() && data[pos] != 0xFF {
            pos += 1;
        }
        while pos < data.len() && data[pos] == 0xFF {
            pos += 1;
        }
        let marker = *data.get(pos)?;
        pos += 1;

        match marker {
            M_EOI | M_SOS => return None,
            0xC0..=0xCF if !matches!(marker, 0xC4 | 0xC8 | 0xCC) => {
                // SOFn: len(2) precision(1) height(2) width(2)
                let height = be16(data, pos + 3)?;
                let width = be16(data, pos + 5)?;
                return Some(ImageMeta {
                    image_type: ImageType::Jpeg,
                    width: width.into(),
                    height: height.into(),
                });
            }
            _ => {
                let len = be16(data, pos)? as usize;
                if len < 2 {
                    return None;
                }
                pos += len;
            }
        }
    }
}

/// GIF: "GIF87a"/"GIF89a", logical screen size little-endian at 6/8.
fn sniff_gif(data: &[u8]) -> Option<ImageMeta> {
    if !data.starts_with(b"GIF87a") && !data.starts_with(b"GIF89a") {
        return None;
    }
    Some(ImageMeta {
        image_type: ImageType::Gif,
        width: le16(data, 6)?.into(),
        height: le16(data, 8)?.into(),
    })
}

/// BMP: "BM" then the BITMAPINFOHEADER dimensions at 18/22. Height may be
/// negative for top-down bitmaps.
fn sniff_bmp(data: &[u8]) -> Option<ImageMeta> {
    if !data.starts_with(b"BM") {
        return None;
    }
    let width = le32(data, 18)? as i32;
    let height = le32(data, 22)? as i32;
    Some(ImageMeta {
        image_type: ImageType::Bmp,
        width: width.unsigned_abs(),
        height: height.unsigned_abs(),
    })
}

/// ICO: reserved(2)=0, type(2)=1, then directory entries with one-byte
/// dimensions where 0 means 256.
fn sniff_ico(data: &[u8]) -> Option<ImageMeta> {
    if data.len() < 8 || data[0] != 0 || data[1] != 0 || data[2] != 1 || data[3] != 0 {
        return None;
    }
    let count = le16(data, 4)?;
    if count == 0 {
        return None;
    }
    let w = data[6] as u32;
    let h = data[7] as u32;
    Some(ImageMeta {
        image_type: ImageType::Ico,
        width: if w == 0 { 256 } else { w },
        height: if h == 0 { 256 } else { h },
    })
}
