//! Embedded raster image extraction.
//!
//! Image XObjects are collected from every page's resources (following
//! inherited `Resources` up the page tree). JPEG and JPEG 2000 streams are
//! written as-is; raw 8-bit pixel data is re-encoded as PNG.

use std::collections::HashSet;
use std::io::Cursor;

use image::{DynamicImage, GrayImage, ImageFormat, RgbImage};
use lopdf::{Dictionary, Document as LopdfDocument, Object, ObjectId, Stream};

use crate::error::{Error, Result};
use crate::model::StructuralNode;
use crate::parser::ExtractContext;

/// Alt text of document images.
pub const IMAGE_ALT: &str = "image";

/// Write every image XObject and return one `Image` node per image, in page order.
pub fn extract_images(doc: &LopdfDocument, ctx: &mut ExtractContext) -> Vec<StructuralNode> {
    let mut nodes = Vec::new();
    let mut seen: HashSet<ObjectId> = HashSet::new();

    for (page_num, page_id) in doc.get_pages() {
        for image_id in page_image_ids(doc, page_id) {
            if !seen.insert(image_id) {
                continue;
            }

            let encoded = match doc.get_object(image_id) {
                Ok(Object::Stream(stream)) => encode_image(stream),
                Ok(_) => continue,
                Err(e) => Err(Error::from(e)),
            };
            let (ext, bytes) = match encoded {
                Ok(Some(image)) => image,
                Ok(None) => continue,
                Err(e) => {
                    ctx.partial(format!("image {} on page {}", image_id.0, page_num), e);
                    continue;
                }
            };

            match ctx.save_image(ext, &bytes) {
                Ok(link) => nodes.push(StructuralNode::image(link, IMAGE_ALT)),
                Err(e) => ctx.partial(format!("image {} on page {}", image_id.0, page_num), e),
            }
        }
    }

    nodes
}

/// References of a page's XObjects, in resource-name order.
fn page_image_ids(doc: &LopdfDocument, page_id: ObjectId) -> Vec<ObjectId> {
    let Some(resources) = page_resources(doc, page_id) else {
        return Vec::new();
    };
    let Some(xobjects) = resources.get(b"XObject").ok().and_then(|o| resolve_dict(doc, o)) else {
        return Vec::new();
    };

    xobjects
        .iter()
        .filter_map(|(_, obj)| obj.as_reference().ok())
        .collect()
}

/// The page's own `Resources`, or the nearest inherited one.
fn page_resources(doc: &LopdfDocument, page_id: ObjectId) -> Option<&Dictionary> {
    let mut node = doc.get_dictionary(page_id).ok()?;
    // Bounded walk up the page tree
    for _ in 0..32 {
        if let Some(resources) = node.get(b"Resources").ok().and_then(|o| resolve_dict(doc, o)) {
            return Some(resources);
        }
        let parent = node.get(b"Parent").ok()?.as_reference().ok()?;
        node = doc.get_dictionary(parent).ok()?;
    }
    None
}

fn resolve_dict<'a>(doc: &'a LopdfDocument, obj: &'a Object) -> Option<&'a Dictionary> {
    match obj {
        Object::Dictionary(d) => Some(d),
        Object::Reference(r) => doc.get_dictionary(*r).ok(),
        _ => None,
    }
}

/// Encode an XObject stream as an image file; `None` when it is not an image.
fn encode_image(stream: &Stream) -> Result<Option<(&'static str, Vec<u8>)>> {
    let dict = &stream.dict;
    if dict.get(b"Subtype").and_then(|s| s.as_name()).ok() != Some(b"Image".as_slice()) {
        return Ok(None);
    }

    let filters = filter_names(dict);
    match filters.as_slice() {
        [f] if f == "DCTDecode" => return Ok(Some(("jpg", stream.content.clone()))),
        [f] if f == "JPXDecode" => return Ok(Some(("jp2", stream.content.clone()))),
        _ => {}
    }
    if filters.iter().any(|f| f != "FlateDecode" && f != "LZWDecode") {
        return Err(Error::PartialExtraction(format!(
            "unsupported image filter {:?}",
            filters
        )));
    }

    let width = dict_u32(dict, b"Width")?;
    let height = dict_u32(dict, b"Height")?;
    let bits = dict.get(b"BitsPerComponent").and_then(|b| b.as_i64()).unwrap_or(8);
    if bits != 8 {
        return Err(Error::PartialExtraction(format!(
            "unsupported {} bits per component",
            bits
        )));
    }

    let data = if filters.is_empty() {
        stream.content.clone()
    } else {
        stream.decompressed_content()?
    };

    let bitmap = to_bitmap(width, height, components(dict), data)?;
    let mut png = Cursor::new(Vec::new());
    bitmap.write_to(&mut png, ImageFormat::Png)?;
    Ok(Some(("png", png.into_inner())))
}

fn filter_names(dict: &Dictionary) -> Vec<String> {
    match dict.get(b"Filter") {
        Ok(Object::Name(n)) => vec![String::from_utf8_lossy(n).to_string()],
        Ok(Object::Array(arr)) => arr
            .iter()
            .filter_map(|o| o.as_name().ok())
            .map(|n| String::from_utf8_lossy(n).to_string())
            .collect(),
        _ => Vec::new(),
    }
}

fn dict_u32(dict: &Dictionary, key: &[u8]) -> Result<u32> {
    dict.get(key)
        .and_then(|v| v.as_i64())
        .ok()
        .and_then(|v| u32::try_from(v).ok())
        .ok_or_else(|| {
            Error::PartialExtraction(format!("image without {}", String::from_utf8_lossy(key)))
        })
}

/// Color components per pixel from the color space (1 gray, 3 RGB, 4 CMYK).
fn components(dict: &Dictionary) -> u8 {
    match dict.get(b"ColorSpace") {
        Ok(Object::Name(n)) => match n.as_slice() {
            b"DeviceGray" | b"CalGray" | b"G" => 1,
            b"DeviceCMYK" | b"CMYK" => 4,
            _ => 3,
        },
        // [/ICCBased ref]: guess from the data length later
        Ok(Object::Array(arr)) => match arr.first().and_then(|o| o.as_name().ok()) {
            Some(b"CalGray") => 1,
            Some(b"ICCBased") => 0,
            _ => 3,
        },
        _ => 3,
    }
}

fn to_bitmap(width: u32, height: u32, components: u8, data: Vec<u8>) -> Result<DynamicImage> {
    let pixels = width as usize * height as usize;
    let components = match components {
        0 if pixels > 0 => (data.len() / pixels).clamp(1, 4) as u8,
        n => n,
    };
    let invalid = || Error::PartialExtraction("image data shorter than its dimensions".to_string());

    let expected = pixels * components as usize;
    if data.len() < expected {
        return Err(invalid());
    }
    let mut data = data;
    data.truncate(expected);

    let bitmap = match components {
        1 => {
            let gray = GrayImage::from_raw(width, height, data).ok_or_else(invalid)?;
            DynamicImage::ImageLuma8(gray)
        }
        4 => {
            let rgb: Vec<u8> = data.chunks_exact(4).flat_map(cmyk_to_rgb).collect();
            DynamicImage::ImageRgb8(RgbImage::from_raw(width, height, rgb).ok_or_else(invalid)?)
        }
        _ => {
            if components != 3 {
                return Err(Error::PartialExtraction(format!(
                    "unsupported {} color components",
                    components
                )));
            }
            DynamicImage::ImageRgb8(RgbImage::from_raw(width, height, data).ok_or_else(invalid)?)
        }
    };
    Ok(bitmap)
}

fn cmyk_to_rgb(px: &[u8]) -> [u8; 3] {
    let k = 255 - px[3] as u16;
    let channel = |c: u8| ((255 - c as u16) * k / 255) as u8;
    [channel(px[0]), channel(px[1]), channel(px[2])]
}
