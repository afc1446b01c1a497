use std::cmp::Reverse;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, ImageFormat};

use crate::services::converter::ConversionError;

pub const JPEG_QUALITY: u8 = 90;

/// Upper bound on start-of-image candidates inspected per file.
const MAX_SOI_CANDIDATES: usize = 256;

const SOI: [u8; 3] = [0xFF, 0xD8, 0xFF];

/// Pulls the embedded JPEG preview out of a RAW file and writes it to `target` untouched.
pub fn extract_raw_preview(source: &Path, target: &Path) -> Result<(), ConversionError> {
    let data = std::fs::read(source)?;
    let preview = extract_embedded_jpeg(&data).ok_or(ConversionError::NoEmbeddedPreview)?;
    std::fs::write(target, preview)?;
    Ok(())
}

/// Re-encodes a decoded image as a baseline JPEG.
pub fn write_jpeg(img: &DynamicImage, target: &Path, quality: u8) -> Result<(), ConversionError> {
    let file = File::create(target)?;
    let mut writer = BufWriter::new(file);
    let encoder = JpegEncoder::new_with_quality(&mut writer, quality);
    // JPEG has no alpha channel
    img.to_rgb8().write_with_encoder(encoder)?;
    writer.flush()?;
    Ok(())
}

/// Returns the largest decodable JPEG stream found in `data`.
///
/// RAW containers usually carry several JPEGs (a small EXIF thumbnail and a
/// near full size preview). Each stream is delimited by walking its marker
/// segments, so thumbnails nested inside an APP1 segment do not cut the
/// outer stream short.
pub fn extract_embedded_jpeg(data: &[u8]) -> Option<&[u8]> {
    let mut spans = Vec::new();
    let mut cursor = 0;

    for _ in 0..MAX_SOI_CANDIDATES {
        let Some(offset) = data[cursor..].windows(SOI.len()).position(|w| w == SOI) else {
            break;
        };
        let start = cursor + offset;
        match jpeg_stream_end(data, start) {
            Some(end) => {
                spans.push((start, end));
                cursor = end;
            }
            None => cursor = start + 2,
        }
    }

    spans.sort_by_key(|&(start, end)| Reverse(end - start));
    spans
        .into_iter()
        .map(|(start, end)| &data[start..end])
        .find(|jpeg| image::load_from_memory_with_format(jpeg, ImageFormat::Jpeg).is_ok())
}

/// Exclusive end offset of the JPEG stream whose SOI sits at `start`.
fn jpeg_stream_end(data: &[u8], start: usize) -> Option<usize> {
    let len = data.len();
    let mut pos = start + 2;

    loop {
        if pos + 1 >= len || data[pos] != 0xFF {
            return None;
        }
        // fill bytes
        while data[pos + 1] == 0xFF {
            pos += 1;
            if pos + 1 >= len {
                return None;
            }
        }
        let marker = data[pos + 1];
        pos += 2;

        match marker {
            0xD9 => return Some(pos),
            0xD8 => return None,
            0x01 | 0xD0..=0xD7 => continue,
            _ => {
                if pos + 2 > len {
                    return None;
                }
                let segment_len = u16::from_be_bytes([data[pos], data[pos + 1]]) as usize;
                if segment_len < 2 {
                    return None;
                }
                pos += segment_len;
                if pos > len {
                    return None;
                }
                if marker == 0xDA {
                    pos = entropy_data_end(data, pos)?;
                }
            }
        }
    }
}

/// Skips entropy-coded scan data, stopping at the next real marker.
fn entropy_data_end(data: &[u8], mut pos: usize) -> Option<usize> {
    let len = data.len();
    loop {
        pos += data.get(pos..)?.iter().position(|&b| b == 0xFF)?;
        if pos + 1 >= len {
            return None;
        }
        match data[pos + 1] {
            0x00 | 0xD0..=0xD7 => pos += 2,
            0xFF => pos += 1,
            _ => return Some(pos),
        }
    }
}
