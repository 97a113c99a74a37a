//! Compress::LZF framing.
//!
//! A frame is either `0x00` followed by the value stored verbatim, or a
//! UTF-8-like length header followed by an LZF payload:
//!
//! ```text
//! 0xxxxxxx                       sizes up to 0x7f
//! 110xxxxx 10xxxxxx              sizes up to 0x7ff
//! 1110xxxx 10xxxxxx 10xxxxxx     sizes up to 0xffff
//! ...                            up to 6 header bytes
//! ```

use crate::error::{CodecError, CodecResult};

/// Marker byte for values stored without compression.
const UNCOMPRESSED: u8 = 0x00;

/// Read the frame header.
///
/// Returns `(header_size, uncompressed_size)`. The leading one bits of the
/// first byte give the number of header bytes; every continuation byte adds
/// six low bits to the size.
pub fn frame_length(data: &[u8]) -> CodecResult<(usize, usize)> {
    let Some(&lead) = data.first() else {
        return Err(CodecError::CorruptData("frame header is missing".into()));
    };

    let mut header_size = 1usize;
    let mut mask: u8 = 0x80;
    while mask != 0 && lead & mask != 0 {
        // 0x40 is part of the two-byte marker (110xxxxx), not a length bit.
        mask >>= if mask == 0x80 { 2 } else { 1 };
        header_size += 1;
    }
    if mask == 0 || header_size > data.len() {
        return Err(CodecError::CorruptData("frame header is corrupted".into()));
    }

    let mut size = usize::from(lead & (mask - 1));
    for &byte in &data[1..header_size] {
        size = (size << 6) + usize::from(byte & 0x3F);
    }
    if size == 0 {
        return Err(CodecError::CorruptData("frame declares zero length".into()));
    }
    Ok((header_size, size))
}

/// Decode one stored value.
pub fn decompress(data: &[u8]) -> CodecResult<Vec<u8>> {
    match data.first() {
        None => Ok(Vec::new()),
        Some(&UNCOMPRESSED) => Ok(data[1..].to_vec()),
        Some(_) => {
            let (header_size, size) = frame_length(data)?;
            let out = lzf::decompress(&data[header_size..], size)
                .map_err(|e| CodecError::CorruptData(format!("lzf payload: {e:?}")))?;
            if out.len() != size {
                return Err(CodecError::CorruptData(format!(
                    "size mismatch: header declares {size}, payload holds {}",
                    out.len()
                )));
            }
            Ok(out)
        }
    }
}

/// Encode a value the way the archive tooling does: LZF when it shrinks the
/// value, the `0x00` escape otherwise.
pub fn compress(data: &[u8]) -> Vec<u8> {
    if data.is_empty() {
        return Vec::new();
    }
    if let Ok(payload) = lzf::compress(data) {
        let header = encode_header(data.len());
        if header.len() + payload.len() < data.len() + 1 {
            let mut frame = header;
            frame.extend_from_slice(&payload);
            return frame;
        }
    }
    let mut frame = Vec::with_capacity(data.len() + 1);
    frame.push(UNCOMPRESSED);
    frame.extend_from_slice(data);
    frame
}

fn encode_header(size: usize) -> Vec<u8> {
    // (upper bound, marker bits, continuation byte count)
    const FORMS: [(usize, u8, u32); 6] = [
        (0x7F, 0x00, 0),
        (0x7FF, 0xC0, 1),
        (0xFFFF, 0xE0, 2),
        (0x1F_FFFF, 0xF0, 3),
        (0x3FF_FFFF, 0xF8, 4),
        (0x7FFF_FFFF, 0xFC, 5),
    ];
    let (_, marker, extra) = FORMS
        .iter()
        .copied()
        .find(|(max, _, _)| size <= *max)
        .unwrap_or(FORMS[5]);

    let mut header = Vec::with_capacity(extra as usize + 1);
    header.push(marker | (size >> (6 * extra)) as u8);
    for i in (0..extra).rev() {
        header.push(0x80 | ((size >> (6 * i)) & 0x3F) as u8);
    }
    header
}
