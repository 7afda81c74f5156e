//! Tag string handling.

use crate::core::io::BufStream;
use log::warn;

/// A text encoding found inside a tag.
///
/// ID3v2 text payloads are prefixed with a marker byte selecting one of four
/// encodings. [`Utf8`](Encoding::Utf8) and [`Utf16Be`](Encoding::Utf16Be) only
/// exist in ID3v2.4 and are transparently mapped to [`Utf16`](Encoding::Utf16)
/// when a frame is rendered into an older tag.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Encoding {
    /// ISO-8859-1, as used by ID3v1 and the oldest ID3v2 taggers. Any
    /// character outside the Latin-1 range flattens to `?` when written.
    Latin1,
    /// UTF-16 with a byte-order mark. Written as UTF-16LE with a `0xFFFE` BOM.
    Utf16,
    /// UTF-16BE with no BOM. ID3v2.4 only.
    Utf16Be,
    /// UTF-8. ID3v2.4 only.
    Utf8,
}

impl Encoding {
    /// The width of a NUL terminator under this encoding.
    pub(crate) fn nul_size(&self) -> usize {
        match self {
            Self::Latin1 | Self::Utf8 => 1,
            _ => 2,
        }
    }
}

impl Default for Encoding {
    fn default() -> Self {
        Self::Utf8
    }
}

/// Decodes the rest of `stream` into a string.
pub(crate) fn read(encoding: Encoding, stream: &mut BufStream) -> String {
    decode(encoding, stream.take_rest())
}

/// Consumes `stream` up to a NUL terminator and decodes the data before it.
/// The terminator itself is consumed but not part of the returned string.
pub(crate) fn read_terminated(encoding: Encoding, stream: &mut BufStream) -> String {
    let data = match encoding.nul_size() {
        1 => stream.search(&[0]),
        2 => stream.search(&[0, 0]),
        _ => unreachable!(),
    };

    decode(encoding, data)
}

/// Encodes a string.
pub(crate) fn render(encoding: Encoding, string: &str) -> Vec<u8> {
    match encoding {
        Encoding::Latin1 => encode_latin1(string),
        Encoding::Utf16 => encode_utf16(string),
        Encoding::Utf16Be => encode_utf16be(string),
        Encoding::Utf8 => string.as_bytes().to_vec(),
    }
}

/// Encodes a string followed by a NUL terminator.
pub(crate) fn render_terminated(encoding: Encoding, string: &str) -> Vec<u8> {
    let mut result = render(encoding, string);
    result.resize(result.len() + encoding.nul_size(), 0);
    result
}

fn decode(encoding: Encoding, data: &[u8]) -> String {
    // Strip a single trailing NUL run if present. Non-terminated fields are
    // frequently written with a terminator anyway, and a NUL inside a rust
    // string is nothing but a source of surprises later on.
    let data = match encoding.nul_size() {
        1 => data.strip_suffix(&[0]).unwrap_or(data),
        2 => data.strip_suffix(&[0, 0]).unwrap_or(data),
        _ => unreachable!(),
    };

    match encoding {
        Encoding::Latin1 => data.iter().map(|&byte| char::from(byte)).collect(),
        Encoding::Utf16 => decode_utf16(data),
        Encoding::Utf16Be => decode_utf16be(data),
        Encoding::Utf8 => String::from_utf8_lossy(data).to_string(),
    }
}

fn decode_utf16(data: &[u8]) -> String {
    if data.len() < 2 {
        return String::new();
    }

    // The endianness has to be determined from the BOM.
    match (data[0], data[1]) {
        (0xFF, 0xFE) => decode_utf16le(&data[2..]),
        (0xFE, 0xFF) => decode_utf16be(&data[2..]),
        _ => {
            warn!("could not determine UTF-16 BOM, assuming UTF-16BE");
            decode_utf16be(data)
        }
    }
}

fn decode_utf16be(data: &[u8]) -> String {
    String::from_utf16_lossy(
        data.chunks_exact(2)
            .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
            .collect::<Vec<u16>>()
            .as_slice(),
    )
}

fn decode_utf16le(data: &[u8]) -> String {
    String::from_utf16_lossy(
        data.chunks_exact(2)
            .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
            .collect::<Vec<u16>>()
            .as_slice(),
    )
}

fn encode_latin1(string: &str) -> Vec<u8> {
    // Latin-1 code points coincide with the first 256 unicode code points,
    // everything above that range becomes a ?.
    string
        .chars()
        .map(|ch| if u32::from(ch) > 0xFF { b'?' } else { ch as u8 })
        .collect()
}

fn encode_utf16(string: &str) -> Vec<u8> {
    let mut result: Vec<u8> = vec![0xFF, 0xFE];
    result.extend(encode_utf16le(string));
    result
}

fn encode_utf16be(string: &str) -> Vec<u8> {
    string
        .encode_utf16()
        .flat_map(|cp| cp.to_be_bytes())
        .collect()
}

fn encode_utf16le(string: &str) -> Vec<u8> {
    string
        .encode_utf16()
        .flat_map(|cp| cp.to_le_bytes())
        .collect()
}
