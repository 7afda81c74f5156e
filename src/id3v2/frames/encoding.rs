use crate::core::io::BufStream;
use crate::id3v2::tag::{TagHeader, Version};
use crate::id3v2::{ParseError, ParseResult};
use crate::string::Encoding;
use log::{error, info};

const FLAG_LATIN1: u8 = 0x00;
const FLAG_UTF16: u8 = 0x01;
const FLAG_UTF16BE: u8 = 0x02;
const FLAG_UTF8: u8 = 0x03;

/// Reads the encoding marker byte at the start of a text payload.
pub fn parse(stream: &mut BufStream) -> ParseResult<Encoding> {
    match stream.read_u8()? {
        FLAG_LATIN1 => Ok(Encoding::Latin1),
        FLAG_UTF16 => Ok(Encoding::Utf16),
        FLAG_UTF16BE => Ok(Encoding::Utf16Be),
        FLAG_UTF8 => Ok(Encoding::Utf8),
        enc => {
            error!("unrecognized text encoding {:#04x}", enc);
            Err(ParseError::MalformedData)
        }
    }
}

/// Resolves the encoding a frame will actually be rendered with, applying
/// the tag-wide forced encoding (if a save requested one) and mapping the
/// ID3v2.4-only encodings down to UTF-16 on older versions.
pub fn check(enc: Encoding, tag_header: &TagHeader) -> Encoding {
    let enc = tag_header.forced_encoding().unwrap_or(enc);

    match enc {
        Encoding::Utf16Be | Encoding::Utf8 if tag_header.version() < Version::V24 => {
            info!("mapping {:?} to Utf16, not supported before ID3v2.4", enc);
            Encoding::Utf16
        }
        _ => enc,
    }
}

pub fn render(enc: Encoding) -> u8 {
    match enc {
        Encoding::Latin1 => FLAG_LATIN1,
        Encoding::Utf16 => FLAG_UTF16,
        Encoding::Utf16Be => FLAG_UTF16BE,
        Encoding::Utf8 => FLAG_UTF8,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_encoding_markers() {
        let mut stream = BufStream::new(b"\x00\x01\x02\x03\x04");

        assert_eq!(parse(&mut stream).unwrap(), Encoding::Latin1);
        assert_eq!(parse(&mut stream).unwrap(), Encoding::Utf16);
        assert_eq!(parse(&mut stream).unwrap(), Encoding::Utf16Be);
        assert_eq!(parse(&mut stream).unwrap(), Encoding::Utf8);
        assert!(parse(&mut stream).is_err());
    }

    #[test]
    fn check_downgrades_v4_encodings() {
        let v23 = TagHeader::with_version(Version::V23);
        let v24 = TagHeader::with_version(Version::V24);

        assert_eq!(check(Encoding::Utf8, &v23), Encoding::Utf16);
        assert_eq!(check(Encoding::Utf16Be, &v23), Encoding::Utf16);
        assert_eq!(check(Encoding::Utf8, &v24), Encoding::Utf8);
        assert_eq!(check(Encoding::Latin1, &v23), Encoding::Latin1);
    }

    #[test]
    fn check_applies_forced_encoding() {
        let mut header = TagHeader::with_version(Version::V23);
        header.set_forced_encoding(Some(Encoding::Utf8));

        // A forced ID3v2.4 encoding still gets mapped down on older tags.
        assert_eq!(check(Encoding::Latin1, &header), Encoding::Utf16);
    }
}
