use crate::core::io::BufStream;
use crate::id3v2::{syncdata, ParseError, ParseResult, SaveError, SaveResult};
use crate::string::Encoding;
use log::warn;

pub(crate) const ID_HEADER: &[u8; 3] = b"ID3";

/// The size of an ID3v2 tag can never exceed 256mb.
const MAX_TAG_SIZE: u32 = 256_000_000;

/// An ID3v2 major version.
///
/// Only the three revisions that ever shipped are representable, which is
/// also what guarantees that a tag is always rendered against a fully
/// qualified version.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd)]
pub enum Version {
    V22,
    V23,
    V24,
}

impl Version {
    pub fn major(self) -> u8 {
        match self {
            Version::V22 => 2,
            Version::V23 => 3,
            Version::V24 => 4,
        }
    }
}

pub struct TagHeader {
    version: Version,
    tag_size: usize,
    flags: TagFlags,
    forced_encoding: Option<Encoding>,
}

impl TagHeader {
    /// Parses the 10 bytes at the start of a possible tag.
    ///
    /// `Ok(None)` means "there is no tag here" and is a perfectly normal
    /// outcome. An error is only returned when the data does start with an
    /// ID3 identifier but cannot be used, such as an unreleased major
    /// version or a nonsensical size.
    pub(crate) fn parse(raw: [u8; 10]) -> ParseResult<Option<Self>> {
        if &raw[0..3] != ID_HEADER {
            return Ok(None);
        }

        let major = raw[3];
        let revision = raw[4];

        // 0xFF is not a valid version byte, and a reader that finds one is
        // supposed to assume it never saw a tag at all.
        if major == 0xFF || revision == 0xFF {
            return Ok(None);
        }

        let version = match major {
            // 0 and 1 never existed, so this is not a tag at all.
            0 | 1 => return Ok(None),
            2 => Version::V22,
            3 => Version::V23,
            4 => Version::V24,
            _ => return Err(ParseError::Unsupported),
        };

        if revision != 0 {
            // Revisions are guaranteed backwards-compatible, and none beyond
            // zero was ever published anyway.
            warn!("unknown ID3v2.{}.{} revision", major, revision);
        }

        let flags = raw[5];

        // Flag bits below the defined set must be zero.
        if (version == Version::V24 && flags & 0x0F != 0)
            || (version == Version::V23 && flags & 0x1F != 0)
            || (version == Version::V22 && flags & 0x3F != 0)
        {
            return Err(ParseError::MalformedData);
        }

        // In ID3v2.2 the second flag bit means the whole tag is compressed
        // with an algorithm the spec never named. Readers are told to skip
        // such tags.
        if version == Version::V22 && flags & 0x40 != 0 {
            return Err(ParseError::Unsupported);
        }

        let flags = TagFlags {
            unsync: flags & 0x80 != 0,
            extended: flags & 0x40 != 0,
            experimental: flags & 0x20 != 0,
            footer: flags & 0x10 != 0,
        };

        let tag_size = syncdata::to_u28([raw[6], raw[7], raw[8], raw[9]]);

        if tag_size == 0 || tag_size > MAX_TAG_SIZE {
            return Err(ParseError::MalformedData);
        }

        Ok(Some(TagHeader {
            version,
            tag_size: tag_size as usize,
            flags,
            forced_encoding: None,
        }))
    }

    pub(crate) fn with_version(version: Version) -> Self {
        TagHeader {
            version,
            tag_size: 0,
            flags: TagFlags::default(),
            forced_encoding: None,
        }
    }

    /// Renders the header for a tag body of `body_size` bytes.
    ///
    /// This codec never produces unsynchronized output, so rendering a
    /// header whose unsync flag is set is refused outright rather than
    /// silently writing a lie.
    pub(crate) fn render(&self, body_size: usize) -> SaveResult<[u8; 10]> {
        if self.flags.unsync {
            return Err(SaveError::Unsupported);
        }

        if body_size == 0 || body_size > MAX_TAG_SIZE as usize {
            return Err(SaveError::TooLarge);
        }

        let mut raw = [0; 10];
        raw[0..3].copy_from_slice(ID_HEADER);
        raw[3] = self.version.major();

        let mut flags = 0;

        if self.flags.extended {
            flags |= 0x40;
        }

        if self.flags.experimental {
            flags |= 0x20;
        }

        raw[5] = flags;
        raw[6..10].copy_from_slice(&syncdata::from_u28(body_size as u32));

        Ok(raw)
    }

    pub fn version(&self) -> Version {
        self.version
    }

    pub(crate) fn set_version(&mut self, version: Version) {
        self.version = version;
    }

    pub fn size(&self) -> usize {
        self.tag_size
    }

    pub fn flags(&self) -> &TagFlags {
        &self.flags
    }

    pub(crate) fn flags_mut(&mut self) -> &mut TagFlags {
        &mut self.flags
    }

    /// The encoding every text frame is forced into during a save, if any.
    pub(crate) fn forced_encoding(&self) -> Option<Encoding> {
        self.forced_encoding
    }

    pub(crate) fn set_forced_encoding(&mut self, encoding: Option<Encoding>) {
        self.forced_encoding = encoding;
    }
}

#[derive(Default)]
pub struct TagFlags {
    pub unsync: bool,
    pub extended: bool,
    pub experimental: bool,
    pub footer: bool,
}

/// The optional extended header of an ID3v2.3/v2.4 tag.
pub struct ExtendedHeader {
    size: usize,
    pub padding_size: Option<usize>,
    pub crc32: Option<u32>,
    pub is_update: bool,
    pub restrictions: Option<Restrictions>,
}

impl ExtendedHeader {
    pub(crate) fn parse(stream: &mut BufStream, version: Version) -> ParseResult<Self> {
        match version {
            Version::V23 => parse_ext_v3(stream),
            Version::V24 => parse_ext_v4(stream),
            // ID3v2.2 never had an extended header, the flag bit it would
            // occupy means "compressed tag" there and is rejected earlier.
            Version::V22 => Err(ParseError::Unsupported),
        }
    }

    /// The total amount of bytes the header occupied in the tag body.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Renders the header. The CRC, when enabled, covers the rendered frame
    /// data plus the (all-zero) padding that will follow it.
    pub(crate) fn render(&self, version: Version, frame_data: &[u8], padding_size: usize) -> Vec<u8> {
        let crc32 = self.crc32.map(|_| crc_over(frame_data, padding_size));

        match version {
            Version::V24 => render_ext_v4(self, crc32),
            _ => render_ext_v3(crc32),
        }
    }

    /// The size the rendered header will occupy, needed by the save engine
    /// before the padding (and with it the CRC) is known.
    pub(crate) fn rendered_size(&self, version: Version) -> usize {
        match version {
            Version::V24 => {
                let mut size = 6;

                if self.is_update {
                    size += 1;
                }

                if self.crc32.is_some() {
                    size += 6;
                }

                if self.restrictions.is_some() {
                    size += 2;
                }

                size
            }
            _ => {
                if self.crc32.is_some() {
                    14
                } else {
                    10
                }
            }
        }
    }
}

fn crc_over(frame_data: &[u8], padding_size: usize) -> u32 {
    let mut hasher = crc32fast::Hasher::new();
    hasher.update(frame_data);
    hasher.update(&vec![0; padding_size]);
    hasher.finalize()
}

fn parse_ext_v3(stream: &mut BufStream) -> ParseResult<ExtendedHeader> {
    // The size field excludes itself and must be 6 or 10 bytes.
    let size = stream.read_u32()? as usize;

    if size != 6 && size != 10 {
        return Err(ParseError::MalformedData);
    }

    let flags = stream.read_u16()?;

    // Only the CRC bit is defined in ID3v2.3.
    if flags & 0x7FFF != 0 {
        return Err(ParseError::MalformedData);
    }

    let mut header = ExtendedHeader {
        size: size + 4,
        padding_size: Some(stream.read_u32()? as usize),
        crc32: None,
        is_update: false,
        restrictions: None,
    };

    if flags & 0x8000 != 0 {
        header.crc32 = Some(stream.read_u32()?);
    }

    Ok(header)
}

fn parse_ext_v4(stream: &mut BufStream) -> ParseResult<ExtendedHeader> {
    // Unlike ID3v2.3, the v4 size field counts the whole header.
    let size = syncdata::to_u28(stream.read_array()?) as usize;

    if size < 6 {
        return Err(ParseError::MalformedData);
    }

    if stream.read_u8()? != 1 {
        return Err(ParseError::MalformedData);
    }

    let flags = stream.read_u8()?;

    // Undefined flag bits must be zero.
    if flags & 0x8F != 0 {
        return Err(ParseError::MalformedData);
    }

    let mut header = ExtendedHeader {
        size,
        padding_size: None,
        crc32: None,
        is_update: false,
        restrictions: None,
    };

    // Tag is an update of a previous tag. The flag carries no data.
    if flags & 0x40 != 0 {
        if stream.read_u8()? != 0 {
            return Err(ParseError::MalformedData);
        }

        header.is_update = true;
    }

    // CRC-32, stored as a 5-byte synchsafe integer.
    if flags & 0x20 != 0 {
        if stream.read_u8()? != 5 {
            return Err(ParseError::MalformedData);
        }

        header.crc32 = Some(syncdata::read_u35(stream)?);
    }

    // Tag restrictions. These describe how the tag was encoded, not how it
    // must be decoded, so nothing beyond the parse is done with them.
    if flags & 0x10 != 0 {
        if stream.read_u8()? != 1 {
            return Err(ParseError::MalformedData);
        }

        header.restrictions = Some(Restrictions::parse(stream.read_u8()?));
    }

    Ok(header)
}

fn render_ext_v3(crc32: Option<u32>) -> Vec<u8> {
    let mut data = Vec::new();

    match crc32 {
        Some(crc) => {
            data.extend(10u32.to_be_bytes());
            data.extend(0x8000u16.to_be_bytes());
            // Padding size is filled in by the save engine's layout, but the
            // field predates the padding decision, so zero is written and
            // readers are expected to derive the real value themselves.
            data.extend([0; 4]);
            data.extend(crc.to_be_bytes());
        }
        None => {
            data.extend(6u32.to_be_bytes());
            data.extend([0; 2]);
            data.extend([0; 4]);
        }
    }

    data
}

fn render_ext_v4(header: &ExtendedHeader, crc32: Option<u32>) -> Vec<u8> {
    let mut flags = 0u8;
    let mut blocks = Vec::new();

    if header.is_update {
        flags |= 0x40;
        blocks.push(0);
    }

    if let Some(crc) = crc32 {
        flags |= 0x20;
        blocks.push(5);
        blocks.extend(syncdata::from_u35(crc));
    }

    if let Some(restrictions) = &header.restrictions {
        flags |= 0x10;
        blocks.push(1);
        blocks.push(restrictions.render());
    }

    let mut data = Vec::new();
    data.extend(syncdata::from_u28((6 + blocks.len()) as u32));
    data.push(1);
    data.push(flags);
    data.extend(blocks);

    data
}

/// The five restriction categories of an ID3v2.4 extended header.
#[derive(Debug, Eq, PartialEq)]
pub struct Restrictions {
    pub tag_size: TagSizeRestriction,
    pub text_encoding: TextEncodingRestriction,
    pub text_size: TextSizeRestriction,
    pub image_encoding: ImageEncodingRestriction,
    pub image_size: ImageSizeRestriction,
}

impl Restrictions {
    fn parse(byte: u8) -> Self {
        let tag_size = match byte >> 6 {
            0 => TagSizeRestriction::Max128Frames1Mb,
            1 => TagSizeRestriction::Max64Frames128Kb,
            2 => TagSizeRestriction::Max32Frames40Kb,
            _ => TagSizeRestriction::Max32Frames4Kb,
        };

        let text_encoding = match (byte >> 5) & 0x1 {
            0 => TextEncodingRestriction::None,
            _ => TextEncodingRestriction::Latin1OrUtf8,
        };

        let text_size = match (byte >> 3) & 0x3 {
            0 => TextSizeRestriction::None,
            1 => TextSizeRestriction::LessThan1024Chars,
            2 => TextSizeRestriction::LessThan128Chars,
            _ => TextSizeRestriction::LessThan30Chars,
        };

        let image_encoding = match (byte >> 2) & 0x1 {
            0 => ImageEncodingRestriction::None,
            _ => ImageEncodingRestriction::OnlyPngOrJpeg,
        };

        let image_size = match byte & 0x3 {
            0 => ImageSizeRestriction::None,
            1 => ImageSizeRestriction::LessThan256x256,
            2 => ImageSizeRestriction::LessThan64x64,
            _ => ImageSizeRestriction::Exactly64x64,
        };

        Restrictions {
            tag_size,
            text_encoding,
            text_size,
            image_encoding,
            image_size,
        }
    }

    fn render(&self) -> u8 {
        (self.tag_size as u8) << 6
            | (self.text_encoding as u8) << 5
            | (self.text_size as u8) << 3
            | (self.image_encoding as u8) << 2
            | self.image_size as u8
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum TagSizeRestriction {
    Max128Frames1Mb = 0,
    Max64Frames128Kb = 1,
    Max32Frames40Kb = 2,
    Max32Frames4Kb = 3,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum TextEncodingRestriction {
    None = 0,
    Latin1OrUtf8 = 1,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum TextSizeRestriction {
    None = 0,
    LessThan1024Chars = 1,
    LessThan128Chars = 2,
    LessThan30Chars = 3,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ImageEncodingRestriction {
    None = 0,
    OnlyPngOrJpeg = 1,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ImageSizeRestriction {
    None = 0,
    LessThan256x256 = 1,
    LessThan64x64 = 2,
    Exactly64x64 = 3,
}
