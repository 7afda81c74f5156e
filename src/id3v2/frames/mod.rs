//! Frame parsing and implementations.
//!
//! The body of an ID3v2 tag is a sequence of typed records called frames.
//! Frames are heterogenous to a degree that makes one giant struct or enum
//! impractical, so they are modeled as trait objects with a downcasting
//! surface for callers that need a concrete type.
//!
//! Every frame type lives in a submodule grouped roughly the way the
//! informal ID3v2 spec chapters group them.

pub mod audio;
pub mod bin;
pub mod chapters;
pub mod comments;
mod encoding;
pub mod file;
pub mod header;
pub mod lang;
pub mod lyrics;
pub mod owner;
pub mod stats;
pub mod text;
pub mod time;
pub mod url;

pub use audio::{RelativeVolumeFrame, RelativeVolumeFrame2};
pub use bin::{FileIdFrame, MusicCdIdFrame, PrivateFrame, UnknownFrame};
pub use chapters::{ChapterFrame, TableOfContentsFrame};
pub use comments::CommentsFrame;
pub use file::{AttachedPictureFrame, GeneralObjectFrame};
pub use lang::Language;
pub use lyrics::LyricsFrame;
pub use owner::TermsOfUseFrame;
pub use stats::{PlayCounterFrame, PopularimeterFrame};
pub use text::{TextFrame, UserTextFrame};
pub use time::DateFrame;
pub use url::{UrlFrame, UserUrlFrame};

use crate::core::io::BufStream;
use crate::id3v2::frames::header::FrameHeader;
use crate::id3v2::tag::{TagHeader, Version};
use crate::id3v2::{compat, syncdata, ParseError, ParseResult, SaveResult};

use dyn_clone::DynClone;
use log::warn;
use std::any::Any;
use std::fmt::{self, Debug, Display, Formatter};
use std::str;

/// A single ID3v2 frame.
///
/// `key` is what distinguishes frames that may legally repeat under one
/// identifier: two comments differing in description, two pictures differing
/// in description, and so on. Replacement within a
/// [`FrameMap`](crate::id3v2::FrameMap) happens by key, never by identifier
/// alone.
pub trait Frame: Display + Debug + AsAny + DynClone {
    fn id(&self) -> FrameId;
    fn key(&self) -> String;
    fn is_empty(&self) -> bool;
    fn render(&self, tag_header: &TagHeader) -> Vec<u8>;
}

impl dyn Frame {
    pub fn is<T: Frame>(&self) -> bool {
        self.as_any(Sealed(())).is::<T>()
    }

    pub fn downcast<T: Frame>(&self) -> Option<&T> {
        self.as_any(Sealed(())).downcast_ref::<T>()
    }

    pub fn downcast_mut<T: Frame>(&mut self) -> Option<&mut T> {
        self.as_any_mut(Sealed(())).downcast_mut::<T>()
    }
}

pub trait AsAny: Any {
    fn as_any(&self, _: Sealed) -> &dyn Any;
    fn as_any_mut(&mut self, _: Sealed) -> &mut dyn Any;
}

impl<T: Frame> AsAny for T {
    fn as_any(&self, _: Sealed) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self, _: Sealed) -> &mut dyn Any {
        self
    }
}

dyn_clone::clone_trait_object!(Frame);

/// A token restricting trait methods that must be public for object safety
/// but are only meant to be called inside this crate. The only constructor
/// is private to this module.
pub struct Sealed(());

/// A 4-character frame identifier.
///
/// Identifiers consist of uppercase ASCII letters and digits only. ID3v2.2
/// identifiers are 3 characters and upgraded to their 4-character successors
/// at parse time, so they never appear here.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct FrameId([u8; 4]);

impl FrameId {
    /// Creates an identifier, panicking on invalid characters. Use
    /// [`FrameId::parse`] for untrusted input.
    pub fn new(id: &[u8; 4]) -> Self {
        Self::parse(id).expect("frame IDs must be 4 uppercase ASCII characters or digits")
    }

    pub fn parse(id: &[u8; 4]) -> ParseResult<Self> {
        if !header::is_frame_id(id) {
            return Err(ParseError::MalformedData);
        }

        Ok(Self(*id))
    }

    pub fn inner(&self) -> &[u8; 4] {
        &self.0
    }

    pub fn as_str(&self) -> &str {
        // Validated ASCII, cannot fail.
        str::from_utf8(&self.0).unwrap()
    }

    pub fn starts_with(&self, ch: u8) -> bool {
        self.0[0] == ch
    }
}

impl Display for FrameId {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write![f, "{}", self.as_str()]
    }
}

impl PartialEq<[u8; 4]> for FrameId {
    fn eq(&self, other: &[u8; 4]) -> bool {
        self.0 == *other
    }
}

impl PartialEq<&[u8; 4]> for FrameId {
    fn eq(&self, other: &&[u8; 4]) -> bool {
        self == *other
    }
}

/// The outcome of parsing one frame.
#[derive(Debug)]
pub(crate) enum FrameResult {
    /// A frame was parsed.
    Frame(Box<dyn Frame>),
    /// The padding at the end of the tag was reached.
    Padding,
    /// The frame was skipped, with its bytes consumed. One unreadable frame
    /// never takes the rest of the tag down with it.
    Dropped,
}

/// Parses a single frame from `stream`.
///
/// Errors escaping this function are structural: the frame header itself
/// could not be walked and the remainder of the tag is unreachable. Errors
/// inside a frame body are logged and collapse into
/// [`FrameResult::Dropped`].
pub(crate) fn parse(tag_header: &TagHeader, stream: &mut BufStream) -> ParseResult<FrameResult> {
    match tag_header.version() {
        Version::V22 => parse_frame_v2(tag_header, stream),
        Version::V23 => parse_frame_v3(tag_header, stream),
        Version::V24 => parse_frame_v4(tag_header, stream),
    }
}

fn parse_frame_v2(tag_header: &TagHeader, stream: &mut BufStream) -> ParseResult<FrameResult> {
    let id_bytes: [u8; 3] = stream.read_array()?;

    if !header::is_frame_id(&id_bytes) {
        return Ok(FrameResult::Padding);
    }

    let size_bytes: [u8; 3] = stream.read_array()?;
    let size = u32::from_be_bytes([0, size_bytes[0], size_bytes[1], size_bytes[2]]) as usize;

    if size == 0 {
        return Err(ParseError::MalformedData);
    }

    let mut stream = stream.slice_stream(size)?;

    // ID3v2.2 identifiers are upgraded to their 4-character successors so
    // that the rest of the crate only ever deals with one identifier width.
    // A code with no successor cannot be represented and is dropped.
    let frame_id = match compat::upgrade_v2_id(&id_bytes) {
        Ok(frame_id) => frame_id,
        Err(_) => {
            warn!(
                "dropping ID3v2.2 frame {} with no ID3v2.3 equivalent",
                String::from_utf8_lossy(&id_bytes)
            );
            return Ok(FrameResult::Dropped);
        }
    };

    dispatch(tag_header, frame_id, &mut stream)
}

fn parse_frame_v3(tag_header: &TagHeader, stream: &mut BufStream) -> ParseResult<FrameResult> {
    let header = match FrameHeader::parse(Version::V23, stream)? {
        Some(header) => header,
        None => return Ok(FrameResult::Padding),
    };

    let mut stream = stream.slice_stream(header.frame_size)?;
    let inflated: Vec<u8>;

    // ID3v2.3 frame extras come in the order decompressed-size,
    // encryption-method, group-id.

    if header.flags.compressed {
        stream.skip(4)?;
    }

    if header.flags.encrypted {
        // Encryption methods are vendor-specific and deliberately not
        // implemented. The payload is preserved as-is so nothing is lost.
        stream.skip(1)?;
        warn!("encryption is not supported for frame {}", header.frame_id);

        let frame = UnknownFrame::from_stream(header.frame_id, &mut stream);
        return Ok(FrameResult::Frame(Box::new(frame)));
    }

    if header.flags.grouped {
        stream.skip(1)?;
    }

    if header.flags.compressed {
        match inflate_frame(&mut stream) {
            Ok(data) => {
                inflated = data;
                stream = BufStream::new(&inflated);
            }
            Err(_) => {
                let frame = UnknownFrame::from_stream(header.frame_id, &mut stream);
                return Ok(FrameResult::Frame(Box::new(frame)));
            }
        }
    }

    dispatch(tag_header, header.frame_id, &mut stream)
}

fn parse_frame_v4(tag_header: &TagHeader, stream: &mut BufStream) -> ParseResult<FrameResult> {
    let header = match FrameHeader::parse(Version::V24, stream)? {
        Some(header) => header,
        None => return Ok(FrameResult::Padding),
    };

    let mut stream = stream.slice_stream(header.frame_size)?;

    // ID3v2.4 frame extras come in the order group-id, encryption-method,
    // data-length-indicator, and only then is unsynchronization undone.

    if header.flags.grouped {
        stream.skip(1)?;
    }

    if header.flags.encrypted {
        stream.skip(1)?;
        warn!("encryption is not supported for frame {}", header.frame_id);

        let frame = UnknownFrame::from_stream(header.frame_id, &mut stream);
        return Ok(FrameResult::Frame(Box::new(frame)));
    }

    // Some taggers leave the data length indicator flag unset when
    // compressing, so compression implies the indicator.
    if header.flags.data_length_indicator || header.flags.compressed {
        stream.skip(4)?;
    }

    let decoded: Vec<u8>;

    // In ID3v2.4 unsynchronization is applied per-frame. A tag-level unsync
    // flag means every frame is unsynchronized whether flagged or not.
    if header.flags.unsync || tag_header.flags().unsync {
        decoded = syncdata::decode(stream.take_rest());
        stream = BufStream::new(&decoded);
    }

    let inflated: Vec<u8>;

    if header.flags.compressed {
        match inflate_frame(&mut stream) {
            Ok(data) => {
                inflated = data;
                stream = BufStream::new(&inflated);
            }
            Err(_) => {
                let frame = UnknownFrame::from_stream(header.frame_id, &mut stream);
                return Ok(FrameResult::Frame(Box::new(frame)));
            }
        }
    }

    dispatch(tag_header, header.frame_id, &mut stream)
}

fn dispatch(
    tag_header: &TagHeader,
    frame_id: FrameId,
    stream: &mut BufStream,
) -> ParseResult<FrameResult> {
    match parse_body(tag_header, frame_id, stream) {
        Ok(frame) => Ok(FrameResult::Frame(frame)),
        Err(err) => {
            warn!("could not parse frame {}: {}", frame_id, err);
            Ok(FrameResult::Dropped)
        }
    }
}

/// The frame registry. Identifiers resolve to a concrete frame constructor;
/// unrecognized identifiers resolve to [`UnknownFrame`] so that frames from
/// the future (or from other taggers' imaginations) survive a round-trip.
fn parse_body(
    tag_header: &TagHeader,
    frame_id: FrameId,
    stream: &mut BufStream,
) -> ParseResult<Box<dyn Frame>> {
    let version = tag_header.version();

    let frame: Box<dyn Frame> = match frame_id.inner() {
        // Unique file identifier [Frames 4.1]
        b"UFID" => Box::new(FileIdFrame::parse(stream)?),

        // --- Text information [Frames 4.2] ---

        // User-defined text information [Frames 4.2.6]
        b"TXXX" => Box::new(UserTextFrame::parse(stream)?),

        // Timestamps and the older year/date fields
        _ if DateFrame::is_id(frame_id) => Box::new(DateFrame::parse(frame_id, stream)?),

        // Generic text information
        _ if TextFrame::is_id(frame_id) => Box::new(TextFrame::parse(frame_id, stream)?),

        // --- URL links [Frames 4.3] ---

        // User-defined URL link [Frames 4.3.2]
        b"WXXX" => Box::new(UserUrlFrame::parse(stream)?),

        // Generic URL link
        _ if frame_id.starts_with(b'W') => Box::new(UrlFrame::parse(frame_id, stream)?),

        // Music CD identifier [Frames 4.4]
        b"MCDI" => Box::new(MusicCdIdFrame::parse(stream)?),

        // Unsynchronized lyrics [Frames 4.8]
        b"USLT" => Box::new(LyricsFrame::parse(stream)?),

        // Comments [Frames 4.10]
        b"COMM" => Box::new(CommentsFrame::parse(stream)?),

        // Relative volume adjustment, both revisions [Frames 4.11]
        b"RVAD" if version <= Version::V23 => Box::new(RelativeVolumeFrame::parse(stream)?),
        b"RVA2" if version == Version::V24 => Box::new(RelativeVolumeFrame2::parse(stream)?),

        // Attached picture [Frames 4.14]
        b"APIC" => Box::new(AttachedPictureFrame::parse(version, stream)?),

        // General encapsulated object [Frames 4.15]
        b"GEOB" => Box::new(GeneralObjectFrame::parse(stream)?),

        // Play counter [Frames 4.16]
        b"PCNT" => Box::new(PlayCounterFrame::parse(stream)?),

        // Popularimeter [Frames 4.17]
        b"POPM" => Box::new(PopularimeterFrame::parse(stream)?),

        // Terms of use [Frames 4.22]
        b"USER" => Box::new(TermsOfUseFrame::parse(stream)?),

        // Private frame [Frames 4.27]
        b"PRIV" => Box::new(PrivateFrame::parse(stream)?),

        // Chapter frame [Chapter addendum 3.1]
        b"CHAP" => Box::new(ChapterFrame::parse(tag_header, stream)?),

        // Table of contents frame [Chapter addendum 3.2]
        b"CTOC" => Box::new(TableOfContentsFrame::parse(tag_header, stream)?),

        // No idea. Keep the bytes around as-is.
        _ => {
            warn!("unrecognized frame {}", frame_id);
            Box::new(UnknownFrame::from_stream(frame_id, stream))
        }
    };

    Ok(frame)
}

#[cfg(feature = "id3v2_zlib")]
fn inflate_frame(src: &mut BufStream) -> ParseResult<Vec<u8>> {
    miniz_oxide::inflate::decompress_to_vec_zlib(src.take_rest()).map_err(|err| {
        warn!("could not decompress frame: {:?}", err);
        ParseError::MalformedData
    })
}

#[cfg(not(feature = "id3v2_zlib"))]
fn inflate_frame(_: &mut BufStream) -> ParseResult<Vec<u8>> {
    warn!("frame decompression is not enabled");
    Err(ParseError::Unsupported)
}

/// Renders a frame with its header.
pub(crate) fn render(tag_header: &TagHeader, frame: &dyn Frame) -> SaveResult<Vec<u8>> {
    let frame_data = frame.render(tag_header);

    let mut data = FrameHeader::render(frame.id(), tag_header.version(), frame_data.len())?;
    data.extend(frame_data);

    Ok(data)
}
