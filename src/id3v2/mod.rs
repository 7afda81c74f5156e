//! ID3v2 tag reading and writing.
//!
//! An ID3v2 tag is a header, an optional extended header, and a body of
//! frames, usually followed by padding that lets small edits happen without
//! rewriting the file. This module owns the tag-level lifecycle: finding
//! and parsing a tag, exposing its [`FrameMap`], converting it between
//! versions, and saving it back.

#[macro_use]
mod macros;

mod compat;
pub mod frame_map;
pub mod frames;
mod save;
pub mod syncdata;
pub mod tag;

pub use frame_map::FrameMap;
pub use save::SaveOptions;
pub use tag::{ExtendedHeader, TagFlags, TagHeader, Version};

use crate::core::io::BufStream;
use crate::genres::Genre;
use crate::id3v2::frames::header::FrameHeader;
use crate::id3v2::frames::time::Date;
use crate::id3v2::frames::{DateFrame, FrameId, FrameResult, TextFrame};

use log::warn;
use std::error;
use std::fmt::{self, Display, Formatter};
use std::fs::File;
use std::io::{self, ErrorKind, Read};
use std::path::Path;

/// An error encountered while reading a tag.
#[derive(Debug)]
pub enum ParseError {
    /// The underlying stream failed.
    IoError(io::Error),
    /// The data is structurally broken beyond recovery.
    MalformedData,
    /// The data declares a format this crate does not handle, such as an
    /// unreleased major version.
    Unsupported,
    /// Nothing matching the request was found.
    NotFound,
}

impl From<io::Error> for ParseError {
    fn from(other: io::Error) -> Self {
        ParseError::IoError(other)
    }
}

impl Display for ParseError {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        match self {
            ParseError::IoError(err) => write![f, "{}", err],
            ParseError::MalformedData => write![f, "malformed data"],
            ParseError::Unsupported => write![f, "unsupported format"],
            ParseError::NotFound => write![f, "not found"],
        }
    }
}

impl error::Error for ParseError {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match self {
            ParseError::IoError(err) => Some(err),
            _ => None,
        }
    }
}

pub type ParseResult<T> = Result<T, ParseError>;

/// An error encountered while saving a tag.
#[derive(Debug)]
pub enum SaveError {
    /// The underlying file operation failed.
    IoError(io::Error),
    /// A frame or the whole tag exceeds a size limit of the format.
    TooLarge,
    /// The requested output cannot be written, such as an ID3v2.2 tag or an
    /// unsynchronized tag.
    Unsupported,
    /// The tag is marked read-only.
    ReadOnly,
    /// Frames with the listed identifiers have no representation in the
    /// target version.
    CannotConvert(Vec<FrameId>),
}

impl From<io::Error> for SaveError {
    fn from(other: io::Error) -> Self {
        SaveError::IoError(other)
    }
}

impl Display for SaveError {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        match self {
            SaveError::IoError(err) => write![f, "{}", err],
            SaveError::TooLarge => write![f, "data exceeds a format size limit"],
            SaveError::Unsupported => write![f, "output format is not supported"],
            SaveError::ReadOnly => write![f, "tag is read-only"],
            SaveError::CannotConvert(ids) => {
                write![f, "frames have no equivalent in the target version: "]?;

                for (i, id) in ids.iter().enumerate() {
                    if i > 0 {
                        write![f, ", "]?;
                    }

                    write![f, "{}", id]?;
                }

                Ok(())
            }
        }
    }
}

impl error::Error for SaveError {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match self {
            SaveError::IoError(err) => Some(err),
            _ => None,
        }
    }
}

pub type SaveResult<T> = Result<T, SaveError>;

/// An ID3v2 tag.
pub struct Tag {
    header: TagHeader,
    ext_header: Option<ExtendedHeader>,
    frames: FrameMap,
    read_only: bool,
    on_disk_size: usize,
}

impl Tag {
    /// Creates an empty tag of the given version.
    pub fn new(version: Version) -> Self {
        Tag {
            header: TagHeader::with_version(version),
            ext_header: None,
            frames: FrameMap::new(),
            read_only: false,
            on_disk_size: 0,
        }
    }

    /// Reads the tag at the start of the file at `path`. `Ok(None)` means
    /// the file simply has no ID3v2 tag.
    pub fn open<P: AsRef<Path>>(path: P) -> ParseResult<Option<Self>> {
        let mut file = File::open(path)?;
        Self::read_from(&mut file)
    }

    /// Reads a tag from the start of `stream`.
    pub fn read_from(stream: &mut impl Read) -> ParseResult<Option<Self>> {
        let mut raw = [0; 10];

        match stream.read_exact(&mut raw) {
            Ok(()) => {}
            // A file shorter than a tag header cannot have a tag.
            Err(err) if err.kind() == ErrorKind::UnexpectedEof => return Ok(None),
            Err(err) => return Err(err.into()),
        }

        let header = match TagHeader::parse(raw)? {
            Some(header) => header,
            None => return Ok(None),
        };

        let mut data = vec![0; header.size()];
        stream.read_exact(&mut data)?;

        Self::parse(header, data).map(Some)
    }

    fn parse(mut header: TagHeader, mut data: Vec<u8>) -> ParseResult<Self> {
        // Before ID3v2.4, unsynchronization covers the whole tag body. In
        // v2.4 the headers are all synchsafe and the transform moved into
        // the individual frames.
        if header.flags().unsync && header.version() <= Version::V23 {
            data = syncdata::decode(&data);
        }

        let mut stream = BufStream::new(&data);

        let ext_header = if header.flags().extended {
            match ExtendedHeader::parse(&mut BufStream::new(&data), header.version()) {
                Ok(ext) => {
                    stream.skip(ext.size())?;
                    Some(ext)
                }
                Err(_) => {
                    // The flag lies sometimes. Correct it and move on.
                    warn!("extended header flag set without a valid extended header");
                    header.flags_mut().extended = false;
                    None
                }
            }
        } else {
            None
        };

        let frames = parse_frames(&header, &mut stream)?;
        let on_disk_size = 10 + header.size() + if header.flags().footer { 10 } else { 0 };

        Ok(Tag {
            header,
            ext_header,
            frames,
            read_only: false,
            on_disk_size,
        })
    }

    pub fn version(&self) -> Version {
        self.header.version()
    }

    /// Converts the tag to another version, translating or dropping frames
    /// as the version transition demands.
    pub fn change_version(&mut self, version: Version) -> SaveResult<()> {
        if version == self.version() {
            return Ok(());
        }

        compat::convert(&mut self.frames, version)?;
        self.header.set_version(version);

        Ok(())
    }

    pub fn frames(&self) -> &FrameMap {
        &self.frames
    }

    pub fn frames_mut(&mut self) -> &mut FrameMap {
        &mut self.frames
    }

    pub fn ext_header(&self) -> Option<&ExtendedHeader> {
        self.ext_header.as_ref()
    }

    pub fn read_only(&self) -> bool {
        self.read_only
    }

    pub fn set_read_only(&mut self, read_only: bool) {
        self.read_only = read_only;
    }

    /// Saves the tag into the file at `path` with default options.
    pub fn save<P: AsRef<Path>>(&mut self, path: P) -> SaveResult<()> {
        self.save_with(path, &SaveOptions::default())
    }

    pub fn save_with<P: AsRef<Path>>(&mut self, path: P, options: &SaveOptions) -> SaveResult<()> {
        save::save(self, path.as_ref(), options)
    }

    /// Removes the ID3v2 tag from the file at `path`, returning whether one
    /// was there to remove.
    pub fn remove_from<P: AsRef<Path>>(path: P) -> ParseResult<bool> {
        save::strip(path.as_ref())
    }

    pub(crate) fn header(&self) -> &TagHeader {
        &self.header
    }

    pub(crate) fn header_mut(&mut self) -> &mut TagHeader {
        &mut self.header
    }

    /// The total space the tag occupied on disk when it was read or last
    /// saved, including its header. Zero for a tag that was never on disk.
    pub fn on_disk_size(&self) -> usize {
        self.on_disk_size
    }

    pub(crate) fn set_on_disk_size(&mut self, size: usize) {
        self.on_disk_size = size;
    }
}

// The property layer. Each accessor encapsulates which frames implement the
// property under the tag's current version, so callers can stay oblivious
// to the date-frame reshuffling between v2.3 and v2.4.
impl Tag {
    pub fn title(&self) -> Option<String> {
        self.first_text(b"TIT2")
    }

    pub fn set_title(&mut self, title: &str) {
        self.set_text(b"TIT2", title);
    }

    pub fn artist(&self) -> Option<String> {
        self.first_text(b"TPE1")
    }

    pub fn set_artist(&mut self, artist: &str) {
        self.set_text(b"TPE1", artist);
    }

    pub fn album(&self) -> Option<String> {
        self.first_text(b"TALB")
    }

    pub fn set_album(&mut self, album: &str) {
        self.set_text(b"TALB", album);
    }

    pub fn genre(&self) -> Option<Genre> {
        Some(Genre::parse(&self.first_text(b"TCON")?))
    }

    pub fn set_genre(&mut self, genre: &Genre) {
        self.set_text(b"TCON", &genre.to_string());
    }

    pub fn track_num(&self) -> NumberPair {
        self.number_pair(b"TRCK")
    }

    pub fn set_track_num(&mut self, pair: NumberPair) {
        self.set_number_pair(b"TRCK", pair);
    }

    pub fn disc_num(&self) -> NumberPair {
        self.number_pair(b"TPOS")
    }

    pub fn set_disc_num(&mut self, pair: NumberPair) {
        self.set_number_pair(b"TPOS", pair);
    }

    /// The recording date, from `TDRC` on ID3v2.4 and `TYER`/`TDAT`/`TIME`
    /// before that.
    pub fn recording_date(&self) -> Option<Date> {
        if self.version() == Version::V24 {
            return self.date_of(b"TDRC");
        }

        let year = self.date_of(b"TYER")?.year();
        let mut date = Date::new(year);

        if let Some((day, month)) = self
            .first_text(b"TDAT")
            .as_deref()
            .and_then(compat::split_four_digits)
        {
            if date.set_month(month).and_then(|_| date.set_day(day)).is_ok() {
                if let Some((hour, minute)) = self
                    .first_text(b"TIME")
                    .as_deref()
                    .and_then(compat::split_four_digits)
                {
                    let _ = date.set_hour(hour).and_then(|_| date.set_minute(minute));
                }
            }
        }

        Some(date)
    }

    pub fn set_recording_date(&mut self, date: Option<Date>) {
        if self.version() == Version::V24 {
            self.set_date(b"TDRC", date);
            return;
        }

        self.frames.remove_all(b"TYER");
        self.frames.remove_all(b"TDAT");
        self.frames.remove_all(b"TIME");

        let date = match date {
            Some(date) => date,
            None => return,
        };

        self.set_date(b"TYER", Some(Date::new(date.year())));

        if let (Some(month), Some(day)) = (date.month(), date.day()) {
            self.set_text(b"TDAT", &format!["{:02}{:02}", day, month]);

            if let (Some(hour), Some(minute)) = (date.hour(), date.minute()) {
                self.set_text(b"TIME", &format!["{:02}{:02}", hour, minute]);
            }
        }
    }

    /// The original release date, from `TDOR` on ID3v2.4 and `XDOR`/`TORY`
    /// before that.
    pub fn original_release_date(&self) -> Option<Date> {
        if self.version() == Version::V24 {
            return self.date_of(b"TDOR");
        }

        self.date_of(b"XDOR").or_else(|| self.date_of(b"TORY"))
    }

    pub fn set_original_release_date(&mut self, date: Option<Date>) {
        if self.version() == Version::V24 {
            self.set_date(b"TDOR", date);
            return;
        }

        self.frames.remove_all(b"TORY");
        self.frames.remove_all(b"XDOR");

        let date = match date {
            Some(date) => date,
            None => return,
        };

        self.set_date(b"TORY", Some(Date::new(date.year())));

        if date.has_date() {
            self.set_date(b"XDOR", Some(date));
        }
    }

    /// The release date. Only ID3v2.4 can distinguish this from the
    /// original release date; on older versions the two collapse into one
    /// field, and this accessor aliases
    /// [`original_release_date`](Tag::original_release_date).
    pub fn release_date(&self) -> Option<Date> {
        if self.version() == Version::V24 {
            return self.date_of(b"TDRL");
        }

        self.original_release_date()
    }

    pub fn set_release_date(&mut self, date: Option<Date>) {
        if self.version() == Version::V24 {
            self.set_date(b"TDRL", date);
            return;
        }

        self.set_original_release_date(date);
    }

    fn first_text(&self, id: &[u8; 4]) -> Option<String> {
        let frame = self.frames.get(id)?.downcast::<TextFrame>()?;
        frame.text.first().cloned().filter(|text| !text.is_empty())
    }

    fn set_text(&mut self, id: &[u8; 4], text: &str) {
        if text.is_empty() {
            self.frames.remove_all(id);
            return;
        }

        let mut frame = TextFrame::new(FrameId::new(id));
        frame.text = vec![String::from(text)];
        self.frames.add(frame);
    }

    fn date_of(&self, id: &[u8; 4]) -> Option<Date> {
        self.frames.get(id)?.downcast::<DateFrame>()?.date
    }

    fn set_date(&mut self, id: &[u8; 4], date: Option<Date>) {
        match date {
            Some(date) => {
                let mut frame = DateFrame::new(FrameId::new(id));
                frame.date = Some(date);
                self.frames.add(frame);
            }
            None => {
                self.frames.remove_all(id);
            }
        }
    }

    fn number_pair(&self, id: &[u8; 4]) -> NumberPair {
        self.first_text(id)
            .map(|text| NumberPair::parse(&text))
            .unwrap_or_default()
    }

    fn set_number_pair(&mut self, id: &[u8; 4], pair: NumberPair) {
        if pair.is_empty() {
            self.frames.remove_all(id);
        } else {
            self.set_text(id, &pair.to_string());
        }
    }
}

/// A numbered position in a set, e.g. track 3 of 12.
///
/// Either side may be absent. An absent side stays absent; a present zero
/// is a literal zero and is preserved. Setting a fully absent pair removes
/// the underlying frame.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct NumberPair {
    pub number: Option<u32>,
    pub total: Option<u32>,
}

impl NumberPair {
    pub fn new(number: Option<u32>, total: Option<u32>) -> Self {
        Self { number, total }
    }

    pub fn is_empty(&self) -> bool {
        self.number.is_none() && self.total.is_none()
    }

    pub(crate) fn parse(text: &str) -> Self {
        let mut halves = text.splitn(2, '/');

        let number = halves.next().and_then(|half| half.trim().parse().ok());
        let total = halves.next().and_then(|half| half.trim().parse().ok());

        Self { number, total }
    }
}

impl Display for NumberPair {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        if let Some(number) = self.number {
            write![f, "{}", number]?;
        }

        if let Some(total) = self.total {
            write![f, "/{}", total]?;
        }

        Ok(())
    }
}

fn parse_frames(header: &TagHeader, stream: &mut BufStream) -> ParseResult<FrameMap> {
    let mut frames = FrameMap::new();
    let min_frame_size = FrameHeader::size(header.version()) + 1;

    loop {
        let remaining = stream.remaining();

        // Less than a frame header plus one byte of payload left: the rest
        // is padding, however oddly sized.
        if remaining < min_frame_size {
            break;
        }

        match frames::parse(header, stream)? {
            FrameResult::Frame(frame) => frames.push_boxed(frame),
            FrameResult::Dropped => continue,
            FrameResult::Padding => break,
        }
    }

    Ok(frames)
}
