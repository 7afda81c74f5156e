use crate::core::io::BufStream;
use crate::id3v2::frames::{encoding, Frame, FrameId};
use crate::id3v2::tag::{TagHeader, Version};
use crate::id3v2::ParseResult;
use crate::string::{self, Encoding};
use log::warn;
use std::fmt::{self, Display, Formatter};

/// An attached picture frame, `APIC`.
///
/// The payload is normally binary image data, but a mime type of `-->`
/// switches it to a Latin-1 URL pointing at the image instead. ID3v2.2
/// stored a fixed 3-byte format code (`PNG`, `JPG`, ...) where later
/// versions store a NUL-terminated mime type; parsing maps the code to a
/// real mime type so the in-memory model is uniform.
#[derive(Debug, Clone)]
pub struct AttachedPictureFrame {
    pub encoding: Encoding,
    pub mime: String,
    pub pic_type: PictureType,
    pub desc: String,
    pub picture: Vec<u8>,
}

/// The mime type that marks the picture payload as a URL.
pub const URL_MIME: &str = "-->";

impl AttachedPictureFrame {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn parse(version: Version, stream: &mut BufStream) -> ParseResult<Self> {
        let encoding = encoding::parse(stream)?;

        let mut mime = match version {
            Version::V22 => upgrade_v2_format(stream.slice(3)?),
            _ => string::read_terminated(Encoding::Latin1, stream),
        };

        // image/ is implied when there is no mime type.
        if mime.is_empty() {
            mime.push_str("image/");
        }

        let type_byte = stream.read_u8()?;

        if type_byte > PictureType::PublisherLogo as u8 {
            warn!("picture type {:#04x} is out of range, using Other", type_byte);
        }

        let pic_type = PictureType::parse(type_byte);
        let desc = string::read_terminated(encoding, stream);
        let picture = stream.take_rest().to_vec();

        if picture.is_empty() {
            warn!("attached picture carries neither image data nor a URL");
        }

        Ok(Self {
            encoding,
            mime,
            pic_type,
            desc,
            picture,
        })
    }

    /// Whether the payload is a URL rather than image data.
    pub fn is_url(&self) -> bool {
        self.mime == URL_MIME
    }

    /// The picture URL, if the mime type marks the payload as one.
    pub fn url(&self) -> Option<String> {
        if self.is_url() {
            Some(string::read(
                Encoding::Latin1,
                &mut BufStream::new(&self.picture),
            ))
        } else {
            None
        }
    }
}

impl Frame for AttachedPictureFrame {
    fn id(&self) -> FrameId {
        FrameId::new(b"APIC")
    }

    fn key(&self) -> String {
        // The spec limits some picture types to one per tag, but no tagger
        // ever enforced that, so only the description is distinguishing.
        format!["APIC:{}", self.desc]
    }

    fn is_empty(&self) -> bool {
        self.picture.is_empty()
    }

    fn render(&self, tag_header: &TagHeader) -> Vec<u8> {
        let mut result = Vec::new();

        let encoding = encoding::check(self.encoding, tag_header);
        result.push(encoding::render(encoding));

        result.extend(string::render_terminated(Encoding::Latin1, &self.mime));
        result.push(self.pic_type as u8);
        result.extend(string::render_terminated(encoding, &self.desc));
        result.extend(self.picture.iter());

        result
    }
}

impl Display for AttachedPictureFrame {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write![f, "{} ", self.mime]?;

        if !self.desc.is_empty() {
            write![f, "\"{}\" ", self.desc]?;
        }

        write![f, "[{:?}]", self.pic_type]
    }
}

impl Default for AttachedPictureFrame {
    fn default() -> Self {
        Self {
            encoding: Encoding::default(),
            mime: String::new(),
            pic_type: PictureType::FrontCover,
            desc: String::new(),
            picture: Vec::new(),
        }
    }
}

fn upgrade_v2_format(code: &[u8]) -> String {
    match code {
        b"PNG" => String::from("image/png"),
        b"JPG" => String::from("image/jpeg"),
        b"BMP" => String::from("image/bmp"),
        b"GIF" => String::from("image/gif"),
        b"-->" => String::from(URL_MIME),
        _ => format!("image/{}", String::from_utf8_lossy(code).to_lowercase()),
    }
}

byte_enum! {
    pub enum PictureType {
        Other = 0x00,
        FileIcon = 0x01,
        OtherFileIcon = 0x02,
        FrontCover = 0x03,
        BackCover = 0x04,
        LeafletPage = 0x05,
        Media = 0x06,
        LeadArtist = 0x07,
        Artist = 0x08,
        Conductor = 0x09,
        Band = 0x0A,
        Composer = 0x0B,
        Writer = 0x0C,
        RecordingLocation = 0x0D,
        DuringRecording = 0x0E,
        DuringPerformance = 0x0F,
        MovieScreenCapture = 0x10,
        ColoredFish = 0x11,
        Illustration = 0x12,
        BandLogo = 0x13,
        PublisherLogo = 0x14,
    };
    PictureType::Other
}

impl Default for PictureType {
    fn default() -> Self {
        PictureType::Other
    }
}

/// A general encapsulated object frame, `GEOB`: any file at all, dropped
/// into the tag with a mime type, original filename, and description.
#[derive(Default, Debug, Clone)]
pub struct GeneralObjectFrame {
    pub encoding: Encoding,
    pub mime: String,
    pub filename: String,
    pub desc: String,
    pub data: Vec<u8>,
}

impl GeneralObjectFrame {
    pub(crate) fn parse(stream: &mut BufStream) -> ParseResult<Self> {
        let encoding = encoding::parse(stream)?;
        let mime = string::read_terminated(Encoding::Latin1, stream);
        let filename = string::read_terminated(encoding, stream);
        let desc = string::read_terminated(encoding, stream);
        let data = stream.take_rest().to_vec();

        if !mime.is_empty() && !mime.contains('/') {
            warn!("object mime type \"{}\" is not a type/subtype pair", mime);
        }

        if data.is_empty() {
            warn!("object frame carries no data");
        }

        Ok(Self {
            encoding,
            mime,
            filename,
            desc,
            data,
        })
    }
}

impl Frame for GeneralObjectFrame {
    fn id(&self) -> FrameId {
        FrameId::new(b"GEOB")
    }

    fn key(&self) -> String {
        format!["GEOB:{}", self.desc]
    }

    fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    fn render(&self, tag_header: &TagHeader) -> Vec<u8> {
        let mut result = Vec::new();

        let encoding = encoding::check(self.encoding, tag_header);
        result.push(encoding::render(encoding));

        result.extend(string::render_terminated(Encoding::Latin1, &self.mime));
        result.extend(string::render_terminated(encoding, &self.filename));
        result.extend(string::render_terminated(encoding, &self.desc));
        result.extend(self.data.iter());

        result
    }
}

impl Display for GeneralObjectFrame {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        if !self.mime.is_empty() {
            write![f, "{} ", self.mime]?;
        }

        if !self.filename.is_empty() {
            write![f, "\"{}\"", self.filename]?;
        }

        if !self.desc.is_empty() {
            write![f, " [{}]", self.desc]?;
        }

        Ok(())
    }
}
