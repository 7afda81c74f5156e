use crate::core::io::BufStream;
use crate::id3v2::frames::{encoding, Frame, FrameId};
use crate::id3v2::tag::TagHeader;
use crate::id3v2::ParseResult;
use crate::string::{self, Encoding};
use std::fmt::{self, Display, Formatter};

/// A generic URL link frame. URLs are always Latin-1.
#[derive(Debug, Clone)]
pub struct UrlFrame {
    frame_id: FrameId,
    pub url: String,
}

impl UrlFrame {
    pub fn new(frame_id: FrameId) -> Self {
        if !frame_id.starts_with(b'W') {
            panic!("UrlFrame IDs must start with a W");
        }

        if frame_id == b"WXXX" {
            panic!("UrlFrame cannot encode WXXX frames, use UserUrlFrame instead");
        }

        // Apple's WFED [Podcast URL] is a text frame wearing a URL frame's
        // identifier. Encoding it here would break the tag.
        if frame_id == b"WFED" {
            panic!("UrlFrame cannot encode iTunes WFED frames, use TextFrame instead");
        }

        Self {
            frame_id,
            url: String::new(),
        }
    }

    pub(crate) fn parse(frame_id: FrameId, stream: &mut BufStream) -> ParseResult<Self> {
        let url = string::read(Encoding::Latin1, stream);

        Ok(Self { frame_id, url })
    }
}

impl Frame for UrlFrame {
    fn id(&self) -> FrameId {
        self.frame_id
    }

    fn key(&self) -> String {
        self.id().to_string()
    }

    fn is_empty(&self) -> bool {
        self.url.is_empty()
    }

    fn render(&self, _: &TagHeader) -> Vec<u8> {
        string::render(Encoding::Latin1, &self.url)
    }
}

impl Display for UrlFrame {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write![f, "{}", self.url]
    }
}

/// A user-defined URL frame, `WXXX`, distinguished by its description.
#[derive(Debug, Clone, Default)]
pub struct UserUrlFrame {
    pub encoding: Encoding,
    pub desc: String,
    pub url: String,
}

impl UserUrlFrame {
    pub(crate) fn parse(stream: &mut BufStream) -> ParseResult<Self> {
        let encoding = encoding::parse(stream)?;
        let desc = string::read_terminated(encoding, stream);
        let url = string::read(Encoding::Latin1, stream);

        Ok(Self {
            encoding,
            desc,
            url,
        })
    }
}

impl Frame for UserUrlFrame {
    fn id(&self) -> FrameId {
        FrameId::new(b"WXXX")
    }

    fn key(&self) -> String {
        format!["WXXX:{}", self.desc]
    }

    fn is_empty(&self) -> bool {
        self.url.is_empty()
    }

    fn render(&self, tag_header: &TagHeader) -> Vec<u8> {
        let mut result = Vec::new();

        let encoding = encoding::check(self.encoding, tag_header);
        result.push(encoding::render(encoding));

        result.extend(string::render_terminated(encoding, &self.desc));
        result.extend(string::render(Encoding::Latin1, &self.url));

        result
    }
}

impl Display for UserUrlFrame {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write![f, "{}", self.url]
    }
}
