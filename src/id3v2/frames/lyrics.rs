use crate::core::io::BufStream;
use crate::id3v2::frames::{encoding, Frame, FrameId, Language};
use crate::id3v2::tag::TagHeader;
use crate::id3v2::ParseResult;
use crate::string::{self, Encoding};
use std::fmt::{self, Display, Formatter};

/// An unsynchronized lyrics frame, `USLT`.
///
/// "Unsynchronized" here means plain text without per-line timestamps, and
/// has nothing to do with the unsynchronization byte transform.
#[derive(Default, Debug, Clone)]
pub struct LyricsFrame {
    pub encoding: Encoding,
    pub lang: Language,
    pub desc: String,
    pub lyrics: String,
}

impl LyricsFrame {
    pub(crate) fn parse(stream: &mut BufStream) -> ParseResult<Self> {
        let encoding = encoding::parse(stream)?;
        let lang = Language::parse(stream)?;
        let desc = string::read_terminated(encoding, stream);
        let lyrics = string::read(encoding, stream);

        Ok(Self {
            encoding,
            lang,
            desc,
            lyrics,
        })
    }
}

impl Frame for LyricsFrame {
    fn id(&self) -> FrameId {
        FrameId::new(b"USLT")
    }

    fn key(&self) -> String {
        format!["USLT:{}:{}", self.desc, self.lang]
    }

    fn is_empty(&self) -> bool {
        self.lyrics.is_empty()
    }

    fn render(&self, tag_header: &TagHeader) -> Vec<u8> {
        let mut result = Vec::new();

        let encoding = encoding::check(self.encoding, tag_header);
        result.push(encoding::render(encoding));
        result.extend(&self.lang);

        result.extend(string::render_terminated(encoding, &self.desc));
        result.extend(string::render(encoding, &self.lyrics));

        result
    }
}

impl Display for LyricsFrame {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        if !self.desc.is_empty() {
            writeln![f, "{}:", self.desc]?;
        }

        write![f, "{}", self.lyrics]
    }
}
