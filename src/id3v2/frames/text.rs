use crate::core::io::BufStream;
use crate::id3v2::frames::{encoding, Frame, FrameId};
use crate::id3v2::tag::TagHeader;
use crate::id3v2::ParseResult;
use crate::string::{self, Encoding};
use std::fmt::{self, Display, Formatter};

/// A generic text information frame.
///
/// All `T`-prefixed frames except `TXXX` and the timestamp family share one
/// payload layout: an encoding byte followed by one or more NUL-separated
/// strings. Multiple values were only blessed by ID3v2.4, but taggers wrote
/// them into older tags long before that, so they are accepted everywhere.
#[derive(Debug, Clone)]
pub struct TextFrame {
    frame_id: FrameId,
    pub encoding: Encoding,
    pub text: Vec<String>,
}

impl TextFrame {
    pub fn new(frame_id: FrameId) -> Self {
        if !Self::is_id(frame_id) {
            panic!("expected a valid text frame id, found {}", frame_id);
        }

        Self {
            frame_id,
            encoding: Encoding::default(),
            text: Vec::new(),
        }
    }

    pub(crate) fn parse(frame_id: FrameId, stream: &mut BufStream) -> ParseResult<Self> {
        let encoding = encoding::parse(stream)?;
        let text = parse_text(encoding, stream);

        Ok(Self {
            frame_id,
            encoding,
            text,
        })
    }

    pub fn is_id(frame_id: FrameId) -> bool {
        is_id!(
            // Text
            frame_id, b"TALB", b"TCOM", b"TCON", b"TCOP", b"TENC", b"TEXT", b"TFLT", b"TIT1",
            b"TIT2", b"TIT3", b"TKEY", b"TLAN", b"TMED", b"TOAL", b"TOFN", b"TOLY", b"TOPE",
            b"TOWN", b"TPE1", b"TPE2", b"TPE3", b"TPE4", b"TPUB", b"TRSN", b"TRSO", b"TSRC",
            b"TSSE", b"TRDA", b"TMOO", b"TPRO", b"TSST", b"TSO2", b"TSOC", b"TCAT", b"TDES",
            b"TGID",
            // Sort order, both the ID3v2.4 frames and the historic X-prefixed
            // versions some taggers wrote into ID3v2.3
            b"TSOA", b"TSOP", b"TSOT", b"XSOA", b"XSOP", b"XSOT",
            // Numeric
            b"TLEN", b"TDAT", b"TIME", b"TSIZ", b"TCMP", b"TDLY", b"TBPM",
            // Numeric part
            b"TPOS", b"TRCK",
            // iTunes WFED [Podcast URL], MVNM [Movement Name], MVIN [Movement
            // Number], and GRP1 [Grouping] are all actually text frames
            b"WFED", b"MVNM", b"MVIN", b"GRP1"
        )
    }
}

impl Frame for TextFrame {
    fn id(&self) -> FrameId {
        self.frame_id
    }

    fn key(&self) -> String {
        self.id().to_string()
    }

    fn is_empty(&self) -> bool {
        self.text.iter().all(|text| text.is_empty())
    }

    fn render(&self, tag_header: &TagHeader) -> Vec<u8> {
        let mut result = Vec::new();

        let encoding = encoding::check(self.encoding, tag_header);
        result.push(encoding::render(encoding));

        result.extend(render_text(encoding, &self.text));

        result
    }
}

impl Display for TextFrame {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        fmt_text(&self.text, f)
    }
}

/// A user-defined text frame, `TXXX`.
///
/// The description acts as the frame's name and is what keeps multiple
/// `TXXX` frames in one tag apart.
#[derive(Debug, Clone, Default)]
pub struct UserTextFrame {
    pub encoding: Encoding,
    pub desc: String,
    pub text: Vec<String>,
}

impl UserTextFrame {
    pub(crate) fn parse(stream: &mut BufStream) -> ParseResult<Self> {
        let encoding = encoding::parse(stream)?;
        let desc = string::read_terminated(encoding, stream);
        let text = parse_text(encoding, stream);

        Ok(Self {
            encoding,
            desc,
            text,
        })
    }
}

impl Frame for UserTextFrame {
    fn id(&self) -> FrameId {
        FrameId::new(b"TXXX")
    }

    fn key(&self) -> String {
        format!["TXXX:{}", self.desc]
    }

    fn is_empty(&self) -> bool {
        self.text.iter().all(|text| text.is_empty())
    }

    fn render(&self, tag_header: &TagHeader) -> Vec<u8> {
        let mut result = Vec::new();

        let encoding = encoding::check(self.encoding, tag_header);
        result.push(encoding::render(encoding));

        result.extend(string::render_terminated(encoding, &self.desc));
        result.extend(render_text(encoding, &self.text));

        result
    }
}

impl Display for UserTextFrame {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        fmt_text(&self.text, f)
    }
}

pub(crate) fn parse_text(encoding: Encoding, stream: &mut BufStream) -> Vec<String> {
    let mut text = Vec::new();

    while !stream.is_empty() {
        text.push(string::read_terminated(encoding, stream));
    }

    if text.is_empty() {
        text.push(String::new());
    }

    text
}

pub(crate) fn render_text(encoding: Encoding, text: &[String]) -> Vec<u8> {
    let mut result = Vec::new();

    for (i, string) in text.iter().enumerate() {
        if i > 0 {
            result.resize(result.len() + encoding.nul_size(), 0);
        }

        result.extend(string::render(encoding, string));
    }

    result
}

fn fmt_text(text: &[String], f: &mut Formatter) -> fmt::Result {
    for (i, string) in text.iter().enumerate() {
        if i > 0 {
            write![f, ", "]?;
        }

        write![f, "{}", string]?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::id3v2::tag::{TagHeader, Version};

    const TIT2_DATA: &[u8] = b"TIT2\x00\x00\x00\x0A\x00\x00\
                               \x00\
                               Tag Title";

    const MULTI_DATA: &[u8] = b"TPE1\x00\x00\x00\x12\x00\x00\
                                \x00\
                                Artist 1\0Artist 2";

    const TXXX_DATA: &[u8] = b"TXXX\x00\x00\x00\x17\x00\x00\
                               \x00\
                               replaygain_gain\0\
                               -7.429";

    #[test]
    fn parse_text_frame() {
        make_frame!(TextFrame, TIT2_DATA, frame);

        assert_eq!(frame.id(), b"TIT2");
        assert_eq!(frame.encoding, Encoding::Latin1);
        assert_eq!(frame.text, &["Tag Title"]);
    }

    #[test]
    fn parse_multi_value_text() {
        make_frame!(TextFrame, MULTI_DATA, frame);

        assert_eq!(frame.text, &["Artist 1", "Artist 2"]);
    }

    #[test]
    fn parse_txxx() {
        make_frame!(UserTextFrame, TXXX_DATA, frame);

        assert_eq!(frame.desc, "replaygain_gain");
        assert_eq!(frame.text, &["-7.429"]);
    }

    #[test]
    fn render_text_frame() {
        let frame = text_frame! {
            b"TIT2",
            Encoding::Latin1,
            "Tag Title"
        };

        assert_render!(frame, TIT2_DATA);
    }

    #[test]
    fn render_multi_value_text() {
        let frame = text_frame! {
            b"TPE1",
            Encoding::Latin1,
            "Artist 1", "Artist 2"
        };

        assert_render!(frame, MULTI_DATA);
    }

    #[test]
    fn render_txxx() {
        let frame = UserTextFrame {
            encoding: Encoding::Latin1,
            desc: String::from("replaygain_gain"),
            text: vec![String::from("-7.429")],
        };

        assert_render!(frame, TXXX_DATA);
    }

    #[test]
    fn downgrade_encoding_on_old_versions() {
        let frame = text_frame! {
            b"TIT2",
            Encoding::Utf8,
            "abc"
        };

        let data = frame.render(&TagHeader::with_version(Version::V23));

        // UTF-8 is not expressible before ID3v2.4, so the frame falls back
        // to UTF-16 with a BOM.
        assert_eq!(data[0], 0x01);
        assert_eq!(&data[1..3], b"\xFF\xFE");
    }
}
