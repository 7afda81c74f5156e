use crate::core::io::BufStream;
use crate::id3v2::frames::{self, Frame, FrameId, FrameResult};
use crate::id3v2::frame_map::FrameMap;
use crate::id3v2::tag::TagHeader;
use crate::id3v2::ParseResult;
use crate::string::{self, Encoding};
use log::warn;
use std::fmt::{self, Display, Formatter};

/// The offset fields of a chapter use an all-ones sentinel to say "use the
/// time fields instead".
const NO_OFFSET: u32 = u32::MAX;

/// A chapter frame, `CHAP`.
///
/// A chapter spans a start and end time in milliseconds, optionally pinned
/// to byte offsets, and owns a nested set of frames (typically a `TIT2`
/// title) that apply to it alone.
#[derive(Debug, Clone, Default)]
pub struct ChapterFrame {
    pub element_id: String,
    pub start_time: u32,
    pub end_time: u32,
    pub start_offset: Option<u32>,
    pub end_offset: Option<u32>,
    pub frames: FrameMap,
}

impl ChapterFrame {
    pub(crate) fn parse(tag_header: &TagHeader, stream: &mut BufStream) -> ParseResult<Self> {
        let element_id = string::read_terminated(Encoding::Latin1, stream);

        let start_time = stream.read_u32()?;
        let end_time = stream.read_u32()?;
        let start_offset = parse_offset(stream.read_u32()?);
        let end_offset = parse_offset(stream.read_u32()?);

        let frames = parse_embedded_frames(tag_header, stream);

        Ok(Self {
            element_id,
            start_time,
            end_time,
            start_offset,
            end_offset,
            frames,
        })
    }
}

impl Frame for ChapterFrame {
    fn id(&self) -> FrameId {
        FrameId::new(b"CHAP")
    }

    fn key(&self) -> String {
        format!["CHAP:{}", self.element_id]
    }

    fn is_empty(&self) -> bool {
        false
    }

    fn render(&self, tag_header: &TagHeader) -> Vec<u8> {
        let mut result = Vec::new();

        result.extend(string::render_terminated(Encoding::Latin1, &self.element_id));
        result.extend(self.start_time.to_be_bytes());
        result.extend(self.end_time.to_be_bytes());
        result.extend(self.start_offset.unwrap_or(NO_OFFSET).to_be_bytes());
        result.extend(self.end_offset.unwrap_or(NO_OFFSET).to_be_bytes());
        result.extend(render_embedded_frames(tag_header, &self.frames));

        result
    }
}

impl Display for ChapterFrame {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write![
            f,
            "{} [{}ms..{}ms]",
            self.element_id, self.start_time, self.end_time
        ]?;

        if !self.frames.is_empty() {
            write![f, " Sub-Frames:"]?;

            for frame in self.frames.values() {
                write![f, " {}", frame.id()]?;
            }
        }

        Ok(())
    }
}

/// A table of contents frame, `CTOC`.
///
/// Orders chapters (or other tables) by their element identifiers. The
/// top-level flag marks the root of the hierarchy; the ordered flag says the
/// child sequence is meaningful rather than a loose grouping.
#[derive(Debug, Clone, Default)]
pub struct TableOfContentsFrame {
    pub element_id: String,
    pub top_level: bool,
    pub ordered: bool,
    pub elements: Vec<String>,
    pub frames: FrameMap,
}

impl TableOfContentsFrame {
    pub(crate) fn parse(tag_header: &TagHeader, stream: &mut BufStream) -> ParseResult<Self> {
        let element_id = string::read_terminated(Encoding::Latin1, stream);

        let flags = stream.read_u8()?;
        let top_level = flags & 0x2 != 0;
        let ordered = flags & 0x1 != 0;

        let entry_count = stream.read_u8()?;
        let mut elements = Vec::new();

        for _ in 0..entry_count {
            if stream.is_empty() {
                // The count byte is not always honest.
                warn!("table of contents ended before its declared entry count");
                break;
            }

            elements.push(string::read_terminated(Encoding::Latin1, stream));
        }

        let frames = parse_embedded_frames(tag_header, stream);

        Ok(Self {
            element_id,
            top_level,
            ordered,
            elements,
            frames,
        })
    }
}

impl Frame for TableOfContentsFrame {
    fn id(&self) -> FrameId {
        FrameId::new(b"CTOC")
    }

    fn key(&self) -> String {
        format!["CTOC:{}", self.element_id]
    }

    fn is_empty(&self) -> bool {
        self.elements.is_empty() && self.frames.is_empty()
    }

    fn render(&self, tag_header: &TagHeader) -> Vec<u8> {
        let mut result = Vec::new();

        result.extend(string::render_terminated(Encoding::Latin1, &self.element_id));

        let mut flags = 0u8;

        if self.top_level {
            flags |= 0x2;
        }

        if self.ordered {
            flags |= 0x1;
        }

        result.push(flags);

        let elements = &self.elements[..self.elements.len().min(255)];

        if elements.len() < self.elements.len() {
            warn!("table of contents holds more than 255 entries, truncating");
        }

        result.push(elements.len() as u8);

        for element in elements {
            result.extend(string::render_terminated(Encoding::Latin1, element));
        }

        result.extend(render_embedded_frames(tag_header, &self.frames));

        result
    }
}

impl Display for TableOfContentsFrame {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write![f, "{}", self.element_id]?;

        if !self.elements.is_empty() {
            write![f, ", Elements:"]?;

            for entry in &self.elements {
                write![f, " {}", entry]?;
            }
        }

        Ok(())
    }
}

fn parse_offset(raw: u32) -> Option<u32> {
    if raw == NO_OFFSET {
        None
    } else {
        Some(raw)
    }
}

/// Walks the remainder of a `CHAP`/`CTOC` body as a nested frame sequence.
fn parse_embedded_frames(tag_header: &TagHeader, stream: &mut BufStream) -> FrameMap {
    let mut frames = FrameMap::new();

    while !stream.is_empty() {
        match frames::parse(tag_header, stream) {
            Ok(FrameResult::Frame(frame)) => frames.push_boxed(frame),
            Ok(FrameResult::Dropped) => continue,
            Ok(FrameResult::Padding) => break,
            Err(_) => {
                warn!("embedded frame data ended abruptly");
                break;
            }
        }
    }

    frames
}

fn render_embedded_frames(tag_header: &TagHeader, frames: &FrameMap) -> Vec<u8> {
    let mut result = Vec::new();

    for frame in frames.all() {
        match frames::render(tag_header, frame) {
            Ok(data) => result.extend(data),
            Err(err) => warn!("dropping embedded frame {}: {}", frame.id(), err),
        }
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::id3v2::frames::TextFrame;
    use crate::id3v2::tag::Version;

    const EMPTY_CHAP: &[u8] = b"CHAP\x00\x00\x00\x15\x00\x00\
                                chp1\0\
                                \x00\x00\x00\x00\
                                \x00\x0A\xBC\xDE\
                                \x16\x16\x16\x16\
                                \xFF\xFF\xFF\xFF";

    const FULL_CHAP: &[u8] = b"CHAP\x00\x00\x00\x29\x00\x00\
                               chp1\0\
                               \x00\x00\x00\x00\
                               \x00\x0A\xBC\xDE\
                               \xFF\xFF\xFF\xFF\
                               \xFF\xFF\xFF\xFF\
                               TIT2\x00\x00\x00\x0A\x00\x00\
                               \x00\
                               Chapter 1";

    const FULL_CTOC: &[u8] = b"CTOC\x00\x00\x00\x27\x00\x00\
                               toc1\0\
                               \x03\x03\
                               chp1\0chp2\0chp3\0\
                               TIT2\x00\x00\x00\x07\x00\x00\
                               \x00\
                               Part 1";

    #[test]
    fn parse_chap() {
        make_frame!(ChapterFrame, EMPTY_CHAP, frame);

        assert_eq!(frame.element_id, "chp1");
        assert_eq!(frame.start_time, 0);
        assert_eq!(frame.end_time, 0xABCDE);
        assert_eq!(frame.start_offset, Some(0x16161616));
        assert_eq!(frame.end_offset, None);
        assert!(frame.frames.is_empty());
    }

    #[test]
    fn parse_chap_with_frames() {
        make_frame!(ChapterFrame, FULL_CHAP, frame);

        assert_eq!(frame.element_id, "chp1");
        assert_eq!(frame.start_offset, None);
        assert_eq!(frame.end_offset, None);

        let title = frame.frames.get(b"TIT2").unwrap();
        assert_eq!(title.downcast::<TextFrame>().unwrap().text, &["Chapter 1"]);
    }

    #[test]
    fn parse_ctoc() {
        make_frame!(TableOfContentsFrame, FULL_CTOC, frame);

        assert_eq!(frame.element_id, "toc1");
        assert!(frame.top_level);
        assert!(frame.ordered);
        assert_eq!(frame.elements, &["chp1", "chp2", "chp3"]);

        let title = frame.frames.get(b"TIT2").unwrap();
        assert_eq!(title.downcast::<TextFrame>().unwrap().text, &["Part 1"]);
    }

    #[test]
    fn render_chap() {
        let mut frame = ChapterFrame {
            element_id: String::from("chp1"),
            start_time: 0,
            end_time: 0xABCDE,
            start_offset: None,
            end_offset: None,
            ..Default::default()
        };

        frame.frames.add(text_frame! {
            b"TIT2",
            Encoding::Latin1,
            "Chapter 1"
        });

        assert_render!(frame, FULL_CHAP);
    }

    #[test]
    fn render_ctoc() {
        let mut frame = TableOfContentsFrame {
            element_id: String::from("toc1"),
            top_level: true,
            ordered: true,
            elements: vec![
                String::from("chp1"),
                String::from("chp2"),
                String::from("chp3"),
            ],
            ..Default::default()
        };

        frame.frames.add(text_frame! {
            b"TIT2",
            Encoding::Latin1,
            "Part 1"
        });

        assert_render!(frame, FULL_CTOC);
    }

    #[test]
    fn chapter_round_trips_through_both_versions() {
        for version in [Version::V23, Version::V24] {
            let header = TagHeader::with_version(version);
            let mut frame = ChapterFrame {
                element_id: String::from("chp1"),
                end_time: 60_000,
                ..Default::default()
            };

            frame.frames.add(text_frame! { b"TIT2"; "One" });

            let data = frames::render(&header, &frame).unwrap();
            let result = frames::parse(&header, &mut BufStream::new(&data)).unwrap();

            let parsed = match result {
                FrameResult::Frame(parsed) => parsed,
                _ => panic!("expected a frame"),
            };

            let parsed = parsed.downcast::<ChapterFrame>().unwrap();

            assert_eq!(parsed.element_id, frame.element_id);
            assert_eq!(parsed.end_time, frame.end_time);
            assert_eq!(parsed.frames.len(), 1);
        }
    }
}
