use crate::core::io::BufStream;
use crate::id3v2::frames::{Frame, FrameId};
use crate::id3v2::tag::TagHeader;
use crate::id3v2::{ParseResult, SaveError, SaveResult};
use crate::string::{self, Encoding};
use log::warn;
use std::fmt::{self, Display, Formatter};

/// The placeholder owner the id3.org documentation reserves for unique file
/// identifiers written without one.
const UFID_PLACEHOLDER: &str = "http://www.id3.org/dummy/ufid.html";

/// The identifier field of a `UFID` frame may be at most 64 bytes.
const UFID_MAX_ID: usize = 64;

/// A unique file identifier frame, `UFID`: a database owner and an opaque
/// identifier belonging to that database.
#[derive(Debug, Clone, Default)]
pub struct FileIdFrame {
    pub owner: String,
    pub identifier: Vec<u8>,
}

impl FileIdFrame {
    pub(crate) fn parse(stream: &mut BufStream) -> ParseResult<Self> {
        let mut owner = string::read_terminated(Encoding::Latin1, stream);
        let identifier = stream.take_rest().to_vec();

        if owner.is_empty() {
            // An owner is mandatory, so a well-known placeholder is patched
            // in instead of dropping the identifier.
            warn!("missing file identifier owner, substituting placeholder");
            owner = String::from(UFID_PLACEHOLDER);
        }

        if identifier.len() > UFID_MAX_ID {
            warn!(
                "file identifier is {} bytes, the limit is {}",
                identifier.len(),
                UFID_MAX_ID
            );
        }

        Ok(Self { owner, identifier })
    }
}

impl Frame for FileIdFrame {
    fn id(&self) -> FrameId {
        FrameId::new(b"UFID")
    }

    fn key(&self) -> String {
        format!["UFID:{}", self.owner]
    }

    fn is_empty(&self) -> bool {
        self.identifier.is_empty()
    }

    fn render(&self, _: &TagHeader) -> Vec<u8> {
        let mut result = Vec::new();

        result.extend(string::render_terminated(Encoding::Latin1, &self.owner));
        result.extend(self.identifier.iter());

        result
    }
}

impl Display for FileIdFrame {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write![f, "{}", self.owner]
    }
}

/// A music CD identifier frame, `MCDI`, holding the raw CD table of
/// contents. The TOC of a 99-track disc tops out at 804 bytes, which is the
/// hard bound this frame enforces.
#[derive(Debug, Clone, Default)]
pub struct MusicCdIdFrame {
    data: Vec<u8>,
}

/// The largest possible CD table of contents.
const MCDI_MAX_TOC: usize = 804;

impl MusicCdIdFrame {
    pub(crate) fn parse(stream: &mut BufStream) -> ParseResult<Self> {
        let data = stream.take_rest().to_vec();

        if data.len() > MCDI_MAX_TOC {
            // Kept anyway. The bound is enforced on mutation, but data
            // already in a file should survive a round-trip.
            warn!("CD TOC is {} bytes, the limit is {}", data.len(), MCDI_MAX_TOC);
        }

        Ok(Self { data })
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn set_data(&mut self, data: Vec<u8>) -> SaveResult<()> {
        if data.len() > MCDI_MAX_TOC {
            return Err(SaveError::TooLarge);
        }

        self.data = data;
        Ok(())
    }
}

impl Frame for MusicCdIdFrame {
    fn id(&self) -> FrameId {
        FrameId::new(b"MCDI")
    }

    fn key(&self) -> String {
        String::from("MCDI")
    }

    fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    fn render(&self, _: &TagHeader) -> Vec<u8> {
        self.data.clone()
    }
}

impl Display for MusicCdIdFrame {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write![f, "[{}b TOC]", self.data.len()]
    }
}

/// A private frame, `PRIV`: an owner identifier and bytes only that owner
/// understands.
#[derive(Debug, Clone, Default)]
pub struct PrivateFrame {
    pub owner: String,
    pub data: Vec<u8>,
}

impl PrivateFrame {
    pub(crate) fn parse(stream: &mut BufStream) -> ParseResult<Self> {
        // When the terminator is missing entirely, everything lands in
        // `owner` and `data` stays empty, which is the lenient reading of a
        // frame that is malformed but not worth losing.
        let owner = string::read_terminated(Encoding::Latin1, stream);
        let data = stream.take_rest().to_vec();

        Ok(Self { owner, data })
    }
}

impl Frame for PrivateFrame {
    fn id(&self) -> FrameId {
        FrameId::new(b"PRIV")
    }

    fn key(&self) -> String {
        format!["PRIV:{}", self.owner]
    }

    fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    fn render(&self, _: &TagHeader) -> Vec<u8> {
        let mut result = Vec::new();

        result.extend(string::render_terminated(Encoding::Latin1, &self.owner));
        result.extend(self.data.iter());

        result
    }
}

impl Display for PrivateFrame {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write![f, "{}", self.owner]
    }
}

/// A frame this crate does not recognize.
///
/// The payload is kept verbatim and written back exactly as it came in, so
/// foreign or future frames survive any edit that does not change the tag
/// version.
#[derive(Debug, Clone)]
pub struct UnknownFrame {
    frame_id: FrameId,
    data: Vec<u8>,
}

impl UnknownFrame {
    pub(crate) fn from_stream(frame_id: FrameId, stream: &mut BufStream) -> Self {
        Self {
            frame_id,
            data: stream.take_rest().to_vec(),
        }
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }
}

impl Frame for UnknownFrame {
    fn id(&self) -> FrameId {
        self.frame_id
    }

    fn key(&self) -> String {
        self.id().to_string()
    }

    fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    fn render(&self, _: &TagHeader) -> Vec<u8> {
        self.data.clone()
    }
}

impl Display for UnknownFrame {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write![f, "[{}b of data]", self.data.len()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PRIV_DATA: &[u8] = b"PRIV\x00\x00\x00\x14\x00\x00\
                               test@test.com\0\
                               \x16\x16\x16\x16\x16\x16";

    const UFID_DATA: &[u8] = b"UFID\x00\x00\x00\x29\x00\x00\
                               http://www.id3.org/dummy/ufid.html\0\
                               \x16\x16\x16\x16\x16\x16";

    const MCDI_DATA: &[u8] = b"MCDI\x00\x00\x00\x06\x00\x00\
                               \x16\x16\x16\x16\x16\x16";

    #[test]
    fn parse_priv() {
        make_frame!(PrivateFrame, PRIV_DATA, frame);

        assert_eq!(frame.owner, "test@test.com");
        assert_eq!(frame.data, b"\x16\x16\x16\x16\x16\x16");
    }

    #[test]
    fn parse_priv_without_terminator() {
        let data = b"PRIV\x00\x00\x00\x0D\x00\x00\
                     test@test.com";

        make_frame!(PrivateFrame, data, frame);

        assert_eq!(frame.owner, "test@test.com");
        assert!(frame.data.is_empty());
    }

    #[test]
    fn parse_ufid() {
        make_frame!(FileIdFrame, UFID_DATA, frame);

        assert_eq!(frame.owner, "http://www.id3.org/dummy/ufid.html");
        assert_eq!(frame.identifier, b"\x16\x16\x16\x16\x16\x16");
    }

    #[test]
    fn repair_missing_ufid_owner() {
        let data = b"UFID\x00\x00\x00\x07\x00\x00\
                     \0\
                     \x16\x16\x16\x16\x16\x16";

        make_frame!(FileIdFrame, data, frame);

        assert_eq!(frame.owner, UFID_PLACEHOLDER);
        assert_eq!(frame.identifier, b"\x16\x16\x16\x16\x16\x16");
    }

    #[test]
    fn parse_mcdi() {
        make_frame!(MusicCdIdFrame, MCDI_DATA, frame);

        assert_eq!(frame.data(), b"\x16\x16\x16\x16\x16\x16");
    }

    #[test]
    fn bound_mcdi_mutation() {
        let mut frame = MusicCdIdFrame::default();

        assert!(frame.set_data(vec![0x16; 804]).is_ok());
        assert!(matches!(
            frame.set_data(vec![0x16; 805]),
            Err(SaveError::TooLarge)
        ));
    }

    #[test]
    fn render_priv() {
        let frame = PrivateFrame {
            owner: String::from("test@test.com"),
            data: Vec::from(&b"\x16\x16\x16\x16\x16\x16"[..]),
        };

        assert_render!(frame, PRIV_DATA);
    }

    #[test]
    fn render_ufid() {
        let frame = FileIdFrame {
            owner: String::from("http://www.id3.org/dummy/ufid.html"),
            identifier: Vec::from(&b"\x16\x16\x16\x16\x16\x16"[..]),
        };

        assert_render!(frame, UFID_DATA);
    }

    #[test]
    fn render_mcdi() {
        let mut frame = MusicCdIdFrame::default();
        frame.set_data(Vec::from(&b"\x16\x16\x16\x16\x16\x16"[..])).unwrap();

        assert_render!(frame, MCDI_DATA);
    }
}
