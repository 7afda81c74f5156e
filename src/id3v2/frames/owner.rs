use crate::core::io::BufStream;
use crate::id3v2::frames::{encoding, Frame, FrameId, Language};
use crate::id3v2::tag::TagHeader;
use crate::id3v2::ParseResult;
use crate::string::{self, Encoding};
use std::fmt::{self, Display, Formatter};

/// A terms-of-use frame, `USER`. Unlike a comment, it carries no
/// description, so only one frame per language can exist.
#[derive(Default, Debug, Clone)]
pub struct TermsOfUseFrame {
    pub encoding: Encoding,
    pub lang: Language,
    pub text: String,
}

impl TermsOfUseFrame {
    pub(crate) fn parse(stream: &mut BufStream) -> ParseResult<Self> {
        let encoding = encoding::parse(stream)?;
        let lang = Language::parse(stream)?;
        let text = string::read(encoding, stream);

        Ok(Self {
            encoding,
            lang,
            text,
        })
    }
}

impl Frame for TermsOfUseFrame {
    fn id(&self) -> FrameId {
        FrameId::new(b"USER")
    }

    fn key(&self) -> String {
        format!["USER:{}", self.lang]
    }

    fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    fn render(&self, tag_header: &TagHeader) -> Vec<u8> {
        let mut result = Vec::new();

        let encoding = encoding::check(self.encoding, tag_header);
        result.push(encoding::render(encoding));
        result.extend(&self.lang);
        result.extend(string::render(encoding, &self.text));

        result
    }
}

impl Display for TermsOfUseFrame {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write![f, "{}", self.text]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::string::Encoding;

    const USER_DATA: &[u8] = b"USER\x00\x00\x00\x25\x00\x00\
                               \x00\
                               eng\
                               2020 Terms of use not to be worded";

    #[test]
    fn parse_user() {
        make_frame!(TermsOfUseFrame, USER_DATA, frame);

        assert_eq!(frame.encoding, Encoding::Latin1);
        assert_eq!(frame.lang, b"eng");
        assert_eq!(frame.text, "2020 Terms of use not to be worded");
    }

    #[test]
    fn render_user() {
        let frame = TermsOfUseFrame {
            encoding: Encoding::Latin1,
            lang: Language::new(b"eng").unwrap(),
            text: String::from("2020 Terms of use not to be worded"),
        };

        assert_render!(frame, USER_DATA);
    }
}
