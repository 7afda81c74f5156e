/// Generates a [`TextFrame`](crate::id3v2::frames::TextFrame) from an ID and
/// a list of text strings, with an optional
/// [`Encoding`](crate::string::Encoding) between the two.
///
/// ```
/// use minuet::{text_frame, id3v2::frames::Frame};
///
/// let frame = text_frame! { b"TIT2"; "Song Title" };
///
/// assert_eq!(frame.id(), b"TIT2");
/// assert_eq!(frame.text[0], "Song Title");
/// ```
#[macro_export]
macro_rules! text_frame {
    ($id:expr) => {
        {
            $crate::id3v2::frames::TextFrame::new($crate::id3v2::frames::FrameId::new($id))
        }
    };
    ($id:expr; $($text:expr),+ $(,)?) => {
        {
            let mut frame = $crate::id3v2::frames::TextFrame::new($crate::id3v2::frames::FrameId::new($id));
            frame.text = vec![$(String::from($text),)*];
            frame
        }
    };
    ($id:expr, $enc:expr, $($text:expr),+ $(,)?) => {
        {
            let mut frame = $crate::id3v2::frames::TextFrame::new($crate::id3v2::frames::FrameId::new($id));
            frame.encoding = $enc;
            frame.text = vec![$(String::from($text),)*];
            frame
        }
    };
}

// --- Internal macros ---

macro_rules! is_id {
    ($id:expr, $($ids:expr),+ $(,)?) => {
        {
            matches!($id.inner(), $($ids)|*)
        }
    }
}

#[cfg(test)]
macro_rules! make_frame {
    ($dty:ty, $data:expr, $dest:ident) => {
        make_frame!($dty, $data, crate::id3v2::tag::Version::V24, $dest)
    };

    ($dty:ty, $data:expr, $ver:expr, $dest:ident) => {
        let parsed = crate::id3v2::frames::parse(
            &crate::id3v2::tag::TagHeader::with_version($ver),
            &mut crate::core::io::BufStream::new($data),
        )
        .unwrap();

        let frame = if let crate::id3v2::frames::FrameResult::Frame(frame) = parsed {
            frame
        } else {
            panic!("expected a frame")
        };

        let $dest = frame.downcast::<$dty>().unwrap();
    };
}

#[cfg(test)]
macro_rules! assert_render {
    ($frame:expr, $data:expr) => {
        assert!(!$frame.is_empty());
        assert_eq!(
            crate::id3v2::frames::render(
                &crate::id3v2::tag::TagHeader::with_version(crate::id3v2::tag::Version::V24),
                &$frame
            )
            .unwrap(),
            $data
        )
    };
}
