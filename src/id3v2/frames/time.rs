use crate::core::io::BufStream;
use crate::id3v2::frames::{encoding, Frame, FrameId};
use crate::id3v2::tag::TagHeader;
use crate::id3v2::{ParseError, ParseResult};
use crate::string::{self, Encoding};
use log::warn;
use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

/// A timestamp of variable precision.
///
/// ID3v2.4 timestamps are the subset of ISO 8601 going
/// `yyyy[-MM[-dd[THH[:mm[:ss]]]]]`: a year with optionally finer and finer
/// fields behind it. Precision always grows front-to-back, so a date cannot
/// carry a day without a month or a minute without an hour. [`Date::new`]
/// and the fallible setters keep that invariant intact.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Ord, PartialOrd)]
pub struct Date {
    year: u16,
    month: Option<u8>,
    day: Option<u8>,
    hour: Option<u8>,
    minute: Option<u8>,
    second: Option<u8>,
}

impl Date {
    pub fn new(year: u16) -> Self {
        Self {
            year,
            month: None,
            day: None,
            hour: None,
            minute: None,
            second: None,
        }
    }

    pub fn year(&self) -> u16 {
        self.year
    }

    pub fn month(&self) -> Option<u8> {
        self.month
    }

    pub fn day(&self) -> Option<u8> {
        self.day
    }

    pub fn hour(&self) -> Option<u8> {
        self.hour
    }

    pub fn minute(&self) -> Option<u8> {
        self.minute
    }

    pub fn second(&self) -> Option<u8> {
        self.second
    }

    pub fn set_month(&mut self, month: u8) -> ParseResult<()> {
        if !(1..=12).contains(&month) {
            return Err(ParseError::MalformedData);
        }

        self.month = Some(month);
        Ok(())
    }

    pub fn set_day(&mut self, day: u8) -> ParseResult<()> {
        if self.month.is_none() || !(1..=31).contains(&day) {
            return Err(ParseError::MalformedData);
        }

        self.day = Some(day);
        Ok(())
    }

    pub fn set_hour(&mut self, hour: u8) -> ParseResult<()> {
        if self.day.is_none() || hour > 23 {
            return Err(ParseError::MalformedData);
        }

        self.hour = Some(hour);
        Ok(())
    }

    pub fn set_minute(&mut self, minute: u8) -> ParseResult<()> {
        if self.hour.is_none() || minute > 59 {
            return Err(ParseError::MalformedData);
        }

        self.minute = Some(minute);
        Ok(())
    }

    pub fn set_second(&mut self, second: u8) -> ParseResult<()> {
        if self.minute.is_none() || second > 59 {
            return Err(ParseError::MalformedData);
        }

        self.second = Some(second);
        Ok(())
    }

    /// Whether this date carries anything beyond the year.
    pub fn has_date(&self) -> bool {
        self.month.is_some()
    }

    /// Whether this date carries a time of day.
    pub fn has_time(&self) -> bool {
        self.hour.is_some()
    }
}

impl FromStr for Date {
    type Err = ParseError;

    fn from_str(text: &str) -> ParseResult<Self> {
        let text = text.trim();

        // The time half can be glued on with the standard T or, from sloppier
        // taggers, a space.
        let (date_part, time_part) = match text.find(|ch| ch == 'T' || ch == ' ') {
            Some(at) => (&text[..at], Some(&text[at + 1..])),
            None => (text, None),
        };

        let mut fields = date_part.split('-');

        let year = fields
            .next()
            .and_then(|year| year.parse::<u16>().ok())
            .filter(|_| date_part.len() >= 4)
            .ok_or(ParseError::MalformedData)?;

        let mut date = Date::new(year);

        if let Some(month) = fields.next() {
            date.set_month(parse_field(month)?)?;

            if let Some(day) = fields.next() {
                date.set_day(parse_field(day)?)?;
            }
        }

        if fields.next().is_some() {
            return Err(ParseError::MalformedData);
        }

        if let Some(time_part) = time_part {
            let mut fields = time_part.split(':');

            if let Some(hour) = fields.next() {
                date.set_hour(parse_field(hour)?)?;

                if let Some(minute) = fields.next() {
                    date.set_minute(parse_field(minute)?)?;

                    if let Some(second) = fields.next() {
                        date.set_second(parse_field(second)?)?;
                    }
                }
            }

            if fields.next().is_some() {
                return Err(ParseError::MalformedData);
            }
        }

        Ok(date)
    }
}

fn parse_field(field: &str) -> ParseResult<u8> {
    if field.len() != 2 {
        return Err(ParseError::MalformedData);
    }

    field.parse().map_err(|_| ParseError::MalformedData)
}

impl Display for Date {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write![f, "{:04}", self.year]?;

        if let Some(month) = self.month {
            write![f, "-{:02}", month]?;

            if let Some(day) = self.day {
                write![f, "-{:02}", day]?;

                if let Some(hour) = self.hour {
                    write![f, "T{:02}", hour]?;

                    if let Some(minute) = self.minute {
                        write![f, ":{:02}", minute]?;

                        if let Some(second) = self.second {
                            write![f, ":{:02}", second]?;
                        }
                    }
                }
            }
        }

        Ok(())
    }
}

/// A timestamp frame.
///
/// Covers the ID3v2.4 timestamp family (`TDEN`, `TDOR`, `TDRC`, `TDRL`,
/// `TDTG`) and the ID3v2.3 year fields (`TYER`, `TORY`, `XDOR`), all of
/// which must hold ISO-8601-shaped text. Unparseable text resets the frame
/// to empty with a warning rather than killing the tag, and rendering is
/// always Latin-1 no matter what the rest of the tag uses, since a
/// timestamp can never contain anything outside ASCII.
#[derive(Debug, Clone)]
pub struct DateFrame {
    frame_id: FrameId,
    pub date: Option<Date>,
}

impl DateFrame {
    pub fn new(frame_id: FrameId) -> Self {
        if !Self::is_id(frame_id) {
            panic!("expected a valid date frame id, found {}", frame_id);
        }

        Self {
            frame_id,
            date: None,
        }
    }

    pub(crate) fn parse(frame_id: FrameId, stream: &mut BufStream) -> ParseResult<Self> {
        let encoding = encoding::parse(stream)?;
        let text = string::read(encoding, stream);

        let date = match text.trim() {
            "" => None,
            text => match Date::from_str(text) {
                Ok(date) => Some(date),
                Err(_) => {
                    warn!("invalid timestamp \"{}\" in {}, resetting", text, frame_id);
                    None
                }
            },
        };

        Ok(Self { frame_id, date })
    }

    pub fn is_id(frame_id: FrameId) -> bool {
        is_id!(
            frame_id, b"TDEN", b"TDOR", b"TDRC", b"TDRL", b"TDTG", b"TYER", b"TORY", b"XDOR"
        )
    }
}

impl Frame for DateFrame {
    fn id(&self) -> FrameId {
        self.frame_id
    }

    fn key(&self) -> String {
        self.id().to_string()
    }

    fn is_empty(&self) -> bool {
        self.date.is_none()
    }

    fn render(&self, _: &TagHeader) -> Vec<u8> {
        let mut result = vec![encoding::render(Encoding::Latin1)];

        if let Some(date) = &self.date {
            result.extend(string::render(Encoding::Latin1, &date.to_string()));
        }

        result
    }
}

impl Display for DateFrame {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        match &self.date {
            Some(date) => write![f, "{}", date],
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TDRC_DATA: &[u8] = b"TDRC\x00\x00\x00\x14\x00\x00\
                               \x00\
                               1977-06-03T04:30:15";

    #[test]
    fn parse_date_precision() {
        let date = Date::from_str("1977").unwrap();
        assert_eq!(date.year(), 1977);
        assert_eq!(date.month(), None);

        let date = Date::from_str("1977-06-03").unwrap();
        assert_eq!(date.month(), Some(6));
        assert_eq!(date.day(), Some(3));
        assert!(!date.has_time());

        let date = Date::from_str("1977-06-03T04:30").unwrap();
        assert_eq!(date.hour(), Some(4));
        assert_eq!(date.minute(), Some(30));
        assert_eq!(date.second(), None);
    }

    #[test]
    fn reject_invalid_dates() {
        assert!(Date::from_str("abcd").is_err());
        assert!(Date::from_str("1977-13").is_err());
        assert!(Date::from_str("1977-00").is_err());
        assert!(Date::from_str("1977-06-32").is_err());
        assert!(Date::from_str("197").is_err());
    }

    #[test]
    fn date_display_round_trips() {
        for text in ["1977", "1977-06", "1977-06-03", "1977-06-03T04", "1977-06-03T04:30:15"] {
            assert_eq!(Date::from_str(text).unwrap().to_string(), text);
        }
    }

    #[test]
    fn precision_cannot_skip_fields() {
        let mut date = Date::new(2004);
        assert!(date.set_day(4).is_err());
        assert!(date.set_hour(12).is_err());

        date.set_month(11).unwrap();
        date.set_day(4).unwrap();
        assert!(date.set_minute(30).is_err());
    }

    #[test]
    fn parse_date_frame() {
        make_frame!(DateFrame, TDRC_DATA, frame);

        assert_eq!(frame.id(), b"TDRC");
        assert_eq!(frame.date, Some(Date::from_str("1977-06-03T04:30:15").unwrap()));
    }

    #[test]
    fn invalid_date_text_resets() {
        let data = b"TDRC\x00\x00\x00\x09\x00\x00\
                     \x00\
                     6/3/1977";

        make_frame!(DateFrame, data, frame);

        assert_eq!(frame.date, None);
        assert!(frame.is_empty());
    }

    #[test]
    fn render_date_frame() {
        let mut frame = DateFrame::new(FrameId::new(b"TDRC"));
        frame.date = Some(Date::from_str("1977-06-03T04:30:15").unwrap());

        assert_render!(frame, TDRC_DATA);
    }

    #[test]
    fn date_frame_forces_latin1() {
        let mut frame = DateFrame::new(FrameId::new(b"TYER"));
        frame.date = Some(Date::new(1977));

        let data = frame.render(&crate::id3v2::tag::TagHeader::with_version(
            crate::id3v2::tag::Version::V24,
        ));

        assert_eq!(data, b"\x001977");
    }
}
