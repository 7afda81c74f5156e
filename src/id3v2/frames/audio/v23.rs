use crate::core::io::BufStream;
use crate::id3v2::frames::{Frame, FrameId};
use crate::id3v2::tag::TagHeader;
use crate::id3v2::{ParseError, ParseResult};
use log::warn;
use std::fmt::{self, Display, Formatter};

/// The largest magnitude a 16-bit adjustment field can carry.
const MAX_VOLUME: i32 = 0xFFFF;

/// An ID3v2.3 relative volume adjustment frame, `RVAD`.
///
/// One fixed block of up to six channels. The sign of each adjustment lives
/// in a shared increment/decrement bit field at the front of the frame, and
/// trailing channel groups are only written when they carry data: the back
/// pair needs back, center, or bass data to appear, the center needs center
/// or bass data, and the bass only appears for bass data.
#[derive(Debug, Clone, Default)]
pub struct RelativeVolumeFrame {
    pub front_right: ChannelVolume,
    pub front_left: ChannelVolume,
    pub back_right: ChannelVolume,
    pub back_left: ChannelVolume,
    pub front_center: ChannelVolume,
    pub bass: ChannelVolume,
}

/// One channel's worth of `RVAD` data: a signed adjustment and an unsigned
/// peak, both in the frame's raw 16-bit units.
#[derive(Debug, Clone, Copy, Default, Eq, PartialEq)]
pub struct ChannelVolume {
    pub adjustment: i32,
    pub peak: u32,
}

impl ChannelVolume {
    pub fn is_zero(&self) -> bool {
        self.adjustment == 0 && self.peak == 0
    }
}

impl RelativeVolumeFrame {
    pub(crate) fn parse(stream: &mut BufStream) -> ParseResult<Self> {
        // Bit n set means channel n adjusts upward. The bit order is the
        // reverse of the field order in the rest of the frame.
        let signs = stream.read_u8()?;
        let bits = stream.read_u8()?;

        // Fields wider than 2 bytes were never defined.
        if bits == 0 || bits > 16 {
            return Err(ParseError::MalformedData);
        }

        let width = usize::from((bits + 7) / 8);
        let mut frame = RelativeVolumeFrame::default();

        frame.front_right.adjustment = signed(read_field(stream, width)?, signs & 0x01);
        frame.front_left.adjustment = signed(read_field(stream, width)?, signs & 0x02);
        frame.front_right.peak = read_field(stream, width)?;
        frame.front_left.peak = read_field(stream, width)?;

        // Everything beyond the front pair is optional.
        if !stream.is_empty() {
            frame.back_right.adjustment = signed(read_field(stream, width)?, signs & 0x04);
            frame.back_left.adjustment = signed(read_field(stream, width)?, signs & 0x08);
            frame.back_right.peak = read_field(stream, width)?;
            frame.back_left.peak = read_field(stream, width)?;
        }

        if !stream.is_empty() {
            frame.front_center.adjustment = signed(read_field(stream, width)?, signs & 0x10);
            frame.front_center.peak = read_field(stream, width)?;
        }

        if !stream.is_empty() {
            frame.bass.adjustment = signed(read_field(stream, width)?, signs & 0x20);
            frame.bass.peak = read_field(stream, width)?;
        }

        Ok(frame)
    }

    pub fn channels(&self) -> [&ChannelVolume; 6] {
        [
            &self.front_right,
            &self.front_left,
            &self.back_right,
            &self.back_left,
            &self.front_center,
            &self.bass,
        ]
    }
}

impl Frame for RelativeVolumeFrame {
    fn id(&self) -> FrameId {
        FrameId::new(b"RVAD")
    }

    fn key(&self) -> String {
        String::from("RVAD")
    }

    fn is_empty(&self) -> bool {
        self.channels().iter().all(|channel| channel.is_zero())
    }

    fn render(&self, _: &TagHeader) -> Vec<u8> {
        let mut signs = 0u8;

        for (i, channel) in self.channels().iter().enumerate() {
            if channel.adjustment > 0 {
                signs |= 1 << i;
            }
        }

        let mut result = vec![signs, 16];

        write_field(&mut result, self.front_right.adjustment.unsigned_abs());
        write_field(&mut result, self.front_left.adjustment.unsigned_abs());
        write_field(&mut result, self.front_right.peak);
        write_field(&mut result, self.front_left.peak);

        let has_bass = !self.bass.is_zero();
        let has_center = !self.front_center.is_zero() || has_bass;
        let has_back =
            !self.back_right.is_zero() || !self.back_left.is_zero() || has_center;

        if has_back {
            write_field(&mut result, self.back_right.adjustment.unsigned_abs());
            write_field(&mut result, self.back_left.adjustment.unsigned_abs());
            write_field(&mut result, self.back_right.peak);
            write_field(&mut result, self.back_left.peak);
        }

        if has_center {
            write_field(&mut result, self.front_center.adjustment.unsigned_abs());
            write_field(&mut result, self.front_center.peak);
        }

        if has_bass {
            write_field(&mut result, self.bass.adjustment.unsigned_abs());
            write_field(&mut result, self.bass.peak);
        }

        result
    }
}

impl Display for RelativeVolumeFrame {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write![
            f,
            "FR: {} FL: {}",
            self.front_right.adjustment, self.front_left.adjustment
        ]
    }
}

fn signed(magnitude: u32, sign_bit: u8) -> i32 {
    if sign_bit != 0 {
        magnitude as i32
    } else {
        -(magnitude as i32)
    }
}

fn read_field(stream: &mut BufStream, width: usize) -> ParseResult<u32> {
    let mut value = 0u32;

    for _ in 0..width {
        value = (value << 8) | u32::from(stream.read_u8()?);
    }

    Ok(value)
}

fn write_field(result: &mut Vec<u8>, value: u32) {
    let value = if value > MAX_VOLUME as u32 {
        warn!("volume field {} exceeds 16 bits, clamping", value);
        MAX_VOLUME as u32
    } else {
        value
    };

    result.extend((value as u16).to_be_bytes());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::id3v2::tag::Version;

    const RVAD_FRONT: &[u8] = b"RVAD\x00\x00\x00\x0A\x00\x00\
                                \x02\x10\
                                \x00\x0A\x00\x02\
                                \x00\x00\x00\x00";

    const RVAD_ALL: &[u8] = b"RVAD\x00\x00\x00\x1A\x00\x00\
                              \x3F\x10\
                              \x00\x10\x00\x10\x01\x00\x01\x00\
                              \x00\x08\x00\x08\x00\x80\x00\x80\
                              \x00\x04\x00\x40\
                              \x00\x02\x00\x20";

    #[test]
    fn parse_rvad() {
        make_frame!(RelativeVolumeFrame, RVAD_FRONT, Version::V23, frame);

        // Sign bit 0x01 clear: the right channel adjusts downward.
        assert_eq!(frame.front_right.adjustment, -10);
        assert_eq!(frame.front_left.adjustment, 2);
        assert!(frame.back_right.is_zero());
        assert!(frame.bass.is_zero());
    }

    #[test]
    fn parse_rvad_all_channels() {
        make_frame!(RelativeVolumeFrame, RVAD_ALL, Version::V23, frame);

        assert_eq!(frame.front_right.adjustment, 16);
        assert_eq!(frame.front_left.adjustment, 16);
        assert_eq!(frame.front_right.peak, 256);
        assert_eq!(frame.back_right.adjustment, 8);
        assert_eq!(frame.back_left.peak, 128);
        assert_eq!(frame.front_center.adjustment, 4);
        assert_eq!(frame.front_center.peak, 64);
        assert_eq!(frame.bass.adjustment, 2);
        assert_eq!(frame.bass.peak, 32);
    }

    #[test]
    fn render_rvad() {
        let frame = RelativeVolumeFrame {
            front_right: ChannelVolume {
                adjustment: -10,
                peak: 0,
            },
            front_left: ChannelVolume {
                adjustment: 2,
                peak: 0,
            },
            ..Default::default()
        };

        assert!(!frame.is_empty());
        assert_eq!(
            crate::id3v2::frames::render(
                &crate::id3v2::tag::TagHeader::with_version(Version::V23),
                &frame
            )
            .unwrap(),
            RVAD_FRONT
        );
    }

    #[test]
    fn rvad_round_trip() {
        make_frame!(RelativeVolumeFrame, RVAD_ALL, Version::V23, parsed);

        let rendered = crate::id3v2::frames::render(
            &crate::id3v2::tag::TagHeader::with_version(Version::V23),
            parsed,
        )
        .unwrap();

        assert_eq!(rendered, RVAD_ALL);
    }

    #[test]
    fn reject_wide_rvad_fields() {
        // 24-bit fields are out of spec.
        let data = b"\x03\x18\x00\x00\x0A\x00\x00\x02";
        assert!(RelativeVolumeFrame::parse(&mut BufStream::new(data)).is_err());
    }
}
