use crate::core::io::BufStream;
use crate::id3v2::frames::{Frame, FrameId};
use crate::id3v2::tag::TagHeader;
use crate::id3v2::ParseResult;
use crate::string::{self, Encoding};
use log::warn;
use std::collections::BTreeMap;
use std::fmt::{self, Display, Formatter};

/// An ID3v2.4 relative volume adjustment frame, `RVA2`.
///
/// A list of per-channel records, each carrying a gain in 1/512 dB units
/// and an optional raw peak of configurable bit width. Multiple frames per
/// tag are legal as long as their descriptions differ.
#[derive(Debug, Clone, Default)]
pub struct RelativeVolumeFrame2 {
    pub desc: String,
    pub channels: BTreeMap<Channel, VolumeAdjustment>,
}

impl RelativeVolumeFrame2 {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn parse(stream: &mut BufStream) -> ParseResult<Self> {
        let desc = string::read_terminated(Encoding::Latin1, stream);

        let mut channels = BTreeMap::new();

        while !stream.is_empty() {
            let channel = Channel::parse(stream.read_u8()?);
            let gain = Volume::parse(stream)?;
            let peak = parse_peak(stream)?;

            // First record for a channel wins.
            channels
                .entry(channel)
                .or_insert(VolumeAdjustment { gain, peak });
        }

        Ok(Self { desc, channels })
    }
}

impl Frame for RelativeVolumeFrame2 {
    fn id(&self) -> FrameId {
        FrameId::new(b"RVA2")
    }

    fn key(&self) -> String {
        format!["RVA2:{}", self.desc]
    }

    fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    fn render(&self, _: &TagHeader) -> Vec<u8> {
        let mut result = Vec::new();

        result.extend(string::render_terminated(Encoding::Latin1, &self.desc));

        for (&channel, adjustment) in &self.channels {
            result.push(channel as u8);
            result.extend(adjustment.gain.to_bytes());
            render_peak(&mut result, adjustment.peak);
        }

        result
    }
}

impl Display for RelativeVolumeFrame2 {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write![f, "{}", self.desc]
    }
}

byte_enum! {
    #[derive(Ord, PartialOrd)]
    pub enum Channel {
        Other = 0x00,
        MasterVolume = 0x01,
        FrontRight = 0x02,
        FrontLeft = 0x03,
        BackRight = 0x04,
        BackLeft = 0x05,
        FrontCenter = 0x06,
        BackCenter = 0x07,
        Subwoofer = 0x08,
    };
    Channel::Other
}

impl Default for Channel {
    fn default() -> Self {
        Channel::MasterVolume
    }
}

/// One channel record of an `RVA2` frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VolumeAdjustment {
    pub gain: Volume,
    pub peak: u32,
}

/// A gain in decibels.
///
/// Stored on the wire as a signed 16-bit integer holding the gain times
/// 512, giving a range of +/-64 dB in steps just under two thousandths of a
/// dB. Values beyond the range clamp to the closest representable one.
#[derive(Clone, Copy, Debug, PartialEq, PartialOrd)]
pub struct Volume(pub f64);

impl Volume {
    const PRECISION: f64 = 512.0;

    pub(crate) fn parse(stream: &mut BufStream) -> ParseResult<Self> {
        Ok(Self(f64::from(stream.read_i16()?) / Self::PRECISION))
    }

    pub(crate) fn to_bytes(self) -> [u8; 2] {
        let raw = (self.0 * Self::PRECISION)
            .round()
            .clamp(f64::from(i16::MIN), f64::from(i16::MAX));

        (raw as i16).to_be_bytes()
    }
}

impl Display for Volume {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write![f, "{}dB", self.0]
    }
}

fn parse_peak(stream: &mut BufStream) -> ParseResult<u32> {
    let bits = stream.read_u8()?;

    if bits == 0 {
        return Ok(0);
    }

    // "Bits representing peak" goes up to 255, which would make a 32-byte
    // integer. Anything past 4 bytes is read and its upper part discarded.
    let width = usize::from((u16::from(bits) + 7) / 8);
    let mut peak = 0u32;

    for i in 0..width {
        let byte = stream.read_u8()?;

        if width - i > 4 {
            if byte != 0 {
                warn!("peak volume does not fit 32 bits, discarding high bytes");
            }

            continue;
        }

        peak = (peak << 8) | u32::from(byte);
    }

    Ok(peak)
}

/// Writes a peak with the smallest of the defined widths (8, 16, or 32
/// bits) that can hold it.
fn render_peak(result: &mut Vec<u8>, peak: u32) {
    if peak <= 0xFF {
        result.push(8);
        result.push(peak as u8);
    } else if peak <= 0xFFFF {
        result.push(16);
        result.extend((peak as u16).to_be_bytes());
    } else {
        result.push(32);
        result.extend(peak.to_be_bytes());
    }
}
