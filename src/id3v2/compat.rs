//! Version conversion.
//!
//! Converting a tag between ID3v2 versions is mostly renaming, but a
//! handful of frames changed shape between v2.3 and v2.4: the date fields
//! were collapsed into single timestamps, the sort-order frames moved off
//! their experimental identifiers, and the relative volume frame was
//! redesigned entirely. This module owns those translations, plus the
//! identifier upgrade applied when reading ID3v2.2 tags.

use crate::id3v2::frame_map::FrameMap;
use crate::id3v2::frames::audio::v24::{Channel, Volume, VolumeAdjustment};
use crate::id3v2::frames::time::Date;
use crate::id3v2::frames::{
    DateFrame, Frame, FrameId, RelativeVolumeFrame, RelativeVolumeFrame2, TextFrame,
    UserTextFrame,
};
use crate::id3v2::tag::Version;
use crate::id3v2::{ParseError, ParseResult, SaveError, SaveResult};
use log::{debug, warn};

/// The description given to a `TXXX` frame holding a set subtitle that had
/// to leave its `TSST` frame behind when converting below ID3v2.4.
pub const SUBTITLE_DESC: &str = "Subtitle (converted)";

const V2_V3_CONV: &[(&[u8; 3], &[u8; 4])] = &[
    (b"BUF", b"RBUF"), // Recommended buffer size
    (b"CNT", b"PCNT"), // Play counter
    (b"COM", b"COMM"), // Comment
    (b"CRA", b"AENC"), // Audio encryption
    // CRM has no analogue
    (b"ETC", b"ETCO"), // Event timing codes
    (b"EQU", b"EQUA"), // Equalisation
    (b"GEO", b"GEOB"), // General object
    (b"IPL", b"IPLS"), // Involved people list
    (b"LNK", b"LINK"), // Linked frame
    (b"MCI", b"MCDI"), // Music CD identifier
    (b"MLL", b"MLLT"), // MPEG lookup table
    (b"PIC", b"APIC"), // Attached picture
    (b"POP", b"POPM"), // Popularimeter
    (b"REV", b"RVRB"), // Reverb
    (b"RVA", b"RVAD"), // Relative volume adjustment
    (b"SLT", b"SYLT"), // Synced lyrics/text
    (b"STC", b"SYTC"), // Synced tempo codes
    (b"TAL", b"TALB"), // Album/Movie/Show title
    (b"TBP", b"TBPM"), // BPM
    (b"TCM", b"TCOM"), // Composer
    (b"TCO", b"TCON"), // Content type
    (b"TCR", b"TCOP"), // Copyright message
    (b"TDA", b"TDAT"), // Date
    (b"TDY", b"TDLY"), // Playlist delay
    (b"TFT", b"TFLT"), // File type
    (b"TEN", b"TENC"), // Encoded by
    (b"TIM", b"TIME"), // Recording time
    (b"TKE", b"TKEY"), // Initial key
    (b"TLA", b"TLAN"), // Language(s)
    (b"TLE", b"TLEN"), // Length
    (b"TMT", b"TMED"), // Media type
    (b"TOA", b"TOPE"), // Original artist(s)/performer(s)
    (b"TOF", b"TOFN"), // Original filename
    (b"TOL", b"TOLY"), // Original lyricist(s)/text writer(s)
    (b"TOR", b"TORY"), // Original release year
    (b"TOT", b"TOAL"), // Original album/movie/show title
    (b"TP1", b"TPE1"), // Lead artist(s)/performing group
    (b"TP2", b"TPE2"), // Band/orchestra/accompaniment
    (b"TP3", b"TPE3"), // Conductor/performer refinement
    (b"TP4", b"TPE4"), // Interpreted, remixed, or otherwise modified by
    (b"TPA", b"TPOS"), // Part of a set
    (b"TPB", b"TPUB"), // Publisher
    (b"TRC", b"TSRC"), // ISRC
    (b"TRD", b"TRDA"), // Recording dates
    (b"TRK", b"TRCK"), // Track
    (b"TSI", b"TSIZ"), // Size
    (b"TSS", b"TSSE"), // Software/hardware and settings used for encoding
    (b"TT1", b"TIT1"), // Content group description
    (b"TT2", b"TIT2"), // Title/songname/content description
    (b"TT3", b"TIT3"), // Subtitle/description refinement
    (b"TXT", b"TEXT"), // Lyricist/text writer
    (b"TXX", b"TXXX"), // User-defined text
    (b"TYE", b"TYER"), // Year
    (b"UFI", b"UFID"), // Unique file identifier
    (b"ULT", b"USLT"), // Unsynced lyrics/text
    (b"WAF", b"WOAF"), // Official audio file webpage
    (b"WAR", b"WOAR"), // Official artist/performer webpage
    (b"WAS", b"WOAS"), // Official audio source webpage
    (b"WCM", b"WCOM"), // Commercial information
    (b"WCP", b"WCOP"), // Copyright information
    (b"WPB", b"WPUB"), // Publishers official webpage
    (b"WXX", b"WXXX"), // User-defined URL
    // iTunes proprietary frames
    (b"PCS", b"PCST"),
    (b"TCT", b"TCAT"),
    (b"TDR", b"TDRL"),
    (b"TDS", b"TDES"),
    (b"TID", b"TGID"),
    (b"WFD", b"WFED"),
    (b"MVN", b"MVNM"),
    (b"MVI", b"MVIN"),
    (b"GP1", b"GRP1"),
];

/// Upgrades an ID3v2.2 identifier to its ID3v2.3 successor.
pub(crate) fn upgrade_v2_id(id: &[u8; 3]) -> ParseResult<FrameId> {
    for (v2_id, v3_id) in V2_V3_CONV {
        if *v2_id == id {
            return Ok(FrameId::new(v3_id));
        }
    }

    Err(ParseError::NotFound)
}

/// Identifiers that only exist up to ID3v2.3.
const V23_ONLY: &[&[u8; 4]] = &[
    b"TYER", b"TDAT", b"TIME", b"TORY", b"TRDA", b"TSIZ", b"XDOR", b"XSOA", b"XSOP", b"XSOT",
    b"RVAD", b"EQUA", b"IPLS",
];

/// Identifiers introduced by ID3v2.4 with no earlier equivalent spelling.
const V24_ONLY: &[&[u8; 4]] = &[
    b"TDEN", b"TDOR", b"TDRC", b"TDRL", b"TDTG", b"TMOO", b"TPRO", b"TSOA", b"TSOP", b"TSOT",
    b"TSST", b"TIPL", b"TMCL", b"RVA2", b"EQU2", b"SEEK", b"SIGN", b"ASPI",
];

/// Whether a frame with this identifier may appear in a tag of `version`.
/// Identifiers in neither version table (including unrecognized ones) are
/// allowed everywhere.
pub(crate) fn is_legal(id: FrameId, version: Version) -> bool {
    match version {
        Version::V24 => !V23_ONLY.contains(&id.inner()),
        _ => !V24_ONLY.contains(&id.inner()),
    }
}

/// Transforms `frames` so every frame is legal under `target`.
///
/// Frames that are convertible get converted, a couple of deprecated ones
/// get dropped with a warning, and anything left stranded fails the whole
/// conversion: a save must never silently write an illegal frame.
pub(crate) fn convert(frames: &mut FrameMap, target: Version) -> SaveResult<()> {
    if target == Version::V24 {
        collect_dates(frames);
        swap_sort_ids(frames, b"XSOA", b"TSOA");
        swap_sort_ids(frames, b"XSOP", b"TSOP");
        swap_sort_ids(frames, b"XSOT", b"TSOT");
        drop_tsiz(frames);
        upgrade_volume(frames);
    } else {
        split_dates(frames);
        swap_sort_ids(frames, b"TSOA", b"XSOA");
        swap_sort_ids(frames, b"TSOP", b"XSOP");
        swap_sort_ids(frames, b"TSOT", b"XSOT");
        remap_tsst(frames);
        downgrade_volume(frames);
    }

    let mut stranded: Vec<FrameId> = frames
        .values()
        .map(|frame| frame.id())
        .filter(|&id| !is_legal(id, target))
        .collect();

    stranded.dedup();

    if !stranded.is_empty() {
        return Err(SaveError::CannotConvert(stranded));
    }

    Ok(())
}

/// Merges `TYER`/`TDAT`/`TIME` into `TDRC` and `TORY`/`XDOR` into `TDOR`
/// for an ID3v2.4 target.
fn collect_dates(frames: &mut FrameMap) {
    let year = take_date(frames, b"TYER").map(|date| date.year());
    let tdat = take_text(frames, b"TDAT");
    let time = take_text(frames, b"TIME");

    if let Some(year) = year {
        let mut date = Date::new(year);

        // TDAT is DDMM, TIME is HHMM, both fixed four digits.
        if let Some((day, month)) = tdat.as_deref().and_then(split_four_digits) {
            if date.set_month(month).and_then(|_| date.set_day(day)).is_ok() {
                if let Some((hour, minute)) = time.as_deref().and_then(split_four_digits) {
                    let _ = date.set_hour(hour).and_then(|_| date.set_minute(minute));
                }
            }
        }

        frames.add(date_frame(b"TDRC", date));
    } else if tdat.is_some() || time.is_some() {
        warn!("dropping TDAT/TIME with no TYER to anchor them");
    }

    // The full-precision XDOR wins over the year-only TORY.
    let tory = take_date(frames, b"TORY");
    let xdor = take_date(frames, b"XDOR");

    if let Some(date) = xdor.or(tory) {
        frames.add(date_frame(b"TDOR", date));
    }
}

/// Splits `TDRC` back into `TYER`/`TDAT`/`TIME` and `TDOR` into
/// `TORY`/`XDOR` for a pre-v2.4 target. `TDRL` has no home there and is
/// dropped: ID3v2.3 never had a release date distinct from the original
/// release date.
fn split_dates(frames: &mut FrameMap) {
    if let Some(date) = take_date(frames, b"TDRC") {
        frames.add(date_frame(b"TYER", Date::new(date.year())));

        if let (Some(month), Some(day)) = (date.month(), date.day()) {
            frames.add(numeric_text(b"TDAT", format!["{:02}{:02}", day, month]));

            if let (Some(hour), Some(minute)) = (date.hour(), date.minute()) {
                frames.add(numeric_text(b"TIME", format!["{:02}{:02}", hour, minute]));
            }
        }
    }

    if let Some(date) = take_date(frames, b"TDOR") {
        frames.add(date_frame(b"TORY", Date::new(date.year())));

        if date.has_date() {
            frames.add(date_frame(b"XDOR", date));
        }
    }

    if frames.contains_any(b"TDRL") {
        warn!("dropping TDRL, ID3v2.3 has no release date frame");
        frames.remove_all(b"TDRL");
    }
}

/// Moves the contents of the sort-order frames between their experimental
/// ID3v2.3 identifiers and the official ID3v2.4 ones.
fn swap_sort_ids(frames: &mut FrameMap, from: &[u8; 4], to: &[u8; 4]) {
    for old in frames.remove_all(from) {
        if let Some(old) = old.downcast::<TextFrame>() {
            let mut new = TextFrame::new(FrameId::new(to));
            new.encoding = old.encoding;
            new.text = old.text.clone();
            frames.add(new);
        }
    }
}

/// `TSIZ` was deprecated outright in ID3v2.4. Nothing replaces it, and
/// nothing of value is lost.
fn drop_tsiz(frames: &mut FrameMap) {
    if frames.contains_any(b"TSIZ") {
        debug!("dropping deprecated TSIZ");
        frames.remove_all(b"TSIZ");
    }
}

/// `TSST` (set subtitle) has no ID3v2.3 frame. The text is preserved in a
/// `TXXX` frame under a fixed description, which keeps the data at the cost
/// of its address.
fn remap_tsst(frames: &mut FrameMap) {
    for old in frames.remove_all(b"TSST") {
        if let Some(old) = old.downcast::<TextFrame>() {
            warn!("converting TSST to a TXXX frame, ID3v2.3 has no set subtitle");

            frames.add(UserTextFrame {
                encoding: old.encoding,
                desc: String::from(SUBTITLE_DESC),
                text: old.text.clone(),
            });
        }
    }
}

const RVAD_CHANNELS: [(Channel, &str); 6] = [
    (Channel::FrontRight, "front_right"),
    (Channel::FrontLeft, "front_left"),
    (Channel::BackRight, "back_right"),
    (Channel::BackLeft, "back_left"),
    (Channel::FrontCenter, "front_center"),
    (Channel::Subwoofer, "bass"),
];

/// Explodes an `RVAD` frame into one `RVA2` frame per populated channel.
fn upgrade_volume(frames: &mut FrameMap) {
    for old in frames.remove_all(b"RVAD") {
        let old = match old.downcast::<RelativeVolumeFrame>() {
            Some(old) => old,
            None => continue,
        };

        for ((channel, desc), volume) in RVAD_CHANNELS.iter().zip(old.channels()) {
            if volume.is_zero() {
                continue;
            }

            let mut new = RelativeVolumeFrame2 {
                desc: String::from(*desc),
                ..Default::default()
            };

            new.channels.insert(
                *channel,
                VolumeAdjustment {
                    // RVA2 gains are in 1/512 dB units on the wire, which
                    // makes the raw RVAD value exactly representable.
                    gain: Volume(f64::from(volume.adjustment) / 512.0),
                    peak: volume.peak,
                },
            );

            frames.add(new);
        }
    }
}

/// Folds every `RVA2` frame back into the per-channel fields of a single
/// `RVAD` frame.
fn downgrade_volume(frames: &mut FrameMap) {
    let old_frames = frames.remove_all(b"RVA2");

    if old_frames.is_empty() {
        return;
    }

    let mut new = RelativeVolumeFrame::default();

    for old in &old_frames {
        let old = match old.downcast::<RelativeVolumeFrame2>() {
            Some(old) => old,
            None => continue,
        };

        for (channel, adjustment) in &old.channels {
            let target = match channel {
                Channel::FrontRight => &mut new.front_right,
                Channel::FrontLeft => &mut new.front_left,
                Channel::BackRight => &mut new.back_right,
                Channel::BackLeft => &mut new.back_left,
                Channel::FrontCenter => &mut new.front_center,
                Channel::Subwoofer => &mut new.bass,
                _ => {
                    warn!("RVAD cannot represent the {:?} channel, dropping", channel);
                    continue;
                }
            };

            target.adjustment = (adjustment.gain.0 * 512.0).round() as i32;
            target.peak = adjustment.peak;
        }
    }

    if !new.is_empty() {
        frames.add(new);
    }
}

fn take_date(frames: &mut FrameMap, id: &[u8; 4]) -> Option<Date> {
    frames
        .remove_all(id)
        .first()
        .and_then(|frame| frame.downcast::<DateFrame>())
        .and_then(|frame| frame.date)
}

fn take_text(frames: &mut FrameMap, id: &[u8; 4]) -> Option<String> {
    frames
        .remove_all(id)
        .first()
        .and_then(|frame| frame.downcast::<TextFrame>())
        .and_then(|frame| frame.text.first().cloned())
}

fn date_frame(id: &[u8; 4], date: Date) -> DateFrame {
    let mut frame = DateFrame::new(FrameId::new(id));
    frame.date = Some(date);
    frame
}

fn numeric_text(id: &[u8; 4], text: String) -> TextFrame {
    let mut frame = TextFrame::new(FrameId::new(id));
    frame.encoding = crate::string::Encoding::Latin1;
    frame.text = vec![text];
    frame
}

/// Splits a fixed `DDMM`/`HHMM` field into its two halves.
pub(crate) fn split_four_digits(text: &str) -> Option<(u8, u8)> {
    let text = text.trim();

    if text.len() != 4 || !text.bytes().all(|byte| byte.is_ascii_digit()) {
        return None;
    }

    Some((text[..2].parse().ok()?, text[2..].parse().ok()?))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date_of(frames: &FrameMap, id: &[u8; 4]) -> Date {
        frames
            .get(id)
            .unwrap()
            .downcast::<DateFrame>()
            .unwrap()
            .date
            .unwrap()
    }

    fn text_of(frames: &FrameMap, id: &[u8; 4]) -> String {
        frames.get(id).unwrap().to_string()
    }

    #[test]
    fn upgrade_v22_ids() {
        assert_eq!(upgrade_v2_id(b"TT2").unwrap(), b"TIT2");
        assert_eq!(upgrade_v2_id(b"PIC").unwrap(), b"APIC");
        assert!(upgrade_v2_id(b"CRM").is_err());
    }

    #[test]
    fn merge_date_frames() {
        let mut frames = FrameMap::new();
        frames.add(date_frame(b"TYER", Date::new(1977)));
        frames.add(numeric_text(b"TDAT", String::from("0306")));
        frames.add(numeric_text(b"TIME", String::from("0430")));
        frames.add(date_frame(b"TORY", Date::new(1978)));

        convert(&mut frames, Version::V24).unwrap();

        assert_eq!(frames.len(), 2);
        assert_eq!(date_of(&frames, b"TDRC").to_string(), "1977-06-03T04:30");
        assert_eq!(date_of(&frames, b"TDOR").to_string(), "1978");
    }

    #[test]
    fn split_date_frames() {
        use std::str::FromStr;

        let mut frames = FrameMap::new();
        frames.add(date_frame(b"TDRC", Date::from_str("1977-06-03T04:30").unwrap()));
        frames.add(date_frame(b"TDOR", Date::from_str("1978-11-04").unwrap()));

        convert(&mut frames, Version::V23).unwrap();

        assert_eq!(frames.len(), 5);
        assert_eq!(date_of(&frames, b"TYER").to_string(), "1977");
        assert_eq!(text_of(&frames, b"TDAT"), "0306");
        assert_eq!(text_of(&frames, b"TIME"), "0430");
        assert_eq!(date_of(&frames, b"TORY").to_string(), "1978");
        assert_eq!(date_of(&frames, b"XDOR").to_string(), "1978-11-04");
    }

    #[test]
    fn date_conversion_round_trips() {
        let mut frames = FrameMap::new();
        frames.add(date_frame(b"TYER", Date::new(1977)));
        frames.add(numeric_text(b"TDAT", String::from("0306")));

        convert(&mut frames, Version::V24).unwrap();
        convert(&mut frames, Version::V23).unwrap();

        assert_eq!(date_of(&frames, b"TYER").to_string(), "1977");
        assert_eq!(text_of(&frames, b"TDAT"), "0306");
        assert!(!frames.contains_any(b"TIME"));
    }

    #[test]
    fn drop_release_date_below_v24() {
        let mut frames = FrameMap::new();
        frames.add(date_frame(b"TDRL", Date::new(1979)));

        convert(&mut frames, Version::V23).unwrap();

        assert!(frames.is_empty());
    }

    #[test]
    fn swap_sort_order_prefixes() {
        let mut frames = FrameMap::new();
        frames.add(numeric_text(b"XSOA", String::from("Album, The")));

        convert(&mut frames, Version::V24).unwrap();
        assert_eq!(text_of(&frames, b"TSOA"), "Album, The");
        assert!(!frames.contains_any(b"XSOA"));

        convert(&mut frames, Version::V23).unwrap();
        assert_eq!(text_of(&frames, b"XSOA"), "Album, The");
    }

    #[test]
    fn drop_tsiz_on_v24() {
        let mut frames = FrameMap::new();
        frames.add(numeric_text(b"TSIZ", String::from("4000000")));

        convert(&mut frames, Version::V24).unwrap();
        assert!(frames.is_empty());
    }

    #[test]
    fn remap_tsst_to_txxx() {
        let mut frames = FrameMap::new();
        frames.add(numeric_text(b"TSST", String::from("Disc One")));

        convert(&mut frames, Version::V23).unwrap();

        let frame = frames
            .get(b"TXXX")
            .unwrap()
            .downcast::<UserTextFrame>()
            .unwrap();

        assert_eq!(frame.desc, SUBTITLE_DESC);
        assert_eq!(frame.text, &["Disc One"]);
    }

    #[test]
    fn explode_rvad_into_rva2() {
        use crate::id3v2::frames::audio::v23::ChannelVolume;

        let mut frames = FrameMap::new();
        frames.add(RelativeVolumeFrame {
            front_right: ChannelVolume {
                adjustment: -10,
                peak: 0,
            },
            front_left: ChannelVolume {
                adjustment: 2,
                peak: 0,
            },
            ..Default::default()
        });

        convert(&mut frames, Version::V24).unwrap();

        let frames: Vec<_> = frames.get_all(b"RVA2").to_vec();
        assert_eq!(frames.len(), 2);

        let right = frames[0].downcast::<RelativeVolumeFrame2>().unwrap();
        assert_eq!(right.desc, "front_right");
        assert_eq!(right.channels[&Channel::FrontRight].gain, Volume(-10.0 / 512.0));
    }

    #[test]
    fn volume_conversion_round_trips() {
        use crate::id3v2::frames::audio::v23::ChannelVolume;

        let mut frames = FrameMap::new();
        frames.add(RelativeVolumeFrame {
            front_right: ChannelVolume {
                adjustment: -10,
                peak: 0,
            },
            front_left: ChannelVolume {
                adjustment: 2,
                peak: 0,
            },
            ..Default::default()
        });

        convert(&mut frames, Version::V24).unwrap();
        convert(&mut frames, Version::V23).unwrap();

        let frame = frames
            .get(b"RVAD")
            .unwrap()
            .downcast::<RelativeVolumeFrame>()
            .unwrap();

        assert_eq!(frame.front_right.adjustment, -10);
        assert_eq!(frame.front_left.adjustment, 2);
        assert!(frame.back_right.is_zero());
        assert!(frame.bass.is_zero());
    }

    #[test]
    fn unconvertible_frames_fail() {
        let mut frames = FrameMap::new();
        frames.add(date_frame(b"TDEN", Date::new(2004)));

        let err = convert(&mut frames, Version::V23).unwrap_err();

        match err {
            SaveError::CannotConvert(ids) => assert_eq!(ids, &[FrameId::new(b"TDEN")]),
            other => panic!("expected CannotConvert, got {:?}", other),
        }
    }

    #[test]
    fn conversion_is_idempotent_for_legal_frames() {
        let mut frames = FrameMap::new();
        frames.add(numeric_text(b"TIT2", String::from("Title")));
        frames.add(date_frame(b"TDRC", Date::new(1977)));

        convert(&mut frames, Version::V24).unwrap();

        assert_eq!(frames.len(), 2);
        assert_eq!(date_of(&frames, b"TDRC").to_string(), "1977");
    }
}
