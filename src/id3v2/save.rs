//! The tag save engine.
//!
//! Saving a tag is a layout problem first: if the rendered tag fits into
//! the space the old one occupied, the file's audio never moves and only
//! the tag region is overwritten in place. If it does not fit, or if the
//! leftover padding would balloon past the caller's cap, the whole file is
//! rebuilt next to itself and atomically swapped in, so a failure at any
//! point leaves the original untouched.

use crate::id3v2::frames::{self, Frame};
use crate::id3v2::tag::Version;
use crate::id3v2::{ParseError, ParseResult, SaveError, SaveResult, Tag, TagHeader};
use crate::string::Encoding;
use log::{info, warn};
use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

/// The padding block appended when a tag has to be rewritten anyway.
/// Rewrites are expensive, so future edits get some room to stay in-place.
const DEFAULT_PADDING: usize = 256;

/// Options controlling a save.
pub struct SaveOptions {
    /// The version to write, converting the tag if needed. `None` keeps the
    /// tag's current version.
    pub version: Option<Version>,
    /// Force every text frame into this encoding.
    pub encoding: Option<Encoding>,
    /// Copy the original file to `<name>.orig` before replacing it.
    pub backup: bool,
    /// Restore the file's modification time after saving.
    pub preserve_mtime: bool,
    /// The most padding tolerated before a shrinking tag forces a rewrite.
    /// Bounds the dead space left behind by large deletions such as
    /// removing cover art.
    pub max_padding: usize,
}

impl Default for SaveOptions {
    fn default() -> Self {
        SaveOptions {
            version: None,
            encoding: None,
            backup: false,
            preserve_mtime: false,
            max_padding: 64 * 1024,
        }
    }
}

/// Decides between the in-place fast path and a full rewrite, returning
/// the padding to write. `pending_size` and `current_size` are whole-tag
/// sizes including the 10-byte header.
fn plan(pending_size: usize, current_size: usize, max_padding: usize) -> (bool, usize) {
    if pending_size > current_size {
        // The tag outgrew its slot.
        return (true, DEFAULT_PADDING);
    }

    let padding = current_size - pending_size;

    if padding > max_padding {
        info!("capping {}b of leftover padding", padding);
        return (true, DEFAULT_PADDING);
    }

    (false, padding)
}

pub(crate) fn save(tag: &mut Tag, path: &Path, options: &SaveOptions) -> SaveResult<()> {
    if tag.read_only() {
        return Err(SaveError::ReadOnly);
    }

    let target = options.version.unwrap_or_else(|| tag.version());

    // ID3v2.2 is read-only territory: nothing has written it for decades.
    if target == Version::V22 {
        return Err(SaveError::Unsupported);
    }

    tag.change_version(target)?;

    // The decoded frame data is what gets written, so the unsync flag must
    // not survive a save. Footers are likewise never written.
    tag.header_mut().flags_mut().unsync = false;
    tag.header_mut().flags_mut().footer = false;
    tag.header_mut().set_forced_encoding(options.encoding);

    let result = save_inner(tag, path, options, target);

    tag.header_mut().set_forced_encoding(None);

    result
}

fn save_inner(tag: &mut Tag, path: &Path, options: &SaveOptions, target: Version) -> SaveResult<()> {
    let mut frame_data = Vec::new();

    for frame in tag.frames().all() {
        if frame.is_empty() {
            warn!("not writing empty frame {}", frame.key());
            continue;
        }

        frame_data.extend(frames::render(tag.header(), frame)?);
    }

    let ext_size = tag
        .ext_header()
        .map(|ext| ext.rendered_size(target))
        .unwrap_or(0);

    tag.header_mut().flags_mut().extended = ext_size > 0;

    let pending_size = 10 + ext_size + frame_data.len();
    let current_size = current_tag_size(path)?;
    let (rewrite, padding) = plan(pending_size, current_size, options.max_padding);

    let body_size = ext_size + frame_data.len() + padding;

    let mut out = Vec::with_capacity(10 + body_size);
    out.extend(tag.header().render(body_size)?);

    if let Some(ext) = tag.ext_header() {
        out.extend(ext.render(target, &frame_data, padding));
    }

    out.extend(&frame_data);
    out.resize(10 + body_size, 0);

    let mtime = if options.preserve_mtime {
        fs::metadata(path).and_then(|meta| meta.modified()).ok()
    } else {
        None
    };

    if rewrite {
        rewrite_file(path, &out, current_size, options.backup)?;
    } else {
        // Same total length as the old tag: only the tag region changes.
        let mut file = OpenOptions::new().read(true).write(true).open(path)?;
        file.write_all(&out)?;
        file.flush()?;
    }

    if let Some(mtime) = mtime {
        let file = OpenOptions::new().write(true).open(path)?;
        file.set_modified(mtime)?;
    }

    tag.set_on_disk_size(out.len());

    Ok(())
}

/// Builds `<file>` anew as `<file>.tmp` — new tag first, then the audio
/// streamed from the original — and atomically renames it over the
/// original. The original is never touched until the rename.
fn rewrite_file(path: &Path, tag_data: &[u8], old_tag_size: usize, backup: bool) -> SaveResult<()> {
    let tmp_path = sibling_path(path, ".tmp");

    let result = (|| -> SaveResult<()> {
        let mut tmp = File::create(&tmp_path)?;
        tmp.write_all(tag_data)?;

        match File::open(path) {
            Ok(mut original) => {
                if backup {
                    fs::copy(path, sibling_path(path, ".orig"))?;
                }

                original.seek(SeekFrom::Start(old_tag_size as u64))?;
                io::copy(&mut original, &mut tmp)?;
            }
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                // Tagging a file that does not exist yet: the new file is
                // just the tag.
            }
            Err(err) => return Err(err.into()),
        }

        tmp.sync_all()?;
        fs::rename(&tmp_path, path)?;

        Ok(())
    })();

    if result.is_err() {
        let _ = fs::remove_file(&tmp_path);
    }

    result
}

/// Removes the tag at the start of `path`, if any.
pub(crate) fn strip(path: &Path) -> ParseResult<bool> {
    let old_tag_size = current_tag_size(path).map_err(io_from_save)?;

    if old_tag_size == 0 {
        return Ok(false);
    }

    let tmp_path = sibling_path(path, ".tmp");

    let result = (|| -> ParseResult<()> {
        let mut original = File::open(path)?;
        original.seek(SeekFrom::Start(old_tag_size as u64))?;

        let mut tmp = File::create(&tmp_path)?;
        io::copy(&mut original, &mut tmp)?;
        tmp.sync_all()?;

        fs::rename(&tmp_path, path)?;

        Ok(())
    })();

    if result.is_err() {
        let _ = fs::remove_file(&tmp_path);
    }

    result.map(|_| true)
}

/// The total on-disk size of the tag currently at the start of `path`,
/// or zero when there is none (or no file at all).
fn current_tag_size(path: &Path) -> SaveResult<usize> {
    let mut file = match File::open(path) {
        Ok(file) => file,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(0),
        Err(err) => return Err(err.into()),
    };

    let mut raw = [0; 10];

    match file.read_exact(&mut raw) {
        Ok(()) => {}
        Err(err) if err.kind() == io::ErrorKind::UnexpectedEof => return Ok(0),
        Err(err) => return Err(err.into()),
    }

    match TagHeader::parse(raw) {
        Ok(Some(header)) => {
            let footer = if header.flags().footer { 10 } else { 0 };
            Ok(10 + header.size() + footer)
        }
        _ => Ok(0),
    }
}

fn sibling_path(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(suffix);
    path.with_file_name(name)
}

fn io_from_save(err: SaveError) -> ParseError {
    match err {
        SaveError::IoError(err) => ParseError::IoError(err),
        _ => ParseError::MalformedData,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::id3v2::frames::AttachedPictureFrame;
    use std::env;

    const FAKE_AUDIO: &[u8] = b"\xFF\xFB\x90\x44 pretend mpeg data \xFF\xFB\x90\x44";

    fn scratch_file(name: &str) -> PathBuf {
        let path = env::temp_dir().join(name);
        fs::write(&path, FAKE_AUDIO).unwrap();
        path
    }

    #[test]
    fn plan_grows_with_rewrite() {
        // No existing tag.
        assert_eq!(plan(100, 0, 1024), (true, DEFAULT_PADDING));
        // Outgrew the old slot.
        assert_eq!(plan(300, 200, 1024), (true, DEFAULT_PADDING));
    }

    #[test]
    fn plan_reuses_leftover_space() {
        assert_eq!(plan(100, 150, 1024), (false, 50));
        assert_eq!(plan(150, 150, 1024), (false, 0));
    }

    #[test]
    fn plan_caps_runaway_padding() {
        // The old tag had a huge frame that is now gone; reusing the slot
        // would leave more padding than allowed.
        assert_eq!(plan(100, 90_000, 1024), (true, DEFAULT_PADDING));
    }

    #[test]
    fn save_new_tag_and_reload() {
        let path = scratch_file("minuet_save_new.mp3");

        let mut tag = Tag::new(Version::V24);
        tag.set_title("Title");
        tag.set_artist("Artist");
        tag.save(&path).unwrap();

        let reloaded = Tag::open(&path).unwrap().unwrap();
        assert_eq!(reloaded.title().as_deref(), Some("Title"));
        assert_eq!(reloaded.artist().as_deref(), Some("Artist"));

        // The audio payload must have survived the rewrite untouched.
        let contents = fs::read(&path).unwrap();
        assert!(contents.ends_with(FAKE_AUDIO));

        fs::remove_file(&path).unwrap();
    }

    #[test]
    fn small_edit_stays_in_place() {
        let path = scratch_file("minuet_save_inplace.mp3");

        let mut tag = Tag::new(Version::V24);
        tag.set_title("A fairly long title to leave room");
        tag.save(&path).unwrap();

        let size_before = fs::metadata(&path).unwrap().len();

        let mut tag = Tag::open(&path).unwrap().unwrap();
        tag.set_title("Short");
        tag.save(&path).unwrap();

        // The shrunken tag fits in the old slot, so the file length is
        // unchanged and the leftover space became padding.
        assert_eq!(fs::metadata(&path).unwrap().len(), size_before);

        let reloaded = Tag::open(&path).unwrap().unwrap();
        assert_eq!(reloaded.title().as_deref(), Some("Short"));

        fs::remove_file(&path).unwrap();
    }

    #[test]
    fn padding_cap_forces_rewrite() {
        let path = scratch_file("minuet_save_cap.mp3");

        let mut tag = Tag::new(Version::V24);
        let mut picture = AttachedPictureFrame::new();
        picture.mime.push_str("image/png");
        picture.picture = vec![0x16; 8192];
        tag.frames_mut().add(picture);
        tag.save(&path).unwrap();

        let size_before = fs::metadata(&path).unwrap().len();

        let mut tag = Tag::open(&path).unwrap().unwrap();
        tag.frames_mut().remove_all(b"APIC");
        tag.set_title("Tiny");

        let options = SaveOptions {
            max_padding: 1024,
            ..Default::default()
        };

        tag.save_with(&path, &options).unwrap();

        // Dropping the image frees far more than max_padding, so the file
        // must shrink rather than carry dead space.
        assert!(fs::metadata(&path).unwrap().len() < size_before);

        fs::remove_file(&path).unwrap();
    }

    #[test]
    fn save_v23_converts_dates() {
        use crate::id3v2::frames::time::Date;
        use crate::id3v2::frames::DateFrame;

        let path = scratch_file("minuet_save_v23.mp3");

        let mut tag = Tag::new(Version::V24);
        tag.set_recording_date(Some(Date::new(1977)));

        let options = SaveOptions {
            version: Some(Version::V23),
            ..Default::default()
        };

        tag.save_with(&path, &options).unwrap();

        let reloaded = Tag::open(&path).unwrap().unwrap();
        assert_eq!(reloaded.version(), Version::V23);

        let year = reloaded
            .frames()
            .get(b"TYER")
            .unwrap()
            .downcast::<DateFrame>()
            .unwrap();
        assert_eq!(year.date.unwrap().year(), 1977);

        fs::remove_file(&path).unwrap();
    }

    #[test]
    fn refuse_v22_and_read_only_saves() {
        let path = env::temp_dir().join("minuet_save_refused.mp3");

        let mut tag = Tag::new(Version::V22);
        assert!(matches!(tag.save(&path), Err(SaveError::Unsupported)));

        let mut tag = Tag::new(Version::V24);
        tag.set_title("Title");
        tag.set_read_only(true);
        assert!(matches!(tag.save(&path), Err(SaveError::ReadOnly)));

        assert!(!path.exists());
    }

    #[test]
    fn strip_removes_tag() {
        let path = scratch_file("minuet_strip.mp3");

        let mut tag = Tag::new(Version::V24);
        tag.set_title("Title");
        tag.save(&path).unwrap();

        assert!(Tag::remove_from(&path).unwrap());
        assert_eq!(fs::read(&path).unwrap(), FAKE_AUDIO);

        // A second strip finds nothing.
        assert!(!Tag::remove_from(&path).unwrap());

        fs::remove_file(&path).unwrap();
    }
}
