//! ID3v1 tag reading and writing.
//!
//! An ID3v1 tag is the fixed 128-byte trailer at the very end of a file:
//! `TAG`, then Latin-1 title/artist/album/year/comment fields padded out
//! with NULs, and a genre byte indexing the [genre table](crate::genres).
//! ID3v1.1 steals the last two comment bytes for a track number. There is
//! no framing and no versioned structure, which makes this module mostly
//! an exercise in fixed offsets.

use crate::genres::Genre;
use crate::string;
use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::Path;

/// The fixed size of an ID3v1 tag.
pub const TAG_SIZE: usize = 128;

const ID_TRAILER: &[u8; 3] = b"TAG";

/// An ID3v1 tag.
///
/// All fields are hard-capped by the trailer layout: 30 bytes of Latin-1
/// for title, artist, and album, 4 for the year, and 30 (28 with a track
/// number) for the comment. Longer values are truncated on render.
#[derive(Debug, Clone, Default, Eq, PartialEq)]
pub struct Tag {
    pub title: String,
    pub artist: String,
    pub album: String,
    /// The year as up to four ASCII digits.
    pub year: String,
    pub comment: String,
    /// The ID3v1.1 track number. Writing `Some` shortens the comment field
    /// to 28 bytes.
    pub track: Option<u8>,
    /// An index into [`GENRES`](crate::genres::GENRES).
    pub genre_id: Option<u8>,
}

impl Tag {
    /// Parses a 128-byte trailer. `None` means the magic is absent and
    /// there is no tag.
    pub fn parse(raw: &[u8; TAG_SIZE]) -> Option<Self> {
        if &raw[0..3] != ID_TRAILER {
            return None;
        }

        let title = read_field(&raw[3..33]);
        let artist = read_field(&raw[33..63]);
        let album = read_field(&raw[63..93]);
        let year = read_field(&raw[93..97]);

        // An ID3v1.1 track number announces itself with a NUL at the
        // second-to-last comment byte.
        let (comment, track) = if raw[125] == 0 && raw[126] != 0 {
            (read_field(&raw[97..125]), Some(raw[126]))
        } else {
            (read_field(&raw[97..127]), None)
        };

        let genre_id = match raw[127] {
            // 192-255 were never assigned.
            byte if usize::from(byte) < crate::genres::GENRES.len() => Some(byte),
            _ => None,
        };

        Some(Tag {
            title,
            artist,
            album,
            year,
            comment,
            track,
            genre_id,
        })
    }

    /// Renders the 128-byte trailer.
    pub fn render(&self) -> [u8; TAG_SIZE] {
        let mut raw = [0; TAG_SIZE];
        raw[0..3].copy_from_slice(ID_TRAILER);

        write_field(&mut raw[3..33], &self.title);
        write_field(&mut raw[33..63], &self.artist);
        write_field(&mut raw[63..93], &self.album);
        write_field(&mut raw[93..97], &self.year);

        match self.track {
            Some(track) => {
                write_field(&mut raw[97..125], &self.comment);
                raw[125] = 0;
                raw[126] = track;
            }
            None => write_field(&mut raw[97..127], &self.comment),
        }

        raw[127] = self.genre_id.unwrap_or(0xFF);

        raw
    }

    pub fn genre(&self) -> Option<Genre> {
        Genre::from_id(self.genre_id?)
    }

    pub fn set_genre(&mut self, genre: Option<&Genre>) {
        self.genre_id = genre.and_then(|genre| genre.id());
    }

    /// Reads the tag from the end of the file at `path`. `Ok(None)` means
    /// the file has no ID3v1 tag.
    pub fn read_from_path<P: AsRef<Path>>(path: P) -> io::Result<Option<Self>> {
        let mut file = File::open(path)?;
        Self::read_from(&mut file)
    }

    /// Reads the tag from the last 128 bytes of `stream`.
    pub fn read_from(stream: &mut (impl Read + Seek)) -> io::Result<Option<Self>> {
        if stream.seek(SeekFrom::End(0))? < TAG_SIZE as u64 {
            return Ok(None);
        }

        stream.seek(SeekFrom::End(-(TAG_SIZE as i64)))?;

        let mut raw = [0; TAG_SIZE];
        stream.read_exact(&mut raw)?;

        Ok(Self::parse(&raw))
    }

    /// Writes the tag onto the file at `path`, overwriting an existing
    /// trailer or appending a new one. The rest of the file never moves.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> io::Result<()> {
        let mut file = OpenOptions::new().read(true).write(true).open(path)?;

        let offset = match existing_trailer(&mut file)? {
            Some(offset) => offset,
            None => file.seek(SeekFrom::End(0))?,
        };

        file.seek(SeekFrom::Start(offset))?;
        file.write_all(&self.render())?;
        file.flush()
    }

    /// Truncates the trailer off the file at `path`, returning whether one
    /// was there to remove.
    pub fn remove<P: AsRef<Path>>(path: P) -> io::Result<bool> {
        let mut file = OpenOptions::new().read(true).write(true).open(path)?;

        match existing_trailer(&mut file)? {
            Some(offset) => {
                file.set_len(offset)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

/// The offset of an existing trailer in `file`, if any.
fn existing_trailer(file: &mut File) -> io::Result<Option<u64>> {
    let len = file.seek(SeekFrom::End(0))?;

    if len < TAG_SIZE as u64 {
        return Ok(None);
    }

    let offset = len - TAG_SIZE as u64;
    file.seek(SeekFrom::Start(offset))?;

    let mut magic = [0; 3];
    file.read_exact(&mut magic)?;

    if &magic == ID_TRAILER {
        Ok(Some(offset))
    } else {
        Ok(None)
    }
}

/// Decodes a fixed Latin-1 field, trimming the NUL or space padding.
fn read_field(raw: &[u8]) -> String {
    let end = raw
        .iter()
        .rposition(|&byte| byte != 0 && byte != b' ')
        .map(|pos| pos + 1)
        .unwrap_or(0);

    raw[..end].iter().map(|&byte| char::from(byte)).collect()
}

/// Encodes a string into a fixed Latin-1 field, truncating and padding
/// with NULs as needed.
fn write_field(dest: &mut [u8], text: &str) {
    let encoded = string::render(crate::string::Encoding::Latin1, text);
    let len = dest.len().min(encoded.len());
    dest[..len].copy_from_slice(&encoded[..len]);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::fs;

    fn sample() -> Tag {
        Tag {
            title: String::from("Title"),
            artist: String::from("Artist"),
            album: String::from("Album"),
            year: String::from("1977"),
            comment: String::from("Comment"),
            track: Some(3),
            genre_id: Some(17),
        }
    }

    #[test]
    fn trailer_round_trip() {
        let tag = sample();
        let raw = tag.render();

        assert_eq!(&raw[0..3], b"TAG");
        assert_eq!(raw[125], 0);
        assert_eq!(raw[126], 3);
        assert_eq!(raw[127], 17);

        assert_eq!(Tag::parse(&raw).unwrap(), tag);
    }

    #[test]
    fn v10_comment_uses_all_30_bytes() {
        let mut tag = sample();
        tag.track = None;
        tag.comment = String::from("A comment that runs all the w");

        let raw = tag.render();
        let parsed = Tag::parse(&raw).unwrap();

        assert_eq!(parsed.track, None);
        assert_eq!(parsed.comment, "A comment that runs all the w");
    }

    #[test]
    fn space_padded_fields_trim() {
        let mut raw = sample().render();

        // Re-pad the title with spaces the way ancient taggers did.
        let mut field = [b' '; 30];
        field[..5].copy_from_slice(b"Title");
        raw[3..33].copy_from_slice(&field);

        assert_eq!(Tag::parse(&raw).unwrap().title, "Title");
    }

    #[test]
    fn overlong_fields_truncate() {
        let mut tag = sample();
        tag.title = "T".repeat(64);

        let raw = tag.render();
        assert_eq!(Tag::parse(&raw).unwrap().title, "T".repeat(30));
    }

    #[test]
    fn no_trailer_is_none() {
        let raw = [0u8; TAG_SIZE];
        assert_eq!(Tag::parse(&raw), None);
    }

    #[test]
    fn genre_lookup() {
        assert_eq!(sample().genre().unwrap().name(), Some("Rock"));

        let mut tag = sample();
        tag.genre_id = None;
        assert_eq!(tag.render()[127], 0xFF);
        assert_eq!(tag.genre(), None);
    }

    #[test]
    fn save_appends_then_overwrites() {
        let path = env::temp_dir().join("minuet_v1_save.mp3");
        fs::write(&path, b"pretend mpeg data").unwrap();

        let mut tag = sample();
        tag.save(&path).unwrap();

        let len_after_append = fs::metadata(&path).unwrap().len();
        assert_eq!(len_after_append, 17 + TAG_SIZE as u64);

        // A second save must overwrite the trailer, not stack another one.
        tag.title = String::from("Retitled");
        tag.save(&path).unwrap();

        assert_eq!(fs::metadata(&path).unwrap().len(), len_after_append);

        let reloaded = Tag::read_from_path(&path).unwrap().unwrap();
        assert_eq!(reloaded.title, "Retitled");

        assert!(Tag::remove(&path).unwrap());
        assert_eq!(fs::read(&path).unwrap(), b"pretend mpeg data");
        assert!(!Tag::remove(&path).unwrap());

        fs::remove_file(&path).unwrap();
    }
}
