//! The ID3v1 genre table.
//!
//! ID3v1 stores a genre as a single byte indexing a fixed table that began
//! with 80 entries and was later extended by Winamp to 192. Values 192-255
//! were never assigned. ID3v2 reuses the same table through the `(NNN)` and
//! plain-number forms of the `TCON` frame.

use std::fmt::{self, Display, Formatter};

/// Every genre name assigned by ID3v1 and the Winamp extensions, indexed by
/// its genre id.
pub static GENRES: [&str; 192] = [
    "Blues",
    "Classic Rock",
    "Country",
    "Dance",
    "Disco",
    "Funk",
    "Grunge",
    "Hip-Hop",
    "Jazz",
    "Metal",
    "New Age",
    "Oldies",
    "Other",
    "Pop",
    "R&B",
    "Rap",
    "Reggae",
    "Rock",
    "Techno",
    "Industrial",
    "Alternative",
    "Ska",
    "Death Metal",
    "Pranks",
    "Soundtrack",
    "Euro-Techno",
    "Ambient",
    "Trip-Hop",
    "Vocal",
    "Jazz+Funk",
    "Fusion",
    "Trance",
    "Classical",
    "Instrumental",
    "Acid",
    "House",
    "Game",
    "Sound Clip",
    "Gospel",
    "Noise",
    "AlternRock",
    "Bass",
    "Soul",
    "Punk",
    "Space",
    "Meditative",
    "Instrumental Pop",
    "Instrumental Rock",
    "Ethnic",
    "Gothic",
    "Darkwave",
    "Techno-Industrial",
    "Electronic",
    "Pop-Folk",
    "Eurodance",
    "Dream",
    "Southern Rock",
    "Comedy",
    "Cult",
    "Gangsta Rap",
    "Top 40",
    "Christian Rap",
    "Pop/Funk",
    "Jungle",
    "Native American",
    "Cabaret",
    "New Wave",
    "Psychedelic",
    "Rave",
    "Showtunes",
    "Trailer",
    "Lo-Fi",
    "Tribal",
    "Acid Punk",
    "Acid Jazz",
    "Polka",
    "Retro",
    "Musical",
    "Rock & Roll",
    "Hard Rock",
    "Folk",
    "Folk-Rock",
    "National Folk",
    "Swing",
    "Fast-Fusion",
    "Bebob",
    "Latin",
    "Revival",
    "Celtic",
    "Bluegrass",
    "Avantgarde",
    "Gothic Rock",
    "Progressive Rock",
    "Psychedelic Rock",
    "Symphonic Rock",
    "Slow Rock",
    "Big Band",
    "Chorus",
    "Easy Listening",
    "Acoustic",
    "Humour",
    "Speech",
    "Chanson",
    "Opera",
    "Chamber Music",
    "Sonata",
    "Symphony",
    "Booty Bass",
    "Primus",
    "Porn Groove",
    "Satire",
    "Slow Jam",
    "Club",
    "Tango",
    "Samba",
    "Folklore",
    "Ballad",
    "Power Ballad",
    "Rhythmic Soul",
    "Freestyle",
    "Duet",
    "Punk Rock",
    "Drum Solo",
    "A Cappella",
    "Euro-House",
    "Dance Hall",
    "Goa",
    "Drum & Bass",
    "Club-House",
    "Hardcore",
    "Terror",
    "Indie",
    "BritPop",
    "Negerpunk",
    "Polsk Punk",
    "Beat",
    "Christian Gangsta Rap",
    "Heavy Metal",
    "Black Metal",
    "Crossover",
    "Contemporary Christian",
    "Christian Rock",
    "Merengue",
    "Salsa",
    "Thrash Metal",
    "Anime",
    "JPop",
    "Synthpop",
    "Abstract",
    "Art Rock",
    "Baroque",
    "Bhangra",
    "Big Beat",
    "Breakbeat",
    "Chillout",
    "Downtempo",
    "Dub",
    "EBM",
    "Eclectic",
    "Electro",
    "Electroclash",
    "Emo",
    "Experimental",
    "Garage",
    "Global",
    "IDM",
    "Illbient",
    "Industro-Goth",
    "Jam Band",
    "Krautrock",
    "Leftfield",
    "Lounge",
    "Math Rock",
    "New Romantic",
    "Nu-Breakz",
    "Post-Punk",
    "Post-Rock",
    "Psytrance",
    "Shoegaze",
    "Space Rock",
    "Trop Rock",
    "World Music",
    "Neoclassical",
    "Audiobook",
    "Audio Theatre",
    "Neue Deutsche Welle",
    "Podcast",
    "Indie Rock",
    "G-Funk",
    "Dubstep",
    "Garage Rock",
    "Psybient",
];

/// A genre value, either from the fixed table or free-form.
///
/// If `id` is set it always determines `name`. A name matching a table entry
/// (ignoring case) resolves to its id; any other name is kept as-is with no
/// id. The table itself is immutable after startup.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Genre {
    id: Option<u8>,
    name: Option<String>,
}

impl Genre {
    /// Creates a genre from a table id. Ids outside the table (192-255) are
    /// rejected.
    pub fn from_id(id: u8) -> Option<Self> {
        let name = GENRES.get(usize::from(id))?;

        Some(Self {
            id: Some(id),
            name: Some(String::from(*name)),
        })
    }

    /// Creates a genre from a name, resolving the id when the name is a table
    /// entry.
    pub fn from_name(name: &str) -> Self {
        let id = GENRES
            .iter()
            .position(|entry| entry.eq_ignore_ascii_case(name))
            .map(|pos| pos as u8);

        Self {
            id,
            name: Some(String::from(name)),
        }
    }

    /// Parses the genre syntaxes found in `TCON` frames and genre strings:
    /// `(NNN)`, `(NNN)Name`, `NNN`, or a plain name.
    pub fn parse(text: &str) -> Self {
        let text = text.trim();

        if text.is_empty() {
            return Self::default();
        }

        // "(NNN)" or "(NNN)Name"
        if let Some(rest) = text.strip_prefix('(') {
            if let Some(close) = rest.find(')') {
                if let Ok(id) = rest[..close].parse::<u8>() {
                    let name = rest[close + 1..].trim();

                    if !name.is_empty() {
                        let mut genre = Self::from_name(name);
                        genre.id = genre.id.or_else(|| Self::table_id(id));
                        return genre;
                    }

                    if let Some(genre) = Self::from_id(id) {
                        return genre;
                    }
                }
            }
        }

        // A bare number is also treated as an id.
        if let Ok(id) = text.parse::<u8>() {
            if let Some(genre) = Self::from_id(id) {
                return genre;
            }
        }

        Self::from_name(text)
    }

    pub fn id(&self) -> Option<u8> {
        self.id
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    fn table_id(id: u8) -> Option<u8> {
        if usize::from(id) < GENRES.len() {
            Some(id)
        } else {
            None
        }
    }
}

impl Display for Genre {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        match (self.id, &self.name) {
            (Some(id), Some(name)) => write![f, "({}){}", id, name],
            (Some(id), None) => write![f, "({})", id],
            (None, Some(name)) => write![f, "{}", name],
            (None, None) => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_paren_form() {
        let genre = Genre::parse("(129)Hardcore");

        assert_eq!(genre.id(), Some(129));
        assert_eq!(genre.name(), Some("Hardcore"));
    }

    #[test]
    fn parse_bare_id() {
        let genre = Genre::parse("17");

        assert_eq!(genre.id(), Some(17));
        assert_eq!(genre.name(), Some("Rock"));
    }

    #[test]
    fn parse_name_resolves_id() {
        let genre = Genre::parse("heavy metal");

        assert_eq!(genre.id(), Some(137));
        assert_eq!(genre.name(), Some("heavy metal"));
    }

    #[test]
    fn parse_unknown_name() {
        let genre = Genre::parse("Mathgrindwave");

        assert_eq!(genre.id(), None);
        assert_eq!(genre.name(), Some("Mathgrindwave"));
    }

    #[test]
    fn display_round_trips_table() {
        for id in 0..GENRES.len() as u8 {
            let genre = Genre::from_id(id).unwrap();
            assert_eq!(Genre::parse(&genre.to_string()), genre);
        }
    }

    #[test]
    fn reserved_ids_rejected() {
        assert_eq!(Genre::from_id(192), None);
        assert_eq!(Genre::from_id(255), None);
    }
}
