//! ICY tag parsing
//!
//! Shoutcast/Icecast servers interleave metadata blocks such as
//! `StreamTitle='Daft Punk - Around the World';StreamUrl='';` into the audio
//! data. This module extracts the artist/title pair from those blocks and
//! inspects the ICY/HTTP response tags.

/// Artist/title pair read from the stream tags.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TagInfo {
    pub artist: String,
    pub title: String,
}

impl TagInfo {
    pub fn new(artist: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            artist: artist.into(),
            title: title.into(),
        }
    }

    /// Parse a raw metadata block. Missing `StreamTitle` gives an empty value.
    pub fn from_meta(meta: &str) -> Self {
        let mut info = Self::default();
        info.update_from_meta(meta);
        info
    }

    /// Re-parse a metadata block into `self`.
    ///
    /// Returns `true` when artist or title changed. A block without a
    /// `StreamTitle` field leaves the current value untouched.
    pub fn update_from_meta(&mut self, meta: &str) -> bool {
        let Some(stream_title) = parse_meta_fields(meta)
            .into_iter()
            .find(|(key, _)| key.eq_ignore_ascii_case("StreamTitle"))
            .map(|(_, value)| value)
        else {
            return false;
        };

        let (artist, title) = split_stream_title(&stream_title);
        if self.artist == artist && self.title == title {
            return false;
        }

        self.artist = artist;
        self.title = title;
        true
    }

    /// Either field empty.
    pub fn is_empty(&self) -> bool {
        self.artist.is_empty() || self.title.is_empty()
    }
}

/// Split a metadata block into its `key='value'` fields.
///
/// Values may contain `;` and `'` (e.g. `Guns N' Roses`), so a field ends at
/// the first `';` sequence rather than at the first quote. Trailing NUL
/// padding is ignored.
pub fn parse_meta_fields(meta: &str) -> Vec<(String, String)> {
    let meta = meta.trim_end_matches('\0');
    let mut fields = Vec::new();
    let mut rest = meta;

    while let Some(eq) = rest.find("='") {
        let key = rest[..eq].trim().trim_start_matches(';').trim().to_string();
        let after = &rest[eq + 2..];

        let (value, next) = match after.find("';") {
            Some(end) => (&after[..end], &after[end + 2..]),
            None => (after.strip_suffix('\'').unwrap_or(after), ""),
        };

        if !key.is_empty() {
            fields.push((key, value.to_string()));
        }
        rest = next;
    }

    fields
}

/// Split `"Artist - Title"` on the first `" - "`.
///
/// Without separator the artist is empty and the whole string is the title.
pub fn split_stream_title(stream_title: &str) -> (String, String) {
    let stream_title = stream_title.trim();
    match stream_title.split_once(" - ") {
        Some((artist, title)) => (artist.trim().to_string(), title.trim().to_string()),
        None => (String::new(), stream_title.to_string()),
    }
}

/// Find a `name:value` tag (case-insensitive name) and return its value.
pub fn find_tag<'a>(tags: &'a [String], name: &str) -> Option<&'a str> {
    tags.iter().find_map(|tag| {
        let (key, value) = tag.split_once(':')?;
        key.trim()
            .eq_ignore_ascii_case(name)
            .then_some(value.trim())
    })
}

/// `true` when the tags announce in-band metadata (`icy-metaint`).
pub fn has_icy_metaint(tags: &[String]) -> bool {
    find_tag(tags, "icy-metaint")
        .and_then(|value| value.parse::<u64>().ok())
        .is_some_and(|interval| interval > 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_meta_with_artist_and_title() {
        let info = TagInfo::from_meta("StreamTitle='Daft Punk - Around the World';StreamUrl='';");
        assert_eq!(info.artist, "Daft Punk");
        assert_eq!(info.title, "Around the World");
        assert!(!info.is_empty());
    }

    #[test]
    fn test_from_meta_without_separator() {
        let info = TagInfo::from_meta("StreamTitle='Station jingle';");
        assert_eq!(info.artist, "");
        assert_eq!(info.title, "Station jingle");
        assert!(info.is_empty());
    }

    #[test]
    fn test_quotes_inside_value() {
        let info = TagInfo::from_meta("StreamTitle='Guns N' Roses - Don't Cry';\0\0\0");
        assert_eq!(info.artist, "Guns N' Roses");
        assert_eq!(info.title, "Don't Cry");
    }

    #[test]
    fn test_update_from_meta_reports_changes() {
        let mut info = TagInfo::default();
        assert!(info.update_from_meta("StreamTitle='A - B';"));
        assert!(!info.update_from_meta("StreamTitle='A - B';"));
        assert!(!info.update_from_meta("StreamUrl='http://x';"));
        assert!(info.update_from_meta("StreamTitle='A - C';"));
        assert_eq!(info, TagInfo::new("A", "C"));
    }

    #[test]
    fn test_parse_meta_fields() {
        let fields = parse_meta_fields("StreamTitle='x - y';StreamUrl='http://a;b';");
        assert_eq!(
            fields,
            vec![
                ("StreamTitle".to_string(), "x - y".to_string()),
                ("StreamUrl".to_string(), "http://a;b".to_string()),
            ]
        );
    }

    #[test]
    fn test_find_tag_and_metaint() {
        let tags = vec![
            "icy-name:Radio Test".to_string(),
            "ICY-METAINT: 16000".to_string(),
        ];
        assert_eq!(find_tag(&tags, "icy-name"), Some("Radio Test"));
        assert_eq!(find_tag(&tags, "icy-br"), None);
        assert!(has_icy_metaint(&tags));
        assert!(!has_icy_metaint(&["icy-metaint:0".to_string()]));
        assert!(!has_icy_metaint(&[]));
    }
}
