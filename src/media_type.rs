//! Known NFO media types and the static per-type tables.
//!
//! The field-order table drives element ordering when a canonical tree is
//! written back to XML. The recommended-field table drives the advisory
//! checks of strict validation.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::NfoError;

/// Media types recognised under `root/media`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    Movie,
    TvShow,
    Music,
    Audiobook,
    Podcast,
    Anime,
    Adult,
    MusicVideo,
    Video,
}

const MOVIE_FIELD_ORDER: &[&str] = &[
    "title",
    "originaltitle",
    "sorttitle",
    "alternatetitle",
    "year",
    "rating",
    "userrating",
    "outline",
    "plot",
    "tagline",
    "runtime",
    "banner",
    "thumb",
    "fanart",
    "contentrating",
    "uniqueid",
    "genre",
    "tag",
    "setname",
    "setoverview",
    "country",
    "productioncompany",
    "keyword",
    "releasedate",
    "award",
    "subtitlelanguage",
    "soundtrack",
    "parentalguide",
    "actor",
    "director",
    "writer",
    "composer",
    "producers",
    "collection",
    "intro",
    "credits",
    "library",
];

const TVSHOW_FIELD_ORDER: &[&str] = &[
    "title",
    "originaltitle",
    "sorttitle",
    "alternatetitle",
    "year",
    "rating",
    "userrating",
    "outline",
    "plot",
    "tagline",
    "runtime",
    "banner",
    "thumb",
    "fanart",
    "contentrating",
    "uniqueid",
    "genre",
    "tag",
    "country",
    "premiered",
    "status",
    "studio",
    "season",
    "episode",
    "displayseason",
    "displayepisode",
    "actor",
    "director",
    "writer",
    "creator",
];

const MUSIC_FIELD_ORDER: &[&str] = &[
    "title",
    "artist",
    "albumartist",
    "album",
    "year",
    "genre",
    "style",
    "mood",
    "rating",
    "userrating",
    "compilation",
    "label",
    "type",
    "releasedate",
    "originalreleasedate",
    "barcode",
    "catalognumber",
    "thumb",
    "path",
    "track",
];

impl MediaType {
    /// All media types, in the order they are probed under `media`
    pub const ALL: [MediaType; 9] = [
        MediaType::Movie,
        MediaType::TvShow,
        MediaType::Music,
        MediaType::Audiobook,
        MediaType::Podcast,
        MediaType::Anime,
        MediaType::Adult,
        MediaType::MusicVideo,
        MediaType::Video,
    ];

    /// Element name used in NFO documents
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaType::Movie => "movie",
            MediaType::TvShow => "tvshow",
            MediaType::Music => "music",
            MediaType::Audiobook => "audiobook",
            MediaType::Podcast => "podcast",
            MediaType::Anime => "anime",
            MediaType::Adult => "adult",
            MediaType::MusicVideo => "musicvideo",
            MediaType::Video => "video",
        }
    }

    /// Canonical element order used when writing XML.
    ///
    /// Types without a table keep the input order of their fields.
    pub fn field_order(&self) -> &'static [&'static str] {
        match self {
            MediaType::Movie => MOVIE_FIELD_ORDER,
            MediaType::TvShow => TVSHOW_FIELD_ORDER,
            MediaType::Music => MUSIC_FIELD_ORDER,
            _ => &[],
        }
    }

    /// Fields that strict validation expects to find under the media element
    pub fn recommended_fields(&self) -> &'static [&'static str] {
        match self {
            MediaType::Movie => &["year", "runtime", "genre", "director", "actor", "plot"],
            MediaType::TvShow => &["year", "genre", "actor", "plot", "season", "episode"],
            MediaType::Music => &["artist", "album", "year", "genre"],
            MediaType::Audiobook => &["author", "narrator", "publisher", "year"],
            MediaType::Podcast => &["author", "category", "pubDate", "duration"],
            _ => &[],
        }
    }
}

impl fmt::Display for MediaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MediaType {
    type Err = NfoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lowered = s.trim().to_ascii_lowercase();
        MediaType::ALL
            .into_iter()
            .find(|media_type| media_type.as_str() == lowered)
            .ok_or_else(|| NfoError::UnsupportedMediaType {
                media_type: s.to_string(),
            })
    }
}
