//! Fixed local category and tag sets.
//!
//! These are closed sets: every value stored on a kara must parse back into
//! one of these enums, and the downstream catalog is fed from the same tables.

use crate::error::{Result, SyncError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Category of a local media entity (downstream "work type").
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum MediaType {
    Anime,
    Game,
    Live,
    Cartoon,
}

impl MediaType {
    pub const ALL: [MediaType; 4] = [
        MediaType::Anime,
        MediaType::Game,
        MediaType::Live,
        MediaType::Cartoon,
    ];

    /// Identifier stored in the database.
    pub fn id(&self) -> &'static str {
        match self {
            MediaType::Anime => "ANIME",
            MediaType::Game => "GAME",
            MediaType::Live => "LIVE",
            MediaType::Cartoon => "CARTOON",
        }
    }

    /// User visible name.
    pub fn name(&self) -> &'static str {
        match self {
            MediaType::Anime => "Anime",
            MediaType::Game => "Game",
            MediaType::Live => "Live action",
            MediaType::Cartoon => "Cartoon",
        }
    }

    pub fn icon_name(&self) -> &'static str {
        match self {
            MediaType::Anime => "tv",
            MediaType::Game => "gamepad",
            MediaType::Live => "video",
            MediaType::Cartoon => "child",
        }
    }

    /// Key used by the downstream catalog to identify the work type.
    pub fn query_name(&self) -> String {
        self.id().to_lowercase()
    }
}

impl fmt::Display for MediaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

impl FromStr for MediaType {
    type Err = SyncError;

    fn from_str(s: &str) -> Result<Self> {
        MediaType::ALL
            .into_iter()
            .find(|t| t.id() == s)
            .ok_or_else(|| SyncError::validation(format!("unknown media type {}", s)))
    }
}

/// Video tags, describing what is shown on screen.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum VideoTag {
    Opening,
    Ending,
    Insert,
    Fanmade,
    Stream,
    Concert,
    Advertisement,
    Trailer,
}

impl VideoTag {
    pub const ALL: [VideoTag; 8] = [
        VideoTag::Opening,
        VideoTag::Ending,
        VideoTag::Insert,
        VideoTag::Fanmade,
        VideoTag::Stream,
        VideoTag::Concert,
        VideoTag::Advertisement,
        VideoTag::Trailer,
    ];

    pub fn id(&self) -> &'static str {
        match self {
            VideoTag::Opening => "OP",
            VideoTag::Ending => "ED",
            VideoTag::Insert => "INSERT",
            VideoTag::Fanmade => "FANMADE",
            VideoTag::Stream => "STREAM",
            VideoTag::Concert => "CONCERT",
            VideoTag::Advertisement => "AD",
            VideoTag::Trailer => "TRAILER",
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            VideoTag::Opening => "Opening",
            VideoTag::Ending => "Ending",
            VideoTag::Insert => "Insert",
            VideoTag::Fanmade => "Fanmade",
            VideoTag::Stream => "Stream",
            VideoTag::Concert => "Concert",
            VideoTag::Advertisement => "Advertisement",
            VideoTag::Trailer => "Trailer",
        }
    }

    /// Color hue used for the downstream tag.
    pub fn hue(&self) -> u32 {
        match self {
            VideoTag::Opening => 0,
            VideoTag::Ending => 30,
            VideoTag::Insert => 60,
            VideoTag::Fanmade => 120,
            VideoTag::Stream => 180,
            VideoTag::Concert => 210,
            VideoTag::Advertisement => 270,
            VideoTag::Trailer => 300,
        }
    }
}

impl FromStr for VideoTag {
    type Err = SyncError;

    fn from_str(s: &str) -> Result<Self> {
        VideoTag::ALL
            .into_iter()
            .find(|t| t.id() == s)
            .ok_or_else(|| SyncError::validation(format!("unknown video tag {}", s)))
    }
}

/// Audio tags, describing the song itself.
///
/// Opening, Ending, Insert and Image Song are composition markers: downstream
/// they become the link type between a song and its work, not song tags.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum AudioTag {
    Opening,
    Ending,
    Insert,
    ImageSong,
    Live,
    Cover,
}

impl AudioTag {
    pub const ALL: [AudioTag; 6] = [
        AudioTag::Opening,
        AudioTag::Ending,
        AudioTag::Insert,
        AudioTag::ImageSong,
        AudioTag::Live,
        AudioTag::Cover,
    ];

    pub fn id(&self) -> &'static str {
        match self {
            AudioTag::Opening => "OP",
            AudioTag::Ending => "ED",
            AudioTag::Insert => "INS",
            AudioTag::ImageSong => "IS",
            AudioTag::Live => "LIVE",
            AudioTag::Cover => "COVER",
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            AudioTag::Opening => "Opening",
            AudioTag::Ending => "Ending",
            AudioTag::Insert => "Insert",
            AudioTag::ImageSong => "Image Song",
            AudioTag::Live => "Live",
            AudioTag::Cover => "Cover",
        }
    }

    pub fn hue(&self) -> u32 {
        match self {
            AudioTag::Opening => 0,
            AudioTag::Ending => 30,
            AudioTag::Insert => 60,
            AudioTag::ImageSong => 90,
            AudioTag::Live => 240,
            AudioTag::Cover => 330,
        }
    }

    /// Link type this tag expresses downstream, if it is a composition marker.
    pub fn link_type(&self) -> Option<LinkType> {
        match self {
            AudioTag::Opening => Some(LinkType::Opening),
            AudioTag::Ending => Some(LinkType::Ending),
            AudioTag::Insert => Some(LinkType::Insert),
            AudioTag::ImageSong => Some(LinkType::ImageSong),
            AudioTag::Live | AudioTag::Cover => None,
        }
    }

    pub fn is_composition_marker(&self) -> bool {
        self.link_type().is_some()
    }

    /// Audio tags that are mirrored downstream as song tags.
    pub fn mirrored() -> impl Iterator<Item = AudioTag> {
        AudioTag::ALL
            .into_iter()
            .filter(|t| !t.is_composition_marker())
    }
}

impl FromStr for AudioTag {
    type Err = SyncError;

    fn from_str(s: &str) -> Result<Self> {
        AudioTag::ALL
            .into_iter()
            .find(|t| t.id() == s)
            .ok_or_else(|| SyncError::validation(format!("unknown audio tag {}", s)))
    }
}

/// Relationship between a downstream song and its source work.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum LinkType {
    Opening,
    Ending,
    Insert,
    ImageSong,
}

impl LinkType {
    pub fn code(&self) -> &'static str {
        match self {
            LinkType::Opening => "OP",
            LinkType::Ending => "ED",
            LinkType::Insert => "IN",
            LinkType::ImageSong => "IS",
        }
    }

    /// First composition marker found in `tags`, in tag order.
    pub fn from_audio_tags(tags: &[AudioTag]) -> Option<LinkType> {
        tags.iter().find_map(|t| t.link_type())
    }
}
