//! Wire models for the downstream karaoke library.

use serde::{Deserialize, Serialize};

/// Pagination block of every list response.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    pub current: u32,
    pub last: u32,
}

/// List response as sent on the wire.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PaginatedResponse<T> {
    pub pagination: Pagination,
    pub count: u64,
    pub results: Vec<T>,
}

/// One page of a remote collection.
#[derive(Clone, Debug, PartialEq)]
pub struct Page<T> {
    pub current_page: u32,
    pub last_page: u32,
    pub total_count: u64,
    pub results: Vec<T>,
}

impl<T> Page<T> {
    /// There is a page after this one.
    pub fn has_next(&self) -> bool {
        self.current_page < self.last_page
    }
}

impl<T> From<PaginatedResponse<T>> for Page<T> {
    fn from(response: PaginatedResponse<T>) -> Self {
        Page {
            current_page: response.pagination.current,
            last_page: response.pagination.last,
            total_count: response.count,
            results: response.results,
        }
    }
}

/// Work type, used both as a list item and as a creation body. The remote
/// identifies work types by `query_name` and exposes no numeric ID.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DakaraWorkType {
    pub query_name: String,
    pub name: String,
    pub name_plural: String,
    #[serde(default)]
    pub icon_name: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DakaraWork {
    pub id: i64,
    pub title: String,
    #[serde(default)]
    pub subtitle: String,
    pub work_type: DakaraWorkType,
    #[serde(default)]
    pub song_count: u32,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DakaraWorkBody {
    pub title: String,
    pub work_type: DakaraWorkType,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DakaraArtist {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub song_count: u32,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DakaraArtistBody {
    pub name: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DakaraTag {
    pub id: i64,
    pub name: String,
    pub color_hue: u32,
    #[serde(default)]
    pub disabled: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DakaraTagBody {
    pub name: String,
    pub color_hue: u32,
}

/// Link between a song and a work.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DakaraSongWork {
    pub work: DakaraWork,
    /// "OP", "ED", "IN", "IS" or empty when unknown.
    pub link_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link_type_number: Option<u32>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DakaraLyricsPreview {
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub truncated: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DakaraSong {
    pub id: i64,
    pub title: String,
    pub filename: String,
    #[serde(default)]
    pub duration: u32,
    #[serde(default)]
    pub directory: String,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub detail: String,
    #[serde(default)]
    pub detail_video: String,
    #[serde(default)]
    pub tags: Vec<DakaraTag>,
    #[serde(default)]
    pub artists: Vec<DakaraArtist>,
    #[serde(default)]
    pub works: Vec<DakaraSongWork>,
    #[serde(default)]
    pub lyrics_preview: Option<DakaraLyricsPreview>,
    #[serde(default)]
    pub has_instrumental: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DakaraSongBody {
    pub title: String,
    pub filename: String,
    pub duration: u32,
    pub directory: String,
    pub version: String,
    pub detail: String,
    pub detail_video: String,
    pub tags: Vec<DakaraTag>,
    pub artists: Vec<DakaraArtist>,
    pub works: Vec<DakaraSongWork>,
    pub lyrics: String,
    pub has_instrumental: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_from_wire_response() {
        let json = serde_json::json!({
            "pagination": {"current": 1, "last": 3},
            "count": 250,
            "results": [{"id": 1, "name": "Singer", "song_count": 4}]
        });
        let response: PaginatedResponse<DakaraArtist> = serde_json::from_value(json).unwrap();
        let page = Page::from(response);

        assert_eq!(page.current_page, 1);
        assert_eq!(page.last_page, 3);
        assert_eq!(page.total_count, 250);
        assert!(page.has_next());
        assert_eq!(page.results[0].name, "Singer");
    }

    #[test]
    fn test_song_work_omits_missing_link_number() {
        let work = DakaraSongWork {
            work: DakaraWork {
                id: 3,
                title: "Foo".to_string(),
                subtitle: String::new(),
                work_type: DakaraWorkType {
                    query_name: "anime".to_string(),
                    name: "Anime".to_string(),
                    name_plural: "Animes".to_string(),
                    icon_name: "tv".to_string(),
                },
                song_count: 0,
            },
            link_type: "ED".to_string(),
            link_type_number: None,
        };
        let value = serde_json::to_value(&work).unwrap();
        assert!(value.get("link_type_number").is_none());
        assert_eq!(value["link_type"], "ED");
    }
}
