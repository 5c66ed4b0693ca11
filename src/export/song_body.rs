//! Outbound song representation of a local kara.

use super::snapshot::RemoteMirrorSnapshot;
use crate::catalog_store::Kara;
use crate::dakara::{DakaraSong, DakaraSongBody, DakaraSongWork};
use crate::error::{Result, SyncError};
use crate::taxonomy::{AudioTag, LinkType};

/// Longest detail the downstream catalog accepts, in characters.
pub const DETAIL_MAX_CHARS: usize = 255;

/// Downstream filename of a kara. It is unique per kara and parses back to
/// the kara ID with [`parse_song_filename`].
pub fn song_filename(kara_id: i64) -> String {
    format!("{}.mkv", kara_id)
}

/// Kara ID encoded in a downstream filename: everything before the first
/// dot, as an integer.
pub fn parse_song_filename(filename: &str) -> Option<i64> {
    filename.split('.').next()?.parse().ok()
}

/// "<version>, <language>", or whichever of the two is set.
pub fn song_version(version: &str, language: &str) -> String {
    let version = version.trim();
    let language = language.trim();
    match (version.is_empty(), language.is_empty()) {
        (false, false) => format!("{}, {}", version, language),
        (true, _) => language.to_string(),
        (false, true) => version.to_string(),
    }
}

pub fn song_detail(comment: &str) -> String {
    let truncated: String = comment.chars().take(DETAIL_MAX_CHARS).collect();
    truncated.trim().to_string()
}

/// Builds the song body for `kara` from the current remote lookups.
///
/// Every tag, artist and source work the kara references must already exist
/// remotely; a missing one is reported as not found.
pub fn build_song_body(kara: &Kara, snapshot: &RemoteMirrorSnapshot) -> Result<DakaraSongBody> {
    let mut tags = Vec::with_capacity(kara.audio_tags.len() + kara.video_tags.len());
    let tag_names = kara
        .audio_tags
        .iter()
        .filter(|t| !t.is_composition_marker())
        .map(AudioTag::name)
        .chain(kara.video_tags.iter().map(|t| t.name()));
    for name in tag_names {
        let tag = snapshot.tag(name).ok_or_else(|| {
            SyncError::NotFound(format!("remote tag {:?} for kara {}", name, kara.id))
        })?;
        tags.push(tag.clone());
    }

    let artists = kara
        .artists
        .iter()
        .map(|artist| {
            snapshot.artist(&artist.name).cloned().ok_or_else(|| {
                SyncError::NotFound(format!(
                    "remote artist {:?} for kara {}",
                    artist.name, kara.id
                ))
            })
        })
        .collect::<Result<Vec<_>>>()?;

    // Only the source media is linked: the link type of associated media
    // is unknown.
    let mut works = Vec::new();
    if let Some(media) = &kara.source_media {
        let work = snapshot.work(media.media_type, &media.name).ok_or_else(|| {
            SyncError::NotFound(format!(
                "remote work {:?} ({}) for kara {}",
                media.name, media.media_type, kara.id
            ))
        })?;
        works.push(DakaraSongWork {
            work: work.clone(),
            link_type: LinkType::from_audio_tags(&kara.audio_tags)
                .map(|lt| lt.code().to_string())
                .unwrap_or_default(),
            link_type_number: (kara.song_order != 0).then_some(kara.song_order),
        });
    }

    Ok(DakaraSongBody {
        title: kara.title.clone(),
        filename: song_filename(kara.id),
        duration: kara.duration,
        directory: String::new(),
        version: song_version(&kara.version, &kara.language),
        detail: song_detail(&kara.comment),
        detail_video: String::new(),
        tags,
        artists,
        works,
        lyrics: String::new(),
        has_instrumental: false,
    })
}

fn sorted_ids(ids: impl Iterator<Item = i64>) -> Vec<i64> {
    let mut ids: Vec<i64> = ids.collect();
    ids.sort_unstable();
    ids
}

fn work_links(works: &[DakaraSongWork]) -> Vec<(i64, &str, u32)> {
    let mut links: Vec<(i64, &str, u32)> = works
        .iter()
        .map(|w| {
            (
                w.work.id,
                w.link_type.as_str(),
                w.link_type_number.unwrap_or(0),
            )
        })
        .collect();
    links.sort_unstable();
    links
}

/// Whether pushing `body` would change `remote`. Lyrics are not compared.
pub fn song_body_changed(body: &DakaraSongBody, remote: &DakaraSong) -> bool {
    body.title != remote.title
        || body.filename != remote.filename
        || body.duration != remote.duration
        || body.directory != remote.directory
        || body.version != remote.version
        || body.detail != remote.detail
        || body.detail_video != remote.detail_video
        || sorted_ids(body.tags.iter().map(|t| t.id))
            != sorted_ids(remote.tags.iter().map(|t| t.id))
        || sorted_ids(body.artists.iter().map(|a| a.id))
            != sorted_ids(remote.artists.iter().map(|a| a.id))
        || work_links(&body.works) != work_links(&remote.works)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog_store::{Artist, Media};
    use crate::dakara::{DakaraArtist, DakaraTag, DakaraWork, DakaraWorkType};
    use crate::taxonomy::{MediaType, VideoTag};

    fn kara() -> Kara {
        Kara {
            id: 42,
            title: "X".to_string(),
            extra_titles: vec![],
            version: String::new(),
            language: String::new(),
            comment: String::new(),
            song_order: 0,
            duration: 90,
            video_tags: vec![VideoTag::Ending],
            audio_tags: vec![AudioTag::Ending],
            source_media: Some(Media {
                id: 1,
                name: "Foo".to_string(),
                media_type: MediaType::Anime,
            }),
            medias: vec![Media {
                id: 2,
                name: "Bar".to_string(),
                media_type: MediaType::Anime,
            }],
            artists: vec![Artist {
                id: 1,
                name: "Singer".to_string(),
                aliases: vec![],
            }],
            authors: vec![],
            video_uploaded: true,
            instrumental_uploaded: false,
            subtitles_uploaded: true,
            hardsub: false,
            edited: false,
            created_at: 0,
            updated_at: 0,
        }
    }

    fn snapshot() -> RemoteMirrorSnapshot {
        let mut snapshot = RemoteMirrorSnapshot::new();
        snapshot.set_works(vec![DakaraWork {
            id: 7,
            title: "Foo".to_string(),
            subtitle: String::new(),
            work_type: DakaraWorkType {
                query_name: "anime".to_string(),
                name: "Anime".to_string(),
                name_plural: "Animes".to_string(),
                icon_name: "tv".to_string(),
            },
            song_count: 0,
        }]);
        snapshot.set_artists(vec![DakaraArtist {
            id: 3,
            name: "Singer".to_string(),
            song_count: 0,
        }]);
        snapshot.set_tags(vec![
            DakaraTag {
                id: 11,
                name: "Ending".to_string(),
                color_hue: 30,
                disabled: false,
            },
            DakaraTag {
                id: 12,
                name: "Cover".to_string(),
                color_hue: 330,
                disabled: false,
            },
        ]);
        snapshot
    }

    fn as_remote(body: &DakaraSongBody) -> DakaraSong {
        DakaraSong {
            id: 100,
            title: body.title.clone(),
            filename: body.filename.clone(),
            duration: body.duration,
            directory: body.directory.clone(),
            version: body.version.clone(),
            detail: body.detail.clone(),
            detail_video: body.detail_video.clone(),
            tags: body.tags.iter().rev().cloned().collect(),
            artists: body.artists.clone(),
            works: body.works.clone(),
            lyrics_preview: None,
            has_instrumental: false,
        }
    }

    #[test]
    fn test_filename_round_trip() {
        for id in [1, 42, 123456789] {
            assert_eq!(parse_song_filename(&song_filename(id)), Some(id));
        }
        assert_eq!(parse_song_filename("not-ours.mkv"), None);
        assert_eq!(parse_song_filename(""), None);
        assert_eq!(parse_song_filename("12.part.mkv"), Some(12));
    }

    #[test]
    fn test_body_for_ending_without_song_order() {
        let body = build_song_body(&kara(), &snapshot()).unwrap();

        assert_eq!(body.filename, "42.mkv");
        let tag_names: Vec<&str> = body.tags.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(tag_names, vec!["Ending"]);
        assert_eq!(body.artists[0].id, 3);
        assert_eq!(body.works.len(), 1);
        assert_eq!(body.works[0].work.id, 7);
        assert_eq!(body.works[0].link_type, "ED");
        assert_eq!(body.works[0].link_type_number, None);
        assert_eq!(body.lyrics, "");
    }

    #[test]
    fn test_opening_with_song_order_and_no_marker() {
        let mut k = kara();
        k.audio_tags = vec![AudioTag::Opening, AudioTag::Cover];
        k.song_order = 2;
        let body = build_song_body(&k, &snapshot()).unwrap();
        assert_eq!(body.works[0].link_type, "OP");
        assert_eq!(body.works[0].link_type_number, Some(2));
        let tag_names: Vec<&str> = body.tags.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(tag_names, vec!["Cover", "Ending"]);

        k.audio_tags = vec![];
        let body = build_song_body(&k, &snapshot()).unwrap();
        assert_eq!(body.works[0].link_type, "");
    }

    #[test]
    fn test_missing_remote_entity_is_not_found() {
        let mut k = kara();
        k.video_tags = vec![VideoTag::Trailer];
        assert!(build_song_body(&k, &snapshot()).unwrap_err().is_not_found());

        let mut k = kara();
        k.source_media.as_mut().unwrap().media_type = MediaType::Game;
        assert!(build_song_body(&k, &snapshot()).unwrap_err().is_not_found());
    }

    #[test]
    fn test_version_and_detail() {
        assert_eq!(song_version("Full", "jpn"), "Full, jpn");
        assert_eq!(song_version(" ", "jpn\n"), "jpn");
        assert_eq!(song_version("Full ", ""), "Full");
        assert_eq!(song_version("", ""), "");

        let long = format!("  {}", "a".repeat(300));
        let detail = song_detail(&long);
        assert_eq!(detail.len(), DETAIL_MAX_CHARS - 2);
        assert_eq!(song_detail("é".repeat(300).as_str()).chars().count(), 255);
    }

    #[test]
    fn test_change_detection() {
        let body = build_song_body(&kara(), &snapshot()).unwrap();
        let remote = as_remote(&body);
        // tag order does not matter
        assert!(!song_body_changed(&body, &remote));

        let mut changed = remote.clone();
        changed.title = "Y".to_string();
        assert!(song_body_changed(&body, &changed));

        let mut changed = remote.clone();
        changed.works[0].link_type_number = Some(1);
        assert!(song_body_changed(&body, &changed));

        let mut changed = remote;
        changed.artists.clear();
        assert!(song_body_changed(&body, &changed));
    }
}
