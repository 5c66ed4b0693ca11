//! In-memory view of the downstream catalog, rebuilt on every sweep.

use crate::dakara::{DakaraArtist, DakaraSong, DakaraTag, DakaraWork, DakaraWorkType};
use crate::taxonomy::MediaType;
use std::collections::HashMap;

/// Name/filename lookups over the remote collections.
///
/// Each collection is replaced wholesale when it is re-fetched; nothing is
/// carried over between sweeps.
#[derive(Debug, Default)]
pub struct RemoteMirrorSnapshot {
    work_types: HashMap<String, DakaraWorkType>,
    works: HashMap<String, HashMap<String, DakaraWork>>,
    artists: HashMap<String, DakaraArtist>,
    tags: HashMap<String, DakaraTag>,
    songs: HashMap<String, DakaraSong>,
}

impl RemoteMirrorSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_work_types(&mut self, work_types: Vec<DakaraWorkType>) {
        self.work_types = work_types
            .into_iter()
            .map(|wt| (wt.query_name.clone(), wt))
            .collect();
    }

    /// Works are keyed by their work type's query name, then by title.
    pub fn set_works(&mut self, works: Vec<DakaraWork>) {
        self.works.clear();
        for work in works {
            self.works
                .entry(work.work_type.query_name.clone())
                .or_default()
                .insert(work.title.clone(), work);
        }
    }

    pub fn set_artists(&mut self, artists: Vec<DakaraArtist>) {
        self.artists = artists.into_iter().map(|a| (a.name.clone(), a)).collect();
    }

    pub fn set_tags(&mut self, tags: Vec<DakaraTag>) {
        self.tags = tags.into_iter().map(|t| (t.name.clone(), t)).collect();
    }

    pub fn set_songs(&mut self, songs: Vec<DakaraSong>) {
        self.songs = songs.into_iter().map(|s| (s.filename.clone(), s)).collect();
    }

    pub fn has_work_type(&self, media_type: MediaType) -> bool {
        self.work_types.contains_key(&media_type.query_name())
    }

    pub fn work(&self, media_type: MediaType, title: &str) -> Option<&DakaraWork> {
        self.works
            .get(&media_type.query_name())
            .and_then(|by_title| by_title.get(title))
    }

    pub fn artist(&self, name: &str) -> Option<&DakaraArtist> {
        self.artists.get(name)
    }

    pub fn tag(&self, name: &str) -> Option<&DakaraTag> {
        self.tags.get(name)
    }

    pub fn song(&self, filename: &str) -> Option<&DakaraSong> {
        self.songs.get(filename)
    }

    pub fn songs(&self) -> impl Iterator<Item = &DakaraSong> {
        self.songs.values()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn work_type(media_type: MediaType) -> DakaraWorkType {
        DakaraWorkType {
            query_name: media_type.query_name(),
            name: media_type.name().to_string(),
            name_plural: format!("{}s", media_type.name()),
            icon_name: media_type.icon_name().to_string(),
        }
    }

    fn work(id: i64, title: &str, media_type: MediaType) -> DakaraWork {
        DakaraWork {
            id,
            title: title.to_string(),
            subtitle: String::new(),
            work_type: work_type(media_type),
            song_count: 0,
        }
    }

    #[test]
    fn test_works_are_scoped_by_type() {
        let mut snapshot = RemoteMirrorSnapshot::new();
        snapshot.set_works(vec![
            work(1, "Foo", MediaType::Anime),
            work(2, "Foo", MediaType::Game),
        ]);

        assert_eq!(snapshot.work(MediaType::Anime, "Foo").unwrap().id, 1);
        assert_eq!(snapshot.work(MediaType::Game, "Foo").unwrap().id, 2);
        assert!(snapshot.work(MediaType::Live, "Foo").is_none());
    }

    #[test]
    fn test_refetch_replaces_previous_contents() {
        let mut snapshot = RemoteMirrorSnapshot::new();
        snapshot.set_works(vec![work(1, "Foo", MediaType::Anime)]);
        snapshot.set_works(vec![work(3, "Bar", MediaType::Anime)]);
        assert!(snapshot.work(MediaType::Anime, "Foo").is_none());

        snapshot.set_work_types(vec![work_type(MediaType::Anime)]);
        assert!(snapshot.has_work_type(MediaType::Anime));
        assert!(!snapshot.has_work_type(MediaType::Cartoon));
    }
}
