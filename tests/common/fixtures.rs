//! Upstream records and local karas used across tests.

use kara_catalog_server::catalog_store::{
    AssetKind, KaraStore, NewKara, SqliteKaraStore, UpstreamImport,
};
use kara_catalog_server::mugen::{ExternalDatabaseIds, MugenKara, MugenTag};
use kara_catalog_server::taxonomy::{AudioTag, MediaType, VideoTag};
use std::collections::BTreeMap;
use uuid::Uuid;

pub fn mugen_tag(name: &str, short: Option<&str>) -> MugenTag {
    MugenTag {
        tid: Uuid::new_v4(),
        name: name.to_string(),
        short: short.map(|s| s.to_string()),
        i18n: BTreeMap::new(),
        aliases: vec![],
        external_database_ids: ExternalDatabaseIds::default(),
    }
}

/// An anime ending sung by "Singer", from the series "Foo".
pub fn mugen_kara(title: &str) -> MugenKara {
    let kid = Uuid::new_v4();
    let mut titles = BTreeMap::new();
    titles.insert("jpn".to_string(), title.to_string());
    let mut series = mugen_tag("Foo", None);
    series.external_database_ids.anilist = Some(101);
    MugenKara {
        kid,
        titles,
        title_default_language: "jpn".to_string(),
        media_file: format!("{}.mp4", kid),
        media_size: 0,
        sub_file: format!("{}.ass", kid),
        sub_checksum: "c1".to_string(),
        duration: 90,
        series: vec![series],
        singers: vec![mugen_tag("Singer", None)],
        song_types: vec![mugen_tag("Ending", Some("ED"))],
        authors: vec![mugen_tag("Timer", None)],
        languages: vec![mugen_tag("jpn", None)],
        ..Default::default()
    }
}

/// First bytes of a Matroska file, enough for the container sniffing.
pub fn matroska_bytes() -> Vec<u8> {
    let mut bytes = vec![0x1A, 0x45, 0xDF, 0xA3, 0x93, 0x42, 0x82, 0x88];
    bytes.extend_from_slice(b"matroska");
    bytes.extend_from_slice(&[0u8; 48]);
    bytes
}

/// Creates a publishable anime ending kara directly in the store.
pub fn insert_publishable_kara(store: &SqliteKaraStore, title: &str) -> i64 {
    let mut kara_id = 0;
    store
        .run_in_transaction(&mut |tx| {
            let media = tx.find_or_create_media("Foo", MediaType::Anime)?;
            let artist = match tx.find_artist(&["Singer"])? {
                Some(a) => a,
                None => tx.create_artist("Singer", &[])?,
            };
            kara_id = tx.create_kara(&NewKara {
                title: title.to_string(),
                duration: 90,
                video_tags: vec![VideoTag::Ending],
                audio_tags: vec![AudioTag::Ending],
                source_media_id: Some(media.id),
                artist_ids: vec![artist.id],
                ..Default::default()
            })?;
            Ok(())
        })
        .unwrap();
    store
        .set_asset_uploaded(kara_id, AssetKind::Video, true)
        .unwrap();
    store
        .set_asset_uploaded(kara_id, AssetKind::Subtitles, true)
        .unwrap();
    kara_id
}

pub fn import_of(store: &SqliteKaraStore, upstream_id: Uuid) -> Option<UpstreamImport> {
    store.get_import(upstream_id).unwrap()
}
