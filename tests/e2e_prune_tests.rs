//! End-to-end tests for removing remote songs with no publishable kara.

mod common;

use common::{insert_publishable_kara, FakeDakara};
use kara_catalog_server::catalog_store::{AssetKind, KaraStore, SqliteKaraStore};
use kara_catalog_server::ExportReconciler;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

fn setup() -> (Arc<SqliteKaraStore>, Arc<FakeDakara>, ExportReconciler) {
    let store = Arc::new(SqliteKaraStore::in_memory().unwrap());
    let dakara = Arc::new(FakeDakara::new());
    let reconciler = ExportReconciler::new(store.clone(), dakara.clone());
    (store, dakara, reconciler)
}

#[tokio::test]
async fn test_unknown_and_unparseable_filenames_are_deleted() {
    let (store, dakara, reconciler) = setup();
    let kara_id = insert_publishable_kara(&store, "Hello");
    dakara.seed_song("garbage.mkv");
    dakara.seed_song("999.mkv");

    let report = reconciler.sweep(&CancellationToken::new()).await.unwrap();
    assert_eq!(report.songs_deleted, 2);
    assert_eq!(report.prune_errors, 0);

    assert!(dakara.song("garbage.mkv").is_none());
    assert!(dakara.song("999.mkv").is_none());
    assert!(dakara.song(&format!("{}.mkv", kara_id)).is_some());

    let state = dakara.state.lock().unwrap();
    assert_eq!(state.prune_works_calls, 1);
    assert_eq!(state.prune_artists_calls, 1);
}

#[tokio::test]
async fn test_failed_delete_stops_deletes_but_still_prunes() {
    let (store, dakara, reconciler) = setup();
    insert_publishable_kara(&store, "Hello");
    let first = dakara.seed_song("998.mkv");
    let second = dakara.seed_song("999.mkv");
    assert!(first < second);
    dakara.state.lock().unwrap().failing_deletes.insert(first);

    let report = reconciler.sweep(&CancellationToken::new()).await.unwrap();
    assert_eq!(report.songs_deleted, 0);
    assert_eq!(report.prune_errors, 1);

    // the failure on the first orphan stops the walk
    assert!(dakara.song("998.mkv").is_some());
    assert!(dakara.song("999.mkv").is_some());
    assert!(!dakara
        .writes()
        .contains(&format!("delete_song {}", second)));

    let state = dakara.state.lock().unwrap();
    assert_eq!(state.prune_works_calls, 1);
    assert_eq!(state.prune_artists_calls, 1);
}

#[tokio::test]
async fn test_kara_losing_its_video_is_unpublished() {
    let (store, dakara, reconciler) = setup();
    let kept = insert_publishable_kara(&store, "Kept");
    let dropped = insert_publishable_kara(&store, "Dropped");

    let report = reconciler.sweep(&CancellationToken::new()).await.unwrap();
    assert_eq!(report.songs_created, 2);

    store
        .set_asset_uploaded(dropped, AssetKind::Video, false)
        .unwrap();

    let report = reconciler.sweep(&CancellationToken::new()).await.unwrap();
    assert_eq!(report.songs_deleted, 1);
    assert!(dakara.song(&format!("{}.mkv", dropped)).is_none());
    assert!(dakara.song(&format!("{}.mkv", kept)).is_some());
}

#[tokio::test]
async fn test_prune_drops_works_no_song_references() {
    let (store, dakara, reconciler) = setup();
    insert_publishable_kara(&store, "Hello");
    reconciler.sweep(&CancellationToken::new()).await.unwrap();
    assert_eq!(dakara.state.lock().unwrap().works.len(), 1);

    // every kara stops being publishable
    for kara in store.list_publishable_karas().unwrap() {
        store
            .set_asset_uploaded(kara.id, AssetKind::Video, false)
            .unwrap();
    }
    let report = reconciler.sweep(&CancellationToken::new()).await.unwrap();

    assert_eq!(report.songs_deleted, 1);
    let state = dakara.state.lock().unwrap();
    assert!(state.songs.is_empty());
    assert!(state.works.is_empty());
    assert!(state.artists.is_empty());
}
