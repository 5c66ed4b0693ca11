//! End-to-end tests for the sweep and refresh jobs running under the scheduler.

mod common;

use common::{insert_publishable_kara, matroska_bytes, mugen_kara, FakeDakara, FakeMugen};
use kara_catalog_server::assets::{AssetSyncer, FsObjectStore, SignatureProbe};
use kara_catalog_server::background_jobs::jobs::{
    DakaraSyncJob, UpstreamRefreshJob, DAKARA_SYNC_JOB_ID, UPSTREAM_REFRESH_JOB_ID,
};
use kara_catalog_server::background_jobs::{create_scheduler, HookEvent, JobContext};
use kara_catalog_server::catalog_store::{KaraStore, SqliteKaraStore};
use kara_catalog_server::taxonomy::TaxonomyRegistry;
use kara_catalog_server::{ExportReconciler, ImportReconciler};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

#[tokio::test]
async fn test_sweep_job_runs_on_startup_and_on_request() {
    let store = Arc::new(SqliteKaraStore::in_memory().unwrap());
    let dakara = Arc::new(FakeDakara::new());
    let kara_id = insert_publishable_kara(&store, "Hello");
    let reconciler = Arc::new(ExportReconciler::new(store.clone(), dakara.clone()));

    let (hook_sender, hook_receiver) = mpsc::channel(16);
    let shutdown_token = CancellationToken::new();
    let job_context = JobContext::new(shutdown_token.child_token(), "scheduler");
    let (mut scheduler, handle) =
        create_scheduler(hook_receiver, shutdown_token.clone(), job_context);
    scheduler
        .register_job(Arc::new(DakaraSyncJob::new(
            reconciler,
            Duration::from_secs(3600),
        )))
        .await;

    let sched_handle = tokio::spawn(async move {
        scheduler.run().await;
    });
    tokio::time::sleep(Duration::from_millis(300)).await;

    assert!(dakara.song(&format!("{}.mkv", kara_id)).is_some());
    let info = handle.get_job(DAKARA_SYNC_JOB_ID).await.unwrap();
    let last_run = info.last_run.unwrap();
    assert_eq!(last_run.status, "completed");
    assert_eq!(last_run.triggered_by, "hook:OnStartup");
    assert!(info.next_run_at.is_some());

    // a remote edit is repaired by the requested sweep
    {
        let mut state = dakara.state.lock().unwrap();
        state.songs[0].title = "Edited remotely".to_string();
    }
    hook_sender.send(HookEvent::OnSweepRequested).await.unwrap();
    tokio::time::sleep(Duration::from_millis(300)).await;

    assert_eq!(
        dakara.song(&format!("{}.mkv", kara_id)).unwrap().title,
        "Hello"
    );
    let last_run = handle
        .get_job(DAKARA_SYNC_JOB_ID)
        .await
        .unwrap()
        .last_run
        .unwrap();
    assert_eq!(last_run.triggered_by, "hook:OnSweepRequested");

    shutdown_token.cancel();
    let _ = tokio::time::timeout(Duration::from_secs(2), sched_handle).await;
}

#[tokio::test]
async fn test_manual_trigger_of_sweep_job() {
    let store = Arc::new(SqliteKaraStore::in_memory().unwrap());
    let dakara = Arc::new(FakeDakara::new());
    let reconciler = Arc::new(ExportReconciler::new(store.clone(), dakara.clone()));

    let (_hook_sender, hook_receiver) = mpsc::channel(16);
    let shutdown_token = CancellationToken::new();
    let job_context = JobContext::new(shutdown_token.child_token(), "scheduler");
    let (mut scheduler, handle) =
        create_scheduler(hook_receiver, shutdown_token.clone(), job_context);
    scheduler
        .register_job(Arc::new(DakaraSyncJob::new(
            reconciler,
            Duration::from_secs(3600),
        )))
        .await;

    let sched_handle = tokio::spawn(async move {
        scheduler.run().await;
    });
    tokio::time::sleep(Duration::from_millis(300)).await;

    let kara_id = insert_publishable_kara(&store, "Added later");
    assert!(dakara.song(&format!("{}.mkv", kara_id)).is_none());

    handle.trigger(DAKARA_SYNC_JOB_ID).await.unwrap();
    tokio::time::sleep(Duration::from_millis(300)).await;

    assert!(dakara.song(&format!("{}.mkv", kara_id)).is_some());
    let last_run = handle
        .get_job(DAKARA_SYNC_JOB_ID)
        .await
        .unwrap()
        .last_run
        .unwrap();
    assert_eq!(last_run.triggered_by, "manual");

    shutdown_token.cancel();
    let _ = tokio::time::timeout(Duration::from_secs(2), sched_handle).await;
}

#[tokio::test]
async fn test_refresh_job_updates_imported_karas() {
    let temp_dir = TempDir::new().unwrap();
    let store = Arc::new(SqliteKaraStore::new(temp_dir.path().join("karas.db")).unwrap());
    let mugen = Arc::new(FakeMugen::new());
    let objects = Arc::new(FsObjectStore::new(temp_dir.path().join("assets")));
    objects.init().await.unwrap();
    let assets = Arc::new(AssetSyncer::new(
        store.clone(),
        mugen.clone(),
        objects,
        Arc::new(SignatureProbe),
        2,
    ));
    let importer = Arc::new(ImportReconciler::new(
        store.clone(),
        mugen.clone(),
        Arc::new(TaxonomyRegistry::default()),
        assets.clone(),
    ));

    let upstream = mugen_kara("Hello");
    let kid = upstream.kid;
    mugen.add(upstream, &matroska_bytes(), b"subs");
    let link = importer.import(kid).await.unwrap().link().clone();
    assets.wait_pending().await;
    mugen
        .karas
        .lock()
        .unwrap()
        .get_mut(&kid)
        .unwrap()
        .titles
        .insert("jpn".to_string(), "Renamed".to_string());

    let (_hook_sender, hook_receiver) = mpsc::channel(16);
    let shutdown_token = CancellationToken::new();
    let job_context = JobContext::new(shutdown_token.child_token(), "scheduler");
    let (mut scheduler, handle) =
        create_scheduler(hook_receiver, shutdown_token.clone(), job_context);
    scheduler
        .register_job(Arc::new(UpstreamRefreshJob::new(
            importer,
            Duration::from_secs(3600),
        )))
        .await;

    let sched_handle = tokio::spawn(async move {
        scheduler.run().await;
    });
    tokio::time::sleep(Duration::from_millis(300)).await;

    let kara = store.get_kara(link.kara_id).unwrap().unwrap();
    assert_eq!(kara.title, "Renamed");
    let last_run = handle
        .get_job(UPSTREAM_REFRESH_JOB_ID)
        .await
        .unwrap()
        .last_run
        .unwrap();
    assert_eq!(last_run.status, "completed");

    shutdown_token.cancel();
    let _ = tokio::time::timeout(Duration::from_secs(2), sched_handle).await;
}
