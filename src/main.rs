use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use kara_catalog_server::assets::{AssetSyncer, FsObjectStore, SignatureProbe};
use kara_catalog_server::background_jobs::jobs::{DakaraSyncJob, UpstreamRefreshJob};
use kara_catalog_server::background_jobs::{create_scheduler, HookEvent, JobContext};
use kara_catalog_server::catalog_store::{KaraStore, SqliteKaraStore};
use kara_catalog_server::config::{
    AppConfig, CliConfig, FileConfig, DEFAULT_HTTP_TIMEOUT_SEC, DEFAULT_SWEEP_INTERVAL_SECS,
};
use kara_catalog_server::dakara::DakaraClient;
use kara_catalog_server::export::ExportReconciler;
use kara_catalog_server::import::{ImportOutcome, ImportReconciler};
use kara_catalog_server::metrics;
use kara_catalog_server::mugen::{
    MugenApi, MugenClient, DEFAULT_MUGEN_MEDIA_SERVER, DEFAULT_MUGEN_SERVER,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, level_filters::LevelFilter};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use uuid::Uuid;

fn parse_path(s: &str) -> Result<PathBuf> {
    let path_buf = PathBuf::from(s);
    let original_path = match path_buf.canonicalize() {
        Ok(path) => path,
        Err(msg) => {
            if msg.kind() == std::io::ErrorKind::NotFound {
                path_buf
            } else {
                return Err(msg).with_context(|| format!("Error resolving path: {}", s));
            }
        }
    };
    if original_path.is_absolute() {
        return Ok(original_path);
    }
    let cwd = std::env::current_dir()?;
    Ok(cwd.join(original_path))
}

#[derive(Parser, Debug)]
#[command(version, about = "Keeps a local karaoke library in sync with Kara.moe and Dakara")]
struct CliArgs {
    /// Path to a TOML config file. Values in the file override CLI flags.
    #[clap(long, global = true, value_parser = parse_path)]
    pub config: Option<PathBuf>,

    /// Path to the SQLite kara library.
    #[clap(long, global = true, value_parser = parse_path)]
    pub db_path: Option<PathBuf>,

    /// Directory of the object store holding videos and subtitles.
    /// Defaults to an `assets` directory next to the database.
    #[clap(long, global = true, value_parser = parse_path)]
    pub assets_dir: Option<PathBuf>,

    /// Base URL of the Dakara API, e.g. http://dakara.local/api
    #[clap(long, global = true)]
    pub dakara_url: Option<String>,

    /// Dakara API token.
    #[clap(long, global = true)]
    pub dakara_token: Option<String>,

    /// Base URL of the Kara.moe API.
    #[clap(long, global = true, default_value = DEFAULT_MUGEN_SERVER)]
    pub mugen_url: String,

    /// Base URL of the Kara.moe media downloads.
    #[clap(long, global = true, default_value = DEFAULT_MUGEN_MEDIA_SERVER)]
    pub mugen_media_url: String,

    /// Timeout in seconds for every HTTP request.
    #[clap(long, global = true, default_value_t = DEFAULT_HTTP_TIMEOUT_SEC)]
    pub http_timeout_sec: u64,

    /// Seconds between two scheduled Dakara syncs in `serve`.
    #[clap(long, global = true, default_value_t = DEFAULT_SWEEP_INTERVAL_SECS)]
    pub sweep_interval_secs: u64,

    /// Maximum number of concurrent asset downloads.
    #[clap(long, global = true, default_value_t = kara_catalog_server::assets::DEFAULT_DOWNLOAD_CONCURRENCY)]
    pub download_concurrency: usize,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Runs the Dakara sync and the upstream refresh on their schedules until ctrl-c.
    /// SIGHUP requests an immediate Dakara sync.
    Serve,

    /// Imports karas from Kara.moe by their upstream ID and downloads their assets.
    Import {
        #[clap(required = true)]
        kids: Vec<Uuid>,
    },

    /// Runs one Dakara sync.
    Sweep {
        /// Print the Prometheus metrics after the run.
        #[clap(long)]
        print_metrics: bool,
    },

    /// Updates the metadata of every imported kara from Kara.moe and
    /// re-syncs its assets. Karas marked as edited keep their metadata.
    Refresh {
        /// Print the Prometheus metrics after the run.
        #[clap(long)]
        print_metrics: bool,
    },

    /// Marks karas as edited locally so the upstream refresh keeps their metadata.
    MarkEdited {
        #[clap(required = true)]
        kara_ids: Vec<i64>,

        /// Clear the marker instead of setting it.
        #[clap(long)]
        clear: bool,
    },
}

impl CliArgs {
    fn to_cli_config(&self) -> CliConfig {
        CliConfig {
            db_path: self.db_path.clone(),
            assets_dir: self.assets_dir.clone(),
            dakara_url: self.dakara_url.clone(),
            dakara_token: self.dakara_token.clone(),
            mugen_url: self.mugen_url.clone(),
            mugen_media_url: self.mugen_media_url.clone(),
            http_timeout_sec: self.http_timeout_sec,
            sweep_interval_secs: self.sweep_interval_secs,
            download_concurrency: self.download_concurrency,
        }
    }
}

/// Local store, asset syncer and importer, shared by the upstream commands.
struct Components {
    store: Arc<dyn KaraStore>,
    assets: Arc<AssetSyncer>,
    importer: Arc<ImportReconciler>,
}

async fn build_components(config: &AppConfig) -> Result<Components> {
    info!("Opening SQLite kara library at {:?}...", config.db_path);
    let store: Arc<dyn KaraStore> = Arc::new(SqliteKaraStore::new(&config.db_path)?);

    let mugen: Arc<dyn MugenApi> = Arc::new(MugenClient::new(
        &config.mugen.server,
        &config.mugen.media_server,
        config.http_timeout_sec,
    )?);

    let objects = FsObjectStore::new(config.assets_dir.clone());
    objects.init().await?;
    info!("Object store at {:?}", objects.root());

    let assets = Arc::new(AssetSyncer::new(
        store.clone(),
        mugen.clone(),
        Arc::new(objects),
        Arc::new(SignatureProbe),
        config.sync.download_concurrency,
    ));

    let importer = Arc::new(ImportReconciler::new(
        store.clone(),
        mugen,
        Arc::new(config.taxonomy.clone()),
        assets.clone(),
    ));

    Ok(Components {
        store,
        assets,
        importer,
    })
}

fn build_exporter(config: &AppConfig, store: Arc<dyn KaraStore>) -> Result<ExportReconciler> {
    let dakara = config.dakara()?;
    info!("Dakara server configured at {}", dakara.url);
    let client = DakaraClient::new(&dakara.url, &dakara.token, config.http_timeout_sec)?;
    Ok(ExportReconciler::new(store, Arc::new(client)))
}

fn spawn_ctrl_c_handler(shutdown_token: CancellationToken) {
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Received ctrl-c, shutting down...");
                shutdown_token.cancel();
            }
            Err(e) => error!("Failed to listen for ctrl-c: {}", e),
        }
    });
}

#[cfg(unix)]
fn spawn_sighup_handler(hook_sender: mpsc::Sender<HookEvent>, shutdown_token: CancellationToken) {
    use tokio::signal::unix::{signal, SignalKind};

    tokio::spawn(async move {
        let mut hangups = match signal(SignalKind::hangup()) {
            Ok(s) => s,
            Err(e) => {
                error!("Failed to listen for SIGHUP: {}", e);
                return;
            }
        };
        loop {
            tokio::select! {
                _ = hangups.recv() => {
                    info!("Received SIGHUP, requesting a Dakara sync");
                    if hook_sender.send(HookEvent::OnSweepRequested).await.is_err() {
                        return;
                    }
                }
                _ = shutdown_token.cancelled() => return,
            }
        }
    });
}

#[cfg(not(unix))]
fn spawn_sighup_handler(_hook_sender: mpsc::Sender<HookEvent>, _shutdown_token: CancellationToken) {}

async fn serve(config: &AppConfig, shutdown_token: CancellationToken) -> Result<()> {
    let components = build_components(config).await?;
    let exporter = Arc::new(build_exporter(config, components.store.clone())?);

    let (hook_sender, hook_receiver) = mpsc::channel(16);
    let job_context = JobContext::new(shutdown_token.child_token(), "scheduler");
    let (mut scheduler, handle) =
        create_scheduler(hook_receiver, shutdown_token.clone(), job_context);

    scheduler
        .register_job(Arc::new(DakaraSyncJob::new(
            exporter,
            Duration::from_secs(config.sync.sweep_interval_secs),
        )))
        .await;
    scheduler
        .register_job(Arc::new(UpstreamRefreshJob::new(
            components.importer.clone(),
            Duration::from_secs(config.sync.refresh_interval_secs),
        )))
        .await;

    spawn_sighup_handler(hook_sender, shutdown_token);
    scheduler.run().await;

    for job in handle.list_jobs().await {
        match job.last_run {
            Some(run) => info!(
                "Job {}: last run {} ({}, triggered by {})",
                job.id, run.started_at, run.status, run.triggered_by
            ),
            None => info!("Job {}: never ran", job.id),
        }
    }
    Ok(())
}

async fn import(config: &AppConfig, kids: &[Uuid]) -> Result<()> {
    let components = build_components(config).await?;

    let mut failures = 0;
    for kid in kids {
        match components.importer.import(*kid).await {
            Ok(ImportOutcome::Imported(link)) => {
                println!("{} imported as kara {}", kid, link.kara_id)
            }
            Ok(ImportOutcome::AlreadyImported(link)) => {
                println!("{} was already imported as kara {}", kid, link.kara_id)
            }
            Err(e) => {
                error!("Failed to import {}: {}", kid, e);
                failures += 1;
            }
        }
    }

    info!("Waiting for asset downloads to finish...");
    components.assets.wait_pending().await;
    info!("Library holds {} karas", components.store.get_karas_count());

    if failures > 0 {
        bail!("{} of {} imports failed", failures, kids.len());
    }
    Ok(())
}

async fn sweep(config: &AppConfig, shutdown_token: CancellationToken) -> Result<()> {
    let store: Arc<dyn KaraStore> = Arc::new(SqliteKaraStore::new(&config.db_path)?);
    let exporter = build_exporter(config, store)?;

    let report = exporter.sweep(&shutdown_token).await?;
    println!(
        "{} publishable karas: {} works, {} artists, {} tags created, {} tags updated, \
         {} songs created, {} songs updated, {} songs deleted, {} prune errors",
        report.publishable_karas,
        report.works_created,
        report.artists_created,
        report.tags_created,
        report.tags_updated,
        report.songs_created,
        report.songs_updated,
        report.songs_deleted,
        report.prune_errors
    );
    Ok(())
}

async fn refresh(config: &AppConfig, shutdown_token: CancellationToken) -> Result<()> {
    let components = build_components(config).await?;
    let summary = components.importer.refresh_all(&shutdown_token).await?;
    println!(
        "{} karas: {} updated, {} edited locally, {} missing, {} downloaded, {} up to date, {} failed",
        summary.total,
        summary.metadata_updated,
        summary.edited,
        summary.missing,
        summary.downloaded,
        summary.up_to_date,
        summary.failed
    );
    if summary.failed > 0 {
        bail!("{} of {} karas failed to refresh", summary.failed, summary.total);
    }
    Ok(())
}

fn mark_edited(config: &AppConfig, kara_ids: &[i64], edited: bool) -> Result<()> {
    let store = SqliteKaraStore::new(&config.db_path)?;
    for kara_id in kara_ids {
        store
            .set_edited(*kara_id, edited)
            .with_context(|| format!("Failed to update kara {}", kara_id))?;
        println!("kara {} edited marker: {}", kara_id, edited);
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli_args = CliArgs::parse();

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .with_env_var("LOG_LEVEL")
                .from_env_lossy(),
        )
        .try_init()?;

    let file_config = match &cli_args.config {
        Some(path) => {
            info!("Loading config from {:?}", path);
            Some(FileConfig::load(path)?)
        }
        None => None,
    };
    let requires_dakara = matches!(cli_args.command, Command::Serve | Command::Sweep { .. });
    let config = AppConfig::resolve(&cli_args.to_cli_config(), file_config, requires_dakara)?;

    metrics::init_metrics();

    let shutdown_token = CancellationToken::new();
    spawn_ctrl_c_handler(shutdown_token.clone());

    match &cli_args.command {
        Command::Serve => serve(&config, shutdown_token).await,
        Command::Import { kids } => import(&config, kids).await,
        Command::Sweep { print_metrics } => {
            let result = sweep(&config, shutdown_token).await;
            if *print_metrics {
                println!("{}", metrics::render());
            }
            result
        }
        Command::Refresh { print_metrics } => {
            let result = refresh(&config, shutdown_token).await;
            if *print_metrics {
                println!("{}", metrics::render());
            }
            result
        }
        Command::MarkEdited { kara_ids, clear } => mark_edited(&config, kara_ids, !clear),
    }
}
