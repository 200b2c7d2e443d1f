use hdfs_s3_transfer::{
    clients::{
        hdfs::HadoopCli, local_store::LocalObjectStore, local_sts::LocalCredentialIssuer,
        notify::OutboxNotifier, os_groups::OsGroupDirectory, params::FileParameterStore,
        telemetry::TracingTelemetry,
    },
    config::{AppConfig, TransferSettings},
    models::request::TransferRequest,
    services::{
        credential_broker::MAX_SESSION,
        orchestrator::{Collaborators, TransferOrchestrator},
    },
};
use std::{path::Path, process::ExitCode, sync::Arc};
use tracing_subscriber::EnvFilter;

const EXIT_TRANSFER_FAILED: u8 = 1;
const EXIT_CONFIG_FAILED: u8 = 2;

#[tokio::main]
async fn main() -> ExitCode {
    // --- Logging setup ---
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    // --- Parse config ---
    let cfg = match AppConfig::from_env_and_args() {
        Ok(cfg) => cfg,
        Err(err) => {
            tracing::error!("Invalid configuration: {:#}", err);
            return ExitCode::from(EXIT_CONFIG_FAILED);
        }
    };
    tracing::info!("Starting hdfs-s3-transfer with config: {:?}", cfg);

    // --- Resolve transfer parameters ---
    let params = match FileParameterStore::load(&cfg.param_file).await {
        Ok(params) => params,
        Err(err) => {
            tracing::error!("Cannot load parameters from {}: {}", cfg.param_file.display(), err);
            return ExitCode::from(EXIT_CONFIG_FAILED);
        }
    };
    let settings = match TransferSettings::load(&params, &cfg.param_prefix, cfg.source_path.as_deref()).await {
        Ok(settings) => settings,
        Err(err) => {
            tracing::error!("Cannot resolve transfer settings: {}", err);
            return ExitCode::from(EXIT_CONFIG_FAILED);
        }
    };

    // --- Ensure storage directory exists ---
    if !Path::new(&cfg.storage_dir).exists() {
        if let Err(err) = tokio::fs::create_dir_all(&cfg.storage_dir).await {
            tracing::error!("Cannot create storage directory {}: {}", cfg.storage_dir.display(), err);
            return ExitCode::from(EXIT_CONFIG_FAILED);
        }
        tracing::info!("Created storage directory at {}", cfg.storage_dir.display());
    }

    let request = TransferRequest::new(
        &settings.source_path,
        &settings.bucket,
        &settings.object_key,
        &cfg.principal,
    );

    // --- Wire collaborators ---
    let issuer = LocalCredentialIssuer::new([settings.role_id.clone()], MAX_SESSION);
    let collaborators = Collaborators {
        source: Arc::new(HadoopCli::new(&cfg.hadoop_bin)),
        groups: Arc::new(OsGroupDirectory::default()),
        store: Arc::new(LocalObjectStore::new(
            &cfg.storage_dir,
            cfg.max_object_bytes,
            issuer.ledger(),
        )),
        issuer: Arc::new(issuer),
        telemetry: Arc::new(TracingTelemetry::new(&cfg.metrics_namespace)),
        notifier: Arc::new(OutboxNotifier::new(&cfg.outbox)),
    };

    let outcome = TransferOrchestrator::new(settings, collaborators)
        .run(request)
        .await;

    match outcome.error() {
        None => {
            tracing::info!(
                "Transfer {} completed: {} bytes ({} stored) in {:.2}s",
                outcome.transfer_id,
                outcome.source_bytes,
                outcome.bytes_transferred,
                outcome.duration.as_secs_f64()
            );
            ExitCode::SUCCESS
        }
        Some(err) => {
            tracing::error!("Transfer {} failed ({}): {}", outcome.transfer_id, err.kind(), err);
            ExitCode::from(EXIT_TRANSFER_FAILED)
        }
    }
}
