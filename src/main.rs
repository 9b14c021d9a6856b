// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

use anyhow::{Context, Result};
use axum::{http::StatusCode, response::IntoResponse, routing::get, Router};
use certwarden::{
    acme::AcmeIssuer,
    archive::ArchiveWriter,
    certificates::load_certificate_specs,
    config::{build_kube_client, Config},
    constants::{METRICS_SERVER_BIND_ADDRESS, METRICS_SERVER_PATH, TOKIO_WORKER_THREADS},
    dns::{txt::TxtRecordManager, yandex::YandexDnsProvider},
    metrics,
    renewal::Renewer,
    scheduler::run_scheduler,
    secrets::KubeSecretStore,
};
use clap::Parser;
use std::sync::Arc;
use tokio::signal::unix::{signal, SignalKind};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

fn main() -> Result<()> {
    let worker_threads = std::env::var("TOKIO_WORKER_THREADS")
        .ok()
        .and_then(|v| v.parse::<usize>().ok())
        .filter(|n| *n > 0)
        .unwrap_or(TOKIO_WORKER_THREADS);

    // Build Tokio runtime with custom thread names
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(worker_threads)
        .thread_name("certwarden")
        .enable_all()
        .build()?;

    runtime.block_on(async_main())
}

fn init_logging() {
    // Respects RUST_LOG, defaulting to INFO. RUST_LOG_FORMAT=json switches to JSON lines.
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    let log_format = std::env::var("RUST_LOG_FORMAT").unwrap_or_else(|_| "text".to_string());

    match log_format.to_lowercase().as_str() {
        "json" => {
            tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_file(true)
                .with_line_number(true)
                .with_thread_names(true)
                .with_target(false)
                .json()
                .init();
        }
        _ => {
            tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_file(true)
                .with_line_number(true)
                .with_thread_names(true)
                .with_target(false)
                .with_ansi(true)
                .compact()
                .init();
        }
    }
}

async fn async_main() -> Result<()> {
    init_logging();

    let config = Config::parse();
    config.validate()?;

    info!(
        certificates_config = %config.certificates_config_path.display(),
        archive = %config.archive_path.display(),
        interval_minutes = config.interval_minutes,
        renewal_window_hours = config.renewal_window_hours,
        fault_isolation = %config.fault_isolation,
        "Starting certwarden"
    );

    let specs = load_certificate_specs(&config.certificates_config_path)?;
    info!(certificates = specs.len(), "Loaded certificate specs");

    debug!("Initializing Kubernetes client");
    let client = build_kube_client(&config).await?;
    let store = Arc::new(KubeSecretStore::new(client));

    let dns = Arc::new(
        YandexDnsProvider::new(
            &config.yc_dns_endpoint,
            &config.yc_folder_id,
            &config.yc_iam_token,
        )
        .context("Failed to create Yandex Cloud DNS client")?,
    );

    let cancel = CancellationToken::new();
    let issuer = AcmeIssuer::new(
        config.acme_settings(),
        TxtRecordManager::new(dns),
        cancel.clone(),
    );

    let renewer = Renewer::new(
        specs,
        Box::new(issuer),
        store,
        ArchiveWriter::new(config.archive_path.clone()),
        config.renewal_settings(),
        cancel.clone(),
    );

    let mut sigterm = signal(SignalKind::terminate()).context("Failed to install SIGTERM handler")?;
    let mut scheduler = tokio::spawn(run_scheduler(
        renewer,
        config.cycle_interval(),
        cancel.clone(),
    ));

    // The scheduler only returns on cancellation or an unrecovered cycle error
    tokio::select! {
        joined = &mut scheduler => {
            cancel.cancel();
            let result = joined.context("Renewal scheduler task panicked")?;
            if let Err(e) = &result {
                error!(error = %e, "Renewal scheduler stopped with an error");
            }
            return result;
        }
        result = serve_metrics(config.metrics_port, cancel.clone()) => {
            error!("CRITICAL: metrics server exited unexpectedly: {:?}", result);
            cancel.cancel();
            result?;
            anyhow::bail!("Metrics server exited unexpectedly without error")
        }
        _ = tokio::signal::ctrl_c() => info!("Received SIGINT, shutting down"),
        _ = sigterm.recv() => info!("Received SIGTERM, shutting down"),
    }

    // Let an in-flight cycle remove its challenge records before exiting
    cancel.cancel();
    scheduler
        .await
        .context("Renewal scheduler task panicked")??;
    info!("certwarden stopped");
    Ok(())
}

/// Serve Prometheus metrics until cancelled.
async fn serve_metrics(port: u16, cancel: CancellationToken) -> Result<()> {
    let app = Router::new().route(METRICS_SERVER_PATH, get(metrics_handler));
    let addr = format!("{METRICS_SERVER_BIND_ADDRESS}:{port}");

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind metrics server to {addr}"))?;
    info!(address = %addr, path = METRICS_SERVER_PATH, "Metrics server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async move { cancel.cancelled().await })
        .await
        .context("Metrics server failed")
}

async fn metrics_handler() -> impl IntoResponse {
    match metrics::gather_metrics() {
        Ok(body) => (StatusCode::OK, body),
        Err(e) => {
            error!(error = %e, "Failed to encode metrics");
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        }
    }
}
