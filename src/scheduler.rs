// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Periodic renewal cycles that never overlap.
//!
//! A ticker task fires immediately and then every interval, pushing into a
//! channel of capacity one with `try_send`. A single worker task drains the
//! channel and runs one cycle per tick. While a cycle runs, at most one tick
//! waits; further ticks are dropped.
//!
//! The scheduler returns when either task stops. An unrecovered cycle error is
//! returned to the caller; cancellation through the shared token ends both tasks
//! cleanly.

use crate::errors::RenewalError;
use crate::renewal::{CycleReport, Renewer};
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::time::Duration;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Something that can run one renewal cycle.
#[async_trait]
pub trait CycleRunner: Send + 'static {
    /// Run one full cycle.
    async fn run_cycle(&mut self) -> Result<CycleReport, RenewalError>;
}

#[async_trait]
impl CycleRunner for Renewer {
    async fn run_cycle(&mut self) -> Result<CycleReport, RenewalError> {
        Renewer::run_cycle(self).await
    }
}

/// Run cycles every `period` until cancelled or a cycle fails.
///
/// The shared `cancel` token is cancelled on return so in-flight work stops.
///
/// # Errors
///
/// Returns the first unrecovered cycle error, or an error if a task panicked.
pub async fn run_scheduler<R: CycleRunner>(
    runner: R,
    period: Duration,
    cancel: CancellationToken,
) -> Result<()> {
    let (tx, rx) = mpsc::channel::<()>(1);

    let mut ticker = tokio::spawn(run_ticker(tx, period, cancel.clone()));
    let mut worker = tokio::spawn(run_worker(runner, rx, cancel.clone()));

    info!(interval = ?period, "Renewal scheduler started");

    let (result, ticker_finished) = tokio::select! {
        result = &mut ticker => (flatten(result, "ticker"), true),
        result = &mut worker => (flatten(result, "worker"), false),
    };

    cancel.cancel();
    let other = if ticker_finished { worker } else { ticker };
    if let Err(e) = flatten(other.await, "scheduler task") {
        warn!(error = %e, "Scheduler task failed during shutdown");
    }

    info!("Renewal scheduler stopped");
    result
}

fn flatten(joined: Result<Result<()>, tokio::task::JoinError>, task: &str) -> Result<()> {
    joined.with_context(|| format!("renewal {task} task panicked"))?
}

async fn run_ticker(
    tx: mpsc::Sender<()>,
    period: Duration,
    cancel: CancellationToken,
) -> Result<()> {
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            () = cancel.cancelled() => {
                debug!("Ticker cancelled");
                return Ok(());
            }
            _ = interval.tick() => match tx.try_send(()) {
                Ok(()) => debug!("Renewal cycle scheduled"),
                Err(TrySendError::Full(())) => {
                    debug!("Renewal cycle still running, dropping tick");
                }
                Err(TrySendError::Closed(())) => return Ok(()),
            },
        }
    }
}

async fn run_worker<R: CycleRunner>(
    mut runner: R,
    mut rx: mpsc::Receiver<()>,
    cancel: CancellationToken,
) -> Result<()> {
    loop {
        let tick = tokio::select! {
            () = cancel.cancelled() => None,
            tick = rx.recv() => tick,
        };
        if tick.is_none() {
            debug!("Worker stopping");
            return Ok(());
        }

        match runner.run_cycle().await {
            Ok(report) => {
                if report.failed() > 0 {
                    warn!(failed = report.failed(), "Renewal cycle finished with failures");
                }
            }
            Err(e) if e.is_cancelled() => {
                info!("Renewal cycle cancelled");
                return Ok(());
            }
            Err(e) => {
                error!(error = %e, "Renewal cycle failed, stopping scheduler");
                return Err(e).context("renewal cycle failed");
            }
        }
    }
}

