// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! The renewal engine: one pass over every certificate spec.
//!
//! For each spec the canonical secret is read and classified, then either the
//! existing bundle is mirrored or a new one is obtained, archived and fanned out.
//! Specs are processed strictly one after another.
//!
//! - [`decision`] - classify the stored bundle and decide whether to renew
//! - [`replicator`] - upsert one bundle into every namespace of a spec

pub mod decision;
pub mod replicator;

use crate::acme::CertificateIssuer;
use crate::archive::ArchiveWriter;
use crate::certificates::CertificateSpec;
use crate::errors::RenewalError;
use crate::metrics;
use crate::secrets::SecretStore;
use chrono::{DateTime, Duration, Utc};
use decision::{decide, observe, ObservedBundle, RenewalDecision};
use replicator::replicate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::future::Future;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// What a failing spec does to the rest of the cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FaultIsolation {
    /// The first failure ends the cycle with an error
    AbortCycle,
    /// Failures are logged and reported; remaining specs are still processed
    #[default]
    SkipAndContinue,
}

impl fmt::Display for FaultIsolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AbortCycle => f.write_str("abort-cycle"),
            Self::SkipAndContinue => f.write_str("skip-and-continue"),
        }
    }
}

impl FromStr for FaultIsolation {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace('_', "-").as_str() {
            "abort-cycle" | "abort" => Ok(Self::AbortCycle),
            "skip-and-continue" | "skip" => Ok(Self::SkipAndContinue),
            other => Err(format!(
                "unknown fault isolation '{other}', expected 'abort-cycle' or 'skip-and-continue'"
            )),
        }
    }
}

/// Tunables of the renewal engine.
#[derive(Debug, Clone, Copy)]
pub struct RenewalSettings {
    /// Renew when fewer than this remains before `notAfter`
    pub window: Duration,
    /// Behavior on per-spec failure
    pub fault_isolation: FaultIsolation,
}

/// Result of processing one spec.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CertificateOutcome {
    /// Stored certificate is still valid; mirrors were refreshed
    Valid {
        /// Expiry of the stored certificate
        not_after: DateTime<Utc>,
    },
    /// A new certificate was obtained and replicated
    Renewed {
        /// Expiry of the new certificate
        not_after: DateTime<Utc>,
    },
    /// Processing failed and was skipped
    Failed {
        /// Rendered error
        error: String,
    },
}

impl CertificateOutcome {
    fn status_label(&self) -> &'static str {
        match self {
            Self::Valid { .. } => "valid",
            Self::Renewed { .. } => "renewed",
            Self::Failed { .. } => "failed",
        }
    }
}

/// Summary of one renewal cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    /// Per-spec outcomes keyed by secret name, in processing order
    pub outcomes: Vec<(String, CertificateOutcome)>,
}

impl CycleReport {
    /// Number of specs renewed this cycle.
    #[must_use]
    pub fn renewed(&self) -> usize {
        self.count(|o| matches!(o, CertificateOutcome::Renewed { .. }))
    }

    /// Number of specs that failed this cycle.
    #[must_use]
    pub fn failed(&self) -> usize {
        self.count(|o| matches!(o, CertificateOutcome::Failed { .. }))
    }

    /// Outcome recorded for `secret_name`.
    #[must_use]
    pub fn outcome(&self, secret_name: &str) -> Option<&CertificateOutcome> {
        self.outcomes
            .iter()
            .find(|(name, _)| name == secret_name)
            .map(|(_, outcome)| outcome)
    }

    fn count(&self, predicate: impl Fn(&CertificateOutcome) -> bool) -> usize {
        self.outcomes.iter().filter(|(_, o)| predicate(o)).count()
    }
}

/// Drives the per-spec renewal logic against its collaborators.
pub struct Renewer {
    specs: Arc<[CertificateSpec]>,
    issuer: Box<dyn CertificateIssuer>,
    store: Arc<dyn SecretStore>,
    archive: ArchiveWriter,
    settings: RenewalSettings,
    cancel: CancellationToken,
}

impl Renewer {
    /// Assemble a renewer over a fixed set of specs.
    #[must_use]
    pub fn new(
        specs: Vec<CertificateSpec>,
        issuer: Box<dyn CertificateIssuer>,
        store: Arc<dyn SecretStore>,
        archive: ArchiveWriter,
        settings: RenewalSettings,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            specs: specs.into(),
            issuer,
            store,
            archive,
            settings,
            cancel,
        }
    }

    /// Process every spec once.
    ///
    /// # Errors
    ///
    /// Returns [`RenewalError::Cancelled`] when cancelled, and the first spec
    /// failure under [`FaultIsolation::AbortCycle`].
    pub async fn run_cycle(&mut self) -> Result<CycleReport, RenewalError> {
        let started = Instant::now();
        let specs = Arc::clone(&self.specs);
        let mut report = CycleReport::default();

        info!(certificates = specs.len(), "Starting renewal cycle");

        for spec in specs.iter() {
            if self.cancel.is_cancelled() {
                return Err(RenewalError::Cancelled);
            }

            let outcome = match self.process_certificate(spec).await {
                Ok(outcome) => outcome,
                Err(e) if e.is_cancelled() => return Err(e),
                Err(e) => {
                    metrics::record_certificate_outcome(&spec.secret_name, "failed");
                    error!(
                        secret = %spec.secret_name,
                        reason = e.reason(),
                        transient = e.is_transient(),
                        error = %e,
                        "Certificate processing failed"
                    );
                    if self.settings.fault_isolation == FaultIsolation::AbortCycle {
                        metrics::record_cycle_completed(false, started.elapsed());
                        return Err(e);
                    }
                    report.outcomes.push((
                        spec.secret_name.clone(),
                        CertificateOutcome::Failed {
                            error: e.to_string(),
                        },
                    ));
                    continue;
                }
            };

            metrics::record_certificate_outcome(&spec.secret_name, outcome.status_label());
            report.outcomes.push((spec.secret_name.clone(), outcome));
        }

        metrics::record_cycle_completed(true, started.elapsed());
        info!(
            certificates = report.outcomes.len(),
            renewed = report.renewed(),
            failed = report.failed(),
            duration = ?started.elapsed(),
            "Renewal cycle finished"
        );
        Ok(report)
    }

    /// Decide and act for a single spec.
    ///
    /// # Errors
    ///
    /// Returns [`RenewalError`] if reading the canonical secret, issuance,
    /// archiving or replication fails.
    pub async fn process_certificate(
        &mut self,
        spec: &CertificateSpec,
    ) -> Result<CertificateOutcome, RenewalError> {
        let secret_name = spec.secret_name.as_str();
        let canonical = spec.canonical_namespace();
        let store_error = |source| RenewalError::SecretStore {
            secret_name: secret_name.to_string(),
            source,
        };

        let cancel = self.cancel.clone();
        let data = until_cancelled(&cancel, async {
            self.store
                .get_tls(canonical, secret_name)
                .await
                .map_err(store_error)
        })
        .await?;
        let observed = observe(data);
        if let ObservedBundle::Unreadable(e) = &observed {
            warn!(
                secret = %secret_name,
                namespace = %canonical,
                error = %e,
                "Stored certificate is unreadable"
            );
        }

        match decide(&observed, Utc::now(), self.settings.window) {
            RenewalDecision::Valid { not_after } => {
                info!(
                    secret = %secret_name,
                    namespace = %canonical,
                    not_after = %not_after,
                    "Certificate is valid"
                );
                metrics::record_certificate_expiry(secret_name, not_after);

                if let ObservedBundle::Present(bundle) = &observed {
                    until_cancelled(&cancel, async {
                        replicate(
                            self.store.as_ref(),
                            secret_name,
                            &spec.namespaces,
                            &bundle.certificate,
                            &bundle.private_key,
                            false,
                        )
                        .await
                        .map_err(store_error)
                    })
                    .await?;
                }
                Ok(CertificateOutcome::Valid { not_after })
            }
            RenewalDecision::NeedsRenewal(reason) => {
                info!(
                    secret = %secret_name,
                    namespace = %canonical,
                    reason = %reason,
                    domains = ?spec.domains,
                    "Certificate needs renewal"
                );

                // The issuer observes cancellation itself so it can retract its challenge records
                let bundle = self
                    .issuer
                    .obtain(&spec.domains)
                    .await
                    .map_err(|source| RenewalError::Issuance {
                        secret_name: secret_name.to_string(),
                        source,
                    })?;

                let path = self
                    .archive
                    .write(&bundle)
                    .await
                    .map_err(|source| RenewalError::Archive {
                        secret_name: secret_name.to_string(),
                        source,
                    })?;
                debug!(secret = %secret_name, path = %path.display(), "Bundle archived");

                // The archive already holds the bundle, so an interrupted fan-out is redone next cycle
                until_cancelled(&cancel, async {
                    replicate(
                        self.store.as_ref(),
                        secret_name,
                        &spec.namespaces,
                        bundle.certificate.as_bytes(),
                        bundle.private_key.as_bytes(),
                        true,
                    )
                    .await
                    .map_err(store_error)
                })
                .await?;

                metrics::record_certificate_expiry(secret_name, bundle.not_after);
                info!(
                    secret = %secret_name,
                    not_after = %bundle.not_after,
                    "Certificate renewed"
                );
                Ok(CertificateOutcome::Renewed {
                    not_after: bundle.not_after,
                })
            }
        }
    }
}

/// Await a secret store call, abandoning it once the cycle is cancelled.
///
/// Store calls retry with backoff for minutes on API errors, which would
/// otherwise hold shutdown past the pod's grace period.
async fn until_cancelled<T, F>(cancel: &CancellationToken, call: F) -> Result<T, RenewalError>
where
    F: Future<Output = Result<T, RenewalError>>,
{
    tokio::select! {
        () = cancel.cancelled() => Err(RenewalError::Cancelled),
        result = call => result,
    }
}
