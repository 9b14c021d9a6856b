// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Fan one certificate bundle out to every namespace of a spec.
//!
//! The canonical (first) namespace is the source of truth. A still-valid bundle
//! was read from it, so only mirrors are written; a freshly renewed bundle goes
//! to the canonical namespace first, then to mirrors.

use crate::errors::SecretStoreError;
use crate::metrics;
use crate::secrets::{SecretStore, WriteOutcome};
use tracing::{error, info};

/// Upsert `certificate`/`private_key` as `secret_name` into `namespaces`.
///
/// Namespaces are written in declared order, each at most once. When
/// `include_canonical` is false the first namespace is skipped. Every namespace
/// is attempted even after a failure; the first failure is returned.
///
/// # Errors
///
/// Returns the first [`SecretStoreError`] encountered.
pub async fn replicate(
    store: &dyn SecretStore,
    secret_name: &str,
    namespaces: &[String],
    certificate: &[u8],
    private_key: &[u8],
    include_canonical: bool,
) -> Result<Vec<(String, WriteOutcome)>, SecretStoreError> {
    let targets = target_namespaces(namespaces, include_canonical);
    let mut outcomes = Vec::with_capacity(targets.len());
    let mut first_error = None;

    for namespace in targets {
        match store
            .upsert_tls(namespace, secret_name, certificate, private_key)
            .await
        {
            Ok(outcome) => {
                metrics::record_secret_write(namespace, outcome.as_str());
                if outcome != WriteOutcome::Unchanged {
                    info!(
                        secret = %secret_name,
                        namespace = %namespace,
                        outcome = %outcome,
                        "Replicated certificate"
                    );
                }
                outcomes.push((namespace.to_string(), outcome));
            }
            Err(e) => {
                metrics::record_secret_write(namespace, "error");
                error!(secret = %secret_name, namespace = %namespace, error = %e, "Replication failed");
                first_error.get_or_insert(e);
            }
        }
    }

    match first_error {
        Some(e) => Err(e),
        None => Ok(outcomes),
    }
}

/// Deduplicated namespaces to write, in declared order.
#[must_use]
pub fn target_namespaces(namespaces: &[String], include_canonical: bool) -> Vec<&str> {
    let canonical = namespaces.first().map(String::as_str);
    let mut targets: Vec<&str> = Vec::with_capacity(namespaces.len());

    for namespace in namespaces {
        let namespace = namespace.as_str();
        if !include_canonical && Some(namespace) == canonical {
            continue;
        }
        if !targets.contains(&namespace) {
            targets.push(namespace);
        }
    }

    targets
}

#[cfg(test)]
#[path = "replicator_tests.rs"]
mod replicator_tests;
