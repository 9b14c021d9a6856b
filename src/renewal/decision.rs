// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Renewal decision: is the canonical certificate good for at least one more window?

use crate::bundle::StoredBundle;
use crate::constants::TLS_PRIVATE_KEY_KEY;
use crate::errors::BundleError;
use crate::secrets::TlsSecretData;
use chrono::{DateTime, Duration, Utc};
use std::fmt;

/// What the canonical secret currently holds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ObservedBundle {
    /// No secret at all
    Missing,
    /// The secret exists but its certificate or key cannot be used
    Unreadable(BundleError),
    /// A parsable certificate with its key
    Present(StoredBundle),
}

/// Why a certificate must be renewed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenewalReason {
    /// No stored certificate
    Missing,
    /// Stored certificate could not be parsed
    Unreadable,
    /// Stored certificate expires within the renewal window
    Expiring {
        /// Expiry of the stored certificate
        not_after: DateTime<Utc>,
    },
}

impl fmt::Display for RenewalReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Missing => f.write_str("missing"),
            Self::Unreadable => f.write_str("unreadable"),
            Self::Expiring { not_after } => write!(f, "expiring at {not_after}"),
        }
    }
}

/// Outcome of [`decide`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenewalDecision {
    /// The stored certificate is good beyond the renewal window
    Valid {
        /// Expiry of the stored certificate
        not_after: DateTime<Utc>,
    },
    /// A new certificate must be obtained
    NeedsRenewal(RenewalReason),
}

/// Classify raw secret data read from the canonical namespace.
#[must_use]
pub fn observe(data: Option<TlsSecretData>) -> ObservedBundle {
    let Some(data) = data else {
        return ObservedBundle::Missing;
    };

    if data.private_key.as_deref().map_or(true, <[u8]>::is_empty) {
        return ObservedBundle::Unreadable(BundleError::MissingKey {
            key: TLS_PRIVATE_KEY_KEY,
        });
    }

    match StoredBundle::from_secret_data(data.certificate.as_deref(), data.private_key.as_deref()) {
        Ok(bundle) => ObservedBundle::Present(bundle),
        Err(e) => ObservedBundle::Unreadable(e),
    }
}

/// Decide whether `observed` must be renewed at `now`.
///
/// A certificate whose remaining lifetime is strictly less than `window` is
/// renewed; one expiring exactly at `now + window` is still valid.
#[must_use]
pub fn decide(observed: &ObservedBundle, now: DateTime<Utc>, window: Duration) -> RenewalDecision {
    match observed {
        ObservedBundle::Missing => RenewalDecision::NeedsRenewal(RenewalReason::Missing),
        ObservedBundle::Unreadable(_) => RenewalDecision::NeedsRenewal(RenewalReason::Unreadable),
        ObservedBundle::Present(bundle) => {
            let not_after = bundle.not_after;
            if not_after - now < window {
                RenewalDecision::NeedsRenewal(RenewalReason::Expiring { not_after })
            } else {
                RenewalDecision::Valid { not_after }
            }
        }
    }
}

#[cfg(test)]
#[path = "decision_tests.rs"]
mod decision_tests;
