// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! DNS provider error types for certwarden.
//!
//! This module provides specialized error types for:
//! - Zone resolution (mapping a challenge name to a provider zone)
//! - TXT record lookups and mutations
//! - HTTP connectivity with the cloud DNS API
//!
//! Each error knows whether it is transient, so the renewal engine can tell a
//! misconfiguration (never retried) from a flaky provider (retried next cycle).

use thiserror::Error;

/// Errors that can occur while resolving the zone hosting a challenge record.
///
/// Both variants indicate misconfiguration and are never retried within a cycle.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ZoneError {
    /// No zone in the provider's list is a parent of the name
    #[error("No DNS zone found for '{fqdn}' in the provider zone list")]
    ZoneNotFound {
        /// The fully-qualified name that had no matching zone
        fqdn: String,
    },

    /// Two or more zones of the same (longest) length match the name
    ///
    /// This happens when the provider holds duplicate zone entries (for example
    /// a public and a private zone with the same name in one folder).
    #[error("Ambiguous DNS zone for '{fqdn}': candidates {candidates}")]
    AmbiguousZone {
        /// The fully-qualified name being resolved
        fqdn: String,
        /// Comma-separated `zone (id)` pairs that matched with equal length
        candidates: String,
    },
}

/// Errors that can occur during TXT record operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RecordError {
    /// Looking up the existing record set failed for a reason other than "not found"
    #[error("Failed to look up record '{name}' in zone '{zone}': {reason}")]
    RecordLookupFailed {
        /// The relative record name
        name: String,
        /// The zone name
        zone: String,
        /// Specific reason for the failure
        reason: String,
    },

    /// Submitting a record set update (add/replace) failed
    #[error("Failed to update record '{name}' in zone '{zone}': {reason}")]
    RecordUpdateFailed {
        /// The relative record name
        name: String,
        /// The zone name
        zone: String,
        /// Specific reason for the failure
        reason: String,
    },

    /// Submitting a record set deletion failed
    #[error("Failed to delete record '{name}' in zone '{zone}': {reason}")]
    RecordDeletionFailed {
        /// The relative record name
        name: String,
        /// The zone name
        zone: String,
        /// Specific reason for the failure
        reason: String,
    },
}

/// Errors talking to the DNS provider API itself.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProviderError {
    /// Connection could not be established (refused, DNS failure, TLS failure)
    #[error("HTTP connection to {endpoint} failed: {reason}")]
    HttpConnectionFailed {
        /// The endpoint that couldn't be reached
        endpoint: String,
        /// Reason for the connection failure
        reason: String,
    },

    /// The request exceeded the client timeout
    #[error("HTTP request to {endpoint} timed out after {timeout_secs}s")]
    HttpRequestTimeout {
        /// The endpoint that timed out
        endpoint: String,
        /// Timeout in seconds
        timeout_secs: u64,
    },

    /// The provider rejected our credentials (HTTP 401/403)
    #[error("DNS API at {endpoint} rejected credentials (HTTP {status_code})")]
    Unauthorized {
        /// The endpoint that rejected the request
        endpoint: String,
        /// HTTP status code (401 or 403)
        status_code: u16,
    },

    /// Any other non-success HTTP status
    #[error("Unexpected HTTP response from {endpoint}: {status_code} {reason}")]
    UnexpectedHttpResponse {
        /// The endpoint that returned the response
        endpoint: String,
        /// HTTP status code
        status_code: u16,
        /// Response body or error message
        reason: String,
    },

    /// The response body could not be decoded
    #[error("Invalid response from {endpoint}: {reason}")]
    InvalidResponse {
        /// The endpoint that returned the body
        endpoint: String,
        /// Decoding failure
        reason: String,
    },
}

/// Composite error type that encompasses all DNS operation errors.
///
/// This is the error type of every [`crate::dns::DnsProvider`] method and of the
/// TXT record manager.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DnsError {
    /// Zone resolution error
    #[error(transparent)]
    Zone(#[from] ZoneError),

    /// TXT record lookup or mutation error
    #[error(transparent)]
    Record(#[from] RecordError),

    /// Provider API connectivity or protocol error
    #[error(transparent)]
    Provider(#[from] ProviderError),

    /// Cancelled through the shared cancellation token
    #[error("DNS operation cancelled")]
    Cancelled,

    /// Generic error for operations that don't fit other categories
    #[error("DNS operation failed: {0}")]
    Generic(String),
}

impl DnsError {
    /// Returns true if this error is transient and the operation should be retried.
    ///
    /// Zone resolution errors and rejected credentials are configuration problems
    /// and will fail the same way next time.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Record(_)
            | Self::Provider(
                ProviderError::HttpConnectionFailed { .. }
                | ProviderError::HttpRequestTimeout { .. }
                | ProviderError::UnexpectedHttpResponse { .. }
                | ProviderError::InvalidResponse { .. },
            )
            | Self::Generic(_) => true,

            Self::Zone(_) | Self::Provider(ProviderError::Unauthorized { .. }) | Self::Cancelled => {
                false
            }
        }
    }

    /// Returns a short machine-readable reason code, used as a metric label.
    #[must_use]
    pub fn reason(&self) -> &'static str {
        match self {
            Self::Zone(ZoneError::ZoneNotFound { .. }) => "ZoneNotFound",
            Self::Zone(ZoneError::AmbiguousZone { .. }) => "AmbiguousZone",

            Self::Record(RecordError::RecordLookupFailed { .. }) => "RecordLookupFailed",
            Self::Record(RecordError::RecordUpdateFailed { .. }) => "RecordUpdateFailed",
            Self::Record(RecordError::RecordDeletionFailed { .. }) => "RecordDeletionFailed",

            Self::Provider(ProviderError::HttpConnectionFailed { .. }) => "HttpConnectionFailed",
            Self::Provider(ProviderError::HttpRequestTimeout { .. }) => "HttpRequestTimeout",
            Self::Provider(ProviderError::Unauthorized { .. }) => "Unauthorized",
            Self::Provider(ProviderError::UnexpectedHttpResponse { .. }) => {
                "UnexpectedHttpResponse"
            }
            Self::Provider(ProviderError::InvalidResponse { .. }) => "InvalidResponse",

            Self::Cancelled => "Cancelled",
            Self::Generic(_) => "DnsOperationFailed",
        }
    }
}

// Conversion from anyhow::Error to DnsError for glue code
impl From<anyhow::Error> for DnsError {
    fn from(err: anyhow::Error) -> Self {
        Self::Generic(err.to_string())
    }
}
