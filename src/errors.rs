// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Error types for certificate handling, secret replication and the renewal cycle.
//!
//! DNS-specific failures live in [`crate::dns_errors`]; this module wraps them
//! together with issuance, archive and secret-store failures into [`RenewalError`],
//! the error a single certificate spec can fail with during a cycle.

use crate::dns_errors::DnsError;
use thiserror::Error;

/// Configuration errors. Always fatal at startup.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The certificate spec file could not be read
    #[error("Failed to read certificate spec file '{path}': {source}")]
    SpecFileUnreadable {
        /// Path of the certificate spec file
        path: String,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// The certificate spec file is not valid YAML for the expected schema
    #[error("Failed to parse certificate spec file '{path}': {source}")]
    SpecFileInvalid {
        /// Path of the certificate spec file
        path: String,
        /// Underlying YAML error
        #[source]
        source: serde_yaml::Error,
    },

    /// A certificate spec violates an invariant
    #[error("Invalid certificate spec #{index} ('{secret_name}'): {reason}")]
    InvalidCertificateSpec {
        /// Position of the certificate spec in the file (0-based)
        index: usize,
        /// Secret name of the certificate spec (may be empty)
        secret_name: String,
        /// What is wrong
        reason: String,
    },

    /// A configuration value is out of range or malformed
    #[error("Invalid configuration value for {name}: {reason}")]
    InvalidValue {
        /// Option name
        name: &'static str,
        /// What is wrong
        reason: String,
    },
}

/// Errors parsing a stored certificate bundle.
///
/// These are never fatal: a bundle that fails to parse is treated as absent.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BundleError {
    /// The secret exists but has no `tls.crt` entry
    #[error("Secret has no '{key}' entry")]
    MissingKey {
        /// The missing data key
        key: &'static str,
    },

    /// `tls.crt` holds no PEM block
    #[error("Certificate data is not PEM encoded: {reason}")]
    InvalidPem {
        /// Parser message
        reason: String,
    },

    /// The first PEM block is not a valid X.509 certificate
    #[error("Invalid X.509 certificate: {reason}")]
    InvalidCertificate {
        /// Parser message
        reason: String,
    },
}

/// Errors from the secret store.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SecretStoreError {
    /// Reading a secret failed for a reason other than "not found"
    #[error("Failed to read secret '{namespace}/{name}': {reason}")]
    ReadFailed {
        /// Namespace of the secret
        namespace: String,
        /// Secret name
        name: String,
        /// Specific reason
        reason: String,
    },

    /// Creating or updating a secret failed
    #[error("Failed to write secret '{namespace}/{name}': {reason}")]
    WriteFailed {
        /// Namespace of the secret
        namespace: String,
        /// Secret name
        name: String,
        /// Specific reason
        reason: String,
    },
}

/// Errors from the certificate issuer.
#[derive(Error, Debug)]
pub enum IssuanceError {
    /// ACME account registration failed
    #[error("ACME account registration failed: {0}")]
    Registration(String),

    /// The ACME order could not be completed
    #[error("ACME order for [{domains}] failed: {reason}")]
    Order {
        /// Comma-separated domain list of the order
        domains: String,
        /// Specific reason
        reason: String,
    },

    /// Publishing or removing a challenge record failed
    #[error("DNS-01 challenge for '{domain}' failed: {source}")]
    Challenge {
        /// Domain being validated
        domain: String,
        /// Underlying DNS error
        #[source]
        source: DnsError,
    },

    /// Key or CSR generation failed
    #[error("Key material generation failed: {0}")]
    KeyGeneration(String),

    /// Cancelled through the shared cancellation token
    #[error("Certificate issuance cancelled")]
    Cancelled,
}

/// Errors writing an obtained bundle to the archive.
#[derive(Error, Debug)]
pub enum ArchiveError {
    /// A file or directory could not be written
    #[error("Failed to write archive path '{path}': {source}")]
    Io {
        /// Path being written
        path: String,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// `info.json` could not be serialized
    #[error("Failed to serialize bundle metadata: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Error a single certificate spec can fail with during a renewal cycle.
#[derive(Error, Debug)]
pub enum RenewalError {
    /// Certificate issuance failed
    #[error("Renewal of '{secret_name}' failed: {source}")]
    Issuance {
        /// Secret name of the certificate spec
        secret_name: String,
        /// Underlying error
        #[source]
        source: IssuanceError,
    },

    /// Archiving the obtained bundle failed
    #[error("Archiving '{secret_name}' failed: {source}")]
    Archive {
        /// Secret name of the certificate spec
        secret_name: String,
        /// Underlying error
        #[source]
        source: ArchiveError,
    },

    /// Reading the canonical secret or replicating to a namespace failed
    #[error("Replication of '{secret_name}' failed: {source}")]
    SecretStore {
        /// Secret name of the certificate spec
        secret_name: String,
        /// Underlying error
        #[source]
        source: SecretStoreError,
    },

    /// The cycle was cancelled
    #[error("Renewal cycle cancelled")]
    Cancelled,
}

impl RenewalError {
    /// Short machine-readable reason used as a metric label.
    #[must_use]
    pub fn reason(&self) -> &'static str {
        match self {
            Self::Issuance {
                source: IssuanceError::Challenge { source, .. },
                ..
            } => source.reason(),
            Self::Issuance { .. } => "IssuanceFailed",
            Self::Archive { .. } => "ArchiveFailed",
            Self::SecretStore { .. } => "SecretStoreFailed",
            Self::Cancelled => "Cancelled",
        }
    }

    /// Returns true when the next cycle may succeed without a configuration change.
    ///
    /// A challenge for a domain outside every hosted zone fails identically each cycle.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Issuance {
                source: IssuanceError::Challenge { source, .. },
                ..
            } => source.is_transient(),
            Self::Issuance {
                source: IssuanceError::Cancelled,
                ..
            }
            | Self::Cancelled => false,
            Self::Issuance { .. } | Self::Archive { .. } | Self::SecretStore { .. } => true,
        }
    }

    /// Returns true when the error came from cancellation rather than a failure.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        matches!(
            self,
            Self::Cancelled
                | Self::Issuance {
                    source: IssuanceError::Cancelled,
                    ..
                }
        )
    }
}
