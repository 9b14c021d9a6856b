// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Global constants for the certwarden renewer.
//!
//! This module contains all numeric and string constants used throughout the codebase.
//! Constants are organized by category for easy maintenance.

// ============================================================================
// Renewal Policy Constants
// ============================================================================

/// Default renewal window before `notAfter` (7 days)
pub const DEFAULT_RENEWAL_WINDOW_HOURS: u64 = 7 * 24;

/// Default interval between renewal cycles (1 hour)
pub const DEFAULT_CYCLE_INTERVAL_MINUTES: u64 = 60;

// ============================================================================
// DNS-01 Challenge Constants
// ============================================================================

/// TTL of challenge TXT records (1 minute)
pub const CHALLENGE_RECORD_TTL_SECS: i64 = 60;

/// Label prepended to a domain to form its DNS-01 challenge name
pub const ACME_CHALLENGE_LABEL: &str = "_acme-challenge";

/// Record type used for DNS-01 challenges
pub const TXT_RECORD_TYPE: &str = "TXT";

/// Default time to wait after publishing a TXT record before asking the CA to validate
pub const DEFAULT_PROPAGATION_DELAY_SECS: u64 = 120;

// ============================================================================
// ACME Constants
// ============================================================================

/// Let's Encrypt production directory
pub const LETSENCRYPT_PRODUCTION_DIRECTORY: &str =
    "https://acme-v02.api.letsencrypt.org/directory";

/// Let's Encrypt staging directory
pub const LETSENCRYPT_STAGING_DIRECTORY: &str =
    "https://acme-staging-v02.api.letsencrypt.org/directory";

/// Delay between ACME order/authorization polls
pub const ACME_POLL_INTERVAL_SECS: u64 = 2;

/// Maximum number of ACME order/authorization polls before giving up
pub const ACME_MAX_POLL_ATTEMPTS: u32 = 60;

// ============================================================================
// Yandex Cloud DNS Constants
// ============================================================================

/// Default Yandex Cloud DNS API endpoint
pub const DEFAULT_YC_DNS_ENDPOINT: &str = "https://dns.api.cloud.yandex.net";

/// Timeout applied to every DNS API request
pub const DNS_API_REQUEST_TIMEOUT_SECS: u64 = 30;

// ============================================================================
// Secret Constants
// ============================================================================

/// Secret data key holding the PEM certificate chain
pub const TLS_CERT_KEY: &str = "tls.crt";

/// Secret data key holding the PEM private key
pub const TLS_PRIVATE_KEY_KEY: &str = "tls.key";

/// Secret type for TLS key pairs
pub const TLS_SECRET_TYPE: &str = "kubernetes.io/tls";

/// Standard label for the tool managing a resource
pub const K8S_MANAGED_BY: &str = "app.kubernetes.io/managed-by";

/// Value for `app.kubernetes.io/managed-by` on secrets created by certwarden
pub const MANAGED_BY_CERTWARDEN: &str = "certwarden";

// ============================================================================
// Archive Constants
// ============================================================================

/// Default directory where obtained bundles are archived
pub const DEFAULT_ARCHIVE_PATH: &str = "./archive";

/// Archived private key file name
pub const ARCHIVE_PRIVKEY_FILE: &str = "privkey.pem";

/// Archived full chain file name
pub const ARCHIVE_FULLCHAIN_FILE: &str = "fullchain.pem";

/// Archived issuer chain file name
pub const ARCHIVE_CHAIN_FILE: &str = "chain.pem";

/// Archived bundle metadata file name
pub const ARCHIVE_INFO_FILE: &str = "info.json";

// ============================================================================
// Configuration Constants
// ============================================================================

/// Default location of the certificate spec file
pub const DEFAULT_CERTIFICATES_CONFIG_PATH: &str = "/certificates.conf.yaml";

// ============================================================================
// Runtime Constants
// ============================================================================

/// Number of worker threads for Tokio runtime
pub const TOKIO_WORKER_THREADS: usize = 2;

// ============================================================================
// Metrics Server Constants
// ============================================================================

/// Port for Prometheus metrics HTTP server
pub const METRICS_SERVER_PORT: u16 = 8080;

/// Path for Prometheus metrics endpoint
pub const METRICS_SERVER_PATH: &str = "/metrics";

/// Bind address for metrics HTTP server
pub const METRICS_SERVER_BIND_ADDRESS: &str = "0.0.0.0";
