// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! # certwarden - TLS certificate renewer for Kubernetes
//!
//! certwarden keeps a declared set of TLS certificates valid. Each certificate
//! lives as a `kubernetes.io/tls` secret in one or more namespaces and is
//! renewed through ACME (Let's Encrypt) using DNS-01 challenges published in
//! Yandex Cloud DNS.
//!
//! ## Overview
//!
//! Every cycle, for each certificate spec in order:
//!
//! - The canonical secret (first namespace) is read and its expiry checked
//! - A still-valid certificate is copied to the other namespaces
//! - A missing, unreadable or expiring certificate is obtained once, archived
//!   on local disk, then written to every namespace
//!
//! ## Modules
//!
//! - [`dns`] - zone resolution, TXT challenge records and the Yandex Cloud DNS client
//! - [`acme`] - ACME account handling and DNS-01 order flow
//! - [`renewal`] - per-certificate decision and replication
//! - [`scheduler`] - periodic, non-overlapping renewal cycles
//! - [`archive`] - on-disk archive of obtained bundles
//! - [`secrets`] - Kubernetes TLS secret store
//!
//! ## Example
//!
//! ```rust
//! use certwarden::certificates::parse_certificate_specs;
//!
//! let yaml = "
//! - domains: [a.com, www.a.com]
//!   namespaces: [ns1, ns2]
//!   secretName: a-tls
//! ";
//! let specs = parse_certificate_specs(yaml, "certificates.conf.yaml").unwrap();
//! assert_eq!(specs[0].canonical_namespace(), "ns1");
//! ```

pub mod acme;
pub mod archive;
pub mod bundle;
pub mod certificates;
pub mod config;
pub mod constants;
pub mod dns;
pub mod dns_errors;
pub mod errors;
pub mod http_errors;
pub mod metrics;
pub mod renewal;
pub mod retry;
pub mod scheduler;
pub mod secrets;

#[cfg(test)]
mod testing;

#[cfg(test)]
mod archive_tests;
#[cfg(test)]
mod http_errors_tests;
#[cfg(test)]
mod scheduler_tests;
#[cfg(test)]
mod secrets_tests;
