// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Certificate spec file loading.
//!
//! The certificate spec file is a YAML sequence. Order of entries is processing order; within
//! an entry the first namespace is the canonical storage location.
//!
//! ```yaml
//! - domains: [a.com, www.a.com]
//!   namespaces: [ns1, ns2]
//!   secretName: a-tls
//! ```

use crate::errors::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// One logical certificate: a multi-domain certificate replicated to a set of namespaces.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CertificateSpec {
    /// Domain names covered by the certificate, in order
    pub domains: Vec<String>,

    /// Target namespaces; the first one is canonical
    pub namespaces: Vec<String>,

    /// Name of the TLS secret in every namespace
    pub secret_name: String,
}

impl CertificateSpec {
    /// The namespace holding the source-of-truth copy.
    ///
    /// Specs are validated on load, so there is always at least one namespace.
    #[must_use]
    pub fn canonical_namespace(&self) -> &str {
        self.namespaces.first().map_or("", String::as_str)
    }

    fn validate(&self, index: usize) -> Result<(), ConfigError> {
        let invalid = |reason: &str| ConfigError::InvalidCertificateSpec {
            index,
            secret_name: self.secret_name.clone(),
            reason: reason.to_string(),
        };

        if self.secret_name.trim().is_empty() {
            return Err(invalid("secretName must not be empty"));
        }
        if self.domains.is_empty() {
            return Err(invalid("domains must not be empty"));
        }
        if self.domains.iter().any(|d| d.trim().is_empty()) {
            return Err(invalid("domains must not contain empty names"));
        }
        if self.namespaces.is_empty() {
            return Err(invalid("namespaces must not be empty"));
        }
        if self.namespaces.iter().any(|ns| ns.trim().is_empty()) {
            return Err(invalid("namespaces must not contain empty names"));
        }
        Ok(())
    }
}

/// Parse and validate certificate specs from YAML text.
///
/// # Errors
///
/// Returns [`ConfigError::SpecFileInvalid`] for malformed YAML and
/// [`ConfigError::InvalidCertificateSpec`] for an entry with no domains, no
/// namespaces, or no secret name.
pub fn parse_certificate_specs(yaml: &str, path: &str) -> Result<Vec<CertificateSpec>, ConfigError> {
    // An empty file deserializes to `null`, which is simply "no certificates"
    let specs: Option<Vec<CertificateSpec>> =
        serde_yaml::from_str(yaml).map_err(|source| ConfigError::SpecFileInvalid {
            path: path.to_string(),
            source,
        })?;
    let specs = specs.unwrap_or_default();

    for (index, spec) in specs.iter().enumerate() {
        spec.validate(index)?;
    }

    Ok(specs)
}

/// Load and validate certificate specs from a file.
///
/// # Errors
///
/// Returns [`ConfigError::SpecFileUnreadable`] if the file cannot be read, plus
/// every error of [`parse_certificate_specs`].
pub fn load_certificate_specs(path: &Path) -> Result<Vec<CertificateSpec>, ConfigError> {
    let display = path.display().to_string();
    let yaml = std::fs::read_to_string(path).map_err(|source| ConfigError::SpecFileUnreadable {
        path: display.clone(),
        source,
    })?;
    parse_certificate_specs(&yaml, &display)
}
