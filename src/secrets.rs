// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! TLS secret storage.
//!
//! The renewer only ever needs two operations against a namespace: read the
//! `tls.crt`/`tls.key` pair of a named secret, and upsert that pair. Both are
//! behind the [`SecretStore`] trait; [`KubeSecretStore`] implements it against
//! the Kubernetes API.
//!
//! Upserts preserve everything on an existing secret except the two TLS keys,
//! and skip the write entirely when the stored bytes already match.

use crate::constants::{
    K8S_MANAGED_BY, MANAGED_BY_CERTWARDEN, TLS_CERT_KEY, TLS_PRIVATE_KEY_KEY, TLS_SECRET_TYPE,
};
use crate::errors::SecretStoreError;
use crate::retry::retry_api_call;
use async_trait::async_trait;
use k8s_openapi::api::core::v1::Secret;
use k8s_openapi::ByteString;
use kube::api::{ObjectMeta, PostParams};
use kube::{Api, Client};
use std::collections::BTreeMap;
use std::fmt;
use tracing::{debug, info};

/// Raw TLS entries of a secret. Either may be missing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TlsSecretData {
    /// `tls.crt` bytes
    pub certificate: Option<Vec<u8>>,
    /// `tls.key` bytes
    pub private_key: Option<Vec<u8>>,
}

/// Result of an upsert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    /// The secret did not exist and was created
    Created,
    /// The secret existed and its TLS data was replaced
    Updated,
    /// The secret already held identical bytes; nothing was written
    Unchanged,
}

impl WriteOutcome {
    /// Metric label for this outcome.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Updated => "updated",
            Self::Unchanged => "unchanged",
        }
    }
}

impl fmt::Display for WriteOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Namespaced TLS secret reads and upserts.
#[async_trait]
pub trait SecretStore: Send + Sync {
    /// Read the TLS entries of `namespace/name`. A missing secret is `Ok(None)`.
    async fn get_tls(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<TlsSecretData>, SecretStoreError>;

    /// Create or update `namespace/name` so it holds exactly these TLS entries.
    async fn upsert_tls(
        &self,
        namespace: &str,
        name: &str,
        certificate: &[u8],
        private_key: &[u8],
    ) -> Result<WriteOutcome, SecretStoreError>;
}

/// [`SecretStore`] backed by the Kubernetes API.
#[derive(Clone)]
pub struct KubeSecretStore {
    client: Client,
}

impl KubeSecretStore {
    /// Wrap a Kubernetes client.
    #[must_use]
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn api(&self, namespace: &str) -> Api<Secret> {
        Api::namespaced(self.client.clone(), namespace)
    }
}

#[async_trait]
impl SecretStore for KubeSecretStore {
    async fn get_tls(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<TlsSecretData>, SecretStoreError> {
        let api = self.api(namespace);
        let secret = retry_api_call(|| api.get_opt(name), "get secret")
            .await
            .map_err(|e| SecretStoreError::ReadFailed {
                namespace: namespace.to_string(),
                name: name.to_string(),
                reason: e.to_string(),
            })?;

        Ok(secret.as_ref().map(tls_data))
    }

    async fn upsert_tls(
        &self,
        namespace: &str,
        name: &str,
        certificate: &[u8],
        private_key: &[u8],
    ) -> Result<WriteOutcome, SecretStoreError> {
        let write_failed = |e: anyhow::Error| SecretStoreError::WriteFailed {
            namespace: namespace.to_string(),
            name: name.to_string(),
            reason: e.to_string(),
        };

        let api = self.api(namespace);
        let existing = retry_api_call(|| api.get_opt(name), "get secret")
            .await
            .map_err(write_failed)?;
        let params = PostParams::default();

        match existing {
            Some(secret) if tls_data_matches(&secret, certificate, private_key) => {
                debug!(namespace = %namespace, secret = %name, "Secret already up to date");
                Ok(WriteOutcome::Unchanged)
            }
            Some(mut secret) => {
                apply_tls_data(&mut secret, certificate, private_key);
                retry_api_call(|| api.replace(name, &params, &secret), "replace secret")
                    .await
                    .map_err(write_failed)?;
                info!(namespace = %namespace, secret = %name, "Updated TLS secret");
                Ok(WriteOutcome::Updated)
            }
            None => {
                let secret = build_tls_secret(namespace, name, certificate, private_key);
                retry_api_call(|| api.create(&params, &secret), "create secret")
                    .await
                    .map_err(write_failed)?;
                info!(namespace = %namespace, secret = %name, "Created TLS secret");
                Ok(WriteOutcome::Created)
            }
        }
    }
}

/// Extract the TLS entries of a secret.
#[must_use]
pub fn tls_data(secret: &Secret) -> TlsSecretData {
    let entry = |key: &str| {
        secret
            .data
            .as_ref()
            .and_then(|data| data.get(key))
            .map(|value| value.0.clone())
    };

    TlsSecretData {
        certificate: entry(TLS_CERT_KEY),
        private_key: entry(TLS_PRIVATE_KEY_KEY),
    }
}

/// True when the secret already holds exactly these TLS entries.
#[must_use]
pub fn tls_data_matches(secret: &Secret, certificate: &[u8], private_key: &[u8]) -> bool {
    let current = tls_data(secret);
    current.certificate.as_deref() == Some(certificate)
        && current.private_key.as_deref() == Some(private_key)
}

/// Overwrite the TLS entries of an existing secret, keeping every other field.
pub fn apply_tls_data(secret: &mut Secret, certificate: &[u8], private_key: &[u8]) {
    let data = secret.data.get_or_insert_with(BTreeMap::new);
    data.insert(TLS_CERT_KEY.to_string(), ByteString(certificate.to_vec()));
    data.insert(
        TLS_PRIVATE_KEY_KEY.to_string(),
        ByteString(private_key.to_vec()),
    );
}

/// Build a new `kubernetes.io/tls` secret labelled as managed by certwarden.
#[must_use]
pub fn build_tls_secret(
    namespace: &str,
    name: &str,
    certificate: &[u8],
    private_key: &[u8],
) -> Secret {
    let mut labels = BTreeMap::new();
    labels.insert(K8S_MANAGED_BY.to_string(), MANAGED_BY_CERTWARDEN.to_string());

    let mut secret = Secret {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some(namespace.to_string()),
            labels: Some(labels),
            ..Default::default()
        },
        type_: Some(TLS_SECRET_TYPE.to_string()),
        ..Default::default()
    };
    apply_tls_data(&mut secret, certificate, private_key);
    secret
}
