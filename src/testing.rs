// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! In-memory fakes of the external collaborators, shared by unit tests.

use crate::acme::CertificateIssuer;
use crate::bundle::ObtainedBundle;
use crate::dns::{DnsProvider, DnsZone, RecordSet};
use crate::dns_errors::{DnsError, ProviderError};
use crate::errors::{IssuanceError, SecretStoreError};
use crate::secrets::{SecretStore, TlsSecretData, WriteOutcome};
use async_trait::async_trait;
use chrono::{DateTime, Datelike, Duration, Utc};
use rcgen::{date_time_ymd, CertificateParams, KeyPair};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

/// Self-signed certificate and key PEM for `domains`, expiring on the day of `not_after`.
#[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
pub fn mint_certificate(domains: &[String], not_after: DateTime<Utc>) -> (String, String) {
    let key = KeyPair::generate().unwrap();
    let mut params = CertificateParams::new(domains.to_vec()).unwrap();
    params.not_before = date_time_ymd(2020, 1, 1);
    params.not_after = date_time_ymd(
        not_after.year(),
        not_after.month() as u8,
        not_after.day() as u8,
    );
    let cert = params.self_signed(&key).unwrap();
    (cert.pem(), key.serialize_pem())
}

/// Certificate and key PEM expiring `days` from now.
pub fn mint_certificate_in_days(domains: &[String], days: i64) -> (String, String) {
    mint_certificate(domains, Utc::now() + Duration::days(days))
}

pub fn domains(names: &[&str]) -> Vec<String> {
    names.iter().map(ToString::to_string).collect()
}

// ============================================================================
// DNS provider
// ============================================================================

/// One recorded `update_record_sets` call.
#[derive(Debug, Clone)]
pub struct Update {
    pub zone_id: String,
    pub deletions: Vec<RecordSet>,
    pub additions: Vec<RecordSet>,
}

#[derive(Default)]
struct DnsState {
    records: BTreeMap<(String, String, String), RecordSet>,
    updates: Vec<Update>,
}

/// Zone/record store that applies updates atomically, like the real provider.
pub struct FakeDnsProvider {
    zones: Vec<DnsZone>,
    state: Mutex<DnsState>,
    fail_updates: AtomicBool,
}

impl FakeDnsProvider {
    pub fn with_zones(zones: &[(&str, &str)]) -> Self {
        Self {
            zones: zones
                .iter()
                .map(|(id, zone)| DnsZone {
                    id: (*id).to_string(),
                    zone: (*zone).to_string(),
                })
                .collect(),
            state: Mutex::new(DnsState::default()),
            fail_updates: AtomicBool::new(false),
        }
    }

    pub fn record(&self, zone_id: &str, name: &str) -> Option<RecordSet> {
        let key = (zone_id.to_string(), name.to_string(), "TXT".to_string());
        self.state.lock().unwrap().records.get(&key).cloned()
    }

    pub fn record_count(&self) -> usize {
        self.state.lock().unwrap().records.len()
    }

    pub fn updates(&self) -> Vec<Update> {
        self.state.lock().unwrap().updates.clone()
    }

    pub fn fail_updates(&self, fail: bool) {
        self.fail_updates.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl DnsProvider for FakeDnsProvider {
    async fn list_zones(&self) -> Result<Vec<DnsZone>, DnsError> {
        Ok(self.zones.clone())
    }

    async fn get_record_set(
        &self,
        zone_id: &str,
        name: &str,
        record_type: &str,
    ) -> Result<Option<RecordSet>, DnsError> {
        let key = (
            zone_id.to_string(),
            name.to_string(),
            record_type.to_string(),
        );
        Ok(self.state.lock().unwrap().records.get(&key).cloned())
    }

    async fn update_record_sets(
        &self,
        zone_id: &str,
        deletions: Vec<RecordSet>,
        additions: Vec<RecordSet>,
    ) -> Result<(), DnsError> {
        if self.fail_updates.load(Ordering::SeqCst) {
            return Err(ProviderError::UnexpectedHttpResponse {
                endpoint: "fake".to_string(),
                status_code: 500,
                reason: "injected failure".to_string(),
            }
            .into());
        }

        let mut state = self.state.lock().unwrap();
        let mut records = state.records.clone();
        for record in &deletions {
            let key = (zone_id.to_string(), record.name.clone(), record.record_type.clone());
            if records.remove(&key).is_none() {
                return Err(DnsError::Generic(format!("no record {} to delete", record.name)));
            }
        }
        for record in &additions {
            let key = (zone_id.to_string(), record.name.clone(), record.record_type.clone());
            if records.insert(key, record.clone()).is_some() {
                return Err(DnsError::Generic(format!("record {} already exists", record.name)));
            }
        }

        state.records = records;
        state.updates.push(Update {
            zone_id: zone_id.to_string(),
            deletions,
            additions,
        });
        Ok(())
    }
}

// ============================================================================
// Secret store
// ============================================================================

#[derive(Default)]
struct SecretState {
    secrets: BTreeMap<(String, String), TlsSecretData>,
    writes: Vec<(String, WriteOutcome)>,
}

/// Secret store keyed by (namespace, name), with per-namespace write failures.
#[derive(Default)]
pub struct FakeSecretStore {
    state: Mutex<SecretState>,
    failing_namespaces: Mutex<Vec<String>>,
}

impl FakeSecretStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, namespace: &str, name: &str, certificate: &[u8], private_key: &[u8]) {
        self.insert_raw(
            namespace,
            name,
            TlsSecretData {
                certificate: Some(certificate.to_vec()),
                private_key: Some(private_key.to_vec()),
            },
        );
    }

    pub fn insert_raw(&self, namespace: &str, name: &str, data: TlsSecretData) {
        self.state
            .lock()
            .unwrap()
            .secrets
            .insert((namespace.to_string(), name.to_string()), data);
    }

    pub fn get(&self, namespace: &str, name: &str) -> Option<TlsSecretData> {
        self.state
            .lock()
            .unwrap()
            .secrets
            .get(&(namespace.to_string(), name.to_string()))
            .cloned()
    }

    /// Every upsert in call order, as (namespace, outcome).
    pub fn writes(&self) -> Vec<(String, WriteOutcome)> {
        self.state.lock().unwrap().writes.clone()
    }

    pub fn fail_writes_in(&self, namespace: &str) {
        self.failing_namespaces
            .lock()
            .unwrap()
            .push(namespace.to_string());
    }
}

#[async_trait]
impl SecretStore for FakeSecretStore {
    async fn get_tls(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<TlsSecretData>, SecretStoreError> {
        Ok(self.get(namespace, name))
    }

    async fn upsert_tls(
        &self,
        namespace: &str,
        name: &str,
        certificate: &[u8],
        private_key: &[u8],
    ) -> Result<WriteOutcome, SecretStoreError> {
        if self
            .failing_namespaces
            .lock()
            .unwrap()
            .iter()
            .any(|ns| ns == namespace)
        {
            return Err(SecretStoreError::WriteFailed {
                namespace: namespace.to_string(),
                name: name.to_string(),
                reason: "injected failure".to_string(),
            });
        }

        let wanted = TlsSecretData {
            certificate: Some(certificate.to_vec()),
            private_key: Some(private_key.to_vec()),
        };
        let key = (namespace.to_string(), name.to_string());

        let mut state = self.state.lock().unwrap();
        let outcome = match state.secrets.get(&key) {
            Some(current) if *current == wanted => WriteOutcome::Unchanged,
            Some(_) => WriteOutcome::Updated,
            None => WriteOutcome::Created,
        };
        if outcome != WriteOutcome::Unchanged {
            state.secrets.insert(key, wanted);
        }
        state.writes.push((namespace.to_string(), outcome));
        Ok(outcome)
    }
}

// ============================================================================
// Certificate issuer
// ============================================================================

/// Issuer minting self-signed certificates; clones share call history.
#[derive(Clone)]
pub struct FakeIssuer {
    calls: Arc<Mutex<Vec<Vec<String>>>>,
    fail_for: Arc<Mutex<Vec<String>>>,
    validity_days: i64,
}

impl FakeIssuer {
    pub fn new() -> Self {
        Self {
            calls: Arc::new(Mutex::new(Vec::new())),
            fail_for: Arc::new(Mutex::new(Vec::new())),
            validity_days: 90,
        }
    }

    /// Domain lists passed to `obtain`, in call order.
    pub fn calls(&self) -> Vec<Vec<String>> {
        self.calls.lock().unwrap().clone()
    }

    /// Fail every order whose first domain is `domain`.
    pub fn fail_for(&self, domain: &str) {
        self.fail_for.lock().unwrap().push(domain.to_string());
    }
}

#[async_trait]
impl CertificateIssuer for FakeIssuer {
    async fn obtain(&mut self, domains: &[String]) -> Result<ObtainedBundle, IssuanceError> {
        self.calls.lock().unwrap().push(domains.to_vec());

        let first = domains.first().cloned().unwrap_or_default();
        if self.fail_for.lock().unwrap().contains(&first) {
            return Err(IssuanceError::Order {
                domains: domains.join(","),
                reason: "injected failure".to_string(),
            });
        }

        let (certificate, private_key) = mint_certificate_in_days(domains, self.validity_days);
        Ok(ObtainedBundle::new(
            domains,
            certificate,
            private_key,
            Some("https://acme.test/order/1".to_string()),
            Utc::now(),
        )
        .unwrap())
    }
}
