// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Shared in-memory collaborators for integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use certwarden::acme::CertificateIssuer;
use certwarden::bundle::ObtainedBundle;
use certwarden::dns::{challenge_fqdn, DnsProvider, DnsZone, RecordSet, TxtRecordManager};
use certwarden::dns_errors::DnsError;
use certwarden::errors::{IssuanceError, SecretStoreError};
use certwarden::secrets::{SecretStore, TlsSecretData, WriteOutcome};
use chrono::{Datelike, Duration, Utc};
use kube::client::Client;
use rcgen::{date_time_ymd, CertificateParams, KeyPair};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

pub fn names(values: &[&str]) -> Vec<String> {
    values.iter().map(ToString::to_string).collect()
}

/// Self-signed certificate and key PEM expiring `days` from now.
#[allow(clippy::cast_possible_truncation)]
pub fn mint_certificate(domains: &[String], days: i64) -> (String, String) {
    let not_after = Utc::now() + Duration::days(days);
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

/// Get a Kubernetes client or skip the test if no cluster is reachable
pub async fn get_kube_client_or_skip() -> Option<Client> {
    match Client::try_default().await {
        Ok(client) => Some(client),
        Err(e) => {
            eprintln!("Skipping integration test: no Kubernetes cluster available: {e}");
            None
        }
    }
}

// ============================================================================
// DNS
// ============================================================================

#[derive(Default)]
struct DnsRecords {
    records: BTreeMap<(String, String), RecordSet>,
    updates: usize,
}

/// Provider holding TXT records in memory, keyed by (zone id, relative name).
pub struct InMemoryDns {
    zones: Vec<DnsZone>,
    state: Mutex<DnsRecords>,
}

impl InMemoryDns {
    pub fn new(zones: &[(&str, &str)]) -> Self {
        Self {
            zones: zones
                .iter()
                .map(|(id, zone)| DnsZone {
                    id: (*id).to_string(),
                    zone: (*zone).to_string(),
                })
                .collect(),
            state: Mutex::new(DnsRecords::default()),
        }
    }

    pub fn record(&self, zone_id: &str, name: &str) -> Option<RecordSet> {
        let state = self.state.lock().unwrap();
        state
            .records
            .get(&(zone_id.to_string(), name.to_string()))
            .cloned()
    }

    pub fn record_count(&self) -> usize {
        self.state.lock().unwrap().records.len()
    }

    pub fn update_count(&self) -> usize {
        self.state.lock().unwrap().updates
    }
}

#[async_trait]
impl DnsProvider for InMemoryDns {
    async fn list_zones(&self) -> Result<Vec<DnsZone>, DnsError> {
        Ok(self.zones.clone())
    }

    async fn get_record_set(
        &self,
        zone_id: &str,
        name: &str,
        _record_type: &str,
    ) -> Result<Option<RecordSet>, DnsError> {
        Ok(self.record(zone_id, name))
    }

    async fn update_record_sets(
        &self,
        zone_id: &str,
        deletions: Vec<RecordSet>,
        additions: Vec<RecordSet>,
    ) -> Result<(), DnsError> {
        let mut state = self.state.lock().unwrap();
        state.updates += 1;
        for record in deletions {
            state.records.remove(&(zone_id.to_string(), record.name));
        }
        for record in additions {
            state
                .records
                .insert((zone_id.to_string(), record.name.clone()), record);
        }
        Ok(())
    }
}

// ============================================================================
// Secrets
// ============================================================================

/// Secret store backed by a map of (namespace, name).
#[derive(Default)]
pub struct InMemorySecrets {
    secrets: Mutex<BTreeMap<(String, String), TlsSecretData>>,
}

impl InMemorySecrets {
    pub fn insert(&self, namespace: &str, name: &str, certificate: &str, private_key: &str) {
        self.secrets.lock().unwrap().insert(
            (namespace.to_string(), name.to_string()),
            TlsSecretData {
                certificate: Some(certificate.as_bytes().to_vec()),
                private_key: Some(private_key.as_bytes().to_vec()),
            },
        );
    }

    pub fn get(&self, namespace: &str, name: &str) -> Option<TlsSecretData> {
        self.secrets
            .lock()
            .unwrap()
            .get(&(namespace.to_string(), name.to_string()))
            .cloned()
    }
}

#[async_trait]
impl SecretStore for InMemorySecrets {
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
        let data = TlsSecretData {
            certificate: Some(certificate.to_vec()),
            private_key: Some(private_key.to_vec()),
        };
        let mut secrets = self.secrets.lock().unwrap();
        let outcome = match secrets.insert((namespace.to_string(), name.to_string()), data.clone()) {
            None => WriteOutcome::Created,
            Some(previous) if previous == data => WriteOutcome::Unchanged,
            Some(_) => WriteOutcome::Updated,
        };
        Ok(outcome)
    }
}

// ============================================================================
// Issuer
// ============================================================================

/// What the issuer saw while an order was in flight.
#[derive(Debug, Clone, Default)]
pub struct IssuerLog {
    /// Domain list of every `obtain` call
    pub calls: Vec<Vec<String>>,
    /// TXT records present at the moment validation would have happened
    pub records_during_validation: Vec<usize>,
}

/// Issuer that walks the DNS-01 record lifecycle, then self-signs.
#[derive(Clone)]
pub struct Dns01Issuer {
    records: Arc<TxtRecordManager>,
    dns: Arc<InMemoryDns>,
    log: Arc<Mutex<IssuerLog>>,
}

impl Dns01Issuer {
    pub fn new(dns: Arc<InMemoryDns>) -> Self {
        Self {
            records: Arc::new(TxtRecordManager::new(dns.clone())),
            dns,
            log: Arc::new(Mutex::new(IssuerLog::default())),
        }
    }

    pub fn log(&self) -> IssuerLog {
        self.log.lock().unwrap().clone()
    }
}

#[async_trait]
impl CertificateIssuer for Dns01Issuer {
    async fn obtain(&mut self, domains: &[String]) -> Result<ObtainedBundle, IssuanceError> {
        self.log.lock().unwrap().calls.push(domains.to_vec());

        for domain in domains {
            self.records
                .present(&challenge_fqdn(domain), &format!("token-{domain}"))
                .await
                .map_err(|source| IssuanceError::Challenge {
                    domain: domain.clone(),
                    source,
                })?;
        }
        let present = self.dns.record_count();
        self.log.lock().unwrap().records_during_validation.push(present);

        for domain in domains {
            self.records
                .clean_up(&challenge_fqdn(domain))
                .await
                .map_err(|source| IssuanceError::Challenge {
                    domain: domain.clone(),
                    source,
                })?;
        }

        let (certificate, private_key) = mint_certificate(domains, 90);
        ObtainedBundle::new(
            domains,
            certificate,
            private_key,
            Some("https://acme.test/order/1".to_string()),
            Utc::now(),
        )
        .map_err(|e| IssuanceError::Order {
            domains: domains.join(","),
            reason: e.to_string(),
        })
    }
}
