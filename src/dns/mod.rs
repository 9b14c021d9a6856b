// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! DNS-01 challenge plumbing against a cloud DNS provider.
//!
//! The provider is a black-box zone/record store behind the [`DnsProvider`] trait.
//! On top of it sit:
//!
//! - [`zone`] - resolve the zone hosting a challenge name and derive relative names
//! - [`txt`] - idempotently present and clean up a single TXT record
//! - [`yandex`] - the Yandex Cloud DNS REST implementation of [`DnsProvider`]

pub mod txt;
pub mod yandex;
pub mod zone;

pub use txt::TxtRecordManager;
pub use yandex::YandexDnsProvider;
pub use zone::{challenge_fqdn, relative_record_name, resolve_zone};

use crate::dns_errors::DnsError;
use async_trait::async_trait;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// An authoritative zone held by the provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DnsZone {
    /// Opaque provider identifier
    pub id: String,
    /// Absolute zone name, e.g. `example.com.`
    pub zone: String,
}

/// A record set keyed by (zone, relative name, type).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordSet {
    /// Name relative to the zone (e.g. `_acme-challenge.app`)
    pub name: String,
    /// Record type (`TXT` for challenges)
    #[serde(rename = "type")]
    pub record_type: String,
    /// Time to live in seconds
    #[serde(
        serialize_with = "serialize_ttl",
        deserialize_with = "deserialize_ttl",
        default
    )]
    pub ttl: i64,
    /// Record values
    #[serde(default)]
    pub data: Vec<String>,
}

/// Black-box zone/record store.
///
/// Every call reflects provider state at call time; nothing is cached.
#[async_trait]
pub trait DnsProvider: Send + Sync {
    /// List every zone the configured credentials can manage.
    async fn list_zones(&self) -> Result<Vec<DnsZone>, DnsError>;

    /// Fetch the record set at (zone, name, type).
    ///
    /// A record set that does not exist is `Ok(None)`, not an error.
    async fn get_record_set(
        &self,
        zone_id: &str,
        name: &str,
        record_type: &str,
    ) -> Result<Option<RecordSet>, DnsError>;

    /// Atomically apply `deletions` then `additions` within one zone.
    async fn update_record_sets(
        &self,
        zone_id: &str,
        deletions: Vec<RecordSet>,
        additions: Vec<RecordSet>,
    ) -> Result<(), DnsError>;
}

// int64 fields are encoded as JSON strings by the provider's protobuf mapping
fn serialize_ttl<S: Serializer>(ttl: &i64, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&ttl.to_string())
}

fn deserialize_ttl<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i64, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum StringOrInt {
        Str(String),
        Int(i64),
    }

    match StringOrInt::deserialize(deserializer)? {
        StringOrInt::Int(ttl) => Ok(ttl),
        StringOrInt::Str(ttl) => ttl.parse().map_err(serde::de::Error::custom),
    }
}
