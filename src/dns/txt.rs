// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! TXT record management for DNS-01 challenges.
//!
//! Both operations follow the observe → diff → act pattern: look up the zone and
//! the existing record set fresh from the provider, then submit a single atomic
//! update. Running either operation twice leaves the zone in the same state.

use super::zone::{relative_record_name, resolve_zone};
use super::{DnsProvider, DnsZone, RecordSet};
use crate::constants::{CHALLENGE_RECORD_TTL_SECS, TXT_RECORD_TYPE};
use crate::dns_errors::{DnsError, ZoneError};
use crate::metrics;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Idempotent create/replace and removal of a single challenge TXT record.
#[derive(Clone)]
pub struct TxtRecordManager {
    provider: Arc<dyn DnsProvider>,
    ttl: i64,
}

impl TxtRecordManager {
    /// Create a manager with the fixed challenge TTL.
    #[must_use]
    pub fn new(provider: Arc<dyn DnsProvider>) -> Self {
        Self {
            provider,
            ttl: CHALLENGE_RECORD_TTL_SECS,
        }
    }

    /// Publish `value` as the only TXT record at `fqdn`.
    ///
    /// Any existing TXT record set at the same name is deleted in the same update,
    /// so at most one record exists at the coordinate afterwards.
    ///
    /// # Errors
    ///
    /// Returns [`DnsError::Zone`] if no zone hosts `fqdn` and provider errors for
    /// failed lookups or updates.
    pub async fn present(&self, fqdn: &str, value: &str) -> Result<(), DnsError> {
        let result = self.present_inner(fqdn, value).await;
        metrics::record_dns_operation("present", result.is_ok());
        result
    }

    async fn present_inner(&self, fqdn: &str, value: &str) -> Result<(), DnsError> {
        let zones = self.provider.list_zones().await?;
        let zone = resolve_zone(fqdn, &zones)?;
        let name = relative_record_name(fqdn, &zone.zone);

        let existing = self
            .provider
            .get_record_set(&zone.id, &name, TXT_RECORD_TYPE)
            .await?;

        if let Some(ref record) = existing {
            debug!(
                zone = %zone.zone,
                name = %name,
                values = ?record.data,
                "Replacing existing TXT record"
            );
        }

        info!(
            "Adding TXT record into zone {}: {} {} IN TXT \"{}\"",
            zone.zone, fqdn, self.ttl, value
        );

        let addition = RecordSet {
            name: name.clone(),
            record_type: TXT_RECORD_TYPE.to_string(),
            ttl: self.ttl,
            data: vec![value.to_string()],
        };

        self.provider
            .update_record_sets(&zone.id, existing.into_iter().collect(), vec![addition])
            .await?;

        info!(zone = %zone.zone, name = %name, "TXT record published");
        Ok(())
    }

    /// Remove the TXT record at `fqdn`, if any.
    ///
    /// Removing a record that was never created (or was already removed) is a
    /// no-op. A name with no hosting zone has nothing to clean up either.
    ///
    /// # Errors
    ///
    /// Returns provider errors for failed lookups or deletions.
    pub async fn clean_up(&self, fqdn: &str) -> Result<(), DnsError> {
        let result = self.clean_up_inner(fqdn).await;
        metrics::record_dns_operation("cleanup", result.is_ok());
        result
    }

    async fn clean_up_inner(&self, fqdn: &str) -> Result<(), DnsError> {
        let zones = self.provider.list_zones().await?;
        let zone: &DnsZone = match resolve_zone(fqdn, &zones) {
            Ok(zone) => zone,
            Err(ZoneError::ZoneNotFound { .. }) => {
                warn!(fqdn = %fqdn, "No DNS zone hosts this name, nothing to clean up");
                return Ok(());
            }
            Err(e) => return Err(e.into()),
        };
        let name = relative_record_name(fqdn, &zone.zone);

        let Some(existing) = self
            .provider
            .get_record_set(&zone.id, &name, TXT_RECORD_TYPE)
            .await?
        else {
            debug!(zone = %zone.zone, name = %name, "TXT record already absent");
            return Ok(());
        };

        info!("Removing TXT record from zone {}: {}", zone.zone, fqdn);

        self.provider
            .update_record_sets(&zone.id, vec![existing], Vec::new())
            .await?;

        info!(zone = %zone.zone, name = %name, "TXT record removed");
        Ok(())
    }
}

#[cfg(test)]
#[path = "txt_tests.rs"]
mod txt_tests;
