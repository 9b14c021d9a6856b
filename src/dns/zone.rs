// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Zone resolution for challenge names.

use super::DnsZone;
use crate::constants::ACME_CHALLENGE_LABEL;
use crate::dns_errors::ZoneError;
use std::cmp::Ordering;

/// Resolve the zone that hosts `fqdn`.
///
/// A zone matches when it is a parent of `fqdn` on a label boundary and strictly
/// shorter than it. The longest match wins. Names are compared as absolute,
/// case-insensitive names.
///
/// # Errors
///
/// - [`ZoneError::ZoneNotFound`] when no zone matches
/// - [`ZoneError::AmbiguousZone`] when more than one zone entry matches with the
///   longest length (duplicate zone entries)
///
/// # Example
///
/// ```rust
/// use certwarden::dns::{resolve_zone, DnsZone};
///
/// let zones = vec![
///     DnsZone { id: "z1".into(), zone: "example.com.".into() },
///     DnsZone { id: "z2".into(), zone: "app.example.com.".into() },
/// ];
/// let zone = resolve_zone("_acme-challenge.app.example.com.", &zones).unwrap();
/// assert_eq!(zone.id, "z2");
/// ```
pub fn resolve_zone<'a>(fqdn: &str, zones: &'a [DnsZone]) -> Result<&'a DnsZone, ZoneError> {
    let name = to_absolute(fqdn).to_ascii_lowercase();

    let mut best: Vec<&DnsZone> = Vec::new();
    let mut best_len = 0;

    for zone in zones {
        let zone_name = to_absolute(&zone.zone).to_ascii_lowercase();
        if !is_strict_subdomain(&name, &zone_name) {
            continue;
        }

        match zone_name.len().cmp(&best_len) {
            Ordering::Greater => {
                best_len = zone_name.len();
                best = vec![zone];
            }
            Ordering::Equal => best.push(zone),
            Ordering::Less => {}
        }
    }

    match best.as_slice() {
        [] => Err(ZoneError::ZoneNotFound {
            fqdn: fqdn.to_string(),
        }),
        [zone] => Ok(zone),
        candidates => Err(ZoneError::AmbiguousZone {
            fqdn: fqdn.to_string(),
            candidates: candidates
                .iter()
                .map(|z| format!("{} ({})", z.zone, z.id))
                .collect::<Vec<_>>()
                .join(", "),
        }),
    }
}

/// Strip the zone name and its preceding separator from `fqdn`.
///
/// Returns `@` for the zone apex. The prefix keeps the exact bytes of `fqdn`.
///
/// ```rust
/// use certwarden::dns::relative_record_name;
///
/// assert_eq!(
///     relative_record_name("_acme-challenge.app.example.com.", "example.com."),
///     "_acme-challenge.app"
/// );
/// ```
#[must_use]
pub fn relative_record_name(fqdn: &str, zone: &str) -> String {
    let name = to_absolute(fqdn);
    let zone_name = to_absolute(zone);

    if name.eq_ignore_ascii_case(&zone_name) {
        return "@".to_string();
    }
    if zone_name == "." {
        return name.trim_end_matches('.').to_string();
    }

    // Strip ".zone." only on a label boundary; a name outside the zone is returned whole
    let suffix = format!(".{zone_name}");
    match name.len().checked_sub(suffix.len()) {
        Some(split) if split > 0 => match name.get(split..) {
            Some(tail) if tail.eq_ignore_ascii_case(&suffix) => name[..split].to_string(),
            _ => name.trim_end_matches('.').to_string(),
        },
        _ => name.trim_end_matches('.').to_string(),
    }
}

/// The DNS-01 challenge name for a certificate domain.
///
/// A wildcard domain is validated at its base name: `*.a.com` and `a.com`
/// share `_acme-challenge.a.com.`.
#[must_use]
pub fn challenge_fqdn(domain: &str) -> String {
    let base = domain.strip_prefix("*.").unwrap_or(domain);
    format!("{ACME_CHALLENGE_LABEL}.{}", to_absolute(base))
}

fn to_absolute(name: &str) -> String {
    if name.ends_with('.') {
        name.to_string()
    } else {
        format!("{name}.")
    }
}

fn is_strict_subdomain(name: &str, zone: &str) -> bool {
    if zone == "." {
        return name.len() > 1;
    }
    name.len() > zone.len()
        && name.ends_with(zone)
        && name.as_bytes()[name.len() - zone.len() - 1] == b'.'
}

#[cfg(test)]
#[path = "zone_tests.rs"]
mod zone_tests;
