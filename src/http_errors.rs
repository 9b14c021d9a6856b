// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! HTTP error mapping for the DNS provider API.
//!
//! Converts HTTP status codes and transport failures from the cloud DNS REST API
//! into [`ProviderError`] values, so retry decisions and log reasons are made in
//! one place.
//!
//! # Usage
//!
//! ```rust
//! use certwarden::dns_errors::ProviderError;
//! use certwarden::http_errors::map_http_status;
//!
//! let err = map_http_status("https://dns.api.cloud.yandex.net", 403, String::new());
//! assert!(matches!(err, ProviderError::Unauthorized { status_code: 403, .. }));
//! ```

use crate::dns_errors::ProviderError;

/// Longest response body kept in an error message
const MAX_ERROR_BODY_LEN: usize = 512;

/// Map a non-success HTTP status code to a [`ProviderError`].
///
/// # HTTP Code Mapping
///
/// | HTTP Code | Error | Retried |
/// |-----------|-------|---------|
/// | 401, 403 | `Unauthorized` | no |
/// | 429, 500, 502, 503, 504 | `UnexpectedHttpResponse` | yes |
/// | Other | `UnexpectedHttpResponse` | no |
///
/// 404 is not mapped here: "not found" is a valid answer for record lookups and is
/// handled by the caller.
#[must_use]
pub fn map_http_status(endpoint: &str, status_code: u16, body: String) -> ProviderError {
    match status_code {
        401 | 403 => ProviderError::Unauthorized {
            endpoint: endpoint.to_string(),
            status_code,
        },
        _ => ProviderError::UnexpectedHttpResponse {
            endpoint: endpoint.to_string(),
            status_code,
            reason: truncate_body(body),
        },
    }
}

/// Map a transport-level `reqwest` failure (no HTTP status received).
///
/// # Common Causes
///
/// - DNS resolution failure for the API host
/// - TLS handshake failure
/// - Request exceeding the client timeout
#[must_use]
pub fn map_request_error(endpoint: &str, err: &reqwest::Error, timeout_secs: u64) -> ProviderError {
    if err.is_timeout() {
        ProviderError::HttpRequestTimeout {
            endpoint: endpoint.to_string(),
            timeout_secs,
        }
    } else if let Some(status) = err.status() {
        map_http_status(endpoint, status.as_u16(), err.to_string())
    } else {
        ProviderError::HttpConnectionFailed {
            endpoint: endpoint.to_string(),
            reason: err.to_string(),
        }
    }
}

fn truncate_body(body: String) -> String {
    if body.len() <= MAX_ERROR_BODY_LEN {
        return body;
    }
    let mut end = MAX_ERROR_BODY_LEN;
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &body[..end])
}
