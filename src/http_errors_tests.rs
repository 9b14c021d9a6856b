// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for http_errors module
//!
//! These tests verify HTTP status mapping to provider errors.

#[cfg(test)]
mod tests {
    use crate::dns_errors::{DnsError, ProviderError};
    use crate::http_errors::*;

    const ENDPOINT: &str = "https://dns.example.test";

    // ============================================================================
    // Test HTTP 4xx Error Code Mappings
    // ============================================================================

    #[test]
    fn test_map_http_401_unauthorized() {
        let err = map_http_status(ENDPOINT, 401, "denied".into());
        assert_eq!(
            err,
            ProviderError::Unauthorized {
                endpoint: ENDPOINT.to_string(),
                status_code: 401
            }
        );
        assert!(!DnsError::from(err).is_transient());
    }

    #[test]
    fn test_map_http_403_forbidden() {
        let err = map_http_status(ENDPOINT, 403, String::new());
        assert!(matches!(
            err,
            ProviderError::Unauthorized {
                status_code: 403,
                ..
            }
        ));
    }

    #[test]
    fn test_map_http_400_keeps_body() {
        let err = map_http_status(ENDPOINT, 400, "invalid name".into());
        assert_eq!(
            err.to_string(),
            "Unexpected HTTP response from https://dns.example.test: 400 invalid name"
        );
    }

    // ============================================================================
    // Test HTTP 5xx Error Code Mappings
    // ============================================================================

    #[test]
    fn test_map_http_503_is_transient() {
        let err = map_http_status(ENDPOINT, 503, "unavailable".into());
        assert!(matches!(
            err,
            ProviderError::UnexpectedHttpResponse {
                status_code: 503,
                ..
            }
        ));
        assert!(DnsError::from(err).is_transient());
    }

    #[test]
    fn test_long_body_is_truncated() {
        let body = "x".repeat(2000);
        let err = map_http_status(ENDPOINT, 500, body);

        match err {
            ProviderError::UnexpectedHttpResponse { reason, .. } => {
                assert!(reason.len() < 600);
                assert!(reason.ends_with("..."));
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_truncation_respects_char_boundaries() {
        let body = "é".repeat(400);
        let err = map_http_status(ENDPOINT, 500, body);
        assert!(err.to_string().ends_with("..."));
    }
}
