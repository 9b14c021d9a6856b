// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for secret construction and comparison helpers.

#[cfg(test)]
mod tests {
    use crate::secrets::{
        apply_tls_data, build_tls_secret, tls_data, tls_data_matches, TlsSecretData, WriteOutcome,
    };
    use k8s_openapi::api::core::v1::Secret;
    use k8s_openapi::ByteString;
    use kube::api::ObjectMeta;
    use std::collections::BTreeMap;

    #[test]
    fn test_build_tls_secret_shape() {
        let secret = build_tls_secret("ns1", "a-tls", b"CERT", b"KEY");

        assert_eq!(secret.metadata.name.as_deref(), Some("a-tls"));
        assert_eq!(secret.metadata.namespace.as_deref(), Some("ns1"));
        assert_eq!(secret.type_.as_deref(), Some("kubernetes.io/tls"));
        assert_eq!(
            secret
                .metadata
                .labels
                .as_ref()
                .and_then(|l| l.get("app.kubernetes.io/managed-by"))
                .map(String::as_str),
            Some("certwarden")
        );
        assert_eq!(
            tls_data(&secret),
            TlsSecretData {
                certificate: Some(b"CERT".to_vec()),
                private_key: Some(b"KEY".to_vec()),
            }
        );
    }

    #[test]
    fn test_apply_tls_data_keeps_other_fields() {
        let mut annotations = BTreeMap::new();
        annotations.insert("team".to_string(), "edge".to_string());
        let mut data = BTreeMap::new();
        data.insert("ca.crt".to_string(), ByteString(b"CA".to_vec()));
        data.insert("tls.crt".to_string(), ByteString(b"OLD".to_vec()));

        let mut secret = Secret {
            metadata: ObjectMeta {
                name: Some("a-tls".to_string()),
                annotations: Some(annotations),
                resource_version: Some("42".to_string()),
                ..Default::default()
            },
            data: Some(data),
            ..Default::default()
        };

        apply_tls_data(&mut secret, b"NEW", b"KEY");

        let data = secret.data.as_ref().unwrap();
        assert_eq!(data.get("ca.crt"), Some(&ByteString(b"CA".to_vec())));
        assert_eq!(data.get("tls.crt"), Some(&ByteString(b"NEW".to_vec())));
        assert_eq!(data.get("tls.key"), Some(&ByteString(b"KEY".to_vec())));
        assert_eq!(secret.metadata.resource_version.as_deref(), Some("42"));
        assert!(secret.metadata.annotations.unwrap().contains_key("team"));
    }

    #[test]
    fn test_tls_data_of_empty_secret() {
        let secret = Secret::default();
        assert_eq!(tls_data(&secret), TlsSecretData::default());
    }

    #[test]
    fn test_tls_data_matches() {
        let secret = build_tls_secret("ns1", "a-tls", b"CERT", b"KEY");

        assert!(tls_data_matches(&secret, b"CERT", b"KEY"));
        assert!(!tls_data_matches(&secret, b"CERT", b"OTHER"));
        assert!(!tls_data_matches(&secret, b"OTHER", b"KEY"));
        assert!(!tls_data_matches(&Secret::default(), b"CERT", b"KEY"));
    }

    #[test]
    fn test_write_outcome_labels() {
        assert_eq!(WriteOutcome::Created.as_str(), "created");
        assert_eq!(WriteOutcome::Updated.to_string(), "updated");
        assert_eq!(WriteOutcome::Unchanged.as_str(), "unchanged");
    }
}
