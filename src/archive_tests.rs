// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `archive.rs`

#[cfg(test)]
mod tests {
    use crate::archive::{archive_dir_name, ArchiveWriter};
    use crate::bundle::ObtainedBundle;
    use crate::errors::ArchiveError;
    use crate::testing::{domains, mint_certificate_in_days};
    use chrono::{TimeZone, Utc};
    use tempfile::TempDir;

    fn bundle_for(names: &[&str], timestamp: i64) -> ObtainedBundle {
        let domains = domains(names);
        let (leaf, key) = mint_certificate_in_days(&domains, 90);
        let (issuer, _) = mint_certificate_in_days(&crate::testing::domains(&["ca.test"]), 365);
        ObtainedBundle::new(
            &domains,
            format!("{leaf}{issuer}"),
            key,
            Some("https://acme.test/order/7".to_string()),
            Utc.timestamp_opt(timestamp, 0).unwrap(),
        )
        .unwrap()
    }

    #[test]
    fn test_archive_dir_name() {
        assert_eq!(archive_dir_name("a.com"), "a.com");
        assert_eq!(archive_dir_name("*.a.com"), "_wildcard.a.com");
    }

    #[tokio::test]
    async fn test_write_creates_all_files() {
        let tmp = TempDir::new().unwrap();
        let writer = ArchiveWriter::new(tmp.path());
        let bundle = bundle_for(&["a.com", "www.a.com"], 1_700_000_000);

        let dir = writer.write(&bundle).await.unwrap();

        assert_eq!(dir, tmp.path().join("a.com").join("1700000000"));
        let fullchain = std::fs::read_to_string(dir.join("fullchain.pem")).unwrap();
        let chain = std::fs::read_to_string(dir.join("chain.pem")).unwrap();
        let privkey = std::fs::read_to_string(dir.join("privkey.pem")).unwrap();

        assert_eq!(fullchain, bundle.certificate);
        assert_eq!(chain, bundle.issuer_certificate);
        assert!(fullchain.ends_with(&chain));
        assert_eq!(privkey, bundle.private_key);

        let info: serde_json::Value =
            serde_json::from_slice(&std::fs::read(dir.join("info.json")).unwrap()).unwrap();
        assert_eq!(info["domain"], "a.com");
        assert_eq!(info["domains"][1], "www.a.com");
        assert_eq!(info["orderUrl"], "https://acme.test/order/7");
        assert!(info.get("privateKey").is_none());
        assert!(info.get("certificate").is_none());
    }

    #[tokio::test]
    async fn test_write_leaves_no_staging_directory() {
        let tmp = TempDir::new().unwrap();
        let writer = ArchiveWriter::new(tmp.path());

        writer
            .write(&bundle_for(&["a.com"], 1_700_000_000))
            .await
            .unwrap();

        let entries: Vec<String> = std::fs::read_dir(tmp.path().join("a.com"))
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(entries, vec!["1700000000".to_string()]);
    }

    #[tokio::test]
    async fn test_write_replaces_leftover_staging() {
        let tmp = TempDir::new().unwrap();
        let staging = tmp.path().join("a.com").join(".1700000000.partial");
        std::fs::create_dir_all(&staging).unwrap();
        std::fs::write(staging.join("privkey.pem"), "stale").unwrap();

        let writer = ArchiveWriter::new(tmp.path());
        let dir = writer
            .write(&bundle_for(&["a.com"], 1_700_000_000))
            .await
            .unwrap();

        assert!(!staging.exists());
        assert_ne!(std::fs::read_to_string(dir.join("privkey.pem")).unwrap(), "stale");
    }

    #[tokio::test]
    async fn test_write_refuses_existing_entry() {
        let tmp = TempDir::new().unwrap();
        let writer = ArchiveWriter::new(tmp.path());
        let bundle = bundle_for(&["a.com"], 1_700_000_000);

        writer.write(&bundle).await.unwrap();
        let err = writer.write(&bundle).await.unwrap_err();

        assert!(matches!(err, ArchiveError::Io { .. }));
    }

    #[tokio::test]
    async fn test_wildcard_domain_directory() {
        let tmp = TempDir::new().unwrap();
        let writer = ArchiveWriter::new(tmp.path());

        let dir = writer
            .write(&bundle_for(&["*.a.com", "a.com"], 1_700_000_001))
            .await
            .unwrap();

        assert_eq!(dir, tmp.path().join("_wildcard.a.com").join("1700000001"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_private_key_mode_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let tmp = TempDir::new().unwrap();
        let writer = ArchiveWriter::new(tmp.path());
        let dir = writer
            .write(&bundle_for(&["a.com"], 1_700_000_000))
            .await
            .unwrap();

        let mode = std::fs::metadata(dir.join("privkey.pem"))
            .unwrap()
            .permissions()
            .mode();
        assert_eq!(mode & 0o777, 0o600);
    }
}
