// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Runtime configuration.
//!
//! Every option can be given as a flag or through its environment variable.
//! Values are checked by [`Config::validate`] before anything talks to the
//! outside world.

use crate::acme::AcmeSettings;
use crate::constants::{
    DEFAULT_ARCHIVE_PATH, DEFAULT_CERTIFICATES_CONFIG_PATH, DEFAULT_CYCLE_INTERVAL_MINUTES,
    DEFAULT_PROPAGATION_DELAY_SECS, DEFAULT_RENEWAL_WINDOW_HOURS, DEFAULT_YC_DNS_ENDPOINT,
    LETSENCRYPT_PRODUCTION_DIRECTORY, METRICS_SERVER_PORT,
};
use crate::errors::ConfigError;
use crate::renewal::{FaultIsolation, RenewalSettings};
use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::Client;
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;

/// Upper bound for the renewal window (one year)
const MAX_RENEWAL_WINDOW_HOURS: u64 = 365 * 24;

/// Upper bound for the cycle interval (one week)
const MAX_CYCLE_INTERVAL_MINUTES: u64 = 7 * 24 * 60;

/// How the Kubernetes client finds its credentials.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum K8sMode {
    /// Service account of the pod
    #[default]
    #[value(name = "in_cluster", alias = "in-cluster")]
    InCluster,
    /// A kubeconfig file
    #[value(name = "kubeconfig", alias = "flags")]
    Kubeconfig,
}

/// certwarden command-line and environment configuration.
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Config {
    /// Yandex Cloud folder that owns the DNS zones
    #[arg(long, env = "YC_FOLDER_ID")]
    pub yc_folder_id: String,

    /// IAM token used as bearer credentials for the DNS API.
    ///
    /// Yandex Cloud IAM tokens expire after at most 12 hours. The token is read
    /// once at startup, so the process must be restarted with a fresh token
    /// (for example by a sidecar or CronJob rolling the deployment) before then.
    #[arg(long, env = "YC_IAM_TOKEN", hide_env_values = true)]
    pub yc_iam_token: String,

    /// Base URL of the Yandex Cloud DNS API
    #[arg(long, env = "YC_DNS_ENDPOINT", default_value = DEFAULT_YC_DNS_ENDPOINT)]
    pub yc_dns_endpoint: String,

    /// Contact email for the ACME account
    #[arg(long, env = "LE_EMAIL")]
    pub le_email: String,

    /// ACME directory URL
    #[arg(long, env = "LE_DIRECTORY", default_value = LETSENCRYPT_PRODUCTION_DIRECTORY)]
    pub le_directory: String,

    /// File the ACME account credentials are restored from and saved to
    #[arg(long, env = "LE_CREDENTIALS_PATH")]
    pub le_credentials_path: Option<PathBuf>,

    /// Kubernetes credential source
    #[arg(long, env = "K8S_MODE", value_enum, default_value_t = K8sMode::InCluster)]
    pub k8s_mode: K8sMode,

    /// Kubeconfig file used in `kubeconfig` mode (default search path when unset)
    #[arg(long, env = "K8S_CONFIG_PATH")]
    pub k8s_config_path: Option<PathBuf>,

    /// Directory obtained bundles are archived under
    #[arg(long, env = "ARCHIVE_PATH", default_value = DEFAULT_ARCHIVE_PATH)]
    pub archive_path: PathBuf,

    /// YAML file listing the certificates to keep valid
    #[arg(long, env = "CERTIFICATES_CONFIG_PATH", default_value = DEFAULT_CERTIFICATES_CONFIG_PATH)]
    pub certificates_config_path: PathBuf,

    /// Renew when fewer than this many hours remain before expiry
    #[arg(long, env = "RENEWAL_WINDOW_HOURS", default_value_t = DEFAULT_RENEWAL_WINDOW_HOURS)]
    pub renewal_window_hours: u64,

    /// Minutes between renewal cycles
    #[arg(long, env = "INTERVAL_MINUTES", default_value_t = DEFAULT_CYCLE_INTERVAL_MINUTES)]
    pub interval_minutes: u64,

    /// Seconds to wait for a challenge record to propagate
    #[arg(long, env = "PROPAGATION_DELAY_SECS", default_value_t = DEFAULT_PROPAGATION_DELAY_SECS)]
    pub propagation_delay_secs: u64,

    /// What a failing certificate does to the rest of the cycle
    #[arg(long, env = "FAULT_ISOLATION", default_value_t = FaultIsolation::SkipAndContinue)]
    pub fault_isolation: FaultIsolation,

    /// Port of the Prometheus metrics server
    #[arg(long, env = "METRICS_PORT", default_value_t = METRICS_SERVER_PORT)]
    pub metrics_port: u16,
}

impl Config {
    /// Check value ranges and required fields.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidValue`] for the first bad option.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.yc_folder_id.trim().is_empty() {
            return Err(invalid("YC_FOLDER_ID", "must not be empty"));
        }
        if self.yc_iam_token.trim().is_empty() {
            return Err(invalid("YC_IAM_TOKEN", "must not be empty"));
        }
        if !self.le_email.contains('@') {
            return Err(invalid(
                "LE_EMAIL",
                format!("'{}' is not an email address", self.le_email),
            ));
        }
        if self.renewal_window_hours == 0 || self.renewal_window_hours > MAX_RENEWAL_WINDOW_HOURS {
            return Err(invalid(
                "RENEWAL_WINDOW_HOURS",
                format!("must be between 1 and {MAX_RENEWAL_WINDOW_HOURS}"),
            ));
        }
        if self.interval_minutes == 0 || self.interval_minutes > MAX_CYCLE_INTERVAL_MINUTES {
            return Err(invalid(
                "INTERVAL_MINUTES",
                format!("must be between 1 and {MAX_CYCLE_INTERVAL_MINUTES}"),
            ));
        }
        if self.k8s_mode == K8sMode::InCluster && self.k8s_config_path.is_some() {
            return Err(invalid(
                "K8S_CONFIG_PATH",
                "only valid with K8S_MODE=kubeconfig",
            ));
        }
        Ok(())
    }

    /// Renewal engine settings.
    #[must_use]
    pub fn renewal_settings(&self) -> RenewalSettings {
        let hours = i64::try_from(self.renewal_window_hours.min(MAX_RENEWAL_WINDOW_HOURS))
            .unwrap_or(i64::MAX);
        RenewalSettings {
            window: chrono::Duration::hours(hours),
            fault_isolation: self.fault_isolation,
        }
    }

    /// Time between the start of two scheduled cycles.
    #[must_use]
    pub fn cycle_interval(&self) -> Duration {
        Duration::from_secs(self.interval_minutes.saturating_mul(60))
    }

    /// ACME issuer settings.
    #[must_use]
    pub fn acme_settings(&self) -> AcmeSettings {
        AcmeSettings {
            directory_url: self.le_directory.clone(),
            email: self.le_email.clone(),
            credentials_path: self.le_credentials_path.clone(),
            propagation_delay: Duration::from_secs(self.propagation_delay_secs),
        }
    }
}

fn invalid(name: &'static str, reason: impl Into<String>) -> ConfigError {
    ConfigError::InvalidValue {
        name,
        reason: reason.into(),
    }
}

/// Build a Kubernetes client for the configured mode.
///
/// # Errors
///
/// Returns an error if credentials cannot be loaded or the client cannot be built.
pub async fn build_kube_client(config: &Config) -> Result<Client> {
    let kube_config = match config.k8s_mode {
        K8sMode::InCluster => {
            kube::Config::incluster().context("Failed to load in-cluster configuration")?
        }
        K8sMode::Kubeconfig => {
            let options = KubeConfigOptions::default();
            match &config.k8s_config_path {
                Some(path) => {
                    let kubeconfig = Kubeconfig::read_from(path).with_context(|| {
                        format!("Failed to read kubeconfig '{}'", path.display())
                    })?;
                    kube::Config::from_custom_kubeconfig(kubeconfig, &options)
                        .await
                        .context("Failed to load kubeconfig")?
                }
                None => kube::Config::from_kubeconfig(&options)
                    .await
                    .context("Failed to load kubeconfig")?,
            }
        }
    };

    info!(mode = ?config.k8s_mode, cluster = %kube_config.cluster_url, "Kubernetes client configured");
    Client::try_from(kube_config).context("Failed to create Kubernetes client")
}
