// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Certificate issuance over ACME with DNS-01 validation.
//!
//! [`CertificateIssuer`] is the seam the renewal engine calls; [`AcmeIssuer`] is
//! the production implementation on `instant-acme`.
//!
//! Challenges of one order are solved strictly one after another: publish the
//! TXT record, wait for propagation, ask the CA to validate, wait for the verdict,
//! then remove the record. `a.com` and `*.a.com` share a challenge name, so
//! solving them concurrently would overwrite each other's live record.

use crate::bundle::ObtainedBundle;
use crate::constants::{ACME_MAX_POLL_ATTEMPTS, ACME_POLL_INTERVAL_SECS};
use crate::dns::{challenge_fqdn, TxtRecordManager};
use crate::errors::IssuanceError;
use async_trait::async_trait;
use chrono::Utc;
use instant_acme::{
    Account, AccountCredentials, Authorization, AuthorizationStatus, ChallengeType, Identifier,
    NewAccount, NewOrder, Order, OrderStatus,
};
use rcgen::{CertificateParams, DistinguishedName, KeyPair};
use std::future::Future;
use std::path::PathBuf;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Obtains a certificate covering a set of domains.
#[async_trait]
pub trait CertificateIssuer: Send {
    /// Obtain one certificate whose SANs are exactly `domains`.
    ///
    /// # Errors
    ///
    /// Returns [`IssuanceError`] when any step of the issuance fails.
    async fn obtain(&mut self, domains: &[String]) -> Result<ObtainedBundle, IssuanceError>;
}

/// ACME account and challenge settings.
#[derive(Debug, Clone)]
pub struct AcmeSettings {
    /// ACME directory URL
    pub directory_url: String,
    /// Contact email for account registration
    pub email: String,
    /// Where account credentials are loaded from and saved to, if anywhere
    pub credentials_path: Option<PathBuf>,
    /// Wait between publishing a TXT record and asking the CA to validate it
    pub propagation_delay: Duration,
}

/// One DNS-01 challenge to solve.
struct PendingChallenge {
    domain: String,
    url: String,
    dns_value: String,
}

/// [`CertificateIssuer`] on `instant-acme`, answering DNS-01 through a [`TxtRecordManager`].
pub struct AcmeIssuer {
    settings: AcmeSettings,
    records: TxtRecordManager,
    cancel: CancellationToken,
    /// Registered lazily on the first issuance and kept for the process lifetime
    account: Option<Account>,
}

impl AcmeIssuer {
    /// Create an issuer. No network call is made until the first [`obtain`](CertificateIssuer::obtain).
    #[must_use]
    pub fn new(settings: AcmeSettings, records: TxtRecordManager, cancel: CancellationToken) -> Self {
        Self {
            settings,
            records,
            cancel,
            account: None,
        }
    }

    async fn cancellable<T, F>(&self, fut: F) -> Result<T, IssuanceError>
    where
        F: Future<Output = Result<T, IssuanceError>>,
    {
        tokio::select! {
            () = self.cancel.cancelled() => Err(IssuanceError::Cancelled),
            result = fut => result,
        }
    }

    async fn pause(&self, duration: Duration) -> Result<(), IssuanceError> {
        self.cancellable(async {
            tokio::time::sleep(duration).await;
            Ok(())
        })
        .await
    }

    /// Restore the account from saved credentials, or register a new one.
    async fn ensure_account(&mut self) -> Result<(), IssuanceError> {
        if self.account.is_some() {
            return Ok(());
        }

        if let Some(path) = &self.settings.credentials_path {
            if let Ok(json) = tokio::fs::read_to_string(path).await {
                let credentials: AccountCredentials = serde_json::from_str(&json).map_err(|e| {
                    IssuanceError::Registration(format!(
                        "invalid credentials file {}: {e}",
                        path.display()
                    ))
                })?;
                let account = Account::from_credentials(credentials)
                    .await
                    .map_err(|e| IssuanceError::Registration(e.to_string()))?;
                info!(path = %path.display(), "Restored ACME account from saved credentials");
                self.account = Some(account);
                return Ok(());
            }
        }

        let contact = format!("mailto:{}", self.settings.email);
        let (account, credentials) = Account::create(
            &NewAccount {
                contact: &[&contact],
                terms_of_service_agreed: true,
                only_return_existing: false,
            },
            &self.settings.directory_url,
            None,
        )
        .await
        .map_err(|e| IssuanceError::Registration(e.to_string()))?;

        info!(
            email = %self.settings.email,
            directory = %self.settings.directory_url,
            "Registered ACME account"
        );

        if let Some(path) = &self.settings.credentials_path {
            let json = serde_json::to_string_pretty(&credentials)
                .map_err(|e| IssuanceError::Registration(e.to_string()))?;
            if let Err(e) = tokio::fs::write(path, json).await {
                warn!(path = %path.display(), error = %e, "Failed to save ACME account credentials");
            }
        }

        self.account = Some(account);
        Ok(())
    }

    async fn pending_challenges(
        &self,
        order: &mut Order,
        domains: &str,
    ) -> Result<Vec<PendingChallenge>, IssuanceError> {
        let authorizations = order.authorizations().await.map_err(|e| IssuanceError::Order {
            domains: domains.to_string(),
            reason: format!("failed to fetch authorizations: {e}"),
        })?;

        let mut challenges = Vec::new();
        for authz in &authorizations {
            let Identifier::Dns(domain) = &authz.identifier;
            match &authz.status {
                AuthorizationStatus::Pending => {}
                AuthorizationStatus::Valid => {
                    debug!(domain = %domain, "Authorization already valid");
                    continue;
                }
                status => {
                    return Err(IssuanceError::Order {
                        domains: domains.to_string(),
                        reason: format!("authorization for {domain} is {status:?}"),
                    })
                }
            }

            let challenge = authz
                .challenges
                .iter()
                .find(|c| c.r#type == ChallengeType::Dns01)
                .ok_or_else(|| IssuanceError::Order {
                    domains: domains.to_string(),
                    reason: format!("no DNS-01 challenge offered for {domain}"),
                })?;

            challenges.push(PendingChallenge {
                domain: domain.clone(),
                url: challenge.url.clone(),
                dns_value: order.key_authorization(challenge).dns_value(),
            });
        }

        Ok(challenges)
    }

    /// Solve one challenge; the TXT record is always removed afterwards.
    async fn solve(&self, order: &mut Order, challenge: &PendingChallenge) -> Result<(), IssuanceError> {
        let fqdn = challenge_fqdn(&challenge.domain);

        with_challenge_record(
            &self.records,
            &self.cancel,
            &challenge.domain,
            &fqdn,
            &challenge.dns_value,
            self.validate(order, challenge, &fqdn),
        )
        .await
    }

    /// Ask the CA to validate a published challenge and wait for its verdict.
    async fn validate(
        &self,
        order: &mut Order,
        challenge: &PendingChallenge,
        fqdn: &str,
    ) -> Result<(), IssuanceError> {
        debug!(
            fqdn = %fqdn,
            delay = ?self.settings.propagation_delay,
            "Waiting for TXT record propagation"
        );
        tokio::time::sleep(self.settings.propagation_delay).await;

        let order_error = |reason: String| IssuanceError::Order {
            domains: challenge.domain.clone(),
            reason,
        };

        order
            .set_challenge_ready(&challenge.url)
            .await
            .map_err(|e| order_error(format!("failed to mark challenge ready: {e}")))?;

        for _ in 0..ACME_MAX_POLL_ATTEMPTS {
            tokio::time::sleep(Duration::from_secs(ACME_POLL_INTERVAL_SECS)).await;

            let authorizations = order
                .authorizations()
                .await
                .map_err(|e| order_error(format!("failed to poll authorization: {e}")))?;
            let status = authorization_status(&authorizations, &challenge.url);

            match status {
                Some(AuthorizationStatus::Valid) => {
                    info!(domain = %challenge.domain, "DNS-01 challenge validated");
                    return Ok(());
                }
                Some(AuthorizationStatus::Pending) => continue,
                other => {
                    return Err(order_error(format!("authorization ended as {other:?}")));
                }
            }
        }

        Err(order_error("timed out waiting for validation".to_string()))
    }

    async fn finalize(&self, order: &mut Order, domains: &[String]) -> Result<(String, String), IssuanceError> {
        let joined = domains.join(",");
        let order_error = |reason: String| IssuanceError::Order {
            domains: joined.clone(),
            reason,
        };

        let key = KeyPair::generate().map_err(|e| IssuanceError::KeyGeneration(e.to_string()))?;
        let mut params = CertificateParams::new(domains.to_vec())
            .map_err(|e| IssuanceError::KeyGeneration(e.to_string()))?;
        params.distinguished_name = DistinguishedName::new();
        let csr = params
            .serialize_request(&key)
            .map_err(|e| IssuanceError::KeyGeneration(e.to_string()))?;

        let mut submitted = false;
        for _ in 0..ACME_MAX_POLL_ATTEMPTS {
            order
                .refresh()
                .await
                .map_err(|e| order_error(format!("failed to refresh order: {e}")))?;

            match order.state().status {
                OrderStatus::Ready => {
                    if !submitted {
                        order
                            .finalize(csr.der().as_ref())
                            .await
                            .map_err(|e| order_error(format!("failed to finalize order: {e}")))?;
                        submitted = true;
                        continue;
                    }
                }
                OrderStatus::Valid => {
                    if let Some(chain) = order
                        .certificate()
                        .await
                        .map_err(|e| order_error(format!("failed to download certificate: {e}")))?
                    {
                        return Ok((chain, key.serialize_pem()));
                    }
                }
                OrderStatus::Invalid => return Err(order_error("order is invalid".to_string())),
                OrderStatus::Pending => {
                    return Err(order_error(
                        "order still pending after all challenges were answered".to_string(),
                    ))
                }
                OrderStatus::Processing => {}
            }

            self.pause(Duration::from_secs(ACME_POLL_INTERVAL_SECS)).await?;
        }

        Err(order_error("timed out waiting for certificate".to_string()))
    }
}

/// Publish `dns_value` at `fqdn`, await `validation`, then remove the record.
///
/// Removal is attempted whether validation succeeded, failed or was cancelled;
/// a removal failure is logged and never masks the validation result.
///
/// # Errors
///
/// Returns [`IssuanceError::Challenge`] if the record cannot be published,
/// [`IssuanceError::Cancelled`] on cancellation, or the error of `validation`.
pub async fn with_challenge_record<F>(
    records: &TxtRecordManager,
    cancel: &CancellationToken,
    domain: &str,
    fqdn: &str,
    dns_value: &str,
    validation: F,
) -> Result<(), IssuanceError>
where
    F: Future<Output = Result<(), IssuanceError>>,
{
    let answer = async {
        records
            .present(fqdn, dns_value)
            .await
            .map_err(|source| IssuanceError::Challenge {
                domain: domain.to_string(),
                source,
            })?;
        validation.await
    };

    let result = tokio::select! {
        () = cancel.cancelled() => Err(IssuanceError::Cancelled),
        result = answer => result,
    };

    if let Err(e) = records.clean_up(fqdn).await {
        warn!(fqdn = %fqdn, error = %e, "Failed to remove challenge record");
    }

    result
}

/// Status of the authorization that offered `challenge_url`.
///
/// `a.com` and `*.a.com` are separate authorizations with the same identifier,
/// so only the challenge URL tells them apart.
#[must_use]
pub fn authorization_status(
    authorizations: &[Authorization],
    challenge_url: &str,
) -> Option<AuthorizationStatus> {
    authorizations
        .iter()
        .find(|a| a.challenges.iter().any(|c| c.url == challenge_url))
        .map(|a| a.status)
}

#[async_trait]
impl CertificateIssuer for AcmeIssuer {
    async fn obtain(&mut self, domains: &[String]) -> Result<ObtainedBundle, IssuanceError> {
        let joined = domains.join(",");
        self.ensure_account().await?;

        let identifiers: Vec<Identifier> = domains.iter().map(|d| Identifier::Dns(d.clone())).collect();
        let account = self
            .account
            .as_ref()
            .ok_or_else(|| IssuanceError::Registration("no ACME account".to_string()))?;
        let mut order = account
            .new_order(&NewOrder {
                identifiers: &identifiers,
            })
            .await
            .map_err(|e| IssuanceError::Order {
                domains: joined.clone(),
                reason: format!("failed to create order: {e}"),
            })?;

        info!(domains = %joined, order = %order.url(), "Created ACME order");

        let challenges = self.pending_challenges(&mut order, &joined).await?;
        for challenge in &challenges {
            self.solve(&mut order, challenge).await?;
        }

        let (chain, private_key) = self.finalize(&mut order, domains).await?;

        let bundle = ObtainedBundle::new(
            domains,
            chain,
            private_key,
            Some(order.url().to_string()),
            Utc::now(),
        )
        .map_err(|e| IssuanceError::Order {
            domains: joined,
            reason: format!("issued certificate is unreadable: {e}"),
        })?;

        info!(domain = %bundle.domain, not_after = %bundle.not_after, "Certificate issued");
        Ok(bundle)
    }
}
