// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Yandex Cloud DNS implementation of [`DnsProvider`].
//!
//! Talks to the public REST API with a caller-supplied IAM token:
//!
//! - `GET /dns/v1/zones?folderId=...` (paginated) lists zones
//! - `GET /dns/v1/zones/{id}:getRecordSet` fetches one record set
//! - `POST /dns/v1/zones/{id}:updateRecordSets` applies deletions and additions
//!   in one atomic operation
//!
//! Reads are retried with exponential backoff. Updates are sent once: a timed-out
//! update may still have been applied, and the caller re-observes state anyway.

use super::{DnsProvider, DnsZone, RecordSet};
use crate::constants::DNS_API_REQUEST_TIMEOUT_SECS;
use crate::dns_errors::{DnsError, ProviderError, RecordError};
use crate::http_errors::{map_http_status, map_request_error};
use crate::retry::retry_http_call;
use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListZonesResponse {
    #[serde(default)]
    dns_zones: Vec<DnsZone>,
    #[serde(default)]
    next_page_token: Option<String>,
}

#[derive(Debug, Serialize)]
struct UpdateRecordSetsRequest<'a> {
    deletions: &'a [RecordSet],
    additions: &'a [RecordSet],
}

#[derive(Debug, Deserialize)]
struct Operation {
    #[serde(default)]
    id: String,
    #[serde(default)]
    done: bool,
    #[serde(default)]
    error: Option<OperationStatus>,
}

#[derive(Debug, Deserialize)]
struct OperationStatus {
    #[serde(default)]
    code: i32,
    #[serde(default)]
    message: String,
}

/// Cloud DNS client scoped to one folder.
#[derive(Debug, Clone)]
pub struct YandexDnsProvider {
    client: Client,
    endpoint: String,
    folder_id: String,
    iam_token: String,
    retry_reads: bool,
}

impl YandexDnsProvider {
    /// Build a provider for `folder_id` at `endpoint` (no trailing slash needed).
    ///
    /// # Errors
    ///
    /// Returns [`DnsError::Provider`] if the HTTP client cannot be constructed.
    pub fn new(endpoint: &str, folder_id: &str, iam_token: &str) -> Result<Self, DnsError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(DNS_API_REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|e| ProviderError::HttpConnectionFailed {
                endpoint: endpoint.to_string(),
                reason: format!("failed to build HTTP client: {e}"),
            })?;

        Ok(Self {
            client,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            folder_id: folder_id.to_string(),
            iam_token: iam_token.to_string(),
            retry_reads: true,
        })
    }

    /// Disable retries of read calls; every error surfaces on the first attempt.
    #[must_use]
    pub fn without_retries(mut self) -> Self {
        self.retry_reads = false;
        self
    }

    fn zone_url(&self, zone_id: &str, method: &str) -> String {
        format!("{}/dns/v1/zones/{zone_id}:{method}", self.endpoint)
    }

    async fn read<T, F, Fut>(&self, operation: F, operation_name: &str) -> Result<T, DnsError>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = Result<T, DnsError>>,
    {
        if self.retry_reads {
            retry_http_call(operation, operation_name).await
        } else {
            let mut operation = operation;
            operation().await
        }
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<Response, DnsError> {
        request
            .bearer_auth(&self.iam_token)
            .send()
            .await
            .map_err(|e| map_request_error(&self.endpoint, &e, DNS_API_REQUEST_TIMEOUT_SECS).into())
    }

    async fn decode<T: DeserializeOwned>(&self, response: Response) -> Result<T, DnsError> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(map_http_status(&self.endpoint, status.as_u16(), body).into());
        }

        response.json::<T>().await.map_err(|e| {
            ProviderError::InvalidResponse {
                endpoint: self.endpoint.clone(),
                reason: e.to_string(),
            }
            .into()
        })
    }

    async fn list_zones_page(&self, page_token: Option<&str>) -> Result<ListZonesResponse, DnsError> {
        let mut query = vec![("folderId", self.folder_id.as_str())];
        if let Some(token) = page_token {
            query.push(("pageToken", token));
        }

        let request = self
            .client
            .get(format!("{}/dns/v1/zones", self.endpoint))
            .query(&query);
        let response = self.send(request).await?;
        self.decode(response).await
    }

    async fn fetch_record_set(
        &self,
        zone_id: &str,
        name: &str,
        record_type: &str,
    ) -> Result<Option<RecordSet>, DnsError> {
        let request = self
            .client
            .get(self.zone_url(zone_id, "getRecordSet"))
            .query(&[("name", name), ("type", record_type)]);
        let response = self.send(request).await?;

        match response.status() {
            StatusCode::NOT_FOUND => Ok(None),
            StatusCode::BAD_REQUEST => {
                let body = response.text().await.unwrap_or_default();
                Err(RecordError::RecordLookupFailed {
                    name: name.to_string(),
                    zone: zone_id.to_string(),
                    reason: body,
                }
                .into())
            }
            _ => self.decode(response).await.map(Some),
        }
    }
}

#[async_trait]
impl DnsProvider for YandexDnsProvider {
    async fn list_zones(&self) -> Result<Vec<DnsZone>, DnsError> {
        let mut zones = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let token = page_token.clone();
            let page = self
                .read(
                    || self.list_zones_page(token.as_deref()),
                    "list DNS zones",
                )
                .await?;

            zones.extend(page.dns_zones);
            match page.next_page_token.filter(|t| !t.is_empty()) {
                Some(next) => page_token = Some(next),
                None => break,
            }
        }

        debug!(folder_id = %self.folder_id, count = zones.len(), "Listed DNS zones");
        Ok(zones)
    }

    async fn get_record_set(
        &self,
        zone_id: &str,
        name: &str,
        record_type: &str,
    ) -> Result<Option<RecordSet>, DnsError> {
        self.read(
            || self.fetch_record_set(zone_id, name, record_type),
            "get DNS record set",
        )
        .await
    }

    async fn update_record_sets(
        &self,
        zone_id: &str,
        deletions: Vec<RecordSet>,
        additions: Vec<RecordSet>,
    ) -> Result<(), DnsError> {
        let body = UpdateRecordSetsRequest {
            deletions: &deletions,
            additions: &additions,
        };
        let request = self
            .client
            .post(self.zone_url(zone_id, "updateRecordSets"))
            .json(&body);

        let subject = additions
            .first()
            .or_else(|| deletions.first())
            .map(|r| r.name.clone())
            .unwrap_or_default();
        let failure = |reason: String| -> DnsError {
            if additions.is_empty() {
                RecordError::RecordDeletionFailed {
                    name: subject.clone(),
                    zone: zone_id.to_string(),
                    reason,
                }
                .into()
            } else {
                RecordError::RecordUpdateFailed {
                    name: subject.clone(),
                    zone: zone_id.to_string(),
                    reason,
                }
                .into()
            }
        };

        let response = self.send(request).await?;
        let operation: Operation = match self.decode(response).await {
            Ok(op) => op,
            Err(DnsError::Provider(ProviderError::UnexpectedHttpResponse {
                status_code,
                reason,
                ..
            })) if status_code == 400 || status_code == 409 => {
                return Err(failure(reason));
            }
            Err(e) => return Err(e),
        };

        if let Some(status) = operation.error {
            warn!(
                operation_id = %operation.id,
                code = status.code,
                "DNS record update operation failed"
            );
            return Err(failure(status.message));
        }

        debug!(
            zone_id = %zone_id,
            operation_id = %operation.id,
            done = operation.done,
            deletions = deletions.len(),
            additions = additions.len(),
            "Submitted DNS record update"
        );
        Ok(())
    }
}

#[cfg(test)]
#[path = "yandex_tests.rs"]
mod yandex_tests;
