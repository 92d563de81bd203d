// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//
//! HTTP client for the bundle service, which turns bundle YAML into changesets

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use tracing::debug;

use crate::api::{ChangesetGenerator, ChangesetRequest};
use crate::error::GenerationErrors;
use crate::types::Record;

/// Response body of `bundlechanges/fromYAML`
#[derive(Debug, Default, Deserialize)]
struct ChangesResponse {
    #[serde(default)]
    changes: Option<Vec<Record>>,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    errors: Option<Vec<String>>,
}

/// Interpret a bundle service response body
pub fn parse_changes_response(body: &str) -> Result<Vec<Record>, GenerationErrors> {
    let response: ChangesResponse = serde_json::from_str(body)
        .map_err(|err| GenerationErrors::single(format!("invalid bundle service response: {err}")))?;
    if let Some(errors) = response.errors.filter(|e| !e.is_empty()) {
        return Err(GenerationErrors(errors));
    }
    if let Some(error) = response.error.filter(|e| !e.is_empty()) {
        return Err(GenerationErrors::single(error));
    }
    Ok(response.changes.unwrap_or_default())
}

/// Changeset generator backed by a remote bundle service
pub struct BundleServiceClient {
    client: Client,
    base_url: String,
}

impl BundleServiceClient {
    /// Create a client for the service at `base_url`
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/bundlechanges/fromYAML", self.base_url)
    }
}

#[async_trait]
impl ChangesetGenerator for BundleServiceClient {
    async fn generate(&self, request: ChangesetRequest) -> Result<Vec<Record>, GenerationErrors> {
        let bundle = match request {
            ChangesetRequest::Yaml(bundle) => bundle,
            ChangesetRequest::Token(_) => {
                return Err(GenerationErrors::single(
                    "the bundle service does not accept changeset tokens",
                ))
            }
        };

        let url = self.endpoint();
        debug!(%url, "requesting changeset");
        let response = self
            .client
            .post(&url)
            .json(&json!({ "bundle": bundle }))
            .send()
            .await
            .map_err(|err| GenerationErrors::single(format!("bundle service unavailable: {err}")))?;
        let body = response
            .text()
            .await
            .map_err(|err| GenerationErrors::single(format!("bundle service read failed: {err}")))?;
        parse_changes_response(&body)
    }
}
