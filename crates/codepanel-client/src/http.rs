// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result, bail};
use codepanel_app::SyncError;
use reqwest::StatusCode;
use reqwest::blocking::{Client as HttpClient, RequestBuilder, Response};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::time::Duration;
use url::Url;

/// Shared plumbing for the protocol adapters: one base URL, one HTTP client
/// with a fixed timeout, and uniform error mapping.
#[derive(Debug, Clone)]
pub(crate) struct Transport {
    base: Url,
    http: HttpClient,
}

impl Transport {
    pub(crate) fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let trimmed = base_url.trim();
        if trimmed.is_empty() {
            bail!("backend.base_url must not be empty");
        }
        let base = Url::parse(trimmed)
            .with_context(|| format!("parse backend URL {trimmed:?} -- use an absolute http(s) URL"))?;
        if base.cannot_be_a_base() || !matches!(base.scheme(), "http" | "https") {
            bail!("backend URL {trimmed:?} must be an http(s) URL");
        }

        let http = HttpClient::builder()
            .timeout(timeout)
            .build()
            .context("build HTTP client")?;

        Ok(Self { base, http })
    }

    pub(crate) fn base(&self) -> &Url {
        &self.base
    }

    pub(crate) fn http(&self) -> &HttpClient {
        &self.http
    }

    /// `base` with `segments` appended as percent-encoded path segments.
    pub(crate) fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty();
            path.extend(segments);
        }
        url
    }

    /// Sends `request` and maps anything but a 2xx answer to a [`SyncError`].
    pub(crate) fn send(&self, request: RequestBuilder) -> Result<Response, SyncError> {
        ensure_success(self.execute(request)?)
    }

    /// Sends `request`, mapping only transport failures.
    pub(crate) fn execute(&self, request: RequestBuilder) -> Result<Response, SyncError> {
        let response = request
            .send()
            .map_err(|error| connection_error(&self.base, &error))?;
        tracing::debug!(
            status = response.status().as_u16(),
            url = %response.url(),
            "backend responded"
        );
        Ok(response)
    }
}

pub(crate) fn ensure_success(response: Response) -> Result<Response, SyncError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().unwrap_or_default();
    Err(clean_error_response(status, &body))
}

pub(crate) fn decode<T: DeserializeOwned>(response: Response, what: &str) -> Result<T, SyncError> {
    let body = response
        .text()
        .map_err(|error| SyncError::network(format!("read {what}: {error}")))?;
    serde_json::from_str(&body).map_err(|error| SyncError::Decode(format!("{what}: {error}")))
}

fn connection_error(base: &Url, error: &reqwest::Error) -> SyncError {
    if error.is_timeout() {
        return SyncError::network(format!(
            "timed out waiting for {base} -- the backend may be overloaded, try again"
        ));
    }
    SyncError::network(format!(
        "cannot reach {base} -- check the URL and that the backend is running ({error})"
    ))
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

fn clean_error_response(status: StatusCode, body: &str) -> SyncError {
    let detail = serde_json::from_str::<ErrorEnvelope>(body)
        .ok()
        .and_then(|envelope| envelope.error.or(envelope.message))
        .filter(|message| !message.is_empty())
        .or_else(|| {
            let trimmed = body.trim();
            (!trimmed.is_empty() && trimmed.len() < 100 && !trimmed.contains('{'))
                .then(|| trimmed.to_owned())
        });

    if status == StatusCode::CONFLICT {
        return SyncError::Conflict(
            detail.unwrap_or_else(|| "the row changed on the server -- reload and retry".to_owned()),
        );
    }

    match detail {
        Some(detail) => SyncError::network(format!("server error ({}): {detail}", status.as_u16())),
        None => SyncError::network(format!("server returned {}", status.as_u16())),
    }
}
