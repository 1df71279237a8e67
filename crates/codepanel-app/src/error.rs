// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use thiserror::Error;

use crate::model::Field;

/// Failures that cross the boundary between the panel and a row backend.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SyncError {
    /// A form failed its local checks; nothing was sent.
    #[error("{0}")]
    Validation(String),

    /// The transport failed or the backend answered with a non-success status.
    #[error("network error: {0}")]
    Network(String),

    /// The backend answered but the body did not parse.
    #[error("unexpected response: {0}")]
    Decode(String),

    /// The backend rejected a write against a stale row version.
    #[error("conflict: {0}")]
    Conflict(String),

    /// A per-field update sequence stopped part way through.
    #[error(
        "{failed} update failed after saving {}: {message}",
        field_list(.applied)
    )]
    PartialUpdate {
        applied: Vec<Field>,
        failed: Field,
        message: String,
    },
}

impl SyncError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::Network(message.into())
    }

    /// Whether the backend may have changed even though the call failed.
    pub fn backend_may_have_changed(&self) -> bool {
        matches!(self, Self::PartialUpdate { .. } | Self::Conflict(_))
    }
}

fn field_list(fields: &[Field]) -> String {
    fields
        .iter()
        .map(|field| field.label())
        .collect::<Vec<_>>()
        .join(", ")
}
