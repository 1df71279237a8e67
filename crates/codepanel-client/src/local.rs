// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

//! The bundled JSON REST server (`codepanel serve`).
//!
//! Rows are addressed by 0-based index. Edits send the whole merged row with
//! the version it was loaded at, so the server can refuse stale writes.

use crate::http::{Transport, decode, ensure_success};
use anyhow::Result;
use codepanel_app::{Row, RowBackend, RowFields, RowKey, RowPatch, SyncError};
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::{Map, Value, json};
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct LocalBackend {
    transport: Transport,
}

#[derive(Debug, Deserialize)]
struct VersionedRow {
    index: usize,
    version: u64,
    data: RowFields,
}

impl LocalBackend {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        Ok(Self {
            transport: Transport::new(base_url, timeout)?,
        })
    }

    fn index(row: &Row) -> Result<usize, SyncError> {
        row.key.index().ok_or_else(|| {
            SyncError::validation(format!(
                "{} is not a document index -- reload rows from the server and retry",
                row.key
            ))
        })
    }

    /// Servers without `/api/rows` only expose the unversioned array.
    fn fetch_unversioned(&self) -> Result<Vec<Row>, SyncError> {
        let request = self
            .transport
            .http()
            .get(self.transport.endpoint(&["api", "data"]));
        let response = self.transport.send(request)?;
        let documents: Vec<RowFields> = decode(response, "documents")?;
        Ok(documents
            .into_iter()
            .enumerate()
            .map(|(index, fields)| Row::new(RowKey::Index(index), fields))
            .collect())
    }
}

impl RowBackend for LocalBackend {
    fn fetch_rows(&mut self) -> Result<Vec<Row>, SyncError> {
        let request = self
            .transport
            .http()
            .get(self.transport.endpoint(&["api", "rows"]));
        let response = self.transport.execute(request)?;
        if response.status() == StatusCode::NOT_FOUND {
            tracing::debug!("server has no /api/rows, falling back to /api/data");
            return self.fetch_unversioned();
        }

        let rows: Vec<VersionedRow> = decode(ensure_success(response)?, "versioned rows")?;
        Ok(rows
            .into_iter()
            .map(|row| Row::new(RowKey::Index(row.index), row.data).with_version(row.version))
            .collect())
    }

    fn add_row(&mut self, fields: &RowFields) -> Result<(), SyncError> {
        let request = self
            .transport
            .http()
            .post(self.transport.endpoint(&["api", "add"]))
            .json(fields);
        self.transport.send(request)?;
        Ok(())
    }

    fn update_row(&mut self, row: &Row, patch: &RowPatch) -> Result<(), SyncError> {
        if patch.is_empty() {
            return Ok(());
        }
        let index = Self::index(row)?;
        let merged = patch.apply_to(&row.fields);

        let mut body = match serde_json::to_value(&merged) {
            Ok(Value::Object(map)) => map,
            _ => Map::new(),
        };
        body.insert("index".to_owned(), json!(index));
        if let Some(version) = row.version {
            body.insert("version".to_owned(), json!(version));
        }

        let request = self
            .transport
            .http()
            .put(self.transport.endpoint(&["api", "edit"]))
            .json(&body);
        self.transport.send(request)?;
        Ok(())
    }

    fn delete_row(&mut self, row: &Row) -> Result<(), SyncError> {
        let index = Self::index(row)?;
        let mut body = json!({ "index": index });
        if let Some(version) = row.version {
            body["version"] = json!(version);
        }

        let request = self
            .transport
            .http()
            .delete(self.transport.endpoint(&["api", "delete"]))
            .json(&body);
        self.transport.send(request)?;
        Ok(())
    }
}
