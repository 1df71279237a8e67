// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

//! Spreadsheet script proxy: every operation is a `GET` with a `func` query
//! parameter, rows are addressed by 1-based sheet position, and edits touch
//! one cell at a time.

use crate::http::{Transport, decode};
use anyhow::Result;
use codepanel_app::{Field, Row, RowBackend, RowFields, RowKey, RowPatch, SyncError};
use reqwest::blocking::Response;
use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct SheetProxyBackend {
    transport: Transport,
}

#[derive(Debug, Deserialize)]
struct SheetResponse {
    data: Vec<SheetRow>,
}

#[derive(Debug, Deserialize)]
struct SheetRow {
    row: u32,
    #[serde(flatten)]
    fields: RowFields,
}

impl SheetProxyBackend {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        Ok(Self {
            transport: Transport::new(base_url, timeout)?,
        })
    }

    fn call(&self, func: &str, params: &[(&str, &str)]) -> Result<Response, SyncError> {
        let mut url = self.transport.base().clone();
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("func", func);
            for (name, value) in params {
                query.append_pair(name, value);
            }
        }
        tracing::debug!(func, "sheet proxy request");
        self.transport.send(self.transport.http().get(url))
    }

    fn position(key: &RowKey) -> Result<String, SyncError> {
        key.position()
            .map(|position| position.to_string())
            .ok_or_else(|| {
                SyncError::validation(format!(
                    "{key} is not a sheet position -- reload rows from the sheet and retry"
                ))
            })
    }
}

impl RowBackend for SheetProxyBackend {
    fn fetch_rows(&mut self) -> Result<Vec<Row>, SyncError> {
        let response = self.call("get", &[])?;
        let parsed: SheetResponse = decode(response, "sheet rows")?;
        Ok(parsed
            .data
            .into_iter()
            .map(|row| Row::new(RowKey::Position(row.row), row.fields))
            .collect())
    }

    fn add_row(&mut self, fields: &RowFields) -> Result<(), SyncError> {
        let mut params = vec![(Field::Codes.wire_name(), fields.codes.as_str())];
        for field in [Field::UrlName, Field::ColorId] {
            let value = fields.get(field);
            if !value.is_empty() {
                params.push((field.wire_name(), value));
            }
        }
        self.call("add", &params)?;
        Ok(())
    }

    /// One `edit` call per changed column, strictly in column order. The
    /// first failure ends the sequence; cells already written stay written.
    fn update_row(&mut self, row: &Row, patch: &RowPatch) -> Result<(), SyncError> {
        if patch.is_empty() {
            return Ok(());
        }
        let position = Self::position(&row.key)?;

        let mut applied = Vec::new();
        for change in patch.changes() {
            let column = change.field.column().to_string();
            let result = self.call(
                "edit",
                &[
                    ("row", position.as_str()),
                    ("col", column.as_str()),
                    ("newValue", change.value.as_str()),
                ],
            );
            if let Err(error) = result {
                if applied.is_empty() {
                    return Err(error);
                }
                tracing::warn!(
                    row = %position,
                    failed = %change.field,
                    applied = applied.len(),
                    "sheet edit stopped part way"
                );
                return Err(SyncError::PartialUpdate {
                    applied,
                    failed: change.field,
                    message: error.to_string(),
                });
            }
            applied.push(change.field);
        }
        Ok(())
    }

    fn delete_row(&mut self, row: &Row) -> Result<(), SyncError> {
        let position = Self::position(&row.key)?;
        self.call("delete", &[("row", position.as_str())])?;
        Ok(())
    }
}
