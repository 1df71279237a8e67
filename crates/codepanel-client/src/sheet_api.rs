// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

//! Sheet-as-API service: plain JSON over REST, rows addressed by their
//! `Codes` value.

use crate::http::{Transport, decode};
use anyhow::Result;
use codepanel_app::{Row, RowBackend, RowFields, RowKey, RowPatch, SyncError};
use serde::Serialize;
use serde_json::{Map, Value};
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct SheetApiBackend {
    transport: Transport,
}

#[derive(Serialize)]
struct Envelope<T> {
    data: T,
}

impl SheetApiBackend {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        Ok(Self {
            transport: Transport::new(base_url, timeout)?,
        })
    }

    fn code<'a>(row: &'a Row) -> Result<&'a str, SyncError> {
        row.key.code().ok_or_else(|| {
            SyncError::validation(format!(
                "{} has no code key -- reload rows from the sheet and retry",
                row.key
            ))
        })
    }
}

impl RowBackend for SheetApiBackend {
    fn fetch_rows(&mut self) -> Result<Vec<Row>, SyncError> {
        let request = self.transport.http().get(self.transport.base().clone());
        let response = self.transport.send(request)?;
        let rows: Vec<RowFields> = decode(response, "sheet rows")?;
        Ok(rows
            .into_iter()
            .map(|fields| Row::new(RowKey::Code(fields.codes.clone()), fields))
            .collect())
    }

    fn add_row(&mut self, fields: &RowFields) -> Result<(), SyncError> {
        let request = self
            .transport
            .http()
            .post(self.transport.base().clone())
            .json(&Envelope { data: [fields] });
        self.transport.send(request)?;
        Ok(())
    }

    /// All changed fields go out in a single `PATCH`.
    fn update_row(&mut self, row: &Row, patch: &RowPatch) -> Result<(), SyncError> {
        if patch.is_empty() {
            return Ok(());
        }
        let code = Self::code(row)?;
        let data: Map<String, Value> = patch
            .changes()
            .iter()
            .map(|change| {
                (
                    change.field.wire_name().to_owned(),
                    Value::String(change.value.clone()),
                )
            })
            .collect();

        let request = self
            .transport
            .http()
            .patch(self.transport.endpoint(&["Codes", code]))
            .json(&Envelope { data });
        self.transport.send(request)?;
        Ok(())
    }

    fn delete_row(&mut self, row: &Row) -> Result<(), SyncError> {
        let code = Self::code(row)?;
        let request = self
            .transport
            .http()
            .delete(self.transport.endpoint(&["Codes", code]));
        self.transport.send(request)?;
        Ok(())
    }
}
