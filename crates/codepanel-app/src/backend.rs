// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use crate::error::SyncError;
use crate::ids::RowKey;
use crate::model::{Field, Row, RowFields, RowPatch};

/// Row-oriented CRUD against one backend store.
///
/// Every call is issued once; implementations never retry.
pub trait RowBackend {
    fn fetch_rows(&mut self) -> Result<Vec<Row>, SyncError>;
    fn add_row(&mut self, fields: &RowFields) -> Result<(), SyncError>;
    /// `row` is the snapshot the patch was computed against.
    fn update_row(&mut self, row: &Row, patch: &RowPatch) -> Result<(), SyncError>;
    fn delete_row(&mut self, row: &Row) -> Result<(), SyncError>;
}

impl<B: RowBackend + ?Sized> RowBackend for Box<B> {
    fn fetch_rows(&mut self) -> Result<Vec<Row>, SyncError> {
        (**self).fetch_rows()
    }

    fn add_row(&mut self, fields: &RowFields) -> Result<(), SyncError> {
        (**self).add_row(fields)
    }

    fn update_row(&mut self, row: &Row, patch: &RowPatch) -> Result<(), SyncError> {
        (**self).update_row(row, patch)
    }

    fn delete_row(&mut self, row: &Row) -> Result<(), SyncError> {
        (**self).delete_row(row)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendRequest {
    Fetch,
    Add(RowFields),
    Update { key: RowKey, fields: Vec<Field> },
    Delete(RowKey),
}

/// In-process backend keyed by 1-based position, used for `--demo` and tests.
///
/// Every call is recorded in [`MemoryBackend::requests`]. Queued failures are
/// returned by the next calls instead of touching the rows.
#[derive(Debug, Clone, Default)]
pub struct MemoryBackend {
    rows: Vec<RowFields>,
    requests: Vec<BackendRequest>,
    failures: Vec<SyncError>,
}

impl MemoryBackend {
    pub fn new(rows: Vec<RowFields>) -> Self {
        Self {
            rows,
            requests: Vec::new(),
            failures: Vec::new(),
        }
    }

    pub fn rows(&self) -> &[RowFields] {
        &self.rows
    }

    pub fn requests(&self) -> &[BackendRequest] {
        &self.requests
    }

    pub fn clear_requests(&mut self) {
        self.requests.clear();
    }

    pub fn fail_next(&mut self, error: SyncError) {
        self.failures.push(error);
    }

    fn take_failure(&mut self) -> Result<(), SyncError> {
        if self.failures.is_empty() {
            Ok(())
        } else {
            Err(self.failures.remove(0))
        }
    }

    fn slot(&self, key: &RowKey) -> Result<usize, SyncError> {
        key.position()
            .and_then(|position| usize::try_from(position).ok())
            .and_then(|position| position.checked_sub(1))
            .filter(|slot| *slot < self.rows.len())
            .ok_or_else(|| SyncError::network(format!("{key} does not exist")))
    }
}

impl RowBackend for MemoryBackend {
    fn fetch_rows(&mut self) -> Result<Vec<Row>, SyncError> {
        self.requests.push(BackendRequest::Fetch);
        self.take_failure()?;
        Ok(self
            .rows
            .iter()
            .enumerate()
            .map(|(slot, fields)| {
                let position = u32::try_from(slot + 1).unwrap_or(u32::MAX);
                Row::new(RowKey::Position(position), fields.clone())
            })
            .collect())
    }

    fn add_row(&mut self, fields: &RowFields) -> Result<(), SyncError> {
        self.requests.push(BackendRequest::Add(fields.clone()));
        self.take_failure()?;
        self.rows.push(fields.clone());
        Ok(())
    }

    fn update_row(&mut self, row: &Row, patch: &RowPatch) -> Result<(), SyncError> {
        self.requests.push(BackendRequest::Update {
            key: row.key.clone(),
            fields: patch.fields(),
        });
        self.take_failure()?;
        let slot = self.slot(&row.key)?;
        self.rows[slot] = patch.apply_to(&self.rows[slot]);
        Ok(())
    }

    fn delete_row(&mut self, row: &Row) -> Result<(), SyncError> {
        self.requests.push(BackendRequest::Delete(row.key.clone()));
        self.take_failure()?;
        let slot = self.slot(&row.key)?;
        self.rows.remove(slot);
        Ok(())
    }
}

/// Rows shown by `codepanel --demo`.
pub fn demo_rows() -> Vec<RowFields> {
    vec![
        RowFields::new("SPRING24")
            .with_url_name("Spring Sale")
            .with_color("#4caf50"),
        RowFields::new("VIP-0042")
            .with_url_name("Members Only")
            .with_color("#9c27b0"),
        RowFields::new("LAUNCH")
            .with_url_name("Launch Day")
            .with_color("#ff9800"),
        RowFields::new("1042").with_url_name("Partner").with_color("#2196f3"),
    ]
}
