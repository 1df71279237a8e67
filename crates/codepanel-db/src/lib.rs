// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result, anyhow, bail};
use rusqlite::{Connection, OptionalExtension, params};
use serde_json::Value;
use std::collections::BTreeSet;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

pub const APP_NAME: &str = "codepanel";

const REQUIRED_COLUMNS: &[&str] = &["id", "body", "version", "created_at", "updated_at"];

/// A stored document and its position in the list.
///
/// The position is derived from insertion order, so deleting a document
/// shifts every later index down by one. Versions start at 1 and grow by one
/// on every replace.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredDocument {
    pub index: usize,
    pub version: u64,
    pub body: Value,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

/// Why a mutation was refused. Returned inside `anyhow::Error`; callers that
/// need to map it (the REST server) use `downcast_ref`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MutationError {
    #[error("document body must be a JSON object")]
    NotAnObject,
    #[error("index {index} is out of range -- the store holds {len} documents")]
    NotFound { index: usize, len: usize },
    #[error("document {index} is at version {actual}, not {expected} -- reload and retry")]
    VersionMismatch {
        index: usize,
        expected: u64,
        actual: u64,
    },
}

pub struct Store {
    conn: Connection,
}

impl Store {
    pub fn open(path: &Path) -> Result<Self> {
        let printable = path.to_string_lossy().to_string();
        validate_db_path(&printable)?;
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)
                .with_context(|| format!("create database directory {}", parent.display()))?;
        }
        let conn = Connection::open(path)
            .with_context(|| format!("open database at {}", path.display()))?;
        configure_connection(&conn)?;
        Ok(Self { conn })
    }

    pub fn open_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("open in-memory database")?;
        configure_connection(&conn)?;
        Ok(Self { conn })
    }

    pub fn raw_connection(&self) -> &Connection {
        &self.conn
    }

    pub fn bootstrap(&self) -> Result<()> {
        if table_exists(&self.conn, "documents")? {
            validate_schema(&self.conn)?;
        } else {
            self.conn
                .execute_batch(include_str!("sql/schema.sql"))
                .context("create schema")?;
        }
        Ok(())
    }

    pub fn document_count(&self) -> Result<usize> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM documents", [], |row| row.get(0))
            .context("count documents")?;
        usize::try_from(count).context("document count out of range")
    }

    pub fn list_documents(&self) -> Result<Vec<StoredDocument>> {
        let mut stmt = self
            .conn
            .prepare(
                "
                SELECT body, version, created_at, updated_at
                FROM documents
                ORDER BY id ASC
                ",
            )
            .context("prepare documents query")?;
        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, i64>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                ))
            })
            .context("query documents")?;

        let mut documents = Vec::new();
        for (index, row) in rows.enumerate() {
            let (body_raw, version, created_at_raw, updated_at_raw) =
                row.context("read document row")?;
            documents.push(StoredDocument {
                index,
                version: u64::try_from(version)
                    .with_context(|| format!("document {index} has negative version"))?,
                body: serde_json::from_str(&body_raw)
                    .with_context(|| format!("decode document {index}"))?,
                created_at: parse_datetime(&created_at_raw)?,
                updated_at: parse_datetime(&updated_at_raw)?,
            });
        }
        Ok(documents)
    }

    /// Returns the bodies alone, in order, as the legacy array format.
    pub fn export_json(&self) -> Result<Value> {
        Ok(Value::Array(
            self.list_documents()?
                .into_iter()
                .map(|document| document.body)
                .collect(),
        ))
    }

    pub fn append_document(&self, body: &Value) -> Result<usize> {
        let encoded = encode_body(body)?;
        let now = now_rfc3339()?;
        let tx = self
            .conn
            .unchecked_transaction()
            .context("begin append transaction")?;
        tx.execute(
            "INSERT INTO documents (body, version, created_at, updated_at) VALUES (?, 1, ?, ?)",
            params![encoded, now, now],
        )
        .context("insert document")?;
        let count: i64 = tx
            .query_row("SELECT COUNT(*) FROM documents", [], |row| row.get(0))
            .context("count documents")?;
        tx.commit().context("commit append")?;
        let index = usize::try_from(count - 1).context("document index out of range")?;
        Ok(index)
    }

    /// Replaces the body at `index` and returns the new version. With
    /// `expected_version` set, a stale version is refused instead of
    /// overwritten.
    pub fn replace_document(
        &self,
        index: usize,
        expected_version: Option<u64>,
        body: &Value,
    ) -> Result<u64> {
        let encoded = encode_body(body)?;
        let now = now_rfc3339()?;
        let tx = self
            .conn
            .unchecked_transaction()
            .context("begin replace transaction")?;
        let (id, version) = locate(&tx, index, expected_version)?;
        let next_version = version + 1;
        tx.execute(
            "UPDATE documents SET body = ?, version = ?, updated_at = ? WHERE id = ?",
            params![encoded, next_version as i64, now, id],
        )
        .context("update document")?;
        tx.commit().context("commit replace")?;
        Ok(next_version)
    }

    pub fn delete_document(&self, index: usize, expected_version: Option<u64>) -> Result<()> {
        let tx = self
            .conn
            .unchecked_transaction()
            .context("begin delete transaction")?;
        let (id, _) = locate(&tx, index, expected_version)?;
        tx.execute("DELETE FROM documents WHERE id = ?", params![id])
            .context("delete document")?;
        tx.commit().context("commit delete")?;
        Ok(())
    }

    /// Appends every object in a legacy `data.json` array in one transaction.
    pub fn import_json(&self, data: &Value) -> Result<usize> {
        let Value::Array(items) = data else {
            bail!("import data must be a JSON array of objects");
        };
        let now = now_rfc3339()?;
        let tx = self
            .conn
            .unchecked_transaction()
            .context("begin import transaction")?;
        for (position, item) in items.iter().enumerate() {
            let encoded = encode_body(item)
                .with_context(|| format!("import item {position} is not a JSON object"))?;
            tx.execute(
                "INSERT INTO documents (body, version, created_at, updated_at) VALUES (?, 1, ?, ?)",
                params![encoded, now, now],
            )
            .with_context(|| format!("insert import item {position}"))?;
        }
        tx.commit().context("commit import")?;
        Ok(items.len())
    }
}

pub fn default_db_path() -> Result<PathBuf> {
    if let Some(override_path) = env::var_os("CODEPANEL_DB_PATH") {
        return Ok(PathBuf::from(override_path));
    }

    let data_root = dirs::data_local_dir().ok_or_else(|| {
        anyhow!("cannot resolve data directory; set CODEPANEL_DB_PATH to a writable database path")
    })?;

    let app_dir = data_root.join(APP_NAME);
    fs::create_dir_all(&app_dir)
        .with_context(|| format!("create data directory {}", app_dir.display()))?;
    Ok(app_dir.join("codepanel.db"))
}

pub fn validate_db_path(path: &str) -> Result<()> {
    if path.is_empty() {
        bail!("database path must not be empty");
    }
    if path == ":memory:" {
        return Ok(());
    }

    if let Some(index) = path.find("://")
        && index > 0
    {
        let scheme = &path[..index];
        if scheme.chars().all(char::is_alphabetic) {
            bail!(
                "database path {path:?} looks like a URI ({scheme}://); pass a filesystem path instead"
            );
        }
    }

    if path.starts_with("file:") {
        bail!("database path {path:?} uses file: URI syntax; pass a plain filesystem path");
    }

    if path.contains('?') {
        bail!(
            "database path {path:?} contains '?'; remove query parameters and use a plain file path"
        );
    }

    Ok(())
}

fn locate(
    conn: &Connection,
    index: usize,
    expected_version: Option<u64>,
) -> Result<(i64, u64)> {
    let offset = i64::try_from(index).context("document index out of range")?;
    let found = conn
        .query_row(
            "SELECT id, version FROM documents ORDER BY id ASC LIMIT 1 OFFSET ?",
            params![offset],
            |row| Ok((row.get::<_, i64>(0)?, row.get::<_, i64>(1)?)),
        )
        .optional()
        .context("locate document")?;

    let Some((id, version)) = found else {
        let len: i64 = conn
            .query_row("SELECT COUNT(*) FROM documents", [], |row| row.get(0))
            .context("count documents")?;
        return Err(MutationError::NotFound {
            index,
            len: usize::try_from(len).unwrap_or_default(),
        }
        .into());
    };

    let version = u64::try_from(version).context("document version out of range")?;
    if let Some(expected) = expected_version
        && expected != version
    {
        return Err(MutationError::VersionMismatch {
            index,
            expected,
            actual: version,
        }
        .into());
    }
    Ok((id, version))
}

fn encode_body(body: &Value) -> Result<String> {
    if !body.is_object() {
        return Err(MutationError::NotAnObject.into());
    }
    serde_json::to_string(body).context("encode document body")
}

fn validate_schema(conn: &Connection) -> Result<()> {
    let columns = table_columns(conn, "documents")?;
    let missing: Vec<&str> = REQUIRED_COLUMNS
        .iter()
        .copied()
        .filter(|column| !columns.contains(*column))
        .collect();
    if !missing.is_empty() {
        bail!(
            "table `documents` is missing required columns: {}; point the server at a codepanel database",
            missing.join(", ")
        );
    }
    Ok(())
}

fn table_exists(conn: &Connection, table: &str) -> Result<bool> {
    let exists = conn
        .query_row(
            "
            SELECT EXISTS(
              SELECT 1
              FROM sqlite_master
              WHERE type = 'table' AND name = ?
            )
            ",
            params![table],
            |row| row.get::<_, i64>(0),
        )
        .with_context(|| format!("check table existence for {table}"))?;
    Ok(exists == 1)
}

fn table_columns(conn: &Connection, table: &str) -> Result<BTreeSet<String>> {
    let mut stmt = conn
        .prepare(&format!("PRAGMA table_info({table})"))
        .with_context(|| format!("inspect columns for {table}"))?;
    let rows = stmt
        .query_map([], |row| row.get::<_, String>(1))
        .with_context(|| format!("query column info for {table}"))?;
    rows.collect::<rusqlite::Result<BTreeSet<_>>>()
        .with_context(|| format!("collect column info for {table}"))
}

fn configure_connection(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        PRAGMA journal_mode = WAL;
        PRAGMA synchronous = NORMAL;
        PRAGMA busy_timeout = 5000;
        ",
    )
    .context("configure sqlite pragmas")
}

fn now_rfc3339() -> Result<String> {
    OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .context("format current timestamp")
}

fn parse_datetime(raw: &str) -> Result<OffsetDateTime> {
    OffsetDateTime::parse(raw, &Rfc3339).with_context(|| format!("parse timestamp {raw:?}"))
}
