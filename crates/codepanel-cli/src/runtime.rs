// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use crate::config::Config;
use anyhow::{Context, Result};
use codepanel_app::{MemoryBackend, RowBackend, demo_rows};
use codepanel_db::Store;
use codepanel_server::Server;
use serde_json::Value;
use std::fs;
use std::path::Path;

pub fn open_store(db_path: &Path) -> Result<Store> {
    let store = Store::open(db_path).with_context(|| {
        format!(
            "open database {} -- if this path is wrong, set [server].db_path or CODEPANEL_DB_PATH",
            db_path.display()
        )
    })?;
    store.bootstrap()?;
    Ok(store)
}

pub fn seed_demo(store: &Store) -> Result<()> {
    for fields in demo_rows() {
        let body = serde_json::to_value(&fields).context("encode demo row")?;
        store.append_document(&body)?;
    }
    Ok(())
}

/// Picks the adapter named by the config, or an in-process backend for
/// `--demo`. Returns it with the label shown in the TUI header.
pub fn build_backend(config: &Config, demo: bool) -> Result<(Box<dyn RowBackend>, String)> {
    if demo {
        return Ok((
            Box::new(MemoryBackend::new(demo_rows())),
            "demo (in-memory)".to_owned(),
        ));
    }

    let kind = config.backend_kind()?;
    let base_url = config.backend_base_url()?;
    let backend = codepanel_client::connect(kind, &base_url, config.backend_timeout()?)
        .with_context(|| format!("connect {} backend at {base_url}", kind.as_str()))?;
    Ok((backend, format!("{} {base_url}", kind.as_str())))
}

pub fn bind_server(config: &Config, store: Store) -> Result<Server> {
    Server::bind(config.server_bind(), store, config.server_workers())
}

/// Appends a legacy `data.json` array to the store. Returns how many
/// documents were added.
pub fn import_file(store: &Store, path: &Path) -> Result<usize> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("read import file {}", path.display()))?;
    let data: Value = serde_json::from_str(&raw).with_context(|| {
        format!(
            "parse {} as JSON -- the file must hold an array of objects",
            path.display()
        )
    })?;
    store
        .import_json(&data)
        .with_context(|| format!("import {}", path.display()))
}

pub fn export_json(store: &Store) -> Result<String> {
    serde_json::to_string_pretty(&store.export_json()?).context("encode export")
}

#[cfg(test)]
mod tests {
    use super::{build_backend, export_json, import_file, open_store, seed_demo};
    use crate::config::Config;
    use anyhow::Result;
    use codepanel_app::RowBackend;
    use serde_json::{Value, json};

    #[test]
    fn import_then_export_keeps_documents() -> Result<()> {
        let temp = tempfile::tempdir()?;
        let data = temp.path().join("data.json");
        std::fs::write(
            &data,
            r##"[{"Codes":"A","UrlName":"Alpha","ColorId":"#ffffff"},{"code":"X1","description":"test"}]"##,
        )?;

        let store = open_store(&temp.path().join("codepanel.db"))?;
        assert_eq!(import_file(&store, &data)?, 2);

        let exported: Value = serde_json::from_str(&export_json(&store)?)?;
        assert_eq!(
            exported,
            json!([
                {"Codes": "A", "UrlName": "Alpha", "ColorId": "#ffffff"},
                {"code": "X1", "description": "test"},
            ])
        );
        Ok(())
    }

    #[test]
    fn import_rejects_non_array_file() -> Result<()> {
        let temp = tempfile::tempdir()?;
        let data = temp.path().join("data.json");
        std::fs::write(&data, r#"{"Codes":"A"}"#)?;
        let store = open_store(&temp.path().join("codepanel.db"))?;
        let error = import_file(&store, &data).expect_err("object file should fail");
        assert!(format!("{error:#}").contains("JSON array of objects"));
        assert_eq!(store.document_count()?, 0);
        Ok(())
    }

    #[test]
    fn demo_backend_serves_demo_rows() -> Result<()> {
        let (mut backend, label) = build_backend(&Config::defaults(), true)?;
        assert_eq!(label, "demo (in-memory)");
        assert_eq!(backend.fetch_rows()?.len(), 4);
        Ok(())
    }

    #[test]
    fn configured_backend_is_labelled_with_its_url() -> Result<()> {
        let (_backend, label) = build_backend(&Config::defaults(), false)?;
        assert_eq!(label, "local http://127.0.0.1:3001");
        Ok(())
    }

    #[test]
    fn demo_seed_fills_store() -> Result<()> {
        let temp = tempfile::tempdir()?;
        let store = open_store(&temp.path().join("codepanel.db"))?;
        seed_demo(&store)?;
        assert_eq!(store.document_count()?, 4);
        Ok(())
    }
}
