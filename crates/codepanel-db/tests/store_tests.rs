// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::Result;
use codepanel_db::{MutationError, Store, validate_db_path};
use codepanel_testkit::{RowFaker, legacy_document, seeded_store, temp_db_path};
use serde_json::json;

#[test]
fn validate_db_path_rejects_uri_forms() {
    assert!(validate_db_path("").is_err());
    assert!(validate_db_path("file:test.db").is_err());
    assert!(validate_db_path("https://example.com/db.sqlite").is_err());
    assert!(validate_db_path("db.sqlite?mode=ro").is_err());
    assert!(validate_db_path(":memory:").is_ok());
    assert!(validate_db_path("/tmp/codepanel.db").is_ok());
}

#[test]
fn documents_are_returned_exactly_as_stored() -> Result<()> {
    let store = Store::open_memory()?;
    store.bootstrap()?;

    let body = json!({"code": "X1", "description": "test", "nested": {"n": [1, 2]}});
    let index = store.append_document(&body)?;
    assert_eq!(index, 0);

    let documents = store.list_documents()?;
    assert_eq!(documents.len(), 1);
    assert_eq!(documents[0].body, body);
    assert_eq!(documents[0].version, 1);
    assert_eq!(store.export_json()?, json!([body]));
    Ok(())
}

#[test]
fn append_returns_next_index() -> Result<()> {
    let store = seeded_store(&RowFaker::new(1).rows(3))?;
    let index = store.append_document(&legacy_document("NEW", "New", "#ffffff"))?;
    assert_eq!(index, 3);
    assert_eq!(store.document_count()?, 4);
    Ok(())
}

#[test]
fn replace_bumps_version_and_keeps_position() -> Result<()> {
    let store = seeded_store(&RowFaker::new(2).rows(3))?;
    let replacement = legacy_document("EDITED", "Edited", "#000000");

    let version = store.replace_document(1, Some(1), &replacement)?;
    assert_eq!(version, 2);

    let documents = store.list_documents()?;
    assert_eq!(documents[1].body, replacement);
    assert_eq!(documents[1].version, 2);
    assert_eq!(documents[0].version, 1);
    assert!(documents[1].updated_at >= documents[1].created_at);
    Ok(())
}

#[test]
fn replace_with_stale_version_is_refused() -> Result<()> {
    let store = seeded_store(&RowFaker::new(3).rows(2))?;
    store.replace_document(0, Some(1), &legacy_document("A", "A", "#111111"))?;

    let error = store
        .replace_document(0, Some(1), &legacy_document("B", "B", "#222222"))
        .expect_err("stale version should be refused");
    assert_eq!(
        error.downcast_ref::<MutationError>(),
        Some(&MutationError::VersionMismatch {
            index: 0,
            expected: 1,
            actual: 2,
        })
    );
    assert_eq!(store.list_documents()?[0].body["Codes"], "A");
    Ok(())
}

#[test]
fn replace_without_version_overwrites() -> Result<()> {
    let store = seeded_store(&RowFaker::new(4).rows(1))?;
    store.replace_document(0, None, &legacy_document("A", "A", "#111111"))?;
    let version = store.replace_document(0, None, &legacy_document("B", "B", "#222222"))?;
    assert_eq!(version, 3);
    Ok(())
}

#[test]
fn out_of_range_index_is_not_found() -> Result<()> {
    let store = seeded_store(&RowFaker::new(5).rows(2))?;
    let error = store
        .delete_document(2, None)
        .expect_err("index 2 should be out of range");
    assert_eq!(
        error.downcast_ref::<MutationError>(),
        Some(&MutationError::NotFound { index: 2, len: 2 })
    );
    assert_eq!(store.document_count()?, 2);
    Ok(())
}

#[test]
fn delete_shifts_later_indices() -> Result<()> {
    let rows = RowFaker::new(6).rows(3);
    let store = seeded_store(&rows)?;

    store.delete_document(0, Some(1))?;

    let documents = store.list_documents()?;
    assert_eq!(documents.len(), 2);
    assert_eq!(documents[0].index, 0);
    assert_eq!(documents[0].body["Codes"], rows[1].codes);
    assert_eq!(documents[1].body["Codes"], rows[2].codes);
    Ok(())
}

#[test]
fn stale_version_catches_shifted_index() -> Result<()> {
    let rows = RowFaker::new(7).rows(3);
    let store = seeded_store(&rows)?;
    store.replace_document(2, Some(1), &legacy_document("MOVED", "Moved", "#abcdef"))?;

    // A client still holds index 1 at version 1. Another writer removes
    // index 0, so the edited row formerly at 2 is now at 1.
    store.delete_document(0, None)?;

    let error = store
        .delete_document(1, Some(1))
        .expect_err("index 1 now holds a row at version 2");
    assert!(matches!(
        error.downcast_ref::<MutationError>(),
        Some(MutationError::VersionMismatch { actual: 2, .. })
    ));
    assert_eq!(store.document_count()?, 2);
    Ok(())
}

#[test]
fn import_appends_whole_array_or_nothing() -> Result<()> {
    let store = seeded_store(&RowFaker::new(8).rows(1))?;

    let imported = store.import_json(&json!([
        legacy_document("A", "Alpha", "#ffffff"),
        legacy_document("B", "Beta", "#000000"),
    ]))?;
    assert_eq!(imported, 2);
    assert_eq!(store.document_count()?, 3);

    let error = store
        .import_json(&json!([legacy_document("C", "Gamma", "#ffffff"), "not an object"]))
        .expect_err("mixed array should fail");
    assert!(format!("{error:#}").contains("import item 1"));
    assert_eq!(store.document_count()?, 3);

    assert!(store.import_json(&json!({"Codes": "A"})).is_err());
    Ok(())
}

#[test]
fn documents_survive_reopen() -> Result<()> {
    let (_dir, path) = temp_db_path()?;
    {
        let store = Store::open(&path)?;
        store.bootstrap()?;
        store.append_document(&legacy_document("KEEP", "Keep", "#ffffff"))?;
    }

    let store = Store::open(&path)?;
    store.bootstrap()?;
    let documents = store.list_documents()?;
    assert_eq!(documents.len(), 1);
    assert_eq!(documents[0].body["Codes"], "KEEP");
    Ok(())
}
