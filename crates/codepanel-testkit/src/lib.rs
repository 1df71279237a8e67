// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result};
use codepanel_app::{MemoryBackend, RowFields};
use codepanel_db::Store;
use serde_json::Value;
use std::path::PathBuf;

const CAMPAIGNS: [&str; 12] = [
    "Spring Sale",
    "Summer Kickoff",
    "Back To School",
    "Harvest",
    "Holiday Deals",
    "New Year",
    "Members Only",
    "Launch Day",
    "Partner Week",
    "Flash Friday",
    "Loyalty",
    "Open House",
];

const CODE_PREFIXES: [&str; 8] = ["SPR", "SUM", "VIP", "GRP", "LNCH", "PTR", "HOL", "NY"];

const PALETTE: [&str; 10] = [
    "#ffffff", "#4caf50", "#2196f3", "#9c27b0", "#ff9800", "#f44336", "#607d8b", "#00bcd4",
    "#795548", "#ffeb3b",
];

#[derive(Debug, Clone)]
struct DeterministicRng {
    state: u64,
}

impl DeterministicRng {
    fn new(seed: u64) -> Self {
        let mut state = seed ^ 0x9E37_79B9_7F4A_7C15;
        if state == 0 {
            state = 0xA409_3822_299F_31D0;
        }
        Self { state }
    }

    fn next_u64(&mut self) -> u64 {
        self.state = self
            .state
            .wrapping_mul(6_364_136_223_846_793_005)
            .wrapping_add(1_442_695_040_888_963_407);

        let mut x = self.state;
        x ^= x >> 13;
        x ^= x << 7;
        x ^= x >> 17;
        x
    }

    fn int_n(&mut self, n: usize) -> usize {
        if n <= 1 {
            return 0;
        }
        (self.next_u64() % (n as u64)) as usize
    }
}

/// Seeded generator for plausible code rows. Equal seeds give equal rows.
#[derive(Debug, Clone)]
pub struct RowFaker {
    rng: DeterministicRng,
    serial: u32,
}

impl RowFaker {
    pub fn new(seed: u64) -> Self {
        let normalized = if seed == 0 { 1 } else { seed };
        Self {
            rng: DeterministicRng::new(normalized),
            serial: 0,
        }
    }

    /// Codes are unique within one faker because they carry a serial number.
    pub fn row(&mut self) -> RowFields {
        self.serial += 1;
        let prefix = CODE_PREFIXES[self.rng.int_n(CODE_PREFIXES.len())];
        let campaign = CAMPAIGNS[self.rng.int_n(CAMPAIGNS.len())];
        let color = PALETTE[self.rng.int_n(PALETTE.len())];
        RowFields::new(format!("{prefix}-{:04}", self.serial))
            .with_url_name(campaign)
            .with_color(color)
    }

    pub fn rows(&mut self, count: usize) -> Vec<RowFields> {
        (0..count).map(|_| self.row()).collect()
    }
}

pub fn temp_db_path() -> Result<(tempfile::TempDir, PathBuf)> {
    let dir = tempfile::tempdir().context("create temp dir")?;
    let db_path = dir.path().join("codepanel.db");
    Ok((dir, db_path))
}

/// Bootstrapped in-memory store holding `rows` in order.
pub fn seeded_store(rows: &[RowFields]) -> Result<Store> {
    let store = Store::open_memory()?;
    store.bootstrap()?;
    for fields in rows {
        let body = serde_json::to_value(fields).context("encode fixture row")?;
        store.append_document(&body)?;
    }
    Ok(store)
}

pub fn seeded_backend(seed: u64, count: usize) -> MemoryBackend {
    MemoryBackend::new(RowFaker::new(seed).rows(count))
}

/// A `data.json` document in the legacy wire shape.
pub fn legacy_document(codes: &str, url_name: &str, color_id: &str) -> Value {
    serde_json::json!({
        "Codes": codes,
        "UrlName": url_name,
        "ColorId": color_id,
    })
}
