// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

//! HTTP adapters that speak each supported row protocol.
//!
//! Every adapter implements [`RowBackend`]. Requests are sent once with a
//! client-wide timeout; status codes decide success and response bodies are
//! only parsed where rows come back.

mod http;
pub mod local;
pub mod sheet_api;
pub mod sheet_proxy;

use anyhow::{Result, bail};
use codepanel_app::RowBackend;
use std::time::Duration;

pub use local::LocalBackend;
pub use sheet_api::SheetApiBackend;
pub use sheet_proxy::SheetProxyBackend;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    Local,
    SheetProxy,
    SheetApi,
}

impl BackendKind {
    pub const ALL: [Self; 3] = [Self::Local, Self::SheetProxy, Self::SheetApi];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Local => "local",
            Self::SheetProxy => "sheet_proxy",
            Self::SheetApi => "sheet_api",
        }
    }

    pub fn parse(value: &str) -> Result<Self> {
        match value.trim() {
            "local" => Ok(Self::Local),
            "sheet_proxy" => Ok(Self::SheetProxy),
            "sheet_api" => Ok(Self::SheetApi),
            other => bail!(
                "unknown backend kind {other:?} -- use one of: {}",
                Self::ALL.map(Self::as_str).join(", ")
            ),
        }
    }
}

/// Builds the adapter for `kind` rooted at `base_url`.
pub fn connect(
    kind: BackendKind,
    base_url: &str,
    timeout: Duration,
) -> Result<Box<dyn RowBackend>> {
    Ok(match kind {
        BackendKind::Local => Box::new(LocalBackend::new(base_url, timeout)?),
        BackendKind::SheetProxy => Box::new(SheetProxyBackend::new(base_url, timeout)?),
        BackendKind::SheetApi => Box::new(SheetApiBackend::new(base_url, timeout)?),
    })
}
