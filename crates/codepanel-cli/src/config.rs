// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result, anyhow, bail};
use codepanel_app::{DEFAULT_COLOR, DEFAULT_LINK_BASE, FormProfile, PanelSettings, parse_hex_color};
use codepanel_client::BackendKind;
use serde::Deserialize;
use std::env;
use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

const CONFIG_VERSION: i64 = 1;
const DEFAULT_TIMEOUT: &str = "10s";
const MAX_WORKERS: i64 = 64;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    pub version: i64,
    #[serde(default)]
    pub backend: Backend,
    #[serde(default)]
    pub panel: Panel,
    #[serde(default)]
    pub server: Server,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Backend {
    pub kind: Option<String>,
    pub base_url: Option<String>,
    pub timeout: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Panel {
    pub require_url_name: Option<bool>,
    pub link_base: Option<String>,
    pub default_color: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Server {
    pub bind: Option<String>,
    pub db_path: Option<String>,
    pub workers: Option<i64>,
}

impl Config {
    pub fn defaults() -> Self {
        Self {
            version: CONFIG_VERSION,
            ..Self::default()
        }
    }

    pub fn default_path() -> Result<PathBuf> {
        if let Some(path) = env::var_os("CODEPANEL_CONFIG_PATH") {
            return Ok(PathBuf::from(path));
        }

        let config_root = dirs::config_dir().ok_or_else(|| {
            anyhow!("cannot resolve config directory; set CODEPANEL_CONFIG_PATH to the config file")
        })?;

        let app_dir = config_root.join(codepanel_db::APP_NAME);
        fs::create_dir_all(&app_dir)
            .with_context(|| format!("create config directory {}", app_dir.display()))?;
        Ok(app_dir.join("config.toml"))
    }

    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::defaults());
        }

        let raw = fs::read_to_string(path)
            .with_context(|| format!("read config file {}", path.display()))?;
        let value: toml::Value = toml::from_str(&raw)
            .with_context(|| format!("parse TOML config {}", path.display()))?;

        let version = value
            .get("version")
            .and_then(toml::Value::as_integer)
            .ok_or_else(|| {
                anyhow!(
                    "config file {} has no version. Add `version = 1` and put values under [backend], [panel], and [server]",
                    path.display()
                )
            })?;

        if version != CONFIG_VERSION {
            bail!(
                "unsupported config version {} in {}; expected version = 1",
                version,
                path.display()
            );
        }

        let config: Config = value
            .try_into()
            .with_context(|| format!("decode config {}", path.display()))?;
        config.validate(path)?;
        Ok(config)
    }

    fn validate(&self, path: &Path) -> Result<()> {
        if let Some(kind) = &self.backend.kind {
            BackendKind::parse(kind)
                .with_context(|| format!("backend.kind in {}", path.display()))?;
        }

        if let Some(base_url) = &self.backend.base_url {
            validate_http_url(base_url)
                .with_context(|| format!("backend.base_url in {}", path.display()))?;
        }

        if let Some(timeout) = &self.backend.timeout {
            let parsed = parse_duration(timeout)?;
            if parsed <= Duration::ZERO {
                bail!(
                    "backend.timeout in {} must be positive, got {}",
                    path.display(),
                    timeout
                );
            }
        }

        if let Some(link_base) = &self.panel.link_base {
            validate_http_url(link_base)
                .with_context(|| format!("panel.link_base in {}", path.display()))?;
        }

        if let Some(color) = &self.panel.default_color
            && parse_hex_color(color).is_none()
        {
            bail!(
                "panel.default_color in {} must look like #rrggbb, got {:?}",
                path.display(),
                color
            );
        }

        if let Some(bind) = &self.server.bind {
            bind.parse::<SocketAddr>().with_context(|| {
                format!(
                    "server.bind in {} must be an address like 127.0.0.1:3001, got {:?}",
                    path.display(),
                    bind
                )
            })?;
        }

        if let Some(db_path) = &self.server.db_path {
            codepanel_db::validate_db_path(db_path)?;
        }

        if let Some(workers) = self.server.workers
            && !(1..=MAX_WORKERS).contains(&workers)
        {
            bail!(
                "server.workers in {} must be between 1 and {}, got {}",
                path.display(),
                MAX_WORKERS,
                workers
            );
        }

        Ok(())
    }

    pub fn backend_kind(&self) -> Result<BackendKind> {
        match &self.backend.kind {
            Some(kind) => BackendKind::parse(kind),
            None => Ok(BackendKind::Local),
        }
    }

    /// Falls back to the bundled server's address for the local backend.
    pub fn backend_base_url(&self) -> Result<String> {
        if let Some(base_url) = &self.backend.base_url {
            return Ok(base_url.trim_end_matches('/').to_owned());
        }
        match self.backend_kind()? {
            BackendKind::Local => Ok(format!("http://{}", self.server_bind())),
            kind => bail!(
                "backend.base_url is required for the {} backend -- set it to the service endpoint",
                kind.as_str()
            ),
        }
    }

    pub fn backend_timeout(&self) -> Result<Duration> {
        parse_duration(self.backend.timeout.as_deref().unwrap_or(DEFAULT_TIMEOUT))
    }

    pub fn panel_settings(&self) -> PanelSettings {
        let profile = if self.panel.require_url_name.unwrap_or(true) {
            FormProfile::Rich
        } else {
            FormProfile::Simple
        };
        PanelSettings {
            profile,
            link_base: self
                .panel
                .link_base
                .as_deref()
                .unwrap_or(DEFAULT_LINK_BASE)
                .trim_end_matches('/')
                .to_owned(),
            default_color: self
                .panel
                .default_color
                .clone()
                .unwrap_or_else(|| DEFAULT_COLOR.to_owned()),
        }
    }

    pub fn server_bind(&self) -> &str {
        self.server
            .bind
            .as_deref()
            .unwrap_or(codepanel_server::DEFAULT_BIND)
    }

    pub fn server_workers(&self) -> usize {
        self.server
            .workers
            .and_then(|workers| usize::try_from(workers).ok())
            .unwrap_or(codepanel_server::DEFAULT_WORKERS)
    }

    pub fn db_path(&self) -> Result<PathBuf> {
        match &self.server.db_path {
            Some(path) => Ok(PathBuf::from(path)),
            None => codepanel_db::default_db_path(),
        }
    }

    pub fn example_config(path: &Path) -> String {
        format!(
            "# codepanel config\n# Place this file at: {}\n\nversion = 1\n\n[backend]\n# local | sheet_proxy | sheet_api\nkind = \"local\"\n# Optional for local; defaults to http://<server.bind>\n# base_url = \"https://script.google.com/macros/s/<id>/exec\"\ntimeout = \"{}\"\n\n[panel]\n# false shows only the code field in the add/edit forms\nrequire_url_name = true\nlink_base = \"{}\"\ndefault_color = \"{}\"\n\n[server]\nbind = \"{}\"\n# Optional. Default is platform data dir (for example ~/.local/share/codepanel/codepanel.db)\n# db_path = \"/absolute/path/to/codepanel.db\"\nworkers = {}\n",
            path.display(),
            DEFAULT_TIMEOUT,
            DEFAULT_LINK_BASE,
            DEFAULT_COLOR,
            codepanel_server::DEFAULT_BIND,
            codepanel_server::DEFAULT_WORKERS,
        )
    }
}

fn validate_http_url(raw: &str) -> Result<()> {
    let url = Url::parse(raw).with_context(|| format!("{raw:?} is not a valid URL"))?;
    if !matches!(url.scheme(), "http" | "https") {
        bail!("{raw:?} must use http or https");
    }
    Ok(())
}

fn parse_duration(raw: &str) -> Result<Duration> {
    if let Some(value) = raw.strip_suffix("ms") {
        let millis: u64 = value
            .parse()
            .with_context(|| format!("invalid timeout duration {raw:?}"))?;
        return Ok(Duration::from_millis(millis));
    }
    if let Some(value) = raw.strip_suffix('s') {
        let secs: u64 = value
            .parse()
            .with_context(|| format!("invalid timeout duration {raw:?}"))?;
        return Ok(Duration::from_secs(secs));
    }
    if let Some(value) = raw.strip_suffix('m') {
        let mins: u64 = value
            .parse()
            .with_context(|| format!("invalid timeout duration {raw:?}"))?;
        return Ok(Duration::from_secs(mins * 60));
    }

    bail!("invalid duration {raw:?}; use one of: <N>ms, <N>s, <N>m (for example 500ms or 5s)")
}

#[cfg(test)]
mod tests {
    use super::{Config, parse_duration};
    use anyhow::Result;
    use codepanel_app::FormProfile;
    use codepanel_client::BackendKind;
    use std::path::PathBuf;
    use std::sync::{Mutex, OnceLock};
    use std::time::Duration;

    fn write_config(content: &str) -> Result<(tempfile::TempDir, PathBuf)> {
        let temp = tempfile::tempdir()?;
        let path = temp.path().join("config.toml");
        std::fs::write(&path, content)?;
        Ok((temp, path))
    }

    fn env_lock() -> std::sync::MutexGuard<'static, ()> {
        static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();
        match ENV_LOCK.get_or_init(|| Mutex::new(())).lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    #[test]
    fn missing_config_uses_defaults() -> Result<()> {
        let temp = tempfile::tempdir()?;
        let config = Config::load(&temp.path().join("missing.toml"))?;
        assert_eq!(config.version, 1);
        assert_eq!(config.backend_kind()?, BackendKind::Local);
        assert_eq!(config.backend_base_url()?, "http://127.0.0.1:3001");
        assert_eq!(config.backend_timeout()?, Duration::from_secs(10));
        let settings = config.panel_settings();
        assert_eq!(settings.profile, FormProfile::Rich);
        assert_eq!(settings.link_base, "https://us-now.vercel.app");
        assert_eq!(settings.default_color, "#ffffff");
        Ok(())
    }

    #[test]
    fn unversioned_config_is_rejected_with_actionable_message() -> Result<()> {
        let (_temp, path) = write_config("[backend]\nkind = \"local\"\n")?;
        let error = Config::load(&path).expect_err("unversioned config should fail");
        let message = error.to_string();
        assert!(message.contains("version = 1"));
        assert!(message.contains("[backend], [panel], and [server]"));
        Ok(())
    }

    #[test]
    fn unsupported_config_version_is_rejected() -> Result<()> {
        let (_temp, path) = write_config("version = 2\n")?;
        let error = Config::load(&path).expect_err("v2 config should fail");
        assert!(error.to_string().contains("unsupported config version 2"));
        Ok(())
    }

    #[test]
    fn malformed_config_returns_parse_error() -> Result<()> {
        let (_temp, path) = write_config("{{not toml")?;
        let error = Config::load(&path).expect_err("malformed config should fail");
        assert!(error.to_string().contains("parse TOML config"));
        Ok(())
    }

    #[test]
    fn sheet_backend_config_parses() -> Result<()> {
        let (_temp, path) = write_config(
            "version = 1\n[backend]\nkind = \"sheet_proxy\"\nbase_url = \"https://script.example/exec/\"\ntimeout = \"500ms\"\n[panel]\nrequire_url_name = false\ndefault_color = \"#000000\"\n",
        )?;
        let config = Config::load(&path)?;
        assert_eq!(config.backend_kind()?, BackendKind::SheetProxy);
        assert_eq!(config.backend_base_url()?, "https://script.example/exec");
        assert_eq!(config.backend_timeout()?, Duration::from_millis(500));
        let settings = config.panel_settings();
        assert_eq!(settings.profile, FormProfile::Simple);
        assert_eq!(settings.default_color, "#000000");
        Ok(())
    }

    #[test]
    fn remote_backend_requires_base_url() -> Result<()> {
        let (_temp, path) = write_config("version = 1\n[backend]\nkind = \"sheet_api\"\n")?;
        let config = Config::load(&path)?;
        let error = config
            .backend_base_url()
            .expect_err("sheet_api without base_url should fail");
        assert!(error.to_string().contains("backend.base_url is required"));
        Ok(())
    }

    #[test]
    fn invalid_values_name_the_key() -> Result<()> {
        let cases = [
            ("[backend]\nkind = \"excel\"\n", "backend.kind"),
            ("[backend]\nbase_url = \"ftp://x\"\n", "backend.base_url"),
            ("[backend]\ntimeout = \"0s\"\n", "must be positive"),
            ("[panel]\nlink_base = \"nope\"\n", "panel.link_base"),
            ("[panel]\ndefault_color = \"white\"\n", "panel.default_color"),
            ("[server]\nbind = \"localhost\"\n", "server.bind"),
            ("[server]\nworkers = 0\n", "server.workers"),
            ("[server]\ndb_path = \"file:x.db\"\n", "file: URI"),
        ];
        for (body, expected) in cases {
            let (_temp, path) = write_config(&format!("version = 1\n{body}"))?;
            let error = Config::load(&path).expect_err("invalid config should fail");
            let message = format!("{error:#}");
            assert!(message.contains(expected), "{expected}: {message}");
        }
        Ok(())
    }

    #[test]
    fn local_base_url_follows_server_bind() -> Result<()> {
        let (_temp, path) = write_config("version = 1\n[server]\nbind = \"0.0.0.0:8080\"\nworkers = 2\n")?;
        let config = Config::load(&path)?;
        assert_eq!(config.backend_base_url()?, "http://0.0.0.0:8080");
        assert_eq!(config.server_workers(), 2);
        Ok(())
    }

    #[test]
    fn timeout_parses_ms_seconds_and_minutes() -> Result<()> {
        assert_eq!(parse_duration("500ms")?, Duration::from_millis(500));
        assert_eq!(parse_duration("5s")?, Duration::from_secs(5));
        assert_eq!(parse_duration("2m")?, Duration::from_secs(120));
        assert!(parse_duration("oops").is_err());
        Ok(())
    }

    #[test]
    fn default_path_honors_env_override() -> Result<()> {
        let _guard = env_lock();
        let temp = tempfile::tempdir()?;
        let override_path = temp.path().join("custom-config.toml");
        // SAFETY: test-only process-local env mutation.
        unsafe {
            std::env::set_var("CODEPANEL_CONFIG_PATH", &override_path);
        }
        let resolved = Config::default_path()?;
        // SAFETY: test cleanup for process-local env mutation.
        unsafe {
            std::env::remove_var("CODEPANEL_CONFIG_PATH");
        }
        assert_eq!(resolved, override_path);
        Ok(())
    }

    #[test]
    fn db_path_uses_env_override_when_server_db_path_missing() -> Result<()> {
        let _guard = env_lock();
        let (_temp, path) = write_config("version = 1\n")?;
        // SAFETY: test-only process-local env mutation.
        unsafe {
            std::env::set_var("CODEPANEL_DB_PATH", "/from/env-only.db");
        }
        let config = Config::load(&path)?;
        let resolved = config.db_path()?;
        // SAFETY: test cleanup for process-local env mutation.
        unsafe {
            std::env::remove_var("CODEPANEL_DB_PATH");
        }
        assert_eq!(resolved, PathBuf::from("/from/env-only.db"));
        Ok(())
    }

    #[test]
    fn db_path_prefers_server_config_over_env_override() -> Result<()> {
        let _guard = env_lock();
        let (_temp, path) =
            write_config("version = 1\n[server]\ndb_path = \"/explicit/from-config.db\"\n")?;
        // SAFETY: test-only process-local env mutation.
        unsafe {
            std::env::set_var("CODEPANEL_DB_PATH", "/from/env.db");
        }
        let config = Config::load(&path)?;
        // SAFETY: test cleanup for process-local env mutation.
        unsafe {
            std::env::remove_var("CODEPANEL_DB_PATH");
        }
        assert_eq!(config.db_path()?, PathBuf::from("/explicit/from-config.db"));
        Ok(())
    }

    #[test]
    fn example_config_loads_cleanly() -> Result<()> {
        let temp = tempfile::tempdir()?;
        let path = temp.path().join("config.toml");
        std::fs::write(&path, Config::example_config(&path))?;
        let config = Config::load(&path)?;
        assert_eq!(config.backend_kind()?, BackendKind::Local);
        assert_eq!(config.server_workers(), 4);
        Ok(())
    }
}
