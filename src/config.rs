// SPDX-FileCopyrightText: 2025 Alexandre Gomes Gaigalas <alganet@gmail.com>
//
// SPDX-License-Identifier: ISC

//! Configuration loading.

use crate::filter::{FilterPredicate, ProtocolFilter};
use anyhow::Context;
use hyper::header::HeaderName;
use serde::Deserialize;
use std::net::SocketAddr;
use std::path::PathBuf;

#[derive(Debug, Clone, Deserialize)]
pub struct GeneralConfig {
    /// Listen address, e.g. 127.0.0.1:8888
    #[serde(default = "default_listen")]
    pub listen: String,

    /// Pretty-print JSON bodies
    #[serde(default = "default_true")]
    pub prettify: bool,

    /// Colour console output when the terminal supports it
    #[serde(default = "default_true")]
    pub color: bool,
}

fn default_listen() -> String {
    "127.0.0.1:8888".to_string()
}

fn default_true() -> bool {
    true
}

fn default_log_directory() -> PathBuf {
    PathBuf::from("logs")
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            prettify: true,
            color: true,
        }
    }
}

/// Which completed exchanges reach the console and the log file.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct FilterConfig {
    #[serde(default)]
    pub domain: String,
    #[serde(default)]
    pub protocol: ProtocolFilter,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LogConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_log_directory")]
    pub directory: PathBuf,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            directory: default_log_directory(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct ProxyConfig {
    /// Request headers removed before forwarding upstream
    #[serde(default)]
    pub suppress_headers: Vec<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub filter: FilterConfig,
    #[serde(default)]
    pub log: LogConfig,
    #[serde(default)]
    pub proxy: ProxyConfig,
}

impl Config {
    /// Load and validate configuration from a TOML file. Every section is
    /// optional:
    ///
    /// [general]
    /// listen = "127.0.0.1:8888"
    /// prettify = true
    ///
    /// [filter]
    /// domain = "api.example.com"
    /// protocol = "https"
    pub async fn load_from_path<P: AsRef<std::path::Path>>(path: P) -> anyhow::Result<Self> {
        let path_ref = path.as_ref();
        let s = tokio::fs::read_to_string(path_ref)
            .await
            .with_context(|| format!("reading config {}", path_ref.display()))?;
        let cfg: Self = toml::from_str(&s)?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        self.listen_addr()?;
        self.suppressed_headers()?;
        Ok(())
    }

    pub fn listen_addr(&self) -> anyhow::Result<SocketAddr> {
        self.general
            .listen
            .parse()
            .with_context(|| format!("invalid listen address '{}'", self.general.listen))
    }

    pub fn suppressed_headers(&self) -> anyhow::Result<Vec<HeaderName>> {
        self.proxy
            .suppress_headers
            .iter()
            .map(|h| {
                HeaderName::from_bytes(h.trim().as_bytes())
                    .with_context(|| format!("invalid header name '{}' in suppress_headers", h))
            })
            .collect()
    }

    /// Predicate selecting what is streamed and logged.
    pub fn stream_filter(&self) -> FilterPredicate {
        FilterPredicate::new(&self.filter.domain, self.filter.protocol)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::fs;
    use uuid::Uuid;

    #[test]
    fn defaults() {
        let cfg = Config::default();
        assert_eq!(cfg.general.listen, "127.0.0.1:8888");
        assert!(cfg.general.prettify);
        assert!(cfg.general.color);
        assert!(cfg.log.enabled);
        assert_eq!(cfg.log.directory, PathBuf::from("logs"));
        assert_eq!(cfg.stream_filter(), FilterPredicate::all());
    }

    #[tokio::test]
    async fn load_toml_file() -> anyhow::Result<()> {
        let tmp_toml =
            std::env::temp_dir().join(format!("network-watcher_cfg_test_{}.toml", Uuid::new_v4()));
        let toml = r#"[general]
listen = "0.0.0.0:9000"
prettify = false

[filter]
domain = "API.example.com"
protocol = "https"

[log]
directory = "/tmp/traffic"

[proxy]
suppress_headers = ["x-debug", "Authorization"]
"#;
        fs::write(&tmp_toml, toml).await?;
        let cfg = Config::load_from_path(&tmp_toml).await?;

        assert_eq!(cfg.listen_addr()?, "0.0.0.0:9000".parse::<SocketAddr>()?);
        assert!(!cfg.general.prettify);
        assert!(cfg.general.color);
        assert_eq!(cfg.stream_filter().domain(), "api.example.com");
        assert_eq!(cfg.filter.protocol, ProtocolFilter::Https);
        assert!(cfg.log.enabled);
        assert_eq!(cfg.log.directory, PathBuf::from("/tmp/traffic"));
        assert_eq!(cfg.suppressed_headers()?.len(), 2);
        fs::remove_file(&tmp_toml).await?;
        Ok(())
    }

    #[tokio::test]
    async fn empty_file_is_all_defaults() -> anyhow::Result<()> {
        let tmp_toml =
            std::env::temp_dir().join(format!("network-watcher_cfg_empty_{}.toml", Uuid::new_v4()));
        fs::write(&tmp_toml, "").await?;
        let cfg = Config::load_from_path(&tmp_toml).await?;
        assert_eq!(cfg.general.listen, "127.0.0.1:8888");
        fs::remove_file(&tmp_toml).await?;
        Ok(())
    }
}
