use std::fs;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use strata_net::{MAX_SESSIONS, ServerConfig, TlsFiles};
use thiserror::Error;

pub const DEFAULT_PORT: u16 = 8090;
pub const DEFAULT_TICK_MS: u64 = 50;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Server keys, from the `[server]` table of the config file or from the
/// command line. Unset keys fall through to the next layer.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerSection {
    pub bind: Option<IpAddr>,
    pub port: Option<u16>,
    pub key: Option<PathBuf>,
    pub cert: Option<PathBuf>,
    pub max_sessions: Option<usize>,
    pub data_dir: Option<PathBuf>,
    pub tick_ms: Option<u64>,
}

impl ServerSection {
    /// Field-wise `self`, else `fallback`.
    pub fn or(self, fallback: ServerSection) -> ServerSection {
        ServerSection {
            bind: self.bind.or(fallback.bind),
            port: self.port.or(fallback.port),
            key: self.key.or(fallback.key),
            cert: self.cert.or(fallback.cert),
            max_sessions: self.max_sessions.or(fallback.max_sessions),
            data_dir: self.data_dir.or(fallback.data_dir),
            tick_ms: self.tick_ms.or(fallback.tick_ms),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    pub server: ServerSection,
}

impl FileConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&text, path)
    }

    pub fn parse(text: &str, path: &Path) -> Result<Self, ConfigError> {
        toml::from_str(text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }
}

/// Fully resolved server settings.
#[derive(Clone, Debug)]
pub struct Settings {
    pub server: ServerConfig,
    /// Disk store root; in-memory storage when `None`.
    pub data_dir: Option<PathBuf>,
}

impl Settings {
    pub fn resolve(section: ServerSection) -> Result<Self, ConfigError> {
        let max_sessions = section.max_sessions.unwrap_or(MAX_SESSIONS);
        if max_sessions == 0 {
            return Err(ConfigError::Invalid("max_sessions must be at least 1".into()));
        }
        let tick_ms = section.tick_ms.unwrap_or(DEFAULT_TICK_MS);
        if tick_ms == 0 {
            return Err(ConfigError::Invalid("tick_ms must be at least 1".into()));
        }
        let tls = match (section.key, section.cert) {
            (Some(key), Some(cert)) => Some(TlsFiles { key, cert }),
            (None, None) => None,
            _ => {
                log::warn!("TLS needs both a key and a certificate; serving plain TCP");
                None
            }
        };
        let ip = section.bind.unwrap_or(IpAddr::V4(Ipv4Addr::UNSPECIFIED));
        Ok(Self {
            server: ServerConfig {
                addr: SocketAddr::new(ip, section.port.unwrap_or(DEFAULT_PORT)),
                max_sessions,
                tick: Duration::from_millis(tick_ms),
                tls,
            },
            data_dir: section.data_dir,
        })
    }
}
