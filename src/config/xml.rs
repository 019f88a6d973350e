//! XML configuration support.
//!
//! ```xml
//! <config>
//!   <ops_root>/srv/relocator/ops</ops_root>
//!   <log_level>info</log_level>
//!   <backend>native</backend>
//!   <on_dst_exists>rename_suffix</on_dst_exists>
//!   <extensions>.mp4,.mkv</extensions>
//!   <drive letter="D">/mnt/media</drive>
//! </config>
//! ```
//!
//! Unknown elements are rejected so typos surface instead of silently using defaults.

use anyhow::{Context, Result, bail};
use quick_xml::de::from_str as from_xml_str;
use serde::{Deserialize, Deserializer};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

use super::paths::config_location;
use super::types::{Backend, Config, LogLevel};
use crate::gateway::DriveMap;
use crate::relocate::OnDstExists;
use crate::scan::normalize_extensions;

#[derive(Debug, Deserialize)]
struct XmlDrive {
    #[serde(rename = "@letter")]
    letter: String,
    #[serde(rename = "$text", default)]
    root: String,
}

/// Struct mirroring the XML config for deserialization.
#[derive(Debug, Deserialize)]
#[serde(rename = "config")]
#[serde(deny_unknown_fields)]
struct XmlConfig {
    ops_root: Option<String>,
    log_level: Option<String>,
    log_file: Option<String>,
    backend: Option<String>,
    pwsh_exe: Option<String>,
    on_dst_exists: Option<String>,
    #[serde(default, deserialize_with = "de_trimmed_opt")]
    corruption_read_bytes: Option<usize>,
    #[serde(default, deserialize_with = "de_trimmed_opt")]
    scan_retry_count: Option<u32>,
    extensions: Option<String>,
    #[serde(rename = "drive", default)]
    drives: Vec<XmlDrive>,
}

// Numbers may carry surrounding whitespace in hand-edited files.
fn de_trimmed_opt<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    let opt: Option<String> = Option::deserialize(deserializer)?;
    match opt.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(s) => s.parse::<T>().map(Some).map_err(serde::de::Error::custom),
    }
}

fn non_empty(s: Option<String>) -> Option<String> {
    s.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

/// Parse config XML text into a [`Config`] (defaults for absent elements).
pub fn parse_config_xml(contents: &str) -> Result<Config> {
    let parsed: XmlConfig = from_xml_str(contents).context("parse config xml")?;
    let mut cfg = Config::default();

    if let Some(p) = non_empty(parsed.ops_root) {
        cfg.ops_root = PathBuf::from(p);
    }
    if let Some(s) = non_empty(parsed.log_level) {
        cfg.log_level = s.parse::<LogLevel>().map_err(anyhow::Error::msg)?;
    }
    cfg.log_file = non_empty(parsed.log_file).map(PathBuf::from);
    if let Some(s) = non_empty(parsed.backend) {
        cfg.backend = s.parse::<Backend>().map_err(anyhow::Error::msg)?;
    }
    cfg.pwsh_exe = non_empty(parsed.pwsh_exe);
    if let Some(s) = non_empty(parsed.on_dst_exists) {
        cfg.on_dst_exists = s.parse::<OnDstExists>().map_err(anyhow::Error::msg)?;
    }
    if let Some(n) = parsed.corruption_read_bytes {
        cfg.corruption_read_bytes = n.max(1);
    }
    if let Some(n) = parsed.scan_retry_count {
        cfg.scan_retry_count = n;
    }
    if let Some(s) = non_empty(parsed.extensions) {
        let exts = normalize_extensions(s.split(','));
        if !exts.is_empty() {
            cfg.extensions = exts;
        }
    }
    let mut drives = DriveMap::new();
    for d in parsed.drives {
        let (letter, root) = DriveMap::parse_spec(&format!("{}={}", d.letter, d.root))
            .map_err(anyhow::Error::msg)
            .context("config <drive>")?;
        drives.insert(letter, root);
    }
    cfg.drives = drives;
    Ok(cfg)
}

/// Effective config plus the file it came from (if any).
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub config: Config,
    pub source: Option<PathBuf>,
}

/// Load from `explicit`, `$RELOCATOR_CONFIG` or the default location.
/// A missing file means defaults, except when the path was given explicitly.
pub fn load_config(explicit: Option<&Path>) -> Result<LoadedConfig> {
    let Some((path, explicit)) = config_location(explicit) else {
        return Ok(LoadedConfig {
            config: Config::default(),
            source: None,
        });
    };
    if !path.exists() {
        if explicit {
            bail!("config file not found: {}", path.display());
        }
        debug!(path = %path.display(), "no config file; using defaults");
        return Ok(LoadedConfig {
            config: Config::default(),
            source: None,
        });
    }
    let contents = fs::read_to_string(&path)
        .with_context(|| format!("read config xml '{}'", path.display()))?;
    let config = parse_config_xml(&contents)
        .with_context(|| format!("load config '{}'", path.display()))?;
    Ok(LoadedConfig {
        config,
        source: Some(path),
    })
}
