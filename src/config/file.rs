//! INI loading for [`QueueConfig`] and the initial watch set.
//!
//! The file is decoded with `encoding_rs` (UTF-8 unless a label is given) and
//! parsed with the `rust-ini` crate. The `[queue]` section maps onto
//! [`QueueConfig`] fields; each `[glob:<pattern>]` section seeds a watch
//! pattern whose keys become string options.

use std::{fs, io::ErrorKind, path::Path, str::FromStr, time::Duration};

use encoding_rs::Encoding;
use ini::{Ini, Properties};
use serde_json::Value;

use crate::{item::Options, watch::WatchConfig};

use super::{ConfigError, QueueConfig, policy::parse_policy_string};

const QUEUE_SECTION: &str = "queue";
const GLOB_PREFIX: &str = "glob:";

/// Everything an INI file can describe.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FileConfig {
    pub queue: QueueConfig,
    pub globs: Vec<(String, Options)>,
}

impl FileConfig {
    /// Build a shared watch set holding the configured globs.
    pub fn watch_config(&self) -> WatchConfig {
        let watch = WatchConfig::new();
        for (pattern, options) in &self.globs {
            watch.add(pattern.clone(), options.clone());
        }
        watch
    }
}

impl QueueConfig {
    /// Load the `[queue]` section of an INI file.
    pub fn from_ini_file(
        path: impl AsRef<Path>,
        encoding: Option<&str>,
    ) -> Result<Self, ConfigError> {
        load_ini_file(path, encoding).map(|cfg| cfg.queue)
    }
}

/// Read, decode and parse an INI configuration file.
pub fn load_ini_file(
    path: impl AsRef<Path>,
    encoding: Option<&str>,
) -> Result<FileConfig, ConfigError> {
    let path = path.as_ref();
    let display = path.display().to_string();
    let bytes = read_file_bytes(path, &display)?;
    if bytes.is_empty() {
        return Err(ConfigError::Parse {
            path: display,
            reason: "empty file".into(),
        });
    }
    let text = decode_with_encoding(&bytes, encoding.unwrap_or("utf-8"), &display)?;
    parse_config(&display, &text)
}

fn read_file_bytes(path: &Path, display: &str) -> Result<Vec<u8>, ConfigError> {
    fs::read(path).map_err(|source| {
        let path = if source.kind() == ErrorKind::NotFound {
            format!("{display} (not found)")
        } else {
            display.to_string()
        };
        ConfigError::Io { path, source }
    })
}

fn decode_with_encoding(bytes: &[u8], label: &str, path: &str) -> Result<String, ConfigError> {
    let normalized_label = label.trim().to_ascii_lowercase();
    let encoding = Encoding::for_label(normalized_label.as_bytes())
        .ok_or_else(|| ConfigError::UnknownEncoding(label.to_string()))?;
    let (decoded, _, had_errors) = encoding.decode(bytes);
    if had_errors {
        return Err(ConfigError::Parse {
            path: path.to_string(),
            reason: format!("not valid {}", encoding.name()),
        });
    }
    Ok(decoded.into_owned())
}

pub(crate) fn parse_config(path: &str, text: &str) -> Result<FileConfig, ConfigError> {
    let ini = Ini::load_from_str(text).map_err(|err| ConfigError::Parse {
        path: path.to_string(),
        reason: err.to_string(),
    })?;

    let mut config = FileConfig::default();
    if let Some(props) = ini.section(Some(QUEUE_SECTION)) {
        apply_queue_section(path, props, &mut config.queue)?;
    }
    for (section, props) in ini.iter() {
        let Some(pattern) = section.and_then(|name| name.strip_prefix(GLOB_PREFIX)) else {
            continue;
        };
        let pattern = pattern.trim();
        if pattern.is_empty() {
            return Err(ConfigError::Parse {
                path: path.to_string(),
                reason: "glob section without a pattern".into(),
            });
        }
        let options: Options = props
            .iter()
            .map(|(key, value)| (key.to_string(), Value::String(value.to_owned())))
            .collect();
        config.globs.push((pattern.to_string(), options));
    }
    Ok(config)
}

fn apply_queue_section(
    path: &str,
    props: &Properties,
    queue: &mut QueueConfig,
) -> Result<(), ConfigError> {
    let field = |key: &str| props.get(key).map(str::trim);
    let bad = |key: &str, value: &str| ConfigError::Parse {
        path: path.to_string(),
        reason: format!("bad value for {key}: '{value}'"),
    };

    if let Some(v) = field("queue_timeout") {
        queue.queue_timeout = parse_seconds(v).ok_or_else(|| bad("queue_timeout", v))?;
    }
    if let Some(v) = field("wait_timeout") {
        queue.wait_timeout = parse_seconds(v).ok_or_else(|| bad("wait_timeout", v))?;
    }
    if let Some(v) = field("warn_interval") {
        queue.warn_interval = parse_seconds(v).ok_or_else(|| bad("warn_interval", v))?;
    }
    if let Some(v) = field("max_failures") {
        queue.max_failures = parse_number(v).ok_or_else(|| bad("max_failures", v))?;
    }
    if let Some(v) = field("backoff_base") {
        queue.backoff_base = parse_number(v).ok_or_else(|| bad("backoff_base", v))?;
    }
    if let Some(v) = field("capacity") {
        queue.capacity = parse_number(v).ok_or_else(|| bad("capacity", v))?;
    }
    if let Some(v) = field("ignore_empty") {
        queue.ignore_empty = parse_bool(v).ok_or_else(|| bad("ignore_empty", v))?;
    }
    if let Some(v) = field("backoff_jitter") {
        queue.backoff_jitter = parse_bool(v).ok_or_else(|| bad("backoff_jitter", v))?;
    }
    if let Some(v) = field("overflow_policy") {
        queue.overflow_policy = parse_policy_string(v)?;
    }
    Ok(())
}

fn parse_seconds(value: &str) -> Option<Duration> {
    let secs: f64 = value.parse().ok()?;
    Duration::try_from_secs_f64(secs).ok()
}

fn parse_number<T: FromStr>(value: &str) -> Option<T> {
    value.parse().ok()
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
