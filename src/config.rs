//! Importer configuration
//!
//! TOML file with serde defaults; CLI/env overrides applied in main.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub importer: ImporterConfig,
    #[serde(default)]
    pub registry: RegistryConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub checkpoint: CheckpointConfig,
    #[serde(default)]
    pub downstream: DownstreamConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImporterConfig {
    /// Seconds between polling cycles
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,

    /// Bounded concurrency for per-node storage reads
    #[serde(default = "default_worker_count")]
    pub worker_count: usize,

    /// Consecutive cycles stuck on one discontinuity before the log
    /// escalates to an operator-attention event (0 = never)
    #[serde(default = "default_escalate_after")]
    pub chain_break_escalate_after: u32,

    /// Stop file checked at filename boundaries (optional)
    #[serde(default)]
    pub stop_file: Option<PathBuf>,
}

impl Default for ImporterConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_poll_interval(),
            worker_count: default_worker_count(),
            chain_break_escalate_after: default_escalate_after(),
            stop_file: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryConfig {
    /// JSON address book mapping node id -> public key + storage prefix
    #[serde(default = "default_address_book")]
    pub address_book: PathBuf,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            address_book: default_address_book(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    Fs,
    Http,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Which object-store backend to use
    #[serde(default)]
    pub backend: StorageBackend,

    /// Root directory of the bucket mirror (fs backend)
    #[serde(default)]
    pub fs_root: Option<PathBuf>,

    /// Base URL of the bucket gateway (http backend)
    #[serde(default)]
    pub http_base: Option<String>,

    /// Per-request timeout in milliseconds (http backend)
    #[serde(default = "default_request_timeout")]
    pub request_timeout_ms: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::Fs,
            fs_root: None,
            http_base: None,
            request_timeout_ms: default_request_timeout(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckpointConfig {
    /// Durable checkpoint file
    #[serde(default = "default_checkpoint_path")]
    pub path: PathBuf,
}

impl Default for CheckpointConfig {
    fn default() -> Self {
        Self {
            path: default_checkpoint_path(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DownstreamConfig {
    /// Capacity of the validated-segment handoff channel
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
}

impl Default for DownstreamConfig {
    fn default() -> Self {
        Self {
            channel_capacity: default_channel_capacity(),
        }
    }
}

// Defaults
fn default_poll_interval() -> u64 { 30 }
fn default_worker_count() -> usize { 4 }
fn default_escalate_after() -> u32 { 10 }
fn default_address_book() -> PathBuf { PathBuf::from("address-book.json") }
fn default_request_timeout() -> u64 { 30_000 }
fn default_checkpoint_path() -> PathBuf { PathBuf::from("checkpoint.json") }
fn default_channel_capacity() -> usize { 64 }

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_toml_yields_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.importer.poll_interval_secs, 30);
        assert_eq!(config.importer.chain_break_escalate_after, 10);
        assert_eq!(config.storage.backend, StorageBackend::Fs);
        assert_eq!(config.downstream.channel_capacity, 64);
    }

    #[test]
    fn backend_parses_lowercase() {
        let config: Config = toml::from_str(
            r#"
            [storage]
            backend = "http"
            http_base = "https://mirror.example.net/bucket"
            "#,
        )
        .unwrap();
        assert_eq!(config.storage.backend, StorageBackend::Http);
        assert_eq!(
            config.storage.http_base.as_deref(),
            Some("https://mirror.example.net/bucket")
        );
    }
}
