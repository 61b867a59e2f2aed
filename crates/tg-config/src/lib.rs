// SPDX-License-Identifier: MIT OR Apache-2.0
//! Configuration loading, validation, and warnings for Treaty Gate.
//!
//! This crate provides [`GovernorConfig`], the recognized option set for
//! the governance core, together with helpers for loading from TOML
//! files, semantic validation, and advisory [`ConfigWarning`]s.
#![deny(unsafe_code)]
#![warn(missing_docs)]

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::Path;
use tg_core::Posture;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors that can occur during configuration loading or validation.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The requested configuration file was not found.
    #[error("config file not found: {path}")]
    FileNotFound {
        /// Path that was requested.
        path: String,
    },

    /// The file could not be parsed as valid TOML.
    #[error("failed to parse config: {reason}")]
    ParseError {
        /// Human-readable parse error detail.
        reason: String,
    },

    /// Semantic validation failed (one or more problems).
    #[error("config validation failed: {reasons:?}")]
    ValidationError {
        /// Individual validation failure messages.
        reasons: Vec<String>,
    },
}

// ---------------------------------------------------------------------------
// Warnings
// ---------------------------------------------------------------------------

/// Advisory-level issues that do not prevent operation but deserve
/// attention.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigWarning {
    /// The rate window is so small that budgets barely matter.
    TinyRateWindow {
        /// Configured window in milliseconds.
        window_ms: u64,
    },
    /// The ingress byte cap is unusually large.
    LargeRequestCap {
        /// Configured cap in bytes.
        bytes: usize,
    },
    /// The heartbeat runs so often it becomes noise.
    ShortHeartbeat {
        /// Configured interval in milliseconds.
        interval_ms: u64,
    },
    /// Production posture with no anchor actors configured.
    NoAnchorsInProduction,
}

impl std::fmt::Display for ConfigWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigWarning::TinyRateWindow { window_ms } => {
                write!(f, "rate window of {window_ms} ms is too small to meter")
            }
            ConfigWarning::LargeRequestCap { bytes } => {
                write!(f, "ingress cap of {bytes} bytes is unusually large")
            }
            ConfigWarning::ShortHeartbeat { interval_ms } => {
                write!(f, "heartbeat every {interval_ms} ms will dominate logs")
            }
            ConfigWarning::NoAnchorsInProduction => {
                write!(f, "production posture without anchor actors")
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Config types
// ---------------------------------------------------------------------------

/// Per-actor rate budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct RateLimitSettings {
    /// Window length in milliseconds.
    #[serde(default = "default_rate_window_ms")]
    pub window_ms: u64,
    /// Requests accepted per actor per window.
    #[serde(default = "default_rate_max_requests")]
    pub max_requests: u32,
}

impl Default for RateLimitSettings {
    fn default() -> Self {
        Self {
            window_ms: default_rate_window_ms(),
            max_requests: default_rate_max_requests(),
        }
    }
}

/// Side-effect concurrency caps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ConcurrencySettings {
    /// Global cap on in-flight side effects.
    #[serde(default = "default_concurrency_total")]
    pub max_total: usize,
    /// Per-actor cap; zero derives a quarter of the global cap.
    #[serde(default)]
    pub max_per_actor: usize,
}

impl Default for ConcurrencySettings {
    fn default() -> Self {
        Self {
            max_total: default_concurrency_total(),
            max_per_actor: 0,
        }
    }
}

/// Heartbeat cadence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct HeartbeatSettings {
    /// Probe interval in milliseconds.
    #[serde(default = "default_heartbeat_interval_ms")]
    pub interval_ms: u64,
}

impl Default for HeartbeatSettings {
    fn default() -> Self {
        Self {
            interval_ms: default_heartbeat_interval_ms(),
        }
    }
}

/// The recognized option set for the governance core.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct GovernorConfig {
    /// Ingress byte cap.
    #[serde(default = "default_max_request_size")]
    pub max_request_size: usize,

    /// Egress byte cap.
    #[serde(default = "default_max_response_size")]
    pub max_response_size: usize,

    /// Per-actor rate budget.
    #[serde(default)]
    pub rate_limit: RateLimitSettings,

    /// Side-effect concurrency caps.
    #[serde(default)]
    pub concurrency: ConcurrencySettings,

    /// Handler hard timeout in milliseconds.
    #[serde(default = "default_job_timeout_ms")]
    pub job_timeout_ms: u64,

    /// Heartbeat cadence.
    #[serde(default)]
    pub heartbeat: HeartbeatSettings,

    /// Policy artifact location.
    #[serde(default = "default_artifact_path")]
    pub artifact_path: String,

    /// Base directory for build-manifest paths.
    #[serde(default = "default_repo_root")]
    pub repo_root: String,

    /// Deployment posture.
    #[serde(default)]
    pub posture: Posture,

    /// Distinguished actors whose stop beats other resumes.
    #[serde(default)]
    pub anchor_actors: BTreeSet<String>,
}

impl Default for GovernorConfig {
    fn default() -> Self {
        Self {
            max_request_size: default_max_request_size(),
            max_response_size: default_max_response_size(),
            rate_limit: RateLimitSettings::default(),
            concurrency: ConcurrencySettings::default(),
            job_timeout_ms: default_job_timeout_ms(),
            heartbeat: HeartbeatSettings::default(),
            artifact_path: default_artifact_path(),
            repo_root: default_repo_root(),
            posture: Posture::default(),
            anchor_actors: BTreeSet::new(),
        }
    }
}

fn default_max_request_size() -> usize {
    1024 * 1024
}
fn default_max_response_size() -> usize {
    4 * 1024 * 1024
}
fn default_rate_window_ms() -> u64 {
    1_000
}
fn default_rate_max_requests() -> u32 {
    100
}
fn default_concurrency_total() -> usize {
    16
}
fn default_job_timeout_ms() -> u64 {
    30_000
}
fn default_heartbeat_interval_ms() -> u64 {
    30_000
}
fn default_artifact_path() -> String {
    "genome.json".into()
}
fn default_repo_root() -> String {
    ".".into()
}

impl GovernorConfig {
    /// Parse a TOML document.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::ParseError`] on malformed TOML.
    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        toml::from_str(raw).map_err(|e| ConfigError::ParseError {
            reason: e.to_string(),
        })
    }

    /// Load and parse a TOML file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::FileNotFound`] or [`ConfigError::ParseError`].
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|_| ConfigError::FileNotFound {
            path: path.display().to_string(),
        })?;
        Self::from_toml_str(&raw)
    }

    /// Semantic validation: hard errors plus advisory warnings.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::ValidationError`] listing every defect.
    pub fn validate(&self) -> Result<Vec<ConfigWarning>, ConfigError> {
        let mut reasons = Vec::new();
        if self.max_request_size == 0 {
            reasons.push("max_request_size must be positive".to_string());
        }
        if self.max_response_size == 0 {
            reasons.push("max_response_size must be positive".to_string());
        }
        if self.rate_limit.window_ms == 0 {
            reasons.push("rate_limit.window_ms must be positive".to_string());
        }
        if self.rate_limit.max_requests == 0 {
            reasons.push("rate_limit.max_requests must be positive".to_string());
        }
        if self.concurrency.max_total == 0 {
            reasons.push("concurrency.max_total must be positive".to_string());
        }
        if self.job_timeout_ms == 0 {
            reasons.push("job_timeout_ms must be positive".to_string());
        }
        if self.heartbeat.interval_ms == 0 {
            reasons.push("heartbeat.interval_ms must be positive".to_string());
        }
        if self.artifact_path.trim().is_empty() {
            reasons.push("artifact_path must not be empty".to_string());
        }
        if !reasons.is_empty() {
            return Err(ConfigError::ValidationError { reasons });
        }

        let mut warnings = Vec::new();
        if self.rate_limit.window_ms < 100 {
            warnings.push(ConfigWarning::TinyRateWindow {
                window_ms: self.rate_limit.window_ms,
            });
        }
        if self.max_request_size > 64 * 1024 * 1024 {
            warnings.push(ConfigWarning::LargeRequestCap {
                bytes: self.max_request_size,
            });
        }
        if self.heartbeat.interval_ms < 1_000 {
            warnings.push(ConfigWarning::ShortHeartbeat {
                interval_ms: self.heartbeat.interval_ms,
            });
        }
        if self.posture == Posture::Production && self.anchor_actors.is_empty() {
            warnings.push(ConfigWarning::NoAnchorsInProduction);
        }
        Ok(warnings)
    }
}
