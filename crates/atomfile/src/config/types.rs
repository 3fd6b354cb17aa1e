//! Configuration types

use crate::platform::SharingMode;
use crate::retry::{DEFAULT_ATTEMPTS, DEFAULT_DELAY, RetryPolicy};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::time::Duration;

/// Complete configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AtomicFileConfig {
    /// Strategy used for every file in the namespace
    #[serde(default)]
    pub strategy: Strategy,
    /// OS-level sharing applied on open (Windows only)
    #[serde(default)]
    pub sharing: SharingMode,
    /// fsync written data before it becomes visible
    #[serde(default = "default_sync_writes")]
    pub sync_writes: bool,
    /// Retry settings for transient sharing conflicts
    #[serde(default)]
    pub retry: RetryConfig,
}

fn default_sync_writes() -> bool {
    true
}

impl Default for AtomicFileConfig {
    fn default() -> Self {
        Self {
            strategy: Strategy::default(),
            sharing: SharingMode::default(),
            sync_writes: default_sync_writes(),
            retry: RetryConfig::default(),
        }
    }
}

/// How atomicity is achieved for a file namespace
///
/// Pick one per namespace; the two do not observe each other.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Strategy {
    /// Write a temporary file, then replace the target
    #[default]
    Rename,
    /// Lock the target itself and rewrite it in place
    Lock,
}

impl FromStr for Strategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "rename" => Ok(Self::Rename),
            "lock" => Ok(Self::Lock),
            other => Err(format!("unknown strategy '{other}'")),
        }
    }
}

/// Retry configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Total attempts, including the final unguarded one
    #[serde(default = "default_attempts")]
    pub attempts: u32,
    /// Pause between attempts in milliseconds
    #[serde(default = "default_delay_ms")]
    pub delay_ms: u64,
}

fn default_attempts() -> u32 {
    DEFAULT_ATTEMPTS
}

fn default_delay_ms() -> u64 {
    DEFAULT_DELAY.as_millis() as u64
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            attempts: default_attempts(),
            delay_ms: default_delay_ms(),
        }
    }
}

impl RetryConfig {
    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.attempts, Duration::from_millis(self.delay_ms))
    }
}
