//! Engine tuning. Loaded by `availarr-config`; every field has a default.

use std::time::Duration;

use serde::{Deserialize, Serialize};

pub use crate::availability::RenditionPolicy;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    /// Items requested per library page.
    pub page_size: usize,
    /// Items processed concurrently before pausing.
    pub batch_size: usize,
    /// Pause between batches, in milliseconds.
    pub batch_pause_ms: u64,
    /// Overlap subtracted from the last checkpoint in incremental mode, in
    /// seconds, to tolerate clock skew between engine and source.
    pub incremental_buffer_secs: u64,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            page_size: 100,
            batch_size: 20,
            batch_pause_ms: 1_000,
            incremental_buffer_secs: 600,
        }
    }
}

impl ScanConfig {
    pub fn batch_pause(&self) -> Duration {
        Duration::from_millis(self.batch_pause_ms)
    }

    pub fn incremental_buffer(&self) -> chrono::Duration {
        chrono::Duration::seconds(i64::try_from(self.incremental_buffer_secs).unwrap_or(i64::MAX))
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SafetyNetConfig {
    /// Delay between examined records, in milliseconds.
    pub item_delay_ms: u64,
}

impl Default for SafetyNetConfig {
    fn default() -> Self {
        Self { item_delay_ms: 250 }
    }
}

impl SafetyNetConfig {
    pub fn item_delay(&self) -> Duration {
        Duration::from_millis(self.item_delay_ms)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub scan: ScanConfig,
    pub safety_net: SafetyNetConfig,
    pub renditions: RenditionPolicy,
    /// Deadline for every call to a source or the catalog, in seconds.
    pub request_timeout_secs: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            scan: ScanConfig::default(),
            safety_net: SafetyNetConfig::default(),
            renditions: RenditionPolicy::default(),
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
        }
    }
}

impl EngineConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }

    /// Zero sizes would stall a pass.
    pub fn normalized(mut self) -> Self {
        self.scan.page_size = self.scan.page_size.max(1);
        self.scan.batch_size = self.scan.batch_size.max(1);
        if self.request_timeout_secs == 0 {
            self.request_timeout_secs = DEFAULT_REQUEST_TIMEOUT_SECS;
        }
        self
    }
}

pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
