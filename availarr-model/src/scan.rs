use std::fmt;

use chrono::{DateTime, Utc};

use crate::ids::SourceId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum ScanMode {
    Full,
    Incremental,
}

impl ScanMode {
    pub fn from_incremental(incremental: bool) -> Self {
        if incremental {
            ScanMode::Incremental
        } else {
            ScanMode::Full
        }
    }
}

impl fmt::Display for ScanMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScanMode::Full => f.write_str("full"),
            ScanMode::Incremental => f.write_str("incremental"),
        }
    }
}

/// Error taxonomy carried in pass summaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum ScanErrorKind {
    TransientNetwork,
    ResolutionMiss,
    SourceOutage,
    DataInconsistency,
}

#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ScanError {
    pub kind: ScanErrorKind,
    /// Where it happened, e.g. `library=Movies item=5123`.
    pub context: String,
    pub message: String,
}

impl ScanError {
    pub fn new(
        kind: ScanErrorKind,
        context: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            context: context.into(),
            message: message.into(),
        }
    }
}

/// Counters for one source within a scan.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SourceScanSummary {
    pub source_id: SourceId,
    pub source_name: String,
    pub libraries_scanned: usize,
    pub items_seen: usize,
    /// Items whose identity was resolved by lookup rather than the cache.
    pub newly_resolved: usize,
    /// Titles whose persisted state changed.
    pub updated: usize,
    pub errors: Vec<ScanError>,
}

impl SourceScanSummary {
    pub fn new(source_id: SourceId, source_name: impl Into<String>) -> Self {
        Self {
            source_id,
            source_name: source_name.into(),
            libraries_scanned: 0,
            items_seen: 0,
            newly_resolved: 0,
            updated: 0,
            errors: Vec::new(),
        }
    }
}

/// Returned to whoever triggered a scan. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ScanResult {
    pub mode: ScanMode,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub cancelled: bool,
    pub sources: Vec<SourceScanSummary>,
}

impl ScanResult {
    pub fn items_seen(&self) -> usize {
        self.sources.iter().map(|s| s.items_seen).sum()
    }

    pub fn updated(&self) -> usize {
        self.sources.iter().map(|s| s.updated).sum()
    }

    pub fn error_count(&self) -> usize {
        self.sources.iter().map(|s| s.errors.len()).sum()
    }

    pub fn source(&self, id: &SourceId) -> Option<&SourceScanSummary> {
        self.sources.iter().find(|s| &s.source_id == id)
    }
}

/// Summary of one safety-net pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SafetyNetSummary {
    pub examined: usize,
    pub updated_count: usize,
    pub events_emitted: usize,
    pub errors: Vec<ScanError>,
}
