//! Rule engine: rule catalog, prompt analysis, remote refresh and history.
//!
//! [`Engine`] wires the parts to a [`hakcer_store::KvStore`]. The pieces can
//! also be used on their own: [`RuleStore`] owns the catalog and hands out
//! immutable [`Catalog`] snapshots, [`Analyzer`] runs a snapshot over text,
//! [`RemoteSync`] installs newer manifests and [`StatsAggregator`] keeps
//! history and totals.

pub mod analyzer;
pub mod builtin;
pub mod catalog;
pub mod engine;
pub mod error;
pub mod keys;
pub mod manifest;
pub mod rules;
pub mod stats;
pub mod sync;

#[cfg(test)]
pub(crate) mod test_helpers;

pub use analyzer::Analyzer;
pub use catalog::{Catalog, CategoryFilter, Rule, RuleOrigin, RuleSummary};
pub use engine::{http_source, Engine, EngineConfig};
pub use error::{EngineError, ManifestError, SyncError};
pub use manifest::{CompiledRule, Manifest, ValidatedManifest};
pub use rules::RuleStore;
pub use stats::StatsAggregator;
pub use sync::{
    FileManifestSource, HttpManifestSource, ManifestSource, RefreshOutcome, RefreshReport,
    RefreshScheduler, RemoteSync, SchedulerConfig,
};
