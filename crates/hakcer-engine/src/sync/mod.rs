//! Remote catalog refresh.

pub mod scheduler;
pub mod service;
pub mod source;

pub use scheduler::{RefreshScheduler, SchedulerConfig};
pub use service::{RefreshOutcome, RefreshReport, RemoteSync};
pub use source::{FileManifestSource, HttpManifestSource, ManifestSource};
