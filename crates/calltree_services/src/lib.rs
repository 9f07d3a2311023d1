//! Calltree Services Layer
//!
//! Settings for the profiler driver, persisted as JSON.

pub mod settings;

pub use settings::{ReportSettings, Settings, SettingsError, WorkloadSettings};
