//! Calltree Core - Hierarchical section profiler
//!
//! Instrumented code marks named sections with [`Profiler::enter`] and
//! [`Profiler::exit`]. Each thread gets its own call tree; every tree node
//! keeps the call count and running average time of one section at one
//! position in that thread's call tree.
//!
//! # Usage
//!
//! ```
//! use calltree_core::{Profiler, SortOrder};
//!
//! let profiler = Profiler::new();
//! profiler.enter("frame");
//! profiler.time("physics", || {
//!     // ... do work ...
//! });
//! profiler.exit();
//!
//! print!("{}", profiler.report(SortOrder::TotalTime));
//! ```

pub mod clock;
pub mod context;
pub mod error;
pub mod profiler;
pub mod report;
pub mod scope;
pub mod section;
pub mod snapshot;

pub use clock::{Clock, ManualClock, MonotonicClock, Timestamp};
pub use context::{ProfileContext, ThreadIdentity};
pub use error::ProfilerError;
pub use profiler::Profiler;
pub use report::SortOrder;
pub use scope::SectionGuard;
pub use section::{CallTree, ProfileSection, SectionId};
pub use snapshot::{SectionStats, ThreadProfile};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
