use thiserror::Error;

/// Errors surfaced while writing reports.
///
/// Entering and exiting sections never fails; only the output sink can.
#[derive(Debug, Error)]
pub enum ProfilerError {
    #[error("failed to write profiler report: {0}")]
    Io(#[from] std::io::Error),
}
