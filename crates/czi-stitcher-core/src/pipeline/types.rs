use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::Result;

/// Pipeline processing stage, used for progress reporting.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PipelineStage {
    Normalizing,
    ShadingProfiles,
    Stitching,
    Reconciling,
    Merging,
}

impl std::fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Normalizing => write!(f, "Stacking tiles"),
            Self::ShadingProfiles => write!(f, "Shading profiles"),
            Self::Stitching => write!(f, "Stitching"),
            Self::Reconciling => write!(f, "Reconciling metadata"),
            Self::Merging => write!(f, "Merging channels"),
        }
    }
}

/// Progress reporting for the pipeline.
///
/// Implementors can use this to drive progress bars, logging, or any other
/// UI feedback. All methods have default no-op implementations.
pub trait ProgressReporter: Send + Sync {
    /// Processing of input `index` (of `total`) is starting.
    fn begin_acquisition(&self, _input: &Path, _index: usize, _total: usize) {}

    /// A new stage has started. `total_items` is the number of work items
    /// in this stage (series, planes), if known.
    fn begin_stage(&self, _stage: PipelineStage, _total_items: Option<usize>) {}

    /// Work items completed so far within the current stage.
    fn advance(&self, _items_done: usize) {}

    /// The current stage is finished.
    fn finish_stage(&self) {}
}

/// Reporter that ignores every event.
pub struct NoOpReporter;
impl ProgressReporter for NoOpReporter {}

/// Outcome of processing one acquisition in a batch.
#[derive(Debug)]
pub struct AcquisitionReport {
    pub input: PathBuf,
    pub output: PathBuf,
    pub result: Result<PathBuf>,
    /// Wall-clock time spent on this acquisition.
    pub elapsed: Duration,
}

impl AcquisitionReport {
    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }
}
