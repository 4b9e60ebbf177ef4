pub mod config;
mod merge;
mod normalize;
mod orchestrator;
mod shading;
mod stitch;
mod types;

pub use merge::merge;
pub use normalize::normalize;
pub use orchestrator::{
    acquisition_basename, process_acquisition, run_batch, run_batch_reported, Engines,
};
pub use shading::{generate_profiles, profile_paths, ShadingProfiles};
pub use stitch::{find_mosaics, stitch, StitchOutcome, StitchParams};
pub use types::{AcquisitionReport, NoOpReporter, PipelineStage, ProgressReporter};
