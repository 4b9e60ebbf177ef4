//! OME-XML metadata: a mutable element tree plus the reconciliation steps
//! applied before channel mosaics are merged.

mod metadata;
pub mod reconcile;
pub mod xml;

pub use metadata::{OmeMetadata, PixelsInfo};
pub use reconcile::{
    attach_experimenter, collapse_filter_sets, retain_single_image, CollapseSummary,
    ExperimenterIdentity, MetadataTransform,
};
