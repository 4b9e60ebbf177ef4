/// File name of the normalized stack inside an acquisition's scratch folder.
pub const STACK_FILENAME: &str = "stacked.ome.tif";

/// Default tile width recorded when normalizing an acquisition.
pub const DEFAULT_TILE_SIZE_X: u32 = 2048;

/// Default tile height recorded when normalizing an acquisition.
pub const DEFAULT_TILE_SIZE_Y: u32 = 2048;

/// Reader option that switches off the CZI reader's automatic tile stitching.
pub const CZI_AUTOSTITCH_OPTION: &str = "zeissczi.autostitch";

/// Default experiment name used to label shading profiles.
pub const DEFAULT_EXPERIMENT_NAME: &str = "shading";

/// Suffix of the flat-field profile written by the BaSiC script.
pub const FLATFIELD_SUFFIX: &str = "-ffp-basic.tif";

/// Suffix of the dark-field profile written by the BaSiC script.
pub const DARKFIELD_SUFFIX: &str = "-dfp-basic.tif";

/// Placeholder replaced by the channel index in mosaic file names.
pub const CHANNEL_PLACEHOLDER: &str = "{channel}";

/// Placeholder replaced by the cycle index in mosaic file names.
pub const CYCLE_PLACEHOLDER: &str = "{cycle}";

/// Mosaic file name template used when the stitcher is called directly.
pub const STITCH_FILENAME_FORMAT: &str = "stitched_ch_{channel}.tif";

/// Mosaic file name template used by the command-line driver.
pub const DEFAULT_FILENAME_FORMAT: &str = "cycle_{cycle}_ch_{channel}.tif";

/// Maximum tile shift (in microns) accepted during registration.
pub const DEFAULT_MAX_SHIFT: f64 = 15.0;

/// Output tile size for pyramidal mosaics.
pub const DEFAULT_PYRAMID_TILE_SIZE: u32 = 1024;

/// Extension given to merged outputs.
pub const OUTPUT_EXTENSION: &str = "ome.tif";

/// Total plane bytes above which the OME-TIFF writer switches to BigTIFF.
/// Leaves headroom below 4 GiB for IFDs and the OME-XML block.
pub const BIGTIFF_THRESHOLD_BYTES: u64 = 0xF000_0000;

/// Number of stderr lines kept when reporting a failed external tool.
pub const STDERR_TAIL_LINES: usize = 20;
