pub const DEFAULT_BLOCK_FRAC_TOL: f64 = 0.3;
pub const DEFAULT_BLOCK_ABS_TOL: i32 = 3;
pub const DEFAULT_MIN_SITE_GQX: i32 = 15;
pub const DEFAULT_MIN_INDEL_GQX: i32 = 30;
pub const DEFAULT_MAX_BASE_FILTER_FRAC: f64 = 0.4;
pub const DEFAULT_MAX_INDEL_REF_REPEAT: u32 = 8;

/// Variant frequency at or above which a continuous-model call is reported homozygous.
pub const CONTINUOUS_HOM_VF: f64 = 0.99;

/// Reference bases loaded past the end of a region so trailing deletions can be rendered.
pub const REFERENCE_PAD: u64 = 10_000;

pub const VCF_FILEFORMAT: &str = "VCFv4.1";
