use std::{num::ParseIntError, path::PathBuf, str::Utf8Error};
use thiserror::Error;

pub type GvxResult<T> = std::result::Result<T, GvxError>;

#[derive(Debug, Error)]
pub enum GvxError {
    #[error("{0}")]
    Message(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Htslib(#[from] rust_htslib::errors::Error),
    #[error(transparent)]
    Utf8(#[from] Utf8Error),
    #[error(transparent)]
    ParseInt(#[from] ParseIntError),
    #[error("Record at {contig}:{pos} uses the {model} genotype model, which overlap resolution does not support")]
    UnexpectedGenotypeModel {
        contig: String,
        pos: i64,
        model: &'static str,
    },
    #[error("Malformed indel alleles at {contig}:{pos}: REF={ref_allele} ALT={alt_allele}")]
    MalformedIndel {
        contig: String,
        pos: i64,
        ref_allele: String,
        alt_allele: String,
    },
    #[error("Input calls are not position-sorted: {contig}:{pos} follows {contig}:{last_pos}")]
    UnsortedInput {
        contig: String,
        pos: i64,
        last_pos: i64,
    },
    #[error(
        "Reference index file not found: {}. Create it using 'samtools faidx {}'",
        fai_path.display(),
        reference_path.display()
    )]
    MissingReferenceIndex {
        fai_path: PathBuf,
        reference_path: PathBuf,
    },
    #[error("Invalid gzip header: {}", path.display())]
    InvalidGzipHeader { path: PathBuf },
}

impl GvxError {
    pub fn message(message: impl Into<String>) -> Self {
        Self::Message(message.into())
    }
}

#[macro_export]
macro_rules! gvx_error {
    ($($arg:tt)*) => {
        $crate::error::GvxError::message(format!($($arg)*))
    };
}
