use crate::{
    core::{reference::ReferenceSegment, variant::Pos},
    error::GvxError,
    utils::util::Result,
};
use flate2::read::MultiGzDecoder;
use rust_htslib::faidx;
use std::{
    fs::File,
    io::{BufReader, Read as ioRead},
    path::{Path, PathBuf},
};

pub fn open_bed_file_reader(path: &Path) -> Result<BufReader<Box<dyn ioRead>>> {
    fn is_gzipped(path: &Path) -> bool {
        let path_str = path.to_string_lossy().to_lowercase();
        path_str.ends_with(".gz") || path_str.ends_with(".gzip")
    }
    let file = File::open(path)
        .map_err(|error| crate::gvx_error!("Failed to open file {}: {error}", path.display()))?;
    if is_gzipped(path) {
        let gz_decoder = MultiGzDecoder::new(file);
        if gz_decoder.header().is_some() {
            Ok(BufReader::new(Box::new(gz_decoder)))
        } else {
            Err(GvxError::InvalidGzipHeader {
                path: path.to_path_buf(),
            })
        }
    } else {
        Ok(BufReader::new(Box::new(file)))
    }
}

pub fn open_genome_reader(path: &Path) -> Result<faidx::Reader> {
    let fai_path = {
        let mut fai_path = path.as_os_str().to_os_string();
        fai_path.push(".fai");
        PathBuf::from(fai_path)
    };
    if !fai_path.exists() {
        return Err(GvxError::MissingReferenceIndex {
            fai_path,
            reference_path: path.to_path_buf(),
        });
    }
    faidx::Reader::from_path(path).map_err(|e| e.into())
}

/// Contig names and lengths in index order.
pub fn genome_contigs(genome: &faidx::Reader) -> Result<Vec<(String, u64)>> {
    let names = genome.seq_names()?;
    Ok(names
        .into_iter()
        .map(|name| {
            let len = genome.fetch_seq_len(&name);
            (name, len)
        })
        .collect())
}

/// Loads `[start, end)` of `contig`, clamped to the contig length.
pub fn load_reference_segment(
    genome: &faidx::Reader,
    contig: &str,
    contig_len: u64,
    start: Pos,
    end: Pos,
) -> Result<ReferenceSegment> {
    let start = start.max(0);
    let end = end.min(contig_len as Pos);
    if end <= start {
        return Ok(ReferenceSegment::new(contig, start, &[]));
    }
    // faidx end coordinate is inclusive
    let seq = genome
        .fetch_seq(contig, start as usize, (end - 1) as usize)
        .map_err(|e| {
            crate::gvx_error!(
                "Failed to fetch reference sequence {}:{}-{}: {}",
                contig,
                start + 1,
                end,
                e
            )
        })?;
    Ok(ReferenceSegment::new(contig, start, &seq))
}
