use crate::{
    core::variant::{
        Call, ContinuousIndel, ContinuousSite, DiploidIndel, DiploidSite, Filter, FilterSet,
        IndelCall, IndelGenotype, IndelKey, IndelModel, ModifiedGenotype, Pos, SiteCall,
        SiteModel,
    },
    error::GvxError,
    utils::util::{Result, MISSING_INTEGER, VECTOR_END_INTEGER},
};
use rust_htslib::{
    bcf::{self, record::Numeric, Read},
    errors::Error as HtsError,
};
use std::{
    collections::VecDeque,
    ffi::OsString,
    fs::File,
    io::Read as ReadIo,
    path::{Path, PathBuf},
};

fn add_extension(path: &Path, ext: &str) -> PathBuf {
    let mut out = path.to_path_buf();
    let new_ext: OsString = match path.extension() {
        Some(old) => {
            let mut s = old.to_os_string();
            s.push(".");
            s.push(ext);
            s
        }
        None => OsString::from(ext),
    };
    out.set_extension(new_ext);
    out
}

fn is_indexed(file: &Path) -> bool {
    add_extension(file, "csi").exists() || add_extension(file, "tbi").exists()
}

fn has_gzip_magic(path: &Path) -> Result<bool> {
    let mut f = File::open(path)
        .map_err(|e| crate::gvx_error!("Failed to open {}: {e}", path.display()))?;
    let mut m = [0u8; 2];
    let n = f
        .read(&mut m)
        .map_err(|e| crate::gvx_error!("Failed to read {}: {e}", path.display()))?;
    Ok(n == 2 && m == [0x1f, 0x8b])
}

fn validate_indexed_vcf(file: &Path) -> Result<()> {
    let is_bgzf = rust_htslib::bgzf::is_bgzip(file).map_err(|e| {
        crate::gvx_error!(
            "Failed to determine whether {} is BGZF-compressed: {e}",
            file.display()
        )
    })?;
    if !is_bgzf {
        if has_gzip_magic(file)? {
            return Err(crate::gvx_error!(
                "File {} is gzip-compressed but not BGZF (bgzip). Recompress with bgzip and index with `tabix -p vcf`",
                file.display()
            ));
        }
        return Err(crate::gvx_error!(
            "File {} is not BGZF (bgzip) compressed",
            file.display()
        ));
    }
    if !is_indexed(file) {
        return Err(crate::gvx_error!(
            "VCF file {} is not indexed (.tbi or .csi not found)",
            file.display()
        ));
    }
    Ok(())
}

fn format_i32(record: &bcf::Record, tag: &[u8]) -> Option<i32> {
    format_i32_values(record, tag).into_iter().next()
}

fn format_i32_values(record: &bcf::Record, tag: &[u8]) -> Vec<i32> {
    let Ok(values) = record.format(tag).integer() else {
        return Vec::new();
    };
    values
        .first()
        .map(|sample| {
            sample
                .iter()
                .copied()
                .filter(|value| *value != MISSING_INTEGER && *value != VECTOR_END_INTEGER)
                .collect()
        })
        .unwrap_or_default()
}

fn format_f32(record: &bcf::Record, tag: &[u8]) -> Option<f32> {
    let values = record.format(tag).float().ok()?;
    let value = *values.first()?.first()?;
    (!value.is_missing() && !value.is_nan()).then_some(value)
}

fn info_i32(record: &bcf::Record, tag: &[u8]) -> Option<i32> {
    let values = record.info(tag).integer().ok()??;
    let value = *values.first()?;
    (value != MISSING_INTEGER && value != VECTOR_END_INTEGER).then_some(value)
}

fn depth(value: Option<i32>) -> u32 {
    value.and_then(|v| u32::try_from(v).ok()).unwrap_or(0)
}

fn record_filters(record: &bcf::Record) -> FilterSet {
    let header = record.header();
    let mut filters = FilterSet::new();
    for id in record.filters() {
        let name = header.id_to_name(id);
        if name == b"PASS" {
            continue;
        }
        match std::str::from_utf8(&name).ok().and_then(Filter::from_id) {
            Some(filter) => filters.set(filter),
            None => log::trace!(
                "Ignoring unknown FILTER {} at position {}",
                String::from_utf8_lossy(&name),
                record.pos() + 1
            ),
        }
    }
    filters
}

/// Allele indices of the first sample's genotype, `None` for missing alleles.
///
/// A record without GT reads as a fully missing genotype.
fn record_genotype(record: &bcf::Record) -> Vec<Option<u32>> {
    match record.genotypes() {
        Ok(genotypes) => genotypes.get(0).iter().map(|allele| allele.index()).collect(),
        Err(e) => {
            log::trace!("No genotype at position {}: {}", record.pos() + 1, e);
            Vec::new()
        }
    }
}

fn is_breakend(allele: &[u8]) -> bool {
    (allele.first() == Some(&b'<') && !is_non_ref(allele))
        || allele.contains(&b'[')
        || allele.contains(&b']')
}

fn is_non_ref(allele: &[u8]) -> bool {
    allele == b"<NON_REF>" || allele == b"<*>"
}

fn is_placeholder(allele: &[u8]) -> bool {
    allele.is_empty() || allele == b"." || allele == b"*" || is_non_ref(allele)
}

/// QUAL, GQ and GQX of a record, GQX falling back to `min(GQ, QUAL)`.
fn qualities(record: &bcf::Record) -> (i32, i32, i32) {
    let qual = record.qual();
    let qual = if qual.is_missing() || qual.is_nan() {
        0
    } else {
        qual.round() as i32
    };
    let gq = format_i32(record, b"GQ").unwrap_or(0);
    let gqx = format_i32(record, b"GQX").unwrap_or_else(|| gq.min(qual));
    (qual, gq, gqx)
}

/// Converts one VCF record into a call.
pub fn record_to_call(record: &bcf::Record, contig: &str) -> Result<Call> {
    let pos = record.pos();
    let alleles = record.alleles();
    let ref_allele = alleles.first().copied().unwrap_or_default().to_ascii_uppercase();
    let alts: Vec<Vec<u8>> = alleles
        .iter()
        .skip(1)
        .filter(|allele| !is_placeholder(allele))
        .map(|allele| allele.to_ascii_uppercase())
        .collect();

    let malformed = || GvxError::MalformedIndel {
        contig: contig.to_string(),
        pos: pos + 1,
        ref_allele: String::from_utf8_lossy(&ref_allele).into_owned(),
        alt_allele: alts
            .iter()
            .map(|alt| String::from_utf8_lossy(alt).into_owned())
            .collect::<Vec<_>>()
            .join(","),
    };

    if ref_allele.is_empty() {
        return Err(malformed());
    }

    let filters = record_filters(record);
    let (qual, gq, gqx) = qualities(record);
    let variant_freq = format_f32(record, b"VF").map(f64::from);
    let gt = record_genotype(record);

    if alts.iter().any(|alt| is_breakend(alt)) {
        let model = IndelModel::Diploid(DiploidIndel {
            genotype: IndelGenotype::Het,
            is_forced_output: false,
            qual,
            gq,
            gqx,
        });
        let mut call = IndelCall::new(IndelKey::breakpoint(pos + 1), 0, model);
        call.filters = filters;
        return Ok(call.into());
    }

    if ref_allele.len() == 1 && alts.iter().all(|alt| alt.len() == 1) {
        let ref_base = ref_allele[0];
        let depth_used = depth(format_i32(record, b"DP"));
        let depth_filtered = depth(format_i32(record, b"DPF"));
        let model = match variant_freq {
            Some(variant_freq) => SiteModel::Continuous(ContinuousSite {
                alt_base: alts.first().map(|alt| alt[0]),
                variant_freq,
                qual,
                gq,
                gqx,
            }),
            None => SiteModel::Diploid(diploid_site_model(
                &gt,
                &alleles,
                ref_base,
                (qual, gq, gqx),
            )),
        };
        return Ok(SiteCall {
            pos,
            ref_base,
            filters,
            depth: depth_used,
            filtered_depth: depth_filtered,
            is_blockable: true,
            is_unphasable: false,
            model,
        }
        .into());
    }

    let [alt] = alts.as_slice() else {
        return Err(malformed());
    };
    if alt.is_empty() || ref_allele[0] != alt[0] || (ref_allele.len() == 1 && alt.len() == 1) {
        return Err(malformed());
    }
    let key = IndelKey::new(pos + 1, (ref_allele.len() - 1) as u32, alt[1..].to_vec());

    let allele_depths = format_i32_values(record, b"AD");
    let ref_depth = depth(allele_depths.first().copied());
    let alt_depth = depth(allele_depths.get(1).copied());
    let model = match variant_freq {
        Some(variant_freq) => IndelModel::Continuous(ContinuousIndel {
            variant_freq,
            qual,
            gq,
            gqx,
        }),
        None => IndelModel::Diploid(DiploidIndel {
            genotype: indel_genotype(&gt),
            is_forced_output: record.info(b"FORCED").flag().unwrap_or(false),
            qual,
            gq,
            gqx,
        }),
    };
    let mut call = IndelCall::new(key, alt_depth, model);
    call.filters = filters;
    call.ref_depth = ref_depth;
    call.depth = depth(format_i32(record, b"DPI").or_else(|| format_i32(record, b"DP")));
    call.ref_repeat_count = info_i32(record, b"REFREP")
        .and_then(|value| u32::try_from(value).ok())
        .unwrap_or(0);
    Ok(call.into())
}

fn diploid_site_model(
    gt: &[Option<u32>],
    alleles: &[&[u8]],
    ref_base: u8,
    (qual, gq, gqx): (i32, i32, i32),
) -> DiploidSite {
    let base_of = |index: u32| -> u8 {
        match alleles.get(index as usize) {
            Some(allele) if index > 0 && allele.len() == 1 && !is_placeholder(allele) => {
                allele[0].to_ascii_uppercase()
            }
            _ => ref_base,
        }
    };

    let called: Vec<u8> = gt.iter().flatten().map(|index| base_of(*index)).collect();
    let (alleles, modified_gt, is_noploid) = match called.as_slice() {
        [] => ([ref_base, ref_base], ModifiedGenotype::Unknown, true),
        [base] if *base == ref_base => ([ref_base, ref_base], ModifiedGenotype::Zero, false),
        [base] => ([*base, *base], ModifiedGenotype::One, false),
        [first, second, ..] => ([*first, *second], ModifiedGenotype::None, false),
    };
    DiploidSite {
        alleles,
        qual,
        gq,
        gqx,
        modified_gt,
        is_zero_ploidy: false,
        is_noploid,
    }
}

fn indel_genotype(gt: &[Option<u32>]) -> IndelGenotype {
    let called: Vec<u32> = gt.iter().flatten().copied().collect();
    let alt_count = called.iter().filter(|index| **index > 0).count();
    if alt_count == 0 {
        IndelGenotype::HomRef
    } else if alt_count == called.len() {
        IndelGenotype::HomAlt
    } else {
        IndelGenotype::Het
    }
}

/// Single-sample indexed VCF read region by region as a position-ordered call stream.
pub struct CallReader {
    reader: bcf::IndexedReader,
    record: bcf::Record,
    path: PathBuf,
    sample_name: String,
    is_continuous: bool,
    contig: String,
    last_record_pos: Pos,
    lookahead: Option<Call>,
    pending: VecDeque<Call>,
    records_read: usize,
}

impl CallReader {
    pub fn new(path: &Path) -> Result<Self> {
        log::trace!("Start loading VCF {:?}", path);
        validate_indexed_vcf(path).map_err(|e| crate::gvx_error!("Error validating VCF: {}", e))?;

        let reader = bcf::IndexedReader::from_path(path)
            .map_err(|e| crate::gvx_error!("Failed to open VCF file {}: {}", path.display(), e))?;
        let samples = reader.header().samples();
        if samples.len() != 1 {
            return Err(crate::gvx_error!(
                "Unsupported: VCF file {} must contain exactly 1 sample (n = {})",
                path.display(),
                samples.len()
            ));
        }
        let sample_name = std::str::from_utf8(samples[0])?.to_string();
        let is_continuous = reader.header().format_type(b"VF").is_ok();
        let record = reader.empty_record();
        Ok(Self {
            reader,
            record,
            path: path.to_path_buf(),
            sample_name,
            is_continuous,
            contig: String::new(),
            last_record_pos: -1,
            lookahead: None,
            pending: VecDeque::new(),
            records_read: 0,
        })
    }

    pub fn sample_name(&self) -> &str {
        &self.sample_name
    }

    /// Whether the header declares the `VF` field of continuous-frequency calls.
    pub fn is_continuous(&self) -> bool {
        self.is_continuous
    }

    pub fn records_read(&self) -> usize {
        self.records_read
    }

    /// Restricts the stream to records overlapping `[start, end)` of `contig`.
    ///
    /// Returns `false` when the contig has no records in the file.
    pub fn fetch(&mut self, contig: &str, start: Pos, end: Pos) -> Result<bool> {
        self.contig = contig.to_string();
        self.last_record_pos = -1;
        self.lookahead = None;
        self.pending.clear();

        let rid = match self.reader.header().name2rid(contig.as_bytes()) {
            Ok(rid) => rid,
            Err(_) => {
                log::trace!("Contig {} not in VCF header, skipping", contig);
                return Ok(false);
            }
        };
        match self
            .reader
            .fetch(rid, start.max(0) as u64, Some(end.max(0) as u64))
        {
            Ok(()) => Ok(true),
            Err(HtsError::GenomicSeek { .. }) => {
                log::debug!("Contig {} declared in header but absent from index", contig);
                Ok(false)
            }
            Err(e) => Err(crate::gvx_error!(
                "Error fetching {}:{}-{} from {}: {}",
                contig,
                start + 1,
                end,
                self.path.display(),
                e
            )),
        }
    }

    fn advance_to(&mut self, pos: Pos) -> Result<()> {
        if pos < self.last_record_pos {
            return Err(GvxError::UnsortedInput {
                contig: self.contig.clone(),
                pos: pos + 1,
                last_pos: self.last_record_pos + 1,
            });
        }
        self.last_record_pos = pos;
        Ok(())
    }

    fn read_record(&mut self) -> Result<Option<(Pos, Call)>> {
        match self.reader.read(&mut self.record) {
            Some(Ok(())) => {
                let pos = self.record.pos();
                self.advance_to(pos)?;
                self.records_read += 1;
                Ok(Some((pos, record_to_call(&self.record, &self.contig)?)))
            }
            Some(Err(e)) => Err(crate::gvx_error!(
                "Error reading record from {}: {e}",
                self.path.display()
            )),
            None => Ok(None),
        }
    }

    /// Loads every record sharing the next VCF position, in call order.
    ///
    /// An indel anchored at a position starts one base later than a site
    /// record at the same position.
    fn fill_pending(&mut self) -> Result<()> {
        let first = match self.lookahead.take() {
            Some(call) => Some((self.last_record_pos, call)),
            None => self.read_record()?,
        };
        let Some((group_pos, call)) = first else {
            return Ok(());
        };
        let mut group = vec![call];
        while let Some((pos, call)) = self.read_record()? {
            if pos != group_pos {
                self.lookahead = Some(call);
                break;
            }
            group.push(call);
        }
        group.sort_by_key(|call| (call.pos(), matches!(call, Call::Site(_))));
        self.pending.extend(group);
        Ok(())
    }

    pub fn next_call(&mut self) -> Result<Option<Call>> {
        if self.pending.is_empty() {
            self.fill_pending()?;
        }
        Ok(self.pending.pop_front())
    }
}
