use crate::{
    cli::CompressArgs,
    constants::REFERENCE_PAD,
    core::{
        block::{BlockCompressionPolicy, GvcfCompressor},
        calibration::{CalibrationModel, RuleCalibration},
        reference::ReferenceSegment,
        variant::Pos,
    },
    io::{
        bed_reader::{BedMap, RegionList},
        call_reader::CallReader,
        gvcf_writer::{build_output_index, open_output, write_header, GvcfHeader},
        readers::{genome_contigs, load_reference_segment, open_genome_reader},
        region::GenomeRegion,
    },
    pipeline::{
        block_writer::{BlockWriter, WriterStats},
        overlap_resolver::OverlapResolver,
        VariantSink,
    },
    utils::util::{format_number_with_commas, Result},
};
use std::{collections::HashMap, io::Write, ops::Range, time};


/// Regions to report with their contig lengths, whole contigs in reference order by default.
fn get_region_order(
    regions: &[GenomeRegion],
    contigs: &[(String, u64)],
) -> Result<Vec<(GenomeRegion, u64)>> {
    if regions.is_empty() {
        return Ok(contigs
            .iter()
            .map(|(name, len)| (GenomeRegion::whole_contig(name.as_str()), *len))
            .collect());
    }

    let contig_lengths: HashMap<&str, u64> = contigs
        .iter()
        .map(|(name, len)| (name.as_str(), *len))
        .collect();
    let missing_contigs: Vec<&str> = regions
        .iter()
        .map(|region| region.contig.as_str())
        .filter(|contig| !contig_lengths.contains_key(contig))
        .collect();
    if !missing_contigs.is_empty() {
        return Err(crate::gvx_error!(
            "The following region contigs do not exist in the reference: {:?}",
            missing_contigs
        ));
    }

    Ok(regions
        .iter()
        .map(|region| (region.clone(), contig_lengths[region.contig.as_str()]))
        .collect())
}

fn feed_calls<S: VariantSink>(reader: &mut CallReader, sink: &mut S) -> Result<()> {
    while let Some(call) = reader.next_call()? {
        sink.process(call)?;
    }
    Ok(())
}

/// Writes the gVCF records of one region.
///
/// Diploid calls are reconciled by the overlap resolver before block
/// compression; continuous-frequency calls go straight to the block writer.
pub fn compress_region<W: Write>(
    reader: &mut CallReader,
    reference: &ReferenceSegment,
    range: Range<Pos>,
    calibration: &dyn CalibrationModel,
    policy: &dyn BlockCompressionPolicy,
    out: W,
) -> Result<WriterStats> {
    let contig = reference.contig();
    let has_records = reader.fetch(contig, range.start, range.end)?;
    let mut writer = BlockWriter::new(range, reference, calibration, policy, out);

    if reader.is_continuous() {
        if has_records {
            feed_calls(reader, &mut writer)?;
        }
        writer.flush()?;
        return Ok(writer.stats());
    }

    let mut resolver = OverlapResolver::new(contig, calibration, writer);
    if has_records {
        feed_calls(reader, &mut resolver)?;
    }
    resolver.flush()?;
    Ok(resolver.into_inner().stats())
}

pub fn compress(args: CompressArgs) -> Result<()> {
    let genome = open_genome_reader(&args.reference)?;
    let contigs = genome_contigs(&genome)?;
    let regions = get_region_order(&args.regions, &contigs)?;

    let mut call_reader = CallReader::new(&args.vcf)?;
    let sample_name = args
        .sample
        .clone()
        .unwrap_or_else(|| call_reader.sample_name().to_string());
    log::debug!(
        "Input sample {} ({} calls model)",
        call_reader.sample_name(),
        if call_reader.is_continuous() {
            "continuous"
        } else {
            "diploid"
        }
    );

    let bed_map = match args.nocompress_bed {
        Some(ref bed_path) => Some(BedMap::new(bed_path)?),
        None => None,
    };

    let inner = &args.compress_args;
    let calibration = RuleCalibration::from(inner);
    let block_label =
        GvcfCompressor::new(inner.block_frac_tol, inner.block_abs_tol, RegionList::default())
            .block_label();

    let mut out = open_output(args.output.as_deref())?;
    write_header(
        &mut out,
        &GvcfHeader {
            sample_name: &sample_name,
            reference_path: &args.reference,
            contigs: &contigs,
            block_label: &block_label,
            block_frac_tol: inner.block_frac_tol,
            block_abs_tol: inner.block_abs_tol,
            include_version: !args.no_version,
        },
    )?;

    let mut totals = WriterStats::default();
    for (region, contig_len) in &regions {
        let start_timer = time::Instant::now();
        let range = region.range(*contig_len);
        let no_compress = bed_map
            .as_ref()
            .map(|bed_map| bed_map.regions_for(&region.contig))
            .unwrap_or_default();
        let policy = GvcfCompressor::new(inner.block_frac_tol, inner.block_abs_tol, no_compress);
        let pad = REFERENCE_PAD as Pos;
        let reference = load_reference_segment(
            &genome,
            &region.contig,
            *contig_len,
            range.start - pad,
            range.end + pad,
        )?;

        let stats = compress_region(
            &mut call_reader,
            &reference,
            range,
            &calibration,
            &policy,
            &mut out,
        )?;
        log::debug!(
            "Region {}: {} records ({} blocks, {} sites, {} indels) in {:.2?}",
            region,
            format_number_with_commas(stats.records()),
            format_number_with_commas(stats.block_records),
            format_number_with_commas(stats.site_records),
            format_number_with_commas(stats.indel_records),
            start_timer.elapsed()
        );
        totals += stats;
    }
    out.flush()?;
    drop(out);
    build_output_index(args.output.as_deref())?;

    log::info!(
        "Wrote {} gVCF records from {} input records over {} region(s)",
        format_number_with_commas(totals.records()),
        format_number_with_commas(call_reader.records_read()),
        regions.len()
    );
    Ok(())
}
