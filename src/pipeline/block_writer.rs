use super::VariantSink;
use crate::{
    core::{
        block::{BlockCompressionPolicy, NonVariantBlock},
        calibration::CalibrationModel,
        reference::ReferenceSegment,
        variant::{Filter, IndelCall, IndelModel, Pos, SiteCall, SiteModel},
    },
    utils::util::{one_based, Result},
};
use std::{io::Write, ops::Range};

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct WriterStats {
    pub site_records: usize,
    pub block_records: usize,
    pub indel_records: usize,
    pub synthesized_sites: usize,
}

impl WriterStats {
    pub fn records(&self) -> usize {
        self.site_records + self.block_records + self.indel_records
    }
}

impl std::ops::AddAssign for WriterStats {
    fn add_assign(&mut self, other: Self) {
        self.site_records += other.site_records;
        self.block_records += other.block_records;
        self.indel_records += other.indel_records;
        self.synthesized_sites += other.synthesized_sites;
    }
}

/// Final pipeline stage: fills position gaps, compresses reference runs into
/// blocks and formats gVCF lines.
pub struct BlockWriter<'a, W: Write> {
    contig: String,
    report_range: Range<Pos>,
    reference: &'a ReferenceSegment,
    calibration: &'a dyn CalibrationModel,
    policy: &'a dyn BlockCompressionPolicy,
    block_label: String,
    head_pos: Pos,
    block: Option<NonVariantBlock>,
    last_indel: Option<IndelCall>,
    stats: WriterStats,
    out: W,
}

impl<'a, W: Write> BlockWriter<'a, W> {
    pub fn new(
        report_range: Range<Pos>,
        reference: &'a ReferenceSegment,
        calibration: &'a dyn CalibrationModel,
        policy: &'a dyn BlockCompressionPolicy,
        out: W,
    ) -> Self {
        Self {
            contig: reference.contig().to_string(),
            head_pos: report_range.start,
            report_range,
            reference,
            calibration,
            block_label: policy.block_label(),
            policy,
            block: None,
            last_indel: None,
            stats: WriterStats::default(),
            out,
        }
    }

    pub fn stats(&self) -> WriterStats {
        self.stats
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    /// Fill in reference calls for every unreported position before `target_pos`.
    fn skip_to_pos(&mut self, target_pos: Pos) -> Result<()> {
        let target_pos = target_pos.min(self.report_range.end);
        while self.head_pos < target_pos {
            let mut site = SiteCall::empty(self.head_pos, self.reference.get_base(self.head_pos));
            self.calibration.classify_site(&mut site);
            self.stats.synthesized_sites += 1;
            self.add_site_internal(site)?;
        }
        Ok(())
    }

    fn add_site_internal(&mut self, mut site: SiteCall) -> Result<()> {
        self.filter_site_by_last_indel_overlap(&mut site);
        self.head_pos = site.pos + 1;
        self.queue_site_record(site)
    }

    /// A site conflict inside a conflicting indel is already reported on the indel record.
    fn filter_site_by_last_indel_overlap(&mut self, site: &mut SiteCall) {
        let Some(indel) = &self.last_indel else {
            return;
        };
        if site.pos >= indel.end() {
            self.last_indel = None;
            return;
        }
        if indel.filters.test(Filter::IndelConflict) && site.filters.test(Filter::SiteConflict) {
            site.filters.unset(Filter::SiteConflict);
            site.filters.set(Filter::IndelConflict);
            self.calibration.classify_site(site);
        }
    }

    /// Queue a site for writing, after possibly joining it into the open block.
    fn queue_site_record(&mut self, site: SiteCall) -> Result<()> {
        if !self.policy.is_site_compressable(&site) {
            self.write_block_site_record()?;
            return self.write_site_record(&site);
        }

        match self.block.as_mut() {
            Some(block) if block.test(&site, self.policy) => {
                block.join(&site);
                Ok(())
            }
            _ => {
                self.write_block_site_record()?;
                self.block = Some(NonVariantBlock::new(site));
                Ok(())
            }
        }
    }

    fn write_block_site_record(&mut self) -> Result<()> {
        let Some(block) = self.block.take() else {
            return Ok(());
        };
        if block.count() == 1 {
            return self.write_site_record(block.first());
        }

        let first = block.first();
        let stats = block.stats();
        writeln!(
            self.out,
            "{}\t{}\t.\t{}\t.\t.\t{}\tEND={};{}\tGT:GQX:DP:DPF:MIN_DP\t{}:{}:{}:{}:{}",
            self.contig,
            one_based(block.start()),
            first.ref_base as char,
            first.filters,
            block.end(),
            self.block_label,
            first.genotype_label(),
            stats.gqx.min(),
            stats.depth.mean(),
            stats.filtered_depth.mean(),
            stats.depth.min(),
        )?;
        self.stats.block_records += 1;
        Ok(())
    }

    fn write_site_record(&mut self, site: &SiteCall) -> Result<()> {
        let alts = site.alt_bases();
        let (alt, qual) = if alts.is_empty() {
            (".".to_string(), ".".to_string())
        } else {
            let alt: Vec<String> = alts.iter().map(|base| (*base as char).to_string()).collect();
            (alt.join(","), site.qual().to_string())
        };

        write!(
            self.out,
            "{}\t{}\t.\t{}\t{}\t{}\t{}\t.\t",
            self.contig,
            one_based(site.pos),
            site.ref_base as char,
            alt,
            qual,
            site.filters,
        )?;
        match &site.model {
            SiteModel::Diploid(dgt) => writeln!(
                self.out,
                "GT:GQ:GQX:DP:DPF\t{}:{}:{}:{}:{}",
                site.genotype_label(),
                dgt.gq,
                dgt.gqx,
                site.depth,
                site.filtered_depth
            )?,
            SiteModel::Continuous(cont) => writeln!(
                self.out,
                "GT:GQ:GQX:DP:DPF:VF\t{}:{}:{}:{}:{}:{:.3}",
                site.genotype_label(),
                cont.gq,
                cont.gqx,
                site.depth,
                site.filtered_depth,
                cont.variant_freq
            )?,
        }
        self.stats.site_records += 1;
        Ok(())
    }

    /// REF and ALT strings over the span shared by all alleles, anchored on the preceding base.
    fn indel_alleles(&self, indel: &IndelCall) -> (String, Vec<String>) {
        let anchor = indel.pos() - 1;
        let end = indel.end();
        let ref_allele = self.reference.get_seq(anchor, end);
        let alts = indel
            .alleles()
            .iter()
            .map(|allele| {
                let mut alt = self.reference.get_seq(anchor, allele.key.pos);
                alt.extend_from_slice(&allele.key.insert_seq);
                alt.extend(self.reference.get_seq(allele.key.right_pos(), end));
                String::from_utf8_lossy(&alt).into_owned()
            })
            .collect();
        (String::from_utf8_lossy(&ref_allele).into_owned(), alts)
    }

    fn indel_info(indel: &IndelCall) -> String {
        let cigars: Vec<String> = indel
            .alleles()
            .iter()
            .filter_map(|allele| allele.cigar.as_ref().map(|cigar| cigar.to_string()))
            .collect();
        let mut info = Vec::new();
        if !cigars.is_empty() {
            info.push(format!("CIGAR={}", cigars.join(",")));
        }
        if indel.ref_repeat_count > 0 {
            info.push(format!("REFREP={}", indel.ref_repeat_count));
        }
        if indel.is_overlap {
            info.push("OVERLAP".to_string());
        }
        if info.is_empty() {
            ".".to_string()
        } else {
            info.join(";")
        }
    }

    fn write_indel_record(&mut self, indel: &IndelCall) -> Result<()> {
        let (ref_allele, alts) = self.indel_alleles(indel);
        let info = Self::indel_info(indel);

        match &indel.model {
            IndelModel::Diploid(dindel) => {
                let allele_depths: Vec<String> = std::iter::once(indel.ref_depth)
                    .chain(indel.alleles().iter().map(|allele| allele.depth))
                    .map(|depth| depth.to_string())
                    .collect();
                writeln!(
                    self.out,
                    "{}\t{}\t.\t{}\t{}\t{}\t{}\t{}\tGT:GQ:GQX:DPI:AD\t{}:{}:{}:{}:{}",
                    self.contig,
                    indel.pos(),
                    ref_allele,
                    alts.join(","),
                    dindel.qual,
                    indel.filters,
                    info,
                    dindel.genotype.label(),
                    dindel.gq,
                    dindel.gqx,
                    indel.depth,
                    allele_depths.join(","),
                )?;
                self.stats.indel_records += 1;
            }
            IndelModel::Continuous(cont) => {
                // one line per allele, each reported against the full locus REF
                for (allele, alt) in indel.alleles().iter().zip(alts.iter()) {
                    writeln!(
                        self.out,
                        "{}\t{}\t.\t{}\t{}\t{}\t{}\t{}\tGT:GQ:GQX:DPI:AD:VF\t{}:{}:{}:{}:{},{}:{:.3}",
                        self.contig,
                        indel.pos(),
                        ref_allele,
                        alt,
                        cont.qual,
                        indel.filters,
                        info,
                        indel.genotype_label(),
                        cont.gq,
                        cont.gqx,
                        indel.depth,
                        indel.ref_depth,
                        allele.depth,
                        cont.variant_freq,
                    )?;
                    self.stats.indel_records += 1;
                }
            }
        }
        Ok(())
    }
}

impl<W: Write> VariantSink for BlockWriter<'_, W> {
    fn process_site(&mut self, site: SiteCall) -> Result<()> {
        if site.pos < self.head_pos || site.pos >= self.report_range.end {
            log::trace!(
                "Skipping site {}:{} outside of unreported range [{}, {})",
                self.contig,
                one_based(site.pos),
                self.head_pos,
                self.report_range.end
            );
            return Ok(());
        }
        self.skip_to_pos(site.pos)?;
        self.add_site_internal(site)
    }

    fn process_indel(&mut self, indel: IndelCall) -> Result<()> {
        if indel.is_breakpoint() {
            log::trace!("Breakpoint at {}:{} has no gVCF form", self.contig, indel.pos());
            return Ok(());
        }
        if indel.pos() < self.report_range.start || indel.pos() >= self.report_range.end {
            log::trace!(
                "Skipping indel {}:{} outside of report range",
                self.contig,
                indel.pos()
            );
            return Ok(());
        }
        self.skip_to_pos(indel.pos())?;
        // a block cannot span an indel
        self.write_block_site_record()?;
        self.write_indel_record(&indel)?;
        self.last_indel = Some(indel);
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        self.skip_to_pos(self.report_range.end)?;
        self.write_block_site_record()?;
        self.out.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        core::{
            block::GvcfCompressor,
            calibration::RuleCalibration,
            variant::{
                test_utils::{
                    continuous_indel, continuous_site, diploid_indel, diploid_site, ref_site_with,
                },
                IndelGenotype,
            },
        },
        io::bed_reader::RegionList,
        utils::util::init_logger,
    };

    struct Fixture {
        reference: ReferenceSegment,
        calibration: RuleCalibration,
        policy: GvcfCompressor,
    }

    impl Fixture {
        fn new() -> Self {
            init_logger();
            Self {
                reference: ReferenceSegment::new("chr1", 0, &[b'A'; 64]),
                calibration: RuleCalibration::default(),
                policy: GvcfCompressor::default(),
            }
        }

        fn writer(&self, range: Range<Pos>) -> BlockWriter<'_, Vec<u8>> {
            BlockWriter::new(
                range,
                &self.reference,
                &self.calibration,
                &self.policy,
                Vec::new(),
            )
        }
    }

    fn lines(writer: BlockWriter<'_, Vec<u8>>) -> Vec<Vec<String>> {
        String::from_utf8(writer.into_inner())
            .unwrap()
            .lines()
            .map(|line| line.split('\t').map(str::to_string).collect())
            .collect()
    }

    /// Positions covered by each record as `[start, end)`, 0-based.
    fn coverage(records: &[Vec<String>]) -> Vec<(Pos, Pos)> {
        records
            .iter()
            .map(|fields| {
                let pos: Pos = fields[1].parse().unwrap();
                match fields[7].split(';').find_map(|kv| kv.strip_prefix("END=")) {
                    Some(end) => (pos - 1, end.parse().unwrap()),
                    None => (pos - 1, pos),
                }
            })
            .collect()
    }

    #[test]
    fn empty_input_is_one_synthesized_block() {
        let fixture = Fixture::new();
        let mut writer = fixture.writer(0..10);
        writer.flush().unwrap();
        assert_eq!(writer.stats().synthesized_sites, 10);
        let records = lines(writer);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0][1], "1");
        assert_eq!(records[0][6], "LowGQX");
        assert_eq!(records[0][7], "END=10;BLOCKAVG_min30p3a");
    }

    #[test]
    fn gaps_are_filled_and_coverage_is_exact() {
        let fixture = Fixture::new();
        let mut writer = fixture.writer(5..30);
        writer.process_site(ref_site_with(8, 50, 30)).unwrap();
        writer.process_site(ref_site_with(9, 50, 30)).unwrap();
        writer
            .process_site(diploid_site(12, b'A', [b'A', b'C']))
            .unwrap();
        writer
            .process_indel(diploid_indel(20, 3, IndelGenotype::Het))
            .unwrap();
        writer.process_site(ref_site_with(21, 50, 30)).unwrap();
        writer.flush().unwrap();

        let records = lines(writer);
        let site_records: Vec<Vec<String>> = records
            .into_iter()
            .filter(|fields| !fields[8].contains("DPI"))
            .collect();
        let covered: Vec<Pos> = coverage(&site_records)
            .into_iter()
            .flat_map(|(start, end)| start..end)
            .collect();
        assert_eq!(covered, (5..30).collect::<Vec<_>>());
    }

    #[test]
    fn filter_change_flushes_block() {
        let fixture = Fixture::new();
        let mut writer = fixture.writer(0..4);
        writer.process_site(ref_site_with(0, 50, 30)).unwrap();
        writer.process_site(ref_site_with(1, 50, 30)).unwrap();
        let mut filtered = ref_site_with(2, 50, 30);
        filtered.filters.set(Filter::HighDepth);
        writer.process_site(filtered).unwrap();
        writer.process_site(ref_site_with(3, 50, 30)).unwrap();
        writer.flush().unwrap();

        let records = lines(writer);
        assert_eq!(records.len(), 3);
        assert_eq!(records[0][7], "END=2;BLOCKAVG_min30p3a");
        assert_eq!(records[1][1], "3");
        assert_eq!(records[1][6], "HighDepth");
        assert_eq!(records[2][1], "4");
        assert_eq!(records[2][6], "PASS");
    }

    #[test]
    fn variant_site_is_standalone_and_splits_blocks() {
        let fixture = Fixture::new();
        let mut writer = fixture.writer(0..6);
        for pos in 0..3 {
            writer.process_site(ref_site_with(pos, 50, 30)).unwrap();
        }
        writer
            .process_site(diploid_site(3, b'A', [b'A', b'G']))
            .unwrap();
        for pos in 4..6 {
            writer.process_site(ref_site_with(pos, 50, 30)).unwrap();
        }
        writer.flush().unwrap();
        let stats = writer.stats();
        let records = lines(writer);

        assert_eq!(records.len(), 3);
        assert_eq!(records[1][3], "A");
        assert_eq!(records[1][4], "G");
        assert_eq!(records[1][5], "60");
        assert_eq!(records[1][9], "0/1:60:60:30:0");
        assert_eq!(stats.block_records, 2);
        assert_eq!(stats.site_records, 1);
    }

    #[test]
    fn indel_flushes_block_and_renders_alleles() {
        let fixture = Fixture::new();
        let mut writer = fixture.writer(0..12);
        for pos in 0..5 {
            writer.process_site(ref_site_with(pos, 50, 30)).unwrap();
        }
        let mut indel = diploid_indel(5, 2, IndelGenotype::Het);
        indel.set_hap_cigar();
        writer.process_indel(indel).unwrap();
        writer.flush().unwrap();
        let records = lines(writer);

        assert_eq!(records[0][7], "END=5;BLOCKAVG_min30p3a");
        let indel = &records[1];
        assert_eq!(indel[1], "5");
        assert_eq!(indel[3], "AAA");
        assert_eq!(indel[4], "A");
        assert_eq!(indel[7], "CIGAR=1M2D");
        assert_eq!(indel[8], "GT:GQ:GQX:DPI:AD");
        assert_eq!(indel[9], "0/1:35:35:25:13,12");
        // positions 5.. are synthesized after the indel
        assert_eq!(records[2][1], "6");
    }

    #[test]
    fn merged_indel_renders_two_alts_over_shared_span() {
        let fixture = Fixture::new();
        let reference = ReferenceSegment::new("chr1", 0, b"ACGTACGTAC");
        let mut writer = BlockWriter::new(
            0..10,
            &reference,
            &fixture.calibration,
            &fixture.policy,
            Vec::new(),
        );
        let mut first = diploid_indel(3, 3, IndelGenotype::Het);
        let mut second = diploid_indel(4, 1, IndelGenotype::Het);
        first.set_hap_cigar();
        second.set_hap_cigar();
        first.is_overlap = true;
        first.add_overlap(second);
        writer.process_indel(first).unwrap();
        writer.flush().unwrap();

        let records = lines(writer);
        let indel = records.iter().find(|fields| fields[1] == "3").unwrap();
        // anchor 'G' at 0-based 2, span [3, 6) = "TAC"
        assert_eq!(indel[3], "GTAC");
        assert_eq!(indel[4], "G,GTC");
        assert_eq!(indel[7], "CIGAR=1M3D,1M1D;OVERLAP");
        assert!(indel[9].starts_with("1/2:"));
    }

    #[test]
    fn continuous_indel_writes_one_line_per_allele() {
        let fixture = Fixture::new();
        let mut writer = fixture.writer(0..10);
        writer.process_indel(continuous_indel(4, 2, 0.25)).unwrap();
        writer.process_site(continuous_site(4, b'A', None, 0.0)).unwrap();
        writer.flush().unwrap();
        let records = lines(writer);

        let indel = records
            .iter()
            .find(|fields| fields[8] == "GT:GQ:GQX:DPI:AD:VF")
            .unwrap();
        assert_eq!(indel[1], "4");
        assert_eq!(indel[4], "A");
        assert!(indel[9].starts_with("0/1:"));
        assert!(indel[9].ends_with(":0.250"));
    }

    #[test]
    fn no_compress_region_writes_single_sites() {
        let fixture = Fixture::new();
        let policy = GvcfCompressor::new(0.3, 3, RegionList::new(vec![(2, 4)]));
        let mut writer = BlockWriter::new(
            0..6,
            &fixture.reference,
            &fixture.calibration,
            &policy,
            Vec::new(),
        );
        for pos in 0..6 {
            writer.process_site(ref_site_with(pos, 50, 30)).unwrap();
        }
        writer.flush().unwrap();
        let records = lines(writer);
        let starts: Vec<&str> = records.iter().map(|fields| fields[1].as_str()).collect();
        assert_eq!(starts, vec!["1", "3", "4", "5"]);
    }

    #[test]
    fn trailing_site_conflict_is_folded_into_indel_conflict() {
        let fixture = Fixture::new();
        let mut writer = fixture.writer(0..12);
        let mut indel = diploid_indel(5, 3, IndelGenotype::Het);
        indel.filters.set(Filter::IndelConflict);
        writer.process_indel(indel).unwrap();

        let mut inside = diploid_site(6, b'A', [b'A', b'T']);
        inside.filters.set(Filter::SiteConflict);
        writer.process_site(inside).unwrap();

        let mut after = diploid_site(9, b'A', [b'A', b'T']);
        after.filters.set(Filter::SiteConflict);
        writer.process_site(after).unwrap();
        writer.flush().unwrap();

        let records = lines(writer);
        let inside = records.iter().find(|fields| fields[1] == "7").unwrap();
        assert_eq!(inside[6], "IndelConflict");
        let after = records.iter().find(|fields| fields[1] == "10").unwrap();
        assert_eq!(after[6], "SiteConflict");
    }

    #[test]
    fn sites_outside_range_are_ignored() {
        let fixture = Fixture::new();
        let mut writer = fixture.writer(10..20);
        writer.process_site(ref_site_with(3, 50, 30)).unwrap();
        writer.process_site(ref_site_with(25, 50, 30)).unwrap();
        writer.flush().unwrap();
        let records = lines(writer);
        assert_eq!(coverage(&records), vec![(10, 20)]);
    }

    #[test]
    fn flush_twice_adds_nothing() {
        let fixture = Fixture::new();
        let mut writer = fixture.writer(0..8);
        writer.process_site(ref_site_with(2, 50, 30)).unwrap();
        writer.flush().unwrap();
        let first = writer.stats();
        writer.flush().unwrap();
        assert_eq!(writer.stats(), first);
    }
}
