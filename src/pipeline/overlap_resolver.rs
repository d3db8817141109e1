use super::VariantSink;
use crate::{
    core::{
        calibration::CalibrationModel,
        variant::{Filter, IndelCall, ModifiedGenotype, Pos, SiteCall, SiteModel},
    },
    error::GvxError,
    utils::util::Result,
};

/// Shape of an indel group at resolution time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Resolution {
    Single,
    HetPair,
    Conflict,
}

/// Holds back indels whose spans overlap, plus the sites inside those spans,
/// until the group can be reconciled and forwarded in position order.
pub struct OverlapResolver<'a, S: VariantSink> {
    contig: String,
    calibration: &'a dyn CalibrationModel,
    indel_buffer: Vec<IndelCall>,
    site_buffer: Vec<SiteCall>,
    buffer_end: Pos,
    sink: S,
}

impl<'a, S: VariantSink> OverlapResolver<'a, S> {
    pub fn new(contig: impl Into<String>, calibration: &'a dyn CalibrationModel, sink: S) -> Self {
        Self {
            contig: contig.into(),
            calibration,
            indel_buffer: Vec::new(),
            site_buffer: Vec::new(),
            buffer_end: 0,
            sink,
        }
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn into_inner(self) -> S {
        self.sink
    }

    fn unexpected_model(&self, pos: Pos, model: &'static str) -> GvxError {
        GvxError::UnexpectedGenotypeModel {
            contig: self.contig.clone(),
            pos,
            model,
        }
    }

    fn resolve(&mut self) -> Result<()> {
        if self.indel_buffer.is_empty() {
            return Ok(());
        }

        let resolution = match self.indel_buffer.as_slice() {
            [_] => Resolution::Single,
            // Only two hets can be glued together without risking two identical ALTs.
            [first, second] if first.is_het() && second.is_het() => Resolution::HetPair,
            _ => Resolution::Conflict,
        };
        log::trace!(
            "Resolving {} indel(s) and {} site(s) on {} at {}..{} as {:?}",
            self.indel_buffer.len(),
            self.site_buffer.len(),
            self.contig,
            self.indel_buffer[0].pos(),
            self.buffer_end,
            resolution
        );

        match resolution {
            Resolution::Single => self.modify_single_indel_record(),
            Resolution::HetPair => self.modify_overlap_indel_record(),
            Resolution::Conflict => self.modify_conflict_indel_record(),
        }

        let leading = &self.indel_buffer[0];
        for site in self.site_buffer.iter_mut() {
            modify_overlapping_site(leading, site, self.calibration);
        }

        self.emit_buffers()
    }

    fn modify_single_indel_record(&mut self) {
        debug_assert_eq!(self.indel_buffer.len(), 1);
        let indel = &mut self.indel_buffer[0];
        indel.set_hap_cigar();
        self.calibration.classify_indel(indel);
    }

    fn modify_overlap_indel_record(&mut self) {
        assert_eq!(
            self.indel_buffer.len(),
            2,
            "overlap merge requires exactly two indels"
        );
        assert_ne!(
            self.indel_buffer[0].key(),
            self.indel_buffer[1].key(),
            "duplicate indel key in overlap merge on {}",
            self.contig
        );
        for indel in self.indel_buffer.iter_mut() {
            indel.is_overlap = true;
            indel.set_hap_cigar();
        }
        self.calibration
            .classify_indel_pair(self.indel_buffer.as_mut_slice());

        if let Some(second) = self.indel_buffer.pop() {
            self.indel_buffer[0].add_overlap(second);
        }
    }

    fn modify_conflict_indel_record(&mut self) {
        assert!(
            self.indel_buffer.len() > 1,
            "conflict resolution requires overlapping indels"
        );
        for indel in self.indel_buffer.iter_mut() {
            indel.set_hap_cigar();
            indel.filters.set(Filter::IndelConflict);
            self.calibration.classify_indel(indel);
        }
    }

    /// Forwards both buffers merged by position, indels first on ties.
    fn emit_buffers(&mut self) -> Result<()> {
        let mut indels = std::mem::take(&mut self.indel_buffer).into_iter().peekable();
        let mut sites = std::mem::take(&mut self.site_buffer).into_iter().peekable();

        loop {
            let is_indel_next = match (indels.peek(), sites.peek()) {
                (None, None) => break,
                (Some(indel), Some(site)) => indel.pos() <= site.pos,
                (Some(_), None) => true,
                (None, Some(_)) => false,
            };
            if is_indel_next {
                if let Some(indel) = indels.next() {
                    self.sink.process_indel(indel)?;
                }
            } else if let Some(site) = sites.next() {
                self.sink.process_site(site)?;
            }
        }
        Ok(())
    }
}

/// Makes a site held inside an indel span consistent with the leading indel.
fn modify_overlapping_site(
    indel: &IndelCall,
    site: &mut SiteCall,
    calibration: &dyn CalibrationModel,
) {
    debug_assert!(site.pos >= indel.pos());

    if indel.filters.test(Filter::IndelConflict) {
        site.filters.set(Filter::IndelConflict);
        return;
    }
    if !indel.filters.is_empty() {
        site.filters.set(Filter::SiteConflict);
    }

    let ploidy = indel.ploidy_at(site.pos);
    let is_ref = site.is_ref();
    let is_het = site.is_het();

    let SiteCall {
        filters, model, ..
    } = site;
    let SiteModel::Diploid(dgt) = model else {
        unreachable!("continuous-model sites are rejected before buffering")
    };

    match ploidy {
        2 => {}
        1 => {
            if is_het {
                filters.set(Filter::SiteConflict);
            } else if is_ref {
                dgt.modified_gt = ModifiedGenotype::Zero;
            } else {
                dgt.modified_gt = ModifiedGenotype::One;
            }
        }
        0 => {
            if is_ref {
                dgt.modified_gt = ModifiedGenotype::Unknown;
                dgt.is_zero_ploidy = true;
                if dgt.is_noploid {
                    filters.unset(Filter::PloidyConflict);
                }
            } else {
                filters.set(Filter::SiteConflict);
            }
        }
        other => panic!("Unexpected ploidy value {other} at position {}", site.pos),
    }

    dgt.qual = dgt.qual.min(indel.qual());
    dgt.gqx = dgt.gqx.min(indel.gq());

    calibration.classify_site(site);
}

impl<S: VariantSink> VariantSink for OverlapResolver<'_, S> {
    fn process_site(&mut self, site: SiteCall) -> Result<()> {
        if site.diploid().is_none() {
            return Err(self.unexpected_model(site.pos, site.model_name()));
        }

        if !self.indel_buffer.is_empty() {
            if site.pos >= self.buffer_end {
                self.resolve()?;
            } else {
                self.site_buffer.push(site);
                return Ok(());
            }
        }
        self.sink.process_site(site)
    }

    fn process_indel(&mut self, indel: IndelCall) -> Result<()> {
        if indel.diploid().is_none() {
            return Err(self.unexpected_model(indel.pos(), indel.model_name()));
        }

        if indel.is_breakpoint() {
            log::trace!("Dropping unsupported breakpoint call at {}", indel.pos());
            return Ok(());
        }

        let is_hom_ref = indel.is_hom_ref();
        if is_hom_ref && !indel.is_forced_output() {
            return Ok(());
        }

        if !self.indel_buffer.is_empty() && (indel.pos() > self.buffer_end || is_hom_ref) {
            self.resolve()?;
        }

        self.buffer_end = if self.indel_buffer.is_empty() {
            indel.end()
        } else {
            self.buffer_end.max(indel.end())
        };
        self.indel_buffer.push(indel);

        // forced hom-ref calls never merge with neighbors
        if is_hom_ref {
            self.resolve()?;
        }
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        self.resolve()?;
        self.sink.flush()
    }
}
