use super::variant::{Filter, IndelCall, IndelGenotype, IndelModel, SiteCall};
use crate::cli::CompressArgsInner;

/// Stamps final filters onto calls.
///
/// Implementations must be idempotent: a call may be classified again after
/// it was revised, and classifying twice must give the same result.
pub trait CalibrationModel {
    fn classify_site(&self, site: &mut SiteCall);

    fn classify_indel(&self, indel: &mut IndelCall);

    /// Classify calls that will be reported as a single multi-allelic locus.
    fn classify_indel_pair(&self, indels: &mut [IndelCall]) {
        for indel in indels.iter_mut() {
            self.classify_indel(indel);
        }
    }
}

/// Threshold rules over the qualities and depths carried by each call.
#[derive(Debug, Clone)]
pub struct RuleCalibration {
    pub min_site_gqx: i32,
    pub min_indel_gqx: i32,
    pub max_base_filter_frac: f64,
    pub max_depth: Option<u32>,
    pub max_indel_ref_repeat: u32,
}

impl Default for RuleCalibration {
    fn default() -> Self {
        Self::from(&CompressArgsInner::default())
    }
}

impl From<&CompressArgsInner> for RuleCalibration {
    fn from(args: &CompressArgsInner) -> Self {
        Self {
            min_site_gqx: args.min_site_gqx,
            min_indel_gqx: args.min_indel_gqx,
            max_base_filter_frac: args.max_base_filter_frac,
            max_depth: args.max_depth,
            max_indel_ref_repeat: args.max_indel_ref_repeat,
        }
    }
}

impl RuleCalibration {
    fn is_depth_too_high(&self, depth: u32) -> bool {
        self.max_depth.is_some_and(|max_depth| depth > max_depth)
    }
}

impl CalibrationModel for RuleCalibration {
    fn classify_site(&self, site: &mut SiteCall) {
        // Zero-ploidy sites have no genotype left to qualify.
        if !site.is_zero_ploidy() && site.gqx() < self.min_site_gqx {
            site.filters.set(Filter::LowGQX);
        }

        let total_calls = site.depth + site.filtered_depth;
        if total_calls > 0 {
            let filtered_frac = f64::from(site.filtered_depth) / f64::from(total_calls);
            if filtered_frac > self.max_base_filter_frac {
                site.filters.set(Filter::HighBaseFilt);
            }
        }

        if self.is_depth_too_high(site.depth) {
            site.filters.set(Filter::HighDepth);
        }
    }

    fn classify_indel(&self, indel: &mut IndelCall) {
        let is_hom_ref = matches!(
            &indel.model,
            IndelModel::Diploid(dindel) if dindel.genotype == IndelGenotype::HomRef
        );
        let min_gqx = if is_hom_ref {
            self.min_site_gqx
        } else {
            self.min_indel_gqx
        };
        if indel.gqx() < min_gqx {
            indel.filters.set(Filter::LowGQX);
        }

        if self.is_depth_too_high(indel.depth) {
            indel.filters.set(Filter::HighDepth);
        }

        if indel.ref_repeat_count > self.max_indel_ref_repeat {
            indel.filters.set(Filter::HighRefRep);
        }
    }

    fn classify_indel_pair(&self, indels: &mut [IndelCall]) {
        for indel in indels.iter_mut() {
            self.classify_indel(indel);
        }
        let mut shared = crate::core::variant::FilterSet::new();
        for indel in indels.iter() {
            shared.union(indel.filters);
        }
        for indel in indels.iter_mut() {
            indel.filters.union(shared);
        }
    }
}
