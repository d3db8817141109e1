use super::variant::{ModifiedGenotype, Pos, SiteCall};
use crate::{constants::*, io::bed_reader::RegionList};

/// Running summary of one value over the sites of a block.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BandStat {
    min: i32,
    max: i32,
    sum: i64,
    count: u32,
}

impl BandStat {
    fn new(value: i32) -> Self {
        Self {
            min: value,
            max: value,
            sum: i64::from(value),
            count: 1,
        }
    }

    fn add(&mut self, value: i32) {
        self.min = self.min.min(value);
        self.max = self.max.max(value);
        self.sum += i64::from(value);
        self.count += 1;
    }

    pub fn min(&self) -> i32 {
        self.min
    }

    pub fn max(&self) -> i32 {
        self.max
    }

    pub fn mean(&self) -> i32 {
        (self.sum as f64 / f64::from(self.count)).round() as i32
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BlockStats {
    pub gqx: BandStat,
    pub depth: BandStat,
    pub filtered_depth: BandStat,
}

impl BlockStats {
    fn new(site: &SiteCall) -> Self {
        Self {
            gqx: BandStat::new(site.gqx()),
            depth: BandStat::new(depth_value(site.depth)),
            filtered_depth: BandStat::new(depth_value(site.filtered_depth)),
        }
    }

    fn add(&mut self, site: &SiteCall) {
        self.gqx.add(site.gqx());
        self.depth.add(depth_value(site.depth));
        self.filtered_depth.add(depth_value(site.filtered_depth));
    }
}

fn depth_value(depth: u32) -> i32 {
    i32::try_from(depth).unwrap_or(i32::MAX)
}

/// Decides which sites may be folded into non-variant blocks.
pub trait BlockCompressionPolicy {
    /// Whether `site` may be part of any block.
    fn is_site_compressable(&self, site: &SiteCall) -> bool;

    /// Whether the quality band of `site` fits the sites already in a block.
    fn is_band_compatible(&self, stats: &BlockStats, site: &SiteCall) -> bool;

    /// INFO flag naming the banding rule on block records.
    fn block_label(&self) -> String;
}

/// Default policy: reference-like sites outside no-compress regions, banded on GQX and depth
/// with a fractional and an absolute tolerance.
#[derive(Debug, Clone)]
pub struct GvcfCompressor {
    frac_tol: f64,
    abs_tol: i32,
    no_compress: RegionList,
}

impl Default for GvcfCompressor {
    fn default() -> Self {
        Self::new(DEFAULT_BLOCK_FRAC_TOL, DEFAULT_BLOCK_ABS_TOL, RegionList::default())
    }
}

impl GvcfCompressor {
    pub fn new(frac_tol: f64, abs_tol: i32, no_compress: RegionList) -> Self {
        Self {
            frac_tol,
            abs_tol,
            no_compress,
        }
    }

    fn is_within_tolerance(&self, value: i32, block_value: i32) -> bool {
        let delta = (value - block_value).abs();
        delta <= self.abs_tol || f64::from(delta) <= f64::from(block_value) * self.frac_tol
    }

    fn is_value_blockable(&self, value: i32, stat: &BandStat) -> bool {
        self.is_within_tolerance(value, stat.min()) && self.is_within_tolerance(value, stat.max())
    }
}

impl BlockCompressionPolicy for GvcfCompressor {
    fn is_site_compressable(&self, site: &SiteCall) -> bool {
        if !site.is_blockable {
            return false;
        }
        if self.no_compress.contains(site.pos) {
            return false;
        }
        if let Some(dgt) = site.diploid() {
            if dgt.is_zero_ploidy {
                return true;
            }
            if dgt.modified_gt == ModifiedGenotype::One {
                return false;
            }
        }
        site.is_ref()
    }

    fn is_band_compatible(&self, stats: &BlockStats, site: &SiteCall) -> bool {
        self.is_value_blockable(site.gqx(), &stats.gqx)
            && self.is_value_blockable(depth_value(site.depth), &stats.depth)
    }

    fn block_label(&self) -> String {
        format!(
            "BLOCKAVG_min{}p{}a",
            (self.frac_tol * 100.0).round() as i64,
            self.abs_tol
        )
    }
}

/// Run of consecutive reference-like sites written as one record.
#[derive(Debug, Clone)]
pub struct NonVariantBlock {
    first: SiteCall,
    end: Pos,
    count: usize,
    stats: BlockStats,
}

impl NonVariantBlock {
    pub fn new(site: SiteCall) -> Self {
        let stats = BlockStats::new(&site);
        Self {
            end: site.pos + 1,
            first: site,
            count: 1,
            stats,
        }
    }

    pub fn first(&self) -> &SiteCall {
        &self.first
    }

    pub fn start(&self) -> Pos {
        self.first.pos
    }

    pub fn end(&self) -> Pos {
        self.end
    }

    pub fn count(&self) -> usize {
        self.count
    }

    pub fn stats(&self) -> &BlockStats {
        &self.stats
    }

    /// Whether `site` can extend this block.
    pub fn test(&self, site: &SiteCall, policy: &dyn BlockCompressionPolicy) -> bool {
        site.pos == self.end
            && site.filters == self.first.filters
            && site.model_name() == self.first.model_name()
            && site.is_zero_ploidy() == self.first.is_zero_ploidy()
            && site.genotype_label() == self.first.genotype_label()
            && policy.is_band_compatible(&self.stats, site)
    }

    pub fn join(&mut self, site: &SiteCall) {
        debug_assert_eq!(site.pos, self.end);
        self.stats.add(site);
        self.end = site.pos + 1;
        self.count += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::variant::{
        test_utils::{diploid_site, ref_site, ref_site_with},
        Filter,
    };

    #[test]
    fn block_label_encodes_tolerances() {
        assert_eq!(GvcfCompressor::default().block_label(), "BLOCKAVG_min30p3a");
    }

    #[test]
    fn variant_and_unblockable_sites_are_not_compressable() {
        let policy = GvcfCompressor::default();
        assert!(policy.is_site_compressable(&ref_site(1)));
        assert!(!policy.is_site_compressable(&diploid_site(1, b'A', [b'A', b'G'])));

        let mut pinned = ref_site(1);
        pinned.is_blockable = false;
        assert!(!policy.is_site_compressable(&pinned));
    }

    #[test]
    fn no_compress_regions_block_compression() {
        let policy = GvcfCompressor::new(0.3, 3, RegionList::new(vec![(10, 20)]));
        assert!(policy.is_site_compressable(&ref_site(9)));
        assert!(!policy.is_site_compressable(&ref_site(10)));
        assert!(!policy.is_site_compressable(&ref_site(19)));
        assert!(policy.is_site_compressable(&ref_site(20)));
    }

    #[test]
    fn zero_ploidy_site_is_compressable() {
        let policy = GvcfCompressor::default();
        let mut site = diploid_site(1, b'A', [b'A', b'A']);
        let dgt = site.diploid_mut().unwrap();
        dgt.is_zero_ploidy = true;
        dgt.modified_gt = ModifiedGenotype::Unknown;
        assert!(policy.is_site_compressable(&site));
    }

    #[test]
    fn block_joins_contiguous_sites_within_band() {
        let policy = GvcfCompressor::default();
        let mut block = NonVariantBlock::new(ref_site_with(5, 40, 30));
        let next = ref_site_with(6, 42, 31);
        assert!(block.test(&next, &policy));
        block.join(&next);
        assert_eq!(block.count(), 2);
        assert_eq!(block.end(), 7);
        assert_eq!(block.stats().gqx.min(), 40);
        assert_eq!(block.stats().depth.max(), 31);
    }

    #[test]
    fn block_rejects_gap_filter_change_and_band_break() {
        let policy = GvcfCompressor::default();
        let block = NonVariantBlock::new(ref_site_with(5, 40, 30));

        assert!(!block.test(&ref_site_with(7, 40, 30), &policy));

        let mut filtered = ref_site_with(6, 40, 30);
        filtered.filters.set(Filter::LowGQX);
        assert!(!block.test(&filtered, &policy));

        assert!(!block.test(&ref_site_with(6, 99, 30), &policy));
        assert!(!block.test(&ref_site_with(6, 40, 90), &policy));
    }

    #[test]
    fn band_tolerance_is_fractional_for_large_values() {
        let policy = GvcfCompressor::default();
        let block = NonVariantBlock::new(ref_site_with(5, 100, 30));
        // 30% of 100 allows a drop to 70
        assert!(block.test(&ref_site_with(6, 70, 30), &policy));
        assert!(!block.test(&ref_site_with(6, 69, 30), &policy));
    }

    #[test]
    fn mean_is_rounded() {
        let mut block = NonVariantBlock::new(ref_site_with(5, 40, 10));
        block.join(&ref_site_with(6, 40, 11));
        assert_eq!(block.stats().depth.mean(), 11);
    }
}
