use super::{
    ContinuousIndel, ContinuousSite, DiploidIndel, DiploidSite, IndelCall, IndelGenotype,
    IndelKey, IndelModel, ModifiedGenotype, Pos, SiteCall, SiteModel,
};
use crate::core::variant::FilterSet;

pub fn diploid_site(pos: Pos, ref_base: u8, alleles: [u8; 2]) -> SiteCall {
    SiteCall {
        pos,
        ref_base,
        filters: FilterSet::new(),
        depth: 30,
        filtered_depth: 0,
        is_blockable: true,
        is_unphasable: false,
        model: SiteModel::Diploid(DiploidSite {
            alleles,
            qual: 60,
            gq: 60,
            gqx: 60,
            modified_gt: ModifiedGenotype::None,
            is_zero_ploidy: false,
            is_noploid: false,
        }),
    }
}

pub fn ref_site(pos: Pos) -> SiteCall {
    diploid_site(pos, b'A', [b'A', b'A'])
}

pub fn ref_site_with(pos: Pos, gqx: i32, depth: u32) -> SiteCall {
    let mut site = ref_site(pos);
    site.depth = depth;
    if let SiteModel::Diploid(dgt) = &mut site.model {
        dgt.gqx = gqx;
        dgt.gq = gqx;
    }
    site
}

pub fn continuous_site(pos: Pos, ref_base: u8, alt_base: Option<u8>, freq: f64) -> SiteCall {
    SiteCall {
        pos,
        ref_base,
        filters: FilterSet::new(),
        depth: 100,
        filtered_depth: 0,
        is_blockable: true,
        is_unphasable: false,
        model: SiteModel::Continuous(ContinuousSite {
            alt_base,
            variant_freq: freq,
            qual: 50,
            gq: 50,
            gqx: 50,
        }),
    }
}

pub fn diploid_indel(pos: Pos, delete_length: u32, genotype: IndelGenotype) -> IndelCall {
    let mut call = IndelCall::new(
        IndelKey::new(pos, delete_length, Vec::new()),
        12,
        IndelModel::Diploid(DiploidIndel {
            genotype,
            is_forced_output: false,
            qual: 40,
            gq: 35,
            gqx: 35,
        }),
    );
    call.depth = 25;
    call.ref_depth = 13;
    call
}

pub fn diploid_insertion(pos: Pos, seq: &[u8], genotype: IndelGenotype) -> IndelCall {
    let model = diploid_indel(pos, 0, genotype).model;
    let mut call = IndelCall::new(IndelKey::new(pos, 0, seq.to_vec()), 12, model);
    call.depth = 25;
    call.ref_depth = 13;
    call
}

pub fn continuous_indel(pos: Pos, delete_length: u32, freq: f64) -> IndelCall {
    IndelCall::new(
        IndelKey::new(pos, delete_length, Vec::new()),
        8,
        IndelModel::Continuous(ContinuousIndel {
            variant_freq: freq,
            qual: 40,
            gq: 40,
            gqx: 40,
        }),
    )
}
