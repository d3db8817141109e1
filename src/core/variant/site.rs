use super::{filters::FilterSet, Pos};
use crate::constants::CONTINUOUS_HOM_VF;

/// Genotype rewrite applied to a diploid site after it was found inside an indel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ModifiedGenotype {
    #[default]
    None,
    /// Hemizygous reference
    Zero,
    /// Hemizygous alternate
    One,
    Unknown,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DiploidSite {
    /// The two called bases, reference base included when called.
    pub alleles: [u8; 2],
    pub qual: i32,
    pub gq: i32,
    pub gqx: i32,
    pub modified_gt: ModifiedGenotype,
    pub is_zero_ploidy: bool,
    /// Upstream genotyping treated this position as having no expected copies.
    pub is_noploid: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ContinuousSite {
    pub alt_base: Option<u8>,
    pub variant_freq: f64,
    pub qual: i32,
    pub gq: i32,
    pub gqx: i32,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SiteModel {
    Diploid(DiploidSite),
    Continuous(ContinuousSite),
}

#[derive(Debug, Clone, PartialEq)]
pub struct SiteCall {
    pub pos: Pos,
    pub ref_base: u8,
    pub filters: FilterSet,
    /// Base calls used for genotyping
    pub depth: u32,
    /// Base calls filtered before genotyping
    pub filtered_depth: u32,
    pub is_blockable: bool,
    pub is_unphasable: bool,
    pub model: SiteModel,
}

impl SiteCall {
    /// Reference call standing in for a position without input evidence.
    pub fn empty(pos: Pos, ref_base: u8) -> Self {
        Self {
            pos,
            ref_base,
            filters: FilterSet::new(),
            depth: 0,
            filtered_depth: 0,
            is_blockable: true,
            is_unphasable: true,
            model: SiteModel::Diploid(DiploidSite {
                alleles: [ref_base, ref_base],
                qual: 0,
                gq: 0,
                gqx: 0,
                modified_gt: ModifiedGenotype::None,
                is_zero_ploidy: false,
                is_noploid: false,
            }),
        }
    }

    pub fn model_name(&self) -> &'static str {
        match self.model {
            SiteModel::Diploid(_) => "diploid",
            SiteModel::Continuous(_) => "continuous",
        }
    }

    pub fn diploid(&self) -> Option<&DiploidSite> {
        match &self.model {
            SiteModel::Diploid(dgt) => Some(dgt),
            SiteModel::Continuous(_) => None,
        }
    }

    pub fn diploid_mut(&mut self) -> Option<&mut DiploidSite> {
        match &mut self.model {
            SiteModel::Diploid(dgt) => Some(dgt),
            SiteModel::Continuous(_) => None,
        }
    }

    /// True when the called genotype matches the reference.
    pub fn is_ref(&self) -> bool {
        match &self.model {
            SiteModel::Diploid(dgt) => dgt.alleles.iter().all(|base| *base == self.ref_base),
            SiteModel::Continuous(cont) => cont.alt_base.is_none(),
        }
    }

    pub fn is_het(&self) -> bool {
        match &self.model {
            SiteModel::Diploid(dgt) => dgt.alleles[0] != dgt.alleles[1],
            SiteModel::Continuous(cont) => {
                cont.alt_base.is_some() && cont.variant_freq < CONTINUOUS_HOM_VF
            }
        }
    }

    pub fn qual(&self) -> i32 {
        match &self.model {
            SiteModel::Diploid(dgt) => dgt.qual,
            SiteModel::Continuous(cont) => cont.qual,
        }
    }

    pub fn gq(&self) -> i32 {
        match &self.model {
            SiteModel::Diploid(dgt) => dgt.gq,
            SiteModel::Continuous(cont) => cont.gq,
        }
    }

    pub fn gqx(&self) -> i32 {
        match &self.model {
            SiteModel::Diploid(dgt) => dgt.gqx,
            SiteModel::Continuous(cont) => cont.gqx,
        }
    }

    pub fn is_zero_ploidy(&self) -> bool {
        self.diploid().is_some_and(|dgt| dgt.is_zero_ploidy)
    }

    /// Distinct non-reference bases, in call order.
    pub fn alt_bases(&self) -> Vec<u8> {
        match &self.model {
            SiteModel::Diploid(dgt) => {
                let mut alts = Vec::with_capacity(2);
                for base in dgt.alleles {
                    if base != self.ref_base && !alts.contains(&base) {
                        alts.push(base);
                    }
                }
                alts
            }
            SiteModel::Continuous(cont) => cont.alt_base.into_iter().collect(),
        }
    }

    /// VCF-style genotype string.
    pub fn genotype_label(&self) -> String {
        match &self.model {
            SiteModel::Diploid(dgt) => match dgt.modified_gt {
                ModifiedGenotype::Zero => "0".to_string(),
                ModifiedGenotype::One => "1".to_string(),
                ModifiedGenotype::Unknown => ".".to_string(),
                ModifiedGenotype::None => {
                    let alts = self.alt_bases();
                    let index = |base: u8| -> usize {
                        if base == self.ref_base {
                            0
                        } else {
                            alts.iter().position(|alt| *alt == base).map_or(0, |i| i + 1)
                        }
                    };
                    let mut gt = [index(dgt.alleles[0]), index(dgt.alleles[1])];
                    gt.sort_unstable();
                    format!("{}/{}", gt[0], gt[1])
                }
            },
            SiteModel::Continuous(_) => {
                if self.is_ref() {
                    "0/0".to_string()
                } else if self.is_het() {
                    "0/1".to_string()
                } else {
                    "1/1".to_string()
                }
            }
        }
    }
}
