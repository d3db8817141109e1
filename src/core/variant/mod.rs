mod filters;
mod indel;
mod site;

#[cfg(test)]
pub(crate) mod test_utils;

pub use filters::{Filter, FilterSet};
pub use indel::{
    ContinuousIndel, DiploidIndel, IndelAllele, IndelCall, IndelGenotype, IndelKey, IndelModel,
    IndelType,
};
pub use site::{ContinuousSite, DiploidSite, ModifiedGenotype, SiteCall, SiteModel};

use std::fmt;

/// Zero-based genome coordinate.
pub type Pos = i64;

/// A single record of the call stream.
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Site(SiteCall),
    Indel(IndelCall),
}

impl Call {
    pub fn pos(&self) -> Pos {
        match self {
            Call::Site(site) => site.pos,
            Call::Indel(indel) => indel.pos(),
        }
    }
}

impl From<SiteCall> for Call {
    fn from(site: SiteCall) -> Self {
        Call::Site(site)
    }
}

impl From<IndelCall> for Call {
    fn from(indel: IndelCall) -> Self {
        Call::Indel(indel)
    }
}

impl fmt::Display for Call {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Call::Site(site) => write!(
                f,
                "(site: {}, ref: {}, gt: {}, filters: {})",
                site.pos,
                site.ref_base as char,
                site.genotype_label(),
                site.filters
            ),
            Call::Indel(indel) => write!(
                f,
                "(indel: {}, end: {}, gt: {}, filters: {})",
                indel.key(),
                indel.end(),
                indel.genotype_label(),
                indel.filters
            ),
        }
    }
}
