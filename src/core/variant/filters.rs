use std::fmt;

/// Named filters that can be attached to a call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Filter {
    IndelConflict,
    SiteConflict,
    PloidyConflict,
    LowGQX,
    HighDepth,
    HighBaseFilt,
    HighRefRep,
}

impl Filter {
    pub const ALL: [Filter; 7] = [
        Filter::IndelConflict,
        Filter::SiteConflict,
        Filter::PloidyConflict,
        Filter::LowGQX,
        Filter::HighDepth,
        Filter::HighBaseFilt,
        Filter::HighRefRep,
    ];

    pub fn id(self) -> &'static str {
        match self {
            Filter::IndelConflict => "IndelConflict",
            Filter::SiteConflict => "SiteConflict",
            Filter::PloidyConflict => "PloidyConflict",
            Filter::LowGQX => "LowGQX",
            Filter::HighDepth => "HighDepth",
            Filter::HighBaseFilt => "HighBaseFilt",
            Filter::HighRefRep => "HighRefRep",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            Filter::IndelConflict => "Locus is in region with conflicting indel calls",
            Filter::SiteConflict => "Site genotype conflicts with proximal indel call",
            Filter::PloidyConflict => "Genotype call is inconsistent with the expected ploidy",
            Filter::LowGQX => "Locus GQX is below the configured minimum",
            Filter::HighDepth => "Locus depth is greater than the configured maximum",
            Filter::HighBaseFilt => {
                "Fraction of base calls filtered at this site exceeds the configured maximum"
            }
            Filter::HighRefRep => "Indel reference repeat count exceeds the configured maximum",
        }
    }

    pub fn from_id(id: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|filter| filter.id() == id)
    }

    fn bit(self) -> u16 {
        1 << (self as u16)
    }
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

/// Unordered set of filters, rendered in declaration order.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct FilterSet(u16);

impl FilterSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, filter: Filter) {
        self.0 |= filter.bit();
    }

    pub fn unset(&mut self, filter: Filter) {
        self.0 &= !filter.bit();
    }

    pub fn test(&self, filter: Filter) -> bool {
        self.0 & filter.bit() != 0
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    pub fn union(&mut self, other: FilterSet) {
        self.0 |= other.0;
    }

    pub fn iter(&self) -> impl Iterator<Item = Filter> + '_ {
        Filter::ALL.into_iter().filter(|filter| self.test(*filter))
    }
}

impl FromIterator<Filter> for FilterSet {
    fn from_iter<I: IntoIterator<Item = Filter>>(iter: I) -> Self {
        let mut filters = FilterSet::new();
        for filter in iter {
            filters.set(filter);
        }
        filters
    }
}

impl fmt::Display for FilterSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return f.write_str("PASS");
        }
        let ids: Vec<&str> = self.iter().map(Filter::id).collect();
        f.write_str(&ids.join(";"))
    }
}
