use super::{filters::FilterSet, Pos};
use rust_htslib::bam::record::{Cigar, CigarString};
use std::{cmp::Ordering, fmt};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum IndelType {
    Insert,
    Delete,
    /// Deletion and insertion at the same locus
    Complex,
    Breakpoint,
}

impl fmt::Display for IndelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IndelType::Insert => write!(f, "INS"),
            IndelType::Delete => write!(f, "DEL"),
            IndelType::Complex => write!(f, "COMPLEX"),
            IndelType::Breakpoint => write!(f, "BP"),
        }
    }
}

/// Identifies an indel locus. `pos` is the first reference base changed by the indel.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct IndelKey {
    pub pos: Pos,
    pub kind: IndelType,
    pub delete_length: u32,
    pub insert_seq: Vec<u8>,
}

impl IndelKey {
    pub fn new(pos: Pos, delete_length: u32, insert_seq: Vec<u8>) -> Self {
        let kind = match (delete_length, insert_seq.is_empty()) {
            (0, _) => IndelType::Insert,
            (_, true) => IndelType::Delete,
            _ => IndelType::Complex,
        };
        Self {
            pos,
            kind,
            delete_length,
            insert_seq,
        }
    }

    pub fn breakpoint(pos: Pos) -> Self {
        Self {
            pos,
            kind: IndelType::Breakpoint,
            delete_length: 0,
            insert_seq: Vec::new(),
        }
    }

    pub fn insert_length(&self) -> usize {
        self.insert_seq.len()
    }

    pub fn right_pos(&self) -> Pos {
        self.pos + Pos::from(self.delete_length)
    }

    pub fn is_breakpoint(&self) -> bool {
        self.kind == IndelType::Breakpoint
    }

    /// Whether `pos` is a reference base removed by this indel.
    pub fn deletes(&self, pos: Pos) -> bool {
        pos >= self.pos && pos < self.right_pos()
    }

    /// Haplotype alignment of the indel allele, anchored on the preceding reference base.
    pub fn hap_cigar(&self) -> CigarString {
        let mut ops = vec![Cigar::Match(1)];
        if self.delete_length > 0 {
            ops.push(Cigar::Del(self.delete_length));
        }
        if !self.insert_seq.is_empty() {
            ops.push(Cigar::Ins(self.insert_seq.len() as u32));
        }
        CigarString(ops)
    }
}

impl Ord for IndelKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.pos
            .cmp(&other.pos)
            .then_with(|| self.kind.cmp(&other.kind))
            .then_with(|| self.delete_length.cmp(&other.delete_length))
            .then_with(|| self.insert_length().cmp(&other.insert_length()))
            .then_with(|| self.insert_seq.cmp(&other.insert_seq))
    }
}

impl PartialOrd for IndelKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for IndelKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}@{} (del={}, ins={})",
            self.kind,
            self.pos,
            self.delete_length,
            String::from_utf8_lossy(&self.insert_seq)
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndelGenotype {
    HomRef,
    Het,
    HomAlt,
    /// Two different indel alleles, only produced by merging overlapping hets.
    HetAlt,
}

impl IndelGenotype {
    pub fn label(self) -> &'static str {
        match self {
            IndelGenotype::HomRef => "0/0",
            IndelGenotype::Het => "0/1",
            IndelGenotype::HomAlt => "1/1",
            IndelGenotype::HetAlt => "1/2",
        }
    }

    /// Allele index carried by each haplotype, `None` for reference.
    fn haplotypes(self) -> [Option<usize>; 2] {
        match self {
            IndelGenotype::HomRef => [None, None],
            IndelGenotype::Het => [None, Some(0)],
            IndelGenotype::HomAlt => [Some(0), Some(0)],
            IndelGenotype::HetAlt => [Some(0), Some(1)],
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DiploidIndel {
    pub genotype: IndelGenotype,
    pub is_forced_output: bool,
    pub qual: i32,
    pub gq: i32,
    pub gqx: i32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ContinuousIndel {
    pub variant_freq: f64,
    pub qual: i32,
    pub gq: i32,
    pub gqx: i32,
}

#[derive(Debug, Clone, PartialEq)]
pub enum IndelModel {
    Diploid(DiploidIndel),
    Continuous(ContinuousIndel),
}

#[derive(Debug, Clone, PartialEq)]
pub struct IndelAllele {
    pub key: IndelKey,
    pub cigar: Option<CigarString>,
    /// Reads supporting this allele
    pub depth: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct IndelCall {
    /// Never empty; the first allele is the call's own locus.
    alleles: Vec<IndelAllele>,
    pub filters: FilterSet,
    pub is_overlap: bool,
    /// Reads informative for the locus
    pub depth: u32,
    pub ref_depth: u32,
    pub ref_repeat_count: u32,
    pub model: IndelModel,
}

impl IndelCall {
    pub fn new(key: IndelKey, alt_depth: u32, model: IndelModel) -> Self {
        Self {
            alleles: vec![IndelAllele {
                key,
                cigar: None,
                depth: alt_depth,
            }],
            filters: FilterSet::new(),
            is_overlap: false,
            depth: 0,
            ref_depth: 0,
            ref_repeat_count: 0,
            model,
        }
    }

    pub fn key(&self) -> &IndelKey {
        &self.alleles[0].key
    }

    pub fn alleles(&self) -> &[IndelAllele] {
        &self.alleles
    }

    pub fn pos(&self) -> Pos {
        self.key().pos
    }

    /// End of the reference span touched by any allele.
    pub fn end(&self) -> Pos {
        self.alleles
            .iter()
            .map(|allele| allele.key.right_pos())
            .max()
            .unwrap_or_else(|| self.pos())
    }

    pub fn model_name(&self) -> &'static str {
        match self.model {
            IndelModel::Diploid(_) => "diploid",
            IndelModel::Continuous(_) => "continuous",
        }
    }

    pub fn diploid(&self) -> Option<&DiploidIndel> {
        match &self.model {
            IndelModel::Diploid(dindel) => Some(dindel),
            IndelModel::Continuous(_) => None,
        }
    }

    pub fn is_breakpoint(&self) -> bool {
        self.key().is_breakpoint()
    }

    pub fn is_het(&self) -> bool {
        self.diploid()
            .is_some_and(|dindel| dindel.genotype == IndelGenotype::Het)
    }

    pub fn is_hom_ref(&self) -> bool {
        self.diploid()
            .is_some_and(|dindel| dindel.genotype == IndelGenotype::HomRef)
    }

    pub fn is_forced_output(&self) -> bool {
        self.diploid().is_some_and(|dindel| dindel.is_forced_output)
    }

    pub fn qual(&self) -> i32 {
        match &self.model {
            IndelModel::Diploid(dindel) => dindel.qual,
            IndelModel::Continuous(cont) => cont.qual,
        }
    }

    pub fn gq(&self) -> i32 {
        match &self.model {
            IndelModel::Diploid(dindel) => dindel.gq,
            IndelModel::Continuous(cont) => cont.gq,
        }
    }

    pub fn gqx(&self) -> i32 {
        match &self.model {
            IndelModel::Diploid(dindel) => dindel.gqx,
            IndelModel::Continuous(cont) => cont.gqx,
        }
    }

    pub fn genotype_label(&self) -> &'static str {
        match &self.model {
            IndelModel::Diploid(dindel) => dindel.genotype.label(),
            IndelModel::Continuous(cont) => {
                if cont.variant_freq >= crate::constants::CONTINUOUS_HOM_VF {
                    "1/1"
                } else {
                    "0/1"
                }
            }
        }
    }

    /// Assigns each allele its haplotype alignment descriptor.
    pub fn set_hap_cigar(&mut self) {
        for allele in self.alleles.iter_mut() {
            allele.cigar = Some(allele.key.hap_cigar());
        }
    }

    /// Number of haplotypes that still carry the reference base at `pos`.
    pub fn ploidy_at(&self, pos: Pos) -> u32 {
        let IndelModel::Diploid(dindel) = &self.model else {
            return 2;
        };
        dindel
            .genotype
            .haplotypes()
            .iter()
            .filter(|hap| match hap {
                None => true,
                Some(index) => self
                    .alleles
                    .get(*index)
                    .map_or(true, |allele| !allele.key.deletes(pos)),
            })
            .count() as u32
    }

    /// Folds a second overlapping het call into this one as an extra ALT allele.
    pub fn add_overlap(&mut self, other: IndelCall) {
        let IndelCall {
            alleles,
            filters,
            depth,
            model,
            ..
        } = other;
        if let (IndelModel::Diploid(dindel), IndelModel::Diploid(other_dindel)) =
            (&mut self.model, &model)
        {
            dindel.genotype = IndelGenotype::HetAlt;
            dindel.qual = dindel.qual.min(other_dindel.qual);
            dindel.gq = dindel.gq.min(other_dindel.gq);
            dindel.gqx = dindel.gqx.min(other_dindel.gqx);
        }
        self.filters.union(filters);
        self.depth = self.depth.max(depth);
        self.alleles.extend(alleles);
    }
}
