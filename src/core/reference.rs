use super::variant::Pos;

/// Upper-cased slice of one contig, addressed by genome position.
#[derive(Debug, Clone)]
pub struct ReferenceSegment {
    contig: String,
    offset: Pos,
    seq: Vec<u8>,
}

impl ReferenceSegment {
    pub fn new(contig: impl Into<String>, offset: Pos, seq: &[u8]) -> Self {
        Self {
            contig: contig.into(),
            offset,
            seq: seq.to_ascii_uppercase(),
        }
    }

    pub fn contig(&self) -> &str {
        &self.contig
    }

    pub fn start(&self) -> Pos {
        self.offset
    }

    pub fn end(&self) -> Pos {
        self.offset + self.seq.len() as Pos
    }

    /// Base at `pos`, `N` outside the loaded segment.
    pub fn get_base(&self, pos: Pos) -> u8 {
        if pos < self.offset {
            return b'N';
        }
        self.seq
            .get((pos - self.offset) as usize)
            .copied()
            .unwrap_or(b'N')
    }

    /// Bases in `[begin, end)`, padded with `N` where the segment has no data.
    pub fn get_seq(&self, begin: Pos, end: Pos) -> Vec<u8> {
        (begin..end).map(|pos| self.get_base(pos)).collect()
    }
}
