use crate::{core::variant::Pos, utils::util::Result};
use std::{fmt, ops::Range};

/// A `contig[:start[-end]]` region, stored 0-based half-open.
#[derive(Debug, Clone, PartialEq)]
pub struct GenomeRegion {
    pub contig: String,
    pub start: Pos,
    pub end: Option<Pos>,
}

impl GenomeRegion {
    pub fn whole_contig(contig: impl Into<String>) -> Self {
        Self {
            contig: contig.into(),
            start: 0,
            end: None,
        }
    }

    /// Half-open range of the region clamped to `contig_len`.
    pub fn range(&self, contig_len: u64) -> Range<Pos> {
        let contig_len = contig_len as Pos;
        let end = self.end.map_or(contig_len, |end| end.min(contig_len));
        self.start.min(end)..end
    }
}

impl fmt::Display for GenomeRegion {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.end {
            Some(end) => write!(f, "{}:{}-{}", self.contig, self.start + 1, end),
            None if self.start > 0 => write!(f, "{}:{}", self.contig, self.start + 1),
            None => write!(f, "{}", self.contig),
        }
    }
}

fn parse_coordinate(value: &str, region_str: &str) -> Result<Pos> {
    let value = value.trim().replace(',', "");
    if value.is_empty() {
        return Err(crate::gvx_error!(
            "Empty coordinate in region '{}'",
            region_str
        ));
    }
    let parsed = value.parse::<Pos>().map_err(|error| {
        crate::gvx_error!(
            "Failed to parse coordinate '{}' in region '{}': {}",
            value,
            region_str,
            error
        )
    })?;
    if parsed < 1 {
        return Err(crate::gvx_error!(
            "Coordinate {} must be greater than or equal to 1 (1-based) in region '{}'",
            parsed,
            region_str
        ));
    }
    Ok(parsed)
}

/// Parses a samtools-style region, e.g. `chr1`, `chr1:1000` or `chr1:1,000-2,000`.
///
/// Coordinates are 1-based and inclusive on input.
pub fn parse_region(s: &str) -> Result<GenomeRegion> {
    let s = s.trim();
    let (contig, position_part) = match s.rsplit_once(':') {
        Some((contig, positions)) => (contig.trim(), Some(positions.trim())),
        None => (s, None),
    };
    if contig.is_empty() {
        return Err(crate::gvx_error!(
            "Invalid region: Contig cannot be empty in '{}'",
            s
        ));
    }

    let Some(position_part) = position_part else {
        return Ok(GenomeRegion::whole_contig(contig));
    };
    if position_part.is_empty() {
        return Err(crate::gvx_error!(
            "Invalid region: Position part cannot be empty in '{}'",
            s
        ));
    }

    let (start, end) = match position_part.split_once('-') {
        Some((start_str, end_str)) => {
            let start = parse_coordinate(start_str, s)?;
            let end = parse_coordinate(end_str, s)?;
            if start > end {
                return Err(crate::gvx_error!(
                    "Start position {} must be less than or equal to end position {} in region '{}'",
                    start,
                    end,
                    s
                ));
            }
            (start - 1, Some(end))
        }
        None => (parse_coordinate(position_part, s)? - 1, None),
    };

    Ok(GenomeRegion {
        contig: contig.to_string(),
        start,
        end,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_region_whole_contig() {
        assert_eq!(
            parse_region("chr1").unwrap(),
            GenomeRegion::whole_contig("chr1")
        );
    }

    #[test]
    fn test_parse_region_start_and_range() {
        assert_eq!(
            parse_region("chr2:101").unwrap(),
            GenomeRegion {
                contig: "chr2".to_string(),
                start: 100,
                end: None,
            }
        );
        assert_eq!(
            parse_region("chrX:1,001-2,000").unwrap(),
            GenomeRegion {
                contig: "chrX".to_string(),
                start: 1000,
                end: Some(2000),
            }
        );
    }

    #[test]
    fn test_parse_region_keeps_colons_in_contig_name() {
        let region = parse_region("HLA-A*01:01:01:01:1-10").unwrap();
        assert_eq!(region.contig, "HLA-A*01:01:01:01");
        assert_eq!((region.start, region.end), (0, Some(10)));
    }

    #[test]
    fn test_parse_region_invalid() {
        assert!(parse_region(":10").is_err());
        assert!(parse_region("chr1:").is_err());
        assert!(parse_region("chr1:abc").is_err());
        assert!(parse_region("chr1:0").is_err());
        assert!(parse_region("chr1:50-10").is_err());
        assert!(parse_region("chr1:10-").is_err());
        assert!(parse_region("chr1:-10").is_err());
    }

    #[test]
    fn test_region_range_is_clamped() {
        let region = parse_region("chr1:11-500").unwrap();
        assert_eq!(region.range(100), 10..100);
        assert_eq!(GenomeRegion::whole_contig("chr1").range(42), 0..42);
        assert_eq!(parse_region("chr1:200").unwrap().range(100), 100..100);
    }

    #[test]
    fn test_region_display_round_trips() {
        for region in ["chr1", "chr1:5", "chr1:5-10"] {
            assert_eq!(parse_region(region).unwrap().to_string(), region);
        }
    }
}
