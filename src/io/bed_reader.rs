use super::readers::open_bed_file_reader;
use crate::{core::variant::Pos, utils::util::Result};
use std::{collections::HashMap, io::BufRead, path::Path};

/// Sorted, merged half-open intervals on one contig.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RegionList {
    intervals: Vec<(Pos, Pos)>,
}

impl RegionList {
    pub fn new(mut intervals: Vec<(Pos, Pos)>) -> Self {
        intervals.retain(|(start, end)| start < end);
        intervals.sort_unstable();
        let mut merged: Vec<(Pos, Pos)> = Vec::with_capacity(intervals.len());
        for (start, end) in intervals {
            match merged.last_mut() {
                Some(last) if start <= last.1 => last.1 = last.1.max(end),
                _ => merged.push((start, end)),
            }
        }
        Self { intervals: merged }
    }

    pub fn contains(&self, pos: Pos) -> bool {
        let idx = self.intervals.partition_point(|(start, _)| *start <= pos);
        idx > 0 && pos < self.intervals[idx - 1].1
    }

    pub fn len(&self) -> usize {
        self.intervals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.intervals.is_empty()
    }
}

pub fn line_to_interval(line: &str) -> Result<(String, Pos, Pos)> {
    const MIN_FIELD_COUNT: usize = 3;
    let split_line: Vec<&str> = line.split_whitespace().collect();
    if split_line.len() < MIN_FIELD_COUNT {
        return Err(crate::gvx_error!(
            "Expected at least {} fields in the format 'chrom start end', found {}: {}",
            MIN_FIELD_COUNT,
            split_line.len(),
            line
        ));
    }

    let start: Pos = split_line[1]
        .parse()
        .map_err(|e| crate::gvx_error!("Invalid start position: {}", e))?;
    let end: Pos = split_line[2]
        .parse()
        .map_err(|e| crate::gvx_error!("Invalid end position: {}", e))?;
    if start < 0 || end < start {
        return Err(crate::gvx_error!(
            "Invalid interval [{}, {}): {}",
            start,
            end,
            line
        ));
    }

    Ok((split_line[0].to_owned(), start, end))
}

fn is_skippable(line: &str) -> bool {
    let trimmed = line.trim_start();
    trimmed.is_empty()
        || trimmed.starts_with('#')
        || trimmed.starts_with("track")
        || trimmed.starts_with("browser")
}

pub struct BedMap {
    pub interval_map: HashMap<String, RegionList>,
}

impl BedMap {
    pub fn new<P: AsRef<Path>>(bed_path: P) -> Result<Self> {
        let reader = open_bed_file_reader(bed_path.as_ref())?;
        let mut interval_map: HashMap<String, Vec<(Pos, Pos)>> = HashMap::new();

        for (line_number, result_line) in reader.lines().enumerate() {
            let line = result_line
                .map_err(|e| crate::gvx_error!("Error at BED line {}: {}", line_number + 1, e))?;
            if is_skippable(&line) {
                continue;
            }
            let (chrom, start, end) = line_to_interval(&line)
                .map_err(|e| crate::gvx_error!("Error at BED line {}: {}", line_number + 1, e))?;

            interval_map.entry(chrom).or_default().push((start, end));
        }

        let interval_map: HashMap<String, RegionList> = interval_map
            .into_iter()
            .map(|(chrom, intervals)| (chrom, RegionList::new(intervals)))
            .collect();

        log::debug!(
            "Loaded no-compress regions for {} contigs from {}",
            interval_map.len(),
            bed_path.as_ref().display()
        );
        Ok(BedMap { interval_map })
    }

    pub fn regions_for(&self, contig: &str) -> RegionList {
        self.interval_map.get(contig).cloned().unwrap_or_default()
    }
}
