use crate::{cli::FULL_VERSION, constants::VCF_FILEFORMAT, core::variant::Filter, utils::util::Result};
use rust_htslib::{bcf, bgzf};
use std::{
    env,
    fs::File,
    io::{self, BufWriter, Write},
    path::Path,
};

fn is_bgzf_output(path: &str) -> bool {
    let path_lower = path.to_lowercase();
    path_lower.ends_with(".gz") || path_lower.ends_with(".bgz")
}

/// Opens the gVCF sink: standard output when `output` is `None`, BGZF for `.gz` paths.
pub fn open_output(output: Option<&str>) -> Result<Box<dyn Write>> {
    let Some(path) = output else {
        return Ok(Box::new(BufWriter::new(io::stdout())));
    };
    if is_bgzf_output(path) {
        let writer = bgzf::Writer::from_path(path)
            .map_err(|e| crate::gvx_error!("Failed to create BGZF output {}: {}", path, e))?;
        log::debug!("Writer: BGZF-compressed output to {}", path);
        return Ok(Box::new(writer));
    }
    let file = File::create(path)
        .map_err(|e| crate::gvx_error!("Failed to create output {}: {}", path, e))?;
    Ok(Box::new(BufWriter::new(file)))
}

/// Builds a tabix index next to a finished BGZF output; other outputs are left as is.
pub fn build_output_index(output: Option<&str>) -> Result<()> {
    let Some(path) = output.filter(|path| is_bgzf_output(path)) else {
        return Ok(());
    };
    log::debug!("Writer: Building TBI index for output {}", path);
    bcf::index::build(path, None, 1, bcf::index::Type::Tbx)
        .map_err(|e| crate::gvx_error!("Failed to build TBI index for output {}: {}", path, e))
}

/// Everything the header needs to describe a run.
pub struct GvcfHeader<'a> {
    pub sample_name: &'a str,
    pub reference_path: &'a Path,
    pub contigs: &'a [(String, u64)],
    pub block_label: &'a str,
    pub block_frac_tol: f64,
    pub block_abs_tol: i32,
    pub include_version: bool,
}

const INFO_LINES: &[&str] = &[
    r#"##INFO=<ID=END,Number=1,Type=Integer,Description="End position of the region described in this record">"#,
    r#"##INFO=<ID=CIGAR,Number=A,Type=String,Description="CIGAR alignment for each alternate indel allele">"#,
    r#"##INFO=<ID=REFREP,Number=1,Type=Integer,Description="Number of times the indel repeat unit occurs in the reference">"#,
    r#"##INFO=<ID=OVERLAP,Number=0,Type=Flag,Description="Two overlapping heterozygous indels reported as one locus">"#,
];

const FORMAT_LINES: &[&str] = &[
    r#"##FORMAT=<ID=GT,Number=1,Type=String,Description="Genotype">"#,
    r#"##FORMAT=<ID=GQ,Number=1,Type=Integer,Description="Genotype Quality">"#,
    r#"##FORMAT=<ID=GQX,Number=1,Type=Integer,Description="Minimum of {Genotype quality assuming variant position,Genotype quality assuming non-variant position}">"#,
    r#"##FORMAT=<ID=DP,Number=1,Type=Integer,Description="Filtered basecall depth used for site genotyping">"#,
    r#"##FORMAT=<ID=DPF,Number=1,Type=Integer,Description="Basecalls filtered from input prior to site genotyping">"#,
    r#"##FORMAT=<ID=MIN_DP,Number=1,Type=Integer,Description="Minimum filtered basecall depth used for site genotyping within a non-variant block">"#,
    r#"##FORMAT=<ID=DPI,Number=1,Type=Integer,Description="Read depth associated with indel, taken from the site preceding the indel">"#,
    r#"##FORMAT=<ID=AD,Number=R,Type=Integer,Description="Allelic depths for the ref and alt alleles in the order listed">"#,
    r#"##FORMAT=<ID=VF,Number=1,Type=Float,Description="Variant frequency">"#,
];

pub fn write_header<W: Write + ?Sized>(out: &mut W, header: &GvcfHeader<'_>) -> Result<()> {
    writeln!(out, "##fileformat={}", VCF_FILEFORMAT)?;
    writeln!(
        out,
        "##fileDate={}",
        chrono::Local::now().format("%Y%m%d")
    )?;
    writeln!(out, "##source={}", env!("CARGO_PKG_NAME"))?;
    if header.include_version {
        writeln!(out, "##{}Version={}", env!("CARGO_PKG_NAME"), &**FULL_VERSION)?;
        let command_line = env::args().collect::<Vec<String>>().join(" ");
        writeln!(out, "##{}Command={}", env!("CARGO_PKG_NAME"), command_line)?;
    }
    writeln!(out, "##reference=file://{}", header.reference_path.display())?;
    for (name, length) in header.contigs {
        writeln!(out, "##contig=<ID={},length={}>", name, length)?;
    }

    for line in INFO_LINES {
        writeln!(out, "{line}")?;
    }
    writeln!(
        out,
        "##INFO=<ID={},Number=0,Type=Flag,Description=\"Non-variant site block. All sites in a block are constrained to be non-variant, have the same filter value, and have sample values in range [x,y], y <= max(x+{},(x*{:.1}))\">",
        header.block_label,
        header.block_abs_tol,
        1.0 + header.block_frac_tol,
    )?;
    for line in FORMAT_LINES {
        writeln!(out, "{line}")?;
    }
    for filter in Filter::ALL {
        writeln!(
            out,
            "##FILTER=<ID={},Description=\"{}\">",
            filter.id(),
            filter.description()
        )?;
    }
    writeln!(
        out,
        "#CHROM\tPOS\tID\tREF\tALT\tQUAL\tFILTER\tINFO\tFORMAT\t{}",
        header.sample_name
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_htslib::bcf::Read as _;
    use std::io::Read;
    use tempfile::tempdir;

    fn test_header<'a>(contigs: &'a [(String, u64)]) -> GvcfHeader<'a> {
        GvcfHeader {
            sample_name: "NA12878",
            reference_path: Path::new("/data/ref.fa"),
            contigs,
            block_label: "BLOCKAVG_min30p3a",
            block_frac_tol: 0.3,
            block_abs_tol: 3,
            include_version: false,
        }
    }

    #[test]
    fn header_declares_contigs_filters_and_sample() {
        let contigs = vec![("chr1".to_string(), 1000), ("chr2".to_string(), 500)];
        let mut out = Vec::new();
        write_header(&mut out, &test_header(&contigs)).unwrap();
        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(lines[0], "##fileformat=VCFv4.1");
        assert!(lines.contains(&"##contig=<ID=chr2,length=500>"));
        assert!(lines.contains(&"##reference=file:///data/ref.fa"));
        assert!(lines
            .iter()
            .any(|line| line.starts_with("##INFO=<ID=BLOCKAVG_min30p3a,Number=0,Type=Flag")));
        assert!(lines.iter().any(|line| line.contains("y <= max(x+3,(x*1.3))")));
        for filter in Filter::ALL {
            let prefix = format!("##FILTER=<ID={},", filter.id());
            assert!(lines.iter().any(|line| line.starts_with(&prefix)));
        }
        assert!(!lines.iter().any(|line| line.contains("Command=")));
        assert_eq!(
            *lines.last().unwrap(),
            "#CHROM\tPOS\tID\tREF\tALT\tQUAL\tFILTER\tINFO\tFORMAT\tNA12878"
        );
    }

    #[test]
    fn gz_output_is_bgzf_compressed() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out.g.vcf.gz");
        let path_str = path.to_str().unwrap();
        {
            let mut out = open_output(Some(path_str)).unwrap();
            writeln!(out, "##fileformat=VCFv4.1").unwrap();
            out.flush().unwrap();
        }
        assert!(bgzf::is_bgzip(&path).unwrap());

        let mut reader = bgzf::Reader::from_path(&path).unwrap();
        let mut text = String::new();
        reader.read_to_string(&mut text).unwrap();
        assert_eq!(text, "##fileformat=VCFv4.1\n");
    }

    #[test]
    fn gz_output_gets_tabix_index() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out.g.vcf.gz");
        let path_str = path.to_str().unwrap();
        let contigs = vec![("chr1".to_string(), 1000)];
        {
            let mut out = open_output(Some(path_str)).unwrap();
            write_header(&mut out, &test_header(&contigs)).unwrap();
            writeln!(
                out,
                "chr1\t5\t.\tA\t.\t.\tPASS\t.\tGT:GQ:GQX:DP:DPF\t0/0:50:50:30:0"
            )
            .unwrap();
            out.flush().unwrap();
        }
        build_output_index(Some(path_str)).unwrap();
        assert!(dir.path().join("out.g.vcf.gz.tbi").exists());

        let mut reader = bcf::IndexedReader::from_path(&path).unwrap();
        let rid = reader.header().name2rid(b"chr1").unwrap();
        reader.fetch(rid, 0, Some(10)).unwrap();
        assert_eq!(reader.records().count(), 1);
    }

    #[test]
    fn plain_output_is_not_indexed() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out.g.vcf");
        std::fs::write(&path, "x").unwrap();
        build_output_index(path.to_str()).unwrap();
        assert!(!dir.path().join("out.g.vcf.tbi").exists());
        build_output_index(None).unwrap();
    }

    #[test]
    fn plain_output_is_uncompressed() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out.g.vcf");
        {
            let mut out = open_output(path.to_str()).unwrap();
            write!(out, "x").unwrap();
            out.flush().unwrap();
        }
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "x");
    }
}
