use crate::{
    constants::*,
    io::region::{parse_region, GenomeRegion},
};
use anyhow::{anyhow, Result};
use chrono::Datelike;
use clap::{ArgAction, Parser, Subcommand};
use env_logger::fmt::Color;
use log::{Level, LevelFilter};
use once_cell::sync::Lazy;
use std::{
    io::Write,
    path::{Path, PathBuf},
};

/// Full version string including the crate version and git description.
///
/// # Examples
/// * `0.1.0-1ba958a-dirty` - while on a dirty branch
/// * `0.1.0-1ba958a` - with a fresh commit
pub static FULL_VERSION: Lazy<String> = Lazy::new(|| {
    let git_describe = env!("VERGEN_GIT_DESCRIBE");
    if git_describe.is_empty() {
        env!("CARGO_PKG_VERSION").to_string()
    } else {
        format!("{}-{}", env!("CARGO_PKG_VERSION"), git_describe)
    }
});

#[derive(Parser, Debug)]
#[command(name="gvx",
          author="Tom Mokveld <tmokveld@pacificbiosciences.com>",
          version=&**FULL_VERSION,
          about="Genome VCF indel reconciliation and block compression",
          long_about = None,
          after_help = format!("Copyright (C) 2004-{}     Pacific Biosciences of California, Inc.
          This program comes with ABSOLUTELY NO WARRANTY; it is intended for
          Research Use Only and not for use in diagnostic procedures.", chrono::Utc::now().year()),
          help_template = "{name} {version}\n{author}{about-section}\n{usage-heading}\n    {usage}\n\n{all-args}{after-help}",
          )]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Specify multiple times to increase verbosity level (e.g., -vv for more verbosity)
    #[arg(
        short = 'v',
        long = "verbose",
        action = ArgAction::Count,
        global = true
    )]
    pub verbosity: u8,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    Compress(CompressArgs),
}

impl Command {
    pub fn name(&self) -> &'static str {
        match self {
            Command::Compress(_) => "compress",
        }
    }
}

#[derive(Parser, Debug, Clone)]
#[command(arg_required_else_help(true))]
pub struct CompressArgs {
    /// Single-sample call VCF (bgzipped and indexed)
    #[arg(
        long = "vcf",
        value_name = "VCF",
        required = true,
        value_parser = check_file_exists
    )]
    pub vcf: PathBuf,

    /// Reference FASTA file (with .fai index)
    #[arg(
        short = 'r',
        long = "reference",
        value_name = "FASTA",
        required = true,
        value_parser = check_file_exists
    )]
    pub reference: PathBuf,

    /// Write output to a file, BGZF-compressed when ending in .gz [default: standard output]
    #[arg(
        short = 'o',
        long = "output",
        value_name = "FILE",
        value_parser = check_prefix_path
    )]
    pub output: Option<String>,

    /// Sample name for the output column [default: the input sample name]
    #[arg(long = "sample", value_name = "SAMPLE")]
    pub sample: Option<String>,

    /// Restrict output to a region (contig[:start[-end]]), may be given multiple times
    #[arg(
        long = "region",
        value_name = "REGION",
        value_parser = parse_region
    )]
    pub regions: Vec<GenomeRegion>,

    /// BED file of regions where non-variant sites are never compressed into blocks
    #[arg(
        long = "nocompress-bed",
        value_name = "BED",
        value_parser = check_file_exists
    )]
    pub nocompress_bed: Option<PathBuf>,

    /// Do not append version and command line to the header
    #[arg(long = "no-version", help_heading = "Advanced")]
    pub no_version: bool,

    #[command(flatten)]
    pub compress_args: CompressArgsInner,
}

#[derive(Parser, Debug, Clone)]
pub struct CompressArgsInner {
    /// Fractional GQX/depth tolerance of a non-variant block
    #[arg(
        help_heading("Advanced"),
        long,
        default_value_t = DEFAULT_BLOCK_FRAC_TOL,
        value_parser = fraction_in_range
    )]
    pub block_frac_tol: f64,

    /// Absolute GQX/depth tolerance of a non-variant block
    #[arg(
        help_heading("Advanced"),
        long,
        default_value_t = DEFAULT_BLOCK_ABS_TOL,
        value_parser = non_negative
    )]
    pub block_abs_tol: i32,

    /// Minimum GQX of a site (and of a hom-ref indel) before it is filtered LowGQX
    #[arg(
        help_heading("Advanced"),
        long,
        default_value_t = DEFAULT_MIN_SITE_GQX
    )]
    pub min_site_gqx: i32,

    /// Minimum GQX of a variant indel before it is filtered LowGQX
    #[arg(
        help_heading("Advanced"),
        long,
        default_value_t = DEFAULT_MIN_INDEL_GQX
    )]
    pub min_indel_gqx: i32,

    /// Maximum fraction of filtered base calls at a site
    #[arg(
        help_heading("Advanced"),
        long,
        default_value_t = DEFAULT_MAX_BASE_FILTER_FRAC,
        value_parser = fraction_in_range
    )]
    pub max_base_filter_frac: f64,

    /// Maximum depth before a call is filtered HighDepth [default: no limit]
    #[arg(help_heading("Advanced"), long, value_name = "DEPTH")]
    pub max_depth: Option<u32>,

    /// Maximum reference repeat count of an indel
    #[arg(
        help_heading("Advanced"),
        long,
        default_value_t = DEFAULT_MAX_INDEL_REF_REPEAT
    )]
    pub max_indel_ref_repeat: u32,
}

impl Default for CompressArgsInner {
    fn default() -> Self {
        Self {
            block_frac_tol: DEFAULT_BLOCK_FRAC_TOL,
            block_abs_tol: DEFAULT_BLOCK_ABS_TOL,
            min_site_gqx: DEFAULT_MIN_SITE_GQX,
            min_indel_gqx: DEFAULT_MIN_INDEL_GQX,
            max_base_filter_frac: DEFAULT_MAX_BASE_FILTER_FRAC,
            max_depth: None,
            max_indel_ref_repeat: DEFAULT_MAX_INDEL_REF_REPEAT,
        }
    }
}

/// Initializes the verbosity level for logging based on the command-line arguments.
///
/// `-v` enables debug output, `-vv` and above enable trace output.
pub fn init_verbose(args: &Cli) {
    let filter_level: LevelFilter = match args.verbosity {
        0 => LevelFilter::Info,
        1 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };

    env_logger::Builder::from_default_env()
        .format(|buf, record| {
            let level = record.level();
            let mut style = buf.style();
            match record.level() {
                Level::Error => style.set_color(Color::Red),
                Level::Warn => style.set_color(Color::Yellow),
                Level::Info => style.set_color(Color::Green),
                Level::Debug => style.set_color(Color::Blue),
                Level::Trace => style.set_color(Color::Cyan),
            };

            writeln!(
                buf,
                "{} [{}] {} - {}",
                chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
                style.value(level),
                record.module_path().unwrap_or("unknown_module"),
                record.args()
            )
        })
        .filter_level(filter_level)
        .init();
}

fn check_file_exists(s: &str) -> Result<PathBuf> {
    let path = Path::new(s);
    if !path.exists() {
        return Err(anyhow!("File does not exist: {}", path.display()));
    }
    Ok(path.to_path_buf())
}

fn check_prefix_path(s: &str) -> Result<String> {
    let path = Path::new(s);
    if let Some(parent_dir) = path.parent() {
        if !parent_dir.as_os_str().is_empty() && !parent_dir.exists() {
            return Err(anyhow!("Path does not exist: {}", parent_dir.display()));
        }
    }
    Ok(s.to_string())
}

fn fraction_in_range(s: &str) -> Result<f64> {
    let value: f64 = s
        .parse::<f64>()
        .map_err(|_| anyhow!("`{}` is not a valid fraction", s))?;
    if !(0.0..=1.0).contains(&value) {
        return Err(anyhow!("Fraction must be between 0 and 1, got {}", value));
    }
    Ok(value)
}

fn non_negative(s: &str) -> Result<i32> {
    let value: i32 = s
        .parse::<i32>()
        .map_err(|_| anyhow!("`{}` is not a valid integer", s))?;
    if value < 0 {
        return Err(anyhow!("Value must be >= 0, got {}", value));
    }
    Ok(value)
}
