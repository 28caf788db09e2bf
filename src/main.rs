//! dm3patch CLI: write raw element dumps as DM3 files and inspect the result.

use std::path::{Path, PathBuf};

use anyhow::{Context, bail};
use clap::{Args, Parser, Subcommand, ValueEnum};

use dm3patch::image_pipeline::dm3;
use dm3patch::image_pipeline::{
    AxisCalibration, CalibrationSpec, Dm3Pipeline, ElementKind, InputArray, OffsetMap,
    WriteConfig, WriteOutcome,
};
use dm3patch::logger::{self, info, warn};

#[derive(Parser)]
#[command(name = "dm3patch")]
#[command(about = "Write 2-D arrays as DigitalMicrograph 3 files by patching a reference template")]
#[command(version)]
struct Cli {
    /// Log at debug level unless RUST_LOG says otherwise.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Convert a headerless little-endian element dump to DM3.
    Write(WriteArgs),

    /// Print the patched fields of a DM3 file.
    Inspect {
        /// DM3 file to read.
        file: PathBuf,
    },
}

#[derive(Debug, Clone, Args)]
struct WriteArgs {
    /// Raw element dump, row-major, little-endian.
    #[arg(long)]
    input: PathBuf,

    /// Element kind of the dump.
    #[arg(long, value_enum)]
    kind: KindArg,

    /// Number of rows (ny).
    #[arg(long)]
    rows: usize,

    /// Number of columns (nx).
    #[arg(long)]
    cols: usize,

    /// Destination .dm3 file.
    #[arg(long)]
    out: PathBuf,

    /// Reference template (defaults to $DM3PATCH_TEMPLATE or the bundled file).
    #[arg(long)]
    template: Option<PathBuf>,

    #[arg(long, default_value = "1.0")]
    row_scale: f64,

    #[arg(long, default_value = "0.0")]
    row_offset: f64,

    #[arg(long, default_value = "1.0")]
    col_scale: f64,

    #[arg(long, default_value = "0.0")]
    col_offset: f64,

    /// Leave an existing output file alone.
    #[arg(long)]
    no_overwrite: bool,

    /// Skip checking the template contents against the offset map.
    #[arg(long)]
    no_validate: bool,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum KindArg {
    Bool,
    I8,
    U8,
    I16,
    U16,
    I32,
    U32,
    I64,
    U64,
    F32,
    F64,
}

impl From<KindArg> for ElementKind {
    fn from(kind: KindArg) -> Self {
        match kind {
            KindArg::Bool => ElementKind::Bool,
            KindArg::I8 => ElementKind::I8,
            KindArg::U8 => ElementKind::U8,
            KindArg::I16 => ElementKind::I16,
            KindArg::U16 => ElementKind::U16,
            KindArg::I32 => ElementKind::I32,
            KindArg::U32 => ElementKind::U32,
            KindArg::I64 => ElementKind::I64,
            KindArg::U64 => ElementKind::U64,
            KindArg::F32 => ElementKind::F32,
            KindArg::F64 => ElementKind::F64,
        }
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    logger::init_with_default(if cli.verbose { "debug" } else { "info" });

    match cli.command {
        Commands::Write(args) => run_write(&args),
        Commands::Inspect { file } => run_inspect(&file),
    }
}

fn run_write(args: &WriteArgs) -> anyhow::Result<()> {
    let mut builder = WriteConfig::builder()
        .overwrite(!args.no_overwrite)
        .validate_template(!args.no_validate);
    if let Some(template) = &args.template {
        builder = builder.template_path(template);
    }
    let config = builder.build();
    info!("Template: {}", config.template_path.display());

    let pipeline = Dm3Pipeline::new(config)?;

    let raw = std::fs::read(&args.input)
        .with_context(|| format!("reading {}", args.input.display()))?;
    let array = InputArray::from_le_bytes(args.kind.into(), &[args.rows, args.cols], &raw)?;

    let calibration = CalibrationSpec::new(
        AxisCalibration::new(args.row_scale, args.row_offset),
        AxisCalibration::new(args.col_scale, args.col_offset),
    );

    let (outcome, timings) =
        pipeline.convert_file_with_timings(array, Some(calibration), &args.out)?;
    match outcome {
        WriteOutcome::Written { bytes } => {
            info!("Wrote {} ({} bytes)", args.out.display(), bytes);
            timings.log_summary();
        }
        WriteOutcome::Skipped => warn!("{} exists, not overwritten", args.out.display()),
    }
    Ok(())
}

fn run_inspect(file: &Path) -> anyhow::Result<()> {
    let bytes = std::fs::read(file).with_context(|| format!("reading {}", file.display()))?;
    let fields = dm3::inspect(&bytes, &OffsetMap::REFERENCE_DM3)?;

    println!("file:          {}", file.display());
    println!("version:       {}", fields.version);
    println!("length field:  {} (file {} bytes)", fields.length_field, fields.file_len);
    match fields.kind() {
        Some(kind) => println!("element kind:  {kind}"),
        None => println!(
            "element kind:  unknown (storage {}, display {})",
            fields.storage_code, fields.display_code
        ),
    }
    println!("dimensions:    {} x {} (nx x ny)", fields.cols, fields.rows);
    println!("elements:      {}", fields.element_count);
    println!("pixel depth:   {}", fields.pixel_depth);
    println!("x calibration: scale {} origin {}", fields.col.scale, fields.col.origin);
    println!("y calibration: scale {} origin {}", fields.row.scale, fields.row.origin);
    println!("payload:       bytes {}..{}", fields.payload.start, fields.payload.end);

    if !fields.is_consistent() {
        bail!("{} has inconsistent size fields", file.display());
    }
    Ok(())
}
