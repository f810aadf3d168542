use anyhow::{bail, Context, Result};
use clap::Parser;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use profile_migrator::{
    Document, MigrationConfig, MigrationEngine, ReportFormat, TransformationError,
    TransformationReporter,
};

#[derive(Parser, Debug)]
#[command(name = "profile-migrator")]
#[command(about = "Migrate a WordPress export from the profiles field layout to the person layout")]
struct Args {
    /// Path to the WordPress export (WXR) file
    input: PathBuf,

    /// Output file (defaults to <input>-migrated.xml next to the input)
    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,

    /// YAML rules file; sections it leaves out keep their built-in defaults
    #[arg(long, value_name = "FILE")]
    rules: Option<PathBuf>,

    /// Run the migration and print the report without writing anything
    #[arg(long)]
    dry_run: bool,

    /// Remove source fields once the new layout holds their value
    #[arg(long)]
    purge_superseded: bool,

    /// Report format: console, json or yaml
    #[arg(long, value_name = "FORMAT", default_value = "console")]
    report_format: ReportFormat,

    /// Log level for migration progress (overridden by RUST_LOG)
    #[arg(long, default_value = "info")]
    log_level: String,
}

fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("profile_migrator={},warn", args.log_level).into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    run(args)
}

fn run(args: Args) -> Result<()> {
    let mut config = match &args.rules {
        Some(path) => {
            info!("Loading rules from {}", path.display());
            MigrationConfig::from_path(path)?
        }
        None => MigrationConfig::default(),
    };
    if args.purge_superseded {
        config.purge_superseded = true;
    }

    let engine = match MigrationEngine::new(config) {
        Ok(engine) => engine,
        Err(TransformationError::ValidationFailed(report)) => {
            for error in &report.errors {
                eprintln!("  ❌ {}: {}", error.field_path, error.message);
                if let Some(fix) = &error.suggested_fix {
                    eprintln!("     {}", fix);
                }
            }
            bail!("Rule set has {} error(s)", report.errors.len());
        }
        Err(e) => return Err(e.into()),
    };

    let xml = fs::read_to_string(&args.input)
        .with_context(|| format!("Failed to read {}", args.input.display()))?;
    let mut document = Document::parse(&xml)
        .with_context(|| format!("Failed to parse {}", args.input.display()))?;
    info!("Parsed {} ({} records)", args.input.display(), document.record_count());

    let result = engine
        .migrate(&mut document)
        .with_context(|| format!("Migration of {} aborted, nothing was written", args.input.display()))?;

    let migrated = document
        .to_bytes()
        .context("Failed to serialize the migrated export")?;

    let output_file = if args.dry_run {
        info!("Dry run, skipping output");
        None
    } else {
        let path = args
            .output
            .clone()
            .unwrap_or_else(|| get_unique_output_path(&args.input));
        if path == args.input {
            warn!("Overwriting input file {}", path.display());
        }
        let mut file = File::create(&path)
            .with_context(|| format!("Failed to create {}", path.display()))?;
        file.write_all(&migrated)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        Some(path)
    };

    let reporter = TransformationReporter::new().with_format(args.report_format);
    let report = reporter.generate_report(
        &result,
        output_file.as_ref().map(|path| path.display().to_string()),
        args.dry_run,
    );
    println!("{}", reporter.format_report(&report)?);

    if args.report_format == ReportFormat::Console {
        println!("=== Migration Complete ===");
        match &output_file {
            Some(path) => println!("  ✓ Output file: {}", path.display()),
            None => println!("  ✓ Dry run: no file written"),
        }
    }

    Ok(())
}

/// `<stem>-migrated.<ext>` next to the input, numbered if that name is taken.
fn get_unique_output_path(input: &Path) -> PathBuf {
    let stem = input
        .file_stem()
        .map_or_else(|| "export".to_string(), |stem| stem.to_string_lossy().into_owned());
    let extension = input
        .extension()
        .map_or_else(|| "xml".to_string(), |ext| ext.to_string_lossy().into_owned());
    let directory = input.parent().unwrap_or_else(|| Path::new(""));

    let mut count = 0;
    let mut path = directory.join(format!("{}-migrated.{}", stem, extension));
    while path.exists() {
        count += 1;
        path = directory.join(format!("{}-migrated-{}.{}", stem, count, extension));
    }

    path
}
