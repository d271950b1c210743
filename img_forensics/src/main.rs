use anyhow::{bail, Context};
use clap::{Parser, Subcommand, ValueEnum};
use console::Term;
use forensic_core::logging::{init_logging, LogConfig};
use forensic_core::{
    CancelToken, CloneScanMode, DetectedFormat, ForensicsError, HeatmapPalette, ImageBuffer, NullProgress, Pipeline,
    PipelineConfig, Report, Submission,
};
use rayon::prelude::*;
use serde_json::json;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info, warn, Level};
use walkdir::WalkDir;

mod output;
mod progress;

use output::{print_check_human, print_report_human, save_overlays};
use progress::{batch_bar, StageProgress};

#[derive(Parser)]
#[command(name = "img_forensics")]
#[command(version, about = "Heuristic image manipulation triage", long_about = None)]
struct Cli {
    /// Mirror debug logs to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run every check on an image, or on every image in a folder
    Analyze {
        #[arg(value_name = "INPUT")]
        input: PathBuf,

        #[arg(short, long)]
        recursive: bool,

        #[arg(short, long, value_enum, default_value = "human")]
        output: OutputFormat,

        /// Use the dense clone scan (16px blocks, 8px stride)
        #[arg(long)]
        deep: bool,

        #[arg(long, value_enum, default_value = "thermal")]
        palette: PaletteArg,

        /// Mime type the file was submitted as (default: implied by the extension)
        #[arg(long, value_name = "MIME")]
        declared_mime: Option<String>,

        /// Write overlay PNGs into this directory
        #[arg(long, value_name = "DIR")]
        overlay_dir: Option<PathBuf>,

        /// Drop overlays from results
        #[arg(long)]
        no_overlays: bool,
    },

    /// Re-run clone detection at high resolution on one image
    Rescan {
        #[arg(value_name = "INPUT")]
        input: PathBuf,

        #[arg(short, long, value_enum, default_value = "human")]
        output: OutputFormat,
    },
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Human,
    Json,
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum)]
enum PaletteArg {
    Thermal,
    Grayscale,
}

impl From<PaletteArg> for HeatmapPalette {
    fn from(p: PaletteArg) -> Self {
        match p {
            PaletteArg::Thermal => HeatmapPalette::Thermal,
            PaletteArg::Grayscale => HeatmapPalette::Grayscale,
        }
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    if let Err(e) = init_logging(
        "img_forensics",
        LogConfig::default().with_level(level).with_stderr(cli.verbose),
    ) {
        eprintln!("⚠️  File logging unavailable: {:#}", e);
    }

    let cancel = CancelToken::new();
    {
        let cancel = cancel.clone();
        if let Err(e) = ctrlc::set_handler(move || cancel.cancel()) {
            warn!(error = %e, "could not install Ctrl-C handler");
        }
    }

    match cli.command {
        Commands::Analyze {
            input,
            recursive,
            output,
            deep,
            palette,
            declared_mime,
            overlay_dir,
            no_overlays,
        } => {
            let config = PipelineConfig::new()
                .with_clone_scan(if deep { CloneScanMode::Deep } else { CloneScanMode::Quick })
                .with_palette(palette.into())
                .with_overlays(!no_overlays);
            let pipeline = Pipeline::new(config);
            let cfg = pipeline.config();
            debug!(
                clone_scan = cfg.clone_scan.as_str(),
                palette = ?cfg.palette,
                overlays = cfg.include_overlays,
                "pipeline configured"
            );
            let opts = AnalyzeOptions {
                output,
                declared_mime,
                overlay_dir,
            };

            if input.is_file() {
                analyze_single_file(&pipeline, &input, &opts, &cancel)?;
            } else if input.is_dir() {
                analyze_directory(&pipeline, &input, recursive, &opts, &cancel)?;
            } else {
                eprintln!("❌ Error: Input path does not exist: {}", input.display());
                std::process::exit(1);
            }
        }

        Commands::Rescan { input, output } => rescan_file(&input, output)?,
    }

    Ok(())
}

struct AnalyzeOptions {
    output: OutputFormat,
    declared_mime: Option<String>,
    overlay_dir: Option<PathBuf>,
}

/// Mime implied by the file extension, empty when unknown.
fn mime_from_extension(path: &Path) -> String {
    path.extension()
        .and_then(|e| e.to_str())
        .and_then(|e| DetectedFormat::from_extension(&e.to_lowercase()))
        .map(|f| f.mime().to_string())
        .unwrap_or_default()
}

fn load_submission(path: &Path, declared_mime: Option<&str>) -> anyhow::Result<Submission> {
    let bytes = std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    let mime = declared_mime
        .map(str::to_string)
        .unwrap_or_else(|| mime_from_extension(path));
    Ok(Submission::new(file_name, mime, bytes))
}

fn finish_report(report: &Report, opts: &AnalyzeOptions) -> anyhow::Result<()> {
    if let Some(dir) = &opts.overlay_dir {
        let written = save_overlays(report, dir)?;
        info!(file = %report.file_name, overlays = written.len(), dir = %dir.display(), "overlays saved");
    }
    Ok(())
}

fn analyze_single_file(
    pipeline: &Pipeline,
    path: &Path,
    opts: &AnalyzeOptions,
    cancel: &CancelToken,
) -> anyhow::Result<()> {
    let submission = load_submission(path, opts.declared_mime.as_deref())?;
    let show_progress = opts.output == OutputFormat::Human && Term::stderr().is_term();
    let progress = StageProgress::new(&submission.file_name, show_progress);

    let result = pipeline.analyze(&submission, &progress, cancel);
    progress.finish();
    let report = result.with_context(|| format!("Failed to analyze {}", path.display()))?;

    finish_report(&report, opts)?;
    match opts.output {
        OutputFormat::Human => print_report_human(&report),
        OutputFormat::Json => println!("{}", report.to_json_pretty()?),
    }
    Ok(())
}

fn collect_images(dir: &Path, recursive: bool) -> Vec<PathBuf> {
    let walker = if recursive {
        WalkDir::new(dir).follow_links(true)
    } else {
        WalkDir::new(dir).max_depth(1)
    };

    let mut files: Vec<PathBuf> = walker
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(e) => Some(e),
            Err(err) => {
                warn!(error = %err, "skipping unreadable directory entry");
                None
            }
        })
        .filter(|e| e.file_type().is_file())
        .map(|e| e.into_path())
        .filter(|p| !mime_from_extension(p).is_empty())
        .collect();
    files.sort();
    files
}

fn analyze_directory(
    pipeline: &Pipeline,
    dir: &Path,
    recursive: bool,
    opts: &AnalyzeOptions,
    cancel: &CancelToken,
) -> anyhow::Result<()> {
    let files = collect_images(dir, recursive);
    if files.is_empty() {
        bail!("No supported images found in {}", dir.display());
    }

    let start = Instant::now();
    let show_progress = Term::stderr().is_term();
    let bar = batch_bar(files.len() as u64, show_progress);

    let results: Vec<(PathBuf, anyhow::Result<Report>)> = files
        .par_iter()
        .map(|path| {
            let result = load_submission(path, opts.declared_mime.as_deref()).and_then(|sub| {
                let report = pipeline.analyze(&sub, &NullProgress, cancel)?;
                finish_report(&report, opts)?;
                Ok(report)
            });
            bar.inc(1);
            (path.clone(), result)
        })
        .collect();
    bar.finish_and_clear();

    let mut analyzed = 0usize;
    let mut failed = 0usize;
    let mut json_results = Vec::new();
    for (path, result) in &results {
        match result {
            Ok(report) => {
                analyzed += 1;
                match opts.output {
                    OutputFormat::Json => json_results.push(serde_json::to_value(report.export())?),
                    OutputFormat::Human => {
                        println!();
                        print_report_human(report);
                    }
                }
            }
            Err(e) => {
                failed += 1;
                let cancelled = e
                    .downcast_ref::<ForensicsError>()
                    .is_some_and(|fe| matches!(fe, ForensicsError::Cancelled(_)));
                if !cancelled {
                    eprintln!("⚠️  Failed to analyze {}: {:#}", path.display(), e);
                }
            }
        }
    }

    info!(
        analyzed,
        failed,
        elapsed_secs = start.elapsed().as_secs_f64(),
        "batch analysis finished"
    );

    match opts.output {
        OutputFormat::Json => println!(
            "{}",
            serde_json::to_string_pretty(&json!({
                "total": files.len(),
                "analyzed": analyzed,
                "failed": failed,
                "results": json_results,
            }))?
        ),
        OutputFormat::Human => {
            println!("\n{}", "=".repeat(80));
            println!(
                "✅ Analysis complete: {} analyzed, {} failed ({:.1}s)",
                analyzed,
                failed,
                start.elapsed().as_secs_f64()
            );
        }
    }
    if cancel.is_cancelled() {
        bail!("Cancelled by user");
    }
    Ok(())
}

fn rescan_file(path: &Path, output: OutputFormat) -> anyhow::Result<()> {
    let submission = load_submission(path, None)?;
    let pipeline = Pipeline::default();
    let pixels = pipeline
        .decode(&submission.bytes)
        .with_context(|| format!("Failed to decode {}", path.display()))?;
    let buffer = ImageBuffer::new(submission, pixels);
    let result = pipeline.rescan_clones(&buffer);

    match output {
        OutputFormat::Human => print_check_human(&result),
        OutputFormat::Json => {
            let exported = forensic_core::ExportedCheck::from(&result);
            println!("{}", serde_json::to_string_pretty(&exported)?);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mime_from_extension() {
        assert_eq!(mime_from_extension(Path::new("a/B.JPG")), "image/jpeg");
        assert_eq!(mime_from_extension(Path::new("x.webp")), "image/webp");
        assert_eq!(mime_from_extension(Path::new("notes.txt")), "");
    }

    #[test]
    fn test_collect_images_respects_depth() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.png"), b"x").unwrap();
        std::fs::write(dir.path().join("readme.md"), b"x").unwrap();
        std::fs::create_dir(dir.path().join("sub")).unwrap();
        std::fs::write(dir.path().join("sub").join("b.jpg"), b"x").unwrap();

        assert_eq!(collect_images(dir.path(), false).len(), 1);
        assert_eq!(collect_images(dir.path(), true).len(), 2);
    }

    #[test]
    fn test_cli_parses_analyze_flags() {
        let cli = Cli::try_parse_from([
            "img_forensics",
            "analyze",
            "photo.jpg",
            "--deep",
            "--palette",
            "grayscale",
            "--output",
            "json",
            "--no-overlays",
        ])
        .unwrap();
        match cli.command {
            Commands::Analyze { deep, palette, output, no_overlays, .. } => {
                assert!(deep && no_overlays);
                assert!(palette == PaletteArg::Grayscale);
                assert!(output == OutputFormat::Json);
            }
            Commands::Rescan { .. } => panic!("expected analyze"),
        }
    }
}
