//! Terminal and file output for reports.

use anyhow::{Context, Result};
use console::style;
use forensic_core::{CheckResult, Report, Status, Verdict};
use std::fs;
use std::path::{Path, PathBuf};

pub fn status_label(status: Status) -> String {
    let text = format!("{:<4}", status.as_str());
    match status {
        Status::Ok => style(text).green().to_string(),
        Status::Warn => style(text).yellow().bold().to_string(),
        Status::Fail => style(text).red().bold().to_string(),
        Status::Info => style(text).cyan().to_string(),
    }
}

pub fn verdict_label(verdict: Verdict) -> String {
    let text = verdict.as_str().to_uppercase();
    match verdict {
        Verdict::Clean => style(text).green().bold().to_string(),
        Verdict::Review => style(text).yellow().bold().to_string(),
        Verdict::Suspicious => style(text).red().bold().to_string(),
    }
}

/// Box summary followed by the details of every non-ok check.
pub fn print_report_human(report: &Report) {
    print!("{}", report.render_human());
    let flagged: Vec<&CheckResult> = report.checks.iter().filter(|c| c.status != Status::Ok).collect();
    if !flagged.is_empty() {
        println!();
        for c in flagged {
            print_check_human(c);
        }
    }
    println!("Verdict: {}", verdict_label(report.verdict));
}

pub fn print_check_human(check: &CheckResult) {
    println!(
        "{} {} {}",
        status_label(check.status),
        style(&check.name).bold(),
        style(format!("({:.0}% confidence)", check.confidence * 100.0)).dim()
    );
    println!("   {}", check.summary);
    for (key, value) in check.details.iter() {
        println!("   {} {}", style(format!("{}:", key)).dim(), value);
    }
    if let Some(regions) = &check.regions {
        for r in regions.iter().take(10) {
            println!(
                "   region {}x{} at ({}, {}) {}",
                r.width,
                r.height,
                r.x,
                r.y,
                r.label.as_deref().unwrap_or_default()
            );
        }
        if regions.len() > 10 {
            println!("   ... {} more region(s)", regions.len() - 10);
        }
    }
    if !check.caveats.is_empty() {
        println!("   {}", style(&check.caveats).italic().dim());
    }
}

/// Write every overlay as `<dir>/<file stem>.<check id>.png`. Returns the written paths.
pub fn save_overlays(report: &Report, dir: &Path) -> Result<Vec<PathBuf>> {
    fs::create_dir_all(dir).with_context(|| format!("Failed to create overlay directory: {}", dir.display()))?;
    let stem = Path::new(&report.file_name)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "image".to_string());

    let mut written = Vec::new();
    for check in &report.checks {
        let Some(overlay) = &check.overlay else {
            continue;
        };
        let path = dir.join(format!("{}.{}.png", stem, check.id));
        overlay
            .save(&path)
            .with_context(|| format!("Failed to write overlay: {}", path.display()))?;
        tracing::debug!(path = %path.display(), check = %check.id, "overlay written");
        written.push(path);
    }
    Ok(written)
}
