// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Subcommand handlers.

use std::path::{Path, PathBuf};

use tracing::{info, warn};

use scanlayer_core::config::ScanlayerConfig;
use scanlayer_core::error::{Result, ScanlayerError};
use scanlayer_core::types::{RecognitionPath, RunReport};
use scanlayer_document::pdf::unlock_file;
use scanlayer_pipeline::output::write_artifact;
use scanlayer_pipeline::{CancelToken, Pipeline};

use crate::cli::OcrArgs;

/// Which pipeline entry point a subcommand drives.
#[derive(Debug, Clone, Copy)]
pub enum Job {
    Convert,
    Extract,
}

pub async fn run_ocr(
    job: Job,
    input: &Path,
    output: &Path,
    separator: Option<String>,
    args: &OcrArgs,
    cancel: CancelToken,
) -> Result<()> {
    let mut config = ScanlayerConfig::load(args.config.as_deref())?;
    args.apply(&mut config);
    if let Some(separator) = separator {
        config.page_separator = separator;
    }

    let pipeline = Pipeline::builder(config).cancel_token(cancel).build()?;
    let password = args.password.as_deref();
    let report = match job {
        Job::Convert => pipeline.convert(input, output, password).await?,
        Job::Extract => pipeline.extract(input, output, password).await?,
    };

    if let Some(path) = &args.report {
        write_report(path, &report).await?;
    }
    println!("{}", summary(&report, output));
    Ok(())
}

pub async fn run_unlock(input: PathBuf, output: PathBuf, password: String) -> Result<()> {
    let target = output.clone();
    tokio::task::spawn_blocking(move || unlock_file(&input, &output, &password))
        .await
        .map_err(|err| ScanlayerError::Internal(format!("unlock task failed: {err}")))??;
    println!("Unlocked PDF written to {}", target.display());
    Ok(())
}

async fn write_report(path: &Path, report: &RunReport) -> Result<()> {
    let json = serde_json::to_vec_pretty(report)?;
    write_artifact(path, &json).await?;
    info!(path = %path.display(), "Run report written");
    Ok(())
}

/// One-line outcome printed to stdout.
pub fn summary(report: &RunReport, output: &Path) -> String {
    let enhanced = report
        .pages
        .iter()
        .filter(|p| p.path == RecognitionPath::Enhanced)
        .count();
    let warnings = report.partially_succeeded();
    let failed = report.failed();
    if warnings > 0 || failed > 0 {
        warn!(warnings, failed, "Some pages need attention; see the log or --report");
    }
    format!(
        "{} pages -> {} ({} enhanced, {} low confidence, {} failed)",
        report.pages.len(),
        output.display(),
        enhanced,
        warnings,
        failed
    )
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use scanlayer_core::types::{PageReport, PageStatus, RunId};

    use super::*;

    fn page(index: usize, status: PageStatus, path: RecognitionPath) -> PageReport {
        PageReport {
            index,
            status,
            path,
            confidence: 70.0,
            original_confidence: Some(70.0),
            enhanced_confidence: None,
            word_count: 3,
            error: None,
        }
    }

    #[test]
    fn summary_counts_each_outcome() {
        let report = RunReport {
            run_id: RunId::new(),
            input: None,
            input_sha256: String::new(),
            confidence_threshold: 65.0,
            started_at: Utc::now(),
            finished_at: Utc::now(),
            pages: vec![
                page(0, PageStatus::Succeeded, RecognitionPath::Direct),
                page(1, PageStatus::Succeeded, RecognitionPath::Enhanced),
                page(2, PageStatus::PartiallySucceeded, RecognitionPath::Direct),
                page(3, PageStatus::Failed, RecognitionPath::None),
            ],
        };
        assert_eq!(
            summary(&report, Path::new("out.pdf")),
            "4 pages -> out.pdf (1 enhanced, 1 low confidence, 1 failed)"
        );
    }
}
