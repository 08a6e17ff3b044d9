// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// clinreport: build, watermark, merge and package clinical reports.
//
// Entry point. Initialises logging, parses the command line and runs one
// export or inspection.

mod job;

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use clinreport_core::error::Result;
use clinreport_core::human_errors::{humanize_error, humanize_exclusion};
use clinreport_document::AttachmentInspector;
use clinreport_export::{CancelToken, ExportStatus, ReportPipeline};
use tracing::error;

use job::JobFile;

/// Compose a clinical report with its attachments into a PDF and a ZIP bundle.
#[derive(Parser, Debug)]
#[command(name = "clinreport")]
#[command(version)]
#[command(about = "Compose clinical reports into PDF + ZIP export bundles", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the full pipeline for a job file
    Export {
        /// JSON job file (metadata, persons, attachments, watermark)
        #[arg(long, value_name = "FILE")]
        job: PathBuf,

        /// Directory the PDF and ZIP are written to
        #[arg(long, value_name = "DIR", env = "CLINREPORT_OUT_DIR")]
        out_dir: PathBuf,

        /// Base file name of both artifacts (defaults to the report id)
        #[arg(long, value_name = "NAME")]
        name: Option<String>,
    },

    /// Check whether a PDF can be merged as an attachment
    Inspect {
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let outcome = match cli.command {
        Command::Export { job, out_dir, name } => export(&job, &out_dir, name.as_deref()).await,
        Command::Inspect { file } => inspect(&file),
    };

    match outcome {
        Ok(code) => code,
        Err(err) => {
            error!(stage = %err.stage(), error = %err, "clinreport failed");
            let human = humanize_error(&err);
            eprintln!("{}", human.message);
            eprintln!("  {}", human.suggestion);
            ExitCode::FAILURE
        }
    }
}

async fn export(job_path: &Path, out_dir: &Path, name: Option<&str>) -> Result<ExitCode> {
    let job = JobFile::load(job_path)?;
    let job_dir = job_path.parent().unwrap_or_else(|| Path::new("."));
    let (config, request) = job.into_request(job_dir, out_dir, name)?;

    let cancel = CancelToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_interrupt.cancel();
        }
    });

    let bundle = ReportPipeline::new(config).run(request, &cancel).await?;

    println!("PDF:     {}", bundle.pdf_path().display());
    println!("Archive: {}", bundle.archive_path().display());
    println!("Pages:   {}", bundle.page_count());
    println!("Status:  {}", bundle.status());
    for excluded in bundle.exclusions() {
        let human = humanize_exclusion(excluded);
        println!("  - {}: {}", human.message, human.suggestion);
    }

    Ok(match bundle.status() {
        ExportStatus::Complete => ExitCode::SUCCESS,
        // Written, but the caller should look at the exclusions.
        ExportStatus::Partial { .. } => ExitCode::from(2),
    })
}

fn inspect(file: &Path) -> Result<ExitCode> {
    let bytes = std::fs::read(file)?;
    match AttachmentInspector::inspect(&bytes) {
        Ok(inspection) => {
            println!("{}", serde_json::to_string_pretty(&inspection)?);
            Ok(ExitCode::SUCCESS)
        }
        Err(reason) => {
            println!("{}: cannot be merged, {reason}", file.display());
            Ok(ExitCode::FAILURE)
        }
    }
}
