use log::{debug, info, warn};

use delphi_review::session::{Session, SessionError};
use delphi_review::*;
use snafu::{prelude::*, Snafu};

use std::fs;
use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;

pub mod archive;
pub mod config_reader;
pub mod consolidate;
pub mod io_answers;
pub mod io_catalog;
pub mod io_common;
pub mod io_submission;
pub mod io_workbook;

use crate::delphi::config_reader::Settings;
use crate::delphi::consolidate::*;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum DelphiError {
    #[snafu(display("Error opening catalog {}: {}", path, source))]
    CatalogOpen { source: csv::Error, path: String },
    #[snafu(display("Error opening workbook {}: {}", path, source))]
    CatalogExcel {
        source: calamine::XlsxError,
        path: String,
    },
    #[snafu(display("Workbook {} has no worksheet", path))]
    CatalogNoSheet { path: String },
    #[snafu(display(
        "Catalog {} is missing the required columns: {}",
        path,
        missing.join(", ")
    ))]
    CatalogMissingColumns { path: String, missing: Vec<String> },
    #[snafu(display("Catalog {} has no items", path))]
    CatalogEmpty { path: String },
    #[snafu(display("Catalog {}: item code {} appears more than once", path, code))]
    CatalogDuplicateCode { path: String, code: String },
    #[snafu(display("Catalog {}, line {}: cannot read cell {}", path, lineno, content))]
    CatalogWrongCellType {
        path: String,
        lineno: u64,
        content: String,
    },
    #[snafu(display("Could not list directory {}: {}", path, source))]
    ListDirectory {
        source: std::io::Error,
        path: String,
    },
    #[snafu(display("Invalid file pattern {}: {}", pattern, source))]
    FilePattern {
        source: glob::PatternError,
        pattern: String,
    },
    #[snafu(display("Refusing to overwrite the existing file {}", path))]
    SubmissionExists { path: String },
    #[snafu(display("Submission rejected: {}", display_violations(violations)))]
    SubmissionRejected { violations: Vec<ViolationKind> },
    #[snafu(display("Evaluation session: {}", source))]
    Session { source: SessionError },
    #[snafu(display("Invalid content in {}: {}", path, source))]
    Review { source: ReviewErrors, path: String },
    #[snafu(display("Could not read {}: {}", path, source))]
    ReadFile {
        source: std::io::Error,
        path: String,
    },
    #[snafu(display("Could not write {}: {}", path, source))]
    WriteFile {
        source: std::io::Error,
        path: String,
    },
    #[snafu(display("Could not write CSV {}: {}", path, source))]
    WriteCsv { source: csv::Error, path: String },
    #[snafu(display("Could not read CSV {}: {}", path, source))]
    ReadCsv { source: csv::Error, path: String },
    #[snafu(display("File {} has no header row", path))]
    MissingHeader { path: String },
    #[snafu(display("File {}: column {} appears more than once in the header", path, column))]
    DuplicateColumn { path: String, column: String },
    #[snafu(display("Could not write workbook {}: {}", path, source))]
    Workbook {
        source: rust_xlsxwriter::XlsxError,
        path: String,
    },
    #[snafu(display("Sheet {} is too large for a workbook ({} rows)", sheet, rows))]
    SheetTooLarge { sheet: String, rows: usize },
    #[snafu(display("Error opening {}: {}", path, source))]
    OpeningJson {
        source: std::io::Error,
        path: String,
    },
    #[snafu(display("Error parsing JSON {}: {}", path, source))]
    ParsingJson {
        source: serde_json::Error,
        path: String,
    },

    #[snafu(whatever, display("{message}"))]
    Whatever {
        message: String,
        #[snafu(source(from(Box<dyn std::error::Error>, Some)))]
        source: Option<Box<dyn std::error::Error>>,
    },
}

pub type DelphiResult<T> = Result<T, DelphiError>;

fn display_violations(violations: &[ViolationKind]) -> String {
    let msgs: Vec<String> = violations.iter().map(|v| v.to_string()).collect();
    msgs.join("; ")
}

/// The result of a successful submission.
#[derive(Debug)]
pub struct SubmitOutcome {
    pub path: PathBuf,
    /// Set when the file was saved but could not be archived.
    pub archive_warning: Option<String>,
}

#[derive(Debug)]
pub enum ConsolidationOutcome {
    /// No file matched the submission pattern.
    NoInputFiles,
    /// Files were found but none of them could be read.
    NothingReadable(Vec<SkippedFile>),
    Written {
        artifacts: Vec<PathBuf>,
        consolidation: Consolidation,
    },
}

/// A block catalog found on disk, with its item count or the reason it cannot be loaded.
pub struct BlockListing {
    pub block_id: String,
    pub path: PathBuf,
    pub items: DelphiResult<usize>,
}

pub fn run_blocks(settings: &Settings) -> DelphiResult<Vec<BlockListing>> {
    let blocks = io_catalog::list_blocks(&settings.catalog_dir)?;
    info!(
        "Found {} block catalogs in {:?}",
        blocks.len(),
        settings.catalog_dir
    );
    Ok(blocks
        .into_iter()
        .map(|b| {
            let items = io_catalog::load_catalog(&b.path).map(|c| c.items.len());
            BlockListing {
                block_id: b.block_id,
                path: b.path,
                items,
            }
        })
        .collect())
}

fn session_error(e: SessionError) -> DelphiError {
    match e {
        SessionError::Rejected(violations) => DelphiError::SubmissionRejected { violations },
        e => DelphiError::Session { source: e },
    }
}

/// Runs an evaluation session from an answer sheet and saves the submission.
pub fn run_submit(
    settings: &Settings,
    block_id: &str,
    answers_path: &str,
    submitted_at: NaiveDateTime,
) -> DelphiResult<SubmitOutcome> {
    let block = io_catalog::find_block(&settings.catalog_dir, block_id)?;
    let catalog = io_catalog::load_catalog(&block.path)?;
    let sheet = io_answers::read_answer_sheet(answers_path)?;
    debug!("run_submit: answer sheet {:?}", sheet);

    let mut session = Session::new(&catalog.block_id, &catalog.items, &settings.policy);
    // The answers are recorded even without the acknowledgement so that all
    // the violations of the sheet are reported together.
    session.acknowledge_instructions().map_err(session_error)?;
    session
        .identify(&sheet.evaluator.to_evaluator(), sheet.consent_given)
        .map_err(session_error)?;
    for entry in sheet.evaluations.iter() {
        let evaluation = entry.to_evaluation().context(ReviewSnafu {
            path: answers_path,
        })?;
        session.record(evaluation).map_err(session_error)?;
    }
    for (name, value) in sheet.extra_fields.iter() {
        session.add_extra_field(name, value);
    }
    let pending = session.pending_comments();
    if !pending.is_empty() {
        warn!("Items still missing a comment: {}", pending.join(", "));
    }

    if !sheet.instructions_acknowledged {
        let draft = Submission {
            instructions_acknowledged: false,
            ..session.draft(submitted_at)
        };
        return SubmissionRejectedSnafu {
            violations: validate_submission_preconditions(&draft, &settings.policy),
        }
        .fail();
    }
    let submission = session.submit(submitted_at).map_err(session_error)?;
    // Nothing is reported as saved unless this write succeeds.
    let path = io_submission::write_submission(&submission, &settings.output_dir)?;
    info!("Submission saved to {:?}", path);

    let sink = settings.archive.sink();
    let archive_warning = archive::archive_submission(sink.as_ref(), &path);
    Ok(SubmitOutcome {
        path,
        archive_warning,
    })
}

/// Consolidates all the submissions found in the output directory.
///
/// When a reference summary is given, the computed vote summary must match it.
pub fn run_consolidation(
    settings: &Settings,
    reference_path: Option<&str>,
) -> DelphiResult<ConsolidationOutcome> {
    fs::create_dir_all(&settings.output_dir).context(WriteFileSnafu {
        path: settings.output_dir.display().to_string(),
    })?;
    let files = find_submission_files(&settings.output_dir, &settings.submission_pattern)?;
    if files.is_empty() {
        info!(
            "No file matching {} in {:?}",
            settings.submission_pattern, settings.output_dir
        );
        return Ok(ConsolidationOutcome::NoInputFiles);
    }

    let consolidation = match consolidate(&files, settings.vote_column.as_deref())? {
        Consolidated::Summarized(c) => c,
        Consolidated::NothingReadable(skipped) => {
            return Ok(ConsolidationOutcome::NothingReadable(skipped))
        }
    };
    let artifacts = write_artifacts(&consolidation, &settings.output_dir)?;

    if let Some(reference) = reference_path {
        check_reference(&consolidation, Path::new(reference))?;
    }

    Ok(ConsolidationOutcome::Written {
        artifacts,
        consolidation,
    })
}
