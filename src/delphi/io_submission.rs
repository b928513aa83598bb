// Writing one submission as a CSV file.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use csv::Writer;
use delphi_review::table::Table;
use regex::Regex;
use snafu::prelude::*;
use tempfile::NamedTempFile;

use crate::delphi::io_common::{read_table_csv, write_records};
use crate::delphi::*;

/// The columns of a submission file, in order.
pub const FIXED_COLUMNS: [&str; 16] = [
    "bloco",
    "secao",
    "codigo",
    "tematica",
    "pergunta",
    "respostas",
    "grau_relevancia",
    "aplicabilidade_nacional",
    "aceitacao_item",
    "comentarios_sugestoes",
    "nome",
    "email",
    "cpf",
    "concordancia_instr_delphi",
    "consentimento",
    "timestamp",
];

const MAX_NAME_LEN: usize = 50;

fn unsafe_chars() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[^a-zA-Z0-9_-]+").expect("valid name pattern"))
}

/// Turns an evaluator name into something usable in a file name.
pub fn sanitize_name(name: &str) -> String {
    let replaced = unsafe_chars().replace_all(name.trim(), "_");
    let res: String = replaced.chars().take(MAX_NAME_LEN).collect();
    if res.is_empty() {
        "anon".to_string()
    } else {
        res
    }
}

pub fn submission_file_name(submission: &Submission) -> String {
    format!(
        "delphi_{}_{}_{}.csv",
        submission.block_id,
        sanitize_name(&submission.evaluator.name),
        submission.submitted_at.format("%Y%m%d_%H%M%S")
    )
}

fn yes_no_lower(flag: bool) -> String {
    Answer::from_flag(flag).label().to_lowercase()
}

/// One row per answered item, with the evaluator fields repeated on every row.
pub fn submission_table(submission: &Submission) -> Table {
    let mut columns: Vec<String> = FIXED_COLUMNS.iter().map(|c| c.to_string()).collect();
    let mut extras: Vec<&str> = Vec::new();
    for (name, value) in submission.extra_fields.iter() {
        if columns.iter().any(|c| c == name) {
            warn!(
                "Extra field {:?} clashes with a submission column, ignoring it",
                name
            );
            continue;
        }
        columns.push(name.clone());
        extras.push(value);
    }

    let evaluator = &submission.evaluator;
    let timestamp = submission
        .submitted_at
        .format("%Y-%m-%dT%H:%M:%S")
        .to_string();
    let mut table = Table::new(columns);
    for response in submission.responses.iter() {
        let item = &response.item;
        let eval = &response.evaluation;
        let mut row: Vec<String> = vec![
            submission.block_id.clone(),
            item.section.clone(),
            item.code.clone(),
            item.theme.clone(),
            item.prompt.clone(),
            item.reference_answers.clone(),
            eval.relevance.score().to_string(),
            eval.national_applicability.label().to_string(),
            eval.item_acceptance.label().to_string(),
            eval.trimmed_comment().to_string(),
            evaluator.name.clone(),
            evaluator.email.clone(),
            evaluator.tax_id.clone().unwrap_or_default(),
            yes_no_lower(submission.instructions_acknowledged),
            yes_no_lower(submission.consent_given),
            timestamp.clone(),
        ];
        row.extend(extras.iter().map(|v| v.to_string()));
        // Same length as the header by construction.
        if let Err(e) = table.push_row(row) {
            warn!("submission_table: {}", e);
        }
    }
    table
}

/// Creates a new file with the content produced by `write`.
///
/// The content goes to a temporary file of the same directory first. The
/// target only appears once the whole content is written, and an existing
/// file is never replaced.
pub fn persist_new<F>(path: &Path, write: F) -> DelphiResult<()>
where
    F: FnOnce(&mut NamedTempFile) -> DelphiResult<()>,
{
    let p = path.display().to_string();
    ensure!(!path.exists(), SubmissionExistsSnafu { path: p.clone() });
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let mut tmp = NamedTempFile::new_in(dir).context(WriteFileSnafu { path: p.clone() })?;
    // On error the temporary file is removed when dropped.
    write(&mut tmp)?;
    tmp.as_file()
        .sync_all()
        .context(WriteFileSnafu { path: p.clone() })?;
    match tmp.persist_noclobber(path) {
        Ok(_) => Ok(()),
        Err(e) if e.error.kind() == ErrorKind::AlreadyExists => {
            SubmissionExistsSnafu { path: p }.fail()
        }
        Err(e) => Err(e.error).context(WriteFileSnafu { path: p }),
    }
}

/// Writes the submission into the output directory and returns the file path.
///
/// The file must not exist yet.
pub fn write_submission(submission: &Submission, output_dir: &Path) -> DelphiResult<PathBuf> {
    fs::create_dir_all(output_dir).context(WriteFileSnafu {
        path: output_dir.display().to_string(),
    })?;
    let path = output_dir.join(submission_file_name(submission));
    let table = submission_table(submission);
    debug!(
        "write_submission: {} rows, columns {:?}",
        table.len(),
        table.columns()
    );
    persist_new(&path, |tmp| {
        let mut wtr = Writer::from_writer(tmp);
        write_records(&mut wtr, &table, &path)
    })?;
    Ok(path)
}

pub fn read_submission_table(path: &Path) -> DelphiResult<Table> {
    read_table_csv(path)
}
