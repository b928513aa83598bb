// Stacking the submission files and computing the round summaries.

use std::fs;
use std::path::{Path, PathBuf};

use delphi_review::summary::{summarize, GroupCount, Summary, SummaryColumns};
use delphi_review::table::Table;
use snafu::prelude::*;
use text_diff::print_diff;

use crate::delphi::io_common::{simplify_file_name, table_to_csv_string, write_table_csv};
use crate::delphi::io_submission::read_submission_table;
use crate::delphi::io_workbook::{write_workbook, Sheet};
use crate::delphi::*;

pub const DEFAULT_PATTERN: &str = "delphi_*.csv";

/// Tried in order when no vote column is configured.
pub const VOTE_COLUMN_CANDIDATES: [&str; 3] = ["voto_delphi", "voto", "aceitacao_item"];

pub const CONSOLIDATED_CSV: &str = "consolidado_respostas.csv";
pub const CONSOLIDATED_XLSX: &str = "consolidado_respostas.xlsx";
pub const TOTAL_CSV: &str = "resumo_total.csv";
pub const THEME_CSV: &str = "resumo_tematica.csv";
pub const ITEM_CSV: &str = "resumo_por_item.csv";

/// A submission file left out of the consolidation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedFile {
    pub path: PathBuf,
    pub reason: String,
}

#[derive(Debug, Clone)]
pub struct Consolidation {
    /// The rows of all the readable files, with the union of their columns.
    pub combined: Table,
    pub vote_column: String,
    pub summary: Summary,
    /// The files that were read.
    pub files: Vec<PathBuf>,
    pub skipped: Vec<SkippedFile>,
}

/// What `consolidate` made of the submission files.
#[derive(Debug, Clone)]
pub enum Consolidated {
    Summarized(Consolidation),
    /// None of the files could be read.
    NothingReadable(Vec<SkippedFile>),
}

/// The files of the directory matching the pattern, sorted by path.
pub fn find_submission_files(dir: &Path, pattern: &str) -> DelphiResult<Vec<PathBuf>> {
    let full_pattern = format!(
        "{}/{}",
        glob::Pattern::escape(&dir.display().to_string()),
        pattern
    );
    let paths = glob::glob(&full_pattern).context(FilePatternSnafu {
        pattern: full_pattern.clone(),
    })?;
    let mut res: Vec<PathBuf> = Vec::new();
    for entry in paths {
        match entry {
            Ok(p) if p.is_file() => res.push(p),
            Ok(_) => {}
            Err(e) => warn!("Cannot access {:?}: {}", e.path(), e),
        }
    }
    res.sort();
    debug!("find_submission_files: {:?}", res);
    Ok(res)
}

/// The configured vote column, or the first known one present in the table.
pub fn resolve_vote_column(table: &Table, configured: Option<&str>) -> DelphiResult<String> {
    match configured {
        Some(col) if table.has_column(col) => Ok(col.to_string()),
        Some(col) => whatever!(
            "Vote column {} is not present in the submissions (columns: {})",
            col,
            table.columns().join(", ")
        ),
        None => match VOTE_COLUMN_CANDIDATES
            .iter()
            .find(|c| table.has_column(c))
        {
            Some(c) => Ok(c.to_string()),
            None => whatever!(
                "No vote column in the submissions, expected one of {}",
                VOTE_COLUMN_CANDIDATES.join(", ")
            ),
        },
    }
}

/// Reads and stacks the files, then summarizes the votes.
///
/// Files that cannot be read are skipped.
pub fn consolidate(files: &[PathBuf], vote_column: Option<&str>) -> DelphiResult<Consolidated> {
    let mut tables: Vec<Table> = Vec::new();
    let mut read: Vec<PathBuf> = Vec::new();
    let mut skipped: Vec<SkippedFile> = Vec::new();
    for path in files.iter() {
        match read_submission_table(path) {
            Ok(t) => {
                debug!("consolidate: {} rows in {:?}", t.len(), path);
                tables.push(t);
                read.push(path.clone());
            }
            Err(e) => {
                warn!("Skipping {}: {}", simplify_file_name(path), e);
                skipped.push(SkippedFile {
                    path: path.clone(),
                    reason: e.to_string(),
                });
            }
        }
    }
    if tables.is_empty() {
        return Ok(Consolidated::NothingReadable(skipped));
    }

    let combined = Table::concat(&tables);
    info!(
        "Consolidated {} rows from {} files ({} skipped)",
        combined.len(),
        read.len(),
        skipped.len()
    );
    let vote_column = resolve_vote_column(&combined, vote_column)?;
    let summary = summarize(&combined, &SummaryColumns::with_vote(&vote_column)).context(
        ReviewSnafu {
            path: CONSOLIDATED_CSV,
        },
    )?;
    Ok(Consolidated::Summarized(Consolidation {
        combined,
        vote_column,
        summary,
        files: read,
        skipped,
    }))
}

fn table_of(columns: &[&str]) -> Table {
    Table::new(columns.iter().map(|c| c.to_string()).collect())
}

pub fn vote_summary_table(c: &Consolidation) -> Table {
    let mut t = table_of(&[c.vote_column.as_str(), "n", "percentual"]);
    for share in c.summary.votes.iter() {
        let row = vec![
            share.vote.clone(),
            share.count.to_string(),
            format!("{:.2}", share.percent),
        ];
        if let Err(e) = t.push_row(row) {
            warn!("vote_summary_table: {}", e);
        }
    }
    t
}

fn group_table(key: &str, c: &Consolidation, groups: &[GroupCount]) -> Table {
    let mut t = table_of(&[key, c.vote_column.as_str(), "n"]);
    for g in groups.iter() {
        if let Err(e) = t.push_row(vec![g.key.clone(), g.vote.clone(), g.count.to_string()]) {
            warn!("group_table: {}", e);
        }
    }
    t
}

pub fn theme_summary_table(c: &Consolidation) -> Table {
    group_table("tematica", c, &c.summary.themes)
}

pub fn item_summary_table(c: &Consolidation) -> Table {
    group_table("codigo", c, &c.summary.items)
}

/// Writes the consolidated rows and the summaries into the directory.
///
/// Previous artifacts are replaced.
pub fn write_artifacts(c: &Consolidation, dir: &Path) -> DelphiResult<Vec<PathBuf>> {
    fs::create_dir_all(dir).context(WriteFileSnafu {
        path: dir.display().to_string(),
    })?;
    let total = vote_summary_table(c);
    let themes = theme_summary_table(c);
    let items = item_summary_table(c);

    let mut res: Vec<PathBuf> = Vec::new();
    for (name, table) in [
        (CONSOLIDATED_CSV, &c.combined),
        (TOTAL_CSV, &total),
        (THEME_CSV, &themes),
        (ITEM_CSV, &items),
    ] {
        let path = dir.join(name);
        write_table_csv(table, &path)?;
        res.push(path);
    }

    let xlsx = dir.join(CONSOLIDATED_XLSX);
    write_workbook(
        &xlsx,
        &[
            Sheet {
                name: "respostas",
                table: &c.combined,
                numeric_columns: &["grau_relevancia"],
            },
            Sheet {
                name: "resumo_total",
                table: &total,
                numeric_columns: &["n", "percentual"],
            },
            Sheet {
                name: "resumo_tematica",
                table: &themes,
                numeric_columns: &["n"],
            },
            Sheet {
                name: "resumo_por_item",
                table: &items,
                numeric_columns: &["n"],
            },
        ],
    )?;
    res.push(xlsx);
    for p in res.iter() {
        info!("Wrote {:?}", p);
    }
    Ok(res)
}

/// Compares the vote summary with a reference `resumo_total.csv`.
pub fn check_reference(c: &Consolidation, reference: &Path) -> DelphiResult<()> {
    let reference_str = fs::read_to_string(reference).context(ReadFileSnafu {
        path: reference.display().to_string(),
    })?;
    let computed = table_to_csv_string(&vote_summary_table(c))?;
    let normalize = |s: &str| s.replace("\r\n", "\n").trim_end().to_string();
    let (expected, actual) = (normalize(&reference_str), normalize(&computed));
    if expected != actual {
        warn!("Found differences with the reference summary");
        print_diff(expected.as_str(), actual.as_str(), "\n");
        whatever!("Difference detected between computed summary and reference summary")
    }
    info!("The vote summary matches {:?}", reference);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const HEADER: &str = "bloco,codigo,tematica,voto_delphi\n";

    fn summarized(files: &[PathBuf], vote_column: Option<&str>) -> Consolidation {
        match consolidate(files, vote_column).unwrap() {
            Consolidated::Summarized(c) => c,
            other => panic!("unexpected result {:?}", other),
        }
    }

    fn write(dir: &Path, name: &str, content: &str) -> PathBuf {
        let p = dir.join(name);
        fs::write(&p, content).unwrap();
        p
    }

    fn round(dir: &Path) {
        write(
            dir,
            "delphi_bloco1_ana_20240305_090000.csv",
            &format!("{}bloco1,A1,Renda,Manter\nbloco1,A2,Saude,Ajustar\n", HEADER),
        );
        write(
            dir,
            "delphi_bloco1_bruno_20240305_091500.csv",
            &format!("{}bloco1,A1,Renda,Manter\nbloco1,A2,Saude,Manter\n", HEADER),
        );
        write(
            dir,
            "delphi_bloco1_carla_20240305_093000.csv",
            "bloco,codigo,tematica,voto_delphi,instituicao\nbloco1,A1,Renda,Retirar,UFBA\n",
        );
    }

    #[test]
    fn corrupt_files_are_skipped() {
        let tmp = TempDir::new().unwrap();
        round(tmp.path());
        write(
            tmp.path(),
            "delphi_bloco1_dora_20240305_094500.csv",
            "bloco,codigo\nbloco1,A1,extra\n",
        );
        let files = find_submission_files(tmp.path(), DEFAULT_PATTERN).unwrap();
        assert_eq!(files.len(), 4);
        let c = summarized(&files, None);
        assert_eq!(c.files.len(), 3);
        assert_eq!(c.skipped.len(), 1);
        assert_eq!(c.combined.len(), 5);
        assert_eq!(c.vote_column, "voto_delphi");
        assert_eq!(c.summary.votes[0].vote, "Manter");
        assert_eq!(c.summary.votes[0].count, 3);
        assert_eq!(c.summary.votes[0].percent, 60.0);
    }

    #[test]
    fn columns_are_united() {
        let tmp = TempDir::new().unwrap();
        round(tmp.path());
        let files = find_submission_files(tmp.path(), DEFAULT_PATTERN).unwrap();
        let c = summarized(&files, None);
        assert_eq!(
            c.combined.columns(),
            &["bloco", "codigo", "tematica", "voto_delphi", "instituicao"]
        );
        assert_eq!(c.combined.column("instituicao").unwrap(), vec!["", "", "", "", "UFBA"]);
    }

    #[test]
    fn files_repeating_a_column_are_skipped() {
        let tmp = TempDir::new().unwrap();
        round(tmp.path());
        write(
            tmp.path(),
            "delphi_bloco1_dora_20240305_094500.csv",
            "bloco,codigo,tematica,voto_delphi,voto_delphi\nbloco1,A1,Renda,Retirar,Manter\n",
        );
        let files = find_submission_files(tmp.path(), DEFAULT_PATTERN).unwrap();
        let c = summarized(&files, None);
        assert_eq!(c.skipped.len(), 1);
        assert!(c.skipped[0].reason.contains("voto_delphi"));
        assert_eq!(c.combined.len(), 5);
        assert_eq!(c.summary.votes[0].count, 3);
    }

    #[test]
    fn only_corrupt_files() {
        let tmp = TempDir::new().unwrap();
        let p = write(tmp.path(), "delphi_x.csv", "");
        match consolidate(&[p], None).unwrap() {
            Consolidated::NothingReadable(skipped) => assert_eq!(skipped.len(), 1),
            Consolidated::Summarized(_) => panic!("nothing should be readable"),
        }
    }

    #[test]
    fn configured_vote_column_must_exist() {
        let tmp = TempDir::new().unwrap();
        round(tmp.path());
        let files = find_submission_files(tmp.path(), DEFAULT_PATTERN).unwrap();
        assert!(consolidate(&files, Some("voto_final")).is_err());
        let c = summarized(&files, Some("tematica"));
        assert_eq!(c.summary.votes[0].vote, "Renda");
    }

    #[test]
    fn artifacts_are_repeatable() {
        let tmp = TempDir::new().unwrap();
        round(tmp.path());
        let out = tmp.path().join("out");
        let files = find_submission_files(tmp.path(), DEFAULT_PATTERN).unwrap();
        let c = summarized(&files, None);
        let first = write_artifacts(&c, &out).unwrap();
        let total_1 = fs::read_to_string(out.join(TOTAL_CSV)).unwrap();
        let by_item_1 = fs::read_to_string(out.join(ITEM_CSV)).unwrap();

        let c = summarized(&files, None);
        let second = write_artifacts(&c, &out).unwrap();
        assert_eq!(first, second);
        assert_eq!(fs::read_to_string(out.join(TOTAL_CSV)).unwrap(), total_1);
        assert_eq!(fs::read_to_string(out.join(ITEM_CSV)).unwrap(), by_item_1);
        assert_eq!(
            total_1,
            "voto_delphi,n,percentual\nManter,3,60.00\nAjustar,1,20.00\nRetirar,1,20.00\n"
        );
        assert_eq!(
            by_item_1,
            "codigo,voto_delphi,n\nA1,Manter,2\nA1,Retirar,1\nA2,Ajustar,1\nA2,Manter,1\n"
        );
    }

    #[test]
    fn reference_check() {
        let tmp = TempDir::new().unwrap();
        round(tmp.path());
        let files = find_submission_files(tmp.path(), DEFAULT_PATTERN).unwrap();
        let c = summarized(&files, None);
        let good = write(
            tmp.path(),
            "reference.csv",
            "voto_delphi,n,percentual\r\nManter,3,60.00\r\nAjustar,1,20.00\r\nRetirar,1,20.00\r\n",
        );
        assert!(check_reference(&c, &good).is_ok());
        let bad = write(
            tmp.path(),
            "reference_bad.csv",
            "voto_delphi,n,percentual\nManter,2,40.00\n",
        );
        assert!(check_reference(&c, &bad).is_err());
    }

    #[test]
    fn other_files_are_ignored() {
        let tmp = TempDir::new().unwrap();
        round(tmp.path());
        write(tmp.path(), "resumo_total.csv", "voto_delphi,n,percentual\n");
        write(tmp.path(), "respostas_bloco1_old.csv", HEADER);
        assert_eq!(
            find_submission_files(tmp.path(), DEFAULT_PATTERN)
                .unwrap()
                .len(),
            3
        );
        assert_eq!(
            find_submission_files(tmp.path(), "respostas_bloco1_*.csv")
                .unwrap()
                .len(),
            1
        );
    }
}
