// Reading the block catalogs (the list of items to evaluate).

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use calamine::{open_workbook, DataType, Reader, Xlsx};
use regex::Regex;
use snafu::prelude::*;

use crate::delphi::io_common::{normalize_header, simplify_file_name};
use crate::delphi::*;

pub const REQUIRED_COLUMNS: [&str; 4] = ["secao", "codigo", "tematica", "pergunta"];
pub const ANSWERS_COLUMN: &str = "respostas";
/// Older catalogs call the question `texto`.
pub const PROMPT_ALIAS: &str = "texto";

/// How the header of a catalog compares with the expected columns.
#[derive(Eq, PartialEq, Debug, Clone, Default)]
pub struct CatalogSchema {
    /// Normalized header names, in file order.
    pub columns: Vec<String>,
    pub missing: Vec<String>,
    pub unexpected: Vec<String>,
}

impl CatalogSchema {
    pub fn from_header(header: &[String]) -> CatalogSchema {
        let columns: Vec<String> = header.iter().map(|h| normalize_header(h)).collect();
        let has = |name: &str| columns.iter().any(|c| c == name);

        let missing: Vec<String> = REQUIRED_COLUMNS
            .iter()
            .filter(|c| !(has(**c) || (**c == "pergunta" && has(PROMPT_ALIAS))))
            .map(|c| c.to_string())
            .collect();
        let unexpected: Vec<String> = columns
            .iter()
            .filter(|c| {
                !REQUIRED_COLUMNS.contains(&c.as_str())
                    && c.as_str() != ANSWERS_COLUMN
                    && c.as_str() != PROMPT_ALIAS
            })
            .cloned()
            .collect();
        CatalogSchema {
            columns,
            missing,
            unexpected,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.missing.is_empty()
    }

    fn index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    fn prompt_index(&self) -> Option<usize> {
        self.index("pergunta").or_else(|| self.index(PROMPT_ALIAS))
    }
}

#[derive(Eq, PartialEq, Debug, Clone)]
pub struct Catalog {
    pub block_id: String,
    pub items: Vec<QuestionnaireItem>,
    pub schema: CatalogSchema,
}

#[derive(Eq, PartialEq, Debug, Clone)]
pub struct BlockFile {
    pub block_id: String,
    pub path: PathBuf,
}

fn block_file_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(bloco\d+)_itens\.(csv|xlsx)$").expect("valid block pattern"))
}

/// The block id of a catalog file: its name without the `_itens` suffix.
pub fn block_id_of(path: &Path) -> String {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default();
    stem.strip_suffix("_itens").unwrap_or(&stem).to_string()
}

/// Lists the block catalogs found in the directory, sorted by file name.
///
/// A missing directory has no blocks.
pub fn list_blocks(dir: &Path) -> DelphiResult<Vec<BlockFile>> {
    if !dir.is_dir() {
        warn!("Catalog directory {:?} does not exist", dir);
        return Ok(vec![]);
    }
    let entries = fs::read_dir(dir).context(ListDirectorySnafu {
        path: dir.display().to_string(),
    })?;
    let mut res: Vec<BlockFile> = Vec::new();
    for entry in entries {
        let entry = entry.context(ListDirectorySnafu {
            path: dir.display().to_string(),
        })?;
        let name = entry.file_name().to_string_lossy().to_string();
        if let Some(caps) = block_file_regex().captures(&name) {
            res.push(BlockFile {
                block_id: caps[1].to_string(),
                path: entry.path(),
            });
        }
    }
    res.sort_by_key(|b| simplify_file_name(&b.path));
    debug!("list_blocks: {:?}", res);
    Ok(res)
}

pub fn find_block(dir: &Path, block_id: &str) -> DelphiResult<BlockFile> {
    let blocks = list_blocks(dir)?;
    match blocks.into_iter().find(|b| b.block_id == block_id) {
        Some(b) => Ok(b),
        None => whatever!("No catalog for block {} in {}", block_id, dir.display()),
    }
}

/// Loads a catalog from a `.csv` or `.xlsx` file.
///
/// All the missing required columns are reported at once. Unknown columns
/// are only logged.
pub fn load_catalog(path: &Path) -> DelphiResult<Catalog> {
    info!("Attempting to read catalog {:?}", path);
    let is_excel = path
        .extension()
        .map(|e| e.to_string_lossy().eq_ignore_ascii_case("xlsx"))
        .unwrap_or(false);
    let (header, rows) = if is_excel {
        read_excel_rows(path)?
    } else {
        read_csv_rows(path)?
    };
    catalog_from_rows(path, &header, &rows)
}

fn catalog_from_rows(
    path: &Path,
    header: &[String],
    rows: &[Vec<String>],
) -> DelphiResult<Catalog> {
    let p = path.display().to_string();
    let schema = CatalogSchema::from_header(header);
    ensure!(
        schema.is_valid(),
        CatalogMissingColumnsSnafu {
            path: p.clone(),
            missing: schema.missing.clone(),
        }
    );
    if !schema.unexpected.is_empty() {
        warn!(
            "Catalog {}: ignoring unexpected columns {:?}",
            p, schema.unexpected
        );
    }

    // Guaranteed by the schema check.
    let (Some(section_idx), Some(code_idx), Some(theme_idx), Some(prompt_idx)) = (
        schema.index("secao"),
        schema.index("codigo"),
        schema.index("tematica"),
        schema.prompt_index(),
    ) else {
        whatever!("Catalog {}: inconsistent header {:?}", p, header)
    };
    let answers_idx = schema.index(ANSWERS_COLUMN);

    let mut seen: HashSet<String> = HashSet::new();
    let mut items: Vec<QuestionnaireItem> = Vec::new();
    for row in rows.iter() {
        if row.iter().all(|c| c.trim().is_empty()) {
            continue;
        }
        let item = QuestionnaireItem {
            section: cell(row, section_idx),
            code: cell(row, code_idx),
            theme: cell(row, theme_idx),
            prompt: cell(row, prompt_idx),
            reference_answers: answers_idx.map(|i| cell(row, i)).unwrap_or_default(),
        };
        ensure!(
            seen.insert(item.code.clone()),
            CatalogDuplicateCodeSnafu {
                path: p.clone(),
                code: item.code.clone(),
            }
        );
        items.push(item);
    }
    ensure!(!items.is_empty(), CatalogEmptySnafu { path: p });

    Ok(Catalog {
        block_id: block_id_of(path),
        items,
        schema,
    })
}

fn cell(row: &[String], idx: usize) -> String {
    row.get(idx).map(|s| s.trim().to_string()).unwrap_or_default()
}

fn read_csv_rows(path: &Path) -> DelphiResult<(Vec<String>, Vec<Vec<String>>)> {
    let p = path.display().to_string();
    let mut rdr = csv::ReaderBuilder::new()
        .flexible(true)
        .from_path(path)
        .context(CatalogOpenSnafu { path: p.clone() })?;
    let header: Vec<String> = rdr
        .headers()
        .context(CatalogOpenSnafu { path: p.clone() })?
        .iter()
        .map(|s| s.to_string())
        .collect();
    let mut rows: Vec<Vec<String>> = Vec::new();
    for (idx, line_r) in rdr.records().enumerate() {
        let line = line_r.context(CatalogOpenSnafu { path: p.clone() })?;
        debug!("read_csv_rows: line {}: {:?}", idx + 2, line);
        rows.push(line.iter().map(|s| s.to_string()).collect());
    }
    Ok((header, rows))
}

fn read_excel_rows(path: &Path) -> DelphiResult<(Vec<String>, Vec<Vec<String>>)> {
    let p = path.display().to_string();
    let mut workbook: Xlsx<_> = open_workbook(path).context(CatalogExcelSnafu { path: p.clone() })?;
    let wrange = workbook
        .worksheet_range_at(0)
        .context(CatalogNoSheetSnafu { path: p.clone() })?
        .context(CatalogExcelSnafu { path: p.clone() })?;

    let mut res: Vec<Vec<String>> = Vec::new();
    for (idx, row) in wrange.rows().enumerate() {
        let mut cells: Vec<String> = Vec::new();
        for elt in row {
            cells.push(read_cell(elt, &p, (idx + 1) as u64)?);
        }
        res.push(cells);
    }
    if res.is_empty() {
        return Ok((vec![], vec![]));
    }
    let header = res.remove(0);
    debug!("read_excel_rows: header: {:?}", header);
    Ok((header, res))
}

fn read_cell(cell: &DataType, path: &str, lineno: u64) -> DelphiResult<String> {
    match cell {
        DataType::String(s) => Ok(s.clone()),
        DataType::Empty => Ok(String::new()),
        // Codes such as 12 are stored as numbers by spreadsheet tools.
        DataType::Float(f) if f.fract() == 0.0 => Ok(format!("{}", *f as i64)),
        DataType::Float(f) => Ok(f.to_string()),
        DataType::Int(i) => Ok(i.to_string()),
        DataType::Bool(b) => Ok(b.to_string()),
        _ => CatalogWrongCellTypeSnafu {
            path,
            lineno,
            content: format!("{:?}", cell),
        }
        .fail(),
    }
}
