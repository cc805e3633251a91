//! Spreadsheet input and result output.
//!
//! Capacity sheet: first row group names, second row capacities.
//! Preference sheet: a header row with `Name`, `W1..Wk` and `N1..N3`, one row per person.
//! Both may be CSV or any workbook format calamine reads; the first worksheet is used.
//! Empty cells are "no entry". Names are taken verbatim.

use std::io::Write;
use std::path::{Path, PathBuf};

use calamine::Reader;
use itertools::Itertools;
use thiserror::Error;
use tracing::debug;

use crate::model::entity::{Group, Person};
use crate::report::Report;

pub type Row = Vec<Option<String>>;

#[derive(Debug, Error)]
pub enum InputError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("spreadsheet error: {0}")]
    Spreadsheet(#[from] calamine::Error),

    #[error("{0}: workbook has no worksheet")]
    NoWorksheet(PathBuf),

    #[error("missing {0}")]
    MissingRow(&'static str),

    #[error("missing column `{0}`")]
    MissingColumn(&'static str),

    #[error("group `{group}` has invalid capacity `{value}`")]
    InvalidCapacity { group: String, value: String },
}

fn cell_str(d: &calamine::Data) -> Option<String> {
    let s = match d {
        calamine::Data::Empty => return None,
        calamine::Data::String(s) => s.clone(),
        calamine::Data::Float(f) => format!("{}", f),
        calamine::Data::Int(i) => format!("{}", i),
        calamine::Data::Bool(b) => format!("{}", b),
        other => format!("{:?}", other),
    };
    (!s.is_empty()).then_some(s)
}

fn is_csv(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext.eq_ignore_ascii_case("csv"))
}

/// Reads all rows of a CSV file or of the first worksheet of a workbook.
pub fn read_rows(path: &Path) -> Result<Vec<Row>, InputError> {
    if is_csv(path) {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_path(path)?;
        let mut rows = Vec::new();
        for record in reader.records() {
            let record = record?;
            rows.push(record.iter().map(|c| (!c.is_empty()).then(|| c.to_string())).collect());
        }
        return Ok(rows);
    }

    let mut workbook = calamine::open_workbook_auto(path)?;
    let sheet = workbook
        .sheet_names()
        .first()
        .cloned()
        .ok_or_else(|| InputError::NoWorksheet(path.to_path_buf()))?;
    let range = workbook.worksheet_range(&sheet)?;
    debug!(path = %path.display(), sheet = %sheet, rows = range.height(), "read worksheet");
    Ok(range.rows().map(|row| row.iter().map(cell_str).collect()).collect())
}

fn parse_capacity(group: &str, value: Option<&String>) -> Result<usize, InputError> {
    let invalid = || InputError::InvalidCapacity {
        group: group.to_string(),
        value: value.cloned().unwrap_or_default(),
    };
    let text = value.ok_or_else(invalid)?.trim();
    if let Ok(n) = text.parse::<usize>() {
        return Ok(n);
    }
    // workbooks store integers as floats
    match text.parse::<f64>() {
        Ok(f) if f >= 0.0 && f.fract() == 0.0 && f <= usize::MAX as f64 => Ok(f as usize),
        _ => Err(invalid()),
    }
}

pub fn parse_capacities(rows: &[Row]) -> Result<Vec<Group>, InputError> {
    let names = rows.first().ok_or(InputError::MissingRow("group name row"))?;
    let capacities = rows.get(1).ok_or(InputError::MissingRow("capacity row"))?;
    names
        .iter()
        .enumerate()
        .filter_map(|(col, name)| name.as_ref().map(|name| (col, name)))
        .map(|(col, name)| {
            let capacity = parse_capacity(name, capacities.get(col).and_then(Option::as_ref))?;
            Ok(Group::new(name.clone(), capacity))
        })
        .collect()
}

/// Columns named `<prefix><number>`, ordered by number.
fn numbered_columns(header: &Row, prefix: char) -> Vec<(usize, usize)> {
    header
        .iter()
        .enumerate()
        .filter_map(|(col, cell)| {
            let rest = cell.as_deref()?.trim().strip_prefix(prefix)?;
            let number = rest.parse::<usize>().ok().filter(|&n| n > 0)?;
            Some((number, col))
        })
        .sorted()
        .collect()
}

pub fn parse_preferences(rows: &[Row]) -> Result<Vec<Person>, InputError> {
    let header = rows.first().ok_or(InputError::MissingRow("header row"))?;
    let name_col = header
        .iter()
        .position(|cell| cell.as_deref().map(str::trim) == Some("Name"))
        .ok_or(InputError::MissingColumn("Name"))?;
    let wish_cols = numbered_columns(header, 'W');
    let avoid_cols = numbered_columns(header, 'N');
    let n_ranks = wish_cols.last().map_or(0, |&(number, _)| number);

    let cell = |row: &Row, col: usize| row.get(col).cloned().flatten();

    let persons = rows[1..]
        .iter()
        .filter_map(|row| {
            let name = cell(row, name_col)?;
            let mut wishes = vec![None; n_ranks];
            for &(number, col) in &wish_cols {
                wishes[number - 1] = cell(row, col);
            }
            let avoidances = avoid_cols.iter().filter_map(|&(_, col)| cell(row, col)).collect();
            Some(Person { name, wishes, avoidances })
        })
        .collect();
    Ok(persons)
}

pub fn read_capacities(path: &Path) -> Result<Vec<Group>, InputError> {
    parse_capacities(&read_rows(path)?)
}

pub fn read_preferences(path: &Path) -> Result<Vec<Person>, InputError> {
    parse_preferences(&read_rows(path)?)
}

/// Writes one column per group, headed `<name> (<count> of <capacity>)`.
pub fn write_result<W: Write>(writer: W, report: &Report) -> Result<(), InputError> {
    let mut writer = csv::Writer::from_writer(writer);
    writer.write_record(report.rosters.iter().map(|r| {
        format!("{} ({} of {})", r.group, r.members.len(), r.capacity)
    }))?;
    let depth = report.rosters.iter().map(|r| r.members.len()).max().unwrap_or(0);
    for idx in 0..depth {
        writer.write_record(
            report.rosters.iter().map(|r| r.members.get(idx).map_or("", String::as_str)),
        )?;
    }
    writer.flush()?;
    Ok(())
}

pub fn write_result_file(path: &Path, report: &Report) -> Result<(), InputError> {
    write_result(std::fs::File::create(path)?, report)
}
