//! Output projection engine
//!
//! Turns the assembled dataset into sheets and hands them to a sink, one
//! artifact at a time. All of an artifact's sheets are checked against the
//! dataset before any of them is built, so a broken sheet never leaves a
//! half-written artifact behind. Artifacts themselves are independent: when
//! a later one fails, earlier ones stay written.

use chrono::NaiveTime;
use tracing::debug;

use crate::config::{ColumnSpec, OutputConfig, OutputFileSpec, RangeSpec, SheetSpec};
use crate::connectors::{Sheet, Sink};
use crate::error::{Error, Result};
use crate::table::{Cell, Column, Table};

/// Projects the dataset through an output config into a sink.
pub fn project(config: &OutputConfig, dataset: &Table, sink: &mut dyn Sink) -> Result<()> {
    for file in &config.files {
        check_columns(file, dataset)?;
        check_ranges(file, dataset)?;
        let sheets: Vec<Sheet> = file
            .sheets
            .iter()
            .map(|sheet| build_sheet(sheet, dataset))
            .collect();
        sink.write(&file.filename, &sheets)?;
        debug!("projected {} sheets into \"{}\"", sheets.len(), file.filename);
    }
    Ok(())
}

/// Every column a sheet pulls from the dataset must exist; absent ones are
/// reported together, per sheet.
fn check_columns(file: &OutputFileSpec, dataset: &Table) -> Result<()> {
    for sheet in &file.sheets {
        let missing: Vec<String> = sheet
            .columns
            .iter()
            .filter_map(|column| match column {
                ColumnSpec::From { source, .. } if !dataset.has_column(source) => {
                    Some(source.clone())
                }
                _ => None,
            })
            .collect();
        if !missing.is_empty() {
            return Err(Error::SheetColumnsNotFound {
                filename: file.filename.clone(),
                sheet: sheet.name.clone(),
                columns: missing,
            });
        }
    }
    Ok(())
}

/// A range filter needs its column present and date-typed at run time.
fn check_ranges(file: &OutputFileSpec, dataset: &Table) -> Result<()> {
    for sheet in &file.sheets {
        let Some(range) = &sheet.range else {
            continue;
        };
        match dataset.column(&range.column) {
            None => {
                return Err(Error::DateColumnNotFound {
                    filename: file.filename.clone(),
                    sheet: sheet.name.clone(),
                    column: range.column.clone(),
                });
            }
            Some(column) if !column.is_datetime() => {
                return Err(Error::InvalidDateColumn {
                    filename: file.filename.clone(),
                    sheet: sheet.name.clone(),
                    column: range.column.clone(),
                });
            }
            Some(_) => {}
        }
    }
    Ok(())
}

/// Builds one sheet: the range picks the rows, then declared columns are
/// copied, literals broadcast, and date columns with a format rendered to
/// text. Column order follows the declaration exactly.
fn build_sheet(spec: &SheetSpec, dataset: &Table) -> Sheet {
    let rows: Option<Vec<usize>> = spec.range.as_ref().map(|range| rows_in_range(dataset, range));
    let height = rows.as_ref().map_or(dataset.rows(), Vec::len);

    let mut table = Table::new();
    for column in &spec.columns {
        match column {
            ColumnSpec::From { source, target, format } => {
                let Some(found) = dataset.column(source) else {
                    continue;
                };
                let mut cells: Vec<Cell> = match &rows {
                    Some(rows) => rows.iter().map(|&row| found.cells[row].clone()).collect(),
                    None => found.cells.clone(),
                };
                if let Some(format) = format {
                    // formats only render date-typed columns; anything else
                    // keeps its values as they are
                    if found.is_datetime() {
                        for cell in &mut cells {
                            if let Cell::DateTime(stamp) = cell {
                                *cell = Cell::Text(stamp.format(format).to_string());
                            }
                        }
                    }
                }
                table.push_column(Column::new(target.clone(), cells));
            }
            ColumnSpec::Literal { target, value } => {
                table.push_column(Column::new(target.clone(), vec![value.clone(); height]));
            }
        }
    }

    Sheet {
        name: spec.name.clone(),
        title: spec.title.clone(),
        kind: spec.kind.clone(),
        table,
    }
}

/// Rows whose cell falls inside the window, bounds inclusive at midnight of
/// each day. Nulls and non-date cells fall outside.
fn rows_in_range(dataset: &Table, range: &RangeSpec) -> Vec<usize> {
    let begin = range.begin.and_time(NaiveTime::MIN);
    let end = range.end.and_time(NaiveTime::MIN);
    let Some(column) = dataset.column(&range.column) else {
        return Vec::new();
    };
    column
        .cells
        .iter()
        .enumerate()
        .filter_map(|(row, cell)| match cell.as_datetime() {
            Some(stamp) if stamp >= begin && stamp <= end => Some(row),
            _ => None,
        })
        .collect()
}
