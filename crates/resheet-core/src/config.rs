//! Configuration parsing and validation
//!
//! This module loads the two JSON config files that drive a run and walks
//! them into typed specs before any data is touched. Structural problems
//! (wrong shapes, empty lists, broken ranges) fail immediately; absent
//! required keys are collected across the whole document and reported
//! together, so a config with several omissions fails once with the full
//! list.
//!
//! # Input config
//!
//! A mapping, or sequence of mappings, each describing one source file:
//!
//! ```json
//! [
//!   {"filename": "people.csv",
//!    "columns": [{"name": "id", "from": "employee_id"},
//!                {"name": "hired", "from": "hire_date", "format": "%Y-%m-%d"},
//!                {"name": "active", "value": true}]},
//!   {"filename": "salaries.csv",
//!    "columns": [{"name": "id", "from": "employee_id"},
//!                {"name": "salary", "from": "amount"}],
//!    "join_on": "id"}
//! ]
//! ```
//!
//! # Output config
//!
//! A mapping, or sequence of mappings, each describing one output artifact
//! and its sheets:
//!
//! ```json
//! {"filename": "report.xlsx",
//!  "sheets": [{"name": "active", "title": "Active people", "type": "table",
//!              "range": {"column": "hired", "begin": [2024, 1, 1], "end": [2024, 6, 30]},
//!              "columns": [{"name": "Employee", "from": "id"},
//!                          {"name": "Hired", "from": "hired", "format": "%d.%m.%Y"}]}]}
//! ```

use std::collections::HashSet;
use std::fmt::Write as _;
use std::fs;
use std::path::Path;

use chrono::NaiveDate;
use serde_json::{Map, Value};

use crate::error::{Error, Result};
use crate::table::Cell;

/// Validated input config: which files to read and how to shape each one.
#[derive(Debug, Clone, PartialEq)]
pub struct InputConfig {
    /// One spec per source file, in declaration order
    pub files: Vec<InputFileSpec>,
}

/// One source file and the columns to project out of it.
#[derive(Debug, Clone, PartialEq)]
pub struct InputFileSpec {
    /// Filename to read, relative to the input directory
    pub filename: String,
    /// Columns of the shaped table, in declaration order
    pub columns: Vec<ColumnSpec>,
    /// When set, this file is left-joined onto the accumulated dataset
    /// instead of concatenated
    pub join_on: Option<String>,
}

/// One column of a shaped table or an output sheet.
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnSpec {
    /// Column copied from an existing column, optionally date-converted
    From {
        /// Column name in the data being read
        source: String,
        /// Column name in the produced table
        target: String,
        /// strftime-style date format, validated at config time
        format: Option<String>,
    },
    /// Column filled with one constant value on every row
    Literal {
        /// Column name in the produced table
        target: String,
        /// The constant cell
        value: Cell,
    },
}

impl ColumnSpec {
    /// Name the column carries in the produced table.
    pub fn target(&self) -> &str {
        match self {
            ColumnSpec::From { target, .. } => target,
            ColumnSpec::Literal { target, .. } => target,
        }
    }
}

/// Validated output config: which artifacts to write and their sheets.
#[derive(Debug, Clone, PartialEq)]
pub struct OutputConfig {
    /// One spec per output artifact, in declaration order
    pub files: Vec<OutputFileSpec>,
}

/// One output artifact and the sheets it contains.
#[derive(Debug, Clone, PartialEq)]
pub struct OutputFileSpec {
    /// Artifact filename, relative to the output directory
    pub filename: String,
    /// Sheets of the artifact, in declaration order
    pub sheets: Vec<SheetSpec>,
}

/// One sheet of an output artifact.
#[derive(Debug, Clone, PartialEq)]
pub struct SheetSpec {
    /// Sheet name, unique within its artifact
    pub name: String,
    /// Human-readable sheet title
    pub title: String,
    /// Free-form sheet kind tag from the config's `type` key
    pub kind: String,
    /// Optional date window restricting which dataset rows the sheet shows
    pub range: Option<RangeSpec>,
    /// Columns of the sheet, in declaration order
    pub columns: Vec<ColumnSpec>,
}

/// Inclusive date window over one dataset column.
#[derive(Debug, Clone, PartialEq)]
pub struct RangeSpec {
    /// Dataset column the window filters on; must be date-typed at run time
    pub column: String,
    /// First day of the window
    pub begin: NaiveDate,
    /// Last day of the window
    pub end: NaiveDate,
}

impl InputConfig {
    /// Loads and validates an input config file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let origin = path.display().to_string();
        if !path.is_file() {
            return Err(Error::ConfigFileNotFound { path: origin });
        }
        let contents = fs::read_to_string(path)?;
        Self::parse(&contents, &origin)
    }

    /// Validates input config text. `origin` is the display name used in
    /// error messages, normally the path the text was read from.
    pub fn parse(contents: &str, origin: &str) -> Result<Self> {
        let doc: Value = serde_json::from_str(contents).map_err(|source| Error::InvalidSyntax {
            config: origin.to_string(),
            source,
        })?;
        validate_input(&doc, origin)
    }
}

impl OutputConfig {
    /// Loads and validates an output config file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let origin = path.display().to_string();
        if !path.is_file() {
            return Err(Error::ConfigFileNotFound { path: origin });
        }
        let contents = fs::read_to_string(path)?;
        Self::parse(&contents, &origin)
    }

    /// Validates output config text. `origin` is the display name used in
    /// error messages, normally the path the text was read from.
    pub fn parse(contents: &str, origin: &str) -> Result<Self> {
        let doc: Value = serde_json::from_str(contents).map_err(|source| Error::InvalidSyntax {
            config: origin.to_string(),
            source,
        })?;
        validate_output(&doc, origin)
    }
}

/// A single mapping counts as a one-entry sequence, even an empty one; the
/// walk then reports its absent keys. An empty sequence is unusable, as is
/// anything that is not a mapping or a sequence.
fn entries_of(doc: &Value) -> Option<Vec<&Value>> {
    match doc {
        Value::Object(_) => Some(vec![doc]),
        Value::Array(entries) if !entries.is_empty() => Some(entries.iter().collect()),
        _ => None,
    }
}

fn string_key(map: &Map<String, Value>, key: &str) -> Option<String> {
    map.get(key).and_then(Value::as_str).map(str::to_owned)
}

fn validate_input(doc: &Value, origin: &str) -> Result<InputConfig> {
    let entries = entries_of(doc).ok_or_else(|| Error::MissingInputFileInfo {
        config: origin.to_string(),
    })?;

    let mut missing: Vec<String> = Vec::new();
    let mut files = Vec::with_capacity(entries.len());
    for entry in entries {
        let Some(map) = entry.as_object() else {
            return Err(Error::MissingInputFileInfo { config: origin.to_string() });
        };

        let filename = string_key(map, "filename");
        if filename.is_none() {
            missing.push("filename".to_string());
        }

        let columns = match map.get("columns") {
            Some(value) => validate_columns(value, origin, &mut missing)?,
            None => {
                missing.push("columns".to_string());
                Vec::new()
            }
        };

        let join_on = match map.get("join_on") {
            Some(value) => match value.as_str() {
                Some(column) => Some(column.to_string()),
                None => {
                    missing.push("join_on".to_string());
                    None
                }
            },
            None => None,
        };

        files.push(InputFileSpec {
            filename: filename.unwrap_or_default(),
            columns,
            join_on,
        });
    }

    if !missing.is_empty() {
        return Err(Error::MissingKeys { config: origin.to_string(), keys: missing });
    }
    Ok(InputConfig { files })
}

fn validate_output(doc: &Value, origin: &str) -> Result<OutputConfig> {
    let entries = entries_of(doc).ok_or_else(|| Error::MissingOutputFileInfo {
        config: origin.to_string(),
    })?;

    let mut missing: Vec<String> = Vec::new();
    let mut files = Vec::with_capacity(entries.len());
    for entry in entries {
        let Some(map) = entry.as_object() else {
            return Err(Error::MissingOutputFileInfo { config: origin.to_string() });
        };

        let filename = string_key(map, "filename");
        if filename.is_none() {
            missing.push("filename".to_string());
        }

        let sheets = match map.get("sheets") {
            Some(value) => validate_sheets(value, origin, &mut missing)?,
            None => {
                missing.push("sheets".to_string());
                Vec::new()
            }
        };

        files.push(OutputFileSpec {
            filename: filename.unwrap_or_default(),
            sheets,
        });
    }

    if !missing.is_empty() {
        return Err(Error::MissingKeys { config: origin.to_string(), keys: missing });
    }
    Ok(OutputConfig { files })
}

fn validate_sheets(value: &Value, origin: &str, missing: &mut Vec<String>) -> Result<Vec<SheetSpec>> {
    let entries = entries_of(value).ok_or_else(|| Error::MissingSheetInfo {
        config: origin.to_string(),
    })?;

    let mut seen: HashSet<String> = HashSet::new();
    let mut sheets = Vec::with_capacity(entries.len());
    for (index, entry) in entries.into_iter().enumerate() {
        let Some(map) = entry.as_object() else {
            return Err(Error::InvalidSheetInfo {
                config: origin.to_string(),
                message: format!("sheet #{} is not a mapping", index + 1),
            });
        };

        let name = string_key(map, "name");
        if name.is_none() {
            missing.push("name".to_string());
        }
        if let Some(name) = &name {
            if !seen.insert(name.clone()) {
                return Err(Error::InvalidSheetInfo {
                    config: origin.to_string(),
                    message: format!("duplicate sheet name '{name}'"),
                });
            }
        }
        // range errors can fire before the name shortfall is reported, so
        // fall back to the sheet's position for context
        let label = name.clone().unwrap_or_else(|| format!("#{}", index + 1));

        let title = string_key(map, "title");
        if title.is_none() {
            missing.push("title".to_string());
        }
        let kind = string_key(map, "type");
        if kind.is_none() {
            missing.push("type".to_string());
        }

        let columns = match map.get("columns") {
            Some(value) => validate_columns(value, origin, missing)?,
            None => {
                missing.push("columns".to_string());
                Vec::new()
            }
        };

        let range = match map.get("range") {
            Some(value) => Some(validate_range(value, origin, &label)?),
            None => None,
        };

        sheets.push(SheetSpec {
            name: name.unwrap_or_default(),
            title: title.unwrap_or_default(),
            kind: kind.unwrap_or_default(),
            range,
            columns,
        });
    }
    Ok(sheets)
}

fn validate_columns(value: &Value, origin: &str, missing: &mut Vec<String>) -> Result<Vec<ColumnSpec>> {
    let entries = match value.as_array() {
        Some(entries) if !entries.is_empty() => entries,
        _ => return Err(Error::MissingColumnInfo { config: origin.to_string() }),
    };

    let mut seen: HashSet<String> = HashSet::new();
    let mut columns = Vec::with_capacity(entries.len());
    for (index, entry) in entries.iter().enumerate() {
        let Some(map) = entry.as_object() else {
            return Err(Error::InvalidColumnInfo {
                config: origin.to_string(),
                message: format!("column #{} is not a mapping", index + 1),
            });
        };

        let name = string_key(map, "name");
        if name.is_none() {
            missing.push("name".to_string());
        }
        if let Some(name) = &name {
            if !seen.insert(name.clone()) {
                return Err(Error::InvalidColumnInfo {
                    config: origin.to_string(),
                    message: format!("duplicate column name '{name}'"),
                });
            }
        }
        let label = name.clone().unwrap_or_else(|| format!("#{}", index + 1));

        match (map.get("from"), map.get("value")) {
            (Some(_), Some(_)) => {
                return Err(Error::InvalidColumnInfo {
                    config: origin.to_string(),
                    message: format!("column '{label}' declares both 'from' and 'value'"),
                });
            }
            (None, None) => missing.push("from".to_string()),
            (Some(from), None) => {
                let Some(source) = from.as_str() else {
                    missing.push("from".to_string());
                    continue;
                };
                let format = match map.get("format") {
                    Some(format) => match format.as_str() {
                        Some(format) if check_date_format(format) => Some(format.to_string()),
                        _ => {
                            return Err(Error::InvalidColumnInfo {
                                config: origin.to_string(),
                                message: format!(
                                    "column '{label}' declares an unusable date format"
                                ),
                            });
                        }
                    },
                    None => None,
                };
                if let Some(target) = name {
                    columns.push(ColumnSpec::From {
                        source: source.to_string(),
                        target,
                        format,
                    });
                }
            }
            (None, Some(value)) => {
                let Some(cell) = literal_cell(value) else {
                    return Err(Error::InvalidColumnInfo {
                        config: origin.to_string(),
                        message: format!("literal value for column '{label}' must be a scalar"),
                    });
                };
                if let Some(target) = name {
                    columns.push(ColumnSpec::Literal { target, value: cell });
                }
            }
        }
    }
    Ok(columns)
}

fn validate_range(value: &Value, origin: &str, sheet: &str) -> Result<RangeSpec> {
    let missing_range = || Error::MissingRangeInfo {
        config: origin.to_string(),
        sheet: sheet.to_string(),
    };
    let map = value.as_object().ok_or_else(missing_range)?;
    let column = string_key(map, "column").ok_or_else(missing_range)?;
    let begin_value = map.get("begin").ok_or_else(missing_range)?;
    let end_value = map.get("end").ok_or_else(missing_range)?;

    let begin = range_date(begin_value, origin, sheet, "begin")?;
    let end = range_date(end_value, origin, sheet, "end")?;
    if begin > end {
        return Err(Error::InvalidRangeInfo {
            config: origin.to_string(),
            sheet: sheet.to_string(),
            message: format!(
                "begin date {} is after end date {}",
                begin.format("%Y-%m-%d"),
                end.format("%Y-%m-%d")
            ),
        });
    }
    Ok(RangeSpec { column, begin, end })
}

fn range_date(value: &Value, origin: &str, sheet: &str, key: &str) -> Result<NaiveDate> {
    let invalid = |message: String| Error::InvalidRangeInfo {
        config: origin.to_string(),
        sheet: sheet.to_string(),
        message,
    };
    let parts = value
        .as_array()
        .filter(|parts| parts.len() == 3)
        .ok_or_else(|| invalid(format!("'{key}' is not a [year, month, day] triple")))?;
    let numbers: Vec<i64> = parts.iter().filter_map(Value::as_i64).collect();
    let [year, month, day] = numbers[..] else {
        return Err(invalid(format!("'{key}' is not a [year, month, day] triple")));
    };
    let date = i32::try_from(year)
        .ok()
        .zip(u32::try_from(month).ok())
        .zip(u32::try_from(day).ok())
        .and_then(|((year, month), day)| NaiveDate::from_ymd_opt(year, month, day));
    date.ok_or_else(|| invalid(format!("'{key}' [{year}, {month}, {day}] is not a valid calendar date")))
}

fn literal_cell(value: &Value) -> Option<Cell> {
    match value {
        Value::Null => Some(Cell::Null),
        Value::Bool(flag) => Some(Cell::Text(flag.to_string())),
        Value::Number(number) => number.as_f64().map(Cell::Number),
        Value::String(text) => Some(Cell::Text(text.clone())),
        Value::Array(_) | Value::Object(_) => None,
    }
}

/// True when rendering a date through `format` can not fail at run time.
/// Rejects malformed specifiers and ones that need a time zone, which a
/// zoneless timestamp can never satisfy.
fn check_date_format(format: &str) -> bool {
    match NaiveDate::from_ymd_opt(2001, 7, 8).and_then(|date| date.and_hms_opt(9, 5, 32)) {
        Some(probe) => {
            let mut rendered = String::new();
            write!(rendered, "{}", probe.format(format)).is_ok()
        }
        None => false,
    }
}
