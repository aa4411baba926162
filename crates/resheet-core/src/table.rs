//! In-memory tabular data model
//!
//! A [`Table`] is a list of named, equal-length [`Column`]s. Cells are
//! individually tagged values, so a column may mix types; what matters to the
//! pipeline is the run-time shape, not a declared schema. Tables carry the
//! combine primitives the assembly engine is built on: outer concatenation
//! and left joins.

use std::collections::{HashMap, HashSet};

use chrono::NaiveDateTime;

/// A single cell value.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    /// Absent value; renders as the empty string
    Null,
    /// Free-form text
    Text(String),
    /// Numeric value; integral numbers render without a decimal point
    Number(f64),
    /// Zoneless timestamp produced by date conversion
    DateTime(NaiveDateTime),
}

impl Cell {
    /// True for [`Cell::Null`].
    pub fn is_null(&self) -> bool {
        matches!(self, Cell::Null)
    }

    /// The timestamp carried by a [`Cell::DateTime`], if any.
    pub fn as_datetime(&self) -> Option<NaiveDateTime> {
        match self {
            Cell::DateTime(dt) => Some(*dt),
            _ => None,
        }
    }

    /// Renders the cell for output. Nulls render empty, numbers drop a
    /// trailing `.0`, timestamps use `%Y-%m-%d %H:%M:%S`.
    pub fn render(&self) -> String {
        match self {
            Cell::Null => String::new(),
            Cell::Text(text) => text.clone(),
            Cell::Number(number) => format!("{number}"),
            Cell::DateTime(dt) => dt.format("%Y-%m-%d %H:%M:%S").to_string(),
        }
    }

    /// Hashable join identity for this cell. Nulls have none, so a null key
    /// never matches any row on the other side of a join.
    pub(crate) fn join_key(&self) -> Option<JoinKey> {
        match self {
            Cell::Null => None,
            Cell::Text(text) => Some(JoinKey::Text(text.clone())),
            Cell::Number(number) => {
                // fold -0.0 into 0.0 so the two compare equal as keys
                let bits = if *number == 0.0 { 0f64.to_bits() } else { number.to_bits() };
                Some(JoinKey::Number(bits))
            }
            Cell::DateTime(dt) => Some(JoinKey::Stamp(*dt)),
        }
    }
}

/// Join identity of a non-null cell. Numbers are keyed by their bit pattern,
/// which keeps equal floats equal without handing `f64` to a hash map.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) enum JoinKey {
    Text(String),
    Number(u64),
    Stamp(NaiveDateTime),
}

/// A named column of cells.
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    /// Column name, unique within its table
    pub name: String,
    /// Cell values, one per table row
    pub cells: Vec<Cell>,
}

impl Column {
    /// Creates a column from a name and its cells.
    pub fn new(name: impl Into<String>, cells: Vec<Cell>) -> Self {
        Self { name: name.into(), cells }
    }

    /// Number of cells in the column.
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    /// True when the column has no cells.
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// True when every non-null cell is a timestamp. A column of only nulls
    /// counts as date-typed; a single text or number cell disqualifies it.
    pub fn is_datetime(&self) -> bool {
        self.cells.iter().all(|cell| matches!(cell, Cell::Null | Cell::DateTime(_)))
    }
}

/// A table of named, equal-length columns.
///
/// Column order is meaningful and preserved by every operation; lookups by
/// name return the first match.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Table {
    columns: Vec<Column>,
}

impl Table {
    /// Creates an empty table with no columns and no rows.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a table from pre-built columns.
    pub fn from_columns(columns: Vec<Column>) -> Self {
        let mut table = Self::new();
        for column in columns {
            table.push_column(column);
        }
        table
    }

    /// Number of rows, 0 for a table with no columns.
    pub fn rows(&self) -> usize {
        self.columns.first().map_or(0, Column::len)
    }

    /// Number of columns.
    pub fn width(&self) -> usize {
        self.columns.len()
    }

    /// True when the table has no columns.
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// All columns, in order.
    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    /// Column names, in order.
    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|column| column.name.as_str())
    }

    /// First column with the given name, if any.
    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|column| column.name == name)
    }

    pub(crate) fn column_mut(&mut self, name: &str) -> Option<&mut Column> {
        self.columns.iter_mut().find(|column| column.name == name)
    }

    /// True when a column with the given name exists.
    pub fn has_column(&self, name: &str) -> bool {
        self.column(name).is_some()
    }

    /// Appends a column. The column must match the table's row count.
    pub fn push_column(&mut self, column: Column) {
        debug_assert!(
            self.columns.is_empty() || column.len() == self.rows(),
            "column '{}' has {} cells, table has {} rows",
            column.name,
            column.len(),
            self.rows()
        );
        self.columns.push(column);
    }

    /// Stacks tables vertically with outer column alignment: the result has
    /// the union of all column names in first-seen order, and rows from a
    /// table without some column carry nulls there. Row order follows the
    /// order of the given tables.
    pub fn concat_outer(tables: Vec<Table>) -> Table {
        let mut order: Vec<String> = Vec::new();
        for table in &tables {
            for column in &table.columns {
                if !order.iter().any(|name| name == &column.name) {
                    order.push(column.name.clone());
                }
            }
        }
        let total: usize = tables.iter().map(Table::rows).sum();
        let mut out = Table::new();
        for name in order {
            let mut cells = Vec::with_capacity(total);
            for table in &tables {
                match table.column(&name) {
                    Some(column) => cells.extend(column.cells.iter().cloned()),
                    None => cells.extend(std::iter::repeat_n(Cell::Null, table.rows())),
                }
            }
            out.push_column(Column::new(name, cells));
        }
        out
    }

    /// Left-joins `right` onto `self` on the named key column.
    ///
    /// Every left row appears at least once, in order; a left row with
    /// several key matches fans out into one row per match, right rows in
    /// their original order. Unmatched left rows carry nulls in the right
    /// columns, and null keys never match. When a non-key column name exists
    /// on both sides, the left copy is renamed `<name>_x` and the right copy
    /// `<name>_y`.
    ///
    /// Callers verify beforehand that both tables carry the key column; a
    /// table without it is returned unchanged.
    pub fn left_join(&self, right: &Table, key: &str) -> Table {
        let (Some(left_key), Some(right_key)) = (self.column(key), right.column(key)) else {
            return self.clone();
        };

        let mut index: HashMap<JoinKey, Vec<usize>> = HashMap::new();
        for (row, cell) in right_key.cells.iter().enumerate() {
            if let Some(k) = cell.join_key() {
                index.entry(k).or_default().push(row);
            }
        }

        let mut pairs: Vec<(usize, Option<usize>)> = Vec::new();
        for (row, cell) in left_key.cells.iter().enumerate() {
            match cell.join_key().and_then(|k| index.get(&k)) {
                Some(matches) => pairs.extend(matches.iter().map(|&r| (row, Some(r)))),
                None => pairs.push((row, None)),
            }
        }

        let collisions: HashSet<&str> = right
            .columns
            .iter()
            .filter(|column| column.name != key && self.has_column(&column.name))
            .map(|column| column.name.as_str())
            .collect();

        let mut out = Table::new();
        for column in &self.columns {
            let name = if collisions.contains(column.name.as_str()) {
                format!("{}_x", column.name)
            } else {
                column.name.clone()
            };
            let cells = pairs.iter().map(|&(left, _)| column.cells[left].clone()).collect();
            out.push_column(Column::new(name, cells));
        }
        for column in &right.columns {
            if column.name == key {
                continue;
            }
            let name = if collisions.contains(column.name.as_str()) {
                format!("{}_y", column.name)
            } else {
                column.name.clone()
            };
            let cells = pairs
                .iter()
                .map(|&(_, right_row)| right_row.map_or(Cell::Null, |r| column.cells[r].clone()))
                .collect();
            out.push_column(Column::new(name, cells));
        }
        out
    }

    /// New table holding the given rows of this one, in the given order.
    pub fn take_rows(&self, rows: &[usize]) -> Table {
        let mut out = Table::new();
        for column in &self.columns {
            let cells = rows.iter().map(|&row| column.cells[row].clone()).collect();
            out.push_column(Column::new(column.name.clone(), cells));
        }
        out
    }
}
