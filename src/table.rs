// table.rs

//! A small column-oriented table: the result type of every accessor.
//!
//! Accessors build a wide table (one numeric column per region, position,
//! etc.) and optionally [`Table::melt`] it into tidy form. String columns may
//! be stored as [`Factor`]s, which is what "compact" output means.

use std::fmt;
use std::io::Write;

use indexmap::IndexMap;

use crate::error::{Result, RiboError};

/// A categorical string column: distinct levels in first-appearance order,
/// and one code per row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Factor {
    levels: Vec<String>,
    codes: Vec<u32>,
}

impl Factor {
    pub fn encode<S: AsRef<str>>(values: &[S]) -> Self {
        let mut lookup: IndexMap<&str, u32> = IndexMap::new();
        let codes = values
            .iter()
            .map(|v| {
                let next = lookup.len() as u32;
                *lookup.entry(v.as_ref()).or_insert(next)
            })
            .collect();
        let levels = lookup.keys().map(|s| s.to_string()).collect();
        Self { levels, codes }
    }

    pub fn levels(&self) -> &[String] {
        &self.levels
    }

    pub fn codes(&self) -> &[u32] {
        &self.codes
    }

    pub fn len(&self) -> usize {
        self.codes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.codes.is_empty()
    }

    pub fn get(&self, i: usize) -> Option<&str> {
        self.codes
            .get(i)
            .map(|&code| self.levels[code as usize].as_str())
    }

    pub fn decode(&self) -> Vec<String> {
        self.codes
            .iter()
            .map(|&code| self.levels[code as usize].clone())
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Column {
    Text(Vec<String>),
    Factor(Factor),
    /// Integer labels, e.g. read length or metagene position.
    Int(Vec<i64>),
    Count(Vec<u64>),
    Float(Vec<f64>),
}

/// A borrowed cell.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Value<'a> {
    Str(&'a str),
    Int(i64),
    Count(u64),
    Float(f64),
}

impl fmt::Display for Value<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Str(s) => f.write_str(s),
            Value::Int(v) => write!(f, "{}", v),
            Value::Count(v) => write!(f, "{}", v),
            Value::Float(v) => write!(f, "{}", v),
        }
    }
}

impl Column {
    pub fn len(&self) -> usize {
        match self {
            Column::Text(v) => v.len(),
            Column::Factor(v) => v.len(),
            Column::Int(v) => v.len(),
            Column::Count(v) => v.len(),
            Column::Float(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, i: usize) -> Option<Value<'_>> {
        match self {
            Column::Text(v) => v.get(i).map(|s| Value::Str(s)),
            Column::Factor(v) => v.get(i).map(Value::Str),
            Column::Int(v) => v.get(i).map(|&x| Value::Int(x)),
            Column::Count(v) => v.get(i).map(|&x| Value::Count(x)),
            Column::Float(v) => v.get(i).map(|&x| Value::Float(x)),
        }
    }

    /// The string at row `i`, for text and factor columns.
    pub fn str_at(&self, i: usize) -> Option<&str> {
        match self {
            Column::Text(v) => v.get(i).map(String::as_str),
            Column::Factor(v) => v.get(i),
            _ => None,
        }
    }

    pub fn as_counts(&self) -> Option<&[u64]> {
        match self {
            Column::Count(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_floats(&self) -> Option<&[f64]> {
        match self {
            Column::Float(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_ints(&self) -> Option<&[i64]> {
        match self {
            Column::Int(v) => Some(v),
            _ => None,
        }
    }

    /// All strings of a text or factor column.
    pub fn strings(&self) -> Option<Vec<&str>> {
        match self {
            Column::Text(v) => Some(v.iter().map(String::as_str).collect()),
            Column::Factor(f) => Some(f.codes.iter().map(|&c| f.levels[c as usize].as_str()).collect()),
            _ => None,
        }
    }

    fn is_string(&self) -> bool {
        matches!(self, Column::Text(_) | Column::Factor(_))
    }

    fn is_measure(&self) -> bool {
        matches!(self, Column::Count(_) | Column::Float(_))
    }

    /// Rows at `indices`, in that order.
    pub(crate) fn take(&self, indices: &[usize]) -> Column {
        match self {
            Column::Text(v) => Column::Text(indices.iter().map(|&i| v[i].clone()).collect()),
            Column::Factor(f) => Column::Factor(Factor {
                levels: f.levels.clone(),
                codes: indices.iter().map(|&i| f.codes[i]).collect(),
            }),
            Column::Int(v) => Column::Int(indices.iter().map(|&i| v[i]).collect()),
            Column::Count(v) => Column::Count(indices.iter().map(|&i| v[i]).collect()),
            Column::Float(v) => Column::Float(indices.iter().map(|&i| v[i]).collect()),
        }
    }

    /// The whole column repeated `times` times.
    pub(crate) fn tile(&self, times: usize) -> Column {
        fn rep<T: Clone>(v: &[T], times: usize) -> Vec<T> {
            let mut out = Vec::with_capacity(v.len() * times);
            for _ in 0..times {
                out.extend_from_slice(v);
            }
            out
        }
        match self {
            Column::Text(v) => Column::Text(rep(v, times)),
            Column::Factor(f) => Column::Factor(Factor {
                levels: f.levels.clone(),
                codes: rep(&f.codes, times),
            }),
            Column::Int(v) => Column::Int(rep(v, times)),
            Column::Count(v) => Column::Count(rep(v, times)),
            Column::Float(v) => Column::Float(rep(v, times)),
        }
    }

    fn to_floats(&self) -> Vec<f64> {
        match self {
            Column::Count(v) => v.iter().map(|&x| x as f64).collect(),
            Column::Float(v) => v.clone(),
            Column::Int(v) => v.iter().map(|&x| x as f64).collect(),
            _ => Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Table {
    names: Vec<String>,
    columns: Vec<Column>,
}

impl Table {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn nrows(&self) -> usize {
        self.columns.first().map_or(0, Column::len)
    }

    pub fn ncols(&self) -> usize {
        self.columns.len()
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.names.iter().map(String::as_str).collect()
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.position(name).map(|i| &self.columns[i])
    }

    pub fn columns(&self) -> impl Iterator<Item = (&str, &Column)> {
        self.names.iter().map(String::as_str).zip(self.columns.iter())
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|n| n == name)
    }

    fn require(&self, name: &str) -> Result<usize> {
        self.position(name)
            .ok_or_else(|| RiboError::TableError(format!("no column named '{}'", name)))
    }

    /// Append a column. Its length must match the existing columns and its
    /// name must be new.
    pub fn push(&mut self, name: impl Into<String>, column: Column) -> Result<()> {
        let name = name.into();
        if self.position(&name).is_some() {
            return Err(RiboError::TableError(format!("duplicate column '{}'", name)));
        }
        if !self.columns.is_empty() && column.len() != self.nrows() {
            return Err(RiboError::TableError(format!(
                "column '{}' has {} rows, table has {}",
                name,
                column.len(),
                self.nrows()
            )));
        }
        self.names.push(name);
        self.columns.push(column);
        Ok(())
    }

    pub fn with_column(mut self, name: impl Into<String>, column: Column) -> Result<Self> {
        self.push(name, column)?;
        Ok(self)
    }

    pub fn replace(&mut self, name: &str, column: Column) -> Result<()> {
        let i = self.require(name)?;
        if column.len() != self.nrows() {
            return Err(RiboError::TableError(format!(
                "replacement for '{}' has {} rows, table has {}",
                name,
                column.len(),
                self.nrows()
            )));
        }
        self.columns[i] = column;
        Ok(())
    }

    /// Cells of row `i`, one per column.
    pub fn row(&self, i: usize) -> Option<Vec<Value<'_>>> {
        if i >= self.nrows() {
            return None;
        }
        self.columns.iter().map(|c| c.get(i)).collect()
    }

    /// Encode every text column as a factor.
    pub fn compact(mut self) -> Self {
        for column in self.columns.iter_mut() {
            if let Column::Text(values) = column {
                *column = Column::Factor(Factor::encode(values));
            }
        }
        self
    }

    /// Decode every factor column back to plain text.
    pub fn expand(mut self) -> Self {
        for column in self.columns.iter_mut() {
            if let Column::Factor(f) = column {
                *column = Column::Text(f.decode());
            }
        }
        self
    }

    /// Wide to long. Every column not in `id_columns` becomes a measurement:
    /// the output has one row per (input row, measurement column), ordered
    /// by measurement column first, then input row. The measurement column
    /// names go into `var_name` and the values into `value_name`.
    pub fn melt(&self, id_columns: &[&str], var_name: &str, value_name: &str) -> Result<Table> {
        let id_idx: Vec<usize> = id_columns
            .iter()
            .map(|name| self.require(name))
            .collect::<Result<_>>()?;
        let value_idx: Vec<usize> = (0..self.ncols()).filter(|i| !id_idx.contains(i)).collect();

        if value_idx.is_empty() {
            return Err(RiboError::TableError("nothing to melt".to_string()));
        }
        if let Some(&bad) = value_idx.iter().find(|&&i| !self.columns[i].is_measure()) {
            return Err(RiboError::TableError(format!(
                "column '{}' is not a count or float column",
                self.names[bad]
            )));
        }

        let nrows = self.nrows();
        let times = value_idx.len();
        let mut out = Table::new();
        for &i in &id_idx {
            out.push(self.names[i].clone(), self.columns[i].tile(times))?;
        }

        let mut var = Vec::with_capacity(nrows * times);
        for &i in &value_idx {
            var.extend(std::iter::repeat(self.names[i].clone()).take(nrows));
        }
        out.push(var_name, Column::Text(var))?;

        let all_counts = value_idx
            .iter()
            .all(|&i| matches!(self.columns[i], Column::Count(_)));
        let values = if all_counts {
            let mut values = Vec::with_capacity(nrows * times);
            for &i in &value_idx {
                if let Column::Count(v) = &self.columns[i] {
                    values.extend_from_slice(v);
                }
            }
            Column::Count(values)
        } else {
            let mut values = Vec::with_capacity(nrows * times);
            for &i in &value_idx {
                values.extend(self.columns[i].to_floats());
            }
            Column::Float(values)
        };
        out.push(value_name, values)?;

        Ok(out)
    }

    /// Long to wide, the inverse of [`Table::melt`]. Rows are keyed by every
    /// column other than `var` and `value`, in first-appearance order; one
    /// output column per distinct `var` value, also in first-appearance
    /// order. Missing cells are zero.
    pub fn pivot_wider(&self, var: &str, value: &str) -> Result<Table> {
        let var_i = self.require(var)?;
        let value_i = self.require(value)?;
        let var_col = &self.columns[var_i];
        let value_col = &self.columns[value_i];
        if !var_col.is_string() {
            return Err(RiboError::TableError(format!("'{}' is not a string column", var)));
        }
        if !value_col.is_measure() {
            return Err(RiboError::TableError(format!(
                "'{}' is not a count or float column",
                value
            )));
        }

        let key_idx: Vec<usize> = (0..self.ncols())
            .filter(|&i| i != var_i && i != value_i)
            .collect();

        let mut groups: IndexMap<Vec<String>, usize> = IndexMap::new();
        let mut first_rows = Vec::new();
        let mut levels: IndexMap<String, usize> = IndexMap::new();
        let mut cells = Vec::with_capacity(self.nrows());
        for row in 0..self.nrows() {
            let key: Vec<String> = key_idx
                .iter()
                .map(|&i| self.columns[i].get(row).map(|v| v.to_string()).unwrap_or_default())
                .collect();
            let next = groups.len();
            let group = *groups.entry(key).or_insert_with(|| {
                first_rows.push(row);
                next
            });
            let name = var_col.str_at(row).unwrap_or_default();
            let next = levels.len();
            let level = *levels.entry(name.to_string()).or_insert(next);
            cells.push((group, level, row));
        }

        let mut out = Table::new();
        for &i in &key_idx {
            out.push(self.names[i].clone(), self.columns[i].take(&first_rows))?;
        }

        let ngroups = groups.len();
        match value_col {
            Column::Count(values) => {
                let mut wide = vec![vec![0u64; ngroups]; levels.len()];
                for (group, level, row) in cells {
                    wide[level][group] = values[row];
                }
                for (name, column) in levels.keys().zip(wide) {
                    out.push(name.clone(), Column::Count(column))?;
                }
            }
            _ => {
                let values = value_col.to_floats();
                let mut wide = vec![vec![0f64; ngroups]; levels.len()];
                for (group, level, row) in cells {
                    wide[level][group] = values[row];
                }
                for (name, column) in levels.keys().zip(wide) {
                    out.push(name.clone(), Column::Float(column))?;
                }
            }
        }

        Ok(out)
    }

    /// Write the table as delimited text with a header row.
    pub fn write_delimited<W: Write>(&self, writer: W, delimiter: u8) -> Result<()> {
        let mut writer = csv::WriterBuilder::new()
            .delimiter(delimiter)
            .from_writer(writer);
        writer.write_record(&self.names)?;
        for row in 0..self.nrows() {
            writer.write_record(
                self.columns
                    .iter()
                    .map(|c| c.get(row).map(|v| v.to_string()).unwrap_or_default()),
            )?;
        }
        writer.flush()?;
        Ok(())
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.names.join("\t"))?;
        for row in 0..self.nrows() {
            let cells: Vec<String> = self
                .columns
                .iter()
                .map(|c| c.get(row).map(|v| v.to_string()).unwrap_or_default())
                .collect();
            writeln!(f, "{}", cells.join("\t"))?;
        }
        Ok(())
    }
}
