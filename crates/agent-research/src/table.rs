//! Tabular query results and the statistics derived from them

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Summary statistics of one numeric column
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ColumnStats {
    pub min: f64,
    pub max: f64,
    pub avg: f64,
    pub median: f64,
}

impl ColumnStats {
    /// Compute statistics; `None` for an empty slice
    pub fn from_values(values: &[f64]) -> Option<Self> {
        if values.is_empty() {
            return None;
        }
        let mut sorted = values.to_vec();
        sorted.sort_by(f64::total_cmp);

        let n = sorted.len();
        let median = if n % 2 == 0 {
            (sorted[n / 2 - 1] + sorted[n / 2]) / 2.0
        } else {
            sorted[n / 2]
        };

        Some(Self {
            min: sorted[0],
            max: sorted[n - 1],
            avg: sorted.iter().sum::<f64>() / n as f64,
            median,
        })
    }
}

/// Rows returned by the warehouse
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Table {
    /// Column names in result order
    pub columns: Vec<String>,
    /// Row values, one per column
    pub rows: Vec<Vec<Value>>,
}

/// Interpret a cell as a number; numeric strings count
pub fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}

impl Table {
    /// Create a table
    pub fn new(columns: Vec<String>, rows: Vec<Vec<Value>>) -> Self {
        Self { columns, rows }
    }

    /// Number of rows
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// True when there are no rows
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Position of a column, matched case-insensitively
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns
            .iter()
            .position(|c| c == name)
            .or_else(|| self.columns.iter().position(|c| c.eq_ignore_ascii_case(name)))
    }

    /// Whether a column exists
    pub fn has_column(&self, name: &str) -> bool {
        self.column_index(name).is_some()
    }

    /// Cells of one column
    pub fn column(&self, name: &str) -> Vec<&Value> {
        match self.column_index(name) {
            Some(idx) => self.rows.iter().filter_map(|row| row.get(idx)).collect(),
            None => Vec::new(),
        }
    }

    /// Numeric cells of one column, `None` where a cell is missing or not a number
    pub fn numeric_column(&self, name: &str) -> Vec<Option<f64>> {
        self.column(name).into_iter().map(as_number).collect()
    }

    /// Columns with at least one value where every non-null value is numeric
    pub fn numeric_columns(&self) -> Vec<String> {
        self.columns
            .iter()
            .filter(|name| {
                let cells = self.column(name);
                let present: Vec<&Value> = cells.into_iter().filter(|v| !v.is_null()).collect();
                !present.is_empty() && present.iter().all(|v| as_number(v).is_some())
            })
            .cloned()
            .collect()
    }

    /// min/max/avg/median for every numeric column
    pub fn stats(&self) -> BTreeMap<String, ColumnStats> {
        self.numeric_columns()
            .into_iter()
            .filter_map(|name| {
                let values: Vec<f64> = self.numeric_column(&name).into_iter().flatten().collect();
                ColumnStats::from_values(&values).map(|stats| (name, stats))
            })
            .collect()
    }

    /// Rows as JSON objects keyed by column name
    pub fn records(&self, limit: usize) -> Vec<Map<String, Value>> {
        self.rows
            .iter()
            .take(limit)
            .map(|row| {
                self.columns
                    .iter()
                    .cloned()
                    .zip(row.iter().cloned())
                    .collect::<Map<String, Value>>()
            })
            .collect()
    }

    /// Copy of the table sorted ascending by one column's text value
    pub fn sorted_by(&self, name: &str) -> Table {
        let mut rows = self.rows.clone();
        if let Some(idx) = self.column_index(name) {
            rows.sort_by(|a, b| cell_text(a.get(idx)).cmp(&cell_text(b.get(idx))));
        }
        Table::new(self.columns.clone(), rows)
    }

    /// Pearson correlation of two columns over rows where both are numeric
    pub fn correlation(&self, a: &str, b: &str) -> Option<f64> {
        let pairs: Vec<(f64, f64)> = self
            .numeric_column(a)
            .into_iter()
            .zip(self.numeric_column(b))
            .filter_map(|(x, y)| Some((x?, y?)))
            .collect();
        pearson(&pairs)
    }
}

/// Text form of a cell for display and ordering
pub fn cell_text(value: Option<&Value>) -> String {
    match value {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Null) | None => String::new(),
        Some(other) => other.to_string(),
    }
}

fn pearson(pairs: &[(f64, f64)]) -> Option<f64> {
    if pairs.len() < 2 {
        return None;
    }
    let n = pairs.len() as f64;
    let mean_x = pairs.iter().map(|p| p.0).sum::<f64>() / n;
    let mean_y = pairs.iter().map(|p| p.1).sum::<f64>() / n;

    let mut cov = 0.0;
    let mut var_x = 0.0;
    let mut var_y = 0.0;
    for (x, y) in pairs {
        let dx = x - mean_x;
        let dy = y - mean_y;
        cov += dx * dy;
        var_x += dx * dx;
        var_y += dy * dy;
    }

    let denom = (var_x * var_y).sqrt();
    if denom == 0.0 {
        return None;
    }
    Some(cov / denom)
}
