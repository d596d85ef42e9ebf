//! Feature table assembly
//!
//! Stacks aligned grids into one row per cell. Only **complete cases** are
//! kept: a cell where any grid is no-data is dropped entirely. This is an
//! implicit missing-data policy and can bias the sample toward areas where
//! every layer is observed (e.g. away from clouds and coast); the
//! [`AssemblyReport`] exposes how many cells each grid removed.

mod csv_out;

use rayon::prelude::*;
use tracing::{info, warn};

use heatisle_core::raster::Raster;
use heatisle_core::{Error, Result};

pub const X_COLUMN: &str = "X";
pub const Y_COLUMN: &str = "Y";

/// How many cells assembly saw, dropped and kept
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AssemblyReport {
    pub total_cells: usize,
    pub dropped_cells: usize,
    pub retained_rows: usize,
    /// Invalid cell count of each stacked grid, in column order
    pub invalid_by_column: Vec<(String, usize)>,
}

/// A constant-per-scene string column, e.g. `Month`
#[derive(Debug, Clone, PartialEq)]
pub struct LabelColumn {
    pub name: String,
    pub values: Vec<String>,
}

/// Summary statistics of one numeric column
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColumnSummary {
    pub count: usize,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub std_dev: f64,
}

/// Model-ready table: `X`, `Y`, one column per stacked grid, optional label
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureTable {
    columns: Vec<String>,
    rows: Vec<Vec<f64>>,
    label: Option<LabelColumn>,
    report: AssemblyReport,
}

/// Stack `grids` into a feature table, keeping complete cases only.
///
/// Every grid must be aligned with the first; a mismatch is a configuration
/// error. Rows follow row-major cell order and X/Y are cell-centre
/// coordinates.
pub fn assemble(grids: &[(&str, &Raster<f64>)]) -> Result<FeatureTable> {
    let (_, template) = *grids.first().ok_or_else(|| Error::InvalidParameter {
        name: "grids",
        value: "[]".into(),
        reason: "at least one grid is required".into(),
    })?;
    for (name, grid) in &grids[1..] {
        template.ensure_aligned(*grid).map_err(|e| {
            warn!("grid '{}' is not aligned with '{}'", name, grids[0].0);
            e
        })?;
    }

    let mut columns = vec![X_COLUMN.to_string(), Y_COLUMN.to_string()];
    for (name, _) in grids {
        if columns.iter().any(|c| c.as_str() == *name) {
            return Err(Error::InvalidParameter {
                name: "grids",
                value: name.to_string(),
                reason: "duplicate column name".into(),
            });
        }
        columns.push(name.to_string());
    }

    let (rows, cols) = template.shape();
    let table_rows: Vec<Vec<f64>> = (0..rows)
        .into_par_iter()
        .flat_map_iter(|row| {
            (0..cols).filter_map(move |col| {
                let mut values = Vec::with_capacity(grids.len() + 2);
                let (x, y) = template.pixel_to_geo(col, row);
                values.push(x);
                values.push(y);
                for (_, grid) in grids {
                    values.push(grid.cell(row, col)?);
                }
                Some(values)
            })
        })
        .collect();

    let total_cells = rows * cols;
    let report = AssemblyReport {
        total_cells,
        dropped_cells: total_cells - table_rows.len(),
        retained_rows: table_rows.len(),
        invalid_by_column: grids
            .iter()
            .map(|(name, grid)| (name.to_string(), grid.len() - grid.valid_count()))
            .collect(),
    };
    info!(
        "feature table: {} cells, {} dropped (incomplete), {} rows retained",
        report.total_cells, report.dropped_cells, report.retained_rows
    );
    if report.retained_rows == 0 {
        warn!("feature table is empty: no cell is valid in every grid");
    }

    Ok(FeatureTable {
        columns,
        rows: table_rows,
        label: None,
        report,
    })
}

impl FeatureTable {
    /// Numeric column names, starting with `X`, `Y`
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<f64>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn label(&self) -> Option<&LabelColumn> {
        self.label.as_ref()
    }

    pub fn report(&self) -> &AssemblyReport {
        &self.report
    }

    pub fn column_index(&self, name: &str) -> Result<usize> {
        self.columns
            .iter()
            .position(|c| c == name)
            .ok_or_else(|| Error::InvalidParameter {
                name: "column",
                value: name.to_string(),
                reason: format!("not one of {:?}", self.columns),
            })
    }

    pub fn column(&self, name: &str) -> Result<Vec<f64>> {
        let idx = self.column_index(name)?;
        Ok(self.rows.iter().map(|r| r[idx]).collect())
    }

    /// Count, extrema, mean and population standard deviation of a column
    pub fn column_summary(&self, name: &str) -> Result<ColumnSummary> {
        let values = self.column(name)?;
        if values.is_empty() {
            return Err(Error::Algorithm(format!("column '{}' has no rows", name)));
        }
        let n = values.len() as f64;
        let mean = values.iter().sum::<f64>() / n;
        let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
        Ok(ColumnSummary {
            count: values.len(),
            min: values.iter().copied().fold(f64::INFINITY, f64::min),
            max: values.iter().copied().fold(f64::NEG_INFINITY, f64::max),
            mean,
            std_dev: var.sqrt(),
        })
    }

    /// Derived subset of the rows whose `column` value satisfies `predicate`
    pub fn filter<F>(&self, column: &str, predicate: F) -> Result<FeatureTable>
    where
        F: Fn(f64) -> bool,
    {
        let idx = self.column_index(column)?;
        let keep: Vec<usize> = (0..self.rows.len())
            .filter(|&i| predicate(self.rows[i][idx]))
            .collect();
        info!("filter on '{}': {} of {} rows kept", column, keep.len(), self.rows.len());

        Ok(FeatureTable {
            columns: self.columns.clone(),
            rows: keep.iter().map(|&i| self.rows[i].clone()).collect(),
            label: self.label.as_ref().map(|l| LabelColumn {
                name: l.name.clone(),
                values: keep.iter().map(|&i| l.values[i].clone()).collect(),
            }),
            report: self.report.clone(),
        })
    }

    /// Rows where `column > threshold`
    pub fn filter_above(&self, column: &str, threshold: f64) -> Result<FeatureTable> {
        self.filter(column, |v| v > threshold)
    }

    /// Attach a constant string column, e.g. `Month = "Aug"`
    pub fn with_label(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        let value = value.into();
        self.label = Some(LabelColumn {
            name: name.into(),
            values: vec![value; self.rows.len()],
        });
        self
    }

    /// Stack tables with identical columns (e.g. one per acquisition month)
    pub fn concat(tables: Vec<FeatureTable>) -> Result<FeatureTable> {
        let mut iter = tables.into_iter();
        let mut out = iter.next().ok_or_else(|| Error::InvalidParameter {
            name: "tables",
            value: "[]".into(),
            reason: "nothing to concatenate".into(),
        })?;
        for table in iter {
            let same_label = match (&out.label, &table.label) {
                (None, None) => true,
                (Some(a), Some(b)) => a.name == b.name,
                _ => false,
            };
            if table.columns != out.columns || !same_label {
                return Err(Error::InvalidParameter {
                    name: "tables",
                    value: format!("{:?}", table.columns),
                    reason: format!("columns differ from {:?}", out.columns),
                });
            }
            if let (Some(a), Some(b)) = (out.label.as_mut(), table.label) {
                a.values.extend(b.values);
            }
            out.rows.extend(table.rows);
            out.report.total_cells += table.report.total_cells;
            out.report.dropped_cells += table.report.dropped_cells;
            out.report.retained_rows += table.report.retained_rows;
        }
        Ok(out)
    }
}
