//! Column profiling: the local statistics handed to the analysis prompt.

use std::collections::BTreeMap;
use std::fmt::Write as _;

use serde::Serialize;

use super::{Dataset, is_missing, parse_number};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnKind {
    Numeric,
    Text,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ColumnStats {
    Numeric { min: f64, max: f64, mean: f64, std_dev: f64 },
    Text { distinct: usize, top: Option<String>, top_count: usize },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColumnProfile {
    pub name: String,
    /// Non-missing cells.
    pub count: usize,
    pub missing: usize,
    pub stats: ColumnStats,
}

impl ColumnProfile {
    pub fn kind(&self) -> ColumnKind {
        match self.stats {
            ColumnStats::Numeric { .. } => ColumnKind::Numeric,
            ColumnStats::Text { .. } => ColumnKind::Text,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DatasetSummary {
    pub dataset_id: String,
    pub rows: usize,
    pub columns: Vec<ColumnProfile>,
}

impl DatasetSummary {
    /// Plain-text profile, one line per column.
    pub fn render(&self) -> String {
        let mut out = format!("{} rows, {} columns\n", self.rows, self.columns.len());
        for c in &self.columns {
            let _ = match &c.stats {
                ColumnStats::Numeric { min, max, mean, std_dev } => writeln!(
                    out,
                    "- {} (numeric): count={} missing={} min={} max={} mean={} std={}",
                    c.name,
                    c.count,
                    c.missing,
                    format_number(*min),
                    format_number(*max),
                    format_number(*mean),
                    format_number(*std_dev),
                ),
                ColumnStats::Text { distinct, top, top_count } => writeln!(
                    out,
                    "- {} (text): count={} missing={} distinct={} top={} ({}x)",
                    c.name,
                    c.count,
                    c.missing,
                    distinct,
                    top.as_deref().unwrap_or("-"),
                    top_count,
                ),
            };
        }
        out
    }

    /// Column names with their kind, for the chart-selection prompt.
    pub fn column_listing(&self) -> String {
        self.columns
            .iter()
            .map(|c| match c.kind() {
                ColumnKind::Numeric => format!("- {} (numeric)", c.name),
                ColumnKind::Text => format!("- {} (text)", c.name),
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

pub(super) fn summarise(ds: &Dataset) -> DatasetSummary {
    let columns = ds
        .headers()
        .iter()
        .enumerate()
        .map(|(idx, name)| profile_column(name, ds.column(idx)))
        .collect();
    DatasetSummary { dataset_id: ds.id().to_string(), rows: ds.row_count(), columns }
}

fn profile_column<'a>(name: &str, cells: impl Iterator<Item = &'a str>) -> ColumnProfile {
    let mut missing = 0usize;
    let mut present: Vec<&str> = Vec::new();
    for cell in cells {
        if is_missing(cell) {
            missing += 1;
        } else {
            present.push(cell);
        }
    }

    let numbers: Option<Vec<f64>> = if present.is_empty() {
        None
    } else {
        present.iter().map(|c| parse_number(c)).collect()
    };

    let stats = match numbers {
        Some(values) => numeric_stats(&values),
        None => text_stats(&present),
    };

    ColumnProfile { name: name.to_string(), count: present.len(), missing, stats }
}

fn numeric_stats(values: &[f64]) -> ColumnStats {
    let n = values.len() as f64;
    let min = values.iter().copied().fold(f64::INFINITY, f64::min);
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    // Sums of large finite values overflow; fall back to forms that stay
    // within range when they do.
    let mean = match values.iter().sum::<f64>() / n {
        m if m.is_finite() => m,
        _ => values.iter().map(|v| v / n).sum(),
    };
    // Sample standard deviation; a single value has none.
    let std_dev = if values.len() > 1 {
        match (values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1.0)).sqrt() {
            sd if sd.is_finite() => sd,
            _ => scaled_std_dev(values, mean, min.abs().max(max.abs())),
        }
    } else {
        0.0
    };
    ColumnStats::Numeric { min, max, mean, std_dev }
}

/// Sample standard deviation computed on `values / scale`, for spreads whose
/// squares leave the finite range.
fn scaled_std_dev(values: &[f64], mean: f64, scale: f64) -> f64 {
    let n = values.len() as f64;
    let m = mean / scale;
    let var = values.iter().map(|v| (v / scale - m).powi(2)).sum::<f64>() / (n - 1.0);
    var.sqrt() * scale
}

fn text_stats(values: &[&str]) -> ColumnStats {
    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    for v in values {
        *counts.entry(*v).or_default() += 1;
    }
    // BTreeMap iteration is sorted, so ties resolve to the smallest value.
    let top = counts
        .iter()
        .fold(None::<(&str, usize)>, |best, (v, c)| match best {
            Some((_, bc)) if bc >= *c => best,
            _ => Some((*v, *c)),
        });
    ColumnStats::Text {
        distinct: counts.len(),
        top: top.map(|(v, _)| v.to_string()),
        top_count: top.map(|(_, c)| c).unwrap_or(0),
    }
}

/// Compact human formatting: integers without decimals, otherwise up to four
/// decimal places with trailing zeros removed.
pub fn format_number(v: f64) -> String {
    if v.fract() == 0.0 && v.abs() < 1e15 {
        return format!("{}", v as i64);
    }
    let s = format!("{v:.4}");
    let s = s.trim_end_matches('0').trim_end_matches('.');
    s.to_string()
}
