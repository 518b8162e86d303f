//! Declarative charts.
//!
//! The model never produces code. It produces a [`ChartSpec`] (chart kind plus
//! column bindings) which is validated against the dataset, resolved into
//! plain numbers ([`ChartData`]) and drawn through the closed set of
//! operations on [`render::Canvas`]. SVG ([`svg`]) and PDF pages share the
//! same drawing code.

pub mod render;
pub mod svg;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::dataset::{Dataset, DatasetError, is_missing};

/// Most categories a bar or categorical line chart will draw.
pub const MAX_CATEGORIES: usize = 50;
pub const DEFAULT_BINS: usize = 10;
pub const MAX_BINS: usize = 100;
/// Largest magnitude a plotted value may have; beyond it axis spans and tick
/// rounding leave the finite range.
pub const MAX_PLOT_MAGNITUDE: f64 = 1e300;

#[derive(Debug, Error)]
pub enum ChartError {
    #[error("model reply contains no JSON object")]
    NoJson,
    #[error("invalid chart spec JSON: {0}")]
    Parse(#[from] serde_json::Error),
    #[error(transparent)]
    Dataset(#[from] DatasetError),
    #[error("invalid chart spec: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChartKind {
    Bar,
    Line,
    Scatter,
    Histogram,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Aggregate {
    Sum,
    Mean,
    Count,
}

/// Chart description as produced by the visualization prompt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartSpec {
    #[serde(alias = "type", alias = "chart_type")]
    pub kind: ChartKind,
    #[serde(default)]
    pub title: String,
    pub x: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub y: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aggregate: Option<Aggregate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bins: Option<usize>,
}

/// Resolved, render-ready chart.
#[derive(Debug, Clone, PartialEq)]
pub struct ChartData {
    pub title: String,
    pub x_label: String,
    pub y_label: String,
    pub series: Series,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CategoryStyle {
    Bars,
    Line,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Bin {
    pub lo: f64,
    pub hi: f64,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Series {
    /// Labelled values in display order.
    Categories { items: Vec<(String, f64)>, style: CategoryStyle },
    /// Numeric x/y pairs; `connect` draws a line through them in x order.
    Points { points: Vec<(f64, f64)>, connect: bool },
    Histogram { bins: Vec<Bin> },
}

impl ChartSpec {
    /// Pull the first JSON object out of a model reply (fenced or not) and
    /// deserialize it.
    pub fn from_model_reply(reply: &str) -> Result<Self, ChartError> {
        let json = extract_json_object(reply).ok_or(ChartError::NoJson)?;
        Ok(serde_json::from_str(json)?)
    }

    /// Validate against `ds` and compute the values to draw.
    pub fn resolve(&self, ds: &Dataset) -> Result<ChartData, ChartError> {
        let x_name = ds.headers()[ds.column_index(&self.x)?].clone();
        let title = if self.title.trim().is_empty() { self.default_title() } else { self.title.trim().to_string() };

        let data = match self.kind {
            ChartKind::Histogram => {
                let bins = self.bins.unwrap_or(DEFAULT_BINS);
                if bins == 0 || bins > MAX_BINS {
                    return Err(ChartError::Invalid(format!("bins must be between 1 and {MAX_BINS}, got {bins}")));
                }
                let values: Vec<f64> = ds.numeric_column(&self.x)?.into_iter().flatten().collect();
                check_magnitude(values.iter().copied())?;
                ChartData {
                    title,
                    x_label: x_name,
                    y_label: "count".to_string(),
                    series: Series::Histogram { bins: histogram(&values, bins) },
                }
            }
            ChartKind::Scatter => {
                let y = self.require_y()?;
                ChartData {
                    title,
                    x_label: x_name,
                    y_label: ds.headers()[ds.column_index(y)?].clone(),
                    series: Series::Points { points: paired_points(ds, &self.x, y)?, connect: false },
                }
            }
            ChartKind::Line => {
                let y = self.require_y()?;
                let y_label = ds.headers()[ds.column_index(y)?].clone();
                // Numeric x gives a true line plot; text x (dates, labels) is
                // plotted as ordered categories.
                match ds.numeric_column(&self.x) {
                    Ok(_) => {
                        let mut points = paired_points(ds, &self.x, y)?;
                        points.sort_by(|a, b| a.0.total_cmp(&b.0));
                        ChartData { title, x_label: x_name, y_label, series: Series::Points { points, connect: true } }
                    }
                    Err(DatasetError::NotNumeric(_)) => {
                        let agg = self.aggregate.unwrap_or(Aggregate::Sum);
                        let items = aggregate_categories(ds, &self.x, Some(y), agg)?;
                        ChartData {
                            title,
                            x_label: x_name,
                            y_label: axis_label(agg, Some(&y_label)),
                            series: Series::Categories { items, style: CategoryStyle::Line },
                        }
                    }
                    Err(e) => return Err(e.into()),
                }
            }
            ChartKind::Bar => {
                let agg = match (self.aggregate, &self.y) {
                    (Some(a), _) => a,
                    (None, Some(_)) => Aggregate::Sum,
                    (None, None) => Aggregate::Count,
                };
                let y = match agg {
                    Aggregate::Count => None,
                    _ => Some(self.require_y()?),
                };
                let y_label = match y {
                    Some(name) => Some(ds.headers()[ds.column_index(name)?].clone()),
                    None => None,
                };
                let items = aggregate_categories(ds, &self.x, y, agg)?;
                ChartData {
                    title,
                    x_label: x_name,
                    y_label: axis_label(agg, y_label.as_deref()),
                    series: Series::Categories { items, style: CategoryStyle::Bars },
                }
            }
        };

        if data.is_empty() {
            return Err(ChartError::Invalid("no rows with values for the selected columns".into()));
        }
        check_magnitude(data.values())?;
        Ok(data)
    }

    fn require_y(&self) -> Result<&str, ChartError> {
        self.y
            .as_deref()
            .filter(|y| !y.trim().is_empty())
            .ok_or_else(|| ChartError::Invalid(format!("{:?} chart requires a y column", self.kind).to_lowercase()))
    }

    fn default_title(&self) -> String {
        match &self.y {
            Some(y) => format!("{y} by {}", self.x),
            None => format!("Distribution of {}", self.x),
        }
    }
}

impl ChartData {
    pub fn is_empty(&self) -> bool {
        match &self.series {
            Series::Categories { items, .. } => items.is_empty(),
            Series::Points { points, .. } => points.is_empty(),
            Series::Histogram { bins } => bins.iter().all(|b| b.count == 0),
        }
    }

    /// Every coordinate the renderer will scale.
    fn values(&self) -> Box<dyn Iterator<Item = f64> + '_> {
        match &self.series {
            Series::Categories { items, .. } => Box::new(items.iter().map(|(_, v)| *v)),
            Series::Points { points, .. } => Box::new(points.iter().flat_map(|&(x, y)| [x, y])),
            Series::Histogram { bins } => Box::new(bins.iter().flat_map(|b| [b.lo, b.hi])),
        }
    }
}

fn check_magnitude(mut values: impl Iterator<Item = f64>) -> Result<(), ChartError> {
    match values.find(|v| v.is_nan() || v.abs() > MAX_PLOT_MAGNITUDE) {
        Some(v) => Err(ChartError::Invalid(format!(
            "value {v:e} is outside the drawable range of +/-{MAX_PLOT_MAGNITUDE:e}"
        ))),
        None => Ok(()),
    }
}

fn axis_label(agg: Aggregate, y: Option<&str>) -> String {
    match (agg, y) {
        (Aggregate::Count, _) | (_, None) => "count".to_string(),
        (Aggregate::Sum, Some(y)) => format!("sum of {y}"),
        (Aggregate::Mean, Some(y)) => format!("mean of {y}"),
    }
}

fn paired_points(ds: &Dataset, x: &str, y: &str) -> Result<Vec<(f64, f64)>, ChartError> {
    let xs = ds.numeric_column(x)?;
    let ys = ds.numeric_column(y)?;
    Ok(xs
        .into_iter()
        .zip(ys)
        .filter_map(|(x, y)| Some((x?, y?)))
        .collect())
}

/// Group rows by the text of column `x`, in first-appearance order.
fn aggregate_categories(
    ds: &Dataset,
    x: &str,
    y: Option<&str>,
    agg: Aggregate,
) -> Result<Vec<(String, f64)>, ChartError> {
    let x_idx = ds.column_index(x)?;
    let ys = match y {
        Some(name) => Some(ds.numeric_column(name)?),
        None => None,
    };

    // (label, sum, count) in first-appearance order.
    let mut groups: Vec<(String, f64, usize)> = Vec::new();
    for (row, label) in ds.column(x_idx).enumerate() {
        if is_missing(label) {
            continue;
        }
        let value = match &ys {
            Some(values) => match values[row] {
                Some(v) => v,
                None => continue,
            },
            None => 0.0,
        };
        match groups.iter_mut().find(|g| g.0 == label) {
            Some(g) => {
                g.1 += value;
                g.2 += 1;
            }
            None => groups.push((label.to_string(), value, 1)),
        }
    }

    if groups.len() > MAX_CATEGORIES {
        debug!(categories = groups.len(), kept = MAX_CATEGORIES, "truncating categories");
        groups.truncate(MAX_CATEGORIES);
    }

    Ok(groups
        .into_iter()
        .map(|(label, sum, count)| {
            let v = match agg {
                Aggregate::Sum => sum,
                Aggregate::Mean => sum / count as f64,
                Aggregate::Count => count as f64,
            };
            (label, v)
        })
        .collect())
}

/// Equal-width bins over `[min, max]`; the last bin is closed on the right.
fn histogram(values: &[f64], bins: usize) -> Vec<Bin> {
    if values.is_empty() {
        return Vec::new();
    }
    let min = values.iter().copied().fold(f64::INFINITY, f64::min);
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let (lo, hi) = if min == max { (min - 0.5, max + 0.5) } else { (min, max) };
    let n = bins as f64;
    // Opposite-signed extremes overflow `hi - lo`; divide first in that case.
    let width = match (hi - lo) / n {
        w if w.is_finite() => w,
        _ => hi / n - lo / n,
    };

    let mut out: Vec<Bin> = (0..bins)
        .map(|i| Bin { lo: lo + width * i as f64, hi: lo + width * (i + 1) as f64, count: 0 })
        .collect();
    for v in values {
        let pos = match v - lo {
            d if d.is_finite() => d / width,
            _ => v / width - lo / width,
        };
        let idx = (pos as usize).min(bins - 1);
        out[idx].count += 1;
    }
    out
}

/// Return the first balanced `{ ... }` in `text`, skipping braces inside
/// JSON strings.
pub fn extract_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;
    for (offset, ch) in text[start..].char_indices() {
        if in_string {
            match ch {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..start + offset + 1]);
                }
            }
            _ => {}
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    const SALES: &str = "month,region,units,price\n\
        2024-01,north,10,2.5\n\
        2024-01,south,4,3\n\
        2024-02,north,6,2\n\
        2024-02,south,,4\n\
        2024-03,north,8,2.25\n";

    fn sales() -> Dataset {
        Dataset::from_csv_bytes("sales", SALES.as_bytes(), 100).unwrap()
    }

    fn spec(json: &str) -> ChartSpec {
        ChartSpec::from_model_reply(json).unwrap()
    }

    #[test]
    fn extracts_json_from_fenced_reply() {
        let reply = "Here you go:\n```json\n{\"kind\": \"bar\", \"x\": \"region\", \"title\": \"a {b}\"}\n```\nEnjoy";
        let s = spec(reply);
        assert_eq!(s.kind, ChartKind::Bar);
        assert_eq!(s.title, "a {b}");
        assert!(s.y.is_none());
    }

    #[test]
    fn accepts_type_alias() {
        let s = spec(r#"{"type": "histogram", "x": "units", "bins": 4}"#);
        assert_eq!(s.kind, ChartKind::Histogram);
        assert_eq!(s.bins, Some(4));
    }

    #[test]
    fn reply_without_json_errors() {
        assert!(matches!(ChartSpec::from_model_reply("no chart today"), Err(ChartError::NoJson)));
        assert!(matches!(ChartSpec::from_model_reply("{ unbalanced"), Err(ChartError::NoJson)));
    }

    #[test]
    fn unknown_kind_is_parse_error() {
        let err = ChartSpec::from_model_reply(r#"{"kind": "pie", "x": "region"}"#).unwrap_err();
        assert!(matches!(err, ChartError::Parse(_)));
    }

    #[test]
    fn bar_sum_groups_in_first_appearance_order() {
        let data = spec(r#"{"kind":"bar","x":"region","y":"units"}"#).resolve(&sales()).unwrap();
        assert_eq!(data.y_label, "sum of units");
        assert_eq!(
            data.series,
            Series::Categories {
                items: vec![("north".into(), 24.0), ("south".into(), 4.0)],
                style: CategoryStyle::Bars,
            }
        );
        assert_eq!(data.title, "units by region");
    }

    #[test]
    fn bar_without_y_counts_rows() {
        let data = spec(r#"{"kind":"bar","x":"region"}"#).resolve(&sales()).unwrap();
        match data.series {
            Series::Categories { items, .. } => {
                assert_eq!(items, vec![("north".into(), 3.0), ("south".into(), 2.0)]);
            }
            other => panic!("unexpected series {other:?}"),
        }
    }

    #[test]
    fn bar_mean_requires_numeric_y() {
        let err = spec(r#"{"kind":"bar","x":"month","y":"region","aggregate":"mean"}"#)
            .resolve(&sales())
            .unwrap_err();
        assert!(matches!(err, ChartError::Dataset(DatasetError::NotNumeric(_))));
    }

    #[test]
    fn line_over_text_x_becomes_categories() {
        let data = spec(r#"{"kind":"line","x":"month","y":"units"}"#).resolve(&sales()).unwrap();
        match data.series {
            Series::Categories { items, style } => {
                assert_eq!(style, CategoryStyle::Line);
                assert_eq!(items.len(), 3);
                assert_eq!(items[1], ("2024-02".to_string(), 6.0));
            }
            other => panic!("unexpected series {other:?}"),
        }
    }

    #[test]
    fn line_over_numeric_x_sorts_points() {
        let data = spec(r#"{"kind":"line","x":"price","y":"units"}"#).resolve(&sales()).unwrap();
        match data.series {
            Series::Points { points, connect } => {
                assert!(connect);
                let xs: Vec<f64> = points.iter().map(|p| p.0).collect();
                assert_eq!(xs, vec![2.0, 2.25, 2.5, 3.0]);
            }
            other => panic!("unexpected series {other:?}"),
        }
    }

    #[test]
    fn scatter_requires_y() {
        let err = spec(r#"{"kind":"scatter","x":"price"}"#).resolve(&sales()).unwrap_err();
        assert!(err.to_string().contains("requires a y column"));
    }

    #[test]
    fn unknown_column_rejected() {
        let err = spec(r#"{"kind":"histogram","x":"revenue"}"#).resolve(&sales()).unwrap_err();
        assert!(matches!(err, ChartError::Dataset(DatasetError::UnknownColumn(_))));
    }

    #[test]
    fn histogram_bins_cover_all_values() {
        let data = spec(r#"{"kind":"histogram","x":"units","bins":3}"#).resolve(&sales()).unwrap();
        match data.series {
            Series::Histogram { bins } => {
                assert_eq!(bins.len(), 3);
                assert_eq!(bins.iter().map(|b| b.count).sum::<usize>(), 4);
                assert_eq!(bins[0].lo, 4.0);
                assert_eq!(bins[2].hi, 10.0);
                // 10 lands in the closed last bin.
                assert_eq!(bins[2].count, 2);
            }
            other => panic!("unexpected series {other:?}"),
        }
    }

    #[test]
    fn histogram_bin_limits_enforced() {
        for bins in [0, MAX_BINS + 1] {
            let s = ChartSpec { kind: ChartKind::Histogram, title: String::new(), x: "units".into(), y: None, aggregate: None, bins: Some(bins) };
            assert!(matches!(s.resolve(&sales()), Err(ChartError::Invalid(_))));
        }
    }

    #[test]
    fn histogram_of_constant_column() {
        let bins = histogram(&[5.0, 5.0], 2);
        assert_eq!(bins[0].lo, 4.5);
        assert_eq!(bins.iter().map(|b| b.count).sum::<usize>(), 2);
    }

    #[test]
    fn histogram_of_extreme_values_stays_finite() {
        let bins = histogram(&[1e308, -1e308, 0.0], 4);
        assert!(bins.iter().all(|b| b.lo.is_finite() && b.hi.is_finite()));
        assert_eq!(bins.iter().map(|b| b.count).sum::<usize>(), 3);
        assert_eq!(bins[0].count, 1);
        assert_eq!(bins[3].count, 1);
    }

    #[test]
    fn values_beyond_drawable_range_rejected() {
        let ds = Dataset::from_csv_bytes("wide", b"a,b\n1e308,1\n-1e308,2\n", 100).unwrap();
        for json in [
            r#"{"kind":"histogram","x":"a"}"#,
            r#"{"kind":"scatter","x":"a","y":"b"}"#,
            r#"{"kind":"line","x":"b","y":"a"}"#,
        ] {
            let err = spec(json).resolve(&ds).unwrap_err();
            assert!(matches!(err, ChartError::Invalid(ref m) if m.contains("drawable range")), "{json}: {err}");
        }

        // Each value is fine; their sum is not.
        let ds = Dataset::from_csv_bytes("sum", b"g,v\nx,1e300\nx,1e300\n", 100).unwrap();
        assert!(matches!(spec(r#"{"kind":"bar","x":"g","y":"v"}"#).resolve(&ds), Err(ChartError::Invalid(_))));
    }

    #[test]
    fn spec_round_trips_without_empty_fields() {
        let s = spec(r#"{"kind":"scatter","x":"price","y":"units"}"#);
        let json = serde_json::to_value(&s).unwrap();
        assert!(json.get("bins").is_none());
        assert_eq!(json["kind"], "scatter");
    }
}
