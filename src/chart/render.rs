//! Chart layout on an abstract drawing surface.
//!
//! Coordinates are in points with the origin at the top-left corner and `y`
//! growing downwards. Backends that use another convention (PDF) flip on
//! their side.

use super::{Bin, CategoryStyle, ChartData, Series};
use crate::dataset::profile::format_number;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Color(pub u8, pub u8, pub u8);

impl Color {
    pub const BLACK: Color = Color(0, 0, 0);
    pub const AXIS: Color = Color(0x55, 0x55, 0x55);
    pub const GRID: Color = Color(0xdd, 0xdd, 0xdd);
    pub const SERIES: Color = Color(0x4c, 0x78, 0xa8);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Anchor {
    Start,
    Middle,
    End,
}

/// The closed set of drawing operations a chart may use.
pub trait Canvas {
    fn line(&mut self, from: (f64, f64), to: (f64, f64), color: Color, width: f64);
    fn polyline(&mut self, points: &[(f64, f64)], color: Color, width: f64);
    fn rect(&mut self, x: f64, y: f64, w: f64, h: f64, fill: Color);
    fn circle(&mut self, center: (f64, f64), r: f64, fill: Color);
    fn text(&mut self, at: (f64, f64), size: f64, anchor: Anchor, text: &str);
}

pub const CHART_WIDTH: f64 = 720.0;
pub const CHART_HEIGHT: f64 = 480.0;

const MARGIN_LEFT: f64 = 72.0;
const MARGIN_RIGHT: f64 = 24.0;
const MARGIN_TOP: f64 = 48.0;
const MARGIN_BOTTOM: f64 = 72.0;
const LABEL_CHARS: usize = 12;

/// Plot rectangle inside the chart box, in canvas coordinates.
#[derive(Debug, Clone, Copy)]
struct Frame {
    left: f64,
    top: f64,
    width: f64,
    height: f64,
}

impl Frame {
    fn bottom(&self) -> f64 {
        self.top + self.height
    }

    fn right(&self) -> f64 {
        self.left + self.width
    }
}

/// Linear mapping from a data range to a pixel range.
#[derive(Debug, Clone, Copy)]
struct Scale {
    lo: f64,
    hi: f64,
    from: f64,
    to: f64,
}

impl Scale {
    fn map(&self, v: f64) -> f64 {
        self.from + (v - self.lo) / (self.hi - self.lo) * (self.to - self.from)
    }
}

/// Draw `data` into the box at `origin` sized `width` x `height`.
pub fn draw(canvas: &mut dyn Canvas, data: &ChartData, origin: (f64, f64), width: f64, height: f64) {
    let frame = Frame {
        left: origin.0 + MARGIN_LEFT,
        top: origin.1 + MARGIN_TOP,
        width: width - MARGIN_LEFT - MARGIN_RIGHT,
        height: height - MARGIN_TOP - MARGIN_BOTTOM,
    };

    canvas.text((origin.0 + width / 2.0, origin.1 + 28.0), 16.0, Anchor::Middle, &data.title);
    canvas.text((frame.left + frame.width / 2.0, frame.bottom() + 52.0), 11.0, Anchor::Middle, &data.x_label);
    canvas.text((origin.0 + 8.0, frame.top - 12.0), 11.0, Anchor::Start, &data.y_label);

    match &data.series {
        Series::Categories { items, style } => draw_categories(canvas, frame, items, *style),
        Series::Points { points, connect } => draw_points(canvas, frame, points, *connect),
        Series::Histogram { bins } => draw_histogram(canvas, frame, bins),
    }

    canvas.line((frame.left, frame.bottom()), (frame.right(), frame.bottom()), Color::AXIS, 1.0);
    canvas.line((frame.left, frame.top), (frame.left, frame.bottom()), Color::AXIS, 1.0);
}

/// Draw y gridlines and tick labels; returns the y scale.
fn y_axis(canvas: &mut dyn Canvas, frame: Frame, lo: f64, hi: f64) -> Scale {
    let ticks = nice_ticks(lo, hi, 5);
    let lo = ticks.first().copied().unwrap_or(lo).min(lo);
    let hi = ticks.last().copied().unwrap_or(hi).max(hi);
    let scale = Scale { lo, hi, from: frame.bottom(), to: frame.top };
    for t in ticks {
        let y = scale.map(t);
        canvas.line((frame.left, y), (frame.right(), y), Color::GRID, 0.5);
        canvas.text((frame.left - 6.0, y + 3.5), 9.0, Anchor::End, &format_number(t));
    }
    scale
}

/// Numeric x tick labels; returns the x scale.
fn x_axis(canvas: &mut dyn Canvas, frame: Frame, lo: f64, hi: f64) -> Scale {
    let ticks = nice_ticks(lo, hi, 6);
    let lo = ticks.first().copied().unwrap_or(lo).min(lo);
    let hi = ticks.last().copied().unwrap_or(hi).max(hi);
    let scale = Scale { lo, hi, from: frame.left, to: frame.right() };
    for t in ticks {
        let x = scale.map(t);
        canvas.line((x, frame.bottom()), (x, frame.bottom() + 4.0), Color::AXIS, 1.0);
        canvas.text((x, frame.bottom() + 16.0), 9.0, Anchor::Middle, &format_number(t));
    }
    scale
}

fn draw_categories(canvas: &mut dyn Canvas, frame: Frame, items: &[(String, f64)], style: CategoryStyle) {
    let (lo, hi) = value_range(items.iter().map(|(_, v)| *v), style == CategoryStyle::Bars);
    let y = y_axis(canvas, frame, lo, hi);

    let slot = frame.width / items.len().max(1) as f64;
    // Skip labels so roughly one fits per 48pt.
    let stride = ((48.0 / slot).ceil() as usize).max(1);
    let zero = y.map(0.0_f64.clamp(y.lo, y.hi));

    let mut path = Vec::with_capacity(items.len());
    for (i, (label, value)) in items.iter().enumerate() {
        let cx = frame.left + slot * (i as f64 + 0.5);
        let vy = y.map(*value);
        match style {
            CategoryStyle::Bars => {
                let w = slot * 0.7;
                canvas.rect(cx - w / 2.0, vy.min(zero), w, (zero - vy).abs(), Color::SERIES);
            }
            CategoryStyle::Line => path.push((cx, vy)),
        }
        if i % stride == 0 {
            canvas.text((cx, frame.bottom() + 16.0), 9.0, Anchor::Middle, &truncate_label(label));
        }
    }

    if style == CategoryStyle::Line {
        canvas.polyline(&path, Color::SERIES, 2.0);
        for p in path {
            canvas.circle(p, 2.5, Color::SERIES);
        }
    }
}

fn draw_points(canvas: &mut dyn Canvas, frame: Frame, points: &[(f64, f64)], connect: bool) {
    let (xlo, xhi) = value_range(points.iter().map(|p| p.0), false);
    let (ylo, yhi) = value_range(points.iter().map(|p| p.1), false);
    let y = y_axis(canvas, frame, ylo, yhi);
    let x = x_axis(canvas, frame, xlo, xhi);

    let mapped: Vec<(f64, f64)> = points.iter().map(|(px, py)| (x.map(*px), y.map(*py))).collect();
    if connect {
        canvas.polyline(&mapped, Color::SERIES, 2.0);
    } else {
        for p in mapped {
            canvas.circle(p, 3.0, Color::SERIES);
        }
    }
}

fn draw_histogram(canvas: &mut dyn Canvas, frame: Frame, bins: &[Bin]) {
    let (Some(first), Some(last)) = (bins.first(), bins.last()) else {
        return;
    };
    let max_count = bins.iter().map(|b| b.count).max().unwrap_or(0) as f64;
    let y = y_axis(canvas, frame, 0.0, max_count.max(1.0));
    let x = x_axis(canvas, frame, first.lo, last.hi);
    let zero = y.map(0.0);
    for b in bins {
        let x0 = x.map(b.lo);
        let x1 = x.map(b.hi);
        let top = y.map(b.count as f64);
        canvas.rect(x0 + 0.5, top, (x1 - x0 - 1.0).max(0.5), zero - top, Color::SERIES);
    }
}

/// Data range widened so it is never empty; bars always include zero.
fn value_range(values: impl Iterator<Item = f64>, include_zero: bool) -> (f64, f64) {
    let (mut lo, mut hi) = values.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| (lo.min(v), hi.max(v)));
    if !lo.is_finite() || !hi.is_finite() {
        return (0.0, 1.0);
    }
    if include_zero {
        lo = lo.min(0.0);
        hi = hi.max(0.0);
    }
    if lo == hi {
        lo -= 1.0;
        hi += 1.0;
    }
    (lo, hi)
}

/// "Nice" round tick values covering `[lo, hi]` with about `target` steps.
pub fn nice_ticks(lo: f64, hi: f64, target: usize) -> Vec<f64> {
    if !(hi > lo) || target == 0 {
        return vec![lo];
    }
    let raw = (hi - lo) / target as f64;
    let magnitude = 10f64.powi(raw.log10().floor() as i32);
    let step = [1.0, 2.0, 2.5, 5.0, 10.0]
        .iter()
        .map(|m| m * magnitude)
        .find(|s| *s >= raw)
        .unwrap_or(10.0 * magnitude);

    let start = (lo / step).floor() * step;
    let end = (hi / step).ceil() * step;
    let count = ((end - start) / step).round() as usize;
    (0..=count)
        .map(|i| {
            let v = start + step * i as f64;
            // Snap float noise such as 0.30000000000000004.
            (v / step).round() * step
        })
        .collect()
}

fn truncate_label(label: &str) -> String {
    if label.chars().count() <= LABEL_CHARS {
        return label.to_string();
    }
    let mut s: String = label.chars().take(LABEL_CHARS - 1).collect();
    s.push('…');
    s
}
