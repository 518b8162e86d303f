//! SVG backend for [`Canvas`].

use std::fmt::Write as _;

use super::ChartData;
use super::render::{self, Anchor, CHART_HEIGHT, CHART_WIDTH, Canvas, Color};

pub struct SvgCanvas {
    width: f64,
    height: f64,
    body: String,
}

impl SvgCanvas {
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height, body: String::new() }
    }

    pub fn finish(self) -> String {
        format!(
            "<svg xmlns=\"http://www.w3.org/2000/svg\" width=\"{w}\" height=\"{h}\" viewBox=\"0 0 {w} {h}\" \
             font-family=\"Helvetica, Arial, sans-serif\">\n\
             <rect width=\"100%\" height=\"100%\" fill=\"white\"/>\n{body}</svg>\n",
            w = self.width,
            h = self.height,
            body = self.body,
        )
    }
}

fn rgb(c: Color) -> String {
    format!("#{:02x}{:02x}{:02x}", c.0, c.1, c.2)
}

/// Two decimals are plenty at chart scale and keep the output small.
fn n(v: f64) -> String {
    let s = format!("{v:.2}");
    let s = s.trim_end_matches('0').trim_end_matches('.');
    if s == "-0" { "0".to_string() } else { s.to_string() }
}

pub fn escape_xml(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            c if c.is_control() => {}
            c => out.push(c),
        }
    }
    out
}

impl Canvas for SvgCanvas {
    fn line(&mut self, from: (f64, f64), to: (f64, f64), color: Color, width: f64) {
        let _ = writeln!(
            self.body,
            "<line x1=\"{}\" y1=\"{}\" x2=\"{}\" y2=\"{}\" stroke=\"{}\" stroke-width=\"{}\"/>",
            n(from.0),
            n(from.1),
            n(to.0),
            n(to.1),
            rgb(color),
            n(width)
        );
    }

    fn polyline(&mut self, points: &[(f64, f64)], color: Color, width: f64) {
        if points.is_empty() {
            return;
        }
        let pts: Vec<String> = points.iter().map(|(x, y)| format!("{},{}", n(*x), n(*y))).collect();
        let _ = writeln!(
            self.body,
            "<polyline points=\"{}\" fill=\"none\" stroke=\"{}\" stroke-width=\"{}\"/>",
            pts.join(" "),
            rgb(color),
            n(width)
        );
    }

    fn rect(&mut self, x: f64, y: f64, w: f64, h: f64, fill: Color) {
        let _ = writeln!(
            self.body,
            "<rect x=\"{}\" y=\"{}\" width=\"{}\" height=\"{}\" fill=\"{}\"/>",
            n(x),
            n(y),
            n(w),
            n(h),
            rgb(fill)
        );
    }

    fn circle(&mut self, center: (f64, f64), r: f64, fill: Color) {
        let _ = writeln!(
            self.body,
            "<circle cx=\"{}\" cy=\"{}\" r=\"{}\" fill=\"{}\"/>",
            n(center.0),
            n(center.1),
            n(r),
            rgb(fill)
        );
    }

    fn text(&mut self, at: (f64, f64), size: f64, anchor: Anchor, text: &str) {
        let anchor = match anchor {
            Anchor::Start => "start",
            Anchor::Middle => "middle",
            Anchor::End => "end",
        };
        let _ = writeln!(
            self.body,
            "<text x=\"{}\" y=\"{}\" font-size=\"{}\" text-anchor=\"{anchor}\" fill=\"{}\">{}</text>",
            n(at.0),
            n(at.1),
            n(size),
            rgb(Color::BLACK),
            escape_xml(text)
        );
    }
}

/// Render a chart as a standalone SVG document.
pub fn render_svg(data: &ChartData) -> String {
    let mut canvas = SvgCanvas::new(CHART_WIDTH, CHART_HEIGHT);
    render::draw(&mut canvas, data, (0.0, 0.0), CHART_WIDTH, CHART_HEIGHT);
    canvas.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chart::{CategoryStyle, Series};

    #[test]
    fn escapes_markup() {
        assert_eq!(escape_xml("a<b & \"c\""), "a&lt;b &amp; &quot;c&quot;");
        assert_eq!(escape_xml("tab\there"), "tabhere");
    }

    #[test]
    fn numbers_are_compact() {
        assert_eq!(n(1.0), "1");
        assert_eq!(n(1.256), "1.26");
        assert_eq!(n(-0.001), "0");
    }

    #[test]
    fn renders_complete_document() {
        let data = ChartData {
            title: "Sales <2024>".into(),
            x_label: "region".into(),
            y_label: "sum of units".into(),
            series: Series::Categories {
                items: vec![("north".into(), 24.0), ("south".into(), 4.0)],
                style: CategoryStyle::Bars,
            },
        };
        let svg = render_svg(&data);
        assert!(svg.starts_with("<svg xmlns=\"http://www.w3.org/2000/svg\""));
        assert!(svg.trim_end().ends_with("</svg>"));
        assert!(svg.contains("Sales &lt;2024&gt;"));
        assert!(svg.contains("fill=\"#4c78a8\""));
        // Background plus two bars.
        assert_eq!(svg.matches("<rect").count(), 3);
    }
}
