//! Minimal PDF 1.4 writer.
//!
//! Produces text pages set in the standard Helvetica font (no embedding) and
//! vector chart pages drawn through [`Canvas`]. Layout is top-down in points;
//! [`PdfCanvas`] flips to PDF's bottom-left origin.

use std::fmt::Write as _;

use crate::chart::ChartData;
use crate::chart::render::{self, Anchor, Canvas, Color};

pub const PAGE_WIDTH: f64 = 612.0;
pub const PAGE_HEIGHT: f64 = 792.0;
pub const MARGIN: f64 = 56.0;

pub const BODY_SIZE: f64 = 11.0;
const LEADING: f64 = 1.4;
/// Average Helvetica glyph width as a fraction of the font size.
const AVG_GLYPH: f64 = 0.5;
/// Bezier control offset for quarter circles.
const KAPPA: f64 = 0.552_284_75;

/// Content stream for one page.
#[derive(Debug, Default)]
pub struct PdfCanvas {
    ops: String,
}

impl PdfCanvas {
    fn flip(y: f64) -> f64 {
        PAGE_HEIGHT - y
    }

    fn stroke_color(&mut self, c: Color) {
        let _ = write!(self.ops, "{} {} {} RG ", unit(c.0), unit(c.1), unit(c.2));
    }

    fn fill_color(&mut self, c: Color) {
        let _ = write!(self.ops, "{} {} {} rg ", unit(c.0), unit(c.1), unit(c.2));
    }
}

fn unit(c: u8) -> String {
    num(f64::from(c) / 255.0)
}

fn num(v: f64) -> String {
    let s = format!("{v:.3}");
    let s = s.trim_end_matches('0').trim_end_matches('.');
    if s == "-0" { "0".to_string() } else { s.to_string() }
}

/// Approximate rendered width of `text` at `size`.
pub fn text_width(text: &str, size: f64) -> f64 {
    text.chars().count() as f64 * size * AVG_GLYPH
}

impl Canvas for PdfCanvas {
    fn line(&mut self, from: (f64, f64), to: (f64, f64), color: Color, width: f64) {
        self.stroke_color(color);
        let _ = writeln!(
            self.ops,
            "{} w {} {} m {} {} l S",
            num(width),
            num(from.0),
            num(Self::flip(from.1)),
            num(to.0),
            num(Self::flip(to.1))
        );
    }

    fn polyline(&mut self, points: &[(f64, f64)], color: Color, width: f64) {
        let Some((first, rest)) = points.split_first() else {
            return;
        };
        self.stroke_color(color);
        let _ = write!(self.ops, "{} w {} {} m", num(width), num(first.0), num(Self::flip(first.1)));
        for (x, y) in rest {
            let _ = write!(self.ops, " {} {} l", num(*x), num(Self::flip(*y)));
        }
        self.ops.push_str(" S\n");
    }

    fn rect(&mut self, x: f64, y: f64, w: f64, h: f64, fill: Color) {
        self.fill_color(fill);
        let _ = writeln!(self.ops, "{} {} {} {} re f", num(x), num(Self::flip(y + h)), num(w), num(h));
    }

    fn circle(&mut self, center: (f64, f64), r: f64, fill: Color) {
        let (cx, cy) = (center.0, Self::flip(center.1));
        let k = r * KAPPA;
        self.fill_color(fill);
        let _ = writeln!(
            self.ops,
            "{} {} m {} {} {} {} {} {} c {} {} {} {} {} {} c {} {} {} {} {} {} c {} {} {} {} {} {} c f",
            num(cx + r), num(cy),
            num(cx + r), num(cy + k), num(cx + k), num(cy + r), num(cx), num(cy + r),
            num(cx - k), num(cy + r), num(cx - r), num(cy + k), num(cx - r), num(cy),
            num(cx - r), num(cy - k), num(cx - k), num(cy - r), num(cx), num(cy - r),
            num(cx + k), num(cy - r), num(cx + r), num(cy - k), num(cx + r), num(cy),
        );
    }

    fn text(&mut self, at: (f64, f64), size: f64, anchor: Anchor, text: &str) {
        let x = match anchor {
            Anchor::Start => at.0,
            Anchor::Middle => at.0 - text_width(text, size) / 2.0,
            Anchor::End => at.0 - text_width(text, size),
        };
        self.fill_color(Color::BLACK);
        let _ = writeln!(
            self.ops,
            "BT /F1 {} Tf {} {} Td ({}) Tj ET",
            num(size),
            num(x),
            num(Self::flip(at.1)),
            escape_text(text)
        );
    }
}

/// Escape a string for a PDF literal in WinAnsiEncoding. Non-ASCII
/// characters the encoding covers are written as octal escapes; anything
/// else becomes `?`.
pub fn escape_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '(' | ')' | '\\' => {
                out.push('\\');
                out.push(ch);
            }
            '\t' => out.push(' '),
            c if c.is_ascii_graphic() || c == ' ' => out.push(c),
            c if c.is_control() => {}
            c => match win_ansi(c) {
                Some(code) => out.push_str(&format!("\\{code:03o}")),
                None => out.push('?'),
            },
        }
    }
    out
}

/// WinAnsiEncoding code for a non-ASCII character. 0xA0..=0xFF matches
/// Latin-1; 0x80..=0x9F holds the typographic extras.
fn win_ansi(ch: char) -> Option<u8> {
    let code = match ch {
        '\u{a0}'..='\u{ff}' => return u8::try_from(u32::from(ch)).ok(),
        '\u{20ac}' => 0x80,
        '\u{201a}' => 0x82,
        '\u{0192}' => 0x83,
        '\u{201e}' => 0x84,
        '\u{2026}' => 0x85,
        '\u{2020}' => 0x86,
        '\u{2021}' => 0x87,
        '\u{02c6}' => 0x88,
        '\u{2030}' => 0x89,
        '\u{0160}' => 0x8a,
        '\u{2039}' => 0x8b,
        '\u{0152}' => 0x8c,
        '\u{017d}' => 0x8e,
        '\u{2018}' => 0x91,
        '\u{2019}' => 0x92,
        '\u{201c}' => 0x93,
        '\u{201d}' => 0x94,
        '\u{2022}' => 0x95,
        '\u{2013}' => 0x96,
        '\u{2014}' => 0x97,
        '\u{02dc}' => 0x98,
        '\u{2122}' => 0x99,
        '\u{0161}' => 0x9a,
        '\u{203a}' => 0x9b,
        '\u{0153}' => 0x9c,
        '\u{017e}' => 0x9e,
        '\u{0178}' => 0x9f,
        _ => return None,
    };
    Some(code)
}

/// Greedy word wrap to `max_chars` per line. Words longer than a line are
/// split.
pub fn wrap(text: &str, max_chars: usize) -> Vec<String> {
    let max_chars = max_chars.max(1);
    let mut lines = Vec::new();
    let mut current = String::new();
    let mut current_len = 0usize;

    for word in text.split_whitespace() {
        let mut word: Vec<char> = word.chars().collect();
        while word.len() > max_chars {
            if current_len > 0 {
                lines.push(std::mem::take(&mut current));
                current_len = 0;
            }
            let rest = word.split_off(max_chars);
            lines.push(word.into_iter().collect());
            word = rest;
        }
        let len = word.len();
        if len == 0 {
            continue;
        }
        if current_len > 0 && current_len + 1 + len > max_chars {
            lines.push(std::mem::take(&mut current));
            current_len = 0;
        }
        if current_len > 0 {
            current.push(' ');
            current_len += 1;
        }
        current.extend(word);
        current_len += len;
    }
    if current_len > 0 {
        lines.push(current);
    }
    lines
}

/// Flowing document writer: text runs top to bottom and breaks onto new
/// pages; charts take a page each.
#[derive(Debug)]
pub struct PdfWriter {
    pages: Vec<PdfCanvas>,
    current: PdfCanvas,
    cursor: f64,
    dirty: bool,
}

impl Default for PdfWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl PdfWriter {
    pub fn new() -> Self {
        Self { pages: Vec::new(), current: PdfCanvas::default(), cursor: MARGIN, dirty: false }
    }

    fn new_page(&mut self) {
        let done = std::mem::take(&mut self.current);
        self.pages.push(done);
        self.cursor = MARGIN;
        self.dirty = false;
    }

    fn ensure_room(&mut self, height: f64) {
        if self.dirty && self.cursor + height > PAGE_HEIGHT - MARGIN {
            self.new_page();
        }
    }

    fn line_of_text(&mut self, text: &str, size: f64, indent: f64) {
        let leading = size * LEADING;
        self.ensure_room(leading);
        self.cursor += leading;
        self.current.text((MARGIN + indent, self.cursor), size, Anchor::Start, text);
        self.dirty = true;
    }

    fn wrap_width(size: f64, indent: f64) -> usize {
        ((PAGE_WIDTH - 2.0 * MARGIN - indent) / (size * AVG_GLYPH)).floor() as usize
    }

    pub fn heading(&mut self, text: &str, size: f64) {
        // Keep a heading with at least two lines of what follows.
        self.ensure_room(size * LEADING + 2.0 * BODY_SIZE * LEADING);
        if self.dirty {
            self.space(size * 0.5);
        }
        for line in wrap(text, Self::wrap_width(size, 0.0)) {
            self.line_of_text(&line, size, 0.0);
        }
        self.space(size * 0.3);
    }

    pub fn paragraph(&mut self, text: &str) {
        self.indented(text, "", 0.0);
        self.space(BODY_SIZE * 0.5);
    }

    /// One bullet item, hanging-indented under `marker`.
    pub fn bullet(&mut self, text: &str) {
        self.indented(text, "-", 14.0);
    }

    fn indented(&mut self, text: &str, marker: &str, indent: f64) {
        for (i, line) in wrap(text, Self::wrap_width(BODY_SIZE, indent)).into_iter().enumerate() {
            if i == 0 && !marker.is_empty() {
                self.ensure_room(BODY_SIZE * LEADING);
                self.current.text((MARGIN + 2.0, self.cursor + BODY_SIZE * LEADING), BODY_SIZE, Anchor::Start, marker);
            }
            self.line_of_text(&line, BODY_SIZE, indent);
        }
    }

    pub fn space(&mut self, height: f64) {
        if self.dirty {
            self.cursor += height;
        }
    }

    /// Draw a chart on a page of its own, with an optional caption below.
    pub fn chart_page(&mut self, data: &ChartData, caption: Option<&str>) {
        if self.dirty {
            self.new_page();
        }
        let width = PAGE_WIDTH - 2.0 * MARGIN;
        let height = width * 2.0 / 3.0;
        render::draw(&mut self.current, data, (MARGIN, MARGIN), width, height);
        self.cursor = MARGIN + height;
        self.dirty = true;
        if let Some(caption) = caption {
            self.space(BODY_SIZE);
            self.paragraph(caption);
        }
        self.new_page();
    }

    /// Pages written so far, counting a non-empty current page.
    pub fn page_count(&self) -> usize {
        self.pages.len() + usize::from(self.dirty)
    }

    /// Serialize the document. An empty document still gets one blank page.
    pub fn finish(mut self) -> Vec<u8> {
        if self.dirty || self.pages.is_empty() {
            self.new_page();
        }
        serialize(&self.pages)
    }
}

fn serialize(pages: &[PdfCanvas]) -> Vec<u8> {
    // 1 catalog, 2 page tree, 3 font, then (page, contents) pairs.
    let page_id = |i: usize| 4 + 2 * i;
    let object_count = 3 + 2 * pages.len();

    let mut out: Vec<u8> = Vec::new();
    let mut offsets: Vec<usize> = Vec::with_capacity(object_count);
    out.extend_from_slice(b"%PDF-1.4\n%\xe2\xe3\xcf\xd3\n");

    let mut object = |out: &mut Vec<u8>, body: &str| {
        offsets.push(out.len());
        let id = offsets.len();
        out.extend_from_slice(format!("{id} 0 obj\n{body}\nendobj\n").as_bytes());
    };

    object(&mut out, "<< /Type /Catalog /Pages 2 0 R >>");
    let kids: Vec<String> = (0..pages.len()).map(|i| format!("{} 0 R", page_id(i))).collect();
    object(&mut out, &format!("<< /Type /Pages /Kids [{}] /Count {} >>", kids.join(" "), pages.len()));
    object(&mut out, "<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica /Encoding /WinAnsiEncoding >>");

    for (i, page) in pages.iter().enumerate() {
        object(
            &mut out,
            &format!(
                "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 {} {}] /Resources << /Font << /F1 3 0 R >> >> /Contents {} 0 R >>",
                num(PAGE_WIDTH),
                num(PAGE_HEIGHT),
                page_id(i) + 1
            ),
        );
        object(
            &mut out,
            &format!("<< /Length {} >>\nstream\n{}\nendstream", page.ops.len() + 1, page.ops),
        );
    }

    let xref_at = out.len();
    let mut xref = format!("xref\n0 {}\n0000000000 65535 f \n", object_count + 1);
    for off in &offsets {
        let _ = write!(xref, "{off:010} 00000 n \n");
    }
    let _ = write!(
        xref,
        "trailer\n<< /Size {} /Root 1 0 R >>\nstartxref\n{xref_at}\n%%EOF\n",
        object_count + 1
    );
    out.extend_from_slice(xref.as_bytes());
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chart::{CategoryStyle, Series};

    fn as_text(bytes: &[u8]) -> String {
        String::from_utf8_lossy(bytes).into_owned()
    }

    #[test]
    fn escapes_parens_and_backslash() {
        assert_eq!(escape_text("a (b) \\c"), "a \\(b\\) \\\\c");
        assert_eq!(escape_text("caf\u{e9} \u{2014} ok\u{2026}"), "caf\\351 \\227 ok\\205");
        assert_eq!(escape_text("\u{20ac}5 \u{2022} \u{4e2d}"), "\\2005 \\225 ?");
    }

    #[test]
    fn wrap_respects_width_and_splits_long_words() {
        let lines = wrap("the quick brown fox jumps", 10);
        assert_eq!(lines, vec!["the quick", "brown fox", "jumps"]);
        let lines = wrap("abcdefghijkl xy", 5);
        assert_eq!(lines, vec!["abcde", "fghij", "kl xy"]);
        assert!(wrap("   ", 5).is_empty());
    }

    #[test]
    fn empty_document_has_one_page() {
        let pdf = as_text(&PdfWriter::new().finish());
        assert!(pdf.starts_with("%PDF-1.4"));
        assert!(pdf.contains("/Count 1"));
        assert!(pdf.trim_end().ends_with("%%EOF"));
    }

    #[test]
    fn long_text_paginates() {
        let mut w = PdfWriter::new();
        w.heading("Report", 18.0);
        let para = "word ".repeat(400);
        for _ in 0..5 {
            w.paragraph(&para);
        }
        assert!(w.page_count() > 1);
        let pages = w.page_count();
        let pdf = as_text(&w.finish());
        assert!(pdf.contains(&format!("/Count {pages}")));
    }

    #[test]
    fn chart_gets_its_own_page() {
        let mut w = PdfWriter::new();
        w.paragraph("intro");
        let data = ChartData {
            title: "Units".into(),
            x_label: "region".into(),
            y_label: "count".into(),
            series: Series::Categories { items: vec![("a".into(), 1.0)], style: CategoryStyle::Bars },
        };
        w.chart_page(&data, Some("Figure 1"));
        w.paragraph("after");
        assert_eq!(w.page_count(), 3);
        let pdf = as_text(&w.finish());
        assert!(pdf.contains("(Units) Tj"));
        assert!(pdf.contains("re f"));
    }

    #[test]
    fn xref_offsets_point_at_objects() {
        let mut w = PdfWriter::new();
        w.paragraph("hello (world)");
        let bytes = w.finish();
        let text = as_text(&bytes);
        assert!(text.contains("(hello \\(world\\)) Tj"));

        let startxref = text.rfind("startxref\n").unwrap() + "startxref\n".len();
        let xref_at: usize = text[startxref..].lines().next().unwrap().parse().unwrap();
        assert!(bytes[xref_at..].starts_with(b"xref\n"));

        // The binary comment line makes lossy text offsets differ from bytes.
        let table = as_text(&bytes[xref_at..]);
        let entries: Vec<&str> = table.lines().skip(3).take_while(|l| !l.starts_with("trailer")).collect();
        assert_eq!(entries.len(), 5);
        for (i, entry) in entries.iter().enumerate() {
            let off: usize = entry[..10].parse().unwrap();
            let expected = format!("{} 0 obj", i + 1);
            assert!(bytes[off..].starts_with(expected.as_bytes()), "object {} at {off}", i + 1);
        }
    }
}
