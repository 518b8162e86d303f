//! Report documents and their PDF layout.

pub mod pdf;

use chrono::{DateTime, Utc};

use crate::chart::ChartData;
use pdf::PdfWriter;

const TITLE_SIZE: f64 = 20.0;
const SECTION_SIZE: f64 = 14.0;

/// Everything that goes into one report PDF.
#[derive(Debug, Clone)]
pub struct ReportDocument {
    pub title: String,
    pub generated_at: DateTime<Utc>,
    /// Model-written body; plain text with light markdown.
    pub body: String,
    pub charts: Vec<ChartData>,
}

#[derive(Debug, PartialEq)]
enum Block<'a> {
    Heading(&'a str),
    Bullet(String),
    Paragraph(String),
}

/// Split report text into headings, bullets and paragraphs.
///
/// `#` lines and short lines ending in `:` are headings; `-`, `*` and `•`
/// start bullets; other consecutive lines join into one paragraph.
fn blocks(body: &str) -> Vec<Block<'_>> {
    let mut out = Vec::new();
    let mut para: Vec<&str> = Vec::new();

    fn flush<'a>(para: &mut Vec<&'a str>, out: &mut Vec<Block<'a>>) {
        if !para.is_empty() {
            out.push(Block::Paragraph(para.join(" ")));
            para.clear();
        }
    }

    for raw in body.lines() {
        let line = raw.trim();
        if line.is_empty() {
            flush(&mut para, &mut out);
            continue;
        }
        if let Some(h) = line.strip_prefix('#') {
            flush(&mut para, &mut out);
            out.push(Block::Heading(h.trim_start_matches('#').trim()));
        } else if let Some(item) = ["- ", "* ", "• "].iter().find_map(|m| line.strip_prefix(m)) {
            flush(&mut para, &mut out);
            out.push(Block::Bullet(item.trim().replace("**", "")));
        } else if (line.ends_with(':') && line.len() <= 40) || is_section_name(line) {
            flush(&mut para, &mut out);
            out.push(Block::Heading(line.trim_end_matches(':').trim_matches('*')));
        } else {
            para.push(line);
        }
    }
    flush(&mut para, &mut out);

    // Paragraph text loses emphasis markers; PDF has no bold here.
    out.into_iter()
        .map(|b| match b {
            Block::Paragraph(p) => Block::Paragraph(p.replace("**", "")),
            other => other,
        })
        .collect()
}

fn is_section_name(line: &str) -> bool {
    let l = line.trim_matches('*').trim_end_matches(':');
    ["summary", "findings", "recommendations"].iter().any(|s| l.eq_ignore_ascii_case(s))
}

/// Lay out a report: title block, body text, then one page per chart.
pub fn render_pdf(doc: &ReportDocument) -> Vec<u8> {
    let mut w = PdfWriter::new();
    w.heading(&doc.title, TITLE_SIZE);
    w.paragraph(&format!("Generated {}", doc.generated_at.format("%Y-%m-%d %H:%M UTC")));

    for block in blocks(&doc.body) {
        match block {
            Block::Heading(h) => w.heading(h, SECTION_SIZE),
            Block::Bullet(b) => w.bullet(&b),
            Block::Paragraph(p) => w.paragraph(&p),
        }
    }

    for (i, chart) in doc.charts.iter().enumerate() {
        w.chart_page(chart, Some(&format!("Figure {}: {}", i + 1, chart.title)));
    }
    w.finish()
}
