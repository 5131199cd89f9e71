//! Fixed-width text layout and pagination.

use super::{ReportDocument, SectionBody, Table};

/// Visual role of a laid-out line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineStyle {
    Title,
    Heading,
    TableHeader,
    Body,
    Blank,
}

impl LineStyle {
    /// Font size in points.
    pub fn font_size(self) -> i64 {
        match self {
            Self::Title => 16,
            Self::Heading => 12,
            Self::TableHeader | Self::Body | Self::Blank => 9,
        }
    }

    /// Vertical space the line occupies, in points.
    pub fn leading(self) -> i64 {
        match self {
            Self::Title => 28,
            Self::Heading => 20,
            Self::TableHeader | Self::Body => 12,
            Self::Blank => 8,
        }
    }

    pub fn is_bold(self) -> bool {
        matches!(self, Self::Title | Self::Heading | Self::TableHeader)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Line {
    pub style: LineStyle,
    pub text: String,
}

impl Line {
    fn new(style: LineStyle, text: impl Into<String>) -> Self {
        Self {
            style,
            text: text.into(),
        }
    }
}

/// Page geometry in points (US Letter by default).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageGeometry {
    pub width: i64,
    pub height: i64,
    pub margin: i64,
}

impl Default for PageGeometry {
    fn default() -> Self {
        Self {
            width: 612,
            height: 792,
            margin: 54,
        }
    }
}

impl PageGeometry {
    /// Height available for body lines; one body line is kept free for the page footer.
    pub fn usable_height(&self) -> i64 {
        self.height - 2 * self.margin - LineStyle::Body.leading()
    }
}

/// Render a table to text lines: header, rule, rows.
///
/// Column widths are the configured minimum or the widest cell, whichever is larger.
pub fn table_lines(table: &Table) -> Vec<Line> {
    let mut widths: Vec<usize> = table
        .columns
        .iter()
        .map(|c| c.min_width.max(c.label.chars().count()))
        .collect();
    for row in &table.rows {
        for (w, cell) in widths.iter_mut().zip(row) {
            *w = (*w).max(cell.chars().count());
        }
    }

    let labels: Vec<&str> = table.columns.iter().map(|c| c.label.as_str()).collect();
    let mut out = Vec::with_capacity(table.rows.len() + 2);
    out.push(Line::new(LineStyle::TableHeader, join_row(&labels, &widths)));
    let rule: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
    out.push(Line::new(LineStyle::Body, rule.join("-+-")));
    for row in &table.rows {
        let cells: Vec<&str> = row.iter().map(String::as_str).collect();
        out.push(Line::new(LineStyle::Body, join_row(&cells, &widths)));
    }
    out
}

fn join_row(cells: &[&str], widths: &[usize]) -> String {
    cells
        .iter()
        .zip(widths)
        .map(|(cell, w)| format!("{cell:<w$}"))
        .collect::<Vec<_>>()
        .join(" | ")
        .trim_end()
        .to_string()
}

/// Flatten a document into styled lines, in section order.
pub fn document_lines(doc: &ReportDocument) -> Vec<Line> {
    let mut out = vec![Line::new(LineStyle::Title, doc.title.clone())];
    for info in &doc.info {
        out.push(Line::new(LineStyle::Body, info.clone()));
    }

    for section in &doc.sections {
        out.push(Line::new(LineStyle::Blank, ""));
        out.push(Line::new(LineStyle::Heading, section.heading.clone()));
        match &section.body {
            SectionBody::Table(table) => out.extend(table_lines(table)),
            SectionBody::Note(note) => out.push(Line::new(LineStyle::Body, note.clone())),
        }
    }
    out
}

/// Split lines into pages that fit `geometry`. Always returns at least one page.
///
/// A blank or heading line is never left dangling at the bottom of a page when it would be
/// followed by a page break.
pub fn paginate(lines: Vec<Line>, geometry: &PageGeometry) -> Vec<Vec<Line>> {
    let budget = geometry.usable_height();
    let mut pages: Vec<Vec<Line>> = Vec::new();
    let mut current: Vec<Line> = Vec::new();
    let mut used = 0;

    for line in lines {
        let h = line.style.leading();
        if used + h > budget && !current.is_empty() {
            let mut carry = Vec::new();
            while matches!(
                current.last().map(|l| l.style),
                Some(LineStyle::Heading | LineStyle::Blank)
            ) {
                if let Some(l) = current.pop() {
                    carry.push(l);
                }
            }
            carry.reverse();
            carry.retain(|l| l.style != LineStyle::Blank);

            pages.push(std::mem::take(&mut current));
            used = carry.iter().map(|l| l.style.leading()).sum();
            current = carry;
        }
        if current.is_empty() && line.style == LineStyle::Blank {
            continue;
        }
        used += h;
        current.push(line);
    }

    if !current.is_empty() || pages.is_empty() {
        pages.push(current);
    }
    pages
}
