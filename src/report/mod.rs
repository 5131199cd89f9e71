//! Report rendering.
//!
//! [`ReportRenderer::build`] projects a stored dataset into a [`ReportDocument`] with four parts in
//! fixed order:
//!
//! 1. title block: dataset name, upload timestamp, total count
//! 2. statistics table (average/minimum/maximum per parameter, 2 decimals)
//! 3. type distribution (count-descending, percentage to 1 decimal), or a note when empty
//! 4. the first 50 records in stored order, with long text cut to fixed widths
//!
//! [`ReportRenderer::render`] lays the document out on Letter pages and encodes it as PDF.
//! Rendering never touches the store.

pub mod layout;
pub mod pdf;

use std::fs;
use std::path::{Path, PathBuf};

use chrono::Utc;
use tracing::{debug, info};

use crate::error::{ProcessingError, ProcessingResult};
use crate::processing::{percentage, TypeDistribution};
use crate::types::{Dataset, EquipmentRecord, Parameter};

use layout::{document_lines, paginate, Line, PageGeometry};

/// Report title.
pub const REPORT_TITLE: &str = "Chemical Equipment Analysis Report";
/// Records shown in the detail table by default.
pub const DEFAULT_DETAIL_ROWS: usize = 50;

const NAME_WIDTH: usize = 20;
const CATEGORY_WIDTH: usize = 15;

/// Identifies a report section.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SectionKind {
    Statistics,
    TypeDistribution,
    Details,
}

/// A table column: label plus minimum display width in characters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    pub label: String,
    pub min_width: usize,
}

impl Column {
    pub fn new(label: impl Into<String>, min_width: usize) -> Self {
        Self {
            label: label.into(),
            min_width,
        }
    }
}

/// Pre-formatted tabular content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Table {
    pub columns: Vec<Column>,
    pub rows: Vec<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SectionBody {
    Table(Table),
    Note(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section {
    pub kind: SectionKind,
    pub heading: String,
    pub body: SectionBody,
}

impl Section {
    /// The section's table, if it has one.
    pub fn table(&self) -> Option<&Table> {
        match &self.body {
            SectionBody::Table(t) => Some(t),
            SectionBody::Note(_) => None,
        }
    }

    /// Text lines of this section exactly as they are laid out in the document.
    pub fn lines(&self) -> Vec<String> {
        let mut out = vec![self.heading.clone()];
        match &self.body {
            SectionBody::Table(t) => out.extend(layout::table_lines(t).into_iter().map(|l| l.text)),
            SectionBody::Note(n) => out.push(n.clone()),
        }
        out
    }
}

/// Structured report content, before layout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportDocument {
    pub title: String,
    /// Dataset name, upload date, total count.
    pub info: Vec<String>,
    pub sections: Vec<Section>,
}

impl ReportDocument {
    pub fn section(&self, kind: SectionKind) -> Option<&Section> {
        self.sections.iter().find(|s| s.kind == kind)
    }

    /// All styled lines in document order.
    pub fn lines(&self) -> Vec<Line> {
        document_lines(self)
    }
}

/// Builds and encodes dataset reports.
#[derive(Debug, Clone)]
pub struct ReportRenderer {
    detail_rows: usize,
    geometry: PageGeometry,
}

impl Default for ReportRenderer {
    fn default() -> Self {
        Self::new(DEFAULT_DETAIL_ROWS)
    }
}

impl ReportRenderer {
    pub fn new(detail_rows: usize) -> Self {
        Self {
            detail_rows,
            geometry: PageGeometry::default(),
        }
    }

    /// Build the report content.
    ///
    /// Fails with [`ProcessingError::Render`] when `records` disagrees with the dataset's stored
    /// count, or when a non-empty dataset has no statistics snapshot.
    pub fn build(
        &self,
        dataset: &Dataset,
        records: &[EquipmentRecord],
    ) -> ProcessingResult<ReportDocument> {
        if records.len() != dataset.record_count {
            return Err(ProcessingError::render(format!(
                "dataset {} declares {} records but {} were supplied",
                dataset.id,
                dataset.record_count,
                records.len()
            )));
        }
        if dataset.record_count > 0 && dataset.statistics.is_none() {
            return Err(ProcessingError::render(format!(
                "dataset {} has records but no statistics snapshot",
                dataset.id
            )));
        }

        let info = vec![
            format!("Dataset: {}", dataset.name),
            format!(
                "Upload Date: {}",
                dataset.created_at.format("%Y-%m-%d %H:%M:%S")
            ),
            format!("Total Equipment: {}", dataset.record_count),
        ];

        Ok(ReportDocument {
            title: REPORT_TITLE.to_string(),
            info,
            sections: vec![
                statistics_section(dataset),
                distribution_section(dataset, records),
                self.details_section(records),
            ],
        })
    }

    /// Build, lay out, and encode the report as PDF bytes.
    pub fn render(
        &self,
        dataset: &Dataset,
        records: &[EquipmentRecord],
    ) -> ProcessingResult<Vec<u8>> {
        let doc = self.build(dataset, records)?;
        let pages = paginate(doc.lines(), &self.geometry);
        debug!(dataset = %dataset.id, pages = pages.len(), "rendering report");
        pdf::encode_pdf(&doc.title, &pages, &self.geometry)
    }

    /// Render and write the report into `dir` as `report_<id>_<YYYYmmdd_HHMMSS>.pdf`.
    pub fn export(
        &self,
        dataset: &Dataset,
        records: &[EquipmentRecord],
        dir: &Path,
    ) -> ProcessingResult<PathBuf> {
        let bytes = self.render(dataset, records)?;
        let path = dir.join(format!(
            "report_{}_{}.pdf",
            dataset.id,
            Utc::now().format("%Y%m%d_%H%M%S")
        ));
        fs::create_dir_all(dir)
            .and_then(|()| fs::write(&path, &bytes))
            .map_err(|e| ProcessingError::render(format!("write {}: {e}", path.display())))?;
        info!(dataset = %dataset.id, path = %path.display(), "report exported");
        Ok(path)
    }

    fn details_section(&self, records: &[EquipmentRecord]) -> Section {
        let rows = records
            .iter()
            .take(self.detail_rows)
            .map(|r| {
                vec![
                    truncate(&r.name, NAME_WIDTH),
                    truncate(&r.category, CATEGORY_WIDTH),
                    format!("{:.1}", r.flowrate),
                    format!("{:.1}", r.pressure),
                    format!("{:.1}", r.temperature),
                ]
            })
            .collect();

        Section {
            kind: SectionKind::Details,
            heading: format!("Equipment Details (First {} Items)", self.detail_rows),
            body: SectionBody::Table(Table {
                columns: vec![
                    Column::new("Name", NAME_WIDTH),
                    Column::new("Type", CATEGORY_WIDTH),
                    Column::new("Flowrate", 10),
                    Column::new("Pressure", 10),
                    Column::new("Temp", 10),
                ],
                rows,
            }),
        }
    }
}

/// Suggested download name for a dataset's report.
pub fn report_filename(dataset: &Dataset) -> String {
    format!("{}_report.pdf", dataset.name)
}

fn statistics_section(dataset: &Dataset) -> Section {
    let rows = Parameter::ALL
        .iter()
        .map(|&p| {
            let mut row = vec![p.label().to_string()];
            match dataset.statistics.map(|s| s.get(p)) {
                Some(s) => row.extend([s.avg, s.min, s.max].map(|v| format!("{v:.2}"))),
                None => row.extend(std::iter::repeat_n("N/A".to_string(), 3)),
            }
            row
        })
        .collect();

    Section {
        kind: SectionKind::Statistics,
        heading: "Summary Statistics".to_string(),
        body: SectionBody::Table(Table {
            columns: vec![
                Column::new("Parameter", 12),
                Column::new("Average", 12),
                Column::new("Minimum", 12),
                Column::new("Maximum", 12),
            ],
            rows,
        }),
    }
}

fn distribution_section(dataset: &Dataset, records: &[EquipmentRecord]) -> Section {
    let heading = "Equipment Type Distribution".to_string();
    let total = dataset.record_count;
    if total == 0 {
        return Section {
            kind: SectionKind::TypeDistribution,
            heading,
            body: SectionBody::Note("No equipment records.".to_string()),
        };
    }

    let rows = TypeDistribution::from_records(records)
        .sorted()
        .into_iter()
        .filter_map(|tc| {
            let pct = percentage(tc.count, total)?;
            Some(vec![tc.category, tc.count.to_string(), format!("{pct:.1}%")])
        })
        .collect();

    Section {
        kind: SectionKind::TypeDistribution,
        heading,
        body: SectionBody::Table(Table {
            columns: vec![
                Column::new("Equipment Type", 24),
                Column::new("Count", 8),
                Column::new("Percentage", 10),
            ],
            rows,
        }),
    }
}

fn truncate(s: &str, max_chars: usize) -> String {
    s.chars().take(max_chars).collect()
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::{report_filename, ReportRenderer, SectionBody, SectionKind};
    use crate::error::ProcessingError;
    use crate::processing::aggregate;
    use crate::types::{Dataset, DatasetId, EquipmentRecord, OwnerId};

    fn rec(name: &str, category: &str, f: f64) -> EquipmentRecord {
        EquipmentRecord {
            name: name.to_string(),
            category: category.to_string(),
            flowrate: f,
            pressure: f / 10.0,
            temperature: 20.0 + f,
        }
    }

    fn dataset_for(records: &[EquipmentRecord]) -> Dataset {
        let agg = aggregate(records);
        Dataset {
            id: DatasetId(42),
            owner: OwnerId::new("alice"),
            name: "plant.csv".to_string(),
            created_at: Utc.with_ymd_and_hms(2025, 6, 1, 8, 30, 15).unwrap(),
            source_path: None,
            record_count: agg.count,
            statistics: agg.snapshot,
        }
    }

    #[test]
    fn sections_come_in_fixed_order_with_formatting() {
        let records = vec![
            rec("Centrifugal Pump Number One", "Pump", 10.0),
            rec("V-1", "Valve", 20.0),
            rec("P-2", "Pump", 30.0),
        ];
        let ds = dataset_for(&records);
        let doc = ReportRenderer::default().build(&ds, &records).unwrap();

        assert_eq!(
            doc.info,
            vec![
                "Dataset: plant.csv",
                "Upload Date: 2025-06-01 08:30:15",
                "Total Equipment: 3"
            ]
        );
        let kinds: Vec<_> = doc.sections.iter().map(|s| s.kind).collect();
        assert_eq!(
            kinds,
            vec![SectionKind::Statistics, SectionKind::TypeDistribution, SectionKind::Details]
        );

        let stats = doc.section(SectionKind::Statistics).unwrap().table().unwrap();
        assert_eq!(stats.rows[0], vec!["Flowrate", "20.00", "10.00", "30.00"]);
        assert_eq!(stats.rows.len(), 3);

        let dist = doc.section(SectionKind::TypeDistribution).unwrap().table().unwrap();
        assert_eq!(dist.rows[0], vec!["Pump", "2", "66.7%"]);
        assert_eq!(dist.rows[1], vec!["Valve", "1", "33.3%"]);

        let details = doc.section(SectionKind::Details).unwrap().table().unwrap();
        assert_eq!(details.rows[0][0], "Centrifugal Pump Num");
        assert_eq!(details.rows[0][2], "10.0");
    }

    #[test]
    fn details_are_capped_at_fifty_in_stored_order() {
        let records: Vec<_> = (0..75)
            .map(|i| rec(&format!("E-{i:03}"), "Pump", i as f64))
            .collect();
        let ds = dataset_for(&records);
        let doc = ReportRenderer::default().build(&ds, &records).unwrap();
        let details = doc.section(SectionKind::Details).unwrap().table().unwrap();
        assert_eq!(details.rows.len(), 50);
        assert_eq!(details.rows[0][0], "E-000");
        assert_eq!(details.rows[49][0], "E-049");

        let pdf = ReportRenderer::default().render(&ds, &records).unwrap();
        let loaded = lopdf::Document::load_mem(&pdf).unwrap();
        assert!(loaded.get_pages().len() >= 2);
    }

    #[test]
    fn empty_dataset_renders_without_distribution() {
        let ds = dataset_for(&[]);
        let renderer = ReportRenderer::default();
        let doc = renderer.build(&ds, &[]).unwrap();

        let dist = doc.section(SectionKind::TypeDistribution).unwrap();
        assert!(matches!(dist.body, SectionBody::Note(_)));
        let stats = doc.section(SectionKind::Statistics).unwrap().table().unwrap();
        assert_eq!(stats.rows[1], vec!["Pressure", "N/A", "N/A", "N/A"]);

        let pdf = renderer.render(&ds, &[]).unwrap();
        assert!(pdf.starts_with(b"%PDF"));
    }

    #[test]
    fn rendering_is_repeatable() {
        let records = vec![rec("A", "Pump", 1.0), rec("B", "Valve", 2.0), rec("C", "Mixer", 3.0)];
        let ds = dataset_for(&records);
        let renderer = ReportRenderer::default();
        let a = renderer.build(&ds, &records).unwrap();
        let b = renderer.build(&ds, &records).unwrap();
        for kind in [SectionKind::Statistics, SectionKind::TypeDistribution] {
            assert_eq!(a.section(kind).unwrap().lines(), b.section(kind).unwrap().lines());
        }
        assert_eq!(
            renderer.render(&ds, &records).unwrap(),
            renderer.render(&ds, &records).unwrap()
        );
    }

    #[test]
    fn mismatched_record_count_is_a_render_error() {
        let records = vec![rec("A", "Pump", 1.0)];
        let mut ds = dataset_for(&records);
        ds.record_count = 2;
        let err = ReportRenderer::default().build(&ds, &records).unwrap_err();
        assert!(matches!(err, ProcessingError::Render { .. }));
    }

    #[test]
    fn download_name_follows_dataset_name() {
        assert_eq!(report_filename(&dataset_for(&[])), "plant.csv_report.pdf");
    }
}
