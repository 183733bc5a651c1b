use crate::result::{LeadMap, MetricValue};
use serde::Serialize;

pub const LEAD_COLUMN: &str = "Lead";
/// Elements of a sequence metric shown in its summary text.
pub const SERIES_PREVIEW_LEN: usize = 5;
/// Shown when a lead lacks a column taken from the first lead.
pub const MISSING_CELL: &str = "n/a";

/// One rendered value. `detail` carries the untruncated data behind a
/// shortened summary (the full sequence of a curve metric).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Cell {
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl Cell {
    pub fn plain(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            detail: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TableRow {
    pub lead: String,
    pub cells: Vec<Cell>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct RenderedTable {
    /// Column labels, excluding the leading `Lead` column.
    pub columns: Vec<String>,
    pub rows: Vec<TableRow>,
}

impl RenderedTable {
    /// Full header row, `Lead` first.
    pub fn header(&self) -> Vec<String> {
        std::iter::once(LEAD_COLUMN.to_string())
            .chain(self.columns.iter().cloned())
            .collect()
    }

    /// Display strings of one row, lead label first.
    pub fn row_texts(&self, index: usize) -> Option<Vec<String>> {
        let row = self.rows.get(index)?;
        Some(
            std::iter::once(row.lead.clone())
                .chain(row.cells.iter().map(|c| c.text.clone()))
                .collect(),
        )
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// HRV metrics table.
///
/// Columns are the metric keys of the *first* lead, in its order; other leads
/// are assumed to share that schema. A lead missing one of those metrics shows
/// [`MISSING_CELL`]; metrics only present on later leads are not shown.
pub fn render_hrv_table(hrv: &LeadMap<LeadMap<MetricValue>>) -> RenderedTable {
    let columns: Vec<String> = match hrv.first() {
        Some((_, metrics)) => metrics.keys().map(str::to_string).collect(),
        None => return RenderedTable::default(),
    };
    let rows = hrv
        .iter()
        .map(|(lead, metrics)| TableRow {
            lead: lead.to_string(),
            cells: columns
                .iter()
                .map(|col| match metrics.get(col) {
                    Some(value) => metric_cell(value),
                    None => Cell::plain(MISSING_CELL),
                })
                .collect(),
        })
        .collect();
    RenderedTable { columns, rows }
}

/// Beat classification counts.
///
/// Columns are the union of labels over all leads in first-seen order, since
/// models may emit different label subsets per lead. Absent combinations are 0.
pub fn render_predictions_table(predictions: &LeadMap<LeadMap<u64>>) -> RenderedTable {
    let mut columns: Vec<String> = Vec::new();
    for (_, counts) in predictions.iter() {
        for label in counts.keys() {
            if !columns.iter().any(|c| c == label) {
                columns.push(label.to_string());
            }
        }
    }
    let rows = predictions
        .iter()
        .map(|(lead, counts)| TableRow {
            lead: lead.to_string(),
            cells: columns
                .iter()
                .map(|label| Cell::plain(counts.get(label).copied().unwrap_or(0).to_string()))
                .collect(),
        })
        .collect();
    RenderedTable { columns, rows }
}

pub fn metric_cell(value: &MetricValue) -> Cell {
    match value {
        MetricValue::Scalar(v) => Cell::plain(format_scalar(*v)),
        MetricValue::Series(values) => Cell {
            text: values
                .iter()
                .take(SERIES_PREVIEW_LEN)
                .map(|v| format!("{:.1}", round_half_away(*v, 1)))
                .collect::<Vec<_>>()
                .join(", "),
            detail: Some(
                values
                    .iter()
                    .map(|v| v.to_string())
                    .collect::<Vec<_>>()
                    .join(", "),
            ),
        },
    }
}

/// Round to two decimals and print without trailing zeros (`3`, `12.5`, `0.33`).
pub fn format_scalar(value: f64) -> String {
    format!("{}", round_half_away(value, 2))
}

/// Decimal rounding shared by scalar and series cells: ties go away from
/// zero (`0.25` -> `0.3`, `-1.125` -> `-1.13`). Never returns `-0.0`.
fn round_half_away(value: f64, decimals: i32) -> f64 {
    let scale = 10f64.powi(decimals);
    (value * scale).round() / scale + 0.0
}
