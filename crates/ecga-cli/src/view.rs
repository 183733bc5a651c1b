use crossterm::{
    cursor::MoveToColumn,
    execute,
    style::{Color, Print, Stylize},
    terminal::{Clear, ClearType},
};
use ecga_client::{ReportHandle, SubmissionError, SubmissionPhase, SubmissionView};
use ecga_lib::{ProgressState, RenderedTable};
use log::debug;
use std::io::{self, IsTerminal, Write};

const BAR_WIDTH: usize = 24;

/// Terminal rendering: a redrawn progress line on stderr, text tables on stdout.
pub struct TerminalView {
    header_color: Option<Color>,
    print_tables: bool,
    live_progress: bool,
    progress_shown: bool,
    report_requested: bool,
}

impl TerminalView {
    pub fn new(dark_mode: bool, print_tables: bool, report_requested: bool) -> Self {
        let header_color = io::stdout().is_terminal().then_some(if dark_mode {
            Color::Cyan
        } else {
            Color::DarkBlue
        });
        Self {
            header_color,
            print_tables,
            live_progress: io::stderr().is_terminal(),
            progress_shown: false,
            report_requested,
        }
    }

    fn clear_line(&mut self) {
        if self.progress_shown {
            let _ = execute!(io::stderr(), MoveToColumn(0), Clear(ClearType::CurrentLine));
            self.progress_shown = false;
        }
    }

    fn print_table(&self, title: &str, table: &RenderedTable) {
        let mut out = io::stdout().lock();
        let _ = writeln!(out, "{}", title);
        let _ = writeln!(out, "{}", format_table(table, self.header_color));
    }
}

impl SubmissionView for TerminalView {
    fn phase_changed(&mut self, phase: SubmissionPhase) {
        debug!("phase: {:?}", phase);
    }

    fn reset(&mut self, status: &str) {
        self.clear_line();
        eprintln!("{}", status);
    }

    fn status(&mut self, message: &str) {
        self.clear_line();
        eprintln!("{}", message);
    }

    fn progress(&mut self, state: &ProgressState) {
        if !self.live_progress {
            debug!("progress {} {}", state.percent_label(), state.eta_label());
            return;
        }
        let line = progress_line(state);
        let _ = execute!(
            io::stderr(),
            MoveToColumn(0),
            Clear(ClearType::CurrentLine),
            Print(line)
        );
        self.progress_shown = true;
    }

    fn hide_progress(&mut self) {
        self.clear_line();
    }

    fn tables(&mut self, hrv: &RenderedTable, predictions: &RenderedTable) {
        if !self.print_tables {
            return;
        }
        self.print_table("HRV metrics", hrv);
        let details = format_details(hrv);
        if !details.is_empty() {
            println!();
            for line in details {
                println!("{}", line);
            }
        }
        println!();
        self.print_table("Beat classification", predictions);
    }

    fn report_available(&mut self, report: &ReportHandle) {
        eprintln!("{}", report_notice(report, self.report_requested));
    }

    fn plot(&mut self, image: &[u8]) {
        debug!("plot received ({} bytes)", image.len());
    }

    fn error(&mut self, error: &SubmissionError) {
        self.clear_line();
        eprintln!("{}", error);
        if let Some(body) = error.http_body() {
            if !body.trim().is_empty() {
                eprintln!("{}", body);
            }
        }
    }
}

pub fn progress_line(state: &ProgressState) -> String {
    let filled = ((state.percent / 100.0) * BAR_WIDTH as f64).round() as usize;
    let filled = filled.min(BAR_WIDTH);
    format!(
        "[{}{}] {:>6} {}",
        "#".repeat(filled),
        "-".repeat(BAR_WIDTH - filled),
        state.percent_label(),
        state.eta_label()
    )
}

pub fn report_notice(report: &ReportHandle, requested: bool) -> String {
    if requested {
        format!("Report available: {}", report.path())
    } else {
        format!(
            "Report available: {} (fetch with --download-report)",
            report.path()
        )
    }
}

/// Full values behind summarised cells, one `lead/column: values` line each.
pub fn format_details(table: &RenderedTable) -> Vec<String> {
    table
        .rows
        .iter()
        .flat_map(|row| {
            row.cells
                .iter()
                .zip(&table.columns)
                .filter_map(move |(cell, column)| {
                    cell.detail
                        .as_ref()
                        .map(|detail| format!("{}/{}: {}", row.lead, column, detail))
                })
        })
        .collect()
}

/// Left-aligned text table with a dashed rule under the header.
pub fn format_table(table: &RenderedTable, header_color: Option<Color>) -> String {
    if table.columns.is_empty() && table.rows.is_empty() {
        return "(no data)".to_string();
    }
    let header = table.header();
    let rows: Vec<Vec<String>> = (0..table.rows.len())
        .filter_map(|i| table.row_texts(i))
        .collect();
    let mut widths: Vec<usize> = header.iter().map(|h| h.chars().count()).collect();
    for row in &rows {
        for (i, text) in row.iter().enumerate() {
            if let Some(w) = widths.get_mut(i) {
                *w = (*w).max(text.chars().count());
            }
        }
    }

    let mut lines = Vec::with_capacity(rows.len() + 2);
    let header_line = join_padded(&header, &widths);
    lines.push(match header_color {
        Some(color) => header_line.with(color).bold().to_string(),
        None => header_line,
    });
    lines.push(
        widths
            .iter()
            .map(|w| "-".repeat(*w))
            .collect::<Vec<_>>()
            .join("  "),
    );
    for row in &rows {
        lines.push(join_padded(row, &widths));
    }
    lines.join("\n")
}

fn join_padded(cells: &[String], widths: &[usize]) -> String {
    cells
        .iter()
        .zip(widths)
        .map(|(text, width)| {
            let pad = width.saturating_sub(text.chars().count());
            format!("{}{}", text, " ".repeat(pad))
        })
        .collect::<Vec<_>>()
        .join("  ")
        .trim_end()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ecga_lib::{
        render_hrv_table, render_predictions_table, Eta, LeadMap, MetricValue, Phase,
    };

    #[test]
    fn formats_aligned_table() {
        let mut preds: LeadMap<LeadMap<u64>> = LeadMap::new();
        preds.insert("L1", [("N", 5u64)].into_iter().collect());
        preds.insert("lead_2", [("PVC", 12u64), ("N", 1)].into_iter().collect());
        let text = format_table(&render_predictions_table(&preds), None);
        assert_eq!(
            text,
            "Lead    N  PVC\n------  -  ---\nL1      5  0\nlead_2  1  12"
        );
    }

    #[test]
    fn series_details_listed_per_lead() {
        let mut hrv: LeadMap<LeadMap<MetricValue>> = LeadMap::new();
        hrv.insert(
            "lead_1",
            [
                ("sdnn", MetricValue::Scalar(41.2)),
                ("psd", MetricValue::Series(vec![1.0, 2.5, 3.25, 4.0, 5.0, 6.0])),
            ]
            .into_iter()
            .collect(),
        );
        hrv.insert("lead_2", [("sdnn", MetricValue::Scalar(39.0))].into_iter().collect());
        assert_eq!(
            format_details(&render_hrv_table(&hrv)),
            vec!["lead_1/psd: 1, 2.5, 3.25, 4, 5, 6"]
        );
    }

    #[test]
    fn report_hint_only_without_the_flag() {
        let report = ReportHandle::new("/srv/tmp/100_report.pdf");
        assert_eq!(
            report_notice(&report, false),
            "Report available: /srv/tmp/100_report.pdf (fetch with --download-report)"
        );
        assert_eq!(
            report_notice(&report, true),
            "Report available: /srv/tmp/100_report.pdf"
        );
    }

    #[test]
    fn empty_table_placeholder() {
        assert_eq!(format_table(&RenderedTable::default(), None), "(no data)");
    }

    #[test]
    fn progress_bar_fills_with_percent() {
        let state = ProgressState {
            phase: Phase::Processing,
            percent: 50.0,
            eta: Eta::Remaining(65.0),
        };
        assert_eq!(
            progress_line(&state),
            "[############------------]  50.0% ETA: 01:05"
        );
        let done = ProgressState {
            phase: Phase::Done,
            percent: 100.0,
            eta: Eta::Remaining(0.0),
        };
        assert!(progress_line(&done).starts_with(&format!("[{}]", "#".repeat(BAR_WIDTH))));
    }
}
