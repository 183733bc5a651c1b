use crate::error::SubmissionError;
use crate::orchestrator::{ReportHandle, SubmissionPhase};
use ecga_lib::{ProgressState, RenderedTable};

/// Display side of a submission. The orchestrator drives every visible change
/// through these calls; implementations hold no submission logic.
pub trait SubmissionView {
    fn phase_changed(&mut self, phase: SubmissionPhase);

    /// Clear results and progress from a previous submission.
    fn reset(&mut self, status: &str);

    fn status(&mut self, message: &str);

    fn progress(&mut self, state: &ProgressState);

    fn hide_progress(&mut self);

    fn tables(&mut self, hrv: &RenderedTable, predictions: &RenderedTable);

    fn report_available(&mut self, report: &ReportHandle);

    fn plot(&mut self, image: &[u8]);

    fn error(&mut self, error: &SubmissionError);
}
