use crate::config::ClientConfig;
use crate::error::{AuxiliaryError, SubmissionError};
use crate::service::{AnalysisService, ServiceResponse, TransferEvent};
use crate::view::SubmissionView;
use anyhow::Result;
use ecga_lib::io::wfdb::read_header;
use ecga_lib::state::{ClientState, StateStore};
use ecga_lib::{
    render_hrv_table, render_predictions_table, AnalysisResult, ProgressEstimator, RecordFileKind,
    RecordSelection, RenderedTable, RunningAverage,
};
use log::{debug, info, warn};
use serde::Serialize;
use std::path::PathBuf;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{interval_at, sleep_until, Instant, Interval, MissedTickBehavior};

pub const STATUS_ANALYZING: &str = "Analyzing…";
pub const STATUS_SAMPLE: &str = "Running sample…";
pub const STATUS_DONE: &str = "Results below:";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmissionPhase {
    Idle,
    Validating,
    Uploading,
    AwaitingProcessing,
    Rendering,
    Error,
}

/// Opaque server handle for a generated report. Fetched only on request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportHandle(String);

impl ReportHandle {
    pub fn new(path: impl Into<String>) -> Self {
        Self(path.into())
    }

    pub fn path(&self) -> &str {
        &self.0
    }

    /// File name for a local copy: last segment of the handle.
    pub fn file_name(&self) -> &str {
        self.0
            .rsplit(|c: char| c == '/' || c == '\\')
            .find(|s| !s.is_empty())
            .unwrap_or("report.pdf")
    }
}

/// Everything a completed submission produced.
#[derive(Debug, Clone)]
pub struct SubmissionOutcome {
    /// Record name derived from the selection; `None` for the sample run.
    pub record: Option<String>,
    pub result: AnalysisResult,
    pub hrv_table: RenderedTable,
    pub predictions_table: RenderedTable,
    pub report: Option<ReportHandle>,
    pub plot: Option<Vec<u8>>,
}

/// Repeating processing-phase timer. Lives inside one transfer, so leaving
/// that transfer drops it.
struct ProcessingTicker(Option<Interval>);

impl ProcessingTicker {
    fn idle() -> Self {
        Self(None)
    }

    fn start(&mut self, period: Duration) {
        let mut interval = interval_at(Instant::now() + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        self.0 = Some(interval);
    }

    fn is_running(&self) -> bool {
        self.0.is_some()
    }

    async fn tick(&mut self) {
        match self.0.as_mut() {
            Some(interval) => {
                interval.tick().await;
            }
            None => std::future::pending::<()>().await,
        }
    }
}

fn now() -> std::time::Instant {
    Instant::now().into_std()
}

fn transition<V: SubmissionView>(slot: &mut SubmissionPhase, next: SubmissionPhase, view: &mut V) {
    debug!("submission {:?} -> {:?}", slot, next);
    *slot = next;
    view.phase_changed(next);
}

fn fail<V: SubmissionView>(
    slot: &mut SubmissionPhase,
    error: SubmissionError,
    view: &mut V,
) -> SubmissionError {
    warn!("submission failed: {}", error);
    transition(slot, SubmissionPhase::Error, view);
    view.error(&error);
    error
}

fn inspect_selection(selection: &RecordSelection) {
    info!(
        "submitting {} files ({} bytes)",
        selection.files().len(),
        selection.total_bytes()
    );
    if !selection.has_signal_pair() {
        warn!("selection has no .dat + .hea pair; the server may reject it");
    }
    if let Some(header) = selection.first_of(RecordFileKind::Header) {
        match read_header(&header.path) {
            Ok(summary) => info!(
                "record {}: {} leads, fs {:?} Hz, {:?} samples, {}",
                summary.record,
                summary.n_signals,
                summary.fs,
                summary.n_samples,
                summary
                    .duration_secs()
                    .map(|secs| format!("{:.1}s", secs))
                    .unwrap_or_else(|| "unknown duration".to_string())
            ),
            Err(err) => debug!("header {} not inspected: {:#}", header.path.display(), err),
        }
    }
}

/// Drives submissions end to end: validation, upload with progress,
/// processing estimate, rendering and the auxiliary plot fetch.
pub struct Orchestrator<S, T> {
    service: S,
    store: T,
    state: ClientState,
    tick: Duration,
    grace: Duration,
    phase: SubmissionPhase,
}

impl<S: AnalysisService, T: StateStore> Orchestrator<S, T> {
    pub fn new(service: S, store: T, config: &ClientConfig) -> Result<Self> {
        let state = store.load()?;
        debug!(
            "loaded client state: average {:.2}s",
            state.avg_proc_time.seconds()
        );
        Ok(Self {
            service,
            store,
            state,
            tick: config.tick_interval(),
            grace: config.grace(),
            phase: SubmissionPhase::Idle,
        })
    }

    pub fn phase(&self) -> SubmissionPhase {
        self.phase
    }

    pub fn average(&self) -> RunningAverage {
        self.state.avg_proc_time
    }

    pub fn state(&self) -> &ClientState {
        &self.state
    }

    pub fn service(&self) -> &S {
        &self.service
    }

    pub fn store(&self) -> &T {
        &self.store
    }

    /// Validate and upload `paths`, then render the analysis.
    pub async fn submit<V: SubmissionView>(
        &mut self,
        paths: &[PathBuf],
        view: &mut V,
    ) -> Result<SubmissionOutcome, SubmissionError> {
        transition(&mut self.phase, SubmissionPhase::Validating, view);
        let selection = match RecordSelection::from_paths(paths) {
            Ok(selection) => selection,
            Err(err) => return Err(fail(&mut self.phase, err.into(), view)),
        };
        inspect_selection(&selection);

        view.reset(STATUS_ANALYZING);
        transition(&mut self.phase, SubmissionPhase::Uploading, view);
        let (response, learned, hide_at) = self.transfer(&selection, view).await?;

        if !response.is_success() {
            sleep_until(hide_at).await;
            view.hide_progress();
            let error = SubmissionError::Http {
                status: response.status,
                body: response.body,
            };
            return Err(fail(&mut self.phase, error, view));
        }

        match learned {
            Some(average) => self.learn(average),
            None => debug!("upload completion was not observed; average unchanged"),
        }
        self.render(&response.body, selection.record_name(), Some(hide_at), view)
            .await
    }

    /// Fetch the pre-canned analysis. No upload, no estimate, no learning.
    pub async fn run_sample<V: SubmissionView>(
        &mut self,
        view: &mut V,
    ) -> Result<SubmissionOutcome, SubmissionError> {
        view.reset(STATUS_SAMPLE);
        let response = match self.service.analyze_sample().await {
            Ok(response) => response,
            Err(err) => return Err(fail(&mut self.phase, err.into(), view)),
        };
        if !response.is_success() {
            let error = SubmissionError::Http {
                status: response.status,
                body: response.body,
            };
            return Err(fail(&mut self.phase, error, view));
        }
        self.render(&response.body, None, None, view).await
    }

    pub async fn fetch_report(&self, report: &ReportHandle) -> Result<Vec<u8>, AuxiliaryError> {
        self.service.download_report(report.path()).await
    }

    /// Upload and wait for the response while driving the progress display.
    /// Returns the response, the average learned from it, and when the
    /// progress display should disappear.
    async fn transfer<V: SubmissionView>(
        &mut self,
        selection: &RecordSelection,
        view: &mut V,
    ) -> Result<(ServiceResponse, Option<RunningAverage>, Instant), SubmissionError> {
        let mut estimator = ProgressEstimator::new(self.state.avg_proc_time, now());
        view.progress(&estimator.state());

        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut ticker = ProcessingTicker::idle();
        let request = self.service.analyze(selection.files(), tx);
        tokio::pin!(request);

        let result = loop {
            tokio::select! {
                biased;
                Some(event) = rx.recv() => {
                    on_transfer_event(event, &mut estimator, &mut ticker, self.tick, &mut self.phase, view);
                }
                _ = ticker.tick(), if ticker.is_running() => {
                    view.progress(&estimator.on_tick(now()));
                }
                result = &mut request => break result,
            }
        };
        while let Ok(event) = rx.try_recv() {
            on_transfer_event(event, &mut estimator, &mut ticker, self.tick, &mut self.phase, view);
        }
        drop(ticker);

        let response = match result {
            Ok(response) => response,
            Err(err) => {
                view.progress(&estimator.fail());
                view.hide_progress();
                return Err(fail(&mut self.phase, err.into(), view));
            }
        };

        let completion = estimator.finish(now());
        view.progress(&completion.state);
        let hide_at = Instant::now() + self.grace;
        if let Some(observed) = completion.observed {
            debug!(
                "response {} after {:.2}s of processing",
                response.status,
                observed.as_secs_f64()
            );
        }
        Ok((response, completion.learned, hide_at))
    }

    fn learn(&mut self, average: RunningAverage) {
        info!(
            "processing average {:.2}s -> {:.2}s",
            self.state.avg_proc_time.seconds(),
            average.seconds()
        );
        self.state.avg_proc_time = average;
        if let Err(err) = self.store.save(&self.state) {
            warn!("could not persist client state: {:#}", err);
        }
    }

    async fn render<V: SubmissionView>(
        &mut self,
        body: &[u8],
        record: Option<String>,
        hide_at: Option<Instant>,
        view: &mut V,
    ) -> Result<SubmissionOutcome, SubmissionError> {
        transition(&mut self.phase, SubmissionPhase::Rendering, view);
        let result = match AnalysisResult::from_slice(body) {
            Ok(result) => result,
            Err(err) => {
                if let Some(at) = hide_at {
                    sleep_until(at).await;
                    view.hide_progress();
                }
                return Err(fail(&mut self.phase, err.into(), view));
            }
        };

        let mismatched = result.hrv_schema_mismatches();
        if !mismatched.is_empty() {
            warn!(
                "HRV metrics differ from the first lead for: {}",
                mismatched.join(", ")
            );
        }
        let hrv_table = render_hrv_table(&result.hrv_metrics);
        let predictions_table = render_predictions_table(&result.predictions);
        view.status(STATUS_DONE);
        view.tables(&hrv_table, &predictions_table);

        let report = result.report_path.clone().map(ReportHandle::new);
        if let Some(report) = &report {
            view.report_available(report);
        }

        // The plot request runs while the progress display lingers.
        let service = &self.service;
        let plot_path = result.record_path.clone();
        let plot_request = async move {
            match plot_path {
                Some(path) => {
                    let fetched = service.plot(&path).await;
                    Some((path, fetched))
                }
                None => None,
            }
        };
        tokio::pin!(plot_request);

        let mut shown = None;
        if let Some(at) = hide_at {
            tokio::select! {
                fetched = &mut plot_request => {
                    shown = Some(show_plot(fetched, view));
                    sleep_until(at).await;
                }
                _ = sleep_until(at) => {}
            }
            view.hide_progress();
        }
        let plot = match shown {
            Some(plot) => plot,
            None => show_plot((&mut plot_request).await, view),
        };

        transition(&mut self.phase, SubmissionPhase::Idle, view);
        Ok(SubmissionOutcome {
            record,
            result,
            hrv_table,
            predictions_table,
            report,
            plot,
        })
    }
}

fn show_plot<V: SubmissionView>(
    fetched: Option<(String, Result<Vec<u8>, AuxiliaryError>)>,
    view: &mut V,
) -> Option<Vec<u8>> {
    match fetched? {
        (_, Ok(image)) => {
            view.plot(&image);
            Some(image)
        }
        (record_path, Err(err)) => {
            warn!("plot for {} unavailable: {}", record_path, err);
            None
        }
    }
}

fn on_transfer_event<V: SubmissionView>(
    event: TransferEvent,
    estimator: &mut ProgressEstimator,
    ticker: &mut ProcessingTicker,
    period: Duration,
    phase: &mut SubmissionPhase,
    view: &mut V,
) {
    match event {
        TransferEvent::Progress { loaded, total } => {
            view.progress(&estimator.on_upload_progress(loaded, total, now()));
        }
        TransferEvent::UploadFinished => {
            if ticker.is_running() {
                return;
            }
            debug!("upload finished; processing started");
            view.progress(&estimator.on_upload_complete(now()));
            transition(phase, SubmissionPhase::AwaitingProcessing, view);
            ticker.start(period);
        }
    }
}
