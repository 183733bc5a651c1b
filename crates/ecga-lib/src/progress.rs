use crate::format::format_eta;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{Duration, Instant};

/// Share of the bar owned by the upload phase; processing fills the rest.
pub const UPLOAD_SHARE: f64 = 50.0;
pub const DEFAULT_PROCESSING_SECS: f64 = 5.0;

/// Learned mean server-side processing time in seconds.
///
/// Blended once per successful submission: `avg' = (avg + observed) / 2`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunningAverage(f64);

impl RunningAverage {
    /// Unusable stored values (non-finite, zero, negative) fall back to the default.
    pub fn new(seconds: f64) -> Self {
        if seconds.is_finite() && seconds > 0.0 {
            Self(seconds)
        } else {
            Self::default()
        }
    }

    pub fn seconds(self) -> f64 {
        self.0
    }

    pub fn blend(self, observed_secs: f64) -> Self {
        Self((self.0 + observed_secs) / 2.0)
    }
}

impl Default for RunningAverage {
    fn default() -> Self {
        Self(DEFAULT_PROCESSING_SECS)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Uploading,
    Processing,
    Done,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub enum Eta {
    /// No transfer rate yet (nothing loaded or no time elapsed).
    Calculating,
    Remaining(f64),
}

impl fmt::Display for Eta {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Eta::Calculating => write!(f, "calculating…"),
            Eta::Remaining(secs) => write!(f, "{}", format_eta(secs.max(0.0))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ProgressState {
    pub phase: Phase,
    /// Overall completion in `[0, 100]`.
    pub percent: f64,
    pub eta: Eta,
}

impl ProgressState {
    pub fn percent_label(&self) -> String {
        format!("{:.1}%", self.percent)
    }

    pub fn eta_label(&self) -> String {
        format!("ETA: {}", self.eta)
    }
}

/// Outcome of [`ProgressEstimator::finish`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Completion {
    pub state: ProgressState,
    /// Time from processing start to response; `None` when the upload never
    /// signalled completion.
    pub observed: Option<Duration>,
    /// Prior average blended with `observed`. Only meaningful for a 2xx response;
    /// the caller decides whether to keep it.
    pub learned: Option<RunningAverage>,
}

/// Two-phase progress model for a single submission.
///
/// The upload phase is measured from byte counters and maps to `[0, 50]`. The
/// processing phase has no server signal and is synthesized from the learned
/// [`RunningAverage`], mapping to `[50, 100]` and stalling at 100 if the server
/// is slower than the average. The reported percentage never decreases.
#[derive(Debug, Clone)]
pub struct ProgressEstimator {
    average: RunningAverage,
    started_at: Instant,
    processing_started_at: Option<Instant>,
    current: ProgressState,
}

impl ProgressEstimator {
    pub fn new(average: RunningAverage, started_at: Instant) -> Self {
        Self {
            average,
            started_at,
            processing_started_at: None,
            current: ProgressState {
                phase: Phase::Uploading,
                percent: 0.0,
                eta: Eta::Calculating,
            },
        }
    }

    pub fn state(&self) -> ProgressState {
        self.current
    }

    pub fn phase(&self) -> Phase {
        self.current.phase
    }

    pub fn average(&self) -> RunningAverage {
        self.average
    }

    /// Byte-level transfer event. Ignored outside the upload phase or when the
    /// total is unknown.
    pub fn on_upload_progress(&mut self, loaded: u64, total: u64, now: Instant) -> ProgressState {
        if self.current.phase != Phase::Uploading || total == 0 {
            return self.current;
        }
        let loaded = loaded.min(total);
        let percent = loaded as f64 / total as f64 * UPLOAD_SHARE;
        let elapsed = now.saturating_duration_since(self.started_at).as_secs_f64();
        let eta = upload_eta(loaded, total, elapsed);
        self.advance(Phase::Uploading, percent, eta)
    }

    /// The transport finished sending the request body; server processing begins.
    pub fn on_upload_complete(&mut self, now: Instant) -> ProgressState {
        if self.current.phase != Phase::Uploading {
            return self.current;
        }
        self.processing_started_at = Some(now);
        let eta = Eta::Remaining(self.average.seconds());
        self.advance(Phase::Processing, UPLOAD_SHARE, eta)
    }

    /// Timer tick during processing.
    pub fn on_tick(&mut self, now: Instant) -> ProgressState {
        let Some(start) = self.processing_started_at else {
            return self.current;
        };
        if self.current.phase != Phase::Processing {
            return self.current;
        }
        let avg = self.average.seconds();
        let elapsed = now.saturating_duration_since(start).as_secs_f64();
        let fraction = (elapsed / avg).min(1.0);
        let percent = UPLOAD_SHARE + fraction * (100.0 - UPLOAD_SHARE);
        let eta = Eta::Remaining((avg - elapsed).max(0.0));
        self.advance(Phase::Processing, percent, eta)
    }

    /// A response arrived, whatever its status. Forces 100% and a zero ETA.
    pub fn finish(&mut self, now: Instant) -> Completion {
        self.current = ProgressState {
            phase: Phase::Done,
            percent: 100.0,
            eta: Eta::Remaining(0.0),
        };
        let observed = self
            .processing_started_at
            .map(|start| now.saturating_duration_since(start));
        let learned = observed.map(|d| self.average.blend(d.as_secs_f64()));
        Completion {
            state: self.current,
            observed,
            learned,
        }
    }

    /// Transport failure. The percentage stays where it was.
    pub fn fail(&mut self) -> ProgressState {
        self.current.phase = Phase::Failed;
        self.current
    }

    fn advance(&mut self, phase: Phase, percent: f64, eta: Eta) -> ProgressState {
        let percent = percent.clamp(0.0, 100.0).max(self.current.percent);
        self.current = ProgressState {
            phase,
            percent,
            eta,
        };
        self.current
    }
}

fn upload_eta(loaded: u64, total: u64, elapsed_secs: f64) -> Eta {
    if loaded == 0 || elapsed_secs <= 0.0 {
        return Eta::Calculating;
    }
    let rate = loaded as f64 / elapsed_secs;
    Eta::Remaining((total - loaded) as f64 / rate)
}
