pub mod config;
pub mod error;
pub mod http;
pub mod orchestrator;
pub mod service;
pub mod view;

pub use config::ClientConfig;
pub use error::{AuxiliaryError, SubmissionError, TransportError};
pub use http::HttpService;
pub use orchestrator::{Orchestrator, ReportHandle, SubmissionOutcome, SubmissionPhase};
pub use service::{AnalysisService, ServiceResponse, TransferEvent};
pub use view::SubmissionView;
