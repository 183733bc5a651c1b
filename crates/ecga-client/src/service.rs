use crate::error::{AuxiliaryError, TransportError};
use ecga_lib::SelectedFile;
use tokio::sync::mpsc::UnboundedSender;

/// Upload-side signals emitted while a request body is being sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferEvent {
    /// Cumulative bytes handed to the transport out of the body's total.
    Progress { loaded: u64, total: u64 },
    /// The body stream has been fully consumed; the server now owns the request.
    UploadFinished,
}

/// Status and raw body of an analysis response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

impl ServiceResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Remote analysis endpoints.
///
/// `analyze` reports upload progress through `events` and resolves once the
/// response has been read; an application error status is still `Ok`.
#[allow(async_fn_in_trait)]
pub trait AnalysisService {
    async fn analyze(
        &self,
        files: &[SelectedFile],
        events: UnboundedSender<TransferEvent>,
    ) -> Result<ServiceResponse, TransportError>;

    async fn analyze_sample(&self) -> Result<ServiceResponse, TransportError>;

    async fn plot(&self, record_path: &str) -> Result<Vec<u8>, AuxiliaryError>;

    async fn download_report(&self, path: &str) -> Result<Vec<u8>, AuxiliaryError>;
}
