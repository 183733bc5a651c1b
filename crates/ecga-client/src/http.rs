use crate::config::ClientConfig;
use crate::error::{AuxiliaryError, TransportError};
use crate::service::{AnalysisService, ServiceResponse, TransferEvent};
use ecga_lib::SelectedFile;
use futures_util::stream::{self, BoxStream, StreamExt};
use log::{debug, info};
use reqwest::multipart::{Form, Part};
use reqwest::{Body, Client};
use std::io;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedSender;

/// Multipart field repeated once per selected file.
pub const FILES_FIELD: &str = "files";
const UPLOAD_CHUNK: usize = 64 * 1024;

/// [`AnalysisService`] backed by the analysis server's HTTP API.
#[derive(Debug, Clone)]
pub struct HttpService {
    client: Client,
    base_url: String,
}

impl HttpService {
    pub fn new(config: &ClientConfig) -> Result<Self, TransportError> {
        let client = Client::builder()
            .connect_timeout(config.connect_timeout())
            .build()?;
        Ok(Self {
            client,
            base_url: config.server_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn fetch(&self, path: &str, query: &[(&str, &str)]) -> Result<Vec<u8>, AuxiliaryError> {
        let response = self
            .client
            .get(self.url(path))
            .query(query)
            .send()
            .await
            .map_err(TransportError::from)?;
        let status = response.status();
        if !status.is_success() {
            return Err(AuxiliaryError::Status(status.as_u16()));
        }
        let bytes = response.bytes().await.map_err(TransportError::from)?;
        Ok(bytes.to_vec())
    }
}

async fn read_response(response: reqwest::Response) -> Result<ServiceResponse, TransportError> {
    let status = response.status().as_u16();
    let body = response.bytes().await?.to_vec();
    debug!("response {} ({} bytes)", status, body.len());
    Ok(ServiceResponse { status, body })
}

type ChunkStream = BoxStream<'static, Result<Vec<u8>, io::Error>>;

/// Body of one part, reporting cumulative progress over the whole form.
/// The final part is followed by an empty chunk that announces the end of
/// the upload once the transport has pulled every preceding byte.
fn part_stream(
    bytes: Vec<u8>,
    loaded: Arc<AtomicU64>,
    total: u64,
    events: UnboundedSender<TransferEvent>,
    last: bool,
) -> ChunkStream {
    let chunks: Vec<Vec<u8>> = bytes.chunks(UPLOAD_CHUNK).map(<[u8]>::to_vec).collect();
    let progress = events.clone();
    let body = stream::iter(chunks).map(move |chunk| {
        let len = chunk.len() as u64;
        let sent = loaded.fetch_add(len, Ordering::Relaxed) + len;
        let _ = progress.send(TransferEvent::Progress {
            loaded: sent,
            total,
        });
        Ok::<_, io::Error>(chunk)
    });
    if !last {
        return body.boxed();
    }
    body.chain(stream::once(async move {
        let _ = events.send(TransferEvent::UploadFinished);
        Ok::<_, io::Error>(Vec::new())
    }))
    .boxed()
}

impl AnalysisService for HttpService {
    async fn analyze(
        &self,
        files: &[SelectedFile],
        events: UnboundedSender<TransferEvent>,
    ) -> Result<ServiceResponse, TransportError> {
        let mut contents = Vec::with_capacity(files.len());
        for file in files {
            let bytes = tokio::fs::read(&file.path)
                .await
                .map_err(|source| TransportError::File {
                    path: file.path.clone(),
                    source,
                })?;
            contents.push((file.name.clone(), bytes));
        }
        let total: u64 = contents.iter().map(|(_, b)| b.len() as u64).sum();
        info!("uploading {} files ({} bytes)", contents.len(), total);

        let loaded = Arc::new(AtomicU64::new(0));
        let last = contents.len().saturating_sub(1);
        let mut form = Form::new();
        for (index, (name, bytes)) in contents.into_iter().enumerate() {
            let len = bytes.len() as u64;
            let body = part_stream(bytes, Arc::clone(&loaded), total, events.clone(), index == last);
            let part = Part::stream_with_length(Body::wrap_stream(body), len).file_name(name);
            form = form.part(FILES_FIELD, part);
        }

        let response = self
            .client
            .post(self.url("/analyze"))
            .multipart(form)
            .send()
            .await?;
        read_response(response).await
    }

    async fn analyze_sample(&self) -> Result<ServiceResponse, TransportError> {
        let response = self.client.get(self.url("/analyze-sample")).send().await?;
        read_response(response).await
    }

    async fn plot(&self, record_path: &str) -> Result<Vec<u8>, AuxiliaryError> {
        self.fetch("/plot", &[("record_path", record_path)]).await
    }

    async fn download_report(&self, path: &str) -> Result<Vec<u8>, AuxiliaryError> {
        self.fetch("/download-report", &[("path", path)]).await
    }
}
