use ecga_lib::ValidationError;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Network-level failure: nothing is known about the server's view of the request.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("request failed: {0}")]
    Network(#[from] reqwest::Error),
    #[error("reading {} for upload: {source}", .path.display())]
    File { path: PathBuf, source: io::Error },
    #[error("connection interrupted: {0}")]
    Interrupted(String),
}

/// Terminal outcome of a submission. Display strings are the user-facing messages.
#[derive(Debug, Error)]
pub enum SubmissionError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("Error: {status}")]
    Http { status: u16, body: Vec<u8> },
    #[error("Network error.")]
    Transport(#[from] TransportError),
    #[error("Malformed response: {0}")]
    MalformedResponse(#[from] serde_json::Error),
}

impl SubmissionError {
    /// Body of a non-2xx response, lossily decoded.
    pub fn http_body(&self) -> Option<String> {
        match self {
            SubmissionError::Http { body, .. } => Some(String::from_utf8_lossy(body).into_owned()),
            _ => None,
        }
    }
}

/// Plot or report fetch failure; never terminal for a submission.
#[derive(Debug, Error)]
pub enum AuxiliaryError {
    #[error("server answered {0}")]
    Status(u16),
    #[error(transparent)]
    Transport(#[from] TransportError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_facing_messages() {
        let http = SubmissionError::Http {
            status: 400,
            body: b"{\"detail\":\"missing .hea\"}".to_vec(),
        };
        assert_eq!(http.to_string(), "Error: 400");
        assert_eq!(http.http_body().unwrap(), "{\"detail\":\"missing .hea\"}");

        let transport = SubmissionError::from(TransportError::Interrupted("reset".into()));
        assert_eq!(transport.to_string(), "Network error.");
        assert!(transport.http_body().is_none());

        let validation = SubmissionError::from(ValidationError::TooFewFiles { selected: 1 });
        assert!(validation.to_string().starts_with("Please select .dat + .hea files"));
    }

    #[test]
    fn auxiliary_status() {
        assert_eq!(AuxiliaryError::Status(404).to_string(), "server answered 404");
    }
}
