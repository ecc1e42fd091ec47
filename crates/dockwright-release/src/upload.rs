//! Findings store upload.
//!
//! POSTs the SARIF document with bearer-token authentication. A failed
//! upload never affects the scan result or the written report.

use secrecy::{ExposeSecret, SecretString};

use crate::sarif::SarifLog;

pub struct FindingsUploader {
    client: reqwest::Client,
    url: reqwest::Url,
    token: Option<SecretString>,
}

impl FindingsUploader {
    pub fn new(url: &str, token: Option<SecretString>) -> Result<Self, UploadError> {
        let url = reqwest::Url::parse(url).map_err(|e| UploadError::InvalidUrl {
            url: url.to_owned(),
            source: e,
        })?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(UploadError::UnsupportedScheme(url.scheme().to_owned()));
        }
        Ok(Self {
            client: reqwest::Client::new(),
            url,
            token,
        })
    }

    pub async fn upload(&self, log: &SarifLog) -> Result<(), UploadError> {
        let mut request = self
            .client
            .post(self.url.clone())
            .header(reqwest::header::CONTENT_TYPE, "application/sarif+json")
            .body(serde_json::to_vec(log)?);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token.expose_secret());
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = match response.text().await {
                Ok(body) => body,
                Err(e) => {
                    tracing::debug!(error = %e, "could not read rejection body");
                    String::new()
                }
            };
            return Err(UploadError::Rejected {
                status: status.as_u16(),
                body: body.chars().take(512).collect(),
            });
        }
        tracing::info!(url = %self.url, status = status.as_u16(), "uploaded scan findings");
        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    #[error("invalid upload URL '{url}'")]
    InvalidUrl {
        url: String,
        source: url::ParseError,
    },
    #[error("upload URL scheme '{0}' is not http or https")]
    UnsupportedScheme(String),
    #[error("failed to encode findings")]
    Encode(#[from] serde_json::Error),
    #[error("upload request failed")]
    Request(#[from] reqwest::Error),
    #[error("findings store rejected upload with status {status}: {body}")]
    Rejected { status: u16, body: String },
}
