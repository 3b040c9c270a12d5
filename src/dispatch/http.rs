use super::{AttemptError, Uploader};
use crate::artifact::Artifact;
use crate::config::TargetConfig;
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use std::time::Duration;

/// Multipart POST of the artifact to a fixed endpoint.
pub struct HttpUploader {
    client: Client,
    endpoint: String,
    field_name: String,
}

impl HttpUploader {
    /// `timeout` of `None` leaves attempts unbounded; a hung request hangs its attempt.
    pub fn new(
        endpoint: impl Into<String>,
        field_name: impl Into<String>,
        timeout: Option<Duration>,
    ) -> Result<Self, reqwest::Error> {
        let mut builder = Client::builder();
        if let Some(t) = timeout {
            builder = builder.timeout(t);
        }
        Ok(Self {
            client: builder.build()?,
            endpoint: endpoint.into(),
            field_name: field_name.into(),
        })
    }

    pub fn from_config(target: &TargetConfig) -> Result<Self, reqwest::Error> {
        Self::new(
            target.endpoint.clone(),
            target.field_name.clone(),
            target.request_timeout_secs.map(Duration::from_secs),
        )
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait::async_trait]
impl Uploader for HttpUploader {
    async fn upload(&self, artifact: &Artifact) -> Result<serde_json::Value, AttemptError> {
        let part = Part::stream_with_length(artifact.bytes.clone(), artifact.len() as u64)
            .file_name(artifact.file_name.clone())
            .mime_str(&artifact.content_type)
            .map_err(|e| AttemptError::Transport(describe(&e)))?;
        let form = Form::new().part(self.field_name.clone(), part);

        let response = self
            .client
            .post(&self.endpoint)
            .multipart(form)
            .send()
            .await
            .map_err(|e| AttemptError::Transport(describe(&e)))?;

        let status = response.status();
        if !status.is_success() {
            // A body that cannot be read falls back to the status code message.
            let body = response.text().await.unwrap_or_default();
            return Err(AttemptError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| AttemptError::Transport(describe(&e)))?;
        serde_json::from_slice(&body).map_err(|e| AttemptError::Decode(format!("invalid JSON response: {}", e)))
    }
}

/// reqwest's top-level message plus its source chain (e.g. "... : Connection refused").
fn describe(err: &reqwest::Error) -> String {
    let mut msg = err.to_string();
    let mut source = std::error::Error::source(err);
    while let Some(cause) = source {
        msg.push_str(": ");
        msg.push_str(&cause.to_string());
        source = cause.source();
    }
    msg
}
