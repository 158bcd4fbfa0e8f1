//! REST API client for the conversion service HTTP endpoints.
//!
//! Wraps the service's upload, status, cancel and download endpoints
//! using [`reqwest`], and normalizes every failure into a
//! [`ConverterApiError`].

use std::path::PathBuf;

use async_trait::async_trait;
use reqwest::header::CONTENT_DISPOSITION;
use reqwest::multipart::{Form, Part};
use reqwest::Body;
use tokio_util::io::ReaderStream;

use dcut_core::status::PollResult;

use crate::messages::{
    default_result_file_name, file_name_from_content_disposition, flatten_error_body,
    generic_status_message, CancelAck, CancelResponse, DownloadedFile, StatusResponse, SubmitAck,
    SubmitResponse,
};
use crate::transport::{SubmitRequest, Transport};

/// MIME type sent with the dataset archive.
const DATASET_MIME: &str = "application/zip";

/// HTTP client for a single conversion service instance.
#[derive(Debug, Clone)]
pub struct ConverterApi {
    client: reqwest::Client,
    api_url: String,
}

/// Errors from the conversion service REST layer.
#[derive(Debug, thiserror::Error)]
pub enum ConverterApiError {
    /// No response was received (connection refused, DNS, TLS, timeout).
    #[error("Could not reach the conversion service: {0}")]
    Request(#[from] reqwest::Error),

    /// The service answered with a non-2xx status code.
    #[error("{message} (HTTP {status})")]
    ApiError {
        /// HTTP status code.
        status: u16,
        /// Flattened, human-readable message.
        message: String,
    },

    /// A 2xx response whose body could not be understood.
    #[error("Unexpected response from the conversion service: {0}")]
    Decode(String),

    /// The dataset file could not be read before uploading.
    #[error("Failed to read {}: {source}", path.display())]
    File {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl ConverterApiError {
    /// Message suitable for showing to the user as-is.
    pub fn user_message(&self) -> String {
        match self {
            Self::ApiError { message, .. } => message.clone(),
            other => other.to_string(),
        }
    }
}

impl ConverterApi {
    /// Create a new API client for a service instance.
    ///
    /// * `api_url` - Base HTTP URL, e.g. `http://127.0.0.1:6007`.
    pub fn new(api_url: String) -> Self {
        Self::with_client(reqwest::Client::new(), api_url)
    }

    /// Create an API client reusing an existing [`reqwest::Client`]
    /// (timeouts and proxies are configured on the client).
    pub fn with_client(client: reqwest::Client, api_url: String) -> Self {
        Self {
            client,
            api_url: api_url.trim_end_matches('/').to_string(),
        }
    }

    /// Base URL this client talks to, without a trailing slash.
    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    /// Upload a dataset archive.
    ///
    /// Sends a multipart `POST /upload` with the archive plus the ticket ID,
    /// formats, feature type and JSON-encoded feature parameters.
    pub async fn upload_dataset(
        &self,
        request: &SubmitRequest,
    ) -> Result<SubmitAck, ConverterApiError> {
        let form = &request.form;
        let file_error = |source| ConverterApiError::File {
            path: form.file.clone(),
            source,
        };
        let file = tokio::fs::File::open(&form.file).await.map_err(file_error)?;
        let size_bytes = file.metadata().await.map_err(file_error)?.len();
        let file_name = form
            .file
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "dataset.zip".to_string());

        tracing::debug!(
            ticket_id = %request.ticket_id,
            file_name = %file_name,
            size_bytes,
            "Uploading dataset",
        );

        let body = Body::wrap_stream(ReaderStream::new(file));
        let part = Part::stream_with_length(body, size_bytes)
            .file_name(file_name)
            .mime_str(DATASET_MIME)?;

        let multipart = Form::new()
            .text("session_id", request.ticket_id.clone())
            .text("input_format", form.input_format.clone())
            .text("target_format", form.target_format.clone())
            .text("feature_type", form.feature_type.as_str())
            .text("feature_params", form.feature_params.to_json())
            .part("file", part);

        let response = self
            .client
            .post(format!("{}/upload", self.api_url))
            .multipart(multipart)
            .send()
            .await?;

        let body: SubmitResponse = Self::parse_response(response).await?;
        Ok(body.into())
    }

    /// Fetch the status snapshot for a ticket via `GET /status`.
    pub async fn get_status(&self, ticket_id: &str) -> Result<PollResult, ConverterApiError> {
        let response = self
            .client
            .get(format!("{}/status", self.api_url))
            .query(&[("ticket_id", ticket_id)])
            .send()
            .await?;

        let body: StatusResponse = Self::parse_response(response).await?;
        Ok(body.into_poll_result())
    }

    /// Cancel a ticket via `POST /cancel`.
    ///
    /// The ticket ID is sent form-encoded and repeated in the query string,
    /// which the service reads it from.
    pub async fn cancel_ticket(&self, ticket_id: &str) -> Result<CancelAck, ConverterApiError> {
        let response = self
            .client
            .post(format!("{}/cancel", self.api_url))
            .query(&[("ticket_id", ticket_id)])
            .form(&[("ticket_id", ticket_id)])
            .send()
            .await?;

        let body: CancelResponse = Self::parse_response(response).await?;
        Ok(body.into())
    }

    /// Download the result archive via `GET /download`.
    pub async fn download_result(
        &self,
        ticket_id: &str,
    ) -> Result<DownloadedFile, ConverterApiError> {
        let response = self
            .client
            .get(format!("{}/download", self.api_url))
            .query(&[("ticket_id", ticket_id)])
            .send()
            .await?;

        let response = Self::ensure_success(response).await?;

        let file_name = response
            .headers()
            .get(CONTENT_DISPOSITION)
            .and_then(|v| v.to_str().ok())
            .and_then(file_name_from_content_disposition)
            .unwrap_or_else(|| default_result_file_name(ticket_id));

        let bytes = response.bytes().await?.to_vec();

        Ok(DownloadedFile { file_name, bytes })
    }

    // ---- private helpers ----

    /// Ensure the response has a success status code. Returns the
    /// response unchanged on success, or a [`ConverterApiError::ApiError`]
    /// carrying the flattened error payload on failure.
    async fn ensure_success(
        response: reqwest::Response,
    ) -> Result<reqwest::Response, ConverterApiError> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message =
                flatten_error_body(&body).unwrap_or_else(|| generic_status_message(status));
            tracing::warn!(status = status.as_u16(), message = %message, "Service returned an error");
            return Err(ConverterApiError::ApiError {
                status: status.as_u16(),
                message,
            });
        }
        Ok(response)
    }

    /// Parse a successful JSON response body into the expected type.
    async fn parse_response<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, ConverterApiError> {
        let response = Self::ensure_success(response).await?;
        let text = response.text().await?;
        serde_json::from_str(&text).map_err(|e| ConverterApiError::Decode(e.to_string()))
    }
}

#[async_trait]
impl Transport for ConverterApi {
    async fn submit(&self, request: &SubmitRequest) -> Result<SubmitAck, ConverterApiError> {
        self.upload_dataset(request).await
    }

    async fn poll(&self, ticket_id: &str) -> Result<PollResult, ConverterApiError> {
        self.get_status(ticket_id).await
    }

    async fn cancel(&self, ticket_id: &str) -> Result<CancelAck, ConverterApiError> {
        self.cancel_ticket(ticket_id).await
    }

    async fn retrieve_result(&self, ticket_id: &str) -> Result<DownloadedFile, ConverterApiError> {
        self.download_result(ticket_id).await
    }
}
