//! The transport seam between the job controller and the service.

use async_trait::async_trait;

use dcut_core::form::ValidatedForm;
use dcut_core::status::PollResult;
use dcut_core::types::TicketId;

use crate::api::ConverterApiError;
use crate::messages::{CancelAck, DownloadedFile, SubmitAck};

/// Everything needed to start a job on the service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmitRequest {
    pub ticket_id: TicketId,
    pub form: ValidatedForm,
}

/// The four remote operations the controller relies on.
///
/// Every call fails fast: implementations must not retry internally.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Upload the dataset and declare what should be done with it.
    async fn submit(&self, request: &SubmitRequest) -> Result<SubmitAck, ConverterApiError>;

    /// Fetch the current status snapshot for a ticket.
    async fn poll(&self, ticket_id: &str) -> Result<PollResult, ConverterApiError>;

    /// Ask the service to abandon a ticket and delete its files.
    async fn cancel(&self, ticket_id: &str) -> Result<CancelAck, ConverterApiError>;

    /// Fetch the result archive of a ready ticket.
    async fn retrieve_result(&self, ticket_id: &str) -> Result<DownloadedFile, ConverterApiError>;
}
