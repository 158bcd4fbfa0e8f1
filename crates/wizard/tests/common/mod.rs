//! Shared fakes for controller and session tests.
#![allow(dead_code)]

use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use dcut_client::api::ConverterApiError;
use dcut_client::messages::{CancelAck, DownloadedFile, SubmitAck};
use dcut_client::transport::{SubmitRequest, Transport};
use dcut_core::feature::FeatureType;
use dcut_core::form::FormSnapshot;
use dcut_core::lifecycle::JobState;
use dcut_core::status::{LabelMeta, PollResult};
use dcut_core::ticket::TicketIdProvider;
use dcut_core::types::TicketId;
use dcut_wizard::controller::JobController;
use dcut_wizard::presenter::{JobView, Presenter};
use dcut_wizard::schedule::PollTiming;

// ---------------------------------------------------------------------------
// Transport
// ---------------------------------------------------------------------------

/// Scripted transport. Each call pops the next queued result; when the
/// poll queue is empty the last successful status is repeated.
#[derive(Default)]
pub struct FakeTransport {
    submit_results: Mutex<VecDeque<Result<SubmitAck, ConverterApiError>>>,
    submit_delay: Mutex<Duration>,
    poll_results: Mutex<VecDeque<Result<PollResult, ConverterApiError>>>,
    last_poll: Mutex<Option<PollResult>>,
    poll_delay: Mutex<Duration>,
    cancel_results: Mutex<VecDeque<Result<CancelAck, ConverterApiError>>>,
    cancel_delay: Mutex<Duration>,
    retrieve_results: Mutex<VecDeque<Result<DownloadedFile, ConverterApiError>>>,
    retrieve_delay: Mutex<Duration>,

    pub submits: Mutex<Vec<SubmitRequest>>,
    pub polls: Mutex<Vec<String>>,
    pub cancels: Mutex<Vec<String>>,
    pub retrieves: Mutex<Vec<String>>,
}

impl FakeTransport {
    pub fn push_submit(&self, result: Result<SubmitAck, ConverterApiError>) {
        self.submit_results.lock().unwrap().push_back(result);
    }

    pub fn push_poll(&self, result: Result<PollResult, ConverterApiError>) {
        self.poll_results.lock().unwrap().push_back(result);
    }

    pub fn push_status(&self, state: JobState) {
        self.push_poll(Ok(status(state)));
    }

    pub fn push_cancel(&self, result: Result<CancelAck, ConverterApiError>) {
        self.cancel_results.lock().unwrap().push_back(result);
    }

    pub fn push_retrieve(&self, result: Result<DownloadedFile, ConverterApiError>) {
        self.retrieve_results.lock().unwrap().push_back(result);
    }

    pub fn set_submit_delay(&self, delay: Duration) {
        *self.submit_delay.lock().unwrap() = delay;
    }

    pub fn set_poll_delay(&self, delay: Duration) {
        *self.poll_delay.lock().unwrap() = delay;
    }

    pub fn set_cancel_delay(&self, delay: Duration) {
        *self.cancel_delay.lock().unwrap() = delay;
    }

    pub fn set_retrieve_delay(&self, delay: Duration) {
        *self.retrieve_delay.lock().unwrap() = delay;
    }

    pub fn submitted(&self) -> Vec<SubmitRequest> {
        self.submits.lock().unwrap().clone()
    }

    pub fn polled(&self) -> Vec<String> {
        self.polls.lock().unwrap().clone()
    }

    pub fn poll_count_for(&self, ticket_id: &str) -> usize {
        self.polls.lock().unwrap().iter().filter(|id| *id == ticket_id).count()
    }

    pub fn cancelled(&self) -> Vec<String> {
        self.cancels.lock().unwrap().clone()
    }

    pub fn retrieved(&self) -> Vec<String> {
        self.retrieves.lock().unwrap().clone()
    }
}

#[async_trait]
impl Transport for FakeTransport {
    async fn submit(&self, request: &SubmitRequest) -> Result<SubmitAck, ConverterApiError> {
        self.submits.lock().unwrap().push(request.clone());
        let next = self.submit_results.lock().unwrap().pop_front();
        sleep_for(&self.submit_delay).await;
        next.unwrap_or_else(|| {
            Ok(SubmitAck {
                message: Some("Upload successful".into()),
                state: Some(JobState::Uploaded),
                bytes_received: Some(1024),
            })
        })
    }

    async fn poll(&self, ticket_id: &str) -> Result<PollResult, ConverterApiError> {
        self.polls.lock().unwrap().push(ticket_id.to_string());
        let next = self.poll_results.lock().unwrap().pop_front();
        sleep_for(&self.poll_delay).await;
        match next {
            Some(Ok(result)) => {
                *self.last_poll.lock().unwrap() = Some(result.clone());
                Ok(result)
            }
            Some(Err(e)) => Err(e),
            None => Ok(self
                .last_poll
                .lock()
                .unwrap()
                .clone()
                .unwrap_or_else(|| status(JobState::ProcessingDataset))),
        }
    }

    async fn cancel(&self, ticket_id: &str) -> Result<CancelAck, ConverterApiError> {
        self.cancels.lock().unwrap().push(ticket_id.to_string());
        let next = self.cancel_results.lock().unwrap().pop_front();
        sleep_for(&self.cancel_delay).await;
        next.unwrap_or_else(|| {
            Ok(CancelAck {
                message: Some("Ticket cancelled.".into()),
                state: Some(JobState::Cancelled),
            })
        })
    }

    async fn retrieve_result(&self, ticket_id: &str) -> Result<DownloadedFile, ConverterApiError> {
        self.retrieves.lock().unwrap().push(ticket_id.to_string());
        let next = self.retrieve_results.lock().unwrap().pop_front();
        sleep_for(&self.retrieve_delay).await;
        next.unwrap_or_else(|| {
            Ok(DownloadedFile {
                file_name: format!("{ticket_id}_output.zip"),
                bytes: b"PK\x03\x04".to_vec(),
            })
        })
    }
}

async fn sleep_for(delay: &Mutex<Duration>) {
    let delay = *delay.lock().unwrap();
    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }
}

// ---------------------------------------------------------------------------
// Presenter
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Render(JobView),
    InputsEnabled(bool),
    Log(String),
    ClearLog,
    Error(String),
    LabelMeta(LabelMeta),
    Save(String),
}

/// Presenter that records every call. Saving never touches the disk.
#[derive(Default)]
pub struct RecordingPresenter {
    calls: Mutex<Vec<Call>>,
    fail_saves: AtomicBool,
}

impl RecordingPresenter {
    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn errors(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Error(m) => Some(m),
                _ => None,
            })
            .collect()
    }

    pub fn label_meta_shown(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, Call::LabelMeta(_)))
            .count()
    }

    pub fn inputs_enabled(&self) -> Option<bool> {
        self.calls().into_iter().rev().find_map(|c| match c {
            Call::InputsEnabled(enabled) => Some(enabled),
            _ => None,
        })
    }

    /// Log lines appended since the last clear.
    pub fn log(&self) -> Vec<String> {
        let calls = self.calls();
        let start = calls
            .iter()
            .rposition(|c| *c == Call::ClearLog)
            .map(|i| i + 1)
            .unwrap_or(0);
        calls[start..]
            .iter()
            .filter_map(|c| match c {
                Call::Log(line) => Some(line.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn last_render(&self) -> Option<JobView> {
        self.calls().into_iter().rev().find_map(|c| match c {
            Call::Render(view) => Some(view),
            _ => None,
        })
    }

    pub fn fail_saves(&self) {
        self.fail_saves.store(true, Ordering::SeqCst);
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }
}

impl Presenter for RecordingPresenter {
    fn render(&self, view: &JobView) {
        self.record(Call::Render(view.clone()));
    }

    fn set_inputs_enabled(&self, enabled: bool) {
        self.record(Call::InputsEnabled(enabled));
    }

    fn append_log(&self, line: &str) {
        self.record(Call::Log(line.to_string()));
    }

    fn clear_log(&self) {
        self.record(Call::ClearLog);
    }

    fn show_error(&self, message: &str) {
        self.record(Call::Error(message.to_string()));
    }

    fn show_label_meta(&self, meta: &LabelMeta) {
        self.record(Call::LabelMeta(meta.clone()));
    }

    fn save_result(&self, file: &DownloadedFile) -> std::io::Result<PathBuf> {
        if self.fail_saves.load(Ordering::SeqCst) {
            return Err(std::io::Error::new(
                std::io::ErrorKind::PermissionDenied,
                "read-only directory",
            ));
        }
        self.record(Call::Save(file.file_name.clone()));
        Ok(PathBuf::from("/downloads").join(&file.file_name))
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Tickets `ticket-1`, `ticket-2`, ...
#[derive(Default)]
pub struct SequentialIds(AtomicUsize);

impl TicketIdProvider for SequentialIds {
    fn next_id(&self) -> TicketId {
        format!("ticket-{}", self.0.fetch_add(1, Ordering::SeqCst) + 1)
    }
}

pub struct Harness {
    pub controller: JobController,
    pub transport: Arc<FakeTransport>,
    pub presenter: Arc<RecordingPresenter>,
}

/// Controller wired to fakes, polling after 500ms and then every second.
pub fn harness() -> Harness {
    let transport = Arc::new(FakeTransport::default());
    let presenter = Arc::new(RecordingPresenter::default());
    let controller = JobController::new(
        transport.clone(),
        presenter.clone(),
        Arc::new(SequentialIds::default()),
        PollTiming::default(),
    );
    Harness {
        controller,
        transport,
        presenter,
    }
}

pub fn form(feature: FeatureType, target_format: &str) -> FormSnapshot {
    FormSnapshot {
        file: Some(PathBuf::from("dataset.zip")),
        input_format: "cvat_images_1_1".into(),
        target_format: target_format.into(),
        feature_type: Some(feature),
        feature_params: None,
    }
}

pub fn status(state: JobState) -> PollResult {
    PollResult {
        state,
        ..Default::default()
    }
}

pub fn api_error(status: u16, message: &str) -> ConverterApiError {
    ConverterApiError::ApiError {
        status,
        message: message.into(),
    }
}

/// Advance the paused clock, letting spawned poll tasks run.
pub async fn advance(ms: u64) {
    tokio::time::sleep(Duration::from_millis(ms)).await;
}
