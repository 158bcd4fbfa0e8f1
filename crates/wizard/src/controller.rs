//! Job lifecycle controller.
//!
//! [`JobController`] owns the single active job: it validates and submits
//! the form, polls the service on a timer, and handles cancel, download and
//! reset. Every remote completion is matched against the ticket that was
//! active when the request went out; results for a replaced job are
//! dropped.
//!
//! State changes are pushed to the injected [`Presenter`] and broadcast as
//! [`JobEvent`]s. Call [`JobController::subscribe`] to receive them.

use std::ops::ControlFlow;
use std::path::PathBuf;
use std::sync::{Arc, Weak};

use tokio::sync::{broadcast, Mutex};

use dcut_client::api::ConverterApiError;
use dcut_client::transport::{SubmitRequest, Transport};
use dcut_core::error::CoreError;
use dcut_core::form::FormSnapshot;
use dcut_core::lifecycle::JobState;
use dcut_core::status::PollResult;
use dcut_core::ticket::TicketIdProvider;
use dcut_core::types::TicketId;

use crate::events::JobEvent;
use crate::presenter::{JobView, Presenter};
use crate::schedule::{schedule_repeating, PollTiming, ScheduledTask};

/// Broadcast channel capacity for job events.
const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Errors returned by controller actions.
///
/// Every error has already been surfaced through the presenter by the
/// time it is returned.
#[derive(Debug, thiserror::Error)]
pub enum ControllerError {
    #[error(transparent)]
    Validation(#[from] CoreError),

    #[error(transparent)]
    Transport(#[from] ConverterApiError),

    /// The action is not offered in the current state.
    #[error("Cannot {action} while the job is {state}")]
    InvalidAction {
        action: &'static str,
        state: JobState,
    },

    /// A newer job replaced this one before the request completed.
    #[error("Job {ticket_id} was replaced before the request completed")]
    Superseded { ticket_id: TicketId },

    #[error("Failed to save result: {0}")]
    Save(#[source] std::io::Error),
}

/// What a single poll did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    /// There is no active job.
    NoJob,
    /// The active job is not in a state the service can report on.
    Skipped(JobState),
    /// The job changed while the request was in flight; result dropped.
    Discarded,
    /// Result applied; polling continues.
    Continue(JobState),
    /// Result applied; the job reached a terminal failure state.
    Stopped(JobState),
}

/// Controls the lifecycle of one upload job at a time.
///
/// Cheap to clone; clones share the same job.
#[derive(Clone)]
pub struct JobController {
    shared: Arc<Shared>,
}

struct Shared {
    transport: Arc<dyn Transport>,
    presenter: Arc<dyn Presenter>,
    ids: Arc<dyn TicketIdProvider>,
    timing: PollTiming,
    state: Mutex<ControllerState>,
    event_tx: broadcast::Sender<JobEvent>,
}

#[derive(Default)]
struct ControllerState {
    job: Option<Job>,
    poller: Option<ScheduledTask>,
}

struct Job {
    ticket_id: TicketId,
    state: JobState,
    progress: Option<f64>,
    message: Option<String>,
    label_meta_shown: bool,
}

impl Job {
    fn new(ticket_id: TicketId) -> Self {
        Self {
            ticket_id,
            state: JobState::Uploading,
            progress: None,
            message: None,
            label_meta_shown: false,
        }
    }

    fn view(&self) -> JobView {
        JobView {
            ticket_id: Some(self.ticket_id.clone()),
            state: self.state,
            affordance: self.state.affordance(),
            progress: self.progress,
            message: self.message.clone(),
        }
    }

    /// One log line describing the current state.
    fn describe(&self) -> String {
        match self.progress {
            Some(p) => format!("{} ({:.0}%)", self.state.label(), p * 100.0),
            None => self.state.label().to_string(),
        }
    }
}

impl ControllerState {
    fn active_mut(&mut self, ticket_id: &str) -> Option<&mut Job> {
        self.job.as_mut().filter(|job| job.ticket_id == ticket_id)
    }

    fn is_active(&self, ticket_id: &str) -> bool {
        self.job.as_ref().is_some_and(|job| job.ticket_id == ticket_id)
    }

    fn current_state(&self) -> JobState {
        self.job.as_ref().map(|job| job.state).unwrap_or_default()
    }

    fn stop_polling(&mut self) {
        if let Some(poller) = self.poller.take() {
            poller.cancel();
        }
    }

    fn view(&self) -> JobView {
        self.job.as_ref().map(Job::view).unwrap_or_else(JobView::idle)
    }
}

impl JobController {
    /// Create an idle controller and render its initial view.
    pub fn new(
        transport: Arc<dyn Transport>,
        presenter: Arc<dyn Presenter>,
        ids: Arc<dyn TicketIdProvider>,
        timing: PollTiming,
    ) -> Self {
        let (event_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);

        presenter.set_inputs_enabled(true);
        presenter.render(&JobView::idle());

        Self {
            shared: Arc::new(Shared {
                transport,
                presenter,
                ids,
                timing,
                state: Mutex::new(ControllerState::default()),
                event_tx,
            }),
        }
    }

    /// Subscribe to job events.
    pub fn subscribe(&self) -> broadcast::Receiver<JobEvent> {
        self.shared.event_tx.subscribe()
    }

    /// Snapshot of the active job.
    pub async fn view(&self) -> JobView {
        self.shared.state.lock().await.view()
    }

    /// `true` while a poll loop is scheduled for the active job.
    pub async fn is_polling(&self) -> bool {
        let st = self.shared.state.lock().await;
        st.poller
            .as_ref()
            .is_some_and(|p| !p.is_cancelled() && !p.is_finished())
    }

    /// Stop polling without touching the job. Used on shutdown.
    pub async fn shutdown(&self) {
        self.shared.state.lock().await.stop_polling();
    }

    // -----------------------------------------------------------------------
    // Actions
    // -----------------------------------------------------------------------

    /// Validate the form and upload the dataset.
    ///
    /// Any previous job is discarded and its poll loop cancelled. On
    /// success the job adopts the state reported by the service (or
    /// `uploaded`) and polling starts. On failure the controller returns
    /// to idle.
    pub async fn submit(&self, snapshot: &FormSnapshot) -> Result<TicketId, ControllerError> {
        let form = match snapshot.validate() {
            Ok(form) => form,
            Err(e) => {
                let message = match &e {
                    CoreError::Validation(m) | CoreError::Config(m) => m.clone(),
                };
                tracing::warn!(error = %e, "Submit rejected");
                self.shared.presenter.show_error(&message);
                self.emit(JobEvent::Failed {
                    ticket_id: None,
                    message,
                });
                return Err(ControllerError::Validation(e));
            }
        };

        let ticket_id = self.shared.ids.next_id();
        {
            let mut st = self.shared.state.lock().await;
            st.stop_polling();
            let from = match st.job.take() {
                Some(previous) => {
                    tracing::info!(
                        previous = %previous.ticket_id,
                        state = %previous.state,
                        "Discarding previous job",
                    );
                    previous.state
                }
                None => JobState::Idle,
            };
            st.job = Some(Job::new(ticket_id.clone()));

            let presenter = &self.shared.presenter;
            presenter.set_inputs_enabled(false);
            presenter.clear_log();
            presenter.append_log(&format!("Uploading {}", form.file.display()));
            presenter.render(&st.view());
            self.emit(JobEvent::StateChanged {
                ticket_id: ticket_id.clone(),
                from,
                to: JobState::Uploading,
            });
        }

        tracing::info!(
            ticket_id = %ticket_id,
            feature_type = %form.feature_type,
            target_format = %form.target_format,
            file = %form.file.display(),
            "Submitting dataset",
        );

        let request = SubmitRequest {
            ticket_id: ticket_id.clone(),
            form,
        };
        let result = self.shared.transport.submit(&request).await;

        let mut st = self.shared.state.lock().await;
        if !st.is_active(&ticket_id) {
            tracing::debug!(ticket_id = %ticket_id, "Dropping upload result for replaced job");
            return Err(ControllerError::Superseded { ticket_id });
        }

        match result {
            Ok(ack) => {
                if let Some(message) = &ack.message {
                    self.shared.presenter.append_log(message);
                }
                let state = ack
                    .state
                    .filter(|s| !s.is_client_only())
                    .unwrap_or(JobState::Uploaded);
                if let Some(job) = st.active_mut(&ticket_id) {
                    job.message = ack.message;
                    self.set_state(job, state);
                }

                if state.is_terminal_failure() {
                    let message = st
                        .view()
                        .message
                        .unwrap_or_else(|| failure_message(state).to_string());
                    tracing::warn!(ticket_id = %ticket_id, state = %state, message = %message, "Upload rejected by service");
                    self.shared.presenter.show_error(&message);
                    self.shared.presenter.render(&st.view());
                    self.emit(JobEvent::Failed {
                        ticket_id: Some(ticket_id.clone()),
                        message,
                    });
                    return Ok(ticket_id);
                }

                st.poller = Some(self.start_polling(ticket_id.clone()));
                self.shared.presenter.render(&st.view());
                Ok(ticket_id)
            }
            Err(e) => {
                let message = e.user_message();
                tracing::error!(ticket_id = %ticket_id, error = %e, "Upload failed");
                self.reset_locked(&mut st);
                self.shared.presenter.show_error(&message);
                self.emit(JobEvent::Failed {
                    ticket_id: Some(ticket_id),
                    message,
                });
                Err(ControllerError::Transport(e))
            }
        }
    }

    /// Fetch and apply one status snapshot for the active job.
    ///
    /// Normally driven by the poll timer; calling it directly is harmless.
    pub async fn poll(&self) -> Result<PollOutcome, ControllerError> {
        self.poll_ticket(None).await
    }

    /// Cancel the active job on the service and return to idle.
    ///
    /// Only offered while the service is processing. The controller resets
    /// whether or not the service acknowledges the cancel.
    pub async fn cancel(&self) -> Result<(), ControllerError> {
        let ticket_id = {
            let mut st = self.shared.state.lock().await;
            let state = st.current_state();
            let Some(job) = st.job.as_ref().filter(|job| job.state.is_processing()) else {
                return Err(ControllerError::InvalidAction {
                    action: "cancel",
                    state,
                });
            };
            let ticket_id = job.ticket_id.clone();
            st.stop_polling();
            ticket_id
        };

        tracing::info!(ticket_id = %ticket_id, "Cancelling job");
        let result = self.shared.transport.cancel(&ticket_id).await;

        let mut st = self.shared.state.lock().await;
        if !st.is_active(&ticket_id) {
            tracing::debug!(ticket_id = %ticket_id, "Dropping cancel result for replaced job");
            return Err(ControllerError::Superseded { ticket_id });
        }
        self.reset_locked(&mut st);

        match result {
            Ok(ack) => {
                let message = ack.message.unwrap_or_else(|| "Job cancelled".to_string());
                tracing::info!(ticket_id = %ticket_id, message = %message, "Job cancelled");
                self.shared.presenter.append_log(&message);
                Ok(())
            }
            Err(e) => {
                let message = e.user_message();
                tracing::warn!(ticket_id = %ticket_id, error = %e, "Cancel request failed");
                self.shared
                    .presenter
                    .show_error(&format!("Cancel request failed: {message}"));
                self.emit(JobEvent::Failed {
                    ticket_id: Some(ticket_id),
                    message,
                });
                Err(ControllerError::Transport(e))
            }
        }
    }

    /// Retrieve and save the result of a ready job, then return to idle.
    ///
    /// If retrieval or saving fails the job stays `ready` and keeps
    /// polling, so the download can be retried.
    pub async fn download(&self) -> Result<PathBuf, ControllerError> {
        let ticket_id = {
            let st = self.shared.state.lock().await;
            match st.job.as_ref() {
                Some(job) if job.state == JobState::Ready => job.ticket_id.clone(),
                _ => {
                    return Err(ControllerError::InvalidAction {
                        action: "download",
                        state: st.current_state(),
                    })
                }
            }
        };

        tracing::info!(ticket_id = %ticket_id, "Downloading result");
        let file = match self.shared.transport.retrieve_result(&ticket_id).await {
            Ok(file) => file,
            Err(e) => {
                let message = e.user_message();
                tracing::warn!(ticket_id = %ticket_id, error = %e, "Download failed");
                let mut st = self.shared.state.lock().await;
                let Some(job) = st.active_mut(&ticket_id) else {
                    tracing::debug!(ticket_id = %ticket_id, "Dropping download failure for replaced job");
                    return Err(ControllerError::Superseded { ticket_id });
                };
                job.message = Some(message.clone());
                let presenter = &self.shared.presenter;
                presenter.show_error(&format!("Download failed: {message}"));
                presenter.render(&st.view());
                self.emit(JobEvent::Failed {
                    ticket_id: Some(ticket_id),
                    message,
                });
                return Err(ControllerError::Transport(e));
            }
        };

        if !self.shared.state.lock().await.is_active(&ticket_id) {
            tracing::debug!(ticket_id = %ticket_id, "Dropping download for replaced job");
            return Err(ControllerError::Superseded { ticket_id });
        }

        let saved = self.shared.presenter.save_result(&file);

        let mut st = self.shared.state.lock().await;
        match saved {
            Ok(path) => {
                tracing::info!(
                    ticket_id = %ticket_id,
                    path = %path.display(),
                    size_bytes = file.bytes.len(),
                    "Result saved",
                );
                if st.is_active(&ticket_id) {
                    self.reset_locked(&mut st);
                    self.shared
                        .presenter
                        .append_log(&format!("Saved result to {}", path.display()));
                }
                self.emit(JobEvent::Saved {
                    ticket_id,
                    path: path.clone(),
                });
                Ok(path)
            }
            Err(e) => {
                tracing::error!(ticket_id = %ticket_id, error = %e, "Failed to save result");
                let message = format!("Could not save {}: {e}", file.file_name);
                if st.is_active(&ticket_id) {
                    self.shared.presenter.show_error(&message);
                }
                self.emit(JobEvent::Failed {
                    ticket_id: Some(ticket_id),
                    message,
                });
                Err(ControllerError::Save(e))
            }
        }
    }

    /// Clear the job and return to idle. A no-op when already idle.
    pub async fn reset(&self) -> Result<(), ControllerError> {
        let mut st = self.shared.state.lock().await;
        let state = st.current_state();
        if st.job.is_none() {
            return Ok(());
        }
        if !state.is_terminal() {
            return Err(ControllerError::InvalidAction {
                action: "reset",
                state,
            });
        }
        self.reset_locked(&mut st);
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------------

    /// Poll the active job. With `expected` set, only poll if that ticket
    /// is still the active one.
    async fn poll_ticket(&self, expected: Option<&str>) -> Result<PollOutcome, ControllerError> {
        let ticket_id = {
            let st = self.shared.state.lock().await;
            let Some(job) = st.job.as_ref() else {
                return Ok(PollOutcome::NoJob);
            };
            if expected.is_some_and(|id| id != job.ticket_id) {
                return Ok(PollOutcome::Discarded);
            }
            if !(job.state.is_processing() || job.state == JobState::Ready) {
                return Ok(PollOutcome::Skipped(job.state));
            }
            job.ticket_id.clone()
        };

        let result = self.shared.transport.poll(&ticket_id).await;

        let mut st = self.shared.state.lock().await;
        let Some(job) = st.active_mut(&ticket_id) else {
            tracing::debug!(ticket_id = %ticket_id, "Dropping status for replaced job");
            return Ok(PollOutcome::Discarded);
        };

        match result {
            Err(e) => {
                let message = e.user_message();
                tracing::warn!(ticket_id = %ticket_id, error = %e, "Status poll failed");
                job.message = Some(message.clone());
                self.set_state(job, JobState::Error);
                st.stop_polling();

                let presenter = &self.shared.presenter;
                presenter.append_log(&format!("Status check failed: {message}"));
                presenter.show_error(&message);
                presenter.render(&st.view());
                self.emit(JobEvent::Failed {
                    ticket_id: Some(ticket_id),
                    message,
                });
                Err(ControllerError::Transport(e))
            }
            Ok(report) => {
                let reported_message = report.message.clone();
                let state = self.apply_report(job, report);
                if state.is_terminal_failure() {
                    let message =
                        reported_message.unwrap_or_else(|| failure_message(state).to_string());
                    job.message = Some(message.clone());
                    st.stop_polling();
                    tracing::warn!(ticket_id = %ticket_id, state = %state, message = %message, "Job ended");

                    self.shared.presenter.show_error(&message);
                    self.shared.presenter.render(&st.view());
                    self.emit(JobEvent::Failed {
                        ticket_id: Some(ticket_id),
                        message,
                    });
                    return Ok(PollOutcome::Stopped(state));
                }
                self.shared.presenter.render(&st.view());
                Ok(PollOutcome::Continue(state))
            }
        }
    }

    /// Merge a status snapshot into the job and return the new state.
    fn apply_report(&self, job: &mut Job, report: PollResult) -> JobState {
        let PollResult {
            state,
            progress,
            label_meta,
            message,
            ..
        } = report;

        let state = if state.is_client_only() {
            tracing::warn!(ticket_id = %job.ticket_id, reported = %state, "Service reported a client-only state");
            JobState::Unknown
        } else {
            state
        };

        let state_changed = job.state != state;
        let progress_changed = job.progress != progress;

        job.progress = progress;
        if message.is_some() {
            job.message = message;
        }

        if state_changed {
            self.set_state(job, state);
        } else if progress_changed {
            tracing::debug!(ticket_id = %job.ticket_id, progress = ?progress, "Job progress");
            if let Some(fraction) = progress {
                self.emit(JobEvent::Progress {
                    ticket_id: job.ticket_id.clone(),
                    fraction,
                });
            }
        }

        if state_changed || progress_changed {
            self.shared.presenter.append_log(&job.describe());
        }

        if let Some(meta) = label_meta {
            if !job.label_meta_shown {
                job.label_meta_shown = true;
                tracing::info!(
                    ticket_id = %job.ticket_id,
                    image_count = meta.image_count,
                    box_count = meta.box_count,
                    "Label metadata available",
                );
                self.shared.presenter.show_label_meta(&meta);
                self.emit(JobEvent::LabelMeta {
                    ticket_id: job.ticket_id.clone(),
                    meta,
                });
            }
        }

        state
    }

    fn set_state(&self, job: &mut Job, to: JobState) {
        if job.state == to {
            return;
        }
        let from = job.state;
        job.state = to;
        tracing::info!(ticket_id = %job.ticket_id, from = %from, to = %to, "Job state changed");
        self.emit(JobEvent::StateChanged {
            ticket_id: job.ticket_id.clone(),
            from,
            to,
        });
    }

    /// Schedule the poll loop for `ticket_id`. The loop holds only a weak
    /// reference to the controller and ends once the ticket is replaced.
    fn start_polling(&self, ticket_id: TicketId) -> ScheduledTask {
        let weak: Weak<Shared> = Arc::downgrade(&self.shared);
        let timing = self.shared.timing;

        schedule_repeating(timing.initial_delay, timing.interval, move || {
            let weak = weak.clone();
            let ticket_id = ticket_id.clone();
            async move {
                let Some(shared) = weak.upgrade() else {
                    return ControlFlow::Break(());
                };
                let controller = JobController { shared };
                match controller.poll_ticket(Some(ticket_id.as_str())).await {
                    Ok(PollOutcome::Continue(_)) => ControlFlow::Continue(()),
                    // Only a terminal job may end its own loop.
                    Ok(PollOutcome::Skipped(state)) if !state.is_terminal() => {
                        ControlFlow::Continue(())
                    }
                    _ => ControlFlow::Break(()),
                }
            }
        })
    }

    fn reset_locked(&self, st: &mut ControllerState) {
        st.stop_polling();
        if let Some(job) = st.job.take() {
            tracing::info!(ticket_id = %job.ticket_id, state = %job.state, "Job cleared");
        }

        let presenter = &self.shared.presenter;
        presenter.clear_log();
        presenter.set_inputs_enabled(true);
        presenter.render(&JobView::idle());
        self.emit(JobEvent::Reset);
    }

    fn emit(&self, event: JobEvent) {
        // No subscribers is fine.
        let _ = self.shared.event_tx.send(event);
    }
}

fn failure_message(state: JobState) -> &'static str {
    match state {
        JobState::Cancelled => "The job was cancelled on the server.",
        JobState::Unknown => "The server no longer recognises this job.",
        _ => "Processing failed.",
    }
}
