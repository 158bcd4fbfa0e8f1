//! Drives a single job from submit to download for the `dcut` binary.

use std::future::Future;
use std::path::PathBuf;
use std::process::ExitCode;

use tokio::sync::broadcast::error::RecvError;

use dcut_core::form::FormSnapshot;
use dcut_core::lifecycle::JobState;
use dcut_core::types::TicketId;

use crate::controller::{ControllerError, JobController};
use crate::events::JobEvent;

/// How a session ended.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionOutcome {
    /// The result was downloaded and saved.
    Saved(PathBuf),
    /// The result is ready on the server and was not downloaded.
    LeftOnServer(TicketId),
    /// The job ended in `error`, `cancelled` or `unknown`.
    Failed {
        state: JobState,
        message: Option<String>,
    },
    /// The user interrupted a processing job and it was cancelled.
    Cancelled,
    /// The user interrupted before the job could be cancelled.
    Interrupted,
}

impl SessionOutcome {
    pub fn exit_code(&self) -> ExitCode {
        match self {
            Self::Saved(_) | Self::LeftOnServer(_) => ExitCode::SUCCESS,
            Self::Failed { .. } | Self::Cancelled => ExitCode::FAILURE,
            Self::Interrupted => ExitCode::from(130),
        }
    }
}

/// Submit `form` and follow the job until it finishes or `shutdown`
/// resolves.
///
/// With `auto_download` the result is fetched as soon as the job is
/// ready. Without it the job keeps polling until `shutdown`. A shutdown
/// while the service is processing cancels the job.
pub async fn run_session<S>(
    controller: &JobController,
    form: &FormSnapshot,
    auto_download: bool,
    shutdown: S,
) -> Result<SessionOutcome, ControllerError>
where
    S: Future<Output = ()>,
{
    let mut events = controller.subscribe();
    tokio::pin!(shutdown);

    let ticket_id = tokio::select! {
        result = controller.submit(form) => result?,
        _ = &mut shutdown => {
            tracing::info!("Interrupted during upload");
            controller.shutdown().await;
            return Ok(SessionOutcome::Interrupted);
        }
    };

    let mut waiting_for_ctrl_c = false;

    loop {
        let event = tokio::select! {
            event = events.recv() => event,
            _ = &mut shutdown => return interrupt(controller, ticket_id).await,
        };

        let state = match event {
            Ok(JobEvent::StateChanged { ticket_id: id, to, .. }) if id == ticket_id => to,
            Ok(_) => continue,
            Err(RecvError::Lagged(skipped)) => {
                tracing::debug!(skipped, "Event receiver lagged");
                controller.view().await.state
            }
            Err(RecvError::Closed) => return Ok(SessionOutcome::Interrupted),
        };

        if state.is_terminal_failure() {
            let message = controller.view().await.message;
            return Ok(SessionOutcome::Failed { state, message });
        }

        if state == JobState::Ready {
            if !auto_download {
                if !waiting_for_ctrl_c {
                    waiting_for_ctrl_c = true;
                    tracing::info!(ticket_id = %ticket_id, "Result ready; press Ctrl-C to stop");
                }
                continue;
            }
            return match controller.download().await {
                Ok(path) => Ok(SessionOutcome::Saved(path)),
                Err(e) => {
                    controller.shutdown().await;
                    Err(e)
                }
            };
        }
    }
}

async fn interrupt(
    controller: &JobController,
    ticket_id: TicketId,
) -> Result<SessionOutcome, ControllerError> {
    let state = controller.view().await.state;
    tracing::info!(ticket_id = %ticket_id, state = %state, "Interrupted");

    if state.is_processing() {
        controller.cancel().await?;
        return Ok(SessionOutcome::Cancelled);
    }

    controller.shutdown().await;
    if state == JobState::Ready {
        Ok(SessionOutcome::LeftOnServer(ticket_id))
    } else {
        Ok(SessionOutcome::Interrupted)
    }
}
