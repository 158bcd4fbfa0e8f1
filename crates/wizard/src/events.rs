//! Events broadcast by the job controller.
//!
//! Subscribers (the CLI driver, tests) receive these over a
//! `tokio::sync::broadcast` channel obtained from
//! [`JobController::subscribe`](crate::controller::JobController::subscribe).

use std::path::PathBuf;

use serde::Serialize;

use dcut_core::lifecycle::JobState;
use dcut_core::status::LabelMeta;
use dcut_core::types::TicketId;

/// A change in the lifecycle of the active job.
#[derive(Debug, Clone, Serialize)]
pub enum JobEvent {
    /// The job moved to a new lifecycle state.
    StateChanged {
        ticket_id: TicketId,
        from: JobState,
        to: JobState,
    },

    /// Progress changed without a state change.
    Progress {
        ticket_id: TicketId,
        /// Fraction in `0.0..=1.0`.
        fraction: f64,
    },

    /// Label metadata became available. Sent at most once per job.
    LabelMeta { ticket_id: TicketId, meta: LabelMeta },

    /// Something went wrong. `ticket_id` is `None` for local validation
    /// failures that never reached the service.
    Failed {
        ticket_id: Option<TicketId>,
        message: String,
    },

    /// The result archive was written to disk.
    Saved { ticket_id: TicketId, path: PathBuf },

    /// The controller returned to idle.
    Reset,
}
