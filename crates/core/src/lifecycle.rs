//! Job lifecycle states and the primary-action affordance each one maps to.
//!
//! `idle` and `uploading` are client-only; every other state is reported by
//! the conversion service through the status endpoint. A missing or
//! unrecognised state string maps to [`JobState::Unknown`], which is
//! terminal.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

// ---------------------------------------------------------------------------
// Job state
// ---------------------------------------------------------------------------

/// Client-observed lifecycle state of a job.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    #[default]
    Idle,
    Uploading,
    Uploaded,
    ExtractingLabelMeta,
    LabelsMetaExtracted,
    ProcessingDataset,
    Ready,
    Error,
    Cancelled,
    Unknown,
}

impl JobState {
    /// Parse a state string strictly.
    pub fn from_str_wire(s: &str) -> Result<Self, CoreError> {
        match s {
            "idle" => Ok(Self::Idle),
            "uploading" => Ok(Self::Uploading),
            "uploaded" => Ok(Self::Uploaded),
            "extracting_label_meta" => Ok(Self::ExtractingLabelMeta),
            "labels_meta_extracted" => Ok(Self::LabelsMetaExtracted),
            "processing_dataset" => Ok(Self::ProcessingDataset),
            "ready" => Ok(Self::Ready),
            "error" => Ok(Self::Error),
            "cancelled" => Ok(Self::Cancelled),
            "unknown" => Ok(Self::Unknown),
            _ => Err(CoreError::Validation(format!(
                "Invalid job state '{s}'"
            ))),
        }
    }

    /// Map a state reported by the service, treating anything absent,
    /// unrecognised or client-only as [`JobState::Unknown`].
    pub fn from_reported(s: Option<&str>) -> Self {
        s.map(str::trim)
            .and_then(|s| Self::from_str_wire(s).ok())
            .filter(|state| !state.is_client_only())
            .unwrap_or(Self::Unknown)
    }

    /// States only the client enters; the service never owns a job in them.
    pub fn is_client_only(&self) -> bool {
        matches!(self, Self::Idle | Self::Uploading)
    }

    /// Wire representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Uploading => "uploading",
            Self::Uploaded => "uploaded",
            Self::ExtractingLabelMeta => "extracting_label_meta",
            Self::LabelsMetaExtracted => "labels_meta_extracted",
            Self::ProcessingDataset => "processing_dataset",
            Self::Ready => "ready",
            Self::Error => "error",
            Self::Cancelled => "cancelled",
            Self::Unknown => "unknown",
        }
    }

    /// Server-side processing after the upload has been acknowledged.
    /// These are the only states in which a job can be cancelled.
    pub fn is_processing(&self) -> bool {
        matches!(
            self,
            Self::Uploaded
                | Self::ExtractingLabelMeta
                | Self::LabelsMetaExtracted
                | Self::ProcessingDataset
        )
    }

    /// States that end the poll loop.
    pub fn is_terminal_failure(&self) -> bool {
        matches!(self, Self::Error | Self::Cancelled | Self::Unknown)
    }

    /// States from which the only user action is reset or download.
    pub fn is_terminal(&self) -> bool {
        self.is_terminal_failure() || *self == Self::Ready
    }

    /// The single primary action offered to the user in this state.
    pub fn affordance(&self) -> Affordance {
        match self {
            Self::Idle => Affordance::Submit,
            Self::Uploading => Affordance::Disabled,
            Self::Ready => Affordance::Download,
            s if s.is_terminal_failure() => Affordance::Reset,
            _ => Affordance::Cancel,
        }
    }

    /// Short human-readable label.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Idle => "Idle",
            Self::Uploading => "Uploading",
            Self::Uploaded => "Uploaded",
            Self::ExtractingLabelMeta => "Extracting label metadata",
            Self::LabelsMetaExtracted => "Label metadata extracted",
            Self::ProcessingDataset => "Processing dataset",
            Self::Ready => "Ready for download",
            Self::Error => "Error",
            Self::Cancelled => "Cancelled",
            Self::Unknown => "Unknown",
        }
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Affordance
// ---------------------------------------------------------------------------

/// What the primary action control does in a given state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Affordance {
    Submit,
    Disabled,
    Cancel,
    Download,
    Reset,
}

impl Affordance {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Submit => "Upload & process",
            Self::Disabled => "Uploading…",
            Self::Cancel => "Cancel",
            Self::Download => "Download",
            Self::Reset => "Start over",
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
