//! Presentation seam between the job controller and whatever shows it.
//!
//! The controller never formats output itself; it hands a [`JobView`] and
//! individual notices to a [`Presenter`]. [`TerminalPresenter`] is the
//! implementation used by the `dcut` binary.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use dcut_client::messages::DownloadedFile;
use dcut_core::lifecycle::{Affordance, JobState};
use dcut_core::status::LabelMeta;
use dcut_core::types::TicketId;

/// Snapshot of the active job, as the user should see it.
#[derive(Debug, Clone, PartialEq)]
pub struct JobView {
    pub ticket_id: Option<TicketId>,
    pub state: JobState,
    pub affordance: Affordance,
    /// Fraction in `0.0..=1.0`, when the service reported one.
    pub progress: Option<f64>,
    /// Last message from the service or the controller.
    pub message: Option<String>,
}

impl JobView {
    /// The view with no job.
    pub fn idle() -> Self {
        Self {
            ticket_id: None,
            state: JobState::Idle,
            affordance: JobState::Idle.affordance(),
            progress: None,
            message: None,
        }
    }

    /// Progress as a whole percentage, for display.
    pub fn percent(&self) -> Option<u8> {
        self.progress.map(|p| (p.clamp(0.0, 1.0) * 100.0).round() as u8)
    }
}

/// Everything the controller needs from the user-facing side.
///
/// Calls are synchronous and must not block for long; they are made while
/// the controller holds its state lock.
pub trait Presenter: Send + Sync {
    /// Show the current state, progress and primary action.
    fn render(&self, view: &JobView);

    /// Enable or disable the form inputs.
    fn set_inputs_enabled(&self, enabled: bool);

    /// Append a line to the transient job log.
    fn append_log(&self, line: &str);

    /// Clear the transient job log.
    fn clear_log(&self);

    /// Surface an error message to the user.
    fn show_error(&self, message: &str);

    /// Show label metadata extracted from the dataset.
    fn show_label_meta(&self, meta: &LabelMeta);

    /// Persist a downloaded result and return where it was written.
    fn save_result(&self, file: &DownloadedFile) -> io::Result<PathBuf>;
}

/// Presenter writing to stdout/stderr and saving results into a directory.
#[derive(Debug)]
pub struct TerminalPresenter {
    download_dir: PathBuf,
    log: Mutex<Vec<String>>,
}

impl TerminalPresenter {
    pub fn new(download_dir: PathBuf) -> Self {
        Self {
            download_dir,
            log: Mutex::new(Vec::new()),
        }
    }

    pub fn download_dir(&self) -> &Path {
        &self.download_dir
    }

    /// Lines appended since the last [`Presenter::clear_log`].
    pub fn log_lines(&self) -> Vec<String> {
        self.log.lock().map(|log| log.clone()).unwrap_or_default()
    }
}

impl Presenter for TerminalPresenter {
    fn render(&self, view: &JobView) {
        let progress = view
            .percent()
            .map(|p| format!(" {p:>3}%"))
            .unwrap_or_default();
        println!(
            "[{}]{progress}  next: {}",
            view.state.label(),
            view.affordance.label()
        );
    }

    fn set_inputs_enabled(&self, enabled: bool) {
        tracing::debug!(enabled, "Form inputs toggled");
    }

    fn append_log(&self, line: &str) {
        let stamped = format!("{} {line}", chrono::Local::now().format("%H:%M:%S"));
        println!("{stamped}");
        if let Ok(mut log) = self.log.lock() {
            log.push(stamped);
        }
    }

    fn clear_log(&self) {
        if let Ok(mut log) = self.log.lock() {
            log.clear();
        }
    }

    fn show_error(&self, message: &str) {
        eprintln!("error: {message}");
    }

    fn show_label_meta(&self, meta: &LabelMeta) {
        println!("Labels: {}", meta.summary());
    }

    fn save_result(&self, file: &DownloadedFile) -> io::Result<PathBuf> {
        std::fs::create_dir_all(&self.download_dir)?;
        let path = unique_path(&self.download_dir, &file.file_name);
        std::fs::write(&path, &file.bytes)?;
        Ok(path)
    }
}

/// `dir/name`, or `dir/stem (n).ext` for the first `n` that does not exist.
fn unique_path(dir: &Path, file_name: &str) -> PathBuf {
    let candidate = dir.join(file_name);
    if !candidate.exists() {
        return candidate;
    }

    let name = Path::new(file_name);
    let stem = name
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| file_name.to_string());
    let ext = name
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();

    (1..)
        .map(|n| dir.join(format!("{stem} ({n}){ext}")))
        .find(|p| !p.exists())
        .unwrap_or(candidate)
}
