//! Point-in-time job snapshots reported by the status endpoint.

use serde::{Deserialize, Serialize};

use crate::lifecycle::JobState;

/// One poll response, interpreted. Created per poll and never persisted.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PollResult {
    pub state: JobState,
    /// Upload progress as a fraction in `0.0..=1.0`.
    pub progress: Option<f64>,
    pub bytes_received: Option<u64>,
    pub bytes_total: Option<u64>,
    pub label_meta: Option<LabelMeta>,
    /// Server message for the current state (error detail, notices).
    pub message: Option<String>,
}

/// Clamp a reported progress value into `0.0..=1.0`, dropping NaN.
pub fn normalize_progress(value: Option<f64>) -> Option<f64> {
    value
        .filter(|v| v.is_finite())
        .map(|v| v.clamp(0.0, 1.0))
}

/// Server-computed summary of the annotation contents.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct LabelMeta {
    #[serde(default)]
    pub image_count: u64,
    #[serde(default)]
    pub box_count: u64,
    #[serde(default)]
    pub labels: Vec<LabelCount>,
    #[serde(default)]
    pub original_width: Option<u32>,
    #[serde(default)]
    pub original_height: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelCount {
    pub name: String,
    #[serde(default)]
    pub count: u64,
}

impl LabelMeta {
    /// One-line description, e.g. `3 images, 7 boxes, 2 labels (car: 5, person: 2)`.
    pub fn summary(&self) -> String {
        let mut out = format!(
            "{} images, {} boxes, {} labels",
            self.image_count,
            self.box_count,
            self.labels.len()
        );
        if !self.labels.is_empty() {
            let per_label: Vec<String> = self
                .labels
                .iter()
                .map(|l| format!("{}: {}", l.name, l.count))
                .collect();
            out.push_str(&format!(" ({})", per_label.join(", ")));
        }
        if let (Some(w), Some(h)) = (self.original_width, self.original_height) {
            out.push_str(&format!(", original size {w}x{h}"));
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn progress_is_clamped() {
        assert_eq!(normalize_progress(Some(1.5)), Some(1.0));
        assert_eq!(normalize_progress(Some(-0.1)), Some(0.0));
        assert_eq!(normalize_progress(Some(f64::NAN)), None);
        assert_eq!(normalize_progress(None), None);
    }

    #[test]
    fn label_meta_tolerates_missing_fields() {
        let meta: LabelMeta = serde_json::from_value(json!({
            "image_count": 3,
            "labels": [{ "name": "car" }]
        }))
        .unwrap();
        assert_eq!(meta.image_count, 3);
        assert_eq!(meta.box_count, 0);
        assert_eq!(meta.labels[0].count, 0);
        assert_eq!(meta.original_width, None);
    }

    #[test]
    fn summary_lists_labels() {
        let meta = LabelMeta {
            image_count: 3,
            box_count: 7,
            labels: vec![
                LabelCount { name: "car".into(), count: 5 },
                LabelCount { name: "person".into(), count: 2 },
            ],
            original_width: Some(1920),
            original_height: Some(1080),
        };
        assert_eq!(
            meta.summary(),
            "3 images, 7 boxes, 2 labels (car: 5, person: 2), original size 1920x1080"
        );
    }
}
