//! Form snapshot validation.
//!
//! The presentation layer hands the controller a [`FormSnapshot`] of
//! whatever the user has filled in. [`FormSnapshot::validate`] turns it into
//! a [`ValidatedForm`] or a [`CoreError::Validation`] that is shown locally
//! and never sent to the service.

use std::path::PathBuf;

use serde::Serialize;

use crate::error::CoreError;
use crate::feature::{FeatureParameters, FeatureType};

/// Raw user input at the moment the submit action is triggered.
#[derive(Debug, Clone, Default)]
pub struct FormSnapshot {
    pub file: Option<PathBuf>,
    pub input_format: String,
    /// May be empty; only `crop_objects` accepts that.
    pub target_format: String,
    pub feature_type: Option<FeatureType>,
    /// Falls back to the feature's defaults when `None`.
    pub feature_params: Option<FeatureParameters>,
}

/// A form that passed validation and is ready to submit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedForm {
    pub file: PathBuf,
    pub input_format: String,
    /// Empty for `crop_objects`.
    pub target_format: String,
    pub feature_type: FeatureType,
    pub feature_params: FeatureParameters,
}

impl FormSnapshot {
    pub fn validate(&self) -> Result<ValidatedForm, CoreError> {
        let file = self
            .file
            .clone()
            .filter(|p| !p.as_os_str().is_empty())
            .ok_or_else(|| CoreError::Validation("Please select a ZIP file to upload".into()))?;

        let input_format = self.input_format.trim();
        if input_format.is_empty() {
            return Err(CoreError::Validation(
                "Please choose an input format".into(),
            ));
        }

        let feature_type = self
            .feature_type
            .ok_or_else(|| CoreError::Validation("Please choose a feature".into()))?;

        let target_format = if feature_type.requires_target_format() {
            let target = self.target_format.trim();
            if target.is_empty() {
                return Err(CoreError::Validation(format!(
                    "Please choose a target format for '{}'",
                    feature_type.label()
                )));
            }
            target.to_string()
        } else {
            String::new()
        };

        let feature_params = match &self.feature_params {
            Some(params) if params.feature_type() != feature_type => {
                return Err(CoreError::Validation(format!(
                    "Feature options for '{}' do not match the selected feature '{}'",
                    params.feature_type(),
                    feature_type
                )));
            }
            Some(params) => params.clone(),
            None => feature_type.default_params(),
        };
        feature_params.validate()?;

        Ok(ValidatedForm {
            file,
            input_format: input_format.to_string(),
            target_format,
            feature_type,
            feature_params,
        })
    }
}

// ---------------------------------------------------------------------------
// Conditional form sections
// ---------------------------------------------------------------------------

/// Form sections shown or hidden depending on the selected feature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FormSection {
    TargetFormat,
    ConvertOptions,
    ResizeOptions,
    CropOptions,
}

/// Sections visible for the currently selected feature.
pub fn visible_sections(feature_type: Option<FeatureType>) -> Vec<FormSection> {
    match feature_type {
        None => Vec::new(),
        Some(FeatureType::ConvertOnly) => {
            vec![FormSection::TargetFormat, FormSection::ConvertOptions]
        }
        Some(FeatureType::ResizeAndConvert) => {
            vec![FormSection::TargetFormat, FormSection::ResizeOptions]
        }
        Some(FeatureType::CropObjects) => vec![FormSection::CropOptions],
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feature::{CropParams, ResizeParams};

    fn base() -> FormSnapshot {
        FormSnapshot {
            file: Some(PathBuf::from("a.zip")),
            input_format: "cvat_images_1_1".into(),
            target_format: "yolo".into(),
            feature_type: Some(FeatureType::ConvertOnly),
            feature_params: None,
        }
    }

    #[test]
    fn complete_form_is_valid() {
        let form = base().validate().unwrap();
        assert_eq!(form.target_format, "yolo");
        assert_eq!(form.feature_type, FeatureType::ConvertOnly);
        assert_eq!(form.feature_params, FeatureType::ConvertOnly.default_params());
    }

    #[test]
    fn missing_file_fails() {
        let snapshot = FormSnapshot { file: None, ..base() };
        assert!(snapshot.validate().is_err());

        let empty = FormSnapshot { file: Some(PathBuf::new()), ..base() };
        assert!(empty.validate().is_err());
    }

    #[test]
    fn missing_input_format_fails() {
        let snapshot = FormSnapshot { input_format: "  ".into(), ..base() };
        assert!(snapshot.validate().is_err());
    }

    #[test]
    fn missing_feature_type_fails() {
        let snapshot = FormSnapshot { feature_type: None, ..base() };
        assert!(snapshot.validate().is_err());
    }

    #[test]
    fn target_required_unless_cropping() {
        for ft in [FeatureType::ConvertOnly, FeatureType::ResizeAndConvert] {
            let snapshot = FormSnapshot {
                target_format: String::new(),
                feature_type: Some(ft),
                ..base()
            };
            assert!(snapshot.validate().is_err(), "{ft} should need a target format");
        }

        let crop = FormSnapshot {
            target_format: String::new(),
            feature_type: Some(FeatureType::CropObjects),
            ..base()
        };
        let form = crop.validate().unwrap();
        assert_eq!(form.target_format, "");
    }

    #[test]
    fn crop_drops_stale_target_format() {
        let crop = FormSnapshot {
            feature_type: Some(FeatureType::CropObjects),
            ..base()
        };
        assert_eq!(crop.validate().unwrap().target_format, "");
    }

    #[test]
    fn mismatched_params_fail() {
        let snapshot = FormSnapshot {
            feature_params: Some(FeatureParameters::CropObjects(CropParams::default())),
            ..base()
        };
        assert!(snapshot.validate().is_err());
    }

    #[test]
    fn out_of_range_params_fail() {
        let snapshot = FormSnapshot {
            feature_type: Some(FeatureType::ResizeAndConvert),
            feature_params: Some(FeatureParameters::ResizeAndConvert(ResizeParams {
                width: Some(0),
                ..Default::default()
            })),
            ..base()
        };
        assert!(snapshot.validate().is_err());
    }

    #[test]
    fn sections_follow_feature() {
        assert!(visible_sections(None).is_empty());
        assert!(!visible_sections(Some(FeatureType::CropObjects))
            .contains(&FormSection::TargetFormat));
        assert_eq!(
            visible_sections(Some(FeatureType::ResizeAndConvert)),
            vec![FormSection::TargetFormat, FormSection::ResizeOptions]
        );
    }
}
