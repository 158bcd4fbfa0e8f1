//! Feature types and their parameter bags.
//!
//! The service performs one of three dataset operations per ticket. Each
//! carries its own options, sent as a flat JSON object in the
//! `feature_params` form field.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Upper bound accepted for resize width/height.
pub const MAX_RESIZE_DIMENSION: u32 = 20_000;

/// Upper bound accepted for crop padding, in pixels.
pub const MAX_CROP_PADDING: u32 = 10_000;

// ---------------------------------------------------------------------------
// Feature type
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeatureType {
    ConvertOnly,
    ResizeAndConvert,
    CropObjects,
}

impl FeatureType {
    pub fn from_str_wire(s: &str) -> Result<Self, CoreError> {
        match s {
            "convert_only" => Ok(Self::ConvertOnly),
            "resize_and_convert" => Ok(Self::ResizeAndConvert),
            "crop_objects" => Ok(Self::CropObjects),
            _ => Err(CoreError::Validation(format!(
                "Invalid feature type '{s}'. Must be one of: convert_only, resize_and_convert, crop_objects"
            ))),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ConvertOnly => "convert_only",
            Self::ResizeAndConvert => "resize_and_convert",
            Self::CropObjects => "crop_objects",
        }
    }

    /// Cropping writes image crops only, so it has no label target format.
    pub fn requires_target_format(&self) -> bool {
        !matches!(self, Self::CropObjects)
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::ConvertOnly => "Convert labels only",
            Self::ResizeAndConvert => "Resize + convert",
            Self::CropObjects => "Crop objects",
        }
    }

    /// Parameters with the service's defaults for this feature.
    pub fn default_params(&self) -> FeatureParameters {
        match self {
            Self::ConvertOnly => FeatureParameters::ConvertOnly(ConvertParams::default()),
            Self::ResizeAndConvert => {
                FeatureParameters::ResizeAndConvert(ResizeParams::default())
            }
            Self::CropObjects => FeatureParameters::CropObjects(CropParams::default()),
        }
    }
}

impl fmt::Display for FeatureType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Parameter variants
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConvertParams {
    pub output_prefix: String,
    pub include_images: bool,
}

impl Default for ConvertParams {
    fn default() -> Self {
        Self {
            output_prefix: String::new(),
            include_images: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResizeParams {
    pub output_prefix: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
    pub preserve_aspect_ratio: bool,
}

impl Default for ResizeParams {
    fn default() -> Self {
        Self {
            output_prefix: String::new(),
            width: None,
            height: None,
            preserve_aspect_ratio: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CropParams {
    pub output_prefix: String,
    pub padding: u32,
    pub per_class_folders: bool,
}

impl Default for CropParams {
    fn default() -> Self {
        Self {
            output_prefix: String::new(),
            padding: 0,
            per_class_folders: true,
        }
    }
}

/// Feature-specific options. Exactly one variant is active per job, and it
/// must match the job's [`FeatureType`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum FeatureParameters {
    ConvertOnly(ConvertParams),
    ResizeAndConvert(ResizeParams),
    CropObjects(CropParams),
}

impl FeatureParameters {
    pub fn feature_type(&self) -> FeatureType {
        match self {
            Self::ConvertOnly(_) => FeatureType::ConvertOnly,
            Self::ResizeAndConvert(_) => FeatureType::ResizeAndConvert,
            Self::CropObjects(_) => FeatureType::CropObjects,
        }
    }

    pub fn output_prefix(&self) -> &str {
        match self {
            Self::ConvertOnly(p) => &p.output_prefix,
            Self::ResizeAndConvert(p) => &p.output_prefix,
            Self::CropObjects(p) => &p.output_prefix,
        }
    }

    /// Range checks on numeric options.
    pub fn validate(&self) -> Result<(), CoreError> {
        match self {
            Self::ConvertOnly(_) => Ok(()),
            Self::ResizeAndConvert(p) => {
                validate_dimension("width", p.width)?;
                validate_dimension("height", p.height)
            }
            Self::CropObjects(p) => {
                if p.padding > MAX_CROP_PADDING {
                    return Err(CoreError::Validation(format!(
                        "Padding {} exceeds the maximum of {MAX_CROP_PADDING}",
                        p.padding
                    )));
                }
                Ok(())
            }
        }
    }

    /// Flat JSON object sent as the `feature_params` form field.
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| "{}".to_string())
    }
}

fn validate_dimension(name: &str, value: Option<u32>) -> Result<(), CoreError> {
    match value {
        Some(v) if v == 0 || v > MAX_RESIZE_DIMENSION => Err(CoreError::Validation(format!(
            "Resize {name} must be between 1 and {MAX_RESIZE_DIMENSION}, got {v}"
        ))),
        _ => Ok(()),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
