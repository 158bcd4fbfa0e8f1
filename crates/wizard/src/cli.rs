//! Command-line arguments of the `dcut` binary.

use std::path::PathBuf;

use clap::Parser;

use dcut_core::feature::{
    ConvertParams, CropParams, FeatureParameters, FeatureType, ResizeParams,
};
use dcut_core::form::FormSnapshot;
use dcut_core::types::INPUT_FORMAT_CVAT_IMAGES_1_1;

use crate::config::WizardConfig;

/// Upload an annotated dataset to the conversion service, follow its
/// progress and download the converted result.
#[derive(Debug, Clone, Parser)]
#[command(name = "dcut", version)]
pub struct Cli {
    /// Dataset archive (.zip) to upload.
    pub file: PathBuf,

    /// Annotation format of the uploaded dataset.
    #[arg(long, default_value = INPUT_FORMAT_CVAT_IMAGES_1_1)]
    pub input_format: String,

    /// What to do with the dataset: convert_only, resize_and_convert or crop_objects.
    #[arg(long, value_parser = parse_feature)]
    pub feature: FeatureType,

    /// Output annotation format (yolo, pascal_voc, tao_kitti). Ignored for crop_objects.
    #[arg(long, default_value = "")]
    pub target_format: String,

    /// Prefix for generated file names.
    #[arg(long, default_value = "")]
    pub output_prefix: String,

    /// convert_only: emit annotations without copying images.
    #[arg(long)]
    pub no_images: bool,

    /// resize_and_convert: target width in pixels.
    #[arg(long)]
    pub width: Option<u32>,

    /// resize_and_convert: target height in pixels.
    #[arg(long)]
    pub height: Option<u32>,

    /// resize_and_convert: stretch instead of preserving the aspect ratio.
    #[arg(long)]
    pub stretch: bool,

    /// crop_objects: pixels of context around each box.
    #[arg(long, default_value_t = 0)]
    pub padding: u32,

    /// crop_objects: write all crops into one folder instead of one per class.
    #[arg(long)]
    pub flat: bool,

    /// Base URL of the conversion service (overrides DCUT_API_URL).
    #[arg(long)]
    pub api_url: Option<String>,

    /// Where to save the result (overrides DCUT_DOWNLOAD_DIR).
    #[arg(long)]
    pub download_dir: Option<PathBuf>,

    /// Leave the result on the server instead of downloading it.
    #[arg(long)]
    pub no_download: bool,
}

fn parse_feature(s: &str) -> Result<FeatureType, String> {
    FeatureType::from_str_wire(s).map_err(|e| e.to_string())
}

impl Cli {
    /// The form the user filled in on the command line.
    pub fn form_snapshot(&self) -> FormSnapshot {
        let output_prefix = self.output_prefix.clone();
        let feature_params = match self.feature {
            FeatureType::ConvertOnly => FeatureParameters::ConvertOnly(ConvertParams {
                output_prefix,
                include_images: !self.no_images,
            }),
            FeatureType::ResizeAndConvert => FeatureParameters::ResizeAndConvert(ResizeParams {
                output_prefix,
                width: self.width,
                height: self.height,
                preserve_aspect_ratio: !self.stretch,
            }),
            FeatureType::CropObjects => FeatureParameters::CropObjects(CropParams {
                output_prefix,
                padding: self.padding,
                per_class_folders: !self.flat,
            }),
        };

        FormSnapshot {
            file: Some(self.file.clone()),
            input_format: self.input_format.clone(),
            target_format: self.target_format.clone(),
            feature_type: Some(self.feature),
            feature_params: Some(feature_params),
        }
    }

    /// Apply command-line overrides on top of the environment config.
    pub fn apply_overrides(&self, config: &mut WizardConfig) {
        if let Some(url) = &self.api_url {
            config.api_url = url.trim_end_matches('/').to_string();
        }
        if let Some(dir) = &self.download_dir {
            config.download_dir = dir.clone();
        }
    }
}
