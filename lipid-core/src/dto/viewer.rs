//! Viewer DTOs

use serde::{Deserialize, Serialize};

use crate::domain::image::Image;

/// Query of `GET /viewer/config`
#[derive(Debug, Clone, Deserialize)]
pub struct ViewerConfigQuery {
    #[serde(rename = "imageId")]
    pub image_id: String,
}

/// What the slide viewer needs to render an image and its overlays
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViewerConfig {
    pub dzi_base_uri: String,
    pub overlays: Vec<serde_json::Value>,
    pub legend: serde_json::Map<String, serde_json::Value>,
}

impl From<Image> for ViewerConfig {
    fn from(image: Image) -> Self {
        Self {
            dzi_base_uri: image.dzi_base_uri,
            overlays: image.overlay_refs,
            legend: image.legend,
        }
    }
}
