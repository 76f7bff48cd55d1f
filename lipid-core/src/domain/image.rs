//! Image domain types
//!
//! Images are registered by an external ingest process; Lipid only reads them.

use serde::{Deserialize, Serialize};

/// Image document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Image {
    #[serde(rename = "imageId")]
    pub id: String,
    /// Base URI of the Deep Zoom pyramid served to the viewer
    pub dzi_base_uri: String,
    #[serde(default)]
    pub overlay_refs: Vec<serde_json::Value>,
    #[serde(default)]
    pub legend: serde_json::Map<String, serde_json::Value>,
}
